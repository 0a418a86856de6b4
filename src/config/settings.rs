#[derive(Clone)]
pub struct EngineSettings {
    pub starter_score: i64,
    pub win_score_bonus: i64,
    pub loss_score_penalty: i64,
    pub game_types: &'static [&'static str],
    pub map_id_range: i64,
    pub max_level_order_gap: i64,
    pub stale_start_minutes: i64,
    pub unanswered_after_hours: i64,
    pub unanswered_before_hours: i64,
    pub forced_winner_score: i64,
    pub forced_loser_score: i64,
    pub life_request_expiry_hours: i64,
    pub cleanup_interval_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            starter_score: 100,
            win_score_bonus: 20,
            loss_score_penalty: 10,
            game_types: &["time", "points"],
            map_id_range: 20,
            max_level_order_gap: 1,
            stale_start_minutes: 10,
            unanswered_after_hours: 24,
            unanswered_before_hours: 72,
            forced_winner_score: 2,
            forced_loser_score: 1,
            life_request_expiry_hours: 24,
            cleanup_interval_secs: 60,
        }
    }
}

impl EngineSettings {
    /// Half the win bonus, granted to a loser whose side was aborted by the
    /// cleanup sweep instead of finishing normally.
    pub fn abort_consolation(&self) -> i64 {
        self.win_score_bonus / 2
    }
}

#[derive(Clone)]
pub struct AuthSettings {
    pub token_length: usize,
    pub login_code_low: u32,
    pub login_code_high: u32,
    pub guest_name_prefix: &'static str,
    pub min_username_length: usize,
    pub min_search_length: usize,
    pub toplist_size: i64,
}

impl Default for AuthSettings {
    fn default() -> Self {
        Self {
            token_length: 48,
            login_code_low: 100_000, // six digits
            login_code_high: 999_999,
            guest_name_prefix: "DC",
            min_username_length: 2,
            min_search_length: 2,
            toplist_size: 20,
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub engine: EngineSettings,
    pub auth: AuthSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl AppConfig {
    pub fn new() -> Self {
        Self {
            engine: EngineSettings::default(),
            auth: AuthSettings::default(),
        }
    }
}
