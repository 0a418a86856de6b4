use log::{info, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::database::{self, DbPool, PushToken, User};

/// Events that fan out to a player's registered devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    FriendRequestReceived,
    FriendRequestAccepted,
    ChallengeReceived,
    GameWon,
    GameLost,
    LifeRequestReceived,
    LifeGiven,
}

impl NotificationKind {
    /// Message key the client resolves to localized copy.
    pub fn message_key(self) -> &'static str {
        match self {
            NotificationKind::FriendRequestReceived => "push_friend_request_received",
            NotificationKind::FriendRequestAccepted => "push_friend_request_accepted",
            NotificationKind::ChallengeReceived => "push_game_challenge_received",
            NotificationKind::GameWon => "push_game_won",
            NotificationKind::GameLost => "push_game_lost",
            NotificationKind::LifeRequestReceived => "got_life_request",
            NotificationKind::LifeGiven => "got_life",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: i64,
    /// Free-form payload detail, e.g. the username that triggered the event.
    pub context: Option<String>,
}

/// Delivery backend. The production sink only logs; swapping in a real APNS
/// or FCM client stays behind this seam.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification, recipient: &User, tokens: &[PushToken]);
}

pub struct LogSink;

impl NotificationSink for LogSink {
    fn deliver(&self, notification: &Notification, recipient: &User, tokens: &[PushToken]) {
        let key = notification.kind.message_key();
        if tokens.is_empty() {
            info!(
                "push '{}' for {} dropped: no registered devices",
                key, recipient.username
            );
            return;
        }
        for token in tokens {
            info!(
                "push '{}' to {} ({} token {})",
                key, recipient.username, token.platform, token.token
            );
        }
    }
}

/// Cheap handle for enqueueing notifications. Enqueueing never fails and
/// never blocks; a closed channel only logs a warning, since pushes are
/// best-effort by contract.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// A notifier plus the receiving end of its queue. Callers that want
    /// deliveries must hand the receiver to [`run_delivery_worker`]; tests
    /// usually just inspect it directly.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn notify(&self, kind: NotificationKind, recipient: i64, context: Option<String>) {
        let notification = Notification {
            kind,
            recipient,
            context,
        };
        if self.tx.send(notification).is_err() {
            warn!("notification queue closed, push dropped");
        }
    }
}

/// Spawns the background task that resolves recipients and hands
/// notifications to the sink. The task ends once every notifier clone is
/// dropped and the queue has drained.
pub fn spawn_delivery_worker<S: NotificationSink + 'static>(
    pool: DbPool,
    sink: S,
) -> (Notifier, JoinHandle<()>) {
    let (notifier, rx) = Notifier::channel();
    let handle = tokio::spawn(run_delivery_worker(pool, sink, rx));
    (notifier, handle)
}

async fn run_delivery_worker<S: NotificationSink>(
    pool: DbPool,
    sink: S,
    mut rx: mpsc::UnboundedReceiver<Notification>,
) {
    while let Some(notification) = rx.recv().await {
        if let Err(err) = deliver_one(&pool, &sink, &notification) {
            warn!("push delivery failed: {err:#}");
        }
    }
}

fn deliver_one(
    pool: &DbPool,
    sink: &dyn NotificationSink,
    notification: &Notification,
) -> anyhow::Result<()> {
    let conn = database::get_connection(pool)?;
    let Some(user) = database::users::find_by_id(&conn, notification.recipient)? else {
        // Recipient vanished between enqueue and delivery.
        return Ok(());
    };
    let tokens = database::tokens::list_push_tokens(&conn, user.id)?;
    sink.deliver(notification, &user, &tokens);
    Ok(())
}
