//! Pub/sub channels, notification payloads and the subscription registry.
//!
//! The registry tracks a reference count per channel so the driver issues
//! LISTEN exactly once when a channel gains its first subscriber and
//! UNLISTEN exactly once when it loses its last one. Dispatch runs
//! synchronously on whatever thread the transport delivers notifications
//! from, so the subscriber list is guarded against concurrent mutation
//! from caller tasks.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

/// A pub/sub topic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Channel {
    /// A named channel created with CREATE CHANNEL.
    Named(String),
    /// A table-bound topic receiving write-event notifications.
    Table(String),
    /// All tables of the current database.
    AllTables,
}

impl Channel {
    /// The channel name as it appears on the wire (`"*"` for all tables).
    #[must_use]
    pub fn wire_name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Table(name) => name,
            Self::AllTables => "*",
        }
    }

    /// Whether this channel uses the table-oriented LISTEN verb.
    #[must_use]
    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table(_) | Self::AllTables)
    }
}

/// The kind of event a notification describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MessageType {
    /// Whole-table change notification.
    Table,
    /// Message published to a named channel.
    Message,
    /// Row insert on a watched table.
    Insert,
    /// Row update on a watched table.
    Update,
    /// Row delete on a watched table.
    Delete,
    /// Any event kind this driver version does not know about.
    #[default]
    #[serde(other)]
    Unsupported,
}

/// A decoded pub/sub notification.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NotificationPayload {
    /// UUID of the connection that caused the notification.
    #[serde(default)]
    pub sender: String,
    /// Channel (or table) name the notification was published on.
    pub channel: String,
    /// Event kind.
    #[serde(rename = "type", default)]
    pub message_type: MessageType,
    /// Primary-key parts of the affected row, for table events.
    #[serde(rename = "pk", default)]
    pub primary_key_parts: Vec<String>,
    /// Message payload, for named-channel events.
    #[serde(default)]
    pub payload: Option<String>,
}

/// Callback invoked for every notification matching a subscription.
pub type NotificationHandler = Arc<dyn Fn(NotificationPayload) + Send + Sync>;

/// Handle identifying one registered subscriber.
///
/// Unsubscription is explicit: pass the handle to
/// [`Client::unsubscribe`](crate::Client::unsubscribe). Dropping the
/// handle does not issue UNLISTEN.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    channel: Channel,
}

impl Subscription {
    /// The channel this subscription is attached to.
    #[must_use]
    pub fn channel(&self) -> &Channel {
        &self.channel
    }
}

struct Subscriber {
    id: u64,
    channel: Channel,
    handler: NotificationHandler,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    /// Active listener count per channel. LISTEN/UNLISTEN are issued on
    /// the 0 -> 1 and 1 -> 0 transitions only.
    counts: HashMap<Channel, usize>,
    /// Append-only while subscribed; entries leave only via unsubscribe.
    subscribers: Vec<Subscriber>,
}

/// Per-connection subscription bookkeeping.
pub(crate) struct SubscriptionRegistry {
    inner: Mutex<RegistryInner>,
}

impl SubscriptionRegistry {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(RegistryInner::default()),
        }
    }

    /// Number of active subscribers for a channel.
    pub(crate) fn active_listeners(&self, channel: &Channel) -> usize {
        self.inner
            .lock()
            .counts
            .get(channel)
            .copied()
            .unwrap_or(0)
    }

    /// Register a subscriber and bump the channel's reference count.
    pub(crate) fn register(
        &self,
        channel: Channel,
        handler: NotificationHandler,
    ) -> Subscription {
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = inner.next_id;
        *inner.counts.entry(channel.clone()).or_insert(0) += 1;
        inner.subscribers.push(Subscriber {
            id,
            channel: channel.clone(),
            handler,
        });
        Subscription { id, channel }
    }

    /// Remove a subscriber and drop the channel's reference count.
    ///
    /// Returns the remaining count for the channel, or `None` when the
    /// handle was already removed (unsubscription is idempotent). The
    /// count can never go negative: a decrement only happens when the
    /// subscriber entry still exists.
    pub(crate) fn remove(&self, subscription: &Subscription) -> Option<usize> {
        let mut inner = self.inner.lock();
        let position = inner
            .subscribers
            .iter()
            .position(|s| s.id == subscription.id)?;
        inner.subscribers.swap_remove(position);

        let count = inner
            .counts
            .get_mut(&subscription.channel)
            .map(|count| {
                debug_assert!(*count > 0, "listener refcount underflow");
                *count -= 1;
                *count
            })
            .unwrap_or(0);
        if count == 0 {
            inner.counts.remove(&subscription.channel);
        }
        Some(count)
    }

    /// Drop all bookkeeping, used when the connection goes away.
    pub(crate) fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.counts.clear();
        inner.subscribers.clear();
    }

    /// Decode a raw notification and fan it out.
    pub(crate) fn dispatch_raw(&self, raw: &str) {
        match serde_json::from_str::<NotificationPayload>(raw) {
            Ok(payload) => self.dispatch(payload),
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable notification payload");
            }
        }
    }

    /// Invoke every subscriber whose channel name equals the
    /// notification's channel name.
    pub(crate) fn dispatch(&self, payload: NotificationPayload) {
        let handlers: Vec<NotificationHandler> = {
            let inner = self.inner.lock();
            inner
                .subscribers
                .iter()
                .filter(|s| s.channel.wire_name() == payload.channel)
                .map(|s| Arc::clone(&s.handler))
                .collect()
        };
        // Handlers run outside the lock so they may listen/unsubscribe.
        for handler in handlers {
            handler(payload.clone());
        }
    }
}
