//! Realtime channel stub: registrations are recorded and only fire when a
//! test or demo calls [`Channel::mock_receive`].

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::{Duration, SystemTime};

use domain::time::format_timestamp;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, trace, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChannelStatus {
    Created,
    Subscribing,
    Subscribed,
    Closed,
}

/// Row-change event delivered to `on` callbacks.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChangePayload {
    pub event: String,
    pub schema: String,
    pub table: Option<String>,
    pub commit_timestamp: String,
    pub new: Option<Value>,
    pub old: Option<Value>,
}

type ChangeCallback = Arc<dyn Fn(&ChangePayload) + Send + Sync>;
type StatusCallback = Arc<dyn Fn(ChannelStatus) + Send + Sync>;

struct Registration {
    event: String,
    filter: Value,
    callback: ChangeCallback,
}

struct ChannelState {
    status: ChannelStatus,
    registrations: Vec<Registration>,
    on_status: Option<StatusCallback>,
}

/// Channels a client currently tracks.
pub(crate) type ChannelRegistry = Mutex<Vec<Channel>>;

struct ChannelInner {
    name: String,
    subscribe_delay: Duration,
    state: Mutex<ChannelState>,
    registry: Weak<ChannelRegistry>,
}

/// Shared handle; clones refer to the same channel.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<ChannelInner>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("name", &self.inner.name)
            .field("status", &self.status())
            .finish()
    }
}

impl Channel {
    pub(crate) fn new(name: &str, subscribe_delay: Duration) -> Self {
        Self::with_registry(name, subscribe_delay, Weak::new())
    }

    /// Channel that drops itself from `registry` when unsubscribed.
    pub(crate) fn registered(
        name: &str,
        subscribe_delay: Duration,
        registry: &Arc<ChannelRegistry>,
    ) -> Self {
        Self::with_registry(name, subscribe_delay, Arc::downgrade(registry))
    }

    fn with_registry(name: &str, subscribe_delay: Duration, registry: Weak<ChannelRegistry>) -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                name: name.to_string(),
                subscribe_delay,
                state: Mutex::new(ChannelState {
                    status: ChannelStatus::Created,
                    registrations: Vec::new(),
                    on_status: None,
                }),
                registry,
            }),
        }
    }

    fn lock(&self) -> Option<MutexGuard<'_, ChannelState>> {
        match self.inner.state.lock() {
            Ok(guard) => Some(guard),
            Err(_) => {
                warn!(channel = %self.inner.name, "channel state poisoned");
                None
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn status(&self) -> ChannelStatus {
        self.lock()
            .map(|s| s.status)
            .unwrap_or(ChannelStatus::Closed)
    }

    /// Table the channel listens to: the part after `:` in `public:items`.
    pub fn table(&self) -> Option<&str> {
        self.inner.name.split(':').nth(1)
    }

    pub(crate) fn same_channel(&self, other: &Channel) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Register a change callback for `event` (`INSERT`, `UPDATE`, `DELETE`
    /// or `*`). The filter object is stored as given and not evaluated.
    pub fn on<F>(&self, event: &str, filter: Value, callback: F) -> Channel
    where
        F: Fn(&ChangePayload) + Send + Sync + 'static,
    {
        if let Some(mut state) = self.lock() {
            state.registrations.push(Registration {
                event: event.to_string(),
                filter,
                callback: Arc::new(callback),
            });
            trace!(channel = %self.inner.name, event, "registration added");
        }
        self.clone()
    }

    /// Number of `on` registrations currently held.
    pub fn registration_count(&self) -> usize {
        self.lock().map(|s| s.registrations.len()).unwrap_or(0)
    }

    /// Filters passed to `on`, in registration order.
    pub fn filters(&self) -> Vec<Value> {
        self.lock()
            .map(|s| s.registrations.iter().map(|r| r.filter.clone()).collect())
            .unwrap_or_default()
    }

    /// Start subscribing. `callback` receives `Subscribed` once the
    /// configured delay has passed; with a zero delay or outside a tokio
    /// runtime that happens before this call returns.
    pub fn subscribe<F>(&self, callback: F) -> ChannelSubscription
    where
        F: Fn(ChannelStatus) + Send + Sync + 'static,
    {
        if let Some(mut state) = self.lock() {
            state.status = ChannelStatus::Subscribing;
            state.on_status = Some(Arc::new(callback));
        }
        debug!(channel = %self.inner.name, "subscribing");

        let delay = self.inner.subscribe_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) if !delay.is_zero() => {
                let channel = self.clone();
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    channel.complete_subscribe();
                });
            }
            _ => self.complete_subscribe(),
        }
        ChannelSubscription {
            channel: self.clone(),
        }
    }

    fn complete_subscribe(&self) {
        let callback = {
            let Some(mut state) = self.lock() else { return };
            if state.status != ChannelStatus::Subscribing {
                return;
            }
            state.status = ChannelStatus::Subscribed;
            state.on_status.clone()
        };
        debug!(channel = %self.inner.name, "subscribed");
        if let Some(cb) = callback {
            cb(ChannelStatus::Subscribed);
        }
    }

    /// Deliver a simulated change to every matching registration and return
    /// how many callbacks ran. Closed channels deliver nothing.
    pub fn mock_receive(&self, event: &str, payload: Value) -> usize {
        let callbacks: Vec<ChangeCallback> = {
            let Some(state) = self.lock() else { return 0 };
            if state.status == ChannelStatus::Closed {
                return 0;
            }
            state
                .registrations
                .iter()
                .filter(|r| r.event == "*" || r.event == event)
                .map(|r| Arc::clone(&r.callback))
                .collect()
        };

        let change = ChangePayload {
            event: event.to_string(),
            schema: "public".to_string(),
            table: self.table().map(str::to_string),
            commit_timestamp: format_timestamp(SystemTime::now()),
            new: (event != "DELETE").then(|| payload.clone()),
            old: (event != "INSERT").then_some(payload),
        };
        debug!(channel = %self.inner.name, event, callbacks = callbacks.len(), "mock receive");
        for cb in &callbacks {
            cb(&change);
        }
        callbacks.len()
    }

    /// Drop every registration and mark the channel closed.
    pub(crate) fn close(&self) {
        if let Some(mut state) = self.lock() {
            state.registrations.clear();
            state.on_status = None;
            state.status = ChannelStatus::Closed;
        }
        debug!(channel = %self.inner.name, "closed");
    }

    /// Remove this channel from the owning client's registry, if any.
    /// Returns whether an entry was removed.
    pub(crate) fn deregister(&self) -> bool {
        let Some(registry) = self.inner.registry.upgrade() else {
            return false;
        };
        let Ok(mut list) = registry.lock() else {
            warn!(channel = %self.inner.name, "channel registry poisoned");
            return false;
        };
        let before = list.len();
        list.retain(|c| !c.same_channel(self));
        before != list.len()
    }
}

/// Returned by [`Channel::subscribe`].
#[derive(Debug, Clone)]
pub struct ChannelSubscription {
    channel: Channel,
}

impl ChannelSubscription {
    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    /// Close the channel and drop it from the client that created it.
    pub fn unsubscribe(&self) {
        self.channel.close();
        self.channel.deregister();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;

    fn counter() -> (Arc<AtomicUsize>, impl Fn(&ChangePayload) + Send + Sync + 'static) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = Arc::clone(&hits);
        (hits, move |_: &ChangePayload| {
            h.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn subscribe_completes_immediately_without_delay() {
        let ch = Channel::new("public:items", Duration::ZERO);
        assert_eq!(ch.status(), ChannelStatus::Created);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        ch.subscribe(move |status| s.lock().unwrap().push(status));
        assert_eq!(ch.status(), ChannelStatus::Subscribed);
        assert_eq!(*seen.lock().unwrap(), vec![ChannelStatus::Subscribed]);
    }

    #[tokio::test]
    async fn subscribe_completes_after_delay() {
        let ch = Channel::new("public:items", Duration::from_millis(10));
        ch.subscribe(|_| {});
        assert_eq!(ch.status(), ChannelStatus::Subscribing);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ch.status(), ChannelStatus::Subscribed);
    }

    #[tokio::test]
    async fn unsubscribe_before_delay_skips_callback() {
        let ch = Channel::new("public:items", Duration::from_millis(10));
        let fired = Arc::new(AtomicUsize::new(0));
        let f = Arc::clone(&fired);
        let sub = ch.subscribe(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ch.status(), ChannelStatus::Closed);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn mock_receive_matches_event_or_wildcard() {
        let ch = Channel::new("public:conventions", Duration::ZERO);
        let (inserts, on_insert) = counter();
        let (all, on_all) = counter();
        let (deletes, on_delete) = counter();
        ch.on("INSERT", json!({"schema": "public"}), on_insert)
            .on("*", json!({}), on_all)
            .on("DELETE", json!({}), on_delete);
        assert_eq!(ch.registration_count(), 3);

        assert_eq!(ch.mock_receive("INSERT", json!({"id": "conv-9"})), 2);
        assert_eq!(inserts.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 1);
        assert_eq!(deletes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn payload_shape_follows_event() {
        let ch = Channel::new("public:items", Duration::ZERO);
        let got = Arc::new(Mutex::new(Vec::new()));
        let g = Arc::clone(&got);
        ch.on("*", json!({}), move |p| g.lock().unwrap().push(p.clone()));

        ch.mock_receive("INSERT", json!({"id": "item-9"}));
        ch.mock_receive("DELETE", json!({"id": "item-9"}));
        ch.mock_receive("UPDATE", json!({"id": "item-9"}));
        let got = got.lock().unwrap();
        assert_eq!(got[0].table.as_deref(), Some("items"));
        assert_eq!(got[0].schema, "public");
        assert!(got[0].new.is_some() && got[0].old.is_none());
        assert!(got[1].new.is_none() && got[1].old.is_some());
        assert!(got[2].new.is_some() && got[2].old.is_some());
    }

    #[test]
    fn payload_serializes_event_field() {
        let ch = Channel::new("public:items", Duration::ZERO);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&seen);
        ch.on("INSERT", json!({}), move |p| {
            s.lock().unwrap().push(serde_json::to_value(p).unwrap())
        });
        ch.mock_receive("INSERT", json!({"id": "item-9"}));
        let payload = seen.lock().unwrap()[0].clone();
        assert_eq!(payload["event"], json!("INSERT"));
        assert_eq!(payload["table"], json!("items"));
        assert!(payload.get("eventType").is_none());
    }

    #[test]
    fn closed_channel_delivers_nothing() {
        let ch = Channel::new("room", Duration::ZERO);
        let (hits, cb) = counter();
        let sub = ch.on("*", json!({}), cb).subscribe(|_| {});
        sub.unsubscribe();
        assert_eq!(ch.registration_count(), 0);
        assert_eq!(ch.mock_receive("INSERT", json!({})), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(ch.table(), None);
    }
}
