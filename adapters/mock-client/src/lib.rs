//! mock-client: in-process stand-in for the hosted BaaS SDK.
//!
//! Purpose
//! - Give the rest of the app the same surface it uses against the real
//!   backend (`from`, `rpc`, `auth`, `storage`, `functions`, `channel`)
//!   while every call is served from an injected [`RecordStore`].
//!
//! API
//! - `MockClient::new(store, config)` or `MockClient::demo()` for a seeded
//!   store with default latencies.
//! - `client.from("items").select("*").eq("location_id", "loc-1").execute().await`
//!
//! Notes
//! - Every surface sleeps the latency configured in [`ClientConfig`].
//! - Errors from the store are converted into [`ClientError`] with an
//!   HTTP-like status; nothing panics on bad input.

pub mod config;
pub mod functions;
pub mod query;
pub mod realtime;
pub mod storage;

use std::sync::{Arc, Mutex};

use domain::adapters::memory_store::InMemoryStore;
use domain::{RecordStore, StoreError};
use mock_auth::{AuthError, AuthSimulator};
use serde_json::Value;
use tracing::{debug, warn};

pub use config::ClientConfig;
pub use functions::Functions;
pub use query::{Data, QueryBuilder, Response};
pub use realtime::{ChangePayload, Channel, ChannelStatus, ChannelSubscription};
use realtime::ChannelRegistry;
pub use storage::{Bucket, Storage, UploadFile};

/// Error returned by every client surface: a message plus an optional
/// HTTP-like status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClientError {
    pub message: String,
    pub status: Option<u16>,
}

impl ClientError {
    pub fn new(message: impl Into<String>, status: u16) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }
}

impl From<StoreError> for ClientError {
    fn from(e: StoreError) -> Self {
        let status = match &e {
            StoreError::UnknownTable(_) => 404,
            StoreError::Validation { .. } | StoreError::NotAnObject | StoreError::InvalidFilter(_) => {
                400
            }
            StoreError::Guard(_) | StoreError::AlreadyExists => 409,
            StoreError::Repository(_) => 500,
        };
        Self::new(e.to_string(), status)
    }
}

impl From<AuthError> for ClientError {
    fn from(e: AuthError) -> Self {
        let status = e.status();
        Self::new(e.to_string(), status)
    }
}

struct Inner {
    store: Arc<dyn RecordStore>,
    auth: AuthSimulator,
    config: ClientConfig,
    channels: Arc<ChannelRegistry>,
}

/// Cheap to clone; all clones share the store, the auth session and the
/// channel registry.
#[derive(Clone)]
pub struct MockClient {
    inner: Arc<Inner>,
}

impl MockClient {
    pub fn new(store: Arc<dyn RecordStore>, config: ClientConfig) -> Self {
        let auth = AuthSimulator::new(Arc::clone(&store), config.auth);
        Self::with_auth(store, auth, config)
    }

    /// Use a prebuilt simulator, e.g. one with deterministic ids and clock.
    /// The simulator must write to the same `store`.
    pub fn with_auth(store: Arc<dyn RecordStore>, auth: AuthSimulator, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                auth,
                config,
                channels: Arc::new(Mutex::new(Vec::new())),
            }),
        }
    }

    /// Seeded demo store with the default latencies.
    pub fn demo() -> Self {
        Self::new(Arc::new(InMemoryStore::seeded()), ClientConfig::default())
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn from(&self, table: &str) -> QueryBuilder {
        QueryBuilder::table(self.clone(), table)
    }

    pub fn rpc(&self, name: &str, params: Value) -> QueryBuilder {
        QueryBuilder::rpc(self.clone(), name, params)
    }

    pub fn auth(&self) -> &AuthSimulator {
        &self.inner.auth
    }

    pub fn storage(&self) -> Storage {
        Storage::new(self.clone())
    }

    pub fn functions(&self) -> Functions {
        Functions::new(self.clone())
    }

    /// Create a channel and register it on this client.
    pub fn channel(&self, name: &str) -> Channel {
        let channel =
            Channel::registered(name, self.inner.config.subscribe_delay, &self.inner.channels);
        match self.inner.channels.lock() {
            Ok(mut list) => list.push(channel.clone()),
            Err(_) => warn!(channel = name, "channel registry poisoned; channel not tracked"),
        }
        debug!(channel = name, "channel created");
        channel
    }

    pub fn get_channels(&self) -> Vec<Channel> {
        self.inner
            .channels
            .lock()
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Close `channel` and drop it from the registry. Returns whether it was
    /// registered on this client.
    pub fn remove_channel(&self, channel: &Channel) -> bool {
        channel.close();
        let Ok(mut list) = self.inner.channels.lock() else {
            return false;
        };
        let before = list.len();
        list.retain(|c| !c.same_channel(channel));
        before != list.len()
    }

    /// Close every registered channel; returns how many were removed.
    pub fn remove_all_channels(&self) -> usize {
        let drained: Vec<Channel> = match self.inner.channels.lock() {
            Ok(mut list) => list.drain(..).collect(),
            Err(_) => return 0,
        };
        for channel in &drained {
            channel.close();
        }
        drained.len()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::client;
    use super::*;
    use domain::Table;

    #[test]
    fn store_errors_map_to_statuses() {
        let e: ClientError = StoreError::UnknownTable("nope".into()).into();
        assert_eq!(e.message, "Mock table 'nope' not found");
        assert_eq!(e.status, Some(404));

        let e: ClientError = StoreError::Guard("Cannot delete an active convention.".into()).into();
        assert_eq!(e.to_string(), "Cannot delete an active convention.");
        assert_eq!(e.status, Some(409));

        let e: ClientError = StoreError::Repository("mutex poisoned".into()).into();
        assert_eq!(e.status, Some(500));
    }

    #[test]
    fn auth_errors_keep_their_status() {
        let e: ClientError = AuthError::NotAuthenticated.into();
        assert_eq!(e.status, Some(401));
        assert_eq!(e.message, "Not authenticated");
    }

    #[test]
    fn channel_registry_tracks_and_removes() {
        let (_store, client) = client();
        let a = client.channel("public:items");
        let _b = client.channel("public:conventions");
        assert_eq!(client.get_channels().len(), 2);

        assert!(client.remove_channel(&a));
        assert!(!client.remove_channel(&a));
        assert_eq!(a.status(), ChannelStatus::Closed);
        assert_eq!(client.get_channels().len(), 1);

        assert_eq!(client.remove_all_channels(), 1);
        assert!(client.get_channels().is_empty());
    }

    #[test]
    fn unsubscribed_channels_leave_the_registry() {
        let (_store, client) = client();
        let sub = client.channel("public:items").subscribe(|_| {});
        let kept = client.channel("public:conventions");
        assert_eq!(client.get_channels().len(), 2);

        sub.unsubscribe();
        let left = client.get_channels();
        assert_eq!(left.len(), 1);
        assert!(left[0].same_channel(&kept));
        assert!(!client.remove_channel(sub.channel()));

        // channels built outside a client have nothing to leave
        let loose = Channel::new("room", std::time::Duration::ZERO).subscribe(|_| {});
        loose.unsubscribe();
        assert_eq!(client.get_channels().len(), 1);
    }

    #[tokio::test]
    async fn clones_share_store_and_session() {
        let (store, client) = client();
        let other = client.clone();
        other
            .auth()
            .sign_in_with_password("member@konbase.cfd", mock_auth::DEMO_PASSWORD)
            .await
            .unwrap();
        assert_eq!(client.auth().current_user_id().as_deref(), Some("user-member"));

        client
            .from("categories")
            .insert(serde_json::json!({"name": "Cables", "association_id": "assoc-1"}))
            .execute()
            .await
            .unwrap();
        let names: Vec<String> = store
            .all(Table::Categories)
            .unwrap()
            .iter()
            .filter_map(|r| r.str("name").map(str::to_string))
            .collect();
        assert!(names.contains(&"Cables".to_string()));
    }
}
