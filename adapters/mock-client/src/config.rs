//! Latency settings for the mock client.

use std::time::Duration;

use mock_auth::AuthDelays;

/// Artificial delays applied by each client surface. `Default` mirrors the
/// timings of the hosted service the mock stands in for; tests use
/// [`ClientConfig::instant`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Before every query builder `execute()`.
    pub query_latency: Duration,
    pub upload_latency: Duration,
    pub download_latency: Duration,
    pub remove_latency: Duration,
    pub function_latency: Duration,
    /// Between `subscribe()` and the `Subscribed` callback.
    pub subscribe_delay: Duration,
    pub auth: AuthDelays,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            query_latency: Duration::from_millis(50),
            upload_latency: Duration::from_millis(200),
            download_latency: Duration::from_millis(50),
            remove_latency: Duration::from_millis(100),
            function_latency: Duration::from_millis(150),
            subscribe_delay: Duration::from_millis(10),
            auth: AuthDelays::default(),
        }
    }
}

impl ClientConfig {
    /// No delays anywhere; channel subscriptions complete synchronously.
    pub fn instant() -> Self {
        Self {
            query_latency: Duration::ZERO,
            upload_latency: Duration::ZERO,
            download_latency: Duration::ZERO,
            remove_latency: Duration::ZERO,
            function_latency: Duration::ZERO,
            subscribe_delay: Duration::ZERO,
            auth: AuthDelays::instant(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_service_timings() {
        let c = ClientConfig::default();
        assert_eq!(c.query_latency, Duration::from_millis(50));
        assert_eq!(c.function_latency, Duration::from_millis(150));
        assert_eq!(c.auth.slow, Duration::from_millis(100));
    }

    #[test]
    fn instant_has_no_delays() {
        let c = ClientConfig::instant();
        assert!(c.query_latency.is_zero());
        assert!(c.subscribe_delay.is_zero());
        assert_eq!(c.auth, AuthDelays::instant());
    }
}
