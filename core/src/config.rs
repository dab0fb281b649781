//! Client configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::transport::Transport;

/// Environment variable read by [`ClientConfig::from_env`] for the base address.
pub const BASE_URL_ENV: &str = "RESTKIT_BASE_URL";
/// Environment variable read by [`ClientConfig::from_env`] for the deadline, in milliseconds.
pub const TIMEOUT_ENV: &str = "RESTKIT_TIMEOUT_MS";

/// Settings for [`Client::new`](crate::Client::new).
///
/// An unset transport falls back to [`ReqwestTransport`](crate::ReqwestTransport).
/// An empty `base_url` means every call must pass an absolute URL.
#[derive(Debug, Clone, Default)]
pub struct ClientConfig {
    pub transport: Option<Arc<dyn Transport>>,
    pub base_url: String,
    /// Upper bound on one whole exchange, body included.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read `RESTKIT_BASE_URL` and `RESTKIT_TIMEOUT_MS`. Unset or unparsable
    /// values leave the defaults in place.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        match std::env::var(TIMEOUT_ENV).map(|raw| raw.trim().parse::<u64>()) {
            Ok(Ok(ms)) => config.timeout = Some(Duration::from_millis(ms)),
            Ok(Err(err)) => tracing::warn!(error = %err, "ignoring invalid {TIMEOUT_ENV}"),
            Err(_) => {}
        }
        config
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = ClientConfig::new()
            .with_base_url("http://localhost:3000")
            .with_timeout(Duration::from_secs(2));
        assert_eq!(config.base_url, "http://localhost:3000");
        assert_eq!(config.timeout, Some(Duration::from_secs(2)));
        assert!(config.transport.is_none());
    }

    #[test]
    fn default_is_empty() {
        let config = ClientConfig::default();
        assert!(config.base_url.is_empty());
        assert!(config.timeout.is_none());
    }

    /// Sets a variable for the life of the guard, restoring the old value on drop.
    struct ScopedEnv {
        key: &'static str,
        original: Option<String>,
    }

    impl ScopedEnv {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, original }
        }

        fn unset(key: &'static str) -> Self {
            let original = std::env::var(key).ok();
            std::env::remove_var(key);
            Self { key, original }
        }
    }

    impl Drop for ScopedEnv {
        fn drop(&mut self) {
            match &self.original {
                Some(value) => std::env::set_var(self.key, value),
                None => std::env::remove_var(self.key),
            }
        }
    }

    #[test]
    #[serial_test::serial]
    fn from_env_reads_base_url_and_timeout() {
        let _base = ScopedEnv::set(BASE_URL_ENV, "http://localhost:3000/api");
        let _timeout = ScopedEnv::set(TIMEOUT_ENV, " 1500 ");

        let config = ClientConfig::from_env();
        assert_eq!(config.base_url, "http://localhost:3000/api");
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert!(config.transport.is_none());
    }

    #[test]
    #[serial_test::serial]
    fn from_env_without_variables_is_default() {
        let _base = ScopedEnv::unset(BASE_URL_ENV);
        let _timeout = ScopedEnv::unset(TIMEOUT_ENV);

        let config = ClientConfig::from_env();
        assert!(config.base_url.is_empty());
        assert!(config.timeout.is_none());
    }

    #[test]
    #[serial_test::serial]
    #[tracing_test::traced_test]
    fn from_env_ignores_invalid_timeout() {
        let _base = ScopedEnv::unset(BASE_URL_ENV);
        let _timeout = ScopedEnv::set(TIMEOUT_ENV, "soon");

        let config = ClientConfig::from_env();
        assert!(config.timeout.is_none());
        assert!(logs_contain("ignoring invalid RESTKIT_TIMEOUT_MS"));
    }
}
