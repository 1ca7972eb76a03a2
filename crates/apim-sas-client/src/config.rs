//! Client configuration.

use std::time::Duration;

/// Bounded backoff for the git enable flow.
///
/// After a successful enable the state is re-fetched with increasing delays
/// until the API reports git access as enabled or `max_attempts` fetches have
/// been made in total.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use apim_sas_client::EnableRetryConfig;
///
/// let config = EnableRetryConfig {
///     max_attempts: 4,
///     initial_delay: Duration::from_millis(500),
///     max_delay: Duration::from_secs(5),
///     backoff_multiplier: 2.0,
/// };
/// assert_eq!(config.delay_for(2), Duration::from_secs(1));
/// ```
#[derive(Debug, Clone)]
pub struct EnableRetryConfig {
    /// Total git access fetches, including the first one.
    pub max_attempts: u32,
    /// Delay before the first re-fetch.
    pub initial_delay: Duration,
    /// Cap on any single delay.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub backoff_multiplier: f64,
}

impl Default for EnableRetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl EnableRetryConfig {
    /// No waiting between fetches. Meant for tests against local mocks.
    #[must_use]
    pub const fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Delay to wait before re-fetch number `retry` (1-based).
    #[must_use]
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let scaled = self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        if !scaled.is_finite() || scaled >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(scaled.max(0.0))
    }
}

/// Configuration for [`crate::ManagementClient`].
///
/// # Examples
///
/// ```
/// use apim_sas_client::ClientConfig;
///
/// let config = ClientConfig::default().with_timeout(15);
/// assert_eq!(config.timeout_seconds, 15);
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Total timeout applied to every request.
    pub timeout_seconds: u64,
    /// Timeout for establishing a connection.
    pub connect_timeout_seconds: u64,
    /// Backoff used while waiting for git access to become enabled.
    pub enable_retry: EnableRetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            connect_timeout_seconds: 10,
            enable_retry: EnableRetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Sets the connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, connect_timeout_seconds: u64) -> Self {
        self.connect_timeout_seconds = connect_timeout_seconds;
        self
    }

    /// Sets the git enable backoff.
    #[must_use]
    pub fn with_enable_retry(mut self, enable_retry: EnableRetryConfig) -> Self {
        self.enable_retry = enable_retry;
        self
    }
}
