//! Client configuration types.

use std::time::Duration;

use tandem_core::{DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT, KeyPolicy, TextEncoding};

/// Server certificate trust policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustPolicy {
    /// Validate server certificates against the Mozilla root store.
    #[default]
    Verify,
    /// Accept every server certificate without validation.
    ///
    /// Insecure: any server can impersonate any host. Only for pinned or
    /// internal environments where the network path is trusted.
    DangerAcceptAll,
}

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for plain requests.
    pub request_timeout: Duration,
    /// Timeout for requests carrying file attachments.
    pub upload_timeout: Duration,
    /// Connection timeout duration.
    pub connect_timeout: Duration,
    /// Maximum idle connections per host.
    pub pool_idle_per_host: usize,
    /// Idle connection timeout.
    pub pool_idle_timeout: Duration,
    /// Server certificate trust policy.
    pub trust_policy: TrustPolicy,
    /// How requests are keyed for coalescing.
    pub key_policy: KeyPolicy,
    /// Text encoding for multipart names and values.
    pub text_encoding: TextEncoding,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            trust_policy: TrustPolicy::Verify,
            key_policy: KeyPolicy::Url,
            text_encoding: TextEncoding::Utf8,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder {
    request_timeout: Option<Duration>,
    upload_timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    pool_idle_per_host: Option<usize>,
    pool_idle_timeout: Option<Duration>,
    trust_policy: Option<TrustPolicy>,
    key_policy: Option<KeyPolicy>,
    text_encoding: Option<TextEncoding>,
}

impl ClientConfigBuilder {
    /// Set the timeout for plain requests.
    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Set the timeout for uploads.
    #[must_use]
    pub const fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.upload_timeout = Some(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.pool_idle_per_host = Some(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = Some(timeout);
        self
    }

    /// Set the server certificate trust policy.
    #[must_use]
    pub const fn trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.trust_policy = Some(policy);
        self
    }

    /// Set the coalescing key policy.
    #[must_use]
    pub const fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = Some(policy);
        self
    }

    /// Set the multipart text encoding.
    #[must_use]
    pub const fn text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.text_encoding = Some(encoding);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        let defaults = ClientConfig::default();
        ClientConfig {
            request_timeout: self.request_timeout.unwrap_or(defaults.request_timeout),
            upload_timeout: self.upload_timeout.unwrap_or(defaults.upload_timeout),
            connect_timeout: self.connect_timeout.unwrap_or(defaults.connect_timeout),
            pool_idle_per_host: self
                .pool_idle_per_host
                .unwrap_or(defaults.pool_idle_per_host),
            pool_idle_timeout: self.pool_idle_timeout.unwrap_or(defaults.pool_idle_timeout),
            trust_policy: self.trust_policy.unwrap_or(defaults.trust_policy),
            key_policy: self.key_policy.unwrap_or(defaults.key_policy),
            text_encoding: self.text_encoding.unwrap_or(defaults.text_encoding),
        }
    }
}
