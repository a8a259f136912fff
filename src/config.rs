//! Shared store configuration.

/// Default session timeout: 30 days, in seconds.
pub const DEFAULT_SESSION_TIMEOUT: u64 = 30 * 24 * 60 * 60;

/// Default name of the session cookie.
pub const DEFAULT_COOKIE_NAME: &str = "sessionid";

/// Configuration shared by every [`SessionStore`](crate::store::SessionStore)
/// implementation: the expiry window and how the session cookie is written.
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Session timeout in seconds. Doubles as the cookie `Max-Age` and the
    /// backing store's expiry window.
    pub timeout_secs: u64,

    /// Name of the session cookie (default: `"sessionid"`).
    pub cookie_name: String,

    /// HttpOnly flag for the session cookie (default: true).
    pub http_only: bool,

    /// Secure flag for the session cookie (default: false).
    pub secure: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_SESSION_TIMEOUT,
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            http_only: true,
            secure: false,
        }
    }
}

impl StoreConfig {
    /// Create a configuration with the given timeout and default cookie flags.
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            timeout_secs,
            ..Default::default()
        }
    }

    /// Set the session timeout in seconds.
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Set the session cookie name (default: `"sessionid"`).
    pub fn with_cookie_name<S: Into<String>>(mut self, name: S) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Set the HttpOnly flag (default: true).
    pub fn with_http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    /// Set the Secure flag (default: false).
    pub fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }
}
