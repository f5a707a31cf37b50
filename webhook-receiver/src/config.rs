//! Configuration module for environment variable parsing.
//!
//! All settings come from the process environment and are read once at
//! startup. Nothing here is mutated afterwards.

use std::env;
use std::time::Duration;

use tracing::warn;

/// Default request body cap for JSON routes (1 MB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Default hard deadline for draining in-flight requests.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on (0 = OS-assigned)
    pub port: u16,

    /// Shared secret for `X-Hub-Signature-256` verification.
    /// `None` disables verification entirely (dev mode).
    pub webhook_secret: Option<String>,

    /// Maximum accepted request body size in bytes
    pub max_body_bytes: usize,

    /// How long in-flight requests may drain before the process is forced down
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 80,
            webhook_secret: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            shutdown_timeout: DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            port: parse_var("PORT", defaults.port),

            webhook_secret: normalize_secret(env::var("WEBHOOK_SECRET").ok()),

            max_body_bytes: parse_var("MAX_BODY_BYTES", defaults.max_body_bytes),

            shutdown_timeout: Duration::from_secs(parse_var(
                "SHUTDOWN_TIMEOUT_SECS",
                defaults.shutdown_timeout.as_secs(),
            )),
        }
    }

    /// Whether inbound webhooks must carry a valid signature.
    pub fn signature_verification_enabled(&self) -> bool {
        self.webhook_secret.is_some()
    }

    /// The configured secret, if verification is enabled.
    pub fn secret(&self) -> Option<&str> {
        self.webhook_secret.as_deref()
    }
}

/// Treat an empty or whitespace-only secret as no secret at all.
fn normalize_secret(raw: Option<String>) -> Option<String> {
    raw.filter(|s| !s.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when it is unset
/// or unparsable.
fn parse_var<T>(name: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return default,
    };

    match raw.trim().parse::<T>() {
        Ok(value) => value,
        Err(_) => {
            warn!(env_var = name, value = %raw, "Invalid value, using default");
            default
        }
    }
}
