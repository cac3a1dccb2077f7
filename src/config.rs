use chrono::Duration;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Minimum signing key length accepted for HS256
pub const MIN_SIGNING_KEY_BYTES: usize = 32;

const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;
const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;
const DEFAULT_MIN_CREDENTIAL_LENGTH: usize = 6;
const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Signing material and lifetimes for issued tokens
#[derive(Clone)]
pub struct TokenConfig {
    signing_key: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl TokenConfig {
    pub fn new(
        signing_key: String,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Result<Self, ConfigError> {
        if signing_key.len() < MIN_SIGNING_KEY_BYTES {
            return Err(ConfigError::Invalid {
                key: "JWT_SECRET",
                reason: format!("must be at least {} bytes", MIN_SIGNING_KEY_BYTES),
            });
        }
        if access_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                key: "ACCESS_TOKEN_TTL_SECS",
                reason: "must be positive".to_string(),
            });
        }
        if refresh_ttl <= Duration::zero() {
            return Err(ConfigError::Invalid {
                key: "REFRESH_TOKEN_TTL_SECS",
                reason: "must be positive".to_string(),
            });
        }

        Ok(Self {
            signing_key,
            access_ttl,
            refresh_ttl,
        })
    }

    pub fn signing_key(&self) -> &[u8] {
        self.signing_key.as_bytes()
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("signing_key", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

/// Process-wide configuration, supplied through the environment
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub token: TokenConfig,
    pub strict_revocation: bool,
    pub min_credential_length: usize,
    pub sweep_interval: std::time::Duration,
    pub bind_addr: SocketAddr,
    pub database_url: Option<String>,
}

impl AuthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let signing_key = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let access_ttl = parse_or(&lookup, "ACCESS_TOKEN_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl = parse_or(&lookup, "REFRESH_TOKEN_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?;

        let token = TokenConfig::new(
            signing_key,
            Duration::seconds(access_ttl),
            Duration::seconds(refresh_ttl),
        )?;

        let min_credential_length = parse_or(
            &lookup,
            "MIN_CREDENTIAL_LENGTH",
            DEFAULT_MIN_CREDENTIAL_LENGTH,
        )?;
        if min_credential_length == 0 {
            return Err(ConfigError::Invalid {
                key: "MIN_CREDENTIAL_LENGTH",
                reason: "must be at least 1".to_string(),
            });
        }

        let sweep_secs = parse_or(
            &lookup,
            "REGISTRY_SWEEP_INTERVAL_SECS",
            DEFAULT_SWEEP_INTERVAL_SECS,
        )?;
        if sweep_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "REGISTRY_SWEEP_INTERVAL_SECS",
                reason: "must be at least 1".to_string(),
            });
        }

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        Ok(Self {
            token,
            strict_revocation: parse_bool(&lookup, "STRICT_REVOCATION")?,
            min_credential_length,
            sweep_interval: std::time::Duration::from_secs(sweep_secs),
            bind_addr,
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool<F>(lookup: &F, key: &'static str) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).as_deref().map(str::trim) {
        None | Some("") => Ok(false),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") => Ok(true),
        Some("0") | Some("false") | Some("FALSE") | Some("no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("expected a boolean, got {:?}", other),
        }),
    }
}
