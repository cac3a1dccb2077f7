use thiserror::Error;

/// Failures validating or minting access tokens
#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,

    #[error("Token signature or format is invalid")]
    Tampered,

    #[error("Failed to encode token: {0}")]
    Encoding(String),
}

/// Failures reported by the refresh token registry
#[derive(Debug, Error, PartialEq)]
pub enum RegistryError {
    #[error("Refresh token not found")]
    NotFound,

    #[error("Refresh token already revoked")]
    AlreadyRevoked,

    #[error("Registry storage error: {0}")]
    Storage(String),
}
