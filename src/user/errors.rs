use thiserror::Error;

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("An account with identifier {0:?} already exists")]
    DuplicateIdentity(String),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    #[error("No account found for the given identifier")]
    NotFound,

    #[error("Credential does not match")]
    CredentialMismatch,

    #[error("Hashing error: {0}")]
    Hashing(String),

    #[error("Storage error: {0}")]
    Storage(String),
}
