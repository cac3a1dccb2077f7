// Public API - what other modules can use
pub use errors::CredentialError;
pub use models::{PublicIdentity, UserIdentity};
pub use password::{CredentialHasher, CredentialPolicy};
pub use repository::{InMemoryUserRepository, PostgresUserRepository, UserRepository};
pub use service::CredentialStore;

// Internal modules
mod errors;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
