// Public API - what other modules can use
pub use errors::{RegistryError, TokenError};
pub use issuer::TokenIssuer;
pub use models::{refresh_token_id, AccessClaims, RefreshToken, TokenPair};
pub use registry::{InMemoryTokenRegistry, PostgresTokenRegistry, TokenRegistry};
pub use sweeper::{start_sweep_task, SweepConfig};

// Internal modules
mod errors;
pub mod issuer;
pub mod models;
pub mod registry;
pub mod sweeper;
