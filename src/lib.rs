// Library crate for the authgate service
// This file exposes the public API for integration tests

pub mod app;
pub mod config;
pub mod session;
pub mod shared;
pub mod token;
pub mod user;

// Re-export commonly used types for easier access in tests
pub use app::{build_router, build_state, Stores};
pub use config::{AuthConfig, TokenConfig};
pub use session::{RevocationPolicy, SessionService};
pub use shared::{AppError, AppState};
