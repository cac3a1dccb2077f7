// Public API - what other modules can use
pub use handlers::{current_user, health, login, logout, refresh_token, register};
pub use middleware::{authorize_request, bearer_token, require_access_token};
pub use service::{RevocationPolicy, SessionService};
pub use state::{transition, Session, SessionError, SessionEvent, SessionState};
pub use types::{
    LoginRequest, LoginResponse, LogoutRequest, RefreshRequest, RefreshResponse, RegisterRequest,
};

// Internal modules
mod handlers;
mod middleware;
pub mod service;
pub mod state;
mod types;
