//! Authentication
//!
//! Handles:
//! - Session token verification
//! - Authentication middleware and extractors

mod middleware;
pub mod session;

pub use middleware::{CurrentUser, MaybeUser, SESSION_TOKEN_COOKIE, require_auth};
pub use session::{Session, create_session_token, verify_session_token};
