//! Authentication module

pub mod credential;
pub mod session;

pub use credential::CredentialStore;
pub use session::{SessionStore, UserSession};

/// The single administrative account name
pub const ADMIN_USERNAME: &str = "admin";
