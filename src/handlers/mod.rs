// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod health;
mod metrics;
mod root;
mod user;
mod webauthn_authenticate;
mod webauthn_register;

// Core handlers
pub use health::health_check;
pub use metrics::metrics_handler;
pub use root::root_handler;

// Session handlers
pub use user::{logout, protected};

// WebAuthn registration handlers
pub use webauthn_register::{register_finish, register_start};

// WebAuthn authentication handlers
pub use webauthn_authenticate::{auth_finish, auth_start};
