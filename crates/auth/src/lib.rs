//! `larder-auth` — session ownership and identity-provider boundary.
//!
//! This crate is intentionally decoupled from storage: concrete providers
//! (local credential list, hosted identity service) live in `larder-infra`.

pub mod controller;
pub mod provider;
pub mod session;

pub use controller::{AuthController, AuthState};
pub use provider::{AuthError, IdentityProvider};
pub use session::{ProfilePatch, UserSession};
