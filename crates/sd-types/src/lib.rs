//! Shared types for Scoutdeck crates

pub mod errors;
pub mod identity;

pub use errors::{AppError, AppResult};
pub use identity::{AuthorizationRequest, CurrentUser, IdentityPatch, LinkedIdentity};
