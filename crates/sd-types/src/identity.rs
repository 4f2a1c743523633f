//! Backend-owned records the dashboard reads or patches
//!
//! None of these are fabricated client-side: a `LinkedIdentity` only ever
//! enters the program as backend JSON after a confirmed exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One-time authorization request minted by the backend.
///
/// Held only in memory for the duration of a single handshake attempt; the
/// backend is the sole owner of redeem-at-most-once semantics for `state`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizationRequest {
    /// Provider URL the popup navigates to.
    pub authorization_url: String,

    /// Opaque correlation token, round-tripped through the provider.
    pub state: String,
}

/// A provider account linked to the signed-in user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedIdentity {
    pub id: Uuid,

    /// Which provider this identity belongs to (e.g. "clipcast").
    pub provider_id: String,

    /// Username on the provider's side.
    pub external_username: String,

    #[serde(default)]
    pub display_name: Option<String>,

    pub is_active: bool,

    /// Opaque per-identity voice settings; owned by the backend.
    #[serde(default)]
    pub voice_config: serde_json::Value,

    pub created_at: DateTime<Utc>,
}

/// The signed-in user, as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Mutable subset of a `LinkedIdentity`. Only touched fields are serialized,
/// so a PATCH never clobbers fields the caller did not set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_config: Option<serde_json::Value>,
}
