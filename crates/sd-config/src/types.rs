//! Configuration types with per-field defaults
//!
//! Every field defaults individually so a hand-edited settings file only
//! needs the keys the user actually changed.

use serde::{Deserialize, Serialize};

fn default_backend_url() -> String {
    "http://127.0.0.1:8180".to_string()
}

fn default_callback_port() -> u16 {
    8177
}

fn default_post_connect_view() -> String {
    "/identities".to_string()
}

fn default_confirmation_dwell_ms() -> u64 {
    1500
}

/// Scoutdeck client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the scouting backend all requests are forwarded to.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    /// Local port the provider redirect lands on. The matching redirect URI
    /// is provisioned on the backend; the client only serves it.
    #[serde(default = "default_callback_port")]
    pub callback_port: u16,

    /// View the opener navigates to after a confirmed connection.
    #[serde(default = "default_post_connect_view")]
    pub post_connect_view: String,

    /// How long the opener shows the "connected" confirmation before
    /// navigating to the post-connection view, in milliseconds.
    #[serde(default = "default_confirmation_dwell_ms")]
    pub confirmation_dwell_ms: u64,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            callback_port: default_callback_port(),
            post_connect_view: default_post_connect_view(),
            confirmation_dwell_ms: default_confirmation_dwell_ms(),
        }
    }
}
