//! Cross-context completion signaling
//!
//! The popup and its opener communicate only through this channel. It carries
//! raw JSON values rather than typed messages: the original broadcast is not
//! origin-restricted, so the receiving side must validate the shape and the
//! `type` discriminator and drop everything else.

use sd_types::LinkedIdentity;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// The only payload shape the opener trusts as a completion signal.
///
/// Wire shape: `{"type": "oauth_complete", "identity": { ... }}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CrossContextMessage {
    OauthComplete { identity: LinkedIdentity },
}

/// Sending half handed to the popup context.
///
/// Delivery is best-effort and at-most-once-observed: if the opener has
/// deregistered its listener (retry superseded the attempt, coordinator was
/// dropped) the message goes nowhere, silently.
#[derive(Debug, Clone)]
pub struct OpenerSignal {
    tx: mpsc::UnboundedSender<serde_json::Value>,
}

impl OpenerSignal {
    /// Create a signal/listener pair for one handshake attempt.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Signal completion to the opener, if it is still listening.
    pub fn send(&self, message: &CrossContextMessage) {
        match serde_json::to_value(message) {
            Ok(value) => self.send_raw(value),
            Err(e) => warn!("Could not serialize completion message: {}", e),
        }
    }

    /// Send an arbitrary JSON value. This is the raw broadcast surface; the
    /// opener is expected to ignore values that are not a completion message.
    pub fn send_raw(&self, value: serde_json::Value) {
        if self.tx.send(value).is_err() {
            debug!("Completion signal dropped: opener is no longer listening");
        }
    }
}
