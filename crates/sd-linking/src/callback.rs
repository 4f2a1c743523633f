//! Local redirect target for the provider authorization popup
//!
//! This is the popup context: the provider redirects the secondary browsing
//! context here after the user authorizes (or denies). The handler parses the
//! redirect parameters, performs the backend exchange, renders a terminal
//! page, and signals the opener. Listeners are registered per handshake
//! attempt and routed by the opaque state token, so a redirect from an
//! orphaned or superseded popup still gets a page but signals no one.

use crate::messages::{CrossContextMessage, OpenerSignal};
use crate::pages;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use parking_lot::Mutex;
use sd_session::SessionClient;
use sd_types::{AppError, AppResult};
use serde::Deserialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How long the connected page waits before closing its own window, in ms.
/// Mirrored by the opener's dwell before navigating.
pub const POPUP_CLOSE_DELAY_MS: u64 = 1500;

/// Query parameters on the redirect. Exactly one of `{code + state}` or
/// `error` is expected; absence of both is a protocol violation.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParameters {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// A completion listener registered for one handshake attempt.
struct AttemptListener {
    provider_id: String,
    signal: OpenerSignal,
}

struct ServerShared {
    session: SessionClient,
    /// Listeners keyed by the expected state token. Consumed on match.
    listeners: Mutex<HashMap<String, AttemptListener>>,
}

/// Hosts `GET /callback` on loopback for the lifetime of the process.
///
/// One server handles any number of sequential (or racing) handshake
/// attempts; each attempt registers its own listener and the redirect is
/// routed by state token.
pub struct CallbackServer {
    shared: Arc<ServerShared>,
    local_addr: SocketAddr,
}

impl CallbackServer {
    /// Bind `127.0.0.1:{port}` and serve the redirect target in the
    /// background. Port 0 picks an ephemeral port.
    pub async fn bind(port: u16, session: SessionClient) -> AppResult<Self> {
        let shared = Arc::new(ServerShared {
            session,
            listeners: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/callback", get(handle_callback))
            .with_state(Arc::clone(&shared));

        let addr = format!("127.0.0.1:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            AppError::Internal(format!("Failed to bind callback server on {addr}: {e}"))
        })?;
        let local_addr = listener.local_addr()?;

        info!("Callback server listening on http://{}/callback", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Callback server error: {}", e);
            }
        });

        Ok(Self { shared, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Register the completion listener for an attempt. Re-registering the
    /// same state token supersedes the previous listener.
    pub fn register_listener(&self, expected_state: &str, provider_id: &str, signal: OpenerSignal) {
        let mut listeners = self.shared.listeners.lock();
        if listeners
            .insert(
                expected_state.to_string(),
                AttemptListener {
                    provider_id: provider_id.to_string(),
                    signal,
                },
            )
            .is_some()
        {
            warn!("Superseded an existing listener for the same attempt");
        }
        debug!("Listener registered for provider {}", provider_id);
    }

    /// Remove an attempt's listener. Any later redirect for it renders a
    /// failure page and signals no one.
    pub fn deregister_listener(&self, expected_state: &str) {
        if self
            .shared
            .listeners
            .lock()
            .remove(expected_state)
            .is_some()
        {
            debug!("Listener deregistered");
        }
    }

    pub fn listener_count(&self) -> usize {
        self.shared.listeners.lock().len()
    }
}

async fn handle_callback(
    State(shared): State<Arc<ServerShared>>,
    Query(params): Query<CallbackParameters>,
) -> Response {
    // Provider returned an error parameter: terminal, no backend call.
    if let Some(code) = params.error {
        warn!("Provider denied authorization: {}", code);
        let message = AppError::ProviderDenied(code).user_message();
        return (StatusCode::BAD_REQUEST, Html(pages::failed_page(&message))).into_response();
    }

    // Both code and state are required when no error is present.
    let (code, state) = match (params.code, params.state) {
        (Some(code), Some(state)) => (code, state),
        _ => {
            warn!("Redirect missing authorization code or state");
            return (
                StatusCode::BAD_REQUEST,
                Html(pages::failed_page("missing authorization code or state")),
            )
                .into_response();
        }
    };

    // Route to the registered attempt. The listener is consumed here: a
    // second redirect with the same token belongs to no one.
    let listener = shared.listeners.lock().remove(&state);
    let Some(listener) = listener else {
        warn!("Redirect for an unknown or superseded authorization attempt");
        return (
            StatusCode::BAD_REQUEST,
            Html(pages::failed_page(
                "unknown or expired authorization attempt",
            )),
        )
            .into_response();
    };

    // Exchange the code/state pair with the backend. Exactly once per
    // redirect; single-use enforcement is the backend's.
    match shared
        .session
        .exchange_authorization(&listener.provider_id, &code, &state)
        .await
    {
        Ok(identity) => {
            info!(
                "Linked {} account {}",
                listener.provider_id, identity.external_username
            );
            let page = pages::connected_page(&identity.external_username, POPUP_CLOSE_DELAY_MS);
            listener
                .signal
                .send(&CrossContextMessage::OauthComplete { identity });
            (StatusCode::OK, Html(page)).into_response()
        }
        Err(e) => {
            error!(
                "Exchange failed for provider {}: {}",
                listener.provider_id, e
            );
            (
                StatusCode::BAD_REQUEST,
                Html(pages::failed_page(&e.user_message())),
            )
                .into_response()
        }
    }
}
