//! Opener-side handshake state machine
//!
//! Owns the user-visible connecting / connected / failed state for one
//! linking flow. The coordinator never sees the popup directly once it is
//! open: the only way forward from `AwaitingAuthorization` is a completion
//! message on the cross-context channel. A popup closed by the user without
//! signaling leaves the coordinator waiting until the user retries; no
//! timeout is armed on the waiting state.

use crate::callback::CallbackServer;
use crate::messages::{CrossContextMessage, OpenerSignal};
use crate::starter::AuthorizationStarter;
use async_trait::async_trait;
use parking_lot::Mutex;
use sd_types::{AppError, AppResult, LinkedIdentity};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

/// Handshake phases. Front-end-only, scoped to one coordinator instance,
/// never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum HandshakeState {
    Idle,
    AwaitingAuthorization,
    Connected { identity: LinkedIdentity },
    Failed { message: String },
}

impl HandshakeState {
    pub fn is_awaiting(&self) -> bool {
        matches!(self, Self::AwaitingAuthorization)
    }
}

/// Opens the secondary browsing context at the provider's authorization URL.
#[async_trait]
pub trait PopupLauncher: Send + Sync {
    async fn open(&self, url: &str) -> AppResult<()>;
}

/// Production launcher: hands the URL to the system browser.
pub struct SystemBrowserLauncher;

#[async_trait]
impl PopupLauncher for SystemBrowserLauncher {
    async fn open(&self, url: &str) -> AppResult<()> {
        open::that(url).map_err(|e| AppError::Internal(format!("Failed to open browser: {e}")))
    }
}

/// Receives the post-connection navigation after the confirmation dwell.
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate(&self, view: &str);
}

/// Default navigator. The dashboard UI shell is out of scope here, so the
/// navigation intent is logged for whatever hosts the coordinator.
pub struct LoggingNavigator;

#[async_trait]
impl Navigator for LoggingNavigator {
    async fn navigate(&self, view: &str) {
        info!("Navigating to {}", view);
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    /// View navigated to after a confirmed connection.
    pub post_connect_view: String,

    /// Confirmation dwell before that navigation fires.
    pub confirmation_dwell: Duration,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            post_connect_view: "/identities".to_string(),
            confirmation_dwell: Duration::from_millis(1500),
        }
    }
}

/// One in-flight attempt: its routing key and its message pump.
struct Attempt {
    state_token: String,
    pump: tokio::task::JoinHandle<()>,
}

/// Coordinates one provider-linking handshake at a time.
pub struct HandshakeCoordinator {
    starter: AuthorizationStarter,
    callback_server: Arc<CallbackServer>,
    launcher: Arc<dyn PopupLauncher>,
    navigator: Arc<dyn Navigator>,
    options: CoordinatorOptions,
    state_tx: watch::Sender<HandshakeState>,
    attempt: Mutex<Option<Attempt>>,
}

impl HandshakeCoordinator {
    pub fn new(
        starter: AuthorizationStarter,
        callback_server: Arc<CallbackServer>,
        launcher: Arc<dyn PopupLauncher>,
        navigator: Arc<dyn Navigator>,
        options: CoordinatorOptions,
    ) -> Self {
        let (state_tx, _) = watch::channel(HandshakeState::Idle);
        Self {
            starter,
            callback_server,
            launcher,
            navigator,
            options,
            state_tx,
            attempt: Mutex::new(None),
        }
    }

    /// Current handshake state.
    pub fn state(&self) -> HandshakeState {
        self.state_tx.borrow().clone()
    }

    /// Subscribe to state transitions.
    pub fn subscribe(&self) -> watch::Receiver<HandshakeState> {
        self.state_tx.subscribe()
    }

    /// Start a handshake for a provider.
    ///
    /// Any in-flight attempt is superseded: its popup becomes orphaned and
    /// its eventual signal goes nowhere. The completion listener is
    /// registered before the popup is navigated, since ordering between the
    /// two contexts is otherwise unguaranteed.
    pub async fn connect(&self, provider_id: &str) -> AppResult<()> {
        self.clear_attempt();
        self.state_tx.send_replace(HandshakeState::Idle);

        let request = match self.starter.start(provider_id).await {
            Ok(request) => request,
            Err(e) => {
                // No partial state: a failed start leaves the machine Idle
                // with the alert surfaced to the caller.
                self.state_tx.send_replace(HandshakeState::Idle);
                return Err(e);
            }
        };

        let (signal, rx) = OpenerSignal::channel();
        self.callback_server
            .register_listener(&request.state, provider_id, signal);

        let pump = self.spawn_pump(rx);
        *self.attempt.lock() = Some(Attempt {
            state_token: request.state.clone(),
            pump,
        });

        self.state_tx
            .send_replace(HandshakeState::AwaitingAuthorization);

        if let Err(e) = self.launcher.open(&request.authorization_url).await {
            // The popup never opened, so nothing can ever signal back.
            warn!("Popup launch failed: {}", e);
            self.clear_attempt();
            self.state_tx.send_replace(HandshakeState::Failed {
                message: e.user_message(),
            });
            return Err(e);
        }

        info!("Awaiting authorization for provider {}", provider_id);
        Ok(())
    }

    /// Explicit user retry: back to `Idle`, orphaning any open popup.
    pub fn reset(&self) {
        self.clear_attempt();
        self.state_tx.send_replace(HandshakeState::Idle);
    }

    /// Drain the cross-context channel. The first valid completion message
    /// wins; duplicates and foreign values are dropped. Exactly one
    /// navigation is scheduled per connection, after the confirmation dwell.
    fn spawn_pump(
        &self,
        mut rx: mpsc::UnboundedReceiver<serde_json::Value>,
    ) -> tokio::task::JoinHandle<()> {
        let state_tx = self.state_tx.clone();
        let navigator = Arc::clone(&self.navigator);
        let view = self.options.post_connect_view.clone();
        let dwell = self.options.confirmation_dwell;

        tokio::spawn(async move {
            while let Some(raw) = rx.recv().await {
                let message: CrossContextMessage = match serde_json::from_value(raw) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("Ignoring message that is not a completion signal: {}", e);
                        continue;
                    }
                };

                let CrossContextMessage::OauthComplete { identity } = message;

                if matches!(&*state_tx.borrow(), HandshakeState::Connected { .. }) {
                    debug!("Duplicate completion signal ignored");
                    continue;
                }

                info!(
                    "Provider account {} confirmed connected",
                    identity.external_username
                );
                state_tx.send_replace(HandshakeState::Connected { identity });

                let navigator = Arc::clone(&navigator);
                let view = view.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(dwell).await;
                    navigator.navigate(&view).await;
                });
            }
        })
    }

    fn clear_attempt(&self) {
        if let Some(attempt) = self.attempt.lock().take() {
            attempt.pump.abort();
            self.callback_server.deregister_listener(&attempt.state_token);
            debug!("Handshake attempt deregistered");
        }
    }
}

impl Drop for HandshakeCoordinator {
    // The listener is global to the callback server; remove it so a
    // discarded coordinator does not leak handlers across navigations.
    fn drop(&mut self) {
        self.clear_attempt();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use sd_session::SessionClient;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct RecordingLauncher {
        opened: Mutex<Vec<String>>,
    }

    impl RecordingLauncher {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                opened: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl PopupLauncher for RecordingLauncher {
        async fn open(&self, url: &str) -> AppResult<()> {
            self.opened.lock().push(url.to_string());
            Ok(())
        }
    }

    struct RecordingNavigator {
        navigations: Mutex<Vec<String>>,
    }

    impl RecordingNavigator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                navigations: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Navigator for RecordingNavigator {
        async fn navigate(&self, view: &str) {
            self.navigations.lock().push(view.to_string());
        }
    }

    fn identity_value(username: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "3f7f5c20-52b4-4c55-91d1-1f5c3f1f0a11",
            "provider_id": "clipcast",
            "external_username": username,
            "is_active": true,
            "created_at": "2026-08-01T12:00:00Z"
        })
    }

    /// Fake backend: login, start (mints s1, s2, ... per call), exchange.
    async fn spawn_backend() -> String {
        let starts = Arc::new(AtomicUsize::new(0));
        let app = Router::new()
            .route(
                "/auth/login",
                post(|| async {
                    (
                        [(header::SET_COOKIE, "sd_session=t; Path=/")],
                        Json(serde_json::json!({
                            "id": "7c9e6679-7425-40de-944b-e07fc1f90ae7",
                            "email": "scout@example.com"
                        })),
                    )
                }),
            )
            .route(
                "/providers/{provider_id}/oauth/start",
                post(move || {
                    let starts = Arc::clone(&starts);
                    async move {
                        let n = starts.fetch_add(1, Ordering::SeqCst) + 1;
                        Json(serde_json::json!({
                            "authorization_url":
                                format!("https://provider.example/authorize?state=s{n}"),
                            "state": format!("s{n}")
                        }))
                    }
                }),
            )
            .route(
                "/providers/{provider_id}/oauth/callback",
                get(|| async { Json(serde_json::json!({"identity": identity_value("alice")})) }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn setup_coordinator(
        logged_in: bool,
    ) -> (
        HandshakeCoordinator,
        Arc<RecordingLauncher>,
        Arc<RecordingNavigator>,
        String,
    ) {
        let backend = spawn_backend().await;
        let session = SessionClient::new(&backend).unwrap();
        if logged_in {
            session.login("scout@example.com", "hunter2").await.unwrap();
        }

        let callback_server = Arc::new(CallbackServer::bind(0, session.clone()).await.unwrap());
        let callback_url = format!("http://{}/callback", callback_server.local_addr());

        let launcher = RecordingLauncher::new();
        let navigator = RecordingNavigator::new();
        let coordinator = HandshakeCoordinator::new(
            AuthorizationStarter::new(session),
            callback_server,
            Arc::clone(&launcher) as Arc<dyn PopupLauncher>,
            Arc::clone(&navigator) as Arc<dyn Navigator>,
            CoordinatorOptions {
                post_connect_view: "/identities".to_string(),
                confirmation_dwell: Duration::from_millis(100),
            },
        );

        (coordinator, launcher, navigator, callback_url)
    }

    async fn wait_for_connected(rx: &mut watch::Receiver<HandshakeState>) -> LinkedIdentity {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let HandshakeState::Connected { identity } = rx.borrow_and_update().clone() {
                    return identity;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("never reached Connected")
    }

    #[tokio::test]
    async fn test_connect_without_session_opens_no_popup() {
        let (coordinator, launcher, _navigator, _callback_url) = setup_coordinator(false).await;

        let err = coordinator.connect("clipcast").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthenticated));
        assert_eq!(coordinator.state(), HandshakeState::Idle);
        assert!(launcher.opened.lock().is_empty());
    }

    #[tokio::test]
    async fn test_successful_handshake_transitions_in_order() {
        let (coordinator, launcher, _navigator, callback_url) = setup_coordinator(true).await;
        let mut rx = coordinator.subscribe();

        assert_eq!(coordinator.state(), HandshakeState::Idle);
        coordinator.connect("clipcast").await.unwrap();
        assert_eq!(coordinator.state(), HandshakeState::AwaitingAuthorization);

        let opened = launcher.opened.lock().clone();
        assert_eq!(opened.len(), 1);
        assert!(opened[0].contains("provider.example/authorize"));

        // Act as the provider redirect into the popup context.
        let response = reqwest::get(format!("{callback_url}?code=c1&state=s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), 200);

        let identity = wait_for_connected(&mut rx).await;
        assert_eq!(identity.external_username, "alice");
    }

    #[tokio::test]
    async fn test_navigation_fires_once_after_dwell() {
        let (coordinator, _launcher, navigator, callback_url) = setup_coordinator(true).await;
        let mut rx = coordinator.subscribe();

        coordinator.connect("clipcast").await.unwrap();
        reqwest::get(format!("{callback_url}?code=c1&state=s1"))
            .await
            .unwrap();
        wait_for_connected(&mut rx).await;

        // Navigation is scheduled, not immediate.
        assert!(navigator.navigations.lock().is_empty());
        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(navigator.navigations.lock().clone(), vec!["/identities"]);
    }

    #[tokio::test]
    async fn test_duplicate_completion_signals_are_idempotent() {
        let (coordinator, _launcher, navigator, _callback_url) = setup_coordinator(true).await;

        // Drive the pump directly with a raw channel, as a popup would.
        let (signal, rx) = OpenerSignal::channel();
        let _pump = coordinator.spawn_pump(rx);
        coordinator
            .state_tx
            .send_replace(HandshakeState::AwaitingAuthorization);

        let message = serde_json::json!({
            "type": "oauth_complete",
            "identity": identity_value("alice")
        });
        signal.send_raw(message.clone());
        signal.send_raw(message.clone());
        signal.send_raw(message);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(matches!(
            coordinator.state(),
            HandshakeState::Connected { .. }
        ));
        assert_eq!(navigator.navigations.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_foreign_messages_are_ignored() {
        let (coordinator, _launcher, navigator, _callback_url) = setup_coordinator(true).await;

        let (signal, rx) = OpenerSignal::channel();
        let _pump = coordinator.spawn_pump(rx);
        coordinator
            .state_tx
            .send_replace(HandshakeState::AwaitingAuthorization);

        signal.send_raw(serde_json::json!({"type": "something_else"}));
        signal.send_raw(serde_json::json!(42));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(coordinator.state(), HandshakeState::AwaitingAuthorization);
        assert!(navigator.navigations.lock().is_empty());
    }

    #[tokio::test]
    async fn test_lost_signal_leaves_coordinator_waiting() {
        let (coordinator, _launcher, _navigator, _callback_url) = setup_coordinator(true).await;

        coordinator.connect("clipcast").await.unwrap();
        // The popup is "closed" without ever redirecting: nothing arrives.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(coordinator.state().is_awaiting());
    }

    #[tokio::test]
    async fn test_retry_supersedes_previous_attempt() {
        let (coordinator, _launcher, _navigator, callback_url) = setup_coordinator(true).await;
        let mut rx = coordinator.subscribe();

        coordinator.connect("clipcast").await.unwrap(); // mints s1
        coordinator.connect("clipcast").await.unwrap(); // mints s2, supersedes s1

        // The orphaned popup's redirect gets a page but signals no one.
        let response = reqwest::get(format!("{callback_url}?code=c1&state=s1"))
            .await
            .unwrap();
        assert_eq!(response.status(), 400);
        assert!(coordinator.state().is_awaiting());

        // The live attempt still completes.
        reqwest::get(format!("{callback_url}?code=c2&state=s2"))
            .await
            .unwrap();
        let identity = wait_for_connected(&mut rx).await;
        assert_eq!(identity.external_username, "alice");
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let (coordinator, _launcher, _navigator, _callback_url) = setup_coordinator(true).await;

        coordinator.connect("clipcast").await.unwrap();
        assert!(coordinator.state().is_awaiting());

        coordinator.reset();
        assert_eq!(coordinator.state(), HandshakeState::Idle);
    }

    struct FailingLauncher;

    #[async_trait]
    impl PopupLauncher for FailingLauncher {
        async fn open(&self, _url: &str) -> AppResult<()> {
            Err(AppError::Internal("popup blocked".to_string()))
        }
    }

    #[tokio::test]
    async fn test_popup_launch_failure_is_terminal() {
        let backend = spawn_backend().await;
        let session = SessionClient::new(&backend).unwrap();
        session.login("scout@example.com", "hunter2").await.unwrap();

        let callback_server = Arc::new(CallbackServer::bind(0, session.clone()).await.unwrap());
        let coordinator = HandshakeCoordinator::new(
            AuthorizationStarter::new(session),
            Arc::clone(&callback_server),
            Arc::new(FailingLauncher),
            Arc::new(LoggingNavigator),
            CoordinatorOptions::default(),
        );

        let err = coordinator.connect("clipcast").await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
        assert!(matches!(coordinator.state(), HandshakeState::Failed { .. }));
        // Nothing left registered for a popup that never opened.
        assert_eq!(callback_server.listener_count(), 0);
    }
}
