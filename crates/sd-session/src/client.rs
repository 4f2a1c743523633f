//! Session-authenticated HTTP client for the scouting backend

use sd_types::{
    AppError, AppResult, AuthorizationRequest, CurrentUser, IdentityPatch, LinkedIdentity,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Error envelope the backend uses for 4xx/5xx responses.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: String,
}

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Envelope around the exchange response.
#[derive(Debug, Deserialize)]
struct IdentityEnvelope {
    identity: LinkedIdentity,
}

/// Backend gateway for all session-scoped calls.
///
/// Cheap to clone; clones share the cookie jar and the established-session
/// flag. Every operation except [`login`](Self::login) short-circuits with
/// [`AppError::Unauthenticated`] before any network call when no session has
/// been established.
#[derive(Debug, Clone)]
pub struct SessionClient {
    http: reqwest::Client,
    base_url: String,
    authenticated: Arc<AtomicBool>,
}

impl SessionClient {
    /// Create a client against the given backend base URL.
    pub fn new(base_url: impl Into<String>) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            authenticated: Arc::new(AtomicBool::new(false)),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Whether a session has been established (and not since invalidated).
    pub fn has_session(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn require_session(&self) -> AppResult<()> {
        if self.has_session() {
            Ok(())
        } else {
            Err(AppError::Unauthenticated)
        }
    }

    /// Sign in. On success the backend sets the httpOnly session cookie in
    /// the jar and subsequent calls carry it automatically.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<CurrentUser> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(&LoginRequest { email, password })
            .send()
            .await
            .map_err(transport)?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AppError::Unauthenticated);
        }
        if !response.status().is_success() {
            return Err(AppError::Session(non_success_detail(response).await));
        }

        let user: CurrentUser = response.json().await.map_err(transport)?;
        self.authenticated.store(true, Ordering::SeqCst);
        info!("Signed in as {}", user.email);
        Ok(user)
    }

    /// Sign out. The established flag is cleared even if the backend call
    /// fails; the next operation will short-circuit locally.
    pub async fn logout(&self) -> AppResult<()> {
        self.require_session()?;
        self.authenticated.store(false, Ordering::SeqCst);

        let response = self
            .http
            .post(self.url("/auth/logout"))
            .send()
            .await
            .map_err(transport)?;

        if !response.status().is_success() {
            warn!("Logout returned {}", response.status());
        }
        Ok(())
    }

    /// Who am I, per the backend.
    pub async fn current_user(&self) -> AppResult<CurrentUser> {
        self.require_session()?;
        let response = self
            .http
            .get(self.url("/auth/me"))
            .send()
            .await
            .map_err(transport)?;
        self.parse_json(response).await
    }

    /// All identities linked to the signed-in user.
    pub async fn list_identities(&self) -> AppResult<Vec<LinkedIdentity>> {
        self.require_session()?;
        let response = self
            .http
            .get(self.url("/identities"))
            .send()
            .await
            .map_err(transport)?;
        self.parse_json(response).await
    }

    /// Patch the mutable subset of an identity.
    pub async fn update_identity(
        &self,
        id: Uuid,
        patch: &IdentityPatch,
    ) -> AppResult<LinkedIdentity> {
        self.require_session()?;
        let response = self
            .http
            .patch(self.url(&format!("/identities/{id}")))
            .json(patch)
            .send()
            .await
            .map_err(transport)?;
        self.parse_json(response).await
    }

    /// Unlink an identity.
    pub async fn delete_identity(&self, id: Uuid) -> AppResult<()> {
        self.require_session()?;
        let response = self
            .http
            .delete(self.url(&format!("/identities/{id}")))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AppError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(AppError::Session(non_success_detail(response).await));
        }
        Ok(())
    }

    /// Ask the backend to mint a one-time authorization request.
    pub async fn start_authorization(
        &self,
        provider_id: &str,
    ) -> AppResult<AuthorizationRequest> {
        self.require_session()?;
        debug!("Requesting authorization start for provider {provider_id}");

        let response = self
            .http
            .post(self.url(&format!("/providers/{provider_id}/oauth/start")))
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AppError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(AppError::AuthorizationRequestFailed(
                non_success_detail(response).await,
            ));
        }

        response.json().await.map_err(transport)
    }

    /// Redeem a provider code/state pair for a linked identity. Runs at most
    /// once per redirect; single-use enforcement of `state` is the backend's.
    pub async fn exchange_authorization(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> AppResult<LinkedIdentity> {
        self.require_session()?;

        let response = self
            .http
            .get(self.url(&format!("/providers/{provider_id}/oauth/callback")))
            .query(&[("code", code), ("state", state)])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AppError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(AppError::ExchangeFailed(non_success_detail(response).await));
        }

        let envelope: IdentityEnvelope = response.json().await.map_err(transport)?;
        info!(
            "Exchange confirmed identity {} for provider {}",
            envelope.identity.external_username, provider_id
        );
        Ok(envelope.identity)
    }

    async fn parse_json<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> AppResult<T> {
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            self.authenticated.store(false, Ordering::SeqCst);
            return Err(AppError::Unauthenticated);
        }
        if !status.is_success() {
            return Err(AppError::Session(non_success_detail(response).await));
        }
        response.json().await.map_err(transport)
    }
}

fn transport(err: reqwest::Error) -> AppError {
    AppError::Transport(err.to_string())
}

/// Pull the backend `{detail}` envelope out of a non-success response, with
/// a status-line fallback when the body is not the expected shape.
async fn non_success_detail(response: reqwest::Response) -> String {
    let status = response.status();
    match response.json::<ErrorBody>().await {
        Ok(body) => body.detail,
        Err(_) => format!("backend returned {status}"),
    }
}
