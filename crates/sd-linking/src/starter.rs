//! Authorization request minting

use sd_session::SessionClient;
use sd_types::{AppResult, AuthorizationRequest};
use tracing::info;

/// Asks the backend to mint a one-time authorization request for a provider.
///
/// The backend owns the state token and builds the authorization URL; the
/// request is held only in memory and handed straight to the coordinator.
/// Without an established session this fails with `Unauthenticated` before
/// any network call.
#[derive(Debug, Clone)]
pub struct AuthorizationStarter {
    session: SessionClient,
}

impl AuthorizationStarter {
    pub fn new(session: SessionClient) -> Self {
        Self { session }
    }

    pub async fn start(&self, provider_id: &str) -> AppResult<AuthorizationRequest> {
        let request = self.session.start_authorization(provider_id).await?;
        info!("Authorization request minted for provider {}", provider_id);
        Ok(request)
    }
}
