//! Scoutdeck client shell
//!
//! Headless front end for the scouting backend: sign in, link provider
//! accounts, and manage linked identities from the terminal. The dashboard's
//! list/search views live elsewhere; this binary exists to drive the
//! handshake and the identity passthroughs end to end.

mod cli;

use anyhow::Context;
use clap::Parser;
use cli::{Cli, Command, IdentitiesCommand};
use sd_linking::{
    AuthorizationStarter, CallbackServer, CoordinatorOptions, HandshakeCoordinator,
    HandshakeState, LoggingNavigator, SystemBrowserLauncher,
};
use sd_session::SessionClient;
use sd_types::IdentityPatch;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = sd_config::load()?;
    let session = SessionClient::new(&config.backend_url)?;

    match cli.command {
        Command::Login { email, password } => {
            let user = session.login(&email, &password).await?;
            println!("Signed in as {}", user.email);
        }
        Command::Link {
            provider_id,
            email,
            password,
        } => {
            session.login(&email, &password).await?;
            link(&config, session, &provider_id).await?;
        }
        Command::Identities {
            email,
            password,
            command,
        } => {
            session.login(&email, &password).await?;
            identities(session, command).await?;
        }
    }

    Ok(())
}

/// Run one full handshake: mint, open the browser, wait for the completion
/// signal. A popup closed without signaling leaves us waiting; Ctrl-C is the
/// cancel affordance in that case.
async fn link(
    config: &sd_config::DashboardConfig,
    session: SessionClient,
    provider_id: &str,
) -> anyhow::Result<()> {
    let callback_server = Arc::new(
        CallbackServer::bind(config.callback_port, session.clone())
            .await
            .context("callback server failed to start")?,
    );

    let coordinator = HandshakeCoordinator::new(
        AuthorizationStarter::new(session),
        callback_server,
        Arc::new(SystemBrowserLauncher),
        Arc::new(LoggingNavigator),
        CoordinatorOptions {
            post_connect_view: config.post_connect_view.clone(),
            confirmation_dwell: Duration::from_millis(config.confirmation_dwell_ms),
        },
    );

    let mut states = coordinator.subscribe();
    coordinator.connect(provider_id).await?;
    println!("Complete the authorization in your browser (Ctrl-C to give up)...");

    loop {
        states.changed().await?;
        match states.borrow_and_update().clone() {
            HandshakeState::Connected { identity } => {
                println!(
                    "Connected {} account {}",
                    identity.provider_id, identity.external_username
                );
                break;
            }
            HandshakeState::Failed { message } => {
                anyhow::bail!("connection failed: {message}");
            }
            _ => {}
        }
    }

    Ok(())
}

async fn identities(session: SessionClient, command: IdentitiesCommand) -> anyhow::Result<()> {
    match command {
        IdentitiesCommand::List => {
            let identities = session.list_identities().await?;
            if identities.is_empty() {
                println!("No linked identities");
            }
            for identity in identities {
                println!(
                    "{}  {:<12} {:<24} {}",
                    identity.id,
                    identity.provider_id,
                    identity.external_username,
                    if identity.is_active { "active" } else { "inactive" }
                );
            }
        }
        IdentitiesCommand::Update {
            id,
            display_name,
            activate,
            deactivate,
        } => {
            let patch = IdentityPatch {
                display_name,
                is_active: match (activate, deactivate) {
                    (true, false) => Some(true),
                    (false, true) => Some(false),
                    _ => None,
                },
                voice_config: None,
            };
            let updated = session.update_identity(id, &patch).await?;
            println!(
                "Updated {} ({})",
                updated.external_username,
                if updated.is_active { "active" } else { "inactive" }
            );
        }
        IdentitiesCommand::Delete { id } => {
            session.delete_identity(id).await?;
            println!("Deleted identity {id}");
        }
    }
    Ok(())
}
