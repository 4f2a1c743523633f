//! CLI argument parsing for the Scoutdeck shell
//!
//! The session cookie lives in an in-memory jar, so commands that need a
//! session take credentials and sign in for the duration of the run.

use clap::{Parser, Subcommand};
use uuid::Uuid;

/// Scoutdeck - dashboard client for the scouting backend
#[derive(Parser, Debug)]
#[command(name = "scoutdeck")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Sign in and verify the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Link a third-party provider account
    ///
    /// Opens the provider's authorization page in your browser and waits for
    /// the handshake to complete.
    Link {
        /// Provider to link (e.g. clipcast)
        provider_id: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },

    /// Manage linked identities
    Identities {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[command(subcommand)]
        command: IdentitiesCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum IdentitiesCommand {
    /// List linked identities
    List,

    /// Update an identity's mutable fields
    Update {
        id: Uuid,

        #[arg(long)]
        display_name: Option<String>,

        /// Mark the identity active
        #[arg(long, conflicts_with = "deactivate")]
        activate: bool,

        /// Mark the identity inactive
        #[arg(long)]
        deactivate: bool,
    },

    /// Unlink an identity
    Delete { id: Uuid },
}
