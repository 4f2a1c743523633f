//! Third-party account linking handshake
//!
//! The one subsystem in Scoutdeck with real coordination: two independent
//! execution contexts racing and signaling each other.
//!
//! - The **opener context** is the [`HandshakeCoordinator`]: it mints an
//!   authorization request through the backend, registers its completion
//!   listener, opens the secondary browsing context at the provider's
//!   authorization URL, and owns the connecting / connected / failed state
//!   machine.
//! - The **popup context** is the [`CallbackServer`]'s redirect handler: it
//!   parses the provider redirect, exchanges the code with the backend,
//!   renders a terminal page, and signals the opener over the cross-context
//!   channel.
//!
//! The contexts share no memory. The channel is asynchronous and best-effort:
//! a signal fired after the opener deregistered (or never fired at all, when
//! the user closes the popup) is simply lost, and the opener stays in
//! `AwaitingAuthorization` until the user retries.

pub mod callback;
pub mod coordinator;
pub mod messages;
pub mod pages;
pub mod starter;

pub use callback::{CallbackParameters, CallbackServer};
pub use coordinator::{
    CoordinatorOptions, HandshakeCoordinator, HandshakeState, LoggingNavigator, Navigator,
    PopupLauncher, SystemBrowserLauncher,
};
pub use messages::{CrossContextMessage, OpenerSignal};
pub use starter::AuthorizationStarter;
