//! Backend gateway carrying the session cookie
//!
//! Every Scoutdeck request goes through the [`SessionClient`]: a reqwest
//! client with a cookie jar holding the httpOnly session cookie the backend
//! sets on login. The cookie value is never read or written by this crate;
//! the jar attaches it and the backend validates it.

mod client;

pub use client::SessionClient;
