//! Postfeed: client core for the posts/comments feed service.
//!
//! ARCHITECTURE
//! ============
//! `net` owns the wire: DTOs, endpoint paths, and the authenticated HTTP
//! gateway. `state` owns what the client remembers: the signed-in session,
//! the logout signal, durable storage, and the paginated feed. `util` holds
//! small presentation helpers shared by the CLI and any other front end.
//!
//! The gateway never holds a reference to the session. When the backend
//! rejects a credential the gateway publishes on [`state::events::AuthEvents`]
//! and the session, subscribed for its own lifetime, clears itself.

pub mod config;
pub mod net;
pub mod state;
pub mod util;

#[cfg(test)]
pub(crate) mod test_helpers;
