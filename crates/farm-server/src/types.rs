//! Shared types for the farm TCP server.
//!
//! This module defines:
//! - `ConnId`: a lightweight handle for accepted connections
//! - outbound channel aliases between the server and each client's writer
//! - `SessionEntry`: what the session registry holds per bound player

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::sync::Notify;

/// Identifier for an accepted connection.
///
/// This is intentionally opaque; we just guarantee uniqueness over the
/// lifetime of the process. It is what lets a late `unbind` recognize that
/// a newer connection has already taken over a player's session.
pub type ConnId = u64;

/// Outbound JSON lines queued for a single connection's writer task.
///
/// Lines are pre-encoded so one broadcast serializes its payload once.
pub type OutboundTx = mpsc::UnboundedSender<String>;
pub type OutboundRx = mpsc::UnboundedReceiver<String>;

/// The session registry's record of a bound player connection.
pub struct SessionEntry {
    pub conn_id: ConnId,
    pub outbound: OutboundTx,
    /// Fired to make the connection's reader loop exit (login eviction).
    pub shutdown: Arc<Notify>,
}
