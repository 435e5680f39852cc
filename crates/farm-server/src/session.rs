//! Session registry: player id -> live connection.
//!
//! At most one connection holds a player id at a time. A newer login
//! displaces the old connection: it gets a best-effort INFO notice and its
//! reader loop is told to exit. Teardown unbinds only when the registry
//! still points at the same connection, so a slow disconnect can never
//! knock out the session that replaced it.

use dashmap::DashMap;

use farm_core::PlayerId;
use farm_protocol::Info;

use crate::types::{ConnId, SessionEntry};

pub struct SessionRegistry {
    entries: DashMap<PlayerId, SessionEntry>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        SessionRegistry {
            entries: DashMap::new(),
        }
    }

    /// Install `entry` as the sole connection for `player_id`. Returns true
    /// when an older connection was displaced. A repeat login on the same
    /// connection just refreshes the entry.
    pub fn bind(&self, player_id: PlayerId, entry: SessionEntry) -> bool {
        let new_conn = entry.conn_id;
        let old = self.entries.insert(player_id, entry);
        match old {
            Some(old) if old.conn_id != new_conn => {
                if let Ok(line) = serde_json::to_string(&Info::relogin()) {
                    let _ = old.outbound.send(line);
                }
                old.shutdown.notify_one();
                true
            }
            _ => false,
        }
    }

    /// Presence check: gates steals and reports `ownerOnline` on visits.
    pub fn is_online(&self, player_id: PlayerId) -> bool {
        self.entries.contains_key(&player_id)
    }

    /// Remove the binding, but only if it still belongs to `conn_id`.
    /// Returns true when an entry was actually removed.
    pub fn unbind(&self, player_id: PlayerId, conn_id: ConnId) -> bool {
        self.entries
            .remove_if(&player_id, |_, entry| entry.conn_id == conn_id)
            .is_some()
    }

    /// Best-effort push of a pre-encoded line. A closed or missing
    /// connection is silently skipped.
    pub fn send_to(&self, player_id: PlayerId, line: &str) {
        if let Some(entry) = self.entries.get(&player_id) {
            let _ = entry.outbound.send(line.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::sync::{mpsc, Notify};

    fn entry(conn_id: ConnId) -> (SessionEntry, crate::types::OutboundRx) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            SessionEntry {
                conn_id,
                outbound: tx,
                shutdown: Arc::new(Notify::new()),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn rebind_notifies_and_displaces_the_old_connection() {
        let registry = SessionRegistry::new();
        let (first, mut first_rx) = entry(1);
        let notified = first.shutdown.clone();

        assert!(!registry.bind(7, first));
        let (second, _second_rx) = entry(2);
        assert!(registry.bind(7, second));

        let line = first_rx.recv().await.unwrap();
        assert!(line.contains("relogin"));
        // The permit is stored even though nobody was awaiting yet.
        notified.notified().await;
    }

    #[test]
    fn stale_unbind_does_not_remove_a_newer_binding() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = entry(1);
        registry.bind(7, first);
        let (second, _rx2) = entry(2);
        registry.bind(7, second);

        // The first connection's teardown arrives late.
        assert!(!registry.unbind(7, 1));
        assert!(registry.is_online(7));

        assert!(registry.unbind(7, 2));
        assert!(!registry.is_online(7));
    }

    #[test]
    fn rebinding_the_same_connection_is_not_an_eviction() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = entry(1);
        registry.bind(7, first);
        let (again, _rx2) = entry(1);
        assert!(!registry.bind(7, again));
        assert!(registry.is_online(7));
    }

    #[test]
    fn send_to_unknown_player_is_a_no_op() {
        let registry = SessionRegistry::new();
        registry.send_to(99, "{}");
    }
}
