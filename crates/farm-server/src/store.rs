//! Account store: the process-wide player registry.
//!
//! Players are indexed both by id and by lowercased name. Entries are only
//! ever touched through per-key operations; the two coin-mutating paths
//! (owner ops under the owner's farm lock, thief credits from someone
//! else's steal) both go through `adjust_coins`, which applies a closure
//! under the entry's own guard. Guards are never nested.

use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;

use farm_core::{GameError, Player, PlayerId};

pub struct AccountStore {
    players: DashMap<PlayerId, Player>,
    /// lowercased name -> id
    by_name: DashMap<String, PlayerId>,
    next_id: AtomicU32,
}

impl AccountStore {
    pub fn new() -> Self {
        AccountStore {
            players: DashMap::new(),
            by_name: DashMap::new(),
            next_id: AtomicU32::new(1),
        }
    }

    /// Register a new player. Name uniqueness is case-insensitive; the
    /// vacant-entry insert makes concurrent signups of the same name race
    /// safely.
    pub fn signup(&self, username: &str, password: &str) -> Result<Player, GameError> {
        let key = username.to_lowercase();
        match self.by_name.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GameError::NameTaken),
            dashmap::mapref::entry::Entry::Vacant(vacant) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let player = Player::new(id, username, password);
                self.players.insert(id, player.clone());
                vacant.insert(id);
                Ok(player)
            }
        }
    }

    /// Look up by name and check the credential.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Player, GameError> {
        let id = self
            .by_name
            .get(&username.to_lowercase())
            .map(|entry| *entry)
            .ok_or(GameError::UnknownPlayer)?;
        let player = self.players.get(&id).ok_or(GameError::UnknownPlayer)?;
        if !player.password_matches(password) {
            return Err(GameError::WrongPassword);
        }
        Ok(player.clone())
    }

    pub fn contains(&self, id: PlayerId) -> bool {
        self.players.contains_key(&id)
    }

    pub fn get(&self, id: PlayerId) -> Option<Player> {
        self.players.get(&id).map(|p| p.clone())
    }

    pub fn name_of(&self, id: PlayerId) -> Option<String> {
        self.players.get(&id).map(|p| p.name.clone())
    }

    pub fn coins(&self, id: PlayerId) -> Option<u32> {
        self.players.get(&id).map(|p| p.coins)
    }

    /// Apply a balance update atomically for this entry and return the new
    /// balance.
    pub fn adjust_coins(&self, id: PlayerId, f: impl FnOnce(u32) -> u32) -> Option<u32> {
        self.players.get_mut(&id).map(|mut p| {
            p.coins = f(p.coins);
            p.coins
        })
    }

    /// Install a player loaded from a snapshot, keeping id allocation ahead
    /// of every loaded id.
    pub fn insert_loaded(&self, player: Player) {
        self.next_id.fetch_max(player.id + 1, Ordering::Relaxed);
        self.by_name.insert(player.name.to_lowercase(), player.id);
        self.players.insert(player.id, player);
    }

    /// Current players, for snapshot serialization. Sorted by id so the
    /// on-disk document is stable across flushes.
    pub fn snapshot(&self) -> Vec<Player> {
        let mut players: Vec<Player> = self.players.iter().map(|e| e.value().clone()).collect();
        players.sort_by_key(|p| p.id);
        players
    }
}
