//! Friend graph and viewer registry.
//!
//! Friendship is a symmetric relation inserted as two per-key operations;
//! a reader can observe one direction for an instant, but the final state
//! always converges. Removal does not exist in this design.
//!
//! The viewer registry tracks who is currently looking at which farm:
//! `watching` maps a viewer to the single farm it observes (possibly its
//! own), `viewers` maps an owner to the set of other players observing it.
//! Broadcast targeting reads `viewers`; visits and disconnects keep the
//! two sides in step.

use std::collections::HashSet;

use dashmap::DashMap;

use farm_core::{GameError, PlayerId};

pub struct SocialGraph {
    friends: DashMap<PlayerId, HashSet<PlayerId>>,
    /// owner -> viewers currently on that farm (never contains the owner)
    viewers: DashMap<PlayerId, HashSet<PlayerId>>,
    /// viewer -> farm currently viewed
    watching: DashMap<PlayerId, PlayerId>,
}

impl SocialGraph {
    pub fn new() -> Self {
        SocialGraph {
            friends: DashMap::new(),
            viewers: DashMap::new(),
            watching: DashMap::new(),
        }
    }

    /// Make sure a friend-set entry exists for a player (signup/login).
    pub fn ensure_entry(&self, id: PlayerId) {
        self.friends.entry(id).or_default();
    }

    /// Insert the symmetric friend pair. Caller has already resolved both
    /// ids to real players.
    pub fn add_friend(&self, a: PlayerId, b: PlayerId) -> Result<(), GameError> {
        if a == b {
            return Err(GameError::SelfFriend);
        }
        {
            let mut mine = self.friends.entry(a).or_default();
            if !mine.insert(b) {
                return Err(GameError::AlreadyFriends);
            }
        }
        self.friends.entry(b).or_default().insert(a);
        Ok(())
    }

    pub fn are_friends(&self, a: PlayerId, b: PlayerId) -> bool {
        self.friends
            .get(&a)
            .map(|set| set.contains(&b))
            .unwrap_or(false)
    }

    pub fn friend_ids(&self, id: PlayerId) -> Vec<PlayerId> {
        self.friends
            .get(&id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Move a viewer's gaze to `owner`, detaching it from wherever it was.
    /// Viewing your own farm keeps the pointer but never appears in the
    /// owner-side set.
    pub fn watch(&self, viewer: PlayerId, owner: PlayerId) {
        let previous = self.watching.insert(viewer, owner);
        if let Some(prev) = previous {
            if prev != owner {
                self.detach_from(prev, viewer);
            }
        }
        if viewer != owner {
            self.viewers.entry(owner).or_default().insert(viewer);
        }
    }

    /// Drop every viewer-side trace of a player (disconnect).
    pub fn clear_viewer(&self, viewer: PlayerId) {
        if let Some((_, owner)) = self.watching.remove(&viewer) {
            self.detach_from(owner, viewer);
        }
    }

    /// Everyone currently observing `owner`'s farm, excluding the owner.
    pub fn viewers_of(&self, owner: PlayerId) -> Vec<PlayerId> {
        self.viewers
            .get(&owner)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    fn detach_from(&self, owner: PlayerId, viewer: PlayerId) {
        if let Some(mut set) = self.viewers.get_mut(&owner) {
            set.remove(&viewer);
        }
        self.viewers.remove_if(&owner, |_, set| set.is_empty());
    }

    /// Friend adjacency, for snapshot serialization. Sorted for a stable
    /// on-disk document.
    pub fn snapshot(&self) -> Vec<(PlayerId, Vec<PlayerId>)> {
        let mut lists: Vec<(PlayerId, Vec<PlayerId>)> = self
            .friends
            .iter()
            .map(|entry| {
                let mut ids: Vec<PlayerId> = entry.value().iter().copied().collect();
                ids.sort_unstable();
                (*entry.key(), ids)
            })
            .collect();
        lists.sort_by_key(|(id, _)| *id);
        lists
    }

    /// Install a friend list loaded from a snapshot.
    pub fn insert_loaded(&self, id: PlayerId, friend_ids: impl IntoIterator<Item = PlayerId>) {
        self.friends.insert(id, friend_ids.into_iter().collect());
    }
}
