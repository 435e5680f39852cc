//! Player accounts as plain data.

use crate::engine::SIGNUP_COINS;

/// Identifier for a registered player. Assigned monotonically at signup
/// and never reused.
pub type PlayerId = u32;

/// A registered player.
///
/// The credential is taken directly by the constructor; lookups by name are
/// case-insensitive but the display name keeps its original casing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    password: String,
    pub coins: u32,
}

impl Player {
    /// Create a freshly signed-up player with the signup coin grant.
    pub fn new(id: PlayerId, name: impl Into<String>, password: impl Into<String>) -> Self {
        Player {
            id,
            name: name.into(),
            password: password.into(),
            coins: SIGNUP_COINS,
        }
    }

    /// Reconstruct a player from persisted fields.
    pub fn from_parts(
        id: PlayerId,
        name: impl Into<String>,
        password: impl Into<String>,
        coins: u32,
    ) -> Self {
        Player {
            id,
            name: name.into(),
            password: password.into(),
            coins,
        }
    }

    /// Plaintext-equivalent credential check.
    pub fn password_matches(&self, candidate: &str) -> bool {
        self.password == candidate
    }

    /// The stored credential, for snapshot serialization only.
    pub fn password(&self) -> &str {
        &self.password
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_grant_and_credential_check() {
        let p = Player::new(1, "Alice", "secret1");
        assert_eq!(p.coins, SIGNUP_COINS);
        assert!(p.password_matches("secret1"));
        assert!(!p.password_matches("secret2"));
    }
}
