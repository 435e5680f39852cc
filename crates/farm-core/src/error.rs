//! Game error taxonomy.
//!
//! Every user-facing failure maps to one variant; the `Display` text is the
//! `msg` string sent on the wire. Transport and persistence failures are
//! handled at the server layer and never surface through this type.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameError {
    /// Missing or malformed request fields.
    BadRequest,
    /// Signup with a name that is already registered (case-insensitive).
    NameTaken,
    /// No player with the given id or name.
    UnknownPlayer,
    WrongPassword,
    /// The connection has not completed a login.
    NotLoggedIn,
    /// The request's `playerId` differs from the connection's bound identity.
    SessionMismatch,

    /// Coordinates outside the farm grid.
    OutOfRange,
    /// Planting on a plot that is not empty.
    PlotOccupied,
    /// Planting without enough coins for the plant cost.
    InsufficientCoins,
    /// Harvesting a plot that is not ripe.
    NotRipe,

    /// Befriending yourself.
    SelfFriend,
    AlreadyFriends,
    /// Visiting or stealing from a player who is not a friend.
    NotFriends,

    /// Stealing from your own farm.
    SelfTheft,
    /// The farm's owner has a live session.
    OwnerOnline,
    /// No ripe plots on the target farm.
    NothingToSteal,
    /// Fewer ripe plots than the steal threshold.
    BelowStealThreshold,
    /// The current round's allowance is used up.
    QuotaExhausted,
    /// The targeted plot is not ripe.
    PlotNotRipe,
}

impl fmt::Display for GameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GameError::BadRequest => "bad request",
            GameError::NameTaken => "player exists",
            GameError::UnknownPlayer => "no such player",
            GameError::WrongPassword => "wrong password",
            GameError::NotLoggedIn => "login first",
            GameError::SessionMismatch => "not your session",
            GameError::OutOfRange => "out of range",
            GameError::PlotOccupied => "plot occupied",
            GameError::InsufficientCoins => "not enough coins",
            GameError::NotRipe => "not ripe",
            GameError::SelfFriend => "cannot add yourself",
            GameError::AlreadyFriends => "already friends",
            GameError::NotFriends => "not friends",
            GameError::SelfTheft => "cannot steal from yourself",
            GameError::OwnerOnline => "owner online, cannot steal",
            GameError::NothingToSteal => "no ripe plots to steal",
            GameError::BelowStealThreshold => {
                "not enough ripe plots to steal (need at least 4)"
            }
            GameError::QuotaExhausted => "farm already stolen up to 25%",
            GameError::PlotNotRipe => "this plot is not ripe",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for GameError {}
