//! Farm state transitions.
//!
//! Free functions over a single farm (plus quota state for steals). Each is
//! check-then-act: every precondition is verified before the first mutation,
//! so a failed call leaves the farm, quota, and balances untouched. The
//! caller is expected to hold that farm's exclusive lock for the duration
//! of the call.
//!
//! Identity- and session-level preconditions (self-theft, friendship, owner
//! presence) are the server's job; these functions only see the farm.

use crate::error::GameError;
use crate::farm::Farm;
use crate::plot::{Plot, PlotState};
use crate::quota::StealRound;

/// Coins debited when planting a plot.
pub const PLANT_COST: u32 = 10;
/// Coins credited when harvesting a ripe plot.
pub const HARVEST_REWARD: u32 = 20;
/// Coins moved from owner to thief per successful steal.
pub const STEAL_AMOUNT: u32 = 20;
/// Minimum ripe plots before a farm can be stolen from at all.
pub const STEAL_MIN_RIPE: usize = 4;
/// Coin grant on signup.
pub const SIGNUP_COINS: u32 = 100;
/// Default growth duration in milliseconds.
pub const GROW_DURATION_MS: i64 = 5_000;

/// Result of a successful plant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlantOutcome {
    /// Absolute maturation deadline for the newly planted plot.
    pub ripe_at: i64,
}

/// Result of a successful harvest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarvestOutcome {
    /// Coins to credit the owner.
    pub reward: u32,
    /// Ripe plots left on the farm afterwards.
    pub ripe_remaining: usize,
}

/// Result of a successful steal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealOutcome {
    /// Coins to move from owner to thief (owner balance floors at zero).
    pub transfer: u32,
    /// Whether the round still has allowance after this steal.
    pub can_steal_again: bool,
    /// Ripe plots left on the farm afterwards.
    pub ripe_remaining: usize,
}

/// Plant an empty plot.
///
/// `coins` is the owner's current balance, used only for the funds check;
/// the caller applies the [`PLANT_COST`] debit on success.
pub fn plant(
    farm: &mut Farm,
    coins: u32,
    row: i32,
    col: i32,
    now_ms: i64,
    grow_ms: i64,
) -> Result<PlantOutcome, GameError> {
    if !farm.in_bounds(row, col) {
        return Err(GameError::OutOfRange);
    }
    if farm.plot(row, col).map(|p| p.state) != Some(PlotState::Empty) {
        return Err(GameError::PlotOccupied);
    }
    if coins < PLANT_COST {
        return Err(GameError::InsufficientCoins);
    }

    let ripe_at = now_ms + grow_ms;
    if let Some(plot) = farm.plot_mut(row, col) {
        *plot = Plot::growing(ripe_at);
    }
    Ok(PlantOutcome { ripe_at })
}

/// Harvest a ripe plot. Resets the quota round when the last ripe plot
/// leaves the farm.
pub fn harvest(
    farm: &mut Farm,
    round: &mut Option<StealRound>,
    row: i32,
    col: i32,
) -> Result<HarvestOutcome, GameError> {
    if !farm.in_bounds(row, col) {
        return Err(GameError::OutOfRange);
    }
    if farm.plot(row, col).map(|p| p.state) != Some(PlotState::Ripe) {
        return Err(GameError::NotRipe);
    }

    if let Some(plot) = farm.plot_mut(row, col) {
        *plot = Plot::empty();
    }
    let ripe_remaining = farm.count_ripe();
    if ripe_remaining == 0 {
        *round = None;
    }
    Ok(HarvestOutcome {
        reward: HARVEST_REWARD,
        ripe_remaining,
    })
}

/// Steal one ripe plot from another player's farm.
///
/// Opens a quota round at the first attempt of a round (baseline = current
/// ripe count, allowance = baseline / 4). The baseline stays fixed for the
/// round's lifetime; it is only reset by the explicit triggers (zero ripe
/// plots, owner re-bind, below-threshold observation).
pub fn steal(
    farm: &mut Farm,
    round: &mut Option<StealRound>,
    row: i32,
    col: i32,
) -> Result<StealOutcome, GameError> {
    if !farm.in_bounds(row, col) {
        return Err(GameError::OutOfRange);
    }

    let ripe_count = farm.count_ripe();
    if ripe_count == 0 {
        *round = None;
        return Err(GameError::NothingToSteal);
    }
    if ripe_count < STEAL_MIN_RIPE {
        *round = None;
        return Err(GameError::BelowStealThreshold);
    }

    if round.is_none() {
        // The threshold check above guarantees allowed >= 1 here.
        *round = Some(StealRound::open(ripe_count as u32));
    }

    let can_steal_again = {
        let r = round.as_mut().ok_or(GameError::QuotaExhausted)?;
        if r.exhausted() {
            return Err(GameError::QuotaExhausted);
        }
        if farm.plot(row, col).map(|p| p.state) != Some(PlotState::Ripe) {
            return Err(GameError::PlotNotRipe);
        }

        if let Some(plot) = farm.plot_mut(row, col) {
            *plot = Plot::empty();
        }
        r.stolen += 1;
        r.stolen < r.allowed
    };

    let ripe_remaining = farm.count_ripe();
    if ripe_remaining == 0 {
        *round = None;
    }

    Ok(StealOutcome {
        transfer: STEAL_AMOUNT,
        can_steal_again,
        ripe_remaining,
    })
}

/// Maturation timer callback body: promote the plot if it is still growing.
///
/// Returns true when a promotion happened. A plot already emptied or ripe
/// (e.g. a stale re-armed timer after a snapshot load) is left alone.
pub fn mature(farm: &mut Farm, row: i32, col: i32) -> bool {
    match farm.plot_mut(row, col) {
        Some(plot) if plot.state == PlotState::Growing => {
            *plot = Plot::ripe();
            true
        }
        _ => false,
    }
}
