//! Steal-quota rounds.
//!
//! A round opens at the first steal attempt against a farm and fixes a
//! baseline ripe-plot count; `baseline / 4` steals are allowed before the
//! round is exhausted. The round is dropped (reset) when the farm runs out
//! of ripe plots, when the owner's connection (re)binds, or when a quota
//! query observes fewer than [`crate::STEAL_MIN_RIPE`] ripe plots.
//!
//! Quota state is ephemeral: it lives next to the farm under the same lock
//! and is never persisted.

use crate::engine::STEAL_MIN_RIPE;

/// State of one steal round against a single farm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StealRound {
    /// Ripe-plot count captured when the round opened.
    pub baseline: u32,
    /// Successful steals permitted this round: `baseline / 4`.
    pub allowed: u32,
    /// Successful steals so far this round.
    pub stolen: u32,
}

impl StealRound {
    /// Open a round against a farm currently showing `baseline` ripe plots.
    pub fn open(baseline: u32) -> Self {
        StealRound {
            baseline,
            allowed: baseline / 4,
            stolen: 0,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.stolen >= self.allowed
    }
}

/// Whether a steal could currently succeed against a farm with `ripe_count`
/// ripe plots, given the round state.
///
/// Observing a below-threshold farm resets the round, matching the
/// re-bind/zero-ripe reset triggers. Used by farm visits to report
/// `canSteal` without opening a round.
pub fn round_available(ripe_count: usize, round: &mut Option<StealRound>) -> bool {
    if ripe_count < STEAL_MIN_RIPE {
        *round = None;
        return false;
    }
    match round {
        None => true,
        Some(r) => !r.exhausted(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_is_quarter_of_baseline() {
        assert_eq!(StealRound::open(4).allowed, 1);
        assert_eq!(StealRound::open(7).allowed, 1);
        assert_eq!(StealRound::open(8).allowed, 2);
        assert_eq!(StealRound::open(16).allowed, 4);
    }

    #[test]
    fn below_threshold_resets_round() {
        let mut round = Some(StealRound::open(8));
        assert!(!round_available(3, &mut round));
        assert!(round.is_none());
    }

    #[test]
    fn open_round_reports_remaining_allowance() {
        let mut round = Some(StealRound {
            baseline: 8,
            allowed: 2,
            stolen: 1,
        });
        assert!(round_available(8, &mut round));

        round.as_mut().unwrap().stolen = 2;
        assert!(!round_available(8, &mut round));
        // Exhaustion alone does not reset the round.
        assert!(round.is_some());
    }

    #[test]
    fn no_round_with_enough_ripe_is_available() {
        let mut round = None;
        assert!(round_available(4, &mut round));
        assert!(round.is_none());
    }
}
