//! A single farm plot and its lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of one grid cell.
///
/// Wire and snapshot representations both use the uppercase names
/// (`"EMPTY"` / `"GROWING"` / `"RIPE"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlotState {
    Empty,
    Growing,
    Ripe,
}

/// One cell of a farm grid.
///
/// Invariant: `ripe_at` is `Some` if and only if `state == Growing`.
/// All transitions go through [`crate::engine`] (or [`crate::Farm`]
/// snapshot-load promotion), which maintain this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plot {
    pub state: PlotState,
    /// Absolute maturation deadline in milliseconds since the Unix epoch.
    pub ripe_at: Option<i64>,
}

impl Plot {
    pub fn empty() -> Self {
        Plot {
            state: PlotState::Empty,
            ripe_at: None,
        }
    }

    /// A plot mid-growth, maturing at `ripe_at`.
    pub fn growing(ripe_at: i64) -> Self {
        Plot {
            state: PlotState::Growing,
            ripe_at: Some(ripe_at),
        }
    }

    pub fn ripe() -> Self {
        Plot {
            state: PlotState::Ripe,
            ripe_at: None,
        }
    }
}

impl Default for Plot {
    fn default() -> Self {
        Plot::empty()
    }
}
