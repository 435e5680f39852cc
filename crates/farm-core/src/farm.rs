//! Per-player farm grid.
//!
//! A farm is a fixed 4x4 grid of [`Plot`]s, stored row-major. The grid is
//! created all-empty and only ever mutated through [`crate::engine`]
//! transitions or the snapshot-load promotion below.

use crate::plot::{Plot, PlotState};

pub const FARM_ROWS: usize = 4;
pub const FARM_COLS: usize = 4;

/// A fixed-size grid of plots owned by a single player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Farm {
    plots: Vec<Plot>,
}

impl Farm {
    /// Create a farm with every plot empty.
    pub fn new() -> Self {
        Farm {
            plots: vec![Plot::empty(); FARM_ROWS * FARM_COLS],
        }
    }

    pub fn rows(&self) -> usize {
        FARM_ROWS
    }

    pub fn cols(&self) -> usize {
        FARM_COLS
    }

    /// True when `(row, col)` falls inside the grid.
    pub fn in_bounds(&self, row: i32, col: i32) -> bool {
        row >= 0 && (row as usize) < FARM_ROWS && col >= 0 && (col as usize) < FARM_COLS
    }

    pub fn plot(&self, row: i32, col: i32) -> Option<&Plot> {
        if self.in_bounds(row, col) {
            Some(&self.plots[row as usize * FARM_COLS + col as usize])
        } else {
            None
        }
    }

    pub fn plot_mut(&mut self, row: i32, col: i32) -> Option<&mut Plot> {
        if self.in_bounds(row, col) {
            Some(&mut self.plots[row as usize * FARM_COLS + col as usize])
        } else {
            None
        }
    }

    /// Row-major snapshot of every cell's state, for farm views on the wire.
    pub fn cell_states(&self) -> Vec<PlotState> {
        self.plots.iter().map(|p| p.state).collect()
    }

    /// Row-major view of the full plots (state + deadline), for snapshots.
    pub fn cells(&self) -> &[Plot] {
        &self.plots
    }

    pub fn count_ripe(&self) -> usize {
        self.plots
            .iter()
            .filter(|p| p.state == PlotState::Ripe)
            .count()
    }

    /// Rebuild a farm from a row-major cell list (snapshot load).
    ///
    /// Cells beyond the grid are ignored; missing cells default to empty.
    /// A `Growing` cell without a deadline cannot mature and is normalized
    /// to empty.
    pub fn from_cells(cells: impl IntoIterator<Item = Plot>) -> Self {
        let mut farm = Farm::new();
        for (slot, cell) in farm.plots.iter_mut().zip(cells) {
            *slot = match cell.state {
                PlotState::Growing if cell.ripe_at.is_none() => Plot::empty(),
                PlotState::Growing => cell,
                PlotState::Empty => Plot::empty(),
                PlotState::Ripe => Plot::ripe(),
            };
        }
        farm
    }

    /// Promote every growing plot whose deadline has already elapsed.
    ///
    /// Used on snapshot load. Returns the coordinates of plots that are
    /// still growing, paired with their deadlines, so the caller can
    /// re-arm maturation timers for the remaining delay.
    pub fn promote_elapsed(&mut self, now_ms: i64) -> Vec<(usize, usize, i64)> {
        let mut pending = Vec::new();
        for (idx, plot) in self.plots.iter_mut().enumerate() {
            if plot.state != PlotState::Growing {
                continue;
            }
            match plot.ripe_at {
                Some(deadline) if deadline <= now_ms => {
                    *plot = Plot::ripe();
                }
                Some(deadline) => {
                    pending.push((idx / FARM_COLS, idx % FARM_COLS, deadline));
                }
                None => {
                    // Unreachable through from_cells, but keep the invariant.
                    *plot = Plot::empty();
                }
            }
        }
        pending
    }
}

impl Default for Farm {
    fn default() -> Self {
        Farm::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_farm_is_all_empty() {
        let farm = Farm::new();
        assert_eq!(farm.cell_states().len(), FARM_ROWS * FARM_COLS);
        assert!(farm
            .cell_states()
            .iter()
            .all(|s| *s == PlotState::Empty));
        assert_eq!(farm.count_ripe(), 0);
    }

    #[test]
    fn bounds_checks() {
        let farm = Farm::new();
        assert!(farm.in_bounds(0, 0));
        assert!(farm.in_bounds(3, 3));
        assert!(!farm.in_bounds(-1, 0));
        assert!(!farm.in_bounds(0, 4));
        assert!(farm.plot(4, 0).is_none());
    }

    #[test]
    fn cell_states_are_row_major() {
        let mut farm = Farm::new();
        farm.plot_mut(1, 2).unwrap().state = PlotState::Ripe;
        let cells = farm.cell_states();
        assert_eq!(cells[FARM_COLS + 2], PlotState::Ripe);
    }

    #[test]
    fn promote_elapsed_splits_due_and_pending() {
        let mut farm = Farm::new();
        *farm.plot_mut(0, 0).unwrap() = Plot::growing(1_000);
        *farm.plot_mut(2, 3).unwrap() = Plot::growing(9_000);

        let pending = farm.promote_elapsed(5_000);

        assert_eq!(farm.plot(0, 0).unwrap().state, PlotState::Ripe);
        assert_eq!(farm.plot(0, 0).unwrap().ripe_at, None);
        assert_eq!(farm.plot(2, 3).unwrap().state, PlotState::Growing);
        assert_eq!(pending, vec![(2, 3, 9_000)]);
    }

    #[test]
    fn from_cells_normalizes_deadlineless_growing() {
        let farm = Farm::from_cells(vec![Plot {
            state: PlotState::Growing,
            ripe_at: None,
        }]);
        assert_eq!(farm.plot(0, 0).unwrap().state, PlotState::Empty);
    }
}
