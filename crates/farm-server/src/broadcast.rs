//! Farm-event fan-out.
//!
//! Any visible change to a plot is pushed to the owner's connection (if
//! bound) and to every current viewer of that farm. Delivery is
//! send-and-forget per recipient: the triggering operation has already
//! committed, and one dead socket must not affect the others.

use farm_core::{PlayerId, PlotState};
use farm_protocol::PushCellUpdate;

use crate::state::AppState;

/// Push one cell update to the owner and all current viewers.
pub fn cell_update(
    state: &AppState,
    owner: PlayerId,
    row: i32,
    col: i32,
    plot_state: PlotState,
    owner_coins: u32,
) {
    let push = PushCellUpdate::new(owner, row, col, plot_state, owner_coins);
    let line = match serde_json::to_string(&push) {
        Ok(line) => line,
        Err(_) => return,
    };

    state.sessions.send_to(owner, &line);
    for viewer in state.social.viewers_of(owner) {
        if viewer != owner {
            state.sessions.send_to(viewer, &line);
        }
    }
}
