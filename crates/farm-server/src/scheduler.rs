//! Maturation scheduler.
//!
//! A single task owns every pending maturation timer in a min-heap keyed
//! by deadline. Handlers (and snapshot load) arm timers by sending a
//! [`MaturationJob`] over the channel; the task sleeps until the earliest
//! deadline and fires everything due. Jobs carry their coordinates by
//! value and re-acquire the farm lock before mutating, so a job that was
//! overtaken (plot no longer growing) is a no-op.
//!
//! This task and the snapshot-load promotion are the only sources of
//! unsolicited farm mutation.

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::time::sleep_until;
use tracing::debug;

use farm_core::{PlayerId, PlotState};

use crate::broadcast;
use crate::clock;
use crate::persist::Aggregate;
use crate::state::{lock_slot, AppState};

/// One armed maturation timer.
#[derive(Debug, Clone, Copy)]
pub struct MaturationJob {
    pub owner: PlayerId,
    pub row: i32,
    pub col: i32,
    /// Absolute deadline in epoch milliseconds.
    pub ripe_at_ms: i64,
}

pub type SchedulerTx = mpsc::UnboundedSender<MaturationJob>;
pub type SchedulerRx = mpsc::UnboundedReceiver<MaturationJob>;

/// Run the timer service until every sender is gone.
pub async fn run_scheduler(mut rx: SchedulerRx, state: Arc<AppState>) {
    let mut heap: BinaryHeap<Reverse<(i64, PlayerId, i32, i32)>> = BinaryHeap::new();

    loop {
        let next_deadline = heap.peek().map(|Reverse((deadline, _, _, _))| *deadline);

        tokio::select! {
            job = rx.recv() => match job {
                Some(job) => {
                    heap.push(Reverse((job.ripe_at_ms, job.owner, job.row, job.col)));
                }
                None => break,
            },
            _ = sleep_until(clock::instant_at(next_deadline.unwrap_or(0))),
                if next_deadline.is_some() =>
            {
                let now = clock::now_ms();
                while let Some(&Reverse((deadline, owner, row, col))) = heap.peek() {
                    if deadline > now {
                        break;
                    }
                    heap.pop();
                    fire(&state, owner, row, col);
                }
            }
        }
    }

    debug!("scheduler shutting down (channel closed)");
}

/// Promote one plot if it is still growing, then broadcast and queue a
/// farms flush.
fn fire(state: &AppState, owner: PlayerId, row: i32, col: i32) {
    let slot = state.farm_slot(owner);
    let mut guard = lock_slot(&slot);
    if farm_core::mature(&mut guard.farm, row, col) {
        let coins = state.accounts.coins(owner).unwrap_or(0);
        broadcast::cell_update(state, owner, row, col, PlotState::Ripe, coins);
        drop(guard);
        state.queue_flush(Aggregate::Farms);
        debug!(owner, row, col, "plot matured");
    }
}
