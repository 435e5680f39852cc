//! Process-wide shared state.
//!
//! All registries are concurrent maps with per-key atomicity; the only
//! coarse locks are the per-farm mutexes, which protect the multi-step
//! plant/harvest/steal/mature invariants together with that farm's
//! steal-quota state.
//!
//! Lock discipline: a farm mutex may be held while touching an account
//! entry, never the other way around, and account guards are taken one at
//! a time.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use farm_core::{Farm, PlayerId, StealRound};

use crate::config::Config;
use crate::persist::{Aggregate, PersistTx};
use crate::scheduler::{MaturationJob, SchedulerTx};
use crate::session::SessionRegistry;
use crate::social::SocialGraph;
use crate::store::AccountStore;

/// A farm plus its ephemeral steal-quota state, guarded by one mutex.
pub struct FarmSlot {
    pub farm: Farm,
    pub quota: Option<StealRound>,
}

impl FarmSlot {
    pub fn new() -> Self {
        FarmSlot {
            farm: Farm::new(),
            quota: None,
        }
    }
}

/// Everything a connection handler can reach.
pub struct AppState {
    pub config: Config,
    pub accounts: AccountStore,
    pub farms: DashMap<PlayerId, Arc<Mutex<FarmSlot>>>,
    pub social: SocialGraph,
    pub sessions: SessionRegistry,
    scheduler_tx: SchedulerTx,
    persist_tx: PersistTx,
}

impl AppState {
    pub fn new(config: Config, scheduler_tx: SchedulerTx, persist_tx: PersistTx) -> Self {
        AppState {
            config,
            accounts: AccountStore::new(),
            farms: DashMap::new(),
            social: SocialGraph::new(),
            sessions: SessionRegistry::new(),
            scheduler_tx,
            persist_tx,
        }
    }

    /// The farm slot for a player, created empty on first reference.
    pub fn farm_slot(&self, owner: PlayerId) -> Arc<Mutex<FarmSlot>> {
        self.farms
            .entry(owner)
            .or_insert_with(|| Arc::new(Mutex::new(FarmSlot::new())))
            .clone()
    }

    /// Queue a maturation timer. The scheduler task owns the actual clock.
    pub fn schedule_maturation(&self, job: MaturationJob) {
        let _ = self.scheduler_tx.send(job);
    }

    /// Queue an asynchronous snapshot flush for one aggregate.
    pub fn queue_flush(&self, aggregate: Aggregate) {
        let _ = self.persist_tx.send(aggregate);
    }
}

/// Lock a farm slot, tolerating poisoning: a panicked handler must not
/// take the whole farm out of service.
pub fn lock_slot(slot: &Mutex<FarmSlot>) -> MutexGuard<'_, FarmSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}
