//! Snapshot persistence.
//!
//! Three aggregates are durable: accounts (`players.json`), farms with
//! in-flight maturation deadlines (`farms.json`), and the friend graph
//! (`friends.json`). Each flush serializes a complete snapshot of the
//! live state and writes it atomically: temp file in the same directory,
//! fsync, rename over the canonical file, fsync the directory.
//!
//! Flushes are queued after every mutating operation and consumed by a
//! single writer task, so writes never reorder and bursts collapse
//! naturally (the writer re-reads current state at flush time). A failed
//! write is logged and never fails the in-memory operation that queued it.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task;
use tracing::{debug, error, info};

use farm_core::{Farm, Player, PlayerId, Plot, PlotState};

use crate::scheduler::MaturationJob;
use crate::state::{lock_slot, AppState, FarmSlot};
use crate::clock;

const PLAYERS_FILE: &str = "players.json";
const FARMS_FILE: &str = "farms.json";
const FRIENDS_FILE: &str = "friends.json";

/// Which durable aggregate a queued flush covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Players,
    Farms,
    Friends,
}

pub type PersistTx = mpsc::UnboundedSender<Aggregate>;
pub type PersistRx = mpsc::UnboundedReceiver<Aggregate>;

// -----------------------------------------------------------------------------
// On-disk documents
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlayerDoc {
    id: PlayerId,
    name: String,
    password: String,
    coins: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellDoc {
    state: PlotState,
    /// Present only while the cell is growing.
    ripe_at: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FarmDoc {
    player_id: PlayerId,
    rows: usize,
    cols: usize,
    cells: Vec<CellDoc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendListDoc {
    player_id: PlayerId,
    friends: Vec<PlayerId>,
}

// -----------------------------------------------------------------------------
// Writer task
// -----------------------------------------------------------------------------

/// Consume flush signals until every sender is gone. The final shutdown
/// flush goes through [`flush_all_sync`] instead.
pub async fn run_writer(mut rx: PersistRx, state: Arc<AppState>) {
    while let Some(aggregate) = rx.recv().await {
        if let Err(e) = flush(&state, aggregate).await {
            error!(?aggregate, error = %e, "snapshot flush failed");
        }
    }
    debug!("snapshot writer shutting down (channel closed)");
}

async fn flush(state: &Arc<AppState>, aggregate: Aggregate) -> anyhow::Result<()> {
    let (name, bytes) = encode_aggregate(state, aggregate)?;
    let dir = state.config.data_dir.clone();
    task::spawn_blocking(move || write_atomic(&dir, name, &bytes)).await??;
    debug!(?aggregate, file = name, "snapshot flushed");
    Ok(())
}

/// Write all three aggregates synchronously (orderly shutdown).
pub fn flush_all_sync(state: &AppState) -> anyhow::Result<()> {
    for aggregate in [Aggregate::Players, Aggregate::Farms, Aggregate::Friends] {
        let (name, bytes) = encode_aggregate(state, aggregate)?;
        write_atomic(&state.config.data_dir, name, &bytes)?;
    }
    Ok(())
}

fn encode_aggregate(state: &AppState, aggregate: Aggregate) -> anyhow::Result<(&'static str, Vec<u8>)> {
    match aggregate {
        Aggregate::Players => {
            let docs: Vec<PlayerDoc> = state
                .accounts
                .snapshot()
                .into_iter()
                .map(player_doc)
                .collect();
            Ok((PLAYERS_FILE, serde_json::to_vec_pretty(&docs)?))
        }
        Aggregate::Farms => {
            let mut docs: Vec<FarmDoc> = state
                .farms
                .iter()
                .map(|entry| {
                    let guard = lock_slot(entry.value());
                    farm_doc(*entry.key(), &guard.farm)
                })
                .collect();
            docs.sort_by_key(|d| d.player_id);
            Ok((FARMS_FILE, serde_json::to_vec_pretty(&docs)?))
        }
        Aggregate::Friends => {
            let docs: Vec<FriendListDoc> = state
                .social
                .snapshot()
                .into_iter()
                .map(|(player_id, friends)| FriendListDoc { player_id, friends })
                .collect();
            Ok((FRIENDS_FILE, serde_json::to_vec_pretty(&docs)?))
        }
    }
}

fn player_doc(player: Player) -> PlayerDoc {
    PlayerDoc {
        id: player.id,
        name: player.name.clone(),
        password: player.password().to_string(),
        coins: player.coins,
    }
}

fn farm_doc(player_id: PlayerId, farm: &Farm) -> FarmDoc {
    FarmDoc {
        player_id,
        rows: farm.rows(),
        cols: farm.cols(),
        cells: farm
            .cells()
            .iter()
            .map(|plot| CellDoc {
                state: plot.state,
                ripe_at: plot.ripe_at,
            })
            .collect(),
    }
}

/// Temp-then-rename atomic write, fsyncing both the file and the directory
/// entry.
fn write_atomic(dir: &Path, name: &str, bytes: &[u8]) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    let tmp = dir.join(format!("{name}.tmp"));
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, dir.join(name))?;
    #[cfg(unix)]
    File::open(dir)?.sync_all()?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Startup load
// -----------------------------------------------------------------------------

/// Load whatever snapshots exist. Growing plots whose deadline has elapsed
/// are promoted on the spot; the rest get their timers re-armed through
/// the scheduler channel for the remaining delay.
pub fn load_all(state: &AppState) -> anyhow::Result<()> {
    load_players(state)?;
    load_farms(state)?;
    load_friends(state)?;
    Ok(())
}

fn load_players(state: &AppState) -> anyhow::Result<()> {
    let path = state.config.data_dir.join(PLAYERS_FILE);
    let Some(bytes) = read_optional(&path)? else {
        info!("no {PLAYERS_FILE}, starting fresh");
        return Ok(());
    };
    let docs: Vec<PlayerDoc> = serde_json::from_slice(&bytes)?;
    let count = docs.len();
    for doc in docs {
        state
            .accounts
            .insert_loaded(Player::from_parts(doc.id, doc.name, doc.password, doc.coins));
    }
    info!(players = count, "loaded accounts snapshot");
    Ok(())
}

fn load_farms(state: &AppState) -> anyhow::Result<()> {
    let path = state.config.data_dir.join(FARMS_FILE);
    let Some(bytes) = read_optional(&path)? else {
        info!("no {FARMS_FILE}, farms start empty");
        return Ok(());
    };
    let docs: Vec<FarmDoc> = serde_json::from_slice(&bytes)?;
    let now = clock::now_ms();
    let count = docs.len();
    let mut rearmed = 0usize;
    for doc in docs {
        let mut farm = Farm::from_cells(doc.cells.iter().map(|cell| Plot {
            state: cell.state,
            ripe_at: cell.ripe_at,
        }));
        for (row, col, deadline) in farm.promote_elapsed(now) {
            state.schedule_maturation(MaturationJob {
                owner: doc.player_id,
                row: row as i32,
                col: col as i32,
                ripe_at_ms: deadline,
            });
            rearmed += 1;
        }
        state.farms.insert(
            doc.player_id,
            Arc::new(std::sync::Mutex::new(FarmSlot {
                farm,
                quota: None,
            })),
        );
    }
    info!(farms = count, rearmed, "loaded farms snapshot");
    Ok(())
}

fn load_friends(state: &AppState) -> anyhow::Result<()> {
    let path = state.config.data_dir.join(FRIENDS_FILE);
    let Some(bytes) = read_optional(&path)? else {
        info!("no {FRIENDS_FILE}, friend graph starts empty");
        return Ok(());
    };
    let docs: Vec<FriendListDoc> = serde_json::from_slice(&bytes)?;
    let count = docs.len();
    for doc in docs {
        state.social.insert_loaded(doc.player_id, doc.friends);
    }
    info!(lists = count, "loaded friends snapshot");
    Ok(())
}

fn read_optional(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) if bytes.is_empty() => Ok(None),
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::path::PathBuf;
    use tokio::sync::mpsc;

    fn state_with_dir(dir: &PathBuf) -> (Arc<AppState>, crate::scheduler::SchedulerRx) {
        let config = Config {
            bind_addr: "127.0.0.1".to_string(),
            port: 0,
            max_clients: 8,
            data_dir: dir.clone(),
            grow_ms: 5_000,
        };
        let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
        let (persist_tx, _persist_rx) = mpsc::unbounded_channel();
        (
            Arc::new(AppState::new(config, scheduler_tx, persist_tx)),
            scheduler_rx,
        )
    }

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("farmstead-{}", uuid::Uuid::new_v4()))
    }

    #[test]
    fn snapshot_round_trip_reproduces_state() {
        let dir = scratch_dir();
        let (state, _sched_rx) = state_with_dir(&dir);

        let alice = state.accounts.signup("alice", "secret1").unwrap();
        let bob = state.accounts.signup("bob", "hunter2").unwrap();
        state.accounts.adjust_coins(alice.id, |c| c + 50);
        state.social.add_friend(alice.id, bob.id).unwrap();

        {
            let slot = state.farm_slot(alice.id);
            let mut guard = lock_slot(&slot);
            let coins = state.accounts.coins(alice.id).unwrap();
            farm_core::plant(&mut guard.farm, coins, 0, 0, clock::now_ms(), 60_000).unwrap();
            farm_core::plant(&mut guard.farm, coins, 1, 1, 0, 1).unwrap();
            farm_core::mature(&mut guard.farm, 1, 1);
        }

        flush_all_sync(&state).unwrap();

        let (reloaded, mut sched_rx) = state_with_dir(&dir);
        load_all(&reloaded).unwrap();

        assert_eq!(reloaded.accounts.coins(alice.id), Some(150));
        assert_eq!(reloaded.accounts.coins(bob.id), Some(100));
        assert!(reloaded.accounts.authenticate("Alice", "secret1").is_ok());
        assert!(reloaded.social.are_friends(bob.id, alice.id));

        let slot = reloaded.farm_slot(alice.id);
        let guard = lock_slot(&slot);
        assert_eq!(guard.farm.plot(0, 0).unwrap().state, PlotState::Growing);
        // The elapsed plot was promoted on load.
        assert_eq!(guard.farm.plot(1, 1).unwrap().state, PlotState::Ripe);
        drop(guard);

        // Only the still-pending plot re-armed a timer.
        let job = sched_rx.try_recv().unwrap();
        assert_eq!((job.owner, job.row, job.col), (alice.id, 0, 0));
        assert!(sched_rx.try_recv().is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn load_with_no_files_starts_fresh() {
        let dir = scratch_dir();
        let (state, _rx) = state_with_dir(&dir);
        load_all(&state).unwrap();
        assert!(!state.accounts.contains(1));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn atomic_write_replaces_existing_file() {
        let dir = scratch_dir();
        write_atomic(&dir, "players.json", b"[1]").unwrap();
        write_atomic(&dir, "players.json", b"[2]").unwrap();
        let bytes = std::fs::read(dir.join("players.json")).unwrap();
        assert_eq!(bytes, b"[2]");
        assert!(!dir.join("players.json.tmp").exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
