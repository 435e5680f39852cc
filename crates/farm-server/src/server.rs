//! TCP listener and top-level server wiring.
//!
//! This module:
//! - Loads the persisted snapshots (re-arming maturation timers).
//! - Spawns the two long-lived service tasks:
//!   - the maturation scheduler,
//!   - the single-writer snapshot flusher.
//! - Accepts TCP connections, assigns each a `ConnId`, and spawns a
//!   per-connection task for its I/O.
//! - On ctrl-c, flushes all three aggregates and exits.
//!
//! Per-connection logic lives in `client`; the operations themselves in
//! `handlers`.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::client;
use crate::config::Config;
use crate::persist;
use crate::scheduler;
use crate::state::AppState;
use crate::types::ConnId;

/// Global-ish counter for assigning unique `ConnId`s.
static NEXT_CONN_ID: AtomicU64 = AtomicU64::new(1);

fn next_conn_id() -> ConnId {
    NEXT_CONN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Bind the configured address and serve until shutdown.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = config.socket_addr_string();
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);
    serve(listener, config).await
}

/// Serve on an already-bound listener. Split out so tests can bind port 0
/// and learn the address first.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let (scheduler_tx, scheduler_rx) = mpsc::unbounded_channel();
    let (persist_tx, persist_rx) = mpsc::unbounded_channel();
    let state = Arc::new(AppState::new(config, scheduler_tx, persist_tx));

    // Load before accepting anyone; re-armed timers queue up in the
    // scheduler channel until its task starts below.
    persist::load_all(&state)?;

    tokio::spawn(scheduler::run_scheduler(scheduler_rx, state.clone()));
    tokio::spawn(persist::run_writer(persist_rx, state.clone()));

    let live_conns = Arc::new(AtomicUsize::new(0));

    loop {
        tokio::select! {
            accepted = listener.accept() => {
                let (stream, peer_addr) = accepted?;
                if live_conns.load(Ordering::Relaxed) >= state.config.max_clients {
                    warn!(
                        %peer_addr,
                        max_clients = state.config.max_clients,
                        "rejecting connection: max_clients reached"
                    );
                    // Just drop the stream; the client sees a closed socket.
                    continue;
                }

                let conn_id = next_conn_id();
                info!(conn_id, %peer_addr, "accepted connection");
                live_conns.fetch_add(1, Ordering::Relaxed);

                let state = state.clone();
                let live_conns = live_conns.clone();
                tokio::spawn(async move {
                    if let Err(e) = client::run_client(conn_id, stream, state).await {
                        warn!(conn_id, error = %e, "connection error");
                    } else {
                        info!(conn_id, "client disconnected");
                    }
                    live_conns.fetch_sub(1, Ordering::Relaxed);
                });
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown signal received, flushing snapshots");
                let state = state.clone();
                match tokio::task::spawn_blocking(move || persist::flush_all_sync(&state)).await {
                    Ok(Ok(())) => info!("final flush complete"),
                    Ok(Err(e)) => error!(error = %e, "final flush failed"),
                    Err(e) => error!(error = %e, "final flush task failed"),
                }
                break;
            }
        }
    }

    Ok(())
}
