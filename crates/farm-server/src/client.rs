// crates/farm-server/src/client.rs

//! Per-connection I/O.
//!
//! Each accepted connection gets two tasks:
//! - this reader loop, which decodes one JSON line at a time, dispatches
//!   it, and queues exactly one response per request;
//! - a writer task draining the connection's outbound channel (responses
//!   and pushes share it, so writes never interleave mid-line).
//!
//! The reader also selects on the connection's eviction `Notify`: when a
//! newer login takes over this player id, the registry fires it and this
//! loop exits after the INFO notice has been queued. Teardown removes the
//! session binding (conn-id guarded) and the viewer-side state.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tracing::{debug, warn};

use farm_core::PlayerId;
use farm_protocol::{codec, Response};

use crate::handlers::{self, ConnCtx};
use crate::state::AppState;
use crate::types::{ConnId, OutboundRx, OutboundTx};

/// Run the I/O loop for a single connection until EOF, a read error, or
/// eviction.
pub async fn run_client(
    conn_id: ConnId,
    stream: TcpStream,
    state: Arc<AppState>,
) -> anyhow::Result<()> {
    let (read_half, write_half) = stream.into_split();
    let (out_tx, out_rx): (OutboundTx, OutboundRx) = mpsc::unbounded_channel();
    let shutdown = Arc::new(Notify::new());

    // Writer task: consumes queued lines and writes them out. Exits when
    // every sender is gone (reader done, session entry replaced) or on the
    // first write error.
    tokio::spawn(write_loop(conn_id, write_half, out_rx));

    let mut bound: Option<PlayerId> = None;
    let mut lines = BufReader::new(read_half).lines();
    let mut result = Ok(());

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                debug!(conn_id, "connection evicted by a newer login");
                break;
            }
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!(conn_id, %line, "recv");

                    let decoded = codec::decode_request(line);
                    let conn = ConnCtx {
                        conn_id,
                        outbound: &out_tx,
                        shutdown: &shutdown,
                    };
                    let resp = match decoded.result {
                        Ok(request) => handlers::handle_request(
                            &state,
                            &conn,
                            &mut bound,
                            decoded.request_id,
                            request,
                        ),
                        Err(err) => Response::failure(decoded.request_id, err.to_string()),
                    };
                    if let Ok(encoded) = serde_json::to_string(&resp) {
                        debug!(conn_id, %encoded, "send");
                        let _ = out_tx.send(encoded);
                    }
                }
                Ok(None) => break, // EOF
                Err(e) => {
                    result = Err(e.into());
                    break;
                }
            }
        }
    }

    teardown(&state, conn_id, bound);
    result
}

async fn write_loop(
    conn_id: ConnId,
    mut write_half: tokio::net::tcp::OwnedWriteHalf,
    mut out_rx: OutboundRx,
) {
    while let Some(line) = out_rx.recv().await {
        let write = async {
            write_half.write_all(line.as_bytes()).await?;
            write_half.write_all(b"\n").await?;
            write_half.flush().await
        };
        if let Err(e) = write.await {
            warn!(conn_id, error = %e, "write failed, dropping outbound queue");
            break;
        }
    }
}

/// Disconnect cleanup: release the session binding and viewer-side state,
/// but only when this connection still holds the session. A connection
/// displaced by a newer login must not touch the state the new session
/// already owns (login re-points the viewer relation itself).
fn teardown(state: &AppState, conn_id: ConnId, bound: Option<PlayerId>) {
    if let Some(player_id) = bound {
        if state.sessions.unbind(player_id, conn_id) {
            state.social.clear_viewer(player_id);
            debug!(conn_id, player_id, "session unbound");
        }
    }
}
