//! Per-connection message router.
//!
//! One router task runs for the lifetime of each connection, decoding
//! newline-delimited frames and applying them to the shared round state.
//! Routers never touch the phase directly: a `start` only raises the
//! edge-triggered flag and wakes the session loop, which owns every
//! transition.

use crate::state::{RoundState, Slot};
use log::{debug, info, warn};
use shared::{decode_line, ClientMessage};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, Mutex};

/// Receive loop for one seated connection. Malformed or unrecognized
/// frames are dropped without closing the connection; the loop ends on
/// EOF or a stream error, leaving the seat vacant for the rest of the
/// session.
pub async fn run(
    slot: Slot,
    stream: OwnedReadHalf,
    state: Arc<Mutex<RoundState>>,
    start_tx: mpsc::UnboundedSender<()>,
) {
    let mut lines = BufReader::new(stream).lines();

    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                match decode_line::<ClientMessage>(&line) {
                    Ok(msg) => apply(slot, msg, &state, &start_tx).await,
                    Err(e) => {
                        debug!("Player {}: discarding malformed frame: {}", slot.id(), e);
                    }
                }
            }
            Ok(None) => {
                info!("Player {} disconnected", slot.id());
                break;
            }
            Err(e) => {
                warn!("Player {} read error: {}", slot.id(), e);
                break;
            }
        }
    }
}

/// Applies one decoded message under the state lock. The lock is held
/// only for the update itself, never across any I/O.
async fn apply(
    slot: Slot,
    msg: ClientMessage,
    state: &Arc<Mutex<RoundState>>,
    start_tx: &mpsc::UnboundedSender<()>,
) {
    match msg {
        ClientMessage::Press => {
            // A no-op outside the playing phase; dropped, not queued.
            state.lock().await.register_press(slot);
        }
        ClientMessage::Start => {
            let newly_requested = state.lock().await.request_start();
            if newly_requested {
                info!("Player {} requested a new round", slot.id());
                // Wake the session loop. If it is gone the process is
                // already shutting down.
                let _ = start_tx.send(());
            }
        }
    }
}
