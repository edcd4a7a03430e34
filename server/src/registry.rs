//! Connection registry: exactly two seats, assigned in arrival order.
//!
//! Each registered connection owns an unbounded outbound queue drained by
//! a dedicated writer task, so callers never hold a lock across a network
//! send and a stalled or dead peer cannot block messages to the other.
//! The seat set is fixed once both slots fill; a vacated seat is never
//! reused.

use crate::state::Slot;
use log::{info, warn};
use shared::{encode_line, ServerMessage, PLAYER_COUNT};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::mpsc;

struct Connection {
    slot: Slot,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

/// Holds the outbound side of both player connections.
#[derive(Default)]
pub struct Registry {
    seats: [Option<Connection>; PLAYER_COUNT],
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats a new connection in the first free slot and returns the slot
    /// together with the receiving end of its outbound queue, to be
    /// drained by [`run_writer`]. Returns `None` once both seats are
    /// taken.
    pub fn register(
        &mut self,
        addr: SocketAddr,
    ) -> Option<(Slot, mpsc::UnboundedReceiver<ServerMessage>)> {
        let index = self.seats.iter().position(|seat| seat.is_none())?;
        let slot = Slot::from_index(index)?;

        let (outbound, rx) = mpsc::unbounded_channel();
        info!("Player {} connected from {}", slot.id(), addr);
        self.seats[index] = Some(Connection { slot, outbound });
        Some((slot, rx))
    }

    pub fn is_full(&self) -> bool {
        self.seats.iter().all(|seat| seat.is_some())
    }

    pub fn len(&self) -> usize {
        self.seats.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queues a message for a single connection. A closed queue means the
    /// writer task ended and the peer is presumed dead; the message is
    /// dropped with a log line.
    pub fn send_to(&self, slot: Slot, msg: ServerMessage) {
        if let Some(conn) = &self.seats[slot.index()] {
            if conn.outbound.send(msg).is_err() {
                warn!("Player {} unreachable, dropping message", slot.id());
            }
        }
    }

    /// Best-effort fan-out to every seated connection. A failure for one
    /// seat is logged and skipped; the remaining seat still gets its copy.
    pub fn broadcast(&self, msg: &ServerMessage) {
        for conn in self.seats.iter().flatten() {
            if conn.outbound.send(msg.clone()).is_err() {
                warn!("Player {} unreachable, skipping broadcast", conn.slot.id());
            }
        }
    }
}

/// Drains one connection's outbound queue onto its socket, one JSON line
/// per message. Runs until the queue closes or a write fails; a failed
/// write ends the task so later sends to this seat fail fast instead of
/// piling up.
pub async fn run_writer(
    slot: Slot,
    mut stream: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = outbound.recv().await {
        let line = match encode_line(&msg) {
            Ok(line) => line,
            Err(e) => {
                warn!("Player {}: failed to encode message: {}", slot.id(), e);
                continue;
            }
        };

        if let Err(e) = stream.write_all(line.as_bytes()).await {
            warn!("Send to player {} failed: {}", slot.id(), e);
            break;
        }
    }
}
