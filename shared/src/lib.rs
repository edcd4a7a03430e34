//! Wire protocol and game constants shared between server and client.
//!
//! All traffic is newline-delimited JSON: one self-contained message per
//! line, tagged by a `type` field. Helpers here encode a message into a
//! single line (trailing `\n` included) and decode one line back into a
//! message, so both sides agree on framing.

use serde::{Deserialize, Serialize};

/// TCP port the server binds by default.
pub const DEFAULT_PORT: u16 = 5000;
/// Seconds of countdown before a round goes live.
pub const COUNTDOWN_DURATION: f32 = 3.0;
/// Seconds a round lasts once playing.
pub const ROUND_DURATION: f32 = 10.0;
/// Milliseconds between state broadcasts (20 Hz).
pub const TICK_INTERVAL_MS: u64 = 50;
/// Number of player seats; the server accepts exactly this many connections.
pub const PLAYER_COUNT: usize = 2;

/// Stage of the round state machine.
///
/// Serialized as a lowercase string in `state` messages, matching the
/// phase names clients display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Waiting,
    Countdown,
    Playing,
    Finished,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Waiting => "waiting",
            Phase::Countdown => "countdown",
            Phase::Playing => "playing",
            Phase::Finished => "finished",
        };
        f.write_str(name)
    }
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Unicast once per connection, right after accept.
    Hello { player_id: u8 },
    /// Broadcast every tick: one consistent snapshot of the round.
    State {
        phase: Phase,
        countdown_left: f32,
        time_left: f32,
        p1_score: u32,
        p2_score: u32,
    },
    /// Broadcast exactly once per round, after the finished `State`.
    /// `winner` is the slot id of the higher score, or 0 on a tie.
    GameOver {
        p1_score: u32,
        p2_score: u32,
        winner: u8,
    },
}

/// Messages clients send to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// One key press. Counts only while the round is playing.
    Press,
    /// Request a new round. Honored only while waiting or finished.
    Start,
}

/// Encodes a message as one wire line, trailing newline included.
pub fn encode_line<T: Serialize>(msg: &T) -> Result<String, serde_json::Error> {
    let mut line = serde_json::to_string(msg)?;
    line.push('\n');
    Ok(line)
}

/// Decodes one wire line. Surrounding whitespace is tolerated.
pub fn decode_line<'a, T: Deserialize<'a>>(line: &'a str) -> Result<T, serde_json::Error> {
    serde_json::from_str(line.trim())
}
