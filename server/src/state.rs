//! Shared round state: phase machine, per-player scores and timers.
//!
//! A single [`RoundState`] instance lives behind one mutex for the whole
//! session. The session loop is the only writer of the phase (via
//! [`RoundState::advance`]); connection routers are limited to
//! [`RoundState::register_press`] and [`RoundState::request_start`], so
//! phase transitions can never race between tasks.

use shared::{Phase, ServerMessage, COUNTDOWN_DURATION, ROUND_DURATION};
use std::time::{Duration, Instant};

/// One of the two fixed player seats, assigned in arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    P1,
    P2,
}

impl Slot {
    /// Wire-level player id (1 or 2).
    pub fn id(self) -> u8 {
        match self {
            Slot::P1 => 1,
            Slot::P2 => 2,
        }
    }

    pub fn index(self) -> usize {
        (self.id() - 1) as usize
    }

    pub fn from_index(index: usize) -> Option<Slot> {
        match index {
            0 => Some(Slot::P1),
            1 => Some(Slot::P2),
            _ => None,
        }
    }
}

/// Round durations. Defaults match the wire-level constants; tests
/// inject sub-second values.
#[derive(Debug, Clone, Copy)]
pub struct RoundConfig {
    pub countdown: Duration,
    pub round: Duration,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs_f32(COUNTDOWN_DURATION),
            round: Duration::from_secs_f32(ROUND_DURATION),
        }
    }
}

/// Copy of all broadcast-relevant fields, read under the lock at one
/// instant so a `state` message never mixes two updates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Snapshot {
    pub phase: Phase,
    pub countdown_left: f32,
    pub time_left: f32,
    pub scores: [u32; 2],
}

impl Snapshot {
    /// Slot id with the strictly higher score, 0 on a tie.
    pub fn winner(&self) -> u8 {
        match self.scores[0].cmp(&self.scores[1]) {
            std::cmp::Ordering::Greater => 1,
            std::cmp::Ordering::Less => 2,
            std::cmp::Ordering::Equal => 0,
        }
    }

    pub fn to_message(self) -> ServerMessage {
        ServerMessage::State {
            phase: self.phase,
            countdown_left: self.countdown_left,
            time_left: self.time_left,
            p1_score: self.scores[0],
            p2_score: self.scores[1],
        }
    }
}

/// The one shared mutable record of the session.
///
/// Remaining times are derived from a monotonic phase-entry instant
/// rather than stored, so they can never appear to increase within a
/// phase and are immune to wall-clock adjustment.
#[derive(Debug)]
pub struct RoundState {
    config: RoundConfig,
    phase: Phase,
    scores: [u32; 2],
    start_requested: bool,
    phase_entered: Instant,
}

impl RoundState {
    pub fn new(config: RoundConfig) -> Self {
        Self {
            config,
            phase: Phase::Waiting,
            scores: [0, 0],
            start_requested: false,
            phase_entered: Instant::now(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn score(&self, slot: Slot) -> u32 {
        self.scores[slot.index()]
    }

    pub fn start_pending(&self) -> bool {
        self.start_requested
    }

    /// Credits one press to `slot` iff the round is live. Presses in any
    /// other phase are dropped, not queued. Returns whether it counted.
    pub fn register_press(&mut self, slot: Slot) -> bool {
        if self.phase == Phase::Playing {
            self.scores[slot.index()] += 1;
            true
        } else {
            false
        }
    }

    /// Raises the edge-triggered start flag iff a round can be started.
    /// Idempotent while already pending: two requests in the same tick
    /// still start exactly one round. Returns true only when the flag
    /// flips from clear to set.
    pub fn request_start(&mut self) -> bool {
        if matches!(self.phase, Phase::Waiting | Phase::Finished) && !self.start_requested {
            self.start_requested = true;
            true
        } else {
            false
        }
    }

    /// Advances the state machine to `now`. This is the sole writer of
    /// the phase. Returns the phases entered during this call, in order;
    /// with very short configured durations one call may pass through
    /// several.
    pub fn advance(&mut self, now: Instant) -> Vec<Phase> {
        let mut entered = Vec::new();

        if matches!(self.phase, Phase::Waiting | Phase::Finished) && self.start_requested {
            self.start_requested = false;
            self.scores = [0, 0];
            self.phase = Phase::Countdown;
            self.phase_entered = now;
            entered.push(Phase::Countdown);
        }

        if self.phase == Phase::Countdown && self.elapsed(now) >= self.config.countdown {
            self.phase = Phase::Playing;
            self.phase_entered = now;
            entered.push(Phase::Playing);
        }

        if self.phase == Phase::Playing && self.elapsed(now) >= self.config.round {
            self.phase = Phase::Finished;
            entered.push(Phase::Finished);
        }

        entered
    }

    /// One consistent copy of everything a `state` broadcast carries.
    /// Remaining times are clamped to zero and are both exactly zero in
    /// the waiting and finished phases; during countdown the round timer
    /// reports its full duration.
    pub fn snapshot(&self, now: Instant) -> Snapshot {
        let (countdown_left, time_left) = match self.phase {
            Phase::Waiting | Phase::Finished => (0.0, 0.0),
            Phase::Countdown => (
                self.remaining(self.config.countdown, now),
                self.config.round.as_secs_f32(),
            ),
            Phase::Playing => (0.0, self.remaining(self.config.round, now)),
        };

        Snapshot {
            phase: self.phase,
            countdown_left,
            time_left,
            scores: self.scores,
        }
    }

    fn elapsed(&self, now: Instant) -> Duration {
        now.duration_since(self.phase_entered)
    }

    fn remaining(&self, full: Duration, now: Instant) -> f32 {
        full.saturating_sub(self.elapsed(now)).as_secs_f32()
    }
}
