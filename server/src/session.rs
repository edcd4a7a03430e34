//! Session loop: accepts exactly two players, then drives the round
//! state machine on a fixed tick and broadcasts snapshots.
//!
//! The loop is the sole writer of the round phase. It wakes on the tick
//! interval or on a start-request signal from a router, whichever comes
//! first, so a requested round begins without waiting out a sleep. The
//! state lock is released before any message leaves the process.

use crate::registry::{self, Registry};
use crate::router;
use crate::state::{RoundConfig, RoundState};
use log::info;
use shared::{Phase, ServerMessage, COUNTDOWN_DURATION, ROUND_DURATION, TICK_INTERVAL_MS};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval, MissedTickBehavior};

/// Session tuning. Durations default to the wire-level constants; tests
/// inject sub-second rounds to keep runtime down.
#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub countdown: Duration,
    pub round: Duration,
    pub tick_interval: Duration,
    /// Start the first round as soon as both players are seated instead
    /// of waiting for an explicit `start` message.
    pub auto_start: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            countdown: Duration::from_secs_f32(COUNTDOWN_DURATION),
            round: Duration::from_secs_f32(ROUND_DURATION),
            tick_interval: Duration::from_millis(TICK_INTERVAL_MS),
            auto_start: false,
        }
    }
}

impl SessionConfig {
    fn round_config(&self) -> RoundConfig {
        RoundConfig {
            countdown: self.countdown,
            round: self.round,
        }
    }
}

/// A bound, not-yet-started game server for one two-player session.
pub struct Server {
    listener: TcpListener,
    config: SessionConfig,
}

impl Server {
    pub async fn bind(addr: &str, config: SessionConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(Server { listener, config })
    }

    /// Address the listener actually bound, for callers that asked for
    /// an ephemeral port.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the session: seats both players, then ticks and broadcasts
    /// until the task is dropped. The state machine cycles between
    /// finished and countdown indefinitely; only accept failures during
    /// startup are fatal.
    pub async fn run(self) -> io::Result<()> {
        let Server { listener, config } = self;

        let state = Arc::new(Mutex::new(RoundState::new(config.round_config())));
        let (start_tx, start_rx) = mpsc::unbounded_channel();
        let mut seats = Registry::new();

        while !seats.is_full() {
            let (stream, addr) = listener.accept().await?;
            let (read_half, write_half) = stream.into_split();

            // The loop runs only while a seat is free.
            let (slot, outbound_rx) = seats.register(addr).expect("no free seat");
            tokio::spawn(registry::run_writer(slot, write_half, outbound_rx));
            seats.send_to(slot, ServerMessage::Hello { player_id: slot.id() });
            tokio::spawn(router::run(
                slot,
                read_half,
                Arc::clone(&state),
                start_tx.clone(),
            ));
        }

        // Seats are fixed for the session lifetime; stop listening so no
        // further connection can be established.
        drop(listener);
        info!("Both players connected");

        if config.auto_start {
            state.lock().await.request_start();
        }

        session_loop(config, state, Arc::new(seats), start_rx).await;
        Ok(())
    }
}

async fn session_loop(
    config: SessionConfig,
    state: Arc<Mutex<RoundState>>,
    seats: Arc<Registry>,
    mut start_rx: mpsc::UnboundedReceiver<()>,
) {
    let mut ticker = interval(config.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut start_open = true;

    loop {
        tokio::select! {
            wakeup = start_rx.recv(), if start_open => {
                match wakeup {
                    // A start request arrived; advance and broadcast
                    // immediately instead of waiting out the tick.
                    Some(()) => tick(&config, &state, &seats).await,
                    // Every router is gone; the tick alone keeps the
                    // session alive.
                    None => start_open = false,
                }
            }
            _ = ticker.tick() => {
                tick(&config, &state, &seats).await;
            }
        }
    }
}

/// One tick: advance the state machine, take a single locked snapshot,
/// then broadcast with the lock released. Entering the finished phase
/// emits the final `state` message followed by exactly one `game_over`.
async fn tick(config: &SessionConfig, state: &Arc<Mutex<RoundState>>, seats: &Arc<Registry>) {
    let now = Instant::now();
    let (entered, snapshot) = {
        let mut st = state.lock().await;
        let entered = st.advance(now);
        (entered, st.snapshot(now))
    };

    for phase in &entered {
        match phase {
            Phase::Countdown => info!(
                "Round starting: {:.0}s countdown, {:.0}s round",
                config.countdown.as_secs_f32(),
                config.round.as_secs_f32()
            ),
            Phase::Playing => info!("Round live"),
            Phase::Finished => {}
            Phase::Waiting => {}
        }
    }

    seats.broadcast(&snapshot.to_message());

    if entered.contains(&Phase::Finished) {
        let winner = snapshot.winner();
        info!(
            "Round over: {} - {}, winner: {}",
            snapshot.scores[0],
            snapshot.scores[1],
            if winner == 0 {
                "tie".to_string()
            } else {
                format!("player {}", winner)
            }
        );
        seats.broadcast(&ServerMessage::GameOver {
            p1_score: snapshot.scores[0],
            p2_score: snapshot.scores[1],
            winner,
        });
    }
}
