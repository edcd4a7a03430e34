//! # Key-Spam Game Server
//!
//! Authoritative server for a timed two-player key-spam duel. Exactly
//! two clients connect over TCP, a countdown runs, both players race to
//! register the most key presses within a fixed window, and a winner is
//! declared. The server owns the canonical round state; clients only
//! render what they are told and report presses.
//!
//! ## Architecture
//!
//! Concurrency is deliberately small: one receive task per connection,
//! one writer task per connection, and one session loop, all coordinated
//! through a single mutex around the round state.
//!
//! - **State** (`state`): the one shared mutable record — phase, per-slot
//!   scores, an edge-triggered start flag, and a monotonic phase-entry
//!   instant the remaining-time fields are derived from. The session loop
//!   is the only writer of the phase; routers may only increment scores
//!   and raise the start flag, which keeps transition logic race-free.
//! - **Registry** (`registry`): the two fixed seats. Every seat owns an
//!   outbound queue drained by its own writer task, so broadcasts are
//!   best-effort per seat and no lock is ever held across a socket write.
//! - **Router** (`router`): per-connection read loop over newline-
//!   delimited JSON frames. Malformed frames are dropped, not fatal; EOF
//!   or a read error ends only that connection's loop.
//! - **Session** (`session`): accepts both players, greets each with
//!   `hello`, then ticks at 20 Hz — advancing the state machine, taking
//!   one consistent snapshot, broadcasting it, and following the finished
//!   snapshot with exactly one `game_over`.
//!
//! ## Protocol
//!
//! Newline-delimited JSON, defined in the `shared` crate. Inbound:
//! `press` (counts only while playing) and `start` (honored only while
//! waiting or finished). Outbound: `hello`, per-tick `state`, and
//! `game_over`.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use server::session::{Server, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind("127.0.0.1:5000", SessionConfig::default()).await?;
//!     // Seats two players, then ticks and broadcasts until shutdown.
//!     server.run().await
//! }
//! ```
//!
//! ## Failure model
//!
//! Nothing a client does terminates the server. Malformed frames are
//! logged and discarded, a dead peer only loses its own deliveries, and
//! a disconnect leaves the remaining player's round running to its
//! timer. The only fatal errors are startup conditions: failing to bind
//! the listener or to accept the initial two connections.

pub mod registry;
pub mod router;
pub mod session;
pub mod state;
