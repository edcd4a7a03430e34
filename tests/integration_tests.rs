//! Integration tests driving a real server over real TCP connections.
//!
//! Each test boots a server on an ephemeral port with sub-second round
//! durations, connects two line-based clients, and checks the protocol
//! behavior end to end.

use assert_approx_eq::assert_approx_eq;
use server::session::{Server, SessionConfig};
use shared::{decode_line, encode_line, ClientMessage, Phase, ServerMessage};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::time::timeout;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Sub-second round so a full cycle fits in a test, with a tick small
/// enough to observe several snapshots per phase.
fn fast_config() -> SessionConfig {
    SessionConfig {
        countdown: Duration::from_millis(300),
        round: Duration::from_millis(600),
        tick_interval: Duration::from_millis(20),
        auto_start: false,
    }
}

async fn spawn_server(config: SessionConfig) -> SocketAddr {
    let server = Server::bind("127.0.0.1:0", config)
        .await
        .expect("failed to bind test server");
    let addr = server.local_addr().expect("no local addr");
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

struct TestClient {
    lines: Lines<BufReader<OwnedReadHalf>>,
    writer: OwnedWriteHalf,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("failed to connect");
        let (read_half, writer) = stream.into_split();
        Self {
            lines: BufReader::new(read_half).lines(),
            writer,
        }
    }

    async fn recv(&mut self) -> ServerMessage {
        let line = timeout(RECV_TIMEOUT, self.lines.next_line())
            .await
            .expect("timed out waiting for a server message")
            .expect("read error")
            .expect("server closed the connection");
        decode_line(&line).expect("undecodable server message")
    }

    async fn send(&mut self, msg: ClientMessage) {
        let frame = encode_line(&msg).unwrap();
        self.writer
            .write_all(frame.as_bytes())
            .await
            .expect("send failed");
    }

    async fn send_raw(&mut self, raw: &str) {
        self.writer
            .write_all(raw.as_bytes())
            .await
            .expect("raw send failed");
    }

    /// Skips messages until one matches `pred`.
    async fn wait_for<F>(&mut self, pred: F) -> ServerMessage
    where
        F: Fn(&ServerMessage) -> bool,
    {
        loop {
            let msg = self.recv().await;
            if pred(&msg) {
                return msg;
            }
        }
    }

    async fn wait_for_phase(&mut self, phase: Phase) -> ServerMessage {
        self.wait_for(|msg| matches!(msg, ServerMessage::State { phase: p, .. } if *p == phase))
            .await
    }

    async fn wait_for_game_over(&mut self) -> (u32, u32, u8) {
        match self
            .wait_for(|msg| matches!(msg, ServerMessage::GameOver { .. }))
            .await
        {
            ServerMessage::GameOver {
                p1_score,
                p2_score,
                winner,
            } => (p1_score, p2_score, winner),
            _ => unreachable!(),
        }
    }
}

/// Boots a server and seats two clients, asserting the hello handshake
/// assigns player ids in arrival order.
async fn seated_pair(config: SessionConfig) -> (TestClient, TestClient) {
    let addr = spawn_server(config).await;

    let mut p1 = TestClient::connect(addr).await;
    assert_eq!(p1.recv().await, ServerMessage::Hello { player_id: 1 });

    let mut p2 = TestClient::connect(addr).await;
    assert_eq!(p2.recv().await, ServerMessage::Hello { player_id: 2 });

    (p1, p2)
}

#[tokio::test]
async fn hello_then_waiting_broadcasts() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    // Once both are seated the tick starts; everyone sees waiting
    // snapshots with zeroed timers and scores.
    for client in [&mut p1, &mut p2] {
        match client.recv().await {
            ServerMessage::State {
                phase,
                countdown_left,
                time_left,
                p1_score,
                p2_score,
            } => {
                assert_eq!(phase, Phase::Waiting);
                assert_eq!(countdown_left, 0.0);
                assert_eq!(time_left, 0.0);
                assert_eq!(p1_score, 0);
                assert_eq!(p2_score, 0);
            }
            other => panic!("expected a waiting state, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn full_round_scores_and_winner() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    p1.send(ClientMessage::Start).await;

    // Countdown: round timer shows the full duration, scores are reset.
    match p1.wait_for_phase(Phase::Countdown).await {
        ServerMessage::State {
            time_left,
            p1_score,
            p2_score,
            ..
        } => {
            assert_approx_eq!(time_left, 0.6, 1e-3);
            assert_eq!(p1_score, 0);
            assert_eq!(p2_score, 0);
        }
        _ => unreachable!(),
    }

    // A press during countdown must not count toward the final score.
    p1.send(ClientMessage::Press).await;

    p1.wait_for_phase(Phase::Playing).await;
    for _ in 0..7 {
        p1.send(ClientMessage::Press).await;
    }

    p2.wait_for_phase(Phase::Playing).await;
    for _ in 0..3 {
        p2.send(ClientMessage::Press).await;
    }

    // Observe the rest of the round on player 1's connection: the round
    // timer never increases while playing, the finished state zeroes it,
    // and game_over follows immediately after.
    let mut last_time_left = f32::MAX;
    let mut previous_was_finished_state = false;
    loop {
        match p1.recv().await {
            ServerMessage::State {
                phase: Phase::Playing,
                time_left,
                ..
            } => {
                assert!(time_left <= last_time_left);
                last_time_left = time_left;
                previous_was_finished_state = false;
            }
            ServerMessage::State {
                phase: Phase::Finished,
                countdown_left,
                time_left,
                ..
            } => {
                assert_eq!(countdown_left, 0.0);
                assert_eq!(time_left, 0.0);
                previous_was_finished_state = true;
            }
            ServerMessage::GameOver {
                p1_score,
                p2_score,
                winner,
            } => {
                assert!(
                    previous_was_finished_state,
                    "game_over must follow a finished state message"
                );
                assert_eq!(p1_score, 7);
                assert_eq!(p2_score, 3);
                assert_eq!(winner, 1);
                break;
            }
            other => panic!("unexpected message during round: {:?}", other),
        }
    }

    // Exactly one game_over per round: what follows is only finished
    // states until someone asks for a new round.
    for _ in 0..5 {
        match p1.recv().await {
            ServerMessage::State {
                phase: Phase::Finished,
                ..
            } => {}
            other => panic!("expected finished states after game_over, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn presses_while_waiting_never_score() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    for _ in 0..10 {
        p1.send(ClientMessage::Press).await;
    }

    p2.send(ClientMessage::Start).await;
    let (p1_score, p2_score, winner) = p1.wait_for_game_over().await;
    assert_eq!((p1_score, p2_score, winner), (0, 0, 0));
}

#[tokio::test]
async fn restart_resets_scores_between_rounds() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    // Round one: player 2 takes it 5-2.
    p1.send(ClientMessage::Start).await;
    p1.wait_for_phase(Phase::Playing).await;
    for _ in 0..2 {
        p1.send(ClientMessage::Press).await;
    }
    p2.wait_for_phase(Phase::Playing).await;
    for _ in 0..5 {
        p2.send(ClientMessage::Press).await;
    }
    assert_eq!(p2.wait_for_game_over().await, (2, 5, 2));

    // Round two, requested by the other player: fresh scores, and with
    // nobody pressing it ends in a tie.
    p2.send(ClientMessage::Start).await;
    match p2.wait_for_phase(Phase::Countdown).await {
        ServerMessage::State {
            p1_score, p2_score, ..
        } => {
            assert_eq!(p1_score, 0);
            assert_eq!(p2_score, 0);
        }
        _ => unreachable!(),
    }
    assert_eq!(p2.wait_for_game_over().await, (0, 0, 0));
}

#[tokio::test]
async fn start_ignored_while_round_in_progress() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    p1.send(ClientMessage::Start).await;
    p1.wait_for_phase(Phase::Countdown).await;

    // Start requests mid-countdown and mid-round must not reset anything.
    p2.send(ClientMessage::Start).await;
    p1.wait_for_phase(Phase::Playing).await;
    p2.send(ClientMessage::Start).await;

    // From playing onward, the only phases seen are playing and finished.
    loop {
        match p1.recv().await {
            ServerMessage::State { phase, .. } => {
                assert!(
                    matches!(phase, Phase::Playing | Phase::Finished),
                    "round was reset mid-flight: saw {:?}",
                    phase
                );
            }
            ServerMessage::GameOver { .. } => break,
            other => panic!("unexpected message: {:?}", other),
        }
    }

    // The ignored requests left no pending flag: no new round starts.
    for _ in 0..5 {
        match p1.recv().await {
            ServerMessage::State {
                phase: Phase::Finished,
                ..
            } => {}
            other => panic!("expected finished states, got {:?}", other),
        }
    }
}

#[tokio::test]
async fn simultaneous_starts_begin_exactly_one_round() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    // Both players ask at once while waiting.
    p1.send(ClientMessage::Start).await;
    p2.send(ClientMessage::Start).await;

    // Count countdown entries observed until the round ends: exactly one.
    let mut countdown_entries = 0;
    let mut in_countdown = false;
    loop {
        match p1.recv().await {
            ServerMessage::State { phase, .. } => {
                if phase == Phase::Countdown && !in_countdown {
                    countdown_entries += 1;
                }
                in_countdown = phase == Phase::Countdown;
            }
            ServerMessage::GameOver { .. } => break,
            other => panic!("unexpected message: {:?}", other),
        }
    }
    assert_eq!(countdown_entries, 1);
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_dropping_the_connection() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    p1.send_raw("this is not json\n").await;
    p1.send_raw("{\"type\":\"teleport\"}\n").await;
    p1.send_raw("{\"broken\":\n").await;
    p1.send_raw("\n").await;

    // The same connection still works: its start request is honored and
    // its presses still count.
    p1.send(ClientMessage::Start).await;
    p1.wait_for_phase(Phase::Playing).await;
    p1.send_raw("garbage mid-round\n").await;
    p1.send(ClientMessage::Press).await;
    p1.send(ClientMessage::Press).await;

    let (p1_score, p2_score, winner) = p2.wait_for_game_over().await;
    assert_eq!((p1_score, p2_score, winner), (2, 0, 1));
}

#[tokio::test]
async fn disconnect_leaves_the_round_running() {
    let (mut p1, mut p2) = seated_pair(fast_config()).await;

    p1.send(ClientMessage::Start).await;
    p1.wait_for_phase(Phase::Playing).await;
    p2.wait_for_phase(Phase::Playing).await;

    p2.send(ClientMessage::Press).await;
    drop(p2);

    p1.send(ClientMessage::Press).await;
    p1.send(ClientMessage::Press).await;

    // The remaining player still sees the round complete on its timer.
    let (p1_score, p2_score, winner) = p1.wait_for_game_over().await;
    assert_eq!((p1_score, p2_score, winner), (2, 1, 1));
}

#[tokio::test]
async fn auto_start_begins_a_round_without_a_start_message() {
    let config = SessionConfig {
        auto_start: true,
        ..fast_config()
    };
    let (mut p1, _p2) = seated_pair(config).await;

    // Nobody sends anything; the round runs on its own.
    p1.wait_for_phase(Phase::Countdown).await;
    p1.wait_for_phase(Phase::Playing).await;
    let (p1_score, p2_score, winner) = p1.wait_for_game_over().await;
    assert_eq!((p1_score, p2_score, winner), (0, 0, 0));
}
