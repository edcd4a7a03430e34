//! Protocol plumbing for the terminal client.
//!
//! The client is intentionally thin: it forwards typed input to the
//! server as `press`/`start` messages and renders the authoritative
//! `state` broadcasts as console lines. All game decisions happen on the
//! server.

use log::warn;
use shared::{decode_line, encode_line, ClientMessage, Phase, ServerMessage};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

pub struct Client {
    stream: TcpStream,
}

impl Client {
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Client { stream })
    }

    /// Runs until the server closes the connection or stdin ends.
    /// Multiplexes between server frames and typed commands.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let (read_half, mut write_half) = self.stream.into_split();
        let mut server_lines = BufReader::new(read_half).lines();
        let mut stdin_lines = BufReader::new(tokio::io::stdin()).lines();

        println!("Type a line and press Enter: \"s\" requests a round start,");
        println!("any other line sends one press per character. Ctrl+D quits.");

        let mut view = View::default();

        loop {
            tokio::select! {
                line = server_lines.next_line() => {
                    match line? {
                        Some(line) => view.apply(&line),
                        None => {
                            println!("Server closed the connection.");
                            break;
                        }
                    }
                }
                line = stdin_lines.next_line() => {
                    match line? {
                        Some(line) => {
                            for msg in parse_command(&line) {
                                let frame = encode_line(&msg)?;
                                write_half.write_all(frame.as_bytes()).await?;
                            }
                        }
                        None => break,
                    }
                }
            }
        }

        Ok(())
    }
}

/// Maps one typed line to outbound messages: "s"/"start" requests a
/// round, anything else counts one press per character typed.
fn parse_command(line: &str) -> Vec<ClientMessage> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    if trimmed.eq_ignore_ascii_case("s") || trimmed.eq_ignore_ascii_case("start") {
        vec![ClientMessage::Start]
    } else {
        trimmed.chars().map(|_| ClientMessage::Press).collect()
    }
}

/// Console rendering of server broadcasts. Tracks the last printed
/// second so 20 Hz state updates don't flood the terminal.
#[derive(Default)]
struct View {
    player_id: Option<u8>,
    phase: Option<Phase>,
    last_seconds: Option<u32>,
}

impl View {
    fn apply(&mut self, line: &str) {
        let msg = match decode_line::<ServerMessage>(line) {
            Ok(msg) => msg,
            Err(e) => {
                warn!("Discarding malformed frame from server: {}", e);
                return;
            }
        };

        match msg {
            ServerMessage::Hello { player_id } => {
                self.player_id = Some(player_id);
                println!("Connected. You are Player {}.", player_id);
            }
            ServerMessage::State {
                phase,
                countdown_left,
                time_left,
                p1_score,
                p2_score,
            } => {
                if self.phase != Some(phase) {
                    self.phase = Some(phase);
                    self.last_seconds = None;
                    match phase {
                        Phase::Waiting => println!("Waiting for a round. Type \"s\" to start."),
                        Phase::Countdown => println!("Get ready..."),
                        Phase::Playing => println!("GO! Spam characters and press Enter!"),
                        Phase::Finished => {}
                    }
                }

                let seconds = match phase {
                    Phase::Countdown => countdown_left.ceil() as u32,
                    Phase::Playing => time_left.ceil() as u32,
                    Phase::Waiting | Phase::Finished => return,
                };

                if self.last_seconds != Some(seconds) {
                    self.last_seconds = Some(seconds);
                    match phase {
                        Phase::Countdown => println!("Starting in {}...", seconds),
                        Phase::Playing => println!(
                            "{:>2}s left | P1 {:02} - P2 {:02}",
                            seconds, p1_score, p2_score
                        ),
                        _ => {}
                    }
                }
            }
            ServerMessage::GameOver {
                p1_score,
                p2_score,
                winner,
            } => {
                let verdict = match winner {
                    1 => "Player 1 wins!",
                    2 => "Player 2 wins!",
                    _ => "Tie game!",
                };
                println!("Final score: P1 {:02} - P2 {:02}. {}", p1_score, p2_score, verdict);
                println!("Type \"s\" to play again.");
            }
        }
    }
}
