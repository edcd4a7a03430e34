use clap::Parser;
use log::info;
use server::session::{Server, SessionConfig};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Address to bind the listener to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value_t = shared::DEFAULT_PORT)]
    port: u16,

    /// Begin the first round as soon as both players connect,
    /// instead of waiting for an explicit start message
    #[arg(long)]
    auto_start: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let config = SessionConfig {
        auto_start: args.auto_start,
        ..SessionConfig::default()
    };

    let server = Server::bind(&format!("{}:{}", args.host, args.port), config).await?;
    info!("Waiting for {} players to connect...", shared::PLAYER_COUNT);

    tokio::select! {
        result = server.run() => {
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
