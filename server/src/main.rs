use clap::Parser;
use log::{error, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use server::config::{
    ServerConfig, DEFAULT_DATA_PATH, DEFAULT_HOST, DEFAULT_MAX_CLIENTS, DEFAULT_PORT,
};
use server::events::GameData;
use server::game::GameState;
use server::monitor::LoggingObserver;
use server::network::Server;
use shared::{DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_ROUND_SECONDS};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Scenario file with countries and events
    #[clap(short, long, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,
    /// Round countdown in seconds (0 for the default, capped at 600)
    #[clap(short, long, default_value_t = DEFAULT_ROUND_SECONDS)]
    round_seconds: u32,
    /// Disconnect clients silent for this many seconds
    #[clap(short, long, default_value_t = DEFAULT_IDLE_TIMEOUT_SECS)]
    idle_timeout: u64,
    /// Maximum number of concurrent connections
    #[clap(short, long, default_value_t = DEFAULT_MAX_CLIENTS)]
    max_clients: usize,
    /// Seed for event draws and tie breaks
    #[clap(short, long)]
    seed: Option<u64>,
}

impl From<Args> for ServerConfig {
    fn from(args: Args) -> Self {
        ServerConfig {
            host: args.host,
            port: args.port,
            data_path: args.data,
            max_clients: args.max_clients,
            round_seconds: args.round_seconds,
            idle_timeout: Duration::from_secs(args.idle_timeout),
            seed: args.seed,
        }
        .clamped()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = ServerConfig::from(Args::parse());
    info!("Starting server with {:?}", config);

    let data = GameData::load(&config.data_path)?;
    let rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut game = GameState::new(data, config.round_seconds, rng);
    game.add_observer(Arc::new(LoggingObserver));

    let mut server = Server::bind(&config, game).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
