use clap::Parser;
use client::network::{Client, Mode};
use log::info;
use shared::{Handshake, Role};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Nickname shown to other players
    #[arg(short = 'n', long, default_value = "player")]
    nickname: String,

    /// Entity to join: bank or government
    #[arg(short = 'r', long, default_value = "bank")]
    role: String,

    /// Index of the economy to join, as listed in the lobby
    #[arg(short = 'e', long, default_value = "0")]
    economy: i64,

    /// Connect as the game controller instead of a player
    #[arg(short = 'c', long)]
    controller: bool,
}

fn parse_role(role: &str) -> Result<Role, String> {
    match role.to_ascii_lowercase().as_str() {
        "bank" | "0" => Ok(Role::Bank),
        "government" | "gov" | "1" => Ok(Role::Government),
        other => Err(format!("unknown role '{}', use bank or government", other)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let mode = if args.controller {
        Mode::Controller
    } else {
        let role = parse_role(&args.role)?;
        Mode::Player(Handshake {
            nickname: args.nickname,
            role: i64::from(role.code()),
            economy: args.economy,
        })
    };

    info!("Starting client...");
    let mut client = Client::connect(&args.server, mode).await?;
    client.run().await?;

    Ok(())
}
