//! # Classroom IS-LM Game Server
//!
//! This library provides the authoritative server for a classroom
//! macroeconomics game. Students join a country as its central bank or its
//! government, vote on how to answer the economic events each round throws
//! at them, and are scored on how close their economy ends up to IS-LM
//! equilibrium.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Game State
//! Every economy, round and ballot lives here. Clients only ever see
//! snapshots; all decisions (vote tallies, outcome draws, scores) are made
//! by the server.
//!
//! ### Connection Management
//! Handles the lifecycle of WebSocket connections:
//! - Player connections on `/` that authenticate with a handshake
//! - A single controller connection on `/server` that runs the game
//! - Idle timeouts and cleanup of departed players and their votes
//!
//! ### State Broadcasting
//! After every mutation the full game snapshot is sent to every seated
//! player and the controller. Vote percentages go only to the players of
//! the entity that voted.
//!
//! ## Architecture Design
//!
//! ### Single Event Loop
//! Network tasks (acceptor, one task per connection, timeout checker) feed a
//! single main loop over an mpsc channel. The game state is owned by that
//! loop, so every mutation happens in order without locks.
//!
//! ### Round Clock
//! A one-second interval in the main loop drives the round countdown and the
//! periodic health report.
//!
//! ## Module Organization
//!
//! - `economy`: IS-LM model of one country and event impacts
//! - `events`: scenario data loaded from `data.json`
//! - `vote`, `entity`, `country`: ballots and the players behind them
//! - `round`: round lifecycle, outcome draws and scoring
//! - `game`: the session state machine driven by the main loop
//! - `client_manager`, `network`: connections and the WebSocket server
//! - `monitor`: observers for logging and health counters
//! - `config`, `error`: settings and error types
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use server::config::ServerConfig;
//! use server::events::GameData;
//! use server::game::GameState;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let data = GameData::load(&config.data_path)?;
//!     let game = GameState::new(data, config.round_seconds, StdRng::from_entropy());
//!
//!     let mut server = Server::bind(&config, game).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod country;
pub mod economy;
pub mod entity;
pub mod error;
pub mod events;
pub mod game;
pub mod monitor;
pub mod network;
pub mod round;
pub mod vote;
