//! # Classroom Game Client Library
//!
//! A headless terminal client for the classroom IS-LM game. It connects to
//! the server over WebSocket either as a player (seated in a country's bank
//! or government) or as the controller that starts and advances rounds.
//!
//! ## Module Organization
//!
//! ### Session Module (`session`)
//! Explicit per-connection state: who we are, the latest game snapshot,
//! our entity's vote percentages and the round clock. Every server message
//! is folded into it through [`session::Session::apply`].
//!
//! ### Input Module (`input`)
//! Parses the commands typed at the prompt (`vote N`, `clear`, `start`,
//! `next`, `resolve`, `quit`) into protocol messages.
//!
//! ### Network Module (`network`)
//! Owns the WebSocket, sends the handshake and forwards commands while
//! printing server updates as they arrive.
//!
//! ### Rendering Module (`rendering`)
//! Plain-text views of the lobby, the full game and a player's own economy.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::{Client, Mode};
//! use shared::Handshake;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mode = Mode::Player(Handshake {
//!         nickname: "Ana".to_string(),
//!         role: 0,
//!         economy: 0,
//!     });
//!     let mut client = Client::connect("127.0.0.1:3000", mode).await?;
//!     client.run().await?;
//!     Ok(())
//! }
//! ```

pub mod input;
pub mod network;
pub mod rendering;
pub mod session;
