use shared::Role;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal problems reading the scenario file at startup
#[derive(Debug, Error)]
pub enum DataError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("scenario file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Why one economy could not be resolved at the end of a round
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RoundError {
    #[error("{} choice {choice} has no matching option", .role.label())]
    MissingOption { role: Role, choice: usize },
    #[error("no outcome declared for combo [{bank_id}, {government_id}]")]
    NoMatchingOutcome { bank_id: i64, government_id: i64 },
}

/// A client or controller request the game refused
///
/// These are reported back to the sender as `error` messages.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GameError {
    #[error("invalid handshake: {0}")]
    InvalidHandshake(String),
    #[error("economy {index} does not exist ({count} available)")]
    UnknownEconomy { index: i64, count: usize },
    #[error("client {0} has already joined")]
    AlreadyJoined(u32),
    #[error("client {0} has not joined an economy")]
    NotJoined(u32),
    #[error("the game has already started")]
    AlreadyStarted,
    #[error("the game has not started yet")]
    NotStarted,
    #[error("round {0} is still in progress")]
    RoundInProgress(u32),
    #[error("there is no active round")]
    NoActiveRound,
    #[error("the {} of economy {economy} has no event this round", .role.label())]
    NoEvent { economy: usize, role: Role },
    #[error("invalid option: {0}")]
    InvalidSelection(String),
    #[error("the round timer is already running")]
    TimerAlreadyRunning,
}
