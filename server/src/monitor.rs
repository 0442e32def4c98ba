//! Hooks for watching the game from outside the main loop
//!
//! The game and the network layer report notable events to every registered
//! [`GameObserver`]. Two implementations ship with the server: one that logs
//! and one that keeps counters for the periodic health report.

use crate::entity::EntityRef;
use log::{error, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Receives game events; every method defaults to doing nothing
pub trait GameObserver: Send + Sync {
    fn on_player_joined(&self, _client_id: u32, _nickname: &str, _entity: EntityRef) {}

    fn on_player_left(&self, _client_id: u32, _entity: EntityRef) {}

    fn on_connection_rejected(&self, _reason: &str) {}

    fn on_vote_cast(&self, _client_id: u32, _entity: EntityRef, _choice: Option<usize>) {}

    fn on_round_started(&self, _round: u32) {}

    fn on_round_resolved(&self, _round: u32, _failures: usize) {}

    fn on_critical_error(&self, _message: &str) {}
}

/// Writes every event to the log
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl GameObserver for LoggingObserver {
    fn on_player_joined(&self, client_id: u32, nickname: &str, entity: EntityRef) {
        info!(
            "{} (client {}) joined the {} of economy {}",
            nickname,
            client_id,
            entity.role.label(),
            entity.economy
        );
    }

    fn on_player_left(&self, client_id: u32, entity: EntityRef) {
        info!(
            "Client {} left the {} of economy {}",
            client_id,
            entity.role.label(),
            entity.economy
        );
    }

    fn on_connection_rejected(&self, reason: &str) {
        warn!("Connection rejected: {}", reason);
    }

    fn on_round_started(&self, round: u32) {
        info!("Round {} started", round);
    }

    fn on_round_resolved(&self, round: u32, failures: usize) {
        if failures > 0 {
            warn!("Round {} resolved with {} failed economies", round, failures);
        } else {
            info!("Round {} resolved", round);
        }
    }

    fn on_critical_error(&self, message: &str) {
        error!("{}", message);
    }
}

/// Point-in-time copy of the [`HealthMonitor`] counters
#[derive(Debug, Clone, PartialEq)]
pub struct HealthReport {
    pub uptime: Duration,
    pub players_joined: u64,
    pub players_left: u64,
    pub connections_rejected: u64,
    pub votes_cast: u64,
    pub rounds_started: u64,
    pub rounds_resolved: u64,
    pub critical_errors: u64,
}

impl HealthReport {
    pub fn active_players(&self) -> u64 {
        self.players_joined.saturating_sub(self.players_left)
    }

    pub fn is_healthy(&self) -> bool {
        self.critical_errors == 0
    }
}

/// Lock-free counters updated from the observer callbacks
#[derive(Debug)]
pub struct HealthMonitor {
    started_at: Instant,
    players_joined: AtomicU64,
    players_left: AtomicU64,
    connections_rejected: AtomicU64,
    votes_cast: AtomicU64,
    rounds_started: AtomicU64,
    rounds_resolved: AtomicU64,
    critical_errors: AtomicU64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthMonitor {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            players_joined: AtomicU64::new(0),
            players_left: AtomicU64::new(0),
            connections_rejected: AtomicU64::new(0),
            votes_cast: AtomicU64::new(0),
            rounds_started: AtomicU64::new(0),
            rounds_resolved: AtomicU64::new(0),
            critical_errors: AtomicU64::new(0),
        }
    }

    pub fn report(&self) -> HealthReport {
        HealthReport {
            uptime: self.started_at.elapsed(),
            players_joined: self.players_joined.load(Ordering::Relaxed),
            players_left: self.players_left.load(Ordering::Relaxed),
            connections_rejected: self.connections_rejected.load(Ordering::Relaxed),
            votes_cast: self.votes_cast.load(Ordering::Relaxed),
            rounds_started: self.rounds_started.load(Ordering::Relaxed),
            rounds_resolved: self.rounds_resolved.load(Ordering::Relaxed),
            critical_errors: self.critical_errors.load(Ordering::Relaxed),
        }
    }
}

impl GameObserver for HealthMonitor {
    fn on_player_joined(&self, _client_id: u32, _nickname: &str, _entity: EntityRef) {
        self.players_joined.fetch_add(1, Ordering::Relaxed);
    }

    fn on_player_left(&self, _client_id: u32, _entity: EntityRef) {
        self.players_left.fetch_add(1, Ordering::Relaxed);
    }

    fn on_connection_rejected(&self, _reason: &str) {
        self.connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    fn on_vote_cast(&self, _client_id: u32, _entity: EntityRef, _choice: Option<usize>) {
        self.votes_cast.fetch_add(1, Ordering::Relaxed);
    }

    fn on_round_started(&self, _round: u32) {
        self.rounds_started.fetch_add(1, Ordering::Relaxed);
    }

    fn on_round_resolved(&self, _round: u32, _failures: usize) {
        self.rounds_resolved.fetch_add(1, Ordering::Relaxed);
    }

    fn on_critical_error(&self, _message: &str) {
        self.critical_errors.fetch_add(1, Ordering::Relaxed);
    }
}
