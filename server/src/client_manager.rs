//! Connection bookkeeping for the game server
//!
//! This module tracks every open WebSocket connection, including:
//! - Connection lifecycle (connect, disconnect, idle timeout)
//! - Which namespace a connection arrived on and what it has become
//!   (a pending player, an authenticated player, or the controller)
//! - The bounded outbound queue each connection task drains into its socket
//! - Capacity limits and the single-controller rule
//!
//! Game membership (which entity a player belongs to) lives in the game
//! state; the manager only needs enough to route messages.

use crate::entity::EntityRef;
use log::{debug, info, warn};
use shared::{CONTROLLER_PATH, PLAYER_PATH};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Frames a connection may have queued before it is dropped as unresponsive
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Request path a connection was opened on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Player,
    Controller,
}

impl Namespace {
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "" => Some(Namespace::Player),
            p if p == CONTROLLER_PATH => Some(Namespace::Controller),
            _ => None,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Namespace::Player => PLAYER_PATH,
            Namespace::Controller => CONTROLLER_PATH,
        }
    }
}

/// What a connection is allowed to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    /// Player connection that has not sent a valid `auth` yet
    Pending,
    Player(EntityRef),
    Controller,
}

/// One open connection
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server
    pub id: u32,
    pub addr: SocketAddr,
    pub namespace: Namespace,
    /// Last time we received any message from this client
    pub last_seen: Instant,
    pub kind: ClientKind,
    /// Outbound queue drained by the connection task; dropping it closes the socket
    sender: mpsc::Sender<String>,
}

impl Client {
    pub fn new(
        id: u32,
        addr: SocketAddr,
        namespace: Namespace,
        sender: mpsc::Sender<String>,
    ) -> Self {
        Self {
            id,
            addr,
            namespace,
            last_seen: Instant::now(),
            kind: ClientKind::Pending,
            sender,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing was received within `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }

    /// Queues a text frame without waiting for the socket
    pub fn send(&self, text: &str) -> Result<(), TrySendError<String>> {
        self.sender.try_send(text.to_string())
    }
}

/// Manages all open connections
///
/// Enforces the capacity limit and makes sure at most one connection holds
/// the controller role at any time.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<u32, Client>,
    /// Next available client ID for new connections
    next_client_id: u32,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    idle_timeout: Duration,
    controller: Option<u32>,
}

impl ClientManager {
    /// Creates an empty manager; client IDs start from 1
    pub fn new(max_clients: usize, idle_timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            idle_timeout,
            controller: None,
        }
    }

    /// Registers a new connection
    ///
    /// Returns None if the server is at capacity.
    pub fn add_client(
        &mut self,
        addr: SocketAddr,
        namespace: Namespace,
        sender: mpsc::Sender<String>,
    ) -> Option<u32> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        info!(
            "Client {} connected from {} on {}",
            client_id,
            addr,
            namespace.path()
        );
        self.clients
            .insert(client_id, Client::new(client_id, addr, namespace, sender));

        Some(client_id)
    }

    /// Removes a client, releasing the controller slot if it held it
    ///
    /// Returns the removed client so callers can inspect what it was.
    pub fn remove_client(&mut self, client_id: &u32) -> Option<Client> {
        let client = self.clients.remove(client_id)?;
        if self.controller == Some(client.id) {
            self.controller = None;
        }
        info!("Client {} disconnected", client.id);
        Some(client)
    }

    pub fn get(&self, client_id: u32) -> Option<&Client> {
        self.clients.get(&client_id)
    }

    pub fn kind(&self, client_id: u32) -> Option<ClientKind> {
        self.clients.get(&client_id).map(|client| client.kind)
    }

    /// Refreshes the idle timer; false for unknown clients
    pub fn touch(&mut self, client_id: u32) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Marks a pending player as authenticated
    pub fn promote_player(&mut self, client_id: u32, entity: EntityRef) -> bool {
        match self.clients.get_mut(&client_id) {
            Some(client) if client.namespace == Namespace::Player => {
                client.kind = ClientKind::Player(entity);
                true
            }
            _ => false,
        }
    }

    /// Grants the controller role unless another connection already holds it
    pub fn claim_controller(&mut self, client_id: u32) -> bool {
        if self.controller.is_some_and(|id| id != client_id) {
            return false;
        }
        match self.clients.get_mut(&client_id) {
            Some(client) if client.namespace == Namespace::Controller => {
                client.kind = ClientKind::Controller;
                self.controller = Some(client_id);
                true
            }
            _ => false,
        }
    }

    pub fn controller(&self) -> Option<u32> {
        self.controller
    }

    /// Removes clients idle past the timeout and returns their IDs
    pub fn check_timeouts(&mut self) -> Vec<u32> {
        let timeout = self.idle_timeout;
        let timed_out: Vec<u32> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Queues a frame for one client; false if it is unknown or gone
    ///
    /// A client whose queue is full is removed, which closes its socket and
    /// lets its connection task report the disconnect.
    pub fn send_to(&mut self, client_id: u32, text: &str) -> bool {
        let Some(client) = self.clients.get(&client_id) else {
            return false;
        };
        match client.send(text) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(
                    "Client {} is not reading ({} frames queued), dropping it",
                    client_id, OUTBOUND_QUEUE_CAPACITY
                );
                self.remove_client(&client_id);
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!("Outbound queue for client {} is closed", client_id);
                false
            }
        }
    }

    pub fn send_to_many(&mut self, client_ids: &[u32], text: &str) -> usize {
        client_ids
            .iter()
            .filter(|id| self.send_to(**id, text))
            .count()
    }

    /// Queues a frame for every authenticated player and the controller
    ///
    /// Pending connections only get the lobby until they authenticate.
    pub fn broadcast(&mut self, text: &str) -> usize {
        let recipients: Vec<u32> = self
            .clients
            .values()
            .filter(|client| client.kind != ClientKind::Pending)
            .map(|client| client.id)
            .collect();
        self.send_to_many(&recipients, text)
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
