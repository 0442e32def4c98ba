//! Server network layer handling WebSocket connections and the game loop

use crate::client_manager::{
    ClientKind, ClientManager, Namespace, OUTBOUND_QUEUE_CAPACITY,
};
use crate::config::{ServerConfig, HEALTH_REPORT_INTERVAL};
use crate::entity::EntityRef;
use crate::error::GameError;
use crate::game::{GameState, GameTick};
use crate::monitor::{HealthMonitor, HealthReport};
use futures_util::{Sink, SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, Handshake, ServerMessage, Welcome};
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Messages sent from network tasks to the main server loop
#[derive(Debug)]
pub enum NetworkEvent {
    Connected {
        client_id: u32,
        namespace: Namespace,
    },
    MessageReceived {
        client_id: u32,
        message: ClientMessage,
    },
    Malformed {
        client_id: u32,
        error: String,
    },
    /// A connection was refused before it got a client id
    Rejected {
        addr: SocketAddr,
        reason: String,
    },
    Disconnected {
        client_id: u32,
    },
    ClientTimeout {
        client_id: u32,
    },
}

/// Main server coordinating connections and the game
pub struct Server {
    listener: Option<TcpListener>,
    local_addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    game_state: GameState,
    monitor: Arc<HealthMonitor>,
    tick: u64,

    event_tx: mpsc::UnboundedSender<NetworkEvent>,
    event_rx: mpsc::UnboundedReceiver<NetworkEvent>,
}

impl Server {
    pub async fn bind(
        config: &ServerConfig,
        mut game_state: GameState,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on ws://{}", local_addr);

        let monitor = Arc::new(HealthMonitor::new());
        game_state.add_observer(monitor.clone());

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener: Some(listener),
            local_addr,
            clients: Arc::new(RwLock::new(ClientManager::new(
                config.max_clients,
                config.idle_timeout,
            ))),
            game_state,
            monitor,
            tick: 0,
            event_tx,
            event_rx,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn health(&self) -> HealthReport {
        self.monitor.report()
    }

    /// Spawns the task accepting TCP connections; each gets its own task
    fn spawn_acceptor(&mut self) {
        let Some(listener) = self.listener.take() else {
            warn!("Acceptor already running");
            return;
        };
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            loop {
                match listener.accept().await {
                    Ok((stream, addr)) => {
                        tokio::spawn(handle_connection(
                            stream,
                            addr,
                            Arc::clone(&clients),
                            event_tx.clone(),
                        ));
                    }
                    Err(e) => {
                        error!("Error accepting connection: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that disconnects idle clients
    fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    info!("Client {} timed out", client_id);
                    if let Err(e) = event_tx.send(NetworkEvent::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send(&self, client_id: u32, message: &ServerMessage) {
        if let Some(text) = encode(message) {
            let mut clients = self.clients.write().await;
            if !clients.send_to(client_id, &text) {
                debug!("Dropped message for client {}", client_id);
            }
        }
    }

    async fn send_error(&self, client_id: u32, error: impl Display) {
        self.send(client_id, &ServerMessage::Error(error.to_string()))
            .await;
    }

    async fn broadcast(&self, message: &ServerMessage) {
        if let Some(text) = encode(message) {
            self.clients.write().await.broadcast(&text);
        }
    }

    async fn broadcast_state(&self) {
        self.broadcast(&ServerMessage::StateUpdate(self.game_state.snapshot()))
            .await;
    }

    /// Sends the reason, then drops the client so its socket closes
    async fn reject(&self, client_id: u32, reason: &str) {
        self.send_error(client_id, reason).await;
        self.clients.write().await.remove_client(&client_id);
        for observer in self.game_state.observers() {
            observer.on_connection_rejected(reason);
        }
    }

    async fn handle_event(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Connected {
                client_id,
                namespace,
            } => self.handle_connected(client_id, namespace).await,
            NetworkEvent::MessageReceived { client_id, message } => {
                self.handle_message(client_id, message).await;
            }
            NetworkEvent::Malformed { client_id, error } => {
                warn!("Malformed message from client {}: {}", client_id, error);
                let pending =
                    self.clients.read().await.kind(client_id) == Some(ClientKind::Pending);
                if pending {
                    // Only a handshake is expected before joining
                    let reason = GameError::InvalidHandshake(error).to_string();
                    self.reject(client_id, &reason).await;
                } else {
                    self.send_error(client_id, format!("malformed message: {}", error))
                        .await;
                }
            }
            NetworkEvent::Rejected { addr, reason } => {
                info!("Rejected connection from {}: {}", addr, reason);
                for observer in self.game_state.observers() {
                    observer.on_connection_rejected(&reason);
                }
            }
            NetworkEvent::Disconnected { client_id } | NetworkEvent::ClientTimeout { client_id } => {
                self.clients.write().await.remove_client(&client_id);
                if self.game_state.leave(client_id).is_some() {
                    self.broadcast_state().await;
                }
            }
        }
    }

    async fn handle_connected(&mut self, client_id: u32, namespace: Namespace) {
        if namespace == Namespace::Controller {
            let claimed = self.clients.write().await.claim_controller(client_id);
            if !claimed {
                self.reject(client_id, "A controller is already connected")
                    .await;
                return;
            }
            info!("Client {} is now the controller", client_id);
        }

        self.send(client_id, &ServerMessage::Lobby(self.game_state.lobby()))
            .await;
        if namespace == Namespace::Controller {
            self.send(
                client_id,
                &ServerMessage::StateUpdate(self.game_state.snapshot()),
            )
            .await;
        }
    }

    async fn handle_message(&mut self, client_id: u32, message: ClientMessage) {
        let Some(kind) = self.clients.read().await.kind(client_id) else {
            debug!("Message from unknown client {}", client_id);
            return;
        };

        match (kind, message) {
            (ClientKind::Pending, ClientMessage::Auth(handshake)) => {
                self.handle_auth(client_id, handshake).await;
            }
            (ClientKind::Pending, _) => {
                self.send_error(client_id, "authenticate first").await;
            }
            (ClientKind::Player(entity), ClientMessage::RoundOptionSelected(value)) => {
                self.handle_option_selected(client_id, entity, value).await;
            }
            (ClientKind::Player(_), ClientMessage::Auth(_)) => {
                self.send_error(client_id, format!("client {} has already joined", client_id))
                    .await;
            }
            (ClientKind::Player(_), _) => {
                self.send_error(client_id, "only the controller can run the game")
                    .await;
            }
            (ClientKind::Controller, ClientMessage::StartGame) => {
                let result = self.game_state.start_game();
                self.handle_round_command(client_id, result).await;
            }
            (ClientKind::Controller, ClientMessage::NextRound) => {
                let result = self.game_state.next_round();
                self.handle_round_command(client_id, result).await;
            }
            (ClientKind::Controller, ClientMessage::ResolveRound) => {
                match self.game_state.resolve_round() {
                    Ok(_) => self.broadcast_state().await,
                    Err(e) => self.send_error(client_id, e).await,
                }
            }
            (ClientKind::Controller, _) => {
                self.send_error(client_id, "the controller does not vote")
                    .await;
            }
        }
    }

    async fn handle_auth(&mut self, client_id: u32, handshake: Handshake) {
        match self.game_state.join(client_id, &handshake) {
            Ok(entity) => {
                self.clients
                    .write()
                    .await
                    .promote_player(client_id, entity);
                let welcome = Welcome {
                    client_id,
                    nickname: handshake.nickname.trim().to_string(),
                    role: entity.role,
                    economy: entity.economy,
                };
                self.send(client_id, &ServerMessage::Welcome(welcome)).await;
                self.broadcast_state().await;
            }
            Err(e) => self.reject(client_id, &e.to_string()).await,
        }
    }

    async fn handle_option_selected(
        &mut self,
        client_id: u32,
        entity: EntityRef,
        value: Option<f64>,
    ) {
        match self.game_state.on_option_selected(client_id, value) {
            Ok(tally) => {
                if let Some(text) = encode(&ServerMessage::Votes(tally)) {
                    let players = self.game_state.entity_players(entity);
                    self.clients.write().await.send_to_many(&players, &text);
                }
                self.broadcast_state().await;
            }
            Err(e) => self.send_error(client_id, e).await,
        }
    }

    async fn handle_round_command(
        &mut self,
        client_id: u32,
        result: Result<u32, GameError>,
    ) {
        match result {
            Ok(number) => {
                self.send(client_id, &ServerMessage::NextRound(number)).await;
                self.broadcast_state().await;
                if let Some(seconds) = self.game_state.round().and_then(|r| r.time_remaining()) {
                    self.broadcast(&ServerMessage::TimeUpdate(seconds)).await;
                }
            }
            Err(e) => self.send_error(client_id, e).await,
        }
    }

    async fn on_tick(&mut self) {
        self.tick += 1;

        match self.game_state.tick() {
            Some(GameTick::Remaining(seconds)) => {
                self.broadcast(&ServerMessage::TimeUpdate(seconds)).await;
            }
            Some(GameTick::Resolved(_)) => {
                self.broadcast(&ServerMessage::TimeUpdate(0)).await;
                self.broadcast_state().await;
            }
            None => {}
        }

        // Periodic health report
        if self.tick % HEALTH_REPORT_INTERVAL == 0 {
            let connections = self.clients.read().await.len();
            let report = self.monitor.report();
            let line = format!(
                "Health: up {}s, {} connections, {} players seated, {} votes, {} rounds resolved, {} rejected, {} critical errors",
                report.uptime.as_secs(),
                connections,
                report.active_players(),
                report.votes_cast,
                report.rounds_resolved,
                report.connections_rejected,
                report.critical_errors
            );
            if report.is_healthy() {
                info!("{}", line);
            } else {
                warn!("{}", line);
            }
        }
    }

    /// Main server loop: network events and the one-second round clock
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.spawn_acceptor();
        self.spawn_timeout_checker();

        let mut tick_interval = interval(Duration::from_secs(1));
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // Skip the first tick since it fires immediately
        tick_interval.tick().await;

        info!("Server started successfully");

        loop {
            tokio::select! {
                event = self.event_rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event).await,
                        None => {
                            info!("Server shutting down");
                            break;
                        }
                    }
                },
                _ = tick_interval.tick() => {
                    self.on_tick().await;
                },
            }
        }

        Ok(())
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match message.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            error!("Failed to encode outgoing message: {}", e);
            None
        }
    }
}

/// Drives one WebSocket: forwards its frames to the main loop and writes
/// whatever the main loop queues for it
async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    clients: Arc<RwLock<ClientManager>>,
    event_tx: mpsc::UnboundedSender<NetworkEvent>,
) {
    let mut path = String::new();
    let callback = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        path = request.uri().path().to_string();
        Ok(response)
    };
    let ws_stream = match accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();

    let Some(namespace) = Namespace::from_path(&path) else {
        let reason = format!("Unknown namespace {}", path);
        close_with_error(&mut ws_sender, &reason).await;
        let _ = event_tx.send(NetworkEvent::Rejected { addr, reason });
        return;
    };

    let (tx, mut rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);
    let client_id = clients.write().await.add_client(addr, namespace, tx);
    let Some(client_id) = client_id else {
        let reason = "Server full".to_string();
        close_with_error(&mut ws_sender, &reason).await;
        let _ = event_tx.send(NetworkEvent::Rejected { addr, reason });
        return;
    };

    if event_tx
        .send(NetworkEvent::Connected {
            client_id,
            namespace,
        })
        .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            outgoing = rx.recv() => {
                match outgoing {
                    Some(text) => {
                        if let Err(e) = ws_sender.send(Message::Text(text)).await {
                            debug!("Failed to write to client {}: {}", client_id, e);
                            break;
                        }
                    }
                    // Removed by the server
                    None => break,
                }
            },
            incoming = ws_receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        clients.write().await.touch(client_id);
                        let event = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(message) => NetworkEvent::MessageReceived { client_id, message },
                            Err(e) => NetworkEvent::Malformed { client_id, error: e.to_string() },
                        };
                        if event_tx.send(event).is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {
                        clients.write().await.touch(client_id);
                    }
                    Some(Err(e)) => {
                        debug!("Connection error for client {}: {}", client_id, e);
                        break;
                    }
                }
            },
        }
    }

    let _ = ws_sender.close().await;
    let _ = event_tx.send(NetworkEvent::Disconnected { client_id });
}

async fn close_with_error<S>(ws_sender: &mut S, reason: &str)
where
    S: Sink<Message> + Unpin,
{
    if let Some(text) = encode(&ServerMessage::Error(reason.to_string())) {
        let _ = ws_sender.send(Message::Text(text)).await;
    }
    let _ = ws_sender.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::GameData;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;
    use futures_util::Stream;
    use tokio_tungstenite::connect_async;

    fn test_config() -> ServerConfig {
        ServerConfig {
            port: 0,
            ..ServerConfig::default()
        }
    }

    fn test_game() -> GameState {
        let data = GameData::from_value(json!({
            "countries": [{"name": "Mexico", "flag": "MX", "events": []}]
        }));
        GameState::new(data, 30, StdRng::seed_from_u64(1))
    }

    async fn next_message<S>(stream: &mut S) -> ServerMessage
    where
        S: Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(5), stream.next())
                .await
                .expect("timed out waiting for the server")
                .expect("stream closed")
                .expect("websocket error");
            if let Message::Text(text) = frame {
                return serde_json::from_str(&text).unwrap();
            }
        }
    }

    #[test]
    fn test_encode_uses_event_envelope() {
        let text = encode(&ServerMessage::TimeUpdate(42)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "timeUpdate");
        assert_eq!(value["data"], 42);
    }

    #[test]
    fn test_channel_communication() {
        let (tx, mut rx) = mpsc::unbounded_channel::<NetworkEvent>();
        assert!(tx.send(NetworkEvent::ClientTimeout { client_id: 42 }).is_ok());

        match rx.try_recv() {
            Ok(NetworkEvent::ClientTimeout { client_id }) => assert_eq!(client_id, 42),
            other => panic!("Unexpected message: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_reports_local_addr() {
        let server = tokio_test::assert_ok!(Server::bind(&test_config(), test_game()).await);
        assert_ne!(server.local_addr().port(), 0);
        assert_eq!(server.health().players_joined, 0);
    }

    #[tokio::test]
    async fn test_player_receives_lobby_and_welcome() {
        let mut server = Server::bind(&test_config(), test_game()).await.unwrap();
        let url = format!("ws://{}/", server.local_addr());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (ws, _) = connect_async(url).await.unwrap();
        let (mut sender, mut receiver) = ws.split();

        match next_message(&mut receiver).await {
            ServerMessage::Lobby(lobby) => assert_eq!(lobby.countries[0].name, "Mexico"),
            other => panic!("Expected lobby, got {:?}", other),
        }

        let auth = ClientMessage::Auth(Handshake {
            nickname: "Ana".to_string(),
            role: 1,
            economy: 0,
        });
        sender
            .send(Message::Text(serde_json::to_string(&auth).unwrap()))
            .await
            .unwrap();

        match next_message(&mut receiver).await {
            ServerMessage::Welcome(welcome) => {
                assert_eq!(welcome.nickname, "Ana");
                assert_eq!(welcome.economy, 0);
            }
            other => panic!("Expected welcome, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_namespace_is_closed() {
        let mut server = Server::bind(&test_config(), test_game()).await.unwrap();
        let url = format!("ws://{}/admin", server.local_addr());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (ws, _) = connect_async(url).await.unwrap();
        let (_sender, mut receiver) = ws.split();
        match next_message(&mut receiver).await {
            ServerMessage::Error(reason) => assert!(reason.contains("/admin")),
            other => panic!("Expected error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreadable_handshake_is_rejected() {
        let mut server = Server::bind(&test_config(), test_game()).await.unwrap();
        let url = format!("ws://{}/", server.local_addr());
        tokio::spawn(async move {
            let _ = server.run().await;
        });

        let (ws, _) = connect_async(url).await.unwrap();
        let (mut sender, mut receiver) = ws.split();
        assert!(matches!(
            next_message(&mut receiver).await,
            ServerMessage::Lobby(_)
        ));

        let auth = r#"{"event": "auth", "data": {"nickname": "Ana", "role": "0", "economy": 1.5}}"#;
        sender.send(Message::Text(auth.to_string())).await.unwrap();

        match next_message(&mut receiver).await {
            ServerMessage::Error(reason) => {
                assert!(reason.starts_with("invalid handshake"), "{}", reason)
            }
            other => panic!("Expected error, got {:?}", other),
        }

        // The server closes the connection after rejecting it
        let closed = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                match receiver.next().await {
                    Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                    Some(Ok(_)) => {}
                }
            }
        })
        .await;
        assert!(closed.is_ok());
    }
}
