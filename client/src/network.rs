use crate::input::{Command, HELP};
use crate::rendering::{render_lobby, render_player_view, render_snapshot};
use crate::session::{Session, SessionUpdate};
use futures_util::{SinkExt, StreamExt};
use log::{error, info, warn};
use shared::{ClientMessage, Handshake, ServerMessage, CONTROLLER_PATH, PLAYER_PATH};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// How this connection takes part in the game
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    Player(Handshake),
    Controller,
}

impl Mode {
    pub fn path(&self) -> &'static str {
        match self {
            Mode::Player(_) => PLAYER_PATH,
            Mode::Controller => CONTROLLER_PATH,
        }
    }
}

/// Builds the WebSocket URL for a `host:port` or full `ws://` address
pub fn server_url(server: &str, mode: &Mode) -> String {
    let base = server.trim_end_matches('/');
    let base = if base.starts_with("ws://") || base.starts_with("wss://") {
        base.to_string()
    } else {
        format!("ws://{}", base)
    };
    let path = mode.path().trim_start_matches('/');
    format!("{}/{}", base, path)
}

pub struct Client {
    socket: Socket,
    mode: Mode,
    session: Session,
}

impl Client {
    pub async fn connect(server: &str, mode: Mode) -> Result<Self, Box<dyn std::error::Error>> {
        let url = server_url(server, &mode);
        info!("Connecting to {}", url);
        let (socket, _) = connect_async(url.as_str()).await?;

        Ok(Client {
            socket,
            mode,
            session: Session::new(),
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    async fn send(&mut self, message: &ClientMessage) -> Result<(), Box<dyn std::error::Error>> {
        let text = serde_json::to_string(message)?;
        self.socket.send(Message::Text(text)).await?;
        Ok(())
    }

    fn handle_message(&mut self, message: ServerMessage) {
        let is_controller = self.mode == Mode::Controller;
        match self.session.apply(message) {
            SessionUpdate::Lobby => {
                if let Some(lobby) = &self.session.lobby {
                    print!("{}", render_lobby(lobby));
                }
            }
            SessionUpdate::Joined => {
                if let (Some(nickname), Some(role), Some(economy)) = (
                    &self.session.nickname,
                    self.session.role,
                    self.session.economy,
                ) {
                    println!(
                        "Joined as {} in the {} of economy {}",
                        nickname,
                        role.label(),
                        economy
                    );
                }
            }
            SessionUpdate::State | SessionUpdate::Votes => {
                if is_controller {
                    if let Some(snapshot) = &self.session.snapshot {
                        print!("{}", render_snapshot(snapshot));
                    }
                } else {
                    print!("{}", render_player_view(&self.session));
                }
            }
            SessionUpdate::Time(seconds) => {
                if seconds == 0 || seconds % 10 == 0 {
                    println!("{}s left", seconds);
                }
            }
            SessionUpdate::RoundStarted(number) => println!("Round {} started", number),
            SessionUpdate::Error(reason) => println!("Error: {}", reason),
        }
    }

    /// Returns false when the user asked to quit
    async fn handle_command(&mut self, line: &str) -> Result<bool, Box<dyn std::error::Error>> {
        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(e) => {
                println!("{} ({})", e, HELP);
                return Ok(true);
            }
        };

        match command {
            Command::Quit => return Ok(false),
            Command::Help => println!("{}", HELP),
            Command::Status => {
                let view = match self.mode {
                    Mode::Controller => self
                        .session
                        .snapshot
                        .as_ref()
                        .map(render_snapshot)
                        .unwrap_or_default(),
                    Mode::Player(_) => render_player_view(&self.session),
                };
                print!("{}", view);
            }
            _ => {
                if let Some(message) = command.to_message() {
                    self.send(&message).await?;
                }
            }
        }
        Ok(true)
    }

    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Mode::Player(handshake) = &self.mode {
            let auth = ClientMessage::Auth(handshake.clone());
            self.send(&auth).await?;
        }
        println!("{}", HELP);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        loop {
            tokio::select! {
                frame = self.socket.next() => {
                    match frame {
                        Some(Ok(Message::Text(text))) => {
                            match serde_json::from_str::<ServerMessage>(&text) {
                                Ok(message) => self.handle_message(message),
                                Err(e) => warn!("Unreadable message from server: {}", e),
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            info!("Server closed the connection");
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            error!("Connection error: {}", e);
                            break;
                        }
                    }
                },
                line = lines.next_line() => {
                    match line {
                        Ok(Some(line)) => {
                            if line.trim().is_empty() {
                                continue;
                            }
                            if !self.handle_command(&line).await? {
                                break;
                            }
                        }
                        // stdin closed
                        Ok(None) => break,
                        Err(e) => {
                            error!("Failed to read input: {}", e);
                            break;
                        }
                    }
                },
            }
        }

        let _ = self.socket.close(None).await;
        if let Some(reason) = &self.session.last_error {
            info!("Last server error: {}", reason);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player() -> Mode {
        Mode::Player(Handshake {
            nickname: "Ana".to_string(),
            role: 0,
            economy: 0,
        })
    }

    #[test]
    fn test_server_url() {
        assert_eq!(server_url("127.0.0.1:3000", &player()), "ws://127.0.0.1:3000/");
        assert_eq!(
            server_url("127.0.0.1:3000", &Mode::Controller),
            "ws://127.0.0.1:3000/server"
        );
        assert_eq!(
            server_url("ws://example.org:3000/", &Mode::Controller),
            "ws://example.org:3000/server"
        );
    }

    #[tokio::test]
    async fn test_connect_refused() {
        let result = Client::connect("127.0.0.1:1", Mode::Controller).await;
        assert!(result.is_err());
    }
}
