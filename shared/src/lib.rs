use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_ROUND_SECONDS: u32 = 90;
pub const MAX_ROUND_SECONDS: u32 = 600;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;
pub const MAX_NICKNAME_LEN: usize = 50;
pub const MIN_OPTION_VALUE: f64 = -1.0;
pub const MAX_OPTION_VALUE: f64 = 100.0;

/// Request path players connect on.
pub const PLAYER_PATH: &str = "/";
/// Request path reserved for the single privileged controller.
pub const CONTROLLER_PATH: &str = "/server";

/// Which side of an economy a player belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Bank,
    Government,
}

impl Role {
    /// Maps the handshake's numeric role (0 = bank, 1 = government)
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Role::Bank),
            1 => Some(Role::Government),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Role::Bank => 0,
            Role::Government => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Bank => "Bank",
            Role::Government => "Government",
        }
    }
}

/// First message a player sends after connecting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Handshake {
    pub nickname: String,
    pub role: i64,
    pub economy: i64,
}

/// Messages sent from clients to the server
///
/// Encoded as `{"event": "...", "data": ...}` JSON text frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    Auth(Handshake),
    RoundOptionSelected(Option<f64>),
    StartGame,
    NextRound,
    ResolveRound,
}

/// Messages sent from the server to clients
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Lobby(LobbyInfo),
    Welcome(Welcome),
    StateUpdate(GameSnapshot),
    Votes(VoteTally),
    TimeUpdate(u32),
    NextRound(u32),
    Error(String),
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountrySummary {
    pub index: usize,
    pub name: String,
    pub flag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LobbyInfo {
    pub countries: Vec<CountrySummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Welcome {
    pub client_id: u32,
    pub nickname: String,
    pub role: Role,
    pub economy: usize,
}

/// Percentage of an entity's players behind each option, keyed by option index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteTally {
    pub economy: usize,
    pub role: Role,
    pub percentages: BTreeMap<usize, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSnapshot {
    pub started: bool,
    pub round: Option<RoundSnapshot>,
    pub economies: Vec<EconomySnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundSnapshot {
    pub number: u32,
    pub ended: bool,
    pub time_remaining: Option<u32>,
    pub global_event: Option<EventSummary>,
    pub results: Vec<RoundResultSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSummary {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundResultSnapshot {
    pub economy: usize,
    pub bank_choice: Option<usize>,
    pub government_choice: Option<usize>,
    pub outcome: Option<String>,
    pub score_gained: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorsSnapshot {
    pub interest_rate: f64,
    pub consumption: f64,
    pub investment: f64,
    pub spending: f64,
    pub money_supply: f64,
    pub price_level: f64,
    pub money_demand: f64,
    pub investment_sensitivity: f64,
    pub income_sensitivity: f64,
    pub interest_sensitivity: f64,
    pub pib: f64,
    pub is_output: f64,
    pub lm_output: f64,
    pub equilibrium_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalEventSnapshot {
    pub name: String,
    pub description: String,
    pub bank_options: Vec<String>,
    pub government_options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub role: Role,
    pub players: Vec<String>,
    pub votes: BTreeMap<usize, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomySnapshot {
    pub index: usize,
    pub name: String,
    pub flag: String,
    pub indicators: IndicatorsSnapshot,
    pub score: u64,
    pub score_factor: f64,
    pub event: Option<LocalEventSnapshot>,
    pub bank: EntitySnapshot,
    pub government: EntitySnapshot,
}

/// Outcome of a validation pass; failures are reported, never raised
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
        }
    }

    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
        }
    }

    pub fn message(&self) -> String {
        self.errors.join("; ")
    }
}

/// Checks a player handshake; the economy upper bound is checked by the game
pub fn validate_handshake(handshake: &Handshake) -> ValidationResult {
    let mut errors = Vec::new();
    let nickname = handshake.nickname.trim();

    if nickname.is_empty() {
        errors.push("nickname must not be empty".to_string());
    } else if nickname.chars().count() > MAX_NICKNAME_LEN {
        errors.push(format!(
            "nickname must be at most {} characters",
            MAX_NICKNAME_LEN
        ));
    }
    if nickname.contains('<') || nickname.contains('>') {
        errors.push("nickname must not contain angle brackets".to_string());
    }
    if Role::from_code(handshake.role).is_none() {
        errors.push(format!(
            "role must be 0 (bank) or 1 (government), got {}",
            handshake.role
        ));
    }
    if handshake.economy < 0 {
        errors.push(format!(
            "economy must be a non-negative index, got {}",
            handshake.economy
        ));
    }

    ValidationResult::from_errors(errors)
}

/// A parsed `roundOptionSelected` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    Choose(usize),
    Clear,
}

/// Null and -1 clear the vote; anything else must be an integer in range
pub fn parse_selection(value: Option<f64>) -> Result<Selection, ValidationResult> {
    let Some(value) = value else {
        return Ok(Selection::Clear);
    };

    let mut errors = Vec::new();
    if !value.is_finite() {
        errors.push("option must be a finite number".to_string());
    } else {
        if !(MIN_OPTION_VALUE..=MAX_OPTION_VALUE).contains(&value) {
            errors.push(format!(
                "option must be within [{}, {}], got {}",
                MIN_OPTION_VALUE, MAX_OPTION_VALUE, value
            ));
        }
        if value.fract() != 0.0 {
            errors.push(format!("option must be an integer, got {}", value));
        }
    }
    if !errors.is_empty() {
        return Err(ValidationResult::from_errors(errors));
    }

    if value < 0.0 {
        Ok(Selection::Clear)
    } else {
        Ok(Selection::Choose(value as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn handshake(nickname: &str, role: i64, economy: i64) -> Handshake {
        Handshake {
            nickname: nickname.to_string(),
            role,
            economy,
        }
    }

    #[test]
    fn test_role_codes() {
        assert_eq!(Role::from_code(0), Some(Role::Bank));
        assert_eq!(Role::from_code(1), Some(Role::Government));
        assert_eq!(Role::from_code(2), None);
        assert_eq!(Role::from_code(-1), None);
        assert_eq!(Role::Government.code(), 1);
    }

    #[test]
    fn test_valid_handshake() {
        let result = validate_handshake(&handshake("Ana", 0, 2));
        assert!(result.is_valid);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_handshake_collects_every_error() {
        let result = validate_handshake(&handshake("<b>", 5, -1));
        assert!(!result.is_valid);
        assert_eq!(result.errors.len(), 3);
        assert!(result.message().contains("angle brackets"));
    }

    #[test]
    fn test_handshake_nickname_length() {
        assert!(!validate_handshake(&handshake("   ", 0, 0)).is_valid);
        assert!(validate_handshake(&handshake(&"a".repeat(50), 0, 0)).is_valid);
        assert!(!validate_handshake(&handshake(&"a".repeat(51), 0, 0)).is_valid);
    }

    #[test]
    fn test_parse_selection() {
        assert_eq!(parse_selection(None), Ok(Selection::Clear));
        assert_eq!(parse_selection(Some(-1.0)), Ok(Selection::Clear));
        assert_eq!(parse_selection(Some(0.0)), Ok(Selection::Choose(0)));
        assert_eq!(parse_selection(Some(100.0)), Ok(Selection::Choose(100)));
        assert!(parse_selection(Some(101.0)).is_err());
        assert!(parse_selection(Some(-2.0)).is_err());
        assert!(parse_selection(Some(1.5)).is_err());
        assert!(parse_selection(Some(f64::NAN)).is_err());
    }

    #[test]
    fn test_client_message_wire_format() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"roundOptionSelected","data":2}"#).unwrap();
        assert_eq!(msg, ClientMessage::RoundOptionSelected(Some(2.0)));

        let msg: ClientMessage =
            serde_json::from_str(r#"{"event":"roundOptionSelected","data":null}"#).unwrap();
        assert_eq!(msg, ClientMessage::RoundOptionSelected(None));

        let msg: ClientMessage = serde_json::from_str(r#"{"event":"startGame"}"#).unwrap();
        assert_eq!(msg, ClientMessage::StartGame);

        let msg: ClientMessage = serde_json::from_str(
            r#"{"event":"auth","data":{"nickname":"Rui","role":1,"economy":0}}"#,
        )
        .unwrap();
        assert_eq!(msg, ClientMessage::Auth(handshake("Rui", 1, 0)));
    }

    #[test]
    fn test_server_message_wire_format() {
        let json = ServerMessage::TimeUpdate(42).to_json().unwrap();
        assert_eq!(json, r#"{"event":"timeUpdate","data":42}"#);

        let mut percentages = BTreeMap::new();
        percentages.insert(0, 25.0);
        percentages.insert(1, 75.0);
        let tally = ServerMessage::Votes(VoteTally {
            economy: 1,
            role: Role::Bank,
            percentages,
        });
        let json = tally.to_json().unwrap();
        let back: ServerMessage = serde_json::from_str(&json).unwrap();
        match back {
            ServerMessage::Votes(t) => {
                assert_eq!(t.role, Role::Bank);
                assert_approx_eq!(t.percentages[&1], 75.0);
            }
            _ => panic!("Unexpected message type"),
        }
    }
}
