//! Per-connection client state, updated from server messages

use log::{debug, warn};
use shared::{GameSnapshot, LobbyInfo, Role, ServerMessage, VoteTally};
use std::collections::BTreeMap;

/// What changed after applying a server message
#[derive(Debug, Clone, PartialEq)]
pub enum SessionUpdate {
    Lobby,
    Joined,
    State,
    Votes,
    Time(u32),
    RoundStarted(u32),
    Error(String),
}

/// Everything one connection knows about the game
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub client_id: Option<u32>,
    pub nickname: Option<String>,
    pub role: Option<Role>,
    pub economy: Option<usize>,
    pub lobby: Option<LobbyInfo>,
    pub snapshot: Option<GameSnapshot>,
    /// Latest percentages for this player's entity, keyed by option index
    pub votes: BTreeMap<usize, f64>,
    pub time_remaining: Option<u32>,
    pub round: Option<u32>,
    pub last_error: Option<String>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_joined(&self) -> bool {
        self.client_id.is_some()
    }

    pub fn apply(&mut self, message: ServerMessage) -> SessionUpdate {
        match message {
            ServerMessage::Lobby(lobby) => {
                debug!("Lobby lists {} countries", lobby.countries.len());
                self.lobby = Some(lobby);
                SessionUpdate::Lobby
            }
            ServerMessage::Welcome(welcome) => {
                self.client_id = Some(welcome.client_id);
                self.nickname = Some(welcome.nickname);
                self.role = Some(welcome.role);
                self.economy = Some(welcome.economy);
                SessionUpdate::Joined
            }
            ServerMessage::StateUpdate(snapshot) => {
                if let Some(round) = &snapshot.round {
                    self.round = Some(round.number);
                    self.time_remaining = round.time_remaining;
                }
                if let Some(votes) = self.entity_votes(&snapshot) {
                    self.votes = votes;
                }
                self.snapshot = Some(snapshot);
                SessionUpdate::State
            }
            ServerMessage::Votes(tally) => {
                self.apply_votes(tally);
                SessionUpdate::Votes
            }
            ServerMessage::TimeUpdate(seconds) => {
                self.time_remaining = Some(seconds);
                SessionUpdate::Time(seconds)
            }
            ServerMessage::NextRound(number) => {
                self.round = Some(number);
                self.votes.clear();
                SessionUpdate::RoundStarted(number)
            }
            ServerMessage::Error(reason) => {
                warn!("Server error: {}", reason);
                self.last_error = Some(reason.clone());
                SessionUpdate::Error(reason)
            }
        }
    }

    fn apply_votes(&mut self, tally: VoteTally) {
        if Some(tally.economy) == self.economy && Some(tally.role) == self.role {
            self.votes = tally.percentages;
        } else {
            debug!(
                "Ignoring tally for the {} of economy {}",
                tally.role.label(),
                tally.economy
            );
        }
    }

    fn entity_votes(&self, snapshot: &GameSnapshot) -> Option<BTreeMap<usize, f64>> {
        let economy = snapshot.economies.get(self.economy?)?;
        let entity = match self.role? {
            Role::Bank => &economy.bank,
            Role::Government => &economy.government,
        };
        Some(entity.votes.clone())
    }

    /// Option texts this player can currently vote on
    pub fn options(&self) -> Vec<String> {
        let (Some(snapshot), Some(index), Some(role)) = (&self.snapshot, self.economy, self.role)
        else {
            return Vec::new();
        };
        snapshot
            .economies
            .get(index)
            .and_then(|economy| economy.event.as_ref())
            .map(|event| match role {
                Role::Bank => event.bank_options.clone(),
                Role::Government => event.government_options.clone(),
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{
        EconomySnapshot, EntitySnapshot, IndicatorsSnapshot, LocalEventSnapshot, RoundSnapshot,
        Welcome,
    };

    fn indicators() -> IndicatorsSnapshot {
        IndicatorsSnapshot {
            interest_rate: 0.1,
            consumption: 600.0,
            investment: 200.0,
            spending: 200.0,
            money_supply: 980.0,
            price_level: 100.0,
            money_demand: 1.0,
            investment_sensitivity: 100.0,
            income_sensitivity: 1.0,
            interest_sensitivity: 100.0,
            pib: 1000.0,
            is_output: 990.0,
            lm_output: 990.0,
            equilibrium_rate: 0.1,
        }
    }

    fn snapshot(bank_votes: BTreeMap<usize, f64>) -> GameSnapshot {
        GameSnapshot {
            started: true,
            round: Some(RoundSnapshot {
                number: 2,
                ended: false,
                time_remaining: Some(45),
                global_event: None,
                results: Vec::new(),
            }),
            economies: vec![EconomySnapshot {
                index: 0,
                name: "Peru".to_string(),
                flag: "PE".to_string(),
                indicators: indicators(),
                score: 0,
                score_factor: 1.0,
                event: Some(LocalEventSnapshot {
                    name: "Drought".to_string(),
                    description: String::new(),
                    bank_options: vec!["Ease".to_string(), "Hold".to_string()],
                    government_options: vec!["Subsidise".to_string()],
                }),
                bank: EntitySnapshot {
                    role: Role::Bank,
                    players: vec!["Ana".to_string()],
                    votes: bank_votes,
                },
                government: EntitySnapshot {
                    role: Role::Government,
                    players: Vec::new(),
                    votes: BTreeMap::new(),
                },
            }],
        }
    }

    fn joined_session() -> Session {
        let mut session = Session::new();
        session.apply(ServerMessage::Welcome(Welcome {
            client_id: 4,
            nickname: "Ana".to_string(),
            role: Role::Bank,
            economy: 0,
        }));
        session
    }

    #[test]
    fn test_welcome_joins_session() {
        let session = Session::new();
        assert!(!session.is_joined());

        let session = joined_session();
        assert!(session.is_joined());
        assert_eq!(session.client_id, Some(4));
        assert_eq!(session.role, Some(Role::Bank));
        assert_eq!(session.economy, Some(0));
    }

    #[test]
    fn test_state_update_tracks_round_and_votes() {
        let mut session = joined_session();
        let votes = BTreeMap::from([(0, 25.0), (1, 75.0)]);
        assert_eq!(
            session.apply(ServerMessage::StateUpdate(snapshot(votes))),
            SessionUpdate::State
        );
        assert_eq!(session.round, Some(2));
        assert_eq!(session.time_remaining, Some(45));
        assert_approx_eq!(session.votes[&1], 75.0);
        assert_eq!(session.options(), vec!["Ease".to_string(), "Hold".to_string()]);
    }

    #[test]
    fn test_votes_for_other_entities_are_ignored() {
        let mut session = joined_session();
        session.apply(ServerMessage::Votes(VoteTally {
            economy: 0,
            role: Role::Government,
            percentages: BTreeMap::from([(0, 100.0)]),
        }));
        assert!(session.votes.is_empty());

        session.apply(ServerMessage::Votes(VoteTally {
            economy: 0,
            role: Role::Bank,
            percentages: BTreeMap::from([(0, 50.0), (1, 50.0)]),
        }));
        assert_eq!(session.votes.len(), 2);
    }

    #[test]
    fn test_time_and_errors() {
        let mut session = Session::new();
        assert_eq!(session.apply(ServerMessage::TimeUpdate(9)), SessionUpdate::Time(9));
        assert_eq!(session.time_remaining, Some(9));

        let update = session.apply(ServerMessage::Error("Server full".to_string()));
        assert_eq!(update, SessionUpdate::Error("Server full".to_string()));
        assert_eq!(session.last_error.as_deref(), Some("Server full"));
    }

    #[test]
    fn test_next_round_resets_votes() {
        let mut session = joined_session();
        session.votes.insert(0, 100.0);
        assert_eq!(
            session.apply(ServerMessage::NextRound(3)),
            SessionUpdate::RoundStarted(3)
        );
        assert!(session.votes.is_empty());
        assert_eq!(session.round, Some(3));
    }
}
