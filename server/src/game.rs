use crate::country::Country;
use crate::entity::EntityRef;
use crate::error::GameError;
use crate::events::{GameData, GlobalEvent};
use crate::monitor::GameObserver;
use crate::round::{Round, RoundFailure, TimerTick};
use log::{info, warn};
use rand::rngs::StdRng;
use shared::{
    parse_selection, validate_handshake, GameSnapshot, Handshake, LobbyInfo, Role, Selection,
    VoteTally,
};
use std::collections::HashMap;
use std::sync::Arc;

/// Result of advancing the round clock by one second
#[derive(Debug, Clone, PartialEq)]
pub enum GameTick {
    Remaining(u32),
    /// The countdown ran out and the round was resolved
    Resolved(Vec<RoundFailure>),
}

/// Authoritative state of the classroom session
///
/// Owned by the server's main loop; every mutation happens there in order.
pub struct GameState {
    countries: Vec<Country>,
    global_events: Vec<GlobalEvent>,
    round: Option<Round>,
    started: bool,
    round_seconds: u32,
    players: HashMap<u32, EntityRef>,
    rng: StdRng,
    observers: Vec<Arc<dyn GameObserver>>,
}

impl GameState {
    pub fn new(data: GameData, round_seconds: u32, rng: StdRng) -> Self {
        Self {
            countries: data.countries.into_iter().map(Country::new).collect(),
            global_events: data.global_events,
            round: None,
            started: false,
            round_seconds,
            players: HashMap::new(),
            rng,
            observers: Vec::new(),
        }
    }

    pub fn add_observer(&mut self, observer: Arc<dyn GameObserver>) {
        self.observers.push(observer);
    }

    pub fn observers(&self) -> &[Arc<dyn GameObserver>] {
        &self.observers
    }

    pub fn countries(&self) -> &[Country] {
        &self.countries
    }

    pub fn country_count(&self) -> usize {
        self.countries.len()
    }

    pub fn round(&self) -> Option<&Round> {
        self.round.as_ref()
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn lobby(&self) -> LobbyInfo {
        LobbyInfo {
            countries: self
                .countries
                .iter()
                .enumerate()
                .map(|(index, country)| country.summary(index))
                .collect(),
        }
    }

    pub fn player(&self, client_id: u32) -> Option<EntityRef> {
        self.players.get(&client_id).copied()
    }

    /// Validates a handshake and seats the player in its entity
    pub fn join(&mut self, client_id: u32, handshake: &Handshake) -> Result<EntityRef, GameError> {
        if self.players.contains_key(&client_id) {
            return Err(GameError::AlreadyJoined(client_id));
        }

        let validation = validate_handshake(handshake);
        if !validation.is_valid {
            return Err(GameError::InvalidHandshake(validation.message()));
        }

        let count = self.countries.len();
        let economy = usize::try_from(handshake.economy)
            .ok()
            .filter(|index| *index < count)
            .ok_or(GameError::UnknownEconomy {
                index: handshake.economy,
                count,
            })?;
        let role = Role::from_code(handshake.role).ok_or_else(|| {
            GameError::InvalidHandshake(format!("unknown role {}", handshake.role))
        })?;

        let nickname = handshake.nickname.trim().to_string();
        let entity = EntityRef { economy, role };
        self.countries[economy]
            .entity_mut(role)
            .add_player(client_id, nickname.clone());
        self.players.insert(client_id, entity);

        for observer in &self.observers {
            observer.on_player_joined(client_id, &nickname, entity);
        }
        Ok(entity)
    }

    /// Removes a player and its vote; no-op for unknown clients
    pub fn leave(&mut self, client_id: u32) -> Option<EntityRef> {
        let entity = self.players.remove(&client_id)?;
        if let Some(country) = self.countries.get_mut(entity.economy) {
            country.entity_mut(entity.role).remove_player(client_id);
        }
        for observer in &self.observers {
            observer.on_player_left(client_id, entity);
        }
        Some(entity)
    }

    /// Starts round 1
    pub fn start_game(&mut self) -> Result<u32, GameError> {
        if self.started {
            return Err(GameError::AlreadyStarted);
        }
        self.started = true;
        info!("Game started with {} economies", self.countries.len());
        self.begin_round(1)
    }

    /// Starts the next round once the current one has been resolved
    pub fn next_round(&mut self) -> Result<u32, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        let number = match &self.round {
            Some(round) if !round.is_ended() => {
                return Err(GameError::RoundInProgress(round.number));
            }
            Some(round) => round.number + 1,
            None => 1,
        };
        self.begin_round(number)
    }

    fn begin_round(&mut self, number: u32) -> Result<u32, GameError> {
        let mut round = Round::new(number);
        round.start(&mut self.countries, &mut self.global_events, &mut self.rng);
        let seconds = round.start_timer(self.round_seconds)?;
        info!("Round {} running for {} seconds", number, seconds);
        self.round = Some(round);

        for observer in &self.observers {
            observer.on_round_started(number);
        }
        Ok(number)
    }

    /// Ends the active round now instead of waiting for the countdown
    pub fn resolve_round(&mut self) -> Result<Vec<RoundFailure>, GameError> {
        if !self.started {
            return Err(GameError::NotStarted);
        }
        match self.round.as_ref() {
            Some(round) if round.is_active() => Ok(self.finish_round()),
            _ => Err(GameError::NoActiveRound),
        }
    }

    fn finish_round(&mut self) -> Vec<RoundFailure> {
        let Some(round) = self.round.as_mut() else {
            return Vec::new();
        };
        let failures = round.resolve(&mut self.countries, &mut self.rng);
        let number = round.number;

        for observer in &self.observers {
            for failure in &failures {
                observer.on_critical_error(&format!(
                    "round {}: economy {} failed to resolve: {}",
                    number, failure.economy, failure.error
                ));
            }
            observer.on_round_resolved(number, failures.len());
        }
        failures
    }

    /// Advances the round countdown by one second
    pub fn tick(&mut self) -> Option<GameTick> {
        match self.round.as_mut()?.tick()? {
            TimerTick::Remaining(seconds) => Some(GameTick::Remaining(seconds)),
            TimerTick::Expired => Some(GameTick::Resolved(self.finish_round())),
        }
    }

    /// Records a player's choice for its entity's current event
    ///
    /// Returns the entity's updated tally for broadcasting to its players.
    pub fn on_option_selected(
        &mut self,
        client_id: u32,
        value: Option<f64>,
    ) -> Result<VoteTally, GameError> {
        let entity = self
            .players
            .get(&client_id)
            .copied()
            .ok_or(GameError::NotJoined(client_id))?;

        if !self.round.as_ref().is_some_and(Round::is_active) {
            return Err(if self.started {
                GameError::NoActiveRound
            } else {
                GameError::NotStarted
            });
        }

        let selection = parse_selection(value)
            .map_err(|result| GameError::InvalidSelection(result.message()))?;

        let country = self
            .countries
            .get_mut(entity.economy)
            .ok_or(GameError::UnknownEconomy {
                index: entity.economy as i64,
                count: 0,
            })?;
        if country.event.is_none() {
            return Err(GameError::NoEvent {
                economy: entity.economy,
                role: entity.role,
            });
        }

        let ballot = country.entity_mut(entity.role).vote_mut();
        match selection {
            Selection::Choose(option) => {
                if !ballot.cast(client_id, option) {
                    warn!(
                        "Client {} picked option {} outside the menu, clearing its vote",
                        client_id, option
                    );
                }
            }
            Selection::Clear => {
                ballot.clear(client_id);
            }
        }
        let choice = ballot.choice_of(client_id);
        let percentages = ballot.percentages();

        for observer in &self.observers {
            observer.on_vote_cast(client_id, entity, choice);
        }

        Ok(VoteTally {
            economy: entity.economy,
            role: entity.role,
            percentages,
        })
    }

    /// Client IDs seated in an entity
    pub fn entity_players(&self, entity: EntityRef) -> Vec<u32> {
        self.countries
            .get(entity.economy)
            .map(|country| country.entity(entity.role).player_ids())
            .unwrap_or_default()
    }

    pub fn snapshot(&self) -> GameSnapshot {
        GameSnapshot {
            started: self.started,
            round: self.round.as_ref().map(Round::snapshot),
            economies: self
                .countries
                .iter()
                .enumerate()
                .map(|(index, country)| country.snapshot(index))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitor::HealthMonitor;
    use rand::SeedableRng;
    use serde_json::json;

    fn scenario() -> GameData {
        GameData::from_value(json!({
            "countries": [
                {
                    "name": "Brasil",
                    "flag": "BR",
                    "events": [{
                        "name": "Inflation scare",
                        "bank": {"options": [{"id": 10, "text": "Raise rates"}, {"id": 11, "text": "Hold"}]},
                        "government": {"options": [{"text": "Cut spending"}]},
                        "outcomes": [
                            {"combo": [10, 0], "description": "Prices cool", "impact": {"interest_rate_change": 2}},
                            {"combo": [11, 0], "description": "Prices climb", "impact": {"price_level_change": 10}}
                        ]
                    }]
                },
                {"name": "Chile", "flag": "CL", "events": []}
            ],
            "globalEvents": [
                {"name": "Oil shock", "impact": {"price_level_factor": 1.1}, "score_factor": 2.0}
            ]
        }))
    }

    fn game() -> GameState {
        GameState::new(scenario(), 30, StdRng::seed_from_u64(17))
    }

    fn handshake(nickname: &str, role: i64, economy: i64) -> Handshake {
        Handshake {
            nickname: nickname.to_string(),
            role,
            economy,
        }
    }

    #[test]
    fn test_join_validates_handshake() {
        let mut game = game();
        let entity = game.join(1, &handshake("Ana", 0, 0)).unwrap();
        assert_eq!(entity.role, Role::Bank);
        assert_eq!(game.entity_players(entity), vec![1]);
        assert_eq!(game.join(1, &handshake("Ana", 0, 0)), Err(GameError::AlreadyJoined(1)));

        assert!(matches!(
            game.join(2, &handshake("<b>", 0, 0)),
            Err(GameError::InvalidHandshake(_))
        ));
        assert_eq!(
            game.join(3, &handshake("Rui", 1, 5)),
            Err(GameError::UnknownEconomy { index: 5, count: 2 })
        );
    }

    #[test]
    fn test_leave_removes_vote() {
        let mut game = game();
        let entity = game.join(1, &handshake("Ana", 0, 0)).unwrap();
        game.start_game().unwrap();
        game.on_option_selected(1, Some(1.0)).unwrap();

        assert_eq!(game.leave(1), Some(entity));
        assert_eq!(game.leave(1), None);
        assert!(game.countries()[0].bank.vote().is_empty());
        assert!(game.entity_players(entity).is_empty());
    }

    #[test]
    fn test_votes_require_active_round() {
        let mut game = game();
        game.join(1, &handshake("Ana", 0, 0)).unwrap();
        assert_eq!(game.on_option_selected(1, Some(0.0)), Err(GameError::NotStarted));
        assert_eq!(game.on_option_selected(9, Some(0.0)), Err(GameError::NotJoined(9)));

        game.start_game().unwrap();
        let tally = game.on_option_selected(1, Some(1.0)).unwrap();
        assert_eq!(tally.percentages[&1], 100.0);

        assert!(matches!(
            game.on_option_selected(1, Some(0.5)),
            Err(GameError::InvalidSelection(_))
        ));
        assert!(matches!(
            game.on_option_selected(1, Some(101.0)),
            Err(GameError::InvalidSelection(_))
        ));

        let cleared = game.on_option_selected(1, None).unwrap();
        assert!(cleared.percentages.values().all(|p| *p == 0.0));

        game.resolve_round().unwrap();
        assert_eq!(game.on_option_selected(1, Some(0.0)), Err(GameError::NoActiveRound));
    }

    #[test]
    fn test_out_of_menu_option_deselects() {
        let mut game = game();
        game.join(1, &handshake("Ana", 1, 0)).unwrap();
        game.start_game().unwrap();
        game.on_option_selected(1, Some(0.0)).unwrap();

        // Government only has one option this round
        let tally = game.on_option_selected(1, Some(3.0)).unwrap();
        assert_eq!(tally.percentages[&0], 0.0);
        assert!(game.countries()[0].government.vote().is_empty());
    }

    #[test]
    fn test_economy_without_event_rejects_votes() {
        let mut game = game();
        game.join(1, &handshake("Leo", 0, 1)).unwrap();
        game.start_game().unwrap();
        assert_eq!(
            game.on_option_selected(1, Some(0.0)),
            Err(GameError::NoEvent {
                economy: 1,
                role: Role::Bank
            })
        );
    }

    #[test]
    fn test_round_flow() {
        let monitor = Arc::new(HealthMonitor::new());
        let mut game = game();
        game.add_observer(monitor.clone());

        assert_eq!(game.next_round(), Err(GameError::NotStarted));
        assert_eq!(game.resolve_round(), Err(GameError::NotStarted));
        assert_eq!(game.start_game(), Ok(1));
        assert_eq!(game.start_game(), Err(GameError::AlreadyStarted));
        assert_eq!(game.next_round(), Err(GameError::RoundInProgress(1)));

        let round = game.round().unwrap();
        assert_eq!(round.global_event().map(|e| e.name.as_str()), Some("Oil shock"));
        assert_eq!(round.time_remaining(), Some(30));

        game.join(1, &handshake("Ana", 0, 0)).unwrap();
        game.on_option_selected(1, Some(1.0)).unwrap();

        let failures = game.resolve_round().unwrap();
        assert!(failures.is_empty());
        assert_eq!(game.resolve_round(), Err(GameError::NoActiveRound));

        let snapshot = game.snapshot();
        let round = snapshot.round.unwrap();
        assert!(round.ended);
        assert_eq!(round.results[0].bank_choice, Some(1));
        assert_eq!(round.results[0].outcome.as_deref(), Some("Prices climb"));
        assert!(snapshot.economies.iter().all(|e| e.event.is_none()));

        assert_eq!(game.next_round(), Ok(2));
        let report = monitor.report();
        assert_eq!(report.rounds_started, 2);
        assert_eq!(report.rounds_resolved, 1);
        assert_eq!(report.votes_cast, 1);
    }

    #[test]
    fn test_timer_expiry_resolves_once() {
        let mut game = GameState::new(scenario(), 2, StdRng::seed_from_u64(3));
        assert_eq!(game.tick(), None);
        game.start_game().unwrap();

        assert_eq!(game.tick(), Some(GameTick::Remaining(1)));
        assert_eq!(game.tick(), Some(GameTick::Resolved(Vec::new())));
        assert_eq!(game.tick(), None);
        assert!(game.round().unwrap().is_ended());
        assert!(game.countries().iter().all(|c| c.economy.score > 0));
    }

    #[test]
    fn test_lobby_lists_countries() {
        let lobby = game().lobby();
        assert_eq!(lobby.countries.len(), 2);
        assert_eq!(lobby.countries[1].name, "Chile");
        assert_eq!(lobby.countries[1].index, 1);
    }
}
