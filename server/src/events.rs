//! Scenario data: countries, their local events, and global shocks
//!
//! `data.json` is loaded once at startup. Each entry is parsed and validated
//! on its own, so one malformed event or country is dropped with a warning
//! instead of taking the whole file down.

use crate::economy::Economy;
use crate::error::DataError;
use log::{info, warn};
use serde::Deserialize;
use serde_json::{Map, Value};
use shared::{EventSummary, LocalEventSnapshot, Role, ValidationResult};
use std::path::Path;

/// Numeric adjustments keyed by `<field>_change` or `<field>_factor`
pub type Impact = Map<String, Value>;

/// Shock applied to every economy at the start of a round
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GlobalEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub impact: Impact,
    #[serde(default)]
    pub score_factor: Option<f64>,
}

impl GlobalEvent {
    /// Multiplier this event applies to the round's score increments
    pub fn round_score_factor(&self) -> f64 {
        match self.score_factor {
            Some(factor) if factor.is_finite() && factor > 0.0 => factor,
            _ => 1.0,
        }
    }

    pub fn summary(&self) -> EventSummary {
        EventSummary {
            name: self.name.clone(),
            description: self.description.clone(),
        }
    }

    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("global event has no name".to_string());
        }
        ValidationResult::from_errors(errors)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventOption {
    #[serde(default)]
    pub id: Option<i64>,
    pub text: String,
}

/// The choices one entity is offered for a local event
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct OptionMenu {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub options: Vec<EventOption>,
}

impl OptionMenu {
    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Identifier outcomes use for the option at `index`; defaults to the index
    pub fn option_id(&self, index: usize) -> Option<i64> {
        self.options
            .get(index)
            .map(|option| option.id.unwrap_or(index as i64))
    }

    pub fn texts(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect()
    }
}

/// One possible resolution of a local event
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Outcome {
    /// `[bank option id, government option id]`
    pub combo: Vec<i64>,
    #[serde(default = "default_chance")]
    pub chance: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "outcome")]
    pub impact: Impact,
    #[serde(default)]
    pub score_factor: Option<f64>,
}

fn default_chance() -> f64 {
    1.0
}

impl Outcome {
    /// True when the combo lists both chosen ids, in any order
    pub fn matches(&self, bank_id: i64, government_id: i64) -> bool {
        self.combo.contains(&bank_id) && self.combo.contains(&government_id)
    }

    pub fn validate(&self) -> ValidationResult {
        let mut errors = Vec::new();
        if self.combo.is_empty() {
            errors.push("combo must list at least one option id".to_string());
        }
        if !self.chance.is_finite() || self.chance < 0.0 {
            errors.push(format!("chance must be a non-negative number, got {}", self.chance));
        }
        ValidationResult::from_errors(errors)
    }
}

/// Per-economy scenario voted on by its bank and government
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LocalEvent {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub bank: OptionMenu,
    #[serde(default)]
    pub government: OptionMenu,
    #[serde(default)]
    pub outcomes: Vec<Outcome>,
}

impl LocalEvent {
    pub fn menu(&self, role: Role) -> &OptionMenu {
        match role {
            Role::Bank => &self.bank,
            Role::Government => &self.government,
        }
    }

    /// Checks the event and drops outcomes that can never be selected
    pub fn validate(&mut self) -> ValidationResult {
        let mut errors = Vec::new();
        if self.name.trim().is_empty() {
            errors.push("local event has no name".to_string());
        }
        if self.bank.is_empty() {
            errors.push("bank has no options".to_string());
        }
        if self.government.is_empty() {
            errors.push("government has no options".to_string());
        }

        let name = self.name.clone();
        self.outcomes.retain(|outcome| {
            let result = outcome.validate();
            if !result.is_valid {
                warn!("Dropping outcome of '{}': {}", name, result.message());
            }
            result.is_valid
        });
        if self.outcomes.is_empty() {
            warn!("Local event '{}' has no usable outcomes", self.name);
        }

        ValidationResult::from_errors(errors)
    }

    pub fn snapshot(&self) -> LocalEventSnapshot {
        LocalEventSnapshot {
            name: self.name.clone(),
            description: self.description.clone(),
            bank_options: self.bank.texts(),
            government_options: self.government.texts(),
        }
    }
}

/// A country as described in the scenario file
#[derive(Debug, Clone, PartialEq)]
pub struct CountryData {
    pub name: String,
    pub flag: String,
    pub economy: Economy,
    pub events: Vec<LocalEvent>,
}

#[derive(Deserialize)]
struct RawCountry {
    name: String,
    #[serde(default)]
    flag: String,
    #[serde(default)]
    economy: Economy,
    #[serde(default)]
    events: Vec<Value>,
}

/// Everything loaded from `data.json`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GameData {
    pub countries: Vec<CountryData>,
    pub global_events: Vec<GlobalEvent>,
}

impl GameData {
    /// Reads and parses the scenario file
    ///
    /// Only an unreadable file or invalid JSON is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| DataError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let data = Self::from_json(&text)?;
        info!(
            "Loaded {} countries and {} global events from {}",
            data.countries.len(),
            data.global_events.len(),
            path.display()
        );
        Ok(data)
    }

    pub fn from_json(text: &str) -> Result<Self, DataError> {
        let value: Value = serde_json::from_str(text)?;
        Ok(Self::from_value(value))
    }

    /// Builds game data from parsed JSON, dropping malformed entries
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut root) = value else {
            warn!("Scenario root is not an object, starting with no data");
            return Self::default();
        };

        let countries = match root.remove("countries") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .enumerate()
                .filter_map(|(index, entry)| parse_country(index, entry))
                .collect(),
            Some(_) => {
                warn!("'countries' is not an array, ignoring it");
                Vec::new()
            }
            None => {
                warn!("Scenario has no 'countries'");
                Vec::new()
            }
        };

        let global_events = match root.remove("globalEvents") {
            Some(Value::Array(entries)) => entries
                .into_iter()
                .enumerate()
                .filter_map(|(index, entry)| parse_global_event(index, entry))
                .collect(),
            Some(_) => {
                warn!("'globalEvents' is not an array, ignoring it");
                Vec::new()
            }
            None => {
                warn!("Scenario has no 'globalEvents', the global pool is empty");
                Vec::new()
            }
        };

        Self {
            countries,
            global_events,
        }
    }
}

fn parse_country(index: usize, entry: Value) -> Option<CountryData> {
    let raw: RawCountry = match serde_json::from_value(entry) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Skipping malformed country #{}: {}", index, e);
            return None;
        }
    };
    if raw.name.trim().is_empty() {
        warn!("Skipping country #{} without a name", index);
        return None;
    }

    let mut economy = raw.economy;
    economy.clamp();

    let events = raw
        .events
        .into_iter()
        .enumerate()
        .filter_map(|(event_index, entry)| parse_local_event(&raw.name, event_index, entry))
        .collect();

    Some(CountryData {
        name: raw.name,
        flag: raw.flag,
        economy,
        events,
    })
}

fn parse_local_event(country: &str, index: usize, entry: Value) -> Option<LocalEvent> {
    let mut event: LocalEvent = match serde_json::from_value(entry) {
        Ok(event) => event,
        Err(e) => {
            warn!("Skipping malformed event #{} of {}: {}", index, country, e);
            return None;
        }
    };
    let result = event.validate();
    if !result.is_valid {
        warn!(
            "Skipping event #{} of {}: {}",
            index,
            country,
            result.message()
        );
        return None;
    }
    Some(event)
}

fn parse_global_event(index: usize, entry: Value) -> Option<GlobalEvent> {
    let event: GlobalEvent = match serde_json::from_value(entry) {
        Ok(event) => event,
        Err(e) => {
            warn!("Skipping malformed global event #{}: {}", index, e);
            return None;
        }
    };
    let result = event.validate();
    if !result.is_valid {
        warn!("Skipping global event #{}: {}", index, result.message());
        return None;
    }
    Some(event)
}
