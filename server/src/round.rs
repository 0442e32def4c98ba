//! Round lifecycle: drawing events, the countdown, resolution and scoring
//!
//! A round moves `Created -> Active -> Resolved`. The countdown is an
//! optional layer on top of `Active`; whichever comes first, the timer
//! expiring or an explicit resolve, ends the round exactly once.

use crate::country::Country;
use crate::economy::{Economy, MAX_DISTANCE};
use crate::error::{GameError, RoundError};
use crate::events::{GlobalEvent, LocalEvent, Outcome};
use log::{error, info, warn};
use rand::Rng;
use shared::{Role, RoundResultSnapshot, RoundSnapshot, DEFAULT_ROUND_SECONDS, MAX_ROUND_SECONDS};

pub const SCORE_BASE: f64 = 1000.0;
pub const DISTANCE_PENALTY: f64 = 250.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Created,
    Active,
    Resolved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerTick {
    Remaining(u32),
    Expired,
}

/// What happened to one economy when the round was resolved
#[derive(Debug, Clone, PartialEq)]
pub struct RoundResult {
    pub economy: usize,
    pub bank_choice: Option<usize>,
    pub government_choice: Option<usize>,
    pub outcome: Option<Outcome>,
    pub score_gained: u64,
}

impl RoundResult {
    fn empty(economy: usize) -> Self {
        RoundResult {
            economy,
            bank_choice: None,
            government_choice: None,
            outcome: None,
            score_gained: 0,
        }
    }

    pub fn snapshot(&self) -> RoundResultSnapshot {
        RoundResultSnapshot {
            economy: self.economy,
            bank_choice: self.bank_choice,
            government_choice: self.government_choice,
            outcome: self.outcome.as_ref().map(|o| o.description.clone()),
            score_gained: self.score_gained,
        }
    }
}

/// An economy that could not be resolved; it keeps its state and is still scored
#[derive(Debug, Clone, PartialEq)]
pub struct RoundFailure {
    pub economy: usize,
    pub error: RoundError,
}

/// Zero means "use the default"; anything above the cap is cut down to it
pub fn clamp_round_seconds(seconds: u32) -> u32 {
    if seconds == 0 {
        DEFAULT_ROUND_SECONDS
    } else {
        seconds.min(MAX_ROUND_SECONDS)
    }
}

#[derive(Debug, Clone)]
pub struct Round {
    pub number: u32,
    phase: RoundPhase,
    global_event: Option<GlobalEvent>,
    results: Vec<RoundResult>,
    timer: Option<u32>,
}

impl Round {
    pub fn new(number: u32) -> Self {
        Round {
            number,
            phase: RoundPhase::Created,
            global_event: None,
            results: Vec::new(),
            timer: None,
        }
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == RoundPhase::Active
    }

    pub fn is_ended(&self) -> bool {
        self.phase == RoundPhase::Resolved
    }

    pub fn global_event(&self) -> Option<&GlobalEvent> {
        self.global_event.as_ref()
    }

    pub fn results(&self) -> &[RoundResult] {
        &self.results
    }

    pub fn time_remaining(&self) -> Option<u32> {
        self.timer
    }

    /// Draws the global shock and every economy's local event, opening votes
    ///
    /// Returns false if the round was already started.
    pub fn start<R: Rng + ?Sized>(
        &mut self,
        countries: &mut [Country],
        global_pool: &mut Vec<GlobalEvent>,
        rng: &mut R,
    ) -> bool {
        if self.phase != RoundPhase::Created {
            warn!("Round {} was already started", self.number);
            return false;
        }

        if !global_pool.is_empty() {
            let index = rng.gen_range(0..global_pool.len());
            let event = global_pool.swap_remove(index);
            for country in countries.iter_mut() {
                country.economy.apply_global_event(&event);
            }
            info!("Round {}: global event '{}'", self.number, event.name);
            self.global_event = Some(event);
        }

        for country in countries.iter_mut() {
            let drawn = country.draw_event(rng).map(|event| event.name.clone());
            match drawn {
                Some(event) => info!(
                    "Round {}: {} faces '{}'",
                    self.number, country.name, event
                ),
                None => warn!(
                    "Round {}: {} has no local events left",
                    self.number, country.name
                ),
            }
        }

        self.phase = RoundPhase::Active;
        true
    }

    /// Arms the countdown; it can only be armed once per round
    pub fn start_timer(&mut self, seconds: u32) -> Result<u32, GameError> {
        if !self.is_active() {
            return Err(GameError::NoActiveRound);
        }
        if self.timer.is_some() {
            return Err(GameError::TimerAlreadyRunning);
        }
        let seconds = clamp_round_seconds(seconds);
        self.timer = Some(seconds);
        Ok(seconds)
    }

    /// Advances the countdown by one second
    ///
    /// Yields `Expired` exactly once; None when no countdown is running.
    pub fn tick(&mut self) -> Option<TimerTick> {
        if !self.is_active() {
            return None;
        }
        let remaining = self.timer.as_mut()?;
        if *remaining == 0 {
            return None;
        }
        *remaining -= 1;
        if *remaining == 0 {
            Some(TimerTick::Expired)
        } else {
            Some(TimerTick::Remaining(*remaining))
        }
    }

    /// Applies every economy's voted outcome, then scores the round
    ///
    /// The round ends even when some economies fail to resolve; those are
    /// returned so the caller can report them.
    pub fn resolve<R: Rng + ?Sized>(
        &mut self,
        countries: &mut [Country],
        rng: &mut R,
    ) -> Vec<RoundFailure> {
        if self.is_ended() {
            return Vec::new();
        }

        let mut failures = Vec::new();
        let mut results = Vec::with_capacity(countries.len());
        for (index, country) in countries.iter_mut().enumerate() {
            let (result, failure) = resolve_country(index, country, rng);
            if let Some(error) = failure {
                error!(
                    "Round {}: failed to resolve {}: {}",
                    self.number, country.name, error
                );
                failures.push(RoundFailure {
                    economy: index,
                    error,
                });
            }
            results.push(result);
        }

        self.results = results;
        self.timer = None;
        self.phase = RoundPhase::Resolved;
        for country in countries.iter_mut() {
            country.event = None;
        }

        self.calculate_scores(countries);
        info!(
            "Round {} resolved ({} failures)",
            self.number,
            failures.len()
        );
        failures
    }

    /// Adds each economy's score increment for this round
    pub fn calculate_scores(&mut self, countries: &mut [Country]) {
        let global_factor = self
            .global_event
            .as_ref()
            .map(GlobalEvent::round_score_factor)
            .unwrap_or(1.0);

        for (index, country) in countries.iter_mut().enumerate() {
            let gained = score_increment(&country.economy, global_factor);
            country.economy.score = country.economy.score.saturating_add(gained);
            if let Some(result) = self.results.iter_mut().find(|r| r.economy == index) {
                result.score_gained = gained;
            }
        }
    }

    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            number: self.number,
            ended: self.is_ended(),
            time_remaining: self.timer,
            global_event: self.global_event.as_ref().map(GlobalEvent::summary),
            results: self.results.iter().map(RoundResult::snapshot).collect(),
        }
    }
}

fn resolve_country<R: Rng + ?Sized>(
    index: usize,
    country: &mut Country,
    rng: &mut R,
) -> (RoundResult, Option<RoundError>) {
    let mut result = RoundResult::empty(index);
    let Some(event) = country.event.as_ref() else {
        return (result, None);
    };

    let bank_choice = country.bank.vote().get_result(rng);
    let government_choice = country.government.vote().get_result(rng);
    result.bank_choice = Some(bank_choice);
    result.government_choice = Some(government_choice);

    match resolve_event(event, bank_choice, government_choice, rng) {
        Ok(outcome) => {
            let outcome = outcome.clone();
            country.economy.apply_outcome(&outcome);
            result.outcome = Some(outcome);
            (result, None)
        }
        Err(e) => (result, Some(e)),
    }
}

/// Picks the outcome for the entities' choices, weighted by `chance`
pub fn resolve_event<'a, R: Rng + ?Sized>(
    event: &'a LocalEvent,
    bank_choice: usize,
    government_choice: usize,
    rng: &mut R,
) -> Result<&'a Outcome, RoundError> {
    let bank_id = event
        .bank
        .option_id(bank_choice)
        .ok_or(RoundError::MissingOption {
            role: Role::Bank,
            choice: bank_choice,
        })?;
    let government_id =
        event
            .government
            .option_id(government_choice)
            .ok_or(RoundError::MissingOption {
                role: Role::Government,
                choice: government_choice,
            })?;

    let candidates: Vec<&Outcome> = event
        .outcomes
        .iter()
        .filter(|outcome| outcome.matches(bank_id, government_id))
        .collect();

    pick_weighted(&candidates, rng).ok_or(RoundError::NoMatchingOutcome {
        bank_id,
        government_id,
    })
}

fn pick_weighted<'a, R: Rng + ?Sized>(
    candidates: &[&'a Outcome],
    rng: &mut R,
) -> Option<&'a Outcome> {
    let last = *candidates.last()?;
    let total: f64 = candidates.iter().map(|o| o.chance.max(0.0)).sum();
    if !total.is_finite() || total <= 0.0 {
        return Some(candidates[rng.gen_range(0..candidates.len())]);
    }

    let draw = rng.gen::<f64>() * total;
    let mut cumulative = 0.0;
    for &outcome in candidates {
        cumulative += outcome.chance.max(0.0);
        if draw < cumulative {
            return Some(outcome);
        }
    }
    // Floating point rounding can leave the draw just past the final bound
    Some(last)
}

/// Points an economy earns this round
pub fn score_increment(economy: &Economy, global_factor: f64) -> u64 {
    let is_penalty = economy.is_distance().min(MAX_DISTANCE) * DISTANCE_PENALTY;
    let lm_penalty = economy.lm_distance().min(MAX_DISTANCE) * DISTANCE_PENALTY;
    let base = (SCORE_BASE - is_penalty - lm_penalty).max(0.0);
    let scaled = (base * economy.score_factor * global_factor).floor();
    if scaled.is_finite() && scaled > 0.0 {
        scaled as u64
    } else {
        0
    }
}
