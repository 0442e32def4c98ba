//! Macroeconomic state of a single country and the IS-LM model derived from it
//!
//! The model is deliberately small:
//! - IS: `Y = (C + I + G - b*i) * 100 / P`
//! - LM: `Y = (M * 100 / (md * P) + h*i) / k`
//!
//! Every derived quantity is total. Degenerate parameters fall back to a
//! documented default instead of producing NaN or infinity.

use crate::events::{GlobalEvent, Impact, Outcome};
use log::warn;
use serde::Deserialize;
use serde_json::Value;
use shared::IndicatorsSnapshot;

pub const DEFAULT_INTEREST_RATE: f64 = 0.1;
pub const MIN_INTEREST_RATE: f64 = 0.001;
pub const MAX_INTEREST_RATE: f64 = 1.0;
pub const MIN_MONEY_DEMAND: f64 = 0.1;
pub const MIN_PRICE_LEVEL: f64 = 10.0;
pub const MIN_SENSITIVITY: f64 = 1.0;
pub const MAX_SENSITIVITY: f64 = 10_000.0;
pub const MIN_SCORE_FACTOR: f64 = 0.1;
pub const MAX_SCORE_FACTOR: f64 = 10.0;

/// Interest rate impacts are written in percentage points
pub const INTEREST_RATE_SCALE: f64 = 0.01;

/// Price level of the base year
const PRICE_INDEX_BASE: f64 = 100.0;

/// Largest deviation the scoring formula cares about
pub const MAX_DISTANCE: f64 = 2.0;

/// Model parameters an impact can touch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Indicator {
    InterestRate,
    Consumption,
    Investment,
    Spending,
    MoneySupply,
    PriceLevel,
    MoneyDemand,
    InvestmentSensitivity,
    IncomeSensitivity,
    InterestSensitivity,
}

impl Indicator {
    pub const ALL: [Indicator; 10] = [
        Indicator::InterestRate,
        Indicator::Consumption,
        Indicator::Investment,
        Indicator::Spending,
        Indicator::MoneySupply,
        Indicator::PriceLevel,
        Indicator::MoneyDemand,
        Indicator::InvestmentSensitivity,
        Indicator::IncomeSensitivity,
        Indicator::InterestSensitivity,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Indicator::InterestRate => "interest_rate",
            Indicator::Consumption => "consumption",
            Indicator::Investment => "investment",
            Indicator::Spending => "spending",
            Indicator::MoneySupply => "money_supply",
            Indicator::PriceLevel => "price_level",
            Indicator::MoneyDemand => "money_demand",
            Indicator::InvestmentSensitivity => "investment_sensitivity",
            Indicator::IncomeSensitivity => "income_sensitivity",
            Indicator::InterestSensitivity => "interest_sensitivity",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|indicator| indicator.key() == key)
    }

    pub fn value(self, economy: &Economy) -> f64 {
        match self {
            Indicator::InterestRate => economy.interest_rate,
            Indicator::Consumption => economy.consumption,
            Indicator::Investment => economy.investment,
            Indicator::Spending => economy.spending,
            Indicator::MoneySupply => economy.money_supply,
            Indicator::PriceLevel => economy.price_level,
            Indicator::MoneyDemand => economy.money_demand,
            Indicator::InvestmentSensitivity => economy.investment_sensitivity,
            Indicator::IncomeSensitivity => economy.income_sensitivity,
            Indicator::InterestSensitivity => economy.interest_sensitivity,
        }
    }

    fn value_mut(self, economy: &mut Economy) -> &mut f64 {
        match self {
            Indicator::InterestRate => &mut economy.interest_rate,
            Indicator::Consumption => &mut economy.consumption,
            Indicator::Investment => &mut economy.investment,
            Indicator::Spending => &mut economy.spending,
            Indicator::MoneySupply => &mut economy.money_supply,
            Indicator::PriceLevel => &mut economy.price_level,
            Indicator::MoneyDemand => &mut economy.money_demand,
            Indicator::InvestmentSensitivity => &mut economy.investment_sensitivity,
            Indicator::IncomeSensitivity => &mut economy.income_sensitivity,
            Indicator::InterestSensitivity => &mut economy.interest_sensitivity,
        }
    }

    /// Scale applied to additive changes of this indicator
    fn change_scale(self) -> f64 {
        match self {
            Indicator::InterestRate => INTEREST_RATE_SCALE,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImpactOp {
    Add,
    Multiply,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ImpactTarget {
    Indicator(Indicator),
    ScoreFactor,
}

fn parse_impact_key(key: &str) -> Option<(ImpactTarget, ImpactOp)> {
    if key == "score_factor" {
        return Some((ImpactTarget::ScoreFactor, ImpactOp::Multiply));
    }
    let (base, op) = if let Some(base) = key.strip_suffix("_change") {
        (base, ImpactOp::Add)
    } else if let Some(base) = key.strip_suffix("_factor") {
        (base, ImpactOp::Multiply)
    } else {
        return None;
    };
    Indicator::from_key(base).map(|indicator| (ImpactTarget::Indicator(indicator), op))
}

/// Mutable macroeconomic record of one country
///
/// Countries in `data.json` may override any parameter through an
/// `economy` object; missing fields take the defaults below.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Economy {
    pub interest_rate: f64,
    pub consumption: f64,
    pub investment: f64,
    pub spending: f64,
    pub money_supply: f64,
    pub price_level: f64,
    pub money_demand: f64,
    /// `b`: how strongly investment reacts to the interest rate
    pub investment_sensitivity: f64,
    /// `k`: how strongly money demand reacts to income
    pub income_sensitivity: f64,
    /// `h`: how strongly money demand reacts to the interest rate
    pub interest_sensitivity: f64,
    #[serde(skip)]
    pub score: u64,
    pub score_factor: f64,
}

impl Default for Economy {
    fn default() -> Self {
        Self {
            interest_rate: DEFAULT_INTEREST_RATE,
            consumption: 600.0,
            investment: 200.0,
            spending: 200.0,
            money_supply: 980.0,
            price_level: 100.0,
            money_demand: 1.0,
            investment_sensitivity: 100.0,
            income_sensitivity: 1.0,
            interest_sensitivity: 100.0,
            score: 0,
            score_factor: 1.0,
        }
    }
}

impl Economy {
    /// Output: consumption + investment + government spending
    pub fn pib(&self) -> f64 {
        let pib = self.consumption + self.investment + self.spending;
        if pib.is_finite() {
            pib
        } else {
            0.0
        }
    }

    /// Output implied by the goods market at `interest_rate`
    ///
    /// Falls back to plain GDP when the price level is zero.
    pub fn is_output(&self, interest_rate: f64) -> f64 {
        let pib = self.pib();
        if self.price_level == 0.0 {
            return pib;
        }
        let output = (pib - self.investment_sensitivity * interest_rate) * PRICE_INDEX_BASE
            / self.price_level;
        if output.is_finite() {
            output
        } else {
            pib
        }
    }

    /// Output implied by the money market at `interest_rate`
    ///
    /// Falls back to current GDP when a denominator is zero.
    pub fn lm_output(&self, interest_rate: f64) -> f64 {
        let pib = self.pib();
        let nominal_demand = self.money_demand * self.price_level;
        if nominal_demand == 0.0 || self.income_sensitivity == 0.0 {
            return pib;
        }
        let real_balances = self.money_supply * PRICE_INDEX_BASE / nominal_demand;
        let output =
            (real_balances + self.interest_sensitivity * interest_rate) / self.income_sensitivity;
        if output.is_finite() {
            output
        } else {
            pib
        }
    }

    /// Interest rate where the IS and LM curves intersect
    ///
    /// Clamped to `[0.001, 1.0]` and rounded to four decimals. Any
    /// degenerate input yields the default rate of 0.1.
    pub fn equilibrium_interest_rate(&self) -> f64 {
        let nominal_demand = self.money_demand * self.price_level;
        if self.price_level == 0.0 || nominal_demand == 0.0 {
            return DEFAULT_INTEREST_RATE;
        }

        let deflator = PRICE_INDEX_BASE / self.price_level;
        let real_balances = self.money_supply * PRICE_INDEX_BASE / nominal_demand;
        let numerator = self.pib() * deflator * self.income_sensitivity - real_balances;
        let denominator = self.investment_sensitivity * deflator * self.income_sensitivity
            + self.interest_sensitivity;

        if denominator == 0.0 || !denominator.is_finite() || !numerator.is_finite() {
            return DEFAULT_INTEREST_RATE;
        }
        let rate = numerator / denominator;
        if !rate.is_finite() {
            return DEFAULT_INTEREST_RATE;
        }
        round_to(rate.clamp(MIN_INTEREST_RATE, MAX_INTEREST_RATE), 4)
    }

    /// Relative gap between actual output and the IS curve at the current rate
    pub fn is_distance(&self) -> f64 {
        self.relative_distance(self.is_output(self.interest_rate))
    }

    /// Relative gap between actual output and the LM curve at the current rate
    pub fn lm_distance(&self) -> f64 {
        self.relative_distance(self.lm_output(self.interest_rate))
    }

    fn relative_distance(&self, model_output: f64) -> f64 {
        let pib = self.pib();
        if pib <= 0.0 {
            return MAX_DISTANCE;
        }
        let distance = (pib - model_output).abs() / pib;
        if distance.is_finite() {
            distance
        } else {
            MAX_DISTANCE
        }
    }

    /// Applies a global shock and clamps the result
    pub fn apply_global_event(&mut self, event: &GlobalEvent) -> usize {
        let applied = self.apply_impact(&event.impact, &event.name);
        self.clamp();
        applied
    }

    /// Applies the outcome picked for this economy's local event
    pub fn apply_outcome(&mut self, outcome: &Outcome) -> usize {
        let source = if outcome.description.is_empty() {
            "outcome"
        } else {
            outcome.description.as_str()
        };
        let mut applied = self.apply_impact(&outcome.impact, source);
        if let Some(factor) = outcome.score_factor {
            if factor.is_finite() {
                self.score_factor *= factor;
                applied += 1;
            } else {
                warn!("Skipping non-finite score_factor in '{}'", source);
            }
        }
        self.clamp();
        applied
    }

    /// Adds `_change` keys and multiplies `_factor` keys into the parameters
    ///
    /// Returns how many fields were applied. Unknown keys and values that
    /// are not finite numbers are skipped.
    pub fn apply_impact(&mut self, impact: &Impact, source: &str) -> usize {
        let mut applied = 0;

        for (key, value) in impact {
            let Some((target, op)) = parse_impact_key(key) else {
                warn!("Ignoring unknown impact field '{}' in '{}'", key, source);
                continue;
            };
            let Some(amount) = finite_number(value) else {
                warn!(
                    "Ignoring malformed value {} for '{}' in '{}'",
                    value, key, source
                );
                continue;
            };

            let updated = match target {
                ImpactTarget::Indicator(indicator) => {
                    let scale = indicator.change_scale();
                    let slot = indicator.value_mut(self);
                    match op {
                        ImpactOp::Add => *slot += amount * scale,
                        ImpactOp::Multiply => *slot *= amount,
                    }
                    *slot
                }
                ImpactTarget::ScoreFactor => {
                    self.score_factor *= amount;
                    self.score_factor
                }
            };

            if updated.is_finite() {
                applied += 1;
            } else {
                warn!("Impact '{}' in '{}' overflowed, value will be reset", key, source);
            }
        }

        applied
    }

    /// Forces every parameter back into its sane range
    pub fn clamp(&mut self) {
        let defaults = Economy::default();

        self.interest_rate = finite_or(self.interest_rate, defaults.interest_rate)
            .clamp(MIN_INTEREST_RATE, MAX_INTEREST_RATE);
        self.consumption = finite_or(self.consumption, defaults.consumption).max(0.0);
        self.investment = finite_or(self.investment, defaults.investment).max(0.0);
        self.spending = finite_or(self.spending, defaults.spending).max(0.0);
        self.money_supply = finite_or(self.money_supply, defaults.money_supply).max(0.0);
        self.price_level = finite_or(self.price_level, defaults.price_level).max(MIN_PRICE_LEVEL);
        self.money_demand =
            finite_or(self.money_demand, defaults.money_demand).max(MIN_MONEY_DEMAND);
        self.investment_sensitivity =
            clamp_sensitivity(self.investment_sensitivity, defaults.investment_sensitivity);
        self.income_sensitivity =
            clamp_sensitivity(self.income_sensitivity, defaults.income_sensitivity);
        self.interest_sensitivity =
            clamp_sensitivity(self.interest_sensitivity, defaults.interest_sensitivity);
        self.score_factor = finite_or(self.score_factor, defaults.score_factor)
            .clamp(MIN_SCORE_FACTOR, MAX_SCORE_FACTOR);
    }

    pub fn snapshot(&self) -> IndicatorsSnapshot {
        IndicatorsSnapshot {
            interest_rate: self.interest_rate,
            consumption: self.consumption,
            investment: self.investment,
            spending: self.spending,
            money_supply: self.money_supply,
            price_level: self.price_level,
            money_demand: self.money_demand,
            investment_sensitivity: self.investment_sensitivity,
            income_sensitivity: self.income_sensitivity,
            interest_sensitivity: self.interest_sensitivity,
            pib: self.pib(),
            is_output: self.is_output(self.interest_rate),
            lm_output: self.lm_output(self.interest_rate),
            equilibrium_rate: self.equilibrium_interest_rate(),
        }
    }
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|v| v.is_finite())
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn clamp_sensitivity(value: f64, fallback: f64) -> f64 {
    finite_or(value, fallback).clamp(MIN_SENSITIVITY, MAX_SENSITIVITY)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
