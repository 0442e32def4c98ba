use crate::economy::Economy;
use crate::entity::Entity;
use crate::events::{CountryData, LocalEvent};
use rand::Rng;
use shared::{CountrySummary, EconomySnapshot, Role};

/// One playable economy with its scenario pool and its two entities
#[derive(Debug, Clone)]
pub struct Country {
    pub name: String,
    pub flag: String,
    pub economy: Economy,
    /// Local events not drawn yet
    pub pool: Vec<LocalEvent>,
    /// Event of the active round; None between rounds
    pub event: Option<LocalEvent>,
    pub bank: Entity,
    pub government: Entity,
}

impl Country {
    pub fn new(data: CountryData) -> Self {
        Country {
            name: data.name,
            flag: data.flag,
            economy: data.economy,
            pool: data.events,
            event: None,
            bank: Entity::new(Role::Bank),
            government: Entity::new(Role::Government),
        }
    }

    pub fn entity(&self, role: Role) -> &Entity {
        match role {
            Role::Bank => &self.bank,
            Role::Government => &self.government,
        }
    }

    pub fn entity_mut(&mut self, role: Role) -> &mut Entity {
        match role {
            Role::Bank => &mut self.bank,
            Role::Government => &mut self.government,
        }
    }

    /// Draws this round's local event and opens both ballots
    ///
    /// With an exhausted pool the economy sits the round out.
    pub fn draw_event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<&LocalEvent> {
        self.event = if self.pool.is_empty() {
            None
        } else {
            let index = rng.gen_range(0..self.pool.len());
            Some(self.pool.swap_remove(index))
        };

        let (bank_len, government_len) = self
            .event
            .as_ref()
            .map(|event| (event.bank.len(), event.government.len()))
            .unwrap_or((0, 0));
        self.bank.reset_vote(bank_len);
        self.government.reset_vote(government_len);

        self.event.as_ref()
    }

    pub fn summary(&self, index: usize) -> CountrySummary {
        CountrySummary {
            index,
            name: self.name.clone(),
            flag: self.flag.clone(),
        }
    }

    pub fn snapshot(&self, index: usize) -> EconomySnapshot {
        EconomySnapshot {
            index,
            name: self.name.clone(),
            flag: self.flag.clone(),
            indicators: self.economy.snapshot(),
            score: self.economy.score,
            score_factor: self.economy.score_factor,
            event: self.event.as_ref().map(LocalEvent::snapshot),
            bank: self.bank.snapshot(),
            government: self.government.snapshot(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventOption, OptionMenu};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn menu(count: usize) -> OptionMenu {
        OptionMenu {
            description: String::new(),
            options: (0..count)
                .map(|i| EventOption {
                    id: None,
                    text: format!("Option {}", i),
                })
                .collect(),
        }
    }

    fn event(name: &str, bank: usize, government: usize) -> LocalEvent {
        LocalEvent {
            name: name.to_string(),
            description: String::new(),
            bank: menu(bank),
            government: menu(government),
            outcomes: Vec::new(),
        }
    }

    fn country(events: Vec<LocalEvent>) -> Country {
        Country::new(CountryData {
            name: "Argentina".to_string(),
            flag: "AR".to_string(),
            economy: Economy::default(),
            events,
        })
    }

    #[test]
    fn test_draw_removes_event_from_pool() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut country = country(vec![event("A", 2, 1), event("B", 3, 2)]);

        let first = country.draw_event(&mut rng).map(|e| e.name.clone()).unwrap();
        assert_eq!(country.pool.len(), 1);
        let second = country.draw_event(&mut rng).map(|e| e.name.clone()).unwrap();
        assert_ne!(first, second);
        assert!(country.pool.is_empty());
        assert!(country.draw_event(&mut rng).is_none());
    }

    #[test]
    fn test_draw_sizes_ballots() {
        let mut rng = StdRng::seed_from_u64(5);
        let mut country = country(vec![event("A", 2, 1)]);
        country.draw_event(&mut rng);
        assert_eq!(country.bank.vote().options_len(), 2);
        assert_eq!(country.government.vote().options_len(), 1);

        country.draw_event(&mut rng);
        assert_eq!(country.bank.vote().options_len(), 0);
        assert!(country.event.is_none());
    }

    #[test]
    fn test_entity_lookup_by_role() {
        let mut country = country(Vec::new());
        country.entity_mut(Role::Government).add_player(4, "Leo".to_string());
        assert_eq!(country.entity(Role::Government).player_count(), 1);
        assert_eq!(country.entity(Role::Bank).player_count(), 0);
    }
}
