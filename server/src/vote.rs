//! Per-entity ballot for the active round

use rand::Rng;
use std::collections::BTreeMap;

/// Player id -> chosen option index for one entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VoteInstance {
    options_len: usize,
    votes: BTreeMap<u32, usize>,
}

impl VoteInstance {
    pub fn new(options_len: usize) -> Self {
        Self {
            options_len,
            votes: BTreeMap::new(),
        }
    }

    pub fn options_len(&self) -> usize {
        self.options_len
    }

    /// Records a vote; an out-of-range option withdraws the player's vote instead
    ///
    /// Returns true if the vote was recorded.
    pub fn cast(&mut self, player_id: u32, option: usize) -> bool {
        if option >= self.options_len {
            self.votes.remove(&player_id);
            return false;
        }
        self.votes.insert(player_id, option);
        true
    }

    pub fn clear(&mut self, player_id: u32) -> bool {
        self.votes.remove(&player_id).is_some()
    }

    pub fn choice_of(&self, player_id: u32) -> Option<usize> {
        self.votes.get(&player_id).copied()
    }

    pub fn len(&self) -> usize {
        self.votes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.votes.is_empty()
    }

    pub fn counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.options_len];
        for &option in self.votes.values() {
            if let Some(count) = counts.get_mut(option) {
                *count += 1;
            }
        }
        counts
    }

    /// Share of votes behind each option, in percent
    pub fn percentages(&self) -> BTreeMap<usize, f64> {
        let total = self.votes.len();
        self.counts()
            .into_iter()
            .enumerate()
            .map(|(option, count)| {
                let share = if total == 0 {
                    0.0
                } else {
                    count as f64 * 100.0 / total as f64
                };
                (option, share)
            })
            .collect()
    }

    /// Winning option index
    ///
    /// The most voted option wins. Ties are broken uniformly at random
    /// among the tied options. Without votes any option may win, and an
    /// entity without options always yields 0.
    pub fn get_result<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        if self.votes.is_empty() {
            if self.options_len == 0 {
                return 0;
            }
            return rng.gen_range(0..self.options_len);
        }

        let counts = self.counts();
        let best = counts.iter().copied().max().unwrap_or(0);
        let tied: Vec<usize> = counts
            .iter()
            .enumerate()
            .filter(|(_, count)| **count == best)
            .map(|(option, _)| option)
            .collect();

        match tied.as_slice() {
            [] => 0,
            [only] => *only,
            _ => tied[rng.gen_range(0..tied.len())],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_no_votes_result_in_range() {
        let mut rng = StdRng::seed_from_u64(7);
        let instance = VoteInstance::new(3);
        for _ in 0..200 {
            assert!(instance.get_result(&mut rng) < 3);
        }
    }

    #[test]
    fn test_no_options_result_is_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut instance = VoteInstance::new(0);
        assert!(!instance.cast(1, 0));
        assert_eq!(instance.get_result(&mut rng), 0);
    }

    #[test]
    fn test_single_voter_wins() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut instance = VoteInstance::new(4);
        assert!(instance.cast(9, 2));
        for _ in 0..50 {
            assert_eq!(instance.get_result(&mut rng), 2);
        }
    }

    #[test]
    fn test_majority_wins() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut instance = VoteInstance::new(3);
        instance.cast(1, 0);
        instance.cast(2, 1);
        instance.cast(3, 1);
        assert_eq!(instance.get_result(&mut rng), 1);
    }

    #[test]
    fn test_ties_pick_among_tied_options() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut instance = VoteInstance::new(3);
        instance.cast(1, 0);
        instance.cast(2, 2);

        let mut seen = [false; 3];
        for _ in 0..200 {
            seen[instance.get_result(&mut rng)] = true;
        }
        assert!(seen[0]);
        assert!(!seen[1]);
        assert!(seen[2]);
    }

    #[test]
    fn test_out_of_range_deselects() {
        let mut instance = VoteInstance::new(2);
        instance.cast(5, 1);
        assert_eq!(instance.choice_of(5), Some(1));
        assert!(!instance.cast(5, 2));
        assert_eq!(instance.choice_of(5), None);
        assert!(instance.is_empty());
    }

    #[test]
    fn test_revote_replaces_previous_choice() {
        let mut instance = VoteInstance::new(2);
        instance.cast(5, 0);
        instance.cast(5, 1);
        assert_eq!(instance.len(), 1);
        assert_eq!(instance.counts(), vec![0, 1]);
    }

    #[test]
    fn test_percentages() {
        let mut instance = VoteInstance::new(3);
        instance.cast(1, 0);
        instance.cast(2, 0);
        instance.cast(3, 1);
        instance.cast(4, 0);

        let percentages = instance.percentages();
        assert_eq!(percentages.len(), 3);
        assert_approx_eq!(percentages[&0], 75.0);
        assert_approx_eq!(percentages[&1], 25.0);
        assert_approx_eq!(percentages[&2], 0.0);

        assert!(instance.clear(1));
        assert!(!instance.clear(1));
        assert_approx_eq!(instance.percentages()[&0], 200.0 / 3.0);
    }

    #[test]
    fn test_empty_percentages_are_zero() {
        let instance = VoteInstance::new(2);
        assert!(instance.percentages().values().all(|&p| p == 0.0));
    }
}
