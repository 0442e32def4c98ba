use crate::vote::VoteInstance;
use shared::{EntitySnapshot, Role};
use std::collections::BTreeMap;

/// Non-owning handle from a connected client back to its entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub economy: usize,
    pub role: Role,
}

/// The bank or government of one economy
#[derive(Debug, Clone)]
pub struct Entity {
    pub role: Role,
    players: BTreeMap<u32, String>,
    vote: VoteInstance,
}

impl Entity {
    pub fn new(role: Role) -> Self {
        Entity {
            role,
            players: BTreeMap::new(),
            vote: VoteInstance::default(),
        }
    }

    pub fn add_player(&mut self, client_id: u32, nickname: String) {
        self.players.insert(client_id, nickname);
    }

    // Drops the player's vote along with them
    pub fn remove_player(&mut self, client_id: u32) -> bool {
        self.vote.clear(client_id);
        self.players.remove(&client_id).is_some()
    }

    pub fn has_player(&self, client_id: u32) -> bool {
        self.players.contains_key(&client_id)
    }

    pub fn player_ids(&self) -> Vec<u32> {
        self.players.keys().copied().collect()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Opens a fresh ballot sized to this round's option count
    pub fn reset_vote(&mut self, options_len: usize) {
        self.vote = VoteInstance::new(options_len);
    }

    pub fn vote(&self) -> &VoteInstance {
        &self.vote
    }

    pub fn vote_mut(&mut self) -> &mut VoteInstance {
        &mut self.vote
    }

    pub fn snapshot(&self) -> EntitySnapshot {
        EntitySnapshot {
            role: self.role,
            players: self.players.values().cloned().collect(),
            votes: self.vote.percentages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_players_join_and_leave() {
        let mut entity = Entity::new(Role::Bank);
        entity.add_player(1, "Ana".to_string());
        entity.add_player(2, "Rui".to_string());
        assert_eq!(entity.player_count(), 2);
        assert!(entity.has_player(1));

        assert!(entity.remove_player(1));
        assert!(!entity.remove_player(1));
        assert_eq!(entity.player_ids(), vec![2]);
    }

    #[test]
    fn test_leaving_removes_vote() {
        let mut entity = Entity::new(Role::Government);
        entity.add_player(3, "Bia".to_string());
        entity.reset_vote(2);
        entity.vote_mut().cast(3, 1);
        assert_eq!(entity.vote().len(), 1);

        entity.remove_player(3);
        assert!(entity.vote().is_empty());
    }

    #[test]
    fn test_reset_vote_clears_ballot() {
        let mut entity = Entity::new(Role::Bank);
        entity.reset_vote(3);
        entity.vote_mut().cast(1, 2);
        entity.reset_vote(1);
        assert!(entity.vote().is_empty());
        assert_eq!(entity.vote().options_len(), 1);
    }

    #[test]
    fn test_snapshot_lists_nicknames() {
        let mut entity = Entity::new(Role::Bank);
        entity.add_player(2, "Zé".to_string());
        entity.add_player(1, "Ana".to_string());
        entity.reset_vote(2);
        let snapshot = entity.snapshot();
        assert_eq!(snapshot.role, Role::Bank);
        assert_eq!(snapshot.players, vec!["Ana".to_string(), "Zé".to_string()]);
        assert_eq!(snapshot.votes.len(), 2);
    }
}
