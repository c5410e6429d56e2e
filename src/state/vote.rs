use super::SessionError;
use crate::types::PlayerId;
use std::collections::{HashMap, HashSet};

/// Vote counts for one voting phase
#[derive(Debug, Clone, Default)]
pub struct VoteTally {
    /// (candidate, count) in first-vote order; the order breaks ties
    counts: Vec<(PlayerId, u32)>,
    voters: HashSet<PlayerId>,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.counts.clear();
        self.voters.clear();
    }

    /// Record one vote. A voter counts at most once per phase.
    pub fn cast_vote(&mut self, voter_id: &str, candidate_id: &str) -> Result<u32, SessionError> {
        if !self.voters.insert(voter_id.to_string()) {
            return Err(SessionError::AlreadyVoted(voter_id.to_string()));
        }

        match self.counts.iter_mut().find(|(id, _)| id == candidate_id) {
            Some((_, count)) => {
                *count += 1;
                Ok(*count)
            }
            None => {
                self.counts.push((candidate_id.to_string(), 1));
                Ok(1)
            }
        }
    }

    /// Candidate with the strictly greatest count; ties go to whoever was voted for first
    pub fn leader(&self) -> Option<&PlayerId> {
        let mut best: Option<&(PlayerId, u32)> = None;
        for entry in &self.counts {
            match best {
                Some(b) if entry.1 <= b.1 => {}
                _ => best = Some(entry),
            }
        }
        best.map(|(id, _)| id)
    }

    pub fn count_for(&self, candidate_id: &str) -> u32 {
        self.counts
            .iter()
            .find(|(id, _)| id == candidate_id)
            .map(|(_, c)| *c)
            .unwrap_or(0)
    }

    pub fn counts(&self) -> HashMap<PlayerId, u32> {
        self.counts.iter().cloned().collect()
    }

    pub fn has_voted(&self, voter_id: &str) -> bool {
        self.voters.contains(voter_id)
    }

    /// Distinct voters so far this phase
    pub fn votes_received(&self) -> usize {
        self.voters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_tally_has_no_leader() {
        let tally = VoteTally::new();
        assert!(tally.leader().is_none());
        assert!(tally.is_empty());
    }

    #[test]
    fn test_cast_vote_counts() {
        let mut tally = VoteTally::new();
        assert_eq!(tally.cast_vote("v1", "a").unwrap(), 1);
        assert_eq!(tally.cast_vote("v2", "a").unwrap(), 2);
        assert_eq!(tally.cast_vote("v3", "b").unwrap(), 1);
        assert_eq!(tally.count_for("a"), 2);
        assert_eq!(tally.count_for("c"), 0);
        assert_eq!(tally.votes_received(), 3);
        assert_eq!(tally.leader().map(String::as_str), Some("a"));
    }

    #[test]
    fn test_one_vote_per_voter() {
        let mut tally = VoteTally::new();
        tally.cast_vote("v1", "a").unwrap();
        let result = tally.cast_vote("v1", "b");
        assert!(matches!(result, Err(SessionError::AlreadyVoted(ref v)) if v == "v1"));
        assert_eq!(tally.count_for("b"), 0);
        assert_eq!(tally.votes_received(), 1);
    }

    #[test]
    fn test_tie_goes_to_first_inserted() {
        let mut tally = VoteTally::new();
        tally.cast_vote("v1", "A").unwrap();
        tally.cast_vote("v2", "B").unwrap();
        tally.cast_vote("v3", "C").unwrap();
        tally.cast_vote("v4", "B").unwrap();
        tally.cast_vote("v5", "A").unwrap();

        let expected: HashMap<PlayerId, u32> =
            [("A".to_string(), 2), ("B".to_string(), 2), ("C".to_string(), 1)]
                .into_iter()
                .collect();
        assert_eq!(tally.counts(), expected);
        for _ in 0..10 {
            assert_eq!(tally.leader().map(String::as_str), Some("A"));
        }
    }

    #[test]
    fn test_counts_are_order_independent() {
        let votes = [("v1", "a"), ("v2", "b"), ("v3", "a"), ("v4", "c"), ("v5", "a")];
        let mut reference = VoteTally::new();
        for (voter, candidate) in votes {
            reference.cast_vote(voter, candidate).unwrap();
        }

        // every rotation and the reverse order
        for shift in 0..votes.len() {
            let mut tally = VoteTally::new();
            let mut order = votes.to_vec();
            order.rotate_left(shift);
            for (voter, candidate) in &order {
                tally.cast_vote(voter, candidate).unwrap();
            }
            assert_eq!(tally.counts(), reference.counts());

            let mut reversed = VoteTally::new();
            for (voter, candidate) in order.iter().rev() {
                reversed.cast_vote(voter, candidate).unwrap();
            }
            assert_eq!(reversed.counts(), reference.counts());
        }
    }

    #[test]
    fn test_reset_clears_votes_and_voters() {
        let mut tally = VoteTally::new();
        tally.cast_vote("v1", "a").unwrap();
        tally.reset();
        assert!(tally.is_empty());
        assert!(!tally.has_voted("v1"));
        assert!(tally.cast_vote("v1", "b").is_ok());
    }
}
