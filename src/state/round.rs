//! Round engine: secret word and role assignment, speaker selection.
//!
//! Everything here is a pure function of its inputs and the random source, so
//! callers (and tests) decide where randomness comes from.

use super::SessionError;
use crate::types::*;
use crate::words;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::collections::{HashMap, HashSet};

/// Per-recipient payloads, keyed by player id
pub type PayloadFanout = HashMap<PlayerId, GameStartPayload>;

#[derive(Debug, Clone)]
pub struct RoundStart {
    pub secret: RoundSecret,
    pub payloads: PayloadFanout,
    pub starting_player: Player,
}

#[derive(Debug, Clone)]
pub struct RoundRestart {
    pub payloads: PayloadFanout,
    pub starting_player: Player,
}

/// Number of imposters actually assigned for a roster of `players`.
///
/// Always leaves at least one citizen.
pub fn effective_imposter_count(requested: usize, players: usize) -> usize {
    requested.min(players.saturating_sub(1))
}

/// Assign a fresh word, imposter set and starting speaker
pub fn start_round<R: Rng + ?Sized>(
    players: &[Player],
    settings: &GameSettings,
    rng: &mut R,
) -> Result<RoundStart, SessionError> {
    if players.len() < MIN_PLAYERS {
        return Err(SessionError::NotEnoughPlayers {
            have: players.len(),
            need: MIN_PLAYERS,
        });
    }

    let theme = words::find_theme(&settings.theme)
        .ok_or_else(|| SessionError::UnknownTheme(settings.theme.clone()))?;
    let word = theme
        .words
        .choose(rng)
        .ok_or_else(|| SessionError::UnknownTheme(settings.theme.clone()))?;

    let mut order: Vec<&Player> = players.iter().collect();
    order.shuffle(rng);

    let imposter_count = effective_imposter_count(settings.imposter_count, players.len());
    let (imposters, citizens) = order.split_at(imposter_count);
    let imposter_ids: HashSet<PlayerId> = imposters.iter().map(|p| p.id.clone()).collect();

    // Imposters never open the round: the first speaker has to hint at the real word
    let starting_player = (*citizens
        .choose(rng)
        .ok_or(SessionError::NoEligibleSpeaker)?)
    .clone();

    let secret = RoundSecret {
        word: word.to_string(),
        imposter_ids,
        theme: theme.name.to_string(),
    };
    let payloads = build_payloads(players, &secret, &starting_player.nickname);

    Ok(RoundStart {
        secret,
        payloads,
        starting_player,
    })
}

/// Re-roll only the starting speaker after a wrong guess. Word and imposters stay.
pub fn restart_round<R: Rng + ?Sized>(
    players: &[Player],
    secret: &RoundSecret,
    rng: &mut R,
) -> Result<RoundRestart, SessionError> {
    let mut order: Vec<&Player> = players.iter().collect();
    order.shuffle(rng);

    let eligible: Vec<&Player> = order
        .into_iter()
        .filter(|p| !secret.is_imposter(&p.id))
        .collect();
    let starting_player = (*eligible
        .choose(rng)
        .ok_or(SessionError::NoEligibleSpeaker)?)
    .clone();

    let payloads = build_payloads(players, secret, &starting_player.nickname);
    Ok(RoundRestart {
        payloads,
        starting_player,
    })
}

/// One payload per player, revealing the word to citizens only
pub fn build_payloads(
    players: &[Player],
    secret: &RoundSecret,
    starting_player_nickname: &str,
) -> PayloadFanout {
    players
        .iter()
        .map(|p| {
            let (role, word) = if secret.is_imposter(&p.id) {
                (SecretRole::Imposter, HIDDEN_WORD.to_string())
            } else {
                (SecretRole::Citizen, secret.word.clone())
            };
            let payload = GameStartPayload {
                role,
                word,
                starting_player_nickname: starting_player_nickname.to_string(),
                theme: secret.theme.clone(),
                players: players.to_vec(),
            };
            (p.id.clone(), payload)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn roster(n: usize) -> Vec<Player> {
        (0..n)
            .map(|i| Player {
                id: format!("p{}", i),
                nickname: format!("Player {}", i),
                join_index: i as u32,
                is_host: i == 0,
            })
            .collect()
    }

    fn settings(theme: &str, imposter_count: usize) -> GameSettings {
        GameSettings {
            theme: theme.to_string(),
            imposter_count,
        }
    }

    fn nickname_of<'a>(players: &'a [Player], nickname: &str) -> &'a Player {
        players.iter().find(|p| p.nickname == nickname).unwrap()
    }

    #[test]
    fn test_requires_three_players() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = start_round(&roster(2), &settings("Food", 1), &mut rng);
        assert!(matches!(
            result,
            Err(SessionError::NotEnoughPlayers { have: 2, need: 3 })
        ));
    }

    #[test]
    fn test_unknown_theme() {
        let mut rng = StdRng::seed_from_u64(0);
        let result = start_round(&roster(4), &settings("Sports", 1), &mut rng);
        assert!(matches!(result, Err(SessionError::UnknownTheme(_))));
    }

    #[test]
    fn test_role_partition() {
        for seed in 0..50 {
            let mut rng = StdRng::seed_from_u64(seed);
            for n in 3..=8 {
                for k in 1..=3 {
                    let players = roster(n);
                    let round = start_round(&players, &settings("Nature", k), &mut rng).unwrap();
                    let expected = k.min(n - 1);

                    let imposters = round
                        .payloads
                        .values()
                        .filter(|p| p.role == SecretRole::Imposter)
                        .count();
                    assert_eq!(imposters, expected);
                    assert_eq!(round.secret.imposter_ids.len(), expected);
                    assert_eq!(round.payloads.len() - imposters, n - expected);
                    assert!(!round.secret.is_imposter(&round.starting_player.id));
                }
            }
        }
    }

    #[test]
    fn test_zero_imposters_requested() {
        let mut rng = StdRng::seed_from_u64(1);
        let players = roster(4);
        let round = start_round(&players, &settings("Food", 0), &mut rng).unwrap();

        assert_eq!(effective_imposter_count(0, 4), 0);
        assert!(round.secret.imposter_ids.is_empty());
        assert!(round
            .payloads
            .values()
            .all(|p| p.role == SecretRole::Citizen && p.word == round.secret.word));
    }

    #[test]
    fn test_max_imposters_leaves_one_citizen() {
        let mut rng = StdRng::seed_from_u64(99);
        let players = roster(4);
        let round = start_round(&players, &settings("Food", 3), &mut rng).unwrap();

        assert_eq!(round.secret.imposter_ids.len(), 3);
        let citizen = players
            .iter()
            .find(|p| !round.secret.is_imposter(&p.id))
            .unwrap();
        assert_eq!(round.starting_player.id, citizen.id);
    }

    #[test]
    fn test_secrecy() {
        let mut rng = StdRng::seed_from_u64(3);
        let players = roster(6);
        let round = start_round(&players, &settings("Travel", 2), &mut rng).unwrap();

        assert!(words::find_theme("Travel")
            .unwrap()
            .words
            .contains(&round.secret.word.as_str()));
        for (id, payload) in &round.payloads {
            if round.secret.is_imposter(id) {
                assert_eq!(payload.role, SecretRole::Imposter);
                assert_eq!(payload.word, HIDDEN_WORD);
            } else {
                assert_eq!(payload.role, SecretRole::Citizen);
                assert_eq!(payload.word, round.secret.word);
            }
            assert_eq!(payload.theme, "Travel");
            assert_eq!(payload.players, players);
            assert_eq!(
                payload.starting_player_nickname,
                round.starting_player.nickname
            );
        }
    }

    #[test]
    fn test_theme_name_is_canonical() {
        let mut rng = StdRng::seed_from_u64(3);
        let round = start_round(&roster(3), &settings("hollywood", 1), &mut rng).unwrap();
        assert_eq!(round.secret.theme, "Hollywood");
    }

    #[test]
    fn test_same_seed_same_round() {
        let players = roster(5);
        let a = start_round(&players, &settings("Food", 2), &mut StdRng::seed_from_u64(42)).unwrap();
        let b = start_round(&players, &settings("Food", 2), &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.secret, b.secret);
        assert_eq!(a.starting_player, b.starting_player);
    }

    #[test]
    fn test_every_citizen_can_start() {
        // Speaker is drawn uniformly from the citizens; over many seeds each one shows up
        let players = roster(4);
        let mut seen = HashSet::new();
        for seed in 0..200 {
            let mut rng = StdRng::seed_from_u64(seed);
            let round = start_round(&players, &settings("Food", 1), &mut rng).unwrap();
            seen.insert(round.starting_player.id.clone());
        }
        assert_eq!(seen.len(), 4);
    }

    #[test]
    fn test_restart_keeps_secret() {
        let mut rng = StdRng::seed_from_u64(11);
        let players = roster(5);
        let round = start_round(&players, &settings("Food", 2), &mut rng).unwrap();

        for _ in 0..20 {
            let restart = restart_round(&players, &round.secret, &mut rng).unwrap();
            assert!(!round.secret.is_imposter(&restart.starting_player.id));
            for (id, payload) in &restart.payloads {
                let before = &round.payloads[id];
                assert_eq!(payload.role, before.role);
                assert_eq!(payload.word, before.word);
                assert_eq!(payload.theme, before.theme);
            }
            let speaker = nickname_of(&players, &restart.starting_player.nickname);
            assert!(!round.secret.is_imposter(&speaker.id));
        }
    }

    #[test]
    fn test_restart_without_citizens() {
        let mut rng = StdRng::seed_from_u64(5);
        let players = roster(3);
        let secret = RoundSecret {
            word: "Taco".to_string(),
            imposter_ids: ["p1".to_string()].into_iter().collect(),
            theme: "Food".to_string(),
        };
        let only_imposter: Vec<Player> = players.into_iter().filter(|p| p.id == "p1").collect();

        let result = restart_round(&only_imposter, &secret, &mut rng);
        assert!(matches!(result, Err(SessionError::NoEligibleSpeaker)));
    }
}
