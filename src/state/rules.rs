//! Pure game rules: roster balance, mission sizes, vote thresholds and the
//! random draws made when a session is created.

use std::collections::BTreeMap;

use rand::{Rng, rng, seq::SliceRandom};

/// Number of missions in a full game.
pub const MISSION_COUNT: usize = 5;
/// Successful or failed missions needed to decide the mission phase.
pub const MISSIONS_TO_DECIDE: usize = 3;
/// Rejected team votes in a single mission that hand the game to the evil team.
pub const DEFAULT_MAX_TEAM_PICKING_ATTEMPTS: u32 = 5;
/// Role whose assassination wins the game for the evil team.
pub const DEFAULT_PROTECTED_ROLE: &str = "merlin";

/// Whether a (good, evil) roster split is a legal game.
pub fn validate_team_balance(good_count: usize, evil_count: usize) -> bool {
    matches!(
        (good_count, evil_count),
        (3, 2) | (4, 2) | (4, 3) | (5, 3) | (6, 3) | (6, 4)
    )
}

/// Shuffle in place with a uniform permutation drawn from the thread RNG.
pub fn shuffle_players<T>(players: &mut [T]) {
    players.shuffle(&mut rng());
}

/// Pick the index of the first leader uniformly at random.
pub fn select_initial_leader<T>(players: &[T]) -> Option<usize> {
    if players.is_empty() {
        return None;
    }
    Some(rng().random_range(0..players.len()))
}

/// Negative mission votes needed to sabotage a mission.
///
/// The fourth mission of a game with seven or more players needs two.
pub fn fail_votes_required(mission_number: u8, total_players: usize) -> usize {
    if mission_number == 4 && total_players >= 7 {
        2
    } else {
        1
    }
}

/// Tunable rule set shared by every session of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    /// Rejected team votes allowed per mission before the evil team wins.
    pub max_team_picking_attempts: u32,
    /// Role name (case-insensitive) the assassin must find.
    pub protected_role: String,
    /// Team size per mission, keyed by total player count.
    pub mission_team_sizes: BTreeMap<usize, [usize; MISSION_COUNT]>,
}

impl Default for GameRules {
    fn default() -> Self {
        Self {
            max_team_picking_attempts: DEFAULT_MAX_TEAM_PICKING_ATTEMPTS,
            protected_role: DEFAULT_PROTECTED_ROLE.to_owned(),
            mission_team_sizes: default_mission_team_sizes(),
        }
    }
}

impl GameRules {
    /// Required team size for `mission_number` (1-based) with `total_players`.
    pub fn mission_team_size(&self, total_players: usize, mission_number: u8) -> Option<usize> {
        let index = usize::from(mission_number).checked_sub(1)?;
        self.mission_team_sizes
            .get(&total_players)
            .and_then(|sizes| sizes.get(index))
            .copied()
    }

    /// Whether every mission has a configured team size for this player count.
    pub fn supports_player_count(&self, total_players: usize) -> bool {
        self.mission_team_sizes
            .get(&total_players)
            .is_some_and(|sizes| sizes.iter().all(|size| (1..=total_players).contains(size)))
    }

    pub fn is_protected_role(&self, role: &str) -> bool {
        role.trim().eq_ignore_ascii_case(self.protected_role.trim())
    }
}

/// Standard mission team sizes for five to ten players.
pub fn default_mission_team_sizes() -> BTreeMap<usize, [usize; MISSION_COUNT]> {
    BTreeMap::from([
        (5, [2, 3, 2, 3, 3]),
        (6, [2, 3, 4, 3, 4]),
        (7, [2, 3, 3, 4, 4]),
        (8, [3, 4, 4, 5, 5]),
        (9, [3, 4, 4, 5, 5]),
        (10, [3, 4, 4, 5, 5]),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_team_balances_are_accepted() {
        let legal = [(3, 2), (4, 2), (4, 3), (5, 3), (6, 3), (6, 4)];
        for (good, evil) in legal {
            assert!(validate_team_balance(good, evil), "({good}, {evil})");
        }
    }

    #[test]
    fn every_other_balance_is_rejected() {
        let legal = [(3, 2), (4, 2), (4, 3), (5, 3), (6, 3), (6, 4)];
        for good in 0..=12 {
            for evil in 0..=12 {
                if legal.contains(&(good, evil)) {
                    continue;
                }
                assert!(!validate_team_balance(good, evil), "({good}, {evil})");
            }
        }
    }

    #[test]
    fn every_legal_roster_has_mission_sizes() {
        let rules = GameRules::default();
        for total in [5, 6, 7, 8, 9, 10] {
            assert!(rules.supports_player_count(total), "{total} players");
        }
        assert!(!rules.supports_player_count(4));
    }

    #[test]
    fn mission_team_size_is_one_based() {
        let rules = GameRules::default();
        assert_eq!(rules.mission_team_size(5, 1), Some(2));
        assert_eq!(rules.mission_team_size(5, 5), Some(3));
        assert_eq!(rules.mission_team_size(7, 4), Some(4));
        assert_eq!(rules.mission_team_size(5, 0), None);
        assert_eq!(rules.mission_team_size(5, 6), None);
        assert_eq!(rules.mission_team_size(11, 1), None);
    }

    #[test]
    fn fourth_mission_with_seven_players_needs_two_fails() {
        assert_eq!(fail_votes_required(4, 7), 2);
        assert_eq!(fail_votes_required(4, 10), 2);
        assert_eq!(fail_votes_required(4, 6), 1);
        assert_eq!(fail_votes_required(2, 7), 1);
        assert_eq!(fail_votes_required(5, 10), 1);
    }

    #[test]
    fn protected_role_match_ignores_case() {
        let rules = GameRules::default();
        assert!(rules.is_protected_role("Merlin"));
        assert!(rules.is_protected_role(" merlin "));
        assert!(!rules.is_protected_role("percival"));
    }

    #[test]
    fn shuffle_is_a_permutation() {
        let mut players: Vec<u32> = (0..10).collect();
        shuffle_players(&mut players);
        let mut sorted = players.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn initial_leader_of_empty_roster_is_none() {
        assert_eq!(select_initial_leader::<u32>(&[]), None);
    }

    #[test]
    fn initial_leader_distribution_is_uniform() {
        const PLAYERS: usize = 5;
        const DRAWS: usize = 20_000;

        let mut hits = [0usize; PLAYERS];
        for _ in 0..DRAWS {
            let mut roster: Vec<usize> = (0..PLAYERS).collect();
            shuffle_players(&mut roster);
            let index = select_initial_leader(&roster).unwrap();
            hits[roster[index]] += 1;
        }

        // Expected 4000 per player; a 15% band is far outside sampling noise.
        let expected = DRAWS / PLAYERS;
        for (player, count) in hits.iter().enumerate() {
            let deviation = count.abs_diff(expected);
            assert!(
                deviation < expected * 15 / 100,
                "player {player} led {count} times, expected about {expected}"
            );
        }
    }
}
