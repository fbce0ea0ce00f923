//! Team formation policy.
//!
//! A pool is cut into teams front to back, so every team keeps the arrival
//! order of its members. Full teams of `max` players are peeled off while more
//! than `max` players remain; whatever is left forms the last team.

use crate::player::Player;
use shared::TeamBounds;

/// What to do with a final group that is smaller than the mode minimum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RemainderPolicy {
    /// Start it anyway.
    #[default]
    StartUndersized,
    /// Leave it waiting in the queue for more players.
    KeepQueued,
}

/// Splits `pool` into teams. Returns the teams and the players that stay
/// queued, both in arrival order.
///
/// Nothing is formed unless the pool holds at least `bounds.min` players.
pub fn split_into_teams<T>(
    pool: Vec<T>,
    bounds: TeamBounds,
    policy: RemainderPolicy,
) -> (Vec<Vec<T>>, Vec<T>) {
    if pool.len() < bounds.min || pool.is_empty() {
        return (Vec::new(), pool);
    }

    let mut teams = Vec::new();
    let mut rest = pool;

    while rest.len() > bounds.max {
        let tail = rest.split_off(bounds.max);
        teams.push(rest);
        rest = tail;
    }

    if rest.is_empty() {
        return (teams, rest);
    }

    if rest.len() >= bounds.min || policy == RemainderPolicy::StartUndersized {
        teams.push(rest);
        (teams, Vec::new())
    } else {
        (teams, rest)
    }
}

/// Players committed to one session, in turn order.
///
/// Membership is fixed once formed; members can be messaged but not added or
/// removed.
#[derive(Debug)]
pub struct Team {
    players: Vec<Player>,
}

impl Team {
    pub fn new(players: Vec<Player>) -> Self {
        Self { players }
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn members(&self) -> &[Player] {
        &self.players
    }

    pub fn members_mut(&mut self) -> &mut [Player] {
        &mut self.players
    }

    pub fn usernames(&self) -> Vec<String> {
        self.players.iter().map(|p| p.username().to_string()).collect()
    }

    pub fn into_players(self) -> Vec<Player> {
        self.players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIMPLE: TeamBounds = TeamBounds { min: 2, max: 8 };
    const RANKED: TeamBounds = TeamBounds { min: 3, max: 8 };

    fn pool(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_below_minimum_forms_nothing() {
        let (teams, rest) = split_into_teams(pool(1), SIMPLE, RemainderPolicy::StartUndersized);
        assert!(teams.is_empty());
        assert_eq!(rest, vec![0]);

        let (teams, rest) = split_into_teams(pool(2), RANKED, RemainderPolicy::StartUndersized);
        assert!(teams.is_empty());
        assert_eq!(rest.len(), 2);
    }

    #[test]
    fn test_every_size_within_bounds_forms_one_team() {
        for bounds in [SIMPLE, RANKED] {
            for size in bounds.min..=bounds.max {
                let (teams, rest) =
                    split_into_teams(pool(size), bounds, RemainderPolicy::KeepQueued);
                assert_eq!(teams, vec![pool(size)], "size {}", size);
                assert!(rest.is_empty());
            }
        }
    }

    #[test]
    fn test_full_teams_are_peeled_in_order() {
        let (teams, rest) = split_into_teams(pool(19), SIMPLE, RemainderPolicy::StartUndersized);
        assert_eq!(teams.len(), 3);
        assert_eq!(teams[0], (0..8).collect::<Vec<_>>());
        assert_eq!(teams[1], (8..16).collect::<Vec<_>>());
        assert_eq!(teams[2], vec![16, 17, 18]);
        assert!(rest.is_empty());
    }

    #[test]
    fn test_exact_multiple_of_max() {
        let (teams, rest) = split_into_teams(pool(16), SIMPLE, RemainderPolicy::StartUndersized);
        assert_eq!(teams.len(), 2);
        assert!(teams.iter().all(|t| t.len() == 8));
        assert!(rest.is_empty());
    }

    #[test]
    fn test_undersized_remainder_depends_on_policy() {
        let (teams, rest) = split_into_teams(pool(9), SIMPLE, RemainderPolicy::StartUndersized);
        assert_eq!(teams.len(), 2);
        assert_eq!(teams[1], vec![8]);
        assert!(rest.is_empty());

        let (teams, rest) = split_into_teams(pool(10), RANKED, RemainderPolicy::KeepQueued);
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].len(), 8);
        assert_eq!(rest, vec![8, 9]);
    }

    #[test]
    fn test_no_player_lost_or_duplicated() {
        for size in 0..40 {
            for policy in [RemainderPolicy::StartUndersized, RemainderPolicy::KeepQueued] {
                let (teams, rest) = split_into_teams(pool(size), RANKED, policy);
                let mut seen: Vec<usize> = teams.into_iter().flatten().chain(rest).collect();
                seen.sort_unstable();
                assert_eq!(seen, pool(size));
            }
        }
    }
}
