//! Matchmaking queues.
//!
//! Each mode has its own FIFO queue behind its own lock, so simple and ranked
//! formation never wait on each other. Locks are only held for in-memory
//! queue edits: callers message players before handing them over and after
//! taking teams out, never while a queue is locked.
//!
//! The ranked queue is grouped by rank tier before formation. Teams are only
//! formed within a tier group, and players left over keep their relative
//! arrival order.

use crate::player::Player;
use crate::rank::RankTier;
use crate::teams::{split_into_teams, RemainderPolicy, Team};
use log::debug;
use shared::GameMode;
use std::collections::{BTreeMap, VecDeque};
use tokio::sync::Mutex;

/// Queue entry as seen from outside the matchmaker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedPlayer {
    pub username: String,
    pub tier: RankTier,
}

pub struct Matchmaker {
    simple: Mutex<VecDeque<Player>>,
    ranked: Mutex<VecDeque<Player>>,
    remainder: RemainderPolicy,
}

impl Matchmaker {
    pub fn new(remainder: RemainderPolicy) -> Self {
        Self {
            simple: Mutex::new(VecDeque::new()),
            ranked: Mutex::new(VecDeque::new()),
            remainder,
        }
    }

    fn queue(&self, mode: GameMode) -> &Mutex<VecDeque<Player>> {
        match mode {
            GameMode::Simple => &self.simple,
            GameMode::Ranked => &self.ranked,
        }
    }

    /// Appends a player to the tail of the mode's queue.
    pub async fn enqueue(&self, player: Player, mode: GameMode) {
        let mut queue = self.queue(mode).lock().await;
        debug!("{} joined the {} queue", player.username(), mode);
        queue.push_back(player);
    }

    /// Puts a team that could not be dispatched back at the head of its
    /// queue, in its original order.
    pub async fn requeue_front(&self, team: Team, mode: GameMode) {
        let mut queue = self.queue(mode).lock().await;
        for player in team.into_players().into_iter().rev() {
            queue.push_front(player);
        }
    }

    pub async fn snapshot(&self, mode: GameMode) -> Vec<QueuedPlayer> {
        self.queue(mode)
            .lock()
            .await
            .iter()
            .map(|p| QueuedPlayer {
                username: p.username().to_string(),
                tier: p.tier(),
            })
            .collect()
    }

    pub async fn len(&self, mode: GameMode) -> usize {
        self.queue(mode).lock().await.len()
    }

    /// The ranked queue grouped by tier, arrival order kept within a tier.
    pub async fn tier_groups(&self) -> BTreeMap<RankTier, Vec<String>> {
        let mut groups: BTreeMap<RankTier, Vec<String>> = BTreeMap::new();
        for player in self.ranked.lock().await.iter() {
            groups
                .entry(player.tier())
                .or_default()
                .push(player.username().to_string());
        }
        groups
    }

    /// Forms as many teams as the mode's queue allows and removes their
    /// members from it in the same critical section.
    pub async fn form_teams(&self, mode: GameMode) -> Vec<Team> {
        let bounds = mode.team_bounds();
        let mut queue = self.queue(mode).lock().await;

        if queue.len() < bounds.min {
            return Vec::new();
        }

        let pool: Vec<Player> = queue.drain(..).collect();

        // Simple mode is one big group; ranked mode never mixes tiers.
        let mut groups: BTreeMap<Option<RankTier>, Vec<usize>> = BTreeMap::new();
        for (index, player) in pool.iter().enumerate() {
            let key = mode.is_ranked().then(|| player.tier());
            groups.entry(key).or_default().push(index);
        }

        let mut slots: Vec<Option<Player>> = pool.into_iter().map(Some).collect();
        let mut teams = Vec::new();

        for (tier, indices) in groups {
            if let Some(tier) = tier {
                debug!("Ranked queue tier {} holds {} players", tier, indices.len());
            }

            let (formed, _waiting) = split_into_teams(indices, bounds, self.remainder);
            for members in formed {
                let players: Vec<Player> = members
                    .into_iter()
                    .filter_map(|index| slots[index].take())
                    .collect();
                teams.push(Team::new(players));
            }
        }

        queue.extend(slots.into_iter().flatten());
        teams
    }
}
