//! Session executor: runs one game for one team from start to settlement.
//!
//! A session walks `Created -> RoundActive (xN) -> Settlement -> Terminated`
//! in a single task. Turns inside a round are strictly sequential. A player
//! whose connection fails is skipped for the step in progress; the session
//! itself always runs to the end so the counts stay consistent for everyone
//! else.

use crate::game::{round_winner, settle_ranked, RoundBounds, RoundGenerator, Settlement};
use crate::player::Player;
use crate::rank::RankChange;
use crate::roster::Roster;
use crate::teams::Team;
use log::{debug, error, info, warn};
use shared::{messages, GameMode};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Game {}", self.0)
    }
}

/// What a finished session hands back: its team and the final standings.
#[derive(Debug)]
pub struct SessionReport {
    pub id: SessionId,
    pub mode: GameMode,
    pub rounds_won: Vec<u32>,
    /// Present for ranked games only.
    pub settlement: Option<Settlement>,
    pub team: Team,
}

pub struct GameSession {
    id: SessionId,
    mode: GameMode,
    team: Team,
    rounds_won: Vec<u32>,
    total_rounds: usize,
    rounds: Box<dyn RoundGenerator>,
    roster: Arc<Roster>,
}

impl GameSession {
    pub fn new(
        id: SessionId,
        mode: GameMode,
        team: Team,
        rounds: Box<dyn RoundGenerator>,
        roster: Arc<Roster>,
    ) -> Self {
        let total_rounds = mode.round_count(team.len());
        Self {
            id,
            mode,
            rounds_won: vec![0; team.len()],
            team,
            total_rounds,
            rounds,
            roster,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn total_rounds(&self) -> usize {
        self.total_rounds
    }

    /// Gives the team back without playing, for sessions that never started.
    pub fn into_team(self) -> Team {
        self.team
    }

    pub async fn run(mut self) -> SessionReport {
        info!(
            "{} ({}) started with {} players: {:?}",
            self.id,
            self.mode,
            self.team.len(),
            self.team.usernames()
        );

        let starting = messages::game_starting(self.mode, self.team.len());
        for player in self.team.members_mut() {
            notify(player, &starting).await;
        }

        for round in 1..=self.total_rounds {
            let bounds = self.rounds.next_round();
            self.play_round(round, bounds).await;
        }

        let settlement = self.settle().await;
        info!("{} finished, rounds won {:?}", self.id, self.rounds_won);

        SessionReport {
            id: self.id,
            mode: self.mode,
            rounds_won: self.rounds_won,
            settlement,
            team: self.team,
        }
    }

    async fn play_round(&mut self, round: usize, bounds: RoundBounds) -> Option<usize> {
        let header = messages::round_header(round, self.total_rounds, bounds.lower, bounds.upper);
        for player in self.team.members_mut() {
            notify(player, &header).await;
        }

        let mut guesses = Vec::with_capacity(self.team.len());
        for index in 0..self.team.len() {
            let guess = self.take_turn(index, round, bounds).await;
            guesses.push(guess);
        }

        let winner = round_winner(&guesses, bounds.target);
        if let Some(index) = winner {
            self.rounds_won[index] += 1;
        }

        let players = self.team.members_mut();
        let winner_name = winner.map(|index| players[index].username().to_string());
        let is_last = round == self.total_rounds;

        for (index, player) in players.iter_mut().enumerate() {
            let text = round_result_text(round, &bounds, winner, winner_name.as_deref(), index, guesses[index]);
            notify(player, &text).await;
            if !is_last {
                notify(player, messages::CONTINUING).await;
            }
        }

        winner
    }

    /// Announces whose turn it is and reads that player's guess until it
    /// falls inside the interval. `None` if the player could not be reached.
    async fn take_turn(&mut self, index: usize, round: usize, bounds: RoundBounds) -> Option<i32> {
        let id = self.id;
        let total = self.total_rounds;
        let players = self.team.members_mut();
        let active = players[index].username().to_string();

        for (position, player) in players.iter_mut().enumerate() {
            if position == index {
                notify(player, messages::YOUR_TURN).await;
            } else {
                notify(player, &messages::is_guessing(&active)).await;
            }
        }

        let player = &mut players[index];
        loop {
            match player.recv_int().await {
                Ok(guess) if bounds.accepts(guess) => {
                    notify(player, messages::GUESS_ACCEPTED).await;
                    info!(
                        "{} - Round {} of {}: {} guessed {}. Distance from target: {} (target={})",
                        id,
                        round,
                        total,
                        active,
                        guess,
                        bounds.distance(guess),
                        bounds.target
                    );
                    return Some(guess);
                }
                Ok(guess) => {
                    debug!("{}: {} guessed {} outside {}..{}", id, active, guess, bounds.lower, bounds.upper);
                    if !notify(player, messages::OUT_OF_RANGE).await {
                        return None;
                    }
                }
                Err(e) => {
                    warn!("{}: failed to receive guess from {}: {}", id, active, e);
                    return None;
                }
            }
        }
    }

    async fn settle(&mut self) -> Option<Settlement> {
        let total = self.total_rounds;
        let players = self.team.members_mut();

        for (player, &won) in players.iter_mut().zip(&self.rounds_won) {
            notify(player, &messages::game_ended(won, total)).await;
        }

        match self.mode {
            GameMode::Simple => {
                for player in players.iter_mut() {
                    notify(player, messages::SIMPLE_MARKER).await;
                }
                None
            }
            GameMode::Ranked => {
                let settlement = settle_ranked(&self.rounds_won);

                let mut changes = Vec::with_capacity(players.len());
                let mut updates = Vec::with_capacity(players.len());
                for (player, &delta) in players.iter_mut().zip(&settlement.deltas) {
                    changes.push(player.rank_mut().apply(delta));
                    updates.push((player.username().to_string(), player.rank().points()));
                }

                if let Err(e) = self.roster.record_ranks(&updates).await {
                    error!("{}: failed to persist rank updates: {}", self.id, e);
                }

                for ((player, &delta), change) in players.iter_mut().zip(&settlement.deltas).zip(changes) {
                    let text = rank_report_text(delta, player.rank().points(), change);
                    notify(player, &text).await;
                }

                Some(settlement)
            }
        }
    }
}

/// Best-effort send. Failures are logged and reported as `false`.
async fn notify(player: &mut Player, text: &str) -> bool {
    match player.send(text).await {
        Ok(()) => true,
        Err(e) => {
            warn!("Failed to send message to {}: {}", player.username(), e);
            false
        }
    }
}

fn round_result_text(
    round: usize,
    bounds: &RoundBounds,
    winner: Option<usize>,
    winner_name: Option<&str>,
    index: usize,
    guess: Option<i32>,
) -> String {
    let target = bounds.target;
    match (winner, winner_name, guess) {
        (Some(w), _, Some(guess)) if w == index => format!(
            "You won round {}. The target number was {} and you were the closest! You failed by {}.",
            round,
            target,
            bounds.distance(guess)
        ),
        (Some(_), Some(name), Some(guess)) => format!(
            "{} won round {}. The target number was {} and your guess was {}. You were {} away from the target.",
            name,
            round,
            target,
            guess,
            bounds.distance(guess)
        ),
        (Some(_), Some(name), None) => format!(
            "{} won round {}. The target number was {} and you did not guess.",
            name, round, target
        ),
        _ => format!("Nobody won round {}. The target number was {}.", round, target),
    }
}

fn rank_report_text(delta: i32, points: u32, change: RankChange) -> String {
    let mut text = if delta < 0 {
        format!(
            "You lost {} rank points. Your current rank points are: {}.",
            delta.unsigned_abs(),
            points
        )
    } else {
        format!(
            "You won {} rank points. Your current rank points are: {}.",
            delta, points
        )
    };

    match change {
        RankChange::Promoted(tier) => text.push_str(&format!("\nYour rank was increased to tier {}!", tier)),
        RankChange::Demoted(tier) => text.push_str(&format!("\nYour rank was lowered to tier {}.", tier)),
        RankChange::Unchanged(tier) => text.push_str(&format!("\nYour rank stayed at tier {}.", tier)),
    }
    text
}
