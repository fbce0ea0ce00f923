//! Rules of the guessing game: round generation, round winners, and ranked
//! settlement. Everything here is free of I/O; the session driver feeds it.

use crate::rank::{POINTS_PER_ROUND, SHUTOUT_PENALTY, WINNER_BONUS};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{LOWER_BOUND_RANGE, UPPER_BOUND_RANGE};

/// Interval and hidden target of one round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundBounds {
    pub lower: i32,
    pub upper: i32,
    pub target: i32,
}

impl RoundBounds {
    /// Draws `upper` from 49..=98, `lower` from 0..=48, and the target from
    /// `lower..upper`.
    pub fn draw<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let upper = rng.gen_range(UPPER_BOUND_RANGE.0..=UPPER_BOUND_RANGE.1);
        let lower = rng.gen_range(LOWER_BOUND_RANGE.0..=LOWER_BOUND_RANGE.1);
        let target = rng.gen_range(lower..upper);
        Self {
            lower,
            upper,
            target,
        }
    }

    /// Whether a guess is acceptable. Both ends are inclusive.
    pub fn accepts(&self, guess: i32) -> bool {
        (self.lower..=self.upper).contains(&guess)
    }

    pub fn distance(&self, guess: i32) -> u32 {
        guess.abs_diff(self.target)
    }
}

/// Source of round intervals for a session.
pub trait RoundGenerator: Send {
    fn next_round(&mut self) -> RoundBounds;
}

/// Uniformly random rounds.
pub struct RandomRounds {
    rng: StdRng,
}

impl RandomRounds {
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl RoundGenerator for RandomRounds {
    fn next_round(&mut self) -> RoundBounds {
        RoundBounds::draw(&mut self.rng)
    }
}

/// Index of the guess closest to `target`. Earlier players win ties; players
/// without a guess are skipped. `None` if nobody guessed.
pub fn round_winner(guesses: &[Option<i32>], target: i32) -> Option<usize> {
    let mut best: Option<(usize, u32)> = None;
    for (index, guess) in guesses.iter().enumerate() {
        let Some(guess) = guess else { continue };
        let distance = guess.abs_diff(target);
        match best {
            Some((_, closest)) if distance >= closest => {}
            _ => best = Some((index, distance)),
        }
    }
    best.map(|(index, _)| index)
}

/// Index of the player with the most rounds won. Earlier players win ties; a
/// game where nobody won a round has no winner.
pub fn game_winner(rounds_won: &[u32]) -> Option<usize> {
    let mut most = 0;
    let mut winner = None;
    for (index, &won) in rounds_won.iter().enumerate() {
        if won > most {
            most = won;
            winner = Some(index);
        }
    }
    winner
}

/// Outcome of a ranked game: the winner and the point delta of each player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub winner: Option<usize>,
    pub deltas: Vec<i32>,
}

pub fn settle_ranked(rounds_won: &[u32]) -> Settlement {
    let winner = game_winner(rounds_won);
    let deltas = rounds_won
        .iter()
        .enumerate()
        .map(|(index, &won)| {
            if won == 0 {
                SHUTOUT_PENALTY
            } else {
                let earned = won as i32 * POINTS_PER_ROUND;
                if Some(index) == winner {
                    earned + WINNER_BONUS
                } else {
                    earned
                }
            }
        })
        .collect();

    Settlement { winner, deltas }
}
