//! Competitive rank model.
//!
//! A player's rank is a non-negative point total plus a tier derived from it.
//! The tier is never stored independently: every write to the points goes
//! through [`Rank::apply`], which recomputes it.

use std::fmt;

/// Upper (inclusive) point limit of tiers 0 through 3. Anything above the last
/// limit is tier 4.
const TIER_LIMITS: [u32; 4] = [500, 1000, 1500, 2500];

/// Points lost by a player who won no round of a ranked game.
pub const SHUTOUT_PENALTY: i32 = -20;
/// Points earned per round won in a ranked game.
pub const POINTS_PER_ROUND: i32 = 10;
/// Bonus on top of the per-round points for the winner of a ranked game.
pub const WINNER_BONUS: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankTier(pub u8);

impl fmt::Display for RankTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub fn tier_for_points(points: u32) -> RankTier {
    let tier = TIER_LIMITS
        .iter()
        .position(|&limit| points <= limit)
        .unwrap_or(TIER_LIMITS.len());
    RankTier(tier as u8)
}

/// How a point update moved a player between tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankChange {
    Promoted(RankTier),
    Demoted(RankTier),
    Unchanged(RankTier),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rank {
    points: u32,
    tier: RankTier,
}

impl Rank {
    pub fn new(points: u32) -> Self {
        Self {
            points,
            tier: tier_for_points(points),
        }
    }

    pub fn points(&self) -> u32 {
        self.points
    }

    pub fn tier(&self) -> RankTier {
        self.tier
    }

    /// Adds `delta` points, flooring the total at zero, and reports the tier
    /// movement.
    pub fn apply(&mut self, delta: i32) -> RankChange {
        let before = self.tier;
        let points = (i64::from(self.points) + i64::from(delta)).clamp(0, i64::from(u32::MAX));
        *self = Rank::new(points as u32);

        match self.tier.cmp(&before) {
            std::cmp::Ordering::Greater => RankChange::Promoted(self.tier),
            std::cmp::Ordering::Less => RankChange::Demoted(self.tier),
            std::cmp::Ordering::Equal => RankChange::Unchanged(self.tier),
        }
    }
}

impl Default for Rank {
    fn default() -> Self {
        Rank::new(0)
    }
}
