//! Performance benchmarks for matchmaking and rule evaluation

use server::game::{round_winner, settle_ranked, RandomRounds, RoundGenerator};
use server::matchmaking::Matchmaker;
use server::player::Player;
use server::rank::{tier_for_points, Rank};
use server::teams::{split_into_teams, RemainderPolicy};
use shared::{Connection, GameMode};
use std::time::Instant;

/// Benchmarks tier lookup across the whole point range
#[test]
fn benchmark_tier_lookup() {
    let iterations = 1_000_000u32;
    let start = Instant::now();

    let mut checksum = 0u64;
    for points in 0..iterations {
        checksum += u64::from(tier_for_points(points % 4000).0);
    }

    let duration = start.elapsed();
    println!(
        "Tier lookup: {} iterations in {:?} ({:.2} ns/iter, checksum {})",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64,
        checksum
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks rank updates with alternating gains and penalties
#[test]
fn benchmark_rank_updates() {
    let iterations = 500_000;
    let mut rank = Rank::default();
    let start = Instant::now();

    for i in 0..iterations {
        let delta = if i % 3 == 0 { -20 } else { 160 };
        rank.apply(delta);
    }

    let duration = start.elapsed();
    println!(
        "Rank updates: {} iterations in {:?}, final points {}",
        iterations,
        duration,
        rank.points()
    );

    assert!(rank.points() > 0);
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks team splitting of large pools
#[test]
fn benchmark_team_split() {
    let iterations = 10_000;
    let bounds = GameMode::Ranked.team_bounds();
    let start = Instant::now();

    let mut teams_formed = 0;
    for i in 0..iterations {
        let pool: Vec<usize> = (0..(50 + i % 50)).collect();
        let (teams, _rest) = split_into_teams(pool, bounds, RemainderPolicy::KeepQueued);
        teams_formed += teams.len();
    }

    let duration = start.elapsed();
    println!(
        "Team split: {} pools, {} teams in {:?} ({:.2} μs/pool)",
        iterations,
        teams_formed,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 2000);
}

/// Benchmarks round resolution and ranked settlement for full teams
#[test]
fn benchmark_round_resolution() {
    let iterations = 100_000;
    let mut rounds = RandomRounds::seeded(1);
    let start = Instant::now();

    let mut resolved = 0;
    for i in 0..iterations {
        let round = rounds.next_round();
        let guesses: Vec<Option<i32>> = (0..8).map(|p| Some(round.lower + (i + p) % 40)).collect();
        if round_winner(&guesses, round.target).is_some() {
            resolved += 1;
        }
    }
    let settlement = settle_ranked(&[3, 5, 0, 2, 1, 0, 4, 1]);

    let duration = start.elapsed();
    println!(
        "Round resolution: {} rounds in {:?} ({:.2} ns/round)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    assert_eq!(resolved, iterations);
    assert_eq!(settlement.winner, Some(1));
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks ranked queue formation with players spread over all tiers
#[tokio::test]
async fn benchmark_ranked_formation() {
    let matchmaker = Matchmaker::new(RemainderPolicy::StartUndersized);
    let mut peers = Vec::new();

    for i in 0..400u32 {
        let (local, remote) = tokio::io::duplex(64);
        peers.push(remote);
        let player = Player::new(format!("p{}", i), Rank::new((i * 37) % 3000), Connection::new(local));
        matchmaker.enqueue(player, GameMode::Ranked).await;
    }

    let start = Instant::now();
    let teams = matchmaker.form_teams(GameMode::Ranked).await;
    let duration = start.elapsed();

    let placed: usize = teams.iter().map(|t| t.len()).sum();
    println!(
        "Ranked formation: {} teams, {} players placed in {:?}",
        teams.len(),
        placed,
        duration
    );

    for team in &teams {
        let tier = team.members()[0].tier();
        assert!(team.members().iter().all(|p| p.tier() == tier));
        assert!(team.len() <= 8);
    }
    assert_eq!(placed + matchmaker.len(GameMode::Ranked).await, 400);
    assert!(duration.as_millis() < 500);
}
