//! Performance benchmarks for the tick-critical paths

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::game::{Arena, Cycle};
use server::physics::{Trail, Vector2};
use shared::{Direction, PlayerUpdate, ServerMessage};
use std::time::Instant;

/// Benchmarks trail hit tests against a trail as long as a full round leaves
#[test]
fn benchmark_trail_contains() {
    let mut trail = Trail::new();
    for i in 0..1_000 {
        trail.push(Vector2::new(10.0 + (i % 300) as f64 * 3.0, 10.0 + (i / 300) as f64 * 50.0));
    }
    let probe = Vector2::new(500.0, 600.0);

    let iterations = 1_000;
    let start = Instant::now();

    let mut hits = 0;
    for _ in 0..iterations {
        if trail.contains(&probe) {
            hits += 1;
        }
    }

    let duration = start.elapsed();
    println!(
        "Trail hit test: {} iterations over {} points in {:?} ({:.2} μs/iter)",
        iterations,
        trail.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(hits, 0);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks full ticks with many players and growing trails
#[test]
fn benchmark_arena_tick() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut arena = Arena::spawn(16, &mut rng);
    let directions: Vec<Direction> = (0..16)
        .map(|i| match i % 3 {
            0 => Direction::Left,
            1 => Direction::Straight,
            _ => Direction::Right,
        })
        .collect();

    let iterations = 300;
    let start = Instant::now();

    for _ in 0..iterations {
        arena.tick(&directions);
        if arena.alive_count() == 0 {
            break;
        }
    }

    let duration = start.elapsed();
    println!(
        "Arena tick: {} players × {} ticks in {:?} ({:.2} μs/tick)",
        arena.player_count(),
        arena.tick_count(),
        duration,
        duration.as_micros() as f64 / arena.tick_count() as f64
    );

    // A tick has 25 ms; the whole run must fit comfortably in far less.
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks the worst case of a tick: a lone cycle circling inside a dense field
#[test]
fn benchmark_tick_with_long_trails() {
    let cycles: Vec<Cycle> = (0..8)
        .map(|i| {
            let mut cycle = Cycle::new(100.0 + i as f64 * 100.0, 350.0, 90);
            for step in 0..2_000 {
                cycle
                    .trail
                    .push(Vector2::new(20.0 + (step % 320) as f64 * 3.0, 20.0 + i as f64 * 2.0));
            }
            cycle
        })
        .collect();
    let mut arena = Arena::new(cycles);

    let iterations = 50;
    let start = Instant::now();

    for _ in 0..iterations {
        arena.tick(&[]);
    }

    let duration = start.elapsed();
    println!(
        "Tick with long trails: {} ticks in {:?} ({:.2} μs/tick)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(arena.tick_count(), iterations);
    assert!(duration.as_millis() < 3000);
}

/// Benchmarks encoding a tick's worth of player updates
#[test]
fn benchmark_update_encoding() {
    let updates: Vec<PlayerUpdate> = (0..32)
        .map(|i| PlayerUpdate {
            alive: i % 5 != 0,
            x: 100.0 + i as f64,
            y: 200.0 + i as f64,
        })
        .collect();

    let iterations = 10_000;
    let mut buf = Vec::with_capacity(updates.len() * shared::PLAYER_UPDATE_LEN);
    let start = Instant::now();

    for _ in 0..iterations {
        buf.clear();
        for update in &updates {
            ServerMessage::PlayerUpdate(*update).encode(&mut buf).unwrap();
        }
    }

    let duration = start.elapsed();
    println!(
        "Update encoding: {} ticks of {} updates in {:?} ({:.2} μs/tick)",
        iterations,
        updates.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert_eq!(buf.len(), updates.len() * shared::PLAYER_UPDATE_LEN);
    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
