//! Headless bot that plays a full match against the server.
//!
//! It mirrors what a rendering client does with the stream: learn its id,
//! follow the lobby until everyone is ready, then read one update per
//! not-yet-dead player every tick and steer at random.

use clap::Parser;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{
    encode_direction, encode_ready, read_lobby_message, read_player_id, read_player_update,
    round_over, Direction, ServerMessage, ROUNDS_PER_MATCH,
};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8000")]
    server: String,

    /// Seed for the steering decisions
    #[arg(long)]
    seed: Option<u64>,

    /// Rounds to play before leaving
    #[arg(short, long, default_value_t = ROUNDS_PER_MATCH)]
    rounds: u32,
}

/// Tracks the direction the server holds for this player, so only
/// transitions go on the wire
#[derive(Debug, Default)]
struct Steering {
    current: Direction,
}

impl Steering {
    /// The server resets every player to straight between rounds
    fn new_round(&mut self) {
        self.current = Direction::Straight;
    }

    /// Returns the direction to send, if it differs from the server's view
    fn change(&mut self, next: Direction) -> Option<Direction> {
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(next)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let stream = TcpStream::connect(&args.server).await?;
    stream.set_nodelay(true)?;
    let (mut reader, mut writer) = stream.into_split();

    let id = read_player_id(&mut reader).await?;
    info!("Connected to {} as player {}", args.server, id);

    writer.write_all(&encode_ready(true)).await?;

    let mut player_count = 0u8;
    loop {
        match read_lobby_message(&mut reader).await? {
            ServerMessage::PlayerCount(count) => {
                player_count = count;
                info!("{} players in the lobby", count);
            }
            ServerMessage::PlayerReady(ready) => info!("Player {} is ready", ready),
            ServerMessage::AllReady => break,
            other => warn!("Unexpected lobby message {:?}", other),
        }
    }
    info!("All ready, match starts with {} players", player_count);

    let total = usize::from(player_count);
    let mut steering = Steering::default();

    for round in 1..=args.rounds {
        steering.new_round();
        let mut alive = vec![true; total];
        let mut notified = vec![false; total];
        let mut ticks = 0u32;

        while !round_over(total, alive.iter().filter(|a| **a).count()) {
            for player in 0..total {
                if notified[player] {
                    continue;
                }
                let update = read_player_update(&mut reader).await?;
                alive[player] = update.alive;
                if !update.alive {
                    notified[player] = true;
                    debug!("Player {} died at ({:.1}, {:.1})", player, update.x, update.y);
                }
            }
            ticks += 1;

            // Steering is only sent on transitions, like key presses.
            if ticks % 10 == 0 {
                let next = match rng.gen_range(0..3) {
                    0 => Direction::Left,
                    1 => Direction::Straight,
                    _ => Direction::Right,
                };
                if let Some(direction) = steering.change(next) {
                    writer.write_all(&encode_direction(direction)).await?;
                }
            }
        }

        let survivor = alive.iter().position(|a| *a);
        match survivor {
            Some(winner) if total > 1 => info!("Round {} won by player {}", round, winner),
            _ if total > 1 => info!("Round {} ended in a draw", round),
            _ => info!("Round {} over after {} ticks", round, ticks),
        }
    }

    info!("Match finished");
    Ok(())
}
