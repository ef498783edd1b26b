//! # Light-Cycle Game Server Library
//!
//! This library provides the authoritative server for a real-time light-cycle
//! arena. Every connected player steers a line that moves continuously; hitting
//! a wall or any trail kills it, a round ends when at most one cycle is left,
//! and a match is a fixed number of rounds with cumulative scores.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server owns every cycle's heading, position and trail. Clients only
//! send a steering intent and render what the server reports.
//!
//! ### Lobby and Readiness
//! Players are registered in join order and receive an ordinal id. The match
//! starts once every registered player has signalled ready; later connections
//! are turned away.
//!
//! ### State Broadcasting
//! After every tick each connection receives the position and alive flag of
//! every player it has not yet seen die this round.
//!
//! ## Architecture Design
//!
//! ### Shared Roster
//! Membership, readiness, steering and scores live in one [`roster::Roster`]
//! behind a mutex. Connection handlers write steering intents into it; the
//! tick loop reads them once per tick.
//!
//! ### Split Connections
//! Each TCP connection is split into a reader, driven by
//! [`connection::ConnectionHandler`], and a writer task draining an outbound
//! queue. A slow or dead client only ever stalls its own writer.
//!
//! ### Fixed-Period Tick
//! [`lifecycle::MatchRunner`] ticks the [`game::Arena`] every 25 ms, broadcasts
//! an immutable snapshot after each tick and pauses between rounds.
//!
//! ## Module Organization
//!
//! - `config`: runtime tunables with the reference defaults
//! - `error`: per-connection error taxonomy
//! - `physics`: vectors, trail hit tests and wall checks
//! - `game`: cycles, motion integration and collision resolution
//! - `roster`: player registry and broadcast fan-out
//! - `lifecycle`: round and match state machines and the tick loop
//! - `connection`: per-connection protocol state machine and writer
//! - `network`: TCP listener tying everything together
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::GameConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::bind("0.0.0.0:8000", GameConfig::default()).await?;
//!
//!     // Accepts players until all are ready, then plays every round.
//!     let summary = server.run().await?;
//!     println!("Winner: {:?}", summary.winner);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Known Limitations
//!
//! A player who connects but never readies holds the lobby open indefinitely.
//! A player who disconnects mid-match keeps their cycle, which runs straight
//! until it crashes.

pub mod config;
pub mod connection;
pub mod error;
pub mod game;
pub mod lifecycle;
pub mod network;
pub mod physics;
pub mod roster;
