//! Registry of players for one match
//!
//! This module owns everything that outlives a single round:
//! - Id assignment in join order, with ids never reused
//! - Readiness flags and the all-ready check that starts the match
//! - The latest steering intent of each player
//! - Cumulative scores
//! - The outbound channel of each live connection, used for broadcasts
//!
//! The roster sits behind one mutex; every operation is a short critical
//! section so connection handlers and the tick loop never wait on I/O here.

use crate::error::ServerError;
use log::{debug, info, warn};
use shared::{Direction, PlayerId, PlayerUpdate, ServerMessage};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

pub type SharedRoster = Arc<Mutex<Roster>>;

/// Queued items per connection before tick snapshots start being dropped
pub const OUTBOUND_QUEUE_CAPACITY: usize = 512;

pub type OutboundSender = mpsc::Sender<Outbound>;
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

/// Creates the bounded queue feeding one connection's writer task
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_QUEUE_CAPACITY)
}

/// Work queued for a connection's writer task
#[derive(Debug, Clone)]
pub enum Outbound {
    Message(ServerMessage),
    /// Post-tick state of every player, indexed by id
    Tick(Arc<[PlayerUpdate]>),
    /// A new round starts; forget which deaths were already reported
    NewRound,
}

/// A registered player and their match-long state
///
/// Each entry keeps:
/// - Connection metadata (id, address)
/// - Match state that survives rounds (ready flag, score)
/// - The most recent steering intent
/// - The sender half of the connection's outbound queue, cleared once the
///   connection is gone
#[derive(Debug)]
pub struct PlayerEntry {
    /// Ordinal id assigned at join time
    pub id: PlayerId,
    pub addr: SocketAddr,
    pub ready: bool,
    /// Latest direction received; later writes replace earlier ones
    pub direction: Direction,
    pub score: u32,
    outbound: Option<OutboundSender>,
}

impl PlayerEntry {
    pub fn new(id: PlayerId, addr: SocketAddr, outbound: OutboundSender) -> Self {
        Self {
            id,
            addr,
            ready: false,
            direction: Direction::Straight,
            score: 0,
            outbound: Some(outbound),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.outbound.is_some()
    }
}

/// Manages registration, readiness, steering and scores for all players
pub struct Roster {
    /// Players keyed by id; ascending order equals join order
    players: BTreeMap<PlayerId, PlayerEntry>,
    max_players: usize,
    registration_open: bool,
}

impl Roster {
    /// Creates an empty roster accepting up to `max_players` joins
    pub fn new(max_players: usize) -> Self {
        Self {
            players: BTreeMap::new(),
            max_players: max_players.min(usize::from(u8::MAX)),
            registration_open: true,
        }
    }

    pub fn shared(max_players: usize) -> SharedRoster {
        Arc::new(Mutex::new(Self::new(max_players)))
    }

    /// Registers a new player and returns their id
    ///
    /// Ids are handed out sequentially from zero. Fails once the match has
    /// started or the roster is at capacity.
    pub fn add_player(
        &mut self,
        addr: SocketAddr,
        outbound: OutboundSender,
    ) -> Result<PlayerId, ServerError> {
        if !self.registration_open {
            return Err(ServerError::RegistrationClosed);
        }
        if self.players.len() >= self.max_players {
            return Err(ServerError::RosterFull(self.max_players));
        }

        let id = self.players.len() as PlayerId;
        self.players.insert(id, PlayerEntry::new(id, addr, outbound));
        info!("Player {} joined from {}", id, addr);

        Ok(id)
    }

    pub fn get(&self, id: PlayerId) -> Option<&PlayerEntry> {
        self.players.get(&id)
    }

    /// Marks a player ready and returns whether every player is now ready
    pub fn mark_ready(&mut self, id: PlayerId) -> bool {
        if let Some(player) = self.players.get_mut(&id) {
            player.ready = true;
        }
        self.all_ready()
    }

    /// True when at least one player is registered and all of them are ready
    pub fn all_ready(&self) -> bool {
        !self.players.is_empty() && self.players.values().all(|p| p.ready)
    }

    pub fn close_registration(&mut self) {
        self.registration_open = false;
    }

    pub fn is_registration_open(&self) -> bool {
        self.registration_open
    }

    /// Stores the latest steering intent of a player
    pub fn set_direction(&mut self, id: PlayerId, direction: Direction) {
        if let Some(player) = self.players.get_mut(&id) {
            player.direction = direction;
        }
    }

    /// Current steering intents, indexed by player id
    pub fn directions(&self) -> Vec<Direction> {
        self.players.values().map(|p| p.direction).collect()
    }

    pub fn reset_directions(&mut self) {
        for player in self.players.values_mut() {
            player.direction = Direction::Straight;
        }
    }

    pub fn award_point(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            player.score += 1;
        }
    }

    /// Scores of all players in id order
    pub fn scores(&self) -> Vec<(PlayerId, u32)> {
        self.players.values().map(|p| (p.id, p.score)).collect()
    }

    /// Queues a message for one player's connection
    ///
    /// Returns false if the player is unknown or already disconnected.
    pub fn send_to(&mut self, id: PlayerId, outbound: Outbound) -> bool {
        let Some(player) = self.players.get_mut(&id) else {
            return false;
        };
        Self::deliver(player, outbound)
    }

    /// Queues a message for every connected player
    ///
    /// A connection whose queue is closed is dropped from the broadcast set;
    /// delivery to the others continues. Returns the number of deliveries.
    pub fn broadcast(&mut self, outbound: Outbound) -> usize {
        let mut delivered = 0;
        for player in self.players.values_mut() {
            if Self::deliver(player, outbound.clone()) {
                delivered += 1;
            }
        }
        delivered
    }

    /// Never blocks. A full queue drops tick snapshots only; a connection
    /// that cannot take a control message is detached, since skipping one
    /// would corrupt what it reads next.
    fn deliver(player: &mut PlayerEntry, outbound: Outbound) -> bool {
        let Some(sender) = &player.outbound else {
            return false;
        };

        match sender.try_send(outbound) {
            Ok(()) => true,
            Err(TrySendError::Full(Outbound::Tick(_))) => {
                debug!("Player {} is lagging, tick snapshot dropped", player.id);
                false
            }
            Err(TrySendError::Full(_)) => {
                warn!("Player {} stopped reading, removing from broadcasts", player.id);
                player.outbound = None;
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!("Player {} stopped receiving, removing from broadcasts", player.id);
                player.outbound = None;
                false
            }
        }
    }

    /// Detaches a player's connection; the player keeps their id and score
    pub fn disconnect(&mut self, id: PlayerId) {
        if let Some(player) = self.players.get_mut(&id) {
            if player.outbound.take().is_some() {
                info!("Player {} disconnected", id);
            }
        }
    }

    pub fn connected_count(&self) -> usize {
        self.players.values().filter(|p| p.is_connected()).count()
    }

    /// Returns the number of registered players
    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
