//! Per-connection protocol handling.
//!
//! Every accepted socket is split in two. The handler task owns the read
//! half and walks the `Joining → AwaitingReady → Playing → Disconnected`
//! states; a writer task owns the write half and drains the connection's
//! outbound queue. Neither direction ever waits on the other.

use crate::error::ServerError;
use crate::lifecycle::MatchPhase;
use crate::roster::{
    outbound_channel, Outbound, OutboundReceiver, OutboundSender, SharedRoster,
};
use log::{debug, error, info};
use shared::{read_direction, read_ready, CodecError, PlayerId, PlayerUpdate, ServerMessage};
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::timeout;

/// How long a closing connection may keep flushing queued messages
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Joining,
    AwaitingReady,
    Playing,
    Disconnected,
}

/// Handles shared by every connection of a match
#[derive(Clone)]
pub struct MatchContext {
    pub roster: SharedRoster,
    pub phase: Arc<watch::Sender<MatchPhase>>,
}

/// Remembers which players this connection has already seen die this round
#[derive(Debug, Default)]
pub struct DeathNotices {
    notified: HashSet<PlayerId>,
}

impl DeathNotices {
    /// Encodes one tick for this connection.
    ///
    /// Every player not yet reported dead gets an update, in id order; a
    /// player reported dead here is skipped from then on. Returns the number
    /// of updates written.
    pub fn encode_tick(
        &mut self,
        updates: &[PlayerUpdate],
        buf: &mut Vec<u8>,
    ) -> Result<usize, CodecError> {
        let mut written = 0;
        for (index, update) in updates.iter().enumerate() {
            let id = index as PlayerId;
            if self.notified.contains(&id) {
                continue;
            }

            ServerMessage::PlayerUpdate(*update).encode(buf)?;
            written += 1;

            if !update.alive {
                self.notified.insert(id);
            }
        }
        Ok(written)
    }

    pub fn is_notified(&self, id: PlayerId) -> bool {
        self.notified.contains(&id)
    }

    pub fn reset(&mut self) {
        self.notified.clear();
    }
}

/// Serializes queued outbound work onto the socket until the queue closes
pub async fn write_outbound<W: AsyncWrite + Unpin>(
    mut writer: W,
    mut outbound: OutboundReceiver,
) -> Result<(), ServerError> {
    let mut notices = DeathNotices::default();
    let mut buf = Vec::with_capacity(256);

    while let Some(item) = outbound.recv().await {
        buf.clear();
        match item {
            Outbound::Message(message) => message.encode(&mut buf)?,
            Outbound::Tick(updates) => {
                notices.encode_tick(&updates, &mut buf)?;
            }
            Outbound::NewRound => {
                notices.reset();
                continue;
            }
        }

        if !buf.is_empty() {
            writer.write_all(&buf).await?;
        }
    }

    writer.flush().await?;
    Ok(())
}

/// The read side of one player's connection
pub struct ConnectionHandler {
    id: PlayerId,
    addr: SocketAddr,
    state: ConnectionState,
    context: MatchContext,
    phase: watch::Receiver<MatchPhase>,
}

impl ConnectionHandler {
    /// Registers the player and announces them.
    ///
    /// The new connection is sent its id first, then every connection learns
    /// the new player count. Both happen under one roster lock so no other
    /// join can slip in between.
    pub async fn join(
        addr: SocketAddr,
        outbound: OutboundSender,
        context: MatchContext,
    ) -> Result<Self, ServerError> {
        let phase = context.phase.subscribe();

        let id = {
            let mut roster = context.roster.lock().await;
            let id = roster.add_player(addr, outbound)?;
            roster.send_to(id, Outbound::Message(ServerMessage::AssignId(id)));
            let count = roster.len() as u8;
            roster.broadcast(Outbound::Message(ServerMessage::PlayerCount(count)));
            id
        };

        Ok(Self {
            id,
            addr,
            state: ConnectionState::Joining,
            context,
            phase,
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reads from the client until the match ends or the connection fails
    pub async fn run<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<(), ServerError> {
        self.state = ConnectionState::AwaitingReady;
        info!("Player {} waiting for ready", self.id);
        self.await_ready(reader).await?;

        self.state = ConnectionState::Playing;
        self.receive_directions(reader).await
    }

    async fn await_ready<R: AsyncRead + Unpin>(&mut self, reader: &mut R) -> Result<(), ServerError> {
        // A player who never sends `true` holds the whole lobby; there is no timeout.
        while !read_ready(reader).await? {
            debug!("Player {} sent a not-ready flag", self.id);
        }

        let mut roster = self.context.roster.lock().await;
        let all_ready = roster.mark_ready(self.id);
        info!("Player {} ready", self.id);
        roster.broadcast(Outbound::Message(ServerMessage::PlayerReady(self.id)));

        if all_ready {
            roster.close_registration();
            roster.broadcast(Outbound::Message(ServerMessage::AllReady));
            info!("All {} players ready", roster.len());
            self.context.phase.send_replace(MatchPhase::Playing);
        }

        Ok(())
    }

    /// Stores every steering byte as the player's latest direction
    async fn receive_directions<R: AsyncRead + Unpin>(
        &mut self,
        reader: &mut R,
    ) -> Result<(), ServerError> {
        let roster = &self.context.roster;
        let phase = &mut self.phase;

        loop {
            tokio::select! {
                direction = read_direction(reader) => {
                    let direction = direction?;
                    roster.lock().await.set_direction(self.id, direction);
                }
                changed = phase.changed() => {
                    if changed.is_err() || *phase.borrow() == MatchPhase::Finished {
                        debug!("Player {} stops reading, match finished", self.id);
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Detaches this connection from the roster's broadcasts
    pub async fn disconnect(&mut self) {
        self.state = ConnectionState::Disconnected;
        self.context.roster.lock().await.disconnect(self.id);
    }
}

/// Runs one TCP connection from registration to disconnect
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    context: MatchContext,
) -> Result<(), ServerError> {
    let (mut reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = outbound_channel();

    let mut handler = ConnectionHandler::join(addr, outbound_tx, context).await?;
    let id = handler.id();
    let mut writer_task = tokio::spawn(write_outbound(writer, outbound_rx));

    let result = tokio::select! {
        result = handler.run(&mut reader) => result,
        joined = &mut writer_task => match joined {
            Ok(Ok(())) => Err(ServerError::WriterStopped),
            Ok(Err(e)) => Err(e),
            Err(e) => {
                error!("Writer task for player {} failed: {}", id, e);
                Err(ServerError::WriterStopped)
            }
        },
    };

    handler.disconnect().await;

    // Dropping the roster's sender lets the writer flush what is queued and stop.
    if !writer_task.is_finished() && timeout(WRITER_DRAIN_TIMEOUT, writer_task).await.is_err() {
        debug!("Writer for player {} did not drain in time", id);
    }

    info!("Connection of player {} from {} closed", id, handler.addr);
    result
}
