//! Arena constants and the binary wire protocol spoken between the light-cycle
//! server and its clients.
//!
//! Messages carry no length prefix. Every message has a fixed layout, and
//! some are untagged, so decoders are split by protocol phase: the player id
//! comes first, then tagged lobby messages, then bare per-tick player updates.

use bincode::Options;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub const WORLD_WIDTH: f64 = 1000.0;
pub const WORLD_HEIGHT: f64 = 700.0;
pub const PLAYER_RADIUS: f64 = 5.0;
/// Stroke width of a trail; a point inside the stroke counts as a hit.
pub const TRAIL_STROKE_WIDTH: f64 = 5.0;
/// Spawn points keep this distance from every wall.
pub const SPAWN_MARGIN: f64 = 100.0;
pub const CYCLE_SPEED: f64 = 3.0;
pub const TURN_RATE_DEGREES: i32 = 6;
pub const ROUNDS_PER_MATCH: u32 = 5;
pub const TICK_MILLIS: u64 = 25;
pub const ROUND_PAUSE_MILLIS: u64 = 5000;
pub const DEFAULT_PORT: u16 = 8000;

pub const TAG_PLAYER_COUNT: u8 = 0;
pub const TAG_PLAYER_READY: u8 = 1;
pub const TAG_ALL_READY: u8 = 2;

/// Encoded size of a [`PlayerUpdate`]: the dead flag and two big-endian f64.
pub const PLAYER_UPDATE_LEN: usize = 17;

/// Ordinal player id, assigned in join order and never reused within a match.
pub type PlayerId = u8;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("connection I/O failed: {0}")]
    ConnectionIo(#[from] io::Error),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
}

impl From<bincode::Error> for CodecError {
    fn from(err: bincode::Error) -> Self {
        CodecError::MalformedMessage(err.to_string())
    }
}

/// Steering intent sent by a client on key transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Left,
    #[default]
    Straight,
    Right,
}

impl Direction {
    pub fn as_i8(self) -> i8 {
        match self {
            Direction::Left => -1,
            Direction::Straight => 0,
            Direction::Right => 1,
        }
    }

    /// Heading change applied for one tick of steering in this direction
    pub fn turn_degrees(self) -> i32 {
        TURN_RATE_DEGREES * i32::from(self.as_i8())
    }
}

impl TryFrom<i8> for Direction {
    type Error = CodecError;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Direction::Left),
            0 => Ok(Direction::Straight),
            1 => Ok(Direction::Right),
            other => Err(CodecError::MalformedMessage(format!(
                "direction byte {} outside -1..=1",
                other
            ))),
        }
    }
}

/// Per-tick state of one player as seen by clients
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerUpdate {
    pub alive: bool,
    pub x: f64,
    pub y: f64,
}

/// Wire form of a [`PlayerUpdate`]. The flag byte is 1 for a dead cycle,
/// which is what existing rendering clients read.
#[derive(Serialize, Deserialize)]
struct WireUpdate {
    dead: bool,
    x: f64,
    y: f64,
}

impl PlayerUpdate {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        let wire = WireUpdate {
            dead: !self.alive,
            x: self.x,
            y: self.y,
        };
        wire_options().serialize_into(buf, &wire)?;
        Ok(())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let wire: WireUpdate = wire_options().deserialize(bytes)?;
        Ok(Self {
            alive: !wire.dead,
            x: wire.x,
            y: wire.y,
        })
    }
}

/// Everything the server ever writes to a game connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ServerMessage {
    /// Untagged, sent once as the very first byte of a connection
    AssignId(PlayerId),
    PlayerCount(u8),
    PlayerReady(PlayerId),
    AllReady,
    /// Untagged, one per still-reported player per tick
    PlayerUpdate(PlayerUpdate),
}

impl ServerMessage {
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        match self {
            ServerMessage::AssignId(id) => buf.push(*id),
            ServerMessage::PlayerCount(count) => buf.extend_from_slice(&[TAG_PLAYER_COUNT, *count]),
            ServerMessage::PlayerReady(id) => buf.extend_from_slice(&[TAG_PLAYER_READY, *id]),
            ServerMessage::AllReady => buf.push(TAG_ALL_READY),
            ServerMessage::PlayerUpdate(update) => update.encode(buf)?,
        }
        Ok(())
    }
}

fn wire_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_big_endian()
        .with_fixint_encoding()
}

fn map_read_error(err: io::Error, what: &str) -> CodecError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        CodecError::MalformedMessage(format!("stream closed while reading {}", what))
    } else {
        CodecError::ConnectionIo(err)
    }
}

async fn read_byte<R: AsyncRead + Unpin>(reader: &mut R, what: &str) -> Result<u8, CodecError> {
    reader.read_u8().await.map_err(|e| map_read_error(e, what))
}

/// Reads the ready flag a client sends once it is ready to play
pub async fn read_ready<R: AsyncRead + Unpin>(reader: &mut R) -> Result<bool, CodecError> {
    match read_byte(reader, "ready flag").await? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(CodecError::MalformedMessage(format!(
            "ready flag byte {} is not a boolean",
            other
        ))),
    }
}

/// Reads one steering byte
pub async fn read_direction<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Direction, CodecError> {
    let byte = read_byte(reader, "direction").await?;
    Direction::try_from(byte as i8)
}

pub async fn read_player_id<R: AsyncRead + Unpin>(reader: &mut R) -> Result<PlayerId, CodecError> {
    read_byte(reader, "player id").await
}

/// Reads one tagged lobby message (player count, player ready or all ready)
pub async fn read_lobby_message<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<ServerMessage, CodecError> {
    match read_byte(reader, "lobby tag").await? {
        TAG_PLAYER_COUNT => Ok(ServerMessage::PlayerCount(
            read_byte(reader, "player count").await?,
        )),
        TAG_PLAYER_READY => Ok(ServerMessage::PlayerReady(
            read_byte(reader, "ready player id").await?,
        )),
        TAG_ALL_READY => Ok(ServerMessage::AllReady),
        tag => Err(CodecError::MalformedMessage(format!("unknown lobby tag {}", tag))),
    }
}

pub async fn read_player_update<R: AsyncRead + Unpin>(
    reader: &mut R,
) -> Result<PlayerUpdate, CodecError> {
    let mut bytes = [0u8; PLAYER_UPDATE_LEN];
    reader
        .read_exact(&mut bytes)
        .await
        .map_err(|e| map_read_error(e, "player update"))?;
    PlayerUpdate::decode(&bytes)
}

pub fn encode_ready(ready: bool) -> [u8; 1] {
    [u8::from(ready)]
}

pub fn encode_direction(direction: Direction) -> [u8; 1] {
    [direction.as_i8() as u8]
}

/// Round termination rule shared by the server and any client mirroring it.
///
/// With several players the round ends once at most one is alive; a lone
/// player keeps going until they die.
pub fn round_over(total_players: usize, alive_players: usize) -> bool {
    (total_players > 1 && alive_players <= 1) || (total_players == 1 && alive_players == 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use tokio_test::io::Builder;

    fn update_bytes(dead: bool, x: f64, y: f64) -> Vec<u8> {
        let mut bytes = vec![u8::from(dead)];
        bytes.extend_from_slice(&x.to_be_bytes());
        bytes.extend_from_slice(&y.to_be_bytes());
        bytes
    }

    #[test]
    fn test_direction_from_byte() {
        assert_eq!(Direction::try_from(-1).unwrap(), Direction::Left);
        assert_eq!(Direction::try_from(0).unwrap(), Direction::Straight);
        assert_eq!(Direction::try_from(1).unwrap(), Direction::Right);
        assert!(matches!(
            Direction::try_from(2),
            Err(CodecError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_direction_turn_degrees() {
        assert_eq!(Direction::Left.turn_degrees(), -6);
        assert_eq!(Direction::Straight.turn_degrees(), 0);
        assert_eq!(Direction::Right.turn_degrees(), 6);
        assert_eq!(Direction::default(), Direction::Straight);
    }

    #[test]
    fn test_lobby_message_layout() {
        let mut buf = Vec::new();
        ServerMessage::AssignId(3).encode(&mut buf).unwrap();
        ServerMessage::PlayerCount(4).encode(&mut buf).unwrap();
        ServerMessage::PlayerReady(2).encode(&mut buf).unwrap();
        ServerMessage::AllReady.encode(&mut buf).unwrap();

        assert_eq!(buf, vec![3, 0, 4, 1, 2, 2]);
    }

    #[test]
    fn test_player_update_layout_is_big_endian() {
        let mut buf = Vec::new();
        let update = PlayerUpdate {
            alive: true,
            x: 1.0,
            y: -2.5,
        };
        ServerMessage::PlayerUpdate(update).encode(&mut buf).unwrap();

        assert_eq!(buf.len(), PLAYER_UPDATE_LEN);
        assert_eq!(buf, update_bytes(false, 1.0, -2.5));
        assert_eq!(&buf[1..3], &[0x3F, 0xF0]);
    }

    #[test]
    fn test_flag_byte_marks_dead_cycles() {
        let mut buf = Vec::new();
        let live = PlayerUpdate {
            alive: true,
            x: 300.0,
            y: 200.0,
        };
        let dead = PlayerUpdate { alive: false, ..live };
        live.encode(&mut buf).unwrap();
        dead.encode(&mut buf).unwrap();

        assert_eq!(buf[0], 0);
        assert_eq!(buf[PLAYER_UPDATE_LEN], 1);
        assert_eq!(PlayerUpdate::decode(&buf[..PLAYER_UPDATE_LEN]).unwrap(), live);
        assert_eq!(PlayerUpdate::decode(&buf[PLAYER_UPDATE_LEN..]).unwrap(), dead);
    }

    #[test]
    fn test_client_encoders() {
        assert_eq!(encode_ready(true), [1]);
        assert_eq!(encode_ready(false), [0]);
        assert_eq!(encode_direction(Direction::Left), [0xFF]);
        assert_eq!(encode_direction(Direction::Right), [1]);
    }

    #[test]
    fn test_round_over_rule() {
        assert!(!round_over(3, 2));
        assert!(round_over(3, 1));
        assert!(round_over(2, 0));
        assert!(!round_over(1, 1));
        assert!(round_over(1, 0));
        assert!(!round_over(0, 0));
    }

    #[tokio::test]
    async fn test_read_lobby_sequence() {
        let mut stream = Builder::new().read(&[5, 0, 2, 1, 0, 2]).build();

        assert_eq!(read_player_id(&mut stream).await.unwrap(), 5);
        assert_eq!(
            read_lobby_message(&mut stream).await.unwrap(),
            ServerMessage::PlayerCount(2)
        );
        assert_eq!(
            read_lobby_message(&mut stream).await.unwrap(),
            ServerMessage::PlayerReady(0)
        );
        assert_eq!(
            read_lobby_message(&mut stream).await.unwrap(),
            ServerMessage::AllReady
        );
    }

    #[tokio::test]
    async fn test_unknown_lobby_tag_is_malformed() {
        let mut stream = Builder::new().read(&[9]).build();
        let result = read_lobby_message(&mut stream).await;
        assert!(matches!(result, Err(CodecError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_read_player_update() {
        let bytes = update_bytes(true, 412.25, 88.0);
        let mut stream = Builder::new().read(&bytes).build();

        let update = read_player_update(&mut stream).await.unwrap();
        assert!(!update.alive);
        assert_approx_eq!(update.x, 412.25);
        assert_approx_eq!(update.y, 88.0);
    }

    #[tokio::test]
    async fn test_truncated_update_is_malformed() {
        let bytes = update_bytes(false, 10.0, 20.0);
        let mut stream = Builder::new().read(&bytes[..9]).build();

        let result = read_player_update(&mut stream).await;
        assert!(matches!(result, Err(CodecError::MalformedMessage(_))));
    }

    #[tokio::test]
    async fn test_read_ready_and_directions() {
        let mut stream = Builder::new().read(&[1, 0xFF, 0, 1]).build();

        assert!(read_ready(&mut stream).await.unwrap());
        assert_eq!(read_direction(&mut stream).await.unwrap(), Direction::Left);
        assert_eq!(
            read_direction(&mut stream).await.unwrap(),
            Direction::Straight
        );
        assert_eq!(read_direction(&mut stream).await.unwrap(), Direction::Right);
    }

    #[tokio::test]
    async fn test_invalid_client_bytes_are_malformed() {
        let mut stream = Builder::new().read(&[2]).build();
        assert!(matches!(
            read_ready(&mut stream).await,
            Err(CodecError::MalformedMessage(_))
        ));

        let mut stream = Builder::new().read(&[5]).build();
        assert!(matches!(
            read_direction(&mut stream).await,
            Err(CodecError::MalformedMessage(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_stream_is_malformed() {
        let mut stream = Builder::new().build();
        assert!(matches!(
            read_direction(&mut stream).await,
            Err(CodecError::MalformedMessage(_))
        ));
    }
}
