use shared::CodecError;
use std::io;
use thiserror::Error;

/// Failures local to one connection; none of them stop the match for others
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("connection I/O failed: {0}")]
    ConnectionIo(#[from] io::Error),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("roster is full ({0} players)")]
    RosterFull(usize),
    #[error("match already started, registration is closed")]
    RegistrationClosed,
    #[error("outbound writer stopped")]
    WriterStopped,
}

impl From<CodecError> for ServerError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::ConnectionIo(e) => ServerError::ConnectionIo(e),
            CodecError::MalformedMessage(msg) => ServerError::MalformedMessage(msg),
        }
    }
}
