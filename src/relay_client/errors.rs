use std::{fmt, io};

use crate::relay::protocol::FrameError;

/// Errors surfaced by the relay client.
#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    Frame(FrameError),
    /// The server answered the handshake with something that is neither
    /// a welcome nor a duplicate-username notice.
    UnexpectedReply(&'static str),
    /// `start` was called before any username claim was accepted.
    NoUsername,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "IO error: {e}"),
            Self::Frame(e) => write!(f, "protocol error: {e:?}"),
            Self::UnexpectedReply(name) => write!(f, "unexpected server reply: {name}"),
            Self::NoUsername => write!(f, "no username has been accepted yet"),
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<FrameError> for ClientError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}
