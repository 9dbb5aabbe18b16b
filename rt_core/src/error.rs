//! Layered error enums, grounded on `t51core::net::{error, result, shared}`
//! and `flux::shared::NetworkError`: one small enum per concern, each with a
//! `From<io::Error>` conversion, rather than a single stringly-typed error.

use std::io;

/// Errors from the wire codec (`spec.md` §4.1): framing and decode failures.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("frame ended mid-header or mid-payload")]
    FramingError,
    #[error("unknown message type byte {0:#x}")]
    UnknownType(u8),
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge { len: u32, max: u32 },
    #[error("payload is not valid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
}

pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors from the handshake phase (`spec.md` §4.2 AWAIT_RESPONSE). These
/// map directly onto `AUTH_RESULT` codes rather than closing the connection
/// silently.
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum HandshakeError {
    #[error("name already bound to a different key")]
    NameTaken,
    #[error("key already bound to a different name")]
    KeyMismatch,
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("name is empty, too long, or not printable")]
    InvalidName,
    #[error("a live session already exists for this key")]
    AlreadyConnected,
}

/// Errors that terminate a running session (`spec.md` §7).
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("keep-alive timed out")]
    Timeout,
    #[error("peer closed the connection")]
    Closed,
    #[error("message type {0} is not legal in this session state")]
    UnexpectedMessage(u8),
}
