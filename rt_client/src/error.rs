//! Client-side error types, following the same per-layer enum style as
//! `rt_core::error` (`spec.md` AMBIENT STACK).

use rt_core::error::ProtocolError;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("server closed the connection before completing the handshake")]
    HandshakeClosed,
    #[error("server rejected the handshake: {0:?}")]
    HandshakeRejected(rt_core::wire::AuthResultCode),
    #[error("unexpected message during handshake")]
    UnexpectedHandshakeMessage,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("identity file is corrupt: {0}")]
    Json(#[from] serde_json::Error),
    #[error("identity file is corrupt: key is not {0} hex bytes")]
    BadKeyLength(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
