//! Unified error type for the Fourline server.

use fourline_protocol::ProtocolError;
use fourline_room::RoomError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FourlineError {
    /// A socket-level error (bind, accept).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A WebSocket-level error (handshake, send, recv).
    #[error(transparent)]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A room-level error (full, not found, invalid state).
    #[error(transparent)]
    Room(#[from] RoomError),
}
