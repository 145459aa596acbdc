//! Error types for the room layer.

use fourline_protocol::{PlayerId, RoomCode};

use crate::RoomPhase;

/// Errors that can occur during room operations.
///
/// All of these are recoverable: the gateway surfaces them to the
/// originating connection as a rejection event and moves on.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No room with this code exists.
    #[error("room {0} not found")]
    NotFound(RoomCode),

    /// The room already has two participants.
    #[error("room {0} is full")]
    RoomFull(RoomCode),

    /// The participant is already in a room (one room at a time).
    #[error("player {0} already in room {1}")]
    AlreadyInRoom(PlayerId, RoomCode),

    /// The participant is not a member of this room.
    #[error("player {0} not in room {1}")]
    NotInRoom(PlayerId, RoomCode),

    /// The column has no empty cell left.
    #[error("column {0} is full")]
    ColumnFull(usize),

    /// The column index is outside `[0, 7)`. Raised at the gateway
    /// boundary; the board never sees an out-of-range index.
    #[error("column {0} is out of range")]
    InvalidColumn(usize),

    /// A move arrived while the room was not in progress.
    #[error("game is not in progress (room is {0})")]
    NotInProgress(RoomPhase),

    /// The room's mailbox is gone — it finished, expired, or was
    /// abandoned between lookup and delivery.
    #[error("room {0} is unavailable")]
    Unavailable(RoomCode),
}
