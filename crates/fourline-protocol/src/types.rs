//! Core protocol types for Fourline's wire format.
//!
//! Every inbound command and outbound event the server understands is a
//! variant of one of the two closed enums below. The wire names
//! (`createRoom`, `moveMade`, `activeRooms`, ...) are the public contract
//! with the browser client, so the serde attributes here are load-bearing:
//! a rename changes the protocol.

use serde::{Deserialize, Serialize};

use std::fmt;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// A unique identifier for a connected participant.
///
/// Newtype over `u64` so a participant id can't be confused with any other
/// number in a signature. Assigned by the gateway when a connection is
/// accepted and stable for the life of that connection; the server never
/// persists it beyond the rooms that reference it.
///
/// `#[serde(transparent)]` makes `PlayerId(42)` serialize as plain `42`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P-{}", self.0)
    }
}

/// A short random room code, e.g. `"k3x9qa"`.
///
/// Codes are lowercase alphanumeric and six characters long. Generation
/// (and collision checking against live rooms) lives in the registry —
/// this type only carries the value around.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomCode(String);

impl RoomCode {
    /// Wraps an existing code string.
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Returns the code as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Lobby listing
// ---------------------------------------------------------------------------

/// One entry in the public lobby: a room still waiting for an opponent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveRoom {
    /// The room's join code.
    pub room: RoomCode,
    /// Creation time in Unix milliseconds, used by clients for the
    /// expiry countdown display.
    pub created_at: u64,
    /// Number of participants currently in the room (always < 2 here).
    pub player_count: usize,
}

// ---------------------------------------------------------------------------
// Inbound commands
// ---------------------------------------------------------------------------

/// Commands a client can send to the server.
///
/// `#[serde(tag = "type")]` produces internally tagged JSON, so a join
/// looks like `{ "type": "joinRoom", "room": "k3x9qa" }`. The closed enum
/// replaces the original string-named event dispatch: an unknown command
/// fails to decode instead of being silently dropped, and the gateway's
/// `match` is checked for exhaustiveness at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientCommand {
    /// Create a new room with the sender as creator.
    CreateRoom,

    /// Join an existing room by code.
    JoinRoom { room: RoomCode },

    /// Record the sender's display name in a room.
    #[serde(rename_all = "camelCase")]
    SetPlayerName { name: String, room: RoomCode },

    /// Drop a piece into a column.
    ///
    /// `player_id` names the participant the move is made for. The wire
    /// carries it explicitly (the client includes its own id), matching
    /// the trust-the-client contract; the room still requires the id to
    /// be a roster member.
    #[serde(rename_all = "camelCase")]
    MakeMove {
        room: RoomCode,
        column: usize,
        player_id: PlayerId,
    },

    /// Leave a room, abandoning the game.
    LeaveRoom { room: RoomCode },
}

// ---------------------------------------------------------------------------
// Outbound events
// ---------------------------------------------------------------------------

/// Events the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerEvent {
    /// Sent once on connect so the client learns its participant id.
    #[serde(rename_all = "camelCase")]
    Welcome { player_id: PlayerId },

    /// The sender's `createRoom` succeeded.
    RoomCreated { room: RoomCode },

    /// Ack to the joiner that their `joinRoom` succeeded.
    ///
    /// Wire name is `joinRoom`, mirroring the command — the client treats
    /// the echo as its join confirmation.
    #[serde(rename = "joinRoom")]
    RoomJoined { room: RoomCode },

    /// A second participant joined the room (broadcast to the room).
    PlayerJoined,

    /// Both names are in; the game begins. Ids and names are in creation
    /// order: creator first, joiner second.
    GameStart {
        player1: PlayerId,
        player2: PlayerId,
        names: [String; 2],
    },

    /// A piece landed (broadcast to the room).
    #[serde(rename_all = "camelCase")]
    MoveMade {
        row: usize,
        column: usize,
        player_id: PlayerId,
        player_name: String,
    },

    /// The last move made four in a line (broadcast to the room).
    GameWon { winner: PlayerId },

    /// A participant left or disconnected; the room is being torn down.
    #[serde(rename_all = "camelCase")]
    PlayerLeft {
        message: String,
        departed_id: PlayerId,
    },

    /// A `joinRoom` was rejected (unknown code or room full).
    JoinError { message: String },

    /// The current public lobby. Sent on connect, after every room
    /// membership change, and on a slow refresh for countdown display.
    ActiveRooms { rooms: Vec<ActiveRoom> },

    /// The naming phase timed out; the room was destroyed.
    WaitingTimeout,

    /// Nobody joined within the expiry window; the room was destroyed.
    RoomExpired,

    /// A command was rejected. Only ever sent to the offending
    /// connection, never broadcast.
    Rejected { message: String },
}

// =========================================================================
// Tests
// =========================================================================
