//! Room lifecycle state machine and timing configuration.

use std::time::Duration;

// ---------------------------------------------------------------------------
// RoomTimings
// ---------------------------------------------------------------------------

/// Timer durations for a room's pre-game phases.
///
/// Defaults match the production values; tests inject much shorter ones.
#[derive(Debug, Clone, Copy)]
pub struct RoomTimings {
    /// How long a freshly created room waits for a second participant
    /// before expiring.
    pub expiry: Duration,

    /// How long the room waits for the second display name once the
    /// first one is set.
    pub naming: Duration,
}

impl Default for RoomTimings {
    fn default() -> Self {
        Self {
            expiry: Duration::from_secs(60),
            naming: Duration::from_secs(30),
        }
    }
}

// ---------------------------------------------------------------------------
// RoomPhase
// ---------------------------------------------------------------------------

/// The lifecycle phase of a room.
///
/// ```text
/// WaitingForOpponent → WaitingForNames → InProgress → Finished
///         │                   │
///         └── Expired         └── Expired        (timers)
///
/// any non-terminal ──────────────→ Abandoned     (leave/disconnect)
/// ```
///
/// `Finished`, `Expired`, and `Abandoned` are terminal: the actor stops
/// and the registry drops the room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Created, one participant, waiting for someone to join.
    WaitingForOpponent,
    /// Two participants, collecting display names.
    WaitingForNames,
    /// Game running; moves are accepted.
    InProgress,
    /// Somebody made four in a line.
    Finished,
    /// A pre-game timer fired before the room filled up.
    Expired,
    /// A participant left or disconnected.
    Abandoned,
}

impl RoomPhase {
    /// Returns `true` if the room is accepting a second participant.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::WaitingForOpponent)
    }

    /// Returns `true` if moves are accepted.
    pub fn accepts_moves(&self) -> bool {
        matches!(self, Self::InProgress)
    }

    /// Returns `true` for the three end states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Expired | Self::Abandoned)
    }
}

impl std::fmt::Display for RoomPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WaitingForOpponent => write!(f, "WaitingForOpponent"),
            Self::WaitingForNames => write!(f, "WaitingForNames"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Finished => write!(f, "Finished"),
            Self::Expired => write!(f, "Expired"),
            Self::Abandoned => write!(f, "Abandoned"),
        }
    }
}
