//! Room lifecycle management for Fourline.
//!
//! Each room runs as an isolated Tokio task (actor model) owning one
//! board, a two-participant roster, display names, and the lifecycle
//! timers. All mutations of a room go through its mailbox, so they are
//! serialized per room; rooms never share state and run in parallel.
//!
//! # Key types
//!
//! - [`Board`] — pure 6×7 grid state and win detection
//! - [`RoomHandle`] — send commands to a running room actor
//! - [`RoomRegistry`] — creates/looks up/removes rooms, owns the lobby
//! - [`RoomPhase`] — lifecycle state machine
//! - [`RoomTimings`] — expiry and naming-timeout durations

mod board;
mod config;
mod error;
mod registry;
mod room;

pub use board::{Board, COLS, ROWS, WIN_LEN};
pub use config::{RoomPhase, RoomTimings};
pub use error::RoomError;
pub use registry::RoomRegistry;
pub use room::{EventSender, LeaveReason, RoomHandle, RoomSnapshot};
