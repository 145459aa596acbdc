//! # Fourline
//!
//! A networked four-in-a-row game server.
//!
//! Two players meet in a room, pick display names, and take turns
//! dropping pieces into a 6×7 grid over a WebSocket connection. The
//! server owns the board, detects wins, and pushes every state change
//! to both participants.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fourline::FourlineServer;
//!
//! # async fn run() -> Result<(), fourline::FourlineError> {
//! let server = FourlineServer::builder()
//!     .bind("0.0.0.0:3000")
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod error;
mod handler;
mod server;

pub use error::FourlineError;
pub use server::{FourlineServer, FourlineServerBuilder};

/// Commonly used types, re-exported from the sub-crates.
pub mod prelude {
    pub use fourline_protocol::{
        ActiveRoom, ClientCommand, PlayerId, RoomCode, ServerEvent,
    };
    pub use fourline_room::{RoomPhase, RoomTimings, COLS, ROWS, WIN_LEN};

    pub use crate::{FourlineError, FourlineServer, FourlineServerBuilder};
}
