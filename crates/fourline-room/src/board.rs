//! Pure grid state and win detection. No channels, no timers — the room
//! actor drives this and owns the only mutable reference.

use fourline_protocol::PlayerId;

use crate::RoomError;

/// Number of rows in the grid. Row 0 is the top; pieces settle toward
/// row `ROWS - 1`.
pub const ROWS: usize = 6;
/// Number of columns in the grid.
pub const COLS: usize = 7;
/// How many in a line wins.
pub const WIN_LEN: usize = 4;

/// The 6×7 board. Each cell is empty or owned by a participant.
///
/// The gravity invariant holds by construction: the only mutation is
/// [`drop_piece`](Self::drop_piece), which fills the lowest empty cell
/// of a column.
#[derive(Debug, Clone)]
pub struct Board {
    cells: [[Option<PlayerId>; COLS]; ROWS],
}

impl Board {
    /// Creates an empty board.
    pub fn new() -> Self {
        Self {
            cells: [[None; COLS]; ROWS],
        }
    }

    /// Drops a piece into `column`, returning the row it settled in.
    ///
    /// Scans the column bottom-up for the first empty cell. Returns
    /// [`RoomError::ColumnFull`] when all six cells are taken.
    ///
    /// Column range is the caller's contract — the gateway rejects
    /// out-of-range indices before they reach the board.
    pub fn drop_piece(
        &mut self,
        column: usize,
        player: PlayerId,
    ) -> Result<usize, RoomError> {
        debug_assert!(column < COLS, "column index validated at the gateway");
        for row in (0..ROWS).rev() {
            if self.cells[row][column].is_none() {
                self.cells[row][column] = Some(player);
                return Ok(row);
            }
        }
        Err(RoomError::ColumnFull(column))
    }

    /// Returns the owner of a cell, if any.
    pub fn cell(&self, row: usize, column: usize) -> Option<PlayerId> {
        self.cells[row][column]
    }

    /// Returns `true` if the piece just played at (`row`, `column`)
    /// completes four in a line for `player`.
    ///
    /// Checks the played row's horizontal windows, the played column's
    /// vertical windows, and both diagonal families across the whole
    /// board. First match wins; there is no need to find every line.
    pub fn wins_at(&self, row: usize, column: usize, player: PlayerId) -> bool {
        // Horizontal, in the played row.
        for c in 0..=COLS - WIN_LEN {
            if (0..WIN_LEN).all(|k| self.owned(row, c + k, player)) {
                return true;
            }
        }

        // Vertical, in the played column.
        for r in 0..=ROWS - WIN_LEN {
            if (0..WIN_LEN).all(|k| self.owned(r + k, column, player)) {
                return true;
            }
        }

        // Diagonal, rising left-to-right.
        for r in WIN_LEN - 1..ROWS {
            for c in 0..=COLS - WIN_LEN {
                if (0..WIN_LEN).all(|k| self.owned(r - k, c + k, player)) {
                    return true;
                }
            }
        }

        // Diagonal, falling left-to-right.
        for r in 0..=ROWS - WIN_LEN {
            for c in 0..=COLS - WIN_LEN {
                if (0..WIN_LEN).all(|k| self.owned(r + k, c + k, player)) {
                    return true;
                }
            }
        }

        false
    }

    fn owned(&self, row: usize, column: usize, player: PlayerId) -> bool {
        self.cells[row][column] == Some(player)
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}
