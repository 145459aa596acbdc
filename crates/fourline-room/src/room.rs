//! Room actor: an isolated Tokio task that owns one game session.
//!
//! Each room runs in its own task and is mutated only through its mpsc
//! mailbox, so joins, names, moves, and timer callbacks against the same
//! room are applied one at a time. Timers post back into the same mailbox
//! instead of touching state directly, which keeps them inside the same
//! serialization domain.

use std::collections::HashMap;
use std::time::Duration;

use fourline_protocol::{PlayerId, RoomCode, ServerEvent};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{Board, RoomError, RoomPhase, RoomTimings};

/// Channel sender for delivering events to one participant's connection.
pub type EventSender = mpsc::UnboundedSender<ServerEvent>;

/// Mailbox capacity per room. Two participants can't realistically
/// outpace this; senders briefly wait if they do.
const MAILBOX_SIZE: usize = 32;

/// Why a participant is leaving a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveReason {
    /// Explicit `leaveRoom` command.
    Left,
    /// The connection dropped.
    Disconnected,
}

impl LeaveReason {
    /// The notification text shown to the remaining participant.
    /// Wording matches the original client's expectations.
    fn message(self) -> &'static str {
        match self {
            Self::Left => "Other player left the game",
            Self::Disconnected => "Other player disconnected from the game",
        }
    }
}

/// Which timer a deadline task belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TimerKind {
    /// Waiting-for-opponent expiry (60s in production).
    Expiry,
    /// Naming-phase timeout (30s in production).
    Naming,
}

/// Commands sent to a room actor through its mailbox.
enum RoomCommand {
    Join {
        player_id: PlayerId,
        sender: EventSender,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    SetName {
        player_id: PlayerId,
        name: String,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Move {
        player_id: PlayerId,
        column: usize,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Leave {
        player_id: PlayerId,
        reason: LeaveReason,
        reply: oneshot::Sender<Result<(), RoomError>>,
    },
    Describe {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    /// Posted by a timer task when its deadline elapses. Carries the
    /// generation it was armed with; a mismatch means it was cancelled
    /// or superseded and the firing is a no-op.
    TimerFired { kind: TimerKind, generation: u64 },
}

/// A snapshot of room metadata for inspection (lobby checks, tests).
#[derive(Debug, Clone)]
pub struct RoomSnapshot {
    /// The room's code.
    pub code: RoomCode,
    /// Current lifecycle phase.
    pub phase: RoomPhase,
    /// Roster in creation order (creator first).
    pub players: Vec<PlayerId>,
    /// How many display names have been recorded.
    pub names_set: usize,
}

/// Handle to a running room actor. Cheap to clone — it's an
/// `mpsc::Sender` plus the room code.
///
/// Every method maps a closed mailbox to [`RoomError::Unavailable`]: a
/// room that reached a terminal phase simply stops answering.
#[derive(Clone)]
pub struct RoomHandle {
    code: RoomCode,
    sender: mpsc::Sender<RoomCommand>,
}

impl RoomHandle {
    /// Returns the room's code.
    pub fn code(&self) -> &RoomCode {
        &self.code
    }

    /// Adds a second participant to the room.
    pub async fn join(
        &self,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Join {
            player_id,
            sender,
            reply,
        })
        .await?
    }

    /// Records a participant's display name.
    pub async fn set_name(
        &self,
        player_id: PlayerId,
        name: String,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::SetName {
            player_id,
            name,
            reply,
        })
        .await?
    }

    /// Drops a piece for `player_id` into `column`.
    pub async fn make_move(
        &self,
        player_id: PlayerId,
        column: usize,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Move {
            player_id,
            column,
            reply,
        })
        .await?
    }

    /// Removes a participant, abandoning the room.
    pub async fn leave(
        &self,
        player_id: PlayerId,
        reason: LeaveReason,
    ) -> Result<(), RoomError> {
        self.request(|reply| RoomCommand::Leave {
            player_id,
            reason,
            reply,
        })
        .await?
    }

    /// Requests a metadata snapshot.
    pub async fn describe(&self) -> Result<RoomSnapshot, RoomError> {
        self.request(|reply| RoomCommand::Describe { reply }).await
    }

    /// Sends a command and waits for the actor's reply.
    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(make(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))?;
        reply_rx
            .await
            .map_err(|_| RoomError::Unavailable(self.code.clone()))
    }
}

/// A cancellable deadline. The generation guards against a task that
/// fires after it was superseded but before the abort landed.
struct TimerSlot {
    generation: u64,
    handle: Option<JoinHandle<()>>,
}

impl TimerSlot {
    fn idle() -> Self {
        Self {
            generation: 0,
            handle: None,
        }
    }

    fn cancel(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// The internal room actor state. Runs inside a Tokio task.
struct RoomActor {
    code: RoomCode,
    phase: RoomPhase,
    board: Board,
    /// Roster in creation order; at most two entries.
    players: Vec<PlayerId>,
    names: HashMap<PlayerId, String>,
    senders: HashMap<PlayerId, EventSender>,
    timings: RoomTimings,
    expiry: TimerSlot,
    naming: TimerSlot,
    next_generation: u64,
    /// Clone of the mailbox sender, handed to timer tasks.
    self_tx: mpsc::Sender<RoomCommand>,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Tells the registry's janitor to drop this room once we stop.
    closed_tx: mpsc::UnboundedSender<RoomCode>,
}

impl RoomActor {
    /// Runs the actor loop until a terminal phase is reached or every
    /// handle is dropped.
    async fn run(mut self) {
        tracing::info!(room = %self.code, "room opened");
        self.arm_timer(TimerKind::Expiry, self.timings.expiry);

        while let Some(cmd) = self.receiver.recv().await {
            match cmd {
                RoomCommand::Join {
                    player_id,
                    sender,
                    reply,
                } => {
                    let _ = reply.send(self.handle_join(player_id, sender));
                }
                RoomCommand::SetName {
                    player_id,
                    name,
                    reply,
                } => {
                    let _ = reply.send(self.handle_set_name(player_id, name));
                }
                RoomCommand::Move {
                    player_id,
                    column,
                    reply,
                } => {
                    let _ = reply.send(self.handle_move(player_id, column));
                }
                RoomCommand::Leave {
                    player_id,
                    reason,
                    reply,
                } => {
                    let _ = reply.send(self.handle_leave(player_id, reason));
                }
                RoomCommand::Describe { reply } => {
                    let _ = reply.send(self.snapshot());
                }
                RoomCommand::TimerFired { kind, generation } => {
                    self.handle_timer(kind, generation);
                }
            }

            if self.phase.is_terminal() {
                break;
            }
        }

        self.cancel_all_timers();
        tracing::info!(room = %self.code, phase = %self.phase, "room closed");
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<(), RoomError> {
        if !self.phase.is_joinable() || self.players.len() >= 2 {
            return Err(RoomError::RoomFull(self.code.clone()));
        }

        self.cancel_timer(TimerKind::Expiry);
        self.players.push(player_id);
        self.senders.insert(player_id, sender);
        self.phase = RoomPhase::WaitingForNames;

        tracing::info!(room = %self.code, player = %player_id, "player joined");
        self.broadcast(ServerEvent::PlayerJoined);
        Ok(())
    }

    fn handle_set_name(
        &mut self,
        player_id: PlayerId,
        name: String,
    ) -> Result<(), RoomError> {
        if !self.players.contains(&player_id) {
            return Err(RoomError::NotInRoom(player_id, self.code.clone()));
        }

        tracing::info!(room = %self.code, player = %player_id, name, "name set");
        self.names.insert(player_id, name);

        // Duplicate name strings are allowed — the roster keys by id.
        let both_named = self.players.len() == 2
            && self.players.iter().all(|p| self.names.contains_key(p));

        if self.phase == RoomPhase::WaitingForNames && both_named {
            self.cancel_timer(TimerKind::Naming);
            self.phase = RoomPhase::InProgress;

            let player1 = self.players[0];
            let player2 = self.players[1];
            let names = [self.names[&player1].clone(), self.names[&player2].clone()];
            tracing::info!(room = %self.code, ?names, "game started");
            self.broadcast(ServerEvent::GameStart {
                player1,
                player2,
                names,
            });
        } else if !self.phase.accepts_moves() {
            // One name in: (re)start the countdown for the other.
            self.arm_timer(TimerKind::Naming, self.timings.naming);
        }

        Ok(())
    }

    fn handle_move(
        &mut self,
        player_id: PlayerId,
        column: usize,
    ) -> Result<(), RoomError> {
        if !self.phase.accepts_moves() {
            return Err(RoomError::NotInProgress(self.phase));
        }
        if !self.players.contains(&player_id) {
            return Err(RoomError::NotInRoom(player_id, self.code.clone()));
        }

        // No turn-alternation check: either participant's request is
        // accepted, preserving the original client-gated turn contract.
        let row = self.board.drop_piece(column, player_id)?;
        let player_name = self
            .names
            .get(&player_id)
            .cloned()
            .unwrap_or_default();

        tracing::debug!(
            room = %self.code,
            player = %player_id,
            row,
            column,
            "move made"
        );
        self.broadcast(ServerEvent::MoveMade {
            row,
            column,
            player_id,
            player_name,
        });

        if self.board.wins_at(row, column, player_id) {
            tracing::info!(room = %self.code, winner = %player_id, "game won");
            self.broadcast(ServerEvent::GameWon { winner: player_id });
            self.finish(RoomPhase::Finished);
        }

        Ok(())
    }

    fn handle_leave(
        &mut self,
        player_id: PlayerId,
        reason: LeaveReason,
    ) -> Result<(), RoomError> {
        if !self.players.contains(&player_id) {
            return Err(RoomError::NotInRoom(player_id, self.code.clone()));
        }

        tracing::info!(
            room = %self.code,
            player = %player_id,
            ?reason,
            "player left, abandoning room"
        );
        self.broadcast(ServerEvent::PlayerLeft {
            message: reason.message().to_string(),
            departed_id: player_id,
        });
        self.finish(RoomPhase::Abandoned);
        Ok(())
    }

    fn handle_timer(&mut self, kind: TimerKind, generation: u64) {
        let slot = match kind {
            TimerKind::Expiry => &self.expiry,
            TimerKind::Naming => &self.naming,
        };
        if slot.handle.is_none() || slot.generation != generation {
            tracing::trace!(room = %self.code, ?kind, "stale timer, ignoring");
            return;
        }

        match kind {
            TimerKind::Expiry => {
                if self.phase != RoomPhase::WaitingForOpponent {
                    return;
                }
                tracing::info!(room = %self.code, "room expired waiting for opponent");
                self.broadcast(ServerEvent::RoomExpired);
                self.finish(RoomPhase::Expired);
            }
            TimerKind::Naming => {
                // A name can be set while still waiting for the opponent,
                // so the countdown may span both pre-game phases.
                if !matches!(
                    self.phase,
                    RoomPhase::WaitingForOpponent | RoomPhase::WaitingForNames
                ) {
                    return;
                }
                tracing::info!(room = %self.code, "naming phase timed out");
                self.broadcast(ServerEvent::WaitingTimeout);
                self.finish(RoomPhase::Expired);
            }
        }
    }

    /// Enters a terminal phase: timers cancelled, janitor notified.
    /// The run loop exits after the current command.
    fn finish(&mut self, phase: RoomPhase) {
        debug_assert!(phase.is_terminal());
        self.phase = phase;
        self.cancel_all_timers();
        let _ = self.closed_tx.send(self.code.clone());
    }

    /// Arms (or refreshes) a timer. The previous task for this slot is
    /// aborted and its generation retired.
    fn arm_timer(&mut self, kind: TimerKind, after: Duration) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.self_tx.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(RoomCommand::TimerFired { kind, generation }).await;
        });

        let slot = match kind {
            TimerKind::Expiry => &mut self.expiry,
            TimerKind::Naming => &mut self.naming,
        };
        slot.cancel();
        slot.generation = generation;
        slot.handle = Some(handle);
    }

    fn cancel_timer(&mut self, kind: TimerKind) {
        match kind {
            TimerKind::Expiry => self.expiry.cancel(),
            TimerKind::Naming => self.naming.cancel(),
        }
    }

    fn cancel_all_timers(&mut self) {
        self.expiry.cancel();
        self.naming.cancel();
    }

    /// Sends an event to every participant in the room. Receivers that
    /// are gone (connection dropped mid-teardown) are skipped silently.
    fn broadcast(&self, event: ServerEvent) {
        for sender in self.senders.values() {
            let _ = sender.send(event.clone());
        }
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            code: self.code.clone(),
            phase: self.phase,
            players: self.players.clone(),
            names_set: self.names.len(),
        }
    }
}

/// Spawns a room actor with the creator already seated, and returns a
/// handle to it. The expiry timer starts immediately.
pub(crate) fn spawn_room(
    code: RoomCode,
    creator: PlayerId,
    creator_sender: EventSender,
    timings: RoomTimings,
    closed_tx: mpsc::UnboundedSender<RoomCode>,
) -> RoomHandle {
    let (tx, rx) = mpsc::channel(MAILBOX_SIZE);

    let actor = RoomActor {
        code: code.clone(),
        phase: RoomPhase::WaitingForOpponent,
        board: Board::new(),
        players: vec![creator],
        names: HashMap::new(),
        senders: HashMap::from([(creator, creator_sender)]),
        timings,
        expiry: TimerSlot::idle(),
        naming: TimerSlot::idle(),
        next_generation: 0,
        self_tx: tx.clone(),
        receiver: rx,
        closed_tx,
    };

    tokio::spawn(actor.run());

    RoomHandle { code, sender: tx }
}
