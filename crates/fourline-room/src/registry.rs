//! Room registry: owns every live room and the public lobby feed.
//!
//! The registry is plain data behind the gateway's mutex — the rooms
//! themselves are actors, so the registry only tracks handles plus the
//! little metadata the lobby needs (creation time, seat count).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use fourline_protocol::{ActiveRoom, PlayerId, RoomCode};
use rand::Rng;
use tokio::sync::{broadcast, mpsc};

use crate::room::spawn_room;
use crate::{EventSender, LeaveReason, RoomError, RoomHandle, RoomTimings};

/// Room code alphabet: lowercase base36, like the original
/// `Math.random().toString(36)` codes.
const CODE_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
/// Room code length.
const CODE_LEN: usize = 6;

/// Everything the registry needs to know about a room without asking
/// the actor.
struct RoomEntry {
    handle: RoomHandle,
    /// Unix millis at creation, shown in the lobby countdown.
    created_at: u64,
    /// Seats taken. Only the registry seats players, so this never
    /// drifts from the actor's roster while the room is alive.
    player_count: usize,
}

/// The concurrent-safe collection of all rooms.
///
/// Owns the code → room mapping and the participant → room index
/// (one room per participant at a time). Publishes the active-room
/// list on its broadcast channel after every membership change.
pub struct RoomRegistry {
    rooms: HashMap<RoomCode, RoomEntry>,
    players: HashMap<PlayerId, RoomCode>,
    timings: RoomTimings,
    /// Handed to each room actor; terminal rooms post their code here
    /// and the server's janitor calls [`remove_room`](Self::remove_room).
    closed_tx: mpsc::UnboundedSender<RoomCode>,
    /// Lobby feed. Every connection handler subscribes to this.
    lobby: broadcast::Sender<Vec<ActiveRoom>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new(
        timings: RoomTimings,
        closed_tx: mpsc::UnboundedSender<RoomCode>,
        lobby: broadcast::Sender<Vec<ActiveRoom>>,
    ) -> Self {
        Self {
            rooms: HashMap::new(),
            players: HashMap::new(),
            timings,
            closed_tx,
            lobby,
        }
    }

    /// Creates a room with `creator` seated and returns its code.
    ///
    /// Codes are random; on the off chance of a collision with a live
    /// room we just roll again.
    pub fn create_room(
        &mut self,
        creator: PlayerId,
        sender: EventSender,
    ) -> Result<RoomCode, RoomError> {
        if let Some(current) = self.players.get(&creator) {
            return Err(RoomError::AlreadyInRoom(creator, current.clone()));
        }

        let mut code = generate_code();
        while self.rooms.contains_key(&code) {
            code = generate_code();
        }

        let handle = spawn_room(
            code.clone(),
            creator,
            sender,
            self.timings,
            self.closed_tx.clone(),
        );
        self.rooms.insert(
            code.clone(),
            RoomEntry {
                handle,
                created_at: unix_millis(),
                player_count: 1,
            },
        );
        self.players.insert(creator, code.clone());

        tracing::info!(room = %code, creator = %creator, "room created");
        self.publish_lobby();
        Ok(code)
    }

    /// Seats `player_id` in the room with `code`.
    pub async fn join_room(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
        sender: EventSender,
    ) -> Result<(), RoomError> {
        if let Some(current) = self.players.get(&player_id) {
            return Err(RoomError::AlreadyInRoom(player_id, current.clone()));
        }

        let entry = self
            .rooms
            .get_mut(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        if entry.player_count >= 2 {
            return Err(RoomError::RoomFull(code.clone()));
        }

        entry.handle.join(player_id, sender).await?;
        entry.player_count += 1;
        self.players.insert(player_id, code.clone());

        tracing::info!(room = %code, player = %player_id, "player joined room");
        self.publish_lobby();
        Ok(())
    }

    /// Records a display name in the room with `code`.
    pub async fn set_name(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        name: String,
    ) -> Result<(), RoomError> {
        self.handle(code)?.set_name(player_id, name).await
    }

    /// Routes a move to the room with `code`.
    pub async fn make_move(
        &self,
        code: &RoomCode,
        player_id: PlayerId,
        column: usize,
    ) -> Result<(), RoomError> {
        self.handle(code)?.make_move(player_id, column).await
    }

    /// Removes `player_id` from the room with `code`, tearing the room
    /// down immediately (the remaining occupant is notified by the
    /// actor before it stops).
    pub async fn leave_room(
        &mut self,
        code: &RoomCode,
        player_id: PlayerId,
        reason: LeaveReason,
    ) -> Result<(), RoomError> {
        let entry = self
            .rooms
            .get(code)
            .ok_or_else(|| RoomError::NotFound(code.clone()))?;
        entry.handle.leave(player_id, reason).await?;
        self.remove_room(code);
        Ok(())
    }

    /// Drops a room and unseats its participants. Idempotent: stale
    /// janitor notices for already-removed rooms are no-ops.
    pub fn remove_room(&mut self, code: &RoomCode) {
        if self.rooms.remove(code).is_some() {
            self.players.retain(|_, c| c != code);
            tracing::info!(room = %code, "room removed");
            self.publish_lobby();
        }
    }

    /// Returns the room a participant is currently in, if any. Used on
    /// disconnect to locate the room to tear down.
    pub fn find_by_participant(&self, player_id: PlayerId) -> Option<RoomCode> {
        self.players.get(&player_id).cloned()
    }

    /// Rooms still waiting for an opponent, for the public lobby.
    pub fn list_active(&self) -> Vec<ActiveRoom> {
        self.rooms
            .iter()
            .filter(|(_, entry)| entry.player_count < 2)
            .map(|(code, entry)| ActiveRoom {
                room: code.clone(),
                created_at: entry.created_at,
                player_count: entry.player_count,
            })
            .collect()
    }

    /// Recomputes and broadcasts the active-room list. Safe to call
    /// with no subscribers.
    pub fn publish_lobby(&self) {
        let rooms = self.list_active();
        tracing::debug!(available = rooms.len(), "lobby updated");
        let _ = self.lobby.send(rooms);
    }

    /// Returns the number of live rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Returns a cloned handle to a room, for tests and diagnostics.
    pub fn room(&self, code: &RoomCode) -> Option<RoomHandle> {
        self.rooms.get(code).map(|entry| entry.handle.clone())
    }

    fn handle(&self, code: &RoomCode) -> Result<&RoomHandle, RoomError> {
        self.rooms
            .get(code)
            .map(|entry| &entry.handle)
            .ok_or_else(|| RoomError::NotFound(code.clone()))
    }
}

/// Generates a random six-character lowercase alphanumeric code.
fn generate_code() -> RoomCode {
    let mut rng = rand::rng();
    let code: String = (0..CODE_LEN)
        .map(|_| CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())] as char)
        .collect();
    RoomCode::new(code)
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
