//! `FourlineServer` builder and server loop.
//!
//! This is the entry point for running a Fourline server. It ties
//! together the layers: WebSocket transport → protocol → gateway → rooms.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::Duration;

use fourline_protocol::{ActiveRoom, JsonCodec};
use fourline_room::{RoomRegistry, RoomTimings};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};

use crate::handler::handle_connection;
use crate::FourlineError;

/// Capacity of the lobby broadcast channel. Slow subscribers that lag
/// behind skip straight to the most recent list.
const LOBBY_CAPACITY: usize = 32;

/// How often the lobby is republished between membership changes, so
/// clients can keep their expiry countdowns honest.
const LOBBY_REFRESH: Duration = Duration::from_secs(5);

/// Shared server state passed to each connection handler task.
///
/// Wrapped in `Arc` so it can be cheaply cloned across tasks.
/// Interior mutability via `Mutex` where needed.
pub(crate) struct ServerState {
    pub(crate) registry: Mutex<RoomRegistry>,
    /// Lobby feed; every connection subscribes for active-room pushes.
    pub(crate) lobby: broadcast::Sender<Vec<ActiveRoom>>,
    pub(crate) codec: JsonCodec,
    /// Source of per-connection player ids.
    pub(crate) next_player_id: AtomicU64,
}

/// Builder for configuring and starting a Fourline server.
///
/// # Example
///
/// ```rust,ignore
/// let server = FourlineServer::builder()
///     .bind("0.0.0.0:3000")
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct FourlineServerBuilder {
    bind_addr: String,
    timings: RoomTimings,
}

impl FourlineServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".to_string(),
            timings: RoomTimings::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room timer durations.
    pub fn timings(mut self, timings: RoomTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<FourlineServer, FourlineError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;

        let (closed_tx, closed_rx) = mpsc::unbounded_channel();
        let (lobby_tx, _) = broadcast::channel(LOBBY_CAPACITY);

        let state = Arc::new(ServerState {
            registry: Mutex::new(RoomRegistry::new(
                self.timings,
                closed_tx,
                lobby_tx.clone(),
            )),
            lobby: lobby_tx,
            codec: JsonCodec,
            next_player_id: AtomicU64::new(1),
        });

        Ok(FourlineServer {
            listener,
            state,
            closed_rx,
        })
    }
}

impl Default for FourlineServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Fourline server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct FourlineServer {
    listener: TcpListener,
    state: Arc<ServerState>,
    /// Terminal rooms post their code here; the janitor removes them.
    closed_rx: mpsc::UnboundedReceiver<fourline_protocol::RoomCode>,
}

impl FourlineServer {
    /// Creates a new builder.
    pub fn builder() -> FourlineServerBuilder {
        FourlineServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task for each
    /// one, alongside a janitor task that reclaims finished rooms. Runs
    /// until the process is terminated.
    pub async fn run(self) -> Result<(), FourlineError> {
        let Self {
            listener,
            state,
            mut closed_rx,
        } = self;

        tracing::info!("Fourline server running");

        // Janitor: rooms that reach a terminal phase report their code
        // and are dropped from the registry here.
        let janitor_state = Arc::clone(&state);
        tokio::spawn(async move {
            while let Some(code) = closed_rx.recv().await {
                janitor_state.registry.lock().await.remove_room(&code);
            }
        });

        // Countdown refresh: republish the lobby between membership
        // changes.
        let refresh_state = Arc::clone(&state);
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(LOBBY_REFRESH);
            loop {
                tick.tick().await;
                refresh_state.registry.lock().await.publish_lobby();
            }
        });

        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    tracing::debug!(%peer, "accepted connection");
                    let state = Arc::clone(&state);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, state).await {
                            tracing::debug!(
                                error = %e,
                                "connection ended with error"
                            );
                        }
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
