// Per-session coordinator: owns one game, serializes every mutation through
// its lock, and fans snapshots out to the players' live connections.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::GameRules;
use crate::game::{engine, rules, AddPlayerStatus, Game, MalformedMove, Move, MoveErrorStatus};
use crate::protocol::greeting;

/// A message queued for a connection's writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    /// Close the socket; sent to a connection that has been replaced.
    Close { reason: String },
}

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Sending half of a player's live channel.
#[derive(Debug)]
pub struct PlayerConnection {
    id: u64,
    tx: mpsc::Sender<Outbound>,
}

impl PlayerConnection {
    pub fn new(tx: mpsc::Sender<Outbound>) -> Self {
        PlayerConnection {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            tx,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

pub struct GameSession {
    name: String,
    rules: GameRules,
    game: Mutex<Game>,
    connections: Mutex<HashMap<String, PlayerConnection>>,
}

impl GameSession {
    pub fn new(name: impl Into<String>, rules: GameRules) -> Self {
        let name = name.into();
        GameSession {
            game: Mutex::new(Game::new(name.clone())),
            name,
            rules,
            connections: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// A copy of the current game state.
    pub async fn snapshot(&self) -> Game {
        self.game.lock().await.clone()
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.len()
    }

    /// Add `player` to the game, broadcasting the new state on success.
    pub async fn join(&self, player: &str) -> AddPlayerStatus {
        let mut game = self.game.lock().await;
        let status = engine::add_player(&mut game, player, &self.rules);
        if status == AddPlayerStatus::Ok {
            self.broadcast(&game).await;
        } else {
            debug!("Join of {:?} to {} rejected: {:?}", player, self.name, status);
        }
        status
    }

    /// Attach a live channel for a joined player. Any previous channel for
    /// that player is told to close and replaced. The new channel receives
    /// the greeting and the current snapshot.
    ///
    /// Returns false when `player` has not joined this session.
    pub async fn register_connection(&self, player: &str, conn: PlayerConnection) -> bool {
        let game = self.game.lock().await;
        if !game.has_player(player) {
            warn!("Refusing connection for unknown player {:?} in {}", player, self.name);
            return false;
        }
        let snapshot = serialize(&game);

        let mut connections = self.connections.lock().await;
        send(&conn, player, Outbound::Text(greeting(player, &self.name)));
        if let Some(json) = snapshot {
            send(&conn, player, Outbound::Text(json));
        }

        if let Some(previous) = connections.insert(player.to_string(), conn) {
            info!("Replacing connection {} for {} in {}", previous.id, player, self.name);
            let _ = previous.tx.try_send(Outbound::Close {
                reason: "replaced by a new connection".into(),
            });
        } else {
            info!("{} connected to {}", player, self.name);
        }
        true
    }

    /// Drop `player`'s channel if it is still the one identified by `id`.
    pub async fn unregister_connection(&self, player: &str, id: u64) {
        let mut connections = self.connections.lock().await;
        if connections.get(player).is_some_and(|c| c.id == id) {
            connections.remove(player);
            info!("{} disconnected from {}", player, self.name);
        }
    }

    /// Whether `player`'s live channel is still the one identified by `id`.
    pub async fn is_registered(&self, player: &str, id: u64) -> bool {
        self.connections
            .lock()
            .await
            .get(player)
            .is_some_and(|c| c.id == id)
    }

    /// Start the game with a freshly seeded generator.
    pub async fn start(&self) -> bool {
        let mut rng = StdRng::from_entropy();
        self.start_with_rng(&mut rng).await
    }

    /// Start the game, broadcasting when the transition happened.
    pub async fn start_with_rng<R: Rng + ?Sized>(&self, rng: &mut R) -> bool {
        let mut game = self.game.lock().await;
        let started = engine::start_game(&mut game, &self.rules, rng);
        if started {
            self.broadcast(&game).await;
        }
        started
    }

    /// Validate and apply `mv`, then broadcast the resulting state whether or
    /// not the move was accepted.
    pub async fn submit(&self, mv: &Move) -> MoveErrorStatus {
        let mut game = self.game.lock().await;
        let error = rules::dispatch(&mut game, mv, &self.rules);
        self.broadcast(&game).await;
        error
    }

    /// Record an undecodable move from `player` and broadcast it.
    pub async fn submit_malformed(&self, player: &str, kind: MalformedMove) -> MoveErrorStatus {
        let mut game = self.game.lock().await;
        let error = rules::record_malformed(&mut game, player, kind);
        self.broadcast(&game).await;
        error
    }

    /// Queue `game` on every connection. Called with the game lock held so
    /// snapshots leave in apply order.
    async fn broadcast(&self, game: &Game) {
        let Some(json) = serialize(game) else {
            return;
        };
        let mut connections = self.connections.lock().await;
        connections.retain(|player, conn| {
            match conn.tx.try_send(Outbound::Text(json.clone())) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    warn!("Outbound queue full for {} in {}, dropping snapshot", player, self.name);
                    true
                }
                Err(TrySendError::Closed(_)) => {
                    debug!("Connection for {} in {} closed, removing", player, self.name);
                    false
                }
            }
        });
    }
}

fn serialize(game: &Game) -> Option<String> {
    match serde_json::to_string(game) {
        Ok(json) => Some(json),
        Err(e) => {
            error!("Failed to serialize game {}: {}", game.name, e);
            None
        }
    }
}

fn send(conn: &PlayerConnection, player: &str, msg: Outbound) {
    if let Err(e) = conn.tx.try_send(msg) {
        warn!("Failed to queue message for {}: {}", player, e);
    }
}
