// WebSocket transport: the lobby endpoint and per-player live channels.

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, error, info, warn};

use diagon_core::directory::SessionDirectory;
use diagon_core::game::MalformedMove;
use diagon_core::protocol::{self, Command, LobbyRequest, LobbyResponse, MoveSubmission};
use diagon_core::session::{GameSession, Outbound, PlayerConnection};

/// Where a socket was opened, taken from the request path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// `/lobby`
    Lobby,
    /// `/game/<session>/player/<player>`
    Live { session: String, player: String },
}

pub fn parse_route(path: &str) -> Option<Route> {
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    match segments.as_slice() {
        ["lobby"] => Some(Route::Lobby),
        ["game", session, "player", player] if !session.is_empty() && !player.is_empty() => {
            Some(Route::Live {
                session: session.to_string(),
                player: player.to_string(),
            })
        }
        _ => None,
    }
}

/// Accept connections on `listener` forever, serving each on its own task.
pub async fn run(
    listener: TcpListener,
    directory: Arc<SessionDirectory>,
    outbound_buffer: usize,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("Accepted TCP connection from {addr}");
        let directory = Arc::clone(&directory);
        tokio::spawn(async move {
            handle_connection(stream, addr, directory, outbound_buffer).await;
        });
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    directory: Arc<SessionDirectory>,
    outbound_buffer: usize,
) {
    let mut path = String::new();
    let callback = |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
        path = req.uri().path().to_string();
        Ok(resp)
    };
    let ws = match tokio_tungstenite::accept_hdr_async(stream, callback).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake failed for {addr}: {e}");
            return;
        }
    };

    let addr = addr.to_string();
    match parse_route(&path) {
        Some(Route::Lobby) => serve_lobby(ws, &directory, &addr, outbound_buffer).await,
        Some(Route::Live { session, player }) => {
            serve_live(ws, &directory, &session, &player, &addr, outbound_buffer).await
        }
        None => {
            warn!("Unknown path {path:?} from {addr}");
            reject(ws, "unknown endpoint").await;
        }
    }
}

/// Close a socket with a policy-violation frame.
async fn reject<S>(mut ws: WebSocketStream<S>, reason: &str)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let frame = CloseFrame {
        code: CloseCode::Policy,
        reason: reason.to_string().into(),
    };
    if let Err(e) = ws.close(Some(frame)).await {
        debug!("Close after rejection failed: {e}");
    }
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

/// Drain `rx` into `sink` until the queue closes, the sink fails, or a
/// close is requested.
pub async fn write_outbound<Si>(mut sink: Si, mut rx: mpsc::Receiver<Outbound>)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(msg) = rx.recv().await {
        match msg {
            Outbound::Text(text) => {
                if let Err(e) = sink.send(Message::Text(text.into())).await {
                    debug!("Outbound send failed: {e}");
                    return;
                }
            }
            Outbound::Close { reason } => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: reason.into(),
                };
                let _ = sink.send(Message::Close(Some(frame))).await;
                return;
            }
        }
    }
    let _ = sink.close().await;
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

async fn serve_lobby<S>(
    ws: WebSocketStream<S>,
    directory: &SessionDirectory,
    addr: &str,
    outbound_buffer: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    info!("Lobby client {addr} connected");
    let (write, read) = ws.split();
    let (tx, rx) = mpsc::channel(outbound_buffer);
    let writer = tokio::spawn(write_outbound(write, rx));

    let _ = process_lobby_stream(read, directory, &tx, addr).await;

    drop(tx);
    let _ = writer.await;
    info!("Lobby client {addr} disconnected");
}

/// Answer each lobby request in `stream` through `tx`. Returns `Err(())` if
/// the writer has gone away.
pub async fn process_lobby_stream<St>(
    mut stream: St,
    directory: &SessionDirectory,
    tx: &mpsc::Sender<Outbound>,
    addr: &str,
) -> Result<(), ()>
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                let response = handle_lobby_request(directory, text.as_str()).await;
                let json = match serde_json::to_string(&response) {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize lobby response: {e}");
                        continue;
                    }
                };
                if tx.send(Outbound::Text(json)).await.is_err() {
                    return Err(());
                }
            }
            Ok(Message::Close(_)) => {
                info!("Lobby client {addr} sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {addr}: {e}");
                break;
            }
            _ => {}
        }
    }
    Ok(())
}

pub async fn handle_lobby_request(directory: &SessionDirectory, text: &str) -> LobbyResponse {
    match protocol::parse_lobby_request(text) {
        Ok(LobbyRequest::CreateGame { name }) => {
            let result = directory.create_session(&name).await;
            if let Err(e) = &result {
                debug!("Create of {name:?} rejected: {e}");
            }
            LobbyResponse::CreateGame {
                status: (&result).into(),
            }
        }
        Ok(LobbyRequest::JoinGame { game, player }) => LobbyResponse::JoinGame {
            status: directory.join_session(&game, &player).await,
        },
        Err(e) => {
            debug!("Bad lobby request {text:?}: {e}");
            LobbyResponse::Error {
                message: e.to_string(),
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Live channel
// ---------------------------------------------------------------------------

async fn serve_live<S>(
    ws: WebSocketStream<S>,
    directory: &SessionDirectory,
    session_name: &str,
    player: &str,
    addr: &str,
    outbound_buffer: usize,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let Some(session) = directory.get(session_name).await else {
        warn!("{addr} asked for unknown game {session_name:?}");
        reject(ws, "unknown game").await;
        return;
    };

    let (tx, rx) = mpsc::channel(outbound_buffer);
    let conn = PlayerConnection::new(tx);
    let id = conn.id();
    if !session.register_connection(player, conn).await {
        reject(ws, "player has not joined this game").await;
        return;
    }

    let (write, read) = ws.split();
    let writer = tokio::spawn(write_outbound(write, rx));

    process_live_stream(read, &session, player, id, addr).await;

    session.unregister_connection(player, id).await;
    let _ = writer.await;
}

/// Feed each command in `stream` to `session` on behalf of `player`. Stops
/// once connection `id` is no longer the player's registered channel.
pub async fn process_live_stream<St>(
    mut stream: St,
    session: &GameSession,
    player: &str,
    id: u64,
    addr: &str,
) where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result {
            Ok(Message::Text(text)) => {
                if !session.is_registered(player, id).await {
                    info!("{player} ({addr}) was replaced, ignoring further frames");
                    break;
                }
                handle_live_text(session, player, text.as_str()).await;
            }
            Ok(Message::Close(_)) => {
                info!("{player} ({addr}) sent close frame");
                break;
            }
            Err(e) => {
                warn!("WebSocket error from {player} ({addr}): {e}");
                break;
            }
            _ => {}
        }
    }
}

async fn handle_live_text(session: &GameSession, player: &str, text: &str) {
    match protocol::parse_command(text, player) {
        Some(Command::StartGame) => {
            if !session.start().await {
                debug!("Start from {player} in {} ignored", session.name());
            }
        }
        Some(Command::PlayerMove(Ok(MoveSubmission::Decoded(mv)))) => {
            session.submit(&mv).await;
        }
        Some(Command::PlayerMove(Ok(MoveSubmission::Malformed {
            player: mover,
            kind,
            reason,
        }))) => {
            debug!("Malformed move from {mover} in {}: {reason}", session.name());
            session.submit_malformed(&mover, kind).await;
        }
        Some(Command::PlayerMove(Err(e))) => {
            debug!("Unreadable move from {player} in {}: {e}", session.name());
            session.submit_malformed(player, MalformedMove::Unreadable).await;
        }
        None => debug!("Ignoring frame from {player}: {text:?}"),
    }
}
