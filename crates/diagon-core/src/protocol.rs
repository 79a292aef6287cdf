// Wire protocol: inbound live-channel commands, move decoding, and the lobby
// request/response messages.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::directory::DirectoryError;
use crate::game::{AddPlayerStatus, MalformedMove, Move, MoveAction, MovePhase, MoveType};

/// Inbound text that starts the game.
pub const START_GAME: &str = "startGame";

/// Prefix of an inbound move: `playerMove:<json>`.
pub const PLAYER_MOVE: &str = "playerMove";

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("move does not name a player")]
    MissingPlayer,
}

/// A command received on a player's live channel.
#[derive(Debug)]
pub enum Command {
    StartGame,
    PlayerMove(Result<MoveSubmission, ProtocolError>),
}

/// A move as far as it could be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveSubmission {
    Decoded(Move),
    /// The move names a player but its type or payload is unusable.
    Malformed {
        player: String,
        kind: MalformedMove,
        reason: String,
    },
}

/// Parse one text frame from `player`'s live channel. Returns `None` for
/// frames that are not commands.
pub fn parse_command(text: &str, player: &str) -> Option<Command> {
    let text = text.trim();
    if text.starts_with(START_GAME) {
        return Some(Command::StartGame);
    }
    let rest = text.strip_prefix(PLAYER_MOVE)?;
    let json = rest.strip_prefix(':').unwrap_or(rest);
    Some(Command::PlayerMove(decode_move(json, player)))
}

/// Loose view of a move used to salvage what we can from bad input.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MoveEnvelope {
    #[serde(default)]
    player: Value,
    #[serde(default)]
    move_type: Value,
    #[serde(default)]
    move_data: Value,
    #[serde(default)]
    move_phase: Value,
    #[serde(default)]
    end_turn: Value,
}

/// Decode a move submitted as JSON.
///
/// `player` may be a name or an object with a `name` field; when absent the
/// channel's `default_player` is used. Input that is not a JSON object or
/// names no player is an error, which the live channel records as an
/// unreadable move for its own player. Anything else that fails to decode
/// becomes [`MoveSubmission::Malformed`] so it can be rejected like any other
/// move.
pub fn decode_move(json: &str, default_player: &str) -> Result<MoveSubmission, ProtocolError> {
    let envelope: MoveEnvelope = serde_json::from_str(json)?;

    let player = match &envelope.player {
        Value::String(name) => name.clone(),
        Value::Object(fields) => fields
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => default_player.to_string(),
    };
    if player.is_empty() {
        return Err(ProtocolError::MissingPlayer);
    }

    let malformed = |kind: MalformedMove, reason: String| MoveSubmission::Malformed {
        player: player.clone(),
        kind,
        reason,
    };

    let move_type: MoveType = match serde_json::from_value(envelope.move_type) {
        Ok(t) => t,
        Err(e) => return Ok(malformed(MalformedMove::UnknownType, format!("moveType: {e}"))),
    };

    let move_phase = match envelope.move_phase {
        Value::Null => MovePhase::default(),
        value => match serde_json::from_value(value) {
            Ok(phase) => phase,
            Err(e) => {
                return Ok(malformed(
                    MalformedMove::BadPayload(move_type),
                    format!("movePhase: {e}"),
                ))
            }
        },
    };

    let end_turn = match envelope.end_turn {
        Value::Null => false,
        Value::Bool(b) => b,
        other => {
            return Ok(malformed(
                MalformedMove::BadPayload(move_type),
                format!("endTurn: expected a boolean, got {other}"),
            ))
        }
    };

    let action = match MoveAction::decode(move_type, envelope.move_data) {
        Ok(action) => action,
        Err(e) => {
            return Ok(malformed(
                MalformedMove::BadPayload(move_type),
                format!("moveData: {e}"),
            ))
        }
    };

    Ok(MoveSubmission::Decoded(Move {
        player,
        action,
        move_phase,
        end_turn,
    }))
}

/// Greeting sent on a freshly registered live channel.
pub fn greeting(player: &str, session: &str) -> String {
    format!("Hello {player}! You joined the game {session}")
}

// ---------------------------------------------------------------------------
// Lobby
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LobbyRequest {
    CreateGame { name: String },
    JoinGame { game: String, player: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateSessionStatus {
    Ok,
    NameExists,
    InvalidName,
}

impl<T> From<&Result<T, DirectoryError>> for CreateSessionStatus {
    fn from(result: &Result<T, DirectoryError>) -> Self {
        match result {
            Ok(_) => CreateSessionStatus::Ok,
            Err(DirectoryError::NameExists(_)) => CreateSessionStatus::NameExists,
            Err(DirectoryError::InvalidName) => CreateSessionStatus::InvalidName,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum LobbyResponse {
    CreateGame { status: CreateSessionStatus },
    JoinGame { status: AddPlayerStatus },
    Error { message: String },
}

pub fn parse_lobby_request(text: &str) -> Result<LobbyRequest, ProtocolError> {
    Ok(serde_json::from_str(text)?)
}
