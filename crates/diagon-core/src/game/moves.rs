// Move representation: the tagged action union, phases and error statuses,
// and the record kept as `Game::last_move`.

use serde::{Deserialize, Serialize};

use crate::catalog::CompanyType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveType {
    DrawFromDeck,
    DrawMarketItem,
    PlaceMoneyOnMarketInvestments,
    DiscardInvestment,
    PlaceInvestmentInPortfolio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MovePhase {
    #[default]
    Draw,
    Invest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveStatus {
    #[default]
    Pending,
    Valid,
    Invalid,
}

/// Outcome of validating a move. `None` means the move is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MoveErrorStatus {
    #[default]
    None,
    InvalidGame,
    InvalidMoveType,
    WrongPlayer,
    WrongPhase,
    PlaceMoneyOnMarketInvestments,
    InsufficientFunds,
    MoneyPlacementNotRequired,
    InvalidMoveData,
    HasMonopoly,
    InvestmentMissingInPlayerHand,
    Unknown,
}

impl MoveErrorStatus {
    pub fn is_none(self) -> bool {
        self == MoveErrorStatus::None
    }
}

/// Payload for the moves that name a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyPayload {
    pub company: CompanyType,
}

/// What a move does, with the payload its kind requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "moveType", content = "moveData")]
pub enum MoveAction {
    DrawFromDeck,
    DrawMarketItem(CompanyPayload),
    PlaceMoneyOnMarketInvestments,
    DiscardInvestment(CompanyPayload),
    PlaceInvestmentInPortfolio(CompanyPayload),
}

impl MoveAction {
    pub fn move_type(&self) -> MoveType {
        match self {
            MoveAction::DrawFromDeck => MoveType::DrawFromDeck,
            MoveAction::DrawMarketItem(_) => MoveType::DrawMarketItem,
            MoveAction::PlaceMoneyOnMarketInvestments => MoveType::PlaceMoneyOnMarketInvestments,
            MoveAction::DiscardInvestment(_) => MoveType::DiscardInvestment,
            MoveAction::PlaceInvestmentInPortfolio(_) => MoveType::PlaceInvestmentInPortfolio,
        }
    }

    /// Decode the `moveData` payload for a known move type.
    pub fn decode(
        move_type: MoveType,
        data: serde_json::Value,
    ) -> Result<MoveAction, serde_json::Error> {
        Ok(match move_type {
            MoveType::DrawFromDeck => MoveAction::DrawFromDeck,
            MoveType::PlaceMoneyOnMarketInvestments => MoveAction::PlaceMoneyOnMarketInvestments,
            MoveType::DrawMarketItem => MoveAction::DrawMarketItem(serde_json::from_value(data)?),
            MoveType::DiscardInvestment => {
                MoveAction::DiscardInvestment(serde_json::from_value(data)?)
            }
            MoveType::PlaceInvestmentInPortfolio => {
                MoveAction::PlaceInvestmentInPortfolio(serde_json::from_value(data)?)
            }
        })
    }
}

/// Why a submitted move could not be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedMove {
    /// `moveType` is missing or names no known kind.
    UnknownType,
    /// The type is known but `moveData`, `movePhase` or `endTurn` is unusable.
    BadPayload(MoveType),
    /// The payload is not a JSON move object at all.
    Unreadable,
}

impl MalformedMove {
    pub fn move_type(self) -> Option<MoveType> {
        match self {
            MalformedMove::BadPayload(t) => Some(t),
            MalformedMove::UnknownType | MalformedMove::Unreadable => None,
        }
    }

    /// Status recorded once the game and turn checks have passed.
    pub fn error(self) -> MoveErrorStatus {
        match self {
            MalformedMove::UnknownType => MoveErrorStatus::InvalidMoveType,
            MalformedMove::BadPayload(_) | MalformedMove::Unreadable => {
                MoveErrorStatus::InvalidMoveData
            }
        }
    }
}

/// A move submitted by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
    pub player: String,
    pub action: MoveAction,
    pub move_phase: MovePhase,
    pub end_turn: bool,
}

impl Move {
    /// A draw-phase move that does not end the turn.
    pub fn new(player: impl Into<String>, action: MoveAction) -> Self {
        Move {
            player: player.into(),
            action,
            move_phase: MovePhase::Draw,
            end_turn: false,
        }
    }

    pub fn in_phase(mut self, phase: MovePhase) -> Self {
        self.move_phase = phase;
        self
    }

    pub fn ending_turn(mut self) -> Self {
        self.end_turn = true;
        self
    }

    /// The record stored as `Game::last_move` for this attempt.
    pub fn record(&self, error: MoveErrorStatus) -> LastMove {
        LastMove {
            player: self.player.clone(),
            move_type: Some(self.action.move_type()),
            action: Some(self.action),
            move_phase: self.move_phase,
            end_turn: self.end_turn,
            move_status: MoveStatus::Invalid,
            move_error_status: error,
        }
    }
}

/// The most recent move attempt, accepted or not.
///
/// `move_status` is always `Invalid` once recorded; acceptance is read from
/// `move_error_status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMove {
    pub player: String,
    /// `None` when the submitted move type was not recognised.
    pub move_type: Option<MoveType>,
    /// `None` when the payload could not be decoded.
    pub action: Option<MoveAction>,
    pub move_phase: MovePhase,
    pub end_turn: bool,
    pub move_status: MoveStatus,
    pub move_error_status: MoveErrorStatus,
}

impl LastMove {
    pub fn accepted(&self) -> bool {
        self.move_error_status.is_none()
    }

    /// Whether this record is an accepted move of `move_type` by `player`.
    pub fn is_accepted(&self, player: &str, move_type: MoveType) -> bool {
        self.accepted() && self.player == player && self.move_type == Some(move_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_unit_moves_ignore_payload() {
        let action = MoveAction::decode(MoveType::DrawFromDeck, json!({"anything": 1})).unwrap();
        assert_eq!(action, MoveAction::DrawFromDeck);
    }

    #[test]
    fn decode_company_payload() {
        let action = MoveAction::decode(
            MoveType::DrawMarketItem,
            json!({"company": "Ollivanders"}),
        )
        .unwrap();
        assert_eq!(
            action,
            MoveAction::DrawMarketItem(CompanyPayload {
                company: CompanyType::Ollivanders
            })
        );
    }

    #[test]
    fn decode_rejects_missing_company() {
        assert!(MoveAction::decode(MoveType::DiscardInvestment, json!(null)).is_err());
        assert!(MoveAction::decode(
            MoveType::PlaceInvestmentInPortfolio,
            json!({"company": "Honeydukes"})
        )
        .is_err());
    }

    #[test]
    fn record_is_tagged_invalid_even_when_accepted() {
        let mv = Move::new("A", MoveAction::DrawFromDeck);
        let record = mv.record(MoveErrorStatus::None);
        assert_eq!(record.move_status, MoveStatus::Invalid);
        assert!(record.accepted());
        assert!(record.is_accepted("A", MoveType::DrawFromDeck));
        assert!(!record.is_accepted("B", MoveType::DrawFromDeck));
        assert!(!record.is_accepted("A", MoveType::PlaceMoneyOnMarketInvestments));
    }

    #[test]
    fn rejected_record_is_not_accepted() {
        let mv = Move::new("A", MoveAction::PlaceMoneyOnMarketInvestments);
        let record = mv.record(MoveErrorStatus::InsufficientFunds);
        assert!(!record.is_accepted("A", MoveType::PlaceMoneyOnMarketInvestments));
    }

    #[test]
    fn action_serializes_adjacently_tagged() {
        let action = MoveAction::DiscardInvestment(CompanyPayload {
            company: CompanyType::Gringotts,
        });
        let value = serde_json::to_value(action).unwrap();
        assert_eq!(
            value,
            json!({"moveType": "DiscardInvestment", "moveData": {"company": "Gringotts"}})
        );
    }

    #[test]
    fn malformed_kinds_map_to_error_statuses() {
        assert_eq!(
            MalformedMove::UnknownType.error(),
            MoveErrorStatus::InvalidMoveType
        );
        assert_eq!(
            MalformedMove::Unreadable.error(),
            MoveErrorStatus::InvalidMoveData
        );
        let bad = MalformedMove::BadPayload(MoveType::DrawMarketItem);
        assert_eq!(bad.error(), MoveErrorStatus::InvalidMoveData);
        assert_eq!(bad.move_type(), Some(MoveType::DrawMarketItem));
        assert_eq!(MalformedMove::Unreadable.move_type(), None);
    }
}
