// Game model and rules: state, moves, validators and lifecycle transitions.

pub mod engine;
pub mod moves;
pub mod rules;
pub mod state;

pub use engine::AddPlayerStatus;
pub use moves::{
    CompanyPayload, LastMove, MalformedMove, Move, MoveAction, MoveErrorStatus, MovePhase,
    MoveType,
};
pub use state::{Game, GameStatus, Investment, MarketInvestment, Money, Player};
