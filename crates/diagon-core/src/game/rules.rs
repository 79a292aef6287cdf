// Move validation and state transitions.
//
// Every move kind has a `validate_*` function that inspects the game without
// mutating it, and an `apply_*` function that performs the state change once
// the move is accepted. `dispatch` is the entry point used by the session
// coordinator: it validates, records the attempt as `last_move`, and applies
// the change when the move kind is wired for mutation.

use tracing::{debug, info};

use super::engine;
use super::moves::{
    CompanyPayload, LastMove, MalformedMove, Move, MoveAction, MoveErrorStatus, MovePhase,
    MoveStatus, MoveType,
};
use super::state::{Game, GameStatus, Investment, MarketInvestment};
use crate::catalog::{Card, CompanyType};
use crate::config::GameRules;

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Checks shared by every move: the game must be running and it must be the
/// submitting player's turn.
pub fn validate_common(game: &Game, player: &str) -> MoveErrorStatus {
    if game.status != GameStatus::Started {
        return MoveErrorStatus::InvalidGame;
    }
    if game.current_player.as_deref() != Some(player) {
        return MoveErrorStatus::WrongPlayer;
    }
    MoveErrorStatus::None
}

/// Validate `mv` against `game`.
pub fn validate(game: &Game, mv: &Move) -> MoveErrorStatus {
    let common = validate_common(game, &mv.player);
    if !common.is_none() {
        return common;
    }

    match mv.action {
        MoveAction::DrawFromDeck => validate_draw_from_deck(game, mv),
        MoveAction::DrawMarketItem(payload) => validate_draw_market_item(game, mv, payload),
        MoveAction::PlaceMoneyOnMarketInvestments => validate_place_money(game, mv),
        MoveAction::DiscardInvestment(payload) => validate_card_in_hand(game, mv, payload),
        MoveAction::PlaceInvestmentInPortfolio(payload) => {
            validate_card_in_hand(game, mv, payload)
        }
    }
}

/// Store `mv` as the game's last move with its computed error status.
pub fn record(game: &mut Game, mv: &Move, error: MoveErrorStatus) {
    game.last_move = Some(mv.record(error));
}

/// Record the attempt and, when `error` is `None`, perform the state change.
pub fn apply(game: &mut Game, mv: &Move, error: MoveErrorStatus) {
    record(game, mv, error);
    if !error.is_none() {
        return;
    }

    match mv.action {
        MoveAction::DrawFromDeck => apply_draw_from_deck(game),
        MoveAction::DrawMarketItem(payload) => apply_draw_market_item(game, mv, payload.company),
        MoveAction::PlaceMoneyOnMarketInvestments => apply_place_money(game, mv),
        MoveAction::DiscardInvestment(payload) => apply_discard(game, mv, payload.company),
        MoveAction::PlaceInvestmentInPortfolio(payload) => {
            apply_place_investment(game, mv, payload.company)
        }
    }

    if mv.end_turn && game.is_started() {
        engine::advance_turn(game);
    }
}

/// Whether the state change for this move kind runs from `dispatch`.
///
/// Discarding and placing investments are validation-only unless the rules
/// enable them.
pub fn applies_state_change(move_type: MoveType, rules: &GameRules) -> bool {
    match move_type {
        MoveType::DrawFromDeck
        | MoveType::DrawMarketItem
        | MoveType::PlaceMoneyOnMarketInvestments => true,
        MoveType::DiscardInvestment | MoveType::PlaceInvestmentInPortfolio => {
            rules.apply_portfolio_moves
        }
    }
}

/// Validate `mv`, record it, and apply it when accepted and wired.
pub fn dispatch(game: &mut Game, mv: &Move, rules: &GameRules) -> MoveErrorStatus {
    let error = validate(game, mv);
    let move_type = mv.action.move_type();

    if applies_state_change(move_type, rules) {
        apply(game, mv, error);
    } else {
        record(game, mv, error);
    }

    debug!(
        "Move {:?} by {} in {}: {:?}",
        move_type, mv.player, game.name, error
    );
    error
}

/// Record a move from `player` that could not be decoded.
///
/// The game and turn checks still take precedence; otherwise the attempt is
/// rejected with the status for `kind`.
pub fn record_malformed(game: &mut Game, player: &str, kind: MalformedMove) -> MoveErrorStatus {
    let common = validate_common(game, player);
    let error = if common.is_none() { kind.error() } else { common };

    game.last_move = Some(LastMove {
        player: player.to_string(),
        move_type: kind.move_type(),
        action: None,
        move_phase: MovePhase::default(),
        end_turn: false,
        move_status: MoveStatus::Invalid,
        move_error_status: error,
    });

    debug!(
        "Malformed move ({:?}) by {} in {}: {:?}",
        kind, player, game.name, error
    );
    error
}

// ---------------------------------------------------------------------------
// DrawFromDeck
// ---------------------------------------------------------------------------

fn validate_draw_from_deck(game: &Game, mv: &Move) -> MoveErrorStatus {
    if mv.move_phase != MovePhase::Draw {
        return MoveErrorStatus::WrongPhase;
    }
    if game.deck.is_empty() {
        return MoveErrorStatus::Unknown;
    }
    if game.market_investments.is_empty() {
        return MoveErrorStatus::None;
    }

    let funded_market = game.last_move.as_ref().is_some_and(|last| {
        last.is_accepted(&mv.player, MoveType::PlaceMoneyOnMarketInvestments)
    });
    if funded_market {
        return MoveErrorStatus::None;
    }

    let owns_whole_market = game
        .market_investments
        .iter()
        .all(|m| game.holds_monopoly(&mv.player, m.company));
    if owns_whole_market {
        MoveErrorStatus::None
    } else {
        MoveErrorStatus::PlaceMoneyOnMarketInvestments
    }
}

fn apply_draw_from_deck(game: &mut Game) {
    if game.current_player().is_none() {
        return;
    }
    let Some(card) = game.deck.pop() else {
        return;
    };
    if let Some(player) = game.current_player_mut() {
        player.hand.push(card);
    }

    if game.deck.is_empty() {
        info!("Deck exhausted in {}, game finished", game.name);
        game.status = GameStatus::Finished;
    }
}

// ---------------------------------------------------------------------------
// DrawMarketItem
// ---------------------------------------------------------------------------

fn validate_draw_market_item(game: &Game, mv: &Move, payload: CompanyPayload) -> MoveErrorStatus {
    if game.market_entry(payload.company).is_none() {
        return MoveErrorStatus::InvalidMoveData;
    }
    if game.holds_monopoly(&mv.player, payload.company) {
        return MoveErrorStatus::HasMonopoly;
    }
    MoveErrorStatus::None
}

fn apply_draw_market_item(game: &mut Game, mv: &Move, company: CompanyType) {
    let Some(idx) = game
        .market_investments
        .iter()
        .position(|m| m.company == company)
    else {
        return;
    };
    let entry = game.market_investments.remove(idx);

    if let Some(player) = game.player_mut(&mv.player) {
        player.hand.push(Card::new(entry.company));
        player.money.one_dollar_count += entry.dollar_count;
    }
}

// ---------------------------------------------------------------------------
// PlaceMoneyOnMarketInvestments
// ---------------------------------------------------------------------------

/// Market entries whose monopoly `player` does not hold.
fn unowned_entries(game: &Game, player: &str) -> usize {
    game.market_investments
        .iter()
        .filter(|m| !game.holds_monopoly(player, m.company))
        .count()
}

fn validate_place_money(game: &Game, mv: &Move) -> MoveErrorStatus {
    let required = unowned_entries(game, &mv.player);
    if required == 0 {
        return MoveErrorStatus::MoneyPlacementNotRequired;
    }

    let available = game
        .player(&mv.player)
        .map(|p| p.money.one_dollar_count as usize)
        .unwrap_or(0);
    if required > available {
        return MoveErrorStatus::InsufficientFunds;
    }
    MoveErrorStatus::None
}

fn apply_place_money(game: &mut Game, mv: &Move) {
    let mut funded: u32 = 0;
    for entry in game.market_investments.iter_mut() {
        let owned = game
            .monopolies
            .get(&entry.company)
            .is_some_and(|holder| *holder == mv.player);
        if !owned {
            entry.dollar_count += 1;
            funded += 1;
        }
    }

    if let Some(player) = game.player_mut(&mv.player) {
        player.money.one_dollar_count = player.money.one_dollar_count.saturating_sub(funded);
    }
}

// ---------------------------------------------------------------------------
// PlaceInvestmentInPortfolio / DiscardInvestment
// ---------------------------------------------------------------------------

fn validate_card_in_hand(game: &Game, mv: &Move, payload: CompanyPayload) -> MoveErrorStatus {
    let in_hand = game
        .player(&mv.player)
        .is_some_and(|p| p.holds_in_hand(payload.company));
    if in_hand {
        MoveErrorStatus::None
    } else {
        MoveErrorStatus::InvestmentMissingInPlayerHand
    }
}

fn apply_place_investment(game: &mut Game, mv: &Move, company: CompanyType) {
    let Some(player) = game.player_mut(&mv.player) else {
        return;
    };
    let count = player
        .investments
        .entry(company)
        .and_modify(|i| i.investment_count += 1)
        .or_insert(Investment {
            company,
            investment_count: 1,
            monopoly: false,
        })
        .investment_count;

    let takes_monopoly = match game.monopolies.get(&company) {
        None => true,
        Some(holder) if *holder == mv.player => true,
        Some(holder) => {
            let holder_count = game
                .player(holder)
                .map(|h| h.investment_count(company))
                .unwrap_or(0);
            holder_count < count
        }
    };

    if takes_monopoly {
        transfer_monopoly(game, company, &mv.player);
    }
}

/// Make `player` the monopoly holder for `company`, keeping the per-player
/// investment flags in step with the session map.
fn transfer_monopoly(game: &mut Game, company: CompanyType, player: &str) {
    if let Some(previous) = game.monopolies.insert(company, player.to_string()) {
        if previous != player {
            info!("{} takes the {} monopoly from {}", player, company, previous);
            if let Some(investment) = game
                .player_mut(&previous)
                .and_then(|p| p.investments.get_mut(&company))
            {
                investment.monopoly = false;
            }
        }
    }

    if let Some(investment) = game
        .player_mut(player)
        .and_then(|p| p.investments.get_mut(&company))
    {
        investment.monopoly = true;
    }
}

fn apply_discard(game: &mut Game, mv: &Move, company: CompanyType) {
    let Some(player) = game.player_mut(&mv.player) else {
        return;
    };
    let Some(idx) = player.hand.iter().position(|c| c.company == company) else {
        return;
    };
    player.hand.remove(idx);

    game.market_investments.push(MarketInvestment {
        company,
        dollar_count: 0,
    });
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
