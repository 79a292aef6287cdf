// Session lifecycle transitions: joining, starting the game, passing the turn.

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::state::{Game, GameStatus, Player};
use crate::catalog::build_deck;
use crate::config::GameRules;

/// Result of asking a session to add a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddPlayerStatus {
    Ok,
    InvalidGame,
    InvalidPlayer,
    PlayerLimitExceeded,
    PlayerAlreadyAdded,
    GameAlreadyStarted,
    UnknownError,
}

/// Add a player named `name` to a pending game.
///
/// Checks run in order: empty name, game already started, session full,
/// duplicate name. A rejected join leaves the game untouched.
pub fn add_player(game: &mut Game, name: &str, rules: &GameRules) -> AddPlayerStatus {
    if name.is_empty() {
        return AddPlayerStatus::InvalidPlayer;
    }
    if !game.is_pending() {
        return AddPlayerStatus::GameAlreadyStarted;
    }
    if game.players.len() >= rules.max_players {
        return AddPlayerStatus::PlayerLimitExceeded;
    }
    if game.has_player(name) {
        return AddPlayerStatus::PlayerAlreadyAdded;
    }

    game.players.push(Player::new(name, rules.starting_money));
    info!("{} joined {} ({} players)", name, game.name, game.players.len());
    AddPlayerStatus::Ok
}

/// Start a pending game: pick a random first player, build the deck and deal
/// every player a hand. Returns whether the game was started.
///
/// Starting a game that is already running or finished, or that has no
/// players, does nothing.
pub fn start_game<R: Rng + ?Sized>(game: &mut Game, rules: &GameRules, rng: &mut R) -> bool {
    if !game.is_pending() {
        debug!("Ignoring start for {}: status is {:?}", game.name, game.status);
        return false;
    }
    let Some(first) = game.players.choose(rng).map(|p| p.name.clone()) else {
        warn!("Ignoring start for {}: no players have joined", game.name);
        return false;
    };

    let mut deck = build_deck(rng, rules.removed_cards);
    for player in game.players.iter_mut() {
        for _ in 0..rules.hand_size {
            if let Some(card) = deck.pop() {
                player.hand.push(card);
            }
        }
    }

    game.deck = deck;
    game.current_player = Some(first);
    game.status = GameStatus::Started;

    info!(
        "Game {} started with {} players, {} cards left in deck, {} to move",
        game.name,
        game.players.len(),
        game.deck.len(),
        game.current_player.as_deref().unwrap_or_default()
    );
    true
}

/// Pass the turn to the next player in join order.
pub fn advance_turn(game: &mut Game) {
    if game.players.is_empty() {
        return;
    }
    let current = game
        .current_player
        .as_deref()
        .and_then(|name| game.players.iter().position(|p| p.name == name));
    let next = match current {
        Some(idx) => (idx + 1) % game.players.len(),
        None => 0,
    };
    game.current_player = Some(game.players[next].name.clone());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{catalog_card_count, catalog_count_for, CompanyType};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn game_with(names: &[&str]) -> Game {
        let mut game = Game::new("S");
        let rules = GameRules::default();
        for name in names {
            assert_eq!(add_player(&mut game, name, &rules), AddPlayerStatus::Ok);
        }
        game
    }

    #[test]
    fn join_gives_starting_money() {
        let game = game_with(&["A"]);
        assert_eq!(game.players[0].money.one_dollar_count, 10);
        assert_eq!(game.players[0].money.three_dollar_count, 0);
    }

    #[test]
    fn join_rejects_empty_name() {
        let mut game = Game::new("S");
        assert_eq!(
            add_player(&mut game, "", &GameRules::default()),
            AddPlayerStatus::InvalidPlayer
        );
        assert!(game.players.is_empty());
    }

    #[test]
    fn join_rejects_duplicates_without_adding() {
        let mut game = game_with(&["A", "B"]);
        assert_eq!(
            add_player(&mut game, "A", &GameRules::default()),
            AddPlayerStatus::PlayerAlreadyAdded
        );
        assert_eq!(game.players.len(), 2);
    }

    #[test]
    fn join_rejects_eighth_player() {
        let mut game = game_with(&["1", "2", "3", "4", "5", "6", "7"]);
        assert_eq!(
            add_player(&mut game, "8", &GameRules::default()),
            AddPlayerStatus::PlayerLimitExceeded
        );
        // A full session reports the limit even for an existing name.
        assert_eq!(
            add_player(&mut game, "1", &GameRules::default()),
            AddPlayerStatus::PlayerLimitExceeded
        );
        assert_eq!(game.players.len(), 7);
    }

    #[test]
    fn join_after_start_is_rejected() {
        let mut game = game_with(&["A"]);
        let mut rng = StdRng::seed_from_u64(3);
        assert!(start_game(&mut game, &GameRules::default(), &mut rng));
        assert_eq!(
            add_player(&mut game, "B", &GameRules::default()),
            AddPlayerStatus::GameAlreadyStarted
        );
    }

    #[test]
    fn start_deals_hands_and_picks_current_player() {
        let mut game = game_with(&["A", "B", "C"]);
        let mut rng = StdRng::seed_from_u64(11);

        assert!(start_game(&mut game, &GameRules::default(), &mut rng));

        assert_eq!(game.status, GameStatus::Started);
        for player in &game.players {
            assert_eq!(player.hand.len(), 3);
        }
        let current = game.current_player.clone().unwrap();
        assert!(game.has_player(&current));
        assert_eq!(game.deck.len(), catalog_card_count() - 5 - 9);
    }

    #[test]
    fn start_conserves_cards() {
        for seed in 0..16 {
            let mut game = game_with(&["A", "B", "C", "D", "E", "F", "G"]);
            let mut rng = StdRng::seed_from_u64(seed);
            start_game(&mut game, &GameRules::default(), &mut rng);

            let total: usize = CompanyType::ALL.iter().map(|c| game.cards_in_play(*c)).sum();
            assert_eq!(total, catalog_card_count() - 5);
            for company in CompanyType::ALL {
                assert!(game.cards_in_play(company) <= catalog_count_for(company));
            }
        }
    }

    #[test]
    fn start_twice_is_a_no_op() {
        let mut game = game_with(&["A", "B"]);
        let mut rng = StdRng::seed_from_u64(5);
        assert!(start_game(&mut game, &GameRules::default(), &mut rng));
        let snapshot = game.clone();

        assert!(!start_game(&mut game, &GameRules::default(), &mut rng));
        assert_eq!(game, snapshot);
    }

    #[test]
    fn start_without_players_does_nothing() {
        let mut game = Game::new("empty");
        let mut rng = StdRng::seed_from_u64(5);
        assert!(!start_game(&mut game, &GameRules::default(), &mut rng));
        assert!(game.is_pending());
        assert!(game.deck.is_empty());
    }

    #[test]
    fn single_player_game_can_start() {
        let mut game = game_with(&["Solo"]);
        let mut rng = StdRng::seed_from_u64(9);
        assert!(start_game(&mut game, &GameRules::default(), &mut rng));
        assert_eq!(game.current_player.as_deref(), Some("Solo"));
    }

    #[test]
    fn advance_turn_wraps_in_join_order() {
        let mut game = game_with(&["A", "B", "C"]);
        game.current_player = Some("B".into());
        advance_turn(&mut game);
        assert_eq!(game.current_player.as_deref(), Some("C"));
        advance_turn(&mut game);
        assert_eq!(game.current_player.as_deref(), Some("A"));
    }
}
