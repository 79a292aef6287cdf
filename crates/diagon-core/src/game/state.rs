// Game state: players, deck, market, monopolies and the turn pointer.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::moves::LastMove;
use crate::catalog::{Card, CompanyType};

/// Cash held by a player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Money {
    pub one_dollar_count: u32,
    /// Reserved: no move produces or consumes three-dollar coins.
    pub three_dollar_count: u32,
}

/// A player's holding in one company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Investment {
    pub company: CompanyType,
    pub investment_count: u32,
    /// Mirrors `Game::monopolies`, which is authoritative.
    pub monopoly: bool,
}

/// A company card sitting in the shared market with the bonus cash placed on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketInvestment {
    pub company: CompanyType,
    pub dollar_count: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub name: String,
    pub investments: BTreeMap<CompanyType, Investment>,
    pub hand: Vec<Card>,
    pub money: Money,
}

impl Player {
    pub fn new(name: impl Into<String>, money: Money) -> Self {
        Player {
            name: name.into(),
            investments: BTreeMap::new(),
            hand: Vec::new(),
            money,
        }
    }

    pub fn holds_in_hand(&self, company: CompanyType) -> bool {
        self.hand.iter().any(|c| c.company == company)
    }

    /// Portfolio count for `company`, zero when the player has no investment.
    pub fn investment_count(&self, company: CompanyType) -> u32 {
        self.investments
            .get(&company)
            .map(|i| i.investment_count)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameStatus {
    #[default]
    Pending,
    Started,
    Finished,
}

/// The complete state of one session. This is also the snapshot broadcast to
/// every connected player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    pub name: String,
    /// Players in join order.
    pub players: Vec<Player>,
    /// Draw pile; the last element is the top card.
    pub deck: Vec<Card>,
    pub market_investments: Vec<MarketInvestment>,
    pub status: GameStatus,
    /// Name of the player whose turn it is.
    pub current_player: Option<String>,
    /// Company type -> name of the player holding its monopoly.
    pub monopolies: BTreeMap<CompanyType, String>,
    pub last_move: Option<LastMove>,
}

impl Game {
    pub fn new(name: impl Into<String>) -> Self {
        Game {
            name: name.into(),
            players: Vec::new(),
            deck: Vec::new(),
            market_investments: Vec::new(),
            status: GameStatus::Pending,
            current_player: None,
            monopolies: BTreeMap::new(),
            last_move: None,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == GameStatus::Pending
    }

    pub fn is_started(&self) -> bool {
        self.status == GameStatus::Started
    }

    /// Look up a player by name.
    pub fn player(&self, name: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.name == name)
    }

    /// Get a mutable reference to a player by name.
    pub fn player_mut(&mut self, name: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.name == name)
    }

    pub fn has_player(&self, name: &str) -> bool {
        self.player(name).is_some()
    }

    pub fn current_player(&self) -> Option<&Player> {
        self.current_player
            .as_deref()
            .and_then(|name| self.player(name))
    }

    pub fn current_player_mut(&mut self) -> Option<&mut Player> {
        let name = self.current_player.clone()?;
        self.player_mut(&name)
    }

    /// Whether `player` currently holds the monopoly for `company`.
    pub fn holds_monopoly(&self, player: &str, company: CompanyType) -> bool {
        self.monopolies
            .get(&company)
            .is_some_and(|holder| holder == player)
    }

    pub fn market_entry(&self, company: CompanyType) -> Option<&MarketInvestment> {
        self.market_investments.iter().find(|m| m.company == company)
    }

    /// Number of `company` cards across the deck, every hand and the market.
    pub fn cards_in_play(&self, company: CompanyType) -> usize {
        let in_deck = self.deck.iter().filter(|c| c.company == company).count();
        let in_hands: usize = self
            .players
            .iter()
            .map(|p| p.hand.iter().filter(|c| c.company == company).count())
            .sum();
        let in_market = self
            .market_investments
            .iter()
            .filter(|m| m.company == company)
            .count();
        in_deck + in_hands + in_market
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game_with_players(names: &[&str]) -> Game {
        let mut game = Game::new("test");
        for name in names {
            game.players.push(Player::new(*name, Money::default()));
        }
        game
    }

    #[test]
    fn new_game_is_pending_and_empty() {
        let game = Game::new("S");
        assert!(game.is_pending());
        assert!(game.players.is_empty());
        assert!(game.deck.is_empty());
        assert!(game.monopolies.is_empty());
        assert!(game.last_move.is_none());
    }

    #[test]
    fn player_lookup_by_name() {
        let mut game = game_with_players(&["A", "B"]);
        assert_eq!(game.player("B").map(|p| p.name.as_str()), Some("B"));
        assert!(game.player("C").is_none());

        game.player_mut("A").unwrap().money.one_dollar_count = 4;
        assert_eq!(game.player("A").unwrap().money.one_dollar_count, 4);
    }

    #[test]
    fn current_player_resolves_through_name() {
        let mut game = game_with_players(&["A", "B"]);
        assert!(game.current_player().is_none());
        game.current_player = Some("B".into());
        assert_eq!(game.current_player().unwrap().name, "B");
    }

    #[test]
    fn monopoly_lookup() {
        let mut game = game_with_players(&["A"]);
        game.monopolies.insert(CompanyType::Gringotts, "A".into());
        assert!(game.holds_monopoly("A", CompanyType::Gringotts));
        assert!(!game.holds_monopoly("A", CompanyType::Ollivanders));
        assert!(!game.holds_monopoly("B", CompanyType::Gringotts));
    }

    #[test]
    fn cards_in_play_counts_every_container() {
        let mut game = game_with_players(&["A"]);
        game.deck.push(Card::new(CompanyType::Gringotts));
        game.players[0].hand.push(Card::new(CompanyType::Gringotts));
        game.market_investments.push(MarketInvestment {
            company: CompanyType::Gringotts,
            dollar_count: 3,
        });
        game.deck.push(Card::new(CompanyType::Ollivanders));
        assert_eq!(game.cards_in_play(CompanyType::Gringotts), 3);
        assert_eq!(game.cards_in_play(CompanyType::Ollivanders), 1);
    }

    #[test]
    fn snapshot_uses_camel_case_keys() {
        let mut game = game_with_players(&["A"]);
        game.monopolies.insert(CompanyType::LeakyCauldron, "A".into());
        let json: serde_json::Value = serde_json::to_value(&game).unwrap();
        assert!(json.get("marketInvestments").is_some());
        assert!(json.get("currentPlayer").is_some());
        assert_eq!(json["monopolies"]["LeakyCauldron"], "A");
        assert_eq!(json["players"][0]["money"]["oneDollarCount"], 0);
    }
}
