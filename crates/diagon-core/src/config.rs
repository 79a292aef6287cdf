// Configuration loading and parsing (config/server.toml).

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::catalog::catalog_card_count;
use crate::game::state::Money;

/// Hard upper bound on players in one session.
pub const MAX_PLAYERS: usize = 7;

/// Name of the config file under `config/` (and `defaults/`).
pub const CONFIG_FILE: &str = "server.toml";

/// Smallest per-connection outbound queue that fits the greeting and the
/// first snapshot.
pub const MIN_OUTBOUND_BUFFER: usize = 2;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub server: ServerConfig,
    pub rules: GameRules,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Outbound messages queued per connection before snapshots are dropped.
    pub outbound_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            host: "127.0.0.1".into(),
            port: 8080,
            outbound_buffer: 64,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Rules shared by every session created from this config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameRules {
    pub max_players: usize,
    pub hand_size: usize,
    /// Cards dropped from the shuffled deck before dealing.
    pub removed_cards: usize,
    pub starting_money: Money,
    /// Run the state changes for `DiscardInvestment` and
    /// `PlaceInvestmentInPortfolio`. When false only their validation runs.
    pub apply_portfolio_moves: bool,
}

impl Default for GameRules {
    fn default() -> Self {
        GameRules {
            max_players: MAX_PLAYERS,
            hand_size: 3,
            removed_cards: 5,
            starting_money: Money {
                one_dollar_count: 10,
                three_dollar_count: 0,
            },
            apply_portfolio_moves: false,
        }
    }
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire server.toml file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    server: ServerConfig,
    game: GameSection,
    rules: RulesSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct GameSection {
    max_players: usize,
    hand_size: usize,
    removed_cards: usize,
    starting_one_dollar: u32,
    starting_three_dollar: u32,
}

impl Default for GameSection {
    fn default() -> Self {
        let rules = GameRules::default();
        GameSection {
            max_players: rules.max_players,
            hand_size: rules.hand_size,
            removed_cards: rules.removed_cards,
            starting_one_dollar: rules.starting_money.one_dollar_count,
            starting_three_dollar: rules.starting_money.three_dollar_count,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct RulesSection {
    apply_portfolio_moves: bool,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Parse and validate config text. `path` is only used for error messages.
pub fn parse_config(text: &str, path: &Path) -> Result<Config, ConfigError> {
    let file: ConfigFile = toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config = Config {
        server: file.server,
        rules: GameRules {
            max_players: file.game.max_players,
            hand_size: file.game.hand_size,
            removed_cards: file.game.removed_cards,
            starting_money: Money {
                one_dollar_count: file.game.starting_one_dollar,
                three_dollar_count: file.game.starting_three_dollar,
            },
            apply_portfolio_moves: file.rules.apply_portfolio_moves,
        },
    };

    validate(&config)?;
    Ok(config)
}

/// Load and validate `config/server.toml` relative to `base_dir`.
///
/// This does not copy defaults; prefer `load_config()`.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = std::fs::read_to_string(&path)
        .map_err(|_| ConfigError::FileNotFound { path: path.clone() })?;
    parse_config(&text, &path)
}

/// Ensure config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            // Already present in config/; keep the user's copy.
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Loads config relative to the current working directory, copying defaults
/// first. A missing `defaults/` and `config/` falls back to built-in defaults.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    match ensure_config_files(&cwd) {
        Ok(_) => {}
        Err(ConfigError::DefaultsCopyError { .. })
            if !cwd.join("config").join(CONFIG_FILE).exists() =>
        {
            return Ok(Config::default());
        }
        Err(e) => return Err(e),
    }
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    let rules = &config.rules;

    if rules.max_players == 0 || rules.max_players > MAX_PLAYERS {
        return Err(ConfigError::ValidationError {
            field: "game.max_players".into(),
            message: format!("must be between 1 and {MAX_PLAYERS}, got {}", rules.max_players),
        });
    }

    if rules.hand_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "game.hand_size".into(),
            message: "must be greater than 0".into(),
        });
    }

    let deck_size = catalog_card_count().saturating_sub(rules.removed_cards);
    if rules.max_players * rules.hand_size > deck_size {
        return Err(ConfigError::ValidationError {
            field: "game.removed_cards".into(),
            message: format!(
                "deck of {deck_size} cards cannot deal {} cards to {} players",
                rules.hand_size, rules.max_players
            ),
        });
    }

    // A new connection is sent the greeting and a snapshot back to back.
    if config.server.outbound_buffer < MIN_OUTBOUND_BUFFER {
        return Err(ConfigError::ValidationError {
            field: "server.outbound_buffer".into(),
            message: format!(
                "must be at least {MIN_OUTBOUND_BUFFER}, got {}",
                config.server.outbound_buffer
            ),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 9100
outbound_buffer = 16

[game]
max_players = 5
hand_size = 4
removed_cards = 5
starting_one_dollar = 12
starting_three_dollar = 1

[rules]
apply_portfolio_moves = true
"#;

    fn parse(text: &str) -> Result<Config, ConfigError> {
        parse_config(text, Path::new("server.toml"))
    }

    fn temp_base(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("diagon_config_{name}"));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn parses_full_file() {
        let config = parse(SAMPLE).expect("sample should parse");
        assert_eq!(config.server.bind_addr(), "0.0.0.0:9100");
        assert_eq!(config.server.outbound_buffer, 16);
        assert_eq!(config.rules.max_players, 5);
        assert_eq!(config.rules.hand_size, 4);
        assert_eq!(config.rules.starting_money.one_dollar_count, 12);
        assert_eq!(config.rules.starting_money.three_dollar_count, 1);
        assert!(config.rules.apply_portfolio_moves);
    }

    #[test]
    fn shipped_defaults_match_built_in_defaults() {
        let text = include_str!("../../../defaults/server.toml");
        let config = parse(text).expect("defaults/server.toml should parse");
        assert_eq!(config.rules, GameRules::default());
        assert_eq!(config.server.bind_addr(), ServerConfig::default().bind_addr());
        assert_eq!(config.server.outbound_buffer, 64);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rules, GameRules::default());
        assert_eq!(config.rules.max_players, 7);
        assert_eq!(config.rules.starting_money.one_dollar_count, 10);
        assert!(!config.rules.apply_portfolio_moves);
    }

    #[test]
    fn rejects_too_many_players() {
        let err = parse("[game]\nmax_players = 8\n").unwrap_err();
        match err {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "game.max_players"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_zero_hand_size() {
        let err = parse("[game]\nhand_size = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "game.hand_size"));
    }

    #[test]
    fn rejects_deck_too_small_to_deal() {
        let err = parse("[game]\nremoved_cards = 30\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "game.removed_cards"));
    }

    #[test]
    fn parse_error_for_invalid_toml() {
        let err = parse("[server\nport = ").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_is_reported() {
        let base = temp_base("missing");
        let err = load_config_from(&base).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn ensure_config_files_copies_then_skips() {
        let base = temp_base("copy");
        fs::create_dir_all(base.join("defaults")).unwrap();
        fs::write(base.join("defaults").join(CONFIG_FILE), SAMPLE).unwrap();

        let copied = ensure_config_files(&base).unwrap();
        assert_eq!(copied, vec![base.join("config").join(CONFIG_FILE)]);
        let config = load_config_from(&base).unwrap();
        assert_eq!(config.server.port, 9100);

        let copied_again = ensure_config_files(&base).unwrap();
        assert!(copied_again.is_empty());
    }

    #[test]
    fn ensure_config_files_keeps_existing_user_file() {
        let base = temp_base("keep");
        fs::create_dir_all(base.join("defaults")).unwrap();
        fs::create_dir_all(base.join("config")).unwrap();
        fs::write(base.join("defaults").join(CONFIG_FILE), SAMPLE).unwrap();
        fs::write(base.join("config").join(CONFIG_FILE), "# custom\n").unwrap();

        let copied = ensure_config_files(&base).unwrap();
        assert!(copied.is_empty());
        let content = fs::read_to_string(base.join("config").join(CONFIG_FILE)).unwrap();
        assert_eq!(content, "# custom\n");
    }

    #[test]
    fn rejects_outbound_buffer_too_small_for_greeting_and_snapshot() {
        for size in [0, 1] {
            let err = parse(&format!("[server]\noutbound_buffer = {size}\n")).unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError { ref field, .. } if field == "server.outbound_buffer"));
        }
        let config = parse("[server]\noutbound_buffer = 2\n").unwrap();
        assert_eq!(config.server.outbound_buffer, MIN_OUTBOUND_BUFFER);
    }

    #[test]
    fn ensure_config_files_errors_when_both_dirs_missing() {
        let base = temp_base("neither");
        let err = ensure_config_files(&base).unwrap_err();
        assert!(matches!(err, ConfigError::DefaultsCopyError { .. }));
    }
}
