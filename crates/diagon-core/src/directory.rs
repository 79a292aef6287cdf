// Directory of live sessions keyed by name.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::GameRules;
use crate::game::{AddPlayerStatus, Move, MoveErrorStatus};
use crate::session::GameSession;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    #[error("a game named `{0}` already exists")]
    NameExists(String),

    #[error("game name must not be empty")]
    InvalidName,
}

pub struct SessionDirectory {
    rules: GameRules,
    sessions: RwLock<HashMap<String, Arc<GameSession>>>,
}

impl SessionDirectory {
    /// An empty directory whose sessions all play by `rules`.
    pub fn new(rules: GameRules) -> Self {
        SessionDirectory {
            rules,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Create a pending session named `name`.
    pub async fn create_session(&self, name: &str) -> Result<Arc<GameSession>, DirectoryError> {
        if name.is_empty() {
            return Err(DirectoryError::InvalidName);
        }
        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(name) {
            return Err(DirectoryError::NameExists(name.to_string()));
        }
        let session = Arc::new(GameSession::new(name, self.rules.clone()));
        sessions.insert(name.to_string(), Arc::clone(&session));
        info!("Created game {} ({} live)", name, sessions.len());
        Ok(session)
    }

    pub async fn get(&self, name: &str) -> Option<Arc<GameSession>> {
        self.sessions.read().await.get(name).cloned()
    }

    /// The session named `name`, creating it if needed.
    pub async fn get_or_create(&self, name: &str) -> Result<Arc<GameSession>, DirectoryError> {
        if name.is_empty() {
            return Err(DirectoryError::InvalidName);
        }
        if let Some(session) = self.get(name).await {
            return Ok(session);
        }
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(name.to_string())
            .or_insert_with(|| {
                info!("Created game {}", name);
                Arc::new(GameSession::new(name, self.rules.clone()))
            })
            .clone();
        Ok(session)
    }

    /// Join `player` to the session named `session`.
    pub async fn join_session(&self, session: &str, player: &str) -> AddPlayerStatus {
        match self.get(session).await {
            Some(s) => s.join(player).await,
            None => AddPlayerStatus::InvalidGame,
        }
    }

    /// Start the named session. Returns `None` for an unknown session.
    pub async fn start_game(&self, session: &str) -> Option<bool> {
        let s = self.get(session).await?;
        Some(s.start().await)
    }

    /// Submit `mv` to the named session.
    pub async fn submit(&self, session: &str, mv: &Move) -> MoveErrorStatus {
        match self.get(session).await {
            Some(s) => s.submit(mv).await,
            None => MoveErrorStatus::InvalidGame,
        }
    }

    pub async fn session_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::{GameStatus, MoveAction};

    fn directory() -> SessionDirectory {
        SessionDirectory::new(GameRules::default())
    }

    #[tokio::test]
    async fn create_rejects_duplicates_and_empty_names() {
        let dir = directory();
        assert!(dir.create_session("S").await.is_ok());
        assert_eq!(
            dir.create_session("S").await.err(),
            Some(DirectoryError::NameExists("S".into()))
        );
        assert_eq!(dir.create_session("").await.err(), Some(DirectoryError::InvalidName));
        assert_eq!(dir.session_names().await, vec!["S".to_string()]);
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_winner() {
        let dir = Arc::new(directory());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let dir = Arc::clone(&dir);
            handles.push(tokio::spawn(async move { dir.create_session("race").await.is_ok() }));
        }
        let mut winners = 0;
        for h in handles {
            if h.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn get_or_create_returns_same_session() {
        let dir = directory();
        let first = dir.get_or_create("S").await.unwrap();
        let second = dir.get_or_create("S").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(dir.get_or_create("").await.is_err());
    }

    #[tokio::test]
    async fn join_unknown_session_is_invalid_game() {
        let dir = directory();
        assert_eq!(dir.join_session("nope", "A").await, AddPlayerStatus::InvalidGame);
    }

    #[tokio::test]
    async fn pass_throughs_reach_the_session() {
        let dir = directory();
        dir.create_session("S").await.unwrap();
        assert_eq!(dir.join_session("S", "A").await, AddPlayerStatus::Ok);
        assert_eq!(dir.start_game("S").await, Some(true));
        assert_eq!(dir.start_game("missing").await, None);

        let session = dir.get("S").await.unwrap();
        assert_eq!(session.snapshot().await.status, GameStatus::Started);

        let mv = Move::new("A", MoveAction::DrawFromDeck);
        assert_eq!(dir.submit("S", &mv).await, MoveErrorStatus::None);
        assert_eq!(dir.submit("missing", &mv).await, MoveErrorStatus::InvalidGame);
    }
}
