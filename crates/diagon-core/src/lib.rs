// Library root for the Diagon Exchange game server core: the company
// catalog, game rules, session coordination and configuration.

pub mod catalog;
pub mod config;
pub mod directory;
pub mod game;
pub mod protocol;
pub mod session;
