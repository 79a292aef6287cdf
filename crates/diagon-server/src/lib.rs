// WebSocket front end for the Diagon Exchange game server.

pub mod ws_server;
