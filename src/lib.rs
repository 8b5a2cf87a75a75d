//! Matchmaking and turn coordination for a two-player Battleship game.
//!
//! Two independent clients share nothing but a document store with change
//! notifications: presence, the lobby roster, challenges, readiness and
//! moves all travel as store records. `store` defines the vendor-neutral
//! store capability (and an in-memory implementation), `lobby` covers
//! presence, the roster and the challenge protocol, and `game` holds the
//! per-client session state machine plus its store-mediated sync.

pub mod errors;
pub mod game;
pub mod lobby;
pub mod models;
pub mod store;
