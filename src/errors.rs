use thiserror::Error;

use crate::models::challenge::ChallengeStatus;

// Errors raised by the shared store adapter. None of these are fatal: callers
// log them and surface a transient notification, nothing is retried.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store write failed: {0}")]
    Write(String),
    #[error("store read failed: {0}")]
    Read(String),
    #[error("no document with id {id} in collection {collection}")]
    NotFound { collection: String, id: String },
}

// Errors raised by the challenge coordinator.
#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error(transparent)]
    Store(#[from] StoreError),
    // Accept/decline refuse to touch a record that already left pending.
    #[error("challenge {id} was already {status}")]
    AlreadyResolved { id: String, status: ChallengeStatus },
    #[error("challenge {0} does not exist")]
    Missing(String),
    #[error("subscription closed before the challenge was resolved")]
    SubscriptionClosed,
}

// Rejected placements and moves. Purely local control flow: the caller resets
// its pending selection and the player tries again, nothing is logged or
// surfaced as a system error.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ValidationError {
    #[error("coordinate is outside the board")]
    OutOfBounds,
    #[error("ship must lie in a single row or column")]
    NotAligned,
    #[error("span covers {got} cells but the ship is {want} long")]
    WrongLength { want: usize, got: usize },
    #[error("a ship already occupies part of the span")]
    Occupied,
    #[error("ships may not touch another ship")]
    TouchingShip,
    #[error("cell was already resolved to a hit or miss")]
    CellAlreadyResolved,
    #[error("not this player's turn")]
    NotYourTurn,
    #[error("waiting for the result of the previous shot")]
    ShotPending,
    #[error("operation does not apply to the current phase")]
    WrongPhase,
    #[error("the match is already over")]
    GameOver,
}
