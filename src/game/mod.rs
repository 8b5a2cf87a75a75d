pub mod board;
pub mod session;
pub mod sync;

pub use board::{Board, Cell, Coord, ShotOutcome, BOARD_SIZE, SHIP_CATALOG};
pub use session::{GameSession, MoveOutcome, Phase, PlacementStep, Role, SessionContext, Winner};
pub use sync::{MoveRecord, OpponentMoves, SessionSync};
