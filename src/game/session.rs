use log::{debug, info};

use crate::errors::ValidationError;
use crate::game::board::{Board, Cell, Coord, ShotOutcome, SHIP_CATALOG};

/// Which side of the challenge this client was on. The challenger is player
/// one and moves first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Challenger,
    Challenged,
}

// The live game between two players, reconstructed locally on each side the
// moment an accepted challenge is observed. Nothing here is persisted; when
// the owning screen goes away the session is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub challenge_id: String,
    pub player: String,
    pub opponent: String,
    pub role: Role,
}

impl SessionContext {
    pub fn for_challenger(challenge_id: &str, from: &str, to: &str) -> Self {
        SessionContext {
            challenge_id: challenge_id.to_string(),
            player: from.to_string(),
            opponent: to.to_string(),
            role: Role::Challenger,
        }
    }

    pub fn for_acceptor(challenge_id: &str, from: &str, to: &str) -> Self {
        SessionContext {
            challenge_id: challenge_id.to_string(),
            player: to.to_string(),
            opponent: from.to_string(),
            role: Role::Challenged,
        }
    }

    pub fn moves_first(&self) -> bool {
        self.role == Role::Challenger
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Opponent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Placement,
    WaitingReady,
    InPlay,
    Won(Winner),
}

/// What happened to a shot, as resolved by the board it landed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveOutcome {
    pub outcome: ShotOutcome,
    pub fleet_sunk: bool,
}

/// Result of a placement-phase cell selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementStep {
    /// First click: the start cell is pending, the end cell comes next.
    StartSelected,
    /// The current ship was placed; the named ship is up next.
    Placed { next_ship: &'static str },
    /// The whole catalog is placed; the session moved to WaitingReady.
    FleetPlaced,
    /// Invalid placement; the pending selection was cleared, pick a fresh
    /// start cell.
    Rejected,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// Per-client session and turn state machine:
//
//   Placement -> WaitingReady -> InPlay -> Won
//
// Each client is authoritative only for its own grid. An outgoing shot stays
// in flight until the opponent resolves it against their grid and the result
// comes back; an incoming shot is resolved here and the outcome handed back
// for publication. The turn flips when a shot resolves, strictly alternating
// from player one onward.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone)]
pub struct GameSession {
    context: SessionContext,
    phase: Phase,
    ship_index: usize,
    pending_start: Option<Coord>,
    own_board: Board,
    opponent_view: Board,
    my_turn: bool,
    shot_in_flight: Option<Coord>,
}

impl GameSession {
    pub fn new(context: SessionContext) -> Self {
        let my_turn = context.moves_first();
        info!(
            "session {} starts: {} vs {}",
            context.challenge_id, context.player, context.opponent
        );
        GameSession {
            context,
            phase: Phase::Placement,
            ship_index: 0,
            pending_start: None,
            own_board: Board::new(),
            opponent_view: Board::new(),
            my_turn,
            shot_in_flight: None,
        }
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn own_board(&self) -> &Board {
        &self.own_board
    }

    /// The locally tracked view of the opponent grid: all water until shot
    /// results come back as hits and misses.
    pub fn opponent_view(&self) -> &Board {
        &self.opponent_view
    }

    pub fn my_turn(&self) -> bool {
        self.my_turn
    }

    /// The ship currently being placed, if any are left.
    pub fn current_ship(&self) -> Option<(&'static str, usize)> {
        SHIP_CATALOG.get(self.ship_index).copied()
    }

    /// Placement-phase cell selection: the first click picks the start cell,
    /// the second attempts the placement. A rejected placement clears the
    /// pending selection and the player starts over from a fresh start cell;
    /// the reason is not surfaced.
    pub fn select_cell(&mut self, coord: Coord) -> Result<PlacementStep, ValidationError> {
        if self.phase != Phase::Placement {
            return Err(ValidationError::WrongPhase);
        }
        let Some(start) = self.pending_start else {
            self.pending_start = Some(coord);
            return Ok(PlacementStep::StartSelected);
        };
        let (ship, length) = SHIP_CATALOG[self.ship_index];
        self.pending_start = None;
        match self.own_board.place_ship(start, coord, length) {
            Ok(()) => {
                debug!("{} placed {}", self.context.player, ship);
                self.ship_index += 1;
                match self.current_ship() {
                    Some((next_ship, _)) => Ok(PlacementStep::Placed { next_ship }),
                    None => {
                        self.phase = Phase::WaitingReady;
                        Ok(PlacementStep::FleetPlaced)
                    }
                }
            }
            Err(_) => Ok(PlacementStep::Rejected),
        }
    }

    /// Local ready confirmation once the fleet is placed.
    pub fn ready(&mut self) -> Result<(), ValidationError> {
        if self.phase != Phase::WaitingReady {
            return Err(ValidationError::WrongPhase);
        }
        self.phase = Phase::InPlay;
        info!("{} is ready", self.context.player);
        Ok(())
    }

    fn require_in_play(&self) -> Result<(), ValidationError> {
        match self.phase {
            Phase::InPlay => Ok(()),
            Phase::Won(_) => Err(ValidationError::GameOver),
            _ => Err(ValidationError::WrongPhase),
        }
    }

    /// Aim an outgoing shot. The shot stays in flight until the opponent's
    /// resolution is recorded; cells already resolved on the opponent view
    /// are rejected without consuming the turn.
    pub fn fire(&mut self, coord: Coord) -> Result<(), ValidationError> {
        self.require_in_play()?;
        if !self.my_turn {
            return Err(ValidationError::NotYourTurn);
        }
        if self.shot_in_flight.is_some() {
            return Err(ValidationError::ShotPending);
        }
        match self.opponent_view.cell(coord) {
            None => return Err(ValidationError::OutOfBounds),
            Some(Cell::Hit) | Some(Cell::Miss) => return Err(ValidationError::CellAlreadyResolved),
            Some(_) => {}
        }
        debug!("{} fires at ({},{})", self.context.player, coord.row, coord.col);
        self.shot_in_flight = Some(coord);
        Ok(())
    }

    /// Apply the opponent's resolution of the shot in flight. Flips the turn
    /// and ends the game when the opponent's fleet is gone.
    pub fn record_shot_result(
        &mut self,
        coord: Coord,
        result: MoveOutcome,
    ) -> Result<(), ValidationError> {
        self.require_in_play()?;
        if self.shot_in_flight != Some(coord) {
            return Err(ValidationError::WrongPhase);
        }
        self.shot_in_flight = None;
        self.opponent_view.mark(coord, result.outcome);
        self.my_turn = false;
        if result.fleet_sunk {
            info!("{} wins the match", self.context.player);
            self.phase = Phase::Won(Winner::Local);
        }
        Ok(())
    }

    /// Resolve an incoming opponent shot against the local grid. Returns the
    /// outcome for publication back to the attacker.
    pub fn opponent_fire(&mut self, coord: Coord) -> Result<MoveOutcome, ValidationError> {
        self.require_in_play()?;
        if self.my_turn {
            return Err(ValidationError::NotYourTurn);
        }
        let outcome = self.own_board.strike(coord)?;
        self.my_turn = true;
        let fleet_sunk = self.own_board.all_ships_sunk();
        if fleet_sunk {
            info!("{} loses the match", self.context.player);
            self.phase = Phase::Won(Winner::Opponent);
        }
        Ok(MoveOutcome { outcome, fleet_sunk })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A legal layout for the whole catalog, one (start, end) pair per ship.
    const LAYOUT: [((usize, usize), (usize, usize)); 6] = [
        ((0, 0), (0, 3)),
        ((2, 0), (2, 2)),
        ((4, 0), (4, 1)),
        ((6, 0), (6, 1)),
        ((8, 0), (8, 0)),
        ((0, 9), (0, 9)),
    ];

    fn place_fleet(session: &mut GameSession) {
        for (start, end) in LAYOUT {
            session.select_cell(Coord::new(start.0, start.1)).unwrap();
            session.select_cell(Coord::new(end.0, end.1)).unwrap();
        }
    }

    fn in_play_pair() -> (GameSession, GameSession) {
        let mut alice =
            GameSession::new(SessionContext::for_challenger("c1", "alice", "bob"));
        let mut bob = GameSession::new(SessionContext::for_acceptor("c1", "alice", "bob"));
        place_fleet(&mut alice);
        place_fleet(&mut bob);
        alice.ready().unwrap();
        bob.ready().unwrap();
        (alice, bob)
    }

    // One full shot round-trip: attacker fires, defender resolves, attacker
    // records the result.
    fn exchange(attacker: &mut GameSession, defender: &mut GameSession, coord: Coord) -> MoveOutcome {
        attacker.fire(coord).unwrap();
        let result = defender.opponent_fire(coord).unwrap();
        attacker.record_shot_result(coord, result).unwrap();
        result
    }

    #[test]
    fn placement_walks_the_catalog_in_order() {
        let mut session =
            GameSession::new(SessionContext::for_challenger("c1", "alice", "bob"));
        assert_eq!(session.current_ship(), Some(("Carrier", 4)));

        assert_eq!(session.select_cell(Coord::new(0, 0)).unwrap(), PlacementStep::StartSelected);
        assert_eq!(
            session.select_cell(Coord::new(0, 3)).unwrap(),
            PlacementStep::Placed { next_ship: "Battleship" }
        );

        // A bad second click clears the pending selection; the next click is
        // a fresh start cell.
        assert_eq!(session.select_cell(Coord::new(1, 0)).unwrap(), PlacementStep::StartSelected);
        assert_eq!(session.select_cell(Coord::new(1, 2)).unwrap(), PlacementStep::Rejected);
        assert_eq!(session.current_ship(), Some(("Battleship", 3)));
        assert_eq!(session.select_cell(Coord::new(2, 0)).unwrap(), PlacementStep::StartSelected);

        assert_eq!(session.phase(), Phase::Placement);
    }

    #[test]
    fn full_placement_reaches_waiting_ready_then_in_play() {
        let mut session =
            GameSession::new(SessionContext::for_challenger("c1", "alice", "bob"));
        assert_eq!(session.ready(), Err(ValidationError::WrongPhase));
        place_fleet(&mut session);
        assert_eq!(session.phase(), Phase::WaitingReady);
        assert_eq!(session.select_cell(Coord::new(0, 5)), Err(ValidationError::WrongPhase));
        session.ready().unwrap();
        assert_eq!(session.phase(), Phase::InPlay);
    }

    #[test]
    fn turns_alternate_strictly_from_player_one() {
        let (mut alice, mut bob) = in_play_pair();
        assert!(alice.my_turn());
        assert!(!bob.my_turn());

        // Bob cannot jump the queue, and Alice cannot double-fire.
        assert_eq!(bob.fire(Coord::new(9, 9)), Err(ValidationError::NotYourTurn));
        alice.fire(Coord::new(9, 9)).unwrap();
        assert_eq!(alice.fire(Coord::new(9, 8)), Err(ValidationError::ShotPending));

        let result = bob.opponent_fire(Coord::new(9, 9)).unwrap();
        assert_eq!(result.outcome, ShotOutcome::Miss);
        alice.record_shot_result(Coord::new(9, 9), result).unwrap();
        assert!(!alice.my_turn());
        assert!(bob.my_turn());

        exchange(&mut bob, &mut alice, Coord::new(9, 9));
        assert!(alice.my_turn());
    }

    #[test]
    fn resolved_cells_cannot_be_attacked_again() {
        let (mut alice, mut bob) = in_play_pair();
        exchange(&mut alice, &mut bob, Coord::new(9, 9));
        exchange(&mut bob, &mut alice, Coord::new(9, 9));

        // Alice already saw (9,9) resolve to a miss; the guard refuses the
        // repeat without consuming her turn.
        assert_eq!(alice.fire(Coord::new(9, 9)), Err(ValidationError::CellAlreadyResolved));
        assert!(alice.my_turn());
        alice.fire(Coord::new(9, 8)).unwrap();
    }

    #[test]
    fn sinking_the_last_ship_wins_and_ends_the_match() {
        let (mut alice, mut bob) = in_play_pair();

        // Alice knows Bob's layout in this test; Bob wastes his turns on
        // empty water (rows 7 and 9 hold no ships in LAYOUT).
        let targets = bob.own_board().ship_cells();
        let mut wasted = (0..10)
            .map(|col| Coord::new(9, col))
            .chain((3..10).map(|col| Coord::new(7, col)));
        for (n, target) in targets.iter().enumerate() {
            let result = exchange(&mut alice, &mut bob, *target);
            assert_eq!(result.outcome, ShotOutcome::Hit);
            let last = n == targets.len() - 1;
            assert_eq!(result.fleet_sunk, last);
            if !last {
                exchange(&mut bob, &mut alice, wasted.next().unwrap());
            }
        }

        assert_eq!(alice.phase(), Phase::Won(Winner::Local));
        assert_eq!(bob.phase(), Phase::Won(Winner::Opponent));

        // Terminal: no further moves on either side.
        assert_eq!(alice.fire(Coord::new(5, 5)), Err(ValidationError::GameOver));
        assert_eq!(bob.fire(Coord::new(5, 5)), Err(ValidationError::GameOver));
        assert_eq!(bob.opponent_fire(Coord::new(5, 5)), Err(ValidationError::GameOver));
    }
}
