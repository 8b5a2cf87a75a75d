use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

pub const BOARD_SIZE: usize = 10;

/// The fixed fleet, consumed strictly in this order during placement.
pub const SHIP_CATALOG: [(&str, usize); 6] = [
    ("Carrier", 4),
    ("Battleship", 3),
    ("Cruiser1", 2),
    ("Cruiser2", 2),
    ("Submarine", 1),
    ("Destroyer", 1),
];

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Water,
    Ship,
    Hit,
    Miss,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Coord { row, col }
    }

    fn in_bounds(&self) -> bool {
        self.row < BOARD_SIZE && self.col < BOARD_SIZE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShotOutcome {
    Hit,
    Miss,
}

///////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// One player's 10x10 grid. During placement the owner marks Ship cells under
// the no-touching rule; during play incoming shots resolve Water to Miss and
// Ship to Hit. Cells that already resolved reject another shot instead of
// burning the attacker's turn.
///////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Board {
    cells: [[Cell; BOARD_SIZE]; BOARD_SIZE],
}

impl Default for Board {
    fn default() -> Self {
        Board { cells: [[Cell::Water; BOARD_SIZE]; BOARD_SIZE] }
    }
}

impl Board {
    pub fn new() -> Self {
        Board::default()
    }

    pub fn cell(&self, coord: Coord) -> Option<Cell> {
        if coord.in_bounds() {
            Some(self.cells[coord.row][coord.col])
        } else {
            None
        }
    }

    // Out of bounds counts as water: no ship can sit outside the grid.
    fn water_at(&self, row: isize, col: isize) -> bool {
        if row < 0 || col < 0 || row as usize >= BOARD_SIZE || col as usize >= BOARD_SIZE {
            return true;
        }
        self.cells[row as usize][col as usize] == Cell::Water
    }

    // No-touching rule, checked per span cell: all four orthogonal
    // neighbours must read as water. Neighbours inside the span itself are
    // still water at this point because the ship has not been marked yet.
    fn clear_around(&self, span: &[Coord]) -> bool {
        span.iter().all(|coord| {
            let (row, col) = (coord.row as isize, coord.col as isize);
            self.water_at(row - 1, col)
                && self.water_at(row + 1, col)
                && self.water_at(row, col - 1)
                && self.water_at(row, col + 1)
        })
    }

    /// Place a ship of the given length between two selected cells. For
    /// length-1 ships only the start cell matters. On success every span
    /// cell is marked Ship; on failure the board is untouched and the caller
    /// resets its pending selection.
    pub fn place_ship(&mut self, start: Coord, end: Coord, length: usize) -> Result<(), ValidationError> {
        if !start.in_bounds() || !end.in_bounds() {
            return Err(ValidationError::OutOfBounds);
        }

        if length == 1 {
            if self.cells[start.row][start.col] != Cell::Water {
                return Err(ValidationError::Occupied);
            }
            if !self.clear_around(&[start]) {
                return Err(ValidationError::TouchingShip);
            }
            self.cells[start.row][start.col] = Cell::Ship;
            return Ok(());
        }

        let horizontal = start.row == end.row;
        let vertical = start.col == end.col;
        if !horizontal && !vertical {
            return Err(ValidationError::NotAligned);
        }

        let span: Vec<Coord> = if horizontal {
            let (lo, hi) = (start.col.min(end.col), start.col.max(end.col));
            (lo..=hi).map(|col| Coord::new(start.row, col)).collect()
        } else {
            let (lo, hi) = (start.row.min(end.row), start.row.max(end.row));
            (lo..=hi).map(|row| Coord::new(row, start.col)).collect()
        };

        if span.len() != length {
            return Err(ValidationError::WrongLength { want: length, got: span.len() });
        }
        if span.iter().any(|c| self.cells[c.row][c.col] != Cell::Water) {
            return Err(ValidationError::Occupied);
        }
        if !self.clear_around(&span) {
            return Err(ValidationError::TouchingShip);
        }

        for coord in span {
            self.cells[coord.row][coord.col] = Cell::Ship;
        }
        Ok(())
    }

    /// Resolve an incoming shot on this board.
    pub fn strike(&mut self, coord: Coord) -> Result<ShotOutcome, ValidationError> {
        if !coord.in_bounds() {
            return Err(ValidationError::OutOfBounds);
        }
        match self.cells[coord.row][coord.col] {
            Cell::Water => {
                self.cells[coord.row][coord.col] = Cell::Miss;
                Ok(ShotOutcome::Miss)
            }
            Cell::Ship => {
                self.cells[coord.row][coord.col] = Cell::Hit;
                Ok(ShotOutcome::Hit)
            }
            Cell::Hit | Cell::Miss => Err(ValidationError::CellAlreadyResolved),
        }
    }

    /// Record the resolution of an outgoing shot on the view kept of the
    /// opponent's grid.
    pub fn mark(&mut self, coord: Coord, outcome: ShotOutcome) {
        if coord.in_bounds() {
            self.cells[coord.row][coord.col] = match outcome {
                ShotOutcome::Hit => Cell::Hit,
                ShotOutcome::Miss => Cell::Miss,
            };
        }
    }

    /// True once no Ship cell is left anywhere on the grid.
    pub fn all_ships_sunk(&self) -> bool {
        self.cells.iter().flatten().all(|cell| *cell != Cell::Ship)
    }

    /// Coordinates of the remaining Ship cells.
    pub fn ship_cells(&self) -> Vec<Coord> {
        let mut cells = Vec::new();
        for (row, cols) in self.cells.iter().enumerate() {
            for (col, cell) in cols.iter().enumerate() {
                if *cell == Cell::Ship {
                    cells.push(Coord::new(row, col));
                }
            }
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carrier_along_the_top_row_fits() {
        let mut board = Board::new();
        board.place_ship(Coord::new(0, 0), Coord::new(0, 3), 4).unwrap();
        for col in 0..4 {
            assert_eq!(board.cell(Coord::new(0, col)), Some(Cell::Ship));
        }
    }

    #[test]
    fn placements_touching_an_existing_ship_are_rejected() {
        let mut board = Board::new();
        board.place_ship(Coord::new(0, 0), Coord::new(0, 3), 4).unwrap();

        // Directly off the bow.
        assert_eq!(
            board.place_ship(Coord::new(0, 4), Coord::new(0, 4), 1),
            Err(ValidationError::TouchingShip)
        );
        // The whole row below is adjacent.
        assert_eq!(
            board.place_ship(Coord::new(1, 0), Coord::new(1, 3), 4),
            Err(ValidationError::TouchingShip)
        );
    }

    #[test]
    fn length_one_ships_respect_the_no_touching_rule() {
        let mut board = Board::new();
        board.place_ship(Coord::new(5, 6), Coord::new(5, 6), 1).unwrap();
        assert_eq!(
            board.place_ship(Coord::new(5, 5), Coord::new(5, 5), 1),
            Err(ValidationError::TouchingShip)
        );
        // A corner with all-water neighbours is fine; out of bounds counts
        // as water.
        board.place_ship(Coord::new(9, 9), Coord::new(9, 9), 1).unwrap();
    }

    #[test]
    fn diagonal_and_wrong_length_spans_are_rejected() {
        let mut board = Board::new();
        assert_eq!(
            board.place_ship(Coord::new(0, 0), Coord::new(1, 1), 2),
            Err(ValidationError::NotAligned)
        );
        assert_eq!(
            board.place_ship(Coord::new(0, 0), Coord::new(0, 2), 2),
            Err(ValidationError::WrongLength { want: 2, got: 3 })
        );
    }

    #[test]
    fn overlapping_spans_are_rejected() {
        let mut board = Board::new();
        board.place_ship(Coord::new(4, 2), Coord::new(4, 5), 4).unwrap();
        assert_eq!(
            board.place_ship(Coord::new(3, 4), Coord::new(5, 4), 3),
            Err(ValidationError::Occupied)
        );
    }

    #[test]
    fn strikes_resolve_water_and_ship_and_refuse_repeats() {
        let mut board = Board::new();
        board.place_ship(Coord::new(2, 2), Coord::new(2, 3), 2).unwrap();

        assert_eq!(board.strike(Coord::new(0, 0)), Ok(ShotOutcome::Miss));
        assert_eq!(board.strike(Coord::new(2, 2)), Ok(ShotOutcome::Hit));
        assert_eq!(board.strike(Coord::new(2, 2)), Err(ValidationError::CellAlreadyResolved));
        assert_eq!(board.strike(Coord::new(0, 0)), Err(ValidationError::CellAlreadyResolved));

        assert!(!board.all_ships_sunk());
        assert_eq!(board.strike(Coord::new(2, 3)), Ok(ShotOutcome::Hit));
        assert!(board.all_ships_sunk());
    }
}
