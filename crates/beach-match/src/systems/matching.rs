use glam::IVec2;

use crate::components::{MatchShape, Orientation, PieceKind, BASE_MATCH_SCORE, MIN_MATCH};
use crate::grid::{Cell, Grid, Tile};

/// A run of at least `MIN_MATCH` same-kind tiles found in one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct Match {
    pub tiles: Vec<Tile>,
    pub orientation: Orientation,
    pub score: u32,
}

impl Match {
    fn new(tiles: Vec<Tile>, orientation: Orientation) -> Self {
        let score = match_score(tiles.len());
        Match {
            tiles,
            orientation,
            score,
        }
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn kind(&self) -> Option<PieceKind> {
        self.tiles.first().map(|t| t.kind)
    }

    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.tiles.iter().map(Tile::cell)
    }
}

/// Linear score: 3 -> 50, 4 -> 100, 5 -> 150.
pub fn match_score(len: usize) -> u32 {
    if len < MIN_MATCH {
        return 0;
    }
    BASE_MATCH_SCORE * (len as u32 - 2)
}

/// Accumulates one run during a line scan.
struct RunScanner {
    orientation: Orientation,
    run: Vec<Tile>,
    found: Vec<Match>,
}

impl RunScanner {
    fn new(orientation: Orientation) -> Self {
        RunScanner {
            orientation,
            run: Vec::new(),
            found: Vec::new(),
        }
    }

    fn push(&mut self, tile: Tile) {
        let extends = self.run.last().is_some_and(|last| last.kind == tile.kind);
        if !extends {
            self.flush();
        }
        self.run.push(tile);
    }

    /// End the current run; emit it when long enough.
    fn flush(&mut self) {
        if self.run.len() >= MIN_MATCH {
            let tiles = std::mem::take(&mut self.run);
            self.found.push(Match::new(tiles, self.orientation));
        } else {
            self.run.clear();
        }
    }

    fn finish(mut self) -> Vec<Match> {
        self.flush();
        self.found
    }
}

/// Find every horizontal and vertical run of three or more.
///
/// Rows are scanned first. The column scan treats any tile already claimed
/// by a horizontal match as a break, so the crossing tile of a cross shape
/// belongs to exactly one match.
pub fn find_matches(grid: &Grid) -> Vec<Match> {
    let mut claimed = vec![false; grid.rows * grid.cols];
    let mut matches = Vec::new();

    for row in 0..grid.rows {
        let mut scanner = RunScanner::new(Orientation::Horizontal);
        for col in 0..grid.cols {
            match grid.get(Cell::new(row, col)) {
                Some(tile) => scanner.push(*tile),
                None => scanner.flush(),
            }
        }
        for m in scanner.finish() {
            for c in m.cells() {
                claimed[c.row * grid.cols + c.col] = true;
            }
            matches.push(m);
        }
    }

    for col in 0..grid.cols {
        let mut scanner = RunScanner::new(Orientation::Vertical);
        for row in 0..grid.rows {
            let tile = grid.get(Cell::new(row, col));
            match tile {
                Some(tile) if !claimed[row * grid.cols + col] => scanner.push(*tile),
                _ => scanner.flush(),
            }
        }
        matches.extend(scanner.finish());
    }

    matches
}

/// Length of the same-kind run through `cell` along `step`, split into the
/// counts before and after the cell.
fn run_through(grid: &Grid, cell: Cell, kind: PieceKind, step: IVec2) -> (usize, usize) {
    let count = |dir: IVec2| {
        let mut n = 0;
        let mut cur = cell;
        while let Some(next) = cur.offset(dir, grid.rows, grid.cols) {
            if grid.kind_at(next) != Some(kind) {
                break;
            }
            n += 1;
            cur = next;
        }
        n
    };
    (count(-step), count(step))
}

/// Classify a match as a straight line or an L/T. For L/T the crossing
/// cell is returned too.
///
/// Only horizontal matches can cross: a vertical run through a horizontal
/// match would have been cut at the claimed tile.
pub fn classify_shape(grid: &Grid, m: &Match) -> (MatchShape, Option<Cell>) {
    if m.orientation == Orientation::Vertical {
        return (MatchShape::Line, None);
    }
    let last = m.len().saturating_sub(1);
    for (i, tile) in m.tiles.iter().enumerate() {
        let (above, below) = run_through(grid, tile.cell(), tile.kind, IVec2::Y);
        if above + below + 1 < MIN_MATCH {
            continue;
        }
        let at_row_end = i == 0 || i == last;
        let at_col_end = above == 0 || below == 0;
        let shape = if at_row_end && at_col_end {
            MatchShape::LShape
        } else {
            MatchShape::TShape
        };
        return (shape, Some(tile.cell()));
    }
    (MatchShape::Line, None)
}

/// True iff `a` and `b` are in range, adjacent, both occupied, and
/// exchanging them produces at least one match.
pub fn can_swap(grid: &Grid, a: Cell, b: Cell) -> bool {
    if !a.is_adjacent(b) || grid.get(a).is_none() || grid.get(b).is_none() {
        return false;
    }
    let mut scratch = grid.clone();
    scratch.swap(a, b);
    !find_matches(&scratch).is_empty()
}

/// True when any legal swap exists. Each adjacent pair is tried once, from
/// its upper/left endpoint.
pub fn has_valid_moves(grid: &Grid) -> bool {
    for row in 0..grid.rows {
        for col in 0..grid.cols {
            let cell = Cell::new(row, col);
            if col + 1 < grid.cols && can_swap(grid, cell, Cell::new(row, col + 1)) {
                return true;
            }
            if row + 1 < grid.rows && can_swap(grid, cell, Cell::new(row + 1, col)) {
                return true;
            }
        }
    }
    false
}

/// First legal swap in row-major order, trying up, down, left, right.
/// Used for hints.
pub fn find_possible_move(grid: &Grid) -> Option<(Cell, Cell)> {
    const DIRECTIONS: [IVec2; 4] = [IVec2::NEG_Y, IVec2::Y, IVec2::NEG_X, IVec2::X];
    for cell in grid.cells() {
        if grid.get(cell).is_none() {
            continue;
        }
        for dir in DIRECTIONS {
            if let Some(other) = cell.offset(dir, grid.rows, grid.cols) {
                if can_swap(grid, cell, other) {
                    return Some((cell, other));
                }
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::board::GameBoard;

    fn grid(layout: &[&str]) -> Grid {
        GameBoard::from_layout(layout, 1).grid
    }

    #[test]
    fn score_is_linear_in_length() {
        assert_eq!(match_score(2), 0);
        assert_eq!(match_score(3), 50);
        assert_eq!(match_score(4), 100);
        assert_eq!(match_score(5), 150);
    }

    #[test]
    fn finds_horizontal_run() {
        let g = grid(&["BRRRM", "MBMBP", "PMBPB"]);
        let matches = find_matches(&g);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].orientation, Orientation::Horizontal);
        assert_eq!(matches[0].len(), 3);
        assert_eq!(matches[0].score, 50);
        let cols: Vec<usize> = matches[0].cells().map(|c| c.col).collect();
        assert_eq!(cols, vec![1, 2, 3]);
    }

    #[test]
    fn finds_vertical_run() {
        let g = grid(&["BMP", "BRM", "BMP", "OPM"]);
        let matches = find_matches(&g);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].orientation, Orientation::Vertical);
        assert_eq!(matches[0].kind(), Some(PieceKind::BeachBall));
    }

    #[test]
    fn full_width_run_is_one_match() {
        let g = grid(&["RRRRRRRR", "BMPOBMPO"]);
        let matches = find_matches(&g);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].len(), 8);
        assert_eq!(matches[0].score, 300);
    }

    #[test]
    fn pairs_and_gaps_do_not_match() {
        let g = grid(&["RR.RR", "BB.BB", "MMOMM"]);
        assert!(find_matches(&g).is_empty());
    }

    #[test]
    fn cross_tile_counted_once() {
        // Plus sign of rockets centred on (1,1): vertical arm above and
        // below the claimed centre is only one tile each, so no vertical.
        let g = grid(&["BRM", "RRR", "MRB"]);
        let matches = find_matches(&g);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].orientation, Orientation::Horizontal);
    }

    #[test]
    fn long_vertical_survives_claimed_crossing() {
        // Column 1 has five rockets; row 0 claims the top one, leaving a
        // vertical run of four below it.
        let g = grid(&["RRR", "BRM", "MRB", "BRM", "MRB"]);
        let matches = find_matches(&g);
        assert_eq!(matches.len(), 2);
        let vertical = matches
            .iter()
            .find(|m| m.orientation == Orientation::Vertical)
            .unwrap();
        assert_eq!(vertical.len(), 4);
    }

    #[test]
    fn classifies_l_and_t() {
        let l = grid(&["RRR", "RBM", "RMB"]);
        let m = &find_matches(&l)[0];
        assert_eq!(classify_shape(&l, m), (MatchShape::LShape, Some(Cell::new(0, 0))));

        let t = grid(&["RRR", "BRM", "MRB"]);
        let m = &find_matches(&t)[0];
        assert_eq!(classify_shape(&t, m), (MatchShape::TShape, Some(Cell::new(0, 1))));

        let line = grid(&["RRR", "BMP", "MPB"]);
        let m = &find_matches(&line)[0];
        assert_eq!(classify_shape(&line, m), (MatchShape::Line, None));
    }

    #[test]
    fn swap_requires_adjacency_and_match() {
        let g = grid(&["RBRR", "MPOM", "BMPB"]);
        assert!(can_swap(&g, Cell::new(0, 0), Cell::new(0, 1)));
        // Not adjacent
        assert!(!can_swap(&g, Cell::new(0, 0), Cell::new(0, 2)));
        // Adjacent but no resulting run
        assert!(!can_swap(&g, Cell::new(1, 0), Cell::new(2, 0)));
        // Out of range
        assert!(!can_swap(&g, Cell::new(0, 3), Cell::new(0, 4)));
    }

    #[test]
    fn swap_legality_is_symmetric() {
        for seed in 1..20 {
            let board = GameBoard::new(8, 8, seed);
            for cell in board.grid.cells() {
                for other in [Cell::new(cell.row, cell.col + 1), Cell::new(cell.row + 1, cell.col)] {
                    assert_eq!(
                        can_swap(&board.grid, cell, other),
                        can_swap(&board.grid, other, cell)
                    );
                }
            }
        }
    }

    #[test]
    fn swap_with_empty_cell_is_illegal() {
        let g = grid(&["RR.R", "BMPO"]);
        assert!(!can_swap(&g, Cell::new(0, 2), Cell::new(0, 3)));
    }

    #[test]
    fn deadlocked_board_has_no_moves() {
        let g = grid(&["BMRP", "RPBM", "BMRP", "RPBM"]);
        assert!(!has_valid_moves(&g));
        assert!(find_possible_move(&g).is_none());
    }

    #[test]
    fn possible_move_is_legal() {
        let g = grid(&["RBRR", "MPOM", "BMPB"]);
        assert!(has_valid_moves(&g));
        let (a, b) = find_possible_move(&g).unwrap();
        assert!(can_swap(&g, a, b));
    }

    #[test]
    fn scenario_swap_extends_rocket_run() {
        // Rockets at (2,3..=5). Dropping the rocket at (1,2) into (2,2)
        // extends the run to four.
        let layout = [
            "BMPOBMPO",
            "OPRBOPBM",
            "MBPRRRMB",
            "PMBOPBOM",
            "BOMPMOBP",
            "MPOBBPMO",
            "OBPMOMBP",
            "PMBOPBOM",
        ];
        let mut board = GameBoard::from_layout(&layout, 1);
        let matches = find_matches(&board.grid);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].len(), 3);
        assert_eq!(matches[0].score, 50);

        board.grid.swap(Cell::new(1, 2), Cell::new(2, 2));
        let matches = find_matches(&board.grid);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].len(), 4);
        assert_eq!(matches[0].score, 100);
    }
}
