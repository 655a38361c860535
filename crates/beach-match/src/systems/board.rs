use crate::components::{PieceKind, MIN_MATCH};
use crate::grid::{Cell, Grid, Tile, TileId};

/// Seedable pseudo-random number generator (xorshift64).
/// Deterministic, fast, no-std compatible.
#[derive(Debug, Clone)]
pub struct Rng {
    state: u64,
}

impl Rng {
    pub fn new(seed: u64) -> Self {
        // Avoid zero state
        Rng {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Generate next u64 using xorshift64.
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Generate a random number in [0, upper_bound).
    pub fn next_int(&mut self, upper_bound: u32) -> u32 {
        if upper_bound == 0 {
            return 0;
        }
        (self.next_u64() % upper_bound as u64) as u32
    }

    /// Uniform float in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// True with probability `p`.
    pub fn chance(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}

/// The board plus the randomness and id allocation needed to create tiles.
#[derive(Debug, Clone)]
pub struct GameBoard {
    pub grid: Grid,
    pub rng: Rng,
    next_id: u32,
}

impl GameBoard {
    /// Create a freshly generated board with no runs on it.
    pub fn new(rows: usize, cols: usize, seed: u64) -> Self {
        let mut board = GameBoard {
            grid: Grid::new(rows, cols),
            rng: Rng::new(seed),
            next_id: 0,
        };
        board.reset_table();
        board
    }

    pub fn rows(&self) -> usize {
        self.grid.rows
    }

    pub fn cols(&self) -> usize {
        self.grid.cols
    }

    /// Allocate a new tile of `kind`. Position is assigned when placed.
    pub fn spawn_tile(&mut self, kind: PieceKind) -> Tile {
        let id = TileId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        Tile::new(id, kind)
    }

    /// Uniform draw over the spawnable kinds.
    pub fn random_kind(&mut self) -> PieceKind {
        let kinds = PieceKind::SPAWNABLE;
        kinds[self.rng.next_int(kinds.len() as u32) as usize]
    }

    /// Refill every cell. Each kind is drawn from the kinds that would not
    /// complete a run with the two cells to the left or the two above, so
    /// the result never contains a match.
    pub fn reset_table(&mut self) {
        for row in 0..self.rows() {
            for col in 0..self.cols() {
                let cell = Cell::new(row, col);
                let kind = self.kind_without_run(cell);
                let tile = self.spawn_tile(kind);
                self.grid.set(cell, Some(tile));
            }
        }
    }

    fn kind_without_run(&mut self, cell: Cell) -> PieceKind {
        let completes = |grid: &Grid, kind: PieceKind| {
            let span = MIN_MATCH - 1;
            let left = cell.col >= span
                && (1..=span).all(|d| grid.kind_at(Cell::new(cell.row, cell.col - d)) == Some(kind));
            let up = cell.row >= span
                && (1..=span).all(|d| grid.kind_at(Cell::new(cell.row - d, cell.col)) == Some(kind));
            left || up
        };

        let allowed: Vec<PieceKind> = PieceKind::SPAWNABLE
            .into_iter()
            .filter(|&k| !completes(&self.grid, k))
            .collect();
        // At most two kinds are excluded, so `allowed` is never empty.
        allowed[self.rng.next_int(allowed.len() as u32) as usize]
    }

    /// Clear the given cells. Returns the tiles that were removed.
    pub fn remove_cells(&mut self, cells: &[Cell]) -> Vec<Tile> {
        cells.iter().filter_map(|&c| self.grid.take(c)).collect()
    }

    /// Compact each column toward the bottom row preserving order, then
    /// refill the vacated top cells with fresh random tiles.
    /// Returns the number of tiles spawned.
    pub fn apply_gravity(&mut self) -> usize {
        let rows = self.rows();
        let mut spawned = 0;
        for col in 0..self.cols() {
            // Survivors collected bottom-up
            let mut survivors: Vec<Tile> = Vec::with_capacity(rows);
            for row in (0..rows).rev() {
                if let Some(tile) = self.grid.take(Cell::new(row, col)) {
                    survivors.push(tile);
                }
            }

            let num_new = rows - survivors.len();
            for (i, tile) in survivors.into_iter().enumerate() {
                self.grid.set(Cell::new(rows - 1 - i, col), Some(tile));
            }

            for row in 0..num_new {
                let kind = self.random_kind();
                let tile = self.spawn_tile(kind);
                self.grid.set(Cell::new(row, col), Some(tile));
            }
            spawned += num_new;
        }
        spawned
    }

    /// Fisher-Yates permutation of the existing tiles over the same set of
    /// occupied cells. Does not check that the result has a legal move.
    pub fn shuffle(&mut self) {
        let occupied: Vec<Cell> = self
            .grid
            .cells()
            .filter(|&c| self.grid.get(c).is_some())
            .collect();
        let mut tiles: Vec<Tile> = occupied.iter().filter_map(|&c| self.grid.take(c)).collect();

        for i in (1..tiles.len()).rev() {
            let j = self.rng.next_int(i as u32 + 1) as usize;
            tiles.swap(i, j);
        }

        for (cell, tile) in occupied.into_iter().zip(tiles) {
            self.grid.set(cell, Some(tile));
        }
    }

    /// Build a board from a text layout. One char per cell:
    /// `B` beach ball, `M` microphone, `R` rocket, `P` palm tree, `O` boat,
    /// `W` wave, `.` empty.
    #[cfg(test)]
    pub(crate) fn from_layout(layout: &[&str], seed: u64) -> Self {
        let rows = layout.len();
        let cols = layout.first().map_or(0, |r| r.len());
        let mut board = GameBoard {
            grid: Grid::new(rows, cols),
            rng: Rng::new(seed),
            next_id: 0,
        };
        for (row, line) in layout.iter().enumerate() {
            for (col, ch) in line.chars().enumerate() {
                let kind = match ch {
                    'B' => PieceKind::BeachBall,
                    'M' => PieceKind::Microphone,
                    'R' => PieceKind::Rocket,
                    'P' => PieceKind::PalmTree,
                    'O' => PieceKind::Boat,
                    'W' => PieceKind::Wave,
                    _ => continue,
                };
                let tile = board.spawn_tile(kind);
                board.grid.set(Cell::new(row, col), Some(tile));
            }
        }
        board
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::matching::find_matches;

    fn kind_counts(grid: &Grid) -> [usize; 6] {
        let mut counts = [0; 6];
        for t in grid.tiles() {
            counts[t.kind as usize] += 1;
        }
        counts
    }

    #[test]
    fn rng_deterministic() {
        let mut a = Rng::new(42);
        let mut b = Rng::new(42);
        for _ in 0..100 {
            assert_eq!(a.next_int(100), b.next_int(100));
        }
    }

    #[test]
    fn rng_float_range() {
        let mut rng = Rng::new(7);
        for _ in 0..1000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v));
        }
        assert!(!rng.chance(0.0));
        assert!(rng.chance(1.0));
    }

    #[test]
    fn fresh_boards_have_no_matches() {
        for seed in 1..200 {
            let board = GameBoard::new(8, 8, seed);
            assert!(find_matches(&board.grid).is_empty(), "seed {} produced a run", seed);
            assert_eq!(board.grid.occupied_count(), 64);
            assert!(board.grid.positions_consistent());
        }
    }

    #[test]
    fn fresh_boards_never_spawn_waves() {
        let board = GameBoard::new(8, 8, 99);
        assert!(board.grid.tiles().all(|t| t.kind != PieceKind::Wave));
    }

    #[test]
    fn ids_are_unique() {
        let board = GameBoard::new(8, 8, 5);
        let mut ids: Vec<_> = board.grid.tiles().map(|t| t.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 64);
    }

    #[test]
    fn gravity_compacts_and_refills() {
        let mut board = GameBoard::from_layout(&["BMR", "PBO", "RMB"], 3);
        let top_id = board.grid.get(Cell::new(0, 1)).unwrap().id;
        board.remove_cells(&[Cell::new(1, 1), Cell::new(2, 1)]);

        let spawned = board.apply_gravity();
        assert_eq!(spawned, 2);

        // The old top tile of column 1 fell to the bottom row.
        assert_eq!(board.grid.get(Cell::new(2, 1)).unwrap().id, top_id);
        assert_eq!(board.grid.occupied_count(), 9);
        assert!(board.grid.positions_consistent());
    }

    #[test]
    fn gravity_keeps_empty_cells_above_tiles() {
        let mut board = GameBoard::from_layout(&["BM", "..", "RO", ".."], 1);
        let ids_before: Vec<_> = [Cell::new(0, 0), Cell::new(2, 0)]
            .iter()
            .map(|&c| board.grid.get(c).unwrap().id)
            .collect();
        board.apply_gravity();
        // Relative order within the column is preserved.
        assert_eq!(board.grid.get(Cell::new(2, 0)).unwrap().id, ids_before[0]);
        assert_eq!(board.grid.get(Cell::new(3, 0)).unwrap().id, ids_before[1]);
    }

    #[test]
    fn shuffle_preserves_kind_multiset_and_pattern() {
        let mut board = GameBoard::from_layout(&["BMR.", "PBOM", ".MBR"], 11);
        let before = kind_counts(&board.grid);
        let occupied_before: Vec<Cell> = board
            .grid
            .cells()
            .filter(|&c| board.grid.get(c).is_some())
            .collect();

        board.shuffle();

        assert_eq!(kind_counts(&board.grid), before);
        let occupied_after: Vec<Cell> = board
            .grid
            .cells()
            .filter(|&c| board.grid.get(c).is_some())
            .collect();
        assert_eq!(occupied_before, occupied_after);
        assert!(board.grid.positions_consistent());
    }
}
