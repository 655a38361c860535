use glam::IVec2;
use serde::Serialize;

use crate::components::{PieceKind, PowerUpKind};

/// Stable tile identity. Survives swaps, gravity and shuffles; a removed
/// tile's id is never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileId(pub u32);

/// A board coordinate. Row 0 is the top row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
}

impl Cell {
    pub const fn new(row: usize, col: usize) -> Self {
        Cell { row, col }
    }

    fn as_ivec(self) -> IVec2 {
        IVec2::new(self.col as i32, self.row as i32)
    }

    /// Manhattan distance between two cells.
    pub fn distance(self, other: Cell) -> u32 {
        let d = (self.as_ivec() - other.as_ivec()).abs();
        (d.x + d.y) as u32
    }

    /// True for 4-directional neighbours only.
    pub fn is_adjacent(self, other: Cell) -> bool {
        self.distance(other) == 1
    }

    /// Apply a (col, row) offset, returning `None` when it leaves a
    /// `rows` x `cols` board.
    pub fn offset(self, delta: IVec2, rows: usize, cols: usize) -> Option<Cell> {
        let p = self.as_ivec() + delta;
        if p.x < 0 || p.y < 0 || p.x as usize >= cols || p.y as usize >= rows {
            return None;
        }
        Some(Cell::new(p.y as usize, p.x as usize))
    }
}

/// A single piece on the board. `row`/`col` mirror the slot the tile sits
/// in and are rewritten by every `Grid` write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub id: TileId,
    pub kind: PieceKind,
    pub is_special: bool,
    pub power_up: Option<PowerUpKind>,
    pub row: usize,
    pub col: usize,
}

impl Tile {
    pub fn new(id: TileId, kind: PieceKind) -> Self {
        Tile {
            id,
            kind,
            is_special: false,
            power_up: None,
            row: 0,
            col: 0,
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.row, self.col)
    }

    /// Flag the tile as special carrying `power_up`.
    pub fn with_power_up(mut self, power_up: PowerUpKind) -> Self {
        self.is_special = true;
        self.power_up = Some(power_up);
        self
    }
}

/// The board matrix. Row-major flat storage: index = row * cols + col.
/// `None` means an empty cell.
///
/// Tiles are `Copy`, so cloning a grid for a scratch check is a single
/// small allocation. `generation` counts writes so observers can tell
/// whether anything changed without diffing cells.
#[derive(Debug, Clone)]
pub struct Grid {
    pub rows: usize,
    pub cols: usize,
    cells: Vec<Option<Tile>>,
    generation: u64,
}

impl Grid {
    pub fn new(rows: usize, cols: usize) -> Self {
        Grid {
            rows,
            cols,
            cells: vec![None; rows * cols],
            generation: 0,
        }
    }

    #[inline]
    fn idx(&self, cell: Cell) -> usize {
        cell.row * self.cols + cell.col
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.row < self.rows && cell.col < self.cols
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn get(&self, cell: Cell) -> Option<&Tile> {
        if !self.contains(cell) {
            return None;
        }
        self.cells[self.idx(cell)].as_ref()
    }

    pub fn kind_at(&self, cell: Cell) -> Option<PieceKind> {
        self.get(cell).map(|t| t.kind)
    }

    /// Write a tile (or clear the slot). The tile's position is rewritten
    /// to `cell`. Out-of-range writes are ignored.
    pub fn set(&mut self, cell: Cell, tile: Option<Tile>) {
        if !self.contains(cell) {
            return;
        }
        let i = self.idx(cell);
        self.cells[i] = tile.map(|mut t| {
            t.row = cell.row;
            t.col = cell.col;
            t
        });
        self.generation += 1;
    }

    /// Remove and return the tile at `cell`.
    pub fn take(&mut self, cell: Cell) -> Option<Tile> {
        if !self.contains(cell) {
            return None;
        }
        let i = self.idx(cell);
        let tile = self.cells[i].take();
        if tile.is_some() {
            self.generation += 1;
        }
        tile
    }

    /// Exchange the contents of two cells, keeping positions consistent.
    pub fn swap(&mut self, a: Cell, b: Cell) {
        if !self.contains(a) || !self.contains(b) {
            return;
        }
        let ta = self.cells[self.idx(a)];
        let tb = self.cells[self.idx(b)];
        self.set(a, tb);
        self.set(b, ta);
    }

    /// Mutate the tile at `cell` in place. Position fields are restored
    /// afterwards so callers cannot desynchronise them.
    pub fn update(&mut self, cell: Cell, f: impl FnOnce(&mut Tile)) -> bool {
        if !self.contains(cell) {
            return false;
        }
        let i = self.idx(cell);
        match self.cells[i].as_mut() {
            Some(tile) => {
                f(tile);
                tile.row = cell.row;
                tile.col = cell.col;
                self.generation += 1;
                true
            }
            None => false,
        }
    }

    /// All occupied tiles in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.cells.iter().flatten()
    }

    /// Every cell coordinate in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = Cell> + '_ {
        (0..self.rows).flat_map(move |row| (0..self.cols).map(move |col| Cell::new(row, col)))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    /// True when every tile's stored position equals its slot.
    pub fn positions_consistent(&self) -> bool {
        self.cells().all(|cell| match self.get(cell) {
            Some(t) => t.row == cell.row && t.col == cell.col,
            None => true,
        })
    }
}

impl PartialEq for Grid {
    /// Cell-for-cell equality; the write counter is not part of the value.
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.cells == other.cells
    }
}

impl Eq for Grid {}

#[cfg(test)]
mod tests {
    use super::*;

    fn tile(id: u32, kind: PieceKind) -> Option<Tile> {
        Some(Tile::new(TileId(id), kind))
    }

    #[test]
    fn set_rewrites_position() {
        let mut grid = Grid::new(8, 8);
        grid.set(Cell::new(3, 5), tile(1, PieceKind::Rocket));
        let t = grid.get(Cell::new(3, 5)).unwrap();
        assert_eq!((t.row, t.col), (3, 5));
        assert!(grid.positions_consistent());
    }

    #[test]
    fn swap_keeps_ids_and_positions() {
        let mut grid = Grid::new(2, 2);
        grid.set(Cell::new(0, 0), tile(1, PieceKind::Boat));
        grid.set(Cell::new(0, 1), tile(2, PieceKind::Rocket));
        grid.swap(Cell::new(0, 0), Cell::new(0, 1));

        assert_eq!(grid.get(Cell::new(0, 0)).unwrap().id, TileId(2));
        assert_eq!(grid.get(Cell::new(0, 1)).unwrap().id, TileId(1));
        assert!(grid.positions_consistent());
    }

    #[test]
    fn out_of_range_is_ignored() {
        let mut grid = Grid::new(2, 2);
        grid.set(Cell::new(5, 5), tile(1, PieceKind::Boat));
        assert!(grid.get(Cell::new(5, 5)).is_none());
        assert_eq!(grid.occupied_count(), 0);
        assert!(grid.take(Cell::new(9, 0)).is_none());
    }

    #[test]
    fn generation_counts_writes_but_not_equality() {
        let mut a = Grid::new(2, 2);
        let b = a.clone();
        a.set(Cell::new(0, 0), tile(1, PieceKind::Boat));
        a.take(Cell::new(0, 0));
        assert_eq!(a.generation(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn adjacency_is_four_directional() {
        let c = Cell::new(2, 2);
        assert!(c.is_adjacent(Cell::new(1, 2)));
        assert!(c.is_adjacent(Cell::new(2, 3)));
        assert!(!c.is_adjacent(Cell::new(3, 3)));
        assert!(!c.is_adjacent(c));
    }

    #[test]
    fn offset_stays_on_board() {
        let c = Cell::new(0, 7);
        assert_eq!(c.offset(IVec2::new(-1, 1), 8, 8), Some(Cell::new(1, 6)));
        assert_eq!(c.offset(IVec2::new(1, 0), 8, 8), None);
        assert_eq!(c.offset(IVec2::new(0, -1), 8, 8), None);
    }
}
