use glam::IVec2;

use crate::components::{EngagementSource, MatchShape, PieceKind, PowerUpKind};
use crate::grid::{Cell, Grid};
use crate::systems::board::Rng;

/// Radio wave rings: (Manhattan distance, bonus per cleared tile).
const RADIO_WAVE_RINGS: [(u32, u32); 3] = [(1, 60), (2, 40), (3, 20)];
const RADIO_WAVE_CLEAR_CHANCE: f64 = 0.5;

/// Centre plus its eight neighbours.
const MUSIC_NOTE_OFFSETS: [IVec2; 9] = [
    IVec2::new(0, 0),
    IVec2::new(0, -1),
    IVec2::new(0, 1),
    IVec2::new(-1, 0),
    IVec2::new(1, 0),
    IVec2::new(-1, -1),
    IVec2::new(1, -1),
    IVec2::new(-1, 1),
    IVec2::new(1, 1),
];

/// Result of one power-up activation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Activation {
    pub score_bonus: u32,
    pub tiles_removed: usize,
    pub cleared: Vec<Cell>,
}

impl Activation {
    fn clear(&mut self, grid: &mut Grid, cell: Cell, bonus: u32) {
        if grid.take(cell).is_some() {
            self.score_bonus += bonus;
            self.tiles_removed += 1;
            self.cleared.push(cell);
        }
    }
}

/// Which power-up a freshly resolved match creates, if any.
pub fn power_up_for_match(len: usize, shape: MatchShape) -> Option<PowerUpKind> {
    if len >= 5 {
        Some(PowerUpKind::ColorBomb)
    } else if len == 4 {
        Some(PowerUpKind::LineClear)
    } else if matches!(shape, MatchShape::LShape | MatchShape::TShape) {
        Some(PowerUpKind::Lightning)
    } else {
        None
    }
}

/// Power-up awarded for an engagement event.
pub fn engagement_power_up(source: EngagementSource) -> PowerUpKind {
    match source {
        EngagementSource::Stream => PowerUpKind::RadioWave,
        EngagementSource::Sponsor => PowerUpKind::BeachBomb,
        EngagementSource::SongQuiz => PowerUpKind::MusicNote,
    }
}

/// Flag the tile at `cell` as special with `kind`. False on an empty cell.
pub fn add_power_up_to_tile(grid: &mut Grid, cell: Cell, kind: PowerUpKind) -> bool {
    grid.update(cell, |tile| {
        tile.is_special = true;
        tile.power_up = Some(kind);
    })
}

/// Turn every boat into a special wave tile worth double points.
/// Returns how many tiles changed.
pub fn wave_crash(grid: &mut Grid) -> usize {
    let boats: Vec<Cell> = grid
        .tiles()
        .filter(|t| t.kind == PieceKind::Boat)
        .map(|t| t.cell())
        .collect();
    for &cell in &boats {
        grid.update(cell, |tile| {
            tile.kind = PieceKind::Wave;
            tile.is_special = true;
            tile.power_up = Some(PowerUpKind::DoublePoints);
        });
    }
    boats.len()
}

/// Apply the area effect of `kind` centred on `cell`, removing tiles from
/// `grid`. Gravity is left to the caller.
pub fn activate(kind: PowerUpKind, cell: Cell, grid: &mut Grid, rng: &mut Rng) -> Activation {
    let mut act = Activation::default();
    if !grid.contains(cell) {
        return act;
    }

    match kind {
        PowerUpKind::LineClear => {
            for col in 0..grid.cols {
                act.clear(grid, Cell::new(cell.row, col), 25);
            }
            for row in 0..grid.rows {
                act.clear(grid, Cell::new(row, cell.col), 25);
            }
        }
        PowerUpKind::ColorBomb => {
            if let Some(target) = grid.kind_at(cell) {
                let victims: Vec<Cell> = grid
                    .tiles()
                    .filter(|t| t.kind == target)
                    .map(|t| t.cell())
                    .collect();
                for c in victims {
                    act.clear(grid, c, 50);
                }
            }
        }
        PowerUpKind::Lightning => clear_square(&mut act, grid, cell, 1, 30),
        PowerUpKind::MusicNote => {
            for offset in MUSIC_NOTE_OFFSETS {
                if let Some(c) = cell.offset(offset, grid.rows, grid.cols) {
                    act.clear(grid, c, 40);
                }
            }
        }
        PowerUpKind::RadioWave => {
            for (distance, bonus) in RADIO_WAVE_RINGS {
                let ring: Vec<Cell> = grid.cells().filter(|c| c.distance(cell) == distance).collect();
                for c in ring {
                    if grid.get(c).is_some() && rng.chance(RADIO_WAVE_CLEAR_CHANCE) {
                        act.clear(grid, c, bonus);
                    }
                }
            }
        }
        PowerUpKind::BeachBomb => clear_square(&mut act, grid, cell, 2, 75),
        PowerUpKind::DoublePoints => act.clear(grid, cell, 100),
    }

    log::debug!(
        "power-up {:?} at ({}, {}): +{} points, {} tiles",
        kind,
        cell.row,
        cell.col,
        act.score_bonus,
        act.tiles_removed
    );
    act
}

/// Clear the (2r+1)x(2r+1) block around `center`, clipped to the board.
fn clear_square(act: &mut Activation, grid: &mut Grid, center: Cell, radius: i32, bonus: u32) {
    for dy in -radius..=radius {
        for dx in -radius..=radius {
            if let Some(c) = center.offset(IVec2::new(dx, dy), grid.rows, grid.cols) {
                act.clear(grid, c, bonus);
            }
        }
    }
}
