use crate::components::{PieceKind, PowerUpKind, COMBO_STEP};
use crate::grid::{Cell, Tile};
use crate::systems::board::GameBoard;
use crate::systems::matching::{classify_shape, find_matches, Match};
use crate::systems::power_ups::{activate, power_up_for_match};

/// Hard stop for the cascade loop. Refills are random, so a long chain is
/// possible but this many passes is not expected in practice.
const MAX_PASSES: u32 = 100;

/// Everything one clear -> gravity pass did.
#[derive(Debug, Clone, Default)]
pub struct PassResult {
    pub combo_index: u32,
    pub matches: Vec<Match>,
    /// Sum of the matches' own scores before multipliers.
    pub raw_score: u32,
    /// Unscaled bonus from power-ups fired by matched special tiles.
    pub power_up_bonus: u32,
    /// `raw_score` scaled by event and combo multipliers, plus the bonus.
    pub score: u32,
    pub matched_cells: Vec<Cell>,
    pub created: Vec<(Cell, PowerUpKind)>,
    pub activated: Vec<(Cell, PowerUpKind)>,
}

/// Outcome of a full cascade.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub total_score: u32,
    pub combo_count: u32,
    /// Kinds matched during the cascade, in first-seen order.
    pub matched_kinds: Vec<PieceKind>,
    pub passes: Vec<PassResult>,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }

    /// Fold one pass into the running totals.
    pub fn absorb(&mut self, pass: PassResult) {
        self.total_score += pass.score;
        self.combo_count = pass.combo_index;
        for m in &pass.matches {
            for t in &m.tiles {
                if !self.matched_kinds.contains(&t.kind) {
                    self.matched_kinds.push(t.kind);
                }
            }
        }
        self.passes.push(pass);
    }
}

/// `1 + (combo_index - 1) * 0.1`; the first pass is unscaled.
pub fn combo_multiplier(combo_index: u32) -> f64 {
    1.0 + combo_index.saturating_sub(1) as f64 * COMBO_STEP
}

/// Scale a raw pass score, flooring the result. The combo factor is kept in
/// integer tenths so 1.1x, 1.2x... are exact.
pub fn scaled_score(raw: u32, combo_index: u32, event_multiplier: f64) -> u32 {
    let tenths = 10 + combo_index.saturating_sub(1) as u64;
    let scaled = (raw as u64 * tenths) as f64 * event_multiplier / 10.0;
    scaled.max(0.0).floor() as u32
}

/// Pick the tile that keeps a created power-up: the crossing tile of an
/// L/T, else the swapped tile if it took part, else the middle of the run.
/// Tiles already carrying a power-up and tiles already chosen are skipped.
fn pick_carrier(m: &Match, cross: Option<Cell>, pivot: &[Cell], taken: &[Cell]) -> Option<Cell> {
    let usable = |c: &Cell| {
        !taken.contains(c)
            && m
                .tiles
                .iter()
                .any(|t| t.cell() == *c && t.power_up.is_none())
    };
    let preferred = cross
        .or_else(|| m.cells().find(|c| pivot.contains(c)))
        .or_else(|| m.tiles.get(m.len() / 2).map(Tile::cell));
    preferred
        .filter(|c| usable(c))
        .or_else(|| m.cells().find(|c| usable(c)))
}

/// Run a single pass: find matches, fire matched power-ups, create new
/// power-ups, clear, apply gravity. Returns `None` when the board has no
/// match (the cascade's fixed point).
///
/// `pivot` holds the swapped cells for the first pass of a player move.
pub fn resolve_pass(
    board: &mut GameBoard,
    combo_index: u32,
    event_multiplier: f64,
    pivot: &[Cell],
) -> Option<PassResult> {
    let matches = find_matches(&board.grid);
    if matches.is_empty() {
        return None;
    }

    let mut matched_cells: Vec<Cell> = Vec::new();
    for c in matches.iter().flat_map(|m| m.cells()) {
        if !matched_cells.contains(&c) {
            matched_cells.push(c);
        }
    }

    // Decide creations before the board changes.
    let mut created: Vec<(Cell, PowerUpKind)> = Vec::new();
    for m in &matches {
        let (shape, cross) = classify_shape(&board.grid, m);
        let Some(kind) = power_up_for_match(m.len(), shape) else {
            continue;
        };
        let taken: Vec<Cell> = created.iter().map(|(c, _)| *c).collect();
        if let Some(carrier) = pick_carrier(m, cross, pivot, &taken) {
            created.push((carrier, kind));
        }
    }

    let activated: Vec<(Cell, PowerUpKind)> = matches
        .iter()
        .flat_map(|m| m.tiles.iter())
        .filter_map(|t| t.power_up.map(|p| (t.cell(), p)))
        .collect();

    // Carriers sit out the clearing and come back upgraded.
    let carriers: Vec<(Tile, PowerUpKind)> = created
        .iter()
        .filter_map(|&(c, kind)| board.grid.take(c).map(|t| (t, kind)))
        .collect();

    let mut power_up_bonus = 0;
    for &(cell, kind) in &activated {
        let still_armed = board.grid.get(cell).and_then(|t| t.power_up) == Some(kind);
        if still_armed {
            power_up_bonus += activate(kind, cell, &mut board.grid, &mut board.rng).score_bonus;
        }
    }

    board.remove_cells(&matched_cells);
    for (tile, kind) in carriers {
        board.grid.set(tile.cell(), Some(tile.with_power_up(kind)));
    }

    let raw_score: u32 = matches.iter().map(|m| m.score).sum();
    let score = scaled_score(raw_score, combo_index, event_multiplier) + power_up_bonus;

    board.apply_gravity();

    log::debug!(
        "cascade pass {}: {} matches, raw {}, scored {}",
        combo_index,
        matches.len(),
        raw_score,
        score
    );

    Some(PassResult {
        combo_index,
        matches,
        raw_score,
        power_up_bonus,
        score,
        matched_cells,
        created,
        activated,
    })
}

/// Resolve the board to a matchless fixed point, one pass per combo step.
pub fn resolve(board: &mut GameBoard, event_multiplier: f64, pivot: &[Cell]) -> Resolution {
    let mut resolution = Resolution::default();
    let mut combo_index = 1;
    loop {
        let pass_pivot: &[Cell] = if combo_index == 1 { pivot } else { &[] };
        match resolve_pass(board, combo_index, event_multiplier, pass_pivot) {
            Some(pass) => resolution.absorb(pass),
            None => break,
        }
        if combo_index >= MAX_PASSES {
            log::warn!("cascade stopped after {} passes", MAX_PASSES);
            break;
        }
        combo_index += 1;
    }
    resolution
}
