use bytemuck::{Pod, Zeroable};
use serde::Serialize;

use crate::collaborators::{AudioSink, BlobStore, HostStream, MemoryBlobStore, SilentAudio, StreamSource};
use crate::components::{
    ClipId, EngagementSource, PowerUpKind, QuizKind, SoundEvent, SponsorKind, BIG_CASCADE_SCORE,
};
use crate::config::GameConfig;
use crate::grid::Cell;
use crate::persistence::{EngagementMetrics, MetricsStore};
use crate::systems::board::GameBoard;
use crate::systems::cascade::{resolve_pass, PassResult, Resolution};
use crate::systems::engagement::{
    capped_lives, score_quiz_answer, EventCalendar, SponsorLedger, StreamTracker,
};
use crate::systems::matching::{find_matches, find_possible_move, has_valid_moves};
use crate::systems::power_ups::{activate, engagement_power_up, wave_crash};
use crate::systems::triggers::TriggerPolicy;

/// What the session is busy with. Input is only taken in `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    /// Tiles exchanged, waiting for the swap animation before the check.
    Swapping { a: Cell, b: Cell, remaining_ms: u64 },
    /// Waiting before the next cascade pass.
    Cascading { remaining_ms: u64 },
    /// Deadlock found, waiting before the reshuffle.
    Shuffling { remaining_ms: u64 },
}

impl Phase {
    /// Wire value for the bridge.
    pub fn code(self) -> u8 {
        match self {
            Phase::Idle => 0,
            Phase::Swapping { .. } => 1,
            Phase::Cascading { .. } => 2,
            Phase::Shuffling { .. } => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionStatus {
    Active = 0,
    Paused = 1,
    GameOver = 2,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapOutcome {
    /// Tiles exchanged; legality is settled once the swap delay runs out.
    Accepted,
    /// Nothing happened.
    Rejected,
}

/// Everything the presentation layer may want to react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameEvent {
    NewGame,
    SwapStarted { a: Cell, b: Cell },
    SwapReverted { a: Cell, b: Cell },
    MatchesCleared { cells: Vec<Cell>, score: u32, combo: u32 },
    PowerUpCreated { cell: Cell, kind: PowerUpKind },
    PowerUpFired { cell: Cell, kind: PowerUpKind },
    PowerUpActivated { cell: Cell, kind: PowerUpKind, bonus: u32, tiles_removed: usize },
    PowerUpAwarded { kind: PowerUpKind, source: EngagementSource },
    CascadeFinished { total_score: u32, combo: u32 },
    DeadlockDetected,
    Shuffled,
    HintShown { a: Cell, b: Cell },
    HintHidden,
    QuizRequested { kind: QuizKind },
    QuizAnswered { kind: QuizKind, correct: bool, points: u32 },
    WaveCrashIncoming,
    WaveCrash { converted: usize },
    StreamBonus { points: u32 },
    SponsorRewarded { kind: SponsorKind, points: u32, lives: u8 },
    LifeGained { lives: u8, source: EngagementSource },
    LifeLost { lives: u8 },
    Paused,
    Resumed,
    GameOver { score: u32, new_high_score: bool },
}

pub const TILE_SPECIAL: u32 = 1 << 0;
pub const TILE_MATCHED: u32 = 1 << 1;
pub const TILE_SELECTED: u32 = 1 << 2;
pub const TILE_HINT: u32 = 1 << 3;
pub const TILE_SWAPPING: u32 = 1 << 4;

/// Per-tile record handed to the host each tick. 6 x u32 = 24 bytes stride.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TileInstance {
    pub id: u32,
    pub row: u32,
    pub col: u32,
    pub kind: u32,
    /// 0 = none, otherwise `PowerUpKind as u32 + 1`.
    pub power_up: u32,
    pub flags: u32,
}

/// One game: board, lives, score and every timer, advanced by `tick`.
pub struct GameSession {
    pub board: GameBoard,
    config: GameConfig,
    phase: Phase,

    score: u32,
    lives: u8,
    combo: u32,
    total_matches: u32,
    song_streak: u32,
    paused: bool,
    game_over: bool,
    selected: Option<Cell>,
    power_ups: Vec<PowerUpKind>,

    // Session clock; only runs while active.
    now_ms: u64,
    countdown_ms: u64,
    engagement_elapsed_ms: u64,
    last_activity_ms: u64,
    has_made_first_move: bool,
    hint: Option<(Cell, Cell)>,
    hint_until_ms: u64,
    pending_quiz: Option<QuizKind>,
    wave_crash_at_ms: Option<u64>,

    triggers: TriggerPolicy,
    stream_rewards: StreamTracker,
    sponsors: SponsorLedger,
    calendar: EventCalendar,
    metrics: EngagementMetrics,

    stream: Box<dyn StreamSource>,
    audio: Box<dyn AudioSink>,
    metrics_store: MetricsStore,

    // Cascade in flight
    cascade: Resolution,
    cascade_pivot: Vec<Cell>,
    last_matched: Vec<Cell>,

    // Collected between ticks, published at the end of the next one.
    pending_events: Vec<GameEvent>,
    pending_sounds: Vec<SoundEvent>,

    /// Events published by the last tick.
    pub events: Vec<GameEvent>,
    /// Sound cues published by the last tick.
    pub sound_events: Vec<SoundEvent>,
    /// Tile snapshot written each tick, read by the host.
    pub tile_buffer: Vec<TileInstance>,
}

impl GameSession {
    /// Session with in-process collaborators: no stream, no sound, memory store.
    pub fn new(config: GameConfig, seed: u64) -> Self {
        Self::with_collaborators(
            config,
            seed,
            Box::new(HostStream::default()),
            Box::new(SilentAudio),
            Box::new(MemoryBlobStore::default()),
        )
    }

    pub fn with_collaborators(
        config: GameConfig,
        seed: u64,
        stream: Box<dyn StreamSource>,
        audio: Box<dyn AudioSink>,
        store: Box<dyn BlobStore>,
    ) -> Self {
        let metrics_store = MetricsStore::new(store);
        let metrics = metrics_store.load();
        let board = GameBoard::new(config.rows, config.cols, seed);
        let capacity = config.rows * config.cols;

        let mut session = GameSession {
            board,
            phase: Phase::Idle,
            score: 0,
            lives: config.starting_lives,
            combo: 0,
            total_matches: 0,
            song_streak: 0,
            paused: false,
            game_over: false,
            selected: None,
            power_ups: Vec::new(),
            now_ms: 0,
            countdown_ms: config.life_countdown_ms,
            engagement_elapsed_ms: 0,
            last_activity_ms: 0,
            has_made_first_move: false,
            hint: None,
            hint_until_ms: 0,
            pending_quiz: None,
            wave_crash_at_ms: None,
            triggers: TriggerPolicy::new(&config),
            stream_rewards: StreamTracker::default(),
            sponsors: SponsorLedger::default(),
            calendar: EventCalendar::default(),
            metrics,
            stream,
            audio,
            metrics_store,
            cascade: Resolution::default(),
            cascade_pivot: Vec::new(),
            last_matched: Vec::new(),
            pending_events: vec![GameEvent::NewGame],
            pending_sounds: Vec::with_capacity(8),
            events: Vec::new(),
            sound_events: Vec::with_capacity(8),
            tile_buffer: Vec::with_capacity(capacity),
            config,
        };
        session.rebuild_tile_buffer();
        log::info!("beach-match: new game with seed {}", seed);
        session
    }

    // --- Read side ---------------------------------------------------------

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn status(&self) -> SessionStatus {
        if self.game_over {
            SessionStatus::GameOver
        } else if self.paused {
            SessionStatus::Paused
        } else {
            SessionStatus::Active
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn lives(&self) -> u8 {
        self.lives
    }

    /// Passes in the current (or last) cascade.
    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn total_matches(&self) -> u32 {
        self.total_matches
    }

    pub fn song_streak(&self) -> u32 {
        self.song_streak
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_game_over(&self) -> bool {
        self.game_over
    }

    pub fn selected(&self) -> Option<Cell> {
        self.selected
    }

    pub fn power_ups(&self) -> &[PowerUpKind] {
        &self.power_ups
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Whole seconds left before the next life is lost, rounded up.
    pub fn countdown_secs(&self) -> u64 {
        self.countdown_ms.div_ceil(1000)
    }

    pub fn hint(&self) -> Option<(Cell, Cell)> {
        self.hint
    }

    /// The swap currently animating, if any.
    pub fn swapping_pair(&self) -> Option<(Cell, Cell)> {
        match self.phase {
            Phase::Swapping { a, b, .. } => Some((a, b)),
            _ => None,
        }
    }

    /// Cells cleared by the most recent pass or activation.
    pub fn last_matched(&self) -> &[Cell] {
        &self.last_matched
    }

    pub fn pending_quiz(&self) -> Option<QuizKind> {
        self.pending_quiz
    }

    pub fn metrics(&self) -> &EngagementMetrics {
        &self.metrics
    }

    pub fn calendar_mut(&mut self) -> &mut EventCalendar {
        &mut self.calendar
    }

    fn accepts_input(&self) -> bool {
        self.phase == Phase::Idle && !self.paused && !self.game_over
    }

    // --- Player intents ----------------------------------------------------

    /// Tap a cell: select, deselect, move the selection, or swap with the
    /// selected neighbour. False when the tap was ignored.
    pub fn select(&mut self, cell: Cell) -> bool {
        if !self.accepts_input() || self.board.grid.get(cell).is_none() {
            return false;
        }
        match self.selected {
            None => self.selected = Some(cell),
            Some(s) if s == cell => self.selected = None,
            Some(s) if s.is_adjacent(cell) => {
                self.selected = None;
                return self.request_swap(s, cell) == SwapOutcome::Accepted;
            }
            Some(_) => self.selected = Some(cell),
        }
        self.note_activity();
        true
    }

    /// Exchange two adjacent tiles. Whether the move stands is decided after
    /// the swap delay; a swap that makes no match is put back then.
    pub fn request_swap(&mut self, a: Cell, b: Cell) -> SwapOutcome {
        if !self.accepts_input() {
            return SwapOutcome::Rejected;
        }
        let grid = &self.board.grid;
        if !a.is_adjacent(b) || grid.get(a).is_none() || grid.get(b).is_none() {
            return SwapOutcome::Rejected;
        }

        self.note_activity();
        self.selected = None;
        self.has_made_first_move = true;
        self.board.grid.swap(a, b);
        self.pending_sounds.push(SoundEvent::Swap);
        self.pending_events.push(GameEvent::SwapStarted { a, b });
        self.phase = Phase::Swapping {
            a,
            b,
            remaining_ms: self.config.swap_check_delay_ms,
        };
        SwapOutcome::Accepted
    }

    /// Fire `kind` at `cell`. Uses the tile's own power-up when it carries
    /// `kind`, otherwise one from the inventory. False when neither applies
    /// or the cell is empty.
    ///
    /// An inventory power-up aimed at a tile carrying a different one sets
    /// that one off as well. The carrier tile is used up either way.
    pub fn activate_power_up(&mut self, kind: PowerUpKind, cell: Cell) -> bool {
        if !self.accepts_input() {
            return false;
        }
        let Some(tile) = self.board.grid.get(cell).copied() else {
            return false;
        };
        if tile.power_up != Some(kind) {
            let Some(i) = self.power_ups.iter().position(|&p| p == kind) else {
                return false;
            };
            self.power_ups.remove(i);
        }

        // A color bomb reads the kind under it, so it goes before the other.
        let mut chain = vec![kind];
        if let Some(own) = tile.power_up.filter(|&p| p != kind) {
            if kind == PowerUpKind::ColorBomb {
                chain.push(own);
            } else {
                chain.insert(0, own);
            }
        }

        self.note_activity();
        self.selected = None;
        let mut cleared = Vec::new();
        for fired in chain {
            let act = activate(fired, cell, &mut self.board.grid, &mut self.board.rng);
            self.score += act.score_bonus;
            self.play_power_up_sound();
            self.pending_sounds.push(SoundEvent::PowerUp);
            self.pending_events.push(GameEvent::PowerUpActivated {
                cell,
                kind: fired,
                bonus: act.score_bonus,
                tiles_removed: act.tiles_removed,
            });
            for c in act.cleared {
                if !cleared.contains(&c) {
                    cleared.push(c);
                }
            }
        }
        if tile.power_up.is_some() {
            let still_there = self.board.grid.get(cell).is_some_and(|t| t.id == tile.id);
            if still_there {
                self.board.grid.take(cell);
            }
            if !cleared.contains(&cell) {
                cleared.push(cell);
            }
        }
        self.last_matched = cleared;

        self.board.apply_gravity();
        self.start_cascade(Vec::new());
        self.phase = Phase::Cascading {
            remaining_ms: self.config.swap_check_delay_ms,
        };
        true
    }

    /// Flip pause. Returns the new paused state.
    pub fn toggle_pause(&mut self) -> bool {
        if self.game_over {
            return false;
        }
        self.paused = !self.paused;
        if self.paused {
            self.pending_events.push(GameEvent::Paused);
        } else {
            // Hint timing starts over after a pause.
            self.last_activity_ms = self.now_ms;
            self.hint = None;
            self.pending_events.push(GameEvent::Resumed);
        }
        log::info!("beach-match: {}", if self.paused { "paused" } else { "resumed" });
        self.paused
    }

    /// Start a new game on a fresh board. Long-lived metrics are kept.
    pub fn reset(&mut self, seed: u64) {
        self.board = GameBoard::new(self.config.rows, self.config.cols, seed);
        self.phase = Phase::Idle;
        self.score = 0;
        self.lives = self.config.starting_lives;
        self.combo = 0;
        self.total_matches = 0;
        self.song_streak = 0;
        self.paused = false;
        self.game_over = false;
        self.selected = None;
        self.power_ups.clear();
        self.countdown_ms = self.config.life_countdown_ms;
        self.engagement_elapsed_ms = 0;
        self.last_activity_ms = self.now_ms;
        self.has_made_first_move = false;
        self.hint = None;
        self.pending_quiz = None;
        self.wave_crash_at_ms = None;
        self.triggers = TriggerPolicy::new(&self.config);
        self.stream_rewards = StreamTracker::default();
        self.sponsors.reset();
        self.cascade = Resolution::default();
        self.cascade_pivot.clear();
        self.last_matched.clear();
        // Nothing queued by the old game reaches the new one.
        self.pending_events.clear();
        self.pending_sounds.clear();
        self.pending_events.push(GameEvent::NewGame);
        self.rebuild_tile_buffer();
        log::info!("beach-match: new game with seed {}", seed);
    }

    // --- Engagement intents ------------------------------------------------

    /// Reward the first click of each sponsor kind this game.
    pub fn sponsor_click(&mut self, kind: SponsorKind) -> bool {
        if self.game_over {
            return false;
        }
        let Some((points, lives)) = self.sponsors.claim(kind) else {
            log::info!("beach-match: sponsor {:?} already rewarded this game", kind);
            return false;
        };
        self.score += points;
        self.gain_lives(lives, EngagementSource::Sponsor);
        self.award_power_up(EngagementSource::Sponsor);
        self.metrics.sponsor_clicks += 1;
        self.metrics_store.save(&self.metrics);
        self.pending_events
            .push(GameEvent::SponsorRewarded { kind, points, lives });
        true
    }

    /// Settle the open trivia question. False when none is open.
    pub fn answer_quiz(&mut self, correct: bool) -> bool {
        if self.game_over {
            return false;
        }
        let Some(kind) = self.pending_quiz.take() else {
            return false;
        };
        let outcome = score_quiz_answer(correct, self.song_streak);
        self.song_streak = outcome.streak;
        self.score += outcome.points;
        self.metrics.song_quiz_completed += 1;
        if correct {
            self.metrics.song_quiz_correct += 1;
            self.gain_lives(outcome.lives_gained, EngagementSource::SongQuiz);
            self.award_power_up(EngagementSource::SongQuiz);
        }
        self.metrics_store.save(&self.metrics);
        self.pending_events.push(GameEvent::QuizAnswered {
            kind,
            correct,
            points: outcome.points,
        });
        true
    }

    /// Record a play on `today` (days since the epoch). Returns the streak.
    pub fn record_play_day(&mut self, today: u64) -> u32 {
        let streak = self.metrics.record_play_day(today);
        self.metrics_store.save(&self.metrics);
        streak
    }

    fn gain_lives(&mut self, gain: u8, source: EngagementSource) {
        self.lives = capped_lives(self.lives, gain, self.config.max_lives);
        self.countdown_ms = self.config.life_countdown_ms;
        self.pending_events.push(GameEvent::LifeGained {
            lives: self.lives,
            source,
        });
    }

    fn award_power_up(&mut self, source: EngagementSource) {
        let kind = engagement_power_up(source);
        self.power_ups.push(kind);
        self.pending_events
            .push(GameEvent::PowerUpAwarded { kind, source });
    }

    // --- Clock -------------------------------------------------------------

    /// Advance the session by `dt_ms`. Paused and finished games only
    /// republish their state.
    pub fn tick(&mut self, dt_ms: u64) {
        if !self.game_over && !self.paused {
            self.now_ms += dt_ms;
            self.advance_phase(dt_ms);
            self.advance_countdown(dt_ms);
            if !self.game_over {
                self.advance_engagement(dt_ms);
                self.advance_hint();
                self.advance_wave_crash();
            }
        }
        self.rebuild_tile_buffer();
        self.publish();
    }

    fn advance_phase(&mut self, dt_ms: u64) {
        match self.phase {
            Phase::Idle => {}
            Phase::Swapping { a, b, remaining_ms } => {
                let left = remaining_ms.saturating_sub(dt_ms);
                if left > 0 {
                    self.phase = Phase::Swapping { a, b, remaining_ms: left };
                } else {
                    self.finish_swap(a, b);
                }
            }
            Phase::Cascading { remaining_ms } => {
                let left = remaining_ms.saturating_sub(dt_ms);
                if left > 0 {
                    self.phase = Phase::Cascading { remaining_ms: left };
                } else {
                    self.step_cascade();
                }
            }
            Phase::Shuffling { remaining_ms } => {
                let left = remaining_ms.saturating_sub(dt_ms);
                if left > 0 {
                    self.phase = Phase::Shuffling { remaining_ms: left };
                } else {
                    self.finish_shuffle();
                }
            }
        }
    }

    /// Charge one life per full countdown inside `dt_ms`, carrying the rest.
    fn advance_countdown(&mut self, dt_ms: u64) {
        let mut remaining = dt_ms;
        while remaining >= self.countdown_ms {
            remaining -= self.countdown_ms;
            self.countdown_ms = self.config.life_countdown_ms;
            self.lose_life();
            if self.game_over {
                return;
            }
        }
        self.countdown_ms -= remaining;
    }

    /// Run one engagement step for every whole period inside `dt_ms`.
    fn advance_engagement(&mut self, dt_ms: u64) {
        let period = self.config.engagement_tick_ms.max(1);
        self.engagement_elapsed_ms += dt_ms;
        if self.engagement_elapsed_ms < period {
            return;
        }

        let mut streamed = false;
        while self.engagement_elapsed_ms >= period {
            self.engagement_elapsed_ms -= period;
            let at_ms = self.now_ms.saturating_sub(self.engagement_elapsed_ms);
            streamed |= self.stream_step(at_ms);
        }
        if streamed {
            self.metrics_store.save(&self.metrics);
        }

        if self.has_made_first_move && self.phase == Phase::Idle && !has_valid_moves(&self.board.grid) {
            self.start_shuffle();
        }
    }

    /// One second of stream engagement ending at `at_ms`. False when the
    /// stream is off.
    fn stream_step(&mut self, at_ms: u64) -> bool {
        if !self.stream.is_streaming() {
            return false;
        }
        self.metrics.stream_time += 1;
        let stream_secs = self.stream.stream_time_secs();
        let reward = self
            .stream_rewards
            .tick(stream_secs, self.lives, at_ms, &self.config);
        if let Some(target) = reward.lives {
            self.gain_lives(target.saturating_sub(self.lives), EngagementSource::Stream);
            self.award_power_up(EngagementSource::Stream);
            log::info!("beach-match: stream reward, lives now {}", self.lives);
        }
        if reward.bonus_points > 0 {
            self.score += reward.bonus_points;
            self.pending_events.push(GameEvent::StreamBonus {
                points: reward.bonus_points,
            });
        }
        true
    }

    fn advance_hint(&mut self) {
        if self.hint.is_some() && self.now_ms >= self.hint_until_ms {
            self.hint = None;
            self.pending_events.push(GameEvent::HintHidden);
        }
        if self.phase != Phase::Idle || self.hint.is_some() {
            return;
        }
        if !self
            .triggers
            .hint_due(self.now_ms, self.last_activity_ms, self.has_made_first_move)
        {
            return;
        }
        self.triggers.record_hint(self.now_ms);
        match find_possible_move(&self.board.grid) {
            Some((a, b)) => {
                self.hint = Some((a, b));
                self.hint_until_ms = self.now_ms + self.config.hint_visible_ms;
                self.pending_events.push(GameEvent::HintShown { a, b });
            }
            None => self.start_shuffle(),
        }
    }

    fn advance_wave_crash(&mut self) {
        let Some(at) = self.wave_crash_at_ms else {
            return;
        };
        if self.now_ms < at || self.phase != Phase::Idle {
            return;
        }
        self.wave_crash_at_ms = None;
        let converted = wave_crash(&mut self.board.grid);
        self.selected = None;
        self.note_activity();
        self.pending_events.push(GameEvent::WaveCrash { converted });
        log::info!("beach-match: wave crash turned {} boats into waves", converted);
    }

    // --- Resolution --------------------------------------------------------

    fn finish_swap(&mut self, a: Cell, b: Cell) {
        if find_matches(&self.board.grid).is_empty() {
            self.board.grid.swap(a, b);
            self.pending_events.push(GameEvent::SwapReverted { a, b });
            self.phase = Phase::Idle;
            return;
        }
        self.start_cascade(vec![a, b]);
        self.step_cascade();
    }

    fn start_cascade(&mut self, pivot: Vec<Cell>) {
        self.cascade = Resolution::default();
        self.cascade_pivot = pivot;
        self.combo = 0;
    }

    /// Run the next pass, or wrap up when the board is stable.
    fn step_cascade(&mut self) {
        let combo_index = self.cascade.passes.len() as u32 + 1;
        let multiplier = self.calendar.score_multiplier(self.now_ms);
        let pivot = std::mem::take(&mut self.cascade_pivot);
        match resolve_pass(&mut self.board, combo_index, multiplier, &pivot) {
            Some(pass) => {
                self.apply_pass(&pass);
                self.cascade.absorb(pass);
                self.phase = Phase::Cascading {
                    remaining_ms: self.config.cascade_step_delay_ms,
                };
            }
            None => self.finish_cascade(),
        }
    }

    fn apply_pass(&mut self, pass: &PassResult) {
        self.score += pass.score;
        self.combo = pass.combo_index;
        self.last_matched = pass.matched_cells.clone();
        self.pending_sounds.push(SoundEvent::Match);
        self.pending_events.push(GameEvent::MatchesCleared {
            cells: pass.matched_cells.clone(),
            score: pass.score,
            combo: pass.combo_index,
        });
        for &(cell, kind) in &pass.created {
            self.pending_events.push(GameEvent::PowerUpCreated { cell, kind });
        }
        for &(cell, kind) in &pass.activated {
            self.play_power_up_sound();
            self.pending_sounds.push(SoundEvent::PowerUp);
            self.pending_events.push(GameEvent::PowerUpFired { cell, kind });
        }
    }

    fn finish_cascade(&mut self) {
        self.phase = Phase::Idle;
        self.last_matched.clear();
        let resolution = std::mem::take(&mut self.cascade);

        if !resolution.is_empty() {
            self.total_matches += resolution.combo_count;
            self.metrics.total_matches += resolution.combo_count;
            self.pending_events.push(GameEvent::CascadeFinished {
                total_score: resolution.total_score,
                combo: resolution.combo_count,
            });
            if resolution.total_score > BIG_CASCADE_SCORE {
                self.play_clip(ClipId::BigCascade);
            }

            if self.pending_quiz.is_none() {
                if let Some(&kind) = resolution.matched_kinds.first() {
                    let quiz = self.triggers.should_trigger_quiz(
                        kind,
                        self.total_matches,
                        self.now_ms,
                        &mut self.board.rng,
                    );
                    if let Some(quiz) = quiz {
                        log::info!("beach-match: quiz requested ({:?})", quiz);
                        self.pending_quiz = Some(quiz);
                        self.pending_events.push(GameEvent::QuizRequested { kind: quiz });
                    }
                }
            }

            if self.wave_crash_at_ms.is_none()
                && self
                    .triggers
                    .should_trigger_wave_crash(self.total_matches, self.now_ms, &mut self.board.rng)
            {
                self.wave_crash_at_ms = Some(self.now_ms + self.config.wave_crash_delay_ms);
                self.pending_events.push(GameEvent::WaveCrashIncoming);
            }
        }

        if !has_valid_moves(&self.board.grid) {
            self.start_shuffle();
        }
    }

    fn start_shuffle(&mut self) {
        log::info!("beach-match: no moves left, shuffling");
        self.selected = None;
        self.pending_events.push(GameEvent::DeadlockDetected);
        self.phase = Phase::Shuffling {
            remaining_ms: self.config.shuffle_delay_ms,
        };
    }

    fn finish_shuffle(&mut self) {
        self.board.shuffle();
        self.pending_sounds.push(SoundEvent::Shuffle);
        self.pending_events.push(GameEvent::Shuffled);
        self.note_activity();
        if find_matches(&self.board.grid).is_empty() {
            self.phase = Phase::Idle;
        } else {
            self.start_cascade(Vec::new());
            self.phase = Phase::Cascading {
                remaining_ms: self.config.cascade_step_delay_ms,
            };
        }
    }

    fn lose_life(&mut self) {
        self.lives = self.lives.saturating_sub(1);
        self.pending_sounds.push(SoundEvent::LifeLost);
        self.pending_events.push(GameEvent::LifeLost { lives: self.lives });
        log::info!("beach-match: life lost, {} left", self.lives);
        if self.lives == 0 {
            self.end_game();
        }
    }

    fn end_game(&mut self) {
        self.game_over = true;
        self.selected = None;
        self.hint = None;
        let new_high_score = self.metrics.record_score(self.score);
        self.metrics_store.save(&self.metrics);
        self.play_clip(ClipId::GameOver);
        self.pending_sounds.push(SoundEvent::GameOver);
        self.pending_events.push(GameEvent::GameOver {
            score: self.score,
            new_high_score,
        });
        log::info!("beach-match: game over, score {}", self.score);
    }

    /// A player action: restart the idle timer and re-arm hints.
    fn note_activity(&mut self) {
        self.last_activity_ms = self.now_ms;
        self.triggers.clear_hint_cooldown();
        if self.hint.take().is_some() {
            self.pending_events.push(GameEvent::HintHidden);
        }
    }

    fn play_power_up_sound(&mut self) {
        if let Err(e) = self.audio.play_power_up_sound() {
            log::warn!("beach-match: power-up sound skipped: {}", e);
        }
    }

    fn play_clip(&mut self, clip: ClipId) {
        if let Err(e) = self.audio.play_clip(clip) {
            log::warn!("beach-match: clip {:?} skipped: {}", clip, e);
        }
    }

    // --- Presentation feed -------------------------------------------------

    fn publish(&mut self) {
        self.events.clear();
        self.events.append(&mut self.pending_events);
        self.sound_events.clear();
        self.sound_events.append(&mut self.pending_sounds);
    }

    fn rebuild_tile_buffer(&mut self) {
        self.tile_buffer.clear();
        let swapping = self.swapping_pair();
        let on = |pair: Option<(Cell, Cell)>, cell: Cell| pair.is_some_and(|(a, b)| a == cell || b == cell);

        for tile in self.board.grid.tiles() {
            let cell = tile.cell();
            let mut flags = 0;
            if tile.is_special {
                flags |= TILE_SPECIAL;
            }
            if self.last_matched.contains(&cell) {
                flags |= TILE_MATCHED;
            }
            if self.selected == Some(cell) {
                flags |= TILE_SELECTED;
            }
            if on(self.hint, cell) {
                flags |= TILE_HINT;
            }
            if on(swapping, cell) {
                flags |= TILE_SWAPPING;
            }
            self.tile_buffer.push(TileInstance {
                id: tile.id.0,
                row: cell.row as u32,
                col: cell.col as u32,
                kind: tile.kind as u32,
                power_up: tile.power_up.map_or(0, |p| p as u32 + 1),
                flags,
            });
        }
    }

    /// The tile snapshot as raw bytes.
    pub fn tile_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.tile_buffer)
    }

    pub fn tile_buffer_ptr(&self) -> *const TileInstance {
        self.tile_buffer.as_ptr()
    }

    pub fn tile_buffer_len(&self) -> usize {
        self.tile_buffer.len()
    }

    pub fn sound_events_ptr(&self) -> *const SoundEvent {
        self.sound_events.as_ptr()
    }

    pub fn sound_events_len(&self) -> usize {
        self.sound_events.len()
    }

    /// Last tick's events as a JSON array.
    pub fn events_json(&self) -> String {
        serde_json::to_string(&self.events).unwrap_or_else(|e| {
            log::warn!("beach-match: could not encode events: {}", e);
            "[]".to_string()
        })
    }
}
