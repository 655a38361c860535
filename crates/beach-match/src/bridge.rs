use std::cell::RefCell;
use std::rc::Rc;
use wasm_bindgen::prelude::*;

use crate::collaborators::{AudioSink, BlobStore, CollaboratorError, HostStream};
use crate::components::{ClipId, PowerUpKind, SponsorKind};
use crate::config::GameConfig;
use crate::grid::Cell;
use crate::state::GameSession;
use crate::systems::engagement::BeachEvent;

const MS_PER_DAY: f64 = 86_400_000.0;

/// Session plus the host-side handles its collaborators share.
struct Bridge {
    session: GameSession,
    stream: HostStream,
    clips: Rc<RefCell<Vec<u8>>>,
}

thread_local! {
    static GAME: RefCell<Option<Bridge>> = RefCell::new(None);
}

/// Run `f` against the live game. `None` before `init_game`.
fn with_game<R>(f: impl FnOnce(&mut Bridge) -> R) -> Option<R> {
    GAME.with(|cell| {
        let mut borrow = cell.borrow_mut();
        match borrow.as_mut() {
            Some(bridge) => Some(f(bridge)),
            None => {
                log::warn!("beach-match-sim: game not initialized, call init_game() first");
                None
            }
        }
    })
}

/// Browser localStorage as a blob store.
struct LocalStorage;

impl LocalStorage {
    fn storage() -> Result<web_sys::Storage, CollaboratorError> {
        web_sys::window()
            .ok_or_else(|| CollaboratorError::Store("no window".into()))?
            .local_storage()
            .map_err(|e| CollaboratorError::Store(format!("{:?}", e)))?
            .ok_or_else(|| CollaboratorError::Store("localStorage unavailable".into()))
    }
}

impl BlobStore for LocalStorage {
    fn load(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        Self::storage()?
            .get_item(key)
            .map_err(|e| CollaboratorError::Store(format!("{:?}", e)))
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<(), CollaboratorError> {
        Self::storage()?
            .set_item(key, blob)
            .map_err(|e| CollaboratorError::Store(format!("{:?}", e)))
    }
}

/// Queues clip ids for the page to play. Power-up sounds ride on the
/// sound event buffer.
struct ClipQueue {
    clips: Rc<RefCell<Vec<u8>>>,
}

impl AudioSink for ClipQueue {
    fn play_power_up_sound(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn play_clip(&mut self, clip: ClipId) -> Result<(), CollaboratorError> {
        self.clips.borrow_mut().push(clip as u8);
        Ok(())
    }
}

fn today() -> u64 {
    (js_sys::Date::now() / MS_PER_DAY).floor() as u64
}

/// Start a game. `config_json` optionally overrides `GameConfig` fields.
#[wasm_bindgen]
pub fn init_game(seed: f64, config_json: Option<String>) {
    let config = match config_json.as_deref() {
        Some(json) => GameConfig::from_json(json).unwrap_or_else(|e| {
            log::warn!("beach-match-sim: bad config, using defaults: {}", e);
            GameConfig::default()
        }),
        None => GameConfig::default(),
    };

    let stream = HostStream::default();
    let clips = Rc::new(RefCell::new(Vec::new()));
    let mut session = GameSession::with_collaborators(
        config,
        seed as u64,
        Box::new(stream.clone()),
        Box::new(ClipQueue { clips: clips.clone() }),
        Box::new(LocalStorage),
    );
    let streak = session.record_play_day(today());

    GAME.with(|cell| {
        *cell.borrow_mut() = Some(Bridge {
            session,
            stream,
            clips,
        });
    });
    log::info!(
        "beach-match-sim: game initialized with seed {}, daily streak {}",
        seed as u64,
        streak
    );
}

#[wasm_bindgen]
pub fn tick_game(dt_ms: f64) {
    with_game(|b| b.session.tick(dt_ms.max(0.0) as u64));
}

#[wasm_bindgen]
pub fn select_cell(row: u32, col: u32) -> bool {
    with_game(|b| b.session.select(Cell::new(row as usize, col as usize))).unwrap_or_default()
}

/// Returns true when the swap was taken; legality is reported by events.
#[wasm_bindgen]
pub fn request_swap(row1: u32, col1: u32, row2: u32, col2: u32) -> bool {
    with_game(|b| {
        let a = Cell::new(row1 as usize, col1 as usize);
        let c = Cell::new(row2 as usize, col2 as usize);
        b.session.request_swap(a, c) == crate::state::SwapOutcome::Accepted
    })
    .unwrap_or_default()
}

/// kind: `PowerUpKind` wire value (0=LineClear .. 6=DoublePoints)
#[wasm_bindgen]
pub fn activate_power_up(kind: u8, row: u32, col: u32) -> bool {
    let Some(kind) = PowerUpKind::from_u8(kind) else {
        return false;
    };
    with_game(|b| b.session.activate_power_up(kind, Cell::new(row as usize, col as usize)))
        .unwrap_or_default()
}

/// Returns true if the game is now paused.
#[wasm_bindgen]
pub fn toggle_pause() -> bool {
    with_game(|b| b.session.toggle_pause()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn reset_game(seed: f64) {
    with_game(|b| {
        b.session.reset(seed as u64);
        b.clips.borrow_mut().clear();
    });
}

/// kind: 0=Ad, 1=Video, 2=Link
#[wasm_bindgen]
pub fn sponsor_click(kind: u8) -> bool {
    let Some(kind) = SponsorKind::from_u8(kind) else {
        return false;
    };
    with_game(|b| b.session.sponsor_click(kind)).unwrap_or_default()
}

#[wasm_bindgen]
pub fn answer_quiz(correct: bool) -> bool {
    with_game(|b| b.session.answer_quiz(correct)).unwrap_or_default()
}

/// Push the audio stream's state; read on the next engagement tick.
#[wasm_bindgen]
pub fn set_stream_state(streaming: bool, stream_time_secs: f64) {
    with_game(|b| b.stream.set(streaming, stream_time_secs.max(0.0) as u64));
}

/// Add a timed score event (JSON `BeachEvent`). `start_ms`/`end_ms` are on
/// the session clock, see `get_now_ms`. False when it does not parse.
#[wasm_bindgen]
pub fn add_beach_event(json: &str) -> bool {
    let event: BeachEvent = match serde_json::from_str(json) {
        Ok(event) => event,
        Err(e) => {
            log::warn!("beach-match-sim: ignoring bad event: {}", e);
            return false;
        }
    };
    with_game(|b| b.session.calendar_mut().add(event)).is_some()
}

#[wasm_bindgen]
pub fn get_score() -> u32 {
    with_game(|b| b.session.score()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_lives() -> u8 {
    with_game(|b| b.session.lives()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_combo() -> u32 {
    with_game(|b| b.session.combo()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_countdown_secs() -> u32 {
    with_game(|b| b.session.countdown_secs() as u32).unwrap_or_default()
}

/// Session clock in ms. It stops while paused; `add_beach_event` times are
/// on this clock.
#[wasm_bindgen]
pub fn get_now_ms() -> f64 {
    with_game(|b| b.session.now_ms() as f64).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_total_matches() -> u32 {
    with_game(|b| b.session.total_matches()).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_song_streak() -> u32 {
    with_game(|b| b.session.song_streak()).unwrap_or_default()
}

/// 0=Active, 1=Paused, 2=GameOver
#[wasm_bindgen]
pub fn get_status() -> u8 {
    with_game(|b| b.session.status() as u8).unwrap_or_default()
}

/// 0=Idle, 1=Swapping, 2=Cascading, 3=Shuffling
#[wasm_bindgen]
pub fn get_phase() -> u8 {
    with_game(|b| b.session.phase().code()).unwrap_or_default()
}

/// Open quiz category, or -1 when none.
#[wasm_bindgen]
pub fn get_pending_quiz() -> i32 {
    with_game(|b| b.session.pending_quiz().map_or(-1, |q| q as i32)).unwrap_or(-1)
}

/// Power-up inventory as wire values.
#[wasm_bindgen]
pub fn get_power_ups() -> Vec<u8> {
    with_game(|b| b.session.power_ups().iter().map(|&p| p as u8).collect()).unwrap_or_default()
}

/// `[row, col]` of the selected cell, or empty.
#[wasm_bindgen]
pub fn get_selected() -> Vec<u32> {
    with_game(|b| {
        b.session
            .selected()
            .map(|c| vec![c.row as u32, c.col as u32])
            .unwrap_or_default()
    })
    .unwrap_or_default()
}

/// `[row1, col1, row2, col2]` of the visible hint, or empty.
#[wasm_bindgen]
pub fn get_hint() -> Vec<u32> {
    with_game(|b| {
        b.session
            .hint()
            .map(|(a, c)| vec![a.row as u32, a.col as u32, c.row as u32, c.col as u32])
            .unwrap_or_default()
    })
    .unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_high_score() -> u32 {
    with_game(|b| b.session.metrics().high_score).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_daily_streak() -> u32 {
    with_game(|b| b.session.metrics().daily_streak_days).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_board_rows() -> u32 {
    with_game(|b| b.session.board.rows() as u32).unwrap_or_default()
}

#[wasm_bindgen]
pub fn get_board_cols() -> u32 {
    with_game(|b| b.session.board.cols() as u32).unwrap_or_default()
}

/// Pointer to the tile snapshot (6 u32s per tile: id, row, col, kind,
/// power_up, flags).
#[wasm_bindgen]
pub fn get_tile_buffer_ptr() -> *const u32 {
    with_game(|b| b.session.tile_buffer_ptr() as *const u32).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_tile_buffer_len() -> u32 {
    with_game(|b| b.session.tile_buffer_len() as u32).unwrap_or_default()
}

/// Returns a pointer to the sound events buffer (u8 per event).
#[wasm_bindgen]
pub fn get_sound_events_ptr() -> *const u8 {
    with_game(|b| b.session.sound_events_ptr() as *const u8).unwrap_or(std::ptr::null())
}

#[wasm_bindgen]
pub fn get_sound_events_len() -> u32 {
    with_game(|b| b.session.sound_events_len() as u32).unwrap_or_default()
}

/// Events published by the last tick, as a JSON array.
#[wasm_bindgen]
pub fn get_events_json() -> String {
    with_game(|b| b.session.events_json()).unwrap_or_else(|| "[]".to_string())
}

/// Drain queued clip ids (0=GameOver, 1=BigCascade).
#[wasm_bindgen]
pub fn take_clips() -> Vec<u8> {
    with_game(|b| std::mem::take(&mut *b.clips.borrow_mut())).unwrap_or_default()
}
