use serde::Deserialize;

use crate::components::{DEFAULT_COLS, DEFAULT_ROWS};

/// Tuning knobs for a game session. All durations are milliseconds of
/// session time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub rows: usize,
    pub cols: usize,
    pub starting_lives: u8,
    /// Engagement rewards never push lives above this.
    pub max_lives: u8,
    /// Length of the always-on life countdown.
    pub life_countdown_ms: u64,
    /// Pause between a swap and the match check (swap animation).
    pub swap_check_delay_ms: u64,
    /// Pause between cascade passes.
    pub cascade_step_delay_ms: u64,
    pub shuffle_delay_ms: u64,
    pub engagement_tick_ms: u64,
    pub hint_delay_ms: u64,
    pub hint_cooldown_ms: u64,
    pub hint_visible_ms: u64,
    pub quiz_cooldown_ms: u64,
    pub quiz_chance: f64,
    pub quiz_min_matches: u32,
    pub wave_crash_cooldown_ms: u64,
    pub wave_crash_chance: f64,
    pub wave_crash_min_matches: u32,
    pub wave_crash_delay_ms: u64,
    pub stream_life_interval_ms: u64,
    pub stream_bonus_interval_ms: u64,
    pub stream_bonus_points: u32,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
            starting_lives: 3,
            max_lives: 5,
            life_countdown_ms: 60_000,
            swap_check_delay_ms: 300,
            cascade_step_delay_ms: 200,
            shuffle_delay_ms: 800,
            engagement_tick_ms: 1_000,
            hint_delay_ms: 3_000,
            hint_cooldown_ms: 90_000,
            hint_visible_ms: 1_500,
            quiz_cooldown_ms: 2 * 60 * 1_000,
            quiz_chance: 0.5,
            quiz_min_matches: 2,
            wave_crash_cooldown_ms: 3 * 60 * 1_000,
            wave_crash_chance: 0.02,
            wave_crash_min_matches: 10,
            wave_crash_delay_ms: 1_000,
            stream_life_interval_ms: 2 * 60 * 1_000,
            stream_bonus_interval_ms: 2 * 60 * 1_000,
            stream_bonus_points: 100,
        }
    }
}

impl GameConfig {
    /// Parse a partial JSON override; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut config: GameConfig = serde_json::from_str(json)?;
        config.sanitize();
        Ok(config)
    }

    /// Clamp values the engine cannot work with.
    fn sanitize(&mut self) {
        // Anything narrower than a run cannot hold a match.
        self.rows = self.rows.max(3);
        self.cols = self.cols.max(3);
        self.max_lives = self.max_lives.max(1);
        self.starting_lives = self.starting_lives.clamp(1, self.max_lives);
        self.life_countdown_ms = self.life_countdown_ms.max(1);
        self.engagement_tick_ms = self.engagement_tick_ms.max(1);
        self.quiz_chance = self.quiz_chance.clamp(0.0, 1.0);
        self.wave_crash_chance = self.wave_crash_chance.clamp(0.0, 1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_game_constants() {
        let c = GameConfig::default();
        assert_eq!((c.rows, c.cols), (8, 8));
        assert_eq!(c.starting_lives, 3);
        assert_eq!(c.life_countdown_ms, 60_000);
        assert_eq!(c.quiz_cooldown_ms, 120_000);
        assert_eq!(c.wave_crash_cooldown_ms, 180_000);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let c = GameConfig::from_json(r#"{ "starting_lives": 4, "quiz_chance": 1.0 }"#).unwrap();
        assert_eq!(c.starting_lives, 4);
        assert_eq!(c.quiz_chance, 1.0);
        assert_eq!(c.hint_delay_ms, 3_000);
    }

    #[test]
    fn sanitize_clamps_bad_values() {
        let c = GameConfig::from_json(r#"{ "rows": 1, "starting_lives": 9, "wave_crash_chance": 3.0 }"#)
            .unwrap();
        assert_eq!(c.rows, 3);
        assert_eq!(c.starting_lives, 5);
        assert_eq!(c.wave_crash_chance, 1.0);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(GameConfig::from_json("{ rows: ").is_err());
    }
}
