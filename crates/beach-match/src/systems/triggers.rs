use crate::components::{PieceKind, QuizKind};
use crate::config::GameConfig;
use crate::systems::board::Rng;

/// True when `cooldown_ms` has passed since `last`, or nothing fired yet.
fn cooled_down(last: Option<u64>, now_ms: u64, cooldown_ms: u64) -> bool {
    match last {
        Some(t) => now_ms.saturating_sub(t) >= cooldown_ms,
        None => true,
    }
}

/// Cooldown-gated side events. One value per game session; the timestamps
/// are session-clock milliseconds.
#[derive(Debug, Clone)]
pub struct TriggerPolicy {
    quiz_cooldown_ms: u64,
    quiz_chance: f64,
    quiz_min_matches: u32,
    wave_cooldown_ms: u64,
    wave_chance: f64,
    wave_min_matches: u32,
    hint_delay_ms: u64,
    hint_cooldown_ms: u64,

    /// Shared by every quiz kind.
    last_quiz_ms: Option<u64>,
    last_wave_ms: Option<u64>,
    last_hint_ms: Option<u64>,
}

impl TriggerPolicy {
    pub fn new(config: &GameConfig) -> Self {
        TriggerPolicy {
            quiz_cooldown_ms: config.quiz_cooldown_ms,
            quiz_chance: config.quiz_chance,
            quiz_min_matches: config.quiz_min_matches,
            wave_cooldown_ms: config.wave_crash_cooldown_ms,
            wave_chance: config.wave_crash_chance,
            wave_min_matches: config.wave_crash_min_matches,
            hint_delay_ms: config.hint_delay_ms,
            hint_cooldown_ms: config.hint_cooldown_ms,
            last_quiz_ms: None,
            last_wave_ms: None,
            last_hint_ms: None,
        }
    }

    /// Decide whether a match of `kind` asks a trivia question. Only pieces
    /// with a quiz category qualify. On success the shared cooldown starts.
    pub fn should_trigger_quiz(
        &mut self,
        kind: PieceKind,
        total_matches: u32,
        now_ms: u64,
        rng: &mut Rng,
    ) -> Option<QuizKind> {
        let quiz = kind.quiz_kind()?;
        if total_matches < self.quiz_min_matches
            || !cooled_down(self.last_quiz_ms, now_ms, self.quiz_cooldown_ms)
        {
            return None;
        }
        if !rng.chance(self.quiz_chance) {
            return None;
        }
        self.last_quiz_ms = Some(now_ms);
        Some(quiz)
    }

    pub fn should_trigger_wave_crash(&mut self, total_matches: u32, now_ms: u64, rng: &mut Rng) -> bool {
        if total_matches < self.wave_min_matches
            || !cooled_down(self.last_wave_ms, now_ms, self.wave_cooldown_ms)
        {
            return false;
        }
        if !rng.chance(self.wave_chance) {
            return false;
        }
        self.last_wave_ms = Some(now_ms);
        true
    }

    /// A hint is due once the player has moved at least once, has been
    /// idle for the hint delay, and the last hint is outside the cooldown.
    pub fn hint_due(&self, now_ms: u64, last_activity_ms: u64, has_made_first_move: bool) -> bool {
        has_made_first_move
            && now_ms.saturating_sub(last_activity_ms) >= self.hint_delay_ms
            && cooled_down(self.last_hint_ms, now_ms, self.hint_cooldown_ms)
    }

    pub fn record_hint(&mut self, now_ms: u64) {
        self.last_hint_ms = Some(now_ms);
    }

    /// Any player action re-arms hints.
    pub fn clear_hint_cooldown(&mut self) {
        self.last_hint_ms = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(quiz_chance: f64, wave_chance: f64) -> TriggerPolicy {
        let config = GameConfig {
            quiz_chance,
            wave_crash_chance: wave_chance,
            ..GameConfig::default()
        };
        TriggerPolicy::new(&config)
    }

    #[test]
    fn quiz_kind_follows_piece() {
        let mut p = policy(1.0, 0.0);
        let mut rng = Rng::new(1);
        assert_eq!(p.should_trigger_quiz(PieceKind::BeachBall, 5, 0, &mut rng), None);
        assert_eq!(
            p.should_trigger_quiz(PieceKind::Rocket, 5, 0, &mut rng),
            Some(QuizKind::SpaceCoast)
        );
    }

    #[test]
    fn quiz_needs_enough_matches() {
        let mut p = policy(1.0, 0.0);
        let mut rng = Rng::new(1);
        assert_eq!(p.should_trigger_quiz(PieceKind::Microphone, 1, 0, &mut rng), None);
        assert!(p.should_trigger_quiz(PieceKind::Microphone, 2, 0, &mut rng).is_some());
    }

    #[test]
    fn quiz_cooldown_is_shared_across_kinds() {
        let mut p = policy(1.0, 0.0);
        let mut rng = Rng::new(1);
        assert_eq!(
            p.should_trigger_quiz(PieceKind::Microphone, 3, 1_000, &mut rng),
            Some(QuizKind::Song)
        );
        // A different category is still blocked by the same timestamp.
        assert_eq!(p.should_trigger_quiz(PieceKind::PalmTree, 3, 60_000, &mut rng), None);
        assert_eq!(
            p.should_trigger_quiz(PieceKind::PalmTree, 3, 121_000, &mut rng),
            Some(QuizKind::FloridaBeach)
        );
    }

    #[test]
    fn zero_chance_never_fires_or_starts_cooldown() {
        let mut p = policy(0.0, 0.0);
        let mut rng = Rng::new(9);
        for t in 0..50 {
            assert_eq!(p.should_trigger_quiz(PieceKind::Rocket, 10, t, &mut rng), None);
        }
        assert!(p.last_quiz_ms.is_none());
    }

    #[test]
    fn wave_crash_gates() {
        let mut p = policy(0.0, 1.0);
        let mut rng = Rng::new(3);
        assert!(!p.should_trigger_wave_crash(9, 0, &mut rng));
        assert!(p.should_trigger_wave_crash(10, 0, &mut rng));
        assert!(!p.should_trigger_wave_crash(50, 179_999, &mut rng));
        assert!(p.should_trigger_wave_crash(50, 180_000, &mut rng));
    }

    #[test]
    fn hint_timing() {
        let mut p = policy(0.0, 0.0);
        assert!(!p.hint_due(10_000, 0, false));
        assert!(!p.hint_due(2_999, 0, true));
        assert!(p.hint_due(3_000, 0, true));

        p.record_hint(3_000);
        assert!(!p.hint_due(10_000, 0, true));
        assert!(p.hint_due(93_000, 0, true));

        p.clear_hint_cooldown();
        assert!(p.hint_due(10_000, 0, true));
    }
}
