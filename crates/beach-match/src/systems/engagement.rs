//! Rewards that come from outside the match loop: listening to the stream,
//! sponsor clicks and trivia answers. Also the timed event calendar that
//! feeds the cascade's event multiplier.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::components::SponsorKind;
use crate::config::GameConfig;

/// Streamed minutes per stream reward step.
const STREAM_STEP_MINUTES: u64 = 5;

const QUIZ_CORRECT_POINTS: u32 = 200;
const QUIZ_STREAK_MIN: u32 = 3;
const QUIZ_STREAK_BONUS: u32 = 50;

/// Add `gain` lives without going over `max`.
pub fn capped_lives(lives: u8, gain: u8, max: u8) -> u8 {
    lives.saturating_add(gain).min(max)
}

/// Lives a listener is entitled to after `stream_secs` of streaming:
/// one extra per five minutes, capped.
pub fn stream_lives_target(stream_secs: u64, base: u8, max: u8) -> u8 {
    let steps = (stream_secs / 60) / STREAM_STEP_MINUTES;
    let steps = u8::try_from(steps).unwrap_or(u8::MAX);
    capped_lives(base, steps, max)
}

/// What one stream tick granted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamReward {
    /// New life total, when lives were raised.
    pub lives: Option<u8>,
    pub bonus_points: u32,
}

/// Interval gates for the stream rewards.
#[derive(Debug, Clone, Default)]
pub struct StreamTracker {
    last_life_ms: Option<u64>,
    last_bonus_ms: Option<u64>,
    /// Bonus points already paid out for the current stream.
    paid_bonus: u32,
}

impl StreamTracker {
    pub fn tick(&mut self, stream_secs: u64, lives: u8, now_ms: u64, config: &GameConfig) -> StreamReward {
        let mut reward = StreamReward::default();

        let target = stream_lives_target(stream_secs, config.starting_lives, config.max_lives);
        let life_open = self
            .last_life_ms
            .is_none_or(|t| now_ms.saturating_sub(t) > config.stream_life_interval_ms);
        if target > lives && life_open {
            reward.lives = Some(target);
            self.last_life_ms = Some(now_ms);
        }

        let steps = (stream_secs / 60) / STREAM_STEP_MINUTES;
        let owed = u32::try_from(steps)
            .unwrap_or(u32::MAX)
            .saturating_mul(config.stream_bonus_points);
        let bonus_open = self
            .last_bonus_ms
            .is_none_or(|t| now_ms.saturating_sub(t) > config.stream_bonus_interval_ms);
        if owed > self.paid_bonus && bonus_open {
            reward.bonus_points = config.stream_bonus_points;
            self.paid_bonus = owed;
            self.last_bonus_ms = Some(now_ms);
        }

        reward
    }
}

/// Sponsor kinds already rewarded this session.
#[derive(Debug, Clone, Default)]
pub struct SponsorLedger {
    claimed: HashSet<SponsorKind>,
}

impl SponsorLedger {
    /// First click of a kind returns its (points, lives); repeats get nothing.
    pub fn claim(&mut self, kind: SponsorKind) -> Option<(u32, u8)> {
        if self.claimed.insert(kind) {
            Some(kind.reward())
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.claimed.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuizOutcome {
    pub points: u32,
    pub lives_gained: u8,
    pub streak: u32,
}

/// Score a trivia answer against the running streak. Wrong answers only
/// reset the streak.
pub fn score_quiz_answer(correct: bool, streak: u32) -> QuizOutcome {
    if !correct {
        return QuizOutcome {
            points: 0,
            lives_gained: 0,
            streak: 0,
        };
    }
    let streak = streak + 1;
    let mut points = QUIZ_CORRECT_POINTS;
    if streak >= QUIZ_STREAK_MIN {
        points += streak * QUIZ_STREAK_BONUS;
    }
    QuizOutcome {
        points,
        lives_gained: 1,
        streak,
    }
}

/// Daily streak after playing on day `today` (days since the epoch).
pub fn next_daily_streak(streak: u32, last_day: Option<u64>, today: u64) -> u32 {
    match last_day {
        Some(last) if today == last => streak.max(1),
        Some(last) if today == last + 1 => streak + 1,
        Some(last) if today < last => streak.max(1),
        _ => 1,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BeachEventKind {
    RocketLaunch,
    HurricaneWatch,
    SunnyDay,
    BeachParty,
    HappyHour,
    LateNight,
}

/// A timed promotion. Times are session-clock milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BeachEvent {
    pub id: String,
    pub kind: BeachEventKind,
    pub name: String,
    pub start_ms: u64,
    pub end_ms: u64,
    #[serde(default)]
    pub score_multiplier: Option<f64>,
}

impl BeachEvent {
    pub fn is_active_at(&self, now_ms: u64) -> bool {
        self.start_ms <= now_ms && now_ms < self.end_ms
    }
}

/// Externally supplied events. Their definitions are data; the calendar
/// only answers which are live and what they multiply scores by.
#[derive(Debug, Clone, Default)]
pub struct EventCalendar {
    events: Vec<BeachEvent>,
}

impl EventCalendar {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let events: Vec<BeachEvent> = serde_json::from_str(json)?;
        Ok(EventCalendar { events })
    }

    /// Add an event, replacing any with the same id.
    pub fn add(&mut self, event: BeachEvent) {
        self.events.retain(|e| e.id != event.id);
        self.events.push(event);
    }

    /// Close an event early. False when the id is unknown.
    pub fn end(&mut self, id: &str, now_ms: u64) -> bool {
        match self.events.iter_mut().find(|e| e.id == id) {
            Some(event) => {
                event.end_ms = event.end_ms.min(now_ms);
                true
            }
            None => false,
        }
    }

    pub fn active_at(&self, now_ms: u64) -> impl Iterator<Item = &BeachEvent> {
        self.events.iter().filter(move |e| e.is_active_at(now_ms))
    }

    /// Product of the multipliers of every live event; 1.0 when none.
    pub fn score_multiplier(&self, now_ms: u64) -> f64 {
        self.active_at(now_ms)
            .filter_map(|e| e.score_multiplier)
            .product()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str, start_ms: u64, end_ms: u64, mult: Option<f64>) -> BeachEvent {
        BeachEvent {
            id: id.to_string(),
            kind: BeachEventKind::BeachParty,
            name: id.to_string(),
            start_ms,
            end_ms,
            score_multiplier: mult,
        }
    }

    #[test]
    fn lives_target_grows_every_five_minutes() {
        assert_eq!(stream_lives_target(0, 3, 5), 3);
        assert_eq!(stream_lives_target(299, 3, 5), 3);
        assert_eq!(stream_lives_target(300, 3, 5), 4);
        assert_eq!(stream_lives_target(600, 3, 5), 5);
        assert_eq!(stream_lives_target(6_000, 3, 5), 5);
    }

    #[test]
    fn stream_tick_grants_life_then_waits_for_interval() {
        let config = GameConfig::default();
        let mut tracker = StreamTracker::default();

        let r = tracker.tick(100, 3, 1_000, &config);
        assert_eq!(r, StreamReward::default());

        let r = tracker.tick(300, 3, 2_000, &config);
        assert_eq!(r.lives, Some(4));
        assert_eq!(r.bonus_points, 100);

        // Ten minutes in, but still inside both intervals.
        let r = tracker.tick(600, 4, 60_000, &config);
        assert_eq!(r, StreamReward::default());

        let r = tracker.tick(600, 4, 130_000, &config);
        assert_eq!(r.lives, Some(5));
        assert_eq!(r.bonus_points, 100);

        // Already paid for ten minutes.
        let r = tracker.tick(700, 5, 400_000, &config);
        assert_eq!(r, StreamReward::default());
    }

    #[test]
    fn sponsor_rewards_once_per_kind() {
        let mut ledger = SponsorLedger::default();
        assert_eq!(ledger.claim(SponsorKind::Video), Some((100, 2)));
        assert_eq!(ledger.claim(SponsorKind::Video), None);
        assert_eq!(ledger.claim(SponsorKind::Ad), Some((50, 1)));
        ledger.reset();
        assert_eq!(ledger.claim(SponsorKind::Video), Some((100, 2)));
    }

    #[test]
    fn quiz_streak_bonus_from_third_answer() {
        let a = score_quiz_answer(true, 0);
        assert_eq!((a.points, a.lives_gained, a.streak), (200, 1, 1));
        let b = score_quiz_answer(true, a.streak);
        assert_eq!(b.points, 200);
        let c = score_quiz_answer(true, b.streak);
        assert_eq!((c.points, c.streak), (200 + 150, 3));
        let d = score_quiz_answer(false, c.streak);
        assert_eq!((d.points, d.lives_gained, d.streak), (0, 0, 0));
    }

    #[test]
    fn daily_streak_rules() {
        assert_eq!(next_daily_streak(0, None, 100), 1);
        assert_eq!(next_daily_streak(4, Some(100), 100), 4);
        assert_eq!(next_daily_streak(4, Some(100), 101), 5);
        assert_eq!(next_daily_streak(4, Some(100), 103), 1);
    }

    #[test]
    fn lives_cap() {
        assert_eq!(capped_lives(4, 2, 5), 5);
        assert_eq!(capped_lives(1, 1, 5), 2);
    }

    #[test]
    fn calendar_multiplies_live_events() {
        let mut cal = EventCalendar::default();
        assert_eq!(cal.score_multiplier(0), 1.0);

        cal.add(event("party", 0, 10_000, Some(2.0)));
        cal.add(event("happy", 5_000, 20_000, Some(1.5)));
        cal.add(event("night", 0, 20_000, None));

        assert_eq!(cal.score_multiplier(1_000), 2.0);
        assert_eq!(cal.score_multiplier(6_000), 3.0);
        assert_eq!(cal.score_multiplier(15_000), 1.5);
        assert_eq!(cal.active_at(15_000).count(), 2);

        assert!(cal.end("happy", 16_000));
        assert_eq!(cal.score_multiplier(17_000), 1.0);
        assert!(!cal.end("missing", 0));
    }

    #[test]
    fn calendar_loads_from_json() {
        let json = r#"[{"id":"launch","kind":"rocket_launch","name":"Launch",
            "start_ms":0,"end_ms":1000,"score_multiplier":1.3}]"#;
        let cal = EventCalendar::from_json(json).unwrap();
        assert_eq!(cal.score_multiplier(10), 1.3);
        assert!(EventCalendar::from_json("{").is_err());
    }
}
