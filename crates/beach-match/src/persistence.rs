use serde::{Deserialize, Serialize};

use crate::collaborators::{BlobStore, CollaboratorError};
use crate::systems::engagement::next_daily_streak;

/// Blob store key for the engagement record.
pub const METRICS_KEY: &str = "beach-match-engagement";

/// Long-lived engagement counters, kept across games.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementMetrics {
    /// Seconds of streaming seen while playing.
    pub stream_time: u64,
    pub sponsor_clicks: u32,
    pub song_quiz_completed: u32,
    pub song_quiz_correct: u32,
    pub daily_streak_days: u32,
    pub total_matches: u32,
    pub high_score: u32,
    /// Days since the epoch of the last play.
    pub last_play_day: Option<u64>,
}

impl EngagementMetrics {
    /// Raise the high score. True when `score` is a new best.
    pub fn record_score(&mut self, score: u32) -> bool {
        if score > self.high_score {
            self.high_score = score;
            true
        } else {
            false
        }
    }

    /// Update the daily streak for a play on `today`. Returns the streak.
    pub fn record_play_day(&mut self, today: u64) -> u32 {
        self.daily_streak_days = next_daily_streak(self.daily_streak_days, self.last_play_day, today);
        self.last_play_day = Some(today);
        self.daily_streak_days
    }
}

/// Reads and writes `EngagementMetrics` through a blob store.
pub struct MetricsStore {
    store: Box<dyn BlobStore>,
}

impl MetricsStore {
    pub fn new(store: Box<dyn BlobStore>) -> Self {
        MetricsStore { store }
    }

    pub fn try_load(&self) -> Result<EngagementMetrics, CollaboratorError> {
        match self.store.load(METRICS_KEY)? {
            Some(blob) => Ok(serde_json::from_str(&blob)?),
            None => Ok(EngagementMetrics::default()),
        }
    }

    /// Load, falling back to a fresh record on any failure.
    pub fn load(&self) -> EngagementMetrics {
        self.try_load().unwrap_or_else(|e| {
            log::warn!("engagement metrics unavailable, starting fresh: {}", e);
            EngagementMetrics::default()
        })
    }

    pub fn try_save(&mut self, metrics: &EngagementMetrics) -> Result<(), CollaboratorError> {
        let blob = serde_json::to_string(metrics)?;
        self.store.save(METRICS_KEY, &blob)
    }

    /// Save, logging failures.
    pub fn save(&mut self, metrics: &EngagementMetrics) {
        if let Err(e) = self.try_save(metrics) {
            log::warn!("failed to save engagement metrics: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryBlobStore;

    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn load(&self, _key: &str) -> Result<Option<String>, CollaboratorError> {
            Err(CollaboratorError::Store("quota exceeded".into()))
        }

        fn save(&mut self, _key: &str, _blob: &str) -> Result<(), CollaboratorError> {
            Err(CollaboratorError::Store("quota exceeded".into()))
        }
    }

    #[test]
    fn save_then_load() {
        let mut store = MetricsStore::new(Box::new(MemoryBlobStore::default()));
        let mut m = EngagementMetrics::default();
        m.high_score = 1200;
        m.record_play_day(19_000);
        store.save(&m);
        assert_eq!(store.load(), m);
    }

    #[test]
    fn missing_fields_default() {
        let m: EngagementMetrics = serde_json::from_str(r#"{"high_score": 10}"#).unwrap();
        assert_eq!(m.high_score, 10);
        assert_eq!(m.last_play_day, None);
    }

    #[test]
    fn corrupt_blob_falls_back() {
        let mut inner = MemoryBlobStore::default();
        inner.save(METRICS_KEY, "not json").unwrap();
        let store = MetricsStore::new(Box::new(inner));
        assert!(matches!(store.try_load(), Err(CollaboratorError::Decode(_))));
        assert_eq!(store.load(), EngagementMetrics::default());
    }

    #[test]
    fn broken_store_is_swallowed() {
        let mut store = MetricsStore::new(Box::new(BrokenStore));
        assert_eq!(store.load(), EngagementMetrics::default());
        store.save(&EngagementMetrics::default());
        assert!(store.try_save(&EngagementMetrics::default()).is_err());
    }

    #[test]
    fn high_score_only_rises() {
        let mut m = EngagementMetrics::default();
        assert!(m.record_score(500));
        assert!(!m.record_score(400));
        assert_eq!(m.high_score, 500);
    }

    #[test]
    fn play_days_build_a_streak() {
        let mut m = EngagementMetrics::default();
        assert_eq!(m.record_play_day(10), 1);
        assert_eq!(m.record_play_day(10), 1);
        assert_eq!(m.record_play_day(11), 2);
        assert_eq!(m.record_play_day(15), 1);
    }
}
