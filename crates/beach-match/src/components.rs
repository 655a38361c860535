use serde::{Deserialize, Serialize};

/// Piece kinds that can occupy a board cell.
/// `Wave` never spawns from refill; it only appears after a wave crash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PieceKind {
    BeachBall = 0,
    Microphone = 1,
    Rocket = 2,
    PalmTree = 3,
    Boat = 4,
    Wave = 5,
}

impl PieceKind {
    /// Kinds drawn when generating or refilling the board.
    pub const SPAWNABLE: [PieceKind; 5] = [
        Self::BeachBall,
        Self::Microphone,
        Self::Rocket,
        Self::PalmTree,
        Self::Boat,
    ];

    /// Trivia category asked after a match of this kind, if any.
    pub fn quiz_kind(self) -> Option<QuizKind> {
        match self {
            PieceKind::Microphone => Some(QuizKind::Song),
            PieceKind::Rocket => Some(QuizKind::SpaceCoast),
            PieceKind::PalmTree => Some(QuizKind::FloridaBeach),
            PieceKind::BeachBall | PieceKind::Boat | PieceKind::Wave => None,
        }
    }
}

/// Power-up kinds. The first three come out of match geometry, the next
/// three are awarded by engagement, and `DoublePoints` rides on wave tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum PowerUpKind {
    LineClear = 0,
    ColorBomb = 1,
    Lightning = 2,
    MusicNote = 3,
    RadioWave = 4,
    BeachBomb = 5,
    DoublePoints = 6,
}

impl PowerUpKind {
    pub const ALL: [PowerUpKind; 7] = [
        Self::LineClear,
        Self::ColorBomb,
        Self::Lightning,
        Self::MusicNote,
        Self::RadioWave,
        Self::BeachBomb,
        Self::DoublePoints,
    ];

    /// Decode the wire value used by the bridge.
    pub fn from_u8(v: u8) -> Option<Self> {
        Self::ALL.get(v as usize).copied()
    }

    pub fn description(self) -> &'static str {
        match self {
            PowerUpKind::LineClear => "Clears entire row and column",
            PowerUpKind::ColorBomb => "Removes all pieces of selected color",
            PowerUpKind::Lightning => "Clears 3x3 area around piece",
            PowerUpKind::MusicNote => "Clears all adjacent pieces with bonus",
            PowerUpKind::RadioWave => "Creates expanding chain reaction",
            PowerUpKind::BeachBomb => "Mega-clear 5x5 area with high scores",
            PowerUpKind::DoublePoints => "Wave piece gives double points when matched",
        }
    }
}

/// Trivia categories. Content lives with the trivia collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum QuizKind {
    Song = 0,
    SpaceCoast = 1,
    FloridaBeach = 2,
}

/// Sponsor interactions that grant a one-time bonus per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum SponsorKind {
    Ad = 0,
    Video = 1,
    Link = 2,
}

impl SponsorKind {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(SponsorKind::Ad),
            1 => Some(SponsorKind::Video),
            2 => Some(SponsorKind::Link),
            _ => None,
        }
    }

    /// (score bonus, lives granted)
    pub fn reward(self) -> (u32, u8) {
        match self {
            SponsorKind::Ad => (50, 1),
            SponsorKind::Video => (100, 2),
            SponsorKind::Link => (75, 1),
        }
    }
}

/// Where an engagement power-up came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementSource {
    Stream,
    Sponsor,
    SongQuiz,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchShape {
    Line,
    LShape,
    TShape,
}

/// Audio clips the core may ask the audio collaborator to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClipId {
    GameOver = 0,
    BigCascade = 1,
}

/// Sound cues published for the host, one byte each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SoundEvent {
    Swap = 0,
    Match = 1,
    PowerUp = 2,
    Shuffle = 3,
    LifeLost = 4,
    GameOver = 5,
}

pub const DEFAULT_ROWS: usize = 8;
pub const DEFAULT_COLS: usize = 8;
pub const MIN_MATCH: usize = 3;

/// Score for a run of length L is `BASE_MATCH_SCORE * (L - 2)`.
pub const BASE_MATCH_SCORE: u32 = 50;

/// Added to the combo multiplier for each cascade pass after the first.
pub const COMBO_STEP: f64 = 0.1;

/// A cascade scoring more than this plays the big-cascade clip.
pub const BIG_CASCADE_SCORE: u32 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiz_mapping_covers_trivia_pieces_only() {
        assert_eq!(PieceKind::Microphone.quiz_kind(), Some(QuizKind::Song));
        assert_eq!(PieceKind::Rocket.quiz_kind(), Some(QuizKind::SpaceCoast));
        assert_eq!(PieceKind::PalmTree.quiz_kind(), Some(QuizKind::FloridaBeach));
        assert_eq!(PieceKind::BeachBall.quiz_kind(), None);
        assert_eq!(PieceKind::Boat.quiz_kind(), None);
        assert_eq!(PieceKind::Wave.quiz_kind(), None);
    }

    #[test]
    fn spawnable_excludes_wave() {
        assert!(!PieceKind::SPAWNABLE.contains(&PieceKind::Wave));
    }

    #[test]
    fn power_up_wire_values_round_trip() {
        for kind in PowerUpKind::ALL {
            assert_eq!(PowerUpKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(PowerUpKind::from_u8(7), None);
    }

    #[test]
    fn sponsor_rewards() {
        assert_eq!(SponsorKind::Ad.reward(), (50, 1));
        assert_eq!(SponsorKind::Video.reward(), (100, 2));
        assert_eq!(SponsorKind::Link.reward(), (75, 1));
        assert_eq!(SponsorKind::from_u8(3), None);
    }
}
