//! Narrow seams to the subsystems the engine does not own: the audio
//! stream, sound playback and a key-value blob store. Failures here are
//! never fatal; the session logs them and carries on.

use std::cell::Cell;
use std::collections::HashMap;
use std::rc::Rc;

use thiserror::Error;

use crate::components::ClipId;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("audio playback failed: {0}")]
    Audio(String),
    #[error("storage failed: {0}")]
    Store(String),
    #[error("decode failed: {0}")]
    Decode(#[from] serde_json::Error),
}

/// The companion radio stream.
pub trait StreamSource {
    fn is_streaming(&self) -> bool;
    /// Seconds the current stream has been playing.
    fn stream_time_secs(&self) -> u64;
}

/// Sound effects and voice clips. Fire-and-forget.
pub trait AudioSink {
    fn play_power_up_sound(&mut self) -> Result<(), CollaboratorError>;
    fn play_clip(&mut self, clip: ClipId) -> Result<(), CollaboratorError>;
}

/// Opaque string blobs under string keys.
pub trait BlobStore {
    fn load(&self, key: &str) -> Result<Option<String>, CollaboratorError>;
    fn save(&mut self, key: &str, blob: &str) -> Result<(), CollaboratorError>;
}

/// Stream state pushed in by the host. Clones share the same state, so the
/// host keeps one handle and the session reads through another.
#[derive(Debug, Clone, Default)]
pub struct HostStream {
    state: Rc<Cell<(bool, u64)>>,
}

impl HostStream {
    pub fn set(&self, streaming: bool, stream_time_secs: u64) {
        self.state.set((streaming, stream_time_secs));
    }
}

impl StreamSource for HostStream {
    fn is_streaming(&self) -> bool {
        self.state.get().0
    }

    fn stream_time_secs(&self) -> u64 {
        self.state.get().1
    }
}

/// Drops every sound.
#[derive(Debug, Default)]
pub struct SilentAudio;

impl AudioSink for SilentAudio {
    fn play_power_up_sound(&mut self) -> Result<(), CollaboratorError> {
        Ok(())
    }

    fn play_clip(&mut self, _clip: ClipId) -> Result<(), CollaboratorError> {
        Ok(())
    }
}

/// In-process store; contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: HashMap<String, String>,
}

impl BlobStore for MemoryBlobStore {
    fn load(&self, key: &str) -> Result<Option<String>, CollaboratorError> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<(), CollaboratorError> {
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_stream_handles_share_state() {
        let host = HostStream::default();
        let session_side = host.clone();
        assert!(!session_side.is_streaming());
        host.set(true, 42);
        assert!(session_side.is_streaming());
        assert_eq!(session_side.stream_time_secs(), 42);
    }

    #[test]
    fn memory_store_round_trips() {
        let mut store = MemoryBlobStore::default();
        assert!(store.load("k").unwrap().is_none());
        store.save("k", "v").unwrap();
        assert_eq!(store.load("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn decode_errors_convert() {
        let err: CollaboratorError = serde_json::from_str::<u32>("x").unwrap_err().into();
        assert!(matches!(err, CollaboratorError::Decode(_)));
        assert!(err.to_string().starts_with("decode failed"));
    }
}
