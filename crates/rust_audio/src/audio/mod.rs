//! Audio system
//!
//! Background music with transitions, pooled sound effects and mixer
//! reconciliation, driven by one `tick` per frame.
//!
//! Ownership follows the frame loop: the [`AudioManager`] owns the backend,
//! the [`MusicChannel`] owns the music voices and every [`EffectPool`] entry
//! owns exactly one effect voice.

pub mod backend;
pub mod clip;
pub mod effects;
pub mod manager;
pub mod mixer;
pub mod music;
pub mod preferences;

#[cfg(test)]
mod tests;

pub use backend::{AudioBackend, ExternalMixer, SpatialBlend};
pub use clip::{Clip, ClipId, ClipLibrary, ClipLoader, ClipRef};
pub use effects::{EffectCallback, EffectPool, EffectRequest, EffectVoice};
pub use manager::{AudioManager, LifecycleState, TickReport};
pub use mixer::{ChannelGroup, Drift, MixerSystem, VolumeState};
pub use music::{MusicChannel, MusicRequest, MusicState, MusicTransition};
pub use preferences::{FilePreferenceStore, MemoryPreferenceStore, PreferenceStore, PreferenceValue};

pub use crate::foundation::collections::{EffectKey, VoiceHandle};

use crate::config::ConfigError;
use thiserror::Error;

/// Audio system errors
#[derive(Error, Debug)]
pub enum AudioError {
    /// The backend has no output device attached
    #[error("Audio backend not initialized")]
    BackendNotInitialized,

    /// The voice handle does not refer to a live voice
    #[error("Invalid voice handle")]
    InvalidHandle,

    /// The backend failed to start or control playback
    #[error("Playback failed: {0}")]
    PlaybackFailed(String),

    /// A clip could not be resolved by the library or loader
    #[error("Clip not found: {0}")]
    ClipNotFound(String),

    /// A music transition is already pending
    #[error("Music transition already in progress")]
    TransitionInProgress,

    /// The cross-fade voice is still allocated
    #[error("Cross-fade voice already allocated")]
    CrossFadeVoiceBusy,

    /// The manager is not accepting requests in its current lifecycle state
    #[error("Audio manager unavailable while {0:?}")]
    ManagerUnavailable(LifecycleState),

    /// Preference storage failed
    #[error("Preference store error: {0}")]
    Preferences(String),

    /// Configuration failed to load or save
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}
