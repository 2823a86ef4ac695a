//! Audio backend implementations
//!
//! Platform-independent abstraction over device voices. Voices are
//! addressed by [`VoiceHandle`]; a handle whose voice has gone away reports
//! [`AudioError::InvalidHandle`] instead of panicking, so callers treat a
//! missing voice as an ordinary condition.

pub mod simulated;

#[cfg(feature = "rodio")]
pub mod rodio_backend;

use crate::audio::{AudioError, ClipRef};
use crate::foundation::collections::VoiceHandle;
use crate::foundation::math::Vec3;

/// How a voice is positioned
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SpatialBlend {
    /// Non-positional playback
    #[default]
    TwoD,
    /// Positional playback at a world location
    ThreeD(Vec3),
}

impl From<Option<Vec3>> for SpatialBlend {
    fn from(location: Option<Vec3>) -> Self {
        location.map_or(Self::TwoD, Self::ThreeD)
    }
}

/// Audio backend trait for platform abstraction
///
/// Single-threaded: implementations are driven from the frame loop and are
/// not required to be `Send`.
pub trait AudioBackend {
    /// Allocate a new, stopped voice
    fn create_voice(&mut self) -> Result<VoiceHandle, AudioError>;

    /// Stop and free a voice; unknown handles are ignored
    fn release_voice(&mut self, voice: VoiceHandle);

    /// Load a clip into a voice, rewinding it to the start
    fn set_clip(&mut self, voice: VoiceHandle, clip: &ClipRef) -> Result<(), AudioError>;

    /// The clip currently loaded into a voice
    fn clip(&self, voice: VoiceHandle) -> Result<Option<ClipRef>, AudioError>;

    /// Start (or restart after stop) playback
    fn play(&mut self, voice: VoiceHandle) -> Result<(), AudioError>;

    /// Pause playback, keeping the cursor
    fn pause(&mut self, voice: VoiceHandle) -> Result<(), AudioError>;

    /// Resume paused playback
    fn resume(&mut self, voice: VoiceHandle) -> Result<(), AudioError>;

    /// Stop playback and rewind to the start
    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError>;

    /// Whether the voice is currently producing sound (not paused or stopped)
    fn is_playing(&self, voice: VoiceHandle) -> Result<bool, AudioError>;

    /// Whether the voice is paused
    fn is_paused(&self, voice: VoiceHandle) -> Result<bool, AudioError>;

    /// Set volume of a voice (0.0 to 1.0)
    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), AudioError>;

    /// Get volume of a voice
    fn volume(&self, voice: VoiceHandle) -> Result<f32, AudioError>;

    /// Set the mute flag, independent of volume
    fn set_muted(&mut self, voice: VoiceHandle, muted: bool) -> Result<(), AudioError>;

    /// Get the mute flag
    fn is_muted(&self, voice: VoiceHandle) -> Result<bool, AudioError>;

    /// Set playback speed/pitch multiplier
    fn set_pitch(&mut self, voice: VoiceHandle, pitch: f32) -> Result<(), AudioError>;

    /// Get playback speed/pitch multiplier
    fn pitch(&self, voice: VoiceHandle) -> Result<f32, AudioError>;

    /// Set whether the voice loops at the end of its clip
    fn set_looping(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), AudioError>;

    /// Seek to a position in seconds
    fn set_time(&mut self, voice: VoiceHandle, seconds: f32) -> Result<(), AudioError>;

    /// Playback position in seconds; 0 once a non-looping voice has finished
    fn time(&self, voice: VoiceHandle) -> Result<f32, AudioError>;

    /// Delegate 2D/3D positioning to the device
    fn set_spatial(&mut self, voice: VoiceHandle, blend: SpatialBlend) -> Result<(), AudioError>;
}

/// External mixer exposing one named float parameter per channel
///
/// Values live in the decibel-like domain `[-80, +20]`.
pub trait ExternalMixer {
    /// Read a parameter, `None` if the mixer does not expose it
    fn parameter(&self, name: &str) -> Option<f32>;

    /// Write a parameter, returning whether the mixer accepted it
    fn set_parameter(&mut self, name: &str, value: f32) -> bool;
}
