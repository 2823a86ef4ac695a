//! In-process simulated backend
//!
//! Voices keep a playback cursor that moves only when [`SimulatedBackend::advance`]
//! is called, so playback is fully deterministic. At the end of a
//! non-looping clip a voice stops and rewinds to zero, which is what real
//! devices report.
//!
//! Used by the test suite and by headless hosts such as the demo app.

use super::{AudioBackend, ExternalMixer, SpatialBlend};
use crate::audio::{AudioError, ClipRef};
use crate::foundation::collections::{SlotMap, VoiceHandle};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Transport state of a simulated voice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// Not playing, cursor at zero
    Stopped,
    /// Advancing
    Playing,
    /// Not advancing, cursor kept
    Paused,
}

/// State of one simulated voice
#[derive(Debug, Clone)]
pub struct SimulatedVoice {
    /// Loaded clip
    pub clip: Option<ClipRef>,
    /// Volume (0.0 to 1.0)
    pub volume: f32,
    /// Mute flag
    pub muted: bool,
    /// Speed multiplier
    pub pitch: f32,
    /// Loop at clip end
    pub looping: bool,
    /// Cursor in seconds
    pub time: f32,
    /// Transport state
    pub transport: TransportState,
    /// Positioning
    pub spatial: SpatialBlend,
}

impl Default for SimulatedVoice {
    fn default() -> Self {
        Self {
            clip: None,
            volume: 1.0,
            muted: false,
            pitch: 1.0,
            looping: false,
            time: 0.0,
            transport: TransportState::Stopped,
            spatial: SpatialBlend::TwoD,
        }
    }
}

impl SimulatedVoice {
    fn advance(&mut self, delta_time: f32) {
        if self.transport != TransportState::Playing {
            return;
        }
        let Some(length) = self.clip.as_ref().map(|clip| clip.length()) else {
            return;
        };

        self.time += delta_time * self.pitch.abs();
        if self.time >= length {
            if self.looping && length > 0.0 {
                self.time %= length;
            } else {
                self.time = 0.0;
                self.transport = TransportState::Stopped;
            }
        }
    }
}

/// Deterministic backend with no device output
#[derive(Debug, Default)]
pub struct SimulatedBackend {
    voices: SlotMap<VoiceHandle, SimulatedVoice>,
    max_voices: Option<usize>,
    created: usize,
}

impl SimulatedBackend {
    /// Create a backend with unlimited voices
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a backend that refuses to allocate more than `max_voices` voices
    pub fn with_capacity(max_voices: usize) -> Self {
        Self {
            max_voices: Some(max_voices),
            ..Self::default()
        }
    }

    /// Move every playing voice forward by `delta_time` seconds
    pub fn advance(&mut self, delta_time: f32) {
        for voice in self.voices.values_mut() {
            voice.advance(delta_time);
        }
    }

    /// Inspect a voice
    pub fn voice(&self, voice: VoiceHandle) -> Option<&SimulatedVoice> {
        self.voices.get(voice)
    }

    /// Mutate a voice directly, bypassing the manager
    pub fn voice_mut(&mut self, voice: VoiceHandle) -> Option<&mut SimulatedVoice> {
        self.voices.get_mut(voice)
    }

    /// Remove a voice as if something outside the manager destroyed it
    pub fn destroy_externally(&mut self, voice: VoiceHandle) {
        self.voices.remove(voice);
    }

    /// Number of live voices
    pub fn voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Number of voices ever created
    pub fn created_count(&self) -> usize {
        self.created
    }

    /// Iterate all live voices
    pub fn voices(&self) -> impl Iterator<Item = (VoiceHandle, &SimulatedVoice)> {
        self.voices.iter()
    }

    fn get(&self, voice: VoiceHandle) -> Result<&SimulatedVoice, AudioError> {
        self.voices.get(voice).ok_or(AudioError::InvalidHandle)
    }

    fn get_mut(&mut self, voice: VoiceHandle) -> Result<&mut SimulatedVoice, AudioError> {
        self.voices.get_mut(voice).ok_or(AudioError::InvalidHandle)
    }
}

impl AudioBackend for SimulatedBackend {
    fn create_voice(&mut self) -> Result<VoiceHandle, AudioError> {
        if let Some(max) = self.max_voices {
            if self.voices.len() >= max {
                return Err(AudioError::PlaybackFailed(format!("voice limit of {} reached", max)));
            }
        }
        self.created += 1;
        Ok(self.voices.insert(SimulatedVoice::default()))
    }

    fn release_voice(&mut self, voice: VoiceHandle) {
        self.voices.remove(voice);
    }

    fn set_clip(&mut self, voice: VoiceHandle, clip: &ClipRef) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.clip = Some(ClipRef::clone(clip));
        voice.time = 0.0;
        voice.transport = TransportState::Stopped;
        Ok(())
    }

    fn clip(&self, voice: VoiceHandle) -> Result<Option<ClipRef>, AudioError> {
        Ok(self.get(voice)?.clip.clone())
    }

    fn play(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        if voice.clip.is_none() {
            return Err(AudioError::PlaybackFailed("no clip loaded".to_string()));
        }
        voice.transport = TransportState::Playing;
        Ok(())
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        if voice.transport == TransportState::Playing {
            voice.transport = TransportState::Paused;
        }
        Ok(())
    }

    fn resume(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        if voice.transport == TransportState::Paused {
            voice.transport = TransportState::Playing;
        }
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.transport = TransportState::Stopped;
        voice.time = 0.0;
        Ok(())
    }

    fn is_playing(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        Ok(self.get(voice)?.transport == TransportState::Playing)
    }

    fn is_paused(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        Ok(self.get(voice)?.transport == TransportState::Paused)
    }

    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), AudioError> {
        self.get_mut(voice)?.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }

    fn volume(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        Ok(self.get(voice)?.volume)
    }

    fn set_muted(&mut self, voice: VoiceHandle, muted: bool) -> Result<(), AudioError> {
        self.get_mut(voice)?.muted = muted;
        Ok(())
    }

    fn is_muted(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        Ok(self.get(voice)?.muted)
    }

    fn set_pitch(&mut self, voice: VoiceHandle, pitch: f32) -> Result<(), AudioError> {
        self.get_mut(voice)?.pitch = pitch;
        Ok(())
    }

    fn pitch(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        Ok(self.get(voice)?.pitch)
    }

    fn set_looping(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), AudioError> {
        self.get_mut(voice)?.looping = looping;
        Ok(())
    }

    fn set_time(&mut self, voice: VoiceHandle, seconds: f32) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        let length = voice.clip.as_ref().map_or(0.0, |clip| clip.length());
        voice.time = seconds.clamp(0.0, length);
        Ok(())
    }

    fn time(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        Ok(self.get(voice)?.time)
    }

    fn set_spatial(&mut self, voice: VoiceHandle, blend: SpatialBlend) -> Result<(), AudioError> {
        self.get_mut(voice)?.spatial = blend;
        Ok(())
    }
}

/// External mixer whose parameters are shared between clones
///
/// Keep one clone in the host (standing in for a settings UI) and hand
/// another to the manager.
#[derive(Debug, Clone, Default)]
pub struct SimulatedMixer {
    parameters: Rc<RefCell<HashMap<String, f32>>>,
}

impl SimulatedMixer {
    /// Create a mixer exposing the given parameters
    pub fn with_parameters<'a>(names: impl IntoIterator<Item = &'a str>, value: f32) -> Self {
        let mixer = Self::default();
        {
            let mut parameters = mixer.parameters.borrow_mut();
            for name in names {
                parameters.insert(name.to_string(), value);
            }
        }
        mixer
    }
}

impl ExternalMixer for SimulatedMixer {
    fn parameter(&self, name: &str) -> Option<f32> {
        self.parameters.borrow().get(name).copied()
    }

    fn set_parameter(&mut self, name: &str, value: f32) -> bool {
        match self.parameters.borrow_mut().get_mut(name) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }
}
