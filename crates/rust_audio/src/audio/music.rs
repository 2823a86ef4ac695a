//! Music system
//!
//! Manages the background music channel: immediate swaps, linear
//! fade-out/fade-in through one voice, and cross-fades through a second
//! "shadow" voice. Only one transition can be pending at a time.

use crate::audio::backend::AudioBackend;
use crate::audio::{AudioError, ClipId, ClipRef};
use crate::foundation::collections::VoiceHandle;
use crate::foundation::math::{clamp01, lerp, nearly_equal};

/// How a new track replaces the current one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MusicTransition {
    /// Stop the current track and start the new one immediately
    #[default]
    Swift,
    /// Fade the current track out, then fade the new one in on the same voice
    LinearFade,
    /// Fade both tracks simultaneously with complementary volumes
    CrossFade,
}

/// Music playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicState {
    /// No music is playing
    Stopped,

    /// Music is playing normally or transitioning
    Playing,

    /// Music is paused
    Paused,
}

/// A request to change the background track
#[derive(Debug, Clone)]
pub struct MusicRequest {
    /// Track to play; `None` makes the request a no-op
    pub clip: Option<ClipRef>,
    /// Requested transition
    pub transition: MusicTransition,
    /// Transition duration in seconds
    pub duration: f32,
    /// New channel volume, or keep the current one
    pub volume: Option<f32>,
    /// Playback speed multiplier
    pub pitch: f32,
    /// Start position in seconds (swift and cross-fade only)
    pub start_position: f32,
}

impl MusicRequest {
    /// Create a swift request for a clip
    pub fn new(clip: impl Into<Option<ClipRef>>) -> Self {
        Self {
            clip: clip.into(),
            transition: MusicTransition::Swift,
            duration: 0.0,
            volume: None,
            pitch: 1.0,
            start_position: 0.0,
        }
    }

    /// Set the transition and its duration
    pub fn with_transition(mut self, transition: MusicTransition, duration: f32) -> Self {
        self.transition = transition;
        self.duration = duration;
        self
    }

    /// Set the channel volume applied with this track
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = Some(clamp01(volume));
        self
    }

    /// Set the playback speed multiplier
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Set the start position in seconds
    pub fn starting_at(mut self, seconds: f32) -> Self {
        self.start_position = seconds.max(0.0);
        self
    }
}

/// Snapshot of the transition bookkeeping
#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundMusicState {
    /// Clip loaded on the primary voice
    pub current_clip: Option<ClipId>,
    /// Clip being transitioned to
    pub next_clip: Option<ClipId>,
    /// Kind of the last accepted transition
    pub transition_kind: MusicTransition,
    /// Duration of the last accepted transition
    pub transition_duration: f32,
    /// Transition timer
    pub elapsed: f32,
}

/// Background music channel
pub struct MusicChannel {
    /// Voice the listener hears as "the music"
    primary: VoiceHandle,
    /// Second voice, allocated only during a cross-fade
    shadow: Option<VoiceHandle>,
    current_clip: Option<ClipRef>,
    next_clip: Option<ClipRef>,
    transition_kind: MusicTransition,
    transition_duration: f32,
    elapsed: f32,
    /// Volume of the outgoing track, where a fade starts from
    volume_cap: f32,
    /// Volume the incoming track settles at
    next_volume: f32,
    /// Pitch for the incoming track of a linear fade
    next_pitch: f32,
    state: MusicState,
}

impl MusicChannel {
    /// Create the channel and attach its primary voice
    pub fn attach(backend: &mut dyn AudioBackend) -> Result<Self, AudioError> {
        let primary = backend.create_voice()?;
        backend.set_looping(primary, true)?;
        Ok(Self {
            primary,
            shadow: None,
            current_clip: None,
            next_clip: None,
            transition_kind: MusicTransition::Swift,
            transition_duration: 0.0,
            elapsed: 0.0,
            volume_cap: 1.0,
            next_volume: 1.0,
            next_pitch: 1.0,
            state: MusicState::Stopped,
        })
    }

    /// Play a track
    ///
    /// # Arguments
    /// * `backend` - Audio backend owning the voices
    /// * `request` - Track and transition parameters
    /// * `volume` - Channel volume the new track settles at
    /// * `muted` - Channel mute flag
    ///
    /// # Returns
    /// `Ok(())` when the request was applied or was a no-op (no clip, or the
    /// clip is already playing). [`AudioError::TransitionInProgress`] or
    /// [`AudioError::CrossFadeVoiceBusy`] when a fade was rejected, in which
    /// case no state changed.
    pub fn play(
        &mut self,
        backend: &mut dyn AudioBackend,
        request: MusicRequest,
        volume: f32,
        muted: bool,
    ) -> Result<(), AudioError> {
        let Some(clip) = request.clip else {
            log::debug!("Music request without a clip ignored");
            return Ok(());
        };

        if self.is_active() && self.current_clip.as_ref().is_some_and(|c| c.id() == clip.id()) {
            log::debug!("Music '{}' already playing", clip.id());
            return Ok(());
        }

        let transition = if !self.is_active() || request.duration <= 0.0 {
            MusicTransition::Swift
        } else {
            request.transition
        };

        match transition {
            MusicTransition::Swift => {
                self.play_swift(backend, clip, request.pitch, request.start_position, volume, muted)
            }
            MusicTransition::LinearFade => {
                self.ensure_idle()?;
                log::debug!("Linear fade to '{}' over {}s", clip.id(), request.duration);
                self.begin_transition(clip, MusicTransition::LinearFade, request.duration, volume, request.pitch);
                Ok(())
            }
            MusicTransition::CrossFade => {
                self.ensure_idle()?;
                if self.shadow.is_some() {
                    return Err(AudioError::CrossFadeVoiceBusy);
                }
                let shadow = backend.create_voice()?;
                if let Err(e) = start_voice(backend, shadow, &clip, request.pitch, request.start_position, 0.0, muted) {
                    backend.release_voice(shadow);
                    return Err(e);
                }
                log::debug!("Cross-fade to '{}' over {}s", clip.id(), request.duration);
                self.shadow = Some(shadow);
                self.begin_transition(clip, MusicTransition::CrossFade, request.duration, volume, request.pitch);
                Ok(())
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), AudioError> {
        if self.next_clip.is_some() {
            return Err(AudioError::TransitionInProgress);
        }
        Ok(())
    }

    fn begin_transition(&mut self, clip: ClipRef, kind: MusicTransition, duration: f32, volume: f32, pitch: f32) {
        self.next_clip = Some(clip);
        self.transition_kind = kind;
        self.transition_duration = duration;
        // Both fades start by running the outgoing volume down from the current cap
        self.elapsed = duration;
        self.next_volume = volume;
        self.next_pitch = pitch;
    }

    fn play_swift(
        &mut self,
        backend: &mut dyn AudioBackend,
        clip: ClipRef,
        pitch: f32,
        start_position: f32,
        volume: f32,
        muted: bool,
    ) -> Result<(), AudioError> {
        self.release_shadow(backend);
        self.clear_transition();

        backend.stop(self.primary)?;
        start_voice(backend, self.primary, &clip, pitch, start_position, volume, muted)?;

        log::debug!("Music '{}' started", clip.id());
        self.current_clip = Some(clip);
        self.volume_cap = volume;
        self.next_volume = volume;
        self.state = MusicState::Playing;
        Ok(())
    }

    /// Advance a pending transition (call once per frame)
    ///
    /// Paused or stopped music does not advance. If a voice disappears
    /// mid-transition the transition is abandoned and the error returned.
    pub fn advance(&mut self, backend: &mut dyn AudioBackend, delta_time: f32) -> Result<(), AudioError> {
        if self.state != MusicState::Playing {
            return Ok(());
        }
        let Some(next) = self.next_clip.clone() else {
            return Ok(());
        };

        let result = match self.transition_kind {
            MusicTransition::LinearFade => self.advance_linear(backend, &next, delta_time),
            MusicTransition::CrossFade => self.advance_cross(backend, &next, delta_time),
            MusicTransition::Swift => Ok(()),
        };

        if result.is_err() {
            log::error!("Music transition to '{}' abandoned", next.id());
            self.release_shadow(backend);
            self.clear_transition();
        }
        result
    }

    fn advance_linear(&mut self, backend: &mut dyn AudioBackend, next: &ClipRef, delta_time: f32) -> Result<(), AudioError> {
        let fading_out = self.current_clip.as_ref().map_or(true, |c| c.id() != next.id());

        if fading_out {
            self.elapsed = (self.elapsed - delta_time).max(0.0);
            if self.elapsed <= 0.0 {
                backend.set_volume(self.primary, 0.0)?;
                let muted = backend.is_muted(self.primary)?;
                start_voice(backend, self.primary, next, self.next_pitch, 0.0, 0.0, muted)?;
                self.volume_cap = self.next_volume;
                self.current_clip = Some(ClipRef::clone(next));
                log::debug!("Fade-out complete, fading in '{}'", next.id());
            } else {
                backend.set_volume(self.primary, self.fade_volume())?;
            }
        } else {
            self.elapsed = (self.elapsed + delta_time).min(self.transition_duration);
            if self.elapsed >= self.transition_duration {
                backend.set_volume(self.primary, self.volume_cap)?;
                self.clear_transition();
                log::debug!("Linear fade to '{}' complete", next.id());
            } else {
                backend.set_volume(self.primary, self.fade_volume())?;
            }
        }
        Ok(())
    }

    fn advance_cross(&mut self, backend: &mut dyn AudioBackend, next: &ClipRef, delta_time: f32) -> Result<(), AudioError> {
        let shadow = self.shadow.ok_or(AudioError::InvalidHandle)?;

        self.elapsed = (self.elapsed - delta_time).max(0.0);
        let primary_volume = self.fade_volume();
        // Complementary, so the pair never sums above the larger cap
        let shadow_volume = lerp(0.0, self.next_volume, 1.0 - self.fade_fraction());

        backend.set_volume(self.primary, primary_volume)?;
        backend.set_volume(shadow, shadow_volume)?;
        let muted = backend.is_muted(self.primary)?;
        backend.set_muted(shadow, muted)?;

        if self.elapsed <= 0.0 {
            let old = std::mem::replace(&mut self.primary, shadow);
            self.shadow = None;
            backend.release_voice(old);
            self.volume_cap = self.next_volume;
            backend.set_volume(self.primary, self.volume_cap)?;
            self.current_clip = Some(ClipRef::clone(next));
            self.clear_transition();
            log::debug!("Cross-fade to '{}' complete", next.id());
        }
        Ok(())
    }

    fn fade_fraction(&self) -> f32 {
        if self.transition_duration <= 0.0 {
            return 0.0;
        }
        self.elapsed / self.transition_duration
    }

    fn fade_volume(&self) -> f32 {
        lerp(0.0, self.volume_cap, self.fade_fraction())
    }

    fn clear_transition(&mut self) {
        self.next_clip = None;
        self.elapsed = 0.0;
    }

    fn release_shadow(&mut self, backend: &mut dyn AudioBackend) {
        if let Some(shadow) = self.shadow.take() {
            backend.release_voice(shadow);
        }
    }

    /// Drop any pending transition and settle the primary voice at the cap
    pub fn cancel_transition(&mut self, backend: &mut dyn AudioBackend) -> Result<(), AudioError> {
        if self.next_clip.is_none() {
            return Ok(());
        }
        self.release_shadow(backend);
        self.clear_transition();
        self.volume_cap = self.next_volume;
        backend.set_volume(self.primary, self.volume_cap)
    }

    /// Stop the music
    ///
    /// A pending transition is left in place; the next track request is
    /// forced to a swift change, which clears it.
    pub fn stop(&mut self, backend: &mut dyn AudioBackend) -> Result<(), AudioError> {
        backend.stop(self.primary)?;
        if let Some(shadow) = self.shadow {
            backend.stop(shadow)?;
        }
        self.state = MusicState::Stopped;
        Ok(())
    }

    /// Pause the current music
    pub fn pause(&mut self, backend: &mut dyn AudioBackend) -> Result<(), AudioError> {
        if self.state == MusicState::Playing {
            backend.pause(self.primary)?;
            if let Some(shadow) = self.shadow {
                backend.pause(shadow)?;
            }
            self.state = MusicState::Paused;
        }
        Ok(())
    }

    /// Resume paused music
    pub fn resume(&mut self, backend: &mut dyn AudioBackend) -> Result<(), AudioError> {
        if self.state == MusicState::Paused {
            backend.resume(self.primary)?;
            if let Some(shadow) = self.shadow {
                backend.resume(shadow)?;
            }
            self.state = MusicState::Playing;
        }
        Ok(())
    }

    /// Whether the voices disagree with the channel volume/mute
    ///
    /// Volume is only compared outside transitions, since fades own it.
    pub fn has_drifted(&self, backend: &dyn AudioBackend, volume: f32, muted: bool) -> Result<bool, AudioError> {
        if backend.is_muted(self.primary)? != muted {
            return Ok(true);
        }
        if let Some(shadow) = self.shadow {
            if backend.is_muted(shadow)? != muted {
                return Ok(true);
            }
        }
        if !self.is_transitioning() && !nearly_equal(backend.volume(self.primary)?, volume) {
            return Ok(true);
        }
        Ok(false)
    }

    /// Push channel volume/mute to the voices
    ///
    /// During a transition the new volume only retargets the incoming track.
    pub fn apply_levels(&mut self, backend: &mut dyn AudioBackend, volume: f32, muted: bool) -> Result<(), AudioError> {
        self.next_volume = volume;
        if !self.is_transitioning() {
            self.volume_cap = volume;
        }
        backend.set_muted(self.primary, muted)?;
        if let Some(shadow) = self.shadow {
            backend.set_muted(shadow, muted)?;
        }
        if !self.is_transitioning() {
            backend.set_volume(self.primary, volume)?;
        }
        Ok(())
    }

    /// Release every voice and reset to the detached state
    pub fn teardown(&mut self, backend: &mut dyn AudioBackend) {
        self.release_shadow(backend);
        backend.release_voice(self.primary);
        self.clear_transition();
        self.current_clip = None;
        self.state = MusicState::Stopped;
    }

    /// Snapshot of the transition bookkeeping
    pub fn snapshot(&self) -> BackgroundMusicState {
        BackgroundMusicState {
            current_clip: self.current_clip.as_ref().map(|c| c.id().clone()),
            next_clip: self.next_clip.as_ref().map(|c| c.id().clone()),
            transition_kind: self.transition_kind,
            transition_duration: self.transition_duration,
            elapsed: self.elapsed,
        }
    }

    /// Get current playback state
    pub fn state(&self) -> MusicState {
        self.state
    }

    /// Check if music is playing or paused
    pub fn is_active(&self) -> bool {
        self.state != MusicState::Stopped
    }

    /// Check if a transition is pending
    pub fn is_transitioning(&self) -> bool {
        self.next_clip.is_some()
    }

    /// Clip loaded on the primary voice
    pub fn current_clip(&self) -> Option<&ClipRef> {
        self.current_clip.as_ref()
    }

    /// Clip being transitioned to
    pub fn next_clip(&self) -> Option<&ClipRef> {
        self.next_clip.as_ref()
    }

    /// Primary voice handle
    pub fn primary_voice(&self) -> VoiceHandle {
        self.primary
    }

    /// Cross-fade voice handle, while one is allocated
    pub fn shadow_voice(&self) -> Option<VoiceHandle> {
        self.shadow
    }

    /// Get current playback time in seconds
    pub fn playback_time(&self, backend: &dyn AudioBackend) -> f32 {
        backend.time(self.primary).unwrap_or(0.0)
    }
}

fn start_voice(
    backend: &mut dyn AudioBackend,
    voice: VoiceHandle,
    clip: &ClipRef,
    pitch: f32,
    start_position: f32,
    volume: f32,
    muted: bool,
) -> Result<(), AudioError> {
    backend.set_clip(voice, clip)?;
    backend.set_looping(voice, true)?;
    backend.set_pitch(voice, pitch)?;
    backend.set_time(voice, start_position)?;
    backend.set_volume(voice, volume)?;
    backend.set_muted(voice, muted)?;
    backend.play(voice)
}
