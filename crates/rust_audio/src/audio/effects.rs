//! Sound effect pool
//!
//! Owns every active one-shot, timed-loop and repeating effect voice. Each
//! entry counts its remaining time down while its voice is audible and is
//! reclaimed (voice stopped and released, callback fired) once the time
//! runs out or the device reports the voice finished and rewound.
//!
//! Entries live in a slot map arena and are mutated in place; finished keys
//! are collected during the scan and removed afterwards, so removals never
//! skip or revisit neighbours.

use crate::audio::backend::{AudioBackend, SpatialBlend};
use crate::audio::{AudioError, ClipId, ClipRef};
use crate::config::AudioConfig;
use crate::foundation::collections::{EffectKey, SlotMap, VoiceHandle};
use crate::foundation::math::{nearly_equal, Vec3};
use std::fmt;

/// Completion callback fired once when an effect finishes or is stopped
pub type EffectCallback = Box<dyn FnOnce()>;

/// Parameters shared by every way of starting an effect
pub struct EffectRequest {
    clip: Option<ClipRef>,
    location: Option<Vec3>,
    volume: f32,
    pitch: f32,
    singleton: bool,
    on_complete: Option<EffectCallback>,
}

impl EffectRequest {
    /// Create a 2D request at full volume and normal pitch
    pub fn new(clip: impl Into<Option<ClipRef>>) -> Self {
        Self {
            clip: clip.into(),
            location: None,
            volume: 1.0,
            pitch: 1.0,
            singleton: false,
            on_complete: None,
        }
    }

    /// Play positionally at a world location
    pub fn at(mut self, location: Vec3) -> Self {
        self.location = Some(location);
        self
    }

    /// Set the per-effect volume multiplier (0.0 to 1.0)
    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume.clamp(0.0, 1.0);
        self
    }

    /// Set the playback speed multiplier
    pub fn with_pitch(mut self, pitch: f32) -> Self {
        self.pitch = pitch;
        self
    }

    /// Allow at most one active voice for this clip
    pub fn singleton(mut self) -> Self {
        self.singleton = true;
        self
    }

    /// Run `callback` when the effect finishes
    pub fn on_complete(mut self, callback: impl FnOnce() + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for EffectRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectRequest")
            .field("clip", &self.clip.as_ref().map(|c| c.id()))
            .field("location", &self.location)
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("singleton", &self.singleton)
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// One active effect
pub struct EffectVoice {
    id: ClipId,
    voice: VoiceHandle,
    original_volume: f32,
    total_duration: f32,
    remaining: f32,
    singleton: bool,
    on_complete: Option<EffectCallback>,
}

impl EffectVoice {
    /// Identity of the playing clip
    pub fn id(&self) -> &ClipId {
        &self.id
    }

    /// Backend voice
    pub fn voice(&self) -> VoiceHandle {
        self.voice
    }

    /// Per-effect volume before the channel volume is applied
    pub fn original_volume(&self) -> f32 {
        self.original_volume
    }

    /// Requested total play time; infinite for endless repeats
    pub fn total_duration(&self) -> f32 {
        self.total_duration
    }

    /// Time left before the effect is reclaimed
    pub fn remaining(&self) -> f32 {
        self.remaining
    }

    /// Whether this is the singleton voice for its clip
    pub fn is_singleton(&self) -> bool {
        self.singleton
    }

    /// Whether the effect plays until stopped explicitly
    pub fn is_endless(&self) -> bool {
        self.remaining.is_infinite()
    }
}

impl fmt::Debug for EffectVoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EffectVoice")
            .field("id", &self.id)
            .field("voice", &self.voice)
            .field("remaining", &self.remaining)
            .field("total_duration", &self.total_duration)
            .field("singleton", &self.singleton)
            .finish_non_exhaustive()
    }
}

/// Pool of active sound effects
pub struct EffectPool {
    voices: SlotMap<EffectKey, EffectVoice>,
    completion_epsilon: f32,
    early_finish_threshold: f32,
    rewind_epsilon: f32,
}

impl EffectPool {
    /// Create an empty pool using the thresholds from `config`
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            voices: SlotMap::with_key(),
            completion_epsilon: config.completion_epsilon,
            early_finish_threshold: config.early_finish_threshold,
            rewind_epsilon: config.rewind_epsilon,
        }
    }

    /// Play a clip once, for its natural length
    pub fn play_one_shot(
        &mut self,
        backend: &mut dyn AudioBackend,
        request: EffectRequest,
        sfx_volume: f32,
        muted: bool,
    ) -> Option<EffectKey> {
        let length = request.clip.as_ref()?.length();
        // One-shots never share a voice
        let request = EffectRequest { singleton: false, ..request };
        self.spawn(backend, request, length, false, sfx_volume, muted)
    }

    /// Play a clip for `duration` seconds, looping if it is shorter than that
    ///
    /// # Returns
    /// The pool key, or `None` if there is no clip, `duration` is not
    /// positive, or the backend could not provide a voice. A singleton
    /// request for a clip that is already playing returns the existing key
    /// after resetting its remaining time to `duration`.
    pub fn play_sfx(
        &mut self,
        backend: &mut dyn AudioBackend,
        request: EffectRequest,
        duration: f32,
        sfx_volume: f32,
        muted: bool,
    ) -> Option<EffectKey> {
        let clip = request.clip.as_ref()?;
        if duration.is_nan() || duration <= 0.0 {
            log::debug!("Effect '{}' requested with non-positive duration", clip.id());
            return None;
        }
        let looping = duration > clip.length();
        self.spawn(backend, request, duration, looping, sfx_volume, muted)
    }

    /// Play a clip `repeat_count` times
    ///
    /// Zero plays it once, like [`EffectPool::play_one_shot`]; a negative
    /// count loops until the effect is stopped explicitly.
    pub fn repeat_sfx(
        &mut self,
        backend: &mut dyn AudioBackend,
        request: EffectRequest,
        repeat_count: i32,
        sfx_volume: f32,
        muted: bool,
    ) -> Option<EffectKey> {
        if repeat_count == 0 {
            return self.play_one_shot(backend, request, sfx_volume, muted);
        }
        let length = request.clip.as_ref()?.length();
        let (duration, looping) = if repeat_count < 0 {
            (f32::INFINITY, true)
        } else {
            (length * repeat_count as f32, repeat_count > 1)
        };
        self.spawn(backend, request, duration, looping, sfx_volume, muted)
    }

    fn spawn(
        &mut self,
        backend: &mut dyn AudioBackend,
        request: EffectRequest,
        duration: f32,
        looping: bool,
        sfx_volume: f32,
        muted: bool,
    ) -> Option<EffectKey> {
        let clip = request.clip.as_ref()?;

        if request.singleton {
            if let Some(key) = self.index_of(clip.id(), true) {
                self.refresh(backend, key, duration, looping, request.on_complete);
                return Some(key);
            }
        }

        let voice = match backend.create_voice() {
            Ok(voice) => voice,
            Err(e) => {
                log::error!("No voice for effect '{}': {}", clip.id(), e);
                return None;
            }
        };

        let setup = (|| -> Result<(), AudioError> {
            backend.set_clip(voice, clip)?;
            backend.set_looping(voice, looping)?;
            backend.set_pitch(voice, request.pitch)?;
            backend.set_spatial(voice, SpatialBlend::from(request.location))?;
            backend.set_volume(voice, sfx_volume * request.volume)?;
            backend.set_muted(voice, muted)?;
            backend.play(voice)
        })();
        if let Err(e) = setup {
            log::error!("Failed to start effect '{}': {}", clip.id(), e);
            backend.release_voice(voice);
            return None;
        }

        let key = self.voices.insert(EffectVoice {
            id: clip.id().clone(),
            voice,
            original_volume: request.volume,
            total_duration: duration,
            remaining: duration,
            singleton: request.singleton,
            on_complete: request.on_complete,
        });
        log::debug!("Effect '{}' started for {}s", clip.id(), duration);
        Some(key)
    }

    /// Re-arm an existing singleton with a new duration
    ///
    /// A new completion callback supersedes the stored one, which fires
    /// immediately since its request will not complete on its own.
    fn refresh(
        &mut self,
        backend: &mut dyn AudioBackend,
        key: EffectKey,
        duration: f32,
        looping: bool,
        on_complete: Option<EffectCallback>,
    ) {
        let Some(entry) = self.voices.get_mut(key) else {
            return;
        };
        entry.total_duration = duration;
        entry.remaining = duration;
        let superseded = match on_complete {
            Some(callback) => entry.on_complete.replace(callback),
            None => None,
        };

        let voice = entry.voice;
        let restart = (|| -> Result<(), AudioError> {
            backend.set_looping(voice, looping)?;
            if !backend.is_playing(voice)? && !backend.is_paused(voice)? {
                backend.play(voice)?;
            }
            Ok(())
        })();
        if let Err(e) = restart {
            log::warn!("Singleton effect '{}' voice unavailable: {}", entry.id, e);
        }
        log::debug!("Singleton effect '{}' refreshed to {}s", entry.id, duration);
        if let Some(callback) = superseded {
            callback();
        }
    }

    /// Age every effect and reclaim the finished ones (call once per frame)
    ///
    /// # Returns
    /// The number of effects reclaimed.
    pub fn update(&mut self, backend: &mut dyn AudioBackend, delta_time: f32) -> usize {
        let mut finished = Vec::new();

        for (key, entry) in &mut self.voices {
            let playing = match backend.is_playing(entry.voice) {
                Ok(playing) => playing,
                Err(e) => {
                    log::warn!("Effect '{}' lost its voice: {}", entry.id, e);
                    finished.push(key);
                    continue;
                }
            };

            if entry.is_endless() {
                continue;
            }
            if playing {
                entry.remaining -= delta_time;
            }

            let timed_out = entry.remaining <= self.completion_epsilon;
            // The device can finish a hair before the timer does
            let device_finished = !playing
                && entry.remaining < self.early_finish_threshold
                && !backend.is_paused(entry.voice).unwrap_or(false)
                && backend.time(entry.voice).map_or(true, |t| t <= self.rewind_epsilon);

            if timed_out || device_finished {
                finished.push(key);
            }
        }

        let count = finished.len();
        for key in finished {
            self.finish(backend, key);
        }
        count
    }

    fn finish(&mut self, backend: &mut dyn AudioBackend, key: EffectKey) -> bool {
        let Some(mut entry) = self.voices.remove(key) else {
            return false;
        };
        if let Err(e) = backend.stop(entry.voice) {
            log::debug!("Effect '{}' voice already gone: {}", entry.id, e);
        }
        backend.release_voice(entry.voice);
        log::debug!("Effect '{}' finished", entry.id);
        if let Some(callback) = entry.on_complete.take() {
            callback();
        }
        true
    }

    /// Stop one effect, firing its callback
    pub fn stop(&mut self, backend: &mut dyn AudioBackend, key: EffectKey) -> bool {
        self.finish(backend, key)
    }

    /// Stop every effect playing `id`
    pub fn stop_clip(&mut self, backend: &mut dyn AudioBackend, id: &ClipId) -> usize {
        let keys: Vec<EffectKey> = self.voices
            .iter()
            .filter(|(_, entry)| &entry.id == id)
            .map(|(key, _)| key)
            .collect();
        keys.into_iter().filter(|&key| self.finish(backend, key)).count()
    }

    /// Stop every effect, firing callbacks
    pub fn stop_all(&mut self, backend: &mut dyn AudioBackend) {
        let keys: Vec<EffectKey> = self.voices.keys().collect();
        for key in keys {
            self.finish(backend, key);
        }
    }

    /// Pause one effect
    pub fn pause(&mut self, backend: &mut dyn AudioBackend, key: EffectKey) -> Result<(), AudioError> {
        let entry = self.voices.get(key).ok_or(AudioError::InvalidHandle)?;
        if backend.is_playing(entry.voice)? {
            backend.pause(entry.voice)?;
        }
        Ok(())
    }

    /// Resume one paused effect
    pub fn resume(&mut self, backend: &mut dyn AudioBackend, key: EffectKey) -> Result<(), AudioError> {
        let entry = self.voices.get(key).ok_or(AudioError::InvalidHandle)?;
        if backend.is_paused(entry.voice)? {
            backend.resume(entry.voice)?;
        }
        Ok(())
    }

    /// Pause every playing effect
    pub fn pause_all(&mut self, backend: &mut dyn AudioBackend) {
        let keys: Vec<EffectKey> = self.voices.keys().collect();
        for key in keys {
            if let Err(e) = self.pause(backend, key) {
                log::warn!("Failed to pause effect: {}", e);
            }
        }
    }

    /// Resume every paused effect
    pub fn resume_all(&mut self, backend: &mut dyn AudioBackend) {
        let keys: Vec<EffectKey> = self.voices.keys().collect();
        for key in keys {
            if let Err(e) = self.resume(backend, key) {
                log::warn!("Failed to resume effect: {}", e);
            }
        }
    }

    /// First effect playing `id`, optionally only singletons
    pub fn index_of(&self, id: &ClipId, singleton_only: bool) -> Option<EffectKey> {
        self.voices
            .iter()
            .find(|(_, entry)| &entry.id == id && (!singleton_only || entry.singleton))
            .map(|(key, _)| key)
    }

    /// Look up an effect
    pub fn get(&self, key: EffectKey) -> Option<&EffectVoice> {
        self.voices.get(key)
    }

    /// Iterate active effects
    pub fn iter(&self) -> impl Iterator<Item = (EffectKey, &EffectVoice)> {
        self.voices.iter()
    }

    /// Number of active effects
    pub fn len(&self) -> usize {
        self.voices.len()
    }

    /// Whether no effects are active
    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Whether any voice disagrees with the channel volume/mute
    pub fn has_drifted(&self, backend: &dyn AudioBackend, sfx_volume: f32, muted: bool) -> bool {
        self.voices.values().any(|entry| {
            let expected = sfx_volume * entry.original_volume;
            match (backend.volume(entry.voice), backend.is_muted(entry.voice)) {
                (Ok(volume), Ok(voice_muted)) => voice_muted != muted || !nearly_equal(volume, expected),
                // Lost voices are reclaimed by the aging pass
                _ => false,
            }
        })
    }

    /// Rescale every voice to `sfx_volume * original_volume` and re-apply mute
    pub fn apply_levels(&mut self, backend: &mut dyn AudioBackend, sfx_volume: f32, muted: bool) {
        for entry in self.voices.values() {
            let applied = backend
                .set_volume(entry.voice, sfx_volume * entry.original_volume)
                .and_then(|()| backend.set_muted(entry.voice, muted));
            if let Err(e) = applied {
                log::warn!("Failed to apply levels to effect '{}': {}", entry.id, e);
            }
        }
    }
}
