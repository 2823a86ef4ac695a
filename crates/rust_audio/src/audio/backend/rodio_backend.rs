//! Rodio audio backend implementation
//!
//! Uses the Rodio library for cross-platform audio playback. Every voice is
//! one [`Sink`]; clips are decoded from their in-memory bytes each time a
//! voice is started.
//!
//! Rodio has no mute switch, so a muted voice keeps its stored volume and
//! the sink is driven at zero. Positional blending is recorded but not
//! rendered.
//!
//! # Example
//!
//! ```no_run
//! use rust_audio::audio::backend::AudioBackend;
//! use rust_audio::audio::backend::rodio_backend::{FileClipLoader, RodioBackend};
//! use rust_audio::audio::ClipLoader;
//!
//! let mut backend = RodioBackend::new();
//! backend.initialize().unwrap();
//!
//! let mut loader = FileClipLoader::new("resources/audio");
//! let clip = loader.load_clip("theme.ogg").unwrap();
//!
//! let voice = backend.create_voice().unwrap();
//! backend.set_clip(voice, &clip).unwrap();
//! backend.set_volume(voice, 0.5).unwrap();
//! backend.play(voice).unwrap();
//! ```

use super::{AudioBackend, SpatialBlend};
use crate::audio::{AudioError, Clip, ClipLoader, ClipRef};
use crate::foundation::collections::{SlotMap, VoiceHandle};
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

struct RodioVoice {
    sink: Sink,
    clip: Option<ClipRef>,
    volume: f32,
    muted: bool,
    pitch: f32,
    looping: bool,
    /// Where the next start begins
    start_at: f32,
    /// A decoded source is queued in the sink
    loaded: bool,
    spatial: SpatialBlend,
}

impl RodioVoice {
    fn new(sink: Sink) -> Self {
        sink.pause();
        Self {
            sink,
            clip: None,
            volume: 1.0,
            muted: false,
            pitch: 1.0,
            looping: false,
            start_at: 0.0,
            loaded: false,
            spatial: SpatialBlend::TwoD,
        }
    }

    fn apply_volume(&self) {
        self.sink.set_volume(if self.muted { 0.0 } else { self.volume });
    }

    fn unload(&mut self) {
        self.sink.clear();
        self.loaded = false;
    }

    fn load(&mut self) -> Result<(), AudioError> {
        let clip = self.clip.as_ref().ok_or_else(|| AudioError::PlaybackFailed("no clip loaded".to_string()))?;
        let data = clip
            .data()
            .ok_or_else(|| AudioError::PlaybackFailed(format!("clip '{}' has no audio data", clip.id())))?;

        let source = Decoder::new(Cursor::new(data.to_vec()))
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to decode audio: {}", e)))?;

        self.sink.clear();
        if self.looping {
            self.sink.append(source.buffered().repeat_infinite());
        } else {
            self.sink.append(source);
        }
        if self.start_at > 0.0 {
            self.sink
                .try_seek(Duration::from_secs_f32(self.start_at))
                .map_err(|e| AudioError::PlaybackFailed(format!("Failed to seek: {}", e)))?;
        }
        self.sink.set_speed(self.pitch.abs().max(f32::EPSILON));
        self.apply_volume();
        self.loaded = true;
        Ok(())
    }

    fn finished(&self) -> bool {
        !self.loaded || self.sink.empty()
    }
}

/// Rodio-based audio backend
pub struct RodioBackend {
    /// Audio output stream (must be kept alive)
    _output_stream: Option<OutputStream>,
    /// Output stream handle for creating sinks
    stream_handle: Option<OutputStreamHandle>,
    voices: SlotMap<VoiceHandle, RodioVoice>,
}

impl RodioBackend {
    /// Create a backend with no output device attached
    pub fn new() -> Self {
        Self {
            _output_stream: None,
            stream_handle: None,
            voices: SlotMap::with_key(),
        }
    }

    /// Open the default output device
    pub fn initialize(&mut self) -> Result<(), AudioError> {
        if self.is_initialized() {
            return Ok(());
        }

        let (stream, stream_handle) = OutputStream::try_default()
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to create audio output: {}", e)))?;

        self._output_stream = Some(stream);
        self.stream_handle = Some(stream_handle);

        log::info!("Rodio audio backend initialized");
        Ok(())
    }

    /// Release every voice and close the device
    pub fn shutdown(&mut self) {
        if !self.is_initialized() {
            return;
        }

        for (_, voice) in self.voices.drain() {
            voice.sink.stop();
        }
        self.stream_handle = None;
        self._output_stream = None;

        log::info!("Rodio audio backend shutdown");
    }

    /// Check whether an output device is attached
    pub fn is_initialized(&self) -> bool {
        self.stream_handle.is_some()
    }

    fn get(&self, voice: VoiceHandle) -> Result<&RodioVoice, AudioError> {
        self.voices.get(voice).ok_or(AudioError::InvalidHandle)
    }

    fn get_mut(&mut self, voice: VoiceHandle) -> Result<&mut RodioVoice, AudioError> {
        self.voices.get_mut(voice).ok_or(AudioError::InvalidHandle)
    }
}

impl AudioBackend for RodioBackend {
    fn create_voice(&mut self) -> Result<VoiceHandle, AudioError> {
        let stream_handle = self.stream_handle.as_ref().ok_or(AudioError::BackendNotInitialized)?;
        let sink = Sink::try_new(stream_handle)
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to create sink: {}", e)))?;
        Ok(self.voices.insert(RodioVoice::new(sink)))
    }

    fn release_voice(&mut self, voice: VoiceHandle) {
        if let Some(voice) = self.voices.remove(voice) {
            voice.sink.stop();
        }
    }

    fn set_clip(&mut self, voice: VoiceHandle, clip: &ClipRef) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.unload();
        voice.clip = Some(ClipRef::clone(clip));
        voice.start_at = 0.0;
        Ok(())
    }

    fn clip(&self, voice: VoiceHandle) -> Result<Option<ClipRef>, AudioError> {
        Ok(self.get(voice)?.clip.clone())
    }

    fn play(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        if voice.finished() {
            voice.load()?;
        }
        voice.sink.play();
        Ok(())
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        self.get(voice)?.sink.pause();
        Ok(())
    }

    fn resume(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get(voice)?;
        if !voice.finished() {
            voice.sink.play();
        }
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.unload();
        voice.start_at = 0.0;
        Ok(())
    }

    fn is_playing(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        let voice = self.get(voice)?;
        Ok(!voice.finished() && !voice.sink.is_paused())
    }

    fn is_paused(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        let voice = self.get(voice)?;
        Ok(!voice.finished() && voice.sink.is_paused())
    }

    fn set_volume(&mut self, voice: VoiceHandle, volume: f32) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.volume = volume.clamp(0.0, 1.0);
        voice.apply_volume();
        Ok(())
    }

    fn volume(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        Ok(self.get(voice)?.volume)
    }

    fn set_muted(&mut self, voice: VoiceHandle, muted: bool) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.muted = muted;
        voice.apply_volume();
        Ok(())
    }

    fn is_muted(&self, voice: VoiceHandle) -> Result<bool, AudioError> {
        Ok(self.get(voice)?.muted)
    }

    fn set_pitch(&mut self, voice: VoiceHandle, pitch: f32) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        voice.pitch = pitch;
        voice.sink.set_speed(pitch.abs().max(f32::EPSILON));
        Ok(())
    }

    fn pitch(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        Ok(self.get(voice)?.pitch)
    }

    /// Takes effect the next time the voice is started
    fn set_looping(&mut self, voice: VoiceHandle, looping: bool) -> Result<(), AudioError> {
        self.get_mut(voice)?.looping = looping;
        Ok(())
    }

    fn set_time(&mut self, voice: VoiceHandle, seconds: f32) -> Result<(), AudioError> {
        let voice = self.get_mut(voice)?;
        let length = voice.clip.as_ref().map_or(0.0, |clip| clip.length());
        let seconds = seconds.clamp(0.0, length);
        if voice.finished() {
            voice.start_at = seconds;
            return Ok(());
        }
        voice
            .sink
            .try_seek(Duration::from_secs_f32(seconds))
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to seek: {}", e)))
    }

    fn time(&self, voice: VoiceHandle) -> Result<f32, AudioError> {
        let voice = self.get(voice)?;
        if voice.finished() {
            return Ok(0.0);
        }
        let position = voice.sink.get_pos().as_secs_f32();
        let length = voice.clip.as_ref().map_or(0.0, |clip| clip.length());
        if voice.looping && length > 0.0 {
            Ok(position % length)
        } else {
            Ok(position)
        }
    }

    fn set_spatial(&mut self, voice: VoiceHandle, blend: SpatialBlend) -> Result<(), AudioError> {
        self.get_mut(voice)?.spatial = blend;
        Ok(())
    }
}

impl Default for RodioBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RodioBackend {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Loads clips from files under a root directory
///
/// The clip id is the requested path; its length comes from the decoder
/// and is zero for formats that do not report a duration.
#[derive(Debug, Clone)]
pub struct FileClipLoader {
    root: PathBuf,
}

impl FileClipLoader {
    /// Create a loader resolving paths against `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }
}

impl ClipLoader for FileClipLoader {
    fn load_clip(&mut self, path: &str) -> Result<ClipRef, AudioError> {
        let full_path = self.root.join(path);
        let bytes = std::fs::read(&full_path)
            .map_err(|e| AudioError::ClipNotFound(format!("{}: {}", full_path.display(), e)))?;

        let length = Decoder::new(Cursor::new(bytes.clone()))
            .map_err(|e| AudioError::PlaybackFailed(format!("Failed to decode {}: {}", full_path.display(), e)))?
            .total_duration()
            .map_or(0.0, |d| d.as_secs_f32());

        log::debug!("Loaded clip '{}' ({:.2}s)", path, length);
        Ok(Clip::new(path, length).with_data(bytes).into_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_initialization() {
        let mut backend = RodioBackend::new();
        assert!(!backend.is_initialized());

        // May fail in CI/test environments without audio device
        if backend.initialize().is_ok() {
            assert!(backend.is_initialized());
            backend.shutdown();
            assert!(!backend.is_initialized());
        }
    }

    #[test]
    fn test_voice_without_initialization() {
        let mut backend = RodioBackend::new();
        assert!(matches!(backend.create_voice(), Err(AudioError::BackendNotInitialized)));
    }

    #[test]
    fn test_invalid_handle_operations() {
        let mut backend = RodioBackend::new();
        let invalid = VoiceHandle::default();

        assert!(matches!(backend.pause(invalid), Err(AudioError::InvalidHandle)));
        assert!(matches!(backend.set_volume(invalid, 0.5), Err(AudioError::InvalidHandle)));
        assert!(matches!(backend.is_playing(invalid), Err(AudioError::InvalidHandle)));
        backend.release_voice(invalid);
    }

    #[test]
    fn test_mute_keeps_volume() {
        let mut backend = RodioBackend::new();
        if backend.initialize().is_ok() {
            let voice = backend.create_voice().unwrap();
            backend.set_volume(voice, 0.6).unwrap();
            backend.set_muted(voice, true).unwrap();

            assert_eq!(backend.volume(voice).unwrap(), 0.6);
            assert!(backend.is_muted(voice).unwrap());
            assert!(!backend.is_playing(voice).unwrap());
            backend.shutdown();
        }
    }

    #[test]
    fn test_play_without_data_fails() {
        let mut backend = RodioBackend::new();
        if backend.initialize().is_ok() {
            let voice = backend.create_voice().unwrap();
            backend.set_clip(voice, &Clip::new("silent", 1.0).into_ref()).unwrap();
            assert!(matches!(backend.play(voice), Err(AudioError::PlaybackFailed(_))));
            backend.shutdown();
        }
    }

    #[test]
    fn test_loader_missing_file() {
        let mut loader = FileClipLoader::new(std::env::temp_dir());
        let result = loader.load_clip("rust_audio_definitely_missing.ogg");
        assert!(matches!(result, Err(AudioError::ClipNotFound(_))));
    }
}
