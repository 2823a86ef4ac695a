//! Audio manager
//!
//! The public face of the audio system. The host owns one `AudioManager`,
//! calls its operations from game code and calls [`AudioManager::tick`]
//! once per frame. Every request degrades to a logged no-op on bad input
//! or conflicting state; nothing here aborts the host.

use crate::audio::backend::{AudioBackend, ExternalMixer};
use crate::audio::preferences::{self, PreferenceStore};
use crate::audio::{
    AudioError, ChannelGroup, ClipId, ClipLibrary, ClipLoader, ClipRef, Drift, EffectKey, EffectPool,
    EffectRequest, MixerSystem, MusicChannel, MusicRequest, MusicTransition, VolumeState,
};
use crate::config::AudioConfig;
use crate::foundation::math::clamp01;

/// Lifecycle of the manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// Constructed, preferences not loaded, no voices attached
    Uninitialized,
    /// Accepting requests
    Active,
    /// Application exit announced; requests are rejected
    ShuttingDown,
    /// Voices released and preferences flushed
    Destroyed,
}

/// What one frame of [`AudioManager::tick`] did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Channels re-converged by reconciliation
    pub drift: Drift,
    /// Effects reclaimed by aging
    pub finished_effects: usize,
}

/// Runtime audio manager
pub struct AudioManager<B: AudioBackend> {
    state: LifecycleState,
    config: AudioConfig,
    backend: B,
    preferences: Box<dyn PreferenceStore>,
    mixer: MixerSystem,
    music: Option<MusicChannel>,
    effects: EffectPool,
    library: ClipLibrary,
    loader: Option<Box<dyn ClipLoader>>,
}

impl<B: AudioBackend> AudioManager<B> {
    /// Create an uninitialized manager
    pub fn new(backend: B, config: AudioConfig, preferences: Box<dyn PreferenceStore>) -> Self {
        Self {
            state: LifecycleState::Uninitialized,
            mixer: MixerSystem::new(&config),
            effects: EffectPool::new(&config),
            config,
            backend,
            preferences,
            music: None,
            library: ClipLibrary::new(),
            loader: None,
        }
    }

    /// Create and activate a manager
    pub fn start(backend: B, config: AudioConfig, preferences: Box<dyn PreferenceStore>) -> Result<Self, AudioError> {
        let mut manager = Self::new(backend, config, preferences);
        manager.activate()?;
        Ok(manager)
    }

    /// Attach an external mixer mirroring the channel volumes
    pub fn with_external_mixer(mut self, mixer: Box<dyn ExternalMixer>) -> Self {
        self.mixer.set_external(mixer);
        self
    }

    /// Attach a loader used when a clip is not in the library
    pub fn with_loader(mut self, loader: Box<dyn ClipLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Load preferences and attach the music voice
    pub fn activate(&mut self) -> Result<(), AudioError> {
        if self.state != LifecycleState::Uninitialized {
            log::warn!("Audio manager activation ignored while {:?}", self.state);
            return Err(AudioError::ManagerUnavailable(self.state));
        }

        let defaults = VolumeState::from(&self.config);
        let loaded = preferences::load_volume_state(self.preferences.as_ref(), &self.config.preference_keys, defaults);
        self.mixer.set_state(loaded);

        let mut music = MusicChannel::attach(&mut self.backend)?;
        for group in [ChannelGroup::Music, ChannelGroup::Effects] {
            self.mixer.apply(group, &mut self.backend, &mut music, &mut self.effects);
        }
        self.music = Some(music);
        self.state = LifecycleState::Active;

        log::info!(
            "Audio manager active (music {:.2}{}, effects {:.2}{})",
            loaded.music_volume,
            if loaded.music_muted { " muted" } else { "" },
            loaded.sfx_volume,
            if loaded.sfx_muted { " muted" } else { "" },
        );
        Ok(())
    }

    /// Announce application exit: save preferences and stop accepting requests
    pub fn begin_shutdown(&mut self) {
        match self.state {
            LifecycleState::Active => {
                if let Err(e) = self.save_preferences() {
                    log::error!("Failed to save audio preferences at shutdown: {}", e);
                }
            }
            LifecycleState::Uninitialized => {}
            LifecycleState::ShuttingDown | LifecycleState::Destroyed => return,
        }
        self.state = LifecycleState::ShuttingDown;
        log::info!("Audio manager shutting down");
    }

    /// Halt every voice, release resources and flush preferences
    pub fn destroy(&mut self) {
        if self.state == LifecycleState::Destroyed {
            return;
        }
        self.begin_shutdown();

        self.effects.stop_all(&mut self.backend);
        if let Some(mut music) = self.music.take() {
            music.teardown(&mut self.backend);
        }
        if let Err(e) = self.preferences.flush() {
            log::error!("Failed to flush audio preferences: {}", e);
        }
        self.state = LifecycleState::Destroyed;
        log::info!("Audio manager destroyed");
    }

    fn ensure_active(&self, operation: &str) -> Result<(), AudioError> {
        if self.state == LifecycleState::Active && self.music.is_some() {
            Ok(())
        } else {
            log::warn!("Audio request '{}' rejected while {:?}", operation, self.state);
            Err(AudioError::ManagerUnavailable(self.state))
        }
    }

    /// Advance the audio system by one frame
    ///
    /// Runs reconciliation, then effect aging, then music transitions.
    pub fn tick(&mut self, delta_time: f32) -> TickReport {
        if self.state != LifecycleState::Active {
            return TickReport::default();
        }
        let Some(music) = self.music.as_mut() else {
            return TickReport::default();
        };

        let drift = self.mixer.reconcile(&mut self.backend, music, &mut self.effects);
        let finished_effects = self.effects.update(&mut self.backend, delta_time);
        if let Err(e) = music.advance(&mut self.backend, delta_time) {
            log::error!("Music transition failed: {}", e);
        }

        TickReport { drift, finished_effects }
    }

    // Music

    /// Play background music
    ///
    /// # Returns
    /// `Ok(())` when applied or ignored as a no-op, an error when rejected.
    pub fn play_bgm(&mut self, request: MusicRequest) -> Result<(), AudioError> {
        self.ensure_active("play_bgm")?;
        let Some(music) = self.music.as_mut() else {
            return Err(AudioError::ManagerUnavailable(self.state));
        };

        let state = self.mixer.state();
        let new_volume = request.volume.map(clamp01);
        let volume = new_volume.unwrap_or(state.music_volume);

        let result = music.play(&mut self.backend, request, volume, state.music_muted);
        match &result {
            Ok(()) if new_volume.is_some() => {
                self.mixer.set_group_volume(ChannelGroup::Music, volume);
                self.mixer.apply(ChannelGroup::Music, &mut self.backend, music, &mut self.effects);
            }
            Ok(()) => {}
            Err(e @ (AudioError::TransitionInProgress | AudioError::CrossFadeVoiceBusy)) => {
                log::warn!("Music request rejected: {}", e);
            }
            Err(e) => log::error!("Music request failed: {}", e),
        }
        result
    }

    /// Resolve `path` and play it as background music
    ///
    /// A clip that cannot be found is logged and the request becomes a no-op.
    pub fn play_bgm_from_path(&mut self, path: &str, transition: MusicTransition, duration: f32) -> Result<(), AudioError> {
        self.ensure_active("play_bgm_from_path")?;
        let clip = self.resolve_clip(path);
        self.play_bgm(MusicRequest::new(clip).with_transition(transition, duration))
    }

    /// Stop background music
    pub fn stop_bgm(&mut self) -> Result<(), AudioError> {
        self.with_music("stop_bgm", |music, backend| music.stop(backend))
    }

    /// Pause background music
    pub fn pause_bgm(&mut self) -> Result<(), AudioError> {
        self.with_music("pause_bgm", |music, backend| music.pause(backend))
    }

    /// Resume background music
    pub fn resume_bgm(&mut self) -> Result<(), AudioError> {
        self.with_music("resume_bgm", |music, backend| music.resume(backend))
    }

    /// Drop a pending music transition
    pub fn cancel_transition(&mut self) -> Result<(), AudioError> {
        self.with_music("cancel_transition", |music, backend| music.cancel_transition(backend))
    }

    fn with_music(
        &mut self,
        operation: &str,
        f: impl FnOnce(&mut MusicChannel, &mut dyn AudioBackend) -> Result<(), AudioError>,
    ) -> Result<(), AudioError> {
        self.ensure_active(operation)?;
        let Some(music) = self.music.as_mut() else {
            return Err(AudioError::ManagerUnavailable(self.state));
        };
        let backend: &mut dyn AudioBackend = &mut self.backend;
        let result = f(music, backend);
        if let Err(e) = &result {
            log::error!("Music '{}' failed: {}", operation, e);
        }
        result
    }

    // Effects

    /// Play an effect for `duration` seconds
    pub fn play_sfx(&mut self, request: EffectRequest, duration: f32) -> Option<EffectKey> {
        self.ensure_active("play_sfx").ok()?;
        let state = self.mixer.state();
        self.effects.play_sfx(&mut self.backend, request, duration, state.sfx_volume, state.sfx_muted)
    }

    /// Play an effect `repeat_count` times, forever when negative
    pub fn repeat_sfx(&mut self, request: EffectRequest, repeat_count: i32) -> Option<EffectKey> {
        self.ensure_active("repeat_sfx").ok()?;
        let state = self.mixer.state();
        self.effects.repeat_sfx(&mut self.backend, request, repeat_count, state.sfx_volume, state.sfx_muted)
    }

    /// Play an effect once
    pub fn play_one_shot(&mut self, request: EffectRequest) -> Option<EffectKey> {
        self.ensure_active("play_one_shot").ok()?;
        let state = self.mixer.state();
        self.effects.play_one_shot(&mut self.backend, request, state.sfx_volume, state.sfx_muted)
    }

    /// Stop one effect
    pub fn stop_sfx(&mut self, key: EffectKey) -> bool {
        self.ensure_active("stop_sfx").is_ok() && self.effects.stop(&mut self.backend, key)
    }

    /// Stop every effect playing a clip
    pub fn stop_sfx_clip(&mut self, id: &ClipId) -> usize {
        if self.ensure_active("stop_sfx_clip").is_err() {
            return 0;
        }
        self.effects.stop_clip(&mut self.backend, id)
    }

    /// Pause one effect
    pub fn pause_sfx(&mut self, key: EffectKey) -> Result<(), AudioError> {
        self.ensure_active("pause_sfx")?;
        self.effects.pause(&mut self.backend, key)
    }

    /// Resume one effect
    pub fn resume_sfx(&mut self, key: EffectKey) -> Result<(), AudioError> {
        self.ensure_active("resume_sfx")?;
        self.effects.resume(&mut self.backend, key)
    }

    /// Pause every effect
    pub fn pause_all_sfx(&mut self) {
        if self.ensure_active("pause_all_sfx").is_ok() {
            self.effects.pause_all(&mut self.backend);
        }
    }

    /// Resume every paused effect
    pub fn resume_all_sfx(&mut self) {
        if self.ensure_active("resume_all_sfx").is_ok() {
            self.effects.resume_all(&mut self.backend);
        }
    }

    /// Stop every effect
    pub fn stop_all_sfx(&mut self) {
        if self.ensure_active("stop_all_sfx").is_ok() {
            self.effects.stop_all(&mut self.backend);
        }
    }

    // Volume

    /// Set the music volume (0.0 to 1.0)
    pub fn set_music_volume(&mut self, volume: f32) {
        self.set_group_volume(ChannelGroup::Music, volume);
    }

    /// Set the effect volume (0.0 to 1.0)
    pub fn set_effect_volume(&mut self, volume: f32) {
        self.set_group_volume(ChannelGroup::Effects, volume);
    }

    fn set_group_volume(&mut self, group: ChannelGroup, volume: f32) {
        if self.ensure_active("set_volume").is_err() {
            return;
        }
        self.mixer.set_group_volume(group, volume);
        self.apply(group);
    }

    /// Toggle music mute, returning the new flag
    pub fn toggle_music_mute(&mut self) -> bool {
        self.toggle(ChannelGroup::Music)
    }

    /// Toggle effect mute, returning the new flag
    pub fn toggle_effect_mute(&mut self) -> bool {
        self.toggle(ChannelGroup::Effects)
    }

    fn toggle(&mut self, group: ChannelGroup) -> bool {
        if self.ensure_active("toggle_mute").is_err() {
            return self.mixer.is_muted(group);
        }
        let muted = self.mixer.toggle_mute(group);
        self.apply(group);
        muted
    }

    /// Mute both channels, or unmute both if both are muted
    pub fn toggle_master_mute(&mut self) -> bool {
        if self.ensure_active("toggle_master_mute").is_err() {
            let state = self.mixer.state();
            return state.music_muted && state.sfx_muted;
        }
        let muted = self.mixer.toggle_master_mute();
        self.apply(ChannelGroup::Music);
        self.apply(ChannelGroup::Effects);
        muted
    }

    fn apply(&mut self, group: ChannelGroup) {
        if let Some(music) = self.music.as_mut() {
            self.mixer.apply(group, &mut self.backend, music, &mut self.effects);
        }
    }

    /// Stored channel volumes and mute flags
    pub fn volumes(&self) -> VolumeState {
        self.mixer.state()
    }

    // Preferences

    /// Write the current volumes and mute flags to the preference store
    pub fn save_preferences(&mut self) -> Result<(), AudioError> {
        preferences::save_volume_state(self.preferences.as_mut(), &self.config.preference_keys, self.mixer.state())
    }

    /// Delete the stored audio preferences
    pub fn clear_preferences(&mut self) -> Result<(), AudioError> {
        preferences::clear_volume_state(self.preferences.as_mut(), &self.config.preference_keys)
    }

    // Clips

    /// Add a clip to the library
    pub fn add_clip(&mut self, clip: ClipRef) {
        self.library.add(clip);
    }

    /// Look up a library clip
    pub fn clip(&self, id: &str) -> Option<ClipRef> {
        self.library.get(id).cloned()
    }

    /// Look up a clip in the library, falling back to the loader
    pub fn resolve_clip(&mut self, path: &str) -> Option<ClipRef> {
        if let Some(clip) = self.library.get(path) {
            return Some(ClipRef::clone(clip));
        }
        let result = match self.loader.as_mut() {
            Some(loader) => loader.load_clip(path),
            None => Err(AudioError::ClipNotFound(path.to_string())),
        };
        match result {
            Ok(clip) => {
                self.library.add(ClipRef::clone(&clip));
                Some(clip)
            }
            Err(e) => {
                log::warn!("Could not resolve clip '{}': {}", path, e);
                None
            }
        }
    }

    /// The clip library
    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }

    // Accessors

    /// Current lifecycle state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Configuration in use
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Music channel, once active
    pub fn music(&self) -> Option<&MusicChannel> {
        self.music.as_ref()
    }

    /// Position of the current track in seconds
    pub fn playback_time(&self) -> f32 {
        self.music.as_ref().map_or(0.0, |music| music.playback_time(&self.backend))
    }

    /// Effect pool
    pub fn effects(&self) -> &EffectPool {
        &self.effects
    }

    /// Audio backend
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Mutable audio backend
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: AudioBackend> Drop for AudioManager<B> {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::backend::simulated::SimulatedBackend;
    use crate::audio::{Clip, MemoryPreferenceStore, PreferenceValue};

    fn manager(store: &MemoryPreferenceStore) -> AudioManager<SimulatedBackend> {
        AudioManager::new(SimulatedBackend::new(), AudioConfig::default(), Box::new(store.clone()))
    }

    #[test]
    fn test_requests_rejected_before_activation() {
        let store = MemoryPreferenceStore::new();
        let mut manager = manager(&store);
        let clip = Clip::new("a", 1.0).into_ref();

        assert!(matches!(
            manager.play_bgm(MusicRequest::new(ClipRef::clone(&clip))),
            Err(AudioError::ManagerUnavailable(LifecycleState::Uninitialized))
        ));
        assert!(manager.play_one_shot(EffectRequest::new(clip)).is_none());
        assert_eq!(manager.backend().created_count(), 0);
    }

    #[test]
    fn test_activation_loads_preferences() {
        let mut store = MemoryPreferenceStore::new();
        let keys = AudioConfig::default().preference_keys;
        store.save(&keys.music_volume, PreferenceValue::Float(0.3));
        store.save(&keys.sfx_muted, PreferenceValue::Bool(true));

        let mut manager = manager(&store);
        manager.activate().unwrap();

        assert_eq!(manager.state(), LifecycleState::Active);
        assert_eq!(manager.volumes().music_volume, 0.3);
        assert!(manager.volumes().sfx_muted);
        assert!(manager.music().is_some());
        assert!(matches!(manager.activate(), Err(AudioError::ManagerUnavailable(LifecycleState::Active))));
    }

    #[test]
    fn test_shutdown_saves_and_rejects() {
        let store = MemoryPreferenceStore::new();
        let mut manager = manager(&store);
        manager.activate().unwrap();
        manager.set_effect_volume(0.25);

        manager.begin_shutdown();
        assert_eq!(manager.state(), LifecycleState::ShuttingDown);
        let keys = &manager.config().preference_keys;
        assert_eq!(store.load(&keys.sfx_volume), Some(PreferenceValue::Float(0.25)));

        manager.set_effect_volume(0.9);
        assert_eq!(manager.volumes().sfx_volume, 0.25);
        assert!(manager.play_one_shot(EffectRequest::new(Clip::new("a", 1.0).into_ref())).is_none());
    }

    #[test]
    fn test_destroy_releases_everything() {
        let store = MemoryPreferenceStore::new();
        let mut manager = manager(&store);
        manager.activate().unwrap();
        let clip = Clip::new("loop", 1.0).into_ref();
        manager.repeat_sfx(EffectRequest::new(clip), -1).unwrap();
        assert_eq!(manager.backend().voice_count(), 2);

        manager.destroy();
        assert_eq!(manager.state(), LifecycleState::Destroyed);
        assert_eq!(manager.backend().voice_count(), 0);
        assert!(manager.music().is_none());
        assert!(store.flush_count() >= 1);

        // Ticking a destroyed manager does nothing
        assert_eq!(manager.tick(1.0), TickReport::default());
    }

    #[test]
    fn test_drop_flushes_preferences() {
        let store = MemoryPreferenceStore::new();
        {
            let mut manager = manager(&store);
            manager.activate().unwrap();
            manager.set_music_volume(0.5);
        }
        let keys = AudioConfig::default().preference_keys;
        assert_eq!(store.load(&keys.music_volume), Some(PreferenceValue::Float(0.5)));
    }

    #[test]
    fn test_clear_preferences() {
        let store = MemoryPreferenceStore::new();
        let mut manager = manager(&store);
        manager.activate().unwrap();
        manager.save_preferences().unwrap();
        assert_eq!(store.len(), 4);
        manager.clear_preferences().unwrap();
        assert!(store.is_empty());
    }
}
