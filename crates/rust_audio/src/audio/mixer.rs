//! Audio mixer system
//!
//! Holds the channel volume and mute state and keeps the device voices and
//! an optional external mixer in step with it. Reconciliation runs once per
//! tick:
//!
//! 1. An external mixer parameter that moved away from the stored volume is
//!    an edit made outside the manager (a settings screen, a console) and is
//!    adopted as the new stored volume.
//! 2. Voices whose volume or mute flag disagree with the stored state are
//!    overwritten; the stored state always wins at the device.
//! 3. Any channel that drifted is re-pushed to its voices and its mixer
//!    parameter.

use crate::audio::backend::{AudioBackend, ExternalMixer};
use crate::audio::{EffectPool, MusicChannel};
use crate::config::AudioConfig;
use crate::foundation::math::{clamp01, linear_to_mixer_db, mixer_db_to_linear, nearly_equal};
use bitflags::bitflags;

/// Volume group categories for independent volume control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroup {
    /// Background music
    Music,
    /// Sound effects
    Effects,
}

/// Stored volume and mute flags for both channels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    /// Music volume (0.0 to 1.0)
    pub music_volume: f32,
    /// Effect volume (0.0 to 1.0)
    pub sfx_volume: f32,
    /// Music mute flag
    pub music_muted: bool,
    /// Effect mute flag
    pub sfx_muted: bool,
}

impl VolumeState {
    /// Volume of a group
    pub fn volume(&self, group: ChannelGroup) -> f32 {
        match group {
            ChannelGroup::Music => self.music_volume,
            ChannelGroup::Effects => self.sfx_volume,
        }
    }

    /// Mute flag of a group
    pub fn muted(&self, group: ChannelGroup) -> bool {
        match group {
            ChannelGroup::Music => self.music_muted,
            ChannelGroup::Effects => self.sfx_muted,
        }
    }

    fn set_volume(&mut self, group: ChannelGroup, volume: f32) {
        let volume = clamp01(volume);
        match group {
            ChannelGroup::Music => self.music_volume = volume,
            ChannelGroup::Effects => self.sfx_volume = volume,
        }
    }

    fn set_muted(&mut self, group: ChannelGroup, muted: bool) {
        match group {
            ChannelGroup::Music => self.music_muted = muted,
            ChannelGroup::Effects => self.sfx_muted = muted,
        }
    }
}

impl From<&AudioConfig> for VolumeState {
    fn from(config: &AudioConfig) -> Self {
        Self {
            music_volume: clamp01(config.music_volume),
            sfx_volume: clamp01(config.sfx_volume),
            music_muted: config.music_muted,
            sfx_muted: config.sfx_muted,
        }
    }
}

bitflags! {
    /// What a reconciliation pass found out of step
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Drift: u8 {
        /// External music parameter was edited
        const MUSIC_MIXER = 1 << 0;
        /// External effect parameter was edited
        const SFX_MIXER = 1 << 1;
        /// A music voice disagreed with the stored state
        const MUSIC_VOICE = 1 << 2;
        /// An effect voice disagreed with the stored state
        const SFX_VOICES = 1 << 3;
    }
}

impl Drift {
    fn touches(self, group: ChannelGroup) -> bool {
        match group {
            ChannelGroup::Music => self.intersects(Self::MUSIC_MIXER | Self::MUSIC_VOICE),
            ChannelGroup::Effects => self.intersects(Self::SFX_MIXER | Self::SFX_VOICES),
        }
    }
}

/// Audio mixer managing channel volumes and their external mirror
pub struct MixerSystem {
    state: VolumeState,
    external: Option<Box<dyn ExternalMixer>>,
    music_parameter: Option<String>,
    sfx_parameter: Option<String>,
}

impl MixerSystem {
    /// Create a mixer with the configured default levels and no external mixer
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            state: VolumeState::from(config),
            external: None,
            music_parameter: config.music_mixer_parameter.clone(),
            sfx_parameter: config.sfx_mixer_parameter.clone(),
        }
    }

    /// Attach an external mixer and seed its parameters from the stored state
    pub fn set_external(&mut self, mixer: Box<dyn ExternalMixer>) {
        self.external = Some(mixer);
        self.push_external(ChannelGroup::Music);
        self.push_external(ChannelGroup::Effects);
    }

    /// Detach the external mixer
    pub fn take_external(&mut self) -> Option<Box<dyn ExternalMixer>> {
        self.external.take()
    }

    /// Current stored state
    pub fn state(&self) -> VolumeState {
        self.state
    }

    /// Replace the stored state wholesale (used when loading preferences)
    pub fn set_state(&mut self, state: VolumeState) {
        self.state = VolumeState {
            music_volume: clamp01(state.music_volume),
            sfx_volume: clamp01(state.sfx_volume),
            ..state
        };
    }

    /// Set volume for a group (0.0 to 1.0)
    pub fn set_group_volume(&mut self, group: ChannelGroup, volume: f32) {
        self.state.set_volume(group, volume);
    }

    /// Get volume for a group
    pub fn group_volume(&self, group: ChannelGroup) -> f32 {
        self.state.volume(group)
    }

    /// Set the mute flag for a group
    pub fn set_muted(&mut self, group: ChannelGroup, muted: bool) {
        self.state.set_muted(group, muted);
    }

    /// Check if a group is muted
    pub fn is_muted(&self, group: ChannelGroup) -> bool {
        self.state.muted(group)
    }

    /// Toggle mute state for a group, returning the new flag
    pub fn toggle_mute(&mut self, group: ChannelGroup) -> bool {
        let muted = !self.is_muted(group);
        self.state.set_muted(group, muted);
        muted
    }

    /// Mute both groups unless both already are, in which case unmute both
    pub fn toggle_master_mute(&mut self) -> bool {
        let muted = !(self.state.music_muted && self.state.sfx_muted);
        self.state.music_muted = muted;
        self.state.sfx_muted = muted;
        muted
    }

    fn parameter_name(&self, group: ChannelGroup) -> Option<&str> {
        match group {
            ChannelGroup::Music => self.music_parameter.as_deref(),
            ChannelGroup::Effects => self.sfx_parameter.as_deref(),
        }
    }

    /// Read a group's external parameter as a linear volume
    pub fn external_volume(&self, group: ChannelGroup) -> Option<f32> {
        let name = self.parameter_name(group)?;
        self.external.as_ref()?.parameter(name).map(mixer_db_to_linear)
    }

    fn push_external(&mut self, group: ChannelGroup) {
        let value = linear_to_mixer_db(self.state.volume(group));
        let name = match group {
            ChannelGroup::Music => self.music_parameter.as_deref(),
            ChannelGroup::Effects => self.sfx_parameter.as_deref(),
        };
        if let (Some(name), Some(external)) = (name, self.external.as_mut()) {
            if !external.set_parameter(name, value) {
                log::warn!("External mixer rejected parameter '{}'", name);
            }
        }
    }

    /// Push a group's stored state to its voices and external parameter
    pub fn apply(
        &mut self,
        group: ChannelGroup,
        backend: &mut dyn AudioBackend,
        music: &mut MusicChannel,
        effects: &mut EffectPool,
    ) {
        let volume = self.state.volume(group);
        let muted = self.state.muted(group);
        match group {
            ChannelGroup::Music => {
                if let Err(e) = music.apply_levels(backend, volume, muted) {
                    log::warn!("Failed to apply music levels: {}", e);
                }
            }
            ChannelGroup::Effects => effects.apply_levels(backend, volume, muted),
        }
        self.push_external(group);
    }

    /// Detect drift and re-converge (call once per frame, before aging)
    pub fn reconcile(
        &mut self,
        backend: &mut dyn AudioBackend,
        music: &mut MusicChannel,
        effects: &mut EffectPool,
    ) -> Drift {
        let mut drift = Drift::empty();

        for (group, flag) in [(ChannelGroup::Music, Drift::MUSIC_MIXER), (ChannelGroup::Effects, Drift::SFX_MIXER)] {
            if let Some(external) = self.external_volume(group) {
                if !nearly_equal(external, self.state.volume(group)) {
                    log::debug!("External mixer moved {:?} volume to {:.3}", group, external);
                    self.state.set_volume(group, external);
                    drift |= flag;
                }
            }
        }

        match music.has_drifted(backend, self.state.music_volume, self.state.music_muted) {
            Ok(true) => drift |= Drift::MUSIC_VOICE,
            Ok(false) => {}
            Err(e) => log::warn!("Music voice unavailable during reconciliation: {}", e),
        }
        if effects.has_drifted(backend, self.state.sfx_volume, self.state.sfx_muted) {
            drift |= Drift::SFX_VOICES;
        }

        for group in [ChannelGroup::Music, ChannelGroup::Effects] {
            if drift.touches(group) {
                self.apply(group, backend, music, effects);
            }
        }
        if !drift.is_empty() {
            log::debug!("Mixer reconciled: {:?}", drift);
        }
        drift
    }
}
