//! # Rust Audio
//!
//! A runtime audio manager for games and interactive applications.
//!
//! ## Features
//!
//! - **Background Music**: Swift changes, linear fades and cross-fades
//! - **Effect Pool**: Timed, repeating and singleton sound effects with completion callbacks
//! - **Mixer Reconciliation**: Per-frame drift detection against voices and an external mixer
//! - **Preferences**: Volume and mute flags persisted across sessions
//! - **Backends**: Deterministic simulated backend, optional Rodio device output
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_audio::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AudioConfig::load_or_default("audio.toml")?;
//!     let mut audio = AudioManager::start(SimulatedBackend::new(), config, Box::new(MemoryPreferenceStore::new()))?;
//!
//!     let theme = Clip::new("theme", 90.0).into_ref();
//!     audio.play_bgm(MusicRequest::new(theme).with_transition(MusicTransition::CrossFade, 2.0))?;
//!
//!     // Once per frame
//!     audio.tick(1.0 / 60.0);
//!
//!     audio.destroy();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod foundation;
pub mod config;
pub mod audio;

/// Common imports for audio users
pub mod prelude {
    pub use crate::{
        audio::{
            backend::simulated::{SimulatedBackend, SimulatedMixer},
            AudioBackend, AudioError, AudioManager, Clip, ClipId, ClipLibrary, ClipLoader, ClipRef, EffectKey,
            EffectRequest, ExternalMixer, FilePreferenceStore, LifecycleState, MemoryPreferenceStore, MusicRequest,
            MusicState, MusicTransition, PreferenceStore, SpatialBlend, TickReport, VolumeState,
        },
        config::{AudioConfig, Config},
        foundation::math::Vec3,
    };
}
