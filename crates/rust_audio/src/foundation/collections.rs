//! Specialized collection types

pub use slotmap::{SlotMap, Key};

slotmap::new_key_type! {
    /// Handle to a device-level voice owned by an audio backend
    pub struct VoiceHandle;

    /// Handle to an entry in the sound effect pool
    pub struct EffectKey;
}
