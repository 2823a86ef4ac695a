//! Clip references, the clip library and the loader seam
//!
//! A clip is immutable once created and shared by reference between the
//! library, the music channel and any number of effect voices.

use crate::audio::AudioError;
use std::fmt;
use std::sync::Arc;

/// Identity of a clip; two clips with the same id are the same sound
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClipId(String);

impl ClipId {
    /// Create a clip id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ClipId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A resolved audio clip
#[derive(Clone)]
pub struct Clip {
    id: ClipId,
    length: f32,
    /// Encoded audio bytes for backends that decode on playback
    data: Option<Arc<[u8]>>,
}

/// Shared clip reference
pub type ClipRef = Arc<Clip>;

impl Clip {
    /// Create a clip with a known length in seconds and no payload
    pub fn new(id: impl Into<ClipId>, length: f32) -> Self {
        Self {
            id: id.into(),
            length: length.max(0.0),
            data: None,
        }
    }

    /// Attach encoded audio data
    pub fn with_data(mut self, data: impl Into<Arc<[u8]>>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Wrap into a shared reference
    pub fn into_ref(self) -> ClipRef {
        Arc::new(self)
    }

    /// Clip identity
    pub fn id(&self) -> &ClipId {
        &self.id
    }

    /// Natural length in seconds
    pub fn length(&self) -> f32 {
        self.length
    }

    /// Encoded audio data, if any
    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }
}

impl From<String> for ClipId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl fmt::Debug for Clip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clip")
            .field("id", &self.id)
            .field("length", &self.length)
            .field("data_len", &self.data.as_ref().map(|d| d.len()))
            .finish()
    }
}

/// Resolves a path or URL into a clip
pub trait ClipLoader {
    /// Load a clip, or report [`AudioError::ClipNotFound`]
    fn load_clip(&mut self, path: &str) -> Result<ClipRef, AudioError>;
}

/// Ordered lookup cache of named clips
#[derive(Debug, Default, Clone)]
pub struct ClipLibrary {
    clips: Vec<ClipRef>,
}

impl ClipLibrary {
    /// Create an empty library
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clip, replacing any clip with the same id in place
    pub fn add(&mut self, clip: ClipRef) {
        match self.index_of(clip.id().as_str()) {
            Some(index) => self.clips[index] = clip,
            None => self.clips.push(clip),
        }
    }

    /// Look up a clip by id
    pub fn get(&self, id: &str) -> Option<&ClipRef> {
        self.clips.iter().find(|clip| clip.id().as_str() == id)
    }

    /// Position of a clip in insertion order
    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.clips.iter().position(|clip| clip.id().as_str() == id)
    }

    /// Remove a clip by id
    pub fn remove(&mut self, id: &str) -> Option<ClipRef> {
        self.index_of(id).map(|index| self.clips.remove(index))
    }

    /// Iterate clips in insertion order
    pub fn iter(&self) -> impl Iterator<Item = &ClipRef> {
        self.clips.iter()
    }

    /// Number of cached clips
    pub fn len(&self) -> usize {
        self.clips.len()
    }

    /// Whether the library is empty
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_keeps_order_and_replaces() {
        let mut library = ClipLibrary::new();
        library.add(Clip::new("a", 1.0).into_ref());
        library.add(Clip::new("b", 2.0).into_ref());
        library.add(Clip::new("a", 3.0).into_ref());

        assert_eq!(library.len(), 2);
        assert_eq!(library.index_of("a"), Some(0));
        assert_eq!(library.get("a").map(|c| c.length()), Some(3.0));
        assert!(library.get("missing").is_none());
    }

    #[test]
    fn test_remove() {
        let mut library = ClipLibrary::new();
        library.add(Clip::new("a", 1.0).into_ref());
        assert!(library.remove("a").is_some());
        assert!(library.is_empty());
        assert!(library.remove("a").is_none());
    }

    #[test]
    fn test_negative_length_clamped() {
        assert_eq!(Clip::new("x", -2.0).length(), 0.0);
    }
}
