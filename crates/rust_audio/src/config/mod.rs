//! Configuration system

use serde::{Serialize, Deserialize};
use std::path::Path;

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(ConfigError::Io)?;
        from_str_for(path, &contents)
    }

    /// Load configuration from file, falling back to defaults when it is missing
    fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load_from_file(path)
        } else {
            log::info!("No config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Save configuration to file
    fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = to_string_for(path, self)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

/// Deserialize `contents` in the format selected by the extension of `path`
pub(crate) fn from_str_for<T: for<'de> Deserialize<'de>>(path: &Path, contents: &str) -> Result<T, ConfigError> {
    match Format::of(path)? {
        Format::Toml => toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
        Format::Ron => ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string())),
    }
}

/// Serialize `value` in the format selected by the extension of `path`
pub(crate) fn to_string_for<T: Serialize>(path: &Path, value: &T) -> Result<String, ConfigError> {
    match Format::of(path)? {
        Format::Toml => toml::to_string_pretty(value).map_err(|e| ConfigError::Serialize(e.to_string())),
        Format::Ron => ron::ser::to_string_pretty(value, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Serialize(e.to_string())),
    }
}

#[derive(Debug, Clone, Copy)]
enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    
    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
    
    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),
    
    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Preference store key names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceKeys {
    /// Background music volume
    pub music_volume: String,
    /// Sound effect volume
    pub sfx_volume: String,
    /// Background music mute flag
    pub music_muted: String,
    /// Sound effect mute flag
    pub sfx_muted: String,
}

impl Default for PreferenceKeys {
    fn default() -> Self {
        Self {
            music_volume: "audio.music_volume".to_string(),
            sfx_volume: "audio.sfx_volume".to_string(),
            music_muted: "audio.music_muted".to_string(),
            sfx_muted: "audio.sfx_muted".to_string(),
        }
    }
}

/// # Audio Manager Configuration
///
/// Defaults used before preferences are loaded, tuning thresholds for
/// effect completion and the names of external collaborator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Music volume used when no preference is stored (0.0 to 1.0)
    pub music_volume: f32,
    /// Effect volume used when no preference is stored (0.0 to 1.0)
    pub sfx_volume: f32,
    /// Music mute flag used when no preference is stored
    pub music_muted: bool,
    /// Effect mute flag used when no preference is stored
    pub sfx_muted: bool,
    /// Remaining time at or below which an effect counts as finished
    pub completion_epsilon: f32,
    /// Remaining time below which a stopped, rewound voice counts as finished
    pub early_finish_threshold: f32,
    /// Playback position treated as "rewound to the start"
    pub rewind_epsilon: f32,
    /// External mixer parameter mirroring the music volume
    pub music_mixer_parameter: Option<String>,
    /// External mixer parameter mirroring the effect volume
    pub sfx_mixer_parameter: Option<String>,
    /// Preference key names
    pub preference_keys: PreferenceKeys,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            music_volume: 1.0,
            sfx_volume: 1.0,
            music_muted: false,
            sfx_muted: false,
            completion_epsilon: 1e-4,
            early_finish_threshold: 0.09,
            rewind_epsilon: 1e-3,
            music_mixer_parameter: None,
            sfx_mixer_parameter: None,
            preference_keys: PreferenceKeys::default(),
        }
    }
}

impl Config for AudioConfig {}

impl AudioConfig {
    /// Set the external mixer parameter names for both channels
    pub fn with_mixer_parameters(mut self, music: impl Into<String>, sfx: impl Into<String>) -> Self {
        self.music_mixer_parameter = Some(music.into());
        self.sfx_mixer_parameter = Some(sfx.into());
        self
    }

    /// Set the default channel volumes
    pub fn with_volumes(mut self, music: f32, sfx: f32) -> Self {
        self.music_volume = music.clamp(0.0, 1.0);
        self.sfx_volume = sfx.clamp(0.0, 1.0);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let parsed: AudioConfig = from_str_for(
            Path::new("audio.toml"),
            "music_volume = 0.5\nmusic_mixer_parameter = \"MusicVol\"\n",
        ).unwrap();
        assert_eq!(parsed.music_volume, 0.5);
        assert_eq!(parsed.sfx_volume, 1.0);
        assert_eq!(parsed.music_mixer_parameter.as_deref(), Some("MusicVol"));
        assert_eq!(parsed.preference_keys, PreferenceKeys::default());
    }

    #[test]
    fn test_ron_roundtrip() {
        let config = AudioConfig::default().with_mixer_parameters("Music", "Sfx");
        let text = to_string_for(Path::new("audio.ron"), &config).unwrap();
        let parsed: AudioConfig = from_str_for(Path::new("audio.ron"), &text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_unsupported_extension() {
        let result: Result<AudioConfig, _> = from_str_for(Path::new("audio.json"), "{}");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_missing_file_falls_back_to_default() {
        let config = AudioConfig::load_or_default("definitely/not/here/audio.toml").unwrap();
        assert_eq!(config, AudioConfig::default());
    }
}
