use crate::ansi::DEFAULT_CACHE_CAPACITY;
use crate::playback::try_frame_interval;
use crate::{PlayerError, Result, DEFAULT_BUFSIZE, DEFAULT_SAMPLE_FPS};
use log::debug;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// External program used to play the audio track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AudioPlayer {
    pub program: String,
    /// Arguments placed before the media path
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self {
            program: "ffplay".to_string(),
            args: ["-nodisp", "-autoexit", "-loglevel", "quiet"]
                .iter()
                .map(|arg| arg.to_string())
                .collect(),
        }
    }
}

/// Player settings, optionally loaded from a JSON file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlayerSettings {
    /// Frames buffered before playback starts
    pub buffer_size: usize,
    /// Rate video frames are sampled at
    pub sample_fps: f64,
    /// Play the audio track when there is one
    pub audio: bool,
    pub audio_player: AudioPlayer,
    /// Escape codes kept by the color cache
    pub cache_capacity: usize,
    /// Repeat animated images until interrupted
    pub loop_animations: bool,
}

impl Default for PlayerSettings {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFSIZE,
            sample_fps: DEFAULT_SAMPLE_FPS,
            audio: true,
            audio_player: AudioPlayer::default(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            loop_animations: false,
        }
    }
}

impl PlayerSettings {
    /// Load settings from a JSON file; absent fields keep their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&text)?;
        debug!("Loaded settings from '{}': {:?}", path.display(), settings);
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_size == 0 {
            return Err(PlayerError::InvalidConfig(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if try_frame_interval(self.sample_fps).is_err() {
            return Err(PlayerError::InvalidConfig(format!(
                "sample_fps must be a positive number with a representable frame interval, got {}",
                self.sample_fps
            )));
        }
        if self.cache_capacity == 0 {
            return Err(PlayerError::InvalidConfig(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }
        if self.audio_player.program.trim().is_empty() {
            return Err(PlayerError::InvalidConfig(
                "audio_player.program must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
