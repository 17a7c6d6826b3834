use crate::config::PlayerSettings;
use crate::playback::try_frame_interval;
use clap::Parser;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the video or image to play, or `-` to read it from standard input
    #[arg(required = true)]
    pub input: String,

    /// Repeat animated images until interrupted
    #[arg(short, long = "loop")]
    pub loop_playback: bool,

    /// Rate video frames are sampled at (FPS)
    #[arg(short, long)]
    pub fps: Option<f64>,

    /// Frames to buffer before playback (and audio) starts
    #[arg(short, long, value_name = "FRAMES")]
    pub buffer_size: Option<usize>,

    /// Set terminal width (override automatic detection)
    #[arg(short, long)]
    pub width: Option<u16>,

    /// Set terminal height (override automatic detection)
    #[arg(long)]
    pub height: Option<u16>,

    /// Do not play the audio track
    #[arg(long)]
    pub no_audio: bool,

    /// Load player settings from a JSON file
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show media information only (don't play)
    #[arg(long)]
    pub info_only: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Cli {
    /// Validate command line arguments
    pub fn validate(&self) -> Result<(), String> {
        if self.input != "-" && !Path::new(&self.input).exists() {
            return Err(format!("Media file does not exist: {}", self.input));
        }

        if let Some(fps) = self.fps {
            if !fps.is_finite() || fps <= 0.0 {
                return Err("FPS must be greater than 0".to_string());
            }
            if try_frame_interval(fps).is_err() {
                return Err(format!("FPS is too low: {}", fps));
            }
        }

        if self.buffer_size == Some(0) {
            return Err("Buffer size must be greater than 0".to_string());
        }

        if self.width == Some(0) {
            return Err("Terminal width must be greater than 0".to_string());
        }

        if self.height == Some(0) {
            return Err("Terminal height must be greater than 0".to_string());
        }

        if let Some(config) = &self.config {
            if !config.exists() {
                return Err(format!("Config file does not exist: {}", config.display()));
            }
        }

        Ok(())
    }

    /// Apply command line overrides on top of loaded settings
    pub fn apply_to(&self, settings: &mut PlayerSettings) {
        if let Some(fps) = self.fps {
            settings.sample_fps = fps;
        }
        if let Some(buffer_size) = self.buffer_size {
            settings.buffer_size = buffer_size;
        }
        if self.no_audio {
            settings.audio = false;
        }
        if self.loop_playback {
            settings.loop_animations = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("ansi-player").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_stdin_input_skips_existence_check() {
        let cli = parse(&["-"]);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_missing_input_rejected() {
        let cli = parse(&["no-such-clip.mp4"]);
        assert!(cli.validate().unwrap_err().contains("does not exist"));
    }

    #[test]
    fn test_invalid_numbers_rejected() {
        assert!(parse(&["-", "--fps", "0"]).validate().is_err());
        assert!(parse(&["-", "--buffer-size", "0"]).validate().is_err());
        assert!(parse(&["-", "--width", "0"]).validate().is_err());
    }

    #[test]
    fn test_tiny_fps_rejected() {
        let err = parse(&["-", "--fps", "1e-300"]).validate().unwrap_err();
        assert!(err.contains("too low"));
        assert!(parse(&["-", "--fps", "0.001"]).validate().is_ok());
    }

    #[test]
    fn test_overrides_apply_to_settings() {
        let cli = parse(&["-", "--fps", "12.5", "-b", "7", "--no-audio", "--loop"]);
        let mut settings = PlayerSettings::default();
        cli.apply_to(&mut settings);

        assert_eq!(settings.sample_fps, 12.5);
        assert_eq!(settings.buffer_size, 7);
        assert!(!settings.audio);
        assert!(settings.loop_animations);
    }

    #[test]
    fn test_no_overrides_keeps_settings() {
        let cli = parse(&["-"]);
        let mut settings = PlayerSettings::default();
        cli.apply_to(&mut settings);
        assert_eq!(settings, PlayerSettings::default());
    }
}
