use crate::config::AudioPlayer;
use log::{debug, info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

/// The audio side of a playback session.
///
/// `start` is called once, when the frame buffer is first primed. `stop` is
/// only called when the session is cancelled or fails; after a normal finish
/// the audio is left to run out on its own.
pub trait AudioTrack: Send {
    fn start(&mut self) -> io::Result<()>;
    fn stop(&mut self);
}

/// Plays the audio track of a media file through an external player process
pub struct ExternalAudio {
    player: AudioPlayer,
    media: PathBuf,
    child: Option<Child>,
}

impl ExternalAudio {
    pub fn new(player: AudioPlayer, media: &Path) -> Self {
        Self {
            player,
            media: media.to_path_buf(),
            child: None,
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.player.program);
        command
            .args(&self.player.args)
            .arg(&self.media)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        command
    }

    /// Whether the player process is still running
    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }
}

impl AudioTrack for ExternalAudio {
    fn start(&mut self) -> io::Result<()> {
        if self.child.is_some() {
            return Ok(());
        }
        let child = self.command().spawn()?;
        info!(
            "Started audio player '{}' (pid {}) for '{}'",
            self.player.program,
            child.id(),
            self.media.display()
        );
        self.child = Some(child);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Audio player already gone: {}", e);
            }
            match child.wait() {
                Ok(status) => debug!("Audio player exited: {}", status),
                Err(e) => warn!("Failed to reap audio player: {}", e),
            }
        }
    }
}

/// No audio: images, muted playback, or files without an audio stream
#[derive(Debug, Default, Clone, Copy)]
pub struct Silent;

impl AudioTrack for Silent {
    fn start(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn stop(&mut self) {}
}
