use crate::{PlayerError, Result};
use log::{debug, info};
use std::env;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

const STAGING_CHUNK_BYTES: usize = 1 << 16;

/// A media file ready for decoding.
///
/// Piped input is copied into a temporary file so the decoder and the audio
/// player can both open it by path. The file is removed when this is dropped.
pub enum StagedMedia {
    Local(PathBuf),
    Temporary(NamedTempFile),
}

impl StagedMedia {
    /// Use `input` as a path, or stage standard input when it is `-`
    pub fn open(input: &str) -> Result<Self> {
        Self::open_until(input, || false)
    }

    /// Like [`StagedMedia::open`], giving up once `cancelled` returns true.
    /// A partly staged file is removed before returning.
    pub fn open_until<C: Fn() -> bool>(input: &str, cancelled: C) -> Result<Self> {
        if input == "-" {
            Self::from_reader_until(io::stdin().lock(), cancelled)
        } else {
            Ok(Self::Local(PathBuf::from(input)))
        }
    }

    /// Copy a stream into a temporary file
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_reader_until(reader, || false)
    }

    pub fn from_reader_until<R: Read, C: Fn() -> bool>(reader: R, cancelled: C) -> Result<Self> {
        stage_in(reader, &env::temp_dir(), cancelled)
    }

    pub fn path(&self) -> &Path {
        match self {
            Self::Local(path) => path,
            Self::Temporary(file) => file.path(),
        }
    }

    /// Display name for logs and info output
    pub fn name(&self) -> String {
        match self {
            Self::Local(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Temporary(_) => "<stdin>".to_string(),
        }
    }
}

fn stage_in<R: Read, C: Fn() -> bool>(mut reader: R, dir: &Path, cancelled: C) -> Result<StagedMedia> {
    let mut file = tempfile::Builder::new()
        .prefix("ansi-player-")
        .tempfile_in(dir)?;
    let mut chunk = vec![0u8; STAGING_CHUNK_BYTES];
    let mut bytes = 0u64;

    loop {
        if cancelled() {
            info!("Staging interrupted after {} bytes", bytes);
            return Err(PlayerError::Interrupted);
        }
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        file.write_all(&chunk[..read])?;
        bytes += read as u64;
    }
    file.flush()?;

    info!("Staged {} bytes at '{}'", bytes, file.path().display());
    Ok(StagedMedia::Temporary(file))
}

impl Drop for StagedMedia {
    fn drop(&mut self) {
        if let Self::Temporary(file) = self {
            debug!("Removing staged media '{}'", file.path().display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_path_passthrough() {
        let media = StagedMedia::open("videos/clip.mp4").unwrap();
        assert_eq!(media.path(), Path::new("videos/clip.mp4"));
        assert_eq!(media.name(), "clip.mp4");
    }

    #[test]
    fn test_staged_file_removed_on_drop() {
        let media = StagedMedia::from_reader(&b"GIF89a not really"[..]).unwrap();
        let path = media.path().to_path_buf();
        assert_eq!(std::fs::read(&path).unwrap(), b"GIF89a not really");
        assert_eq!(media.name(), "<stdin>");

        drop(media);
        assert!(!path.exists());
    }

    #[test]
    fn test_staging_larger_than_one_chunk() {
        let data: Vec<u8> = (0..STAGING_CHUNK_BYTES * 2 + 17).map(|i| (i % 251) as u8).collect();
        let media = StagedMedia::from_reader(&data[..]).unwrap();
        assert_eq!(std::fs::read(media.path()).unwrap(), data);
    }

    #[test]
    fn test_cancelled_staging_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let data = vec![7u8; STAGING_CHUNK_BYTES * 3];
        let checks = std::cell::Cell::new(0);
        let cancel_after_first_chunk = || {
            checks.set(checks.get() + 1);
            checks.get() > 1
        };

        let result = stage_in(&data[..], dir.path(), cancel_after_first_chunk);
        assert!(matches!(result, Err(PlayerError::Interrupted)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
