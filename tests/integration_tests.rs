use ansi_player::prelude::*;
use ansi_player::buffer::Readiness;
use assert_cmd::Command;
use image::codecs::gif::{GifEncoder, Repeat};
use image::{Delay, ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
use predicates::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;
use tempfile::{tempdir, TempDir};

const FRAME_COLORS: [[u8; 3]; 4] = [[255, 0, 0], [0, 255, 0], [0, 0, 255], [255, 255, 0]];

/// Write a 4-frame, 2x2-pixel animated GIF with one solid color per frame
fn create_test_animation(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("anim.gif");
    let file = std::fs::File::create(&path).unwrap();
    let mut encoder = GifEncoder::new(file);
    encoder.set_repeat(Repeat::Infinite).unwrap();
    for [r, g, b] in FRAME_COLORS {
        let buffer = RgbaImage::from_pixel(2, 2, Rgba([r, g, b, 255]));
        encoder
            .encode_frame(image::Frame::from_parts(buffer, 0, 0, Delay::from_numer_denom_ms(50, 1)))
            .unwrap();
    }
    path
}

fn create_test_image(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("still.png");
    RgbImage::from_fn(8, 6, |x, _| if x < 4 { Rgb([10, 20, 30]) } else { Rgb([200, 100, 0]) })
        .save_with_format(&path, ImageFormat::Png)
        .unwrap();
    path
}

#[derive(Clone, Default)]
struct CountingAudio {
    starts: Arc<AtomicUsize>,
}

impl AudioTrack for CountingAudio {
    fn start(&mut self) -> io::Result<()> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn stop(&mut self) {}
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("half-block"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_missing_file() {
    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg("nonexistent.mp4");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_invalid_buffer_size() {
    let dir = tempdir().unwrap();
    let image = create_test_image(&dir);

    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg(&image).arg("--buffer-size").arg("0");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Buffer size must be greater than 0"));
}

#[test]
fn test_cli_rejects_unrepresentable_fps() {
    let dir = tempdir().unwrap();
    let image = create_test_image(&dir);

    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg(&image).arg("--fps").arg("1e-300");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("FPS is too low"));
}

#[test]
fn test_cli_renders_still_image() {
    let dir = tempdir().unwrap();
    let image = create_test_image(&dir);

    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg(&image).args(["--width", "4", "--height", "2"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(CURSOR_HOME))
        .stdout(predicate::str::contains("▀▀"));
}

#[test]
fn test_cli_info_only_for_animation() {
    let dir = tempdir().unwrap();
    let animation = create_test_animation(&dir);

    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg(&animation).args(["--info-only", "--width", "2", "--height", "1"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Frames: 4"))
        .stdout(predicate::str::contains("2x2 pixels"));
}

#[test]
fn test_cli_rejects_unknown_config_field() {
    let dir = tempdir().unwrap();
    let image = create_test_image(&dir);
    let config = dir.path().join("player.json");
    std::fs::write(&config, r#"{ "frames_per_buffer": 3 }"#).unwrap();

    let mut cmd = Command::cargo_bin("ansi-player").unwrap();
    cmd.arg(&image).arg("--config").arg(&config);
    cmd.assert().failure().stderr(predicate::str::contains("settings"));
}

mod end_to_end {
    use super::*;

    fn grid(columns: u32, rows: u32) -> TerminalSize {
        TerminalSize::new(columns, rows).unwrap()
    }

    #[test]
    fn test_animated_image_renders_four_distinct_frames() {
        let dir = tempdir().unwrap();
        let path = create_test_animation(&dir);

        let kind = probe_media(&path).unwrap();
        assert_eq!(kind, MediaKind::Image(ImageFormat::Gif));

        let source = ImageSource::open(&path, ImageFormat::Gif, grid(2, 1)).unwrap();
        assert!(source.is_animated());

        let mut renderer = FrameRenderer::default();
        let outputs: Vec<String> = source.frames().iter().map(|f| renderer.render(f)).collect();
        assert_eq!(outputs.len(), 4);

        for output in &outputs {
            assert!(output.starts_with(CURSOR_HOME));
            let body = output
                .strip_prefix(CURSOR_HOME)
                .and_then(|b| b.strip_suffix(RESET))
                .unwrap();
            // One row, one escape code, two glyphs
            assert!(!body.contains('\n'));
            assert_eq!(body.matches("\x1b[38;2;").count(), 1);
            assert!(body.ends_with("▀▀"));
            assert_eq!(body.chars().filter(|c| *c == HALF_BLOCK).count(), 2);
        }

        for i in 0..outputs.len() {
            for j in i + 1..outputs.len() {
                assert_ne!(outputs[i], outputs[j]);
            }
        }
    }

    #[test]
    fn test_animation_plays_through_session() {
        let dir = tempdir().unwrap();
        let path = create_test_animation(&dir);
        let source = ImageSource::open(&path, ImageFormat::Gif, grid(2, 1)).unwrap();

        let config = SessionConfig::new(source.frame_rate(), grid(2, 1), 2);
        let mut out = Vec::new();
        let report = PlaybackSession::new(config, Silent)
            .run(move || Ok(source.into_frames(false)), &mut out)
            .unwrap();

        assert_eq!(report.frames_shown, 4);
        assert_eq!(String::from_utf8(out).unwrap().matches(CURSOR_HOME).count(), 4);
    }

    #[test]
    fn test_scheduler_bufsize_five_lifecycle() {
        let audio = CountingAudio::default();
        let (tx, rx) = mpsc::channel();
        let config = SessionConfig::new(100.0, grid(2, 1), 5);
        let session = PlaybackSession::new(config, audio.clone()).with_events(tx);

        let frames = (0..5u8).map(|i| Ok(RgbImage::from_pixel(2, 2, Rgb([i, i, i]))));
        let report = session.run(move || Ok(frames), &mut io::sink()).unwrap();

        assert_eq!(report.frames_shown, 5);
        assert_eq!(audio.starts.load(Ordering::SeqCst), 1);

        let states: Vec<PlaybackState> = rx
            .try_iter()
            .filter_map(|event| match event {
                PlaybackEvent::State(state) => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(
            states,
            vec![
                PlaybackState::Priming,
                PlaybackState::Playing,
                PlaybackState::Draining,
                PlaybackState::Terminal
            ]
        );
    }

    #[test]
    fn test_buffer_is_fifo_across_threads() {
        let buffer = Arc::new(FrameBuffer::new(8));
        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                for i in 0..100 {
                    buffer.push(format!("frame_{}", i)).unwrap();
                }
                buffer.finish();
            })
        };

        let mut received = Vec::new();
        loop {
            if buffer.wait_ready(8) == Readiness::Cancelled {
                break;
            }
            while let Some((label, _)) = buffer.pop_ready(8) {
                received.push(label);
            }
            if buffer.is_drained() {
                break;
            }
        }
        producer.join().unwrap();

        let expected: Vec<String> = (0..100).map(|i| format!("frame_{}", i)).collect();
        assert_eq!(received, expected);
    }

    #[test]
    fn test_pacing_for_instant_producer() {
        let frames_count = 8u32;
        let fps = 25.0;
        let config = SessionConfig::new(fps, grid(2, 1), 3);
        let frames = (0..frames_count).map(|_| Ok(RgbImage::new(2, 2)));

        let started = Instant::now();
        let report = PlaybackSession::new(config, Silent)
            .run(move || Ok(frames), &mut io::sink())
            .unwrap();
        let elapsed = started.elapsed();

        assert_eq!(report.frames_shown, frames_count as u64);
        let minimum = frame_interval(fps) * (frames_count - 1);
        assert!(elapsed >= minimum, "{:?} < {:?}", elapsed, minimum);
    }

    #[test]
    fn test_resize_fills_grid_for_any_aspect() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tall.png");
        RgbImage::from_pixel(3, 90, Rgb([1, 2, 3])).save(&path).unwrap();

        let source = ImageSource::open(Path::new(&path), ImageFormat::Png, grid(40, 12)).unwrap();
        assert_eq!(source.frames()[0].dimensions(), (40, 24));
    }
}

mod unit_tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0.0), "0:00");
        assert_eq!(format_duration(30.0), "0:30");
        assert_eq!(format_duration(90.0), "1:30");
        assert_eq!(format_duration(3661.0), "1:01:01");
    }

    #[test]
    fn test_color_encoder_memoizes() {
        let mut cache = AnsiCache::new(32);
        let pair = ColorPair::new((12, 34, 56), (78, 90, 123));
        let expected = rgb_to_ansi(pair.fg, Some(pair.bg));
        assert_eq!(cache.get(pair), expected);
        assert_eq!(cache.get(pair), expected);
        assert_eq!(cache.len(), 1);
    }
}
