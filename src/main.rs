use ansi_player::utils::format_duration;
use ansi_player::{
    probe_media, AudioTrack, Cli, ExternalAudio, Frame, FrameRenderer, ImageSource, MediaKind,
    PlaybackReport, PlaybackSession, PlayerError, PlayerSettings, SessionConfig, Silent,
    StagedMedia, TerminalGuard, TerminalSize, VideoDecoder, VideoFrames,
};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, error, info};
use std::io::{self, BufWriter, Write};
use tokio::sync::watch;

const OUTPUT_BUFFER_BYTES: usize = 1 << 16;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Frames go to stdout, so logging stays quiet unless asked for
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    info!("Starting ANSI Player v{}", env!("CARGO_PKG_VERSION"));
    let interrupt = listen_for_interrupt();

    let mut settings = match &cli.config {
        Some(path) => PlayerSettings::load(path)
            .with_context(|| format!("Failed to load settings from '{}'", path.display()))?,
        None => PlayerSettings::default(),
    };
    cli.apply_to(&mut settings);
    settings.validate()?;
    debug!("Effective settings: {:?}", settings);

    // Dropping this removes any staged temporary file, on every exit path
    let input = cli.input.clone();
    let staging = interrupt.clone();
    let staged = tokio::task::spawn_blocking(move || {
        StagedMedia::open_until(&input, || *staging.borrow())
    })
    .await?;
    let media = match staged {
        Err(PlayerError::Interrupted) => return Ok(()),
        staged => staged?,
    };
    let size = TerminalSize::detect(cli.width, cli.height)?;
    let kind = probe_media(media.path())
        .with_context(|| format!("Failed to read '{}'", media.name()))?;

    info!("Playing: {} ({:?})", media.name(), kind);

    if cli.info_only {
        return print_info(&media, kind, size);
    }

    match kind {
        MediaKind::Image(format) => {
            let source = ImageSource::open(media.path(), format, size)
                .with_context(|| format!("Failed to decode image '{}'", media.name()))?;
            if is_interrupted(&interrupt) {
                return Ok(());
            }
            if source.is_animated() {
                play_animation(source, size, &settings, interrupt).await?;
            } else {
                show_still(&source, &settings)?;
            }
        }
        MediaKind::Video => play_video(&media, size, &settings, interrupt).await?,
    }

    Ok(())
}

fn show_still(source: &ImageSource, settings: &PlayerSettings) -> Result<()> {
    let mut renderer = FrameRenderer::new(settings.cache_capacity);
    let Some(frame) = source.frames().first() else {
        return Ok(());
    };

    let mut guard = TerminalGuard::enter()?;
    let mut out = io::stdout().lock();
    out.write_all(renderer.render(frame).as_bytes())?;
    out.flush()?;
    drop(out);
    guard.restore()?;
    Ok(())
}

async fn play_animation(
    source: ImageSource,
    size: TerminalSize,
    settings: &PlayerSettings,
    interrupt: watch::Receiver<bool>,
) -> Result<()> {
    let config = SessionConfig::new(source.frame_rate(), size, settings.buffer_size)
        .with_cache_capacity(settings.cache_capacity);
    let looping = settings.loop_animations;
    info!(
        "Animating {} frame(s) at {:.2} FPS{}",
        source.len(),
        config.target_fps,
        if looping { ", looping" } else { "" }
    );

    let open = move || Ok(source.into_frames(looping));
    let report = run_session(config, Silent, open, interrupt).await?;
    debug!("Animation report: {:?}", report);
    Ok(())
}

async fn play_video(
    media: &StagedMedia,
    size: TerminalSize,
    settings: &PlayerSettings,
    interrupt: watch::Receiver<bool>,
) -> Result<()> {
    let video = VideoDecoder::new(media.path())
        .with_context(|| format!("Failed to open video '{}'", media.name()))?
        .info();
    let fps = settings.sample_fps.min(video.fps);
    let config = SessionConfig::new(fps, size, settings.buffer_size)
        .with_cache_capacity(settings.cache_capacity);

    info!(
        "Video info: {}x{}, {:.2} FPS, {} duration, sampled at {:.2} FPS",
        video.width,
        video.height,
        video.fps,
        format_duration(video.duration),
        fps
    );

    let path = media.path().to_path_buf();
    let grid = config.size()?;
    let open = move || VideoFrames::open(&path, grid, fps);

    let report = if settings.audio && video.has_audio {
        let audio = ExternalAudio::new(settings.audio_player.clone(), media.path());
        run_session(config, audio, open, interrupt).await?
    } else {
        debug!("Playing without audio");
        run_session(config, Silent, open, interrupt).await?
    };
    debug!("Video report: {:?}", report);
    Ok(())
}

/// Run a playback session on a blocking thread until it finishes or Ctrl-C
/// cancels it. The terminal is restored before returning either way.
async fn run_session<A, F, I>(
    config: SessionConfig,
    audio: A,
    open: F,
    interrupt: watch::Receiver<bool>,
) -> Result<PlaybackReport>
where
    A: AudioTrack + 'static,
    F: FnOnce() -> ansi_player::Result<I> + Send + 'static,
    I: Iterator<Item = ansi_player::Result<Frame>>,
{
    let _guard = TerminalGuard::enter()?;
    let session = PlaybackSession::new(config, audio);
    let cancel = session.cancel_handle();

    let mut task = tokio::task::spawn_blocking(move || {
        let mut out = BufWriter::with_capacity(OUTPUT_BUFFER_BYTES, io::stdout().lock());
        session.run(open, &mut out)
    });

    let report = tokio::select! {
        joined = &mut task => joined?,
        _ = interrupted(interrupt) => {
            cancel.cancel();
            task.await?
        }
    }?;

    Ok(report)
}

/// Flips to `true` on the first Ctrl-C. From then on SIGINT no longer kills
/// the process, so every stage checks the flag and unwinds with cleanup.
fn listen_for_interrupt() -> watch::Receiver<bool> {
    let (tx, rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
            let _ = tx.send(true);
        }
    });
    rx
}

fn is_interrupted(interrupt: &watch::Receiver<bool>) -> bool {
    *interrupt.borrow()
}

async fn interrupted(mut interrupt: watch::Receiver<bool>) {
    while !*interrupt.borrow_and_update() {
        if interrupt.changed().await.is_err() {
            // Listener gone without an interrupt
            std::future::pending::<()>().await;
        }
    }
}

fn print_info(media: &StagedMedia, kind: MediaKind, size: TerminalSize) -> Result<()> {
    println!("Media Information:");
    println!("  File: {}", media.name());

    match kind {
        MediaKind::Video => {
            let video = VideoDecoder::new(media.path())?.info();
            println!("  Kind: video");
            println!("  Dimensions: {}x{}", video.width, video.height);
            println!("  Frame Rate: {:.2} FPS", video.fps);
            println!("  Duration: {}", format_duration(video.duration));
            println!("  Audio: {}", if video.has_audio { "yes" } else { "no" });
        }
        MediaKind::Image(format) => {
            let source = ImageSource::open(media.path(), format, size)?;
            let (width, height) = source.source_dimensions();
            println!("  Kind: image ({:?})", format);
            println!("  Dimensions: {}x{}", width, height);
            println!("  Frames: {}", source.len());
            if source.is_animated() {
                println!("  Frame Rate: {:.2} FPS", source.frame_rate());
            }
        }
    }

    let (width, height) = size.pixel_dimensions();
    println!(
        "  Render Grid: {}x{} characters ({}x{} pixels)",
        size.columns, size.rows, width, height
    );
    Ok(())
}
