//! petwatchd - pet dwell tracking daemon
//!
//! This daemon:
//! 1. Pulls frames from the camera's MJPEG stream (or a recording with --replay)
//! 2. Detects motion against a running background model
//! 3. Classifies the motion centroid into a named zone
//! 4. Notifies when the pet stays in a zone past the threshold
//! 5. Sends daily statistics and a position heatmap at each day rollover

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use petwatch::{
    spawn_reader, Delivery, Detector, Dispatcher, DwellTracker, FileConfig, IngestError, LogSink,
    MjpegFileSource, MjpegHttpSource, MotionDetector, MqttSink, NotificationSink, PetwatchConfig,
    Pipeline, TelegramSink,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Track where a pet spends its time from a camera stream"
)]
struct Args {
    /// TOML configuration file.
    #[arg(long, env = "PETWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Replay a local MJPEG recording instead of connecting to the camera.
    #[arg(long)]
    replay: Option<PathBuf>,

    /// Frames per second for --replay. 0 replays as fast as possible.
    #[arg(long, default_value_t = 0)]
    replay_fps: u32,

    /// Log notifications instead of sending them.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let cfg = PetwatchConfig::load_from(args.config.as_deref())?;
    let zones = cfg.zone_table()?;
    log::info!(
        "{} zones configured; notify={} after {}s",
        zones.zones().len(),
        cfg.dwell.notify,
        cfg.dwell.notify_threshold.as_secs()
    );

    let detector = MotionDetector::new(cfg.motion.clone())?;
    log::info!(
        "{} detector: weight={} threshold={} min_area={}",
        detector.name(),
        detector.config().weight,
        detector.config().threshold,
        detector.config().area_threshold
    );
    let dispatcher = Dispatcher::spawn(Delivery {
        chat_id: cfg.recipient().to_string(),
        sinks: build_sinks(&cfg, args.dry_run)?,
        renderer: Box::new(cfg.heatmap.clone()),
    });
    let mut pipeline = Pipeline::new(
        Box::new(detector),
        zones,
        DwellTracker::new(cfg.dwell.clone()),
    )
    .with_dispatcher(dispatcher);

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    let (frames, reader) = match args.replay.as_ref() {
        Some(path) => {
            let source = MjpegFileSource::open(FileConfig {
                path: path.clone(),
                target_fps: args.replay_fps,
                max_boundary_attempts: cfg.camera.max_boundary_attempts,
            })?;
            log::info!("replaying {}", path.display());
            spawn_reader(source, cfg.queue_capacity, stop.clone())
        }
        None => {
            let source = MjpegHttpSource::new(cfg.camera.clone())?;
            log::info!("watching camera {}", cfg.camera.display_url());
            spawn_reader(source, cfg.queue_capacity, stop.clone())
        }
    };

    let result = pipeline.run(&frames, &stop);
    stop.store(true, Ordering::SeqCst);
    drop(frames);
    if reader.join().is_err() {
        log::error!("frame reader panicked");
    }
    let summary = pipeline.summary();
    pipeline.shutdown();
    log::info!(
        "processed {} frames ({} with motion), dropped {}",
        summary.frames_processed,
        summary.frames_with_motion,
        summary.frames_dropped
    );

    match result {
        Err(e) if args.replay.is_some() && is_end_of_stream(&e) => {
            log::info!("replay finished");
            Ok(())
        }
        Err(e) => Err(e),
        Ok(_) => {
            log::info!("petwatchd stopped");
            Ok(())
        }
    }
}

fn build_sinks(cfg: &PetwatchConfig, dry_run: bool) -> Result<Vec<Box<dyn NotificationSink>>> {
    let mut sinks: Vec<Box<dyn NotificationSink>> = Vec::new();
    if dry_run {
        log::info!("dry run: notifications are only logged");
        sinks.push(Box::new(LogSink));
        return Ok(sinks);
    }
    if let Some(telegram) = cfg.telegram.clone() {
        sinks.push(Box::new(TelegramSink::new(telegram)?));
        log::info!("telegram notifications enabled");
    }
    if let Some(mqtt) = cfg.mqtt.clone() {
        sinks.push(Box::new(
            MqttSink::connect(mqtt).context("connect mqtt notification sink")?,
        ));
    }
    if sinks.is_empty() {
        log::warn!("no notification sink configured; notifications are only logged");
        sinks.push(Box::new(LogSink));
    }
    Ok(sinks)
}

fn is_end_of_stream(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<IngestError>(), Some(IngestError::Stream(_)))
}
