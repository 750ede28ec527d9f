//! Pet Watch
//!
//! Watches a fixed camera for a pet's movement, works out which named zone of
//! the room the pet is in, keeps per-zone dwell statistics, and sends
//! notifications for long stays plus a daily report with a position heatmap.
//!
//! # Module Structure
//!
//! - `frame`: Captured frames, image coordinates and detection results
//! - `ingest`: Frame sources (HTTP MJPEG cameras, local recordings)
//! - `detect`: Background-subtraction motion detection
//! - `zones`: Named rectangles and point classification
//! - `dwell`: Dwell accounting, notification decisions and daily rollover
//! - `report`: Heatmap rendering and daily statistics text
//! - `notify`: Notification sinks (Telegram, MQTT, log) and the delivery worker
//! - `pipeline`: The ordered frame processing loop
//! - `config`: Daemon configuration (TOML file plus environment overrides)

pub mod config;
pub mod detect;
pub mod dwell;
pub mod frame;
pub mod ingest;
pub mod notify;
pub mod pipeline;
pub mod report;
pub mod zones;

pub use config::PetwatchConfig;
pub use detect::{Detector, MotionConfig, MotionDetector};
pub use dwell::{DailyReport, DwellConfig, DwellEvent, DwellState, DwellTracker, Observation};
pub use frame::{DetectionResult, Frame, Point};
pub use ingest::{
    spawn_reader, CameraConfig, FileConfig, FrameSource, IngestError, IngestResult,
    MjpegFileSource, MjpegHttpSource,
};
pub use notify::{
    Delivery, Dispatcher, LogSink, MqttConfig, MqttSink, Notification, NotificationSink,
    TelegramConfig, TelegramSink,
};
pub use pipeline::{Pipeline, RunSummary};
pub use report::{format_daily_stats, HeatmapRenderer, HistogramHeatmap};
pub use zones::{default_zones, Location, Rect, Zone, ZoneTable};
