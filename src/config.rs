use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::detect::MotionConfig;
use crate::dwell::DwellConfig;
use crate::ingest::mjpeg::{DEFAULT_CHUNK_BYTES, DEFAULT_MAX_BOUNDARY_ATTEMPTS};
use crate::ingest::http::DEFAULT_READ_TIMEOUT;
use crate::ingest::CameraConfig;
use crate::notify::{MqttConfig, TelegramConfig};
use crate::report::HistogramHeatmap;
use crate::zones::{default_zones, Rect, Zone, ZoneTable, DEFAULT_UNKNOWN_LABEL};

const DEFAULT_CAMERA_URL: &str = "http://127.0.0.1/video/mjpg.cgi";
const DEFAULT_CHAT_ID: &str = "petwatch";
const DEFAULT_QUEUE_CAPACITY: usize = 4;

#[derive(Debug, Deserialize, Default)]
struct PetwatchConfigFile {
    unknown_label: Option<String>,
    camera: Option<CameraConfigFile>,
    motion: Option<MotionConfigFile>,
    dwell: Option<DwellConfigFile>,
    telegram: Option<TelegramConfigFile>,
    mqtt: Option<MqttConfigFile>,
    report: Option<ReportConfigFile>,
    pipeline: Option<PipelineConfigFile>,
    zones: Option<Vec<ZoneConfigFile>>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    user: Option<String>,
    password: Option<String>,
    chunk_bytes: Option<usize>,
    max_boundary_attempts: Option<u32>,
    read_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct MotionConfigFile {
    weight: Option<f32>,
    threshold: Option<u32>,
    area_threshold: Option<f64>,
    blur_sigma: Option<f32>,
    dilate_iterations: Option<u8>,
    reset_interval: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct DwellConfigFile {
    notify: Option<bool>,
    notify_threshold_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct TelegramConfigFile {
    bot_token: Option<String>,
    chat_id: Option<String>,
    api_base: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct MqttConfigFile {
    broker_addr: Option<String>,
    client_id: Option<String>,
    topic_prefix: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct ReportConfigFile {
    heatmap_width: Option<u32>,
    heatmap_height: Option<u32>,
    bins: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    queue_capacity: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ZoneConfigFile {
    name: String,
    x_min: f64,
    x_max: f64,
    y_min: f64,
    y_max: f64,
}

/// Fully resolved daemon configuration.
#[derive(Debug, Clone)]
pub struct PetwatchConfig {
    pub camera: CameraConfig,
    pub motion: MotionConfig,
    pub dwell: DwellConfig,
    pub zones: Vec<Zone>,
    pub unknown_label: String,
    /// Telegram delivery; `None` when no bot token is configured.
    pub telegram: Option<TelegramConfig>,
    /// Telegram chat; also tags MQTT and log notifications.
    pub chat_id: Option<String>,
    pub mqtt: Option<MqttConfig>,
    pub heatmap: HistogramHeatmap,
    pub queue_capacity: usize,
    /// Raw `motion.threshold` as configured, range-checked in `validate`.
    threshold: u32,
}

impl PetwatchConfig {
    /// Load using the file named by `PETWATCH_CONFIG`, if any.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load using `path`, falling back to `PETWATCH_CONFIG`.
    pub fn load_from(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => std::env::var("PETWATCH_CONFIG")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
        };
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Recipient passed to every sink.
    pub fn recipient(&self) -> &str {
        self.chat_id.as_deref().unwrap_or(DEFAULT_CHAT_ID)
    }

    /// Zone table built from the validated zone list.
    pub fn zone_table(&self) -> Result<ZoneTable> {
        ZoneTable::new(self.zones.clone(), self.unknown_label.clone())
    }

    fn from_file(file: PetwatchConfigFile) -> Self {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraConfig {
            url: camera_file
                .url
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            user: camera_file.user,
            password: camera_file.password,
            chunk_bytes: camera_file.chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES),
            max_boundary_attempts: camera_file
                .max_boundary_attempts
                .unwrap_or(DEFAULT_MAX_BOUNDARY_ATTEMPTS),
            read_timeout: camera_file
                .read_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_READ_TIMEOUT),
        };

        let motion_file = file.motion.unwrap_or_default();
        let motion_defaults = MotionConfig::default();
        let threshold = motion_file
            .threshold
            .unwrap_or(motion_defaults.threshold as u32);
        let motion = MotionConfig {
            weight: motion_file.weight.unwrap_or(motion_defaults.weight),
            threshold: threshold.min(u8::MAX as u32) as u8,
            area_threshold: motion_file
                .area_threshold
                .unwrap_or(motion_defaults.area_threshold),
            blur_sigma: motion_file.blur_sigma.unwrap_or(motion_defaults.blur_sigma),
            dilate_iterations: motion_file
                .dilate_iterations
                .unwrap_or(motion_defaults.dilate_iterations),
            reset_interval: motion_file
                .reset_interval
                .unwrap_or(motion_defaults.reset_interval),
        };

        let dwell_file = file.dwell.unwrap_or_default();
        let dwell_defaults = DwellConfig::default();
        let dwell = DwellConfig {
            notify: dwell_file.notify.unwrap_or(dwell_defaults.notify),
            notify_threshold: dwell_file
                .notify_threshold_secs
                .map(Duration::from_secs)
                .unwrap_or(dwell_defaults.notify_threshold),
        };

        let telegram_file = file.telegram.unwrap_or_default();
        let chat_id = telegram_file.chat_id;
        let telegram = telegram_file.bot_token.map(|token| {
            let mut telegram = TelegramConfig::new(token);
            if let Some(api_base) = telegram_file.api_base {
                telegram.api_base = api_base;
            }
            telegram
        });

        let mqtt = file.mqtt.map(|mqtt_file| {
            let defaults = MqttConfig::default();
            MqttConfig {
                broker_addr: mqtt_file.broker_addr.unwrap_or(defaults.broker_addr),
                client_id: mqtt_file.client_id.unwrap_or(defaults.client_id),
                topic_prefix: mqtt_file.topic_prefix.unwrap_or(defaults.topic_prefix),
                username: mqtt_file.username,
                password: mqtt_file.password,
            }
        });

        let report_file = file.report.unwrap_or_default();
        let heatmap_defaults = HistogramHeatmap::default();
        let heatmap = HistogramHeatmap {
            bins: report_file.bins.unwrap_or(heatmap_defaults.bins),
            width: report_file
                .heatmap_width
                .unwrap_or(heatmap_defaults.width),
            height: report_file
                .heatmap_height
                .unwrap_or(heatmap_defaults.height),
        };

        let zones = file
            .zones
            .map(|zones| {
                zones
                    .into_iter()
                    .map(|z| Zone::new(z.name, Rect::new(z.x_min, z.x_max, z.y_min, z.y_max)))
                    .collect()
            })
            .unwrap_or_else(default_zones);

        Self {
            camera,
            motion,
            dwell,
            zones,
            unknown_label: file
                .unknown_label
                .unwrap_or_else(|| DEFAULT_UNKNOWN_LABEL.to_string()),
            telegram,
            chat_id,
            mqtt,
            heatmap,
            queue_capacity: file
                .pipeline
                .and_then(|pipeline| pipeline.queue_capacity)
                .unwrap_or(DEFAULT_QUEUE_CAPACITY),
            threshold,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PETWATCH_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(user) = std::env::var("PETWATCH_CAMERA_USER") {
            if !user.trim().is_empty() {
                self.camera.user = Some(user);
            }
        }
        if let Ok(password) = std::env::var("PETWATCH_CAMERA_PASSWORD") {
            if !password.is_empty() {
                self.camera.password = Some(password);
            }
        }
        if let Ok(token) = std::env::var("PETWATCH_BOT_TOKEN") {
            if !token.trim().is_empty() {
                match self.telegram.as_mut() {
                    Some(telegram) => telegram.bot_token = token,
                    None => self.telegram = Some(TelegramConfig::new(token)),
                }
            }
        }
        if let Ok(chat_id) = std::env::var("PETWATCH_CHAT_ID") {
            if !chat_id.trim().is_empty() {
                self.chat_id = Some(chat_id);
            }
        }
        if let Ok(notify) = std::env::var("PETWATCH_NOTIFY") {
            self.dwell.notify = parse_bool(&notify)
                .ok_or_else(|| anyhow!("PETWATCH_NOTIFY must be true or false"))?;
        }
        if let Ok(threshold) = std::env::var("PETWATCH_NOTIFY_THRESHOLD_SECS") {
            let seconds: u64 = threshold.trim().parse().map_err(|_| {
                anyhow!("PETWATCH_NOTIFY_THRESHOLD_SECS must be an integer number of seconds")
            })?;
            self.dwell.notify_threshold = Duration::from_secs(seconds);
        }
        if let Ok(broker) = std::env::var("PETWATCH_MQTT_BROKER") {
            if !broker.trim().is_empty() {
                self.mqtt.get_or_insert_with(MqttConfig::default).broker_addr = broker;
            }
        }
        Ok(())
    }

    fn validate(&mut self) -> Result<()> {
        if self.threshold > u8::MAX as u32 {
            return Err(anyhow!(
                "motion threshold must be within 0..=255, got {}",
                self.threshold
            ));
        }
        self.motion.validate()?;
        self.zone_table()?;

        if self.camera.url.trim().is_empty() {
            return Err(anyhow!("camera url must not be empty"));
        }
        if self.camera.chunk_bytes == 0 {
            return Err(anyhow!("camera chunk_bytes must be greater than zero"));
        }
        if self.camera.read_timeout.is_zero() {
            return Err(anyhow!("camera read_timeout_secs must be greater than zero"));
        }
        if self.heatmap.bins == 0 || self.heatmap.width == 0 || self.heatmap.height == 0 {
            return Err(anyhow!("heatmap bins and size must be greater than zero"));
        }
        if self.queue_capacity == 0 {
            return Err(anyhow!("pipeline queue_capacity must be greater than zero"));
        }
        if self.telegram.is_some() && self.chat_id.is_none() {
            return Err(anyhow!("telegram delivery needs a chat_id"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PetwatchConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
