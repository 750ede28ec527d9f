//! HTTP MJPEG camera source.
//!
//! This module provides `MjpegHttpSource` for IP cameras that serve an
//! MJPEG stream over HTTP with basic authentication.
//!
//! The source is responsible for:
//! - Opening the stream once (the sequence is not restartable)
//! - Splitting the body into JPEG frames by marker search
//! - Decoding each frame and stamping it with the local capture time
//!
//! Reconnecting after a fatal error is left to the process supervisor.

use std::time::{Duration, Instant};

use url::Url;

use super::mjpeg::{MjpegStream, DEFAULT_CHUNK_BYTES, DEFAULT_MAX_BOUNDARY_ATTEMPTS};
use super::{decode_frame, FrameSource, IngestError, IngestResult};
use crate::frame::Frame;

pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Configuration for an HTTP MJPEG camera.
#[derive(Clone, Debug, PartialEq)]
pub struct CameraConfig {
    /// Stream URL, e.g. `http://192.168.1.20/video/mjpg.cgi`.
    pub url: String,
    pub user: Option<String>,
    pub password: Option<String>,
    /// Bytes requested per read.
    pub chunk_bytes: usize,
    /// Consecutive reads without a complete frame before giving up.
    pub max_boundary_attempts: u32,
    /// Longest a single socket read may block before the stream is failed.
    pub read_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1/video/mjpg.cgi".to_string(),
            user: None,
            password: None,
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            max_boundary_attempts: DEFAULT_MAX_BOUNDARY_ATTEMPTS,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl CameraConfig {
    /// Stream URL with credentials embedded as userinfo (sent as basic auth).
    pub fn authenticated_url(&self) -> IngestResult<Url> {
        let mut url = Url::parse(&self.url)
            .map_err(|e| IngestError::Stream(format!("parse camera url: {}", e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(IngestError::Stream(format!(
                "unsupported camera scheme '{}'; expected http(s)",
                url.scheme()
            )));
        }
        if let Some(user) = self.user.as_deref().filter(|u| !u.is_empty()) {
            url.set_username(user)
                .map_err(|_| IngestError::Stream("camera url cannot carry credentials".into()))?;
            url.set_password(self.password.as_deref())
                .map_err(|_| IngestError::Stream("camera url cannot carry credentials".into()))?;
        }
        Ok(url)
    }

    /// URL safe to log (credentials stripped).
    pub fn display_url(&self) -> String {
        match Url::parse(&self.url) {
            Ok(mut url) => {
                let _ = url.set_username("");
                let _ = url.set_password(None);
                url.to_string()
            }
            Err(_) => self.url.clone(),
        }
    }
}

pub struct MjpegHttpSource {
    config: CameraConfig,
    stream: Option<MjpegStream>,
    connected_at: Option<Instant>,
    frame_count: u64,
}

impl MjpegHttpSource {
    pub fn new(config: CameraConfig) -> IngestResult<Self> {
        config.authenticated_url()?;
        Ok(Self {
            config,
            stream: None,
            connected_at: None,
            frame_count: 0,
        })
    }

    /// Open the MJPEG stream.
    pub fn connect(&mut self) -> IngestResult<()> {
        if self.stream.is_some() {
            return Err(IngestError::Stream(
                "camera stream already opened; sources are not restartable".into(),
            ));
        }
        let url = self.config.authenticated_url()?;
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(self.config.read_timeout)
            .timeout_read(self.config.read_timeout)
            .build();
        let response = agent.get(url.as_str()).call().map_err(|e| {
            IngestError::Stream(format!(
                "connect to camera {}: {}",
                self.config.display_url(),
                e
            ))
        })?;
        let content_type = response.header("Content-Type").unwrap_or("").to_string();
        if !content_type.to_lowercase().contains("multipart") {
            log::warn!(
                "camera content type is '{}', expected multipart MJPEG; scanning anyway",
                content_type
            );
        }
        self.stream = Some(MjpegStream::new(
            response.into_reader(),
            self.config.chunk_bytes,
            self.config.max_boundary_attempts,
        ));
        self.connected_at = Some(Instant::now());
        log::info!("connected to camera {}", self.config.display_url());
        Ok(())
    }

    pub fn uptime_secs(&self) -> Option<u64> {
        self.connected_at.map(|t| t.elapsed().as_secs())
    }
}

impl FrameSource for MjpegHttpSource {
    fn describe(&self) -> String {
        self.config.display_url()
    }

    fn next_frame(&mut self) -> IngestResult<Frame> {
        if self.stream.is_none() {
            self.connect()?;
        }
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| IngestError::Stream("camera stream not connected".into()))?;
        let jpeg = match stream.read_next_jpeg() {
            Ok(jpeg) => jpeg,
            Err(e) => {
                if let Some(uptime) = self.uptime_secs() {
                    log::warn!(
                        "camera stream failed after {}s and {} frames",
                        uptime,
                        self.frame_count
                    );
                }
                return Err(e);
            }
        };
        let frame = decode_frame(jpeg)?;
        self.frame_count += 1;
        Ok(frame)
    }

    fn frames_captured(&self) -> u64 {
        self.frame_count
    }
}
