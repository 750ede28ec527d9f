//! Telegram Bot API sink.
//!
//! Text goes through `sendMessage` as JSON; photos go through `sendPhoto` as
//! a multipart upload.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};

use super::NotificationSink;

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

#[derive(Clone, Debug, PartialEq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub api_base: String,
}

impl TelegramConfig {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base.trim_end_matches('/'),
            self.bot_token,
            method
        )
    }
}

#[derive(Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct ApiReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

pub struct TelegramSink {
    config: TelegramConfig,
    agent: ureq::Agent,
}

impl TelegramSink {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        if config.bot_token.trim().is_empty() {
            return Err(anyhow!("telegram bot token must not be empty"));
        }
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(Duration::from_secs(10))
            .build();
        Ok(Self { config, agent })
    }

    fn check_reply(method: &str, response: ureq::Response) -> Result<()> {
        let body = response
            .into_string()
            .with_context(|| format!("read telegram {} reply", method))?;
        let reply: ApiReply = serde_json::from_str(&body)
            .with_context(|| format!("parse telegram {} reply", method))?;
        if !reply.ok {
            return Err(anyhow!(
                "telegram {} rejected: {}",
                method,
                reply.description.unwrap_or_default()
            ));
        }
        Ok(())
    }
}

impl NotificationSink for TelegramSink {
    fn name(&self) -> &'static str {
        "telegram"
    }

    fn send_text(&mut self, chat_id: &str, text: &str) -> Result<()> {
        let body = serde_json::to_string(&SendMessage { chat_id, text })?;
        let response = self
            .agent
            .post(&self.config.method_url("sendMessage"))
            .set("Content-Type", "application/json")
            .send_string(&body)
            .context("telegram sendMessage")?;
        Self::check_reply("sendMessage", response)
    }

    fn send_photo(&mut self, chat_id: &str, image: &[u8], caption: &str) -> Result<()> {
        let form = Multipart::new()
            .text("chat_id", chat_id)
            .text("caption", caption)
            .file("photo", photo_filename(image), image_mime(image), image);
        let response = self
            .agent
            .post(&self.config.method_url("sendPhoto"))
            .set("Content-Type", &form.content_type())
            .send_bytes(&form.finish())
            .context("telegram sendPhoto")?;
        Self::check_reply("sendPhoto", response)
    }
}

/// `multipart/form-data` body builder.
pub struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    pub fn new() -> Self {
        Self::with_boundary(format!(
            "petwatch-{}",
            hex::encode(rand::random::<[u8; 12]>())
        ))
    }

    pub fn with_boundary(boundary: String) -> Self {
        Self {
            boundary,
            body: Vec::new(),
        }
    }

    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, mime: &str, bytes: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, mime
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        self.body
    }
}

impl Default for Multipart {
    fn default() -> Self {
        Self::new()
    }
}

fn image_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "image/png"
    } else {
        "image/jpeg"
    }
}

fn photo_filename(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(b"\x89PNG") {
        "heatmap.png"
    } else {
        "frame.jpg"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_url_includes_token() {
        let mut config = TelegramConfig::new("123:abc");
        config.api_base = "http://localhost:8081/".into();
        assert_eq!(
            config.method_url("sendPhoto"),
            "http://localhost:8081/bot123:abc/sendPhoto"
        );
    }

    #[test]
    fn multipart_layout() {
        let body = Multipart::with_boundary("XYZ".into())
            .text("chat_id", "42")
            .file("photo", "frame.jpg", "image/jpeg", &[0xFF, 0xD8, 0xFF, 0xD9])
            .finish();
        let mut expected = b"--XYZ\r\nContent-Disposition: form-data; name=\"chat_id\"\r\n\r\n42\r\n\
--XYZ\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"frame.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
            .to_vec();
        expected.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xD9]);
        expected.extend_from_slice(b"\r\n--XYZ--\r\n");
        assert_eq!(body, expected);
    }

    #[test]
    fn random_boundaries_differ() {
        let a = Multipart::new().content_type();
        let b = Multipart::new().content_type();
        assert!(a.starts_with("multipart/form-data; boundary=petwatch-"));
        assert_ne!(a, b);
    }

    #[test]
    fn mime_sniffing() {
        assert_eq!(image_mime(b"\x89PNG\r\n"), "image/png");
        assert_eq!(image_mime(&[0xFF, 0xD8]), "image/jpeg");
        assert_eq!(photo_filename(&[0xFF, 0xD8]), "frame.jpg");
    }

    #[test]
    fn empty_token_rejected() {
        assert!(TelegramSink::new(TelegramConfig::new(" ")).is_err());
    }
}
