//! MQTT sink.
//!
//! Publishes notification text as JSON to `<prefix>/notification` and photo
//! bytes, unchanged, to `<prefix>/snapshot` so an MQTT camera entity can show
//! the latest frame.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Context, Result};
use rumqttc::{Client, Connection, Event, MqttOptions, QoS};
use serde::Serialize;

use super::NotificationSink;

const MAX_PACKET_BYTES: usize = 4 * 1024 * 1024;

#[derive(Clone, Debug, PartialEq)]
pub struct MqttConfig {
    /// `host:port`.
    pub broker_addr: String,
    pub client_id: String,
    pub topic_prefix: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker_addr: "127.0.0.1:1883".to_string(),
            client_id: "petwatch".to_string(),
            topic_prefix: "petwatch".to_string(),
            username: None,
            password: None,
        }
    }
}

impl MqttConfig {
    fn endpoint(&self) -> Result<(String, u16)> {
        let (host, port) = self
            .broker_addr
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("mqtt broker address '{}' lacks a port", self.broker_addr))?;
        if host.is_empty() {
            return Err(anyhow!("mqtt broker address '{}' lacks a host", self.broker_addr));
        }
        let port = port
            .parse::<u16>()
            .with_context(|| format!("invalid mqtt port in '{}'", self.broker_addr))?;
        Ok((host.to_string(), port))
    }

    fn topic(&self, leaf: &str) -> String {
        format!("{}/{}", self.topic_prefix.trim_end_matches('/'), leaf)
    }
}

#[derive(Serialize)]
struct NotificationPayload<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo_bytes: Option<usize>,
    timestamp: u64,
}

pub struct MqttSink {
    config: MqttConfig,
    client: Client,
}

impl MqttSink {
    pub fn connect(config: MqttConfig) -> Result<Self> {
        let (host, port) = config.endpoint()?;
        let mut options = MqttOptions::new(config.client_id.clone(), host, port);
        options.set_keep_alive(Duration::from_secs(30));
        options.set_max_packet_size(MAX_PACKET_BYTES, MAX_PACKET_BYTES);
        if let Some(username) = config.username.as_ref() {
            options.set_credentials(
                username.clone(),
                config.password.clone().unwrap_or_default(),
            );
        }
        let (client, connection) = Client::new(options, 10);
        // The event loop thread ends on its own once the client disconnects
        // or the broker drops us.
        spawn_connection(connection);
        log::info!("mqtt sink publishing to {}", config.broker_addr);
        Ok(Self { config, client })
    }

    fn publish_text(&mut self, chat_id: &str, text: &str, photo_bytes: Option<usize>) -> Result<()> {
        let payload = NotificationPayload {
            chat_id,
            text,
            photo_bytes,
            timestamp: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0),
        };
        let body = serde_json::to_vec(&payload)?;
        self.client
            .publish(self.config.topic("notification"), QoS::AtLeastOnce, false, body)
            .context("publish mqtt notification")
    }
}

fn spawn_connection(mut connection: Connection) {
    std::thread::spawn(move || {
        for event in connection.iter() {
            match event {
                Ok(Event::Incoming(_)) | Ok(Event::Outgoing(_)) => {}
                Err(e) => {
                    log::warn!("MQTT connection error: {}", e);
                    break;
                }
            }
        }
    });
}

impl NotificationSink for MqttSink {
    fn name(&self) -> &'static str {
        "mqtt"
    }

    fn send_text(&mut self, chat_id: &str, text: &str) -> Result<()> {
        self.publish_text(chat_id, text, None)
    }

    fn send_photo(&mut self, chat_id: &str, image: &[u8], caption: &str) -> Result<()> {
        self.client
            .publish(
                self.config.topic("snapshot"),
                QoS::AtLeastOnce,
                true,
                image.to_vec(),
            )
            .context("publish mqtt snapshot")?;
        self.publish_text(chat_id, caption, Some(image.len()))
    }
}

impl Drop for MqttSink {
    fn drop(&mut self) {
        let _ = self.client.disconnect();
    }
}
