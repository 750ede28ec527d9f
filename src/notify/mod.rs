//! Notification delivery.
//!
//! Sinks are best-effort: a failed delivery is logged and dropped, never
//! retried. The `Dispatcher` owns every sink plus the heatmap renderer on a
//! worker thread, so a slow network call cannot stall frame processing.

use std::sync::mpsc::{channel, Sender};
use std::thread::JoinHandle;

use anyhow::Result;

use crate::dwell::{DailyReport, DwellEvent};
use crate::report::{format_daily_stats, HeatmapRenderer};

pub mod mqtt;
pub mod telegram;

pub use mqtt::{MqttConfig, MqttSink};
pub use telegram::{TelegramConfig, TelegramSink};

pub trait NotificationSink: Send {
    fn name(&self) -> &'static str;

    fn send_text(&mut self, chat_id: &str, text: &str) -> Result<()>;

    fn send_photo(&mut self, chat_id: &str, image: &[u8], caption: &str) -> Result<()>;
}

/// Sink that only writes to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl NotificationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn send_text(&mut self, chat_id: &str, text: &str) -> Result<()> {
        log::info!("[notify {}] {}", chat_id, text);
        Ok(())
    }

    fn send_photo(&mut self, chat_id: &str, image: &[u8], caption: &str) -> Result<()> {
        log::info!(
            "[notify {}] photo ({} bytes): {}",
            chat_id,
            image.len(),
            caption
        );
        Ok(())
    }
}

/// A unit of work for the dispatcher.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// Long stay in a zone, with the frame that last showed motion.
    Dwell {
        zone: String,
        dwell_secs: f64,
        photo: Vec<u8>,
    },
    Daily(DailyReport),
}

impl Notification {
    /// Pair a tracker event with the photo to attach, if it needs one.
    pub fn from_event(event: DwellEvent, photo: &[u8]) -> Self {
        match event {
            DwellEvent::Notify { zone, dwell_secs } => Notification::Dwell {
                zone,
                dwell_secs,
                photo: photo.to_vec(),
            },
            DwellEvent::DailyReport(report) => Notification::Daily(report),
        }
    }
}

pub fn dwell_caption(zone: &str, dwell_secs: f64) -> String {
    format!("Spent {:.0} seconds in {}", dwell_secs, zone)
}

/// Sinks, renderer and recipient, driven by a single thread.
pub struct Delivery {
    pub chat_id: String,
    pub sinks: Vec<Box<dyn NotificationSink>>,
    pub renderer: Box<dyn HeatmapRenderer>,
}

impl Delivery {
    /// Deliver to every sink. Failures are logged per sink and swallowed.
    pub fn deliver(&mut self, notification: &Notification) {
        match notification {
            Notification::Dwell {
                zone,
                dwell_secs,
                photo,
            } => {
                let caption = dwell_caption(zone, *dwell_secs);
                log::info!("sending dwell notification: {}", caption);
                for sink in self.sinks.iter_mut() {
                    if let Err(e) = sink.send_photo(&self.chat_id, photo, &caption) {
                        log::warn!("{} photo delivery failed: {:#}", sink.name(), e);
                    }
                }
            }
            Notification::Daily(report) => {
                let stats = format_daily_stats(report);
                log::info!("sending daily report for {}", report.day);
                for sink in self.sinks.iter_mut() {
                    if let Err(e) = sink.send_text(&self.chat_id, &stats) {
                        log::warn!("{} stats delivery failed: {:#}", sink.name(), e);
                    }
                }
                let heatmap = match self.renderer.render(&report.xs(), &report.ys()) {
                    Ok(png) => png,
                    Err(e) => {
                        log::warn!("heatmap render failed: {:#}", e);
                        return;
                    }
                };
                let caption = format!("Heatmap for {}", report.day);
                for sink in self.sinks.iter_mut() {
                    if let Err(e) = sink.send_photo(&self.chat_id, &heatmap, &caption) {
                        log::warn!("{} heatmap delivery failed: {:#}", sink.name(), e);
                    }
                }
            }
        }
    }
}

/// Background delivery worker.
///
/// `dispatch` never blocks on the network. Dropping the dispatcher (or
/// calling `shutdown`) delivers whatever is queued and joins the worker.
pub struct Dispatcher {
    tx: Option<Sender<Notification>>,
    handle: Option<JoinHandle<()>>,
}

impl Dispatcher {
    pub fn spawn(mut delivery: Delivery) -> Self {
        let (tx, rx) = channel::<Notification>();
        let handle = std::thread::spawn(move || {
            for notification in rx {
                delivery.deliver(&notification);
            }
            log::debug!("notification worker exiting");
        });
        Self {
            tx: Some(tx),
            handle: Some(handle),
        }
    }

    pub fn dispatch(&self, notification: Notification) {
        let Some(tx) = self.tx.as_ref() else {
            return;
        };
        if tx.send(notification).is_err() {
            log::warn!("notification worker is gone; dropping notification");
        }
    }

    pub fn shutdown(mut self) {
        self.finish();
    }

    fn finish(&mut self) {
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("notification worker panicked");
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.finish();
    }
}
