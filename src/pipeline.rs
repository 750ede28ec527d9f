//! Frame processing loop.
//!
//! Drives each frame through detection, zone classification and dwell
//! accounting, in capture order, and hands the resulting notifications to
//! the dispatcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::detect::Detector;
use crate::dwell::{DwellTracker, Observation};
use crate::frame::Frame;
use crate::ingest::IngestResult;
use crate::notify::{Dispatcher, Notification};
use crate::zones::ZoneTable;

const STOP_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Counters reported when the loop ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames_processed: u64,
    pub frames_dropped: u64,
    pub frames_with_motion: u64,
}

pub struct Pipeline {
    detector: Box<dyn Detector>,
    zones: ZoneTable,
    tracker: DwellTracker,
    dispatcher: Option<Dispatcher>,
    summary: RunSummary,
}

impl Pipeline {
    pub fn new(detector: Box<dyn Detector>, zones: ZoneTable, tracker: DwellTracker) -> Self {
        Self {
            detector,
            zones,
            tracker,
            dispatcher: None,
            summary: RunSummary::default(),
        }
    }

    /// Deliver notifications through `dispatcher` as they are produced.
    pub fn with_dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn tracker(&self) -> &DwellTracker {
        &self.tracker
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    /// Process one frame and return the notifications it triggered.
    pub fn process(&mut self, frame: Frame) -> Vec<Notification> {
        let detection = self.detector.process(Arc::new(frame));
        self.summary.frames_processed += 1;
        if detection.motion_detected() {
            self.summary.frames_with_motion += 1;
        }

        let zone = detection.centroid.map(|point| {
            let location = self.zones.classify(point);
            self.zones.label(&location).to_string()
        });
        match (&zone, detection.centroid) {
            (Some(zone), Some(point)) => log::debug!(
                "{} at ({:.1}, {:.1}) {}",
                zone,
                point.x,
                point.y,
                detection.timestamp.format("%H:%M:%S%.3f")
            ),
            _ => log::trace!(
                "no motion {}",
                detection.timestamp.format("%H:%M:%S%.3f")
            ),
        }

        let events = self.tracker.observe(Observation {
            zone,
            at: detection.timestamp,
            point: detection.centroid,
        });

        let notifications: Vec<Notification> = events
            .into_iter()
            .map(|event| Notification::from_event(event, detection.frame.raw()))
            .collect();
        if let Some(dispatcher) = self.dispatcher.as_ref() {
            for notification in &notifications {
                dispatcher.dispatch(notification.clone());
            }
        }
        notifications
    }

    /// Consume frames until `stop` is set, the reader hangs up, or a fatal
    /// acquisition error arrives (returned as `Err`).
    pub fn run(
        &mut self,
        frames: &Receiver<IngestResult<Frame>>,
        stop: &AtomicBool,
    ) -> Result<RunSummary> {
        while !stop.load(Ordering::SeqCst) {
            let item = match frames.recv_timeout(STOP_POLL_INTERVAL) {
                Ok(item) => item,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => break,
            };
            match item {
                Ok(frame) => {
                    self.process(frame);
                }
                Err(e) if !e.is_fatal() => {
                    self.summary.frames_dropped += 1;
                    log::warn!("dropping frame: {}", e);
                }
                Err(e) => {
                    return Err(e).context("frame acquisition failed");
                }
            }
        }
        Ok(self.summary)
    }

    /// Flush pending notifications and stop the delivery worker.
    pub fn shutdown(mut self) {
        if let Some(dispatcher) = self.dispatcher.take() {
            dispatcher.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{MotionConfig, MotionDetector};
    use crate::dwell::DwellConfig;
    use crate::ingest::IngestError;
    use crate::zones::{Rect, Zone};
    use chrono::{Local, TimeZone};
    use image::RgbImage;
    use std::sync::mpsc::sync_channel;

    fn pipeline() -> Pipeline {
        let detector = MotionDetector::new(MotionConfig::default()).expect("detector");
        let zones = ZoneTable::new(
            vec![Zone::new("Bowl", Rect::new(0.0, 10.0, 0.0, 10.0))],
            "Unknown",
        )
        .expect("zones");
        Pipeline::new(
            Box::new(detector),
            zones,
            DwellTracker::new(DwellConfig::default()),
        )
    }

    fn blank(tag: u8) -> Frame {
        let at = Local
            .with_ymd_and_hms(2024, 5, 1, 12, 0, tag as u32)
            .single()
            .expect("timestamp");
        Frame::new(vec![tag], RgbImage::new(8, 8), at)
    }

    #[test]
    fn decode_errors_are_skipped_and_fatal_errors_end_the_run() {
        let (tx, rx) = sync_channel(8);
        tx.send(Ok(blank(0))).unwrap();
        tx.send(Err(IngestError::Decode("corrupt".into()))).unwrap();
        tx.send(Ok(blank(1))).unwrap();
        tx.send(Err(IngestError::Boundary { attempts: 11 })).unwrap();
        tx.send(Ok(blank(2))).unwrap();

        let mut pipeline = pipeline();
        let err = pipeline
            .run(&rx, &AtomicBool::new(false))
            .expect_err("boundary failure is fatal");
        assert!(format!("{:#}", err).contains("after 11 attempts"));
        assert_eq!(
            pipeline.summary(),
            RunSummary {
                frames_processed: 2,
                frames_dropped: 1,
                frames_with_motion: 0,
            }
        );
    }

    #[test]
    fn run_ends_cleanly_when_reader_hangs_up() {
        let (tx, rx) = sync_channel(2);
        tx.send(Ok(blank(0))).unwrap();
        drop(tx);
        let summary = pipeline().run(&rx, &AtomicBool::new(false)).unwrap();
        assert_eq!(summary.frames_processed, 1);
    }

    #[test]
    fn stop_flag_ends_run_before_reading() {
        let (tx, rx) = sync_channel(2);
        tx.send(Ok(blank(0))).unwrap();
        let summary = pipeline().run(&rx, &AtomicBool::new(true)).unwrap();
        assert_eq!(summary, RunSummary::default());
    }

    #[test]
    fn still_frames_produce_no_notifications() {
        let mut pipeline = pipeline();
        for tag in 0..20 {
            assert!(pipeline.process(blank(tag)).is_empty());
        }
        assert_eq!(pipeline.tracker().state().current_zone(), None);
    }
}
