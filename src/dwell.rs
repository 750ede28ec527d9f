//! Zone dwell accounting.
//!
//! `DwellTracker` owns the only session state of the system (`DwellState`).
//! It consumes one `Observation` per processed frame, in capture order, and
//! returns the events the observation triggered. It performs no I/O; the
//! dispatcher delivers the events.
//!
//! Rules:
//! - Staying in the current zone (or seeing no detection) only extends the
//!   running dwell. Cumulative per-zone totals change only at a transition,
//!   when the *previous* zone is credited with its dwell.
//! - A zone notification fires at most once per visit, and never for the zone
//!   that was notified last.
//! - On the first observation of a new calendar day, a daily report carrying
//!   the totals and coordinate history is emitted and both are cleared.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveDate};

use crate::frame::Point;

#[derive(Clone, Debug, PartialEq)]
pub struct DwellConfig {
    /// Emit zone notifications at all.
    pub notify: bool,
    /// Minimum continuous dwell before a zone notification, exclusive.
    pub notify_threshold: Duration,
}

impl Default for DwellConfig {
    fn default() -> Self {
        Self {
            notify: true,
            notify_threshold: Duration::from_secs(10),
        }
    }
}

/// One classified frame.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    /// Zone label of the detection, `None` when nothing moved.
    pub zone: Option<String>,
    pub at: DateTime<Local>,
    pub point: Option<Point>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DailyReport {
    /// The day the statistics belong to.
    pub day: NaiveDate,
    /// Seconds credited per zone, sorted by zone label.
    pub durations: BTreeMap<String, f64>,
    /// Every coordinate observed during the day, in order.
    pub coordinates: Vec<Point>,
}

impl DailyReport {
    pub fn xs(&self) -> Vec<f64> {
        self.coordinates.iter().map(|p| p.x).collect()
    }

    pub fn ys(&self) -> Vec<f64> {
        self.coordinates.iter().map(|p| p.y).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum DwellEvent {
    /// The pet has stayed in `zone` for longer than the notify threshold.
    Notify { zone: String, dwell_secs: f64 },
    DailyReport(DailyReport),
}

/// Session record. Read-only outside this module.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DwellState {
    current_zone: Option<String>,
    entry_time: Option<DateTime<Local>>,
    already_notified: bool,
    last_notified_zone: Option<String>,
    durations: BTreeMap<String, f64>,
    coordinates: Vec<Point>,
    last_day: Option<NaiveDate>,
}

impl DwellState {
    pub fn current_zone(&self) -> Option<&str> {
        self.current_zone.as_deref()
    }

    pub fn entry_time(&self) -> Option<DateTime<Local>> {
        self.entry_time
    }

    pub fn already_notified(&self) -> bool {
        self.already_notified
    }

    pub fn last_notified_zone(&self) -> Option<&str> {
        self.last_notified_zone.as_deref()
    }

    pub fn durations(&self) -> &BTreeMap<String, f64> {
        &self.durations
    }

    pub fn coordinates(&self) -> &[Point] {
        &self.coordinates
    }

    pub fn last_day(&self) -> Option<NaiveDate> {
        self.last_day
    }
}

pub struct DwellTracker {
    config: DwellConfig,
    state: DwellState,
}

impl DwellTracker {
    pub fn new(config: DwellConfig) -> Self {
        Self {
            config,
            state: DwellState::default(),
        }
    }

    pub fn state(&self) -> &DwellState {
        &self.state
    }

    /// Seconds spent in the current zone as of `now`.
    pub fn current_dwell(&self, now: DateTime<Local>) -> f64 {
        match self.state.entry_time {
            Some(entry) if self.state.current_zone.is_some() => elapsed_secs(entry, now),
            _ => 0.0,
        }
    }

    pub fn observe(&mut self, obs: Observation) -> Vec<DwellEvent> {
        let mut events = Vec::new();
        let now = obs.at;
        let entry = *self.state.entry_time.get_or_insert(now);
        let dwell = elapsed_secs(entry, now);

        match obs.zone {
            Some(zone) if self.state.current_zone.as_deref() != Some(zone.as_str()) => {
                self.enter_zone(zone, obs.point, dwell, now);
            }
            _ => {
                if let Some(point) = obs.point {
                    self.state.coordinates.push(point);
                }
                if let Some(event) = self.notify_decision(dwell) {
                    events.push(event);
                }
            }
        }

        if let Some(report) = self.rollover(now) {
            events.push(DwellEvent::DailyReport(report));
        }
        events
    }

    fn enter_zone(&mut self, zone: String, point: Option<Point>, dwell: f64, now: DateTime<Local>) {
        let state = &mut self.state;
        if let Some(point) = point {
            state.coordinates.push(point);
        }
        state.already_notified = false;
        if let Some(previous) = state.current_zone.take() {
            log::info!(
                "zone change: {} -> {} after {:.1}s",
                previous,
                zone,
                dwell
            );
            *state.durations.entry(previous).or_insert(0.0) += dwell;
        } else {
            log::info!("first zone: {}", zone);
        }
        state.current_zone = Some(zone);
        state.entry_time = Some(now);
    }

    fn notify_decision(&mut self, dwell: f64) -> Option<DwellEvent> {
        let state = &mut self.state;
        if !self.config.notify
            || state.already_notified
            || state.current_zone == state.last_notified_zone
            || dwell <= self.config.notify_threshold.as_secs_f64()
        {
            return None;
        }
        let zone = state.current_zone.clone()?;
        state.last_notified_zone = Some(zone.clone());
        state.already_notified = true;
        Some(DwellEvent::Notify {
            zone,
            dwell_secs: dwell,
        })
    }

    fn rollover(&mut self, now: DateTime<Local>) -> Option<DailyReport> {
        let today = now.date_naive();
        let state = &mut self.state;
        let previous_day = state.last_day.replace(today)?;
        if previous_day == today {
            return None;
        }
        log::info!(
            "day rollover {} -> {}: {} zones, {} coordinates",
            previous_day,
            today,
            state.durations.len(),
            state.coordinates.len()
        );
        Some(DailyReport {
            day: previous_day,
            durations: std::mem::take(&mut state.durations),
            coordinates: std::mem::take(&mut state.coordinates),
        })
    }
}

fn elapsed_secs(from: DateTime<Local>, to: DateTime<Local>) -> f64 {
    (to - from)
        .to_std()
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
