//! Named rectangular zones of the camera frame.
//!
//! A `ZoneTable` is an ordered list. Classification returns the first zone
//! whose rectangle contains the point, so overlapping zones are resolved by
//! their position in the list.

use std::collections::HashSet;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::frame::Point;

pub const DEFAULT_UNKNOWN_LABEL: &str = "Unknown";

/// Axis-aligned rectangle with inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl Rect {
    pub fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        self.x_min <= point.x
            && point.x <= self.x_max
            && self.y_min <= point.y
            && point.y <= self.y_max
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Zone {
    pub name: String,
    #[serde(flatten)]
    pub rect: Rect,
}

impl Zone {
    pub fn new(name: impl Into<String>, rect: Rect) -> Self {
        Self {
            name: name.into(),
            rect,
        }
    }
}

/// Where a detection landed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Location {
    Zone(String),
    /// A detection that matched no configured zone.
    Unknown,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ZoneTable {
    zones: Vec<Zone>,
    unknown_label: String,
}

impl ZoneTable {
    pub fn new(zones: Vec<Zone>, unknown_label: impl Into<String>) -> Result<Self> {
        let unknown_label = unknown_label.into();
        if unknown_label.trim().is_empty() {
            return Err(anyhow!("unknown zone label must not be empty"));
        }
        let mut seen = HashSet::new();
        for zone in &zones {
            if zone.name.trim().is_empty() {
                return Err(anyhow!("zone names must not be empty"));
            }
            if zone.name == unknown_label {
                return Err(anyhow!(
                    "zone '{}' collides with the unknown label",
                    zone.name
                ));
            }
            if !seen.insert(zone.name.as_str()) {
                return Err(anyhow!("duplicate zone name '{}'", zone.name));
            }
            let r = zone.rect;
            if !(r.x_min <= r.x_max && r.y_min <= r.y_max) {
                return Err(anyhow!(
                    "zone '{}' has an empty rectangle x=[{}, {}] y=[{}, {}]",
                    zone.name,
                    r.x_min,
                    r.x_max,
                    r.y_min,
                    r.y_max
                ));
            }
        }
        Ok(Self {
            zones,
            unknown_label,
        })
    }

    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn unknown_label(&self) -> &str {
        &self.unknown_label
    }

    /// First zone containing `point`, else `Location::Unknown`.
    pub fn classify(&self, point: Point) -> Location {
        self.zones
            .iter()
            .find(|zone| zone.rect.contains(point))
            .map(|zone| Location::Zone(zone.name.clone()))
            .unwrap_or(Location::Unknown)
    }

    /// Display label of a location; `Unknown` maps to the configured label.
    pub fn label<'a>(&'a self, location: &'a Location) -> &'a str {
        match location {
            Location::Zone(name) => name,
            Location::Unknown => &self.unknown_label,
        }
    }
}

/// Zones of the reference living-room camera (640x360 frame).
pub fn default_zones() -> Vec<Zone> {
    vec![
        Zone::new("Circular house", Rect::new(457.0, 584.0, 90.0, 227.0)),
        Zone::new("Hamburger", Rect::new(100.0, 238.0, 0.0, 95.0)),
        Zone::new("Scratcher lookout", Rect::new(9.0, 146.0, 60.0, 205.0)),
        Zone::new("Water bowl", Rect::new(179.0, 314.0, 110.0, 178.0)),
        Zone::new("Scratcher round shelf", Rect::new(114.0, 222.0, 246.0, 352.0)),
    ]
}
