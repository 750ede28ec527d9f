//! Daily report rendering.
//!
//! - `HeatmapRenderer`: turns the day's coordinate history into an image.
//! - `HistogramHeatmap`: 2D histogram over the data extent, colored on a dark
//!   to bright ramp and encoded as PNG.
//! - `format_daily_stats`: text summary of per-zone dwell totals.

use std::io::Cursor;

use anyhow::{anyhow, Context, Result};
use image::{ImageFormat, Rgb, RgbImage};

use crate::dwell::DailyReport;

pub const DEFAULT_BINS: usize = 50;

pub trait HeatmapRenderer: Send {
    /// Render coordinates to an encoded image.
    fn render(&self, xs: &[f64], ys: &[f64]) -> Result<Vec<u8>>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct HistogramHeatmap {
    pub bins: usize,
    pub width: u32,
    pub height: u32,
}

impl Default for HistogramHeatmap {
    fn default() -> Self {
        Self {
            bins: DEFAULT_BINS,
            width: 640,
            height: 480,
        }
    }
}

/// Half-open bin edges over `[min, max]` with the last bin closed.
#[derive(Clone, Copy, Debug)]
struct Axis {
    min: f64,
    span: f64,
    bins: usize,
}

impl Axis {
    fn over(values: &[f64], bins: usize) -> Self {
        let (mut min, mut max) = values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if !min.is_finite() || !max.is_finite() {
            min = 0.0;
            max = 1.0;
        }
        if min == max {
            min -= 0.5;
            max += 0.5;
        }
        Self {
            min,
            span: max - min,
            bins,
        }
    }

    fn bin(&self, value: f64) -> usize {
        let idx = ((value - self.min) / self.span * self.bins as f64).floor();
        (idx.max(0.0) as usize).min(self.bins - 1)
    }
}

impl HistogramHeatmap {
    /// Bin counts indexed `[y_bin][x_bin]`.
    pub fn histogram(&self, xs: &[f64], ys: &[f64]) -> Result<Vec<Vec<u32>>> {
        if xs.len() != ys.len() {
            return Err(anyhow!(
                "coordinate lists differ in length ({} xs, {} ys)",
                xs.len(),
                ys.len()
            ));
        }
        if self.bins == 0 {
            return Err(anyhow!("heatmap needs at least one bin"));
        }
        let x_axis = Axis::over(xs, self.bins);
        let y_axis = Axis::over(ys, self.bins);
        let mut counts = vec![vec![0u32; self.bins]; self.bins];
        for (&x, &y) in xs.iter().zip(ys) {
            if !(x.is_finite() && y.is_finite()) {
                continue;
            }
            counts[y_axis.bin(y)][x_axis.bin(x)] += 1;
        }
        Ok(counts)
    }
}

impl HeatmapRenderer for HistogramHeatmap {
    fn render(&self, xs: &[f64], ys: &[f64]) -> Result<Vec<u8>> {
        if self.width == 0 || self.height == 0 {
            return Err(anyhow!("heatmap size must be non-zero"));
        }
        let counts = self.histogram(xs, ys)?;
        let peak = counts.iter().flatten().copied().max().unwrap_or(0).max(1) as f32;

        let bins = self.bins as u64;
        let img = RgbImage::from_fn(self.width, self.height, |px, py| {
            let bx = (px as u64 * bins / self.width as u64) as usize;
            let by = (py as u64 * bins / self.height as u64) as usize;
            ramp(counts[by][bx] as f32 / peak)
        });

        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .context("encode heatmap png")?;
        Ok(out)
    }
}

/// Dark blue through teal and green to yellow.
fn ramp(t: f32) -> Rgb<u8> {
    const STOPS: [[f32; 3]; 5] = [
        [68.0, 1.0, 84.0],
        [59.0, 82.0, 139.0],
        [33.0, 145.0, 140.0],
        [94.0, 201.0, 98.0],
        [253.0, 231.0, 37.0],
    ];
    let t = t.clamp(0.0, 1.0) * (STOPS.len() - 1) as f32;
    let i = (t.floor() as usize).min(STOPS.len() - 2);
    let f = t - i as f32;
    let lerp = |c: usize| (STOPS[i][c] + (STOPS[i + 1][c] - STOPS[i][c]) * f).round() as u8;
    Rgb([lerp(0), lerp(1), lerp(2)])
}

fn format_secs(total: f64) -> String {
    let total = total.max(0.0).round() as u64;
    let (h, m, s) = (total / 3600, total / 60 % 60, total % 60);
    if h > 0 {
        format!("{}h {:02}m {:02}s", h, m, s)
    } else if m > 0 {
        format!("{}m {:02}s", m, s)
    } else {
        format!("{}s", s)
    }
}

/// Text body of the daily statistics message.
pub fn format_daily_stats(report: &DailyReport) -> String {
    let mut text = format!("Daily report for {}", report.day);
    if report.durations.is_empty() {
        text.push_str("\nNo zone changes recorded.");
    }
    for (zone, secs) in &report.durations {
        text.push_str(&format!("\n{}: {}", zone, format_secs(*secs)));
    }
    text.push_str(&format!(
        "\n{} positions tracked.",
        report.coordinates.len()
    ));
    text
}
