//! Connected motion regions from a binary mask.
//!
//! Regions are the outer borders traced by `imageproc::contours`. Area and
//! centroid come from the polygon moments of the traced border (Green's
//! theorem).

use image::GrayImage;
use imageproc::contours::{find_contours, BorderType, Contour};

use crate::frame::Point;

/// One external motion region.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub area: f64,
    pub centroid: Point,
}

/// Zeroth and first order moments of a closed polygon.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct PolygonMoments {
    m00: f64,
    m10: f64,
    m01: f64,
}

impl PolygonMoments {
    fn of(contour: &Contour<i32>) -> Self {
        let points = &contour.points;
        let n = points.len();
        let mut moments = Self::default();
        if n < 3 {
            return moments;
        }
        for i in 0..n {
            let a = points[i];
            let b = points[(i + 1) % n];
            let (xa, ya) = (a.x as f64, a.y as f64);
            let (xb, yb) = (b.x as f64, b.y as f64);
            let cross = xa * yb - xb * ya;
            moments.m00 += cross;
            moments.m10 += (xa + xb) * cross;
            moments.m01 += (ya + yb) * cross;
        }
        moments.m00 /= 2.0;
        moments.m10 /= 6.0;
        moments.m01 /= 6.0;
        moments
    }

    fn area(&self) -> f64 {
        self.m00.abs()
    }

    fn centroid(&self) -> Option<Point> {
        if self.m00 == 0.0 {
            return None;
        }
        Some(Point::new(self.m10 / self.m00, self.m01 / self.m00))
    }
}

/// External regions of `mask` whose area is at least `min_area`.
///
/// Degenerate borders (lines, single pixels) have no centroid and are
/// dropped even when `min_area` is zero.
pub fn external_regions(mask: &GrayImage, min_area: f64) -> Vec<Region> {
    find_contours::<i32>(mask)
        .iter()
        .filter(|contour| {
            matches!(contour.border_type, BorderType::Outer) && contour.parent.is_none()
        })
        .filter_map(|contour| {
            let moments = PolygonMoments::of(contour);
            let area = moments.area();
            if area < min_area {
                return None;
            }
            moments.centroid().map(|centroid| Region { area, centroid })
        })
        .collect()
}

/// Unweighted mean of region centroids.
pub fn mean_centroid(regions: &[Region]) -> Option<Point> {
    if regions.is_empty() {
        return None;
    }
    let n = regions.len() as f64;
    let (sx, sy) = regions
        .iter()
        .fold((0.0, 0.0), |(sx, sy), r| (sx + r.centroid.x, sy + r.centroid.y));
    Some(Point::new(sx / n, sy / n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn fill(mask: &mut GrayImage, x0: u32, y0: u32, w: u32, h: u32) {
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }

    #[test]
    fn square_region_area_and_centroid() {
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 20, 30, 11, 11);
        let regions = external_regions(&mask, 0.0);
        assert_eq!(regions.len(), 1);
        // Border runs through pixel centers: 10 x 10 polygon.
        assert!((regions[0].area - 100.0).abs() < 1e-9);
        assert!((regions[0].centroid.x - 25.0).abs() < 1e-9);
        assert!((regions[0].centroid.y - 35.0).abs() < 1e-9);
    }

    #[test]
    fn area_gate_is_a_minimum() {
        let mut mask = GrayImage::new(100, 100);
        fill(&mut mask, 5, 5, 4, 4); // area 9
        fill(&mut mask, 50, 50, 21, 21); // area 400
        let regions = external_regions(&mask, 400.0);
        assert_eq!(regions.len(), 1);
        assert!((regions[0].centroid.x - 60.0).abs() < 1e-9);

        let regions = external_regions(&mask, 401.0);
        assert!(regions.is_empty());
    }

    #[test]
    fn holes_do_not_count_as_regions() {
        let mut mask = GrayImage::new(60, 60);
        fill(&mut mask, 10, 10, 31, 31);
        for y in 20..31 {
            for x in 20..31 {
                mask.put_pixel(x, y, Luma([0]));
            }
        }
        let regions = external_regions(&mask, 0.0);
        assert_eq!(regions.len(), 1);
        assert!((regions[0].centroid.x - 25.0).abs() < 1e-9);
    }

    #[test]
    fn mean_of_two_regions() {
        let regions = vec![
            Region {
                area: 10.0,
                centroid: Point::new(10.0, 20.0),
            },
            Region {
                area: 500.0,
                centroid: Point::new(30.0, 40.0),
            },
        ];
        assert_eq!(mean_centroid(&regions), Some(Point::new(20.0, 30.0)));
        assert_eq!(mean_centroid(&[]), None);
    }
}
