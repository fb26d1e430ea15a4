//! Geometric primitives shared by the leaf detector and the label extractor.
//!
//! Boxes are integer pixel rectangles in source-image coordinates; text quads
//! keep the floating-point corners reported by the OCR engine.

use imageproc::point::Point as ContourPoint;
use serde::{Deserialize, Serialize};

/// Axis-aligned box delimiting one leaf, `x1 < x2` and `y1 < y2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl BoundingBox {
    pub fn new(x1: u32, y1: u32, x2: u32, y2: u32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> u32 {
        self.x2.saturating_sub(self.x1)
    }

    pub fn height(&self) -> u32 {
        self.y2.saturating_sub(self.y1)
    }
}

/// A 2D point with floating-point coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Four corners of a text region, ordered top-left, top-right,
/// bottom-right, bottom-left.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [Point; 4]);

impl Quad {
    /// Builds the quad of an upright rectangle.
    pub fn from_rect(left: f32, top: f32, width: f32, height: f32) -> Self {
        let right = left + width;
        let bottom = top + height;
        Self([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ])
    }

    pub fn top_left(&self) -> Point {
        self.0[0]
    }

    pub fn bottom_right(&self) -> Point {
        self.0[2]
    }

    /// Mean of the top-left and bottom-right y coordinates.
    pub fn vertical_midpoint(&self) -> f32 {
        (self.top_left().y + self.bottom_right().y) / 2.0
    }

    /// Mean of the top-left and bottom-right x coordinates.
    pub fn horizontal_midpoint(&self) -> f32 {
        (self.top_left().x + self.bottom_right().x) / 2.0
    }
}

/// Area enclosed by a contour, computed with the shoelace formula over its
/// boundary points (the same measure as OpenCV's `contourArea`).
pub fn polygon_area(points: &[ContourPoint<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let mut twice_area: i64 = 0;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        twice_area += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }

    (twice_area as f64 / 2.0).abs()
}

/// Upright bounding rectangle `(x, y, width, height)` of a point set, with
/// inclusive pixel extents.
pub fn bounding_rect(points: &[ContourPoint<i32>]) -> Option<(u32, u32, u32, u32)> {
    let first = points.first()?;
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (first.x, first.y, first.x, first.y);

    for p in &points[1..] {
        min_x = min_x.min(p.x);
        min_y = min_y.min(p.y);
        max_x = max_x.max(p.x);
        max_y = max_y.max(p.y);
    }

    let min_x = min_x.max(0);
    let min_y = min_y.max(0);
    Some((
        min_x as u32,
        min_y as u32,
        (max_x - min_x + 1).max(0) as u32,
        (max_y - min_y + 1).max(0) as u32,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(side: i32) -> Vec<ContourPoint<i32>> {
        vec![
            ContourPoint::new(0, 0),
            ContourPoint::new(side, 0),
            ContourPoint::new(side, side),
            ContourPoint::new(0, side),
        ]
    }

    #[test]
    fn test_polygon_area_square() {
        assert_eq!(polygon_area(&square(10)), 100.0);
    }

    #[test]
    fn test_polygon_area_orientation_independent() {
        let mut points = square(7);
        points.reverse();
        assert_eq!(polygon_area(&points), 49.0);
    }

    #[test]
    fn test_polygon_area_degenerate() {
        assert_eq!(polygon_area(&[]), 0.0);
        assert_eq!(polygon_area(&[ContourPoint::new(3, 4)]), 0.0);
        let line = vec![ContourPoint::new(0, 0), ContourPoint::new(5, 0)];
        assert_eq!(polygon_area(&line), 0.0);
    }

    #[test]
    fn test_bounding_rect_inclusive() {
        let points = vec![
            ContourPoint::new(4, 10),
            ContourPoint::new(9, 10),
            ContourPoint::new(9, 30),
            ContourPoint::new(4, 30),
        ];
        assert_eq!(bounding_rect(&points), Some((4, 10, 6, 21)));
        assert_eq!(bounding_rect(&[]), None);
    }

    #[test]
    fn test_quad_midpoints() {
        let quad = Quad::from_rect(10.0, 20.0, 30.0, 40.0);
        assert_eq!(quad.top_left(), Point::new(10.0, 20.0));
        assert_eq!(quad.bottom_right(), Point::new(40.0, 60.0));
        assert_eq!(quad.vertical_midpoint(), 40.0);
        assert_eq!(quad.horizontal_midpoint(), 25.0);
    }

    #[test]
    fn test_bounding_box_dimensions() {
        let bbox = BoundingBox::new(5, 200, 505, 6000);
        assert_eq!(bbox.width(), 500);
        assert_eq!(bbox.height(), 5800);
    }
}
