// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rectangle and point arithmetic shared by every pipeline stage.

use serde::{Deserialize, Serialize};

use crate::error::{RescanError, Result};

/// An axis-aligned integer rectangle with a top-left origin.
///
/// Extents are half-open: the rectangle covers columns `x..x + width` and
/// rows `y..y + height`. Any rectangle stored in a zone must have a positive
/// width and height; use [`Rect::try_new`] at the boundaries where raw
/// detector output enters the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Build a rectangle, rejecting zero or negative extents.
    pub fn try_new(x: i32, y: i32, width: i32, height: i32) -> Result<Self> {
        let rect = Self::new(x, y, width, height);
        if rect.is_valid() {
            Ok(rect)
        } else {
            Err(RescanError::InvalidRect {
                x,
                y,
                width,
                height,
            })
        }
    }

    /// Build a rectangle from its left/top/right/bottom edges (right and
    /// bottom exclusive).
    pub const fn from_edges(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub const fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Area in square pixels; zero for degenerate rectangles.
    pub fn area(&self) -> i64 {
        if self.is_valid() {
            self.width as i64 * self.height as i64
        } else {
            0
        }
    }

    /// The overlapping region of two rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (left < right && top < bottom).then(|| Rect::from_edges(left, top, right, bottom))
    }

    /// Area of the overlapping region; zero when the rectangles are disjoint.
    pub fn intersection_area(&self, other: &Rect) -> i64 {
        self.intersection(other).map_or(0, |r| r.area())
    }

    /// Fraction of `other`'s area that `self` covers, in `0.0..=1.0`.
    pub fn coverage_of(&self, other: &Rect) -> f64 {
        let area = other.area();
        if area == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / area as f64
    }

    /// Smallest rectangle containing both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect::from_edges(
            self.x.min(other.x),
            self.y.min(other.y),
            self.right().max(other.right()),
            self.bottom().max(other.bottom()),
        )
    }

    /// Length of the shared vertical span (rows covered by both).
    pub fn vertical_overlap(&self, other: &Rect) -> i32 {
        (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0)
    }

    /// Length of the shared horizontal span (columns covered by both).
    pub fn horizontal_overlap(&self, other: &Rect) -> i32 {
        (self.right().min(other.right()) - self.x.max(other.x)).max(0)
    }

    /// Distance between the facing vertical edges; zero or negative when the
    /// horizontal spans overlap.
    pub fn horizontal_gap(&self, other: &Rect) -> i32 {
        self.x.max(other.x) - self.right().min(other.right())
    }

    /// Clip the rectangle to `0..width` x `0..height`. Returns `None` when
    /// nothing remains.
    pub fn clamp_to(&self, width: u32, height: u32) -> Option<Rect> {
        let bounds = Rect::new(0, 0, width as i32, height as i32);
        self.intersection(&bounds)
    }

    /// Whether the rectangle touches (or crosses) any edge of a
    /// `width` x `height` image.
    pub fn touches_border(&self, width: u32, height: u32) -> bool {
        self.x <= 0 || self.y <= 0 || self.right() >= width as i32 || self.bottom() >= height as i32
    }
}

/// A sub-pixel point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance.
    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

/// Order four corners as `[top_left, top_right, bottom_right, bottom_left]`.
///
/// Points are sorted by `y` then `x`; the upper pair becomes the top edge and
/// the lower pair the bottom edge, each ordered left to right.
pub fn sort_quad_corners(points: [Point; 4]) -> [Point; 4] {
    let mut sorted = points;
    sorted.sort_by(|a, b| a.y.total_cmp(&b.y).then(a.x.total_cmp(&b.x)));

    let (mut top, mut bottom) = ([sorted[0], sorted[1]], [sorted[2], sorted[3]]);
    top.sort_by(|a, b| a.x.total_cmp(&b.x));
    bottom.sort_by(|a, b| a.x.total_cmp(&b.x));

    [top[0], top[1], bottom[1], bottom[0]]
}

/// Polygon area via the shoelace formula. Vertices must be in order.
pub fn polygon_area(points: &[Point]) -> f32 {
    if points.len() < 3 {
        return 0.0;
    }
    let n = points.len();
    let mut area = 0.0f32;
    for i in 0..n {
        let j = (i + 1) % n;
        area += points[i].x * points[j].y;
        area -= points[j].x * points[i].y;
    }
    area.abs() / 2.0
}

/// Whether an ordered polygon is strictly convex (all turns share one sign).
pub fn is_convex(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 {
        return false;
    }
    let mut sign = 0.0f32;
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        let c = points[(i + 2) % n];
        let cross = (b.x - a.x) * (c.y - b.y) - (b.y - a.y) * (c.x - b.x);
        if cross.abs() < f32::EPSILON {
            return false;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Length of a closed polygon's boundary.
pub fn perimeter(points: &[Point]) -> f32 {
    let n = points.len();
    if n < 2 {
        return 0.0;
    }
    (0..n).map(|i| points[i].distance(&points[(i + 1) % n])).sum()
}

/// Distance from `point` to the infinite line through `start` and `end`.
fn line_distance(point: &Point, start: &Point, end: &Point) -> f32 {
    let a = end.y - start.y;
    let b = start.x - end.x;
    let c = end.x * start.y - start.x * end.y;
    let norm = (a * a + b * b).sqrt();
    if norm == 0.0 {
        return point.distance(start);
    }
    (a * point.x + b * point.y + c).abs() / norm
}

/// Douglas-Peucker simplification of an open curve. Both endpoints are kept.
pub fn simplify_curve(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 2 {
        return points.to_vec();
    }

    let last = points.len() - 1;
    let mut keep = vec![false; points.len()];
    keep[0] = true;
    keep[last] = true;

    let mut stack = vec![(0, last)];
    while let Some((start, end)) = stack.pop() {
        if end - start <= 1 {
            continue;
        }
        let mut max_dist = 0.0;
        let mut max_index = start;
        for i in (start + 1)..end {
            let dist = line_distance(&points[i], &points[start], &points[end]);
            if dist > max_dist {
                max_dist = dist;
                max_index = i;
            }
        }
        if max_dist > epsilon {
            keep[max_index] = true;
            stack.push((start, max_index));
            stack.push((max_index, end));
        }
    }

    points
        .iter()
        .zip(keep)
        .filter_map(|(p, k)| k.then_some(*p))
        .collect()
}

/// Douglas-Peucker simplification of a closed outline.
///
/// The ring is split at the vertex farthest from the first point and each
/// half is simplified separately. The starting point is dropped afterwards if
/// it turns out to lie on a straight edge.
pub fn simplify_polygon(points: &[Point], epsilon: f32) -> Vec<Point> {
    if points.len() <= 3 {
        return points.to_vec();
    }

    let origin = points[0];
    let far = (1..points.len()).fold(1, |best, i| {
        if origin.distance(&points[i]) > origin.distance(&points[best]) {
            i
        } else {
            best
        }
    });

    let mut polygon = simplify_curve(&points[..=far], epsilon);
    let mut tail: Vec<Point> = points[far..].to_vec();
    tail.push(origin);
    let tail = simplify_curve(&tail, epsilon);

    // `far` ends the first half and starts the second; `origin` closes the ring.
    polygon.pop();
    polygon.extend_from_slice(&tail[..tail.len() - 1]);

    if polygon.len() > 3 {
        let prev = polygon[polygon.len() - 1];
        if line_distance(&polygon[0], &prev, &polygon[1]) <= epsilon {
            polygon.remove(0);
        }
    }
    polygon
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_area_is_symmetric() {
        let pairs = [
            (Rect::new(0, 0, 10, 10), Rect::new(5, 5, 10, 10)),
            (Rect::new(3, 7, 40, 2), Rect::new(0, 0, 20, 20)),
            (Rect::new(-5, -5, 8, 8), Rect::new(0, 0, 1, 1)),
        ];
        for (a, b) in pairs {
            assert_eq!(a.intersection_area(&b), b.intersection_area(&a));
        }
    }

    #[test]
    fn self_intersection_is_area() {
        let r = Rect::new(4, 9, 13, 7);
        assert_eq!(r.intersection_area(&r), r.area());
        assert_eq!(r.area(), 91);
    }

    #[test]
    fn disjoint_and_touching_rects_do_not_intersect() {
        let a = Rect::new(0, 0, 10, 10);
        assert_eq!(a.intersection_area(&Rect::new(20, 20, 5, 5)), 0);
        // Half-open extents: sharing an edge is not an overlap.
        assert_eq!(a.intersection_area(&Rect::new(10, 0, 5, 10)), 0);
        assert_eq!(a.intersection_area(&Rect::new(0, 10, 10, 5)), 0);
    }

    #[test]
    fn try_new_rejects_degenerate() {
        assert!(Rect::try_new(0, 0, 0, 5).is_err());
        assert!(Rect::try_new(0, 0, 5, -1).is_err());
        assert!(Rect::try_new(0, 0, 1, 1).is_ok());
    }

    #[test]
    fn coverage_and_union() {
        let text = Rect::new(0, 0, 10, 10);
        let image = Rect::new(0, 0, 10, 8);
        assert!((image.coverage_of(&text) - 0.8).abs() < 1e-9);
        assert_eq!(text.union(&Rect::new(20, 5, 5, 10)), Rect::new(0, 0, 25, 15));
    }

    #[test]
    fn spans_and_gaps() {
        let a = Rect::new(0, 0, 40, 20);
        let b = Rect::new(45, 2, 40, 20);
        assert_eq!(a.horizontal_gap(&b), 5);
        assert_eq!(b.horizontal_gap(&a), 5);
        assert_eq!(a.vertical_overlap(&b), 18);
        assert_eq!(a.horizontal_overlap(&b), 0);
        assert!(a.horizontal_gap(&Rect::new(30, 0, 20, 20)) < 0);
    }

    #[test]
    fn clamp_and_border() {
        let r = Rect::new(-5, 10, 30, 30);
        assert_eq!(r.clamp_to(20, 100), Some(Rect::new(0, 10, 20, 30)));
        assert_eq!(Rect::new(50, 50, 5, 5).clamp_to(20, 20), None);
        assert!(Rect::new(0, 5, 5, 5).touches_border(100, 100));
        assert!(!Rect::new(1, 5, 5, 5).touches_border(100, 100));
        assert!(Rect::new(90, 5, 10, 5).touches_border(100, 100));
    }

    #[test]
    fn corners_sorted_clockwise_from_top_left() {
        let shuffled = [
            Point::new(310.0, 420.0),
            Point::new(20.0, 15.0),
            Point::new(12.0, 400.0),
            Point::new(300.0, 30.0),
        ];
        let [tl, tr, br, bl] = sort_quad_corners(shuffled);
        assert_eq!(tl, Point::new(20.0, 15.0));
        assert_eq!(tr, Point::new(300.0, 30.0));
        assert_eq!(br, Point::new(310.0, 420.0));
        assert_eq!(bl, Point::new(12.0, 400.0));
    }

    #[test]
    fn distance_and_area() {
        assert!((Point::new(0.0, 0.0).distance(&Point::new(3.0, 4.0)) - 5.0).abs() < 1e-6);
        let square = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ];
        assert!((polygon_area(&square) - 50.0).abs() < 1e-3);
        assert!(is_convex(&square));
    }

    #[test]
    fn concave_quad_is_rejected() {
        let dart = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 10.0),
            Point::new(3.0, 5.0),
        ];
        assert!(!is_convex(&dart));
    }

    fn rectangle_outline(left: f32, top: f32, right: f32, bottom: f32) -> Vec<Point> {
        let mut outline = Vec::new();
        let mut x = left;
        while x < right {
            outline.push(Point::new(x, top));
            x += 1.0;
        }
        let mut y = top;
        while y < bottom {
            outline.push(Point::new(right, y));
            y += 1.0;
        }
        while x > left {
            outline.push(Point::new(x, bottom));
            x -= 1.0;
        }
        while y > top {
            outline.push(Point::new(left, y));
            y -= 1.0;
        }
        outline
    }

    #[test]
    fn dense_rectangle_simplifies_to_four_corners() {
        let outline = rectangle_outline(10.0, 20.0, 110.0, 80.0);
        assert!((perimeter(&outline) - 320.0).abs() < 1e-3);

        let corners = simplify_polygon(&outline, 0.02 * perimeter(&outline));
        assert_eq!(corners.len(), 4, "{corners:?}");
        let [tl, tr, br, bl] =
            sort_quad_corners([corners[0], corners[1], corners[2], corners[3]]);
        assert_eq!(tl, Point::new(10.0, 20.0));
        assert_eq!(tr, Point::new(110.0, 20.0));
        assert_eq!(br, Point::new(110.0, 80.0));
        assert_eq!(bl, Point::new(10.0, 80.0));
    }

    #[test]
    fn outline_starting_mid_edge_drops_the_start() {
        let mut outline = rectangle_outline(0.0, 0.0, 50.0, 50.0);
        outline.rotate_left(25);
        let corners = simplify_polygon(&outline, 1.0);
        assert_eq!(corners.len(), 4, "{corners:?}");
    }

    #[test]
    fn short_curves_are_untouched() {
        let line = [Point::new(0.0, 0.0), Point::new(5.0, 5.0)];
        assert_eq!(simplify_curve(&line, 1.0), line.to_vec());
    }
}
