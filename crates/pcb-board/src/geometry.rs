//! Integer plane geometry in board coordinates (nanometres, Y axis pointing down).

use std::ops::{Add, Neg, Sub};

use serde::Serialize;

use crate::units;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
}

impl Point {
    pub const fn new(x: i64, y: i64) -> Self {
        Self { x, y }
    }

    /// Point from millimetre coordinates.
    pub fn mm(x: f64, y: f64) -> Self {
        Self::new(units::mm(x), units::mm(y))
    }

    pub fn length(self) -> f64 {
        (self.x as f64).hypot(self.y as f64)
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Point {
    type Output = Point;
    fn neg(self) -> Point {
        Point::new(-self.x, -self.y)
    }
}

/// Rotate about the origin by `tenths` of a degree, using KiCad's screen
/// convention: positive angles turn counter-clockwise on a Y-down canvas.
pub fn rotate(p: Point, tenths: i32) -> Point {
    match units::normalize_tenths(tenths) {
        0 => p,
        900 => Point::new(p.y, -p.x),
        1800 => Point::new(-p.x, -p.y),
        2700 => Point::new(-p.y, p.x),
        t => {
            let (sin, cos) = (f64::from(t) / 10.0).to_radians().sin_cos();
            let (x, y) = (p.x as f64, p.y as f64);
            Point::new(
                (x * cos + y * sin).round() as i64,
                (-x * sin + y * cos).round() as i64,
            )
        }
    }
}

pub fn distance(a: Point, b: Point) -> f64 {
    (b - a).length()
}

/// Shortest distance from `p` to the segment `a`-`b`. The projection is
/// clamped to the segment; a zero-length segment degrades to point distance.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = ((b.x - a.x) as f64, (b.y - a.y) as f64);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return distance(p, a);
    }
    let t = (((p.x - a.x) as f64 * dx + (p.y - a.y) as f64 * dy) / len_sq).clamp(0.0, 1.0);
    let (cx, cy) = (a.x as f64 + t * dx, a.y as f64 + t * dy);
    (p.x as f64 - cx).hypot(p.y as f64 - cy)
}

/// Axis-aligned box; `top` is the smaller Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rect {
    pub left: i64,
    pub top: i64,
    pub right: i64,
    pub bottom: i64,
}

impl Rect {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            left: a.x.min(b.x),
            top: a.y.min(b.y),
            right: a.x.max(b.x),
            bottom: a.y.max(b.y),
        }
    }

    pub fn from_points<I: IntoIterator<Item = Point>>(points: I) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(Rect::from_corners(first, first), |r, p| r.including(p)))
    }

    pub fn including(self, p: Point) -> Self {
        Self {
            left: self.left.min(p.x),
            top: self.top.min(p.y),
            right: self.right.max(p.x),
            bottom: self.bottom.max(p.y),
        }
    }

    pub fn union(self, other: Rect) -> Self {
        self.including(Point::new(other.left, other.top))
            .including(Point::new(other.right, other.bottom))
    }

    pub fn width(&self) -> i64 {
        self.right - self.left
    }

    pub fn height(&self) -> i64 {
        self.bottom - self.top
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.left, self.top)
    }
}

/// Twice the signed area (shoelace). Positive for clockwise order on a Y-down canvas.
pub fn polygon_area2(points: &[Point]) -> i128 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            i128::from(a.x) * i128::from(b.y) - i128::from(b.x) * i128::from(a.y)
        })
        .sum()
}

/// At least three vertices, non-zero area, and no two non-adjacent edges touching.
pub fn is_simple_polygon(points: &[Point]) -> bool {
    let n = points.len();
    if n < 3 || polygon_area2(points) == 0 {
        return false;
    }
    for i in 0..n {
        let (a, b) = (points[i], points[(i + 1) % n]);
        if a == b {
            return false;
        }
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            if adjacent {
                continue;
            }
            let (c, d) = (points[j], points[(j + 1) % n]);
            if segments_intersect(a, b, c, d) {
                return false;
            }
        }
    }
    true
}

fn orientation(a: Point, b: Point, c: Point) -> i8 {
    let cross = i128::from(b.x - a.x) * i128::from(c.y - a.y)
        - i128::from(b.y - a.y) * i128::from(c.x - a.x);
    cross.signum() as i8
}

fn on_segment(a: Point, p: Point, b: Point) -> bool {
    p.x >= a.x.min(b.x) && p.x <= a.x.max(b.x) && p.y >= a.y.min(b.y) && p.y <= a.y.max(b.y)
}

/// Closed-segment intersection test, including touching and collinear overlap.
pub fn segments_intersect(a: Point, b: Point, c: Point, d: Point) -> bool {
    let (o1, o2) = (orientation(a, b, c), orientation(a, b, d));
    let (o3, o4) = (orientation(c, d, a), orientation(c, d, b));
    if o1 != o2 && o3 != o4 {
        return true;
    }
    (o1 == 0 && on_segment(a, c, b))
        || (o2 == 0 && on_segment(a, d, b))
        || (o3 == 0 && on_segment(c, a, d))
        || (o4 == 0 && on_segment(c, b, d))
}
