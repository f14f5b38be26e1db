use std::fmt;

use serde::{Deserialize, Serialize};

/// A 2D point in image coordinates (pixels of the stitched die image).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box. Width and height are `max - min`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    /// Build a box from its extents. Swapped coordinates are normalized.
    pub fn new(min_x: f64, max_x: f64, min_y: f64, max_y: f64) -> Self {
        Self {
            min: Point::new(min_x.min(max_x), min_y.min(max_y)),
            max: Point::new(min_x.max(max_x), min_y.max(max_y)),
        }
    }

    pub fn from_corners(a: Point, b: Point) -> Self {
        Self::new(a.x, b.x, a.y, b.y)
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        let mut bbox = Self::from_corners(*first, *first);
        for p in rest {
            bbox.min.x = bbox.min.x.min(p.x);
            bbox.min.y = bbox.min.y.min(p.y);
            bbox.max.x = bbox.max.x.max(p.x);
            bbox.max.y = bbox.max.y.max(p.y);
        }
        Some(bbox)
    }

    pub fn min_x(&self) -> f64 {
        self.min.x
    }

    pub fn max_x(&self) -> f64 {
        self.max.x
    }

    pub fn min_y(&self) -> f64 {
        self.min.y
    }

    pub fn max_y(&self) -> f64 {
        self.max.y
    }

    pub fn set_max_x(&mut self, max_x: f64) {
        self.max.x = max_x;
    }

    pub fn set_max_y(&mut self, max_y: f64) {
        self.max.y = max_y;
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    pub fn contains_point(&self, p: &Point) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    pub fn union(&self, other: &BoundingBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            min: self.min.translate(dx, dy),
            max: self.max.translate(dx, dy),
        }
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x = {}..{} / y = {}..{}",
            self.min.x, self.max.x, self.min.y, self.max.y
        )
    }
}
