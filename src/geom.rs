//! Geometry primitives shared by the index, router, and model.
//!
//! All coordinates use top-left origin convention: x increases rightward,
//! y increases downward. This matches SVG, so no conversion is needed when
//! a rendering collaborator consumes the computed paths.

use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

/// Single tolerance used crate-wide for coordinate equality, containment
/// slack, and zero-length segment detection.
pub const EPSILON: f32 = 1e-4;

/// A 2D point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn scale(self, factor: f32) -> Self {
        Self::new(self.x * factor, self.y * factor)
    }

    /// Euclidean distance to another point.
    pub fn distance(self, other: Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Angle of the vector from `self` to `other`, in radians.
    pub fn angle_to(self, other: Point) -> f32 {
        (other.y - self.y).atan2(other.x - self.x)
    }

    pub fn midpoint(self, other: Point) -> Point {
        Point::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn approx_eq(self, other: Point) -> bool {
        (self.x - other.x).abs() <= EPSILON && (self.y - other.y).abs() <= EPSILON
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

/// An axis-aligned rectangle. Invariant: `min.x <= max.x` and
/// `min.y <= max.y`; a zero-extent rectangle is a valid point anchor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub min: Point,
    pub max: Point,
}

impl Bounds {
    /// Builds bounds from two arbitrary corners, normalizing so the
    /// min/max invariant holds.
    pub fn new(a: Point, b: Point) -> Self {
        Self {
            min: Point::new(a.x.min(b.x), a.y.min(b.y)),
            max: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }

    pub fn from_center(center: Point, half_extent: Point) -> Self {
        let half = Point::new(half_extent.x.abs(), half_extent.y.abs());
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Degenerate bounds covering a single point.
    pub fn at_point(p: Point) -> Self {
        Self { min: p, max: p }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    pub fn extent(&self) -> Point {
        self.max - self.min
    }

    pub fn center(&self) -> Point {
        self.min.midpoint(self.max)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn union(&self, other: &Bounds) -> Bounds {
        Bounds {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    pub fn intersection(&self, other: &Bounds) -> Option<Bounds> {
        let min = Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if min.x <= max.x && min.y <= max.y {
            Some(Bounds { min, max })
        } else {
            None
        }
    }

    /// Containment with epsilon slack on every edge.
    pub fn contains(&self, p: Point) -> bool {
        p.x >= self.min.x - EPSILON
            && p.x <= self.max.x + EPSILON
            && p.y >= self.min.y - EPSILON
            && p.y <= self.max.y + EPSILON
    }

    pub fn overlaps(&self, other: &Bounds) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Grows (or shrinks, for negative margins) the rectangle on all sides.
    pub fn inflate(&self, margin: f32) -> Bounds {
        Bounds::new(
            Point::new(self.min.x - margin, self.min.y - margin),
            Point::new(self.max.x + margin, self.max.y + margin),
        )
    }

    pub fn translated(&self, delta: Point) -> Bounds {
        Bounds {
            min: self.min + delta,
            max: self.max + delta,
        }
    }

    /// Distance from a point to the rectangle; zero when inside.
    pub fn distance_to(&self, p: Point) -> f32 {
        let dx = (self.min.x - p.x).max(0.0).max(p.x - self.max.x);
        let dy = (self.min.y - p.y).max(0.0).max(p.y - self.max.y);
        (dx * dx + dy * dy).sqrt()
    }

    pub fn approx_eq(&self, other: &Bounds) -> bool {
        self.min.approx_eq(other.min) && self.max.approx_eq(other.max)
    }
}

/// Translation + rotation + uniform scale mapping an object's local
/// geometry into diagram space.
///
/// `apply` evaluates `rotate(p * scale) + translate`; composition and
/// inversion follow from that order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub translate: Point,
    pub rotate: f32,
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}

impl Transform {
    pub fn identity() -> Self {
        Self {
            translate: Point::ZERO,
            rotate: 0.0,
            scale: 1.0,
        }
    }

    pub fn translation(delta: Point) -> Self {
        Self {
            translate: delta,
            ..Self::identity()
        }
    }

    pub fn rotation(radians: f32) -> Self {
        Self {
            rotate: radians,
            ..Self::identity()
        }
    }

    pub fn scaling(factor: f32) -> Self {
        Self {
            scale: factor,
            ..Self::identity()
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        let (sin, cos) = self.rotate.sin_cos();
        let scaled = p.scale(self.scale);
        Point::new(
            scaled.x * cos - scaled.y * sin + self.translate.x,
            scaled.x * sin + scaled.y * cos + self.translate.y,
        )
    }

    /// Axis-aligned hull of the four transformed corners.
    pub fn apply_bounds(&self, bounds: &Bounds) -> Bounds {
        let corners = [
            bounds.min,
            Point::new(bounds.max.x, bounds.min.y),
            bounds.max,
            Point::new(bounds.min.x, bounds.max.y),
        ];
        let mut out = Bounds::at_point(self.apply(corners[0]));
        for corner in &corners[1..] {
            out = out.union(&Bounds::at_point(self.apply(*corner)));
        }
        out
    }

    /// Composition: the returned transform applies `self` first, `next`
    /// second.
    pub fn then(&self, next: &Transform) -> Transform {
        Transform {
            translate: next.apply(self.translate),
            rotate: self.rotate + next.rotate,
            scale: self.scale * next.scale,
        }
    }

    /// Inverse transform; `t.inverse().apply(t.apply(p))` is identity
    /// within `EPSILON`. Degenerate zero scale inverts to zero scale.
    pub fn inverse(&self) -> Transform {
        let inv_scale = if self.scale.abs() <= EPSILON {
            0.0
        } else {
            1.0 / self.scale
        };
        let (sin, cos) = (-self.rotate).sin_cos();
        let t = self.translate.scale(-inv_scale);
        Transform {
            translate: Point::new(t.x * cos - t.y * sin, t.x * sin + t.y * cos),
            rotate: -self.rotate,
            scale: inv_scale,
        }
    }
}

/// A value that is either user-set or derived from layout rules.
///
/// A derived payload is replaced on every `rederive`; an explicit payload
/// is only ever changed by another explicit set. Promotion to explicit
/// happens through `set_explicit`, which models the user action that
/// supersedes the derivation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum LayoutValue<T> {
    Explicit(T),
    Derived(T),
}

impl<T> LayoutValue<T> {
    pub fn get(&self) -> &T {
        match self {
            LayoutValue::Explicit(value) | LayoutValue::Derived(value) => value,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, LayoutValue::Explicit(_))
    }

    pub fn set_explicit(&mut self, value: T) {
        *self = LayoutValue::Explicit(value);
    }

    /// Replaces the payload only while derived; explicit values win.
    pub fn rederive(&mut self, value: T) {
        if let LayoutValue::Derived(_) = self {
            *self = LayoutValue::Derived(value);
        }
    }
}
