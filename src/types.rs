//! Core geometric types shared by the merge phases.

use bytemuck::{Pod, Zeroable};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Instance label. `0` is the unassigned/noise label and is never remapped or merged.
pub type Label = u32;

/// The reserved noise label.
pub const NOISE_LABEL: Label = 0;

/// A LiDAR return position in chunk coordinates.
///
/// `#[repr(C)]` so a slice of points can be viewed as interleaved `f64`s.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_glam(self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }

    #[inline]
    pub fn from_glam(v: DVec3) -> Self {
        Self::new(v.x, v.y, v.z)
    }

    #[inline]
    pub fn distance_squared(self, other: Self) -> f64 {
        self.to_glam().distance_squared(other.to_glam())
    }
}

impl From<[f64; 3]> for Point3 {
    #[inline]
    fn from([x, y, z]: [f64; 3]) -> Self {
        Self::new(x, y, z)
    }
}

impl From<Point3> for [f64; 3] {
    #[inline]
    fn from(p: Point3) -> Self {
        [p.x, p.y, p.z]
    }
}

impl From<DVec3> for Point3 {
    #[inline]
    fn from(v: DVec3) -> Self {
        Self::from_glam(v)
    }
}

/// Axis-aligned bounds of a chunk.
///
/// Border detection only looks at the planimetric extent; `z_min`/`z_max`
/// are carried for pair culling and reports.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
    pub z_min: f64,
    pub z_max: f64,
}

impl BoundingBox {
    /// Bounds of `points`, or `None` for an empty slice.
    pub fn from_points(points: &[Point3]) -> Option<Self> {
        let first = points.first()?;
        let mut lo = first.to_glam();
        let mut hi = lo;
        for p in &points[1..] {
            let v = p.to_glam();
            lo = lo.min(v);
            hi = hi.max(v);
        }
        Some(Self {
            x_min: lo.x,
            x_max: hi.x,
            y_min: lo.y,
            y_max: hi.y,
            z_min: lo.z,
            z_max: hi.z,
        })
    }

    #[inline]
    pub fn extent_x(&self) -> f64 {
        self.x_max - self.x_min
    }

    #[inline]
    pub fn extent_y(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Grow the box by `margin` on every side (all three axes).
    pub fn expanded(&self, margin: f64) -> Self {
        Self {
            x_min: self.x_min - margin,
            x_max: self.x_max + margin,
            y_min: self.y_min - margin,
            y_max: self.y_max + margin,
            z_min: self.z_min - margin,
            z_max: self.z_max + margin,
        }
    }

    /// Closed-interval overlap test on all three axes.
    pub fn intersects(&self, other: &Self) -> bool {
        self.x_min <= other.x_max
            && other.x_min <= self.x_max
            && self.y_min <= other.y_max
            && other.y_min <= self.y_max
            && self.z_min <= other.z_max
            && other.z_min <= self.z_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point3_basics() {
        let a = Point3::new(1.0, 2.0, 3.0);
        let b: Point3 = [1.0, 2.0, 5.0].into();
        assert_eq!(a.distance_squared(b), 4.0);
        assert_eq!(<[f64; 3]>::from(a), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_point3_cast_slice() {
        let pts = [Point3::new(1.0, 2.0, 3.0), Point3::new(4.0, 5.0, 6.0)];
        let flat: &[f64] = bytemuck::cast_slice(&pts);
        assert_eq!(flat, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_bbox_from_points() {
        assert!(BoundingBox::from_points(&[]).is_none());

        let pts = [
            Point3::new(0.0, 5.0, 1.0),
            Point3::new(2.0, -1.0, 3.0),
            Point3::new(1.0, 0.0, 2.0),
        ];
        let bbox = BoundingBox::from_points(&pts).unwrap();
        assert_eq!(bbox.x_min, 0.0);
        assert_eq!(bbox.x_max, 2.0);
        assert_eq!(bbox.y_min, -1.0);
        assert_eq!(bbox.y_max, 5.0);
        assert_eq!(bbox.z_min, 1.0);
        assert_eq!(bbox.z_max, 3.0);
        assert_eq!(bbox.extent_x(), 2.0);
    }

    #[test]
    fn test_bbox_intersects_with_margin() {
        let a = BoundingBox::from_points(&[Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)])
            .unwrap();
        let b = BoundingBox::from_points(&[Point3::new(1.01, 0.0, 0.0), Point3::new(2.0, 1.0, 1.0)])
            .unwrap();
        assert!(!a.intersects(&b));
        assert!(a.expanded(0.02).intersects(&b));
    }
}
