//! Border detection: flag points that lie near the planimetric edge of their chunk.
//!
//! A point is flagged on an axis when its coordinate is within `epsilon` of
//! either bound on that axis (inclusive). If the chunk is thinner than
//! `2 * epsilon` on an axis, the border covers the whole chunk and every
//! point is flagged on that axis.

use crate::table::Chunk;
use crate::types::BoundingBox;

/// Per-point, per-axis border flags for one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BorderFlags {
    pub x: Vec<bool>,
    pub y: Vec<bool>,
}

impl BorderFlags {
    #[inline]
    pub fn len(&self) -> usize {
        self.x.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Flagged on at least one axis.
    #[inline]
    pub fn is_border(&self, i: usize) -> bool {
        self.x[i] || self.y[i]
    }

    pub fn count(&self) -> usize {
        (0..self.len()).filter(|&i| self.is_border(i)).count()
    }
}

/// Bounding box plus border flags of one chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderInfo {
    /// `None` only for an empty chunk.
    pub bbox: Option<BoundingBox>,
    pub flags: BorderFlags,
}

#[inline]
fn flag_axis(v: f64, min: f64, max: f64, epsilon: f64, whole_axis: bool) -> bool {
    whole_axis || v <= min + epsilon || v >= max - epsilon
}

/// Compute the chunk bounding box and flag its border points.
///
/// An empty chunk yields no bbox and empty flags; the driver skips it.
pub fn detect_borders(chunk: &Chunk, epsilon: f64) -> BorderInfo {
    let Some(bbox) = BoundingBox::from_points(chunk.points()) else {
        return BorderInfo {
            bbox: None,
            flags: BorderFlags::default(),
        };
    };

    let whole_x = bbox.extent_x() < 2.0 * epsilon;
    let whole_y = bbox.extent_y() < 2.0 * epsilon;

    let n = chunk.len();
    let mut flags = BorderFlags {
        x: Vec::with_capacity(n),
        y: Vec::with_capacity(n),
    };
    for p in chunk.points() {
        flags
            .x
            .push(flag_axis(p.x, bbox.x_min, bbox.x_max, epsilon, whole_x));
        flags
            .y
            .push(flag_axis(p.y, bbox.y_min, bbox.y_max, epsilon, whole_y));
    }

    BorderInfo {
        bbox: Some(bbox),
        flags,
    }
}
