//! Survey geometry and external data sources
//!
//! The resampler needs three things from the outside world: where a grid
//! column sits in survey coordinates ([`GridGeometry`]), vertical traces of
//! recorded data at a lateral position ([`TraceSource`]) and point samples
//! of a gridded volume ([`VolumeSource`]). The traits keep the grid core
//! independent of any particular acquisition format.

use crate::missing::MISSING;

/// Geometry of the inversion volume: cell positions and thicknesses.
pub trait GridGeometry {
    /// Survey coordinates `(x, y, z)` of the centre of logical cell
    /// `(i, j, k)`. Indices may be negative or beyond the logical extents;
    /// implementations extrapolate.
    fn coord(&self, i: i32, j: i32, k: i32) -> (f64, f64, f64);

    /// Local cell thickness of column `(i, j)`.
    fn dz(&self, i: i32, j: i32) -> f64;

    /// Column thickness relative to the reference thickness; 1 for a box
    /// with parallel top and base.
    fn relative_thickness(&self, _i: i32, _j: i32) -> f64 {
        1.0
    }
}

/// Policy for sampling a volume outside its defined area.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutsideValue {
    /// Return the MISSING sentinel.
    Missing,
    /// Return zero (seismic data dies out).
    Zero,
    /// Return the closest defined value (parameters extend).
    Closest,
}

/// A recorded vertical trace: regularly sampled amplitudes starting at
/// depth/time `z0`.
#[derive(Debug, Clone)]
pub struct RawTrace {
    pub samples: Vec<f32>,
    pub z0: f32,
}

/// Source of recorded traces, typically a seismic data volume.
pub trait TraceSource {
    /// True if `(x, y)` lies within the acquisition area.
    fn is_inside(&self, x: f64, y: f64) -> bool;

    /// The recorded trace nearest to `(x, y)`, or `None` for a dead trace.
    fn nearest_trace(&self, x: f64, y: f64) -> Option<RawTrace>;

    /// Vertical sampling interval of the recorded traces.
    fn sample_interval(&self) -> f32;

    /// Sample count of the longest recorded trace.
    fn longest_trace(&self) -> usize;
}

/// Source of point samples from a gridded volume (a background model or a
/// previously gridded cube).
pub trait VolumeSource {
    /// True if `(x, y)` lies within the defined lateral area.
    fn is_inside(&self, x: f64, y: f64) -> bool;

    /// Value at `(x, y, z)`, interpolated vertically; `outside` decides the
    /// result beyond the defined area.
    fn value_at(&self, x: f64, y: f64, z: f64, outside: OutsideValue) -> f32;
}

/// Axis-aligned box geometry with constant cell size, the common case for
/// synthetic studies and tests.
#[derive(Debug, Clone)]
pub struct RegularGeometry {
    pub x0: f64,
    pub y0: f64,
    pub z0: f64,
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
}

impl GridGeometry for RegularGeometry {
    fn coord(&self, i: i32, j: i32, k: i32) -> (f64, f64, f64) {
        (
            self.x0 + (i as f64 + 0.5) * self.dx,
            self.y0 + (j as f64 + 0.5) * self.dy,
            self.z0 + (k as f64 + 0.5) * self.dz,
        )
    }

    fn dz(&self, _i: i32, _j: i32) -> f64 {
        self.dz
    }
}

/// Constant-valued volume defined over a lateral rectangle. Test helper and
/// trivial background.
#[derive(Debug, Clone)]
pub struct ConstantVolume {
    pub value: f32,
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl VolumeSource for ConstantVolume {
    fn is_inside(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }

    fn value_at(&self, x: f64, y: f64, _z: f64, outside: OutsideValue) -> f32 {
        if self.is_inside(x, y) {
            self.value
        } else {
            match outside {
                OutsideValue::Missing => MISSING,
                OutsideValue::Zero => 0.0,
                OutsideValue::Closest => self.value,
            }
        }
    }
}
