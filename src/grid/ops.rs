//! Domain-aware grid arithmetic and statistics
//!
//! Elementwise operators work on whichever representation is currently
//! active: the full real buffer in the spatial domain, complex pairs in the
//! spectral domain (where multiplication is complex multiplication). The
//! MISSING sentinel is infectious: any missing operand makes the result
//! missing. The exceptions are `log_transform`, which maps missing and
//! non-positive values to 0, and `square`, which never produces missing
//! from valid input.

use num_complex::Complex32;
use tracing::info;

use crate::missing::{is_missing, MISSING};

use super::{AccessMode, SpectralGrid};

/// Min/max/average over the logical sub-volume.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

#[inline]
fn complex_is_missing(re: f32, im: f32) -> bool {
    is_missing(re) || is_missing(im)
}

impl SpectralGrid {
    fn require_same_shape(&self, other: &SpectralGrid) {
        assert!(
            self.nxp == other.nxp && self.nyp == other.nyp && self.nzp == other.nzp,
            "grids have different padded extents"
        );
        assert_eq!(
            self.transformed, other.transformed,
            "grids are in different domains"
        );
    }

    /// Elementwise `self += other` in the current domain.
    pub fn add(&mut self, other: &SpectralGrid) {
        self.require_same_shape(other);
        if self.transformed {
            let csize = self.csize;
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for c in 0..csize {
                let (re, im) = (buf[2 * c], buf[2 * c + 1]);
                let (ore, oim) = (rhs[2 * c], rhs[2 * c + 1]);
                if complex_is_missing(re, im) || complex_is_missing(ore, oim) {
                    buf[2 * c] = MISSING;
                    buf[2 * c + 1] = MISSING;
                } else {
                    buf[2 * c] = re + ore;
                    buf[2 * c + 1] = im + oim;
                }
            }
        } else {
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for (a, &b) in buf.iter_mut().zip(rhs.iter()) {
                if is_missing(*a) || is_missing(b) {
                    *a = MISSING;
                } else {
                    *a += b;
                }
            }
        }
    }

    /// Elementwise `self -= other` in the current domain.
    pub fn subtract(&mut self, other: &SpectralGrid) {
        self.require_same_shape(other);
        if self.transformed {
            let csize = self.csize;
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for c in 0..csize {
                let (re, im) = (buf[2 * c], buf[2 * c + 1]);
                let (ore, oim) = (rhs[2 * c], rhs[2 * c + 1]);
                if complex_is_missing(re, im) || complex_is_missing(ore, oim) {
                    buf[2 * c] = MISSING;
                    buf[2 * c + 1] = MISSING;
                } else {
                    buf[2 * c] = re - ore;
                    buf[2 * c + 1] = im - oim;
                }
            }
        } else {
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for (a, &b) in buf.iter_mut().zip(rhs.iter()) {
                if is_missing(*a) || is_missing(b) {
                    *a = MISSING;
                } else {
                    *a -= b;
                }
            }
        }
    }

    /// Pointwise multiplication in the current domain. In the spectral
    /// domain this is complex multiplication, not an elementwise product of
    /// interleaved parts.
    pub fn multiply(&mut self, other: &SpectralGrid) {
        self.require_same_shape(other);
        if self.transformed {
            let csize = self.csize;
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for c in 0..csize {
                let (re, im) = (buf[2 * c], buf[2 * c + 1]);
                let (ore, oim) = (rhs[2 * c], rhs[2 * c + 1]);
                if complex_is_missing(re, im) || complex_is_missing(ore, oim) {
                    buf[2 * c] = MISSING;
                    buf[2 * c + 1] = MISSING;
                } else {
                    let product = Complex32::new(re, im) * Complex32::new(ore, oim);
                    buf[2 * c] = product.re;
                    buf[2 * c + 1] = product.im;
                }
            }
        } else {
            let rhs = other.raw_values();
            let buf = self.buffer_mut();
            for (a, &b) in buf.iter_mut().zip(rhs.iter()) {
                if is_missing(*a) || is_missing(b) {
                    *a = MISSING;
                } else {
                    *a *= b;
                }
            }
        }
    }

    /// Multiply every spatial value by a scalar. Spatial domain only; the
    /// transforms use this for their normalization passes.
    pub fn scale(&mut self, scalar: f32) {
        self.require_spatial();
        for v in self.buffer_mut() {
            if !is_missing(*v) {
                *v *= scalar;
            }
        }
    }

    /// Add a scalar to every spatial value. Spatial domain only.
    pub fn add_scalar(&mut self, scalar: f32) {
        self.require_spatial();
        for v in self.buffer_mut() {
            if !is_missing(*v) {
                *v += scalar;
            }
        }
    }

    /// Negate every value in the current domain.
    pub fn negate(&mut self) {
        if self.transformed {
            let csize = self.csize;
            let buf = self.buffer_mut();
            for c in 0..csize {
                if !complex_is_missing(buf[2 * c], buf[2 * c + 1]) {
                    buf[2 * c] = -buf[2 * c];
                    buf[2 * c + 1] = -buf[2 * c + 1];
                }
            }
        } else {
            for v in self.buffer_mut() {
                if !is_missing(*v) {
                    *v = -*v;
                }
            }
        }
    }

    /// Square every value. In the spectral domain a complex value becomes
    /// its squared magnitude (imaginary part 0). Squaring a valid value
    /// never produces missing.
    pub fn square(&mut self) {
        if self.transformed {
            let csize = self.csize;
            let buf = self.buffer_mut();
            for c in 0..csize {
                let (re, im) = (buf[2 * c], buf[2 * c + 1]);
                if complex_is_missing(re, im) {
                    buf[2 * c] = MISSING;
                    buf[2 * c + 1] = MISSING;
                } else {
                    buf[2 * c] = re * re + im * im;
                    buf[2 * c + 1] = 0.0;
                }
            }
        } else {
            for v in self.buffer_mut() {
                if !is_missing(*v) {
                    *v *= *v;
                }
            }
        }
    }

    /// Exponential transform of every spatial value.
    pub fn exp_transform(&mut self) {
        self.require_spatial();
        for v in self.buffer_mut() {
            if !is_missing(*v) {
                *v = v.exp();
            }
        }
    }

    /// Logarithmic transform of every spatial value. Missing and
    /// non-positive values become 0, not missing; backgrounds built from
    /// log-transformed grids depend on this.
    pub fn log_transform(&mut self) {
        self.require_spatial();
        for v in self.buffer_mut() {
            if is_missing(*v) || *v <= 0.0 {
                *v = 0.0;
            } else {
                *v = v.ln();
            }
        }
    }

    /// Conjugate every spectral value.
    pub fn conjugate(&mut self) {
        self.require_spectral();
        let csize = self.csize;
        let buf = self.buffer_mut();
        for c in 0..csize {
            buf[2 * c + 1] = -buf[2 * c + 1];
        }
    }

    /// Replace every spectral value with the magnitude of its real part
    /// (imaginary part 0).
    pub fn real_abs(&mut self) {
        self.require_spectral();
        let csize = self.csize;
        let buf = self.buffer_mut();
        for c in 0..csize {
            buf[2 * c] = buf[2 * c].abs();
            buf[2 * c + 1] = 0.0;
        }
    }

    /// Add the top (`k = 0`) plane of this grid into a `nxp * nyp` target.
    pub fn collapse_and_add(&self, target: &mut [f32]) {
        self.require_spatial();
        let buf = self.raw_values();
        for j in 0..self.nyp {
            for i in 0..self.nxp {
                target[i + j * self.nxp] += buf[i + j * self.rnxp];
            }
        }
    }

    /// Min, max and average over the logical sub-volume, ignoring missing
    /// cells. The average is the MISSING sentinel when no cell is valid.
    pub fn compute_min_max_avg(&self) -> GridStats {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        let mut count: u64 = 0;
        let mut sum_xyz = 0.0f32;

        for k in 0..self.nz as i32 {
            let mut sum_xy = 0.0f32;
            for j in 0..self.ny as i32 {
                let mut sum_x = 0.0f32;
                for i in 0..self.nx as i32 {
                    let value = self.get_real_value(i, j, k, false);
                    if !is_missing(value) {
                        if value < min {
                            min = value;
                        }
                        if value > max {
                            max = value;
                        }
                        sum_x += value;
                        count += 1;
                    }
                }
                sum_xy += sum_x;
            }
            sum_xyz += sum_xy;
        }

        let avg = if count > 0 {
            sum_xyz / count as f32
        } else {
            MISSING
        };
        GridStats { min, max, avg }
    }

    /// Replace every missing cell (padding included) with the global
    /// average over the logical region. Background-model support.
    pub fn set_undefined_to_global_average(&mut self) {
        let avg = self.compute_min_max_avg().avg;

        let mut count: u64 = 0;
        self.set_access_mode(AccessMode::Random);
        for k in 0..self.nzp as i32 {
            for j in 0..self.nyp as i32 {
                for i in 0..self.rnxp as i32 {
                    let value = self.get_real_value(i, j, k, true);
                    if is_missing(value) {
                        self.set_real_value(i, j, k, avg, true);
                        // Undefined padding cells are not worth reporting.
                        if i < self.nx as i32 && j < self.ny as i32 && k < self.nz as i32 {
                            count += 1;
                        }
                    }
                }
            }
        }
        self.end_access();

        if count > 0 {
            let nxyz = (self.nx * self.ny * self.nz) as u64;
            info!(
                undefined = count,
                percent = 100.0 * count as f64 / nxyz as f64,
                average = avg,
                "setting undefined grid cells to the global average"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::{AccessMode, GridKind, SpectralGrid};

    fn grid_with(value: f32) -> SpectralGrid {
        let mut grid = SpectralGrid::new(3, 3, 3, 4, 4, 4);
        grid.set_kind(GridKind::Parameter);
        grid.fill_constant(value);
        grid
    }

    fn poke(grid: &mut SpectralGrid, i: i32, j: i32, k: i32, value: f32) {
        grid.set_access_mode(AccessMode::Random);
        grid.set_real_value(i, j, k, value, true);
        grid.end_access();
    }

    #[test]
    fn test_add_and_subtract() {
        let mut a = grid_with(2.0);
        let b = grid_with(3.0);
        a.add(&b);
        assert_eq!(a.get_real_value(1, 1, 1, false), 5.0);
        a.subtract(&b);
        assert_eq!(a.get_real_value(1, 1, 1, false), 2.0);
    }

    #[test]
    fn test_missing_propagates_through_add_and_multiply() {
        let mut a = grid_with(2.0);
        let b = grid_with(3.0);
        poke(&mut a, 1, 1, 1, MISSING);

        let mut sum = SpectralGrid::duplicate(&mut a, false);
        sum.add(&b);
        assert!(is_missing(sum.get_real_value(1, 1, 1, false)));
        assert_eq!(sum.get_real_value(0, 0, 0, false), 5.0);

        let mut product = SpectralGrid::duplicate(&mut a, false);
        product.multiply(&b);
        assert!(is_missing(product.get_real_value(1, 1, 1, false)));
        assert_eq!(product.get_real_value(0, 0, 0, false), 6.0);
    }

    #[test]
    fn test_square_keeps_missing_missing() {
        let mut grid = grid_with(-3.0);
        poke(&mut grid, 2, 2, 2, MISSING);
        grid.square();
        assert_eq!(grid.get_real_value(0, 0, 0, false), 9.0);
        assert!(is_missing(grid.get_real_value(2, 2, 2, false)));
    }

    #[test]
    fn test_spectral_multiply_is_complex() {
        // (1 + 2i) * (3 + 4i) = -5 + 10i
        let mut a = grid_with(0.0);
        let mut b = grid_with(0.0);
        a.forward_transform();
        b.forward_transform();
        a.set_access_mode(AccessMode::Random);
        a.set_complex_value(1, 1, 1, Complex32::new(1.0, 2.0), true);
        a.end_access();
        b.set_access_mode(AccessMode::Random);
        b.set_complex_value(1, 1, 1, Complex32::new(3.0, 4.0), true);
        b.end_access();

        a.multiply(&b);
        let v = a.get_complex_value(1, 1, 1, true);
        assert!((v.re - -5.0).abs() < 1e-5);
        assert!((v.im - 10.0).abs() < 1e-5);
    }

    #[test]
    fn test_spectral_square_is_magnitude() {
        let mut grid = grid_with(0.0);
        grid.forward_transform();
        grid.set_access_mode(AccessMode::Random);
        grid.set_complex_value(0, 1, 0, Complex32::new(3.0, 4.0), true);
        grid.end_access();
        grid.square();
        let v = grid.get_complex_value(0, 1, 0, true);
        assert!((v.re - 25.0).abs() < 1e-4);
        assert_eq!(v.im, 0.0);
    }

    #[test]
    fn test_log_and_exp_transform() {
        let mut grid = grid_with(2.0);
        poke(&mut grid, 0, 0, 0, MISSING);
        poke(&mut grid, 1, 0, 0, -1.0);
        grid.log_transform();
        // Missing and non-positive become zero, not missing.
        assert_eq!(grid.get_real_value(0, 0, 0, false), 0.0);
        assert_eq!(grid.get_real_value(1, 0, 0, false), 0.0);
        assert!((grid.get_real_value(2, 0, 0, false) - 2.0f32.ln()).abs() < 1e-6);

        let mut grid = grid_with(1.0);
        poke(&mut grid, 0, 0, 0, MISSING);
        grid.exp_transform();
        assert!(is_missing(grid.get_real_value(0, 0, 0, false)));
        assert!((grid.get_real_value(1, 0, 0, false) - 1.0f32.exp()).abs() < 1e-6);
    }

    #[test]
    fn test_scale_and_negate() {
        let mut grid = grid_with(2.0);
        poke(&mut grid, 0, 0, 0, MISSING);
        grid.scale(2.5);
        assert_eq!(grid.get_real_value(1, 0, 0, false), 5.0);
        assert!(is_missing(grid.get_real_value(0, 0, 0, false)));
        grid.negate();
        assert_eq!(grid.get_real_value(1, 0, 0, false), -5.0);
        assert!(is_missing(grid.get_real_value(0, 0, 0, false)));
    }

    #[test]
    fn test_stats_ignore_missing_and_padding() {
        let mut grid = grid_with(1.0);
        poke(&mut grid, 0, 0, 0, MISSING);
        poke(&mut grid, 1, 0, 0, 7.0);
        poke(&mut grid, 2, 0, 0, -4.0);
        // Padding values must not leak into the statistics.
        poke(&mut grid, 3, 3, 3, 1000.0);

        let stats = grid.compute_min_max_avg();
        assert_eq!(stats.min, -4.0);
        assert_eq!(stats.max, 7.0);
        let expected = (24.0 + 7.0 - 4.0) / 26.0;
        assert!((stats.avg - expected).abs() < 1e-5);
    }

    #[test]
    fn test_stats_all_missing() {
        let mut grid = grid_with(MISSING);
        // fill_constant wrote the sentinel everywhere already; the average
        // must come back as the sentinel.
        let stats = grid.compute_min_max_avg();
        assert!(is_missing(stats.avg));
        grid.set_undefined_to_global_average();
        assert!(is_missing(grid.get_real_value(0, 0, 0, false)));
    }

    #[test]
    fn test_set_undefined_to_global_average() {
        let mut grid = grid_with(4.0);
        poke(&mut grid, 1, 1, 1, MISSING);
        grid.set_undefined_to_global_average();
        assert_eq!(grid.get_real_value(1, 1, 1, false), 4.0);
    }

    #[test]
    fn test_collapse_and_add() {
        let grid = grid_with(2.0);
        let mut target = vec![1.0f32; grid.nxp() * grid.nyp()];
        grid.collapse_and_add(&mut target);
        assert_eq!(target[0], 3.0);
        assert_eq!(target[grid.nxp() * grid.nyp() - 1], 3.0);
    }
}
