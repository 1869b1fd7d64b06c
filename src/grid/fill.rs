//! Grid fill routines
//!
//! Constructors for grid content: constants, logical arrays, the prior
//! correlation volumes and spectral white noise. The fills write the padded
//! volume row by row with the sequential cursor so the slack slots at the
//! end of each storage row always carry the MISSING sentinel.
//!
//! The correlation fills share an index scheme: lateral lags are cyclic
//! around the padded extents (a padded index in the upper half counts as a
//! negative lag), and the depth lag is sheared by the local gradients to
//! counter the rotation of dipping layers.

use rand::Rng;
use rand_distr::StandardNormal;

use crate::missing::MISSING;

use super::{AccessMode, GridKind, SpectralGrid};

/// Cyclic lag for a padded index: indices in the upper half of the padded
/// range count as negative lags.
#[inline]
fn cyclic_lag(i: i32, np: i32) -> i32 {
    let cycle = i - np;
    if i < -cycle {
        i
    } else {
        cycle
    }
}

impl SpectralGrid {
    /// Fill the padded volume with a constant. Slack slots (`i >= nxp`)
    /// get the MISSING sentinel.
    pub fn fill_constant(&mut self, value: f32) {
        self.create_real_grid();
        self.set_access_mode(AccessMode::Write);
        for _ in 0..self.nzp {
            for _ in 0..self.nyp {
                for i in 0..self.rnxp {
                    if i < self.nxp {
                        self.set_next_real(value);
                    } else {
                        self.set_next_real(MISSING);
                    }
                }
            }
        }
        self.end_access();
    }

    /// Fill from a logical `nx * ny * nz` array, extending into the padding
    /// by repeating the last logical sample along each axis. Marks the grid
    /// as a parameter grid. Intended for padding up to twice the logical
    /// extent per axis.
    pub fn fill_from_array(&mut self, values: &[f32]) {
        assert_eq!(values.len(), self.nx * self.ny * self.nz);
        if !self.is_allocated() {
            self.create_real_grid();
        }
        self.require_spatial();
        self.kind = Some(GridKind::Parameter);

        self.set_access_mode(AccessMode::Write);
        let mut kkk = 1;
        for k in 0..self.nzp {
            let mut jjj = 1;
            let kk = if k < self.nz {
                k
            } else {
                let kk = k - kkk;
                kkk += 1;
                kk
            };
            for j in 0..self.nyp {
                let mut iii = 1;
                let jj = if j < self.ny {
                    j
                } else {
                    let jj = j - jjj;
                    jjj += 1;
                    jj
                };
                for i in 0..self.rnxp {
                    let ii = if i < self.nx {
                        i
                    } else {
                        let ii = i - iii;
                        iii += 1;
                        ii
                    };
                    if i < self.nxp {
                        self.set_next_real(values[ii + jj * self.nx + kk * self.nx * self.ny]);
                    } else {
                        self.set_next_real(MISSING);
                    }
                }
            }
        }
        self.end_access();
    }

    /// Fill with the error correlation pattern: the lateral prior
    /// correlation `corr_xy` (one value per padded `(i, j)` cell, indexed
    /// `i + nxp * j`) placed at depth lag 0, sheared by the gradients. The
    /// depth correlation itself is carried by the wavelet and is applied
    /// elsewhere; only lags within one sample of 0 contribute here.
    pub fn fill_error_correlation(&mut self, corr_xy: &[f32], grad_i: f32, grad_j: f32) {
        assert_eq!(corr_xy.len(), self.nxp * self.nyp);
        if !self.is_allocated() {
            self.create_real_grid();
        }
        self.require_spatial();

        let range: i32 = 1;
        let nzp = self.nzp as i32;
        self.set_access_mode(AccessMode::Write);
        for k in 0..self.nzp as i32 {
            for j in 0..self.nyp as i32 {
                for i in 0..self.rnxp as i32 {
                    let value = if (i as usize) < self.nxp {
                        let cycle_i = cyclic_lag(i, self.nxp as i32);
                        let cycle_j = cyclic_lag(j, self.nyp as i32);
                        let mut sub_k =
                            k as f32 + cycle_i as f32 * grad_i + cycle_j as f32 * grad_j;
                        if sub_k.abs() < range as f32 || (sub_k - nzp as f32).abs() < range as f32 {
                            let mut base_k = sub_k as i32;
                            sub_k -= base_k as f32;
                            while base_k < -range {
                                base_k += nzp;
                            }
                            while base_k >= range {
                                base_k -= nzp;
                            }
                            if base_k < 0 {
                                sub_k = 1.0 - sub_k;
                            }
                            (1.0 - sub_k) * corr_xy[i as usize + self.nxp * j as usize]
                        } else {
                            0.0
                        }
                    } else {
                        MISSING
                    };
                    self.set_next_real(value);
                }
            }
        }
        self.end_access();
    }

    /// Fill with the prior parameter correlation: the circulant depth
    /// correlation `circ_corr_t` (one value per padded depth lag) times the
    /// lateral prior correlation `corr_xy`, sheared by the gradients. Depth
    /// lags between samples are interpolated linearly, cyclically at the
    /// wrap.
    pub fn fill_parameter_correlation(
        &mut self,
        corr_xy: &[f32],
        circ_corr_t: &[f32],
        grad_i: f32,
        grad_j: f32,
    ) {
        assert_eq!(corr_xy.len(), self.nxp * self.nyp);
        assert_eq!(circ_corr_t.len(), self.nzp);
        if !self.is_allocated() {
            self.create_real_grid();
        }
        self.require_spatial();

        let nzp = self.nzp as i32;
        self.set_access_mode(AccessMode::Write);
        for k in 0..self.nzp as i32 {
            for j in 0..self.nyp as i32 {
                for i in 0..self.rnxp as i32 {
                    let value = if (i as usize) < self.nxp {
                        let cycle_i = cyclic_lag(i, self.nxp as i32);
                        let cycle_j = cyclic_lag(j, self.nyp as i32);
                        let mut sub_k =
                            k as f32 + cycle_i as f32 * grad_i + cycle_j as f32 * grad_j;
                        let mut base_k = sub_k.floor() as i32;
                        sub_k -= base_k as f32;
                        while base_k < 0 {
                            base_k += nzp;
                        }
                        while base_k >= nzp {
                            base_k -= nzp;
                        }
                        let next_k = if base_k != nzp - 1 { base_k + 1 } else { 0 };
                        let interpolated = (1.0 - sub_k) * circ_corr_t[base_k as usize]
                            + sub_k * circ_corr_t[next_k as usize];
                        interpolated * corr_xy[i as usize + self.nxp * j as usize]
                    } else {
                        MISSING
                    };
                    self.set_next_real(value);
                }
            }
        }
        self.end_access();
    }

    /// Fill with a general exponential correlation `exp(-3 d)` where `d` is
    /// the lag distance normalized by the ranges `(rx, ry, rz)`, sheared by
    /// the gradients. Marks the grid as a covariance grid.
    pub fn fill_exponential_correlation(
        &mut self,
        rx: f64,
        ry: f64,
        rz: f64,
        grad_i: f32,
        grad_j: f32,
    ) {
        if !self.is_allocated() {
            self.create_real_grid();
        }
        self.require_spatial();
        self.kind = Some(GridKind::Covariance);

        let nzp = self.nzp as f32;
        self.set_access_mode(AccessMode::Write);
        for k in 0..self.nzp as i32 {
            for j in 0..self.nyp as i32 {
                for i in 0..self.rnxp as i32 {
                    let value = if (i as usize) < self.nxp {
                        let cycle_i = cyclic_lag(i, self.nxp as i32);
                        let cycle_j = cyclic_lag(j, self.nyp as i32);
                        let mut sub_k =
                            k as f32 + cycle_i as f32 * grad_i + cycle_j as f32 * grad_j;
                        while sub_k < -nzp / 2.0 {
                            sub_k += nzp;
                        }
                        while sub_k >= nzp / 2.0 {
                            sub_k -= nzp;
                        }
                        let q_dist = (cycle_i * cycle_i) as f64 / (rx * rx)
                            + (cycle_j * cycle_j) as f64 / (ry * ry)
                            + (sub_k * sub_k) as f64 / (rz * rz);
                        (-3.0 * q_dist.sqrt()).exp() as f32
                    } else {
                        MISSING
                    };
                    self.set_next_real(value);
                }
            }
        }
        self.end_access();
    }

    /// Fill the spectral half-spectrum with white Gaussian noise whose
    /// inverse transform is a real unit-variance field. Hermitian symmetry
    /// holds by construction: the `x = 0` and even-extent Nyquist planes
    /// carry self-conjugate pairs (real where a bin is its own conjugate),
    /// everything else gets independent parts with standard deviation
    /// `1/sqrt(2)`. Marks the grid as a parameter grid.
    pub fn fill_complex_noise<R: Rng>(&mut self, rng: &mut R) {
        if !self.is_allocated() {
            self.create_complex_grid();
        }
        self.transformed = true;
        self.kind = Some(GridKind::Parameter);

        let std = 1.0 / 2.0f32.sqrt();
        let cnxp = self.cnxp;
        let nyp = self.nyp;
        let nzp = self.nzp;
        let csize = self.csize;
        let buf = self.buffer_mut();

        for i in 0..csize {
            let on_symmetry_plane =
                (i % cnxp) == 0 || ((i % cnxp) == cnxp - 1 && (i % 2) == 1);
            if on_symmetry_plane {
                let xshift = i % cnxp;
                let jkind = (i - xshift) / cnxp;
                let jind = jkind % nyp;
                let kind = jkind / nyp;
                let jccind = if jind == 0 { 0 } else { nyp - jind };
                let kccind = if kind == 0 { 0 } else { nzp - kind };
                let jkccind = jccind + kccind * nyp;
                if jkccind == jkind {
                    // The bin is its own conjugate, so it must be real.
                    let z: f32 = rng.sample(StandardNormal);
                    buf[2 * i] = z;
                    buf[2 * i + 1] = 0.0;
                } else if jkccind > jkind {
                    let re: f32 = rng.sample(StandardNormal);
                    let im: f32 = rng.sample(StandardNormal);
                    buf[2 * i] = std * re;
                    buf[2 * i + 1] = std * im;
                } else {
                    // The conjugate partner was already drawn.
                    let cci = jkccind * cnxp + xshift;
                    buf[2 * i] = buf[2 * cci];
                    buf[2 * i + 1] = -buf[2 * cci + 1];
                }
            } else {
                let re: f32 = rng.sample(StandardNormal);
                let im: f32 = rng.sample(StandardNormal);
                buf[2 * i] = std * re;
                buf[2 * i + 1] = std * im;
            }
        }
    }
}
