//! Resampling external data into the padded grid
//!
//! Recorded traces are taken into the grid through a spectral oversampling
//! chain: taper the guard zone, transform at a fast length, zero-extend the
//! half-spectrum to four times the sampling density, transform back and
//! pick grid samples by linear interpolation on the fine mesh. Gridded
//! volumes are sampled directly, with the cubic boundary taper pulling
//! padding values toward zero (data) or the lateral mean (parameters).
//!
//! Traces with no usable signal can afterwards be rebuilt from their
//! lateral neighbours, and the grid edges re-extrapolated.

use tracing::info;

use crate::boundary::{
    closest_factorable, cyclic_depth_index, distance_to_boundary, fill_index, taper_weight,
};
use crate::fft;
use crate::geometry::{GridGeometry, OutsideValue, TraceSource, VolumeSource};
use crate::grid::{AccessMode, GridKind, SpectralGrid};
use crate::missing::{is_missing, MISSING, MISSING_INDEX};

/// Trace bookkeeping from [`fill_from_traces`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ResampleReport {
    /// Columns of the logical region with no recorded data.
    pub missing_traces_region: usize,
    /// Padding columns with no recorded data.
    pub missing_traces_padding: usize,
    /// Columns inside the recorded area where the trace itself is dead.
    pub dead_traces: usize,
}

/// Taper the guard zones of a recorded trace in place.
///
/// The first and last `floor(smooth_length / dz_data)` samples are scaled
/// by a squared-sine ramp rising from 0 and a squared-cosine ramp falling
/// to 0, so the trace meets the cyclic wrap smoothly. The first sample
/// inside the target zone keeps factor one.
pub fn smooth_trace_in_guard_zone(trace: &mut [f32], dz_data: f32, smooth_length: f32) {
    let n_smooth = ((smooth_length / dz_data).floor() as usize).min(trace.len());
    if n_smooth == 0 {
        return;
    }
    let half_pi = std::f64::consts::FRAC_PI_2;

    for k in 0..n_smooth {
        let theta = k as f64 / n_smooth as f64;
        let sin_t = (half_pi * theta).sin() as f32;
        trace[k] *= sin_t * sin_t;
    }

    let kstart = trace.len() - n_smooth;
    for k in 0..n_smooth {
        let theta = (k + 1) as f64 / n_smooth as f64;
        let cos_t = (half_pi * theta).cos() as f32;
        trace[kstart + k] *= cos_t * cos_t;
    }
}

/// Oversample a trace to four times its sampling density.
///
/// `trace` is zero padded to `nt` samples, transformed, the half-spectrum
/// zero extended to the fine length `mt` and transformed back. The result
/// has `2 * (mt / 2 + 1)` entries, the last two of which are slack zeros.
///
/// The output is scaled by `1 / (2 * (nt / 2 + 1))` rather than `1 / nt`,
/// so amplitudes come out a factor `nt / (nt + 2)` low. Downstream
/// normalization absorbs the factor; changing it would shift every result.
pub fn resample_trace(trace: &[f32], nt: usize, mt: usize) -> Vec<f32> {
    debug_assert!(trace.len() <= nt);
    debug_assert!(mt >= nt);
    let cnt = nt / 2 + 1;
    let rnt = 2 * cnt;
    let cmt = mt / 2 + 1;
    let rmt = 2 * cmt;

    let spectrum = fft::forward_real_1d(trace, nt);

    // Bins cnt..cmt stay zero; inverse_real_1d supplies them.
    let mut fine = fft::inverse_real_1d(&spectrum, mt);

    let scale = 1.0 / rnt as f32;
    for value in &mut fine {
        *value *= scale;
    }
    fine.resize(rmt, 0.0);
    fine
}

/// Pick a padded grid column from a fine-meshed trace.
///
/// Each padded depth index maps through its cyclic logical counterpart to a
/// position on the fine mesh and is linearly interpolated between the two
/// nearest fine samples. Positions outside the fine mesh give 0, positions
/// with only one neighbour inside give that neighbour.
pub fn interpolate_grid_values(
    z0_grid: f32,
    dz_grid: f32,
    fine: &[f32],
    z0_data: f32,
    dz_fine: f32,
    nz: usize,
    nzp: usize,
) -> Vec<f32> {
    let z0_shift = z0_grid - z0_data;
    let inv_dz_fine = 1.0 / dz_fine;
    let n_fine = fine.len() as i32;

    let mut grid_trace = vec![0.0f32; nzp];
    for (k, out) in grid_trace.iter_mut().enumerate() {
        let refk = cyclic_depth_index(k, nz, nzp);
        let dl = (z0_shift + refk as f32 * dz_grid) * inv_dz_fine;
        let l1 = dl.floor() as i32;
        let l2 = dl.ceil() as i32;

        *out = if l2 < 0 || l1 > n_fine - 1 {
            0.0
        } else if l1 < 0 {
            fine[l2 as usize]
        } else if l2 > n_fine - 1 || l1 == l2 {
            fine[l1 as usize]
        } else {
            let w1 = dl.ceil() - dl;
            let w2 = dl - dl.floor();
            w1 * fine[l1 as usize] + w2 * fine[l2 as usize]
        };
    }
    grid_trace
}

/// Resample recorded traces into the grid, column by column.
///
/// Every padded column maps through [`fill_index`] to a logical column
/// whose position is looked up in `geometry`; the nearest recorded trace is
/// smoothed, oversampled and interpolated onto the padded depth axis.
/// Columns outside the recorded area and dead traces are zero filled and
/// counted. Slack columns of the storage row are zero filled without being
/// counted.
pub fn fill_from_traces(
    grid: &mut SpectralGrid,
    source: &dyn TraceSource,
    geometry: &dyn GridGeometry,
    smooth_length: f32,
) -> ResampleReport {
    assert!(grid.kind().is_some(), "grid kind must be set before resampling");
    grid.create_real_grid();

    let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
    let (nxp, nyp, nzp) = (grid.nxp(), grid.nyp(), grid.nzp());
    info!(nxp, nyp, nzp, "resampling trace data into padded grid");

    // Fast transform length for the recorded traces, oversampled 4x.
    let nt = closest_factorable(source.longest_trace());
    let mt = 4 * nt;
    let dz_data = source.sample_interval();
    let dz_min = dz_data / 4.0;

    let mut report = ResampleReport::default();

    grid.set_access_mode(AccessMode::ReadWrite);
    for j in 0..nyp as i32 {
        for i in 0..grid.rnxp() as i32 {
            let refi = fill_index(i as usize, nx, nxp);
            let refj = fill_index(j as usize, ny, nyp);
            if refi == MISSING_INDEX || refj == MISSING_INDEX {
                grid.set_trace_constant(0.0, i, j);
                continue;
            }

            let (x, y, z0) = geometry.coord(refi, refj, 0);
            let dz_grid = geometry.dz(refi, refj) as f32;

            if source.is_inside(x, y) {
                if let Some(mut trace) = source.nearest_trace(x, y) {
                    smooth_trace_in_guard_zone(&mut trace.samples, dz_data, smooth_length);
                    let fine = resample_trace(&trace.samples, nt, mt);
                    let grid_trace = interpolate_grid_values(
                        z0 as f32, dz_grid, &fine, trace.z0, dz_min, nz, nzp,
                    );
                    grid.set_trace(&grid_trace, i, j);
                } else {
                    grid.set_trace_constant(0.0, i, j);
                    report.dead_traces += 1;
                }
            } else {
                grid.set_trace_constant(0.0, i, j);
                if (i as usize) < nx && (j as usize) < ny {
                    report.missing_traces_region += 1;
                } else {
                    report.missing_traces_padding += 1;
                }
            }
        }
    }
    grid.end_access();

    info!(
        missing_region = report.missing_traces_region,
        missing_padding = report.missing_traces_padding,
        dead = report.dead_traces,
        "trace resampling finished"
    );
    report
}

/// Resample a gridded volume into the grid, cell by cell.
///
/// The outside policy follows the grid kind: data dies out to zero,
/// parameters extend their closest value, anything else stays missing. In
/// the padding skirt the cubic taper blends data toward zero and
/// parameters toward the lateral mean of the column's top and base values.
/// Returns the number of columns found outside the volume's defined area.
pub fn fill_from_volume(
    grid: &mut SpectralGrid,
    source: &dyn VolumeSource,
    geometry: &dyn GridGeometry,
) -> usize {
    let kind = grid.kind().expect("grid kind must be set before resampling");
    grid.create_real_grid();

    let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
    let (nxp, nyp, nzp) = (grid.nxp(), grid.nyp(), grid.nzp());
    info!(nxp, nyp, nzp, "resampling volume into padded grid");

    let out_mode = match kind {
        GridKind::Data => OutsideValue::Zero,
        GridKind::Parameter => OutsideValue::Closest,
        GridKind::Covariance => OutsideValue::Missing,
    };
    let is_parameter = kind == GridKind::Parameter;

    // Lateral mean of top and base, the blend target for parameters.
    let mut mean_value = vec![0.0f32; nxp * nyp];
    let mut outside_traces = 0;
    for j in 0..nyp {
        for i in 0..nxp {
            let refi = fill_index(i, nx, nxp);
            let refj = fill_index(j, ny, nyp);
            let (x, y, z) = geometry.coord(refi, refj, 0);
            let val1 = source.value_at(x, y, z, out_mode);
            let (x, y, z) = geometry.coord(refi, refj, nz as i32 - 1);
            let val2 = source.value_at(x, y, z, out_mode);
            mean_value[i + j * nxp] = (val1 + val2) / 2.0;

            let empty = if out_mode == OutsideValue::Zero {
                val1 == 0.0 && val2 == 0.0
            } else {
                is_missing(val1) && is_missing(val2)
            };
            // Padding-only misses are counted for data grids only.
            if empty
                && (kind == GridKind::Data || (i < nx && j < ny))
                && !source.is_inside(x, y)
            {
                outside_traces += 1;
            }
        }
    }

    grid.set_access_mode(AccessMode::Write);
    for k in 0..nzp {
        for j in 0..nyp {
            for i in 0..grid.rnxp() {
                let value = if i < nxp {
                    let refi = fill_index(i, nx, nxp);
                    let refj = fill_index(j, ny, nyp);
                    let refk = cyclic_depth_index(k, nz, nzp);
                    let (x, y, z) = geometry.coord(refi, refj, refk);
                    let dist_x = distance_to_boundary(i, nx, nxp);
                    let dist_y = distance_to_boundary(j, ny, nyp);
                    let dist_z = distance_to_boundary(k, nz, nzp);
                    let mult = taper_weight(dist_x, dist_y, dist_z);
                    let v = source.value_at(x, y, z, out_mode);
                    if !is_missing(v) {
                        if is_parameter {
                            mult * v + (1.0 - mult) * mean_value[i + j * nxp]
                        } else {
                            mult * v
                        }
                    } else if kind == GridKind::Data {
                        0.0
                    } else {
                        MISSING
                    }
                } else {
                    MISSING
                };
                grid.set_next_real(value);
            }
        }
    }
    grid.end_access();

    info!(outside_traces, "volume resampling finished");
    outside_traces
}

/// Rebuild traces without usable signal from their lateral neighbours.
///
/// A trace whose energy over the logical depth range is at or below
/// `energy_threshold` times the mean trace energy is replaced by the
/// average of its good neighbours (at least two required). Rebuilding
/// sweeps until no trace with enough good neighbours remains, then the
/// grid edges outside the surviving good region are re-extrapolated with
/// the boundary taper. Returns the number of traces rebuilt.
pub fn interpolate_missing_traces(grid: &mut SpectralGrid, energy_threshold: f32) -> usize {
    assert_eq!(grid.kind(), Some(GridKind::Data));
    let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());

    let mut energy_map = vec![0.0f32; nx * ny];
    let mut total_energy = 0.0f32;
    let mut index = 0;
    for j in 0..ny as i32 {
        for i in 0..nx as i32 {
            let mut energy = 0.0;
            for k in 0..nz as i32 {
                let v = grid.get_real_value(i, j, k, false);
                energy += v * v;
            }
            energy_map[index] = energy;
            total_energy += energy;
            index += 1;
        }
    }

    let energy_limit = energy_threshold * total_energy / (nx * ny) as f32;

    // Flag rules: bit 0 set means this trace is bad, bit 1 set means some
    // earlier trace is still bad.
    let mut flags = vec![0i16; nx * ny];
    let mut flag: i16 = 0;
    let mut imin = nx as i32;
    let mut imax: i32 = 0;
    let mut jmin = ny as i32;
    let mut jmax: i32 = 0;
    let mut rebuilt = 0;
    let mut silent = 0;
    index = 0;
    for j in 0..ny as i32 {
        for i in 0..nx as i32 {
            let cur_flag: i16 = if energy_map[index] <= energy_limit {
                rebuilt += 1;
                if energy_map[index] == 0.0 {
                    silent += 1;
                }
                1
            } else {
                0
            };
            flags[index] = flag + cur_flag;
            if cur_flag == 1 {
                flag = 2;
            } else {
                imin = imin.min(i);
                imax = imax.max(i);
                jmin = jmin.min(j);
                jmax = jmax.max(j);
            }
            index += 1;
        }
    }

    info!(
        rebuilt,
        silent,
        traces = nx * ny,
        "rebuilding traces without usable signal"
    );

    grid.set_access_mode(AccessMode::Random);
    let mut cur_index = 0usize;
    for j in 0..ny as i32 {
        for i in 0..nx as i32 {
            if flags[cur_index] % 2 == 1
                && interpolate_trace(grid, cur_index, &mut flags, i, j) % 2 == 0
            {
                // This trace got fixed; retry stuck earlier ones, then
                // clear the earlier-bad bit on the contiguous fixed run.
                let mut back = cur_index as i64 - 1;
                while back >= 0 && flags[back as usize] > 1 {
                    if flags[back as usize] % 2 == 1 {
                        let bi = (back as usize % nx) as i32;
                        let bj = (back as usize / nx) as i32;
                        interpolate_trace(grid, back as usize, &mut flags, bi, bj);
                    }
                    back -= 1;
                }
                if back < 0 {
                    back = 0;
                }
                debug_assert!(flags[back as usize] < 2);
                let mut fwd = back as usize + 1;
                while fwd <= cur_index && flags[fwd - 1] == 0 {
                    if flags[fwd] > 1 {
                        flags[fwd] -= 2;
                    }
                    fwd += 1;
                }
            }
            cur_index += 1;
        }
    }
    extrapolate_edges(grid, imin, imax, jmin, jmax);
    grid.end_access();
    rebuilt
}

/// Replace trace `(i, j)` with the average of its good neighbours if it has
/// more than one; clears the trace's bad bit on success. Returns the
/// trace's flag value.
fn interpolate_trace(
    grid: &mut SpectralGrid,
    index: usize,
    flags: &mut [i16],
    i: i32,
    j: i32,
) -> i16 {
    let nx = grid.nx();
    let left = i > 0 && flags[index - 1] % 2 == 0;
    let right = (i as usize) < nx - 1 && flags[index + 1] % 2 == 0;
    let up = j > 0 && flags[index - nx] % 2 == 0;
    let down = (j as usize) < grid.ny() - 1 && flags[index + nx] % 2 == 0;
    let nt = [left, right, up, down].iter().filter(|&&b| b).count();

    if nt > 1 {
        let nzp = grid.nzp();
        let mut mean = vec![0.0f32; nzp];
        if left {
            for (k, m) in mean.iter_mut().enumerate() {
                *m = grid.get_real_value(i - 1, j, k as i32, true);
            }
        }
        if right {
            for (k, m) in mean.iter_mut().enumerate() {
                *m += grid.get_real_value(i + 1, j, k as i32, true);
            }
        }
        if up {
            for (k, m) in mean.iter_mut().enumerate() {
                *m += grid.get_real_value(i, j - 1, k as i32, true);
            }
        }
        if down {
            for (k, m) in mean.iter_mut().enumerate() {
                *m += grid.get_real_value(i, j + 1, k as i32, true);
            }
        }
        for k in 0..nzp {
            grid.set_real_value(i, j, k as i32, mean[k] / nt as f32, true);
        }
        debug_assert!(flags[index] % 2 == 1);
        flags[index] -= 1;
    }
    flags[index]
}

/// Re-extrapolate grid edges outside the good-trace rectangle: copy the
/// nearest good column and apply the boundary taper. Requires an active
/// random access mode.
fn extrapolate_edges(grid: &mut SpectralGrid, imin: i32, imax: i32, jmin: i32, jmax: i32) {
    let (nx, ny, nz) = (grid.nx(), grid.ny(), grid.nz());
    let (nxp, nyp, nzp) = (grid.nxp(), grid.nyp(), grid.nzp());

    for j in 0..nyp as i32 {
        let mut refj = fill_index(j as usize, ny, nyp);
        if refj < jmin {
            refj = jmin;
        } else if refj > jmax {
            refj = jmax;
        }
        for i in 0..nxp as i32 {
            if i < imin || i > imax || j < jmin || j > jmax {
                let mut refi = fill_index(i as usize, nx, nxp);
                if refi < imin {
                    refi = imin;
                } else if refi > imax {
                    refi = imax;
                }
                for k in 0..nzp as i32 {
                    let value = grid.get_real_value(refi, refj, k, true);
                    let dist_x = distance_to_boundary(i as usize, nx, nxp);
                    let dist_y = distance_to_boundary(j as usize, ny, nyp);
                    let dist_z = distance_to_boundary(k as usize, nz, nzp);
                    let mult = taper_weight(dist_x, dist_y, dist_z);
                    grid.set_real_value(i, j, k, mult * value, true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{ConstantVolume, RawTrace, RegularGeometry};
    use crate::missing::is_missing;

    struct SineSource {
        n: usize,
        z0: f32,
        dz: f32,
    }

    impl TraceSource for SineSource {
        fn is_inside(&self, _x: f64, _y: f64) -> bool {
            true
        }

        fn nearest_trace(&self, _x: f64, _y: f64) -> Option<RawTrace> {
            let samples = (0..self.n)
                .map(|m| (2.0 * std::f32::consts::PI * m as f32 / self.n as f32).sin())
                .collect();
            Some(RawTrace { samples, z0: self.z0 })
        }

        fn sample_interval(&self) -> f32 {
            self.dz
        }

        fn longest_trace(&self) -> usize {
            self.n
        }
    }

    #[test]
    fn test_smooth_trace_tapers_both_ends() {
        let mut trace = vec![1.0f32; 16];
        smooth_trace_in_guard_zone(&mut trace, 1.0, 4.0);
        // Squared-sine ramp in.
        assert_eq!(trace[0], 0.0);
        assert!(trace[1] > 0.0 && trace[1] < trace[2]);
        assert!(trace[3] < 1.0);
        // Untouched middle.
        assert_eq!(trace[4], 1.0);
        assert_eq!(trace[11], 1.0);
        // Squared-cosine ramp out ends at zero.
        assert!(trace[12] < 1.0);
        assert!((trace[15]).abs() < 1e-7);
    }

    #[test]
    fn test_smooth_trace_zero_length_is_noop() {
        let mut trace = vec![2.0f32; 8];
        smooth_trace_in_guard_zone(&mut trace, 4.0, 0.0);
        assert!(trace.iter().all(|&v| v == 2.0));
    }

    #[test]
    fn test_resample_trace_constant_carries_scale_quirk() {
        // A constant trace stays constant on the fine mesh, at amplitude
        // nt / (nt + 2) of the input.
        let nt = 12;
        let mt = 48;
        let trace = vec![2.0f32; nt];
        let fine = resample_trace(&trace, nt, mt);
        assert_eq!(fine.len(), 2 * (mt / 2 + 1));
        let expected = 2.0 * nt as f32 / (nt + 2) as f32;
        for &v in &fine[..mt] {
            assert!((v - expected).abs() < 1e-4, "{} vs {}", v, expected);
        }
        // Slack entries are zero.
        assert_eq!(fine[mt], 0.0);
        assert_eq!(fine[mt + 1], 0.0);
    }

    #[test]
    fn test_interpolate_grid_values_weights() {
        let fine: Vec<f32> = (0..12).map(|l| l as f32).collect();
        // dz_grid = 2 fine steps; depth index 5 of 6 wraps to -1.
        let trace = interpolate_grid_values(0.0, 2.0, &fine, 0.0, 1.0, 4, 6);
        assert_eq!(trace.len(), 6);
        assert_eq!(trace[0], 0.0);
        assert_eq!(trace[1], 2.0);
        assert_eq!(trace[4], 8.0);
        // Wrapped index falls before the fine mesh.
        assert_eq!(trace[5], 0.0);

        // Fractional positions interpolate between neighbours.
        let trace = interpolate_grid_values(0.5, 2.0, &fine, 0.0, 1.0, 4, 6);
        assert!((trace[0] - 0.5).abs() < 1e-6);
        assert!((trace[1] - 2.5).abs() < 1e-6);
    }

    #[test]
    fn test_fill_from_traces_sine() {
        let mut grid = SpectralGrid::new(2, 2, 4, 4, 4, 6);
        grid.set_kind(GridKind::Data);
        let geometry = RegularGeometry {
            x0: 0.0,
            y0: 0.0,
            z0: 1000.0,
            dx: 50.0,
            dy: 50.0,
            dz: 4.0,
        };
        let source = SineSource { n: 40, z0: 900.0, dz: 4.0 };

        let report = fill_from_traces(&mut grid, &source, &geometry, 0.0);
        assert_eq!(report, ResampleReport::default());

        // The band-limited sine resamples exactly, up to the nt/(nt+2)
        // amplitude factor. nt = 40 (factorable), fine step = 1.
        let amp = 40.0f32 / 42.0;
        for k in 0..4 {
            // Cell centre depth 1000 + (k + 0.5) * 4, trace starts at 900.
            let fine_pos = 102.0 + 4.0 * k as f32;
            let expected = amp * (2.0 * std::f32::consts::PI * fine_pos / 160.0).sin();
            let got = grid.get_real_value(0, 0, k, false);
            assert!((got - expected).abs() < 1e-3, "k={}: {} vs {}", k, got, expected);
        }
    }

    #[test]
    fn test_fill_from_volume_parameter_blends_to_itself() {
        let mut grid = SpectralGrid::new(4, 4, 4, 8, 8, 8);
        grid.set_kind(GridKind::Parameter);
        let geometry = RegularGeometry {
            x0: 0.0,
            y0: 0.0,
            z0: 0.0,
            dx: 10.0,
            dy: 10.0,
            dz: 4.0,
        };
        let volume = ConstantVolume {
            value: 5.0,
            x_min: -1e6,
            x_max: 1e6,
            y_min: -1e6,
            y_max: 1e6,
        };
        let outside = fill_from_volume(&mut grid, &volume, &geometry);
        assert_eq!(outside, 0);
        // A constant volume blends with its own mean, so every padded cell
        // carries the value.
        for k in 0..8 {
            for j in 0..8 {
                for i in 0..8 {
                    assert!((grid.get_real_value(i, j, k, true) - 5.0).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_fill_from_volume_data_tapers_padding() {
        let mut grid = SpectralGrid::new(4, 4, 4, 8, 8, 8);
        grid.set_kind(GridKind::Data);
        let geometry = RegularGeometry {
            x0: 0.0,
            y0: 0.0,
            z0: 0.0,
            dx: 10.0,
            dy: 10.0,
            dz: 4.0,
        };
        let volume = ConstantVolume {
            value: 5.0,
            x_min: -1e6,
            x_max: 1e6,
            y_min: -1e6,
            y_max: 1e6,
        };
        fill_from_volume(&mut grid, &volume, &geometry);
        // Logical region keeps full amplitude, deep padding dies out.
        assert_eq!(grid.get_real_value(2, 2, 2, false), 5.0);
        let deep = grid.get_real_value(5, 0, 0, true);
        assert!(deep.abs() < 5.0);
        assert_eq!(grid.get_real_value(5, 5, 5, true), 0.0);
        // Slack slots carry the sentinel.
        assert!(is_missing(grid.raw_values()[grid.rnxp() - 1]));
    }

    #[test]
    fn test_interpolate_missing_traces_rebuilds_dead_trace() {
        let mut grid = SpectralGrid::new(3, 3, 4, 4, 4, 6);
        grid.set_kind(GridKind::Data);
        grid.fill_constant(1.0);
        grid.set_access_mode(AccessMode::Random);
        grid.set_trace_constant(0.0, 1, 1);
        grid.end_access();

        let rebuilt = interpolate_missing_traces(&mut grid, 0.01);
        assert_eq!(rebuilt, 1);
        // All four neighbours carry 1.0, so the rebuilt trace does too.
        for k in 0..4 {
            assert!((grid.get_real_value(1, 1, k, false) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_interpolate_missing_traces_rebuilds_adjacent_dead_traces() {
        // A dead trace whose only free neighbour is also dead cannot be
        // rebuilt on the first visit; fixing the later trace has to trigger
        // the backward retry and clear the earlier-bad bits afterwards.
        let mut grid = SpectralGrid::new(4, 4, 4, 6, 6, 6);
        grid.set_kind(GridKind::Data);
        grid.fill_constant(1.0);
        grid.set_access_mode(AccessMode::Random);
        grid.set_trace_constant(0.0, 2, 0);
        grid.set_trace_constant(0.0, 3, 0);
        grid.set_trace_constant(0.0, 3, 1);
        grid.end_access();

        let rebuilt = interpolate_missing_traces(&mut grid, 0.01);
        assert_eq!(rebuilt, 3);
        for k in 0..4 {
            assert!((grid.get_real_value(2, 0, k, false) - 1.0).abs() < 1e-6);
            assert!((grid.get_real_value(3, 0, k, false) - 1.0).abs() < 1e-6);
            assert!((grid.get_real_value(3, 1, k, false) - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_interpolate_missing_traces_keeps_good_traces() {
        let mut grid = SpectralGrid::new(3, 3, 4, 4, 4, 6);
        grid.set_kind(GridKind::Data);
        grid.fill_constant(2.0);
        let rebuilt = interpolate_missing_traces(&mut grid, 0.1);
        assert_eq!(rebuilt, 0);
        assert_eq!(grid.get_real_value(0, 0, 0, false), 2.0);
        assert_eq!(grid.get_real_value(2, 2, 3, false), 2.0);
    }
}
