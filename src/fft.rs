//! Spectral transforms over the padded grid layout using rustfft
//!
//! The grid stores one contiguous `f32` buffer that is either a real volume
//! of `rnxp * nyp * nzp` samples or, after a forward transform, a complex
//! half-spectrum of `cnxp * nyp * nzp` values occupying the same memory
//! (complex value `c` lives at slots `2c` and `2c + 1`). The transforms here
//! are unnormalized in both directions, matching the classic real-to-complex
//! FFT convention, so a round trip scales by `nxp * nyp * nzp` and the grid
//! applies its own kind-dependent normalization.
//!
//! The x axis uses a real-to-complex transform (half spectrum, Hermitian
//! symmetry), the y and z axes are complex-to-complex over the half
//! spectrum.

use num_complex::Complex32;
use rustfft::{FftDirection, FftPlanner};

/// In-place forward transform: real volume to complex half-spectrum.
///
/// `values` holds the padded real layout (`rnxp`-strided rows, data in
/// `i < nxp`); on return it holds the interleaved complex half-spectrum.
pub fn forward_3d(values: &mut [f32], nxp: usize, nyp: usize, nzp: usize) {
    let cnxp = nxp / 2 + 1;
    let rnxp = 2 * cnxp;
    assert_eq!(values.len(), rnxp * nyp * nzp);

    let mut planner = FftPlanner::<f32>::new();

    // Real-to-complex along x: full-length complex transform of each real
    // row, keeping the first cnxp bins (the rest are their conjugates).
    let fft_x = planner.plan_fft(nxp, FftDirection::Forward);
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft_x.get_inplace_scratch_len()];
    let mut row = vec![Complex32::new(0.0, 0.0); nxp];
    for k in 0..nzp {
        for j in 0..nyp {
            let base = (j + k * nyp) * rnxp;
            for i in 0..nxp {
                row[i] = Complex32::new(values[base + i], 0.0);
            }
            fft_x.process_with_scratch(&mut row, &mut scratch);
            for c in 0..cnxp {
                values[base + 2 * c] = row[c].re;
                values[base + 2 * c + 1] = row[c].im;
            }
        }
    }

    transform_y_axis(values, cnxp, nyp, nzp, FftDirection::Forward, &mut planner);
    transform_z_axis(values, cnxp, nyp, nzp, FftDirection::Forward, &mut planner);
}

/// In-place inverse transform: complex half-spectrum back to a real volume.
///
/// Unnormalized; the caller applies the grid's normalization afterwards.
pub fn inverse_3d(values: &mut [f32], nxp: usize, nyp: usize, nzp: usize) {
    let cnxp = nxp / 2 + 1;
    let rnxp = 2 * cnxp;
    assert_eq!(values.len(), rnxp * nyp * nzp);

    let mut planner = FftPlanner::<f32>::new();

    transform_z_axis(values, cnxp, nyp, nzp, FftDirection::Inverse, &mut planner);
    transform_y_axis(values, cnxp, nyp, nzp, FftDirection::Inverse, &mut planner);

    // Complex-to-real along x: rebuild the full Hermitian row from the half
    // spectrum, inverse transform, keep the real parts.
    let ifft_x = planner.plan_fft(nxp, FftDirection::Inverse);
    let mut scratch = vec![Complex32::new(0.0, 0.0); ifft_x.get_inplace_scratch_len()];
    let mut row = vec![Complex32::new(0.0, 0.0); nxp];
    for k in 0..nzp {
        for j in 0..nyp {
            let base = (j + k * nyp) * rnxp;
            for i in 0..nxp {
                let c = if i < cnxp { i } else { nxp - i };
                let bin = Complex32::new(values[base + 2 * c], values[base + 2 * c + 1]);
                row[i] = if i < cnxp { bin } else { bin.conj() };
            }
            ifft_x.process_with_scratch(&mut row, &mut scratch);
            for i in 0..nxp {
                values[base + i] = row[i].re;
            }
        }
    }
}

fn transform_y_axis(
    values: &mut [f32],
    cnxp: usize,
    nyp: usize,
    nzp: usize,
    direction: FftDirection,
    planner: &mut FftPlanner<f32>,
) {
    let fft_y = planner.plan_fft(nyp, direction);
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft_y.get_inplace_scratch_len()];
    let mut column = vec![Complex32::new(0.0, 0.0); nyp];
    for k in 0..nzp {
        for i in 0..cnxp {
            for j in 0..nyp {
                let c = i + j * cnxp + k * cnxp * nyp;
                column[j] = Complex32::new(values[2 * c], values[2 * c + 1]);
            }
            fft_y.process_with_scratch(&mut column, &mut scratch);
            for j in 0..nyp {
                let c = i + j * cnxp + k * cnxp * nyp;
                values[2 * c] = column[j].re;
                values[2 * c + 1] = column[j].im;
            }
        }
    }
}

fn transform_z_axis(
    values: &mut [f32],
    cnxp: usize,
    nyp: usize,
    nzp: usize,
    direction: FftDirection,
    planner: &mut FftPlanner<f32>,
) {
    let fft_z = planner.plan_fft(nzp, direction);
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft_z.get_inplace_scratch_len()];
    let mut column = vec![Complex32::new(0.0, 0.0); nzp];
    for j in 0..nyp {
        for i in 0..cnxp {
            for k in 0..nzp {
                let c = i + j * cnxp + k * cnxp * nyp;
                column[k] = Complex32::new(values[2 * c], values[2 * c + 1]);
            }
            fft_z.process_with_scratch(&mut column, &mut scratch);
            for k in 0..nzp {
                let c = i + j * cnxp + k * cnxp * nyp;
                values[2 * c] = column[k].re;
                values[2 * c + 1] = column[k].im;
            }
        }
    }
}

/// Forward real 1D transform: `n` samples to `n/2 + 1` spectrum bins.
///
/// Unnormalized. `data` may be shorter than `n`; the tail is zero padded.
pub fn forward_real_1d(data: &[f32], n: usize) -> Vec<Complex32> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft(n, FftDirection::Forward);
    let mut buffer: Vec<Complex32> = (0..n)
        .map(|i| Complex32::new(data.get(i).copied().unwrap_or(0.0), 0.0))
        .collect();
    let mut scratch = vec![Complex32::new(0.0, 0.0); fft.get_inplace_scratch_len()];
    fft.process_with_scratch(&mut buffer, &mut scratch);
    buffer.truncate(n / 2 + 1);
    buffer
}

/// Inverse real 1D transform: `n/2 + 1` spectrum bins to `n` samples.
///
/// Unnormalized (a forward/inverse pair scales by `n`). Bins beyond the
/// given `spectrum` are treated as zero.
pub fn inverse_real_1d(spectrum: &[Complex32], n: usize) -> Vec<f32> {
    let cn = n / 2 + 1;
    let mut planner = FftPlanner::<f32>::new();
    let ifft = planner.plan_fft(n, FftDirection::Inverse);
    let mut buffer = vec![Complex32::new(0.0, 0.0); n];
    for i in 0..n {
        let c = if i < cn { i } else { n - i };
        let bin = spectrum.get(c).copied().unwrap_or(Complex32::new(0.0, 0.0));
        buffer[i] = if i < cn { bin } else { bin.conj() };
    }
    let mut scratch = vec![Complex32::new(0.0, 0.0); ifft.get_inplace_scratch_len()];
    ifft.process_with_scratch(&mut buffer, &mut scratch);
    buffer.iter().map(|c| c.re).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded_layout(
        nxp: usize,
        nyp: usize,
        nzp: usize,
        f: impl Fn(usize, usize, usize) -> f32,
    ) -> Vec<f32> {
        let rnxp = 2 * (nxp / 2 + 1);
        let mut values = vec![0.0; rnxp * nyp * nzp];
        for k in 0..nzp {
            for j in 0..nyp {
                for i in 0..nxp {
                    values[i + j * rnxp + k * rnxp * nyp] = f(i, j, k);
                }
            }
        }
        values
    }

    #[test]
    fn test_forward_inverse_round_trip() {
        let (nxp, nyp, nzp) = (8, 6, 5);
        let rnxp = 2 * (nxp / 2 + 1);
        let original = padded_layout(nxp, nyp, nzp, |i, j, k| {
            ((i * 31 + j * 17 + k * 7) % 23) as f32 - 11.0
        });
        let mut values = original.clone();

        forward_3d(&mut values, nxp, nyp, nzp);
        inverse_3d(&mut values, nxp, nyp, nzp);

        let n = (nxp * nyp * nzp) as f32;
        for k in 0..nzp {
            for j in 0..nyp {
                for i in 0..nxp {
                    let idx = i + j * rnxp + k * rnxp * nyp;
                    let recovered = values[idx] / n;
                    assert!(
                        (recovered - original[idx]).abs() < 1e-3,
                        "mismatch at ({},{},{}): {} vs {}",
                        i,
                        j,
                        k,
                        recovered,
                        original[idx]
                    );
                }
            }
        }
    }

    #[test]
    fn test_forward_dc_bin_is_sum() {
        let (nxp, nyp, nzp) = (4, 4, 4);
        let mut values = padded_layout(nxp, nyp, nzp, |_, _, _| 2.0);
        let sum = 2.0 * (nxp * nyp * nzp) as f32;

        forward_3d(&mut values, nxp, nyp, nzp);

        // Complex bin (0,0,0) sits at slots 0 and 1.
        assert!((values[0] - sum).abs() < 1e-3);
        assert!(values[1].abs() < 1e-3);
    }

    #[test]
    fn test_real_1d_round_trip() {
        let n = 12;
        let data: Vec<f32> = (0..n).map(|i| (i as f32 * 0.7).sin()).collect();
        let spectrum = forward_real_1d(&data, n);
        assert_eq!(spectrum.len(), n / 2 + 1);
        let back = inverse_real_1d(&spectrum, n);
        for i in 0..n {
            assert!((back[i] / n as f32 - data[i]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_real_1d_oversampling_preserves_samples() {
        // Zero-extending the spectrum and inverting at 2n reproduces the
        // original samples at every second position (up to the 1/n scale).
        // Band-limited input: no content at or above the Nyquist bin.
        let n = 8;
        let m = 16;
        let step = 2.0 * std::f32::consts::PI / n as f32;
        let data: Vec<f32> = (0..n)
            .map(|i| (i as f32 * step).sin() + 0.5 * (2.0 * i as f32 * step).cos())
            .collect();
        let spectrum = forward_real_1d(&data, n);
        let fine = inverse_real_1d(&spectrum, m);
        for i in 0..n {
            assert!((fine[2 * i] / n as f32 - data[i]).abs() < 1e-3);
        }
    }
}
