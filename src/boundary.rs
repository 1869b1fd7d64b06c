//! Boundary helpers for padded grids
//!
//! Pure functions shared by the resampler and the grid fills: mapping a
//! padded index back to a logical source index, the distance measure that
//! drives the taper in the padding skirt, the cubic taper weight itself,
//! the cyclic depth index and the fast-transform size selection.

use crate::missing::{MISSING, MISSING_INDEX};

/// Map index `i` in `[0, np)` to a logical source index in `[0, n)`.
///
/// Indices inside `[0, n)` map to themselves. Indices in the padding skirt
/// mirror whichever logical boundary is nearer, but never collapse below
/// `n/2` so that the padding does not repeat a single boundary sample.
///
/// For the series            i = 0,1,2,3,4,5,6,7
/// fill_index(i, 5, 8) gives     0,1,2,3,4,4,1,0  (cut middle, i.e. 3,2)
/// fill_index(i, 4, 8) gives     0,1,2,3,3,2,1,0  (copy)
/// fill_index(i, 3, 8) gives     0,1,2,2,1,1,1,0  (drag middle out, i.e. 1)
///
/// Returns [`MISSING_INDEX`] if `i >= np`. This happens because the real
/// storage row is longer than `np` and some loops cycle over the full row.
pub fn fill_index(i: usize, n: usize, np: usize) -> i32 {
    if i >= np {
        return MISSING_INDEX;
    }
    if i < n {
        return i as i32;
    }
    let below_np = (np - i - 1) as i32;
    let above_n = (i - n + 1) as i32;
    let half = (n / 2) as i32;
    if above_n < below_np {
        // Closer to the end than the start.
        (n as i32 - above_n).max(half)
    } else {
        (below_np).min(half)
    }
}

/// Distance measure used by the boundary taper.
///
/// Returns 0.0 for indices inside `[0, n)`. In the padding skirt the value
/// grows from 0 toward (and beyond) 1 with the distance to the nearer
/// logical boundary, measured in units of the taper length
/// `min(n, np - n) / 2.1`. Values above 1 mean the cell is beyond the taper.
///
/// Returns [`MISSING`] if `i >= np` (full-row cycles, as for [`fill_index`]).
pub fn distance_to_boundary(i: usize, n: usize, np: usize) -> f32 {
    if i >= np {
        return MISSING;
    }
    if i < n {
        return 0.0;
    }
    let taper_length = (n.min(np - n) as f64 / 2.1) as f32;
    let below_np = (np - i) as f32;
    let above_n = (i - (n - 1)) as f32;
    if above_n < below_np {
        above_n / taper_length
    } else {
        below_np / taper_length
    }
}

/// Cubic taper weight for a padded cell.
///
/// Evaluates to 1 when all three distances are 0 and decays smoothly to 0
/// once `dx^2 + dy^2 + dz^2` reaches 1.
#[inline]
pub fn taper_weight(dx: f32, dy: f32, dz: f32) -> f32 {
    let t = (1.0 - dx * dx - dy * dy - dz * dz).max(0.0);
    t * t * t
}

/// Map a padded depth index to its cyclic logical counterpart.
///
/// Depth padding represents negative lags: cells in the upper half of the
/// padded range keep their index, cells in the lower half wrap to negative
/// indices above the logical volume.
pub fn cyclic_depth_index(k: usize, nz: usize, nzp: usize) -> i32 {
    if k < (nz + nzp) / 2 {
        k as i32
    } else {
        k as i32 - nzp as i32
    }
}

/// Find the smallest n >= size that factors into the primes 2, 3, 5 and 7.
///
/// Transform lengths with only small prime factors give N*log(N)
/// performance; padded extents are chosen with this.
pub fn closest_factorable(size: usize) -> usize {
    let mut n = size.max(1);
    loop {
        let mut m = n;
        while m % 2 == 0 {
            m /= 2;
        }
        while m % 3 == 0 {
            m /= 3;
        }
        while m % 5 == 0 {
            m /= 5;
        }
        while m % 7 == 0 {
            m /= 7;
        }
        if m == 1 {
            return n;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::missing::is_missing;

    #[test]
    fn test_fill_index_series() {
        let expect_5_8 = [0, 1, 2, 3, 4, 4, 1, 0];
        let expect_4_8 = [0, 1, 2, 3, 3, 2, 1, 0];
        let expect_3_8 = [0, 1, 2, 2, 1, 1, 1, 0];
        for i in 0..8 {
            assert_eq!(fill_index(i, 5, 8), expect_5_8[i]);
            assert_eq!(fill_index(i, 4, 8), expect_4_8[i]);
            assert_eq!(fill_index(i, 3, 8), expect_3_8[i]);
        }
    }

    #[test]
    fn test_fill_index_out_of_range() {
        assert_eq!(fill_index(8, 5, 8), MISSING_INDEX);
        assert_eq!(fill_index(9, 5, 8), MISSING_INDEX);
    }

    #[test]
    fn test_fill_index_padding_symmetry() {
        // The first padding cell past the end and the last padding cell
        // before the wrap mirror opposite logical boundaries.
        let n = 6;
        let np = 12;
        for k in 0..(np - n) / 2 {
            let from_end = fill_index(n + k, n, np);
            let from_start = fill_index(np - 1 - k, n, np);
            assert!(from_end >= (n / 2) as i32);
            assert!(from_start <= (n / 2) as i32);
        }
    }

    #[test]
    fn test_distance_zero_inside() {
        for i in 0..6 {
            assert_eq!(distance_to_boundary(i, 6, 10), 0.0);
        }
    }

    #[test]
    fn test_distance_monotone_in_skirt() {
        // Moving from the logical end into the padding, the distance grows
        // until the midpoint of the skirt.
        let n = 6;
        let np = 16;
        let mut prev = 0.0;
        for i in n..n + (np - n) / 2 {
            let d = distance_to_boundary(i, n, np);
            assert!(d > prev, "distance must increase, got {} after {}", d, prev);
            prev = d;
        }
        // First skirt cell is within the taper, deep padding is beyond it.
        assert!(distance_to_boundary(n, n, np) <= 1.0);
        assert!(distance_to_boundary(n + 4, n, np) > 1.0);
    }

    #[test]
    fn test_distance_out_of_range() {
        assert!(is_missing(distance_to_boundary(10, 6, 10)));
    }

    #[test]
    fn test_taper_weight_edges() {
        assert_eq!(taper_weight(0.0, 0.0, 0.0), 1.0);
        assert_eq!(taper_weight(1.0, 0.0, 0.0), 0.0);
        assert_eq!(taper_weight(1.0, 1.0, 1.0), 0.0);
        let w = taper_weight(0.5, 0.0, 0.0);
        assert!(w > 0.0 && w < 1.0);
    }

    #[test]
    fn test_cyclic_depth_index() {
        let nz = 5;
        let nzp = 8;
        // (nz + nzp) / 2 = 6: indices 0..6 map to themselves, the rest wrap.
        for k in 0..6 {
            assert_eq!(cyclic_depth_index(k, nz, nzp), k as i32);
        }
        assert_eq!(cyclic_depth_index(6, nz, nzp), -2);
        assert_eq!(cyclic_depth_index(7, nz, nzp), -1);
    }

    #[test]
    fn test_closest_factorable() {
        assert_eq!(closest_factorable(8), 8);
        assert_eq!(closest_factorable(11), 12);
        assert_eq!(closest_factorable(13), 14);
        assert_eq!(closest_factorable(97), 98);
        assert_eq!(closest_factorable(1), 1);
    }
}
