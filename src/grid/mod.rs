//! Padded dual-domain spectral grid
//!
//! [`SpectralGrid`] is the central data structure of the inversion: a 3D
//! volume with a logical region of interest (`nx * ny * nz`) embedded in a
//! padded volume (`nxp * nyp * nzp`) sized for fast transforms and cyclic
//! wrap-around suppression. One contiguous buffer holds either the real
//! (spatial) representation or the complex (spectral) half-spectrum; a
//! domain flag says which view is valid and every accessor asserts it.
//!
//! Access follows a mode protocol: a caller enters read, write, read/write
//! or random access with [`SpectralGrid::set_access_mode`], streams or pokes
//! values, and leaves with [`SpectralGrid::end_access`]. Violating the
//! protocol is a programming error and aborts.

mod fill;
mod ops;

pub use ops::GridStats;

use num_complex::Complex32;
use tracing::debug;

use crate::fft;
use crate::missing::MISSING;
use crate::tracker::BudgetHandle;

/// Physical quantity held by a grid. Governs transform normalization and
/// the fill policy at the padding boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridKind {
    /// Seismic data (angle stacks).
    Data,
    /// Elastic parameters and backgrounds.
    Parameter,
    /// Correlation / covariance volumes.
    Covariance,
}

/// Access-mode protocol state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    None,
    Read,
    Write,
    ReadWrite,
    Random,
}

/// Padded 3D grid with spatial/spectral dual representation.
pub struct SpectralGrid {
    kind: Option<GridKind>,
    nx: usize,
    ny: usize,
    nz: usize,
    nxp: usize,
    nyp: usize,
    nzp: usize,
    cnxp: usize,
    rnxp: usize,
    csize: usize,
    rsize: usize,
    cursor_get: usize,
    cursor_set: usize,
    transformed: bool,
    mode: AccessMode,
    values: Option<Vec<f32>>,
    budget: Option<BudgetHandle>,
}

impl SpectralGrid {
    /// Create a grid with logical extents `(nx, ny, nz)` and padded extents
    /// `(nxp, nyp, nzp)`. Storage is allocated lazily by
    /// [`create_real_grid`](Self::create_real_grid) or
    /// [`create_complex_grid`](Self::create_complex_grid).
    ///
    /// # Panics
    /// If any extent is zero or a padded extent is smaller than its logical
    /// counterpart.
    pub fn new(nx: usize, ny: usize, nz: usize, nxp: usize, nyp: usize, nzp: usize) -> Self {
        assert!(nx >= 1 && ny >= 1 && nz >= 1, "logical extents must be >= 1");
        assert!(
            nxp >= nx && nyp >= ny && nzp >= nz,
            "padded extents must not be smaller than logical extents"
        );
        let cnxp = nxp / 2 + 1;
        let rnxp = 2 * cnxp;
        SpectralGrid {
            kind: None,
            nx,
            ny,
            nz,
            nxp,
            nyp,
            nzp,
            cnxp,
            rnxp,
            csize: cnxp * nyp * nzp,
            rsize: rnxp * nyp * nzp,
            cursor_get: 0,
            cursor_set: 0,
            transformed: false,
            mode: AccessMode::None,
            values: None,
            budget: None,
        }
    }

    /// Attach a shared budget; allocation and release will be reported to it.
    pub fn attach_budget(&mut self, budget: BudgetHandle) {
        self.budget = Some(budget);
    }

    /// Duplicate `source` cell by cell in its current domain. When
    /// `exp_transform` is set and the source is spatial, `exp` is applied to
    /// every copied value (background-model sign convention).
    pub fn duplicate(source: &mut SpectralGrid, exp_transform: bool) -> SpectralGrid {
        let mut grid = SpectralGrid::new(
            source.nx, source.ny, source.nz, source.nxp, source.nyp, source.nzp,
        );
        grid.kind = source.kind;
        grid.budget = source.budget.clone();

        if !source.transformed {
            grid.create_real_grid();
            source.set_access_mode(AccessMode::Read);
            grid.set_access_mode(AccessMode::Write);
            for _ in 0..grid.rsize {
                let value = source.get_next_real();
                if exp_transform {
                    grid.set_next_real(value.exp());
                } else {
                    grid.set_next_real(value);
                }
            }
        } else {
            grid.create_complex_grid();
            source.set_access_mode(AccessMode::Read);
            grid.set_access_mode(AccessMode::Write);
            for _ in 0..grid.csize {
                let value = source.get_next_complex();
                grid.set_next_complex(value);
            }
        }
        source.end_access();
        grid.end_access();
        grid
    }

    pub fn set_kind(&mut self, kind: GridKind) {
        self.kind = Some(kind);
    }

    pub fn kind(&self) -> Option<GridKind> {
        self.kind
    }

    pub fn nx(&self) -> usize {
        self.nx
    }

    pub fn ny(&self) -> usize {
        self.ny
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn nxp(&self) -> usize {
        self.nxp
    }

    pub fn nyp(&self) -> usize {
        self.nyp
    }

    pub fn nzp(&self) -> usize {
        self.nzp
    }

    pub fn cnxp(&self) -> usize {
        self.cnxp
    }

    pub fn rnxp(&self) -> usize {
        self.rnxp
    }

    pub fn csize(&self) -> usize {
        self.csize
    }

    pub fn rsize(&self) -> usize {
        self.rsize
    }

    pub fn is_transformed(&self) -> bool {
        self.transformed
    }

    pub fn is_allocated(&self) -> bool {
        self.values.is_some()
    }

    pub fn cursor_get(&self) -> usize {
        self.cursor_get
    }

    pub fn cursor_set(&self) -> usize {
        self.cursor_set
    }

    /// True if the given extents match this grid's extents exactly.
    pub fn consistent_size(
        &self,
        nx: usize,
        ny: usize,
        nz: usize,
        nxp: usize,
        nyp: usize,
        nzp: usize,
    ) -> bool {
        nx == self.nx
            && ny == self.ny
            && nz == self.nz
            && nxp == self.nxp
            && nyp == self.nyp
            && nzp == self.nzp
    }

    /// Allocate storage holding spatial values.
    pub fn create_real_grid(&mut self) {
        self.transformed = false;
        self.allocate();
    }

    /// Allocate storage holding spectral values.
    pub fn create_complex_grid(&mut self) {
        self.transformed = true;
        self.allocate();
    }

    fn allocate(&mut self) {
        let fresh = self.values.is_none();
        if fresh {
            self.values = Some(vec![0.0; self.rsize]);
        }
        self.cursor_get = 0;
        self.cursor_set = 0;
        if fresh {
            if let Some(budget) = &self.budget {
                budget
                    .borrow_mut()
                    .register(self.rsize * std::mem::size_of::<f32>());
            }
        }
    }

    fn buffer(&self) -> &[f32] {
        self.values
            .as_deref()
            .expect("grid storage has not been allocated")
    }

    fn buffer_mut(&mut self) -> &mut [f32] {
        self.values
            .as_deref_mut()
            .expect("grid storage has not been allocated")
    }

    pub(crate) fn raw_values(&self) -> &[f32] {
        self.buffer()
    }

    pub(crate) fn raw_values_mut(&mut self) -> &mut [f32] {
        self.buffer_mut()
    }

    fn require_spatial(&self) {
        assert!(
            !self.transformed,
            "operation requires the grid in its spatial (real) domain"
        );
    }

    fn require_spectral(&self) {
        assert!(
            self.transformed,
            "operation requires the grid in its spectral (complex) domain"
        );
    }

    // ------------------------------------------------------------------
    // Access-mode protocol
    // ------------------------------------------------------------------

    /// Enter an access mode. Must be balanced by [`end_access`](Self::end_access).
    ///
    /// # Panics
    /// If an access mode is already active, or `mode` is `None`.
    pub fn set_access_mode(&mut self, mode: AccessMode) {
        assert!(mode != AccessMode::None, "cannot enter AccessMode::None");
        assert!(
            self.mode == AccessMode::None,
            "access mode {:?} already active; end_access() was not called",
            self.mode
        );
        self.mode = mode;
    }

    /// Leave the current access mode.
    pub fn end_access(&mut self) {
        self.mode = AccessMode::None;
    }

    fn require_sequential_read(&self) {
        assert!(
            matches!(self.mode, AccessMode::Read | AccessMode::ReadWrite),
            "sequential read requires Read or ReadWrite access, current mode is {:?}",
            self.mode
        );
    }

    fn require_sequential_write(&self) {
        assert!(
            matches!(self.mode, AccessMode::Write | AccessMode::ReadWrite),
            "sequential write requires Write or ReadWrite access, current mode is {:?}",
            self.mode
        );
    }

    fn require_random_write(&self) {
        assert!(
            matches!(
                self.mode,
                AccessMode::Write | AccessMode::ReadWrite | AccessMode::Random
            ),
            "random write requires Write, ReadWrite or Random access, current mode is {:?}",
            self.mode
        );
    }

    // ------------------------------------------------------------------
    // Sequential access
    // ------------------------------------------------------------------

    /// Next spatial value in storage order. On the step that consumes the
    /// last element the cursor wraps to 0 while that last value is
    /// returned; a full pass leaves the cursor where it started. Callers
    /// rely on this convention, keep it.
    pub fn get_next_real(&mut self) -> f32 {
        self.require_spatial();
        self.require_sequential_read();
        assert!(self.cursor_get < self.rsize);
        self.cursor_get += 1;
        if self.cursor_get == self.rsize {
            self.cursor_get = 0;
            self.buffer()[self.rsize - 1]
        } else {
            self.buffer()[self.cursor_get - 1]
        }
    }

    /// Next spectral value in storage order; same wrap convention as
    /// [`get_next_real`](Self::get_next_real).
    pub fn get_next_complex(&mut self) -> Complex32 {
        self.require_spectral();
        self.require_sequential_read();
        assert!(self.cursor_get < self.csize);
        self.cursor_get += 1;
        let c = if self.cursor_get == self.csize {
            self.cursor_get = 0;
            self.csize - 1
        } else {
            self.cursor_get - 1
        };
        let buf = self.buffer();
        Complex32::new(buf[2 * c], buf[2 * c + 1])
    }

    /// Store the next spatial value; cursor convention as for reads.
    pub fn set_next_real(&mut self, value: f32) {
        self.require_spatial();
        self.require_sequential_write();
        assert!(self.cursor_set < self.rsize);
        self.cursor_set += 1;
        let idx = if self.cursor_set == self.rsize {
            self.cursor_set = 0;
            self.rsize - 1
        } else {
            self.cursor_set - 1
        };
        self.buffer_mut()[idx] = value;
    }

    /// Store the next spectral value; cursor convention as for reads.
    pub fn set_next_complex(&mut self, value: Complex32) {
        self.require_spectral();
        self.require_sequential_write();
        assert!(self.cursor_set < self.csize);
        self.cursor_set += 1;
        let c = if self.cursor_set == self.csize {
            self.cursor_set = 0;
            self.csize - 1
        } else {
            self.cursor_set - 1
        };
        let buf = self.buffer_mut();
        buf[2 * c] = value.re;
        buf[2 * c + 1] = value.im;
    }

    // ------------------------------------------------------------------
    // Random access
    // ------------------------------------------------------------------

    fn real_index(&self, i: i32, j: i32, k: i32) -> usize {
        i as usize + self.rnxp * j as usize + k as usize * self.rnxp * self.nyp
    }

    fn complex_index(&self, i: i32, j: i32, k: i32) -> usize {
        i as usize + self.cnxp * j as usize + k as usize * self.cnxp * self.nyp
    }

    /// Spatial value at `(i, j, k)`, or [`MISSING`] if out of range.
    ///
    /// With `extended` false the valid region is the logical volume, with
    /// `extended` true it is the padded volume.
    pub fn get_real_value(&self, i: i32, j: i32, k: i32, extended: bool) -> f32 {
        let in_bounds = if extended {
            i < self.nxp as i32 && j < self.nyp as i32 && k < self.nzp as i32
        } else {
            i < self.nx as i32 && j < self.ny as i32 && k < self.nz as i32
        };
        if in_bounds && i > -1 && j > -1 && k > -1 {
            self.buffer()[self.real_index(i, j, k)]
        } else {
            MISSING
        }
    }

    /// Spatial value with cyclic wrapping of negative indices.
    pub fn get_real_value_cyclic(&self, i: i32, j: i32, k: i32) -> f32 {
        let i = if i < 0 { self.nxp as i32 + i } else { i };
        let j = if j < 0 { self.nyp as i32 + j } else { j };
        let k = if k < 0 { self.nzp as i32 + k } else { k };
        if i < self.nxp as i32 && j < self.nyp as i32 && k < self.nzp as i32 {
            self.buffer()[self.real_index(i, j, k)]
        } else {
            MISSING
        }
    }

    /// Spatial value linearly interpolated between depth cells `floor(k)`
    /// and `floor(k) + 1`. Falls back to the lower cell if the upper one is
    /// missing.
    pub fn get_real_value_interpolated(&self, i: i32, j: i32, kindex: f32, extended: bool) -> f32 {
        let k1 = kindex.floor() as i32;
        let val1 = self.get_real_value(i, j, k1, extended);
        if val1 == MISSING {
            return MISSING;
        }
        let val2 = self.get_real_value(i, j, k1 + 1, extended);
        if val2 == MISSING {
            return val1;
        }
        let t = kindex - k1 as f32;
        (1.0 - t) * val1 + t * val2
    }

    /// Write a spatial value at `(i, j, k)`. Returns false (and writes
    /// nothing) when the index is out of range.
    ///
    /// The extended write region spans the full storage row (`i < rnxp`),
    /// slightly wider than the read region; trace writers use the extra
    /// slack slots.
    pub fn set_real_value(&mut self, i: i32, j: i32, k: i32, value: f32, extended: bool) -> bool {
        self.require_spatial();
        self.require_random_write();
        let in_bounds = if extended {
            i < self.rnxp as i32 && j < self.nyp as i32 && k < self.nzp as i32
        } else {
            i < self.nx as i32 && j < self.ny as i32 && k < self.nz as i32
        };
        if in_bounds && i > -1 && j > -1 && k > -1 {
            let idx = self.real_index(i, j, k);
            self.buffer_mut()[idx] = value;
            true
        } else {
            false
        }
    }

    /// Spectral value at `(i, j, k)`, or a MISSING pair if out of range.
    pub fn get_complex_value(&self, i: i32, j: i32, k: i32, extended: bool) -> Complex32 {
        self.require_spectral();
        let in_bounds = if extended {
            i < self.nxp as i32 && j < self.nyp as i32 && k < self.nzp as i32
        } else {
            i < self.nx as i32 && j < self.ny as i32 && k < self.nz as i32
        };
        if in_bounds && i > -1 && j > -1 && k > -1 {
            let c = self.complex_index(i, j, k);
            let buf = self.buffer();
            Complex32::new(buf[2 * c], buf[2 * c + 1])
        } else {
            Complex32::new(MISSING, MISSING)
        }
    }

    /// Write a spectral value at `(i, j, k)`. Returns false when out of
    /// range.
    pub fn set_complex_value(
        &mut self,
        i: i32,
        j: i32,
        k: i32,
        value: Complex32,
        extended: bool,
    ) -> bool {
        self.require_spectral();
        self.require_random_write();
        let in_bounds = if extended {
            i < self.nxp as i32 && j < self.nyp as i32 && k < self.nzp as i32
        } else {
            i < self.nx as i32 && j < self.ny as i32 && k < self.nz as i32
        };
        if in_bounds && i > -1 && j > -1 && k > -1 {
            let c = self.complex_index(i, j, k);
            let buf = self.buffer_mut();
            buf[2 * c] = value.re;
            buf[2 * c + 1] = value.im;
            true
        } else {
            false
        }
    }

    /// Logical-depth column of spatial values at `(i, j)`.
    pub fn get_real_trace(&self, i: i32, j: i32) -> Vec<f32> {
        (0..self.nz as i32)
            .map(|k| self.get_real_value(i, j, k, false))
            .collect()
    }

    /// Write a logical-depth column; false if any cell was out of range.
    pub fn set_real_trace(&mut self, i: i32, j: i32, values: &[f32]) -> bool {
        for k in 0..self.nz {
            if !self.set_real_value(i, j, k as i32, values[k], false) {
                return false;
            }
        }
        true
    }

    /// Write a padded-depth column at `(i, j)` (extended bounds).
    pub fn set_trace(&mut self, trace: &[f32], i: i32, j: i32) {
        for k in 0..self.nzp {
            self.set_real_value(i, j, k as i32, trace[k], true);
        }
    }

    /// Fill a padded-depth column at `(i, j)` with a constant.
    pub fn set_trace_constant(&mut self, value: f32, i: i32, j: i32) {
        for k in 0..self.nzp {
            self.set_real_value(i, j, k as i32, value, true);
        }
    }

    /// First spectral value (bin (0,0,0)); resets the read cursor.
    pub fn first_complex_value(&mut self) -> Complex32 {
        self.require_spectral();
        self.set_access_mode(AccessMode::Read);
        self.cursor_get = 0;
        let value = self.get_next_complex();
        self.cursor_get = 0;
        self.end_access();
        value
    }

    /// First spatial value in storage order.
    pub fn first_real_value(&self) -> f32 {
        self.require_spatial();
        self.buffer()[0]
    }

    // ------------------------------------------------------------------
    // Domain transforms
    // ------------------------------------------------------------------

    /// Spatial to spectral, in place.
    ///
    /// Data and parameter grids are pre-scaled by `1/sqrt(N)` so spectral
    /// energy equals spatial energy; covariance grids are not, so that the
    /// inverse maps spectral eigenvalues back to a circulant correlation
    /// function.
    ///
    /// # Panics
    /// If the grid is already spectral or its kind is unset.
    pub fn forward_transform(&mut self) {
        self.require_spatial();
        let kind = self.kind.expect("grid kind must be set before transforming");
        let (nxp, nyp, nzp) = (self.nxp, self.nyp, self.nzp);
        let n = (nxp * nyp * nzp) as f32;
        if kind != GridKind::Covariance {
            self.scale(1.0 / n.sqrt());
        }
        fft::forward_3d(self.buffer_mut(), nxp, nyp, nzp);
        self.transformed = true;
        debug!(?kind, "forward transform finished");
    }

    /// Spectral to spatial, in place. Covariance grids are post-scaled by
    /// `1/N`, everything else by `1/sqrt(N)`; see
    /// [`forward_transform`](Self::forward_transform).
    ///
    /// # Panics
    /// If the grid is already spatial or its kind is unset.
    pub fn inverse_transform(&mut self) {
        self.require_spectral();
        let kind = self.kind.expect("grid kind must be set before transforming");
        let (nxp, nyp, nzp) = (self.nxp, self.nyp, self.nzp);
        let n = (nxp * nyp * nzp) as f32;
        let scale = if kind == GridKind::Covariance {
            1.0 / n
        } else {
            1.0 / n.sqrt()
        };
        fft::inverse_3d(self.buffer_mut(), nxp, nyp, nzp);
        self.transformed = false;
        self.scale(scale);
        debug!(?kind, "inverse transform finished");
    }
}

impl Drop for SpectralGrid {
    fn drop(&mut self) {
        if self.values.is_some() {
            if let Some(budget) = &self.budget {
                budget
                    .borrow_mut()
                    .unregister(self.rsize * std::mem::size_of::<f32>());
            }
        }
    }
}
