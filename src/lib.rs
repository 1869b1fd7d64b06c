//! seisgrid: padded dual-domain FFT grids for seismic inversion
//!
//! This crate provides the grid core of a Bayesian seismic inversion: 3D
//! volumes that live in a padded box sized for fast transforms and switch
//! in place between their spatial and spectral representations.
//!
//! # Modules
//! - `grid`: the padded dual-domain grid, its access protocol, arithmetic
//!   and fills
//! - `fft`: 3D and 1D real-to-complex transforms using rustfft
//! - `boundary`: padding index mapping, boundary taper, transform sizes
//! - `resample`: taking recorded traces and gridded volumes into the grid
//! - `geometry`: survey geometry and data-source traits
//! - `tracker`: live-grid and memory accounting
//! - `io`: the binary grid exchange format
//! - `missing`: the MISSING sentinel

// Core modules
pub mod boundary;
pub mod fft;
pub mod grid;
pub mod missing;

// Resampling
pub mod geometry;
pub mod resample;

// Bookkeeping and I/O
pub mod io;
pub mod tracker;

pub use grid::{AccessMode, GridKind, GridStats, SpectralGrid};
pub use missing::{is_missing, MISSING, MISSING_INDEX};
pub use tracker::{BudgetHandle, GridBudget};
