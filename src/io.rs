//! Binary grid files
//!
//! The internal exchange format for padded grids: a tag line, the survey
//! geometry, the padded dimensions and the raw storage buffer, all
//! big-endian. Grids written this way round-trip exactly, padding and slack
//! slots included, so intermediate results can be handed between runs
//! without resampling.

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use thiserror::Error;
use tracing::info;

use crate::grid::SpectralGrid;

/// Tag line opening every binary grid file.
pub const GRID_FILE_TAG: &str = "seisgrid_binary";

/// Survey geometry stored in a grid file header. The reader returns it
/// as found; it is not validated against the grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SurveyGeometry {
    pub x0: f64,
    pub y0: f64,
    pub dx: f64,
    pub dy: f64,
    pub nx: i32,
    pub ny: i32,
    pub il0: f64,
    pub xl0: f64,
    pub il_step_x: f64,
    pub il_step_y: f64,
    pub xl_step_x: f64,
    pub xl_step_y: f64,
    pub angle: f64,
}

/// Errors from reading or writing binary grid files.
#[derive(Debug, Error)]
pub enum GridIoError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("not a binary grid file (tag line was {found:?})")]
    BadTag { found: String },
    #[error(
        "grid on file has dimensions {found_rnxp} x {found_nyp} x {found_nzp} \
         (rnxp x nyp x nzp) but the model grid expects \
         {expected_rnxp} x {expected_nyp} x {expected_nzp}; check the padding settings"
    )]
    DimensionMismatch {
        expected_rnxp: usize,
        expected_nyp: usize,
        expected_nzp: usize,
        found_rnxp: i32,
        found_nyp: i32,
        found_nzp: i32,
    },
}

/// Write a spatial grid with its survey geometry.
pub fn write_grid<W: Write>(
    writer: &mut W,
    grid: &SpectralGrid,
    geometry: &SurveyGeometry,
) -> Result<(), GridIoError> {
    assert!(
        !grid.is_transformed(),
        "binary grid files hold the spatial representation"
    );
    writer.write_all(GRID_FILE_TAG.as_bytes())?;
    writer.write_all(b"\n")?;

    writer.write_f64::<BigEndian>(geometry.x0)?;
    writer.write_f64::<BigEndian>(geometry.y0)?;
    writer.write_f64::<BigEndian>(geometry.dx)?;
    writer.write_f64::<BigEndian>(geometry.dy)?;
    writer.write_i32::<BigEndian>(geometry.nx)?;
    writer.write_i32::<BigEndian>(geometry.ny)?;
    writer.write_f64::<BigEndian>(geometry.il0)?;
    writer.write_f64::<BigEndian>(geometry.xl0)?;
    writer.write_f64::<BigEndian>(geometry.il_step_x)?;
    writer.write_f64::<BigEndian>(geometry.il_step_y)?;
    writer.write_f64::<BigEndian>(geometry.xl_step_x)?;
    writer.write_f64::<BigEndian>(geometry.xl_step_y)?;
    writer.write_f64::<BigEndian>(geometry.angle)?;

    writer.write_i32::<BigEndian>(grid.rnxp() as i32)?;
    writer.write_i32::<BigEndian>(grid.nyp() as i32)?;
    writer.write_i32::<BigEndian>(grid.nzp() as i32)?;
    for &value in grid.raw_values() {
        writer.write_f32::<BigEndian>(value)?;
    }
    Ok(())
}

/// Read a grid file into `grid`, which must have matching padded
/// dimensions. Returns the survey geometry from the header.
pub fn read_grid<R: BufRead>(
    reader: &mut R,
    grid: &mut SpectralGrid,
) -> Result<SurveyGeometry, GridIoError> {
    let mut tag = Vec::new();
    reader.read_until(b'\n', &mut tag)?;
    if tag.last() == Some(&b'\n') {
        tag.pop();
    }
    if tag != GRID_FILE_TAG.as_bytes() {
        return Err(GridIoError::BadTag {
            found: String::from_utf8_lossy(&tag).into_owned(),
        });
    }

    let geometry = SurveyGeometry {
        x0: reader.read_f64::<BigEndian>()?,
        y0: reader.read_f64::<BigEndian>()?,
        dx: reader.read_f64::<BigEndian>()?,
        dy: reader.read_f64::<BigEndian>()?,
        nx: reader.read_i32::<BigEndian>()?,
        ny: reader.read_i32::<BigEndian>()?,
        il0: reader.read_f64::<BigEndian>()?,
        xl0: reader.read_f64::<BigEndian>()?,
        il_step_x: reader.read_f64::<BigEndian>()?,
        il_step_y: reader.read_f64::<BigEndian>()?,
        xl_step_x: reader.read_f64::<BigEndian>()?,
        xl_step_y: reader.read_f64::<BigEndian>()?,
        angle: reader.read_f64::<BigEndian>()?,
    };

    let rnxp = reader.read_i32::<BigEndian>()?;
    let nyp = reader.read_i32::<BigEndian>()?;
    let nzp = reader.read_i32::<BigEndian>()?;
    if rnxp != grid.rnxp() as i32 || nyp != grid.nyp() as i32 || nzp != grid.nzp() as i32 {
        return Err(GridIoError::DimensionMismatch {
            expected_rnxp: grid.rnxp(),
            expected_nyp: grid.nyp(),
            expected_nzp: grid.nzp(),
            found_rnxp: rnxp,
            found_nyp: nyp,
            found_nzp: nzp,
        });
    }

    grid.create_real_grid();
    for value in grid.raw_values_mut() {
        *value = reader.read_f32::<BigEndian>()?;
    }
    Ok(geometry)
}

/// Write a grid to a file at `path`.
pub fn write_grid_file<P: AsRef<Path>>(
    path: P,
    grid: &SpectralGrid,
    geometry: &SurveyGeometry,
) -> Result<(), GridIoError> {
    info!(path = %path.as_ref().display(), "writing binary grid file");
    let mut writer = BufWriter::new(File::create(path)?);
    write_grid(&mut writer, grid, geometry)?;
    writer.flush()?;
    Ok(())
}

/// Read a grid from a file at `path` into `grid`.
pub fn read_grid_file<P: AsRef<Path>>(
    path: P,
    grid: &mut SpectralGrid,
) -> Result<SurveyGeometry, GridIoError> {
    info!(path = %path.as_ref().display(), "reading binary grid file");
    let mut reader = BufReader::new(File::open(path)?);
    read_grid(&mut reader, grid)
}
