//! Reader for DIPHA binary persistence-diagram files.
//!
//! Layout (all little-endian, 8 bytes per field):
//! `magic`, `file type`, `pair count`, then per pair `dim (i64)`,
//! `birth (f64)`, `death (f64)`. Essential classes of dimension `d` are
//! written with dimension `-d - 1`.

use std::io::Read;
use std::path::Path;

use super::{Diagram, Result, TopologyError};

pub const DIPHA_MAGIC: i64 = 8_067_171_840;
pub const PERSISTENCE_DIAGRAM_TYPE: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiphaPoint {
    pub dim: i64,
    pub birth: f64,
    pub death: f64,
}

fn read_i64(reader: &mut impl Read) -> std::io::Result<i64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_f64(reader: &mut impl Read) -> std::io::Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

/// Parse a DIPHA persistence diagram from any reader.
///
/// `path` is only used in error messages.
pub fn parse_dipha_diagram(reader: &mut impl Read, path: &Path) -> Result<Vec<DiphaPoint>> {
    let io_err = |source| TopologyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let invalid = |message: String| TopologyError::NotADiphaDiagram {
        path: path.to_path_buf(),
        message,
    };

    let magic = read_i64(reader).map_err(io_err)?;
    if magic != DIPHA_MAGIC {
        return Err(invalid(format!("bad magic number {magic}")));
    }
    let file_type = read_i64(reader).map_err(io_err)?;
    if file_type != PERSISTENCE_DIAGRAM_TYPE {
        return Err(invalid(format!("file type {file_type} is not a persistence diagram")));
    }
    let count = read_i64(reader).map_err(io_err)?;
    let count = usize::try_from(count).map_err(|_| invalid(format!("negative pair count {count}")))?;

    let mut points = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let dim = read_i64(reader).map_err(io_err)?;
        let birth = read_f64(reader).map_err(io_err)?;
        let death = read_f64(reader).map_err(io_err)?;
        points.push(DiphaPoint { dim, birth, death });
    }
    Ok(points)
}

pub fn read_dipha_diagram(path: &Path) -> Result<Vec<DiphaPoint>> {
    let file = std::fs::File::open(path).map_err(|source| TopologyError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_dipha_diagram(&mut std::io::BufReader::new(file), path)
}

/// Dimension-0 pairs (finite, then essential) and dimension-1 pairs.
pub fn split_dims(points: &[DiphaPoint]) -> (Diagram, Diagram) {
    let pairs = |dim: i64| {
        points
            .iter()
            .filter(move |p| p.dim == dim)
            .map(|p| (p.birth, p.death))
    };
    let dim_0 = pairs(0).chain(pairs(-1)).collect();
    let dim_1 = pairs(1).collect();
    (dim_0, dim_1)
}
