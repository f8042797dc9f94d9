/// Container layer: an in-memory mirror of a hierarchical data file.
///
/// Architecture:
/// ```text
///   dataset.h5
///        │
///        ▼
///   ┌──────────┐
///   │ hdf5_io   │  read_file / write_file
///   └──────────┘
///        │
///        ▼
///   ┌──────────────┐
///   │    Group      │  named members (Group | Array), string attributes
///   └──────────────┘
///        │
///        ▼
///   Provider / OneFileDataset / generation pipelines
/// ```
///
/// Everything above the backend works on [`Group`] values, so the file format
/// only shows up in `hdf5_io`.
pub mod hdf5_io;
pub mod model;

use thiserror::Error;

pub use hdf5_io::{read_dataset, read_file, write_file};
pub use model::{Array, Group, Node};

/// Errors raised while building, reading or writing a container.
#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("invalid member name {0:?}: names must be non-empty and must not contain '/'")]
    InvalidName(String),

    #[error("'{0}' already exists and is not a group")]
    NotAGroup(String),

    #[error("text at '{path}' contains an interior NUL byte")]
    InvalidText { path: String },

    #[error("unsupported element type at '{path}': {dtype}")]
    UnsupportedType { path: String, dtype: String },

    #[error("HDF5 error at '{path}': {message}")]
    Hdf5 { path: String, message: String },

    #[error("array shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),

    #[error("reading or writing container files requires the `hdf5` feature")]
    BackendDisabled,
}
