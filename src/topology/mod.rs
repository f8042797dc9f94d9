//! Persistent homology for the small complexes the pipelines build.
//!
//! Only vertices and edges are supported: graphs filtered by vertex degree
//! and time series filtered by height. Diagrams produced elsewhere (DIPHA
//! output files) are read by [`dipha`].

pub mod dipha;
pub mod graph;
pub mod persistence;
pub mod timeseries;

use std::path::PathBuf;

use thiserror::Error;

pub use graph::{degree_filtration, read_graph_from_metis_file, Graph};
pub use persistence::toplex_persistence_diagrams;
pub use timeseries::{height_filtration_from_bottom, height_filtration_from_top, pershom_of_timeseries, z_normalize};

/// (birth, death) pairs; death is `f64::INFINITY` for essential classes.
pub type Diagram = Vec<(f64, f64)>;

/// A simplex as a list of vertex ids.
pub type Simplex = Vec<usize>;

#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("got {toplices} toplices but {values} filtration values")]
    LengthMismatch { toplices: usize, values: usize },

    #[error("toplex {0:?} is empty or has more than two vertices; only vertices and edges are supported")]
    UnsupportedDimension(Simplex),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed graph file {path}: {message}")]
    MalformedGraph { path: PathBuf, message: String },

    #[error("{path} is not a DIPHA persistence diagram: {message}")]
    NotADiphaDiagram { path: PathBuf, message: String },
}

pub type Result<T> = std::result::Result<T, TopologyError>;
