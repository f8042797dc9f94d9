//! Loaders and preprocessing pipelines for topological data analysis datasets.
//!
//! * [`datasets`] – read generated files as indexed (input, target) pairs.
//! * [`provider`] – the multi-view `data_views/<view>/<label>/<sample>` layout.
//! * [`generation`] – turn raw graphs, shape diagrams and EEG recordings into
//!   one-file datasets.
//! * [`topology`] – the small persistence computations those pipelines need.
//! * [`download`] – fetch pre-generated files from Google Drive.

pub mod config;
pub mod container;
pub mod datasets;
pub mod download;
pub mod generation;
pub mod provider;
pub mod topology;

pub use config::Config;
pub use container::{Array, Group, Node};
pub use datasets::{NipsDataset, OneFileDataset, SupervisedDataset};
pub use provider::Provider;
