//! Persistence barcode datasets from "Deep Learning with Topological
//! Signatures" (Hofer, Kwitt, Niethammer, Uhl; NIPS 2017).
//!
//! Each dataset is one provider file, fetched from Google Drive on first use.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::container::Array;
use crate::download::{download_file_from_google_drive, DownloadError};
use crate::provider::Provider;

use super::{ensure_local_file, DataSetError, Result, SupervisedDataset};

// ---------------------------------------------------------------------------
// Dataset configurations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NipsDatasetSpec {
    pub name: &'static str,
    pub google_drive_id: &'static str,
    pub file_name: &'static str,
}

pub const ANIMAL: NipsDatasetSpec = NipsDatasetSpec {
    name: "animal",
    google_drive_id: "0BxHF82gaPzgSSWIxNmJBRFJzcmM",
    file_name: "npht_animal_32dirs.h5",
};

pub const MPEG7: NipsDatasetSpec = NipsDatasetSpec {
    name: "mpeg7",
    google_drive_id: "0BxHF82gaPzgSU3lPWDNEVHhNR3M",
    file_name: "npht_mpeg7_32dirs.h5",
};

pub const REDDIT_5K: NipsDatasetSpec = NipsDatasetSpec {
    name: "reddit_5K",
    google_drive_id: "0BxHF82gaPzgSZDdFWDU3S29hdm8",
    file_name: "reddit_5K.h5",
};

pub const REDDIT_12K: NipsDatasetSpec = NipsDatasetSpec {
    name: "reddit_12K",
    google_drive_id: "0BxHF82gaPzgSd0d4WDNYVnN4dEU",
    file_name: "reddit_12K.h5",
};

pub static NIPS_2017_DATASETS: [NipsDatasetSpec; 4] = [ANIMAL, MPEG7, REDDIT_5K, REDDIT_12K];

impl NipsDatasetSpec {
    pub fn by_name(name: &str) -> Option<&'static NipsDatasetSpec> {
        NIPS_2017_DATASETS.iter().find(|s| s.name == name)
    }

    pub fn file_path(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(self.file_name)
    }
}

// ---------------------------------------------------------------------------
// Samples and labels
// ---------------------------------------------------------------------------

/// view name → array of one sample
pub type ViewSample = BTreeMap<String, Array>;

pub type ViewTransform = Box<dyn Fn(ViewSample) -> ViewSample + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    Int(i64),
    Name(String),
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Int(i) => write!(f, "{i}"),
            Label::Name(s) => write!(f, "{s}"),
        }
    }
}

// ---------------------------------------------------------------------------
// NipsDataset
// ---------------------------------------------------------------------------

pub struct NipsDataset {
    spec: NipsDatasetSpec,
    root_dir: PathBuf,
    provider: Provider,
    str_2_int_label: BTreeMap<String, i64>,
    data_transforms: Vec<ViewTransform>,
    /// Report labels as 0-based integers (default) instead of their names.
    pub integer_labels: bool,
}

impl NipsDataset {
    /// Load `spec` from `root_dir`, downloading it first if it is missing
    /// and `download` is set.
    pub fn open(spec: &NipsDatasetSpec, root_dir: impl AsRef<Path>, download: bool) -> Result<Self> {
        Self::open_with(spec, root_dir, download, download_file_from_google_drive)
    }

    /// Like [`NipsDataset::open`] with a custom fetch function.
    pub fn open_with<F>(spec: &NipsDatasetSpec, root_dir: impl AsRef<Path>, download: bool, fetch: F) -> Result<Self>
    where
        F: FnOnce(&str, &Path) -> std::result::Result<u64, DownloadError>,
    {
        let root_dir = root_dir.as_ref();
        let path = ensure_local_file(root_dir, spec.file_name, Some(spec.google_drive_id), download, fetch)?;
        let provider = Provider::read_from_h5(&path)?;
        Ok(Self::from_provider(*spec, root_dir, provider))
    }

    /// Wrap an already loaded provider.
    pub fn from_provider(spec: NipsDatasetSpec, root_dir: impl Into<PathBuf>, provider: Provider) -> Self {
        let str_2_int_label = provider
            .labels()
            .into_iter()
            .enumerate()
            .map(|(i, label)| (label.to_string(), i as i64))
            .collect();

        NipsDataset {
            spec,
            root_dir: root_dir.into(),
            provider,
            str_2_int_label,
            data_transforms: Vec::new(),
            integer_labels: true,
        }
    }

    pub fn with_transform(mut self, transform: ViewTransform) -> Self {
        self.data_transforms.push(transform);
        self
    }

    pub fn spec(&self) -> &NipsDatasetSpec {
        &self.spec
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    pub fn str_2_int_label(&self) -> &BTreeMap<String, i64> {
        &self.str_2_int_label
    }

    /// Targets of all samples, in index order.
    pub fn labels(&self) -> Result<Vec<Label>> {
        self.provider
            .sample_labels()
            .map(|label| self.label(label))
            .collect()
    }

    fn label(&self, name: &str) -> Result<Label> {
        if !self.integer_labels {
            return Ok(Label::Name(name.to_string()));
        }
        self.str_2_int_label
            .get(name)
            .map(|&i| Label::Int(i))
            .ok_or_else(|| DataSetError::MissingMember(name.to_string()))
    }
}

impl SupervisedDataset for NipsDataset {
    type Input = ViewSample;
    type Target = Label;

    fn len(&self) -> usize {
        self.provider.len()
    }

    fn get(&self, index: usize) -> Result<(ViewSample, Label)> {
        if index >= self.len() {
            return Err(DataSetError::IndexOutOfRange {
                index,
                len: self.len(),
            });
        }
        let (views, label) = self.provider.get(index)?;
        let mut x: ViewSample = views
            .into_iter()
            .map(|(name, array)| (name.to_string(), array.clone()))
            .collect();

        for t in &self.data_transforms {
            x = t(x);
        }

        Ok((x, self.label(label)?))
    }
}
