use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::container::{self, Array, Group, Node};
use crate::download::download_file_from_google_drive;

use super::{ensure_local_file, DataSetError, Result, SupervisedDataset};

const DATA_KEY: &str = "data";
const TARGET_KEY: &str = "target";
const README_KEY: &str = "readme";
const SENSOR_CONFIGURATIONS_KEY: &str = "sensor_configurations";

// ---------------------------------------------------------------------------
// Dataset configurations
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OneFileDatasetSpec {
    pub name: &'static str,
    pub file_name: &'static str,
    pub google_drive_id: Option<&'static str>,
}

const fn local(name: &'static str, file_name: &'static str) -> OneFileDatasetSpec {
    OneFileDatasetSpec {
        name,
        file_name,
        google_drive_id: None,
    }
}

pub const ANON_1K_EIGENVALUE_PREDICT: OneFileDatasetSpec = local(
    "anon_1k_eigenvalue_predict",
    "anon_1k_eigenvalue_predict_small_pershom_degree_filtration.h5",
);
pub const ANON_10K_EIGENVALUE_PREDICT: OneFileDatasetSpec = local(
    "anon_10k_eigenvalue_predict",
    "anon_10k_eigenvalue_predict_pershom_degree_filtration.h5",
);
pub const ANON_50K_EIGENVALUE_PREDICT: OneFileDatasetSpec = local(
    "anon_50k_eigenvalue_predict",
    "anon_50k_eigenvalue_predict_pershom_degree_filtration.h5",
);
pub const REDDIT_5K_JMLR: OneFileDatasetSpec = local("reddit_5k_jmlr", "reddit_5k_jmlr.h5");
pub const REDDIT_12K_JMLR: OneFileDatasetSpec = local("reddit_12k_jmlr", "reddit_12k_jmlr.h5");
pub const REININGHAUS_2014_SHREC_REAL: OneFileDatasetSpec =
    local("reininghaus_2014_shrec_real", "reininghaus_2014_shrec_real.h5");
pub const REININGHAUS_2014_SHREC_SYNTHETIC: OneFileDatasetSpec =
    local("reininghaus_2014_shrec_synthetic", "reininghaus_2014_shrec_synthetic.h5");
pub const SCINE01_EEG_BOTTOM_TOP_FILTRATION: OneFileDatasetSpec = local(
    "scine01_eeg_bottom_top_filtration",
    "sciNe01_eeg_pershom_bottom_top_filtration.h5",
);
pub const SCINE01_EEG_RAW_SIGNAL: OneFileDatasetSpec = local("scine01_eeg_raw_signal", "sciNe01_eeg_raw_signal.h5");

pub static ONE_FILE_DATASETS: [OneFileDatasetSpec; 9] = [
    ANON_1K_EIGENVALUE_PREDICT,
    ANON_10K_EIGENVALUE_PREDICT,
    ANON_50K_EIGENVALUE_PREDICT,
    REDDIT_5K_JMLR,
    REDDIT_12K_JMLR,
    REININGHAUS_2014_SHREC_REAL,
    REININGHAUS_2014_SHREC_SYNTHETIC,
    SCINE01_EEG_BOTTOM_TOP_FILTRATION,
    SCINE01_EEG_RAW_SIGNAL,
];

impl OneFileDatasetSpec {
    pub fn by_name(name: &str) -> Option<&'static OneFileDatasetSpec> {
        ONE_FILE_DATASETS.iter().find(|s| s.name == name)
    }

    pub fn file_path(&self, root_dir: &Path) -> PathBuf {
        root_dir.join(self.file_name)
    }
}

// ---------------------------------------------------------------------------
// OneFileDataset
// ---------------------------------------------------------------------------

pub type NodeTransform = Box<dyn Fn(Node) -> Node + Send + Sync>;
pub type TargetTransform = Box<dyn Fn(Array) -> Array + Send + Sync>;

/// A file holding `data/<index>` sample groups and a `target` array whose
/// row `i` belongs to `data/<i>`.
pub struct OneFileDataset {
    spec: OneFileDatasetSpec,
    root: Group,
    length: usize,
    data_transforms: Vec<NodeTransform>,
    target_transforms: Vec<TargetTransform>,
}

impl OneFileDataset {
    pub fn open(spec: &OneFileDatasetSpec, root_dir: impl AsRef<Path>) -> Result<Self> {
        Self::open_or_download(spec, root_dir, false)
    }

    /// Open, fetching the file first when it is missing, `download` is set
    /// and the dataset has a Drive id.
    pub fn open_or_download(spec: &OneFileDatasetSpec, root_dir: impl AsRef<Path>, download: bool) -> Result<Self> {
        let path = ensure_local_file(
            root_dir.as_ref(),
            spec.file_name,
            spec.google_drive_id,
            download,
            download_file_from_google_drive,
        )?;
        let root = container::read_file(&path)?;
        Self::from_container(*spec, root)
    }

    pub fn from_container(spec: OneFileDatasetSpec, root: Group) -> Result<Self> {
        let data = root
            .group(DATA_KEY)
            .ok_or_else(|| DataSetError::MissingMember(DATA_KEY.to_string()))?;
        if root.dataset(TARGET_KEY).is_none() {
            return Err(DataSetError::MissingMember(TARGET_KEY.to_string()));
        }
        let length = data.len();

        Ok(OneFileDataset {
            spec,
            root,
            length,
            data_transforms: Vec::new(),
            target_transforms: Vec::new(),
        })
    }

    pub fn with_data_transform(mut self, transform: NodeTransform) -> Self {
        self.data_transforms.push(transform);
        self
    }

    pub fn with_target_transform(mut self, transform: TargetTransform) -> Self {
        self.target_transforms.push(transform);
        self
    }

    pub fn spec(&self) -> &OneFileDatasetSpec {
        &self.spec
    }

    /// The whole file, for members beyond `data` and `target`.
    pub fn root(&self) -> &Group {
        &self.root
    }

    fn data(&self) -> Result<&Group> {
        self.root
            .group(DATA_KEY)
            .ok_or_else(|| DataSetError::MissingMember(DATA_KEY.to_string()))
    }

    pub fn targets(&self) -> Result<&Array> {
        self.root
            .dataset(TARGET_KEY)
            .ok_or_else(|| DataSetError::MissingMember(TARGET_KEY.to_string()))
    }

    /// Free-text description: the root attribute, else the first entry of a
    /// `readme` text dataset.
    pub fn readme(&self) -> Option<String> {
        if let Some(text) = self.root.attr(README_KEY) {
            return Some(text.to_string());
        }
        self.root
            .dataset(README_KEY)
            .and_then(Array::as_text)
            .and_then(|lines| lines.first().map(|s| s.to_string()))
    }

    /// Named sensor subsets of the EEG files (0-based sensor indices).
    pub fn sensor_configurations(&self) -> Result<BTreeMap<String, Vec<i64>>> {
        let grp = self
            .root
            .group(SENSOR_CONFIGURATIONS_KEY)
            .ok_or_else(|| DataSetError::MissingMember(SENSOR_CONFIGURATIONS_KEY.to_string()))?;
        grp.members()
            .map(|(name, node)| {
                node.as_dataset()
                    .and_then(Array::as_i64_vec)
                    .map(|v| (name.to_string(), v))
                    .ok_or_else(|| DataSetError::MissingMember(format!("{SENSOR_CONFIGURATIONS_KEY}/{name}")))
            })
            .collect()
    }
}

impl SupervisedDataset for OneFileDataset {
    type Input = Node;
    type Target = Array;

    fn len(&self) -> usize {
        self.length
    }

    fn get(&self, index: usize) -> Result<(Node, Array)> {
        let out_of_range = || DataSetError::IndexOutOfRange {
            index,
            len: self.length,
        };

        let mut x = self
            .data()?
            .get(&index.to_string())
            .cloned()
            .ok_or_else(out_of_range)?;
        let mut y = self.targets()?.row(index).ok_or_else(out_of_range)?;

        for t in &self.data_transforms {
            x = t(x);
        }
        for t in &self.target_transforms {
            y = t(y);
        }

        Ok((x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_file() -> Group {
        let mut root = Group::new();
        root.set_attr("readme", "'data': access = <id>/<freq>/<barcode dim>");
        let data = root.insert_group("data").unwrap();
        for i in 0..3 {
            data.insert_group(i.to_string())
                .unwrap()
                .insert_dataset("dim_0", Array::from_pairs(&[(0.0, i as f64)]))
                .unwrap();
        }
        root.insert_dataset("target", Array::from_i64(vec![2, 0, 1])).unwrap();
        let cfg = root.insert_group("sensor_configurations").unwrap();
        cfg.insert_dataset("low_resolution_sensorimotor_cortex", Array::from_i64(vec![58, 182]))
            .unwrap();
        root
    }

    #[test]
    fn spec_lookup() {
        assert_eq!(
            OneFileDatasetSpec::by_name("reddit_12k_jmlr").map(|s| s.file_name),
            Some("reddit_12k_jmlr.h5")
        );
        assert!(OneFileDatasetSpec::by_name("animal").is_none());
    }

    #[test]
    fn get_pairs_data_group_with_target_row() {
        let ds = OneFileDataset::from_container(REININGHAUS_2014_SHREC_REAL, sample_file()).unwrap();
        assert_eq!(ds.len(), 3);

        let (x, y) = ds.get(1).unwrap();
        let dgm = x.as_group().unwrap().dataset("dim_0").unwrap();
        assert_eq!(dgm.as_f64_vec().unwrap(), vec![0.0, 1.0]);
        assert_eq!(y.first_i64(), Some(0));

        assert!(matches!(
            ds.get(3),
            Err(DataSetError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn target_transform_applies() {
        let ds = OneFileDataset::from_container(REININGHAUS_2014_SHREC_REAL, sample_file())
            .unwrap()
            .with_target_transform(Box::new(|y: Array| {
                Array::from_i64(vec![y.first_i64().unwrap_or(0) + 10])
            }));
        let targets: Vec<i64> = ds
            .iter()
            .map(|r| r.unwrap().1.first_i64().unwrap())
            .collect();
        assert_eq!(targets, vec![12, 10, 11]);
    }

    #[test]
    fn readme_from_attr_or_dataset() {
        let ds = OneFileDataset::from_container(REDDIT_5K_JMLR, sample_file()).unwrap();
        assert!(ds.readme().unwrap().contains("<freq>"));

        let mut root = Group::new();
        for (name, node) in sample_file().members() {
            root.insert(name, node.clone()).unwrap();
        }
        root.insert_dataset("readme", Array::from_text(["per graph persistence"])).unwrap();
        let ds = OneFileDataset::from_container(REDDIT_5K_JMLR, root).unwrap();
        assert_eq!(ds.readme().as_deref(), Some("per graph persistence"));
    }

    #[test]
    fn sensor_configurations_are_read() {
        let ds = OneFileDataset::from_container(SCINE01_EEG_RAW_SIGNAL, sample_file()).unwrap();
        let cfg = ds.sensor_configurations().unwrap();
        assert_eq!(cfg["low_resolution_sensorimotor_cortex"], vec![58, 182]);
    }

    #[test]
    fn missing_target_is_rejected() {
        let mut root = Group::new();
        root.insert_group("data").unwrap();
        assert!(matches!(
            OneFileDataset::from_container(REDDIT_5K_JMLR, root),
            Err(DataSetError::MissingMember(m)) if m == "target"
        ));
    }
}
