//! The `Provider`: a multi-view labelled sample collection and its file form.
//!
//! A provider holds several *views* of the same samples. Each view maps a
//! label to a group of samples, and each sample id to one array:
//!
//! ```text
//! data_views/<view>/<label>/<sample_id>   array
//! str_2_int_label_map/<label>             [int]
//! meta_data/<key>                         array
//! ```
//!
//! All views must agree on the label set and, per label, on the sample ids.
//! This is checked before anything is written.

use std::cell::OnceCell;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use log::info;
use thiserror::Error;

use crate::container::{self, Array, ContainerError, Group, Node};

const DATA_VIEWS_KEY: &str = "data_views";
const LABEL_MAP_KEY: &str = "str_2_int_label_map";
const META_DATA_KEY: &str = "meta_data";

/// label → sample id → array
pub type View = BTreeMap<String, BTreeMap<String, Array>>;

/// Every failure a provider can report.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider must have at least one view")]
    NoViews,

    #[error("view '{0}' already exists")]
    DuplicateView(String),

    #[error("unknown view '{0}'")]
    UnknownView(String),

    #[error("not all views have the same amount of label groups")]
    LabelCountMismatch,

    #[error("not all views have the same labels in their label groups")]
    LabelSetMismatch,

    #[error("not the same sample ids in each view for label '{label}'")]
    SampleIdMismatch { label: String },

    #[error("sample id '{sample_id}' appears under more than one label")]
    AmbiguousSampleId { sample_id: String },

    #[error("the string-to-int label map does not have the same labels as the data views")]
    LabelMapMismatch,

    #[error("index {index} out of range for provider of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("malformed provider file: {0}")]
    Malformed(String),

    #[error(transparent)]
    Container(#[from] ContainerError),
}

pub type Result<T> = std::result::Result<T, ProviderError>;

#[derive(Debug, Clone, Default)]
pub struct Provider {
    data_views: BTreeMap<String, View>,
    str_2_int_label_map: Option<BTreeMap<String, i64>>,
    meta_data: BTreeMap<String, Array>,
    sample_ids: OnceCell<Vec<String>>,
    sample_id_to_label: OnceCell<BTreeMap<String, String>>,
}

impl Provider {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Building
    // -----------------------------------------------------------------------

    pub fn add_view(&mut self, name: impl Into<String>, view: View) -> Result<()> {
        let name = name.into();
        if self.data_views.contains_key(&name) {
            return Err(ProviderError::DuplicateView(name));
        }
        self.data_views.insert(name, view);
        self.invalidate_cache();
        Ok(())
    }

    pub fn add_str_2_int_label_map(&mut self, label_map: BTreeMap<String, i64>) {
        self.str_2_int_label_map = Some(label_map);
    }

    pub fn add_meta_data(&mut self, meta_data: BTreeMap<String, Array>) {
        self.meta_data = meta_data;
    }

    fn invalidate_cache(&mut self) {
        self.sample_ids = OnceCell::new();
        self.sample_id_to_label = OnceCell::new();
    }

    // -----------------------------------------------------------------------
    // Consistency checks
    // -----------------------------------------------------------------------

    fn check_views_are_consistent(&self) -> Result<()> {
        let Some(first_view) = self.data_views.values().next() else {
            return Ok(());
        };

        if self.data_views.values().any(|v| v.len() != first_view.len()) {
            return Err(ProviderError::LabelCountMismatch);
        }

        let labels: BTreeSet<&String> = first_view.keys().collect();
        if self
            .data_views
            .values()
            .any(|v| v.keys().collect::<BTreeSet<_>>() != labels)
        {
            return Err(ProviderError::LabelSetMismatch);
        }

        for (label, samples) in first_view {
            let ids: BTreeSet<&String> = samples.keys().collect();
            let consistent = self
                .data_views
                .values()
                .all(|v| v[label].keys().collect::<BTreeSet<_>>() == ids);
            if !consistent {
                return Err(ProviderError::SampleIdMismatch {
                    label: label.clone(),
                });
            }
        }

        let mut seen = BTreeSet::new();
        for samples in first_view.values() {
            for sample_id in samples.keys() {
                if !seen.insert(sample_id) {
                    return Err(ProviderError::AmbiguousSampleId {
                        sample_id: sample_id.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Assumes the views were already found consistent.
    fn check_str_2_int_label_map(&self, label_map: &BTreeMap<String, i64>) -> Result<()> {
        let labels: BTreeSet<&String> = self.first_view()?.keys().collect();
        if label_map.keys().collect::<BTreeSet<_>>() != labels {
            return Err(ProviderError::LabelMapMismatch);
        }
        Ok(())
    }

    /// Run every check `dump_as_h5` runs, without writing anything.
    pub fn check_state_for_serialization(&self) -> Result<()> {
        if self.data_views.is_empty() {
            return Err(ProviderError::NoViews);
        }
        self.check_views_are_consistent()?;
        if let Some(label_map) = &self.str_2_int_label_map {
            self.check_str_2_int_label_map(label_map)?;
        }
        Ok(())
    }

    fn prepare_state_for_serialization(&mut self) -> Result<()> {
        self.check_state_for_serialization()?;

        if self.str_2_int_label_map.is_none() {
            let generated = self
                .first_view()?
                .keys()
                .enumerate()
                .map(|(i, label)| (label.clone(), i as i64 + 1))
                .collect();
            self.str_2_int_label_map = Some(generated);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------------

    /// Check, fill in a default label map if none was given, and build the tree form.
    pub fn to_container(&mut self) -> Result<Group> {
        self.prepare_state_for_serialization()?;

        let mut root = Group::new();

        let views_grp = root.insert_group(DATA_VIEWS_KEY)?;
        for (view_name, view) in &self.data_views {
            let view_grp = views_grp.insert_group(view_name.as_str())?;
            for (label, samples) in view {
                let label_grp = view_grp.insert_group(label.as_str())?;
                for (sample_id, values) in samples {
                    label_grp.insert_dataset(sample_id.as_str(), values.clone())?;
                }
            }
        }

        // Label ids are stored as 1-element arrays rather than scalars; some
        // readers of these files cannot handle scalar datasets.
        let label_map_grp = root.insert_group(LABEL_MAP_KEY)?;
        for (label, id) in self.str_2_int_label_map.iter().flatten() {
            label_map_grp.insert_dataset(label.as_str(), Array::from_i64(vec![*id]))?;
        }

        let meta_grp = root.insert_group(META_DATA_KEY)?;
        for (key, value) in &self.meta_data {
            meta_grp.insert_dataset(key.as_str(), value.clone())?;
        }

        Ok(root)
    }

    pub fn from_container(root: &Group) -> Result<Self> {
        let views_grp = root
            .group(DATA_VIEWS_KEY)
            .ok_or_else(|| ProviderError::Malformed(format!("missing '{DATA_VIEWS_KEY}' group")))?;

        let mut provider = Provider::new();

        for (view_name, view_node) in views_grp.members() {
            let view_grp = expect_group(view_node, view_name)?;
            let mut view = View::new();
            for (label, label_node) in view_grp.members() {
                let label_grp = expect_group(label_node, label)?;
                let mut samples = BTreeMap::new();
                for (sample_id, sample_node) in label_grp.members() {
                    let array = sample_node.as_dataset().ok_or_else(|| {
                        ProviderError::Malformed(format!(
                            "'{view_name}/{label}/{sample_id}' is not a dataset"
                        ))
                    })?;
                    samples.insert(sample_id.to_string(), array.clone());
                }
                view.insert(label.to_string(), samples);
            }
            provider.data_views.insert(view_name.to_string(), view);
        }

        if let Some(label_map_grp) = root.group(LABEL_MAP_KEY) {
            let mut label_map = BTreeMap::new();
            for (label, node) in label_map_grp.members() {
                let id = node.as_dataset().and_then(Array::first_i64).ok_or_else(|| {
                    ProviderError::Malformed(format!("label id for '{label}' is not an integer"))
                })?;
                label_map.insert(label.to_string(), id);
            }
            provider.str_2_int_label_map = Some(label_map);
        }

        if let Some(meta_grp) = root.group(META_DATA_KEY) {
            for (key, node) in meta_grp.members() {
                if let Some(array) = node.as_dataset() {
                    provider.meta_data.insert(key.to_string(), array.clone());
                }
            }
        }

        Ok(provider)
    }

    pub fn dump_as_h5(&mut self, path: &Path) -> Result<()> {
        let root = self.to_container()?;
        container::write_file(path, &root)?;
        info!(
            "wrote provider with {} views and {} samples to {}",
            self.data_views.len(),
            self.len(),
            path.display()
        );
        Ok(())
    }

    pub fn read_from_h5(path: &Path) -> Result<Self> {
        let root = container::read_file(path)?;
        Self::from_container(&root)
    }

    /// A provider restricted to `views`, sharing label map and meta data.
    pub fn select_views(&self, views: &[&str]) -> Result<Provider> {
        let mut data_views = BTreeMap::new();
        for &view in views {
            let data = self
                .data_views
                .get(view)
                .ok_or_else(|| ProviderError::UnknownView(view.to_string()))?;
            data_views.insert(view.to_string(), data.clone());
        }

        Ok(Provider {
            data_views,
            str_2_int_label_map: self.str_2_int_label_map.clone(),
            meta_data: self.meta_data.clone(),
            ..Provider::default()
        })
    }

    // -----------------------------------------------------------------------
    // Access
    // -----------------------------------------------------------------------

    fn first_view(&self) -> Result<&View> {
        self.data_views.values().next().ok_or(ProviderError::NoViews)
    }

    pub fn view_names(&self) -> Vec<&str> {
        self.data_views.keys().map(String::as_str).collect()
    }

    pub fn view(&self, name: &str) -> Option<&View> {
        self.data_views.get(name)
    }

    /// Labels of the first view; empty when there are no views.
    pub fn labels(&self) -> Vec<&str> {
        self.first_view()
            .map(|v| v.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn str_2_int_label_map(&self) -> Option<&BTreeMap<String, i64>> {
        self.str_2_int_label_map.as_ref()
    }

    pub fn meta_data(&self) -> &BTreeMap<String, Array> {
        &self.meta_data
    }

    /// Sample ids of the first view, label group after label group.
    pub fn sample_ids(&self) -> &[String] {
        self.sample_ids.get_or_init(|| {
            self.first_view()
                .map(|view| view.values().flat_map(|samples| samples.keys().cloned()).collect())
                .unwrap_or_default()
        })
    }

    pub fn sample_id_to_label_map(&self) -> &BTreeMap<String, String> {
        self.sample_id_to_label.get_or_init(|| {
            let mut map = BTreeMap::new();
            if let Ok(view) = self.first_view() {
                for (label, samples) in view {
                    for sample_id in samples.keys() {
                        map.insert(sample_id.clone(), label.clone());
                    }
                }
            }
            map
        })
    }

    pub fn len(&self) -> usize {
        self.sample_ids().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The sample at `index` in every view, plus its label.
    pub fn get(&self, index: usize) -> Result<(BTreeMap<&str, &Array>, &str)> {
        let sample_id = self
            .sample_ids()
            .get(index)
            .ok_or(ProviderError::IndexOutOfRange {
                index,
                len: self.len(),
            })?;
        let label = self
            .sample_id_to_label_map()
            .get(sample_id)
            .ok_or_else(|| ProviderError::Malformed(format!("sample '{sample_id}' has no label")))?;

        let mut x = BTreeMap::new();
        for (view_name, view) in &self.data_views {
            let array = view
                .get(label)
                .and_then(|samples| samples.get(sample_id))
                .ok_or_else(|| {
                    ProviderError::Malformed(format!(
                        "view '{view_name}' has no sample '{sample_id}' under '{label}'"
                    ))
                })?;
            x.insert(view_name.as_str(), array);
        }

        Ok((x, label.as_str()))
    }

    pub fn sample_labels(&self) -> impl Iterator<Item = &str> + '_ {
        let map = self.sample_id_to_label_map();
        self.sample_ids()
            .iter()
            .filter_map(move |id| map.get(id).map(String::as_str))
    }
}

fn expect_group<'a>(node: &'a Node, name: &str) -> Result<&'a Group> {
    node.as_group()
        .ok_or_else(|| ProviderError::Malformed(format!("'{name}' is not a group")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(entries: &[(&str, &[&str])], offset: f64) -> View {
        entries
            .iter()
            .map(|(label, ids)| {
                let samples = ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| (id.to_string(), Array::from_f64(vec![offset + i as f64])))
                    .collect();
                (label.to_string(), samples)
            })
            .collect()
    }

    fn two_view_provider() -> Provider {
        let mut p = Provider::new();
        p.add_view("dir_0", view(&[("bird", &["b1", "b2"]), ("cat", &["c1"])], 0.0))
            .unwrap();
        p.add_view("dir_1", view(&[("bird", &["b1", "b2"]), ("cat", &["c1"])], 10.0))
            .unwrap();
        p
    }

    #[test]
    fn duplicate_view_is_rejected() {
        let mut p = two_view_provider();
        let err = p.add_view("dir_0", View::new()).unwrap_err();
        assert!(matches!(err, ProviderError::DuplicateView(name) if name == "dir_0"));
    }

    #[test]
    fn empty_provider_cannot_be_serialized() {
        let mut p = Provider::new();
        assert!(matches!(p.to_container(), Err(ProviderError::NoViews)));
    }

    #[test]
    fn label_count_mismatch() {
        let mut p = two_view_provider();
        p.add_view("dir_2", view(&[("bird", &["b1", "b2"])], 0.0)).unwrap();
        assert!(matches!(
            p.check_state_for_serialization(),
            Err(ProviderError::LabelCountMismatch)
        ));
    }

    #[test]
    fn label_set_mismatch() {
        let mut p = two_view_provider();
        p.add_view("dir_2", view(&[("bird", &["b1", "b2"]), ("dog", &["c1"])], 0.0))
            .unwrap();
        assert!(matches!(
            p.check_state_for_serialization(),
            Err(ProviderError::LabelSetMismatch)
        ));
    }

    #[test]
    fn sample_id_mismatch_names_the_label() {
        let mut p = two_view_provider();
        p.add_view("dir_2", view(&[("bird", &["b1", "b3"]), ("cat", &["c1"])], 0.0))
            .unwrap();
        match p.check_state_for_serialization() {
            Err(ProviderError::SampleIdMismatch { label }) => assert_eq!(label, "bird"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn sample_id_under_two_labels_is_ambiguous() {
        let mut p = Provider::new();
        p.add_view("v", view(&[("bird", &["x"]), ("cat", &["x"])], 0.0)).unwrap();
        assert!(matches!(
            p.check_state_for_serialization(),
            Err(ProviderError::AmbiguousSampleId { .. })
        ));
    }

    #[test]
    fn label_map_must_match_labels() {
        let mut p = two_view_provider();
        p.add_str_2_int_label_map(BTreeMap::from([("bird".to_string(), 1)]));
        assert!(matches!(
            p.check_state_for_serialization(),
            Err(ProviderError::LabelMapMismatch)
        ));
    }

    #[test]
    fn default_label_map_is_one_based() {
        let mut p = two_view_provider();
        p.to_container().unwrap();
        let map = p.str_2_int_label_map().unwrap();
        assert_eq!(map["bird"], 1);
        assert_eq!(map["cat"], 2);
    }

    #[test]
    fn container_round_trip() {
        let mut p = two_view_provider();
        p.add_meta_data(BTreeMap::from([(
            "source".to_string(),
            Array::from_text(["npht"]),
        )]));
        let root = p.to_container().unwrap();

        let label_id = root.get_path("str_2_int_label_map/cat").unwrap();
        assert_eq!(label_id.as_dataset().unwrap().shape(), vec![1]);

        let back = Provider::from_container(&root).unwrap();
        assert_eq!(back.view_names(), vec!["dir_0", "dir_1"]);
        assert_eq!(back.labels(), vec!["bird", "cat"]);
        assert_eq!(back.str_2_int_label_map(), p.str_2_int_label_map());
        assert_eq!(back.meta_data(), p.meta_data());
        assert_eq!(back.view("dir_1"), p.view("dir_1"));
    }

    #[test]
    fn indexing_walks_labels_in_order() {
        let p = two_view_provider();
        assert_eq!(p.len(), 3);
        assert_eq!(p.sample_ids(), &["b1", "b2", "c1"]);

        let (x, label) = p.get(2).unwrap();
        assert_eq!(label, "cat");
        assert_eq!(x["dir_0"].as_f64_vec().unwrap(), vec![0.0]);
        assert_eq!(x["dir_1"].as_f64_vec().unwrap(), vec![10.0]);

        let labels: Vec<&str> = p.sample_labels().collect();
        assert_eq!(labels, vec!["bird", "bird", "cat"]);

        assert!(matches!(
            p.get(3),
            Err(ProviderError::IndexOutOfRange { index: 3, len: 3 })
        ));
    }

    #[test]
    fn select_views_keeps_label_map() {
        let mut p = two_view_provider();
        p.to_container().unwrap();
        let sub = p.select_views(&["dir_1"]).unwrap();
        assert_eq!(sub.view_names(), vec!["dir_1"]);
        assert_eq!(sub.str_2_int_label_map(), p.str_2_int_label_map());
        assert!(matches!(
            p.select_views(&["missing"]),
            Err(ProviderError::UnknownView(_))
        ));
    }

    #[test]
    fn missing_data_views_group_is_malformed() {
        assert!(matches!(
            Provider::from_container(&Group::new()),
            Err(ProviderError::Malformed(_))
        ));
    }
}
