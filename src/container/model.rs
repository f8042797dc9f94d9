use std::collections::BTreeMap;
use std::fmt;

use ndarray::{Array1, Array2, ArrayD, Axis};

use super::ContainerError;

// ---------------------------------------------------------------------------
// Array – one leaf of the tree
// ---------------------------------------------------------------------------

/// A typed n-dimensional leaf, mirroring the element types the datasets use.
#[derive(Debug, Clone, PartialEq)]
pub enum Array {
    Float64(ArrayD<f64>),
    Float32(ArrayD<f32>),
    Int64(ArrayD<i64>),
    Text(ArrayD<String>),
    /// One variable-length float row per entry (e.g. eigenvalue spectra).
    RaggedFloat64(Vec<Vec<f64>>),
}

impl Array {
    pub fn from_f64(values: Vec<f64>) -> Self {
        Array::Float64(Array1::from(values).into_dyn())
    }

    pub fn from_f32(values: Vec<f32>) -> Self {
        Array::Float32(Array1::from(values).into_dyn())
    }

    pub fn from_i64(values: Vec<i64>) -> Self {
        Array::Int64(Array1::from(values).into_dyn())
    }

    pub fn from_text<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        let values: Vec<String> = values.into_iter().map(Into::into).collect();
        Array::Text(Array1::from(values).into_dyn())
    }

    /// A persistence diagram as an `n × 2` float64 array of (birth, death).
    pub fn from_pairs(pairs: &[(f64, f64)]) -> Self {
        let arr = Array2::from_shape_fn((pairs.len(), 2), |(i, j)| {
            if j == 0 {
                pairs[i].0
            } else {
                pairs[i].1
            }
        });
        Array::Float64(arr.into_dyn())
    }

    /// Same as [`Array::from_pairs`] but stored as float32.
    pub fn from_pairs_f32(pairs: &[(f64, f64)]) -> Self {
        let arr = Array2::from_shape_fn((pairs.len(), 2), |(i, j)| {
            if j == 0 {
                pairs[i].0 as f32
            } else {
                pairs[i].1 as f32
            }
        });
        Array::Float32(arr.into_dyn())
    }

    pub fn shape(&self) -> Vec<usize> {
        match self {
            Array::Float64(a) => a.shape().to_vec(),
            Array::Float32(a) => a.shape().to_vec(),
            Array::Int64(a) => a.shape().to_vec(),
            Array::Text(a) => a.shape().to_vec(),
            Array::RaggedFloat64(rows) => vec![rows.len()],
        }
    }

    /// Extent of the first axis; scalars count as a single entry.
    pub fn len(&self) -> usize {
        self.shape().first().copied().unwrap_or(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype_name(&self) -> &'static str {
        match self {
            Array::Float64(_) => "float64",
            Array::Float32(_) => "float32",
            Array::Int64(_) => "int64",
            Array::Text(_) => "text",
            Array::RaggedFloat64(_) => "vlen float64",
        }
    }

    /// Sub-array at `index` along the first axis.
    ///
    /// Returns `None` for scalars and out-of-range indices.
    pub fn row(&self, index: usize) -> Option<Array> {
        fn take<T: Clone>(a: &ArrayD<T>, index: usize) -> Option<ArrayD<T>> {
            if a.ndim() == 0 || index >= a.shape()[0] {
                return None;
            }
            Some(a.index_axis(Axis(0), index).to_owned())
        }

        match self {
            Array::Float64(a) => take(a, index).map(Array::Float64),
            Array::Float32(a) => take(a, index).map(Array::Float32),
            Array::Int64(a) => take(a, index).map(Array::Int64),
            Array::Text(a) => take(a, index).map(Array::Text),
            Array::RaggedFloat64(rows) => rows.get(index).map(|r| Array::from_f64(r.clone())),
        }
    }

    /// Flattened values widened to `f64`. Text and ragged arrays yield `None`.
    pub fn as_f64_vec(&self) -> Option<Vec<f64>> {
        match self {
            Array::Float64(a) => Some(a.iter().copied().collect()),
            Array::Float32(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::Int64(a) => Some(a.iter().map(|&v| v as f64).collect()),
            Array::Text(_) | Array::RaggedFloat64(_) => None,
        }
    }

    pub fn as_i64_vec(&self) -> Option<Vec<i64>> {
        match self {
            Array::Int64(a) => Some(a.iter().copied().collect()),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<Vec<&str>> {
        match self {
            Array::Text(a) => Some(a.iter().map(String::as_str).collect()),
            _ => None,
        }
    }

    /// First element of an integer array (label maps store ids as 1-element arrays).
    pub fn first_i64(&self) -> Option<i64> {
        match self {
            Array::Int64(a) => a.iter().next().copied(),
            _ => None,
        }
    }
}

impl fmt::Display for Array {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shape: Vec<String> = self.shape().iter().map(|d| d.to_string()).collect();
        write!(f, "{} ({})", self.dtype_name(), shape.join("×"))
    }
}

// ---------------------------------------------------------------------------
// Node / Group – the hierarchy
// ---------------------------------------------------------------------------

/// A member of a group: either a nested group or a leaf array.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Group(Group),
    Dataset(Array),
}

impl Node {
    pub fn as_group(&self) -> Option<&Group> {
        match self {
            Node::Group(g) => Some(g),
            Node::Dataset(_) => None,
        }
    }

    pub fn as_dataset(&self) -> Option<&Array> {
        match self {
            Node::Dataset(a) => Some(a),
            Node::Group(_) => None,
        }
    }
}

impl From<Array> for Node {
    fn from(a: Array) -> Self {
        Node::Dataset(a)
    }
}

impl From<Group> for Node {
    fn from(g: Group) -> Self {
        Node::Group(g)
    }
}

/// A named collection of members plus free-text attributes.
///
/// Members are kept sorted by name, which is also the order HDF5 reports
/// them in when a file is read back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Group {
    members: BTreeMap<String, Node>,
    attrs: BTreeMap<String, String>,
}

fn validate_name(name: &str) -> Result<(), ContainerError> {
    if name.is_empty() || name.contains('/') || name == "." {
        return Err(ContainerError::InvalidName(name.to_string()));
    }
    Ok(())
}

impl Group {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a member.
    pub fn insert(&mut self, name: impl Into<String>, node: impl Into<Node>) -> Result<(), ContainerError> {
        let name = name.into();
        validate_name(&name)?;
        self.members.insert(name, node.into());
        Ok(())
    }

    pub fn insert_dataset(&mut self, name: impl Into<String>, array: Array) -> Result<(), ContainerError> {
        self.insert(name, Node::Dataset(array))
    }

    /// Get the sub-group `name`, creating it if absent.
    pub fn insert_group(&mut self, name: impl Into<String>) -> Result<&mut Group, ContainerError> {
        let name = name.into();
        validate_name(&name)?;
        let node = self
            .members
            .entry(name.clone())
            .or_insert_with(|| Node::Group(Group::new()));
        match node {
            Node::Group(g) => Ok(g),
            Node::Dataset(_) => Err(ContainerError::NotAGroup(name)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.members.get(name)
    }

    pub fn group(&self, name: &str) -> Option<&Group> {
        self.get(name).and_then(Node::as_group)
    }

    pub fn dataset(&self, name: &str) -> Option<&Array> {
        self.get(name).and_then(Node::as_dataset)
    }

    /// Resolve a `/`-separated path relative to this group.
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.get(first)?;
        for part in parts {
            node = node.as_group()?.get(part)?;
        }
        Some(node)
    }

    pub fn members(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn member_names(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attrs.insert(name.into(), value.into());
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn attrs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.attrs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Indented tree listing, one line per member.
    ///
    /// Groups with more than `max_children` members are elided after that many.
    pub fn describe(&self, max_children: usize) -> String {
        let mut out = String::new();
        self.describe_into(&mut out, 0, max_children);
        out
    }

    fn describe_into(&self, out: &mut String, depth: usize, max_children: usize) {
        let indent = "  ".repeat(depth);
        for (name, node) in self.members.iter().take(max_children) {
            match node {
                Node::Group(g) => {
                    out.push_str(&format!("{indent}{name}/ ({} members)\n", g.len()));
                    g.describe_into(out, depth + 1, max_children);
                }
                Node::Dataset(a) => out.push_str(&format!("{indent}{name}: {a}\n")),
            }
        }
        if self.members.len() > max_children {
            out.push_str(&format!(
                "{indent}... {} more\n",
                self.members.len() - max_children
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_rejects_bad_names() {
        let mut g = Group::new();
        assert!(matches!(
            g.insert_dataset("a/b", Array::from_i64(vec![1])),
            Err(ContainerError::InvalidName(_))
        ));
        assert!(matches!(
            g.insert_dataset("", Array::from_i64(vec![1])),
            Err(ContainerError::InvalidName(_))
        ));
    }

    #[test]
    fn insert_group_over_dataset_fails() {
        let mut g = Group::new();
        g.insert_dataset("x", Array::from_i64(vec![1])).unwrap();
        assert!(matches!(g.insert_group("x"), Err(ContainerError::NotAGroup(_))));
    }

    #[test]
    fn get_path_walks_nested_groups() {
        let mut root = Group::new();
        root.insert_group("data")
            .unwrap()
            .insert_group("0")
            .unwrap()
            .insert_dataset("dim_0", Array::from_pairs(&[(1.0, 2.0)]))
            .unwrap();

        let leaf = root.get_path("data/0/dim_0").and_then(Node::as_dataset).unwrap();
        assert_eq!(leaf.shape(), vec![1, 2]);
        assert!(root.get_path("data/1").is_none());
        assert!(root.get_path("data/0/dim_0/deeper").is_none());
    }

    #[test]
    fn row_slices_first_axis() {
        let pairs = Array::from_pairs(&[(0.0, 1.0), (2.0, 3.0)]);
        assert_eq!(pairs.row(1).unwrap().as_f64_vec().unwrap(), vec![2.0, 3.0]);
        assert!(pairs.row(2).is_none());

        let ragged = Array::RaggedFloat64(vec![vec![1.0], vec![2.0, 3.0]]);
        assert_eq!(ragged.row(1).unwrap().shape(), vec![2]);

        let scalar = Array::Int64(ndarray::arr0(5).into_dyn());
        assert!(scalar.row(0).is_none());
        assert_eq!(scalar.len(), 1);
        assert_eq!(scalar.first_i64(), Some(5));
    }

    #[test]
    fn empty_diagram_keeps_two_columns() {
        let empty = Array::from_pairs(&[]);
        assert_eq!(empty.shape(), vec![0, 2]);
        assert!(empty.is_empty());
    }

    #[test]
    fn describe_elides_large_groups() {
        let mut g = Group::new();
        for i in 0..5 {
            g.insert_dataset(i.to_string(), Array::from_i64(vec![i])).unwrap();
        }
        let text = g.describe(2);
        assert!(text.contains("0: int64 (1)"));
        assert!(text.contains("... 3 more"));
    }
}
