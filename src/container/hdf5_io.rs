use std::path::Path;

use super::model::{Array, Group};
use super::ContainerError;

// ---------------------------------------------------------------------------
// Public entry-points
// ---------------------------------------------------------------------------

/// Write `root` to a new HDF5 file at `path`, truncating any existing file.
///
/// Groups become HDF5 groups, arrays become datasets and group attributes
/// become variable-length unicode string attributes.
pub fn write_file(path: &Path, root: &Group) -> Result<(), ContainerError> {
    backend::write_file(path, root)
}

/// Read a whole HDF5 file into memory.
///
/// Accepted element types: float32/float64, any integer width (widened to
/// int64), variable-length and fixed-length strings, and variable-length
/// float arrays.
pub fn read_file(path: &Path) -> Result<Group, ContainerError> {
    backend::read_file(path)
}

/// Read the single dataset `name` (a `/`-separated path) without loading the
/// rest of the file.
pub fn read_dataset(path: &Path, name: &str) -> Result<Array, ContainerError> {
    backend::read_named_dataset(path, name)
}

// ---------------------------------------------------------------------------
// HDF5 backend
// ---------------------------------------------------------------------------

#[cfg(feature = "hdf5")]
mod backend {
    use std::path::Path;

    use hdf5::types::{
        FixedAscii, FixedUnicode, FloatSize, TypeDescriptor, VarLenArray, VarLenAscii, VarLenUnicode,
    };
    use log::{debug, warn};
    use ndarray::{Array1, ArrayD};

    use crate::container::model::{Array, Group, Node};
    use crate::container::ContainerError;

    fn at(path: &str) -> impl FnOnce(hdf5::Error) -> ContainerError + '_ {
        move |e| ContainerError::Hdf5 {
            path: path.to_string(),
            message: e.to_string(),
        }
    }

    /// Longest fixed-length string element accepted when reading.
    const MAX_FIXED_STRING: usize = 1024;

    fn to_unicode(text: &str, path: &str) -> Result<VarLenUnicode, ContainerError> {
        text.parse::<VarLenUnicode>()
            .map_err(|_| ContainerError::InvalidText {
                path: path.to_string(),
            })
    }

    /// Last component of an absolute HDF5 object name.
    fn base_name(name: &str) -> &str {
        name.rsplit('/').next().unwrap_or(name)
    }

    pub(super) fn write_file(path: &Path, root: &Group) -> Result<(), ContainerError> {
        let display = path.display().to_string();
        let file = hdf5::File::create(path).map_err(at(&display))?;
        write_group(&file, root, "")?;
        file.close().map_err(at(&display))?;
        debug!("wrote {display}");
        Ok(())
    }

    fn write_group(target: &hdf5::Group, group: &Group, prefix: &str) -> Result<(), ContainerError> {
        for (name, value) in group.attrs() {
            let path = format!("{prefix}@{name}");
            let text = to_unicode(value, &path)?;
            target
                .new_attr::<VarLenUnicode>()
                .shape(())
                .create(name)
                .and_then(|attr| attr.write_scalar(&text))
                .map_err(at(&path))?;
        }

        for (name, node) in group.members() {
            let path = format!("{prefix}/{name}");
            match node {
                Node::Group(child) => {
                    let sub = target.create_group(name).map_err(at(&path))?;
                    write_group(&sub, child, &path)?;
                }
                Node::Dataset(array) => write_dataset(target, name, array, &path)?,
            }
        }
        Ok(())
    }

    fn write_dataset(target: &hdf5::Group, name: &str, array: &Array, path: &str) -> Result<(), ContainerError> {
        let builder = target.new_dataset_builder();
        let result = match array {
            Array::Float64(a) => builder.with_data(a).create(name),
            Array::Float32(a) => builder.with_data(a).create(name),
            Array::Int64(a) => builder.with_data(a).create(name),
            Array::Text(a) => {
                let converted = a
                    .iter()
                    .map(|s| to_unicode(s, path))
                    .collect::<Result<Vec<_>, _>>()?;
                let converted = ArrayD::from_shape_vec(a.raw_dim(), converted)?;
                builder.with_data(&converted).create(name)
            }
            Array::RaggedFloat64(rows) => {
                let converted: Array1<VarLenArray<f64>> = rows
                    .iter()
                    .map(|r| VarLenArray::from_slice(r))
                    .collect();
                builder.with_data(&converted).create(name)
            }
        };
        result.map(|_| ()).map_err(at(path))
    }

    pub(super) fn read_file(path: &Path) -> Result<Group, ContainerError> {
        let display = path.display().to_string();
        let file = hdf5::File::open(path).map_err(at(&display))?;
        let root = read_group(&file, "")?;
        debug!("read {display}: {} top-level members", root.len());
        Ok(root)
    }

    pub(super) fn read_named_dataset(path: &Path, name: &str) -> Result<Array, ContainerError> {
        let display = path.display().to_string();
        let file = hdf5::File::open(path).map_err(at(&display))?;
        let ds = file.dataset(name).map_err(at(name))?;
        read_dataset(&ds, name)
    }

    fn read_group(source: &hdf5::Group, prefix: &str) -> Result<Group, ContainerError> {
        let mut group = Group::new();

        for name in source.attr_names().map_err(at(prefix))? {
            let path = format!("{prefix}@{name}");
            let attr = source.attr(&name).map_err(at(&path))?;
            match read_text_attr(&attr, &path)? {
                Some(text) => group.set_attr(name, text),
                None => warn!("skipping non-text attribute {path}"),
            }
        }

        for child in source.groups().map_err(at(prefix))? {
            let name = base_name(&child.name()).to_string();
            let path = format!("{prefix}/{name}");
            let sub = read_group(&child, &path)?;
            group.insert(name, Node::Group(sub))?;
        }

        for ds in source.datasets().map_err(at(prefix))? {
            let name = base_name(&ds.name()).to_string();
            let path = format!("{prefix}/{name}");
            let array = read_dataset(&ds, &path)?;
            group.insert(name, Node::Dataset(array))?;
        }

        Ok(group)
    }

    fn read_dataset(ds: &hdf5::Dataset, path: &str) -> Result<Array, ContainerError> {
        let descriptor = ds
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(at(path))?;

        let array = match descriptor {
            TypeDescriptor::Float(FloatSize::U4) => Array::Float32(ds.read_dyn::<f32>().map_err(at(path))?),
            TypeDescriptor::Float(_) => Array::Float64(ds.read_dyn::<f64>().map_err(at(path))?),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) => {
                Array::Int64(ds.read_dyn::<i64>().map_err(at(path))?)
            }
            TypeDescriptor::VarLenUnicode => {
                let raw = ds.read_dyn::<VarLenUnicode>().map_err(at(path))?;
                Array::Text(raw.map(|s| s.as_str().to_owned()))
            }
            TypeDescriptor::VarLenAscii => {
                let raw = ds.read_dyn::<VarLenAscii>().map_err(at(path))?;
                Array::Text(raw.map(|s| s.as_str().to_owned()))
            }
            TypeDescriptor::FixedAscii(n) if n <= MAX_FIXED_STRING => {
                Array::Text(read_fixed_text(ds, false, path)?)
            }
            TypeDescriptor::FixedUnicode(n) if n <= MAX_FIXED_STRING => {
                Array::Text(read_fixed_text(ds, true, path)?)
            }
            TypeDescriptor::VarLenArray(ref inner) if matches!(**inner, TypeDescriptor::Float(_)) => {
                let raw = ds.read_raw::<VarLenArray<f64>>().map_err(at(path))?;
                Array::RaggedFloat64(raw.iter().map(|r| r.as_slice().to_vec()).collect())
            }
            other => {
                return Err(ContainerError::UnsupportedType {
                    path: path.to_string(),
                    dtype: format!("{other:?}"),
                })
            }
        };
        Ok(array)
    }

    /// Fixed-length strings (h5py `np.string_` values) come back null-trimmed.
    fn read_fixed_text(
        container: &hdf5::Container,
        unicode: bool,
        path: &str,
    ) -> Result<ArrayD<String>, ContainerError> {
        let text = if unicode {
            container
                .read_dyn::<FixedUnicode<MAX_FIXED_STRING>>()
                .map_err(at(path))?
                .map(|s| s.as_str().to_owned())
        } else {
            container
                .read_dyn::<FixedAscii<MAX_FIXED_STRING>>()
                .map_err(at(path))?
                .map(|s| s.as_str().to_owned())
        };
        Ok(text)
    }

    fn read_text_attr(attr: &hdf5::Attribute, path: &str) -> Result<Option<String>, ContainerError> {
        let descriptor = attr
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(at(path))?;

        let text = match descriptor {
            TypeDescriptor::VarLenUnicode => attr
                .read_raw::<VarLenUnicode>()
                .map_err(at(path))?
                .first()
                .map(|s| s.as_str().to_owned()),
            TypeDescriptor::VarLenAscii => attr
                .read_raw::<VarLenAscii>()
                .map_err(at(path))?
                .first()
                .map(|s| s.as_str().to_owned()),
            TypeDescriptor::FixedAscii(n) if n <= MAX_FIXED_STRING => {
                read_fixed_text(attr, false, path)?.iter().next().cloned()
            }
            TypeDescriptor::FixedUnicode(n) if n <= MAX_FIXED_STRING => {
                read_fixed_text(attr, true, path)?.iter().next().cloned()
            }
            _ => None,
        };
        Ok(text)
    }
}

#[cfg(not(feature = "hdf5"))]
mod backend {
    use std::path::Path;

    use crate::container::model::{Array, Group};
    use crate::container::ContainerError;

    pub(super) fn write_file(_path: &Path, _root: &Group) -> Result<(), ContainerError> {
        Err(ContainerError::BackendDisabled)
    }

    pub(super) fn read_file(_path: &Path) -> Result<Group, ContainerError> {
        Err(ContainerError::BackendDisabled)
    }

    pub(super) fn read_named_dataset(_path: &Path, _name: &str) -> Result<Array, ContainerError> {
        Err(ContainerError::BackendDisabled)
    }
}

#[cfg(all(test, feature = "hdf5"))]
mod tests {
    use hdf5::types::FixedAscii;

    use super::*;
    use crate::container::model::{Array, Node};

    #[test]
    fn round_trip_preserves_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tree.h5");

        let mut root = Group::new();
        root.set_attr("readme", "'data': access <index>/<dim>");
        let sample = root.insert_group("data").unwrap().insert_group("0").unwrap();
        sample
            .insert_dataset("dim_0", Array::from_pairs(&[(1.0, 2.0), (0.5, 3.0)]))
            .unwrap();
        sample.insert_dataset("dim_0_ess", Array::from_f64(vec![0.0])).unwrap();
        sample.insert_dataset("signal", Array::from_f32(vec![0.25, -1.5])).unwrap();
        root.insert_dataset("target", Array::from_i64(vec![3])).unwrap();
        root.insert_dataset("names", Array::from_text(["IFOT", "REST"])).unwrap();
        root.insert_dataset(
            "eigenvalues",
            Array::RaggedFloat64(vec![vec![1.0, 2.0], vec![], vec![4.0]]),
        )
        .unwrap();

        write_file(&path, &root).unwrap();
        let back = read_file(&path).unwrap();

        assert_eq!(back, root);
    }

    #[test]
    fn empty_diagram_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.h5");

        let mut root = Group::new();
        root.insert_dataset("dim_0", Array::from_pairs(&[])).unwrap();
        write_file(&path, &root).unwrap();

        let back = read_file(&path).unwrap();
        assert_eq!(back.dataset("dim_0").unwrap().shape(), vec![0, 2]);
    }

    #[test]
    fn single_dataset_is_read_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subject.h5");

        let mut root = Group::new();
        root.insert_group("REST")
            .unwrap()
            .insert_dataset("x", Array::from_i64(vec![4, 5]))
            .unwrap();
        write_file(&path, &root).unwrap();

        assert_eq!(read_dataset(&path, "REST/x").unwrap(), Array::from_i64(vec![4, 5]));
        assert!(read_dataset(&path, "MHND").is_err());
    }

    #[test]
    fn fixed_length_strings_are_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provider.h5");

        let value = FixedAscii::<16>::from_ascii("reddit_5K").unwrap();
        let file = hdf5::File::create(&path).unwrap();
        file.create_group("meta_data")
            .unwrap()
            .new_dataset::<FixedAscii<16>>()
            .shape(())
            .create("source")
            .unwrap()
            .write_scalar(&value)
            .unwrap();
        file.new_attr::<FixedAscii<16>>()
            .shape(())
            .create("readme")
            .unwrap()
            .write_scalar(&value)
            .unwrap();
        file.close().unwrap();

        let back = read_file(&path).unwrap();
        let source = back.get_path("meta_data/source").and_then(Node::as_dataset).unwrap();
        assert_eq!(source.as_text(), Some(vec!["reddit_5K"]));
        assert_eq!(back.attr("readme"), Some("reddit_5K"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_file(&dir.path().join("nope.h5")).unwrap_err();
        assert!(matches!(err, ContainerError::Hdf5 { .. }));
    }
}
