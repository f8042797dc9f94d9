//! Dataset front-ends over the generated files.
//!
//! Two file layouts exist:
//! * [`nips`] – [`Provider`](crate::provider::Provider) files
//!   (`data_views/<view>/<label>/<sample_id>`), downloadable from Drive.
//! * [`one_file`] – `data/<index>` groups plus a `target` array.
//!
//! Each concrete dataset is a configuration constant (name, file name, Drive
//! id) handed to the layout's `open` function.

pub mod nips;
pub mod one_file;
pub mod transforms;

use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use crate::container::ContainerError;
use crate::download::DownloadError;
use crate::provider::ProviderError;

pub use nips::{Label, NipsDataset, NipsDatasetSpec};
pub use one_file::{OneFileDataset, OneFileDatasetSpec};

#[derive(Debug, Error)]
pub enum DataSetError {
    #[error("cannot find data in {}", root_dir.display())]
    NotFound { root_dir: PathBuf },

    #[error("no dataset named '{0}'")]
    UnknownDataset(String),

    #[error("dataset '{0}' has no download location; generate it instead")]
    NotDownloadable(String),

    #[error("missing member '{0}'")]
    MissingMember(String),

    #[error("index {index} out of range for dataset of length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("failed to create {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error(transparent)]
    Download(#[from] DownloadError),
}

pub type Result<T> = std::result::Result<T, DataSetError>;

/// Indexed (input, target) pairs.
pub trait SupervisedDataset {
    type Input;
    type Target;

    fn len(&self) -> usize;

    fn get(&self, index: usize) -> Result<(Self::Input, Self::Target)>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn iter(&self) -> impl Iterator<Item = Result<(Self::Input, Self::Target)>> + '_
    where
        Self: Sized,
    {
        (0..self.len()).map(move |i| self.get(i))
    }
}

/// Drive id and file name of the dataset called `name`.
pub fn download_location(name: &str) -> Result<(&'static str, &'static str)> {
    if let Some(spec) = NipsDatasetSpec::by_name(name) {
        return Ok((spec.google_drive_id, spec.file_name));
    }
    let spec = OneFileDatasetSpec::by_name(name).ok_or_else(|| DataSetError::UnknownDataset(name.to_string()))?;
    spec.google_drive_id
        .map(|id| (id, spec.file_name))
        .ok_or_else(|| DataSetError::NotDownloadable(name.to_string()))
}

/// Make sure `root_dir/file_name` exists, fetching it with `fetch` when
/// allowed and a Drive id is known.
pub(crate) fn ensure_local_file<F>(
    root_dir: &Path,
    file_name: &str,
    google_drive_id: Option<&str>,
    download: bool,
    fetch: F,
) -> Result<PathBuf>
where
    F: FnOnce(&str, &Path) -> std::result::Result<u64, DownloadError>,
{
    let path = root_dir.join(file_name);
    if path.is_file() {
        return Ok(path);
    }

    info!("did not find data in {}", root_dir.display());
    if let (true, Some(id)) = (download, google_drive_id) {
        std::fs::create_dir_all(root_dir).map_err(|source| DataSetError::Io {
            path: root_dir.to_path_buf(),
            source,
        })?;
        fetch(id, &path)?;
    }

    if path.is_file() {
        info!("found data: {}", path.display());
        Ok(path)
    } else {
        Err(DataSetError::NotFound {
            root_dir: root_dir.to_path_buf(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_locations() {
        assert_eq!(
            download_location("animal").unwrap(),
            ("0BxHF82gaPzgSSWIxNmJBRFJzcmM", "npht_animal_32dirs.h5")
        );
        assert!(matches!(
            download_location("reddit_50K"),
            Err(DataSetError::UnknownDataset(name)) if name == "reddit_50K"
        ));
        assert!(matches!(
            download_location("anon_1k_eigenvalue_predict"),
            Err(DataSetError::NotDownloadable(_))
        ));
    }

    #[test]
    fn existing_file_is_used_without_fetching() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("x.h5"), b"x").unwrap();
        let path = ensure_local_file(dir.path(), "x.h5", Some("id"), true, |_, _| {
            panic!("must not download")
        })
        .unwrap();
        assert_eq!(path, dir.path().join("x.h5"));
    }

    #[test]
    fn missing_file_without_download_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_local_file(dir.path(), "x.h5", Some("id"), false, |_, _| Ok(0)).unwrap_err();
        assert!(matches!(err, DataSetError::NotFound { .. }));
    }

    #[test]
    fn missing_drive_id_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = ensure_local_file(dir.path(), "x.h5", None, true, |_, _| Ok(0)).unwrap_err();
        assert!(matches!(err, DataSetError::NotFound { .. }));
    }

    #[test]
    fn fetch_creates_root_dir() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested");
        let path = ensure_local_file(&root, "x.h5", Some("abc"), true, |id, dest| {
            assert_eq!(id, "abc");
            std::fs::write(dest, b"payload").unwrap();
            Ok(7)
        })
        .unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"payload");
    }
}
