//! SHREC 2014 shape diagrams (Reininghaus et al., CVPR 2015) converted from
//! DIPHA output into one file.
//!
//! Input directory: `<id>_..._<freq>.diagram` files (one per shape and heat
//! kernel frequency) and `labels.txt` with one 1-based label per shape.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::container::{Array, Group};
use crate::topology::dipha::{read_dipha_diagram, split_dims};

use super::{read_number_table, write_output, ProgressCounter};

pub const README: &str = "\n'data': access = <id>/<freq>/<barcode dim>\n\
'target': 'target'[i] = <label of 'data'[i]> \n";

pub const LABEL_FILE: &str = "labels.txt";
pub const DIAGRAM_EXTENSION: &str = "diagram";

/// `"12_shape_7.diagram"` → `(12, 7)`: first and last `_`-separated parts
/// of the stem.
pub fn meta_from_file_path(path: &Path) -> Result<(usize, i64)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .with_context(|| format!("no file name in {}", path.display()))?;
    let mut parts = stem.split('_');
    let (first, last) = (parts.next(), parts.next_back());
    match (first.map(str::parse::<usize>), last.map(str::parse::<i64>)) {
        (Some(Ok(id)), Some(Ok(freq))) => Ok((id, freq)),
        _ => bail!("cannot read '<id>_..._<freq>' from {}", path.display()),
    }
}

fn gather_diagram_files(dir: &Path) -> Result<BTreeMap<usize, BTreeMap<i64, PathBuf>>> {
    let mut by_id: BTreeMap<usize, BTreeMap<i64, PathBuf>> = BTreeMap::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DIAGRAM_EXTENSION) {
            continue;
        }
        let (id, freq) = meta_from_file_path(&path)?;
        by_id.entry(id).or_default().insert(freq, path);
    }
    Ok(by_id)
}

/// Build the output tree from the diagrams in `input_dir`.
pub fn build(input_dir: &Path) -> Result<Group> {
    let files = gather_diagram_files(input_dir)?;
    let labels = read_number_table(&input_dir.join(LABEL_FILE))?;
    let n_shapes = files.len();
    info!("{n_shapes} shapes in {}", input_dir.display());

    let mut root = Group::new();
    root.set_attr("readme", README);
    let mut target = vec![0i64; n_shapes];

    let progress = ProgressCounter::new("shrec diagrams", n_shapes);
    let data = root.insert_group("data")?;
    for (id, files_by_freq) in files {
        if id >= n_shapes {
            bail!("shape id {id} out of range for {n_shapes} shapes");
        }
        let label = labels
            .get(id)
            .with_context(|| format!("{LABEL_FILE} has no entry for shape {id}"))?;
        target[id] = *label as i64 - 1;

        let sample = data.insert_group(id.to_string())?;
        for (freq, path) in files_by_freq {
            let points = read_dipha_diagram(&path)?;
            let (dim_0, dim_1) = split_dims(&points);
            debug!("{}: {} + {} pairs", path.display(), dim_0.len(), dim_1.len());

            let by_freq = sample.insert_group(freq.to_string())?;
            by_freq.insert_dataset("0", Array::from_pairs(&dim_0))?;
            by_freq.insert_dataset("1", Array::from_pairs(&dim_1))?;
        }
        progress.trigger_progress();
    }

    root.insert_dataset("target", Array::from_i64(target))?;
    Ok(root)
}

pub fn convert_folder_to_hdf5_file(input_dir: &Path, output_path: &Path) -> Result<()> {
    let root = build(input_dir)?;
    write_output(output_path, &root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::dipha::{DIPHA_MAGIC, PERSISTENCE_DIAGRAM_TYPE};

    fn write_diagram(path: &Path, points: &[(i64, f64, f64)]) {
        let mut out = Vec::new();
        out.extend_from_slice(&DIPHA_MAGIC.to_le_bytes());
        out.extend_from_slice(&PERSISTENCE_DIAGRAM_TYPE.to_le_bytes());
        out.extend_from_slice(&(points.len() as i64).to_le_bytes());
        for (dim, birth, death) in points {
            out.extend_from_slice(&dim.to_le_bytes());
            out.extend_from_slice(&birth.to_le_bytes());
            out.extend_from_slice(&death.to_le_bytes());
        }
        std::fs::write(path, out).unwrap();
    }

    #[test]
    fn id_and_frequency_from_name() {
        assert_eq!(meta_from_file_path(Path::new("3_mesh_hks_10.diagram")).unwrap(), (3, 10));
        assert_eq!(meta_from_file_path(Path::new("0_5.diagram")).unwrap(), (0, 5));
        assert!(meta_from_file_path(Path::new("mesh.diagram")).is_err());
    }

    #[test]
    fn folder_is_converted() {
        let dir = tempfile::tempdir().unwrap();
        write_diagram(&dir.path().join("0_shape_1.diagram"), &[(0, 0.1, 0.4), (-1, 0.0, 1.0), (1, 0.5, 0.9)]);
        write_diagram(&dir.path().join("0_shape_2.diagram"), &[(0, 0.2, 0.3)]);
        write_diagram(&dir.path().join("1_shape_1.diagram"), &[]);
        std::fs::write(dir.path().join(LABEL_FILE), "2\n1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let root = build(dir.path()).unwrap();

        assert_eq!(root.dataset("target").unwrap().as_i64_vec(), Some(vec![1, 0]));
        assert!(root.attr("readme").unwrap().contains("<freq>"));

        let dim_0 = root.get_path("data/0/1/0").and_then(|n| n.as_dataset()).unwrap();
        assert_eq!(dim_0.as_f64_vec(), Some(vec![0.1, 0.4, 0.0, 1.0]));
        let dim_1 = root.get_path("data/0/1/1").and_then(|n| n.as_dataset()).unwrap();
        assert_eq!(dim_1.shape(), vec![1, 2]);
        assert_eq!(root.group("data").unwrap().group("0").unwrap().len(), 2);
        assert_eq!(root.get_path("data/1/1/0").and_then(|n| n.as_dataset()).unwrap().len(), 0);
    }

    #[test]
    fn missing_label_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_diagram(&dir.path().join("0_1.diagram"), &[]);
        std::fs::write(dir.path().join(LABEL_FILE), "").unwrap();
        assert!(build(dir.path()).is_err());
    }
}
