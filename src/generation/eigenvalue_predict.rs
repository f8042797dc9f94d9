//! Anonymous graphs paired with their spectra (eigenvalue prediction task).
//!
//! Input directory: `<id>.<graph_ext>` METIS graphs and `<id>.<eigenvalue_ext>`
//! whitespace-separated eigenvalue files, matched by sorted file name.
//! Output layout:
//! ```text
//! /data/<index>/{dim_0, dim_0_ess, dim_1_ess}
//! /target[index]        eigenvalues (variable length)
//! /index_to_id[index]   graph id parsed from the file name
//! /readme
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info};

use crate::container::{Array, Group};
use crate::topology::{degree_filtration, read_graph_from_metis_file, toplex_persistence_diagrams, Diagram};

use super::{insert_graph_diagrams, parallel_map, read_number_table, write_output, ProgressCounter};

pub const README: &str = "'data': access <index>/{dim_0, dim_0_ess, dim_1_ess}\n\
'target': target[i] = eigenvalues of graph 'data'[i]\n\
'index_to_id': index_to_id[i] = id of the raw graph file of 'data'[i]";

/// Input file naming for one raw directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EigenvalueInput {
    pub raw_data_dir: PathBuf,
    pub graph_file_extension: String,
    pub eigenvalue_file_extension: String,
}

impl EigenvalueInput {
    pub fn new(raw_data_dir: impl Into<PathBuf>) -> Self {
        EigenvalueInput {
            raw_data_dir: raw_data_dir.into(),
            graph_file_extension: "metis".to_string(),
            eigenvalue_file_extension: "ev".to_string(),
        }
    }

    pub fn with_extensions(mut self, graph: impl Into<String>, eigenvalues: impl Into<String>) -> Self {
        self.graph_file_extension = graph.into();
        self.eigenvalue_file_extension = eigenvalues.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct EigenvalueJob {
    graph_index: usize,
    graph_id: i64,
    graph_file_path: PathBuf,
    ev_file_path: PathBuf,
}

struct EigenvalueResult {
    graph_index: usize,
    graph_id: i64,
    dgms: [Diagram; 2],
    eigenvalues: Vec<f64>,
}

/// `"00042.metis"` → 42: the part of the file name before the first dot.
pub fn graph_id_from_path(path: &Path) -> Result<i64> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("no file name in {}", path.display()))?;
    let stem = name.split('.').next().unwrap_or(name);
    stem.parse()
        .with_context(|| format!("'{stem}' in {} is not a graph id", path.display()))
}

fn files_with_extension(dir: &Path, ext: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry.with_context(|| format!("listing {}", dir.display()))?.path();
        if path.is_file() && path.extension().and_then(|e| e.to_str()) == Some(ext) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn job_args_list(input: &EigenvalueInput) -> Result<Vec<EigenvalueJob>> {
    let graphs = files_with_extension(&input.raw_data_dir, &input.graph_file_extension)?;
    let spectra = files_with_extension(&input.raw_data_dir, &input.eigenvalue_file_extension)?;
    if graphs.len() != spectra.len() {
        bail!(
            "{} holds {} .{} files but {} .{} files",
            input.raw_data_dir.display(),
            graphs.len(),
            input.graph_file_extension,
            spectra.len(),
            input.eigenvalue_file_extension
        );
    }

    graphs
        .into_iter()
        .zip(spectra)
        .enumerate()
        .map(|(graph_index, (graph_file_path, ev_file_path))| {
            let graph_id = graph_id_from_path(&graph_file_path)?;
            let ev_id = graph_id_from_path(&ev_file_path)?;
            if graph_id != ev_id {
                bail!(
                    "unpaired files {} and {}",
                    graph_file_path.display(),
                    ev_file_path.display()
                );
            }
            Ok(EigenvalueJob {
                graph_index,
                graph_id,
                graph_file_path,
                ev_file_path,
            })
        })
        .collect()
}

fn job(args: EigenvalueJob) -> Result<EigenvalueResult> {
    let graph = read_graph_from_metis_file(&args.graph_file_path)?;
    let eigenvalues = read_number_table(&args.ev_file_path)?;

    let toplices = graph.toplices();
    let values: Vec<f64> = toplices
        .iter()
        .map(|s| degree_filtration(s, &graph.degree))
        .collect();
    let dgms = toplex_persistence_diagrams(&toplices, &values, false)?;
    debug!(
        "{}: {} vertices, {} eigenvalues",
        args.graph_file_path.display(),
        graph.vertices.len(),
        eigenvalues.len()
    );

    Ok(EigenvalueResult {
        graph_index: args.graph_index,
        graph_id: args.graph_id,
        dgms,
        eigenvalues,
    })
}

/// Build the output tree for every graph in `input`.
pub fn build(input: &EigenvalueInput, readme: &str, max_cpu: usize) -> Result<Group> {
    let jobs = job_args_list(input)?;
    let n_graphs = jobs.len();
    info!("{n_graphs} graphs in {}", input.raw_data_dir.display());

    let progress = ProgressCounter::new("eigenvalue graphs", n_graphs);
    let results = parallel_map(jobs, max_cpu, |args| {
        let result = job(args);
        progress.trigger_progress();
        result
    })?;

    let mut root = Group::new();
    let mut target = vec![Vec::new(); n_graphs];
    let mut index_to_id = vec![0i64; n_graphs];
    let data = root.insert_group("data")?;
    for result in results {
        let result = result?;
        insert_graph_diagrams(data.insert_group(result.graph_index.to_string())?, &result.dgms)?;
        target[result.graph_index] = result.eigenvalues;
        index_to_id[result.graph_index] = result.graph_id;
    }

    root.insert_dataset("target", Array::RaggedFloat64(target))?;
    root.insert_dataset("index_to_id", Array::from_i64(index_to_id))?;
    root.insert_dataset("readme", Array::from_text([readme]))?;
    Ok(root)
}

pub fn run(input: &EigenvalueInput, output_path: &Path, readme: &str, max_cpu: usize) -> Result<()> {
    let root = build(input, readme, max_cpu)?;
    write_output(output_path, &root)
}
