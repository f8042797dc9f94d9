//! Offline pipelines turning raw research data into one-file datasets.
//!
//! ```text
//!   raw input (pickle / METIS / DIPHA / .mat)
//!        │  per-sample job, run on a bounded rayon pool
//!        ▼
//!   container::Group  ──write_file──►  <generated>/<dataset>.h5
//! ```
//!
//! Every pipeline takes explicit input and output paths; the binary derives
//! them from [`Config`](crate::config::Config).

pub mod eeg;
pub mod eigenvalue_predict;
pub mod reddit_graph;
pub mod reininghaus;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Context, Result};
use log::info;
use rayon::prelude::*;

use crate::container::{self, Array, Group};
use crate::topology::Diagram;

// ---------------------------------------------------------------------------
// Workers
// ---------------------------------------------------------------------------

/// `min(cpus - 1, max_cpu)`, at least one.
pub fn worker_count(max_cpu: usize) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    cpus.saturating_sub(1).min(max_cpu).max(1)
}

/// Run `f` over `jobs` on a dedicated pool of [`worker_count`] threads.
pub fn parallel_map<T, R, F>(jobs: Vec<T>, max_cpu: usize, f: F) -> Result<Vec<R>>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Send + Sync,
{
    let threads = worker_count(max_cpu);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .context("building worker pool")?;
    info!("running {} jobs on {threads} workers", jobs.len());
    Ok(pool.install(|| jobs.into_par_iter().map(f).collect()))
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Counts finished jobs and logs roughly every percent.
#[derive(Debug)]
pub struct ProgressCounter {
    name: String,
    total: usize,
    done: AtomicUsize,
    step: usize,
}

impl ProgressCounter {
    pub fn new(name: impl Into<String>, total: usize) -> Self {
        let counter = ProgressCounter {
            name: name.into(),
            total,
            done: AtomicUsize::new(0),
            step: (total / 100).max(1),
        };
        info!("{}: 0/{total}", counter.name);
        counter
    }

    pub fn trigger_progress(&self) {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        if done % self.step == 0 || done == self.total {
            info!("{}: {done}/{}", self.name, self.total);
        }
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Shared output helpers
// ---------------------------------------------------------------------------

/// The `dim_0` / `dim_0_ess` / `dim_1_ess` triple stored per graph.
pub(crate) fn insert_graph_diagrams(sample: &mut Group, dgms: &[Diagram; 2]) -> Result<()> {
    let (dim_0, dim_0_ess) = crate::topology::persistence::split_essential(&dgms[0]);
    let (_, dim_1_ess) = crate::topology::persistence::split_essential(&dgms[1]);
    sample.insert_dataset("dim_0", Array::from_pairs(&dim_0))?;
    sample.insert_dataset("dim_0_ess", Array::from_f64(dim_0_ess))?;
    sample.insert_dataset("dim_1_ess", Array::from_f64(dim_1_ess))?;
    Ok(())
}

/// Create the parent directory and write `root` to `path`.
pub fn write_output(path: &Path, root: &Group) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    container::write_file(path, root).with_context(|| format!("writing {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

/// Whitespace-separated numbers, as written by `savetxt`-style tools.
pub(crate) fn read_number_table(path: &Path) -> Result<Vec<f64>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b' ')
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("opening {}", path.display()))?;

    let mut values = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("reading {}", path.display()))?;
        for field in record.iter().flat_map(str::split_whitespace) {
            let value = field
                .parse::<f64>()
                .with_context(|| format!("{}:{}: '{field}' is not a number", path.display(), line + 1))?;
            values.push(value);
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workers_are_bounded() {
        assert_eq!(worker_count(1), 1);
        assert!(worker_count(0) >= 1);
        assert!(worker_count(1000) >= 1);
    }

    #[test]
    fn parallel_map_returns_every_result() {
        let mut out = parallel_map((0..50).collect(), 4, |x: i32| x * 2).unwrap();
        out.sort();
        assert_eq!(out, (0..50).map(|x| x * 2).collect::<Vec<_>>());
    }

    #[test]
    fn progress_counts_from_many_threads() {
        let progress = ProgressCounter::new("test", 20);
        parallel_map((0..20).collect(), 3, |_: usize| progress.trigger_progress()).unwrap();
        assert_eq!(progress.done(), 20);
    }

    #[test]
    fn number_table_accepts_ragged_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1.ev");
        std::fs::write(&path, "1.5\n  -2.0e-1   3\n\n4\n").unwrap();
        assert_eq!(read_number_table(&path).unwrap(), vec![1.5, -0.2, 3.0, 4.0]);
    }

    #[test]
    fn number_table_rejects_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("labels.txt");
        std::fs::write(&path, "1\nabc\n").unwrap();
        assert!(read_number_table(&path).is_err());
    }
}
