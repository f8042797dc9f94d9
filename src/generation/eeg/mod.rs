//! SciNe01 EEG recordings: 256-sensor signals of control and patient
//! subjects performing seven motor tasks.
//!
//! Each subject is one MATLAB v7.3 (`.mat`, i.e. HDF5) file holding one
//! `time × sensor × run` dataset per task label. A sample is one sub-run: a
//! sixth of a run's time axis, 250 time stamps after down-sampling.

pub mod pershom;
pub mod raw_signal;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use ndarray::{s, Array1, Array2, ArrayD, Axis, Ix3};

use crate::container::{self, Array, Group};

pub const GROUP_IDS: [&str; 2] = ["control", "patient"];
pub const LABEL_IDS: [&str; 7] = ["IFOT", "IHND", "MFOT", "MHND", "OFOT", "OHND", "REST"];

pub const N_SENSORS: usize = 256;
pub const RUNS_PER_LABEL: usize = 25;
pub const SUB_RUNS_PER_RUN: usize = 6;
pub const SAMPLE_LENGTH: usize = 250;
pub const HIGH_RESOLUTION_SAMPLE_LENGTH: usize = 1000;

// ---------------------------------------------------------------------------
// Label / group / sensor tables
// ---------------------------------------------------------------------------

pub fn int_label_from_str_label(label: &str) -> Option<usize> {
    LABEL_IDS.iter().position(|l| *l == label)
}

pub fn str_label_from_int_label(label: usize) -> Option<&'static str> {
    LABEL_IDS.get(label).copied()
}

pub fn int_group_from_str_group(group: &str) -> Option<usize> {
    GROUP_IDS.iter().position(|g| *g == group)
}

pub fn str_group_from_int_group(group: usize) -> Option<&'static str> {
    GROUP_IDS.get(group).copied()
}

// 1-based sensor numbers as in the recording setup
const LOW_RES_SENSORIMOTOR: [i64; 2] = [59, 183];
const LOW_RES_WHOLE_HEAD: [i64; 20] = [
    2, 18, 21, 26, 36, 37, 47, 59, 69, 87, 96, 101, 116, 126, 150, 153, 170, 183, 202, 224,
];
const HIGH_RES_SENSORIMOTOR: [i64; 27] = [
    59, 52, 44, 51, 43, 9, 186, 185, 184, 183, 60, 53, 45, 132, 143, 144, 155, 79, 80, 81, 131, 17, 8, 198, 197,
    196, 101,
];
const BAD_CHANNELS: [i64; 27] = [
    31, 37, 32, 25, 18, 91, 102, 103, 111, 120, 133, 145, 165, 174, 187, 199, 208, 216, 112, 121, 134, 146, 156,
    166, 175, 188, 200,
];
const FIRST_RIM_CHANNEL: i64 = 225;

/// Named sensor subsets as 0-based sensor indices.
pub fn sensor_configurations() -> BTreeMap<&'static str, Vec<i64>> {
    let zero_based = |sensors: &[i64]| sensors.iter().map(|x| x - 1).collect::<Vec<_>>();
    let all = 1..=N_SENSORS as i64;

    BTreeMap::from([
        ("all", all.clone().map(|x| x - 1).collect()),
        ("low_resolution_sensorimotor_cortex", zero_based(&LOW_RES_SENSORIMOTOR)),
        ("low_resolution_whole_head", zero_based(&LOW_RES_WHOLE_HEAD)),
        ("high_resolution_sensorimotor_cortex", zero_based(&HIGH_RES_SENSORIMOTOR)),
        (
            "high_resolution_all_but_bad_channels",
            all.filter(|x| !BAD_CHANNELS.contains(x) && *x < FIRST_RIM_CHANNEL)
                .map(|x| x - 1)
                .collect(),
        ),
    ])
}

/// Average consecutive blocks of 4 time stamps (1000 Hz → 250 Hz).
pub fn down_sample_from_1000_to_250_timestamps(x: &Array2<f64>) -> Result<Array2<f64>> {
    if x.nrows() != HIGH_RESOLUTION_SAMPLE_LENGTH {
        bail!("expected {HIGH_RESOLUTION_SAMPLE_LENGTH} time stamps, got {}", x.nrows());
    }
    let rows: Vec<Array1<f64>> = x
        .axis_chunks_iter(Axis(0), 4)
        .filter_map(|block| block.mean_axis(Axis(0)))
        .collect();
    let views: Vec<_> = rows.iter().map(|r| r.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// Where a sample comes from. `label` and `group` index [`LABEL_IDS`] and
/// [`GROUP_IDS`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleMeta {
    pub subject_id: String,
    pub group: usize,
    pub label: usize,
    pub run: usize,
    pub sub_run: usize,
}

impl SampleMeta {
    pub fn label_name(&self) -> &'static str {
        str_label_from_int_label(self.label).unwrap_or("unknown")
    }

    pub fn group_name(&self) -> &'static str {
        str_group_from_int_group(self.group).unwrap_or("unknown")
    }
}

#[derive(Debug, Clone)]
struct SampleDef {
    file_path: PathBuf,
    meta: SampleMeta,
}

/// `<...control...>.mat` → (`"<...control...>"`, control).
fn meta_info_from_file_path(path: &Path) -> Option<(String, usize)> {
    let name = path.file_name()?.to_str()?;
    let group = GROUP_IDS.iter().position(|g| name.contains(g))?;
    let subject_id = name.split(".mat").next().unwrap_or(name).to_string();
    Some((subject_id, group))
}

/// Rows of sub-run `sub_run` of run `run` from a `time × sensor × run` array.
fn take_sub_run<T: Clone>(recording: &ArrayD<T>, run: usize, sub_run: usize) -> Result<Array2<T>> {
    let recording = recording
        .view()
        .into_dimensionality::<Ix3>()
        .context("expected a time × sensor × run recording")?;
    let n_runs = recording.len_of(Axis(2));
    if run >= n_runs {
        bail!("run {run} out of range for {n_runs} runs");
    }
    let run_data = recording.index_axis(Axis(2), run);
    let sub_run_length = run_data.nrows() / SUB_RUNS_PER_RUN;
    let rows = sub_run_length * sub_run..sub_run_length * (sub_run + 1);
    Ok(run_data.slice(s![rows, ..]).to_owned())
}

/// Cut one sample out of a label's recording and bring it to 250 time stamps.
pub fn sample_from_recording(recording: &Array, run: usize, sub_run: usize, down_sample: bool) -> Result<Array2<f64>> {
    let x = match recording {
        Array::Float64(a) => take_sub_run(a, run, sub_run)?,
        Array::Float32(a) => take_sub_run(a, run, sub_run)?.mapv(f64::from),
        Array::Int64(a) => take_sub_run(a, run, sub_run)?.mapv(|v| v as f64),
        other => bail!("recording has non-numeric type {}", other.dtype_name()),
    };

    match x.nrows() {
        HIGH_RESOLUTION_SAMPLE_LENGTH if down_sample => down_sample_from_1000_to_250_timestamps(&x),
        SAMPLE_LENGTH | HIGH_RESOLUTION_SAMPLE_LENGTH => Ok(x),
        n => bail!("sub-run has {n} time stamps, expected {SAMPLE_LENGTH} or {HIGH_RESOLUTION_SAMPLE_LENGTH}"),
    }
}

/// Enumerates every (subject, label, run, sub-run) of a directory of
/// subject files.
#[derive(Debug, Clone)]
pub struct SciNe01DataDirReader {
    data_dir: PathBuf,
    omit_sub_run_0: bool,
    /// Down-sample 1000 time stamp sub-runs to 250.
    pub down_sample_higher_resolution_samples: bool,
    samples: Vec<SampleDef>,
}

impl SciNe01DataDirReader {
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::with_options(data_dir, true, true)
    }

    pub fn with_options(
        data_dir: impl Into<PathBuf>,
        omit_sub_run_0: bool,
        down_sample_higher_resolution_samples: bool,
    ) -> Result<Self> {
        let data_dir = data_dir.into();
        if !data_dir.is_dir() {
            bail!("{} is not a directory", data_dir.display());
        }
        let mut reader = SciNe01DataDirReader {
            data_dir,
            omit_sub_run_0,
            down_sample_higher_resolution_samples,
            samples: Vec::new(),
        };
        reader.samples = reader.list_sample_defs()?;
        info!(
            "{} samples in {}",
            reader.samples.len(),
            reader.data_dir.display()
        );
        Ok(reader)
    }

    fn list_sample_defs(&self) -> Result<Vec<SampleDef>> {
        let mut subjects = Vec::new();
        let listing = || format!("listing {}", self.data_dir.display());
        for entry in std::fs::read_dir(&self.data_dir).with_context(listing)? {
            let path = entry.with_context(listing)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("mat") {
                continue;
            }
            match meta_info_from_file_path(&path) {
                Some((subject_id, group)) => subjects.push((path, subject_id, group)),
                None => warn!("{}: no group in file name, skipped", path.display()),
            }
        }
        subjects.sort_by(|a, b| a.1.cmp(&b.1));

        let first_sub_run = usize::from(self.omit_sub_run_0);
        let mut samples = Vec::new();
        for (path, subject_id, group) in subjects {
            debug!("subject {subject_id} ({})", GROUP_IDS.get(group).unwrap_or(&"?"));
            for label in 0..LABEL_IDS.len() {
                for run in 0..RUNS_PER_LABEL {
                    for sub_run in first_sub_run..SUB_RUNS_PER_RUN {
                        samples.push(SampleDef {
                            file_path: path.clone(),
                            meta: SampleMeta {
                                subject_id: subject_id.clone(),
                                group,
                                label,
                                run,
                                sub_run,
                            },
                        });
                    }
                }
            }
        }
        Ok(samples)
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Whether the first sub-run of every run was left out when listing.
    pub fn omit_sub_run_0(&self) -> bool {
        self.omit_sub_run_0
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Keep only the samples whose meta data satisfies `keep`.
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&SampleMeta) -> bool,
    {
        self.samples.retain(|s| keep(&s.meta));
    }

    pub fn meta(&self, index: usize) -> Option<&SampleMeta> {
        self.samples.get(index).map(|s| &s.meta)
    }

    pub fn metas(&self) -> impl Iterator<Item = &SampleMeta> + '_ {
        self.samples.iter().map(|s| &s.meta)
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.metas().map(SampleMeta::label_name).collect()
    }

    /// Sample `index` as `time × sensor` plus where it came from.
    pub fn get(&self, index: usize) -> Result<(Array2<f64>, SampleMeta)> {
        let def = self
            .samples
            .get(index)
            .with_context(|| format!("sample {index} out of range for {} samples", self.len()))?;
        let meta = &def.meta;
        let recording = container::read_dataset(&def.file_path, meta.label_name())
            .with_context(|| format!("reading {} from {}", meta.label_name(), def.file_path.display()))?;
        let x = sample_from_recording(
            &recording,
            meta.run,
            meta.sub_run,
            self.down_sample_higher_resolution_samples,
        )
        .with_context(|| format!("sample {index} ({} {} run {})", meta.subject_id, meta.label_name(), meta.run))?;
        Ok((x, meta.clone()))
    }
}

// ---------------------------------------------------------------------------
// Shared output tables
// ---------------------------------------------------------------------------

/// Per-sample `target`, `group`, `run`, `sub_run` plus the label, group and
/// sensor tables.
pub(crate) fn insert_meta_tables<'a>(root: &mut Group, metas: impl Iterator<Item = &'a SampleMeta>) -> Result<()> {
    let mut target = Vec::new();
    let mut group = Vec::new();
    let mut run = Vec::new();
    let mut sub_run = Vec::new();
    for meta in metas {
        target.push(meta.label as i64);
        group.push(meta.group as i64);
        run.push(meta.run as i64);
        sub_run.push(meta.sub_run as i64);
    }
    root.insert_dataset("target", Array::from_i64(target))?;
    root.insert_dataset("group", Array::from_i64(group))?;
    root.insert_dataset("run", Array::from_i64(run))?;
    root.insert_dataset("sub_run", Array::from_i64(sub_run))?;

    let cfg = root.insert_group("sensor_configurations")?;
    for (name, sensors) in sensor_configurations() {
        cfg.insert_dataset(name, Array::from_i64(sensors))?;
    }
    root.insert_dataset("label_int_2_str", Array::from_text(LABEL_IDS))?;
    root.insert_dataset("group_int_to_str", Array::from_text(GROUP_IDS))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    #[test]
    fn label_and_group_tables() {
        assert_eq!(int_label_from_str_label("MHND"), Some(3));
        assert_eq!(str_label_from_int_label(6), Some("REST"));
        assert_eq!(str_label_from_int_label(7), None);
        assert_eq!(int_group_from_str_group("patient"), Some(1));
        assert_eq!(str_group_from_int_group(0), Some("control"));
    }

    #[test]
    fn sensor_configurations_are_zero_based() {
        let cfg = sensor_configurations();
        assert_eq!(cfg["all"].len(), 256);
        assert_eq!(cfg["all"][0], 0);
        assert_eq!(cfg["low_resolution_sensorimotor_cortex"], vec![58, 182]);
        assert_eq!(cfg["low_resolution_whole_head"].len(), 20);
        assert_eq!(cfg["high_resolution_sensorimotor_cortex"].len(), 27);

        let good = &cfg["high_resolution_all_but_bad_channels"];
        assert_eq!(good.len(), 224 - 27);
        assert!(!good.contains(&30));
        assert_eq!(good.last(), Some(&223));
    }

    #[test]
    fn down_sampling_averages_blocks_of_four() {
        let x = Array2::from_shape_fn((1000, 2), |(t, s)| (t + 1000 * s) as f64);
        let y = down_sample_from_1000_to_250_timestamps(&x).unwrap();
        assert_eq!(y.dim(), (250, 2));
        assert_eq!(y[[0, 0]], 1.5);
        assert_eq!(y[[1, 0]], 5.5);
        assert_eq!(y[[249, 1]], 1997.5);

        assert!(down_sample_from_1000_to_250_timestamps(&Array2::zeros((250, 2))).is_err());
    }

    fn recording(time: usize) -> Array {
        // value encodes (time, sensor, run)
        Array::Float32(ArrayD::from_shape_fn(IxDyn(&[time, 3, 2]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f32
        }))
    }

    #[test]
    fn sub_run_is_cut_from_run() {
        let x = sample_from_recording(&recording(1500), 1, 2, true).unwrap();
        assert_eq!(x.dim(), (250, 3));
        assert_eq!(x[[0, 0]], (500 * 100 + 1) as f64);
        assert_eq!(x[[0, 2]], (500 * 100 + 20 + 1) as f64);
    }

    #[test]
    fn high_resolution_sub_runs_are_down_sampled() {
        let x = sample_from_recording(&recording(6000), 0, 0, true).unwrap();
        assert_eq!(x.dim(), (250, 3));
        // mean of times 0..4 on sensor 0
        assert_eq!(x[[0, 0]], 150.0);

        let raw = sample_from_recording(&recording(6000), 0, 0, false).unwrap();
        assert_eq!(raw.nrows(), 1000);
    }

    #[test]
    fn odd_lengths_and_runs_are_rejected() {
        assert!(sample_from_recording(&recording(600), 0, 0, true).is_err());
        assert!(sample_from_recording(&recording(1500), 2, 0, true).is_err());
        assert!(sample_from_recording(&Array::from_text(["x"]), 0, 0, true).is_err());
    }

    #[test]
    fn directory_listing_enumerates_samples() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s02_patient.mat"), b"").unwrap();
        std::fs::write(dir.path().join("s01_control.mat"), b"").unwrap();
        std::fs::write(dir.path().join("unknown.mat"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let reader = SciNe01DataDirReader::new(dir.path()).unwrap();
        assert_eq!(reader.len(), 2 * 7 * 25 * 5);

        let first = reader.meta(0).unwrap();
        assert_eq!(first.subject_id, "s01_control");
        assert_eq!((first.label_name(), first.run, first.sub_run), ("IFOT", 0, 1));
        assert_eq!(reader.meta(reader.len() - 1).unwrap().group_name(), "patient");

        let all = SciNe01DataDirReader::with_options(dir.path(), false, true).unwrap();
        assert_eq!(all.len(), 2 * 7 * 25 * 6);
    }

    #[test]
    fn retain_filters_samples() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("s01_control.mat"), b"").unwrap();
        let mut reader = SciNe01DataDirReader::new(dir.path()).unwrap();
        reader.retain(|m| m.label_name() == "REST" && m.run == 3);
        assert_eq!(reader.len(), 5);
        assert_eq!(reader.labels(), vec!["REST"; 5]);
    }

    #[test]
    fn meta_tables_are_written() {
        let metas = [SampleMeta {
            subject_id: "s01_control".to_string(),
            group: 0,
            label: 4,
            run: 7,
            sub_run: 2,
        }];
        let mut root = Group::new();
        insert_meta_tables(&mut root, metas.iter()).unwrap();
        assert_eq!(root.dataset("target").unwrap().as_i64_vec(), Some(vec![4]));
        assert_eq!(root.dataset("run").unwrap().as_i64_vec(), Some(vec![7]));
        assert_eq!(root.group("sensor_configurations").unwrap().len(), 5);
        assert_eq!(root.dataset("label_int_2_str").unwrap().len(), 7);
    }
}
