//! Per-sensor 0-dimensional persistence of the EEG signals under the height
//! filtration from the bottom and from the top.

use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Axis};

use crate::container::{Array, Group};
use crate::topology::{
    height_filtration_from_bottom, height_filtration_from_top, pershom_of_timeseries, z_normalize, Diagram,
};

use super::{insert_meta_tables, SciNe01DataDirReader};
use crate::generation::{parallel_map, write_output, ProgressCounter};

pub const README: &str = "'data': access <index>/<top|bottom>/<sensor>\n\
'target': target[i] = label of 'data'[i] (see 'label_int_2_str')";

/// Diagrams of one sample, one per sensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SampleDiagrams {
    pub top: Vec<Diagram>,
    pub bottom: Vec<Diagram>,
}

/// z-normalise every sensor column of `x` (time × sensor) and compute its
/// dimension-0 diagram for both filtrations.
pub fn sample_diagrams(x: &Array2<f64>) -> Result<SampleDiagrams> {
    let mut dgms = SampleDiagrams::default();
    for (i_sensor, column) in x.axis_iter(Axis(1)).enumerate() {
        let signal = z_normalize(&column.to_vec());
        let [top, _] = pershom_of_timeseries(&signal, height_filtration_from_top)
            .with_context(|| format!("sensor {i_sensor}, top filtration"))?;
        let [bottom, _] = pershom_of_timeseries(&signal, height_filtration_from_bottom)
            .with_context(|| format!("sensor {i_sensor}, bottom filtration"))?;
        dgms.top.push(top);
        dgms.bottom.push(bottom);
    }
    Ok(dgms)
}

fn insert_sample(data: &mut Group, index: usize, dgms: &SampleDiagrams) -> Result<()> {
    let sample = data.insert_group(index.to_string())?;
    for (filtration, per_sensor) in [("top", &dgms.top), ("bottom", &dgms.bottom)] {
        let grp = sample.insert_group(filtration)?;
        for (i_sensor, dgm) in per_sensor.iter().enumerate() {
            grp.insert_dataset(i_sensor.to_string(), Array::from_pairs_f32(dgm))?;
        }
    }
    Ok(())
}

/// Build the output tree for every sample of `reader`.
pub fn build(reader: &SciNe01DataDirReader, max_cpu: usize) -> Result<Group> {
    let progress = ProgressCounter::new("eeg persistence", reader.len());
    let results = parallel_map((0..reader.len()).collect(), max_cpu, |index: usize| {
        let result = reader
            .get(index)
            .and_then(|(x, _)| sample_diagrams(&x))
            .map(|dgms| (index, dgms));
        progress.trigger_progress();
        result
    })?;

    let mut root = Group::new();
    root.set_attr("readme", README);
    let data = root.insert_group("data")?;
    for result in results {
        let (index, dgms) = result?;
        insert_sample(data, index, &dgms)?;
    }
    insert_meta_tables(&mut root, reader.metas())?;
    Ok(root)
}

pub fn run(reader: &SciNe01DataDirReader, output_path: &Path, max_cpu: usize) -> Result<()> {
    let root = build(reader, max_cpu)?;
    write_output(output_path, &root)
}
