//! The EEG samples themselves, one float32 signal per sensor, together with
//! their label, group and run bookkeeping.

use std::path::Path;

use anyhow::Result;
use ndarray::{Array2, Axis};

use crate::container::{Array, Group};
use crate::generation::{write_output, ProgressCounter};

use super::{insert_meta_tables, SciNe01DataDirReader};

pub const README: &str = "'data': access <index>/<sensor> \n'target': target[i] = label of 'data'[i]";

fn insert_sample(data: &mut Group, index: usize, x: &Array2<f64>) -> Result<()> {
    let sample = data.insert_group(index.to_string())?;
    for (i_sensor, column) in x.axis_iter(Axis(1)).enumerate() {
        let signal: Vec<f32> = column.iter().map(|&v| v as f32).collect();
        sample.insert_dataset(i_sensor.to_string(), Array::from_f32(signal))?;
    }
    Ok(())
}

/// Build the output tree for every sample of `reader`.
pub fn build(reader: &SciNe01DataDirReader) -> Result<Group> {
    let mut root = Group::new();
    root.set_attr("readme", README);

    let progress = ProgressCounter::new("eeg raw signal", reader.len());
    let data = root.insert_group("data")?;
    for index in 0..reader.len() {
        let (x, _) = reader.get(index)?;
        insert_sample(data, index, &x)?;
        progress.trigger_progress();
    }
    insert_meta_tables(&mut root, reader.metas())?;
    Ok(root)
}

pub fn run(reader: &SciNe01DataDirReader, output_path: &Path) -> Result<()> {
    let root = build(reader)?;
    write_output(output_path, &root)
}
