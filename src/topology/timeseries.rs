use super::persistence::toplex_persistence_diagrams;
use super::{Diagram, Result};

pub fn height_filtration_from_bottom(value: f64) -> f64 {
    value
}

pub fn height_filtration_from_top(value: f64) -> f64 {
    -value
}

/// Persistence of a time series seen as a path graph.
///
/// Vertex `i` gets `filtration(x_i)`, edge `(i, i+1)` the larger of its two
/// endpoint values. Essential classes are capped at the maximum value.
pub fn pershom_of_timeseries<F>(series: &[f64], filtration: F) -> Result<[Diagram; 2]>
where
    F: Fn(f64) -> f64,
{
    let mut toplices = Vec::with_capacity(2 * series.len());
    let mut values = Vec::with_capacity(2 * series.len());

    for (i, &x) in series.iter().enumerate() {
        toplices.push(vec![i]);
        values.push(filtration(x));

        if let Some(&next) = series.get(i + 1) {
            toplices.push(vec![i, i + 1]);
            values.push(filtration(x).max(filtration(next)));
        }
    }

    toplex_persistence_diagrams(&toplices, &values, true)
}

/// Zero mean, unit (population) standard deviation.
///
/// A constant signal is only centred.
pub fn z_normalize(signal: &[f64]) -> Vec<f64> {
    if signal.is_empty() {
        return Vec::new();
    }
    let n = signal.len() as f64;
    let mean = signal.iter().sum::<f64>() / n;
    let std = (signal.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n).sqrt();
    let scale = if std > 0.0 { std } else { 1.0 };
    signal.iter().map(|x| (x - mean) / scale).collect()
}
