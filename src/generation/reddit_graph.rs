//! Reddit discussion graphs (REDDIT-MULTI-5K / 12K) filtered by vertex degree.
//!
//! Input: a pickle (or JSON) mapping
//! `{"graph": {graph_id: {node_id: {"neighbors": [...]}}}, "labels": [...]}`.
//! Output layout:
//! ```text
//! /data/<graph_id>/{dim_0, dim_0_ess, dim_1_ess}
//! /target[graph_id]        class label
//! /max_degree[graph_id]    largest vertex degree
//! /readme
//! ```

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use log::{debug, info};
use serde_json::Value as JsonValue;
use serde_pickle::{HashableValue, Value as PickleValue};

use crate::container::{Array, Group};
use crate::topology::{degree_filtration, toplex_persistence_diagrams, Diagram, Graph};

use super::{insert_graph_diagrams, parallel_map, write_output, ProgressCounter};

pub const README: &str = "'data': access <graph_id>/{dim_0, dim_0_ess, dim_1_ess}\n\
'target': target[i] = label of 'data'[i]\n\
'max_degree': max_degree[i] = largest vertex degree of graph i (filtration maximum)";

/// Adjacency lists of every graph plus one label per graph id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGraphs {
    pub graphs: BTreeMap<usize, Vec<(usize, Vec<usize>)>>,
    pub labels: Vec<i64>,
}

struct GraphJob {
    graph_id: usize,
    adjacency: Vec<(usize, Vec<usize>)>,
    label: i64,
}

struct GraphResult {
    graph_id: usize,
    dgms: [Diagram; 2],
    label: i64,
    max_degree: f64,
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Load the raw graph collection. Dispatch by extension: `.json` is read as
/// JSON, anything else as a pickle.
pub fn load_raw_graphs(path: &Path) -> Result<RawGraphs> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);

    match ext.as_str() {
        "json" => {
            let root: JsonValue = serde_json::from_reader(reader).context("parsing JSON")?;
            raw_graphs_from_json(&root)
        }
        _ => {
            let root = serde_pickle::value_from_reader(reader, serde_pickle::DeOptions::new())
                .context("parsing pickle")?;
            raw_graphs_from_pickle(&root)
        }
    }
}

fn raw_graphs_from_json(root: &JsonValue) -> Result<RawGraphs> {
    let id = |key: &str| {
        key.parse::<usize>()
            .map_err(|_| anyhow!("'{key}' is not a non-negative integer id"))
    };

    let graph_map = root
        .get("graph")
        .and_then(JsonValue::as_object)
        .context("expected an object under 'graph'")?;

    let mut graphs = BTreeMap::new();
    for (graph_key, nodes) in graph_map {
        let nodes = nodes
            .as_object()
            .with_context(|| format!("graph {graph_key} is not an object"))?;
        let mut adjacency = Vec::with_capacity(nodes.len());
        for (node_key, node) in nodes {
            let neighbours = node
                .get("neighbors")
                .and_then(JsonValue::as_array)
                .with_context(|| format!("graph {graph_key}, node {node_key}: missing 'neighbors'"))?
                .iter()
                .map(|n| {
                    n.as_u64()
                        .map(|n| n as usize)
                        .with_context(|| format!("graph {graph_key}: bad neighbour {n}"))
                })
                .collect::<Result<Vec<_>>>()?;
            adjacency.push((id(node_key)?, neighbours));
        }
        graphs.insert(id(graph_key)?, adjacency);
    }

    let labels = root
        .get("labels")
        .and_then(JsonValue::as_array)
        .context("expected an array under 'labels'")?
        .iter()
        .map(|l| {
            l.as_i64()
                .or_else(|| l.as_f64().map(|f| f as i64))
                .with_context(|| format!("label {l} is not a number"))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(RawGraphs { graphs, labels })
}

fn hashable_as_usize(key: &HashableValue) -> Option<usize> {
    match key {
        HashableValue::I64(i) => usize::try_from(*i).ok(),
        HashableValue::String(s) => s.parse().ok(),
        HashableValue::Bytes(b) => std::str::from_utf8(b).ok()?.parse().ok(),
        _ => None,
    }
}

fn pickle_as_usize(value: &PickleValue) -> Option<usize> {
    match value {
        PickleValue::I64(i) => usize::try_from(*i).ok(),
        _ => None,
    }
}

fn pickle_as_i64(value: &PickleValue) -> Option<i64> {
    match value {
        PickleValue::I64(i) => Some(*i),
        PickleValue::F64(f) => Some(*f as i64),
        _ => None,
    }
}

/// Pickles written by Python 2 carry `str` keys as bytes.
fn pickle_get<'a>(dict: &'a BTreeMap<HashableValue, PickleValue>, key: &str) -> Option<&'a PickleValue> {
    dict.get(&HashableValue::String(key.to_string()))
        .or_else(|| dict.get(&HashableValue::Bytes(key.as_bytes().to_vec())))
}

fn pickle_sequence(value: &PickleValue) -> Option<&[PickleValue]> {
    match value {
        PickleValue::List(v) | PickleValue::Tuple(v) => Some(v.as_slice()),
        _ => None,
    }
}

fn raw_graphs_from_pickle(root: &PickleValue) -> Result<RawGraphs> {
    let PickleValue::Dict(root) = root else {
        bail!("expected a dict at the top level");
    };

    let Some(PickleValue::Dict(graph_map)) = pickle_get(root, "graph") else {
        bail!("expected a dict under 'graph'");
    };

    let mut graphs = BTreeMap::new();
    for (graph_key, nodes) in graph_map {
        let graph_id = hashable_as_usize(graph_key).with_context(|| format!("bad graph id {graph_key:?}"))?;
        let PickleValue::Dict(nodes) = nodes else {
            bail!("graph {graph_id} is not a dict");
        };
        let mut adjacency = Vec::with_capacity(nodes.len());
        for (node_key, node) in nodes {
            let node_id = hashable_as_usize(node_key)
                .with_context(|| format!("graph {graph_id}: bad node id {node_key:?}"))?;
            let neighbours = match node {
                PickleValue::Dict(d) => pickle_get(d, "neighbors").and_then(pickle_sequence),
                _ => None,
            }
            .with_context(|| format!("graph {graph_id}, node {node_id}: missing 'neighbors'"))?
            .iter()
            .map(|n| pickle_as_usize(n).with_context(|| format!("graph {graph_id}: bad neighbour {n:?}")))
            .collect::<Result<Vec<_>>>()?;
            adjacency.push((node_id, neighbours));
        }
        graphs.insert(graph_id, adjacency);
    }

    let labels = pickle_get(root, "labels")
        .and_then(pickle_sequence)
        .context("expected a list under 'labels'")?
        .iter()
        .map(|l| pickle_as_i64(l).with_context(|| format!("label {l:?} is not a number")))
        .collect::<Result<Vec<_>>>()?;

    Ok(RawGraphs { graphs, labels })
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

fn job(args: GraphJob) -> Result<GraphResult> {
    let graph = Graph::from_adjacency(args.adjacency);
    let toplices = graph.toplices();
    let values: Vec<f64> = toplices
        .iter()
        .map(|s| degree_filtration(s, &graph.degree))
        .collect();
    let dgms = toplex_persistence_diagrams(&toplices, &values, false)
        .with_context(|| format!("persistence of graph {}", args.graph_id))?;

    Ok(GraphResult {
        graph_id: args.graph_id,
        dgms,
        label: args.label,
        max_degree: graph.max_degree() as f64,
    })
}

/// Build the output tree from already loaded graphs.
pub fn build(raw: RawGraphs, max_cpu: usize) -> Result<Group> {
    let n_graphs = raw.graphs.len();
    let jobs = raw
        .graphs
        .into_iter()
        .map(|(graph_id, adjacency)| {
            if graph_id >= n_graphs {
                bail!("graph id {graph_id} out of range for {n_graphs} graphs");
            }
            let label = *raw
                .labels
                .get(graph_id)
                .with_context(|| format!("no label for graph {graph_id}"))?;
            Ok(GraphJob {
                graph_id,
                adjacency,
                label,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let progress = ProgressCounter::new("reddit graphs", jobs.len());
    let results = parallel_map(jobs, max_cpu, |args| {
        let result = job(args);
        progress.trigger_progress();
        result
    })?;

    let mut root = Group::new();
    let mut target = vec![0i64; n_graphs];
    let mut max_degree = vec![0f64; n_graphs];
    let data = root.insert_group("data")?;
    for result in results {
        let result = result?;
        debug!("graph {}: {} dim-0 pairs", result.graph_id, result.dgms[0].len());
        insert_graph_diagrams(data.insert_group(result.graph_id.to_string())?, &result.dgms)?;
        target[result.graph_id] = result.label;
        max_degree[result.graph_id] = result.max_degree;
    }

    root.insert_dataset("target", Array::from_i64(target))?;
    root.insert_dataset("max_degree", Array::from_f64(max_degree))?;
    root.insert_dataset("readme", Array::from_text([README]))?;
    Ok(root)
}

pub fn run(raw_data_path: &Path, output_path: &Path, max_cpu: usize) -> Result<()> {
    info!("reading graphs from {}", raw_data_path.display());
    let raw = load_raw_graphs(raw_data_path)?;
    let root = build(raw, max_cpu)?;
    write_output(output_path, &root)
}
