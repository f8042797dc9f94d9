use std::collections::{BTreeMap, BTreeSet};
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::warn;

use super::{Result, Simplex, TopologyError};

/// An undirected simple graph with precomputed vertex degrees.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    /// Vertex ids, ascending.
    pub vertices: Vec<usize>,
    /// Undirected edges as `(low, high)`, deduplicated and sorted.
    pub edges: Vec<(usize, usize)>,
    pub degree: BTreeMap<usize, usize>,
}

impl Graph {
    /// Build from adjacency lists. Every listed node and every neighbour
    /// becomes a vertex; each undirected edge is kept once and self loops
    /// are skipped.
    pub fn from_adjacency<I>(adjacency: I) -> Self
    where
        I: IntoIterator<Item = (usize, Vec<usize>)>,
    {
        let mut vertices = BTreeSet::new();
        let mut edges = BTreeSet::new();

        for (node, neighbours) in adjacency {
            vertices.insert(node);
            for n in neighbours {
                vertices.insert(n);
                if n == node {
                    continue;
                }
                edges.insert((node.min(n), node.max(n)));
            }
        }

        let mut degree: BTreeMap<usize, usize> = vertices.iter().map(|&v| (v, 0)).collect();
        for &(a, b) in &edges {
            *degree.entry(a).or_default() += 1;
            *degree.entry(b).or_default() += 1;
        }

        Graph {
            vertices: vertices.into_iter().collect(),
            edges: edges.into_iter().collect(),
            degree,
        }
    }

    /// Vertices followed by edges, as simplices.
    pub fn toplices(&self) -> Vec<Simplex> {
        self.vertices
            .iter()
            .map(|&v| vec![v])
            .chain(self.edges.iter().map(|&(a, b)| vec![a, b]))
            .collect()
    }

    pub fn max_degree(&self) -> usize {
        self.degree.values().copied().max().unwrap_or(0)
    }
}

/// Filtration value of a simplex: the largest degree among its vertices.
pub fn degree_filtration(simplex: &[usize], degree: &BTreeMap<usize, usize>) -> f64 {
    simplex
        .iter()
        .map(|v| degree.get(v).copied().unwrap_or(0))
        .max()
        .unwrap_or(0) as f64
}

/// Read a graph in METIS format.
///
/// The header holds `<n_vertices> <n_edges>`; line `i` after it lists the
/// neighbours of vertex `i`. Neighbour ids are taken as written. Lines
/// starting with `%` are comments. Both header counts are checked.
pub fn read_graph_from_metis_file(path: &Path) -> Result<Graph> {
    let io_err = |source| TopologyError::Io {
        path: path.to_path_buf(),
        source,
    };
    let malformed = |message: String| TopologyError::MalformedGraph {
        path: path.to_path_buf(),
        message,
    };

    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut lines = BufReader::new(file)
        .lines()
        .filter(|l| !matches!(l, Ok(s) if s.starts_with('%')));

    let header = lines
        .next()
        .ok_or_else(|| malformed("missing header".to_string()))?
        .map_err(io_err)?;
    let mut fields = header.split_whitespace().map(str::parse::<usize>);
    let (n_vertices, n_edges) = match (fields.next(), fields.next()) {
        (Some(Ok(v)), Some(Ok(e))) => (v, e),
        _ => return Err(malformed(format!("bad header '{header}'"))),
    };

    let mut adjacency = Vec::with_capacity(n_vertices);
    for (node, line) in lines.enumerate() {
        let line = line.map_err(io_err)?;
        let neighbours = line
            .split_whitespace()
            .map(|tok| {
                tok.parse::<usize>()
                    .map_err(|_| malformed(format!("line {}: '{tok}' is not a vertex id", node + 2)))
            })
            .collect::<Result<Vec<_>>>()?;
        adjacency.push((node, neighbours));
    }

    // a final blank line only terminates the file
    if adjacency.len() == n_vertices + 1 && adjacency.last().is_some_and(|(_, n)| n.is_empty()) {
        adjacency.pop();
    }
    if adjacency.len() != n_vertices {
        return Err(malformed(format!(
            "header announces {n_vertices} vertices but {} adjacency lines follow",
            adjacency.len()
        )));
    }

    let graph = Graph::from_adjacency(adjacency);
    if graph.edges.len() != n_edges {
        return Err(malformed(format!(
            "header announces {n_edges} edges but {} were read",
            graph.edges.len()
        )));
    }
    if graph.vertices.len() != n_vertices {
        warn!(
            "{}: neighbour ids reference {} vertices, header announces {n_vertices}",
            path.display(),
            graph.vertices.len()
        );
    }

    Ok(graph)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn metis_file(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn adjacency_dedups_edges_and_counts_degrees() {
        let g = Graph::from_adjacency(vec![(0, vec![1, 2]), (1, vec![0]), (2, vec![0, 2])]);
        assert_eq!(g.vertices, vec![0, 1, 2]);
        assert_eq!(g.edges, vec![(0, 1), (0, 2)]);
        assert_eq!(g.degree[&0], 2);
        assert_eq!(g.degree[&2], 1);
        assert_eq!(g.max_degree(), 2);
    }

    #[test]
    fn toplices_list_vertices_then_edges() {
        let g = Graph::from_adjacency(vec![(0, vec![1])]);
        assert_eq!(g.toplices(), vec![vec![0], vec![1], vec![0, 1]]);
    }

    #[test]
    fn degree_filtration_takes_max() {
        let g = Graph::from_adjacency(vec![(0, vec![1, 2, 3]), (1, vec![0])]);
        assert_eq!(degree_filtration(&[0, 1], &g.degree), 3.0);
        assert_eq!(degree_filtration(&[1], &g.degree), 1.0);
    }

    #[test]
    fn reads_metis_triangle() {
        let f = metis_file("3 3\n1 2\n0 2\n0 1\n");
        let g = read_graph_from_metis_file(f.path()).unwrap();
        assert_eq!(g.edges, vec![(0, 1), (0, 2), (1, 2)]);
    }

    #[test]
    fn isolated_vertex_is_an_empty_line() {
        let f = metis_file("% comment\n3 1\n1\n0\n\n");
        let g = read_graph_from_metis_file(f.path()).unwrap();
        assert_eq!(g.vertices, vec![0, 1, 2]);
        assert_eq!(g.degree[&2], 0);
    }

    #[test]
    fn edge_count_mismatch_is_rejected() {
        let f = metis_file("2 5\n1\n0\n");
        let err = read_graph_from_metis_file(f.path()).unwrap_err();
        assert!(matches!(err, TopologyError::MalformedGraph { .. }));
    }

    #[test]
    fn bad_header_is_rejected() {
        let f = metis_file("three edges\n");
        assert!(matches!(
            read_graph_from_metis_file(f.path()),
            Err(TopologyError::MalformedGraph { .. })
        ));
    }
}
