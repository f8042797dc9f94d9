use std::collections::BTreeMap;

use super::{Diagram, Result, Simplex, TopologyError};

// ---------------------------------------------------------------------------
// Union-find over dense vertex indices
// ---------------------------------------------------------------------------

struct Components {
    parent: Vec<usize>,
    /// Birth value of the component rooted at each index.
    birth: Vec<f64>,
}

impl Components {
    fn new(births: Vec<f64>) -> Self {
        Self {
            parent: (0..births.len()).collect(),
            birth: births,
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }
}

// ---------------------------------------------------------------------------
// Toplex persistence
// ---------------------------------------------------------------------------

/// Persistence diagrams of a 1-dimensional complex given by its toplices.
///
/// Each toplex carries a filtration value; a simplex's value is the minimum
/// over the toplices containing it. Returns `[dim_0, dim_1]`.
///
/// Dimension 0 follows the elder rule: an edge joining two components kills
/// the one born later. An edge closing a cycle starts an essential 1-class.
/// Pairs with zero persistence are dropped. With `deessentialize`, infinite
/// deaths are replaced by the largest filtration value in the complex.
pub fn toplex_persistence_diagrams(
    toplices: &[Simplex],
    filtration_values: &[f64],
    deessentialize: bool,
) -> Result<[Diagram; 2]> {
    if toplices.len() != filtration_values.len() {
        return Err(TopologyError::LengthMismatch {
            toplices: toplices.len(),
            values: filtration_values.len(),
        });
    }

    let mut vertex_value: BTreeMap<usize, f64> = BTreeMap::new();
    let mut edge_value: BTreeMap<(usize, usize), f64> = BTreeMap::new();

    fn lower(map_value: &mut f64, value: f64) {
        if value < *map_value {
            *map_value = value;
        }
    }

    for (toplex, &value) in toplices.iter().zip(filtration_values) {
        match toplex.as_slice() {
            [v] => lower(vertex_value.entry(*v).or_insert(value), value),
            [a, b] if a == b => lower(vertex_value.entry(*a).or_insert(value), value),
            [a, b] => {
                let key = ((*a).min(*b), (*a).max(*b));
                lower(edge_value.entry(key).or_insert(value), value);
                lower(vertex_value.entry(*a).or_insert(value), value);
                lower(vertex_value.entry(*b).or_insert(value), value);
            }
            _ => return Err(TopologyError::UnsupportedDimension(toplex.clone())),
        }
    }

    let index_of: BTreeMap<usize, usize> = vertex_value
        .keys()
        .enumerate()
        .map(|(i, &v)| (v, i))
        .collect();
    let mut components = Components::new(vertex_value.values().copied().collect());

    let mut edges: Vec<((usize, usize), f64)> = edge_value.into_iter().collect();
    edges.sort_by(|a, b| a.1.total_cmp(&b.1));

    let mut dim_0: Diagram = Vec::new();
    let mut dim_1: Diagram = Vec::new();

    for ((a, b), value) in edges {
        let ra = components.find(index_of[&a]);
        let rb = components.find(index_of[&b]);
        if ra == rb {
            dim_1.push((value, f64::INFINITY));
            continue;
        }

        let (elder, younger) = if components.birth[ra] <= components.birth[rb] {
            (ra, rb)
        } else {
            (rb, ra)
        };
        let birth = components.birth[younger];
        if birth < value {
            dim_0.push((birth, value));
        }
        components.parent[younger] = elder;
    }

    for i in 0..components.parent.len() {
        if components.find(i) == i {
            dim_0.push((components.birth[i], f64::INFINITY));
        }
    }

    if deessentialize {
        let max_value = filtration_values
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        for (_, death) in dim_0.iter_mut().chain(dim_1.iter_mut()) {
            if death.is_infinite() {
                *death = max_value;
            }
        }
        // a class born at the maximum is capped to zero persistence
        dim_0.retain(|(birth, death)| birth < death);
        dim_1.retain(|(birth, death)| birth < death);
    }

    dim_0.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));
    dim_1.sort_by(|a, b| a.0.total_cmp(&b.0));

    Ok([dim_0, dim_1])
}

/// Split a diagram into its finite pairs and the births of its essential classes.
pub fn split_essential(diagram: &[(f64, f64)]) -> (Diagram, Vec<f64>) {
    let finite = diagram
        .iter()
        .copied()
        .filter(|(_, d)| d.is_finite())
        .collect();
    let essential = diagram
        .iter()
        .filter(|(_, d)| d.is_infinite())
        .map(|(b, _)| *b)
        .collect();
    (finite, essential)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vertex(v: usize) -> Simplex {
        vec![v]
    }

    fn edge(a: usize, b: usize) -> Simplex {
        vec![a, b]
    }

    #[test]
    fn length_mismatch() {
        let err = toplex_persistence_diagrams(&[vertex(0)], &[], false).unwrap_err();
        assert!(matches!(err, TopologyError::LengthMismatch { toplices: 1, values: 0 }));
    }

    #[test]
    fn triangles_are_unsupported() {
        let err = toplex_persistence_diagrams(&[vec![0, 1, 2]], &[0.0], false).unwrap_err();
        assert!(matches!(err, TopologyError::UnsupportedDimension(_)));
    }

    #[test]
    fn younger_component_dies_on_merge() {
        // 0 (born 1) -- 1 (born 3), joined at 5
        let toplices = vec![vertex(0), vertex(1), edge(0, 1)];
        let [dim_0, dim_1] = toplex_persistence_diagrams(&toplices, &[1.0, 3.0, 5.0], false).unwrap();
        assert_eq!(dim_0, vec![(1.0, f64::INFINITY), (3.0, 5.0)]);
        assert!(dim_1.is_empty());
    }

    #[test]
    fn vertex_value_inherits_minimum_of_cofaces() {
        // vertices only appear through edges
        let toplices = vec![edge(0, 1), edge(1, 2)];
        let [dim_0, _] = toplex_persistence_diagrams(&toplices, &[2.0, 4.0], false).unwrap();
        // all vertices born at 2 or later; vertex 2 is born at 4 and merges at 4
        assert_eq!(dim_0, vec![(2.0, f64::INFINITY)]);
    }

    #[test]
    fn cycle_gives_essential_one_class() {
        let toplices = vec![
            vertex(0),
            vertex(1),
            vertex(2),
            edge(0, 1),
            edge(1, 2),
            edge(0, 2),
        ];
        let values = [0.0, 0.0, 0.0, 1.0, 2.0, 3.0];
        let [dim_0, dim_1] = toplex_persistence_diagrams(&toplices, &values, false).unwrap();
        assert_eq!(dim_0, vec![(0.0, 1.0), (0.0, 2.0), (0.0, f64::INFINITY)]);
        assert_eq!(dim_1, vec![(3.0, f64::INFINITY)]);
    }

    #[test]
    fn two_components_two_essentials() {
        let toplices = vec![vertex(0), vertex(1), vertex(7)];
        let [dim_0, _] = toplex_persistence_diagrams(&toplices, &[0.5, 1.5, 2.5], false).unwrap();
        assert_eq!(dim_0.len(), 3);
        assert!(dim_0.iter().all(|(_, d)| d.is_infinite()));
    }

    #[test]
    fn deessentialize_caps_infinite_deaths() {
        let toplices = vec![vertex(0), vertex(1), edge(0, 1)];
        let [dim_0, _] = toplex_persistence_diagrams(&toplices, &[1.0, 3.0, 5.0], true).unwrap();
        assert_eq!(dim_0, vec![(1.0, 5.0), (3.0, 5.0)]);
    }

    #[test]
    fn capped_classes_without_persistence_are_dropped() {
        // constant complex: every class is born at the cap
        let toplices = vec![vertex(0), vertex(1), edge(0, 1)];
        let [dim_0, dim_1] = toplex_persistence_diagrams(&toplices, &[0.0, 0.0, 0.0], true).unwrap();
        assert!(dim_0.is_empty());
        assert!(dim_1.is_empty());

        // isolated vertex 2 is born at the cap as well
        let toplices = vec![vertex(0), vertex(2), edge(0, 1)];
        let [dim_0, _] = toplex_persistence_diagrams(&toplices, &[0.0, 4.0, 4.0], true).unwrap();
        assert_eq!(dim_0, vec![(0.0, 4.0)]);
    }

    #[test]
    fn split_essential_separates_pairs() {
        let (finite, essential) = split_essential(&[(0.0, 1.0), (2.0, f64::INFINITY)]);
        assert_eq!(finite, vec![(0.0, 1.0)]);
        assert_eq!(essential, vec![2.0]);
    }
}
