//! Connectivity graph over hostnames.
//!
//! Wired edges are fixed for the episode; wireless edges are rebuilt
//! whenever positions or ranges change. Routing is unweighted BFS shortest
//! path; a connected-components partition short-circuits queries between
//! hosts that cannot reach each other.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Undirected reachability graph. Adjacency sets are ordered so that path
/// tie-breaks and iteration are stable across runs with the same seed.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    /// Combined adjacency (wired plus current wireless edges)
    adjacency: BTreeMap<String, BTreeSet<String>>,

    /// Wired edges only; survives wireless rebuilds
    wired: BTreeMap<String, BTreeSet<String>>,

    /// Component id per node, recomputed on every edge change
    components: BTreeMap<String, usize>,
}

impl TopologyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node with no edges.
    pub fn add_node(&mut self, hostname: impl Into<String>) {
        let hostname = hostname.into();
        self.adjacency.entry(hostname.clone()).or_default();
        self.wired.entry(hostname).or_default();
        self.recompute_components();
    }

    /// Adds an undirected wired edge. Wired edges persist across wireless
    /// rebuilds.
    pub fn add_wired_edge(&mut self, a: &str, b: &str) {
        if a == b {
            return;
        }
        self.wired.entry(a.to_string()).or_default().insert(b.to_string());
        self.wired.entry(b.to_string()).or_default().insert(a.to_string());
        self.adjacency.entry(a.to_string()).or_default().insert(b.to_string());
        self.adjacency.entry(b.to_string()).or_default().insert(a.to_string());
        self.recompute_components();
    }

    /// Replaces the wireless overlay with the given edge set and rebuilds
    /// the combined adjacency.
    pub fn set_wireless_edges(&mut self, edges: &[(String, String)]) {
        // Reset to the wired baseline, then layer the overlay on top.
        self.adjacency = self.wired.clone();
        for (a, b) in edges {
            if a == b {
                continue;
            }
            self.adjacency.entry(a.clone()).or_default().insert(b.clone());
            self.adjacency.entry(b.clone()).or_default().insert(a.clone());
        }
        self.recompute_components();
    }

    /// Returns true if both hosts exist and share a connected component.
    pub fn reachable(&self, src: &str, dst: &str) -> bool {
        match (self.components.get(src), self.components.get(dst)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    /// Shortest path from `src` to `dst` as the ordered hostname sequence,
    /// first element `src` and last `dst`. Returns None when the hosts are
    /// in different components; callers treat that as unreachable, not as
    /// an error. Equal-length paths tie-break on adjacency order.
    pub fn route(&self, src: &str, dst: &str) -> Option<Vec<String>> {
        if !self.reachable(src, dst) {
            return None;
        }
        if src == dst {
            return Some(vec![src.to_string()]);
        }

        let mut parents: BTreeMap<&str, &str> = BTreeMap::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        queue.push_back(src);

        while let Some(current) = queue.pop_front() {
            for neighbor in &self.adjacency[current] {
                let neighbor = neighbor.as_str();
                if neighbor == src || parents.contains_key(neighbor) {
                    continue;
                }
                parents.insert(neighbor, current);
                if neighbor == dst {
                    let mut path = vec![dst.to_string()];
                    let mut node = dst;
                    while let Some(&parent) = parents.get(node) {
                        path.push(parent.to_string());
                        node = parent;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Number of connected components.
    pub fn component_count(&self) -> usize {
        self.components.values().copied().collect::<BTreeSet<_>>().len()
    }

    /// Neighbors of a node.
    pub fn neighbors(&self, hostname: &str) -> Option<&BTreeSet<String>> {
        self.adjacency.get(hostname)
    }

    fn recompute_components(&mut self) {
        self.components.clear();
        let mut next_component = 0usize;

        for start in self.adjacency.keys() {
            if self.components.contains_key(start.as_str()) {
                continue;
            }
            let mut queue: VecDeque<&str> = VecDeque::new();
            let mut visited: BTreeSet<&str> = BTreeSet::new();
            queue.push_back(start);
            visited.insert(start);
            while let Some(current) = queue.pop_front() {
                for neighbor in &self.adjacency[current] {
                    if visited.insert(neighbor.as_str()) {
                        queue.push_back(neighbor);
                    }
                }
            }
            for node in visited {
                self.components.insert(node.to_string(), next_component);
            }
            next_component += 1;
        }
    }
}
