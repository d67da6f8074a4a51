//! Mate graph: build, prune, elect a root, orient.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use armature_model::name::{split_mate_key, SUBASSEMBLY_JOINER};
use armature_model::Instance;
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::{info, warn};

use crate::parse::{InstanceMap, MateMap, OccurrenceMap, PartMap};
use crate::{CompileError, Result};

/// The oriented kinematic graph: node keys, directed edges in processing
/// order (spanning-tree edges first, then the closeness-directed extras),
/// and the elected root.
#[derive(Debug, Clone)]
pub struct KinematicGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<(String, String)>,
    pub root: String,
}

/// Build the undirected mate graph, keep its largest connected component,
/// elect a root and orient every edge.
pub fn create_graph(
    occurrences: &OccurrenceMap,
    instances: &InstanceMap,
    parts: &PartMap,
    mates: &MateMap,
    use_user_defined_root: bool,
) -> Result<KinematicGraph> {
    let mut graph: UnGraph<String, ()> = UnGraph::new_undirected();
    let mut index_of: HashMap<String, NodeIndex> = HashMap::new();
    let mut user_defined_root: Option<String> = None;

    for (key, occurrence) in occurrences {
        if use_user_defined_root && occurrence.fixed {
            user_defined_root = Some(key.clone());
        }
        // Part occurrences and collapsed rigid sub-assemblies become
        // links; articulated assembly occurrences are scopes, not bodies.
        let is_link = match instances.get(key) {
            Some(Instance::Part(_)) => true,
            Some(Instance::Assembly(a)) => a.is_rigid,
            None => false,
        };
        if !is_link || occurrence.hidden {
            continue;
        }
        if !parts.contains_key(key) {
            warn!(key = %key, "part record missing, leaving occurrence out of the graph");
            continue;
        }
        let index = graph.add_node(key.clone());
        index_of.insert(key.clone(), index);
    }

    // A fixed occurrence inside a rigid sub-assembly elects the rigid link.
    if let Some(root) = &user_defined_root {
        if let Some(head) = root.split(SUBASSEMBLY_JOINER).next() {
            if head != root && parts.contains_key(head) {
                user_defined_root = Some(head.to_owned());
            }
        }
    }

    // Mate edges. Rigid-assembly links have no part occurrence node of
    // their own and join the graph through their first mate.
    let mut edge_order: Vec<(String, String)> = Vec::new();
    for key in mates.keys() {
        let Some((parent, child)) = split_mate_key(key) else {
            warn!(key = %key, "malformed mate key");
            continue;
        };
        for side in [parent, child] {
            if !index_of.contains_key(side) {
                if parts.contains_key(side) {
                    let index = graph.add_node(side.to_owned());
                    index_of.insert(side.to_owned(), index);
                } else {
                    return Err(CompileError::MateSideMissing {
                        mate: key.clone(),
                        side: side.to_owned(),
                    });
                }
            }
        }
        graph.add_edge(index_of[parent], index_of[child], ());
        edge_order.push((parent.to_owned(), child.to_owned()));
    }

    if graph.node_count() == 0 {
        return Err(CompileError::DisconnectedAssembly);
    }
    if graph.edge_count() == 0 && graph.node_count() > 1 {
        return Err(CompileError::DisconnectedAssembly);
    }

    let component = largest_component(&graph);
    let dropped = graph.node_count() - component.len();
    if dropped > 0 {
        warn!(
            kept = component.len(),
            dropped, "assembly is not fully connected, keeping the largest component"
        );
    }

    let in_component: HashSet<&str> = component.iter().map(|s| s.as_str()).collect();
    let centrality = closeness_centrality(&graph, &index_of, &component);

    let root = match user_defined_root {
        Some(root) if in_component.contains(root.as_str()) => root,
        Some(root) => {
            warn!(root = %root, "user-defined root fell outside the main component");
            centrality_root(&centrality)
        }
        None => centrality_root(&centrality),
    };
    if !in_component.contains(root.as_str()) {
        return Err(CompileError::RootNotInGraph(root));
    }

    // Orient: BFS tree away from the root, then each remaining undirected
    // edge once, pointed from the more central endpoint outward.
    let mut edges: Vec<(String, String)> = Vec::new();
    let mut covered: HashSet<(String, String)> = HashSet::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut queue = VecDeque::new();
    visited.insert(root.clone());
    queue.push_back(root.clone());
    while let Some(current) = queue.pop_front() {
        let mut neighbors: Vec<String> = graph
            .neighbors(index_of[&current])
            .map(|n| graph[n].clone())
            .collect();
        neighbors.sort();
        for neighbor in neighbors {
            if visited.insert(neighbor.clone()) {
                edges.push((current.clone(), neighbor.clone()));
                covered.insert((current.clone(), neighbor.clone()));
                queue.push_back(neighbor);
            }
        }
    }

    for (a, b) in edge_order {
        if !in_component.contains(a.as_str()) || !in_component.contains(b.as_str()) {
            continue;
        }
        if covered.contains(&(a.clone(), b.clone())) || covered.contains(&(b.clone(), a.clone())) {
            continue;
        }
        let (from, to) = if centrality.get(&a).copied().unwrap_or(0.0)
            > centrality.get(&b).copied().unwrap_or(0.0)
        {
            (a, b)
        } else {
            (b, a)
        };
        covered.insert((from.clone(), to.clone()));
        edges.push((from, to));
    }

    let mut nodes: Vec<String> = component;
    nodes.sort();

    info!(
        nodes = nodes.len(),
        edges = edges.len(),
        root = %root,
        "graph oriented"
    );

    Ok(KinematicGraph { nodes, edges, root })
}

/// Node keys of the largest connected component; ties go to the component
/// holding the lexicographically smallest key.
fn largest_component(graph: &UnGraph<String, ()>) -> Vec<String> {
    let mut seen: HashSet<NodeIndex> = HashSet::new();
    let mut best: Vec<String> = Vec::new();
    let mut indices: Vec<NodeIndex> = graph.node_indices().collect();
    indices.sort_by(|a, b| graph[*a].cmp(&graph[*b]));

    for start in indices {
        if seen.contains(&start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = VecDeque::from([start]);
        seen.insert(start);
        while let Some(node) = queue.pop_front() {
            component.push(graph[node].clone());
            for neighbor in graph.neighbors(node) {
                if seen.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        if component.len() > best.len() {
            best = component;
        }
    }
    best
}

/// Closeness centrality within one connected component:
/// `(n - 1) / sum(shortest path lengths)`.
fn closeness_centrality(
    graph: &UnGraph<String, ()>,
    index_of: &HashMap<String, NodeIndex>,
    component: &[String],
) -> BTreeMap<String, f64> {
    let mut centrality = BTreeMap::new();
    for key in component {
        let start = index_of[key];
        let mut distance: HashMap<NodeIndex, usize> = HashMap::from([(start, 0)]);
        let mut queue = VecDeque::from([start]);
        let mut total = 0usize;
        while let Some(node) = queue.pop_front() {
            let d = distance[&node];
            for neighbor in graph.neighbors(node) {
                if !distance.contains_key(&neighbor) {
                    distance.insert(neighbor, d + 1);
                    total += d + 1;
                    queue.push_back(neighbor);
                }
            }
        }
        let reachable = distance.len();
        let value = if total > 0 {
            (reachable as f64 - 1.0) / total as f64
        } else {
            0.0
        };
        centrality.insert(key.clone(), value);
    }
    centrality
}

/// The most central node; lexicographic order breaks exact ties so key
/// election stays deterministic.
fn centrality_root(centrality: &BTreeMap<String, f64>) -> String {
    let mut best_key = String::new();
    let mut best_value = f64::NEG_INFINITY;
    for (key, value) in centrality {
        if *value > best_value {
            best_value = *value;
            best_key = key.clone();
        }
    }
    best_key
}
