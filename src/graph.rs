//! Labelled input graphs and their JSON form.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::EdgeLabel;
use crate::error::{Result, WlError};

/// Node weights are initial labels; the outgoing edges of a node, with
/// their labels, are its adjacency list.
pub type WlGraph = DiGraph<String, EdgeLabel>;

/// Build a graph from node labels and directed `(source, target, label)`
/// edges.
pub fn labelled_graph<S: AsRef<str>>(labels: &[S], edges: &[(usize, usize, EdgeLabel)]) -> WlGraph {
    let mut graph = WlGraph::with_capacity(labels.len(), edges.len());
    let nodes: Vec<NodeIndex> = labels
        .iter()
        .map(|label| graph.add_node(label.as_ref().to_string()))
        .collect();
    for &(u, v, label) in edges {
        graph.add_edge(nodes[u], nodes[v], label);
    }
    graph
}

/// Add the edge in both directions.
pub fn add_undirected_edge(graph: &mut WlGraph, u: usize, v: usize, label: EdgeLabel) {
    graph.add_edge(NodeIndex::new(u), NodeIndex::new(v), label);
    graph.add_edge(NodeIndex::new(v), NodeIndex::new(u), label);
}

/// `(label, target)` pairs leaving node `u`.
pub(crate) fn adjacency(graph: &WlGraph, u: usize) -> impl Iterator<Item = (EdgeLabel, usize)> + '_ {
    graph
        .edges(NodeIndex::new(u))
        .map(|edge| (*edge.weight(), edge.target().index()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<(usize, usize, EdgeLabel)>,
}

pub fn to_petgraph(g: &SerializableGraph) -> Result<WlGraph> {
    let n = g.nodes.len();
    if let Some(&(u, v, _)) = g.edges.iter().find(|&&(u, v, _)| u >= n || v >= n) {
        return Err(WlError::config(format!(
            "edge ({u}, {v}) refers to a node outside 0..{n}"
        )));
    }
    Ok(labelled_graph(&g.nodes, &g.edges))
}

pub fn from_petgraph(graph: &WlGraph) -> SerializableGraph {
    let edges = graph
        .edge_references()
        .map(|e| (e.source().index(), e.target().index(), *e.weight()))
        .collect();
    SerializableGraph {
        nodes: graph.node_weights().cloned().collect(),
        edges,
    }
}

pub fn load_graphs<P: AsRef<Path>>(path: P) -> Result<Vec<WlGraph>> {
    info!("Loading graphs from {}", path.as_ref().display());
    let file = File::open(path.as_ref())?;
    let graphs: Vec<SerializableGraph> = serde_json::from_reader(BufReader::new(file))?;
    graphs.iter().map(to_petgraph).collect()
}

pub fn save_graphs<P: AsRef<Path>>(path: P, graphs: &[WlGraph], quiet: bool) -> Result<()> {
    info!("Saving {} graphs to {}", graphs.len(), path.as_ref().display());
    let pb = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(graphs.len() as u64)
    };
    if let Ok(style) = ProgressStyle::with_template("[save] [{elapsed_precise}] {wide_bar:.green/white} {pos}/{len}") {
        pb.set_style(style);
    }

    let mut serializable = Vec::with_capacity(graphs.len());
    for g in graphs {
        serializable.push(from_petgraph(g));
        pb.inc(1);
    }
    pb.finish_and_clear();

    let file = File::create(path.as_ref())?;
    serde_json::to_writer_pretty(BufWriter::new(file), &serializable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undirected_edges_go_both_ways() {
        let mut g = labelled_graph(&["p", "q"], &[]);
        add_undirected_edge(&mut g, 0, 1, 3);
        assert_eq!(adjacency(&g, 0).collect::<Vec<_>>(), vec![(3, 1)]);
        assert_eq!(adjacency(&g, 1).collect::<Vec<_>>(), vec![(3, 0)]);
    }

    #[test]
    fn parses_json_corpus() {
        let json = r#"[{ "nodes": ["p", "q", "p"], "edges": [[0, 1, 0], [2, 1, 1]] }]"#;
        let parsed: Vec<SerializableGraph> = serde_json::from_str(json).unwrap();
        let graph = to_petgraph(&parsed[0]).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
        assert_eq!(graph[NodeIndex::new(1)], "q");
        assert_eq!(from_petgraph(&graph), parsed[0]);
    }

    #[test]
    fn rejects_dangling_edges() {
        let g = SerializableGraph {
            nodes: vec!["p".into()],
            edges: vec![(0, 4, 0)],
        };
        assert!(to_petgraph(&g).is_err());
    }

    #[test]
    fn saves_and_loads_a_corpus_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("graphs.json");
        let graphs = vec![labelled_graph(&["a", "b"], &[(0, 1, 2)])];
        save_graphs(&path, &graphs, true).unwrap();
        let loaded = load_graphs(&path).unwrap();
        assert_eq!(from_petgraph(&loaded[0]), from_petgraph(&graphs[0]));
    }
}
