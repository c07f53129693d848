use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;
use serde::{Deserialize, Serialize};

/// One event's position in the trigger graph. Links are stored by event name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AncestryNode {
    pub name: String,
    parents: Vec<String>,
    children: Vec<String>,
}

impl AncestryNode {
    pub fn new(name: impl Into<String>) -> Self {
        AncestryNode {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Events that trigger this one, in link order.
    pub fn parents_names(&self) -> &[String] {
        &self.parents
    }

    /// Events this one triggers, in link order.
    pub fn children_names(&self) -> &[String] {
        &self.children
    }

    pub fn is_graphable(&self) -> bool {
        !self.parents.is_empty() || !self.children.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeRole {
    Core,
    Parent,
    Child,
}

/// The immediate surroundings of one event: the event itself first, then its parents and children
/// without duplicates. Edges are index pairs into `nodes`, core to child and parent to core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Neighbourhood {
    pub nodes: Vec<(String, NodeRole)>,
    pub edges: Vec<(usize, usize)>,
}

/// Trigger graph between events. Nodes are only ever added.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ancestry {
    nodes: BTreeMap<String, AncestryNode>,
}

impl Ancestry {
    pub fn new() -> Self {
        Ancestry::default()
    }

    /// Creates the node for `name` if it does not exist yet.
    pub fn register(&mut self, name: &str) -> &mut AncestryNode {
        self.nodes
            .entry(name.to_string())
            .or_insert_with(|| AncestryNode::new(name))
    }

    pub fn get(&self, name: &str) -> Option<&AncestryNode> {
        self.nodes.get(name)
    }

    /// Links `parent` to `child` in both directions, registering either node if needed.
    /// Returns false when the edge already existed.
    pub fn set_child(&mut self, parent: &str, child: &str) -> bool {
        let parent_node = self.register(parent);
        if parent_node.children.iter().any(|name| name == child) {
            return false;
        }
        parent_node.children.push(child.to_string());
        let child_node = self.register(child);
        if !child_node.parents.iter().any(|name| name == parent) {
            child_node.parents.push(parent.to_string());
        }
        true
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AncestryNode> {
        self.nodes.values()
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn neighbourhood(&self, name: &str) -> Option<Neighbourhood> {
        let core = self.nodes.get(name)?;
        let mut nodes = vec![(core.name.clone(), NodeRole::Core)];
        for parent in &core.parents {
            if !nodes.iter().any(|(node, _)| node == parent) {
                nodes.push((parent.clone(), NodeRole::Parent));
            }
        }
        for child in &core.children {
            if !nodes.iter().any(|(node, _)| node == child) {
                nodes.push((child.clone(), NodeRole::Child));
            }
        }
        let index_of = |target: &str| nodes.iter().position(|(node, _)| node == target);
        let mut edges = Vec::new();
        for child in &core.children {
            if let Some(idx) = index_of(child) {
                edges.push((0, idx));
            }
        }
        for parent in &core.parents {
            if let Some(idx) = index_of(parent) {
                edges.push((idx, 0));
            }
        }
        Some(Neighbourhood { nodes, edges })
    }

    /// The whole ancestry as a directed graph, parent to child, for plotting.
    pub fn to_graph(&self) -> petgraph::Graph<String, ()> {
        let mut graph = petgraph::Graph::new();
        let mut name_to_index: BTreeMap<&str, NodeIndex> = BTreeMap::new();
        for name in self.nodes.keys() {
            let index = graph.add_node(name.clone());
            name_to_index.insert(name.as_str(), index);
        }
        for node in self.nodes.values() {
            let source_idx = name_to_index[node.name.as_str()];
            for child in &node.children {
                if let Some(sink_idx) = name_to_index.get(child.as_str()) {
                    graph.add_edge(source_idx, *sink_idx, ());
                }
            }
        }
        graph
    }
}
