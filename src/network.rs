use std::collections::HashMap;

use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::convert::fits_minor_units;
use crate::models::{
    EdgeOrigin, EdgeSnapshot, NetworkInput, NetworkSnapshot, RouteRequest,
};

/// Handle to an edge of a [`Network`], stable across pending-edge removal.
pub type EdgeHandle = petgraph::stable_graph::EdgeIndex;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NetworkError {
    #[error("edge {source}->{target} references unknown node {node}")]
    UnknownNode {
        source: String,
        target: String,
        node: String,
    },
    #[error("duplicate edge {source}->{target}")]
    DuplicateEdge { source: String, target: String },
    #[error("edge {source}->{target} has invalid price: {details}")]
    InvalidPrice {
        source: String,
        target: String,
        details: String,
    },
}

/// Attributes carried by every edge of the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeData {
    pub source: String,
    pub target: String,
    pub price: Option<Decimal>,
    pub capacity: Option<Decimal>,
    pub origin: EdgeOrigin,
    pub renegotiable: bool,
}

impl EdgeData {
    /// An anchored edge keeps its price as a solver constant; everything
    /// else becomes a price variable.
    pub fn is_anchored(&self) -> bool {
        self.price.is_some() && !self.renegotiable
    }

    /// Pending edges were inserted by a route request but not yet priced.
    pub fn is_pending(&self) -> bool {
        self.origin == EdgeOrigin::Added && self.price.is_none()
    }
}

/// In-memory network model: nodes and directed priced edges.
///
/// The graph itself is a stable digraph so edge handles survive the removal
/// of a rejected pending edge. Identifier lookup goes through index maps,
/// and `edge_order` preserves insertion order for reproducible iteration.
#[derive(Debug, Clone)]
pub struct Network {
    graph: StableDiGraph<String, EdgeData>,
    node_index: HashMap<String, NodeIndex>,
    edge_index: HashMap<(String, String), EdgeHandle>,
    node_order: Vec<String>,
    edge_order: Vec<EdgeHandle>,
}

impl Network {
    /// Build a network from parsed input data.
    ///
    /// Fails if an edge references an absent node, repeats an ordered
    /// `(source, target)` pair, or carries a negative or sub-cent price.
    pub fn build(input: &NetworkInput) -> Result<Self, NetworkError> {
        let mut network = Network {
            graph: StableDiGraph::default(),
            node_index: HashMap::new(),
            edge_index: HashMap::new(),
            node_order: Vec::new(),
            edge_order: Vec::new(),
        };
        for node in &input.nodes {
            network.add_node(node);
        }
        for edge in &input.edges {
            if let Some(price) = edge.price {
                if price.is_sign_negative() {
                    return Err(NetworkError::InvalidPrice {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        details: format!("{price} is negative"),
                    });
                }
                if !fits_minor_units(price) {
                    return Err(NetworkError::InvalidPrice {
                        source: edge.source.clone(),
                        target: edge.target.clone(),
                        details: format!("{price} is finer than 0.01"),
                    });
                }
            }
            network.insert_edge(EdgeData {
                source: edge.source.clone(),
                target: edge.target.clone(),
                price: edge.price,
                capacity: edge.capacity,
                origin: EdgeOrigin::Original,
                renegotiable: edge.renegotiable,
            })?;
        }
        Ok(network)
    }

    fn add_node(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(id.to_string());
        self.node_index.insert(id.to_string(), idx);
        self.node_order.push(id.to_string());
        idx
    }

    fn insert_edge(&mut self, data: EdgeData) -> Result<EdgeHandle, NetworkError> {
        let key = (data.source.clone(), data.target.clone());
        if self.edge_index.contains_key(&key) {
            return Err(NetworkError::DuplicateEdge {
                source: data.source,
                target: data.target,
            });
        }
        let endpoint = |node: &str| -> Result<NodeIndex, NetworkError> {
            self.node_index
                .get(node)
                .copied()
                .ok_or_else(|| NetworkError::UnknownNode {
                    source: data.source.clone(),
                    target: data.target.clone(),
                    node: node.to_string(),
                })
        };
        let from = endpoint(&data.source)?;
        let to = endpoint(&data.target)?;
        let handle = self.graph.add_edge(from, to, data);
        self.edge_index.insert(key, handle);
        self.edge_order.push(handle);
        Ok(handle)
    }

    /// Insert a pending edge for a route request. Its price stays unset
    /// until the result extractor writes a solved value back.
    pub fn add_route(&mut self, request: &RouteRequest) -> Result<EdgeHandle, NetworkError> {
        self.insert_edge(EdgeData {
            source: request.source.clone(),
            target: request.target.clone(),
            price: None,
            capacity: None,
            origin: EdgeOrigin::Added,
            renegotiable: false,
        })
    }

    /// Roll back a rejected route request. Priced edges are never removed.
    pub fn remove_pending(&mut self, handle: EdgeHandle) {
        let Some(data) = self.graph.edge_weight(handle) else {
            return;
        };
        if !data.is_pending() {
            return;
        }
        let key = (data.source.clone(), data.target.clone());
        self.graph.remove_edge(handle);
        self.edge_index.remove(&key);
        self.edge_order.retain(|&h| h != handle);
    }

    /// Write a solved price onto an unresolved edge. Only the result
    /// extractor calls this; anchored prices stay immutable.
    pub(crate) fn assign_price(&mut self, handle: EdgeHandle, price: Decimal) {
        if let Some(data) = self.graph.edge_weight_mut(handle) {
            data.price = Some(price);
        }
    }

    pub fn edge(&self, handle: EdgeHandle) -> Option<&EdgeData> {
        self.graph.edge_weight(handle)
    }

    /// Edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeHandle, &EdgeData)> + '_ {
        self.edge_order
            .iter()
            .filter_map(|&handle| self.graph.edge_weight(handle).map(|data| (handle, data)))
    }

    /// Outgoing edges of a node, in insertion order. Unknown nodes have no
    /// neighbors.
    pub fn neighbors(&self, node: &str) -> Vec<EdgeHandle> {
        self.edges()
            .filter(|(_, data)| data.source == node)
            .map(|(handle, _)| handle)
            .collect()
    }

    pub fn contains_edge(&self, source: &str, target: &str) -> bool {
        self.edge_index
            .contains_key(&(source.to_string(), target.to_string()))
    }

    pub fn contains_node(&self, node: &str) -> bool {
        self.node_index.contains_key(node)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub(crate) fn index_of(&self, node: &str) -> Option<NodeIndex> {
        self.node_index.get(node).copied()
    }

    /// Outgoing edge handles of a node by graph index, for the constraint
    /// builder's walks.
    pub(crate) fn outgoing(&self, node: NodeIndex) -> Vec<(EdgeHandle, NodeIndex)> {
        self.graph
            .edges(node)
            .map(|edge| (edge.id(), edge.target()))
            .collect()
    }

    pub fn snapshot(&self) -> NetworkSnapshot {
        NetworkSnapshot {
            nodes: self.node_order.clone(),
            edges: self
                .edges()
                .map(|(_, data)| EdgeSnapshot {
                    source: data.source.clone(),
                    target: data.target.clone(),
                    price: data.price,
                    capacity: data.capacity,
                    origin: data.origin,
                })
                .collect(),
        }
    }
}
