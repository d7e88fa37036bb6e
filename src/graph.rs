//! Serialized subgraph description.
//!
//! A [`Subgraph`] is an ordered node list handed over by the host compiler.
//! Nodes reference their operands through [`NodeEntry`] edges naming the
//! producing node and which of its outputs is consumed. Edges always point
//! at earlier nodes, so list order is a valid topological order.
//!
//! ```json
//! {
//!   "nodes": [
//!     {"name": "x", "op": "input", "shapes": [[2, 2]], "dtype": "int32"},
//!     {"name": "y", "op": "input", "shapes": [[2, 2]], "dtype": "int32"},
//!     {"name": "add", "op": "kernel", "op_name": "add",
//!      "inputs": [{"node_id": 0}, {"node_id": 1}], "shapes": [[2, 2]]}
//!   ],
//!   "heads": [{"node_id": 2}]
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};
use crate::tensor::DType;
use crate::types::{NodeId, Shape};

/// Reference to one output of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeEntry {
    pub node_id: NodeId,
    #[serde(default)]
    pub index: usize,
}

impl NodeEntry {
    pub fn new(node_id: NodeId, index: usize) -> Self {
        Self { node_id, index }
    }
}

impl From<NodeId> for NodeEntry {
    fn from(node_id: NodeId) -> Self {
        Self::new(node_id, 0)
    }
}

/// What a node does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum NodeOp {
    /// Caller-supplied tensor
    Input,
    /// Tensor bound once at load time
    Constant,
    /// Offloaded operator call
    Kernel { op_name: String },
    /// Groups several entries into one multi-output node
    Tuple,
    /// Selects one field of a tuple-valued node
    TupleGetItem { index: usize },
}

impl NodeOp {
    /// Serialized type tag.
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeOp::Input => "input",
            NodeOp::Constant => "constant",
            NodeOp::Kernel { .. } => "kernel",
            NodeOp::Tuple => "tuple",
            NodeOp::TupleGetItem { .. } => "tuple_get_item",
        }
    }
}

/// One node of a subgraph.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubgraphNode {
    /// Parameter name for inputs, slot name for constants, operator name for kernels
    pub name: String,
    #[serde(flatten)]
    pub op: NodeOp,
    /// Operand edges, in argument order
    #[serde(default)]
    pub inputs: Vec<NodeEntry>,
    /// One shape per output
    #[serde(default)]
    pub shapes: Vec<Shape>,
    /// Element type of every output
    #[serde(default)]
    pub dtype: DType,
}

impl SubgraphNode {
    /// Number of outputs the node produces.
    pub fn num_outputs(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_input(&self) -> bool {
        matches!(self.op, NodeOp::Input)
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.op, NodeOp::Constant)
    }

    pub fn is_tuple(&self) -> bool {
        matches!(self.op, NodeOp::Tuple)
    }
}

/// A serialized subgraph: nodes in topological order plus its outputs.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subgraph {
    pub nodes: Vec<SubgraphNode>,
    #[serde(default)]
    pub heads: Vec<NodeEntry>,
}

impl Subgraph {
    /// Parses and validates a subgraph from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let graph: Subgraph = serde_json::from_str(json)?;
        graph.validate()?;
        Ok(graph)
    }

    /// Loads and validates a subgraph from a JSON file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serializes to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the node with the given id.
    pub fn node(&self, id: NodeId) -> Option<&SubgraphNode> {
        self.nodes.get(id)
    }

    /// Shape of the tensor an entry refers to.
    pub fn entry_shape(&self, entry: NodeEntry) -> Option<&Shape> {
        self.nodes.get(entry.node_id)?.shapes.get(entry.index)
    }

    /// Shape of the tensor behind `entry`, looking through tuples and
    /// projections to the producing node.
    pub fn resolve_shape(&self, entry: NodeEntry) -> Option<&Shape> {
        let node = self.nodes.get(entry.node_id)?;
        match node.op {
            NodeOp::Tuple => {
                let field = *node.inputs.get(entry.index)?;
                self.resolve_shape(field)
            }
            NodeOp::TupleGetItem { index } if entry.index == 0 => {
                let source = NodeEntry::new(node.inputs.first()?.node_id, index);
                self.resolve_shape(source)
            }
            _ => node.shapes.get(entry.index),
        }
    }

    /// Ids of input nodes in list order.
    pub fn input_nodes(&self) -> Vec<NodeId> {
        self.ids_where(SubgraphNode::is_input)
    }

    /// Ids of constant nodes in list order.
    pub fn constant_nodes(&self) -> Vec<NodeId> {
        self.ids_where(SubgraphNode::is_constant)
    }

    fn ids_where(&self, pred: impl Fn(&SubgraphNode) -> bool) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| pred(*n))
            .map(|(id, _)| id)
            .collect()
    }

    fn check_entry(&self, entry: NodeEntry, consumer: &str) -> Result<()> {
        let producer = self.nodes.get(entry.node_id).ok_or_else(|| {
            Error::InvalidGraph(format!(
                "{} references missing node {}",
                consumer, entry.node_id
            ))
        })?;
        if entry.index >= producer.num_outputs() {
            return Err(Error::IndexOutOfRange {
                node: entry.node_id,
                index: entry.index,
                len: producer.num_outputs(),
            });
        }
        Ok(())
    }

    /// Checks edge ordering, entry indices and per-kind node structure.
    pub fn validate(&self) -> Result<()> {
        for (id, node) in self.nodes.iter().enumerate() {
            for entry in &node.inputs {
                if entry.node_id >= id {
                    return Err(Error::InvalidGraph(format!(
                        "node {} ({}) references node {} which does not precede it",
                        id, node.name, entry.node_id
                    )));
                }
                self.check_entry(*entry, &format!("node {}", id))?;
            }

            match &node.op {
                NodeOp::Input | NodeOp::Constant => {
                    if !node.inputs.is_empty() || node.shapes.len() != 1 {
                        return Err(Error::InvalidGraph(format!(
                            "{} node {} ({}) must have no inputs and exactly one shape",
                            node.op.type_name(),
                            id,
                            node.name
                        )));
                    }
                }
                NodeOp::Kernel { op_name } => {
                    if node.shapes.is_empty() {
                        return Err(Error::InvalidGraph(format!(
                            "kernel node {} ({}) declares no output shape",
                            id, op_name
                        )));
                    }
                }
                NodeOp::Tuple => {}
                NodeOp::TupleGetItem { .. } => {
                    if node.inputs.len() != 1 {
                        return Err(Error::InvalidGraph(format!(
                            "tuple_get_item node {} must have exactly one input",
                            id
                        )));
                    }
                }
            }
        }

        for head in &self.heads {
            self.check_entry(*head, "graph output")?;
        }
        Ok(())
    }
}

/// Builds subgraphs programmatically.
///
/// # Example
///
/// ```
/// use rtlbridge::graph::SubgraphBuilder;
/// use rtlbridge::tensor::DType;
///
/// let mut builder = SubgraphBuilder::new();
/// let x = builder.add_input("x", vec![2, 2], DType::Int32);
/// let y = builder.add_input("y", vec![2, 2], DType::Int32);
/// let z = builder.add_kernel("add", &[x, y], vec![vec![2, 2]], DType::Int32);
/// builder.mark_output(z);
/// let graph = builder.build().unwrap();
/// assert_eq!(graph.nodes.len(), 3);
/// ```
#[derive(Debug, Default)]
pub struct SubgraphBuilder {
    graph: Subgraph,
}

impl SubgraphBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: SubgraphNode) -> NodeEntry {
        self.graph.nodes.push(node);
        NodeEntry::from(self.graph.nodes.len() - 1)
    }

    /// Adds a caller-supplied input.
    pub fn add_input(&mut self, name: impl Into<String>, shape: Shape, dtype: DType) -> NodeEntry {
        self.push(SubgraphNode {
            name: name.into(),
            op: NodeOp::Input,
            inputs: Vec::new(),
            shapes: vec![shape],
            dtype,
        })
    }

    /// Adds a constant bound at load time.
    pub fn add_constant(
        &mut self,
        name: impl Into<String>,
        shape: Shape,
        dtype: DType,
    ) -> NodeEntry {
        self.push(SubgraphNode {
            name: name.into(),
            op: NodeOp::Constant,
            inputs: Vec::new(),
            shapes: vec![shape],
            dtype,
        })
    }

    /// Adds an operator call producing one output per entry of `out_shapes`.
    ///
    /// Returns the entry of the first output.
    pub fn add_kernel(
        &mut self,
        op_name: impl Into<String>,
        inputs: &[NodeEntry],
        out_shapes: Vec<Shape>,
        dtype: DType,
    ) -> NodeEntry {
        let op_name = op_name.into();
        self.push(SubgraphNode {
            name: op_name.clone(),
            op: NodeOp::Kernel { op_name },
            inputs: inputs.to_vec(),
            shapes: out_shapes,
            dtype,
        })
    }

    /// Adds a tuple grouping `fields`.
    pub fn add_tuple(&mut self, fields: &[NodeEntry]) -> NodeEntry {
        let shapes = fields
            .iter()
            .filter_map(|f| self.graph.entry_shape(*f).cloned())
            .collect();
        let dtype = fields
            .first()
            .and_then(|f| self.graph.node(f.node_id))
            .map(|n| n.dtype)
            .unwrap_or_default();
        self.push(SubgraphNode {
            name: "tuple".to_string(),
            op: NodeOp::Tuple,
            inputs: fields.to_vec(),
            shapes,
            dtype,
        })
    }

    /// Adds a projection of field `index` out of `tuple`.
    pub fn add_tuple_get_item(&mut self, tuple: NodeEntry, index: usize) -> NodeEntry {
        let source = self.graph.node(tuple.node_id);
        let shapes = source
            .and_then(|n| n.shapes.get(index))
            .cloned()
            .into_iter()
            .collect();
        let dtype = source.map(|n| n.dtype).unwrap_or_default();
        self.push(SubgraphNode {
            name: format!("tuple_get_item_{}", index),
            op: NodeOp::TupleGetItem { index },
            inputs: vec![NodeEntry::from(tuple.node_id)],
            shapes,
            dtype,
        })
    }

    /// Marks `entry` as a subgraph output.
    pub fn mark_output(&mut self, entry: NodeEntry) {
        self.graph.heads.push(entry);
    }

    /// Validates and returns the subgraph.
    pub fn build(self) -> Result<Subgraph> {
        self.graph.validate()?;
        Ok(self.graph)
    }
}
