//! Subgraph interpreter.
//!
//! The `SubgraphRuntime` executes a loaded [`Subgraph`] directly on a
//! [`Kernel`], without generating source. Construction is the build phase:
//! every kernel node is resolved to an [`Operator`] up front, so unsupported
//! operators fail before any constants are bound.
//!
//! ```text
//! new() -> Unbuilt --init(constants)--> Ready --run(inputs)--> Ready
//! ```
//!
//! Every output of every node maps to a storage slot. Tuples and tuple
//! projections alias the slots of their fields instead of copying.

use crate::error::{Error, Result};
use crate::graph::{NodeEntry, NodeOp, Subgraph};
use crate::kernel::{execute_op, Kernel};
use crate::op::Operator;
use crate::tensor::{DType, Tensor};
use crate::types::{element_count, NodeId, Shape};

/// Lifecycle state of a runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeState {
    /// Built, constants not yet bound
    Unbuilt,
    /// Constants bound, ready to run
    Ready,
}

/// One resolved kernel invocation.
#[derive(Clone, Debug)]
struct KernelStep {
    node: NodeId,
    op: Operator,
    /// Operand slots, one per input edge in edge order
    inputs: Vec<usize>,
    output: usize,
    shape: Shape,
}

/// A slot bound from outside: an input or a constant.
#[derive(Clone, Debug)]
struct Binding {
    node: NodeId,
    slot: usize,
    shape: Shape,
}

/// Statistics collected by the runtime.
#[derive(Clone, Debug, Default)]
pub struct RuntimeStats {
    /// Completed `run` calls
    pub runs: u64,
    /// Kernel node executions across all runs
    pub kernel_invocations: u64,
}

/// Interpreter for one subgraph.
pub struct SubgraphRuntime {
    /// Symbol the subgraph was loaded under
    symbol: String,
    /// Kernel every operator dispatches onto
    kernel: Box<dyn Kernel>,
    state: RuntimeState,
    /// Flat tensor storage, one entry per slot
    storage: Vec<Vec<i32>>,
    /// Input bindings in node order
    inputs: Vec<Binding>,
    /// Constant bindings in node order
    constants: Vec<Binding>,
    /// Kernel steps in node order
    steps: Vec<KernelStep>,
    /// Slots and shapes of the subgraph outputs
    heads: Vec<(usize, Shape)>,
    stats: RuntimeStats,
}

impl std::fmt::Debug for SubgraphRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubgraphRuntime")
            .field("symbol", &self.symbol)
            .field("kernel", &self.kernel.name())
            .field("state", &self.state)
            .field("steps", &self.steps.len())
            .finish()
    }
}

fn require_int(dtype: DType, context: String) -> Result<()> {
    if !dtype.is_supported() {
        return Err(Error::UnsupportedDType { dtype, context });
    }
    Ok(())
}

fn slot_of(slots: &[Vec<usize>], entry: NodeEntry) -> Result<usize> {
    let node_slots = &slots[entry.node_id];
    node_slots
        .get(entry.index)
        .copied()
        .ok_or(Error::IndexOutOfRange {
            node: entry.node_id,
            index: entry.index,
            len: node_slots.len(),
        })
}

fn operand_shape(graph: &Subgraph, entry: NodeEntry) -> Result<Shape> {
    graph.resolve_shape(entry).cloned().ok_or_else(|| {
        Error::InvalidGraph(format!(
            "no shape for output {} of node {}",
            entry.index, entry.node_id
        ))
    })
}

fn bind(storage: &mut [Vec<i32>], binding: &Binding, tensor: &Tensor) -> Result<()> {
    let values = tensor.as_i32()?;
    let expected = element_count(&binding.shape);
    if values.len() != expected {
        return Err(Error::ShapeMismatch {
            context: format!("node {}", binding.node),
            expected,
            actual: values.len(),
        });
    }
    let slot = &mut storage[binding.slot];
    slot.clear();
    slot.extend_from_slice(values);
    Ok(())
}

impl SubgraphRuntime {
    /// Builds a runtime for `graph` dispatching onto `kernel`.
    ///
    /// # Errors
    /// Fails on malformed graphs, unsupported operators or dtypes, and
    /// nested tuples.
    pub fn new(
        symbol: impl Into<String>,
        graph: &Subgraph,
        kernel: Box<dyn Kernel>,
    ) -> Result<Self> {
        let symbol = symbol.into();
        graph.validate()?;

        let mut slots: Vec<Vec<usize>> = Vec::with_capacity(graph.nodes.len());
        let mut next_slot = 0usize;
        let mut fresh = |count: usize| {
            let range: Vec<usize> = (next_slot..next_slot + count).collect();
            next_slot += count;
            range
        };

        let mut inputs = Vec::new();
        let mut constants = Vec::new();
        let mut steps = Vec::new();

        for (id, node) in graph.nodes.iter().enumerate() {
            let node_slots = match &node.op {
                NodeOp::Input | NodeOp::Constant => {
                    require_int(node.dtype, format!("{} {}", node.op.type_name(), node.name))?;
                    let node_slots = fresh(1);
                    let binding = Binding {
                        node: id,
                        slot: node_slots[0],
                        shape: node.shapes[0].clone(),
                    };
                    if node.is_input() {
                        inputs.push(binding);
                    } else {
                        constants.push(binding);
                    }
                    node_slots
                }
                NodeOp::Kernel { op_name } => {
                    let op = Operator::from_name(op_name)?;
                    require_int(node.dtype, format!("kernel {}", op_name))?;
                    if node.inputs.len() != op.arity() {
                        return Err(Error::InputCountMismatch {
                            expected: op.arity(),
                            actual: node.inputs.len(),
                        });
                    }
                    if node.shapes.len() != 1 {
                        return Err(Error::InvalidGraph(format!(
                            "kernel node {} ({}) must produce exactly one output",
                            id, op_name
                        )));
                    }
                    let operand_shapes = node
                        .inputs
                        .iter()
                        .map(|e| operand_shape(graph, *e))
                        .collect::<Result<Vec<_>>>()?;
                    op.check_shapes(&operand_shapes, &node.shapes)?;
                    let operands = node
                        .inputs
                        .iter()
                        .map(|e| slot_of(&slots, *e))
                        .collect::<Result<Vec<_>>>()?;
                    let node_slots = fresh(1);
                    steps.push(KernelStep {
                        node: id,
                        op,
                        inputs: operands,
                        output: node_slots[0],
                        shape: node.shapes[0].clone(),
                    });
                    node_slots
                }
                NodeOp::Tuple => {
                    let mut fields = Vec::with_capacity(node.inputs.len());
                    for entry in &node.inputs {
                        if graph.nodes[entry.node_id].is_tuple() {
                            return Err(Error::UnsupportedTupleNesting {
                                node: entry.node_id,
                            });
                        }
                        fields.push(slot_of(&slots, *entry)?);
                    }
                    fields
                }
                NodeOp::TupleGetItem { index } => {
                    let fields = &slots[node.inputs[0].node_id];
                    match fields.get(*index) {
                        Some(&slot) => vec![slot],
                        None => {
                            return Err(Error::IndexOutOfRange {
                                node: id,
                                index: *index,
                                len: fields.len(),
                            })
                        }
                    }
                }
            };
            slots.push(node_slots);
        }

        let mut heads = Vec::with_capacity(graph.heads.len());
        for head in &graph.heads {
            let slot = slot_of(&slots, *head)?;
            let shape = graph.entry_shape(*head).cloned().unwrap_or_default();
            heads.push((slot, shape));
        }

        tracing::debug!(
            symbol = %symbol,
            kernel = kernel.name(),
            inputs = inputs.len(),
            constants = constants.len(),
            steps = steps.len(),
            "built subgraph runtime"
        );

        Ok(Self {
            symbol,
            kernel,
            state: RuntimeState::Unbuilt,
            storage: vec![Vec::new(); next_slot],
            inputs,
            constants,
            steps,
            heads,
            stats: RuntimeStats::default(),
        })
    }

    /// Returns the symbol the runtime was loaded under.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    /// Number of inputs `run` expects.
    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    /// Number of constants `init` expects.
    pub fn num_constants(&self) -> usize {
        self.constants.len()
    }

    /// Name of the kernel strategy in use.
    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.stats
    }

    /// Binds the constant tensors, in constant-node order. Allowed once.
    pub fn init(&mut self, constants: &[Tensor]) -> Result<()> {
        if self.state == RuntimeState::Ready {
            return Err(Error::AlreadyInitialized(self.symbol.clone()));
        }
        if constants.len() != self.constants.len() {
            return Err(Error::ConstantCountMismatch {
                expected: self.constants.len(),
                actual: constants.len(),
            });
        }
        for (binding, tensor) in self.constants.iter().zip(constants) {
            bind(&mut self.storage, binding, tensor)?;
        }
        self.state = RuntimeState::Ready;
        tracing::info!(symbol = %self.symbol, constants = constants.len(), "runtime initialized");
        Ok(())
    }

    /// Executes the subgraph on `inputs`, in input-node order.
    ///
    /// Returns one tensor per subgraph output. Repeatable.
    pub fn run(&mut self, inputs: &[Tensor]) -> Result<Vec<Tensor>> {
        if self.state != RuntimeState::Ready {
            return Err(Error::NotInitialized(self.symbol.clone()));
        }
        if inputs.len() != self.inputs.len() {
            return Err(Error::InputCountMismatch {
                expected: self.inputs.len(),
                actual: inputs.len(),
            });
        }
        for (binding, tensor) in self.inputs.iter().zip(inputs) {
            bind(&mut self.storage, binding, tensor)?;
        }

        for step in &self.steps {
            let mut out = std::mem::take(&mut self.storage[step.output]);
            out.clear();
            out.resize(element_count(&step.shape), 0);

            let operands: Vec<&[i32]> = step
                .inputs
                .iter()
                .map(|&slot| self.storage[slot].as_slice())
                .collect();
            tracing::trace!(node = step.node, op = %step.op, "executing kernel node");
            execute_op(self.kernel.as_mut(), step.op, &operands, &mut out, &step.shape)?;

            self.storage[step.output] = out;
            self.stats.kernel_invocations += 1;
        }
        self.stats.runs += 1;

        self.heads
            .iter()
            .map(|(slot, shape)| Tensor::from_i32(shape.clone(), self.storage[*slot].clone()))
            .collect()
    }
}
