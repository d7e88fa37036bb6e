//! Ahead-of-time code generation.
//!
//! [`SubgraphCodegen`] walks a [`Subgraph`] bottom-up, memoized per node,
//! and collects an immutable [`FunctionRecord`]: parameters, constant pool,
//! buffer table, call statements and outputs. The record is rendered to C++
//! source exactly once. For a single `add` over two 2x2 inputs:
//!
//! ```text
//! extern "C" int sub0(int* x, int* y, int* out0) {
//!   int* buf_0 = (int*)std::malloc(4 * 4);
//!   add(x, y, buf_0, 2, 2);
//!   std::memcpy(out0, buf_0, 4 * 4);
//!   std::free(buf_0);
//!   return 0;
//! }
//! ```

use std::fmt::Write as _;

use crate::config::CodegenConfig;
use crate::error::{Error, Result};
use crate::graph::{NodeOp, Subgraph, SubgraphNode};
use crate::op::Operator;
use crate::tensor::DType;
use crate::types::{element_count, NodeId, Shape};

/// Byte width assumed for every buffer element.
const ELEMENT_BYTES: usize = 4;

/// A value produced by a node in generated code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Output {
    /// Expression naming the buffer
    pub name: String,
    /// Element count
    pub size: usize,
    /// C element type
    pub dtype: String,
    /// Whether the buffer must be copied out to the caller
    pub need_copy: bool,
}

/// Pointer parameter of the generated function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Param {
    pub name: String,
    pub dtype: DType,
}

/// Heap buffer holding a kernel output.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BufferDecl {
    pub name: String,
    pub dtype: DType,
    pub size: usize,
}

impl BufferDecl {
    fn render(&self) -> String {
        let ty = self.dtype.c_type();
        format!(
            "{ty}* {name} = ({ty}*)std::malloc({bytes} * {size});",
            ty = ty,
            name = self.name,
            bytes = ELEMENT_BYTES,
            size = self.size
        )
    }
}

/// One emitted kernel call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallStmt {
    pub entry_point: &'static str,
    pub args: Vec<String>,
}

impl CallStmt {
    fn render(&self) -> String {
        format!("{}({});", self.entry_point, self.args.join(", "))
    }
}

/// Named constant slots of one generated function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConstantPool {
    /// Name of the pointer array bound by the init entry
    pub array_name: String,
    /// Slot names, in pool index order
    pub slots: Vec<String>,
}

/// Everything needed to render one generated function.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FunctionRecord {
    pub symbol: String,
    pub params: Vec<Param>,
    pub constants: Option<ConstantPool>,
    pub buffers: Vec<BufferDecl>,
    pub statements: Vec<CallStmt>,
    pub outputs: Vec<Output>,
}

impl FunctionRecord {
    /// Renders the record to C++ source including `kernel_header`.
    pub fn render(&self, kernel_header: &str) -> String {
        let mut src = String::new();
        for header in ["cstdint", "cstdlib", "cstring", "vector"] {
            let _ = writeln!(src, "#include <{}>", header);
        }
        let _ = writeln!(src, "#include <{}>", kernel_header);
        src.push('\n');

        if let Some(pool) = &self.constants {
            let _ = writeln!(src, "static std::vector<int*> {};", pool.array_name);
            for (i, slot) in pool.slots.iter().enumerate() {
                let _ = writeln!(src, "// {} -> {}[{}]", slot, pool.array_name, i);
            }
            src.push('\n');
            let _ = writeln!(
                src,
                "extern \"C\" int {}_init_(int** consts, int num_consts) {{",
                self.symbol
            );
            let _ = writeln!(
                src,
                "  {}.assign(consts, consts + num_consts);",
                pool.array_name
            );
            src.push_str("  return 0;\n}\n\n");
        }

        let mut params: Vec<String> = self
            .params
            .iter()
            .map(|p| format!("{}* {}", p.dtype.c_type(), p.name))
            .collect();
        params.extend(
            self.outputs
                .iter()
                .enumerate()
                .map(|(i, out)| format!("{}* out{}", out.dtype, i)),
        );
        let _ = writeln!(
            src,
            "extern \"C\" int {}({}) {{",
            self.symbol,
            params.join(", ")
        );

        if let Some(pool) = &self.constants {
            let _ = writeln!(src, "  if ({}.empty()) {{", pool.array_name);
            src.push_str("    return -1;\n  }\n");
        }
        for buffer in &self.buffers {
            let _ = writeln!(src, "  {}", buffer.render());
        }
        for stmt in &self.statements {
            let _ = writeln!(src, "  {}", stmt.render());
        }
        for (i, out) in self.outputs.iter().enumerate() {
            if out.need_copy {
                let _ = writeln!(
                    src,
                    "  std::memcpy(out{}, {}, {} * {});",
                    i, out.name, ELEMENT_BYTES, out.size
                );
            }
        }
        for buffer in &self.buffers {
            let _ = writeln!(src, "  std::free({});", buffer.name);
        }
        src.push_str("  return 0;\n}\n");
        src
    }
}

/// Source text and symbol handed back to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GeneratedModule {
    pub symbol: String,
    pub source: String,
    /// Constant slot names, in the order the host must bind them
    pub const_names: Vec<String>,
}

/// Bottom-up generator for one subgraph.
pub struct SubgraphCodegen<'g> {
    graph: &'g Subgraph,
    symbol: String,
    memo: Vec<Option<Vec<Output>>>,
    params: Vec<Param>,
    const_slots: Vec<String>,
    buffers: Vec<BufferDecl>,
    statements: Vec<CallStmt>,
}

impl<'g> SubgraphCodegen<'g> {
    pub fn new(graph: &'g Subgraph, symbol: impl Into<String>) -> Self {
        Self {
            graph,
            symbol: symbol.into(),
            memo: vec![None; graph.nodes.len()],
            params: Vec::new(),
            const_slots: Vec::new(),
            buffers: Vec::new(),
            statements: Vec::new(),
        }
    }

    fn pool_name(&self) -> String {
        format!("{}_consts", self.symbol)
    }

    /// Visits every head and assembles the function record.
    pub fn build(mut self) -> Result<FunctionRecord> {
        check_symbol(&self.symbol)?;
        self.graph.validate()?;

        let graph = self.graph;
        let mut outputs = Vec::with_capacity(graph.heads.len());
        for head in &graph.heads {
            let outs = self.visit(head.node_id)?;
            outputs.push(pick(head.node_id, outs, head.index)?);
        }

        let constants = if self.const_slots.is_empty() {
            None
        } else {
            Some(ConstantPool {
                array_name: self.pool_name(),
                slots: self.const_slots,
            })
        };

        Ok(FunctionRecord {
            symbol: self.symbol,
            params: self.params,
            constants,
            buffers: self.buffers,
            statements: self.statements,
            outputs,
        })
    }

    fn visit(&mut self, id: NodeId) -> Result<Vec<Output>> {
        if let Some(Some(outs)) = self.memo.get(id) {
            return Ok(outs.clone());
        }
        let graph = self.graph;
        let node = graph
            .node(id)
            .ok_or_else(|| Error::InvalidGraph(format!("missing node {}", id)))?;

        let outs = match &node.op {
            NodeOp::Input => self.visit_input(node)?,
            NodeOp::Constant => self.visit_constant(node)?,
            NodeOp::Kernel { op_name } => self.visit_kernel(node, op_name)?,
            NodeOp::Tuple => self.visit_tuple(node)?,
            NodeOp::TupleGetItem { index } => {
                let source = node.inputs[0].node_id;
                let fields = self.visit(source)?;
                let len = fields.len();
                match fields.into_iter().nth(*index) {
                    Some(out) => vec![out],
                    None => {
                        return Err(Error::IndexOutOfRange {
                            node: id,
                            index: *index,
                            len,
                        })
                    }
                }
            }
        };

        self.memo[id] = Some(outs.clone());
        Ok(outs)
    }

    fn visit_input(&mut self, node: &SubgraphNode) -> Result<Vec<Output>> {
        require_int(node.dtype, &format!("input {}", node.name))?;
        self.check_param_name(&node.name)?;
        self.params.push(Param {
            name: node.name.clone(),
            dtype: node.dtype,
        });
        Ok(vec![Output {
            name: node.name.clone(),
            size: element_count(&node.shapes[0]),
            dtype: node.dtype.c_type().to_string(),
            need_copy: false,
        }])
    }

    /// Input names become C parameters and must not shadow each other or
    /// any identifier the generator emits.
    fn check_param_name(&self, name: &str) -> Result<()> {
        let reason = if !is_c_identifier(name) {
            Some("is not a valid C identifier")
        } else if self.params.iter().any(|p| p.name == name) {
            Some("is declared twice")
        } else if name == self.symbol
            || name == self.pool_name()
            || name == format!("{}_init_", self.symbol)
            || is_numbered(name, "buf_")
            || is_numbered(name, "out")
        {
            Some("collides with a generated identifier")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(Error::InvalidGraph(format!("input name '{}' {}", name, reason))),
            None => Ok(()),
        }
    }

    fn visit_constant(&mut self, node: &SubgraphNode) -> Result<Vec<Output>> {
        require_int(node.dtype, &format!("constant {}", node.name))?;
        let idx = self.const_slots.len();
        self.const_slots
            .push(format!("{}_const_{}", self.symbol, idx));
        Ok(vec![Output {
            name: format!("{}[{}]", self.pool_name(), idx),
            size: element_count(&node.shapes[0]),
            dtype: node.dtype.c_type().to_string(),
            need_copy: false,
        }])
    }

    fn visit_kernel(&mut self, node: &SubgraphNode, op_name: &str) -> Result<Vec<Output>> {
        let op = Operator::from_name(op_name)?;
        require_int(node.dtype, &format!("kernel {}", op_name))?;
        let graph = self.graph;

        let mut args = Vec::with_capacity(node.inputs.len() + node.shapes.len());
        let mut input_shapes: Vec<Shape> = Vec::with_capacity(node.inputs.len());
        for entry in &node.inputs {
            let outs = self.visit(entry.node_id)?;
            args.push(pick(entry.node_id, outs, entry.index)?.name);
            let shape = graph.resolve_shape(*entry).ok_or_else(|| {
                Error::InvalidGraph(format!(
                    "no shape for output {} of node {}",
                    entry.index, entry.node_id
                ))
            })?;
            input_shapes.push(shape.clone());
        }
        op.check_shapes(&input_shapes, &node.shapes)?;
        let shape_args = op.shape_args(&input_shapes)?;

        let mut outs = Vec::with_capacity(node.shapes.len());
        for shape in &node.shapes {
            let buffer = BufferDecl {
                name: format!("buf_{}", self.buffers.len()),
                dtype: node.dtype,
                size: element_count(shape),
            };
            args.push(buffer.name.clone());
            outs.push(Output {
                name: buffer.name.clone(),
                size: buffer.size,
                dtype: node.dtype.c_type().to_string(),
                need_copy: true,
            });
            self.buffers.push(buffer);
        }
        args.extend(shape_args);

        self.statements.push(CallStmt {
            entry_point: op.entry_point(),
            args,
        });
        Ok(outs)
    }

    fn visit_tuple(&mut self, node: &SubgraphNode) -> Result<Vec<Output>> {
        let graph = self.graph;
        let mut fields = Vec::with_capacity(node.inputs.len());
        for entry in &node.inputs {
            if graph.node(entry.node_id).map_or(false, SubgraphNode::is_tuple) {
                return Err(Error::UnsupportedTupleNesting {
                    node: entry.node_id,
                });
            }
            let outs = self.visit(entry.node_id)?;
            fields.push(pick(entry.node_id, outs, entry.index)?);
        }
        Ok(fields)
    }
}

fn pick(node: NodeId, outs: Vec<Output>, index: usize) -> Result<Output> {
    let len = outs.len();
    outs.into_iter()
        .nth(index)
        .ok_or(Error::IndexOutOfRange { node, index, len })
}

fn require_int(dtype: DType, context: &str) -> Result<()> {
    if !dtype.is_supported() {
        return Err(Error::UnsupportedDType {
            dtype,
            context: context.to_string(),
        });
    }
    Ok(())
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// `prefix` followed by one or more digits.
fn is_numbered(name: &str, prefix: &str) -> bool {
    name.strip_prefix(prefix)
        .map_or(false, |n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn check_symbol(symbol: &str) -> Result<()> {
    if !is_c_identifier(symbol) {
        return Err(Error::InvalidGraph(format!(
            "symbol '{}' is not a valid C identifier",
            symbol
        )));
    }
    Ok(())
}

/// Generates the module for `graph` exported under `symbol`.
pub fn generate(graph: &Subgraph, symbol: &str, config: &CodegenConfig) -> Result<GeneratedModule> {
    let record = SubgraphCodegen::new(graph, symbol).build()?;
    tracing::debug!(
        symbol,
        params = record.params.len(),
        buffers = record.buffers.len(),
        calls = record.statements.len(),
        "generated subgraph function"
    );

    let const_names = record
        .constants
        .as_ref()
        .map(|pool| pool.slots.clone())
        .unwrap_or_default();
    Ok(GeneratedModule {
        symbol: record.symbol.clone(),
        source: record.render(&config.kernel_header),
        const_names,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::SubgraphBuilder;

    fn add_graph() -> Subgraph {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2, 2], DType::Int32);
        let y = b.add_input("y", vec![2, 2], DType::Int32);
        let z = b.add_kernel("add", &[x, y], vec![vec![2, 2]], DType::Int32);
        b.mark_output(z);
        b.build().unwrap()
    }

    #[test]
    fn test_single_add() {
        let record = SubgraphCodegen::new(&add_graph(), "sub0").build().unwrap();
        assert_eq!(record.params.len(), 2);
        assert_eq!(record.statements.len(), 1);
        assert_eq!(record.statements[0].render(), "add(x, y, buf_0, 2, 2);");
        assert_eq!(record.outputs[0].name, "buf_0");
        assert_eq!(record.outputs[0].size, 4);
        assert!(record.outputs[0].need_copy);
        assert!(record.constants.is_none());

        let src = record.render("kernel.h");
        assert!(src.contains("#include <kernel.h>"));
        assert!(src.contains("extern \"C\" int sub0(int* x, int* y, int* out0) {"));
        assert!(src.contains("int* buf_0 = (int*)std::malloc(4 * 4);"));
        assert!(src.contains("std::memcpy(out0, buf_0, 4 * 4);"));
        assert!(src.contains("std::free(buf_0);"));
        assert!(!src.contains("_init_"));
    }

    #[test]
    fn test_shared_node_visited_once() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![3], DType::Int32);
        let s = b.add_kernel("add", &[x, x], vec![vec![3]], DType::Int32);
        let t = b.add_kernel("add", &[s, s], vec![vec![3]], DType::Int32);
        b.mark_output(t);
        let record = SubgraphCodegen::new(&b.build().unwrap(), "f").build().unwrap();

        assert_eq!(record.params.len(), 1);
        assert_eq!(record.statements.len(), 2);
        assert_eq!(record.statements[0].render(), "add(x, x, buf_0, 1, 3);");
        assert_eq!(record.statements[1].render(), "add(buf_0, buf_0, buf_1, 1, 3);");
    }

    #[test]
    fn test_constants_pooled() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![4], DType::Int32);
        let w = b.add_constant("w", vec![4], DType::Int32);
        let v = b.add_constant("v", vec![4], DType::Int32);
        let s = b.add_kernel("add", &[x, w], vec![vec![4]], DType::Int32);
        let t = b.add_kernel("add", &[s, v], vec![vec![4]], DType::Int32);
        b.mark_output(t);
        let module = generate(&b.build().unwrap(), "fused", &CodegenConfig::default()).unwrap();

        assert_eq!(module.const_names, vec!["fused_const_0", "fused_const_1"]);
        assert!(module.source.contains("static std::vector<int*> fused_consts;"));
        assert!(module
            .source
            .contains("extern \"C\" int fused_init_(int** consts, int num_consts)"));
        assert!(module.source.contains("if (fused_consts.empty()) {"));
        assert!(module.source.contains("add(x, fused_consts[0], buf_0, 1, 4);"));
        assert!(module.source.contains("add(buf_0, fused_consts[1], buf_1, 1, 4);"));
    }

    #[test]
    fn test_float_constant_rejected() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        let w = b.add_constant("w", vec![2], DType::Float32);
        let s = b.add_kernel("add", &[x, w], vec![vec![2]], DType::Int32);
        b.mark_output(s);
        let result = generate(&b.build().unwrap(), "f", &CodegenConfig::default());
        assert!(matches!(
            result,
            Err(Error::UnsupportedDType {
                dtype: DType::Float32,
                ..
            })
        ));
    }

    #[test]
    fn test_unsupported_operation() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        let s = b.add_kernel("subtract", &[x, x], vec![vec![2]], DType::Int32);
        b.mark_output(s);
        match generate(&b.build().unwrap(), "f", &CodegenConfig::default()) {
            Err(Error::UnsupportedOperation(name)) => assert_eq!(name, "subtract"),
            other => panic!("Expected UnsupportedOperation, got {:?}", other),
        }
    }

    #[test]
    fn test_nested_tuple_rejected() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        let inner = b.add_tuple(&[x, x]);
        let outer = b.add_tuple(&[inner, x]);
        b.mark_output(outer);
        let result = SubgraphCodegen::new(&b.build().unwrap(), "f").build();
        assert!(matches!(
            result,
            Err(Error::UnsupportedTupleNesting { node: 1 })
        ));
    }

    #[test]
    fn test_tuple_get_item_out_of_range() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        let t = b.add_tuple(&[x]);
        let item = b.add_tuple_get_item(t, 2);
        let s = b.add_kernel("add", &[x, x], vec![vec![2]], DType::Int32);
        b.mark_output(s);
        let mut graph = b.build().unwrap();
        // the projection declares no shape of its own until patched here
        graph.nodes[item.node_id].shapes = vec![vec![2]];
        graph.heads = vec![item];

        assert!(matches!(
            SubgraphCodegen::new(&graph, "f").build(),
            Err(Error::IndexOutOfRange {
                node: 2,
                index: 2,
                len: 1
            })
        ));
    }

    #[test]
    fn test_multi_output_kernel_buffers() {
        let graph = Subgraph::from_json(
            r#"{
                "nodes": [
                    {"name": "x", "op": "input", "shapes": [[2]]},
                    {"name": "add", "op": "kernel", "op_name": "add",
                     "inputs": [{"node_id": 0}, {"node_id": 0}],
                     "shapes": [[2], [2]]}
                ],
                "heads": [{"node_id": 1, "index": 0}, {"node_id": 1, "index": 1}]
            }"#,
        )
        .unwrap();
        let record = SubgraphCodegen::new(&graph, "f").build().unwrap();
        assert_eq!(record.buffers.len(), 2);
        assert_eq!(record.outputs[0].name, "buf_0");
        assert_eq!(record.outputs[1].name, "buf_1");
        assert_eq!(record.statements[0].render(), "add(x, x, buf_0, buf_1, 1, 2);");
    }

    #[test]
    fn test_no_kernel_nodes() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        b.mark_output(x);
        let module = generate(&b.build().unwrap(), "ident", &CodegenConfig::default()).unwrap();
        assert!(module.source.contains("extern \"C\" int ident(int* x, int* out0) {"));
        assert!(module.source.contains("  return 0;\n}"));
        assert!(!module.source.contains("memcpy"));
    }

    #[test]
    fn test_output_shape_must_match_operands() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2, 2], DType::Int32);
        let y = b.add_input("y", vec![2, 2], DType::Int32);
        let z = b.add_kernel("add", &[x, y], vec![vec![1]], DType::Int32);
        b.mark_output(z);
        assert!(matches!(
            generate(&b.build().unwrap(), "f", &CodegenConfig::default()),
            Err(Error::ShapeMismatch {
                expected: 4,
                actual: 1,
                ..
            })
        ));
    }

    #[test]
    fn test_operand_shapes_must_agree() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2, 2], DType::Int32);
        let y = b.add_input("y", vec![3], DType::Int32);
        let z = b.add_kernel("add", &[x, y], vec![vec![2, 2]], DType::Int32);
        b.mark_output(z);
        assert!(matches!(
            generate(&b.build().unwrap(), "f", &CodegenConfig::default()),
            Err(Error::ShapeMismatch {
                expected: 4,
                actual: 3,
                ..
            })
        ));
    }

    #[test]
    fn test_high_rank_shape_args() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![1, 2, 2, 3], DType::Int32);
        let z = b.add_kernel("add", &[x, x], vec![vec![1, 2, 2, 3]], DType::Int32);
        b.mark_output(z);
        let record = SubgraphCodegen::new(&b.build().unwrap(), "f").build().unwrap();
        assert_eq!(record.statements[0].render(), "add(x, x, buf_0, 4, 3);");
        assert_eq!(record.buffers[0].size, 12);
    }

    #[test]
    fn test_float_kernel_rejected() {
        let mut b = SubgraphBuilder::new();
        let x = b.add_input("x", vec![2], DType::Int32);
        let z = b.add_kernel("add", &[x, x], vec![vec![2]], DType::Float32);
        b.mark_output(z);
        assert!(matches!(
            generate(&b.build().unwrap(), "f", &CodegenConfig::default()),
            Err(Error::UnsupportedDType {
                dtype: DType::Float32,
                ..
            })
        ));
    }

    #[test]
    fn test_input_name_clashes_rejected() {
        let two_inputs = |first: &str, second: &str, symbol: &str| {
            let mut b = SubgraphBuilder::new();
            let x = b.add_input(first, vec![2], DType::Int32);
            let y = b.add_input(second, vec![2], DType::Int32);
            let z = b.add_kernel("add", &[x, y], vec![vec![2]], DType::Int32);
            b.mark_output(z);
            generate(&b.build().unwrap(), symbol, &CodegenConfig::default())
        };

        for (first, second) in [
            ("x", "x"),
            ("x", "buf_0"),
            ("out1", "y"),
            ("x", "f_consts"),
            ("f_init_", "y"),
            ("f", "y"),
            ("x", "not-an-ident"),
        ] {
            assert!(
                matches!(two_inputs(first, second, "f"), Err(Error::InvalidGraph(_))),
                "{} / {}",
                first,
                second
            );
        }

        assert!(two_inputs("buffer", "output", "f").is_ok());
        assert!(two_inputs("buf_a", "out_", "f").is_ok());
    }

    #[test]
    fn test_invalid_symbol() {
        assert!(matches!(
            generate(&add_graph(), "1bad-name", &CodegenConfig::default()),
            Err(Error::InvalidGraph(_))
        ));
    }
}
