//! Integration tests for the subgraph interpreter.
//!
//! These tests verify end-to-end execution through the backend, the
//! constant-count contract of `init`, and agreement between the hardware
//! and software kernels on larger subgraphs.

use rtlbridge::config::{BridgeConfigBuilder, KernelMode};
use rtlbridge::graph::{Subgraph, SubgraphBuilder};
use rtlbridge::kernel::SoftwareKernel;
use rtlbridge::runtime::{RuntimeState, SubgraphRuntime};
use rtlbridge::tensor::{DType, Tensor};
use rtlbridge::{Backend, BridgeConfig, Error};

// ============================================================================
// Helpers
// ============================================================================

/// Chains `n` constant additions onto one input.
fn constant_chain(n: usize, len: usize) -> Subgraph {
    let mut b = SubgraphBuilder::new();
    let mut acc = b.add_input("x", vec![len], DType::Int32);
    for i in 0..n {
        let w = b.add_constant(format!("w{}", i), vec![len], DType::Int32);
        acc = b.add_kernel("add", &[acc, w], vec![vec![len]], DType::Int32);
    }
    b.mark_output(acc);
    b.build().unwrap()
}

fn vector(values: Vec<i32>) -> Tensor {
    Tensor::from_i32(vec![values.len()], values).unwrap()
}

fn hardware_backend() -> Backend {
    Backend::new(BridgeConfig::default()).unwrap()
}

// ============================================================================
// End-to-End
// ============================================================================

#[test]
fn test_backend_end_to_end() {
    let json = r#"{
        "nodes": [
            {"name": "x", "op": "input", "shapes": [[2, 2]]},
            {"name": "y", "op": "input", "shapes": [[2, 2]]},
            {"name": "add", "op": "kernel", "op_name": "add",
             "inputs": [{"node_id": 0}, {"node_id": 1}], "shapes": [[2, 2]]}
        ],
        "heads": [{"node_id": 2}]
    }"#;
    let graph = Subgraph::from_json(json).unwrap();
    let backend = hardware_backend();

    let module = backend.compile(&graph, "sub0").unwrap();
    assert!(module.source.contains("add(x, y, buf_0, 2, 2);"));

    let mut rt = backend.load(&graph, "sub0").unwrap();
    rt.init(&[]).unwrap();
    let a = Tensor::from_i32(vec![2, 2], vec![1, 2, 3, 4]).unwrap();
    let b = Tensor::from_i32(vec![2, 2], vec![10, 20, 30, 40]).unwrap();
    let out = rt.run(&[a, b]).unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(out[0].shape, vec![2, 2]);
    assert_eq!(out[0].as_i32().unwrap(), &[11, 22, 33, 44]);
}

#[test]
fn test_constant_chain_on_hardware() {
    let graph = constant_chain(3, 4);
    let mut rt = hardware_backend().load(&graph, "chain").unwrap();
    assert_eq!(rt.num_constants(), 3);
    rt.init(&[
        vector(vec![1, 1, 1, 1]),
        vector(vec![10, 10, 10, 10]),
        vector(vec![100, 200, 300, 400]),
    ])
    .unwrap();

    let out = rt.run(&[vector(vec![0, 1, 2, 3])]).unwrap();
    assert_eq!(out[0].as_i32().unwrap(), &[111, 212, 313, 414]);

    let out = rt.run(&[vector(vec![-111, -211, -311, -411])]).unwrap();
    assert_eq!(out[0].as_i32().unwrap(), &[0, 0, 0, 0]);
}

// ============================================================================
// Constant Count Contract
// ============================================================================

#[test]
fn test_constant_count_mismatch_by_zero_one_and_many() {
    let backend = hardware_backend();
    for required in [0usize, 1, 4] {
        let graph = constant_chain(required, 2);
        for supplied in [0usize, 1, 4, 7] {
            let mut rt = backend.load(&graph, "chain").unwrap();
            let constants: Vec<Tensor> = (0..supplied).map(|_| vector(vec![1, 1])).collect();
            let result = rt.init(&constants);

            if supplied == required {
                assert!(result.is_ok(), "required {} supplied {}", required, supplied);
                assert_eq!(rt.state(), RuntimeState::Ready);
            } else {
                match result {
                    Err(Error::ConstantCountMismatch { expected, actual }) => {
                        assert_eq!(expected, required);
                        assert_eq!(actual, supplied);
                    }
                    other => panic!("Expected ConstantCountMismatch, got {:?}", other),
                }
                assert_eq!(rt.state(), RuntimeState::Unbuilt);
                assert!(matches!(rt.run(&[vector(vec![0, 0])]), Err(Error::NotInitialized(_))));
            }
        }
    }
}

#[test]
fn test_constant_dtype_and_shape_checked() {
    let graph = constant_chain(1, 2);
    let mut rt = hardware_backend().load(&graph, "chain").unwrap();

    let float = Tensor::new(vec![2], rtlbridge::TensorData::Float32(vec![1.0, 2.0])).unwrap();
    assert!(matches!(
        rt.init(&[float]),
        Err(Error::UnsupportedDType { .. })
    ));
    assert!(matches!(
        rt.init(&[vector(vec![1, 2, 3])]),
        Err(Error::ShapeMismatch { .. })
    ));
    rt.init(&[vector(vec![1, 2])]).unwrap();
}

// ============================================================================
// Kernel Agreement
// ============================================================================

#[test]
fn test_hardware_and_software_agree() {
    let graph = constant_chain(5, 9);
    let constants: Vec<Tensor> = (0..5)
        .map(|i| vector((0..9).map(|k| (i * 1000 + k) as i32 * 7919).collect()))
        .collect();
    let input = vector((0..9).map(|k| i32::MAX - k).collect());

    let software_backend = Backend::new(
        BridgeConfigBuilder::new()
            .kernel_mode(KernelMode::Software)
            .build()
            .unwrap(),
    )
    .unwrap();

    let mut hw = hardware_backend().load(&graph, "chain").unwrap();
    let mut sw = software_backend.load(&graph, "chain").unwrap();
    assert_eq!(sw.kernel_name(), "software");
    hw.init(&constants).unwrap();
    sw.init(&constants).unwrap();

    assert_eq!(
        hw.run(&[input.clone()]).unwrap(),
        sw.run(&[input]).unwrap()
    );
}

#[test]
fn test_direct_construction_with_software_kernel() {
    let graph = constant_chain(0, 3);
    let mut rt = SubgraphRuntime::new("ident", &graph, Box::new(SoftwareKernel::new())).unwrap();
    rt.init(&[]).unwrap();
    let out = rt.run(&[vector(vec![4, 5, 6])]).unwrap();
    assert_eq!(out[0].as_i32().unwrap(), &[4, 5, 6]);
    assert_eq!(rt.stats().kernel_invocations, 0);
}
