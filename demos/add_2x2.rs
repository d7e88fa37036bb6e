//! Offloads a 2x2 addition onto the scalar adder model.
//!
//! The same subgraph goes through both paths: code generation prints the
//! C++ function a host would compile, and the interpreter runs it directly
//! against the hardware model with profiling enabled.

use rtlbridge::config::BridgeConfig;
use rtlbridge::graph::SubgraphBuilder;
use rtlbridge::tensor::{DType, Tensor};
use rtlbridge::{Backend, Result};

const CONFIG: &str = r#"
log_level: info
kernel:
  mode: hardware
  reset_cycles: 1
  run_cycles: 1
device:
  model: scalar_adder
profiler:
  enable: true
  cycle_counter_id: 3
"#;

const SYMBOL: &str = "verilator_0";

fn main() -> Result<()> {
    let config = BridgeConfig::from_yaml(CONFIG)?;
    rtlbridge::init_logging(&config.log_level);

    println!("==== 2x2 add example ====");

    let mut builder = SubgraphBuilder::new();
    let x = builder.add_input("x", vec![2, 2], DType::Int32);
    let y = builder.add_input("y", vec![2, 2], DType::Int32);
    let z = builder.add_kernel("add", &[x, y], vec![vec![2, 2]], DType::Int32);
    builder.mark_output(z);
    let graph = builder.build()?;

    let backend = Backend::new(config)?;

    let module = backend.compile(&graph, SYMBOL)?;
    println!("\n-- generated {} --\n{}", module.symbol, module.source);

    let mut runtime = backend.load(&graph, SYMBOL)?;
    runtime.init(&[])?;
    let a = Tensor::from_i32(vec![2, 2], vec![1, 2, 3, 4])?;
    let b = Tensor::from_i32(vec![2, 2], vec![10, 20, 30, 40])?;
    let out = runtime.run(&[a, b])?;

    println!("-- interpreter --");
    println!("out = {:?}", out[0].as_i32()?);
    println!("profiler = {}", backend.profiler().status());
    Ok(())
}
