use std::sync::Arc;

use crate::compiler::{compile_topology, CompileError};
use crate::graph::GraphDescription;

use super::context::WorkletProcessorHost;
use super::controller::GraphController;
use super::executor::GraphExecutor;
use super::handoff::UpdateChannel;

/// Compile a description and create a connected controller and executor pair
///
/// The controller stays on a control thread; the executor moves to the render
/// thread. They communicate only through lock-free cells, so the render
/// thread never blocks on the controller.
pub fn create_graph_engine(
    description: &GraphDescription,
    sample_rate: usize,
    quantum_size: usize,
    worklet_host: Option<Box<dyn WorkletProcessorHost + Send>>,
) -> Result<(GraphController, GraphExecutor), CompileError> {
    assert!(sample_rate > 0);
    assert!(quantum_size > 0);

    let topology = compile_topology(description, sample_rate, quantum_size)?;

    let channel = Arc::new(UpdateChannel::new());

    let controller = GraphController::new(
        description.clone(),
        sample_rate,
        quantum_size,
        channel.clone(),
        &topology,
    );

    let executor = GraphExecutor::new(Box::new(topology), channel, worklet_host);

    Ok((controller, executor))
}
