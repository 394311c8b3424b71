#![warn(missing_docs)]

//! wavegraph is a real-time audio render-graph engine that is inspired by the
//! Web Audio API
//!
//! You can use it to:
//! - Describe a graph of audio nodes and their connections
//! - Compile the description into an immutable topology snapshot
//! - Render the graph one quantum at a time on a real-time thread
//! - Apply topology and parameter updates from a control thread without
//!   blocking the render thread
//!
//! # Example
//!
//! ```rust
//! use wavegraph::{
//!     create_graph_engine, ConstantSourceDescription, DestinationDescription, GraphConnection,
//!     GraphDescription, NodeDescription, NodeId,
//! };
//!
//! let sample_rate = 48_000;
//! let quantum_size = 128;
//!
//! let destination_id = NodeId::generate();
//! let source_id = NodeId::generate();
//!
//! let mut description = GraphDescription::with_destination(destination_id, 2);
//!
//! description.add_node(
//!     source_id,
//!     NodeDescription::ConstantSource(ConstantSourceDescription { offset: 1.0 }),
//! );
//!
//! description.connect(GraphConnection::new(source_id, 0, destination_id, 0));
//!
//! let (mut controller, mut executor) =
//!     create_graph_engine(&description, sample_rate, quantum_size, None)
//!         .expect("graph should compile");
//!
//! // On the render thread, once per quantum:
//! executor.begin_new_quantum(0);
//! let output = executor.render_destination_for_current_quantum();
//!
//! // On the control thread, periodically:
//! controller.collect_retired_updates();
//! ```

mod automation;
mod buffer;
mod compiler;
mod executor;
mod graph;
mod nodes;

pub use buffer::AudioBus;

pub use graph::AutomationRate;
pub use graph::AutomationSegment;
pub use graph::ChannelConfig;
pub use graph::ChannelCountMode;
pub use graph::ChannelInterpretation;
pub use graph::GraphConnection;
pub use graph::GraphDescription;
pub use graph::GraphParamConnection;
pub use graph::NodeId;
pub use graph::NodeKind;
pub use graph::ParamAutomation;

pub use graph::AnalyserDescription;
pub use graph::ConstantSourceDescription;
pub use graph::DelayDescription;
pub use graph::DestinationDescription;
pub use graph::DynamicsCompressorDescription;
pub use graph::GainDescription;
pub use graph::NodeDescription;
pub use graph::OscillatorDescription;
pub use graph::WorkletDescription;

pub use compiler::classify_update;
pub use compiler::CompileError;
pub use compiler::GraphUpdateKind;

pub use executor::create_graph_engine;
pub use executor::GraphController;
pub use executor::GraphExecutor;
pub use executor::ParameterUpdateError;
pub use executor::RenderContext;
pub use executor::WorkletProcessError;
pub use executor::WorkletProcessorHost;

pub use nodes::AnalyserHandle;

pub(crate) const MAXIMUM_CHANNEL_COUNT: usize = 32;
pub(crate) const RETIREMENT_SLOT_COUNT: usize = 16;
