mod context;
mod controller;
mod engine;
mod executor;
mod handoff;

pub use context::RenderContext;
pub use context::WorkletProcessError;
pub use context::WorkletProcessorHost;
pub use controller::GraphController;
pub use controller::ParameterUpdateError;
pub use engine::create_graph_engine;
pub use executor::GraphExecutor;
