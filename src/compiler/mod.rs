mod classify;
mod compile;
mod cycles;
mod error;
mod topology;

pub use classify::classify_update;
pub(crate) use classify::classify_node_update;
pub use classify::GraphUpdateKind;
pub(crate) use compile::compile_topology;
pub use error::CompileError;
pub(crate) use topology::computed_channel_count;
pub(crate) use topology::InputConnection;
pub(crate) use topology::ProcessingRole;
pub(crate) use topology::Topology;
