use crate::graph::NodeId;

/// Why a graph description could not be compiled into a topology
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// A connection or automation refers to a node that is not in the graph
    #[error("the graph refers to unknown node {0:?}")]
    UnknownNode(NodeId),

    /// The destination id does not name a destination node
    #[error("node {0:?} is not a destination")]
    InvalidDestination(NodeId),

    /// A connection uses an output or input index the endpoints do not have
    #[error("invalid connection from {source_node:?} to {destination:?}")]
    InvalidConnection {
        /// The source end of the connection
        source_node: NodeId,
        /// The destination end of the connection
        destination: NodeId,
    },

    /// A parameter connection names a parameter the node does not have
    #[error("node {destination:?} has no parameter {param_index}")]
    InvalidParamConnection {
        /// The node whose parameter was named
        destination: NodeId,
        /// The out-of-range parameter index
        param_index: usize,
    },

    /// The graph contains a cycle with no delay node to break it
    #[error("the graph contains a cycle that no delay breaks")]
    CyclicGraph,

    /// An automation timeline is out of order or self-inconsistent
    #[error("the automation for parameter {param_index} of node {node:?} is malformed")]
    MalformedAutomation {
        /// The node whose parameter is automated
        node: NodeId,
        /// The parameter with the malformed timeline
        param_index: usize,
    },
}
