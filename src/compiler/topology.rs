use std::collections::HashMap;
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::automation::ParamAutomationState;
use crate::buffer::AudioBus;
use crate::graph::{ChannelConfig, ChannelCountMode, NodeId};
use crate::nodes::{AnalyserShared, RenderNode};
use crate::MAXIMUM_CHANNEL_COUNT;

/// What a processing step does with its node
///
/// A delay that breaks a feedback cycle is split into two steps over the same
/// node: a reader that produces last quantum's audio, and a writer that
/// consumes this quantum's input. Every other node gets a single `Whole` step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ProcessingRole {
    Whole,
    DelayWriter,
    DelayReader,
}

/// One step in the processing order
#[derive(Clone, Copy, Debug)]
pub(crate) struct ProcessingNode {
    pub role: ProcessingRole,
    pub node_index: usize,
}

/// A reference to the output bus feeding an input or a parameter
#[derive(Clone, Copy, Debug)]
pub(crate) struct InputConnection {
    pub source_processing_index: usize,
    pub source_output_index: usize,
}

/// An immutable, fully pre-allocated snapshot of a compiled graph
///
/// Everything the render thread touches is allocated here, at compile time on
/// the control thread: nodes, processing order, connection tables, and every
/// bus. Rendering never allocates.
pub(crate) struct Topology {
    pub sample_rate: usize,
    pub quantum_size: usize,

    /// Node ids in ascending order; positions are the dense node indices
    pub node_ids: Vec<NodeId>,
    pub index_by_id: HashMap<NodeId, usize>,
    pub nodes: Vec<RenderNode>,

    pub processing: Vec<ProcessingNode>,

    /// Indices into `processing`, in execution order
    pub processing_order: Vec<usize>,

    /// Audio sources per processing step and input slot
    pub audio_inputs: Vec<Vec<Vec<InputConnection>>>,

    /// Parameter sources per processing step and parameter index
    pub param_inputs: Vec<Vec<Vec<InputConnection>>>,

    /// Channel mixing settings per processing step
    pub mixing: Vec<ChannelConfig>,

    /// Mixed-input scratch buses per processing step and input slot
    pub input_buses: Vec<Vec<AudioBus>>,

    /// Output buses for every node, flattened; `output_ranges` maps a node
    /// index to its slice
    pub output_buses: Vec<AudioBus>,
    pub output_ranges: Vec<(usize, usize)>,

    /// Automation state and evaluated parameter buses, per node and parameter
    pub param_states: Vec<Vec<ParamAutomationState>>,
    pub param_buses: Vec<Vec<AudioBus>>,

    pub destination_node_index: usize,

    /// The generation at which each processing step last ran, for output
    /// memoization
    pub output_generations: Vec<u64>,
}

impl Topology {
    /// The destination node's rendered output for the current quantum
    pub fn destination_bus(&self) -> &AudioBus {
        let (start, _) = self.output_ranges[self.destination_node_index];
        &self.output_buses[start]
    }

    /// Every analyser in the graph, in ascending node id order
    pub fn analyser_shareds(&self) -> Vec<(NodeId, Arc<AnalyserShared>)> {
        self.node_ids
            .iter()
            .zip(&self.nodes)
            .filter_map(|(id, node)| node.analyser_shared().map(|shared| (*id, shared)))
            .collect()
    }

    /// Every compressor's gain reduction cell, keyed by node id
    pub fn compressor_reductions(&self) -> HashMap<NodeId, Arc<AtomicF32>> {
        self.node_ids
            .iter()
            .zip(&self.nodes)
            .filter_map(|(id, node)| node.compressor_reduction().map(|cell| (*id, cell)))
            .collect()
    }
}

/// The channel count a node processes at, given its widest connected input
pub(crate) fn computed_channel_count(config: &ChannelConfig, max_input_channels: usize) -> usize {
    let count = match config.mode {
        ChannelCountMode::Max => max_input_channels,
        ChannelCountMode::ClampedMax => max_input_channels.min(config.channel_count),
        ChannelCountMode::Explicit => config.channel_count,
    };

    count.clamp(1, MAXIMUM_CHANNEL_COUNT)
}

/// The widest bus a node's mixing settings can ever ask for
pub(crate) fn channel_capacity_for(config: &ChannelConfig) -> usize {
    match config.mode {
        ChannelCountMode::Max => MAXIMUM_CHANNEL_COUNT,
        ChannelCountMode::ClampedMax | ChannelCountMode::Explicit => {
            config.channel_count.clamp(1, MAXIMUM_CHANNEL_COUNT)
        }
    }
}
