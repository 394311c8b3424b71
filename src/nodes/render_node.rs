use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::buffer::AudioBus;
use crate::executor::{RenderContext, WorkletProcessorHost};
use crate::graph::{NodeDescription, NodeId};

use super::analyser::{AnalyserRenderNode, AnalyserShared};
use super::compressor::CompressorRenderNode;
use super::constant_source::ConstantSourceRenderNode;
use super::delay::DelayRenderNode;
use super::destination::DestinationRenderNode;
use super::gain::GainRenderNode;
use super::oscillator::OscillatorRenderNode;
use super::worklet::WorkletRenderNode;

/// A compiled node, ready to render
///
/// The set of node kinds is closed, so dispatch is a match rather than a
/// virtual call and the whole graph can be stored inline in the topology.
pub(crate) enum RenderNode {
    Destination(DestinationRenderNode),
    ConstantSource(ConstantSourceRenderNode),
    Oscillator(OscillatorRenderNode),
    Gain(GainRenderNode),
    Delay(DelayRenderNode),
    Analyser(AnalyserRenderNode),
    DynamicsCompressor(CompressorRenderNode),
    Worklet(WorkletRenderNode),
}

impl RenderNode {
    pub fn new(
        id: NodeId,
        description: &NodeDescription,
        sample_rate: usize,
        quantum_size: usize,
    ) -> Self {
        match description {
            NodeDescription::Destination(destination) => {
                Self::Destination(DestinationRenderNode::new(destination.channel_count))
            }
            NodeDescription::ConstantSource(_) => {
                Self::ConstantSource(ConstantSourceRenderNode::new())
            }
            NodeDescription::Oscillator(_) => Self::Oscillator(OscillatorRenderNode::new()),
            NodeDescription::Gain(_) => Self::Gain(GainRenderNode::new()),
            NodeDescription::Delay(delay) => Self::Delay(DelayRenderNode::new(
                delay.channel_config.channel_count,
                delay.maximum_delay_time,
                sample_rate,
                quantum_size,
            )),
            NodeDescription::Analyser(analyser) => {
                Self::Analyser(AnalyserRenderNode::new(analyser.fft_size))
            }
            NodeDescription::DynamicsCompressor(_) => {
                Self::DynamicsCompressor(CompressorRenderNode::new())
            }
            NodeDescription::Worklet(worklet) => {
                Self::Worklet(WorkletRenderNode::new(id, worklet.processor_name.clone()))
            }
        }
    }

    pub fn process(
        &mut self,
        context: &RenderContext,
        inputs: &[AudioBus],
        params: &[AudioBus],
        outputs: &mut [AudioBus],
        host: Option<&mut (dyn WorkletProcessorHost + '_)>,
    ) {
        match self {
            Self::Destination(node) => node.process(context.quantum_size, inputs, outputs),
            Self::ConstantSource(node) => node.process(context, params, outputs),
            Self::Oscillator(node) => node.process(context, params, outputs),
            Self::Gain(node) => node.process(inputs, params, outputs),
            Self::Delay(node) => node.process(context, inputs, params, outputs),
            Self::Analyser(node) => node.process(context, inputs, outputs),
            Self::DynamicsCompressor(node) => node.process(context, inputs, params, outputs),
            Self::Worklet(node) => node.process(context, inputs, params, outputs, host),
        }
    }

    /// Schedule a source to start playing, returning false for kinds that
    /// cannot be scheduled
    pub fn schedule_start(&mut self, frame: Option<u64>) -> bool {
        match self {
            Self::ConstantSource(node) => {
                node.schedule_start(frame);
                true
            }
            Self::Oscillator(node) => {
                node.schedule_start(frame);
                true
            }
            _ => false,
        }
    }

    /// Schedule a source to stop playing, returning false for kinds that
    /// cannot be scheduled
    pub fn schedule_stop(&mut self, frame: Option<u64>) -> bool {
        match self {
            Self::ConstantSource(node) => {
                node.schedule_stop(frame);
                true
            }
            Self::Oscillator(node) => {
                node.schedule_stop(frame);
                true
            }
            _ => false,
        }
    }

    /// Move render state across from the node this one replaces
    ///
    /// Only nodes of the same kind exchange state. Runs on the render thread
    /// during a topology commit, so it must not allocate or free.
    pub fn take_state_from(&mut self, other: &mut RenderNode) {
        match (self, other) {
            (Self::ConstantSource(new), Self::ConstantSource(old)) => new.take_state_from(old),
            (Self::Oscillator(new), Self::Oscillator(old)) => new.take_state_from(old),
            (Self::Delay(new), Self::Delay(old)) => new.take_state_from(old),
            (Self::Analyser(new), Self::Analyser(old)) => new.take_state_from(old),
            (Self::DynamicsCompressor(new), Self::DynamicsCompressor(old)) => {
                new.take_state_from(old)
            }
            (Self::Worklet(new), Self::Worklet(old)) => new.take_state_from(old),
            _ => {}
        }
    }

    pub fn as_delay_mut(&mut self) -> Option<&mut DelayRenderNode> {
        match self {
            Self::Delay(node) => Some(node),
            _ => None,
        }
    }

    pub fn analyser_shared(&self) -> Option<Arc<AnalyserShared>> {
        match self {
            Self::Analyser(node) => Some(node.shared()),
            _ => None,
        }
    }

    pub fn compressor_reduction(&self) -> Option<Arc<AtomicF32>> {
        match self {
            Self::DynamicsCompressor(node) => Some(node.reduction_db()),
            _ => None,
        }
    }
}
