use crate::buffer::AudioBus;
use crate::graph::NodeId;

/// Per-quantum information available to every node while rendering
#[derive(Clone, Copy, Debug)]
pub struct RenderContext {
    /// The sample rate of the graph in Hz
    pub sample_rate: usize,

    /// The number of frames in a render quantum
    pub quantum_size: usize,

    /// The absolute frame index of the first frame in the current quantum
    pub current_frame: u64,
}

impl RenderContext {
    /// The length of one frame in seconds
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.sample_rate as f64
    }
}

/// An error reported by a worklet processor
///
/// A worklet that fails once is degraded to silence for the rest of the
/// topology's lifetime.
#[derive(Debug, thiserror::Error)]
#[error("worklet processor '{processor_name}' failed: {message}")]
pub struct WorkletProcessError {
    /// The name of the processor that failed
    pub processor_name: String,

    /// A host-provided description of the failure
    pub message: String,
}

/// The host-side implementation of worklet processing
///
/// The engine calls this once per quantum for every worklet node whose output
/// is needed. Implementations must be real-time safe when used with a
/// real-time executor: no allocation, locks, or blocking calls.
pub trait WorkletProcessorHost {
    /// Process one quantum for a worklet node
    ///
    /// Returns `Ok(true)` to keep the processor alive, `Ok(false)` once it
    /// has permanently finished, or an error to degrade the node to silence.
    fn process(
        &mut self,
        node_id: NodeId,
        processor_name: &str,
        context: &RenderContext,
        inputs: &[AudioBus],
        params: &[AudioBus],
        outputs: &mut [AudioBus],
    ) -> Result<bool, WorkletProcessError>;
}
