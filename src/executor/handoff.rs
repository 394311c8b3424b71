use std::sync::atomic::AtomicU64;

use crossbeam::atomic::AtomicCell;
use crossbeam::queue::ArrayQueue;

use crate::compiler::Topology;
use crate::graph::{AutomationRate, AutomationSegment, NodeId};
use crate::RETIREMENT_SLOT_COUNT;

/// A snapshot the render thread has swapped out, tagged with the generation
/// at which it was replaced
///
/// The control thread may free it only once the render thread has proven,
/// through `last_processed_generation`, that it has rendered a later
/// generation and can no longer be touching the snapshot.
pub(crate) struct Retired<T> {
    pub generation: u64,

    /// Held only so the allocation is freed here rather than on the render
    /// thread
    pub _snapshot: Box<T>,
}

/// A replacement automation timeline for one parameter
///
/// An empty segment list clears the parameter's timeline. The render thread
/// swaps the segments into place, so the old allocation travels back here and
/// is freed by the control thread.
pub(crate) struct ParameterTimelineUpdate {
    pub destination: NodeId,
    pub destination_param_index: usize,
    pub rate: AutomationRate,
    pub segments: Vec<AutomationSegment>,
}

/// A parameter-grade update: new intrinsic values and replacement timelines,
/// with no structural changes
pub(crate) struct ParameterUpdateBatch {
    pub intrinsic_values: Vec<(NodeId, usize, f32)>,
    pub timelines: Vec<ParameterTimelineUpdate>,
}

/// The shared state between a controller and its executor
///
/// Pending cells hold boxed payloads, so the atomic value is a single pointer
/// and every exchange is a lock-free swap. The retirement queues are bounded;
/// when one is full the render thread leaves the pending update in place and
/// keeps rendering with the current snapshot.
pub(crate) struct UpdateChannel {
    pub pending_topology: AtomicCell<Option<Box<Topology>>>,
    pub pending_parameters: AtomicCell<Option<Box<ParameterUpdateBatch>>>,

    pub retired_topologies: ArrayQueue<Retired<Topology>>,
    pub retired_parameters: ArrayQueue<Retired<ParameterUpdateBatch>>,

    /// The highest generation the render thread has fully processed
    pub last_processed_generation: AtomicU64,

    /// The first frame of the most recently begun quantum
    pub last_rendered_frame: AtomicU64,
}

impl UpdateChannel {
    pub fn new() -> Self {
        debug_assert!(AtomicCell::<Option<Box<Topology>>>::is_lock_free());

        Self {
            pending_topology: AtomicCell::new(None),
            pending_parameters: AtomicCell::new(None),
            retired_topologies: ArrayQueue::new(RETIREMENT_SLOT_COUNT),
            retired_parameters: ArrayQueue::new(RETIREMENT_SLOT_COUNT),
            last_processed_generation: AtomicU64::new(0),
            last_rendered_frame: AtomicU64::new(0),
        }
    }
}
