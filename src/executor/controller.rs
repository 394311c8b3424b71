use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::compiler::{
    classify_node_update, classify_update, compile_topology, CompileError, GraphUpdateKind,
    Topology,
};
use crate::graph::{AutomationSegment, GraphDescription, NodeId, ParamAutomation};
use crate::nodes::{AnalyserHandle, AnalyserShared};

use super::handoff::{
    ParameterTimelineUpdate, ParameterUpdateBatch, Retired, UpdateChannel,
};

/// Why a parameter-grade update was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParameterUpdateError {
    /// The new description changes structure, not just parameters
    #[error("the update changes more than parameter values and timelines")]
    NotParameterOnly,

    /// The new description rewrites automation the render thread has already
    /// played
    #[error("the update rewrites automation at or before frame {last_rendered_frame}")]
    RewritesPast {
        /// The first frame of the most recently rendered quantum
        last_rendered_frame: u64,
    },
}

/// The control half of a graph engine
///
/// Any non-render thread can own the controller. It compiles new
/// descriptions, hands the resulting snapshots to the executor through
/// lock-free cells, and frees retired snapshots once the executor has proven
/// it is no longer using them.
pub struct GraphController {
    description: GraphDescription,
    sample_rate: usize,
    quantum_size: usize,
    channel: Arc<UpdateChannel>,

    /// Retired snapshots drained from the executor but not yet proven safe
    /// to free
    held_topologies: Vec<Retired<Topology>>,
    held_parameters: Vec<Retired<ParameterUpdateBatch>>,

    analysers: Vec<(NodeId, Arc<AnalyserShared>)>,
    compressor_reductions: HashMap<NodeId, Arc<AtomicF32>>,
}

impl GraphController {
    pub(crate) fn new(
        description: GraphDescription,
        sample_rate: usize,
        quantum_size: usize,
        channel: Arc<UpdateChannel>,
        topology: &Topology,
    ) -> Self {
        Self {
            description,
            sample_rate,
            quantum_size,
            channel,
            held_topologies: Vec::new(),
            held_parameters: Vec::new(),
            analysers: topology.analyser_shareds(),
            compressor_reductions: topology.compressor_reductions(),
        }
    }

    /// The description currently applied or pending
    pub fn description(&self) -> &GraphDescription {
        &self.description
    }

    /// The first frame of the most recently rendered quantum
    pub fn last_rendered_frame(&self) -> u64 {
        self.channel.last_rendered_frame.load(Ordering::Acquire)
    }

    /// Compile a new description and hand it to the executor
    ///
    /// The compiled snapshot replaces any earlier pending snapshot the
    /// executor has not yet picked up; the replaced one is freed here, on the
    /// calling thread. The executor commits the snapshot at its next quantum
    /// boundary, carrying node state across for nodes that keep their id and
    /// kind.
    pub fn enqueue_topology_update(
        &mut self,
        description: &GraphDescription,
    ) -> Result<(), CompileError> {
        let topology = compile_topology(description, self.sample_rate, self.quantum_size)?;

        self.analysers = topology.analyser_shareds();
        self.compressor_reductions = topology.compressor_reductions();

        // Dropping a replaced pending snapshot is safe: the executor never
        // observed it
        self.channel.pending_topology.store(Some(Box::new(topology)));

        self.description = description.clone();

        Ok(())
    }

    /// Hand the executor a parameter-grade update without recompiling
    ///
    /// The new description must differ from the current one only in parameter
    /// values and automation timelines, and must not rewrite automation the
    /// render thread has already played.
    pub fn enqueue_parameter_update(
        &mut self,
        description: &GraphDescription,
    ) -> Result<(), ParameterUpdateError> {
        match classify_update(&self.description, description) {
            GraphUpdateKind::None => return Ok(()),
            GraphUpdateKind::Parameter => {}
            GraphUpdateKind::Topology | GraphUpdateKind::RebuildRequired => {
                return Err(ParameterUpdateError::NotParameterOnly);
            }
        }

        let last_rendered_frame = self.last_rendered_frame();

        self.check_timelines_are_forward_only(description, last_rendered_frame)?;

        let batch = self.build_parameter_batch(description);
        self.channel.pending_parameters.store(Some(Box::new(batch)));

        self.description = description.clone();

        Ok(())
    }

    fn check_timelines_are_forward_only(
        &self,
        description: &GraphDescription,
        last_rendered_frame: u64,
    ) -> Result<(), ParameterUpdateError> {
        let find = |automations: &[ParamAutomation], destination: NodeId, param_index: usize| {
            automations
                .iter()
                .find(|automation| {
                    automation.destination == destination
                        && automation.destination_param_index == param_index
                })
                .cloned()
        };

        let mut keys: Vec<(NodeId, usize)> = self
            .description
            .param_automations
            .iter()
            .chain(&description.param_automations)
            .map(|automation| (automation.destination, automation.destination_param_index))
            .collect();
        keys.sort();
        keys.dedup();

        for (destination, param_index) in keys {
            let old = find(&self.description.param_automations, destination, param_index);
            let new = find(&description.param_automations, destination, param_index);

            let old_segments = old.as_ref().map(|a| a.segments.as_slice()).unwrap_or(&[]);
            let new_segments = new.as_ref().map(|a| a.segments.as_slice()).unwrap_or(&[]);

            let rate_changed = match (&old, &new) {
                (Some(old), Some(new)) => old.rate != new.rate,
                _ => false,
            };

            let boundary = if rate_changed {
                earliest_start(old_segments).min(earliest_start(new_segments))
            } else {
                change_boundary(old_segments, new_segments)
            };

            if let Some(boundary) = boundary {
                if boundary <= last_rendered_frame {
                    return Err(ParameterUpdateError::RewritesPast {
                        last_rendered_frame,
                    });
                }
            }
        }

        Ok(())
    }

    fn build_parameter_batch(&self, description: &GraphDescription) -> ParameterUpdateBatch {
        let mut intrinsic_values = Vec::new();

        for (id, new_node) in &description.nodes {
            let old_node = &self.description.nodes[id];

            if classify_node_update(old_node, new_node) != GraphUpdateKind::Parameter {
                continue;
            }

            for param_index in 0..new_node.param_count() {
                if let Some(spec) = new_node.param_spec(param_index, self.sample_rate) {
                    intrinsic_values.push((*id, param_index, spec.initial_value));
                }
            }
        }

        // Every timeline mentioned by either description gets an entry, so a
        // removed timeline becomes an explicit clear and the render thread
        // never has to free segments itself
        let mut timelines: Vec<ParameterTimelineUpdate> = description
            .param_automations
            .iter()
            .map(|automation| ParameterTimelineUpdate {
                destination: automation.destination,
                destination_param_index: automation.destination_param_index,
                rate: automation.rate,
                segments: automation.segments.clone(),
            })
            .collect();

        for automation in &self.description.param_automations {
            let still_present = description.param_automations.iter().any(|new| {
                new.destination == automation.destination
                    && new.destination_param_index == automation.destination_param_index
            });

            if !still_present {
                timelines.push(ParameterTimelineUpdate {
                    destination: automation.destination,
                    destination_param_index: automation.destination_param_index,
                    rate: automation.rate,
                    segments: Vec::new(),
                });
            }
        }

        ParameterUpdateBatch {
            intrinsic_values,
            timelines,
        }
    }

    /// Drain retired snapshots from the executor and free the proven ones
    ///
    /// A snapshot is freed only when the executor has fully processed a later
    /// generation than the one at which the snapshot was retired. Returns the
    /// number of snapshots freed. Call this periodically; if it never runs,
    /// the retirement slots fill up and the executor defers further commits.
    pub fn collect_retired_updates(&mut self) -> usize {
        while let Some(retired) = self.channel.retired_topologies.pop() {
            self.held_topologies.push(retired);
        }

        while let Some(retired) = self.channel.retired_parameters.pop() {
            self.held_parameters.push(retired);
        }

        let proven = self.channel.last_processed_generation.load(Ordering::Acquire);

        let before = self.held_topologies.len() + self.held_parameters.len();

        self.held_topologies
            .retain(|retired| retired.generation >= proven);
        self.held_parameters
            .retain(|retired| retired.generation >= proven);

        before - self.held_topologies.len() - self.held_parameters.len()
    }

    /// The number of analysers in the current topology
    pub fn analyser_count(&self) -> usize {
        self.analysers.len()
    }

    /// The node id of an analyser, by stable index in ascending id order
    ///
    /// Indices stay valid until the next topology update.
    pub fn analyser_node_id(&self, analyser_index: usize) -> Option<NodeId> {
        self.analysers.get(analyser_index).map(|(id, _)| *id)
    }

    /// A read handle onto an analyser, usable from any thread
    pub fn analyser_handle(&self, analyser_index: usize) -> Option<AnalyserHandle> {
        self.analysers
            .get(analyser_index)
            .map(|(_, shared)| AnalyserHandle::new(shared.clone()))
    }

    /// The current gain reduction of a compressor in dB, negative while
    /// compressing
    pub fn compressor_reduction_db(&self, node_id: NodeId) -> Option<f32> {
        self.compressor_reductions
            .get(&node_id)
            .map(|cell| cell.load(Ordering::Relaxed))
    }
}

fn earliest_start(segments: &[AutomationSegment]) -> Option<u64> {
    segments.iter().map(AutomationSegment::start_frame).min()
}

/// The earliest frame whose value could change when `old` is replaced by
/// `new`, or None when they are identical
fn change_boundary(old: &[AutomationSegment], new: &[AutomationSegment]) -> Option<u64> {
    let diverged_at = old
        .iter()
        .zip(new)
        .position(|(old_segment, new_segment)| old_segment != new_segment)
        .unwrap_or(old.len().min(new.len()));

    if diverged_at == old.len() && diverged_at == new.len() {
        return None;
    }

    earliest_start(&old[diverged_at..])
        .into_iter()
        .chain(earliest_start(&new[diverged_at..]))
        .min()
}
