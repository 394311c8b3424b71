use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::buffer::{mix_into, AudioBus};
use crate::compiler::{compile_topology, computed_channel_count, ProcessingRole, Topology};
use crate::compiler::CompileError;
use crate::graph::{ChannelInterpretation, GraphDescription, NodeId};

use super::context::{RenderContext, WorkletProcessorHost};
use super::handoff::{Retired, UpdateChannel};

const STALL_LOG_INTERVAL: u64 = 256;

/// The render half of a graph engine
///
/// One thread, usually a real-time audio thread, owns the executor and drives
/// it one quantum at a time. Between [`GraphExecutor::begin_new_quantum`] and
/// the end of the quantum, nothing here allocates, frees, locks, or blocks.
pub struct GraphExecutor {
    topology: Box<Topology>,
    channel: Arc<UpdateChannel>,
    context: RenderContext,
    worklet_host: Option<Box<dyn WorkletProcessorHost + Send>>,

    /// Incremented once per quantum; tags every freshly rendered output bus
    cache_generation: u64,
    last_processed_generation: u64,
    stalled_commits: u64,
}

impl GraphExecutor {
    pub(crate) fn new(
        topology: Box<Topology>,
        channel: Arc<UpdateChannel>,
        worklet_host: Option<Box<dyn WorkletProcessorHost + Send>>,
    ) -> Self {
        let context = RenderContext {
            sample_rate: topology.sample_rate,
            quantum_size: topology.quantum_size,
            current_frame: 0,
        };

        Self {
            topology,
            channel,
            context,
            worklet_host,
            cache_generation: 1,
            last_processed_generation: 0,
            stalled_commits: 0,
        }
    }

    /// The number of frames in a render quantum
    pub fn quantum_size(&self) -> usize {
        self.context.quantum_size
    }

    /// The sample rate of the graph in Hz
    pub fn sample_rate(&self) -> usize {
        self.context.sample_rate
    }

    /// The first frame of the current quantum
    pub fn current_frame(&self) -> u64 {
        self.context.current_frame
    }

    /// Start a new quantum at the given frame
    ///
    /// Commits any pending updates, then advances the generation so the next
    /// render pass recomputes every output.
    pub fn begin_new_quantum(&mut self, frame: u64) {
        self.commit_pending_updates();

        self.context.current_frame = frame;
        self.channel
            .last_rendered_frame
            .store(frame, Ordering::Release);

        self.cache_generation += 1;
    }

    /// Apply pending topology and parameter updates, if any
    ///
    /// Called from [`GraphExecutor::begin_new_quantum`]; safe to call again
    /// at any point, and does nothing when nothing is pending. When a
    /// retirement queue is full the corresponding update stays pending and
    /// the current snapshot keeps rendering.
    pub fn commit_pending_updates(&mut self) {
        self.try_commit_pending_topology();
        self.try_commit_pending_parameters();
    }

    fn try_commit_pending_topology(&mut self) {
        if self.channel.retired_topologies.is_full() {
            self.note_stalled_commit();
            return;
        }

        let Some(mut pending) = self.channel.pending_topology.take() else {
            return;
        };

        // Nodes that survive the rebuild carry their state across
        for new_index in 0..pending.node_ids.len() {
            let id = pending.node_ids[new_index];

            if let Some(&old_index) = self.topology.index_by_id.get(&id) {
                let old_node = &mut self.topology.nodes[old_index];
                pending.nodes[new_index].take_state_from(old_node);
            }
        }

        let old = std::mem::replace(&mut self.topology, pending);

        // Cannot fail: only this thread pushes, and fullness was checked above
        let _ = self.channel.retired_topologies.push(Retired {
            generation: self.cache_generation,
            _snapshot: old,
        });

        self.last_processed_generation = 0;
    }

    fn try_commit_pending_parameters(&mut self) {
        if self.channel.retired_parameters.is_full() {
            self.note_stalled_commit();
            return;
        }

        let Some(mut batch) = self.channel.pending_parameters.take() else {
            return;
        };

        for (id, param_index, value) in &batch.intrinsic_values {
            if let Some(&node_index) = self.topology.index_by_id.get(id) {
                if let Some(state) = self.topology.param_states[node_index].get_mut(*param_index) {
                    state.intrinsic_value = *value;
                }
            }
        }

        for update in &mut batch.timelines {
            if let Some(&node_index) = self.topology.index_by_id.get(&update.destination) {
                if let Some(state) = self.topology.param_states[node_index]
                    .get_mut(update.destination_param_index)
                {
                    // Swap rather than assign, so the old segment allocation
                    // rides the retired batch back to the control thread
                    state.replace_timeline(update.rate, &mut update.segments);
                }
            }
        }

        let _ = self.channel.retired_parameters.push(Retired {
            generation: self.cache_generation,
            _snapshot: batch,
        });

        self.last_processed_generation = 0;
    }

    fn note_stalled_commit(&mut self) {
        self.stalled_commits += 1;

        if self.stalled_commits % STALL_LOG_INTERVAL == 1 {
            tracing::warn!(
                stalled_commits = self.stalled_commits,
                "retirement slots full, deferring update; is collect_retired_updates running?"
            );
        }
    }

    /// Render the graph if this quantum has not been rendered yet, and return
    /// the destination's output
    ///
    /// Repeated calls within one quantum return the memoized output without
    /// reprocessing.
    pub fn render_destination_for_current_quantum(&mut self) -> &AudioBus {
        self.process_graph_if_needed();
        self.topology.destination_bus()
    }

    /// Render the graph if this quantum has not been rendered yet, without
    /// reading the destination
    ///
    /// Keeps analysers and compressor readback advancing when the caller does
    /// not need the destination's output this quantum.
    pub fn render_analysers_for_current_quantum(&mut self) {
        self.process_graph_if_needed();
    }

    fn process_graph_if_needed(&mut self) {
        if self.last_processed_generation == self.cache_generation {
            return;
        }

        let host = self
            .worklet_host
            .as_deref_mut()
            .map(|host| host as &mut dyn WorkletProcessorHost);

        process_graph(&mut self.topology, &self.context, host, self.cache_generation);

        self.last_processed_generation = self.cache_generation;
        self.channel
            .last_processed_generation
            .store(self.cache_generation, Ordering::Release);
    }

    /// Schedule a source node to start playing at a frame
    ///
    /// Returns false if the node is unknown or not schedulable.
    pub fn schedule_source_start(&mut self, node_id: NodeId, frame: Option<u64>) -> bool {
        let Some(&node_index) = self.topology.index_by_id.get(&node_id) else {
            return false;
        };

        self.topology.nodes[node_index].schedule_start(frame)
    }

    /// Schedule a source node to stop playing at a frame
    ///
    /// Returns false if the node is unknown or not schedulable.
    pub fn schedule_source_stop(&mut self, node_id: NodeId, frame: Option<u64>) -> bool {
        let Some(&node_index) = self.topology.index_by_id.get(&node_id) else {
            return false;
        };

        self.topology.nodes[node_index].schedule_stop(frame)
    }

    /// Recompile and swap in a new description synchronously
    ///
    /// For offline rendering, where the caller owns the clock and there is no
    /// real-time constraint. Allocates and frees on the calling thread; never
    /// call this from a real-time render thread.
    pub fn apply_update_offline(
        &mut self,
        description: &GraphDescription,
    ) -> Result<(), CompileError> {
        let mut pending = Box::new(compile_topology(
            description,
            self.context.sample_rate,
            self.context.quantum_size,
        )?);

        for new_index in 0..pending.node_ids.len() {
            let id = pending.node_ids[new_index];

            if let Some(&old_index) = self.topology.index_by_id.get(&id) {
                let old_node = &mut self.topology.nodes[old_index];
                pending.nodes[new_index].take_state_from(old_node);
            }
        }

        let _old = std::mem::replace(&mut self.topology, pending);
        self.last_processed_generation = 0;

        Ok(())
    }
}

/// Render every processing step in topological order
///
/// Each step mixes its inputs, evaluates its parameters, and runs its node.
/// Output buses are tagged with the generation; mixing only reads buses
/// rendered in the current generation, so stale audio never leaks across a
/// topology swap.
fn process_graph(
    topology: &mut Topology,
    context: &RenderContext,
    mut host: Option<&mut (dyn WorkletProcessorHost + '_)>,
    cache_generation: u64,
) {
    let quantum_size = context.quantum_size;

    let Topology {
        sample_rate,
        processing,
        processing_order,
        audio_inputs,
        param_inputs,
        mixing,
        input_buses,
        output_buses,
        output_ranges,
        param_states,
        param_buses,
        nodes,
        output_generations,
        ..
    } = topology;

    for &step_index in processing_order.iter() {
        let step = processing[step_index];
        let node_index = step.node_index;

        // Mix audio inputs into this step's scratch buses
        for input_index in 0..audio_inputs[step_index].len() {
            let mut any_live = false;
            let mut widest_source = 0;

            for connection in &audio_inputs[step_index][input_index] {
                let source_node = processing[connection.source_processing_index].node_index;
                let (start, _) = output_ranges[source_node];
                let source = &output_buses[start + connection.source_output_index];

                let fresh =
                    output_generations[connection.source_processing_index] == cache_generation;

                if fresh && !source.is_silent_marker() {
                    any_live = true;
                    widest_source = widest_source.max(source.channel_count());
                }
            }

            let mix_bus = &mut input_buses[step_index][input_index];

            if !any_live {
                mix_bus.set_channel_count(0);
                continue;
            }

            let channel_count = computed_channel_count(&mixing[step_index], widest_source)
                .min(mix_bus.channel_capacity());

            mix_bus.set_channel_count(channel_count);
            mix_bus.set_frame_count(quantum_size);
            mix_bus.clear();

            for connection in &audio_inputs[step_index][input_index] {
                let source_node = processing[connection.source_processing_index].node_index;
                let (start, _) = output_ranges[source_node];
                let source = &output_buses[start + connection.source_output_index];

                let fresh =
                    output_generations[connection.source_processing_index] == cache_generation;

                if fresh && !source.is_silent_marker() {
                    mix_into(mix_bus, source, mixing[step_index].interpretation);
                }
            }
        }

        // Evaluate parameters owned by this step
        for param_index in 0..param_inputs[step_index].len() {
            let param_bus = &mut param_buses[node_index][param_index];
            param_bus.set_channel_count(1);
            param_bus.set_frame_count(quantum_size);
            param_bus.clear();

            let mut has_inputs = false;

            for connection in &param_inputs[step_index][param_index] {
                let source_node = processing[connection.source_processing_index].node_index;
                let (start, _) = output_ranges[source_node];
                let source = &output_buses[start + connection.source_output_index];

                let fresh =
                    output_generations[connection.source_processing_index] == cache_generation;

                if fresh && !source.is_silent_marker() {
                    has_inputs = true;
                    mix_into(param_bus, source, ChannelInterpretation::Speakers);
                }
            }

            param_states[node_index][param_index].evaluate_into(
                param_bus,
                context.current_frame,
                quantum_size,
                *sample_rate,
                has_inputs,
            );
        }

        // Run the node
        let (start, count) = output_ranges[node_index];

        match step.role {
            ProcessingRole::Whole => {
                let outputs = &mut output_buses[start..start + count];

                nodes[node_index].process(
                    context,
                    &input_buses[step_index],
                    &param_buses[node_index],
                    outputs,
                    host.as_deref_mut(),
                );
            }
            ProcessingRole::DelayWriter => {
                if let (Some(delay), Some(input)) = (
                    nodes[node_index].as_delay_mut(),
                    input_buses[step_index].first(),
                ) {
                    delay.write_quantum(context, input);
                }
            }
            ProcessingRole::DelayReader => {
                if let Some(delay) = nodes[node_index].as_delay_mut() {
                    let outputs = &mut output_buses[start..start + count];
                    delay.read_quantum(context, &param_buses[node_index], outputs);
                }
            }
        }

        output_generations[step_index] = cache_generation;
    }
}
