use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use itertools::Itertools;

use crate::automation::ParamAutomationState;
use crate::buffer::AudioBus;
use crate::graph::{GraphDescription, NodeDescription, NodeId, NodeKind};
use crate::nodes::RenderNode;

use super::cycles::nodes_in_cycles;
use super::error::CompileError;
use super::topology::{
    channel_capacity_for, InputConnection, ProcessingNode, ProcessingRole, Topology,
};

/// Compile a graph description into an immutable topology snapshot
///
/// Node ids are mapped to dense indices in ascending id order, so compilation
/// is deterministic for a given description. Delays inside feedback cycles are
/// split into reader and writer steps; a cycle that no delay breaks is an
/// error.
pub(crate) fn compile_topology(
    description: &GraphDescription,
    sample_rate: usize,
    quantum_size: usize,
) -> Result<Topology, CompileError> {
    let node_ids: Vec<NodeId> = description.nodes.keys().copied().sorted().collect();

    let index_by_id: HashMap<NodeId, usize> = node_ids
        .iter()
        .enumerate()
        .map(|(index, id)| (*id, index))
        .collect();

    let descriptions: Vec<&NodeDescription> =
        node_ids.iter().map(|id| &description.nodes[id]).collect();

    let node_index_of = |id: NodeId| -> Result<usize, CompileError> {
        index_by_id.get(&id).copied().ok_or(CompileError::UnknownNode(id))
    };

    let destination_node_index = node_index_of(description.destination_node_id)?;

    if descriptions[destination_node_index].kind() != NodeKind::Destination {
        return Err(CompileError::InvalidDestination(
            description.destination_node_id,
        ));
    }

    for connection in &description.connections {
        let source = node_index_of(connection.source)?;
        let destination = node_index_of(connection.destination)?;

        let valid = connection.source_output_index < descriptions[source].output_count()
            && connection.destination_input_index < descriptions[destination].input_count();

        if !valid {
            return Err(CompileError::InvalidConnection {
                source_node: connection.source,
                destination: connection.destination,
            });
        }
    }

    for connection in &description.param_connections {
        let source = node_index_of(connection.source)?;
        let destination = node_index_of(connection.destination)?;

        if connection.source_output_index >= descriptions[source].output_count()
            || connection.destination_param_index >= descriptions[destination].param_count()
        {
            return Err(CompileError::InvalidParamConnection {
                destination: connection.destination,
                param_index: connection.destination_param_index,
            });
        }
    }

    for automation in &description.param_automations {
        let destination = node_index_of(automation.destination)?;

        if automation.destination_param_index >= descriptions[destination].param_count() {
            return Err(CompileError::InvalidParamConnection {
                destination: automation.destination,
                param_index: automation.destination_param_index,
            });
        }

        if !automation.is_well_formed() {
            return Err(CompileError::MalformedAutomation {
                node: automation.destination,
                param_index: automation.destination_param_index,
            });
        }
    }

    // Find feedback cycles on the plain node graph to decide which delays to
    // split
    let mut node_adjacency: Vec<Vec<usize>> = vec![Vec::new(); node_ids.len()];

    for connection in &description.connections {
        let source = index_by_id[&connection.source];
        let destination = index_by_id[&connection.destination];
        node_adjacency[source].push(destination);
    }

    for connection in &description.param_connections {
        let source = index_by_id[&connection.source];
        let destination = index_by_id[&connection.destination];
        node_adjacency[source].push(destination);
    }

    let in_cycle = nodes_in_cycles(node_ids.len(), &node_adjacency);

    let is_split = |node_index: usize| -> bool {
        in_cycle[node_index] && descriptions[node_index].kind() == NodeKind::Delay
    };

    // Build the processing steps. A split delay's reader produces its outputs
    // and owns its parameters; the writer consumes its audio inputs.
    let mut processing: Vec<ProcessingNode> = Vec::new();
    let mut output_step: Vec<usize> = vec![0; node_ids.len()];
    let mut input_step: Vec<usize> = vec![0; node_ids.len()];

    for node_index in 0..node_ids.len() {
        if is_split(node_index) {
            output_step[node_index] = processing.len();
            processing.push(ProcessingNode {
                role: ProcessingRole::DelayReader,
                node_index,
            });

            input_step[node_index] = processing.len();
            processing.push(ProcessingNode {
                role: ProcessingRole::DelayWriter,
                node_index,
            });
        } else {
            output_step[node_index] = processing.len();
            input_step[node_index] = processing.len();
            processing.push(ProcessingNode {
                role: ProcessingRole::Whole,
                node_index,
            });
        }
    }

    // Edges between processing steps; a connection out of a split delay
    // leaves its reader, and one into it arrives at its writer
    let mut step_adjacency: Vec<Vec<usize>> = vec![Vec::new(); processing.len()];
    let mut in_degree: Vec<usize> = vec![0; processing.len()];

    for connection in &description.connections {
        let source = output_step[index_by_id[&connection.source]];
        let destination = input_step[index_by_id[&connection.destination]];
        step_adjacency[source].push(destination);
        in_degree[destination] += 1;
    }

    for connection in &description.param_connections {
        let source = output_step[index_by_id[&connection.source]];
        let destination = output_step[index_by_id[&connection.destination]];
        step_adjacency[source].push(destination);
        in_degree[destination] += 1;
    }

    // Kahn's algorithm with a deterministic tie-break: lowest node id first,
    // and a split delay's writer before its reader when both are ready
    let role_rank = |role: ProcessingRole| -> u8 {
        match role {
            ProcessingRole::Whole | ProcessingRole::DelayWriter => 0,
            ProcessingRole::DelayReader => 1,
        }
    };

    let ready_key = |step_index: usize| {
        let step = processing[step_index];
        Reverse((
            node_ids[step.node_index].value(),
            role_rank(step.role),
            step_index,
        ))
    };

    let mut ready: BinaryHeap<_> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, degree)| **degree == 0)
        .map(|(step_index, _)| ready_key(step_index))
        .collect();

    let mut processing_order: Vec<usize> = Vec::with_capacity(processing.len());
    let mut in_degree = in_degree;

    while let Some(Reverse((_, _, step_index))) = ready.pop() {
        processing_order.push(step_index);

        for &successor in &step_adjacency[step_index] {
            in_degree[successor] -= 1;

            if in_degree[successor] == 0 {
                ready.push(ready_key(successor));
            }
        }
    }

    if processing_order.len() != processing.len() {
        return Err(CompileError::CyclicGraph);
    }

    // Per-step mixing settings and connection tables
    let mixing = processing
        .iter()
        .map(|step| descriptions[step.node_index].channel_config())
        .collect::<Vec<_>>();

    let mut audio_inputs: Vec<Vec<Vec<InputConnection>>> = processing
        .iter()
        .map(|step| match step.role {
            ProcessingRole::Whole => {
                vec![Vec::new(); descriptions[step.node_index].input_count()]
            }
            ProcessingRole::DelayWriter => vec![Vec::new()],
            ProcessingRole::DelayReader => Vec::new(),
        })
        .collect();

    let mut param_inputs: Vec<Vec<Vec<InputConnection>>> = processing
        .iter()
        .map(|step| match step.role {
            ProcessingRole::Whole | ProcessingRole::DelayReader => {
                vec![Vec::new(); descriptions[step.node_index].param_count()]
            }
            ProcessingRole::DelayWriter => Vec::new(),
        })
        .collect();

    for connection in &description.connections {
        let source = index_by_id[&connection.source];
        let destination = input_step[index_by_id[&connection.destination]];

        audio_inputs[destination][connection.destination_input_index].push(InputConnection {
            source_processing_index: output_step[source],
            source_output_index: connection.source_output_index,
        });
    }

    for connection in &description.param_connections {
        let source = index_by_id[&connection.source];
        let destination = output_step[index_by_id[&connection.destination]];

        param_inputs[destination][connection.destination_param_index].push(InputConnection {
            source_processing_index: output_step[source],
            source_output_index: connection.source_output_index,
        });
    }

    // Pre-size every bus the render thread will ever touch
    let input_buses: Vec<Vec<AudioBus>> = processing
        .iter()
        .zip(&audio_inputs)
        .map(|(step, slots)| {
            let capacity = channel_capacity_for(&descriptions[step.node_index].channel_config());

            slots
                .iter()
                .map(|_| AudioBus::with_capacity(0, quantum_size, capacity, quantum_size))
                .collect()
        })
        .collect();

    let mut nodes: Vec<RenderNode> = Vec::with_capacity(node_ids.len());

    for (node_index, node_description) in descriptions.iter().enumerate() {
        let mut node = RenderNode::new(
            node_ids[node_index],
            node_description,
            sample_rate,
            quantum_size,
        );

        if is_split(node_index) {
            if let Some(delay) = node.as_delay_mut() {
                delay.set_breaks_cycle(quantum_size);
            }
        }

        nodes.push(node);
    }

    let mut output_buses: Vec<AudioBus> = Vec::new();
    let mut output_ranges: Vec<(usize, usize)> = Vec::with_capacity(node_ids.len());

    for node_description in &descriptions {
        let output_count = node_description.output_count();
        let capacity = output_channel_capacity(node_description);

        output_ranges.push((output_buses.len(), output_count));

        for _ in 0..output_count {
            output_buses.push(AudioBus::with_capacity(0, quantum_size, capacity, quantum_size));
        }
    }

    let mut param_states: Vec<Vec<ParamAutomationState>> = descriptions
        .iter()
        .map(|node_description| {
            (0..node_description.param_count())
                .filter_map(|param_index| node_description.param_spec(param_index, sample_rate))
                .map(|spec| ParamAutomationState::new(&spec))
                .collect()
        })
        .collect();

    for automation in &description.param_automations {
        let node_index = index_by_id[&automation.destination];
        let state = &mut param_states[node_index][automation.destination_param_index];
        state.set_timeline(automation.rate, automation.segments.clone());
    }

    let param_buses: Vec<Vec<AudioBus>> = descriptions
        .iter()
        .map(|node_description| {
            (0..node_description.param_count())
                .map(|_| AudioBus::with_capacity(1, quantum_size, 1, quantum_size))
                .collect()
        })
        .collect();

    let output_generations = vec![0; processing.len()];

    Ok(Topology {
        sample_rate,
        quantum_size,
        node_ids,
        index_by_id,
        nodes,
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
        destination_node_index,
        output_generations,
    })
}

fn output_channel_capacity(description: &NodeDescription) -> usize {
    match description {
        NodeDescription::Destination(destination) => destination.channel_count.max(1),
        NodeDescription::ConstantSource(_) | NodeDescription::Oscillator(_) => 1,
        NodeDescription::Delay(delay) => delay.channel_config.channel_count.max(1),
        NodeDescription::Worklet(worklet) => worklet.output_channel_count.max(1),
        _ => channel_capacity_for(&description.channel_config()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::graph::{
        ChannelConfig, ConstantSourceDescription, DelayDescription, GainDescription,
        GraphConnection,
    };

    fn simple_graph() -> (GraphDescription, NodeId, NodeId) {
        let destination_id = NodeId::generate();
        let source_id = NodeId::generate();

        let mut description = GraphDescription::with_destination(destination_id, 2);

        description.add_node(
            source_id,
            NodeDescription::ConstantSource(ConstantSourceDescription { offset: 1.0 }),
        );

        description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

        (description, destination_id, source_id)
    }

    #[test]
    fn sources_are_ordered_before_their_consumers() {
        let (description, destination_id, source_id) = simple_graph();

        let topology = compile_topology(&description, 48_000, 128).expect("should compile");

        let order: Vec<NodeId> = topology
            .processing_order
            .iter()
            .map(|&step| topology.node_ids[topology.processing[step].node_index])
            .collect();

        let source_position = order.iter().position(|id| *id == source_id);
        let destination_position = order.iter().position(|id| *id == destination_id);

        assert!(source_position < destination_position);
    }

    #[test]
    fn an_unknown_connection_endpoint_is_rejected() {
        let (mut description, destination_id, _) = simple_graph();

        let missing = NodeId::generate();
        description.connect(GraphConnection::new(missing, 0, destination_id, 0));

        assert_eq!(
            compile_topology(&description, 48_000, 128).err(),
            Some(CompileError::UnknownNode(missing))
        );
    }

    #[test]
    fn a_cycle_without_a_delay_is_rejected() {
        let (mut description, _, _) = simple_graph();

        let first = NodeId::generate();
        let second = NodeId::generate();

        let gain = || {
            NodeDescription::Gain(GainDescription {
                gain: 1.0,
                channel_config: ChannelConfig::default(),
            })
        };

        description.add_node(first, gain());
        description.add_node(second, gain());
        description.connect(GraphConnection::new(first, 0, second, 0));
        description.connect(GraphConnection::new(second, 0, first, 0));

        assert_eq!(
            compile_topology(&description, 48_000, 128).err(),
            Some(CompileError::CyclicGraph)
        );
    }

    #[test]
    fn a_delay_in_a_cycle_is_split_into_reader_and_writer() {
        let (mut description, destination_id, _) = simple_graph();

        let gain_id = NodeId::generate();
        let delay_id = NodeId::generate();

        description.add_node(
            gain_id,
            NodeDescription::Gain(GainDescription {
                gain: 0.5,
                channel_config: ChannelConfig::default(),
            }),
        );

        description.add_node(
            delay_id,
            NodeDescription::Delay(DelayDescription {
                delay_time: 0.01,
                maximum_delay_time: 0.1,
                channel_config: ChannelConfig::default(),
            }),
        );

        description.connect(GraphConnection::new(gain_id, 0, delay_id, 0));
        description.connect(GraphConnection::new(delay_id, 0, gain_id, 0));
        description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

        let topology = compile_topology(&description, 48_000, 128).expect("should compile");

        assert_eq!(topology.processing.len(), topology.nodes.len() + 1);

        let delay_index = topology.index_by_id[&delay_id];

        let reader_position = topology
            .processing_order
            .iter()
            .position(|&step| {
                topology.processing[step].node_index == delay_index
                    && topology.processing[step].role == ProcessingRole::DelayReader
            })
            .expect("reader step should exist");

        let writer_position = topology
            .processing_order
            .iter()
            .position(|&step| {
                topology.processing[step].node_index == delay_index
                    && topology.processing[step].role == ProcessingRole::DelayWriter
            })
            .expect("writer step should exist");

        // The reader produces last quantum's audio before the loop feeds the
        // writer
        assert!(reader_position < writer_position);
    }

    #[test]
    fn node_indices_follow_ascending_id_order() {
        let (description, _, _) = simple_graph();

        let topology = compile_topology(&description, 48_000, 128).expect("should compile");

        let mut sorted = topology.node_ids.clone();
        sorted.sort();
        assert_eq!(topology.node_ids, sorted);
    }
}
