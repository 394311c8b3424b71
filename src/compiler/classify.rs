use crate::graph::{GraphDescription, NodeDescription};

/// The cheapest way a new description can be applied to a running graph
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum GraphUpdateKind {
    /// The descriptions are identical
    None,

    /// Only parameter values or automation timelines changed
    Parameter,

    /// Connections or mixing settings changed, but every node keeps its
    /// identity and allocation
    Topology,

    /// Nodes were added, removed, or changed in a way that needs a new
    /// allocation
    RebuildRequired,
}

/// Compare two descriptions and report the cheapest applicable update
pub fn classify_update(old: &GraphDescription, new: &GraphDescription) -> GraphUpdateKind {
    if old.destination_node_id != new.destination_node_id {
        return GraphUpdateKind::RebuildRequired;
    }

    if old.nodes.len() != new.nodes.len()
        || !old.nodes.keys().all(|id| new.nodes.contains_key(id))
    {
        return GraphUpdateKind::RebuildRequired;
    }

    let mut kind = GraphUpdateKind::None;

    for (id, old_node) in &old.nodes {
        let new_node = &new.nodes[id];
        kind = kind.max(classify_node_update(old_node, new_node));

        if kind == GraphUpdateKind::RebuildRequired {
            return kind;
        }
    }

    if old.connections != new.connections || old.param_connections != new.param_connections {
        kind = kind.max(GraphUpdateKind::Topology);
    }

    if old.param_automations != new.param_automations {
        kind = kind.max(GraphUpdateKind::Parameter);
    }

    kind
}

pub(crate) fn classify_node_update(
    old: &NodeDescription,
    new: &NodeDescription,
) -> GraphUpdateKind {
    use GraphUpdateKind::*;

    match (old, new) {
        (NodeDescription::Destination(old), NodeDescription::Destination(new)) => {
            if old.channel_count != new.channel_count {
                Topology
            } else {
                None
            }
        }
        (NodeDescription::ConstantSource(old), NodeDescription::ConstantSource(new)) => {
            if old.offset != new.offset {
                Parameter
            } else {
                None
            }
        }
        (NodeDescription::Oscillator(old), NodeDescription::Oscillator(new)) => {
            if old.frequency != new.frequency || old.detune != new.detune {
                Parameter
            } else {
                None
            }
        }
        (NodeDescription::Gain(old), NodeDescription::Gain(new)) => {
            if old.channel_config != new.channel_config {
                Topology
            } else if old.gain != new.gain {
                Parameter
            } else {
                None
            }
        }
        (NodeDescription::Delay(old), NodeDescription::Delay(new)) => {
            // The delay line allocation depends on both of these
            if old.maximum_delay_time != new.maximum_delay_time
                || old.channel_config.channel_count != new.channel_config.channel_count
            {
                RebuildRequired
            } else if old.channel_config != new.channel_config {
                Topology
            } else if old.delay_time != new.delay_time {
                Parameter
            } else {
                None
            }
        }
        (NodeDescription::Analyser(old), NodeDescription::Analyser(new)) => {
            if old.fft_size != new.fft_size {
                RebuildRequired
            } else if old.channel_config != new.channel_config {
                Topology
            } else {
                None
            }
        }
        (NodeDescription::DynamicsCompressor(old), NodeDescription::DynamicsCompressor(new)) => {
            if old.channel_config != new.channel_config {
                Topology
            } else if (
                old.threshold,
                old.knee,
                old.ratio,
                old.attack,
                old.release,
            ) != (
                new.threshold,
                new.knee,
                new.ratio,
                new.attack,
                new.release,
            ) {
                Parameter
            } else {
                None
            }
        }
        (NodeDescription::Worklet(old), NodeDescription::Worklet(new)) => {
            if old.processor_name != new.processor_name
                || old.input_count != new.input_count
                || old.output_count != new.output_count
                || old.output_channel_count != new.output_channel_count
                || old.parameter_names != new.parameter_names
            {
                RebuildRequired
            } else if old.channel_config != new.channel_config {
                Topology
            } else {
                None
            }
        }
        _ => RebuildRequired,
    }
}
