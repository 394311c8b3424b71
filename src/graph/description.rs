use std::collections::HashMap;

use super::{NodeId, ParamAutomation};

/// How a node chooses its processing channel count from its inputs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelCountMode {
    /// Use the widest connected input
    Max,

    /// Use the widest connected input, clamped to the configured count
    ClampedMax,

    /// Always use the configured count
    Explicit,
}

/// How buses with differing channel counts are combined
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelInterpretation {
    /// Use speaker up-mix and down-mix rules for mono and stereo
    Speakers,

    /// Match channels by index and drop the rest
    Discrete,
}

/// The channel mixing settings for one node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelConfig {
    /// The configured channel count, interpreted according to the mode
    pub channel_count: usize,

    /// How the processing channel count is derived from the inputs
    pub mode: ChannelCountMode,

    /// How input buses are combined
    pub interpretation: ChannelInterpretation,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            channel_count: 2,
            mode: ChannelCountMode::Max,
            interpretation: ChannelInterpretation::Speakers,
        }
    }
}

/// The kind of a node, independent of its settings
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// The graph's terminal output
    Destination,

    /// A schedulable source that emits a constant offset
    ConstantSource,

    /// A schedulable sine oscillator
    Oscillator,

    /// A per-sample gain stage
    Gain,

    /// A delay line
    Delay,

    /// A pass-through tap that exposes time and frequency data
    Analyser,

    /// A dynamics compressor
    DynamicsCompressor,

    /// A node whose processing is delegated to a host
    Worklet,
}

/// Settings for the graph's terminal output
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DestinationDescription {
    /// The number of output channels to render
    pub channel_count: usize,
}

/// Settings for a constant source node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantSourceDescription {
    /// The value emitted while the source is playing
    pub offset: f32,
}

impl ConstantSourceDescription {
    /// The parameter index of the offset
    pub const OFFSET: usize = 0;
}

/// Settings for an oscillator node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OscillatorDescription {
    /// The frequency in Hz
    pub frequency: f32,

    /// A detune applied to the frequency, in cents
    pub detune: f32,
}

impl OscillatorDescription {
    /// The parameter index of the frequency
    pub const FREQUENCY: usize = 0;

    /// The parameter index of the detune
    pub const DETUNE: usize = 1;
}

/// Settings for a gain node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GainDescription {
    /// The linear gain applied to the input
    pub gain: f32,

    /// Channel mixing settings
    pub channel_config: ChannelConfig,
}

impl GainDescription {
    /// The parameter index of the gain
    pub const GAIN: usize = 0;
}

/// Settings for a delay node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DelayDescription {
    /// The delay in seconds
    pub delay_time: f64,

    /// The largest delay this node will ever be asked for, in seconds
    ///
    /// This bounds the delay line allocation, so it cannot be changed without
    /// rebuilding the node.
    pub maximum_delay_time: f64,

    /// Channel mixing settings
    pub channel_config: ChannelConfig,
}

impl DelayDescription {
    /// The parameter index of the delay time
    pub const DELAY_TIME: usize = 0;
}

/// Settings for an analyser node
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyserDescription {
    /// The FFT size, a power of two between 32 and 32768
    pub fft_size: usize,

    /// Channel mixing settings
    pub channel_config: ChannelConfig,
}

/// Settings for a dynamics compressor node
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DynamicsCompressorDescription {
    /// The level above which compression starts, in dB
    pub threshold: f32,

    /// The width of the soft knee, in dB
    pub knee: f32,

    /// The amount of input level change per dB of output level change
    pub ratio: f32,

    /// The time to reduce gain by 10 dB, in seconds
    pub attack: f32,

    /// The time to restore gain by 10 dB, in seconds
    pub release: f32,

    /// Channel mixing settings
    pub channel_config: ChannelConfig,
}

impl DynamicsCompressorDescription {
    /// The parameter index of the threshold
    pub const THRESHOLD: usize = 0;

    /// The parameter index of the knee
    pub const KNEE: usize = 1;

    /// The parameter index of the ratio
    pub const RATIO: usize = 2;

    /// The parameter index of the attack time
    pub const ATTACK: usize = 3;

    /// The parameter index of the release time
    pub const RELEASE: usize = 4;
}

/// Settings for a worklet node, whose processing is delegated to the host
#[derive(Clone, Debug, PartialEq)]
pub struct WorkletDescription {
    /// The name the host uses to pick a processor implementation
    pub processor_name: String,

    /// The number of input buses
    pub input_count: usize,

    /// The number of output buses
    pub output_count: usize,

    /// The channel count of each output bus
    pub output_channel_count: usize,

    /// The names of the processor's parameters, in parameter index order
    pub parameter_names: Vec<String>,

    /// Channel mixing settings
    pub channel_config: ChannelConfig,
}

/// A node in a graph description
#[derive(Clone, Debug, PartialEq)]
pub enum NodeDescription {
    /// The graph's terminal output
    Destination(DestinationDescription),

    /// A schedulable source that emits a constant offset
    ConstantSource(ConstantSourceDescription),

    /// A schedulable sine oscillator
    Oscillator(OscillatorDescription),

    /// A per-sample gain stage
    Gain(GainDescription),

    /// A delay line
    Delay(DelayDescription),

    /// A pass-through tap that exposes time and frequency data
    Analyser(AnalyserDescription),

    /// A dynamics compressor
    DynamicsCompressor(DynamicsCompressorDescription),

    /// A node whose processing is delegated to a host
    Worklet(WorkletDescription),
}

pub(crate) struct ParamSpec {
    pub initial_value: f32,
    pub default_value: f32,
    pub minimum_value: f32,
    pub maximum_value: f32,
}

impl ParamSpec {
    fn unbounded(initial_value: f32, default_value: f32) -> Self {
        Self {
            initial_value,
            default_value,
            minimum_value: f32::MIN,
            maximum_value: f32::MAX,
        }
    }

    fn bounded(
        initial_value: f32,
        default_value: f32,
        minimum_value: f32,
        maximum_value: f32,
    ) -> Self {
        Self {
            initial_value,
            default_value,
            minimum_value,
            maximum_value,
        }
    }
}

impl NodeDescription {
    /// The kind of node this description builds
    pub fn kind(&self) -> NodeKind {
        match self {
            Self::Destination(_) => NodeKind::Destination,
            Self::ConstantSource(_) => NodeKind::ConstantSource,
            Self::Oscillator(_) => NodeKind::Oscillator,
            Self::Gain(_) => NodeKind::Gain,
            Self::Delay(_) => NodeKind::Delay,
            Self::Analyser(_) => NodeKind::Analyser,
            Self::DynamicsCompressor(_) => NodeKind::DynamicsCompressor,
            Self::Worklet(_) => NodeKind::Worklet,
        }
    }

    pub(crate) fn channel_config(&self) -> ChannelConfig {
        match self {
            Self::Destination(destination) => ChannelConfig {
                channel_count: destination.channel_count,
                mode: ChannelCountMode::Explicit,
                interpretation: ChannelInterpretation::Speakers,
            },
            Self::ConstantSource(_) | Self::Oscillator(_) => ChannelConfig::default(),
            Self::Gain(gain) => gain.channel_config,
            Self::Delay(delay) => delay.channel_config,
            Self::Analyser(analyser) => analyser.channel_config,
            Self::DynamicsCompressor(compressor) => compressor.channel_config,
            Self::Worklet(worklet) => worklet.channel_config,
        }
    }

    pub(crate) fn input_count(&self) -> usize {
        match self {
            Self::ConstantSource(_) | Self::Oscillator(_) => 0,
            Self::Worklet(worklet) => worklet.input_count,
            _ => 1,
        }
    }

    pub(crate) fn output_count(&self) -> usize {
        match self {
            Self::Worklet(worklet) => worklet.output_count,
            _ => 1,
        }
    }

    pub(crate) fn param_count(&self) -> usize {
        match self {
            Self::Destination(_) | Self::Analyser(_) => 0,
            Self::ConstantSource(_) => 1,
            Self::Oscillator(_) => 2,
            Self::Gain(_) => 1,
            Self::Delay(_) => 1,
            Self::DynamicsCompressor(_) => 5,
            Self::Worklet(worklet) => worklet.parameter_names.len(),
        }
    }

    pub(crate) fn param_spec(&self, param_index: usize, sample_rate: usize) -> Option<ParamSpec> {
        let nyquist = sample_rate as f32 / 2.0;

        match self {
            Self::Destination(_) | Self::Analyser(_) => None,
            Self::ConstantSource(source) => match param_index {
                ConstantSourceDescription::OFFSET => Some(ParamSpec::unbounded(source.offset, 1.0)),
                _ => None,
            },
            Self::Oscillator(oscillator) => match param_index {
                OscillatorDescription::FREQUENCY => Some(ParamSpec::bounded(
                    oscillator.frequency,
                    440.0,
                    -nyquist,
                    nyquist,
                )),
                OscillatorDescription::DETUNE => Some(ParamSpec::bounded(
                    oscillator.detune,
                    0.0,
                    -153_600.0,
                    153_600.0,
                )),
                _ => None,
            },
            Self::Gain(gain) => match param_index {
                GainDescription::GAIN => Some(ParamSpec::unbounded(gain.gain, 1.0)),
                _ => None,
            },
            Self::Delay(delay) => match param_index {
                DelayDescription::DELAY_TIME => Some(ParamSpec::bounded(
                    delay.delay_time as f32,
                    0.0,
                    0.0,
                    delay.maximum_delay_time as f32,
                )),
                _ => None,
            },
            Self::DynamicsCompressor(compressor) => match param_index {
                DynamicsCompressorDescription::THRESHOLD => {
                    Some(ParamSpec::bounded(compressor.threshold, -24.0, -100.0, 0.0))
                }
                DynamicsCompressorDescription::KNEE => {
                    Some(ParamSpec::bounded(compressor.knee, 30.0, 0.0, 40.0))
                }
                DynamicsCompressorDescription::RATIO => {
                    Some(ParamSpec::bounded(compressor.ratio, 12.0, 1.0, 20.0))
                }
                DynamicsCompressorDescription::ATTACK => {
                    Some(ParamSpec::bounded(compressor.attack, 0.003, 0.0, 1.0))
                }
                DynamicsCompressorDescription::RELEASE => {
                    Some(ParamSpec::bounded(compressor.release, 0.25, 0.0, 1.0))
                }
                _ => None,
            },
            Self::Worklet(worklet) => {
                if param_index < worklet.parameter_names.len() {
                    Some(ParamSpec::unbounded(0.0, 0.0))
                } else {
                    None
                }
            }
        }
    }
}

/// An audio connection from a node's output to another node's input
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphConnection {
    /// The node the audio comes from
    pub source: NodeId,

    /// The output index on the source node
    pub source_output_index: usize,

    /// The node the audio goes to
    pub destination: NodeId,

    /// The input index on the destination node
    pub destination_input_index: usize,
}

impl GraphConnection {
    /// Create a connection between an output and an input
    pub fn new(
        source: NodeId,
        source_output_index: usize,
        destination: NodeId,
        destination_input_index: usize,
    ) -> Self {
        Self {
            source,
            source_output_index,
            destination,
            destination_input_index,
        }
    }
}

/// An audio connection from a node's output to another node's parameter
///
/// The source is down-mixed to mono and summed with the parameter's
/// automation timeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GraphParamConnection {
    /// The node the audio comes from
    pub source: NodeId,

    /// The output index on the source node
    pub source_output_index: usize,

    /// The node whose parameter is modulated
    pub destination: NodeId,

    /// The parameter index on the destination node
    pub destination_param_index: usize,
}

impl GraphParamConnection {
    /// Create a connection between an output and a parameter
    pub fn new(
        source: NodeId,
        source_output_index: usize,
        destination: NodeId,
        destination_param_index: usize,
    ) -> Self {
        Self {
            source,
            source_output_index,
            destination,
            destination_param_index,
        }
    }
}

/// A complete, declarative description of a render graph
///
/// Descriptions are plain data. They are compiled into an immutable topology
/// snapshot before any audio is rendered.
#[derive(Clone, Debug, PartialEq)]
pub struct GraphDescription {
    /// Every node in the graph, keyed by id
    pub nodes: HashMap<NodeId, NodeDescription>,

    /// Audio connections between nodes
    pub connections: Vec<GraphConnection>,

    /// Audio connections into parameters
    pub param_connections: Vec<GraphParamConnection>,

    /// Automation timelines for parameters
    pub param_automations: Vec<ParamAutomation>,

    /// The node whose output is the graph's output
    pub destination_node_id: NodeId,
}

impl GraphDescription {
    /// Create a description containing only a destination node
    pub fn with_destination(destination_node_id: NodeId, channel_count: usize) -> Self {
        let mut nodes = HashMap::new();

        nodes.insert(
            destination_node_id,
            NodeDescription::Destination(DestinationDescription { channel_count }),
        );

        Self {
            nodes,
            connections: Vec::new(),
            param_connections: Vec::new(),
            param_automations: Vec::new(),
            destination_node_id,
        }
    }

    /// Add a node to the description
    pub fn add_node(&mut self, id: NodeId, description: NodeDescription) {
        self.nodes.insert(id, description);
    }

    /// Add an audio connection to the description
    pub fn connect(&mut self, connection: GraphConnection) {
        self.connections.push(connection);
    }

    /// Add a parameter connection to the description
    pub fn connect_param(&mut self, connection: GraphParamConnection) {
        self.param_connections.push(connection);
    }

    /// Add an automation timeline to the description
    ///
    /// Replaces any existing timeline for the same parameter.
    pub fn automate(&mut self, automation: ParamAutomation) {
        self.param_automations.retain(|existing| {
            existing.destination != automation.destination
                || existing.destination_param_index != automation.destination_param_index
        });

        self.param_automations.push(automation);
    }
}
