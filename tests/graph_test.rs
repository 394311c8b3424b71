use approx::assert_relative_eq;
use wavegraph::{
    create_graph_engine, ChannelConfig, CompileError, ConstantSourceDescription, DelayDescription,
    DynamicsCompressorDescription, GainDescription, GraphConnection, GraphController,
    GraphDescription, GraphExecutor, GraphParamConnection, NodeDescription, NodeId,
};

const QUANTUM_SIZE: usize = 128;
const SAMPLE_RATE: usize = 48_000;

struct Fixture {
    controller: GraphController,
    executor: GraphExecutor,
}

impl Fixture {
    fn new(description: &GraphDescription) -> Self {
        let (controller, executor) =
            create_graph_engine(description, SAMPLE_RATE, QUANTUM_SIZE, None)
                .expect("the graph should compile");

        Self {
            controller,
            executor,
        }
    }

    fn render_quantum(&mut self, quantum_index: u64) -> Vec<Vec<f32>> {
        self.executor
            .begin_new_quantum(quantum_index * QUANTUM_SIZE as u64);

        let output = self.executor.render_destination_for_current_quantum();

        (0..output.channel_count())
            .map(|channel| output.channel(channel).to_vec())
            .collect()
    }
}

fn constant_source(offset: f32) -> NodeDescription {
    NodeDescription::ConstantSource(ConstantSourceDescription { offset })
}

fn gain(value: f32) -> NodeDescription {
    NodeDescription::Gain(GainDescription {
        gain: value,
        channel_config: ChannelConfig::default(),
    })
}

#[test]
fn an_empty_graph_renders_silence_with_the_configured_channels() {
    let destination_id = NodeId::generate();
    let description = GraphDescription::with_destination(destination_id, 2);

    let mut fixture = Fixture::new(&description);
    let output = fixture.render_quantum(0);

    assert_eq!(output.len(), 2);

    for channel in &output {
        assert_eq!(channel.len(), QUANTUM_SIZE);
        assert!(channel.iter().all(|sample| *sample == 0.0));
    }
}

#[test]
fn a_source_feeds_the_destination_through_a_gain() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 2);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(0.5));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(source_id, Some(0));

    let output = fixture.render_quantum(0);

    // A mono source up-mixes to both destination channels
    assert_relative_eq!(output[0][64], 0.5);
    assert_relative_eq!(output[1][64], 0.5);
}

#[test]
fn fan_in_sums_at_the_destination() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let first_gain = NodeId::generate();
    let second_gain = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(first_gain, gain(0.25));
    description.add_node(second_gain, gain(0.5));

    description.connect(GraphConnection::new(source_id, 0, first_gain, 0));
    description.connect(GraphConnection::new(source_id, 0, second_gain, 0));
    description.connect(GraphConnection::new(first_gain, 0, destination_id, 0));
    description.connect(GraphConnection::new(second_gain, 0, destination_id, 0));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(source_id, Some(0));

    let output = fixture.render_quantum(0);
    assert_relative_eq!(output[0][0], 0.75);
}

#[test]
fn a_source_into_a_gain_parameter_modulates_it() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let modulator_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(modulator_id, constant_source(0.25));

    // The gain's own value is zero; all gain comes from the modulator
    description.add_node(gain_id, gain(0.0));

    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));
    description.connect_param(GraphParamConnection::new(
        modulator_id,
        0,
        gain_id,
        GainDescription::GAIN,
    ));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(source_id, Some(0));
    fixture.executor.schedule_source_start(modulator_id, Some(0));

    let output = fixture.render_quantum(0);
    assert_relative_eq!(output[0][64], 0.25);
}

#[test]
fn an_unconnected_source_leaves_the_destination_untouched() {
    let destination_id = NodeId::generate();
    let connected_id = NodeId::generate();
    let unconnected_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(connected_id, constant_source(0.25));
    description.connect(GraphConnection::new(connected_id, 0, destination_id, 0));

    // Compiled and playing, but with no path to the destination
    description.add_node(unconnected_id, constant_source(1.0));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(connected_id, Some(0));
    fixture.executor.schedule_source_start(unconnected_id, Some(0));

    for quantum_index in 0..2 {
        let output = fixture.render_quantum(quantum_index);

        assert!(output[0].iter().all(|sample| *sample == 0.25));
    }
}

#[test]
fn a_cycle_without_a_delay_is_rejected() {
    let destination_id = NodeId::generate();
    let first = NodeId::generate();
    let second = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(first, gain(1.0));
    description.add_node(second, gain(1.0));

    description.connect(GraphConnection::new(first, 0, second, 0));
    description.connect(GraphConnection::new(second, 0, first, 0));
    description.connect(GraphConnection::new(first, 0, destination_id, 0));

    let result = create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None);

    assert!(matches!(result.err(), Some(CompileError::CyclicGraph)));
}

#[test]
fn a_delay_breaks_a_feedback_loop_and_echoes() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let delay_id = NodeId::generate();
    let feedback_gain = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(feedback_gain, gain(0.5));

    description.add_node(
        delay_id,
        NodeDescription::Delay(DelayDescription {
            delay_time: QUANTUM_SIZE as f64 / SAMPLE_RATE as f64,
            maximum_delay_time: 0.1,
            channel_config: ChannelConfig::default(),
        }),
    );

    description.connect(GraphConnection::new(source_id, 0, delay_id, 0));
    description.connect(GraphConnection::new(delay_id, 0, feedback_gain, 0));
    description.connect(GraphConnection::new(feedback_gain, 0, delay_id, 0));
    description.connect(GraphConnection::new(delay_id, 0, destination_id, 0));

    let mut fixture = Fixture::new(&description);

    // One quantum of input, then silence
    fixture.executor.schedule_source_start(source_id, Some(0));
    fixture
        .executor
        .schedule_source_stop(source_id, Some(QUANTUM_SIZE as u64));

    let output = fixture.render_quantum(0);
    assert_relative_eq!(output[0][0], 0.0);

    let output = fixture.render_quantum(1);
    assert_relative_eq!(output[0][0], 1.0);

    let output = fixture.render_quantum(2);
    assert_relative_eq!(output[0][0], 0.5);

    let output = fixture.render_quantum(3);
    assert_relative_eq!(output[0][0], 0.25);
}

#[test]
fn an_analyser_passes_audio_through_and_exposes_it() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let analyser_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(0.5));
    description.add_node(
        analyser_id,
        NodeDescription::Analyser(wavegraph::AnalyserDescription {
            fft_size: 256,
            channel_config: ChannelConfig::default(),
        }),
    );

    description.connect(GraphConnection::new(source_id, 0, analyser_id, 0));
    description.connect(GraphConnection::new(analyser_id, 0, destination_id, 0));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(source_id, Some(0));

    let output = fixture.render_quantum(0);
    assert_relative_eq!(output[0][64], 0.5);

    assert_eq!(fixture.controller.analyser_count(), 1);
    assert_eq!(fixture.controller.analyser_node_id(0), Some(analyser_id));

    let handle = fixture
        .controller
        .analyser_handle(0)
        .expect("the analyser should have a handle");

    let mut recent = vec![0.0; QUANTUM_SIZE];
    assert!(handle.time_domain_data(&mut recent));
    assert_relative_eq!(recent[QUANTUM_SIZE - 1], 0.5);
}

#[test]
fn a_compressor_reports_its_gain_reduction() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let compressor_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(
        compressor_id,
        NodeDescription::DynamicsCompressor(DynamicsCompressorDescription {
            threshold: -24.0,
            knee: 0.0,
            ratio: 12.0,
            attack: 0.0,
            release: 0.25,
            channel_config: ChannelConfig::default(),
        }),
    );

    description.connect(GraphConnection::new(source_id, 0, compressor_id, 0));
    description.connect(GraphConnection::new(compressor_id, 0, destination_id, 0));

    let mut fixture = Fixture::new(&description);
    fixture.executor.schedule_source_start(source_id, Some(0));

    let output = fixture.render_quantum(0);
    assert!(output[0][64] < 1.0);

    let reduction = fixture
        .controller
        .compressor_reduction_db(compressor_id)
        .expect("the compressor should report its reduction");

    assert!(reduction < -20.0);
}

#[test]
fn an_unknown_destination_in_a_connection_is_rejected() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let missing = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, missing, 0));

    let result = create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None);

    assert!(matches!(
        result.err(),
        Some(CompileError::UnknownNode(id)) if id == missing
    ));
}
