use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_relative_eq;
use wavegraph::{
    create_graph_engine, AudioBus, AutomationSegment, ChannelConfig, CompileError,
    ConstantSourceDescription, GainDescription, GraphConnection, GraphDescription, NodeDescription,
    NodeId, ParamAutomation, ParameterUpdateError, RenderContext, WorkletDescription,
    WorkletProcessError, WorkletProcessorHost,
};

const QUANTUM_SIZE: usize = 128;
const SAMPLE_RATE: usize = 48_000;

fn constant_source(offset: f32) -> NodeDescription {
    NodeDescription::ConstantSource(ConstantSourceDescription { offset })
}

fn gain(value: f32) -> NodeDescription {
    NodeDescription::Gain(GainDescription {
        gain: value,
        channel_config: ChannelConfig::default(),
    })
}

struct CountingHost {
    calls: Arc<AtomicUsize>,
}

impl WorkletProcessorHost for CountingHost {
    fn process(
        &mut self,
        _node_id: NodeId,
        _processor_name: &str,
        context: &RenderContext,
        _inputs: &[AudioBus],
        _params: &[AudioBus],
        outputs: &mut [AudioBus],
    ) -> Result<bool, WorkletProcessError> {
        self.calls.fetch_add(1, Ordering::Relaxed);

        outputs[0].set_channel_count(1);
        outputs[0].set_frame_count(context.quantum_size);
        outputs[0].fill_channel(0, 1.0);

        Ok(true)
    }
}

#[test]
fn a_worklet_feeding_two_consumers_runs_once_per_quantum() {
    let destination_id = NodeId::generate();
    let worklet_id = NodeId::generate();
    let first_gain = NodeId::generate();
    let second_gain = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);

    description.add_node(
        worklet_id,
        NodeDescription::Worklet(WorkletDescription {
            processor_name: "unit-source".to_string(),
            input_count: 0,
            output_count: 1,
            output_channel_count: 1,
            parameter_names: Vec::new(),
            channel_config: ChannelConfig::default(),
        }),
    );

    description.add_node(first_gain, gain(0.5));
    description.add_node(second_gain, gain(0.25));

    description.connect(GraphConnection::new(worklet_id, 0, first_gain, 0));
    description.connect(GraphConnection::new(worklet_id, 0, second_gain, 0));
    description.connect(GraphConnection::new(first_gain, 0, destination_id, 0));
    description.connect(GraphConnection::new(second_gain, 0, destination_id, 0));

    let calls = Arc::new(AtomicUsize::new(0));
    let host = CountingHost {
        calls: calls.clone(),
    };

    let (_controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, Some(Box::new(host)))
            .expect("the graph should compile");

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.75);

    // A second render of the same quantum reuses the memoized output
    executor.render_destination_for_current_quantum();
    assert_eq!(calls.load(Ordering::Relaxed), 1);

    executor.begin_new_quantum(QUANTUM_SIZE as u64);
    executor.render_destination_for_current_quantum();
    assert_eq!(calls.load(Ordering::Relaxed), 2);
}

#[test]
fn a_parameter_update_takes_effect_at_the_next_quantum() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(0.5));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    let (mut controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.5);

    let mut updated = description.clone();
    updated.add_node(gain_id, gain(0.25));
    controller
        .enqueue_parameter_update(&updated)
        .expect("a gain value change is parameter-grade");

    // Still the old value until the next quantum begins
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.5);

    executor.begin_new_quantum(QUANTUM_SIZE as u64);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.25);
}

#[test]
fn committing_with_nothing_pending_does_not_change_the_output() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(0.5));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    let (_controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let before = executor.render_destination_for_current_quantum().channel(0).to_vec();
    assert_relative_eq!(before[0], 0.5);

    executor.commit_pending_updates();

    let after = executor.render_destination_for_current_quantum().channel(0).to_vec();
    assert_eq!(executor.current_frame(), 0);
    assert_eq!(before, after);
}

#[test]
fn committing_between_renders_applies_a_pending_parameter_update() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(0.5));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    let (mut controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.5);

    let mut updated = description.clone();
    updated.add_node(gain_id, gain(0.25));
    controller
        .enqueue_parameter_update(&updated)
        .expect("a gain value change is parameter-grade");

    // An explicit commit makes the change visible without a new quantum
    executor.commit_pending_updates();

    let output = executor.render_destination_for_current_quantum();
    let value = output.value_at(0, 0);
    assert_eq!(executor.current_frame(), 0);
    assert_relative_eq!(value, 0.25);
}

#[test]
fn an_identical_description_is_a_parameter_no_op() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

    let (mut controller, _executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    assert_eq!(controller.enqueue_parameter_update(&description), Ok(()));
}

#[test]
fn a_structural_change_is_not_parameter_grade() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

    let (mut controller, _executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    let mut updated = description.clone();
    updated.add_node(NodeId::generate(), gain(1.0));

    assert_eq!(
        controller.enqueue_parameter_update(&updated),
        Err(ParameterUpdateError::NotParameterOnly)
    );
}

#[test]
fn a_topology_update_preserves_scheduled_sources() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

    let (mut controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 1.0);

    // Route the source through a new gain node
    let mut updated = GraphDescription::with_destination(destination_id, 1);
    updated.add_node(source_id, constant_source(1.0));
    updated.add_node(gain_id, gain(0.5));
    updated.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    updated.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    controller
        .enqueue_topology_update(&updated)
        .expect("the updated graph should compile");

    executor.begin_new_quantum(QUANTUM_SIZE as u64);
    let output = executor.render_destination_for_current_quantum();

    // The source is still playing; only the new routing changed the level
    assert_relative_eq!(output.value_at(0, 0), 0.5);
}

#[test]
fn rewriting_played_automation_is_rejected() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(1.0));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    description.automate(
        ParamAutomation::new(gain_id, GainDescription::GAIN)
            .with_segment(AutomationSegment::set_value(0.5, 100)),
    );

    let (mut controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.begin_new_quantum(0);
    executor.render_destination_for_current_quantum();
    executor.begin_new_quantum(2 * QUANTUM_SIZE as u64);
    executor.render_destination_for_current_quantum();

    // Frame 100 has already been rendered
    let mut rewritten = description.clone();
    rewritten.automate(
        ParamAutomation::new(gain_id, GainDescription::GAIN)
            .with_segment(AutomationSegment::set_value(0.75, 100)),
    );

    assert_eq!(
        controller.enqueue_parameter_update(&rewritten),
        Err(ParameterUpdateError::RewritesPast {
            last_rendered_frame: 2 * QUANTUM_SIZE as u64
        })
    );

    // Extending the timeline in the future is fine
    let mut extended = description.clone();
    extended.automate(
        ParamAutomation::new(gain_id, GainDescription::GAIN)
            .with_segment(AutomationSegment::set_value(0.5, 100))
            .with_segment(AutomationSegment::set_value(0.25, 1000)),
    );

    assert_eq!(controller.enqueue_parameter_update(&extended), Ok(()));
}

#[test]
fn an_automation_ramp_drives_a_gain() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.add_node(gain_id, gain(1.0));
    description.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    description.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    description.automate(
        ParamAutomation::new(gain_id, GainDescription::GAIN).with_segment(
            AutomationSegment::linear_ramp(0.0, 0, 1.0, QUANTUM_SIZE as u64),
        ),
    );

    let (_controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();

    assert_relative_eq!(output.value_at(0, 0), 0.0);
    assert_relative_eq!(output.value_at(0, 64), 0.5, epsilon = 1e-6);

    // Past the ramp's end the value holds
    executor.begin_new_quantum(QUANTUM_SIZE as u64);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 1.0);
}

#[test]
fn a_bad_topology_update_reports_the_compile_error() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

    let (mut controller, _executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    let first = NodeId::generate();
    let second = NodeId::generate();

    let mut cyclic = description.clone();
    cyclic.add_node(first, gain(1.0));
    cyclic.add_node(second, gain(1.0));
    cyclic.connect(GraphConnection::new(first, 0, second, 0));
    cyclic.connect(GraphConnection::new(second, 0, first, 0));
    cyclic.connect(GraphConnection::new(first, 0, destination_id, 0));

    assert_eq!(
        controller.enqueue_topology_update(&cyclic),
        Err(CompileError::CyclicGraph)
    );

    // The rejected description was not adopted
    assert_eq!(controller.description().nodes.len(), 2);
}

#[test]
fn an_offline_update_applies_immediately() {
    let destination_id = NodeId::generate();
    let source_id = NodeId::generate();
    let gain_id = NodeId::generate();

    let mut description = GraphDescription::with_destination(destination_id, 1);
    description.add_node(source_id, constant_source(1.0));
    description.connect(GraphConnection::new(source_id, 0, destination_id, 0));

    let (_controller, mut executor) =
        create_graph_engine(&description, SAMPLE_RATE, QUANTUM_SIZE, None)
            .expect("the graph should compile");

    executor.schedule_source_start(source_id, Some(0));

    executor.begin_new_quantum(0);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 1.0);

    let mut updated = GraphDescription::with_destination(destination_id, 1);
    updated.add_node(source_id, constant_source(1.0));
    updated.add_node(gain_id, gain(0.5));
    updated.connect(GraphConnection::new(source_id, 0, gain_id, 0));
    updated.connect(GraphConnection::new(gain_id, 0, destination_id, 0));

    executor
        .apply_update_offline(&updated)
        .expect("the updated graph should compile");

    executor.begin_new_quantum(QUANTUM_SIZE as u64);
    let output = executor.render_destination_for_current_quantum();
    assert_relative_eq!(output.value_at(0, 0), 0.5);
}
