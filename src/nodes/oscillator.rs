use crate::buffer::AudioBus;
use crate::executor::RenderContext;
use crate::graph::OscillatorDescription;

pub struct OscillatorRenderNode {
    phase: f64,
    start_frame: Option<u64>,
    stop_frame: Option<u64>,
}

impl OscillatorRenderNode {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            start_frame: None,
            stop_frame: None,
        }
    }

    pub fn schedule_start(&mut self, frame: Option<u64>) {
        self.start_frame = frame;
    }

    pub fn schedule_stop(&mut self, frame: Option<u64>) {
        self.stop_frame = frame;
    }

    fn is_active_at(&self, frame: u64) -> bool {
        let started = self.start_frame.is_some_and(|start| frame >= start);
        let stopped = self.stop_frame.is_some_and(|stop| frame >= stop);
        started && !stopped
    }

    pub fn process(&mut self, context: &RenderContext, params: &[AudioBus], outputs: &mut [AudioBus]) {
        let first_frame = context.current_frame;
        let last_frame = first_frame + context.quantum_size as u64 - 1;

        let active_somewhere = self.start_frame.is_some_and(|start| start <= last_frame)
            && !self.stop_frame.is_some_and(|stop| stop <= first_frame);

        let output = &mut outputs[0];

        if !active_somewhere {
            output.set_channel_count(0);
            return;
        }

        let frequency = &params[OscillatorDescription::FREQUENCY];
        let detune = &params[OscillatorDescription::DETUNE];

        output.set_channel_count(1);
        output.set_frame_count(context.quantum_size);

        for frame_offset in 0..context.quantum_size {
            let frame = first_frame + frame_offset as u64;

            let sample = if self.is_active_at(frame) {
                let detune_ratio = (detune.value_at(0, frame_offset) as f64 / 1200.0).exp2();
                let frequency = frequency.value_at(0, frame_offset) as f64 * detune_ratio;

                let sample = (std::f64::consts::TAU * self.phase).sin() as f32;

                self.phase += frequency / context.sample_rate as f64;
                self.phase -= self.phase.floor();

                sample
            } else {
                0.0
            };

            output.channel_mut(0)[frame_offset] = sample;
        }
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        self.phase = other.phase;
        self.start_frame = other.start_frame;
        self.stop_frame = other.stop_frame;
    }
}
