use crate::buffer::AudioBus;
use crate::executor::RenderContext;
use crate::graph::DelayDescription;

pub struct DelayRenderNode {
    rings: Vec<Vec<f32>>,
    ring_length: usize,

    /// Non-zero when this delay breaks a feedback cycle, in which case reads
    /// must stay at least one quantum behind writes
    minimum_delay_frames: usize,
}

impl DelayRenderNode {
    pub fn new(
        channel_count: usize,
        maximum_delay_time: f64,
        sample_rate: usize,
        quantum_size: usize,
    ) -> Self {
        let maximum_delay_frames = (maximum_delay_time * sample_rate as f64).ceil() as usize;
        let ring_length = (maximum_delay_frames + quantum_size).max(2 * quantum_size);

        Self {
            rings: vec![vec![0.0; ring_length]; channel_count.max(1)],
            ring_length,
            minimum_delay_frames: 0,
        }
    }

    pub fn set_breaks_cycle(&mut self, quantum_size: usize) {
        self.minimum_delay_frames = quantum_size;
    }

    /// Write a quantum of input into the delay line
    ///
    /// A silent input still writes zeros so the line keeps moving.
    pub fn write_quantum(&mut self, context: &RenderContext, input: &AudioBus) {
        let first_frame = context.current_frame;

        for (channel, ring) in self.rings.iter_mut().enumerate() {
            let has_channel = !input.is_silent_marker() && channel < input.channel_count();

            for frame_offset in 0..context.quantum_size {
                let value = if has_channel {
                    input.value_at(channel, frame_offset)
                } else {
                    0.0
                };

                let index = ((first_frame + frame_offset as u64) % self.ring_length as u64) as usize;
                ring[index] = value;
            }
        }
    }

    /// Read a quantum of delayed audio out of the delay line
    pub fn read_quantum(
        &mut self,
        context: &RenderContext,
        params: &[AudioBus],
        outputs: &mut [AudioBus],
    ) {
        let delay_time = &params[DelayDescription::DELAY_TIME];
        let first_frame = context.current_frame;

        let maximum_delay_frames = self.ring_length - context.quantum_size;

        let output = &mut outputs[0];
        output.set_channel_count(self.rings.len());
        output.set_frame_count(context.quantum_size);

        for (channel, ring) in self.rings.iter().enumerate() {
            for frame_offset in 0..context.quantum_size {
                let delay_seconds = delay_time.value_at(0, frame_offset) as f64;
                let delay_frames = (delay_seconds / context.frame_duration()).round() as usize;
                let delay_frames =
                    delay_frames.clamp(self.minimum_delay_frames, maximum_delay_frames);

                let frame = first_frame + frame_offset as u64;

                let value = if frame < delay_frames as u64 {
                    0.0
                } else {
                    let index = ((frame - delay_frames as u64) % self.ring_length as u64) as usize;
                    ring[index]
                };

                output.channel_mut(channel)[frame_offset] = value;
            }
        }
    }

    /// Write then read in one step, for delays that are not part of a cycle
    pub fn process(
        &mut self,
        context: &RenderContext,
        inputs: &[AudioBus],
        params: &[AudioBus],
        outputs: &mut [AudioBus],
    ) {
        if let Some(input) = inputs.first() {
            self.write_quantum(context, input);
        }

        self.read_quantum(context, params, outputs);
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        if self.ring_length == other.ring_length && self.rings.len() == other.rings.len() {
            std::mem::swap(&mut self.rings, &mut other.rings);
        }
    }
}
