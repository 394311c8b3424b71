use crate::buffer::AudioBus;
use crate::graph::GainDescription;

pub struct GainRenderNode {}

impl GainRenderNode {
    pub fn new() -> Self {
        Self {}
    }

    pub fn process(&mut self, inputs: &[AudioBus], params: &[AudioBus], outputs: &mut [AudioBus]) {
        let output = &mut outputs[0];

        let Some(input) = inputs.first() else {
            output.set_channel_count(0);
            return;
        };

        if input.is_silent_marker() {
            output.set_channel_count(0);
            return;
        }

        let gain = &params[GainDescription::GAIN];

        output.set_channel_count(input.channel_count());
        output.set_frame_count(input.frame_count());

        for channel in 0..output.channel_count() {
            for frame in 0..output.frame_count() {
                let sample = input.value_at(channel, frame) * gain.value_at(0, frame);
                output.channel_mut(channel)[frame] = sample;
            }
        }
    }
}
