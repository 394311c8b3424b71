use crate::buffer::{mix_into, AudioBus};
use crate::graph::ChannelInterpretation;

pub struct DestinationRenderNode {
    channel_count: usize,
}

impl DestinationRenderNode {
    pub fn new(channel_count: usize) -> Self {
        Self { channel_count }
    }

    pub fn process(&mut self, quantum_size: usize, inputs: &[AudioBus], outputs: &mut [AudioBus]) {
        let output = &mut outputs[0];

        output.set_channel_count(self.channel_count);
        output.set_frame_count(quantum_size);
        output.clear();

        if let Some(input) = inputs.first() {
            mix_into(output, input, ChannelInterpretation::Speakers);
        }
    }
}
