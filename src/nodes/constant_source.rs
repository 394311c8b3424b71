use crate::buffer::AudioBus;
use crate::executor::RenderContext;
use crate::graph::ConstantSourceDescription;

pub struct ConstantSourceRenderNode {
    start_frame: Option<u64>,
    stop_frame: Option<u64>,
}

impl ConstantSourceRenderNode {
    pub fn new() -> Self {
        Self {
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

        let offset = &params[ConstantSourceDescription::OFFSET];

        output.set_channel_count(1);
        output.set_frame_count(context.quantum_size);

        for frame_offset in 0..context.quantum_size {
            let frame = first_frame + frame_offset as u64;

            let value = if self.is_active_at(frame) {
                offset.value_at(0, frame_offset)
            } else {
                0.0
            };

            output.channel_mut(0)[frame_offset] = value;
        }
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        self.start_frame = other.start_frame;
        self.stop_frame = other.stop_frame;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn render(node: &mut ConstantSourceRenderNode, first_frame: u64) -> AudioBus {
        let context = RenderContext {
            sample_rate: 48_000,
            quantum_size: 128,
            current_frame: first_frame,
        };

        let mut offset = AudioBus::with_capacity(1, 1, 1, 128);
        offset.fill_channel(0, 1.0);

        let mut outputs = vec![AudioBus::new(1, 128)];
        node.process(&context, &[offset], &mut outputs);
        outputs.remove(0)
    }

    #[test]
    fn unscheduled_source_is_a_silence_marker() {
        let mut node = ConstantSourceRenderNode::new();
        let output = render(&mut node, 0);
        assert!(output.is_silent_marker());
    }

    #[test]
    fn starts_mid_quantum_with_sample_accuracy() {
        let mut node = ConstantSourceRenderNode::new();
        node.schedule_start(Some(10));

        let output = render(&mut node, 0);

        assert_relative_eq!(output.value_at(0, 9), 0.0);
        assert_relative_eq!(output.value_at(0, 10), 1.0);
        assert_relative_eq!(output.value_at(0, 127), 1.0);
    }

    #[test]
    fn a_stop_at_the_start_frame_yields_silence() {
        let mut node = ConstantSourceRenderNode::new();
        node.schedule_start(Some(10));
        node.schedule_stop(Some(10));

        let output = render(&mut node, 0);
        assert!(output.is_silent_marker());
    }

    #[test]
    fn a_start_in_a_later_quantum_keeps_this_one_silent() {
        let mut node = ConstantSourceRenderNode::new();
        node.schedule_start(Some(128 + 10));

        let output = render(&mut node, 0);
        assert!(output.is_silent_marker());

        let output = render(&mut node, 128);
        assert_relative_eq!(output.value_at(0, 9), 0.0);
        assert_relative_eq!(output.value_at(0, 10), 1.0);
    }
}
