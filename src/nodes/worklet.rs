use crate::buffer::AudioBus;
use crate::executor::{RenderContext, WorkletProcessorHost};
use crate::graph::NodeId;

pub struct WorkletRenderNode {
    node_id: NodeId,
    processor_name: String,
    failed: bool,
    finished: bool,
}

impl WorkletRenderNode {
    pub fn new(node_id: NodeId, processor_name: String) -> Self {
        Self {
            node_id,
            processor_name,
            failed: false,
            finished: false,
        }
    }

    pub fn process(
        &mut self,
        context: &RenderContext,
        inputs: &[AudioBus],
        params: &[AudioBus],
        outputs: &mut [AudioBus],
        host: Option<&mut (dyn WorkletProcessorHost + '_)>,
    ) {
        if self.failed || self.finished {
            silence_outputs(outputs);
            return;
        }

        let Some(host) = host else {
            silence_outputs(outputs);
            return;
        };

        match host.process(
            self.node_id,
            &self.processor_name,
            context,
            inputs,
            params,
            outputs,
        ) {
            Ok(true) => {}
            Ok(false) => {
                self.finished = true;
            }
            Err(error) => {
                self.failed = true;
                silence_outputs(outputs);
                tracing::warn!(node_id = self.node_id.value(), %error, "worklet degraded to silence");
            }
        }
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        self.failed = other.failed;
        self.finished = other.finished;
    }
}

fn silence_outputs(outputs: &mut [AudioBus]) {
    for output in outputs {
        output.set_channel_count(0);
    }
}
