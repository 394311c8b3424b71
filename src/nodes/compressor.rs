use std::sync::atomic::Ordering;
use std::sync::Arc;

use atomic_float::AtomicF32;

use crate::buffer::AudioBus;
use crate::executor::RenderContext;
use crate::graph::DynamicsCompressorDescription;

pub struct CompressorRenderNode {
    envelope_db: f32,
    reduction_db: Arc<AtomicF32>,
}

impl CompressorRenderNode {
    pub fn new() -> Self {
        Self {
            envelope_db: 0.0,
            reduction_db: Arc::new(AtomicF32::new(0.0)),
        }
    }

    pub fn reduction_db(&self) -> Arc<AtomicF32> {
        self.reduction_db.clone()
    }

    pub fn process(
        &mut self,
        context: &RenderContext,
        inputs: &[AudioBus],
        params: &[AudioBus],
        outputs: &mut [AudioBus],
    ) {
        let output = &mut outputs[0];

        let Some(input) = inputs.first() else {
            output.set_channel_count(0);
            self.reduction_db.store(0.0, Ordering::Relaxed);
            return;
        };

        if input.is_silent_marker() {
            output.set_channel_count(0);
            self.reduction_db.store(0.0, Ordering::Relaxed);
            return;
        }

        let threshold = params[DynamicsCompressorDescription::THRESHOLD].value_at(0, 0);
        let knee = params[DynamicsCompressorDescription::KNEE].value_at(0, 0);
        let ratio = params[DynamicsCompressorDescription::RATIO].value_at(0, 0).max(1.0);
        let attack = params[DynamicsCompressorDescription::ATTACK].value_at(0, 0);
        let release = params[DynamicsCompressorDescription::RELEASE].value_at(0, 0);

        let mut peak = 0.0_f32;
        for channel in 0..input.channel_count() {
            for sample in input.channel(channel) {
                peak = peak.max(sample.abs());
            }
        }

        let input_db = if peak > 0.0 {
            20.0 * peak.log10()
        } else {
            -120.0
        };

        let desired_reduction = reduction_for_level(input_db, threshold, knee, ratio);

        let quantum_seconds = context.quantum_size as f32 / context.sample_rate as f32;
        let time = if desired_reduction < self.envelope_db {
            attack
        } else {
            release
        };

        let coefficient = if time > 0.0 {
            (-quantum_seconds / time).exp()
        } else {
            0.0
        };

        self.envelope_db = desired_reduction + (self.envelope_db - desired_reduction) * coefficient;
        self.reduction_db.store(self.envelope_db, Ordering::Relaxed);

        let gain = 10.0_f32.powf(self.envelope_db / 20.0);

        output.set_channel_count(input.channel_count());
        output.set_frame_count(input.frame_count());

        for channel in 0..output.channel_count() {
            let frame_count = output.frame_count();
            for frame in 0..frame_count {
                output.channel_mut(channel)[frame] = input.value_at(channel, frame) * gain;
            }
        }
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        self.envelope_db = other.envelope_db;
        self.reduction_db
            .store(other.reduction_db.load(Ordering::Relaxed), Ordering::Relaxed);
    }
}

/// The gain change in dB for an input level, negative when compressing
fn reduction_for_level(input_db: f32, threshold: f32, knee: f32, ratio: f32) -> f32 {
    let slope = 1.0 - 1.0 / ratio;

    let knee_start = threshold - knee / 2.0;
    let knee_end = threshold + knee / 2.0;

    if input_db <= knee_start {
        0.0
    } else if input_db >= knee_end || knee <= 0.0 {
        -slope * (input_db - threshold)
    } else {
        let overshoot = input_db - knee_start;
        -slope * overshoot * overshoot / (2.0 * knee)
    }
}
