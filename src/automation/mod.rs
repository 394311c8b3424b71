use crate::buffer::AudioBus;
use crate::graph::{AutomationRate, AutomationSegment, AutomationSegmentKind, ParamSpec};

const KRATE_STEP: f64 = 1e-5;

/// The render-side evaluation state for one parameter's timeline
///
/// The cursor only moves forward. Quanta are rendered in order, so once a
/// segment has been passed it is never revisited, and evaluation is O(1) per
/// frame regardless of timeline length.
pub(crate) struct ParamAutomationState {
    pub intrinsic_value: f32,
    pub default_value: f32,
    pub minimum_value: f32,
    pub maximum_value: f32,
    pub rate: AutomationRate,
    pub segments: Vec<AutomationSegment>,
    cursor: usize,
}

impl ParamAutomationState {
    pub fn new(spec: &ParamSpec) -> Self {
        Self {
            intrinsic_value: spec.initial_value,
            default_value: spec.default_value,
            minimum_value: spec.minimum_value,
            maximum_value: spec.maximum_value,
            rate: AutomationRate::ARate,
            segments: Vec::new(),
            cursor: 0,
        }
    }

    /// Install a timeline at compile time
    pub fn set_timeline(&mut self, rate: AutomationRate, segments: Vec<AutomationSegment>) {
        self.segments = segments;
        self.rate = rate;
        self.cursor = 0;
    }

    /// Replace the timeline, retrieving the old segments for deallocation
    /// elsewhere
    pub fn replace_timeline(
        &mut self,
        rate: AutomationRate,
        segments: &mut Vec<AutomationSegment>,
    ) {
        std::mem::swap(&mut self.segments, segments);
        self.rate = rate;
        self.cursor = 0;
    }

    /// Evaluate the parameter across a quantum, writing into a mono bus
    ///
    /// When `has_inputs` is set the bus already holds the summed parameter
    /// inputs at full length and the timeline is added to it. Otherwise the
    /// bus holds only the timeline, and if the value turns out constant for
    /// the whole quantum it is collapsed to a single representative frame.
    pub fn evaluate_into(
        &mut self,
        bus: &mut AudioBus,
        first_frame: u64,
        quantum_size: usize,
        sample_rate: usize,
        has_inputs: bool,
    ) {
        debug_assert!(bus.channel_count() == 1);
        debug_assert!(bus.frame_count() == quantum_size);

        self.advance_cursor(first_frame);

        if !has_inputs && self.segments.is_empty() {
            let value = self.sanitize(self.intrinsic_value);
            bus.set_frame_count(1);
            bus.channel_mut(0)[0] = value;
            return;
        }

        if self.rate == AutomationRate::KRate {
            let mut value = self.timeline_value(first_frame, sample_rate);

            if has_inputs {
                value += bus.value_at(0, 0);
            }

            let value = round_to_step(self.sanitize(value));
            bus.set_frame_count(1);
            bus.channel_mut(0)[0] = value;
            return;
        }

        for frame_offset in 0..quantum_size {
            let frame = first_frame + frame_offset as u64;
            self.advance_cursor(frame);

            let timeline = self.timeline_value(frame, sample_rate);

            let channel = bus.channel_mut(0);
            let mixed = if has_inputs { channel[frame_offset] } else { 0.0 };
            channel[frame_offset] = timeline + mixed;
        }

        for frame_offset in 0..quantum_size {
            let channel = bus.channel_mut(0);
            channel[frame_offset] = self.sanitize(channel[frame_offset]);
        }

        if !has_inputs {
            let channel = bus.channel(0);
            let first = channel[0];

            if channel.iter().all(|sample| *sample == first) {
                bus.set_frame_count(1);
            }
        }
    }

    fn advance_cursor(&mut self, frame: u64) {
        while self.cursor + 1 < self.segments.len()
            && self.segments[self.cursor + 1].start_frame() <= frame
        {
            self.cursor += 1;
        }
    }

    fn timeline_value(&self, frame: u64, sample_rate: usize) -> f32 {
        let Some(segment) = self.segments.get(self.cursor) else {
            return self.intrinsic_value;
        };

        if frame < segment.start_frame() {
            return self.intrinsic_value;
        }

        segment_value(segment, frame, sample_rate)
    }

    fn sanitize(&self, value: f32) -> f32 {
        let value = if value.is_finite() {
            value
        } else {
            self.default_value
        };

        value.clamp(self.minimum_value, self.maximum_value)
    }
}

fn round_to_step(value: f32) -> f32 {
    ((value as f64 / KRATE_STEP).round() * KRATE_STEP) as f32
}

fn segment_value(segment: &AutomationSegment, frame: u64, sample_rate: usize) -> f32 {
    let progress = |frame: u64| -> f64 {
        if segment.end_frame() <= segment.start_frame() {
            return 1.0;
        }

        let elapsed = (frame - segment.start_frame()) as f64;
        let length = (segment.end_frame() - segment.start_frame()) as f64;
        (elapsed / length).min(1.0)
    };

    match segment.kind {
        AutomationSegmentKind::SetValue => segment.start_value,
        AutomationSegmentKind::LinearRamp => {
            let position = progress(frame);
            (segment.start_value as f64
                + (segment.end_value as f64 - segment.start_value as f64) * position)
                as f32
        }
        AutomationSegmentKind::ExponentialRamp => {
            let start = segment.start_value as f64;
            let end = segment.end_value as f64;

            // An exponential ramp is undefined across or from zero
            if start == 0.0 || start * end <= 0.0 {
                return if frame >= segment.end_frame() {
                    segment.end_value
                } else {
                    segment.start_value
                };
            }

            let position = progress(frame);
            (start * (end / start).powf(position)) as f32
        }
        AutomationSegmentKind::SetTarget => {
            if segment.time_constant <= 0.0 {
                return segment.end_value;
            }

            let elapsed_seconds = (frame - segment.start_frame()) as f64 / sample_rate as f64;
            let decay = (-elapsed_seconds / segment.time_constant).exp();
            (segment.end_value as f64 + (segment.start_value as f64 - segment.end_value as f64) * decay)
                as f32
        }
        AutomationSegmentKind::ValueCurve => {
            if segment.curve.len() == 1 {
                return segment.curve[0];
            }

            let position = progress(frame) * (segment.curve.len() - 1) as f64;
            let index = position.floor() as usize;
            let next_index = (index + 1).min(segment.curve.len() - 1);
            let fraction = (position - index as f64) as f32;

            segment.curve[index] * (1.0 - fraction) + segment.curve[next_index] * fraction
        }
    }
}
