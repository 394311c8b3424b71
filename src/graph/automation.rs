use super::NodeId;

/// How often an automated parameter is evaluated
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AutomationRate {
    /// One value per frame
    ARate,

    /// One value per quantum, sampled at the first frame
    KRate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AutomationSegmentKind {
    SetValue,
    LinearRamp,
    ExponentialRamp,
    SetTarget,
    ValueCurve,
}

/// One piece of an automation timeline for a parameter
///
/// A segment takes effect at its start frame and holds until the next
/// segment's start frame. Times are expressed in frames at the graph's sample
/// rate, so scheduling is sample accurate.
#[derive(Clone, Debug, PartialEq)]
pub struct AutomationSegment {
    pub(crate) kind: AutomationSegmentKind,
    pub(crate) start_frame: u64,
    pub(crate) end_frame: u64,
    pub(crate) start_value: f32,
    pub(crate) end_value: f32,
    pub(crate) time_constant: f64,
    pub(crate) curve: Vec<f32>,
}

impl AutomationSegment {
    /// Hold a value from a frame onwards
    pub fn set_value(value: f32, frame: u64) -> Self {
        Self {
            kind: AutomationSegmentKind::SetValue,
            start_frame: frame,
            end_frame: frame,
            start_value: value,
            end_value: value,
            time_constant: 0.0,
            curve: Vec::new(),
        }
    }

    /// Ramp linearly between two values over a frame range
    pub fn linear_ramp(start_value: f32, start_frame: u64, end_value: f32, end_frame: u64) -> Self {
        Self {
            kind: AutomationSegmentKind::LinearRamp,
            start_frame,
            end_frame,
            start_value,
            end_value,
            time_constant: 0.0,
            curve: Vec::new(),
        }
    }

    /// Ramp exponentially between two values over a frame range
    ///
    /// Falls back to a jump to the end value when the endpoints straddle zero,
    /// where an exponential ramp is undefined.
    pub fn exponential_ramp(
        start_value: f32,
        start_frame: u64,
        end_value: f32,
        end_frame: u64,
    ) -> Self {
        Self {
            kind: AutomationSegmentKind::ExponentialRamp,
            start_frame,
            end_frame,
            start_value,
            end_value,
            time_constant: 0.0,
            curve: Vec::new(),
        }
    }

    /// Approach a target value exponentially with a time constant in seconds
    pub fn set_target(start_value: f32, target: f32, start_frame: u64, time_constant: f64) -> Self {
        Self {
            kind: AutomationSegmentKind::SetTarget,
            start_frame,
            end_frame: start_frame,
            start_value,
            end_value: target,
            time_constant,
            curve: Vec::new(),
        }
    }

    /// Follow a curve of values spread evenly across a frame range
    pub fn value_curve(curve: Vec<f32>, start_frame: u64, end_frame: u64) -> Self {
        let start_value = curve.first().copied().unwrap_or_default();
        let end_value = curve.last().copied().unwrap_or_default();

        Self {
            kind: AutomationSegmentKind::ValueCurve,
            start_frame,
            end_frame,
            start_value,
            end_value,
            time_constant: 0.0,
            curve,
        }
    }

    /// The frame at which this segment takes effect
    pub fn start_frame(&self) -> u64 {
        self.start_frame
    }

    /// The frame at which this segment's ramp or curve ends
    pub fn end_frame(&self) -> u64 {
        self.end_frame
    }
}

/// The automation timeline for one parameter of one node
#[derive(Clone, Debug, PartialEq)]
pub struct ParamAutomation {
    /// The node whose parameter is automated
    pub destination: NodeId,

    /// The index of the parameter on the destination node
    pub destination_param_index: usize,

    /// Whether the timeline is evaluated per frame or per quantum
    pub rate: AutomationRate,

    /// The timeline, ordered by ascending start frame
    pub segments: Vec<AutomationSegment>,
}

impl ParamAutomation {
    /// Create an a-rate timeline for a parameter
    pub fn new(destination: NodeId, destination_param_index: usize) -> Self {
        Self {
            destination,
            destination_param_index,
            rate: AutomationRate::ARate,
            segments: Vec::new(),
        }
    }

    /// Change the evaluation rate of this timeline
    pub fn with_rate(mut self, rate: AutomationRate) -> Self {
        self.rate = rate;
        self
    }

    /// Append a segment to this timeline
    pub fn with_segment(mut self, segment: AutomationSegment) -> Self {
        self.segments.push(segment);
        self
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        let ordered = self
            .segments
            .windows(2)
            .all(|pair| pair[0].start_frame <= pair[1].start_frame);

        let segments_valid = self.segments.iter().all(|segment| {
            let range_valid = segment.end_frame >= segment.start_frame;

            match segment.kind {
                AutomationSegmentKind::ValueCurve => range_valid && !segment.curve.is_empty(),
                AutomationSegmentKind::SetTarget => segment.time_constant >= 0.0,
                _ => range_valid,
            }
        });

        ordered && segments_valid
    }
}
