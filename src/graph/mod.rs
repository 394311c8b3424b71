mod automation;
mod description;
mod node_id;

pub use automation::AutomationRate;
pub use automation::AutomationSegment;
pub(crate) use automation::AutomationSegmentKind;
pub use automation::ParamAutomation;

pub use description::AnalyserDescription;
pub use description::ChannelConfig;
pub use description::ChannelCountMode;
pub use description::ChannelInterpretation;
pub use description::ConstantSourceDescription;
pub use description::DelayDescription;
pub use description::DestinationDescription;
pub use description::DynamicsCompressorDescription;
pub use description::GainDescription;
pub use description::GraphConnection;
pub use description::GraphDescription;
pub use description::GraphParamConnection;
pub use description::NodeDescription;
pub use description::NodeKind;
pub use description::OscillatorDescription;
pub(crate) use description::ParamSpec;
pub use description::WorkletDescription;

pub use node_id::NodeId;
