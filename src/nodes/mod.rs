mod analyser;
mod compressor;
mod constant_source;
mod delay;
mod destination;
mod gain;
mod oscillator;
mod render_node;
mod worklet;

pub use analyser::AnalyserHandle;
pub(crate) use analyser::AnalyserShared;
pub(crate) use render_node::RenderNode;
