mod audio_bus;
mod mix;

pub use audio_bus::AudioBus;
pub(crate) use mix::mix_into;
