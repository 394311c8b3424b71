use crate::graph::ChannelInterpretation;

use super::AudioBus;

/// Add a source bus into a destination bus, up-mixing or down-mixing to the
/// destination's live channel count
///
/// The destination's live region must already be sized; samples are summed
/// into it. Silence markers contribute nothing.
pub(crate) fn mix_into(
    destination: &mut AudioBus,
    source: &AudioBus,
    interpretation: ChannelInterpretation,
) {
    if source.is_silent_marker() || destination.is_silent_marker() {
        return;
    }

    let source_channels = source.channel_count();
    let destination_channels = destination.channel_count();

    match interpretation {
        ChannelInterpretation::Speakers => {
            if source_channels == 1 && destination_channels > 1 {
                // Mono feeds both left and right
                add_channel(destination, 0, source, 0);
                add_channel(destination, 1, source, 0);
            } else if source_channels == 2 && destination_channels == 1 {
                add_channel_scaled(destination, 0, source, 0, 0.5);
                add_channel_scaled(destination, 0, source, 1, 0.5);
            } else {
                mix_discrete(destination, source);
            }
        }
        ChannelInterpretation::Discrete => mix_discrete(destination, source),
    }
}

fn mix_discrete(destination: &mut AudioBus, source: &AudioBus) {
    let channel_count = destination.channel_count().min(source.channel_count());

    for channel in 0..channel_count {
        add_channel(destination, channel, source, channel);
    }
}

fn add_channel(
    destination: &mut AudioBus,
    destination_channel: usize,
    source: &AudioBus,
    source_channel: usize,
) {
    add_channel_scaled(destination, destination_channel, source, source_channel, 1.0);
}

fn add_channel_scaled(
    destination: &mut AudioBus,
    destination_channel: usize,
    source: &AudioBus,
    source_channel: usize,
    gain: f32,
) {
    let frame_count = destination.frame_count();

    if source.frame_count() >= frame_count {
        let source_data = &source.channel(source_channel)[..frame_count];
        let destination_data = &mut destination.channel_mut(destination_channel)[..frame_count];

        for (destination_sample, source_sample) in destination_data.iter_mut().zip(source_data) {
            *destination_sample += gain * *source_sample;
        }
    } else {
        // Constant buses hold a single representative frame
        for frame in 0..frame_count {
            let value = gain * source.value_at(source_channel, frame);
            destination.channel_mut(destination_channel)[frame] += value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    fn constant_bus(channel_count: usize, frame_count: usize, value: f32) -> AudioBus {
        let mut bus = AudioBus::new(channel_count, frame_count);
        for channel in 0..channel_count {
            bus.fill_channel(channel, value);
        }
        bus
    }

    #[test]
    fn mono_up_mixes_to_both_stereo_channels() {
        let source = constant_bus(1, 16, 0.5);
        let mut destination = AudioBus::new(2, 16);

        mix_into(&mut destination, &source, ChannelInterpretation::Speakers);

        assert_relative_eq!(destination.value_at(0, 0), 0.5);
        assert_relative_eq!(destination.value_at(1, 0), 0.5);
    }

    #[test]
    fn stereo_down_mixes_to_mono_average() {
        let mut source = AudioBus::new(2, 16);
        source.fill_channel(0, 1.0);
        source.fill_channel(1, 0.5);

        let mut destination = AudioBus::new(1, 16);

        mix_into(&mut destination, &source, ChannelInterpretation::Speakers);

        assert_relative_eq!(destination.value_at(0, 8), 0.75);
    }

    #[test]
    fn discrete_mixing_ignores_extra_channels() {
        let source = constant_bus(4, 16, 1.0);
        let mut destination = AudioBus::new(2, 16);

        mix_into(&mut destination, &source, ChannelInterpretation::Discrete);

        assert_relative_eq!(destination.value_at(0, 0), 1.0);
        assert_relative_eq!(destination.value_at(1, 0), 1.0);
    }

    #[test]
    fn sources_accumulate() {
        let first = constant_bus(2, 16, 0.25);
        let second = constant_bus(2, 16, 0.5);

        let mut destination = AudioBus::new(2, 16);

        mix_into(&mut destination, &first, ChannelInterpretation::Speakers);
        mix_into(&mut destination, &second, ChannelInterpretation::Speakers);

        assert_relative_eq!(destination.value_at(0, 0), 0.75);
    }

    #[test]
    fn silence_markers_contribute_nothing() {
        let mut source = AudioBus::with_capacity(0, 16, 2, 16);
        source.set_channel_count(0);

        let mut destination = constant_bus(2, 16, 0.1);

        mix_into(&mut destination, &source, ChannelInterpretation::Speakers);

        assert_relative_eq!(destination.value_at(0, 0), 0.1);
    }
}
