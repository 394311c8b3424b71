use rand::Rng;

/// A fixed-capacity, channel-major block of audio samples
///
/// A bus is allocated once with a channel and frame capacity and never
/// reallocates afterwards, so it is safe to resize on the render thread. The
/// live region is described by [`AudioBus::channel_count`] and
/// [`AudioBus::frame_count`], which can be changed at any time up to the
/// allocated capacity.
///
/// A bus with a channel count of zero is a silence marker: it carries no
/// samples and contributes nothing when mixed.
///
/// A bus with a frame count of one represents a value that is constant for the
/// whole quantum. [`AudioBus::value_at`] clamps the frame index so callers can
/// read constant and per-sample buses with the same code.
#[repr(align(64))]
#[derive(Clone)]
pub struct AudioBus {
    data: Vec<f32>,
    channel_capacity: usize,
    frame_capacity: usize,
    channel_count: usize,
    frame_count: usize,
}

impl AudioBus {
    /// Create a bus whose capacity equals its initial channel and frame count
    pub fn new(channel_count: usize, frame_count: usize) -> Self {
        Self::with_capacity(channel_count, frame_count, channel_count, frame_count)
    }

    /// Create a bus with an initial live region smaller than its capacity
    pub fn with_capacity(
        channel_count: usize,
        frame_count: usize,
        channel_capacity: usize,
        frame_capacity: usize,
    ) -> Self {
        debug_assert!(channel_count <= channel_capacity);
        debug_assert!(frame_count <= frame_capacity);

        Self {
            data: vec![0.0; channel_capacity * frame_capacity],
            channel_capacity,
            frame_capacity,
            channel_count,
            frame_count,
        }
    }

    /// Create a bus filled with uniform white noise in [-1, 1]
    pub fn white_noise(channel_count: usize, frame_count: usize) -> Self {
        let mut bus = Self::new(channel_count, frame_count);

        let mut random_generator = rand::rng();

        for channel in 0..channel_count {
            for sample in bus.channel_mut(channel) {
                *sample = random_generator.random_range(-1.0..=1.0);
            }
        }

        bus
    }

    /// The number of live channels
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// The number of live frames in each channel
    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// The number of channels this bus can hold without reallocating
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// The number of frames this bus can hold without reallocating
    pub fn frame_capacity(&self) -> usize {
        self.frame_capacity
    }

    /// Whether this bus is a silence marker
    pub fn is_silent_marker(&self) -> bool {
        self.channel_count == 0
    }

    /// Change the number of live channels without reallocating
    ///
    /// Panics in debug builds if the count exceeds the channel capacity.
    pub fn set_channel_count(&mut self, channel_count: usize) {
        debug_assert!(channel_count <= self.channel_capacity);
        self.channel_count = channel_count.min(self.channel_capacity);
    }

    /// Change the number of live frames without reallocating
    ///
    /// Panics in debug builds if the count exceeds the frame capacity.
    pub fn set_frame_count(&mut self, frame_count: usize) {
        debug_assert!(frame_count <= self.frame_capacity);
        self.frame_count = frame_count.min(self.frame_capacity);
    }

    /// The live samples of a channel
    pub fn channel(&self, channel: usize) -> &[f32] {
        debug_assert!(channel < self.channel_count);
        let start = channel * self.frame_capacity;
        &self.data[start..start + self.frame_count]
    }

    /// The live samples of a channel, mutably
    pub fn channel_mut(&mut self, channel: usize) -> &mut [f32] {
        debug_assert!(channel < self.channel_count);
        let start = channel * self.frame_capacity;
        &mut self.data[start..start + self.frame_count]
    }

    /// Read a sample, clamping the frame index to the live region
    ///
    /// A constant bus holds a single frame; clamping lets per-sample loops
    /// read it without branching on the representation.
    pub fn value_at(&self, channel: usize, frame: usize) -> f32 {
        debug_assert!(self.frame_count > 0);
        let frame = frame.min(self.frame_count - 1);
        self.channel(channel)[frame]
    }

    /// Zero every live sample
    pub fn clear(&mut self) {
        for channel in 0..self.channel_count {
            self.channel_mut(channel).fill(0.0);
        }
    }

    /// Fill every live sample of a channel with a value
    pub fn fill_channel(&mut self, channel: usize, value: f32) {
        self.channel_mut(channel).fill(value);
    }

    /// Whether every live sample of a channel is exactly zero
    pub fn channel_is_silent(&self, channel: usize) -> bool {
        self.channel(channel).iter().all(|sample| *sample == 0.0)
    }

    /// Copy the live region of another bus into this one
    ///
    /// Copies the overlapping channel and frame counts and adopts the source's
    /// live region sizes where they fit within this bus's capacity.
    pub fn copy_from(&mut self, source: &AudioBus) {
        self.set_channel_count(source.channel_count());
        self.set_frame_count(source.frame_count());

        for channel in 0..self.channel_count {
            let frame_count = self.frame_count;
            self.channel_mut(channel)[..frame_count]
                .copy_from_slice(&source.channel(channel)[..frame_count]);
        }
    }
}
