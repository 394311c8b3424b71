use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::buffer::AudioBus;
use crate::executor::RenderContext;

const MINIMUM_DECIBELS: f32 = -160.0;

/// The ring of recent samples shared between an analyser node and its handles
///
/// Written by the render thread with a sequence-lock protocol: the sequence is
/// odd while a write is in flight, and readers retry until they observe the
/// same even value before and after copying.
pub(crate) struct AnalyserShared {
    fft_size: usize,
    sequence: AtomicU64,
    head: AtomicUsize,
    samples: Vec<AtomicU32>,
}

impl AnalyserShared {
    fn new(fft_size: usize) -> Self {
        Self {
            fft_size,
            sequence: AtomicU64::new(0),
            head: AtomicUsize::new(0),
            samples: (0..fft_size).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    fn read_ordered(&self, destination: &mut [f32]) -> bool {
        const MAXIMUM_ATTEMPTS: usize = 1_000;

        debug_assert!(destination.len() <= self.fft_size);

        for _ in 0..MAXIMUM_ATTEMPTS {
            let sequence_before = self.sequence.load(Ordering::Acquire);

            if sequence_before % 2 != 0 {
                std::hint::spin_loop();
                continue;
            }

            let head = self.head.load(Ordering::Relaxed);
            let start = self.fft_size + head - destination.len();

            for (index, value) in destination.iter_mut().enumerate() {
                let sample = self.samples[(start + index) % self.fft_size].load(Ordering::Relaxed);
                *value = f32::from_bits(sample);
            }

            let sequence_after = self.sequence.load(Ordering::Acquire);

            if sequence_before == sequence_after {
                return true;
            }
        }

        false
    }
}

pub struct AnalyserRenderNode {
    shared: Arc<AnalyserShared>,
}

impl AnalyserRenderNode {
    pub fn new(fft_size: usize) -> Self {
        Self {
            shared: Arc::new(AnalyserShared::new(fft_size)),
        }
    }

    pub fn shared(&self) -> Arc<AnalyserShared> {
        self.shared.clone()
    }

    pub fn process(
        &mut self,
        context: &RenderContext,
        inputs: &[AudioBus],
        outputs: &mut [AudioBus],
    ) {
        let output = &mut outputs[0];

        let Some(input) = inputs.first() else {
            output.set_channel_count(0);
            self.push_silence(context.quantum_size.min(self.shared.fft_size));
            return;
        };

        if input.is_silent_marker() {
            output.set_channel_count(0);
            self.push_silence(context.quantum_size.min(self.shared.fft_size));
            return;
        }

        // Audio passes through unchanged
        output.copy_from(input);

        let shared = &self.shared;
        let sequence = shared.sequence.load(Ordering::Relaxed);
        shared.sequence.store(sequence + 1, Ordering::Release);

        let head = shared.head.load(Ordering::Relaxed);
        let frame_count = input.frame_count().min(shared.fft_size);
        let channel_scale = 1.0 / input.channel_count() as f32;

        for frame in 0..frame_count {
            let mut sample = 0.0;
            for channel in 0..input.channel_count() {
                sample += input.value_at(channel, frame);
            }

            let index = (head + frame) % shared.fft_size;
            shared.samples[index].store((sample * channel_scale).to_bits(), Ordering::Relaxed);
        }

        shared
            .head
            .store((head + frame_count) % shared.fft_size, Ordering::Relaxed);
        shared.sequence.store(sequence + 2, Ordering::Release);
    }

    fn push_silence(&self, frame_count: usize) {
        let shared = &self.shared;
        let sequence = shared.sequence.load(Ordering::Relaxed);
        shared.sequence.store(sequence + 1, Ordering::Release);

        let head = shared.head.load(Ordering::Relaxed);

        for frame in 0..frame_count {
            let index = (head + frame) % shared.fft_size;
            shared.samples[index].store(0.0_f32.to_bits(), Ordering::Relaxed);
        }

        shared
            .head
            .store((head + frame_count) % shared.fft_size, Ordering::Relaxed);
        shared.sequence.store(sequence + 2, Ordering::Release);
    }

    pub fn take_state_from(&mut self, other: &mut Self) {
        if self.shared.fft_size != other.shared.fft_size {
            return;
        }

        let sequence = self.shared.sequence.load(Ordering::Relaxed);
        self.shared.sequence.store(sequence + 1, Ordering::Release);

        for (destination, source) in self.shared.samples.iter().zip(&other.shared.samples) {
            destination.store(source.load(Ordering::Relaxed), Ordering::Relaxed);
        }

        self.shared.head.store(
            other.shared.head.load(Ordering::Relaxed),
            Ordering::Relaxed,
        );

        self.shared.sequence.store(sequence + 2, Ordering::Release);
    }
}

/// Read access to an analyser node's recent audio, usable from any thread
///
/// A handle stays bound to the node instance it was created from. After a
/// topology rebuild, fetch a fresh handle from the controller.
pub struct AnalyserHandle {
    shared: Arc<AnalyserShared>,
    fft: Arc<dyn Fft<f32>>,
    scratch: Vec<Complex<f32>>,
    window: Vec<f32>,
}

impl AnalyserHandle {
    pub(crate) fn new(shared: Arc<AnalyserShared>) -> Self {
        let fft_size = shared.fft_size;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_size);

        Self {
            shared,
            fft,
            scratch: vec![Complex::default(); fft_size],
            window: blackman_window(fft_size),
        }
    }

    /// The FFT size this analyser was built with
    pub fn fft_size(&self) -> usize {
        self.shared.fft_size
    }

    /// Copy out the most recent time-domain samples
    ///
    /// Fills up to `fft_size` samples, most recent last. Returns false if a
    /// consistent snapshot could not be taken.
    pub fn time_domain_data(&self, destination: &mut [f32]) -> bool {
        let length = destination.len().min(self.shared.fft_size);
        self.shared.read_ordered(&mut destination[..length])
    }

    /// Compute the magnitude spectrum of the most recent samples, in dB
    ///
    /// Fills up to `fft_size / 2` bins. Returns false if a consistent
    /// snapshot could not be taken.
    pub fn frequency_data_db(&mut self, destination: &mut [f32]) -> bool {
        let fft_size = self.shared.fft_size;

        let mut time_domain = vec![0.0; fft_size];
        if !self.shared.read_ordered(&mut time_domain) {
            return false;
        }

        for (index, sample) in time_domain.iter().enumerate() {
            self.scratch[index] = Complex::new(sample * self.window[index], 0.0);
        }

        self.fft.process(&mut self.scratch);

        let bin_count = destination.len().min(fft_size / 2);
        let scale = 1.0 / fft_size as f32;

        for (bin, value) in destination[..bin_count].iter_mut().enumerate() {
            let magnitude = self.scratch[bin].norm() * scale;
            *value = if magnitude > 0.0 {
                (20.0 * magnitude.log10()).max(MINIMUM_DECIBELS)
            } else {
                MINIMUM_DECIBELS
            };
        }

        true
    }
}

fn blackman_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|index| {
            let position = index as f32 / length as f32;
            let angle = std::f32::consts::TAU * position;
            0.42 - 0.5 * angle.cos() + 0.08 * (2.0 * angle).cos()
        })
        .collect()
}
