use super::layout::{ChannelKind, ChannelLayout};
use super::statistics::ChannelStatSample;
use serde::{Deserialize, Serialize};

/// How a neural channel's bin collapses to one point when bin-max is off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NeuralDecimation {
    PickNth,
    /// The bin's extremum of largest magnitude (max on ties)
    #[default]
    PeakMagnitude,
}

/// Decimated display data for one channel of one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelTrace {
    /// Bin maxima in bin-max mode, otherwise the only stream.
    pub primary: Vec<f32>,
    /// Bin minima; meaningful only when `draw_bin_max` is set.
    pub secondary: Vec<f32>,
    pub draw_bin_max: bool,
    pub stats: ChannelStatSample,
}

/// Everything the renderer reads for one block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplayFrame {
    pub sequence: u64,
    pub first_sample_index: u64,
    pub downsample_factor: usize,
    pub channels: Vec<ChannelTrace>,
}

impl DisplayFrame {
    pub fn resize(&mut self, n_channels: usize) {
        self.channels.resize_with(n_channels, ChannelTrace::default);
    }

    /// Copies into `dst` reusing its buffers.
    pub fn copy_into(&self, dst: &mut DisplayFrame) {
        dst.sequence = self.sequence;
        dst.first_sample_index = self.first_sample_index;
        dst.downsample_factor = self.downsample_factor;
        dst.resize(self.channels.len());
        for (d, s) in dst.channels.iter_mut().zip(&self.channels) {
            d.primary.clone_from(&s.primary);
            d.secondary.clone_from(&s.secondary);
            d.draw_bin_max = s.draw_bin_max;
            d.stats = s.stats;
        }
    }
}

/// Display-side decimation choices, as configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub downsample_factor: usize,
    pub bin_max: bool,
    pub neural_mode: NeuralDecimation,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            downsample_factor: 1,
            bin_max: false,
            neural_mode: NeuralDecimation::PeakMagnitude,
        }
    }
}

// DOWNSAMPLE PIPELINE ---------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsamplePipeline {
    factor: usize,
    bin_max: bool,
    neural_mode: NeuralDecimation,
}

impl Default for DownsamplePipeline {
    fn default() -> Self {
        DisplaySettings::default().into()
    }
}

impl From<DisplaySettings> for DownsamplePipeline {
    fn from(s: DisplaySettings) -> Self {
        Self::new(s.downsample_factor, s.bin_max, s.neural_mode)
    }
}

impl DownsamplePipeline {
    pub fn new(factor: usize, bin_max: bool, neural_mode: NeuralDecimation) -> Self {
        Self {
            factor: factor.max(1),
            bin_max,
            neural_mode,
        }
    }

    pub fn factor(&self) -> usize {
        self.factor
    }

    pub fn settings(&self) -> DisplaySettings {
        DisplaySettings {
            downsample_factor: self.factor,
            bin_max: self.bin_max,
            neural_mode: self.neural_mode,
        }
    }

    pub fn draws_bin_max(&self) -> bool {
        self.bin_max && self.factor > 1
    }

    /// Timepoint step that earlier conditioning stages must cover so every
    /// sample the neural decimation reads has been conditioned.
    pub fn neural_step(&self) -> usize {
        if self.draws_bin_max() || self.neural_mode == NeuralDecimation::PeakMagnitude {
            1
        } else {
            self.factor
        }
    }

    /// `ceil(ntpts / factor)`.
    pub fn output_len(&self, ntpts: usize) -> usize {
        (ntpts + self.factor - 1) / self.factor
    }

    /// Decimates channel `ch` of an interleaved block into `trace`, reusing
    /// its buffers. `connected == false` yields a zero-filled gap.
    #[allow(clippy::too_many_arguments)]
    pub fn decimate_channel(
        &self,
        block: &[i16],
        ntpts: usize,
        stride: usize,
        ch: usize,
        layout: &ChannelLayout,
        connected: bool,
        trace: &mut ChannelTrace,
    ) {
        trace.primary.clear();
        trace.secondary.clear();
        trace.draw_bin_max = false;

        let kind = layout.kind_of(ch);
        let scale = layout.display_scale(ch);
        let n_out = self.output_len(ntpts);
        let sample = |t: usize| block[t * stride + ch];

        if kind == ChannelKind::Neural && !connected {
            trace.primary.resize(n_out, 0.0);
            return;
        }

        let extremum = kind == ChannelKind::Neural && self.factor > 1;
        if extremum && self.bin_max {
            trace.draw_bin_max = true;
            for start in (0..ntpts).step_by(self.factor) {
                let (lo, hi) = bin_extrema((start..(start + self.factor).min(ntpts)).map(sample));
                trace.primary.push(hi as f32 * scale);
                trace.secondary.push(lo as f32 * scale);
            }
        } else if extremum && self.neural_mode == NeuralDecimation::PeakMagnitude {
            for start in (0..ntpts).step_by(self.factor) {
                let (lo, hi) = bin_extrema((start..(start + self.factor).min(ntpts)).map(sample));
                let peak = if (hi as i32).abs() >= (lo as i32).abs() {
                    hi
                } else {
                    lo
                };
                trace.primary.push(peak as f32 * scale);
            }
        } else {
            trace
                .primary
                .extend((0..ntpts).step_by(self.factor).map(|t| sample(t) as f32 * scale));
        }
    }
}

fn bin_extrema(bin: impl Iterator<Item = i16>) -> (i16, i16) {
    bin.fold((i16::MAX, i16::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
