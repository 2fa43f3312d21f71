// src/processing/layout.rs

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Which acquisition front-end produced the stream. Channel semantics are
/// carried as explicit counts on `ChannelLayout`; the kind only selects
/// capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamKind {
    ImecAp,
    ImecLf,
    Nidq,
    Generic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Neural,
    Analog,
    Digital,
}

/// Largest full-scale value a 16-bit stream can carry.
pub const MAX_INT_LIMIT: i32 = 32768;

/// Conditioning steps a stream supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub filtering: bool,
    pub dc_tracking: bool,
    pub spatial: bool,
    pub strided_global: bool,
}

/// Channel order is always `[neural.., analog.., digital..]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelLayout {
    pub kind: StreamKind,
    pub neural: usize,
    #[serde(default)]
    pub analog: usize,
    #[serde(default)]
    pub digital: usize,
    pub max_int: i32,
    pub sample_rate: f64,
    #[serde(default = "default_mux_groups")]
    pub mux_groups: usize,
}

fn default_mux_groups() -> usize {
    1
}

impl Default for ChannelLayout {
    fn default() -> Self {
        Self::generic(1, 0, 0, 32768, 30000.0)
    }
}

impl ChannelLayout {
    /// Imec action-potential stream: neural channels plus one sync word.
    pub fn imec_ap(neural: usize, max_int: i32, sample_rate: f64) -> Self {
        Self {
            kind: StreamKind::ImecAp,
            neural,
            analog: 0,
            digital: 1,
            max_int,
            sample_rate,
            mux_groups: 1,
        }
    }

    pub fn imec_lf(neural: usize, max_int: i32, sample_rate: f64) -> Self {
        Self {
            kind: StreamKind::ImecLf,
            ..Self::imec_ap(neural, max_int, sample_rate)
        }
    }

    /// NI-DAQ stream; `mux_groups` is the multiplexer fan-in of the neural
    /// front-end (samples `i, i + groups, ...` share one analog path).
    pub fn nidq(
        neural: usize,
        analog: usize,
        digital: usize,
        max_int: i32,
        sample_rate: f64,
        mux_groups: usize,
    ) -> Self {
        Self {
            kind: StreamKind::Nidq,
            neural,
            analog,
            digital,
            max_int,
            sample_rate,
            mux_groups: mux_groups.max(1),
        }
    }

    pub fn generic(
        neural: usize,
        analog: usize,
        digital: usize,
        max_int: i32,
        sample_rate: f64,
    ) -> Self {
        Self {
            kind: StreamKind::Generic,
            neural,
            analog,
            digital,
            max_int,
            sample_rate,
            mux_groups: 1,
        }
    }

    pub fn channel_count(&self) -> usize {
        self.neural + self.analog + self.digital
    }

    pub fn neural_range(&self) -> Range<usize> {
        0..self.neural
    }

    pub fn kind_of(&self, channel: usize) -> ChannelKind {
        if channel < self.neural {
            ChannelKind::Neural
        } else if channel < self.neural + self.analog {
            ChannelKind::Analog
        } else {
            ChannelKind::Digital
        }
    }

    /// Factor applied to raw integers for display. Digital words are passed
    /// through unscaled.
    pub fn display_scale(&self, channel: usize) -> f32 {
        match self.kind_of(channel) {
            ChannelKind::Digital => 1.0,
            _ => 1.0 / self.max_int as f32,
        }
    }

    pub fn capabilities(&self) -> Capabilities {
        let has_neural = self.neural > 0;
        Capabilities {
            filtering: has_neural,
            dc_tracking: has_neural,
            spatial: self.neural > 1,
            strided_global: self.kind == StreamKind::Nidq && self.mux_groups > 1,
        }
    }

    /// Number of timepoints in an interleaved block of `len` samples.
    pub fn timepoints(&self, len: usize) -> usize {
        let n_chans = self.channel_count();
        assert!(n_chans > 0, "layout has no channels");
        assert!(
            len % n_chans == 0,
            "block length {} is not a multiple of the channel count {}",
            len,
            n_chans
        );
        len / n_chans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_kinds_follow_count_order() {
        let layout = ChannelLayout::nidq(4, 2, 1, 32768, 25000.0, 2);
        assert_eq!(layout.channel_count(), 7);
        assert_eq!(layout.kind_of(0), ChannelKind::Neural);
        assert_eq!(layout.kind_of(3), ChannelKind::Neural);
        assert_eq!(layout.kind_of(4), ChannelKind::Analog);
        assert_eq!(layout.kind_of(5), ChannelKind::Analog);
        assert_eq!(layout.kind_of(6), ChannelKind::Digital);
    }

    #[test]
    fn test_digital_channels_are_not_scaled() {
        let layout = ChannelLayout::imec_ap(384, 512, 30000.0);
        assert_eq!(layout.display_scale(384), 1.0);
        assert!((layout.display_scale(0) - 1.0 / 512.0).abs() < 1e-9);
    }

    #[test]
    fn test_strided_global_needs_multiplexed_nidq() {
        assert!(!ChannelLayout::imec_ap(384, 512, 30000.0)
            .capabilities()
            .strided_global);
        assert!(ChannelLayout::nidq(32, 0, 1, 32768, 25000.0, 8)
            .capabilities()
            .strided_global);
        assert!(!ChannelLayout::nidq(32, 0, 1, 32768, 25000.0, 1)
            .capabilities()
            .strided_global);
    }

    #[test]
    fn test_single_channel_cannot_be_referenced() {
        let caps = ChannelLayout::generic(1, 2, 1, 32768, 1000.0).capabilities();
        assert!(caps.filtering && caps.dc_tracking);
        assert!(!caps.spatial);

        let aux_only = ChannelLayout::nidq(0, 4, 1, 32768, 25000.0, 1).capabilities();
        assert!(!aux_only.filtering && !aux_only.dc_tracking && !aux_only.spatial);
    }

    #[test]
    #[should_panic(expected = "not a multiple")]
    fn test_ragged_block_is_a_contract_violation() {
        ChannelLayout::generic(3, 0, 0, 32768, 1000.0).timepoints(10);
    }
}
