//! Synthetic interleaved blocks for integration tests

#![allow(dead_code)]

use spike_conditioning::processing::layout::ChannelLayout;
use spike_conditioning::processing::signal_processor::SignalProcessorConfig;

/// All-zero block of `ntpts` timepoints by `n_chans` channels.
pub fn zero_block(ntpts: usize, n_chans: usize) -> Vec<i16> {
    vec![0; ntpts * n_chans]
}

/// Zero block with a single sample set on one channel.
pub fn spike_block(ntpts: usize, n_chans: usize, channel: usize, at: usize, value: i16) -> Vec<i16> {
    let mut block = zero_block(ntpts, n_chans);
    block[at * n_chans + channel] = value;
    block
}

/// Every channel carries the same constant plus a per-channel offset.
pub fn offset_block(ntpts: usize, offsets: &[i16], common: i16) -> Vec<i16> {
    let row: Vec<i16> = offsets.iter().map(|o| o.saturating_add(common)).collect();
    row.repeat(ntpts)
}

/// Sine of `freq` Hz with amplitude `amp`, identical on every channel.
pub fn sine_block(ntpts: usize, n_chans: usize, freq: f64, sample_rate: f64, amp: f64) -> Vec<i16> {
    let w = 2.0 * std::f64::consts::PI * freq / sample_rate;
    (0..ntpts)
        .flat_map(|t| std::iter::repeat((amp * (w * t as f64).sin()) as i16).take(n_chans))
        .collect()
}

/// Generic neural-only stream, everything off, given decimation.
pub fn plain_config(neural: usize, sample_rate: f64, factor: usize) -> SignalProcessorConfig {
    let mut config = SignalProcessorConfig::new(ChannelLayout::generic(neural, 0, 0, 32768, sample_rate));
    config.display.downsample_factor = factor;
    config.display.bin_max = false;
    config
}
