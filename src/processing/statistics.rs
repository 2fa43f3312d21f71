// STATISTICS COMPONENT --------------------------------------------------------

/// First and second moments of one channel over one block, in raw units.
/// Reset at the start of every block; never cumulative.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ChannelStatSample {
    pub sum: f64,
    pub sum_of_squares: f64,
    pub count: u64,
}

impl ChannelStatSample {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    #[inline]
    pub fn add(&mut self, value: f64) {
        self.sum += value;
        self.sum_of_squares += value * value;
        self.count += 1;
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.sum / self.count as f64
    }

    pub fn rms(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        (self.sum_of_squares / self.count as f64).sqrt()
    }

    // Population standard deviation; rounding can push the variance just below zero
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        let mean = self.mean();
        (self.sum_of_squares / self.count as f64 - mean * mean)
            .max(0.0)
            .sqrt()
    }
}

/// One `ChannelStatSample` per channel, rebuilt every block.
#[derive(Debug, Clone, Default)]
pub struct ChannelStatistics {
    samples: Vec<ChannelStatSample>,
}

impl ChannelStatistics {
    pub fn new(n_channels: usize) -> Self {
        Self {
            samples: vec![ChannelStatSample::default(); n_channels],
        }
    }

    pub fn begin_block(&mut self, n_channels: usize) {
        self.samples.resize(n_channels, ChannelStatSample::default());
        self.samples.iter_mut().for_each(ChannelStatSample::clear);
    }

    /// Accumulates every `step`-th timepoint of channel `channel`.
    pub fn accumulate(
        &mut self,
        block: &[i16],
        ntpts: usize,
        stride: usize,
        channel: usize,
        step: usize,
    ) {
        let stat = &mut self.samples[channel];
        for row in block.chunks_exact(stride).take(ntpts).step_by(step.max(1)) {
            stat.add(row[channel] as f64);
        }
    }

    pub fn get(&self, channel: usize) -> &ChannelStatSample {
        &self.samples[channel]
    }
}
