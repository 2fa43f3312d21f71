use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Length of one accumulate/commit cycle, seconds.
pub const DC_CYCLE_SECS: f64 = 5.0;

/// Samples are accumulated only during the last second of each cycle.
pub const DC_WINDOW_SECS: f64 = 1.0;

/// Clock offset loaded on enable, so the first commit lands one window later
/// instead of a full cycle later.
pub const DC_SETTLE_OFFSET_SECS: f64 = DC_CYCLE_SECS - DC_WINDOW_SECS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DcClock {
    /// Stream time, `first_sample_index / sample_rate`
    #[default]
    Sample,
    Wall,
}

/// Source of "now" for the DC cycle.
#[derive(Debug, Clone, Copy)]
pub enum TimeSource {
    Sample { sample_rate: f64 },
    Wall { origin: Instant },
}

impl TimeSource {
    pub fn new(clock: DcClock, sample_rate: f64) -> Self {
        match clock {
            DcClock::Sample => TimeSource::Sample { sample_rate },
            DcClock::Wall => TimeSource::Wall {
                origin: Instant::now(),
            },
        }
    }

    pub fn now(&self, first_sample_index: u64) -> f64 {
        match self {
            TimeSource::Sample { sample_rate } => first_sample_index as f64 / sample_rate,
            TimeSource::Wall { origin } => origin.elapsed().as_secs_f64(),
        }
    }
}

// DC LEVEL TRACKER ------------------------------------------------------------

/// Slow per-channel baseline, subtracted from neural channels.
///
/// While enabled the tracker cycles forever: for the first four seconds of a
/// cycle it only subtracts the committed level; during the fifth it also
/// accumulates `(sum, count)`; at the end of the cycle `level = sum / count`
/// is committed and the accumulators restart. Channels that saw no samples
/// commit a level of zero.
#[derive(Debug, Clone)]
pub struct DCLevelTracker {
    enabled: bool,
    sum: Vec<i64>,
    count: Vec<u64>,
    level: Vec<i32>,
    clock: Option<f64>,
}

impl DCLevelTracker {
    pub fn new(n_channels: usize) -> Self {
        Self {
            enabled: false,
            sum: vec![0; n_channels],
            count: vec![0; n_channels],
            level: vec![0; n_channels],
            clock: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn levels(&self) -> &[i32] {
        &self.level
    }

    pub fn channel_count(&self) -> usize {
        self.level.len()
    }

    pub fn set_enabled(&mut self, on: bool) {
        if on != self.enabled {
            log::debug!("dc tracking {}", if on { "on" } else { "off" });
        }
        self.enabled = on;
        self.reset();
    }

    /// Drops levels and accumulators; the next update restarts the cycle.
    pub fn reset(&mut self) {
        self.sum.iter_mut().for_each(|s| *s = 0);
        self.count.iter_mut().for_each(|c| *c = 0);
        self.level.iter_mut().for_each(|l| *l = 0);
        self.clock = None;
    }

    /// Advances the cycle to `now` (seconds) and accumulates the block if
    /// inside the window. Tracked channels start at `c0`.
    pub fn update_level(
        &mut self,
        block: &[i16],
        ntpts: usize,
        stride: usize,
        c0: usize,
        step: usize,
        now: f64,
    ) {
        if !self.enabled || self.level.is_empty() {
            return;
        }
        let n = self.level.len();
        assert!(
            c0 + n <= stride,
            "dc tracker for {} channels does not fit stride {} at {}",
            n,
            stride,
            c0
        );

        let clock = *self.clock.get_or_insert(now - DC_SETTLE_OFFSET_SECS);
        let elapsed = now - clock;

        if elapsed >= DC_CYCLE_SECS {
            for ((level, sum), count) in self.level.iter_mut().zip(&mut self.sum).zip(&mut self.count) {
                *level = if *count > 0 {
                    (*sum / *count as i64) as i32
                } else {
                    0
                };
                *sum = 0;
                *count = 0;
            }
            self.clock = Some(now);
            log::trace!("dc levels committed at {:.3}s", now);
        } else if elapsed >= DC_SETTLE_OFFSET_SECS {
            for row in block.chunks_exact(stride).take(ntpts).step_by(step.max(1)) {
                for ((sum, count), &v) in self
                    .sum
                    .iter_mut()
                    .zip(&mut self.count)
                    .zip(&row[c0..c0 + n])
                {
                    *sum += v as i64;
                    *count += 1;
                }
            }
        }
    }

    /// Subtracts the committed level from every `step`-th timepoint, in
    /// integer arithmetic.
    pub fn apply(&self, block: &mut [i16], ntpts: usize, stride: usize, c0: usize, step: usize) {
        if !self.enabled {
            return;
        }
        let n = self.level.len();
        assert!(
            c0 + n <= stride,
            "dc tracker for {} channels does not fit stride {} at {}",
            n,
            stride,
            c0
        );
        for row in block
            .chunks_exact_mut(stride)
            .take(ntpts)
            .step_by(step.max(1))
        {
            for (v, &level) in row[c0..c0 + n].iter_mut().zip(&self.level) {
                *v = (*v as i32 - level).clamp(i16::MIN as i32, i16::MAX as i32) as i16;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FS: f64 = 1000.0;
    const BLOCK: usize = 100;

    fn feed(
        dc: &mut DCLevelTracker,
        value: i16,
        nchans: usize,
        blocks: std::ops::Range<u64>,
    ) -> Vec<Vec<i16>> {
        let time = TimeSource::new(DcClock::Sample, FS);
        blocks
            .map(|b| {
                let mut block = vec![value; BLOCK * nchans];
                let now = time.now(b * BLOCK as u64);
                dc.update_level(&block, BLOCK, nchans, 0, 1, now);
                dc.apply(&mut block, BLOCK, nchans, 0, 1);
                block
            })
            .collect()
    }

    #[test]
    fn test_converges_to_constant_input() {
        let mut dc = DCLevelTracker::new(2);
        dc.set_enabled(true);

        // 7 seconds of 1000 Hz input
        let out = feed(&mut dc, 500, 2, 0..70);
        assert_eq!(dc.levels(), &[500, 500]);
        // first commit at t = 1 s (block 10)
        assert!(out[..10].iter().all(|b| b.iter().all(|&v| v == 500)));
        assert!(out[10..].iter().all(|b| b.iter().all(|&v| v == 0)));
    }

    #[test]
    fn test_window_is_last_second_of_cycle() {
        let mut dc = DCLevelTracker::new(1);
        dc.set_enabled(true);
        let time = TimeSource::new(DcClock::Sample, FS);

        // 0..1 s: settle window, value 100 -> committed at 1 s
        for b in 0..10u64 {
            let block = vec![100i16; BLOCK];
            dc.update_level(&block, BLOCK, 1, 0, 1, time.now(b * BLOCK as u64));
        }
        // 1..5 s: outside the window, value 9000 must be ignored
        for b in 10..50u64 {
            let block = vec![9000i16; BLOCK];
            dc.update_level(&block, BLOCK, 1, 0, 1, time.now(b * BLOCK as u64));
        }
        assert_eq!(dc.levels(), &[100]);
        // 5..6 s: window, value 300
        for b in 50..60u64 {
            let block = vec![300i16; BLOCK];
            dc.update_level(&block, BLOCK, 1, 0, 1, time.now(b * BLOCK as u64));
        }
        dc.update_level(&[0i16; BLOCK], BLOCK, 1, 0, 1, time.now(60 * BLOCK as u64));
        assert_eq!(dc.levels(), &[300]);
    }

    #[test]
    fn test_wall_clock_commits_after_one_real_second() {
        let mut dc = DCLevelTracker::new(1);
        dc.set_enabled(true);
        let time = TimeSource::new(DcClock::Wall, FS);
        // stream position has no bearing on wall time
        assert!(time.now(10_000_000) < 1.0);

        let block = vec![120i16; BLOCK];
        dc.update_level(&block, BLOCK, 1, 0, 1, time.now(0));
        assert_eq!(dc.levels(), &[0]);

        std::thread::sleep(std::time::Duration::from_millis(1100));
        dc.update_level(&[0i16; BLOCK], BLOCK, 1, 0, 1, time.now(0));
        assert_eq!(dc.levels(), &[120]);
    }

    #[test]
    fn test_disabled_tracker_subtracts_nothing() {
        let mut dc = DCLevelTracker::new(1);
        dc.set_enabled(true);
        feed(&mut dc, 250, 1, 0..20);
        assert_eq!(dc.levels(), &[250]);

        dc.set_enabled(false);
        assert_eq!(dc.levels(), &[0]);
        let out = feed(&mut dc, 250, 1, 20..30);
        assert!(out.iter().all(|b| b.iter().all(|&v| v == 250)));
    }

    #[test]
    fn test_empty_window_commits_zero() {
        let mut dc = DCLevelTracker::new(1);
        dc.set_enabled(true);
        // one update inside the window with no rows, then the commit
        dc.update_level(&[], 0, 1, 0, 1, 0.0);
        dc.update_level(&[], 0, 1, 0, 1, 1.0);
        assert_eq!(dc.levels(), &[0]);
    }

    #[test]
    fn test_offset_channels_and_aux_untouched() {
        // tracked channels are 1..3 of a 4-wide stride
        let mut dc = DCLevelTracker::new(2);
        dc.set_enabled(true);
        let time = TimeSource::new(DcClock::Sample, FS);
        let row = [7i16, 40, -60, 9];
        for b in 0..11u64 {
            let mut block: Vec<i16> = row.iter().copied().cycle().take(BLOCK * 4).collect();
            dc.update_level(&block, BLOCK, 4, 1, 1, time.now(b * BLOCK as u64));
            dc.apply(&mut block, BLOCK, 4, 1, 1);
            if b == 10 {
                assert_eq!(&block[..4], &[7, 0, 0, 9]);
            }
        }
        assert_eq!(dc.levels(), &[40, -60]);
    }

    #[test]
    fn test_step_only_touches_retained_timepoints() {
        let mut dc = DCLevelTracker::new(1);
        dc.set_enabled(true);
        feed(&mut dc, 50, 1, 0..11);

        let mut block = vec![50i16; 6];
        dc.apply(&mut block, 6, 1, 0, 3);
        assert_eq!(block, vec![0, 50, 50, 0, 50, 50]);
    }
}
