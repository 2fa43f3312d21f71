use serde::{Deserialize, Serialize};
use std::f64::consts::{PI, SQRT_2};

/// Q used when a spec leaves it at zero (Butterworth, maximally flat).
pub const DEFAULT_Q: f64 = std::f64::consts::FRAC_1_SQRT_2;

/// Samples a freshly reset filter needs before its output is trustworthy.
pub const SETTLE_SAMPLES: usize = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Lowpass,
    Highpass,
    Bandpass,
    Notch,
    Peak,
    LowShelf,
    HighShelf,
}

impl FilterType {
    // Types whose response is zero at DC
    pub fn blocks_dc(self) -> bool {
        matches!(self, FilterType::Highpass | FilterType::Bandpass)
    }
}

/// Design parameters for one second-order section. `fc` is normalized
/// (cutoff / sample rate).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BiquadSpec {
    pub filter_type: FilterType,
    pub fc: f64,
    #[serde(default)]
    pub q: f64,
    #[serde(default)]
    pub gain_db: f64,
}

impl BiquadSpec {
    pub fn new(filter_type: FilterType, fc: f64) -> Self {
        Self {
            filter_type,
            fc,
            q: DEFAULT_Q,
            gain_db: 0.0,
        }
    }

    pub fn from_hz(filter_type: FilterType, cutoff_hz: f64, sample_rate: f64) -> Self {
        Self::new(filter_type, cutoff_hz / sample_rate)
    }

    pub fn with_q(mut self, q: f64) -> Self {
        self.q = q;
        self
    }

    pub fn with_gain_db(mut self, gain_db: f64) -> Self {
        self.gain_db = gain_db;
        self
    }

    fn effective_q(&self) -> f64 {
        if self.q > 0.0 {
            self.q
        } else {
            DEFAULT_Q
        }
    }
}

/// Transposed direct-form II coefficients. `a*` feed the input forward,
/// `b*` feed the output back.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BiquadCoeffs {
    pub a0: f64,
    pub a1: f64,
    pub a2: f64,
    pub b1: f64,
    pub b2: f64,
}

impl BiquadCoeffs {
    pub fn design(spec: &BiquadSpec) -> Self {
        let q = spec.effective_q();
        let v = 10f64.powf(spec.gain_db.abs() / 20.0);
        let k = (PI * spec.fc).tan();
        let kk = k * k;
        let boost = spec.gain_db >= 0.0;

        match spec.filter_type {
            FilterType::Lowpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                let a0 = kk * norm;
                Self {
                    a0,
                    a1: 2.0 * a0,
                    a2: a0,
                    b1: 2.0 * (kk - 1.0) * norm,
                    b2: (1.0 - k / q + kk) * norm,
                }
            }
            FilterType::Highpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                Self {
                    a0: norm,
                    a1: -2.0 * norm,
                    a2: norm,
                    b1: 2.0 * (kk - 1.0) * norm,
                    b2: (1.0 - k / q + kk) * norm,
                }
            }
            FilterType::Bandpass => {
                let norm = 1.0 / (1.0 + k / q + kk);
                let a0 = k / q * norm;
                Self {
                    a0,
                    a1: 0.0,
                    a2: -a0,
                    b1: 2.0 * (kk - 1.0) * norm,
                    b2: (1.0 - k / q + kk) * norm,
                }
            }
            FilterType::Notch => {
                let norm = 1.0 / (1.0 + k / q + kk);
                let a0 = (1.0 + kk) * norm;
                let a1 = 2.0 * (kk - 1.0) * norm;
                Self {
                    a0,
                    a1,
                    a2: a0,
                    b1: a1,
                    b2: (1.0 - k / q + kk) * norm,
                }
            }
            FilterType::Peak => {
                if boost {
                    let norm = 1.0 / (1.0 + k / q + kk);
                    let a1 = 2.0 * (kk - 1.0) * norm;
                    Self {
                        a0: (1.0 + v / q * k + kk) * norm,
                        a1,
                        a2: (1.0 - v / q * k + kk) * norm,
                        b1: a1,
                        b2: (1.0 - k / q + kk) * norm,
                    }
                } else {
                    let norm = 1.0 / (1.0 + v / q * k + kk);
                    let a1 = 2.0 * (kk - 1.0) * norm;
                    Self {
                        a0: (1.0 + k / q + kk) * norm,
                        a1,
                        a2: (1.0 - k / q + kk) * norm,
                        b1: a1,
                        b2: (1.0 - v / q * k + kk) * norm,
                    }
                }
            }
            FilterType::LowShelf => {
                let sv = (2.0 * v).sqrt();
                if boost {
                    let norm = 1.0 / (1.0 + SQRT_2 * k + kk);
                    Self {
                        a0: (1.0 + sv * k + v * kk) * norm,
                        a1: 2.0 * (v * kk - 1.0) * norm,
                        a2: (1.0 - sv * k + v * kk) * norm,
                        b1: 2.0 * (kk - 1.0) * norm,
                        b2: (1.0 - SQRT_2 * k + kk) * norm,
                    }
                } else {
                    let norm = 1.0 / (1.0 + sv * k + v * kk);
                    Self {
                        a0: (1.0 + SQRT_2 * k + kk) * norm,
                        a1: 2.0 * (kk - 1.0) * norm,
                        a2: (1.0 - SQRT_2 * k + kk) * norm,
                        b1: 2.0 * (v * kk - 1.0) * norm,
                        b2: (1.0 - sv * k + v * kk) * norm,
                    }
                }
            }
            FilterType::HighShelf => {
                let sv = (2.0 * v).sqrt();
                if boost {
                    let norm = 1.0 / (1.0 + SQRT_2 * k + kk);
                    Self {
                        a0: (v + sv * k + kk) * norm,
                        a1: 2.0 * (kk - v) * norm,
                        a2: (v - sv * k + kk) * norm,
                        b1: 2.0 * (kk - 1.0) * norm,
                        b2: (1.0 - SQRT_2 * k + kk) * norm,
                    }
                } else {
                    let norm = 1.0 / (v + sv * k + kk);
                    Self {
                        a0: (1.0 + SQRT_2 * k + kk) * norm,
                        a1: 2.0 * (kk - 1.0) * norm,
                        a2: (1.0 - SQRT_2 * k + kk) * norm,
                        b1: 2.0 * (kk - v) * norm,
                        b2: (v - sv * k + kk) * norm,
                    }
                }
            }
        }
    }

    // One step of the recurrence for a single channel
    #[inline]
    pub fn step(&self, z: &mut [f64; 2], input: f64) -> f64 {
        let out = input * self.a0 + z[0];
        z[0] = input * self.a1 + z[1] - self.b1 * out;
        z[1] = input * self.a2 - self.b2 * out;
        out
    }

    /// Filters one raw integer sample, returning the clamped integer result.
    #[inline]
    pub fn step_raw(&self, z: &mut [f64; 2], raw: i16, max_int: i32) -> i16 {
        let scale = max_int as f64;
        let out = self.step(z, raw as f64 / scale);
        let v = (out * scale).round();
        v.clamp(-scale, scale - 1.0) as i16
    }
}

// BIQUAD FILTER ---------------------------------------------------------------

/// Second-order IIR section with one `(z1, z2)` register pair per channel.
///
/// State is indexed by absolute channel number, so independent channel
/// ranges of the same block may be processed in separate calls.
#[derive(Debug, Clone)]
pub struct BiquadFilter {
    spec: BiquadSpec,
    coeffs: BiquadCoeffs,
    state: Vec<[f64; 2]>,
}

impl BiquadFilter {
    pub fn new(spec: BiquadSpec, n_channels: usize) -> Self {
        Self {
            spec,
            coeffs: BiquadCoeffs::design(&spec),
            state: vec![[0.0; 2]; n_channels],
        }
    }

    pub fn spec(&self) -> &BiquadSpec {
        &self.spec
    }

    pub fn channel_count(&self) -> usize {
        self.state.len()
    }

    /// Redesigns the coefficients. Equivalent to starting a new filter.
    pub fn set_spec(&mut self, spec: BiquadSpec) {
        self.spec = spec;
        self.coeffs = BiquadCoeffs::design(&spec);
        self.reset();
    }

    pub fn reset(&mut self) {
        self.state.iter_mut().for_each(|z| *z = [0.0; 2]);
    }

    /// Filters channels `[c0, c_lim)` of an interleaved block in place.
    pub fn apply(
        &mut self,
        block: &mut [i16],
        max_int: i32,
        ntpts: usize,
        stride: usize,
        c0: usize,
        c_lim: usize,
    ) {
        check_range(block.len(), ntpts, stride, c0, c_lim, self.state.len());

        let coeffs = self.coeffs;
        let state = &mut self.state[c0..c_lim];
        for row in block.chunks_exact_mut(stride).take(ntpts) {
            for (z, sample) in state.iter_mut().zip(&mut row[c0..c_lim]) {
                *sample = coeffs.step_raw(z, *sample, max_int);
            }
        }
    }

    /// Splits the register bank for `[c0, c_lim)` so pieces can be handed to
    /// different workers.
    pub(crate) fn state_and_coeffs(
        &mut self,
        c0: usize,
        c_lim: usize,
    ) -> (BiquadCoeffs, &mut [[f64; 2]]) {
        (self.coeffs, &mut self.state[c0..c_lim])
    }
}

pub(crate) fn check_range(
    len: usize,
    ntpts: usize,
    stride: usize,
    c0: usize,
    c_lim: usize,
    n_state: usize,
) {
    assert!(c0 <= c_lim, "channel range [{}, {}) is reversed", c0, c_lim);
    assert!(
        c_lim <= stride,
        "channel limit {} exceeds stride {}",
        c_lim,
        stride
    );
    assert!(
        c_lim <= n_state,
        "filter sized for {} channels, asked for channel {}",
        n_state,
        c_lim
    );
    assert!(
        ntpts * stride <= len,
        "block of {} samples is shorter than {} x {}",
        len,
        ntpts,
        stride
    );
}
