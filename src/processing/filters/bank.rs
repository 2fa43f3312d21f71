use super::biquad::{BiquadFilter, BiquadSpec, FilterType};
use serde::{Deserialize, Serialize};

/// Most stages a band selection may cascade.
pub const MAX_STAGES: usize = 2;

/// One stage of a custom cascade, in Hz.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StageConfig {
    pub filter_type: FilterType,
    pub cutoff_hz: f64,
    #[serde(default)]
    pub q: f64,
    #[serde(default)]
    pub gain_db: f64,
}

/// Display band requested by the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BandSelection {
    #[default]
    Off,
    Highpass {
        cutoff_hz: f64,
    },
    Lowpass {
        cutoff_hz: f64,
    },
    // highpass stage then lowpass stage
    Bandpass {
        low_hz: f64,
        high_hz: f64,
    },
    Custom {
        stages: Vec<StageConfig>,
    },
}

impl BandSelection {
    /// Action-potential band: 300 Hz highpass.
    pub fn ap_band() -> Self {
        BandSelection::Highpass { cutoff_hz: 300.0 }
    }

    /// Local-field band carved from a full-band stream.
    pub fn lf_band() -> Self {
        BandSelection::Bandpass {
            low_hz: 0.5,
            high_hz: 500.0,
        }
    }

    pub fn stages(&self, sample_rate: f64) -> Vec<BiquadSpec> {
        match self {
            BandSelection::Off => Vec::new(),
            BandSelection::Highpass { cutoff_hz } => vec![BiquadSpec::from_hz(
                FilterType::Highpass,
                *cutoff_hz,
                sample_rate,
            )],
            BandSelection::Lowpass { cutoff_hz } => vec![BiquadSpec::from_hz(
                FilterType::Lowpass,
                *cutoff_hz,
                sample_rate,
            )],
            BandSelection::Bandpass { low_hz, high_hz } => vec![
                BiquadSpec::from_hz(FilterType::Highpass, *low_hz, sample_rate),
                BiquadSpec::from_hz(FilterType::Lowpass, *high_hz, sample_rate),
            ],
            BandSelection::Custom { stages } => stages
                .iter()
                .map(|s| {
                    BiquadSpec::from_hz(s.filter_type, s.cutoff_hz, sample_rate)
                        .with_q(s.q)
                        .with_gain_db(s.gain_db)
                })
                .collect(),
        }
    }

    /// Every cutoff in Hz, for Nyquist checks.
    pub fn cutoffs(&self) -> Vec<f64> {
        match self {
            BandSelection::Off => Vec::new(),
            BandSelection::Highpass { cutoff_hz } | BandSelection::Lowpass { cutoff_hz } => {
                vec![*cutoff_hz]
            }
            BandSelection::Bandpass { low_hz, high_hz } => vec![*low_hz, *high_hz],
            BandSelection::Custom { stages } => stages.iter().map(|s| s.cutoff_hz).collect(),
        }
    }
}

// FILTER BANK -----------------------------------------------------------------

/// The cascade built from a `BandSelection`, applied stage by stage.
#[derive(Debug, Clone)]
pub struct FilterBank {
    selection: BandSelection,
    stages: Vec<BiquadFilter>,
}

impl FilterBank {
    pub fn new(selection: &BandSelection, sample_rate: f64, n_channels: usize) -> Self {
        let specs = selection.stages(sample_rate);
        assert!(
            specs.len() <= MAX_STAGES,
            "band selection has {} stages, at most {} supported",
            specs.len(),
            MAX_STAGES
        );
        Self {
            selection: selection.clone(),
            stages: specs
                .into_iter()
                .map(|spec| BiquadFilter::new(spec, n_channels))
                .collect(),
        }
    }

    pub fn selection(&self) -> &BandSelection {
        &self.selection
    }

    pub fn is_active(&self) -> bool {
        !self.stages.is_empty()
    }

    /// True when some stage already takes out the DC component.
    pub fn removes_dc(&self) -> bool {
        self.stages.iter().any(|f| f.spec().filter_type.blocks_dc())
    }

    pub fn stages_mut(&mut self) -> &mut [BiquadFilter] {
        &mut self.stages
    }

    pub fn reset(&mut self) {
        self.stages.iter_mut().for_each(BiquadFilter::reset);
    }
}
