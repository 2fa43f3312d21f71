// src/config/mod.rs
use crate::processing::dc_level::DcClock;
use crate::processing::downsample::DisplaySettings;
use crate::processing::filters::bank::MAX_STAGES;
use crate::processing::filters::BandSelection;
use crate::processing::layout::{ChannelLayout, MAX_INT_LIMIT};
use crate::processing::signal_processor::{unsupported_step, SignalProcessorConfig};
use crate::processing::spatial::{ShankMap, SiteDesc, SpatialMode};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read or write config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("failed to serialize config: {0}")]
    Serialize(serde_yaml::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Every section has a default, so an empty document configures a single
/// generic channel with all conditioning off.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub processor: ProcessorConfig,
    pub layout: ChannelLayout,
    pub filters: FiltersConfig,
    pub dc: DcConfig,
    pub spatial: SpatialMode,
    pub display: DisplaySettings,
    pub workers: WorkersConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shank_map: Option<ShankMapConfig>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct ProcessorConfig {
    pub verbose: bool,
    pub log_file: Option<String>,
    pub log_level: String,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            verbose: false,
            log_file: None,
            log_level: "info".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(default)]
pub struct FiltersConfig {
    pub band: BandSelection,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
#[serde(default)]
pub struct DcConfig {
    pub enabled: bool,
    pub clock: DcClock,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct WorkersConfig {
    pub threads: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        Self { threads: 1 }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShankMapConfig {
    pub shanks: u16,
    pub cols: u16,
    pub rows: u16,
    pub sites: Vec<SiteDesc>,
}

impl From<&ShankMap> for ShankMapConfig {
    fn from(map: &ShankMap) -> Self {
        Self {
            shanks: map.shanks(),
            cols: map.cols(),
            rows: map.rows(),
            sites: map.sites().to_vec(),
        }
    }
}

fn invalid(msg: String) -> ConfigError {
    ConfigError::Invalid(msg)
}

impl Config {
    /// Cross-field checks that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.layout;
        if layout.channel_count() == 0 {
            return Err(invalid("layout has no channels".into()));
        }
        if !(1..=MAX_INT_LIMIT).contains(&layout.max_int) {
            return Err(invalid(format!(
                "max_int must be in 1..={}, got {}",
                MAX_INT_LIMIT, layout.max_int
            )));
        }
        if !(layout.sample_rate > 0.0) {
            return Err(invalid(format!(
                "sample_rate must be positive, got {}",
                layout.sample_rate
            )));
        }

        let band = &self.filters.band;
        let n_stages = band.stages(layout.sample_rate).len();
        if n_stages > MAX_STAGES {
            return Err(invalid(format!(
                "filter band has {} stages, at most {} supported",
                n_stages, MAX_STAGES
            )));
        }
        let nyquist = layout.sample_rate / 2.0;
        for cutoff in band.cutoffs() {
            if !(cutoff > 0.0 && cutoff < nyquist) {
                return Err(invalid(format!(
                    "cutoff {} Hz outside (0, {}) Hz",
                    cutoff, nyquist
                )));
            }
        }
        if let BandSelection::Bandpass { low_hz, high_hz } = band {
            if low_hz >= high_hz {
                return Err(invalid(format!(
                    "bandpass low edge {} Hz is not below high edge {} Hz",
                    low_hz, high_hz
                )));
            }
        }

        match self.spatial {
            SpatialMode::Local {
                inner_radius,
                outer_radius,
            } if inner_radius >= outer_radius => {
                return Err(invalid(format!(
                    "local average inner radius {} must be below outer radius {}",
                    inner_radius, outer_radius
                )));
            }
            SpatialMode::GlobalStrided { stride: 0 } => {
                return Err(invalid("strided global average needs stride >= 1".into()));
            }
            _ => {}
        }
        if let Some(msg) = unsupported_step(layout, band, self.dc.enabled, self.spatial) {
            return Err(invalid(msg));
        }

        if self.display.downsample_factor == 0 {
            return Err(invalid("downsample_factor must be >= 1".into()));
        }
        if self.workers.threads == 0 {
            return Err(invalid("workers.threads must be >= 1".into()));
        }

        if let Some(map) = &self.shank_map {
            if map.sites.len() != layout.neural {
                return Err(invalid(format!(
                    "shank map has {} sites, layout has {} neural channels",
                    map.sites.len(),
                    layout.neural
                )));
            }
            if let Some((ic, s)) = map
                .sites
                .iter()
                .enumerate()
                .find(|(_, s)| s.shank >= map.shanks || s.col >= map.cols || s.row >= map.rows)
            {
                return Err(invalid(format!(
                    "site {:?} of channel {} outside {}x{}x{} map",
                    s, ic, map.shanks, map.cols, map.rows
                )));
            }
        }
        Ok(())
    }

    /// Explicit map if configured, else a linear two-column map.
    pub fn build_shank_map(&self) -> ShankMap {
        match &self.shank_map {
            Some(m) => ShankMap::new(m.shanks, m.cols, m.rows, m.sites.clone()),
            None => ShankMap::linear(self.layout.neural),
        }
    }

    /// Validates, then converts to processor settings.
    pub fn processor_config(&self) -> Result<SignalProcessorConfig, ConfigError> {
        self.validate()?;
        Ok(SignalProcessorConfig {
            layout: self.layout.clone(),
            shank_map: self.build_shank_map(),
            band: self.filters.band.clone(),
            dc_enabled: self.dc.enabled,
            dc_clock: self.dc.clock,
            spatial: self.spatial,
            display: self.display,
            threads: self.workers.threads,
        })
    }
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let config_str = fs::read_to_string(path)?;
    let config: Config = serde_yaml::from_str(&config_str)?;
    config.validate()?;
    Ok(config)
}

pub fn save_config<P: AsRef<Path>>(config: &Config, path: P) -> Result<(), ConfigError> {
    let yaml = serde_yaml::to_string(config).map_err(ConfigError::Serialize)?;
    fs::write(path, yaml)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::downsample::NeuralDecimation;
    use crate::processing::layout::StreamKind;

    #[test]
    fn test_empty_document_is_all_defaults() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config, Config::default());
        config.validate().unwrap();
        assert_eq!(config.workers.threads, 1);
        assert_eq!(config.processor.log_level, "info");
    }

    #[test]
    fn test_parses_tagged_sections() {
        let yaml = r#"
layout:
  kind: nidq
  neural: 32
  analog: 2
  digital: 1
  max_int: 32768
  sample_rate: 25000.0
  mux_groups: 8
filters:
  band:
    type: bandpass
    low_hz: 300.0
    high_hz: 6000.0
dc:
  enabled: true
  clock: wall
spatial:
  mode: global_strided
  stride: 8
display:
  downsample_factor: 25
  bin_max: true
  neural_mode: pick_nth
workers:
  threads: 4
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();
        assert_eq!(config.layout.kind, StreamKind::Nidq);
        assert_eq!(
            config.filters.band,
            BandSelection::Bandpass {
                low_hz: 300.0,
                high_hz: 6000.0
            }
        );
        assert_eq!(config.dc.clock, DcClock::Wall);
        assert_eq!(config.spatial, SpatialMode::GlobalStrided { stride: 8 });
        assert_eq!(config.display.neural_mode, NeuralDecimation::PickNth);

        let pc = config.processor_config().unwrap();
        assert_eq!(pc.shank_map.len(), 32);
        assert_eq!(pc.threads, 4);
    }

    #[test]
    fn test_rejects_cutoff_above_nyquist() {
        let mut config = Config::default();
        config.layout.sample_rate = 2500.0;
        config.filters.band = BandSelection::Lowpass { cutoff_hz: 1300.0 };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_rejects_inverted_radii() {
        let mut config = Config::default();
        config.spatial = SpatialMode::Local {
            inner_radius: 3,
            outer_radius: 3,
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("inner radius"));
    }

    #[test]
    fn test_rejects_strided_on_plain_stream() {
        let mut config = Config::default();
        config.layout = ChannelLayout::generic(8, 0, 0, 32768, 30000.0);
        config.spatial = SpatialMode::GlobalStrided { stride: 2 };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_stride_other_than_mux_groups() {
        let mut config = Config::default();
        config.layout = ChannelLayout::nidq(16, 0, 1, 32768, 25000.0, 2);
        config.spatial = SpatialMode::GlobalStrided { stride: 8 };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not match 2 mux groups"));

        config.spatial = SpatialMode::GlobalStrided { stride: 2 };
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_steps_the_stream_cannot_run() {
        let mut config = Config::default();
        config.spatial = SpatialMode::Global;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("spatial referencing"));

        config.spatial = SpatialMode::Off;
        config.layout = ChannelLayout::nidq(0, 2, 1, 32768, 25000.0, 1);
        config.validate().unwrap();
        config.dc.enabled = true;
        assert!(config.validate().unwrap_err().to_string().contains("dc tracking"));
        config.dc.enabled = false;
        config.filters.band = BandSelection::Highpass { cutoff_hz: 300.0 };
        assert!(config.validate().unwrap_err().to_string().contains("to filter"));
    }

    #[test]
    fn test_rejects_max_int_outside_i16_range() {
        let mut config = Config::default();
        config.layout.max_int = 32769;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
        config.layout.max_int = 0;
        assert!(config.validate().is_err());
        config.layout.max_int = 32768;
        config.validate().unwrap();
    }

    #[test]
    fn test_rejects_shank_map_size_mismatch() {
        let mut config = Config::default();
        config.layout = ChannelLayout::generic(4, 0, 0, 32768, 30000.0);
        config.shank_map = Some((&ShankMap::linear(3)).into());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("3 sites"));
    }

    #[test]
    fn test_site_defaults_to_used() {
        let yaml = r#"
layout: { kind: generic, neural: 2, max_int: 512, sample_rate: 2500.0 }
shank_map:
  shanks: 1
  cols: 1
  rows: 2
  sites:
    - { shank: 0, col: 0, row: 0 }
    - { shank: 0, col: 0, row: 1, used: false }
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let map = config.build_shank_map();
        assert!(map.is_used(0));
        assert!(!map.is_used(1));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
