//! YAML configuration files on disk

use spike_conditioning::config::{load_config, save_config, Config, ConfigError, ShankMapConfig};
use spike_conditioning::processing::filters::{BandSelection, FilterType, StageConfig};
use spike_conditioning::processing::layout::ChannelLayout;
use spike_conditioning::processing::spatial::{ShankMap, SpatialMode};
use spike_conditioning::processing::SignalProcessor;
use std::fs;

fn full_config() -> Config {
    let mut config = Config::default();
    config.processor.verbose = true;
    config.processor.log_file = Some("run.log".into());
    config.layout = ChannelLayout::imec_ap(8, 512, 30000.0);
    config.filters.band = BandSelection::Custom {
        stages: vec![
            StageConfig {
                filter_type: FilterType::Highpass,
                cutoff_hz: 300.0,
                q: 0.0,
                gain_db: 0.0,
            },
            StageConfig {
                filter_type: FilterType::Notch,
                cutoff_hz: 50.0,
                q: 8.0,
                gain_db: 0.0,
            },
        ],
    };
    config.dc.enabled = true;
    config.spatial = SpatialMode::local_near();
    config.display.downsample_factor = 30;
    config.display.bin_max = true;
    config.workers.threads = 2;
    let mut map = ShankMap::grid(2, 2, 2, 8);
    map.set_used(5, false);
    config.shank_map = Some((&map).into());
    config
}

#[test]
fn test_save_then_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");

    let config = full_config();
    save_config(&config, &path).unwrap();
    let loaded = load_config(&path).unwrap();
    assert_eq!(loaded, config);

    let pc = loaded.processor_config().unwrap();
    assert!(!pc.shank_map.is_used(5));
    let sp = SignalProcessor::new(pc);
    assert_eq!(sp.threads(), 2);
}

#[test]
fn test_default_config_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("default.yaml");
    save_config(&Config::default(), &path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(!text.contains("shank_map"));
    assert_eq!(load_config(&path).unwrap(), Config::default());
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.yaml");
    fs::write(
        &path,
        "layout: { kind: generic, neural: 4, max_int: 32768, sample_rate: 1000.0 }\n\
         filters: { band: { type: highpass, cutoff_hz: 600.0 } }\n",
    )
    .unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::Invalid(_))));
}

#[test]
fn test_malformed_yaml_is_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "spatial: { mode: sideways }\n").unwrap();
    assert!(matches!(load_config(&path), Err(ConfigError::Parse(_))));
}

#[test]
fn test_site_outside_map_is_invalid() {
    let mut config = Config::default();
    config.layout = ChannelLayout::generic(1, 0, 0, 32768, 30000.0);
    config.shank_map = Some(ShankMapConfig {
        shanks: 1,
        cols: 1,
        rows: 1,
        sites: vec![spike_conditioning::processing::spatial::SiteDesc::new(0, 0, 3, true)],
    });
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("outside"));
}
