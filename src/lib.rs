pub mod config;
pub mod local;
pub mod processing;
pub mod utils;

pub use config::{load_config, save_config, Config, ConfigError};
pub use processing::{
    ChannelLayout, DisplayFrame, Session, SignalProcessor, SignalProcessorConfig,
};
