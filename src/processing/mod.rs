pub mod dc_level;
pub mod downsample;
pub mod filters;
pub mod layout;
pub mod session;
pub mod signal_processor;
pub mod spatial;
pub mod statistics;

pub use downsample::{ChannelTrace, DisplayFrame, DisplaySettings, NeuralDecimation};
pub use layout::{ChannelKind, ChannelLayout, StreamKind};
pub use session::{FrameReady, Session};
pub use signal_processor::{SignalProcessor, SignalProcessorConfig};
