use super::dc_level::{DCLevelTracker, DcClock, TimeSource};
use super::downsample::{DisplayFrame, DisplaySettings, DownsamplePipeline};
use super::filters::biquad::SETTLE_SAMPLES;
use super::filters::{BandSelection, FilterBank, FilterPool};
use super::layout::{ChannelKind, ChannelLayout, MAX_INT_LIMIT};
use super::spatial::{ShankMap, SpatialMode, SpatialReferencer};
use super::statistics::ChannelStatistics;

// -----------------------------------------------------------------------------
// RUST CORE LOGIC
// -----------------------------------------------------------------------------

// CONFIG COMPONENT ------------------------------------------------------------

/// Everything needed to build a `SignalProcessor` for one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalProcessorConfig {
    pub layout: ChannelLayout,
    pub shank_map: ShankMap,
    pub band: BandSelection,
    pub dc_enabled: bool,
    pub dc_clock: DcClock,
    pub spatial: SpatialMode,
    pub display: DisplaySettings,
    pub threads: usize,
}

impl SignalProcessorConfig {
    /// All conditioning off, linear shank map, no decimation.
    pub fn new(layout: ChannelLayout) -> Self {
        Self {
            shank_map: ShankMap::linear(layout.neural),
            layout,
            band: BandSelection::Off,
            dc_enabled: false,
            dc_clock: DcClock::Sample,
            spatial: SpatialMode::Off,
            display: DisplaySettings::default(),
            threads: 1,
        }
    }
}

// SIGNAL PROCESSOR COMPONENT --------------------------------------------------

/// Per-block conditioning pipeline for one stream.
///
/// Blocks run in a fixed order: filter cascade, DC tracking, spatial
/// referencing, then decimation with statistics. The first three touch the
/// neural channels only. All state lives here and is only touched from the
/// thread calling `process_block`; share it through a `Session`.
pub struct SignalProcessor {
    layout: ChannelLayout,
    shank_map: ShankMap,
    bank: FilterBank,
    pool: FilterPool,
    dc: DCLevelTracker,
    dc_clock: DcClock,
    time: TimeSource,
    spatial: SpatialReferencer,
    downsample: DownsamplePipeline,
    statistics: ChannelStatistics,
    frame: DisplayFrame,
    blocks: u64,
}

impl SignalProcessor {
    pub fn new(config: SignalProcessorConfig) -> Self {
        let SignalProcessorConfig {
            layout,
            shank_map,
            band,
            dc_enabled,
            dc_clock,
            spatial,
            display,
            threads,
        } = config;

        assert!(
            (1..=MAX_INT_LIMIT).contains(&layout.max_int),
            "max_int {} outside 1..={}",
            layout.max_int,
            MAX_INT_LIMIT
        );
        check_shank_map(&layout, &shank_map);
        check_capabilities(&layout, &band, dc_enabled, spatial);

        let n_chans = layout.channel_count();
        let mut dc = DCLevelTracker::new(layout.neural);
        dc.set_enabled(dc_enabled);

        let mut frame = DisplayFrame::default();
        frame.resize(n_chans);

        log::info!(
            "signal processor: {:?} stream, {} neural + {} analog + {} digital channels at {} Hz",
            layout.kind,
            layout.neural,
            layout.analog,
            layout.digital,
            layout.sample_rate
        );

        Self {
            bank: FilterBank::new(&band, layout.sample_rate, layout.neural),
            pool: FilterPool::new(threads),
            dc,
            dc_clock,
            time: TimeSource::new(dc_clock, layout.sample_rate),
            spatial: SpatialReferencer::new(spatial, &shank_map),
            downsample: display.into(),
            statistics: ChannelStatistics::new(n_chans),
            frame,
            blocks: 0,
            layout,
            shank_map,
        }
    }

    pub fn layout(&self) -> &ChannelLayout {
        &self.layout
    }

    pub fn shank_map(&self) -> &ShankMap {
        &self.shank_map
    }

    pub fn band(&self) -> &BandSelection {
        self.bank.selection()
    }

    pub fn spatial_mode(&self) -> SpatialMode {
        self.spatial.mode()
    }

    pub fn dc_enabled(&self) -> bool {
        self.dc.is_enabled()
    }

    pub fn dc_levels(&self) -> &[i32] {
        self.dc.levels()
    }

    pub fn display(&self) -> DisplaySettings {
        self.downsample.settings()
    }

    pub fn threads(&self) -> usize {
        self.pool.threads()
    }

    /// Output of the most recent block.
    pub fn frame(&self) -> &DisplayFrame {
        &self.frame
    }

    pub fn blocks_processed(&self) -> u64 {
        self.blocks
    }

    /// Current settings as a config, e.g. to rebuild after a layout change.
    pub fn config(&self) -> SignalProcessorConfig {
        SignalProcessorConfig {
            layout: self.layout.clone(),
            shank_map: self.shank_map.clone(),
            band: self.bank.selection().clone(),
            dc_enabled: self.dc.is_enabled(),
            dc_clock: self.dc_clock,
            spatial: self.spatial.mode(),
            display: self.downsample.settings(),
            threads: self.pool.threads(),
        }
    }

    // RECONFIGURATION ---------------------------------------------------------

    /// Rebuilds the filter cascade; all filter state starts from zero.
    pub fn set_band(&mut self, band: &BandSelection) {
        check_capabilities(&self.layout, band, self.dc.is_enabled(), self.spatial.mode());
        self.bank = FilterBank::new(band, self.layout.sample_rate, self.layout.neural);
        // DC tracking may switch between skipped and active
        self.dc.reset();
        log::info!("filter band set to {:?}", band);
    }

    pub fn set_spatial(&mut self, mode: SpatialMode) {
        check_capabilities(&self.layout, self.bank.selection(), self.dc.is_enabled(), mode);
        self.spatial = SpatialReferencer::new(mode, &self.shank_map);
        log::info!("spatial referencing set to {:?}", mode);
    }

    /// Replaces the site map and rebuilds any neighbor table from it.
    pub fn set_shank_map(&mut self, map: ShankMap) {
        check_shank_map(&self.layout, &map);
        self.spatial = SpatialReferencer::new(self.spatial.mode(), &map);
        self.shank_map = map;
        log::info!(
            "shank map replaced: {} sites, {} used",
            self.shank_map.len(),
            self.shank_map.sites().iter().filter(|s| s.used).count()
        );
    }

    pub fn set_dc_enabled(&mut self, on: bool) {
        check_capabilities(&self.layout, self.bank.selection(), on, self.spatial.mode());
        self.dc.set_enabled(on);
    }

    /// Switches the DC time source. Levels are dropped and the next block
    /// restarts the cycle one window before its first commit.
    pub fn set_dc_clock(&mut self, clock: DcClock) {
        self.dc_clock = clock;
        self.time = TimeSource::new(clock, self.layout.sample_rate);
        self.dc.reset();
    }

    pub fn set_display(&mut self, display: DisplaySettings) {
        self.downsample = display.into();
    }

    /// Clears filter history and DC levels, keeping every setting. Use after
    /// a discontinuity in the input stream.
    pub fn erase(&mut self) {
        self.bank.reset();
        self.dc.reset();
        log::debug!(
            "filter and dc state erased, output settles after ~{} samples",
            SETTLE_SAMPLES
        );
    }

    // BLOCK PROCESSING --------------------------------------------------------

    /// Conditions one interleaved block in place and rebuilds the display
    /// frame from it. `first_sample_index` is the stream index of the first
    /// timepoint in the block.
    pub fn process_block(&mut self, block: &mut [i16], first_sample_index: u64) -> &DisplayFrame {
        let n_chans = self.layout.channel_count();
        let ntpts = self.layout.timepoints(block.len());
        let neural = self.layout.neural;
        let step = self.downsample.neural_step();

        assert_eq!(
            self.spatial.channel_count(),
            neural,
            "spatial referencer built for {} channels, layout has {} neural",
            self.spatial.channel_count(),
            neural
        );

        // 1. filter cascade
        if neural > 0 {
            for stage in self.bank.stages_mut() {
                self.pool
                    .apply(stage, block, self.layout.max_int, ntpts, n_chans, 0, neural);
            }
        }

        // 2. DC level, unless a stage already removes it
        if self.dc.is_enabled() && !self.bank.removes_dc() {
            let now = self.time.now(first_sample_index);
            self.dc.update_level(block, ntpts, n_chans, 0, step, now);
            self.dc.apply(block, ntpts, n_chans, 0, step);
        }

        // 3. spatial referencing
        self.spatial.apply(block, ntpts, n_chans, step);

        // 4. decimation and statistics
        self.statistics.begin_block(n_chans);
        self.frame.resize(n_chans);
        for (ch, trace) in self.frame.channels.iter_mut().enumerate() {
            let kind = self.layout.kind_of(ch);
            let connected = kind != ChannelKind::Neural || self.shank_map.is_used(ch);
            if connected {
                let stat_step = if kind == ChannelKind::Neural { step } else { 1 };
                self.statistics
                    .accumulate(block, ntpts, n_chans, ch, stat_step);
            }
            self.downsample.decimate_channel(
                block,
                ntpts,
                n_chans,
                ch,
                &self.layout,
                connected,
                trace,
            );
            trace.stats = *self.statistics.get(ch);
        }

        self.frame.sequence = self.blocks;
        self.frame.first_sample_index = first_sample_index;
        self.frame.downsample_factor = self.downsample.factor();
        self.blocks += 1;

        log::trace!(
            "block {} processed: {} timepoints from sample {}",
            self.frame.sequence,
            ntpts,
            first_sample_index
        );
        &self.frame
    }
}

fn check_shank_map(layout: &ChannelLayout, map: &ShankMap) {
    assert_eq!(
        map.len(),
        layout.neural,
        "shank map has {} sites, layout has {} neural channels",
        map.len(),
        layout.neural
    );
}

/// Describes the first requested step `layout` cannot run, if any.
pub fn unsupported_step(
    layout: &ChannelLayout,
    band: &BandSelection,
    dc_enabled: bool,
    spatial: SpatialMode,
) -> Option<String> {
    let caps = layout.capabilities();
    if *band != BandSelection::Off && !caps.filtering {
        return Some(format!(
            "{:?} stream has no neural channels to filter",
            layout.kind
        ));
    }
    if dc_enabled && !caps.dc_tracking {
        return Some(format!(
            "{:?} stream has no neural channels for dc tracking",
            layout.kind
        ));
    }
    if spatial != SpatialMode::Off && !caps.spatial {
        return Some(format!(
            "{:?} stream with {} neural channels does not support spatial referencing",
            layout.kind, layout.neural
        ));
    }
    if let SpatialMode::GlobalStrided { stride } = spatial {
        if !caps.strided_global {
            return Some(format!(
                "{:?} stream with {} mux groups does not support strided averaging",
                layout.kind, layout.mux_groups
            ));
        }
        if stride != layout.mux_groups {
            return Some(format!(
                "strided average stride {} does not match {} mux groups",
                stride, layout.mux_groups
            ));
        }
    }
    None
}

fn check_capabilities(
    layout: &ChannelLayout,
    band: &BandSelection,
    dc_enabled: bool,
    spatial: SpatialMode,
) {
    if let Some(msg) = unsupported_step(layout, band, dc_enabled, spatial) {
        panic!("{}", msg);
    }
}
