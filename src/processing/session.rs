use super::dc_level::DcClock;
use super::downsample::{DisplayFrame, DisplaySettings};
use super::filters::BandSelection;
use super::signal_processor::{SignalProcessor, SignalProcessorConfig};
use super::spatial::{ShankMap, SpatialMode};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::Mutex;

/// Sent after a block's frame is published. Carries the frame sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReady {
    pub sequence: u64,
}

struct Shared {
    processor: SignalProcessor,
    running: bool,
}

// SESSION COMPONENT -----------------------------------------------------------

/// A `SignalProcessor` shared between the acquisition thread and renderers.
///
/// A single lock guards the processor, its filter and DC state, neighbor
/// table, and the display frame. Block processing, reconfiguration and frame
/// reads all take it, so a reconfiguration never lands mid-block and a
/// renderer never sees a half-written frame. Frame-ready notices go out after
/// the lock is released; a notice is dropped when the renderer already has
/// one pending.
pub struct Session {
    shared: Mutex<Shared>,
    notify: Mutex<Option<Sender<FrameReady>>>,
    ready: Receiver<FrameReady>,
}

impl Session {
    pub fn new(config: SignalProcessorConfig) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(1);
        Self {
            shared: Mutex::new(Shared {
                processor: SignalProcessor::new(config),
                running: true,
            }),
            notify: Mutex::new(Some(tx)),
            ready: rx,
        }
    }

    /// Receiver for frame-ready notices. Every clone shares one queue.
    pub fn subscribe(&self) -> Receiver<FrameReady> {
        self.ready.clone()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Processes one block to completion and publishes its frame. Returns the
    /// frame sequence, or `None` once the session is stopped.
    pub fn process_block(&self, block: &mut [i16], first_sample_index: u64) -> Option<u64> {
        let sequence = {
            let mut shared = self.shared.lock();
            if !shared.running {
                return None;
            }
            shared
                .processor
                .process_block(block, first_sample_index)
                .sequence
        };

        if let Some(tx) = self.notify.lock().as_ref() {
            if let Err(TrySendError::Full(_)) = tx.try_send(FrameReady { sequence }) {
                log::trace!("renderer behind, notice for frame {} dropped", sequence);
            }
        }
        Some(sequence)
    }

    /// Runs `f` on the latest frame while holding the lock.
    pub fn with_frame<R>(&self, f: impl FnOnce(&DisplayFrame) -> R) -> R {
        f(self.shared.lock().processor.frame())
    }

    pub fn snapshot(&self) -> DisplayFrame {
        self.with_frame(DisplayFrame::clone)
    }

    /// Copies the latest frame into `dst`, reusing its buffers.
    pub fn snapshot_into(&self, dst: &mut DisplayFrame) {
        self.with_frame(|frame| frame.copy_into(dst))
    }

    /// Runs `f` on the processor under the lock, for anything the
    /// dedicated setters below do not cover.
    pub fn with_processor<R>(&self, f: impl FnOnce(&mut SignalProcessor) -> R) -> R {
        f(&mut self.shared.lock().processor)
    }

    pub fn config(&self) -> SignalProcessorConfig {
        self.shared.lock().processor.config()
    }

    // RECONFIGURATION ---------------------------------------------------------

    pub fn set_band(&self, band: &BandSelection) {
        self.shared.lock().processor.set_band(band);
    }

    pub fn set_spatial(&self, mode: SpatialMode) {
        self.shared.lock().processor.set_spatial(mode);
    }

    pub fn set_shank_map(&self, map: ShankMap) {
        self.shared.lock().processor.set_shank_map(map);
    }

    pub fn set_dc_enabled(&self, on: bool) {
        self.shared.lock().processor.set_dc_enabled(on);
    }

    pub fn set_dc_clock(&self, clock: DcClock) {
        self.shared.lock().processor.set_dc_clock(clock);
    }

    pub fn set_display(&self, display: DisplaySettings) {
        self.shared.lock().processor.set_display(display);
    }

    /// Swaps in a processor built from `config`; the layout may change.
    pub fn reconfigure(&self, config: SignalProcessorConfig) {
        let processor = SignalProcessor::new(config);
        self.shared.lock().processor = processor;
    }

    pub fn erase(&self) {
        self.shared.lock().processor.erase();
    }

    /// Waits for any in-flight block, refuses further blocks and disconnects
    /// frame notifications.
    pub fn stop(&self) {
        let blocks = {
            let mut shared = self.shared.lock();
            shared.running = false;
            shared.processor.blocks_processed()
        };
        self.notify.lock().take();
        log::info!("session stopped after {} blocks", blocks);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.shared.get_mut().running {
            self.stop();
        }
    }
}
