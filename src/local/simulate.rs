use colored::Colorize;
use rand::Rng;
use std::error::Error;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::processing::downsample::DisplayFrame;
use crate::processing::layout::{ChannelKind, ChannelLayout};
use crate::processing::session::Session;

// -----------------------------------------------------------------------------
// SETUP FOR THE SIMULATED SIGNALS
// -----------------------------------------------------------------------------

const BLOCK_SECONDS: f64 = 0.02;
const SLEEP_TIME: u64 = 5;

const NOISE_AMPLITUDE: i32 = 40;
const SPIKE_AMPLITUDE: f64 = 1800.0;
const SPIKE_SAMPLES: usize = 30;
// chance per channel per block
const SPIKE_CHANCE: f64 = 0.05;
const DRIFT_AMPLITUDE: f64 = 600.0;
const DRIFT_FREQ: f64 = 0.2;
const HUM_AMPLITUDE: f64 = 150.0;
const HUM_FREQ: f64 = 50.0;

/// Fills `block` with `ntpts` timepoints of synthetic data starting at stream
/// index `first`: slow drift, mains hum shared by every neural channel,
/// noise and occasional biphasic spikes. Analog channels carry a slow sine,
/// digital channels a toggling sync bit.
pub fn synth_block<R: Rng>(
    rng: &mut R,
    layout: &ChannelLayout,
    first: u64,
    ntpts: usize,
    block: &mut Vec<i16>,
) {
    let n_chans = layout.channel_count();
    let fs = layout.sample_rate;
    block.clear();
    block.reserve(ntpts * n_chans);

    for t in 0..ntpts {
        let time = (first + t as u64) as f64 / fs;
        let hum = HUM_AMPLITUDE * (2.0 * std::f64::consts::PI * HUM_FREQ * time).sin();
        for ch in 0..n_chans {
            let v = match layout.kind_of(ch) {
                ChannelKind::Neural => {
                    let drift = DRIFT_AMPLITUDE
                        * (2.0 * std::f64::consts::PI * DRIFT_FREQ * time + ch as f64).sin();
                    drift + hum + rng.gen_range(-NOISE_AMPLITUDE..NOISE_AMPLITUDE) as f64
                }
                ChannelKind::Analog => 8000.0 * (2.0 * std::f64::consts::PI * time).sin(),
                ChannelKind::Digital => ((first + t as u64) / (fs as u64).max(1) % 2) as f64,
            };
            block.push(v as i16);
        }
    }

    for ch in layout.neural_range() {
        if ntpts > SPIKE_SAMPLES && rng.gen_bool(SPIKE_CHANCE) {
            let at = rng.gen_range(0..ntpts - SPIKE_SAMPLES);
            for k in 0..SPIKE_SAMPLES {
                let phase = k as f64 / SPIKE_SAMPLES as f64;
                let shape = -(2.0 * std::f64::consts::PI * phase).sin() * (1.0 - phase);
                let i = (at + k) * n_chans + ch;
                block[i] = block[i].saturating_add((SPIKE_AMPLITUDE * shape) as i16);
            }
        }
    }
}

// -----------------------------------------------------------------------------
// RUN CODE
// -----------------------------------------------------------------------------

/// Runs `n_blocks` synthetic blocks on an acquisition thread while this
/// thread renders frame summaries as they are published. Returns the number
/// of frames rendered.
pub fn run(config: &Config, n_blocks: u64) -> Result<u64, Box<dyn Error>> {
    let session = Arc::new(Session::new(config.processor_config()?));
    let layout = config.layout.clone();
    let ntpts = ((layout.sample_rate * BLOCK_SECONDS) as usize).max(1);
    let ready = session.subscribe();

    let acquisition = {
        let session = Arc::clone(&session);
        thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || {
                let mut rng = rand::thread_rng();
                let mut block = Vec::new();
                for b in 0..n_blocks {
                    let first = b * ntpts as u64;
                    synth_block(&mut rng, &layout, first, ntpts, &mut block);
                    if session.process_block(&mut block, first).is_none() {
                        break;
                    }
                    thread::sleep(Duration::from_millis(SLEEP_TIME));
                }
                session.stop();
            })?
    };

    let mut frame = DisplayFrame::default();
    let mut rendered = 0;
    while ready.recv().is_ok() {
        session.snapshot_into(&mut frame);
        render(&frame, config.processor.verbose);
        rendered += 1;
    }

    if acquisition.join().is_err() {
        return Err("acquisition thread panicked".into());
    }
    log::info!("rendered {} of {} frames", rendered, n_blocks);
    Ok(rendered)
}

fn render(frame: &DisplayFrame, verbose: bool) {
    println!(
        "{}",
        format!(
            "frame {} @ sample {}",
            frame.sequence, frame.first_sample_index
        )
        .bold()
    );
    let shown = if verbose {
        frame.channels.len()
    } else {
        frame.channels.len().min(8)
    };
    for (ch, trace) in frame.channels.iter().take(shown).enumerate() {
        let peak = trace
            .primary
            .iter()
            .chain(trace.secondary.iter())
            .fold(0.0f32, |m, v| m.max(v.abs()));
        let bar = "|".repeat(((peak * 200.0) as usize).min(60));
        let line = format!(
            "  ch {:>3}  mean {:>9.1}  rms {:>8.1}  sd {:>8.1}  ",
            ch,
            trace.stats.mean(),
            trace.stats.rms(),
            trace.stats.std_dev()
        );
        if peak > 0.03 {
            println!("{}{}", line, bar.red());
        } else {
            println!("{}{}", line, bar.white());
        }
    }
}
