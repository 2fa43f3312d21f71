use serde::Serialize;
use std::error::Error;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;
use std::time::Instant;

use crate::config::Config;
use crate::processing::downsample::DisplayFrame;
use crate::processing::session::Session;

/// Timepoints fed to the pipeline per block.
pub const BLOCK_TIMEPOINTS: usize = 1000;

/// One decimated point of one channel.
#[derive(Debug, Serialize)]
struct OutputRow {
    sample_index: u64,
    channel: usize,
    primary: f32,
    secondary: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcessSummary {
    pub blocks: u64,
    pub timepoints: u64,
}

// -----------------------------------------------------------------------------
// RUN CODE
// -----------------------------------------------------------------------------

pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(
    config: &Config,
    input: P,
    output: Q,
) -> Result<ProcessSummary, Box<dyn Error>> {
    let session = Session::new(config.processor_config()?);
    let start = Instant::now();

    let summary = process_csv(
        &session,
        File::open(input.as_ref())?,
        File::create(output.as_ref())?,
        BLOCK_TIMEPOINTS,
    )?;
    session.stop();

    log::info!(
        "processed {} timepoints in {} blocks from {:?} in {:?}",
        summary.timepoints,
        summary.blocks,
        input.as_ref(),
        start.elapsed()
    );
    Ok(summary)
}

/// Streams an interleaved CSV (header row, then one row per timepoint with
/// one integer column per channel) through `session` in blocks of
/// `block_timepoints`, writing every decimated point to `writer`. A short
/// final block is processed as is.
pub fn process_csv<R: Read, W: Write>(
    session: &Session,
    reader: R,
    writer: W,
    block_timepoints: usize,
) -> Result<ProcessSummary, Box<dyn Error>> {
    let n_chans = session.config().layout.channel_count();
    let mut rdr = csv::Reader::from_reader(reader);
    let mut wtr = csv::Writer::from_writer(writer);

    let mut block: Vec<i16> = Vec::with_capacity(block_timepoints * n_chans);
    let mut frame = DisplayFrame::default();
    let mut summary = ProcessSummary::default();

    for (line, result) in rdr.records().enumerate() {
        let record = result?;
        if record.len() != n_chans {
            return Err(format!(
                "row {} has {} columns, expected {}",
                line + 1,
                record.len(),
                n_chans
            )
            .into());
        }
        for value in record.iter() {
            block.push(value.trim().parse()?);
        }

        if block.len() == block_timepoints * n_chans {
            flush_block(session, n_chans, &mut block, &mut frame, &mut summary, &mut wtr)?;
        }
    }
    if !block.is_empty() {
        flush_block(session, n_chans, &mut block, &mut frame, &mut summary, &mut wtr)?;
    }

    wtr.flush()?;
    Ok(summary)
}

fn flush_block<W: Write>(
    session: &Session,
    n_chans: usize,
    block: &mut Vec<i16>,
    frame: &mut DisplayFrame,
    summary: &mut ProcessSummary,
    wtr: &mut csv::Writer<W>,
) -> Result<(), Box<dyn Error>> {
    let ntpts = (block.len() / n_chans) as u64;

    if session.process_block(block, summary.timepoints).is_none() {
        return Err("session stopped".into());
    }
    session.snapshot_into(frame);

    let factor = frame.downsample_factor as u64;
    for (channel, trace) in frame.channels.iter().enumerate() {
        for (i, &primary) in trace.primary.iter().enumerate() {
            wtr.serialize(OutputRow {
                sample_index: frame.first_sample_index + i as u64 * factor,
                channel,
                primary,
                secondary: if trace.draw_bin_max {
                    trace.secondary.get(i).copied()
                } else {
                    None
                },
            })?;
        }
    }

    summary.blocks += 1;
    summary.timepoints += ntpts;
    block.clear();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::layout::ChannelLayout;
    use crate::processing::signal_processor::SignalProcessorConfig;

    fn session() -> Session {
        let mut config = SignalProcessorConfig::new(ChannelLayout::generic(2, 0, 0, 32768, 1000.0));
        config.display.downsample_factor = 2;
        Session::new(config)
    }

    #[test]
    fn test_blocks_and_remainder() {
        let input = "a,b\n1,2\n3,4\n5,6\n7,8\n9,10\n";
        let mut out = Vec::new();
        let summary = process_csv(&session(), input.as_bytes(), &mut out, 2).unwrap();
        assert_eq!(
            summary,
            ProcessSummary {
                blocks: 3,
                timepoints: 5
            }
        );

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample_index,channel,primary,secondary");
        // 3 blocks x 2 channels x 1 point
        assert_eq!(lines.len(), 1 + 6);
        assert!(lines.last().unwrap().starts_with("4,1,"));
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        let input = "a,b\n1,2\n3\n";
        let mut out = Vec::new();
        let err = process_csv(&session(), input.as_bytes(), &mut out, 4).unwrap_err();
        assert!(!err.to_string().is_empty());
    }

    #[test]
    fn test_non_integer_sample_is_an_error() {
        let input = "a,b\n1,2.5\n";
        let mut out = Vec::new();
        assert!(process_csv(&session(), input.as_bytes(), &mut out, 4).is_err());
    }
}
