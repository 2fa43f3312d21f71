//! Acquisition and renderer threads sharing one `Session`

mod helpers;

use spike_conditioning::processing::filters::BandSelection;
use spike_conditioning::processing::spatial::{ShankMap, SpatialMode};
use spike_conditioning::processing::{DisplayFrame, Session};
use std::sync::Arc;
use std::thread;

const BLOCKS: u64 = 300;

#[test]
fn test_reconfiguration_from_renderer_thread() {
    let session = Arc::new(Session::new(helpers::plain_config(8, 30000.0, 10)));
    let ready = session.subscribe();

    let acquisition = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            for b in 0..BLOCKS {
                let mut block = helpers::spike_block(600, 8, (b % 8) as usize, 300, 12000);
                session.process_block(&mut block, b * 600);
            }
            session.stop();
        })
    };

    let mut frame = DisplayFrame::default();
    let mut seen = 0u64;
    let mut last_sequence = None;
    while let Ok(notice) = ready.recv() {
        session.snapshot_into(&mut frame);
        // the published frame is never older than the notice
        assert!(frame.sequence >= notice.sequence);
        if let Some(prev) = last_sequence {
            assert!(frame.sequence >= prev);
        }
        last_sequence = Some(frame.sequence);
        assert_eq!(frame.channels.len(), 8);
        assert!(frame.channels.iter().all(|c| c.primary.len() == 60));

        match seen % 4 {
            0 => session.set_spatial(SpatialMode::local_far()),
            1 => session.set_band(&BandSelection::ap_band()),
            2 => session.set_shank_map(ShankMap::grid(2, 2, 2, 8)),
            _ => session.set_spatial(SpatialMode::Off),
        }
        seen += 1;
    }

    acquisition.join().unwrap();
    assert!(seen >= 1);
    assert!(!session.is_running());
    assert_eq!(session.snapshot().sequence, BLOCKS - 1);
}

#[test]
fn test_stop_waits_for_in_flight_block() {
    let session = Arc::new(Session::new(helpers::plain_config(64, 30000.0, 1)));
    let ready = session.subscribe();

    let worker = {
        let session = Arc::clone(&session);
        thread::spawn(move || {
            let mut processed = 0;
            for b in 0.. {
                let mut block = helpers::sine_block(3000, 64, 1000.0, 30000.0, 5000.0);
                if session.process_block(&mut block, b * 3000).is_none() {
                    break;
                }
                processed += 1;
            }
            processed
        })
    };

    ready.recv().unwrap();
    thread::sleep(std::time::Duration::from_millis(5));
    session.stop();
    let processed = worker.join().unwrap();

    // every accepted block completed and is the one published
    let frame = session.snapshot();
    assert_eq!(frame.sequence + 1, processed);
    assert!(frame.channels.iter().all(|c| c.stats.count == 3000));
}

#[test]
fn test_erase_through_session() {
    let mut config = helpers::plain_config(1, 30000.0, 1);
    config.band = BandSelection::ap_band();
    let session = Session::new(config);

    let mut first = vec![5000i16; 100];
    session.process_block(&mut first, 0);
    session.erase();
    let mut again = vec![5000i16; 100];
    session.process_block(&mut again, 100);
    assert_eq!(first, again);
}
