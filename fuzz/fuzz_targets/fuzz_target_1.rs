#![no_main]

use libfuzzer_sys::fuzz_target;
use mpeg2ts_framer::demultiplex::{DemuxOptions, Demuxer};
use mpeg2ts_framer::frame::Frame;

fuzz_target!(|data: &[u8]| {
    // random data would almost never pass the PSI CRC check
    let mut demux = Demuxer::new(DemuxOptions::default().with_verify_crc(false));
    let mut sink = |frame: &Frame<'_>| {
        assert!(!frame.payload.is_empty());
    };
    if demux.run(data, &mut sink).is_err() {
        demux.flush(&mut sink);
    }
});
