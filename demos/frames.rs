use hex_slice::AsHex;
use mpeg2ts_framer::demultiplex::{DemuxOptions, Demuxer};
use mpeg2ts_framer::frame::Frame;
use std::cmp;
use std::env;
use std::fs::File;
use std::io::BufReader;
use std::process;

// Prints one line for each frame found in the transport stream file named on the command line
fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let name = match env::args().nth(1) {
        Some(name) => name,
        None => {
            eprintln!("usage: frames <file.ts>");
            process::exit(2);
        }
    };
    let f = File::open(&name).unwrap_or_else(|_| panic!("file not found: {}", &name));

    let mut demux = Demuxer::new(DemuxOptions::default());
    let mut count = 0u64;
    let mut sink = |frame: &Frame<'_>| {
        count += 1;
        println!(
            "{} {:<11} pts={:<10} dts={:<10} len={:<7} {:02x}",
            frame.pid,
            frame.codec,
            fmt_ms(frame.pts_ms()),
            fmt_ms(frame.dts_ms()),
            frame.payload.len(),
            frame.payload[..cmp::min(frame.payload.len(), 16)].plain_hex(false)
        );
    };
    if let Err(e) = demux.run(BufReader::new(f), &mut sink) {
        eprintln!("{}: {}", name, e);
        // anything buffered before the problem is still worth seeing
        demux.flush(&mut sink);
    }
    for stream in demux.programs().streams() {
        eprintln!(
            "program {} {} {:?} ({}) language={:?}",
            stream.program_number,
            stream.elementary_pid,
            stream.stream_type,
            stream.codec,
            stream.language
        );
    }
    eprintln!("{} frames", count);
}

fn fmt_ms(ms: Option<u64>) -> String {
    match ms {
        Some(ms) => format!("{}ms", ms),
        None => "-".to_string(),
    }
}
