//! Splits audio elementary streams into frames along PES packet boundaries.
//!
//! The audio syntax itself (ADTS headers, LATM framing, MPEG audio frame headers) is not
//! inspected.  A frame ends when a new PES packet starts, or when the presentation timestamp
//! changes.

use super::{emit, FrameBuffer, FrameSink};
use crate::packet::Pid;
use crate::pes::Timestamp;
use crate::program::Codec;

/// Accumulates the data of a single audio elementary stream.
pub struct AudioSegmenter {
    pid: Pid,
    codec: Codec,
    buf: FrameBuffer,
}

impl AudioSegmenter {
    /// Create a segmenter for the stream on the given PID
    pub fn new(pid: Pid, codec: Codec) -> AudioSegmenter {
        AudioSegmenter {
            pid,
            codec,
            buf: FrameBuffer::default(),
        }
    }

    /// The data not yet emitted as part of a frame
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buf
    }

    /// Append elementary stream data.  `unit_start` is true for the first data of each PES
    /// packet.  Any buffered data is first emitted as a frame if this is the start of a new PES
    /// packet, or if `pts` differs from the timestamp of the buffered data.
    pub fn push<S: FrameSink + ?Sized>(
        &mut self,
        data: &[u8],
        unit_start: bool,
        pts: Option<Timestamp>,
        dts: Option<Timestamp>,
        sink: &mut S,
    ) {
        if !self.buf.is_empty() && (unit_start || pts != self.buf.pending_pts()) {
            self.flush(sink);
        }
        self.buf.append(data, pts, dts);
    }

    /// Emit whatever remains in the buffer as a final frame.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        emit(
            sink,
            self.pid,
            self.codec,
            self.buf.payload(),
            self.buf.pending_pts(),
            self.buf.pending_dts(),
        );
        self.buf.clear();
    }
}
