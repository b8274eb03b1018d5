//! Splits H.264 and H.265 elementary streams into access units.
//!
//! An access unit ends where a parameter set, SEI or access unit delimiter follows coded slice
//! data, or where a slice follows slice data and has the most significant bit set in the first
//! byte after its NAL unit header.  For H.264 that bit is the leading bit of a `first_mb_in_slice`
//! value of zero, and for H.265 it is `first_slice_segment_in_pic_flag`.  No further slice header
//! parsing is attempted.

use super::nal::{self, NalClass, NalSyntax};
use super::{emit, FrameBuffer, FrameSink};
use crate::packet::Pid;
use crate::pes::Timestamp;
use crate::program::Codec;

/// Accumulates the data of a single video elementary stream, and passes each complete access
/// unit to a [`FrameSink`](../trait.FrameSink.html).
pub struct VideoSplitter {
    pid: Pid,
    codec: Codec,
    syntax: NalSyntax,
    buf: FrameBuffer,
    // start codes before this offset have already been classified
    scan_pos: usize,
    // a slice has been seen since the start of the unresolved access unit
    seen_vcl: bool,
}

impl VideoSplitter {
    /// Create a splitter for the stream on the given PID, which uses the given NAL syntax.
    pub fn new(pid: Pid, codec: Codec, syntax: NalSyntax) -> VideoSplitter {
        VideoSplitter {
            pid,
            codec,
            syntax,
            buf: FrameBuffer::default(),
            scan_pos: 0,
            seen_vcl: false,
        }
    }

    /// The data not yet emitted as part of a frame
    pub fn buffer(&self) -> &FrameBuffer {
        &self.buf
    }

    /// Append elementary stream data which was carried in a PES packet with the given
    /// timestamps, emitting any access units that are completed by the new data.
    ///
    /// A start code too close to the end of the data to be classified is left for the next
    /// call.
    pub fn push<S: FrameSink + ?Sized>(
        &mut self,
        data: &[u8],
        pts: Option<Timestamp>,
        dts: Option<Timestamp>,
        sink: &mut S,
    ) {
        self.buf.append(data, pts, dts);
        let header_len = self.syntax.header_len();
        let mut au_start = 0;
        loop {
            let payload = self.buf.payload();
            let sc = match nal::find_start_code(payload, self.scan_pos) {
                Some(sc) => sc,
                None => {
                    // a start code may be split across the end of the buffer
                    self.scan_pos = self.scan_pos.max(payload.len().saturating_sub(2));
                    break;
                }
            };
            let nal = sc.nal_start();
            if nal + header_len >= payload.len() {
                self.scan_pos = sc.prefix;
                break;
            }
            let class = self.syntax.classify(payload[nal]);
            let boundary = self.seen_vcl
                && match class {
                    NalClass::Marker => true,
                    NalClass::Vcl => payload[nal + header_len] & 0b1000_0000 != 0,
                    NalClass::Other => false,
                };
            if boundary {
                let au = self.syntax.strip_leading_auds(&payload[au_start..sc.start]);
                emit(
                    sink,
                    self.pid,
                    self.codec,
                    au,
                    self.buf.pending_pts(),
                    self.buf.pending_dts(),
                );
                self.buf.set_pending(pts, dts);
                au_start = sc.start;
                self.seen_vcl = false;
            }
            if class == NalClass::Vcl {
                self.seen_vcl = true;
            }
            self.scan_pos = nal;
        }
        if au_start > 0 {
            self.buf.consume(au_start);
            self.scan_pos -= au_start;
        }
    }

    /// Emit whatever remains in the buffer as a final frame.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        if self.buf.is_empty() {
            return;
        }
        let au = self.syntax.strip_leading_auds(self.buf.payload());
        emit(
            sink,
            self.pid,
            self.codec,
            au,
            self.buf.pending_pts(),
            self.buf.pending_dts(),
        );
        self.buf.clear();
        self.scan_pos = 0;
        self.seen_vcl = false;
    }
}
