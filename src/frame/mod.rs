//! Frames are the complete access units recovered from an elementary stream, and this module
//! defines how they are handed to the application.
//!
//! The [`video`](video/index.html) and [`audio`](audio/index.html) modules decide where one frame
//! ends and the next begins.  Both hold not-yet-complete data in a
//! [`FrameBuffer`](struct.FrameBuffer.html).

pub mod audio;
pub mod nal;
pub mod video;

use crate::packet::{Packet, Pid};
use crate::pes::Timestamp;
use crate::program::Codec;
use log::trace;

/// One complete access unit of an elementary stream.
///
/// The payload borrows from the demultiplexer's internal buffers, so is only available for the
/// duration of the call to [`FrameSink::frame()`](trait.FrameSink.html#tymethod.frame).
#[derive(Debug)]
pub struct Frame<'a> {
    /// the elementary PID the frame was carried on
    pub pid: Pid,
    /// the codec of the elementary stream
    pub codec: Codec,
    /// the frame's data (for video, a sequence of NAL units each preceded by a start code)
    pub payload: &'a [u8],
    /// the Presentation Time Stamp, in 90kHz ticks
    pub pts: Option<Timestamp>,
    /// the Decode Time Stamp, in 90kHz ticks
    pub dts: Option<Timestamp>,
}
impl<'a> Frame<'a> {
    /// The presentation time in milliseconds
    pub fn pts_ms(&self) -> Option<u64> {
        self.pts.map(Timestamp::as_millis)
    }
    /// The decode time in milliseconds
    pub fn dts_ms(&self) -> Option<u64> {
        self.dts.map(Timestamp::as_millis)
    }
}

/// Receives the frames produced by a [`Demuxer`](../demultiplex/struct.Demuxer.html).
///
/// Any `FnMut(&Frame<'_>)` closure can be used as a `FrameSink`.  The sink is called
/// synchronously from within the demultiplexer, so long running work will stall processing
/// of the stream.
pub trait FrameSink {
    /// Called once for each complete frame, in stream order for any given PID.
    fn frame(&mut self, frame: &Frame<'_>);

    /// Called for every transport stream packet before it is processed.  Does nothing by default.
    fn packet(&mut self, _pk: &Packet<'_>) {}
}

impl<F> FrameSink for F
where
    F: FnMut(&Frame<'_>),
{
    fn frame(&mut self, frame: &Frame<'_>) {
        self(frame)
    }
}

/// Elementary stream data that has not yet been resolved into complete frames, together with the
/// timestamps of the oldest unresolved frame.
///
/// The buffer always holds exactly the bytes appended so far, minus those which have been
/// consumed from the front.
#[derive(Default)]
pub struct FrameBuffer {
    payload: Vec<u8>,
    pending_pts: Option<Timestamp>,
    pending_dts: Option<Timestamp>,
}
impl FrameBuffer {
    /// The unresolved data
    pub fn payload(&self) -> &[u8] {
        &self.payload[..]
    }
    /// true if no data is buffered
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
    /// presentation timestamp of the oldest unresolved frame
    pub fn pending_pts(&self) -> Option<Timestamp> {
        self.pending_pts
    }
    /// decode timestamp of the oldest unresolved frame
    pub fn pending_dts(&self) -> Option<Timestamp> {
        self.pending_dts
    }

    /// Append data; if the buffer was empty the given timestamps become the pending ones.
    fn append(&mut self, data: &[u8], pts: Option<Timestamp>, dts: Option<Timestamp>) {
        if self.payload.is_empty() {
            self.set_pending(pts, dts);
        }
        self.payload.extend_from_slice(data);
    }

    fn set_pending(&mut self, pts: Option<Timestamp>, dts: Option<Timestamp>) {
        self.pending_pts = pts;
        self.pending_dts = dts;
    }

    /// Remove `count` bytes from the front of the buffer
    fn consume(&mut self, count: usize) {
        self.payload.drain(..count);
    }

    fn clear(&mut self) {
        self.payload.clear();
    }
}

// Passes one frame to the sink.  Empty frames are never emitted.
fn emit<S: FrameSink + ?Sized>(
    sink: &mut S,
    pid: Pid,
    codec: Codec,
    payload: &[u8],
    pts: Option<Timestamp>,
    dts: Option<Timestamp>,
) {
    if payload.is_empty() {
        return;
    }
    trace!(
        "{} {} frame of {} bytes, pts={:?} dts={:?}",
        pid,
        codec,
        payload.len(),
        pts.map(Timestamp::value),
        dts.map(Timestamp::value)
    );
    sink.frame(&Frame {
        pid,
        codec,
        payload,
        pts,
        dts,
    });
}
