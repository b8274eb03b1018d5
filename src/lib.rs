//! Splits an MPEG2 Transport Stream, per the _ISO/IEC 13818-1_ standard, into discrete,
//! timestamped frames of H.264, H.265 and audio elementary stream data.
//!
//! # Design principals
//!
//!  * *Pull driven*.  [`Demuxer::run()`](demultiplex/struct.Demuxer.html#method.run) reads from
//!    any `std::io::Read` byte source until it is exhausted.  Callers that already hold aligned
//!    packets can instead `push_packet()` them one at a time.
//!  * *Tolerant of the start*.  The byte source may begin part way through a packet, and leading
//!    data that precedes the first PAT / PMT is skipped.
//!  * *Frames are borrowed*.  Each frame handed to the [`FrameSink`](frame/trait.FrameSink.html)
//!    borrows the demuxer's internal buffer, and is only valid for the duration of the call.
//!  * *Minimal*.  Only the parts of the PAT, PMT and PES syntax which are needed to locate and
//!    timestamp the frames are decoded.
//!
//! # Example
//!
//! ```
//! use mpeg2ts_framer::demultiplex::{DemuxOptions, Demuxer};
//! use mpeg2ts_framer::frame::Frame;
//!
//! let ts: &[u8] = &[];
//! let mut demux = Demuxer::new(DemuxOptions::default());
//! let mut count = 0;
//! let mut sink = |_frame: &Frame<'_>| count += 1;
//! demux.run(ts, &mut sink).unwrap();
//! assert_eq!(count, 0);
//! ```

#![forbid(unsafe_code)]
#![deny(rust_2018_idioms, future_incompatible, missing_docs)]

pub mod demultiplex;
pub mod descriptor;
pub mod frame;
pub mod packet;
pub mod pes;
pub mod program;
pub mod psi;
pub mod sync;

mod mpegts_crc;

#[cfg(test)]
mod test_util;

use std::fmt;

/// The value of the `stream_type` field of a PMT entry, which indicates the coding of the
/// elementary stream.
///
/// Only the values that this crate acts upon have named constants, but any value can be
/// represented.
#[derive(PartialEq, Eq, Hash, Clone, Copy)]
pub struct StreamType(pub u8);

impl StreamType {
    /// _ISO/IEC 11172-3_ (MPEG-1) Audio
    pub const ISO_11172_AUDIO: StreamType = StreamType(0x03);
    /// _ISO/IEC 13818-3_ (MPEG-2) Audio
    pub const ISO_138183_AUDIO: StreamType = StreamType(0x04);
    /// _ITU-T Rec. H.222.0 | ISO/IEC 13818-1_ PES packets containing private data.  The actual
    /// coding is usually given by a registration descriptor.
    pub const H222_0_PES_PRIVATE_DATA: StreamType = StreamType(0x06);
    /// _ISO/IEC 13818-7_ Audio with ADTS transport syntax
    pub const ADTS: StreamType = StreamType(0x0f);
    /// _ISO/IEC 14496-3_ Audio with the LATM transport syntax
    pub const LATM: StreamType = StreamType(0x11);
    /// _ITU-T Rec. H.264 | ISO/IEC 14496-10_ video
    pub const H264: StreamType = StreamType(0x1b);
    /// _ITU-T Rec. H.265 | ISO/IEC 23008-2_ video
    pub const H265: StreamType = StreamType(0x24);

    fn name(self) -> Option<&'static str> {
        Some(match self {
            StreamType::ISO_11172_AUDIO => "ISO_11172_AUDIO",
            StreamType::ISO_138183_AUDIO => "ISO_138183_AUDIO",
            StreamType::H222_0_PES_PRIVATE_DATA => "H222_0_PES_PRIVATE_DATA",
            StreamType::ADTS => "ADTS",
            StreamType::LATM => "LATM",
            StreamType::H264 => "H264",
            StreamType::H265 => "H265",
            _ => return None,
        })
    }
}
impl fmt::Debug for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "StreamType::{}", name),
            None => write!(f, "StreamType({:#04x})", self.0),
        }
    }
}
impl From<u8> for StreamType {
    fn from(val: u8) -> Self {
        StreamType(val)
    }
}
impl From<StreamType> for u8 {
    fn from(val: StreamType) -> Self {
        val.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn stream_type_debug() {
        assert_eq!(format!("{:?}", StreamType::H264), "StreamType::H264");
        assert_eq!(format!("{:?}", StreamType(0x86)), "StreamType(0x86)");
        assert_eq!(u8::from(StreamType::from(0x24)), 0x24);
    }
}
