//! Support for Packetised Elementary Stream syntax within Transport Stream packet payloads.
//!
//! Elementary streams are split into 'elementary stream packets', which are then further split
//! into the payloads of transport stream packets.  [`PesHeader`](struct.PesHeader.html) decodes
//! the header found at the start of each PES packet, and
//! [`PesAccumulator`](struct.PesAccumulator.html) tracks the progress of one elementary stream
//! through successive transport stream packets, including the case where the PES header itself
//! is split across packets.

use log::{debug, warn};
use std::error::Error;
use std::{fmt, num};

/// Type for the length of a PES packet
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PesLength {
    /// The PES packet continues until the next TS packet that has `payload_unit_start_indicator`
    /// set.  Generally only used for video streams, whose PES packets may exceed the 16 bit
    /// `PES_packet_length` field.
    Unbounded,
    /// The number of bytes in the PES packet following the `PES_packet_length` field.
    Bounded(num::NonZeroU16),
}

/// Values which may be returned by
/// [`PesHeader::stream_id()`](struct.PesHeader.html#method.stream_id) to identify the kind of
/// content within the Packetized Elementary Stream.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum StreamId {
    /// `program_stream_map`
    ProgramStreamMap,
    /// `private_stream_1`
    PrivateStream1,
    /// `padding_stream`
    PaddingStream,
    /// `private_stream_2`
    PrivateStream2,
    /// an audio stream, with the given stream number
    Audio(u8),
    /// a video stream, with the given stream number
    Video(u8),
    /// `ECM_stream`
    EcmStream,
    /// `EMM_stream`
    EmmStream,
    /// _ISO/IEC 13818-6_ DSMCC stream
    DsmCc,
    /// Rec. ITU-T H.222.1 type E
    H2221TypeE,
    /// `program_stream_directory`
    ProgramStreamDirectory,
    /// Any other stream_id value
    Other(u8),
}
impl StreamId {
    /// true if PES packets with this stream_id carry the optional header fields, including
    /// timestamps
    fn is_parsed(self) -> bool {
        !matches!(
            self,
            StreamId::ProgramStreamMap
                | StreamId::PaddingStream
                | StreamId::PrivateStream2
                | StreamId::EcmStream
                | StreamId::EmmStream
                | StreamId::ProgramStreamDirectory
                | StreamId::DsmCc
                | StreamId::H2221TypeE
        )
    }
}
impl From<u8> for StreamId {
    fn from(v: u8) -> Self {
        match v {
            0b1011_1100 => StreamId::ProgramStreamMap,
            0b1011_1101 => StreamId::PrivateStream1,
            0b1011_1110 => StreamId::PaddingStream,
            0b1011_1111 => StreamId::PrivateStream2,
            0b1100_0000..=0b1101_1111 => StreamId::Audio(v & 0b0001_1111),
            0b1110_0000..=0b1110_1111 => StreamId::Video(v & 0b0000_1111),
            0b1111_0000 => StreamId::EcmStream,
            0b1111_0001 => StreamId::EmmStream,
            0b1111_0010 => StreamId::DsmCc,
            0b1111_1000 => StreamId::H2221TypeE,
            0b1111_1111 => StreamId::ProgramStreamDirectory,
            _ => StreamId::Other(v),
        }
    }
}

/// Errors which may be encountered while processing PES data.
#[derive(Debug, PartialEq, Eq)]
pub enum PesError {
    /// More bytes are needed before the PES header can be decoded.  The header of a PES packet
    /// may be split across several transport stream packets.
    NeedMoreData {
        /// the number of bytes needed
        requested: usize,
        /// the number of bytes available
        available: usize,
    },
    /// The `packet_start_code_prefix` was not `0x000001`
    InvalidStartCode {
        /// the value found in place of the start code
        prefix: u32,
    },
    /// The two 'check bits' at the start of the optional header did not have the value `0b10`
    CheckBits {
        /// the actual bits found
        actual: u8,
    },
    /// The `PTS_DTS_flags` field had the forbidden value `0b01`
    PtsDtsFlagsInvalid,
    /// `PES_header_data_length` is too small to hold the timestamps the flags announce
    HeaderDataTooShort {
        /// the value of `PES_header_data_length`
        header_data_len: usize,
        /// the size of the announced fields
        required: usize,
    },
    /// a PTS or DTS value was malformed
    Timestamp(TimestampError),
}
impl fmt::Display for PesError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PesError::NeedMoreData {
                requested,
                available,
            } => write!(
                f,
                "PES header needs {} bytes, {} available",
                requested, available
            ),
            PesError::InvalidStartCode { prefix } => write!(
                f,
                "invalid packet_start_code_prefix {:#08x}, expected 0x000001",
                prefix
            ),
            PesError::CheckBits { actual } => {
                write!(f, "unexpected check-bits value {:#b}, expected 0b10", actual)
            }
            PesError::PtsDtsFlagsInvalid => f.write_str("invalid PTS_DTS_flags value 0b01"),
            PesError::HeaderDataTooShort {
                header_data_len,
                required,
            } => write!(
                f,
                "PES_header_data_length {} too short for {} bytes of timestamps",
                header_data_len, required
            ),
            PesError::Timestamp(e) => write!(f, "bad timestamp: {:?}", e),
        }
    }
}
impl Error for PesError {}
impl From<TimestampError> for PesError {
    fn from(e: TimestampError) -> Self {
        PesError::Timestamp(e)
    }
}

/// The decoded header at the start of every PES packet.
#[derive(Debug, PartialEq, Eq)]
pub struct PesHeader {
    stream_id: StreamId,
    pes_packet_length: PesLength,
    pts: Option<Timestamp>,
    dts: Option<Timestamp>,
    header_len: usize,
}
impl PesHeader {
    const FIXED_HEADER_SIZE: usize = 6;
    const PARSED_HEADER_SIZE: usize = 3;
    const TIMESTAMP_SIZE: usize = 5;

    /// Decode the PES header at the start of the given buffer.
    ///
    /// Returns `Err(PesError::NeedMoreData)` if the buffer ends before the end of the header.
    pub fn from_bytes(buf: &[u8]) -> Result<PesHeader, PesError> {
        need(buf, Self::FIXED_HEADER_SIZE)?;
        let prefix = u32::from(buf[0]) << 16 | u32::from(buf[1]) << 8 | u32::from(buf[2]);
        if prefix != 1 {
            return Err(PesError::InvalidStartCode { prefix });
        }
        let stream_id = StreamId::from(buf[3]);
        let len = u16::from(buf[4]) << 8 | u16::from(buf[5]);
        let pes_packet_length = match num::NonZeroU16::new(len) {
            None => PesLength::Unbounded,
            Some(l) => PesLength::Bounded(l),
        };
        if !stream_id.is_parsed() {
            return Ok(PesHeader {
                stream_id,
                pes_packet_length,
                pts: None,
                dts: None,
                header_len: Self::FIXED_HEADER_SIZE,
            });
        }
        need(buf, Self::FIXED_HEADER_SIZE + Self::PARSED_HEADER_SIZE)?;
        let parsed = &buf[Self::FIXED_HEADER_SIZE..];
        let check_bits = parsed[0] >> 6;
        if check_bits != 0b10 {
            return Err(PesError::CheckBits { actual: check_bits });
        }
        let header_data_len = parsed[2] as usize;
        let header_len = Self::FIXED_HEADER_SIZE + Self::PARSED_HEADER_SIZE + header_data_len;
        let required = match parsed[1] >> 6 {
            0b00 => 0,
            0b01 => return Err(PesError::PtsDtsFlagsInvalid),
            0b10 => Self::TIMESTAMP_SIZE,
            _ => Self::TIMESTAMP_SIZE * 2,
        };
        if required > header_data_len {
            return Err(PesError::HeaderDataTooShort {
                header_data_len,
                required,
            });
        }
        need(buf, header_len)?;
        let ts = &parsed[Self::PARSED_HEADER_SIZE..];
        let (pts, dts) = match required {
            0 => (None, None),
            Self::TIMESTAMP_SIZE => (Some(Timestamp::from_pts_bytes(ts)?), None),
            _ => (
                Some(Timestamp::from_bytes(ts)?),
                Some(Timestamp::from_dts_bytes(&ts[Self::TIMESTAMP_SIZE..])?),
            ),
        };
        Ok(PesHeader {
            stream_id,
            pes_packet_length,
            pts,
            dts,
            header_len,
        })
    }

    /// Indicator of the type of stream per _ISO/IEC 13818-1_, _Table 2-18_.
    pub fn stream_id(&self) -> StreamId {
        self.stream_id
    }
    /// The overall length of the PES packet, once all pieces from the transport stream have
    /// been collected.
    pub fn pes_packet_length(&self) -> PesLength {
        self.pes_packet_length
    }
    /// The Presentation Time Stamp, if present
    pub fn pts(&self) -> Option<Timestamp> {
        self.pts
    }
    /// The Decode Time Stamp, if present
    pub fn dts(&self) -> Option<Timestamp> {
        self.dts
    }
    /// The number of bytes from the start of the PES packet to the start of its payload
    pub fn header_len(&self) -> usize {
        self.header_len
    }
    /// The number of payload bytes in this PES packet, if the packet is bounded
    fn payload_len(&self) -> Option<usize> {
        match self.pes_packet_length {
            PesLength::Unbounded => None,
            PesLength::Bounded(len) => Some(
                (usize::from(len.get()) + Self::FIXED_HEADER_SIZE).saturating_sub(self.header_len),
            ),
        }
    }
}

fn need(buf: &[u8], requested: usize) -> Result<(), PesError> {
    if buf.len() < requested {
        Err(PesError::NeedMoreData {
            requested,
            available: buf.len(),
        })
    } else {
        Ok(())
    }
}

/// Detail about the formatting problem which prevented a [`Timestamp`](struct.Timestamp.html)
/// value being parsed.
#[derive(PartialEq, Eq, Debug)]
pub enum TimestampError {
    /// Parsing the timestamp failed because the 'prefix-bit' values within the timestamp did not
    /// have the expected values
    IncorrectPrefixBits {
        /// expected prefix-bits for this timestamp
        expected: u8,
        /// the actual, incorrect bits that were present
        actual: u8,
    },
    /// Parsing the timestamp failed because a 'marker-bit' value within the timestamp did not
    /// have the expected value
    MarkerBitNotSet {
        /// the bit-index of the bit which should have been 1, but was found to be 0
        bit_number: u8,
    },
}

/// A 33-bit Elementary Stream timestamp, used to represent PTS and DTS values which may appear in
/// an Elementary Stream header.
#[derive(PartialEq, Eq, Debug, Clone, Copy, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    val: u64,
}
impl Timestamp {
    /// The largest representable timestamp value before the timestamp wraps back around to zero.
    pub const MAX: Timestamp = Timestamp { val: (1 << 33) - 1 };

    /// 90kHz timebase in which PTS and DTS values are measured.
    pub const TIMEBASE: u64 = 90_000;

    /// Parse a Presentation Time Stamp value from the 5 bytes at the start of the given slice
    ///
    /// Panics if fewer than 5 bytes given
    pub fn from_pts_bytes(buf: &[u8]) -> Result<Timestamp, TimestampError> {
        Timestamp::check_prefix(buf, 0b0010)?;
        Timestamp::from_bytes(buf)
    }
    /// Parse a Decode Time Stamp value from the 5 bytes at the start of the given slice
    ///
    /// Panics if fewer than 5 bytes given
    pub fn from_dts_bytes(buf: &[u8]) -> Result<Timestamp, TimestampError> {
        Timestamp::check_prefix(buf, 0b0001)?;
        Timestamp::from_bytes(buf)
    }
    fn check_prefix(buf: &[u8], expected: u8) -> Result<(), TimestampError> {
        let actual = buf[0] >> 4;
        if actual == expected {
            Ok(())
        } else {
            Err(TimestampError::IncorrectPrefixBits { expected, actual })
        }
    }
    fn check_marker_bit(buf: &[u8], bit_number: u8) -> Result<(), TimestampError> {
        let byte_index = bit_number / 8;
        let bit_index = bit_number % 8;
        let bit_mask = 1 << (7 - bit_index);
        if buf[byte_index as usize] & bit_mask != 0 {
            Ok(())
        } else {
            Err(TimestampError::MarkerBitNotSet { bit_number })
        }
    }
    /// Parse a Time Stamp value from the 5 bytes at the start of the given slice, checking the
    /// marker bits but not the 4-bit prefix (the first timestamp of a PTS+DTS pair carries the
    /// prefix `0b0011`).
    ///
    /// Panics if fewer than 5 bytes given
    pub fn from_bytes(buf: &[u8]) -> Result<Timestamp, TimestampError> {
        Timestamp::check_marker_bit(buf, 7)?;
        Timestamp::check_marker_bit(buf, 23)?;
        Timestamp::check_marker_bit(buf, 39)?;
        Ok(Timestamp {
            val: (u64::from(buf[0] & 0b0000_1110) << 29)
                | u64::from(buf[1]) << 22
                | (u64::from(buf[2] & 0b1111_1110) << 14)
                | u64::from(buf[3]) << 7
                | u64::from(buf[4]) >> 1,
        })
    }
    /// Panics if the given val is greater than 2^33-1
    pub fn from_u64(val: u64) -> Timestamp {
        assert!(val <= Self::MAX.val);
        Timestamp { val }
    }
    /// produces the timestamp's value in 90kHz ticks
    pub fn value(self) -> u64 {
        self.val
    }
    /// the timestamp's value in whole milliseconds
    pub fn as_millis(self) -> u64 {
        self.val / 90
    }
}

enum AccumState {
    // no PES packet has started yet, or the last one was discarded by reset()
    Idle,
    // the header of the current PES packet is being collected from several TS packets
    HeaderPending { requested: usize },
    // payload bytes of the current PES packet are being delivered
    Body { first: bool },
    // the remainder of the current PES packet is being dropped
    Discarding,
}

/// What happened to the data given to a [`PesAccumulator`](struct.PesAccumulator.html).
#[derive(Debug, PartialEq, Eq)]
pub enum PesProgress {
    /// Payload is available via `available()`.  `unit_start` is true for the first delivery of
    /// payload from a PES packet.
    Ready {
        /// this is the first payload of the PES packet
        unit_start: bool,
    },
    /// The PES header is incomplete, so no payload is available yet.
    Pending,
    /// The data is not part of a usable PES packet.
    Ignored,
}

/// Reassembles the PES packets of a single elementary stream from successive transport stream
/// packet payloads.
///
/// Payload passes through `available()` once, and is forgotten by the next call to
/// `unit_start()` or `continuation()`.
pub struct PesAccumulator {
    payload: Vec<u8>,
    pts: Option<Timestamp>,
    dts: Option<Timestamp>,
    state: AccumState,
    // payload bytes still expected for a bounded PES packet
    remaining: Option<usize>,
}
impl Default for PesAccumulator {
    fn default() -> Self {
        PesAccumulator {
            payload: vec![],
            pts: None,
            dts: None,
            state: AccumState::Idle,
            remaining: None,
        }
    }
}
impl PesAccumulator {
    /// Process the payload of a TS packet with `payload_unit_start_indicator` set.
    ///
    /// If the header of a previous PES packet is still incomplete, that header is abandoned and
    /// `Err(PesError::NeedMoreData)` is returned.  Other header errors cause the rest of the new
    /// PES packet to be ignored.
    pub fn unit_start(&mut self, data: &[u8]) -> Result<PesProgress, PesError> {
        if let Some(remaining) = self.remaining.take() {
            if remaining > 0 && matches!(self.state, AccumState::Body { .. }) {
                warn!("PES packet ended {} bytes short of PES_packet_length", remaining);
            }
        }
        if let AccumState::HeaderPending { requested } = self.state {
            let available = self.payload.len();
            self.payload.clear();
            self.state = AccumState::Idle;
            return Err(PesError::NeedMoreData {
                requested,
                available,
            });
        }
        self.payload.clear();
        self.payload.extend_from_slice(data);
        self.start_body()
    }

    /// Process the payload of a TS packet without `payload_unit_start_indicator` set.
    pub fn continuation(&mut self, data: &[u8]) -> Result<PesProgress, PesError> {
        match self.state {
            AccumState::Idle | AccumState::Discarding => Ok(PesProgress::Ignored),
            AccumState::HeaderPending { .. } => {
                self.payload.extend_from_slice(data);
                self.start_body()
            }
            AccumState::Body { .. } => {
                self.payload.clear();
                self.payload.extend_from_slice(data);
                self.state = AccumState::Body { first: false };
                self.limit();
                Ok(PesProgress::Ready { unit_start: false })
            }
        }
    }

    // decode the header from the start of `payload`, leaving only the PES payload bytes behind
    fn start_body(&mut self) -> Result<PesProgress, PesError> {
        match PesHeader::from_bytes(&self.payload) {
            Ok(header) => {
                self.payload.drain(..header.header_len());
                // a PES without timestamps inherits the timestamp of its predecessor
                if let Some(pts) = header.pts() {
                    self.pts = Some(pts);
                    self.dts = Some(header.dts().unwrap_or(pts));
                }
                self.remaining = header.payload_len();
                self.state = AccumState::Body { first: true };
                self.limit();
                Ok(PesProgress::Ready { unit_start: true })
            }
            Err(PesError::NeedMoreData { requested, .. }) => {
                self.state = AccumState::HeaderPending { requested };
                Ok(PesProgress::Pending)
            }
            Err(e) => {
                self.payload.clear();
                self.state = AccumState::Discarding;
                Err(e)
            }
        }
    }

    // drop any bytes beyond the end of a bounded PES packet
    fn limit(&mut self) {
        if let Some(remaining) = self.remaining {
            if self.payload.len() > remaining {
                debug!(
                    "dropping {} bytes beyond end of PES packet",
                    self.payload.len() - remaining
                );
                self.payload.truncate(remaining);
            }
            self.remaining = Some(remaining - self.payload.len());
        }
    }

    /// Drop the rest of the current PES packet; data is ignored until the next unit start.
    pub fn discard(&mut self) {
        self.payload.clear();
        self.remaining = None;
        self.state = AccumState::Discarding;
    }

    /// The payload made available by the last call to `unit_start()` or `continuation()` that
    /// returned `PesProgress::Ready`.
    pub fn available(&self) -> &[u8] {
        match self.state {
            AccumState::Body { .. } => &self.payload[..],
            _ => &[],
        }
    }

    /// The presentation timestamp of the current PES packet
    pub fn pts(&self) -> Option<Timestamp> {
        self.pts
    }

    /// The decode timestamp of the current PES packet, which is equal to the presentation
    /// timestamp when the header gave no separate DTS
    pub fn dts(&self) -> Option<Timestamp> {
        self.dts
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use bitstream_io::{BigEndian, BitWrite};
    use bitstream_io::{BitWriter, BE};
    use std::io;

    fn make_test_data<F>(builder: F) -> Vec<u8>
    where
        F: Fn(&mut BitWriter<Vec<u8>, BE>) -> Result<(), io::Error>,
    {
        let data: Vec<u8> = Vec::new();
        let mut w = BitWriter::endian(data, BigEndian);
        builder(&mut w).unwrap();
        w.into_writer()
    }

    /// `ts` is a 33-bit timestamp value
    fn write_ts(w: &mut BitWriter<Vec<u8>, BE>, ts: u64, prefix: u8) -> Result<(), io::Error> {
        assert!(
            ts < 1u64 << 33,
            "ts value too large {:#x} >= {:#x}",
            ts,
            1u64 << 33
        );
        w.write(4, prefix & 0b1111)?;
        w.write(3, (ts & 0b1_1100_0000_0000_0000_0000_0000_0000_0000) >> 30)?;
        w.write(1, 1)?; // marker_bit
        w.write(15, (ts & 0b0_0011_1111_1111_1111_1000_0000_0000_0000) >> 15)?;
        w.write(1, 1)?; // marker_bit
        w.write(15, ts & 0b0_0000_0000_0000_0000_0111_1111_1111_1111)?;
        w.write(1, 1) // marker_bit
    }

    fn pes_header(
        w: &mut BitWriter<Vec<u8>, BE>,
        pes_packet_length: u16,
        pts: Option<u64>,
        dts: Option<u64>,
    ) -> Result<(), io::Error> {
        w.write(24, 1)?; // packet_start_code_prefix
        w.write(8, 0xe0)?; // stream_id
        w.write(16, pes_packet_length)?; // PES_packet_length
        w.write(2, 0b10)?; // check-bits
        w.write(6, 0b00_0100)?; // scrambling, priority, data_alignment, copyright, original
        let flags = match (pts, dts) {
            (None, _) => 0b00,
            (Some(_), None) => 0b10,
            (Some(_), Some(_)) => 0b11,
        };
        w.write(2, flags)?; // PTS_DTS_flags
        w.write(6, 0)?; // ESCR, ES_rate, DSM_trick_mode, additional_copy_info, CRC, extension
        let len = match flags {
            0b00 => 0,
            0b10 => 5,
            _ => 10,
        };
        w.write(8, len)?; // PES_header_data_length
        if let Some(pts) = pts {
            write_ts(w, pts, if dts.is_some() { 0b0011 } else { 0b0010 })?;
        }
        if let Some(dts) = dts {
            write_ts(w, dts, 0b0001)?;
        }
        Ok(())
    }

    fn pes(pts: Option<u64>, dts: Option<u64>, payload: &[u8]) -> Vec<u8> {
        let mut data = make_test_data(|w| pes_header(w, 0, pts, dts));
        data.extend_from_slice(payload);
        data
    }

    #[test]
    fn parse_header() {
        let data = make_test_data(|w| pes_header(w, 0, Some(123456789), Some(123450000)));
        let header = PesHeader::from_bytes(&data[..]).unwrap();
        assert_eq!(header.stream_id(), StreamId::Video(0));
        assert_eq!(header.pes_packet_length(), PesLength::Unbounded);
        assert_eq!(header.pts(), Some(Timestamp::from_u64(123456789)));
        assert_eq!(header.dts(), Some(Timestamp::from_u64(123450000)));
        assert_eq!(header.header_len(), 19);
    }

    #[test]
    fn header_without_timestamps() {
        let data = make_test_data(|w| pes_header(w, 0, None, None));
        let header = PesHeader::from_bytes(&data[..]).unwrap();
        assert_eq!(header.pts(), None);
        assert_eq!(header.header_len(), 9);
    }

    #[test]
    fn truncated_header() {
        let data = make_test_data(|w| pes_header(w, 0, Some(1), None));
        for len in 0..data.len() {
            assert_matches!(
                PesHeader::from_bytes(&data[..len]),
                Err(PesError::NeedMoreData { .. }),
                "len={}",
                len
            );
        }
    }

    #[test]
    fn bad_start_code() {
        let mut data = make_test_data(|w| pes_header(w, 0, None, None));
        data[2] = 2;
        assert_matches!(
            PesHeader::from_bytes(&data[..]),
            Err(PesError::InvalidStartCode { prefix: 2 })
        );
    }

    #[test]
    fn bad_check_bits() {
        let mut data = make_test_data(|w| pes_header(w, 0, None, None));
        data[6] = 0;
        assert_matches!(
            PesHeader::from_bytes(&data[..]),
            Err(PesError::CheckBits { actual: 0 })
        );
    }

    #[test]
    fn pts_dts_flags_invalid() {
        let mut data = make_test_data(|w| pes_header(w, 0, None, None));
        data[7] = 0b0100_0000;
        assert_matches!(
            PesHeader::from_bytes(&data[..]),
            Err(PesError::PtsDtsFlagsInvalid)
        );
    }

    #[test]
    fn header_data_too_short() {
        let mut data = make_test_data(|w| pes_header(w, 0, Some(1), None));
        data[8] = 4;
        assert_matches!(
            PesHeader::from_bytes(&data[..]),
            Err(PesError::HeaderDataTooShort {
                header_data_len: 4,
                required: 5
            })
        );
    }

    #[test]
    fn pts() {
        let pts_prefix = 0b0010;
        let pts = make_test_data(|w| {
            write_ts(w, 0b1_0101_0101_0101_0101_0101_0101_0101_0101, pts_prefix)
        });
        let a = Timestamp::from_pts_bytes(&pts[..]).unwrap().value();
        let b = 0b1_0101_0101_0101_0101_0101_0101_0101_0101;
        assert_eq!(
            a, b,
            "timestamp values don't match:\n  actual:{:#b}\nexpected:{:#b}",
            a, b
        );
    }

    #[test]
    fn timestamp_ones() {
        let pts = make_test_data(|w| write_ts(w, Timestamp::MAX.value(), 0b0010));
        let a = Timestamp::from_pts_bytes(&pts[..]).unwrap();
        assert_eq!(a, Timestamp::MAX);
    }

    #[test]
    fn timestamp_bad_prefix() {
        let mut pts = make_test_data(|w| write_ts(w, 1234, 0b0010));
        // make the prefix bits invalid by flipping a 0 to a 1,
        pts[0] |= 0b10000000;
        assert_matches!(
            Timestamp::from_pts_bytes(&pts[..]),
            Err(TimestampError::IncorrectPrefixBits {
                expected: 0b0010,
                actual: 0b1010
            })
        )
    }

    #[test]
    fn timestamp_bad_marker() {
        let mut pts = make_test_data(|w| write_ts(w, 1234, 0b0010));
        // make the first maker_bit (at index 7) invalid, by flipping a 1 to a 0,
        pts[0] &= 0b11111110;
        assert_matches!(
            Timestamp::from_pts_bytes(&pts[..]),
            Err(TimestampError::MarkerBitNotSet { bit_number: 7 })
        )
    }

    #[test]
    fn millis() {
        assert_eq!(Timestamp::from_u64(90_000).as_millis(), 1000);
        assert_eq!(Timestamp::from_u64(89).as_millis(), 0);
    }

    #[test]
    fn accumulate() {
        let mut acc = PesAccumulator::default();
        let data = pes(Some(9000), None, b"abc");
        assert_matches!(
            acc.unit_start(&data),
            Ok(PesProgress::Ready { unit_start: true })
        );
        assert_eq!(acc.available(), b"abc");
        assert_eq!(acc.pts(), Some(Timestamp::from_u64(9000)));
        assert_eq!(acc.dts(), Some(Timestamp::from_u64(9000)));
        assert_matches!(
            acc.continuation(b"def"),
            Ok(PesProgress::Ready { unit_start: false })
        );
        assert_eq!(acc.available(), b"def");
    }

    #[test]
    fn missing_pts_inherits_previous() {
        let mut acc = PesAccumulator::default();
        acc.unit_start(&pes(Some(9000), Some(6000), b"a")).unwrap();
        acc.unit_start(&pes(None, None, b"b")).unwrap();
        assert_eq!(acc.pts(), Some(Timestamp::from_u64(9000)));
        assert_eq!(acc.dts(), Some(Timestamp::from_u64(6000)));
        assert_eq!(acc.available(), b"b");
    }

    #[test]
    fn header_split_across_packets() {
        let data = pes(Some(9000), Some(6000), b"payload");
        for split in 1..19 {
            let mut acc = PesAccumulator::default();
            assert_matches!(acc.unit_start(&data[..split]), Ok(PesProgress::Pending));
            assert_eq!(acc.available(), b"");
            assert_matches!(
                acc.continuation(&data[split..]),
                Ok(PesProgress::Ready { unit_start: true }),
                "split={}",
                split
            );
            assert_eq!(acc.available(), b"payload");
            assert_eq!(acc.dts(), Some(Timestamp::from_u64(6000)));
        }
    }

    #[test]
    fn second_unit_start_while_header_pending() {
        let data = pes(Some(9000), None, b"x");
        let mut acc = PesAccumulator::default();
        acc.unit_start(&data[..4]).unwrap();
        assert_matches!(
            acc.unit_start(&data),
            Err(PesError::NeedMoreData { available: 4, .. })
        );
        // the following PES packet is handled normally
        assert_matches!(
            acc.unit_start(&data),
            Ok(PesProgress::Ready { unit_start: true })
        );
    }

    #[test]
    fn malformed_header_discards_rest() {
        let mut acc = PesAccumulator::default();
        assert_matches!(
            acc.unit_start(b"\x00\x00\x02\xe0\x00\x00"),
            Err(PesError::InvalidStartCode { .. })
        );
        assert_matches!(acc.continuation(b"abc"), Ok(PesProgress::Ignored));
        assert_eq!(acc.available(), b"");
    }

    #[test]
    fn continuation_before_first_unit_start() {
        let mut acc = PesAccumulator::default();
        assert_matches!(acc.continuation(b"abc"), Ok(PesProgress::Ignored));
    }

    #[test]
    fn bounded_length() {
        // PES_packet_length covers the 8 bytes of optional header + 5 payload bytes
        let mut data = make_test_data(|w| pes_header(w, 13, Some(1), None));
        data.extend_from_slice(b"hel");
        let mut acc = PesAccumulator::default();
        acc.unit_start(&data).unwrap();
        assert_eq!(acc.available(), b"hel");
        acc.continuation(b"lo, world").unwrap();
        assert_eq!(acc.available(), b"lo");
    }
}
