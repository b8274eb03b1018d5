//! A [`Packet`](./struct.Packet.html) struct and associated infrastructure to read an MPEG
//! Transport Stream packet header.
//!
//! Only the header fields needed to route a packet's payload are decoded; the contents of the
//! adaptation field (PCR and friends) are skipped over, apart from the _discontinuity_indicator_
//! which affects continuity counter checking.

use std::cmp::Ordering;
use std::convert::TryFrom;
use std::error::Error;
use std::fmt;

/// the different values indicating whether a `Packet` carries an adaptation field, a payload or
/// both.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum AdaptationControl {
    /// This value is used if the transport stream packet `adaptation_control` field uses the value
    /// `0b00`, which is reserved by _ISO/IEC 13818-1_.
    Reserved,
    /// indicates that this packet contains a payload, but not an adaptation field
    PayloadOnly,
    /// indicates that this packet contains an adaptation field, but not a payload
    AdaptationFieldOnly,
    /// indicates that this packet contains both an adaptation field and a payload
    AdaptationFieldAndPayload,
}

impl AdaptationControl {
    #[inline(always)]
    fn from(val: u8) -> AdaptationControl {
        match val & 0b11 {
            0 => AdaptationControl::Reserved,
            1 => AdaptationControl::PayloadOnly,
            2 => AdaptationControl::AdaptationFieldOnly,
            _ => AdaptationControl::AdaptationFieldAndPayload,
        }
    }

    /// True if this AdaptationControl variant indicates that the packet will have a payload
    #[inline(always)]
    pub fn has_payload(self) -> bool {
        match self {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => false,
            AdaptationControl::PayloadOnly | AdaptationControl::AdaptationFieldAndPayload => true,
        }
    }

    fn has_adaptation_field(self) -> bool {
        matches!(
            self,
            AdaptationControl::AdaptationFieldOnly | AdaptationControl::AdaptationFieldAndPayload
        )
    }
}

/// A counter value used within a transport stream to detect discontinuities in a sequence of
/// packets.  The continuity counter should increase by one for each packet with a given PID for
/// which `adaptation_control` indicates that a payload should be present.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ContinuityCounter {
    val: u8,
}

impl ContinuityCounter {
    /// Panics if the given value is greater than 15.
    #[inline]
    pub fn new(count: u8) -> ContinuityCounter {
        assert!(count < 0b10000);
        ContinuityCounter { val: count }
    }

    /// Returns this counter's value, which will be between 0 and 15 inclusive.
    #[inline]
    pub fn count(self) -> u8 {
        self.val
    }

    /// true iff the given `ContinuityCounter` value follows this one.  Note that the maximum
    /// counter value is 15, and the counter 'wraps around':
    ///
    /// ```rust
    /// # use mpeg2ts_framer::packet::ContinuityCounter;
    /// let a = ContinuityCounter::new(0);
    /// let b = ContinuityCounter::new(15);
    /// assert!(a.follows(b));  // after 15, counter wraps around to 0
    /// ```
    #[inline]
    pub fn follows(self, other: ContinuityCounter) -> bool {
        (other.val + 1) & 0b1111 == self.val
    }
}

/// A Packet Identifier value, between `0x0000` and `0x1fff`.
///
/// PID values identify a particular sub-stream within the overall Transport Stream.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pid(u16);
impl Pid {
    /// The largest possible PID value, `0x1fff`.
    pub const MAX_VALUE: u16 = 0x1fff;

    /// The total number of distinct PID values, `0x2000` (equal to `MAX_VALUE` + 1)
    pub const PID_COUNT: usize = (Self::MAX_VALUE + 1) as usize;

    /// The PID on which the _Program Association Table_ is always carried.
    pub const PAT: Pid = Pid::new(0);

    /// Packets on this PID are stuffing, used to pad the stream to a constant bitrate.
    pub const STUFFING: Pid = Pid::new(0x1fff);

    /// Panics if the given value is greater than `Pid::MAX_VALUE`.
    pub const fn new(pid: u16) -> Pid {
        assert!(pid <= Pid::MAX_VALUE);
        Pid(pid)
    }
}
impl TryFrom<u16> for Pid {
    type Error = ();

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        if value <= Pid::MAX_VALUE {
            Ok(Pid(value))
        } else {
            Err(())
        }
    }
}
impl From<Pid> for u16 {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0
    }
}
impl From<Pid> for usize {
    #[inline]
    fn from(pid: Pid) -> Self {
        pid.0 as usize
    }
}
impl fmt::Debug for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "Pid({:04x})", self.0)
    }
}
impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{:#06x}", self.0)
    }
}

/// Problems with the header syntax of a transport stream packet, which prevent the payload from
/// being located.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum PacketError {
    /// The _adaptation_field_length_ value runs past the end of the packet.
    AdaptationFieldTooLong {
        /// the length given in the packet header
        len: usize,
        /// the largest value the packet could accommodate
        max: usize,
    },
}
impl fmt::Display for PacketError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PacketError::AdaptationFieldTooLong { len, max } => write!(
                f,
                "adaptation_field_length {} exceeds the {} bytes available",
                len, max
            ),
        }
    }
}
impl Error for PacketError {}

/// A transport stream `Packet` is a wrapper around a byte slice which allows the bytes to be
/// interpreted as a packet structure per _ISO/IEC 13818-1, Section 2.4.3.3_.
pub struct Packet<'buf> {
    buf: &'buf [u8],
}

const FIXED_HEADER_SIZE: usize = 4;
// when AF present, a 1-byte 'length' field precedes the content,
const ADAPTATION_FIELD_OFFSET: usize = FIXED_HEADER_SIZE + 1;

impl<'buf> Packet<'buf> {
    /// The value `0x47`, which must appear in the first byte of every transport stream packet.
    pub const SYNC_BYTE: u8 = 0x47;

    /// The fixed 188 byte size of a transport stream packet.
    pub const SIZE: usize = 188;

    /// returns `true` if the given value is a valid synchronisation byte, the value
    /// `Packet::SYNC_BYTE` (0x47), which must appear at the start of every transport stream
    /// packet.
    #[inline(always)]
    pub fn is_sync_byte(b: u8) -> bool {
        b == Self::SYNC_BYTE
    }

    /// Panics if the buffer size is not exactly `Packet::SIZE` (188) bytes, or if the first
    /// byte value is not equal to `Packet::SYNC_BYTE` (0x47).  Calling code is expected to have
    /// already checked those conditions (the [`sync`](../sync/index.html) module does).
    #[inline(always)]
    pub fn new(buf: &'buf [u8]) -> Packet<'buf> {
        assert_eq!(buf.len(), Self::SIZE);
        assert!(Packet::is_sync_byte(buf[0]));
        Packet { buf }
    }

    /// Like `new()`, but returns `None` if the buffer has the wrong size or the sync-byte has
    /// incorrect value.
    #[inline(always)]
    pub fn try_new(buf: &'buf [u8]) -> Option<Packet<'buf>> {
        if buf.len() == Self::SIZE && Packet::is_sync_byte(buf[0]) {
            Some(Packet { buf })
        } else {
            None
        }
    }

    /// *May* have been set if some previous processing of this TS data detected at least
    /// 1 uncorrectable bit error in this TS packet.
    #[inline]
    pub fn transport_error_indicator(&self) -> bool {
        self.buf[1] & 0b1000_0000 != 0
    }

    /// a structure larger than a single packet payload needs to be split across multiple
    /// packets, `payload_unit_start_indicator()` indicates if this packet payload contains the
    /// start of the structure.  If `false`, this packets payload is a continuation of a
    /// structure which began in an earlier packet within the transport stream.
    #[inline]
    pub fn payload_unit_start_indicator(&self) -> bool {
        self.buf[1] & 0b0100_0000 != 0
    }

    /// The sub-stream to which a particular packet belongs is indicated by this Packet
    /// Identifier value.
    #[inline]
    pub fn pid(&self) -> Pid {
        Pid(u16::from(self.buf[1] & 0b0001_1111) << 8 | u16::from(self.buf[2]))
    }

    /// The returned enum value indicates if the packet has an adaptation field, a payload or
    /// both.
    #[inline]
    pub fn adaptation_control(&self) -> AdaptationControl {
        AdaptationControl::from(self.buf[3] >> 4)
    }

    /// Each packet with a given `pid()` value within a transport stream should have a continuity
    /// counter value which increases by 1 from the last counter value seen.
    #[inline]
    pub fn continuity_counter(&self) -> ContinuityCounter {
        ContinuityCounter::new(self.buf[3] & 0b0000_1111)
    }

    fn adaptation_field_length(&self) -> usize {
        self.buf[4] as usize
    }

    /// The _discontinuity_indicator_ of the adaptation field, if one is present.  When set, a
    /// jump in the continuity counter of this packet is expected and does not indicate lost data.
    pub fn discontinuity_indicator(&self) -> bool {
        self.adaptation_control().has_adaptation_field()
            && self.adaptation_field_length() > 0
            && self.buf[ADAPTATION_FIELD_OFFSET] & 0b1000_0000 != 0
    }

    /// The data contained within the packet, not including the packet headers or adaptation
    /// field.
    ///
    /// `Ok(None)` is returned if `adaptation_control()` indicates that no payload is present, or
    /// if the adaptation field leaves no room for any payload bytes, so that any `Some` payload
    /// is guaranteed not to be an empty slice.  An adaptation field length which runs past the
    /// end of the packet is an error.
    #[inline(always)]
    pub fn payload(&self) -> Result<Option<&'buf [u8]>, PacketError> {
        match self.adaptation_control() {
            AdaptationControl::Reserved | AdaptationControl::AdaptationFieldOnly => Ok(None),
            AdaptationControl::PayloadOnly => Ok(Some(&self.buf[FIXED_HEADER_SIZE..])),
            AdaptationControl::AdaptationFieldAndPayload => self.mk_payload(),
        }
    }

    #[inline]
    fn mk_payload(&self) -> Result<Option<&'buf [u8]>, PacketError> {
        let offset = ADAPTATION_FIELD_OFFSET + self.adaptation_field_length();
        match offset.cmp(&self.buf.len()) {
            Ordering::Equal => Ok(None),
            Ordering::Greater => Err(PacketError::AdaptationFieldTooLong {
                len: self.adaptation_field_length(),
                max: Self::SIZE - ADAPTATION_FIELD_OFFSET,
            }),
            Ordering::Less => Ok(Some(&self.buf[offset..])),
        }
    }

    /// borrow a reference to the underlying buffer of this packet
    pub fn buffer(&self) -> &'buf [u8] {
        self.buf
    }
}

impl<'buf> fmt::Debug for Packet<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("pid", &self.pid())
            .field("pusi", &self.payload_unit_start_indicator())
            .field("cc", &self.continuity_counter().count())
            .field("adaptation_control", &self.adaptation_control())
            .finish()
    }
}

#[cfg(test)]
mod test {
    use crate::packet::*;
    use assert_matches::assert_matches;

    #[test]
    fn pid() {
        assert!(Pid::try_from(0x2000).is_err());
        assert_eq!(Pid::try_from(0x1fff), Ok(Pid::STUFFING));
    }

    #[test]
    #[should_panic]
    fn zero_len() {
        let buf = [0u8; 0];
        Packet::new(&buf[..]);
    }

    #[test]
    fn try_new_rejects_bad_sync() {
        let buf = [0u8; Packet::SIZE];
        assert!(Packet::try_new(&buf[..]).is_none());
    }

    #[test]
    fn header_fields() {
        let mut buf = [0xffu8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[1] = 0b0100_0001;
        buf[2] = 0x00;
        buf[3] = 0b0001_0111; // payload only, cc=7
        let pk = Packet::new(&buf[..]);
        assert_eq!(pk.pid(), Pid::new(0x100));
        assert!(pk.payload_unit_start_indicator());
        assert!(!pk.transport_error_indicator());
        assert_eq!(pk.adaptation_control(), AdaptationControl::PayloadOnly);
        assert_eq!(pk.continuity_counter().count(), 7);
        assert!(!pk.discontinuity_indicator());
        assert_eq!(pk.payload().unwrap().unwrap().len(), Packet::SIZE - 4);
    }

    #[test]
    fn payload_after_adaptation_field() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0011_0000;
        buf[4] = 10; // adaptation_field_length
        buf[5] = 0b1000_0000; // discontinuity_indicator
        buf[15] = 0xab;
        let pk = Packet::new(&buf[..]);
        assert!(pk.discontinuity_indicator());
        let payload = pk.payload().unwrap().unwrap();
        assert_eq!(payload.len(), Packet::SIZE - 15);
        assert_eq!(payload[0], 0xab);
    }

    #[test]
    fn adaptation_field_fills_packet() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0011_0000;
        buf[4] = 183;
        let pk = Packet::new(&buf[..]);
        assert_matches!(pk.payload(), Ok(None));
    }

    #[test]
    fn adaptation_field_too_long() {
        let mut buf = [0u8; Packet::SIZE];
        buf[0] = Packet::SYNC_BYTE;
        buf[3] = 0b0011_0000;
        buf[4] = 200;
        let pk = Packet::new(&buf[..]);
        assert_matches!(
            pk.payload(),
            Err(PacketError::AdaptationFieldTooLong { len: 200, max: 183 })
        );
    }

    #[test]
    fn continuity_wraps() {
        assert!(ContinuityCounter::new(0).follows(ContinuityCounter::new(15)));
        assert!(!ContinuityCounter::new(3).follows(ContinuityCounter::new(3)));
    }
}
