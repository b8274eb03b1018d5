//! Types for processing tables of *Program Specific Information* in a transport stream.
//!
//! # Concepts
//!
//! * There are multiple standard types of Program Specific Information, like the *Program
//!   Association Table* and *Program Map Table*.
//! * A PSI *Table* can split into *Sections*
//! * A Section can be split across a small number of individual transport stream *Packets*, and
//!   a single packet may carry the end of one section followed by the start of others.
//!
//! # Core types
//!
//! * [`SectionBuffer`](struct.SectionBuffer.html) converts packet payloads into whole *Sections*
//! * [`TableSection`](struct.TableSection.html) checks the 'section syntax' framing of a section,
//!   and exposes the table-specific body
//! * [`VersionFilter`](struct.VersionFilter.html) suppresses sections that repeat a table version
//!   which has already been processed
//!
//! The specific types of table are defined in the [`pat`](pat/index.html) and
//! [`pmt`](pmt/index.html) modules.

pub mod pat;
pub mod pmt;

use crate::mpegts_crc;
use fixedbitset::FixedBitSet;
use log::warn;
use std::error::Error;
use std::fmt;

/// Problems found while reassembling or checking a PSI section.
#[derive(Debug, PartialEq, Eq)]
pub enum SectionError {
    /// There was not enough data to decode the named structure
    NotEnoughData {
        /// the structure being decoded
        field: &'static str,
        /// bytes required
        expected: usize,
        /// bytes available
        actual: usize,
    },
    /// the `pointer_field` pointed past the end of the packet payload
    PointerBeyondPayload {
        /// the `pointer_field` value
        pointer: usize,
        /// the payload bytes following the `pointer_field`
        available: usize,
    },
    /// `section_length` exceeded the maximum allowed for PSI tables
    SectionTooLong {
        /// the `section_length` field value
        section_length: usize,
    },
    /// A table that is defined to use 'section syntax' had `section_syntax_indicator` unset
    MissingSectionSyntax {
        /// the `table_id` of the section
        table_id: u8,
    },
    /// The `CRC_32` at the end of the section did not match the section data
    CrcMismatch {
        /// the `table_id` of the section
        table_id: u8,
    },
}
impl fmt::Display for SectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionError::NotEnoughData {
                field,
                expected,
                actual,
            } => write!(
                f,
                "{} requires {} bytes, only {} available",
                field, expected, actual
            ),
            SectionError::PointerBeyondPayload { pointer, available } => write!(
                f,
                "pointer_field {} beyond end of payload ({} bytes)",
                pointer, available
            ),
            SectionError::SectionTooLong { section_length } => {
                write!(f, "section_length {} too long", section_length)
            }
            SectionError::MissingSectionSyntax { table_id } => {
                write!(f, "table_id {:#04x} requires section syntax", table_id)
            }
            SectionError::CrcMismatch { table_id } => {
                write!(f, "section crc check failed for table_id {:#04x}", table_id)
            }
        }
    }
}
impl Error for SectionError {}

/// Value of the `current_next_indicator` field
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CurrentNext {
    /// The section is applicable immediately
    Current,
    /// The section will become applicable at some future point
    Next,
}

impl From<u8> for CurrentNext {
    fn from(v: u8) -> CurrentNext {
        if v & 1 == 0 {
            CurrentNext::Next
        } else {
            CurrentNext::Current
        }
    }
}

/// The fields which appear at the start of every PSI section.
#[derive(Debug, PartialEq, Eq)]
pub struct SectionCommonHeader {
    /// identifies the kind of table (`0x00` for a PAT, `0x02` for a PMT)
    pub table_id: u8,
    /// true if the section uses the common syntax described by
    /// [`TableSyntaxHeader`](struct.TableSyntaxHeader.html)
    pub section_syntax_indicator: bool,
    /// the `private_indicator` bit
    pub private_indicator: bool,
    /// number of bytes following the `section_length` field
    pub section_length: usize,
}

impl SectionCommonHeader {
    /// The size of the header in bytes
    pub const SIZE: usize = 3;

    /// Largest `section_length` allowed for the tables defined by _ISO/IEC 13818-1_
    pub const MAX_SECTION_LENGTH: usize = 1021;

    /// Decode the header from the first three bytes of the given slice.
    pub fn new(buf: &[u8]) -> Result<SectionCommonHeader, SectionError> {
        if buf.len() < Self::SIZE {
            return Err(SectionError::NotEnoughData {
                field: "section header",
                expected: Self::SIZE,
                actual: buf.len(),
            });
        }
        Ok(SectionCommonHeader {
            table_id: buf[0],
            section_syntax_indicator: buf[1] & 0b1000_0000 != 0,
            private_indicator: buf[1] & 0b0100_0000 != 0,
            section_length: ((u16::from(buf[1] & 0b0000_1111) << 8) | u16::from(buf[2])) as usize,
        })
    }

    /// The size of the whole section, including this header
    pub fn total_size(&self) -> usize {
        Self::SIZE + self.section_length
    }
}

/// Represents the fields that appear within table sections that use the common 'section syntax'.
pub struct TableSyntaxHeader<'buf> {
    buf: &'buf [u8],
}

impl<'buf> TableSyntaxHeader<'buf> {
    /// The size of the header in bytes
    pub const SIZE: usize = 5;

    /// panics if fewer than `SIZE` bytes are given
    pub fn new(buf: &'buf [u8]) -> TableSyntaxHeader<'buf> {
        assert!(buf.len() >= Self::SIZE);
        TableSyntaxHeader { buf }
    }
    /// The initial 16-bit field within a 'section syntax' PSI table (`transport_stream_id` within
    /// a PAT, `program_number` within a PMT).
    pub fn id(&self) -> u16 {
        u16::from(self.buf[0]) << 8 | u16::from(self.buf[1])
    }
    /// A 5-bit value that changes whenever the content of the table changes.
    pub fn version(&self) -> u8 {
        (self.buf[2] >> 1) & 0b0001_1111
    }
    /// Is this table applicable now, or will it become applicable at some future time.
    pub fn current_next_indicator(&self) -> CurrentNext {
        CurrentNext::from(self.buf[2])
    }
    /// The number of this section, within a potentially multi-section table.
    pub fn section_number(&self) -> u8 {
        self.buf[3]
    }
    /// The `section_number()` of the final section of the table.
    pub fn last_section_number(&self) -> u8 {
        self.buf[4]
    }
}
impl<'buf> fmt::Debug for TableSyntaxHeader<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("TableSyntaxHeader")
            .field("id", &self.id())
            .field("version", &self.version())
            .field("current_next_indicator", &self.current_next_indicator())
            .field("section_number", &self.section_number())
            .field("last_section_number", &self.last_section_number())
            .finish()
    }
}

/// A complete section using the common 'section syntax', whose `CRC_32` has optionally been
/// checked.
#[derive(Debug)]
pub struct TableSection<'buf> {
    /// common section header
    pub header: SectionCommonHeader,
    /// section syntax fields
    pub syntax: TableSyntaxHeader<'buf>,
    body: &'buf [u8],
}
impl<'buf> TableSection<'buf> {
    const CRC_SIZE: usize = 4;

    /// Wrap the given section, which must be exactly `3 + section_length` bytes long.
    pub fn from_bytes(
        data: &'buf [u8],
        verify_crc: bool,
    ) -> Result<TableSection<'buf>, SectionError> {
        let header = SectionCommonHeader::new(data)?;
        if !header.section_syntax_indicator {
            return Err(SectionError::MissingSectionSyntax {
                table_id: header.table_id,
            });
        }
        let min = SectionCommonHeader::SIZE + TableSyntaxHeader::SIZE + Self::CRC_SIZE;
        if header.total_size() < min || header.total_size() > data.len() {
            return Err(SectionError::NotEnoughData {
                field: "table section",
                expected: header.total_size().max(min),
                actual: data.len(),
            });
        }
        let data = &data[..header.total_size()];
        if verify_crc && mpegts_crc::sum32(data) != 0 {
            return Err(SectionError::CrcMismatch {
                table_id: header.table_id,
            });
        }
        let syntax = TableSyntaxHeader::new(&data[SectionCommonHeader::SIZE..]);
        let body = &data[SectionCommonHeader::SIZE + TableSyntaxHeader::SIZE
            ..data.len() - Self::CRC_SIZE];
        Ok(TableSection {
            header,
            syntax,
            body,
        })
    }

    /// The table-specific data between the syntax header and the `CRC_32`
    pub fn body(&self) -> &'buf [u8] {
        self.body
    }
}

/// Collects the payloads of the packets of a single PSI PID into whole sections.
///
/// Sections that fit within a single packet are passed on without being copied.  Sections that
/// span packets are collected into an internal buffer.
#[derive(Default)]
pub struct SectionBuffer {
    buf: Vec<u8>,
    // true while buf holds the start of a section awaiting continuation packets
    collecting: bool,
}

impl SectionBuffer {
    const STUFFING: u8 = 0xff;

    /// Create an empty buffer
    pub fn new() -> SectionBuffer {
        SectionBuffer::default()
    }

    /// Discard any partially collected section
    pub fn reset(&mut self) {
        self.buf.clear();
        self.collecting = false;
    }

    /// Process the payload of one packet, calling `section()` once for every section that is
    /// completed by this payload.  The slice given to `section()` is exactly `3 + section_length`
    /// bytes long.
    pub fn push<F>(
        &mut self,
        unit_start: bool,
        payload: &[u8],
        mut section: F,
    ) -> Result<(), SectionError>
    where
        F: FnMut(&[u8]) -> Result<(), SectionError>,
    {
        if !unit_start {
            if !self.collecting {
                warn!("PSI continuation packet without a preceding section start");
                return Ok(());
            }
            return self.continue_section(payload, &mut section);
        }
        if payload.is_empty() {
            self.reset();
            return Err(SectionError::NotEnoughData {
                field: "pointer_field",
                expected: 1,
                actual: 0,
            });
        }
        let pointer = payload[0] as usize;
        let rest = &payload[1..];
        if pointer > rest.len() {
            self.reset();
            return Err(SectionError::PointerBeyondPayload {
                pointer,
                available: rest.len(),
            });
        }
        let (tail, mut rest) = rest.split_at(pointer);
        if self.collecting {
            self.continue_section(tail, &mut section)?;
            if self.collecting {
                warn!(
                    "new section started before previous section of {} bytes completed",
                    self.buf.len()
                );
                self.reset();
            }
        }
        while !rest.is_empty() && rest[0] != Self::STUFFING {
            if rest.len() < SectionCommonHeader::SIZE {
                self.start_collecting(rest);
                break;
            }
            let header = SectionCommonHeader::new(rest)?;
            if header.section_length > SectionCommonHeader::MAX_SECTION_LENGTH {
                return Err(SectionError::SectionTooLong {
                    section_length: header.section_length,
                });
            }
            let size = header.total_size();
            if size > rest.len() {
                self.start_collecting(rest);
                break;
            }
            let (sect, remaining) = rest.split_at(size);
            section(sect)?;
            rest = remaining;
        }
        Ok(())
    }

    fn start_collecting(&mut self, data: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(data);
        self.collecting = true;
    }

    fn continue_section<F>(&mut self, data: &[u8], section: &mut F) -> Result<(), SectionError>
    where
        F: FnMut(&[u8]) -> Result<(), SectionError>,
    {
        if self.buf.len() < SectionCommonHeader::SIZE {
            let needed = (SectionCommonHeader::SIZE - self.buf.len()).min(data.len());
            self.buf.extend_from_slice(&data[..needed]);
            if self.buf.len() < SectionCommonHeader::SIZE {
                return Ok(());
            }
            return self.continue_section(&data[needed..], section);
        }
        let header = SectionCommonHeader::new(&self.buf[..])?;
        if header.section_length > SectionCommonHeader::MAX_SECTION_LENGTH {
            self.reset();
            return Err(SectionError::SectionTooLong {
                section_length: header.section_length,
            });
        }
        let remaining = header.total_size() - self.buf.len();
        if data.len() < remaining {
            self.buf.extend_from_slice(data);
            return Ok(());
        }
        // anything following the end of the section in this payload is stuffing
        self.buf.extend_from_slice(&data[..remaining]);
        self.collecting = false;
        let result = section(&self.buf[..]);
        self.buf.clear();
        result
    }
}

/// Tracks which sections of one table have already been processed, so that the periodic
/// retransmission of an unchanged table can be ignored.
pub struct VersionFilter {
    version: Option<u8>,
    seen: FixedBitSet,
}
impl Default for VersionFilter {
    fn default() -> Self {
        VersionFilter {
            version: None,
            seen: FixedBitSet::with_capacity(256),
        }
    }
}
impl VersionFilter {
    /// Returns `true` if the given section has not been seen before for the current
    /// `version_number`, recording it as seen.  A change of version forgets all earlier
    /// sections.
    pub fn is_new(&mut self, syntax: &TableSyntaxHeader<'_>) -> bool {
        let version = syntax.version();
        if self.version != Some(version) {
            self.version = Some(version);
            self.seen.clear();
        }
        let num = syntax.section_number() as usize;
        if self.seen.contains(num) {
            false
        } else {
            self.seen.insert(num);
            true
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use hex_literal::*;

    // PAT with a single program, including CRC_32
    const PAT: [u8; 16] = hex!("00B00D0001C100000001F0002AB104B2");

    fn collect(buf: &mut SectionBuffer, unit_start: bool, payload: &[u8]) -> Vec<Vec<u8>> {
        let mut sections = vec![];
        buf.push(unit_start, payload, |s| {
            sections.push(s.to_vec());
            Ok(())
        })
        .unwrap();
        sections
    }

    #[test]
    fn single_section() {
        let mut payload = vec![0];
        payload.extend_from_slice(&PAT);
        payload.resize(184, 0xff);
        let mut buf = SectionBuffer::new();
        assert_eq!(collect(&mut buf, true, &payload), vec![PAT.to_vec()]);
    }

    #[test]
    fn pointer_field_skips_tail_of_earlier_section() {
        let mut payload = vec![3, 0xaa, 0xbb, 0xcc];
        payload.extend_from_slice(&PAT);
        let mut buf = SectionBuffer::new();
        assert_eq!(collect(&mut buf, true, &payload), vec![PAT.to_vec()]);
    }

    #[test]
    fn section_spanning_packets() {
        for split in [1usize, 2, 3, 5, 10, 15] {
            let mut buf = SectionBuffer::new();
            let mut first = vec![0];
            first.extend_from_slice(&PAT[..split]);
            assert!(collect(&mut buf, true, &first).is_empty());
            let mut second = PAT[split..].to_vec();
            second.extend_from_slice(&[0xff; 10]);
            assert_eq!(
                collect(&mut buf, false, &second),
                vec![PAT.to_vec()],
                "split={}",
                split
            );
        }
    }

    #[test]
    fn end_of_section_located_by_pointer() {
        let mut buf = SectionBuffer::new();
        let mut first = vec![0];
        first.extend_from_slice(&PAT[..6]);
        assert!(collect(&mut buf, true, &first).is_empty());
        let mut second = vec![10];
        second.extend_from_slice(&PAT[6..]);
        second.extend_from_slice(&PAT);
        assert_eq!(
            collect(&mut buf, true, &second),
            vec![PAT.to_vec(), PAT.to_vec()]
        );
    }

    #[test]
    fn several_sections_in_one_packet() {
        let mut payload = vec![0];
        payload.extend_from_slice(&PAT);
        payload.extend_from_slice(&PAT);
        payload.extend_from_slice(&[0xff; 4]);
        let mut buf = SectionBuffer::new();
        assert_eq!(collect(&mut buf, true, &payload).len(), 2);
    }

    #[test]
    fn continuation_outside_section() {
        let mut buf = SectionBuffer::new();
        assert!(collect(&mut buf, false, &PAT).is_empty());
    }

    #[test]
    fn pointer_beyond_payload() {
        let mut buf = SectionBuffer::new();
        assert_matches!(
            buf.push(true, &[5, 0, 0], |_| Ok(())),
            Err(SectionError::PointerBeyondPayload {
                pointer: 5,
                available: 2
            })
        );
    }

    #[test]
    fn section_too_long() {
        let mut buf = SectionBuffer::new();
        assert_matches!(
            buf.push(true, &hex!("00 02B3FF"), |_| Ok(())),
            Err(SectionError::SectionTooLong {
                section_length: 0x3ff
            })
        );
    }

    #[test]
    fn table_section() {
        let sect = TableSection::from_bytes(&PAT, true).unwrap();
        assert_eq!(sect.header.table_id, 0);
        assert_eq!(sect.syntax.id(), 1);
        assert_eq!(sect.syntax.version(), 0);
        assert_eq!(sect.syntax.current_next_indicator(), CurrentNext::Current);
        assert_eq!(sect.body(), &hex!("0001F000")[..]);
    }

    #[test]
    fn crc_mismatch() {
        let mut sect = PAT;
        sect[9] ^= 1;
        assert_matches!(
            TableSection::from_bytes(&sect, true),
            Err(SectionError::CrcMismatch { table_id: 0 })
        );
        assert!(TableSection::from_bytes(&sect, false).is_ok());
    }

    #[test]
    fn missing_section_syntax() {
        let mut sect = PAT;
        sect[1] &= 0x7f;
        assert_matches!(
            TableSection::from_bytes(&sect, false),
            Err(SectionError::MissingSectionSyntax { table_id: 0 })
        );
    }

    #[test]
    fn version_filter() {
        let mut filter = VersionFilter::default();
        let v0 = hex!("0001C10000");
        let v1 = hex!("0001C30000");
        assert!(filter.is_new(&TableSyntaxHeader::new(&v0)));
        assert!(!filter.is_new(&TableSyntaxHeader::new(&v0)));
        assert!(filter.is_new(&TableSyntaxHeader::new(&v1)));
        assert!(filter.is_new(&TableSyntaxHeader::new(&v0)));
    }
}
