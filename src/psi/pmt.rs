//! Types related to the _Program Map Table_

use crate::descriptor::{CoreDescriptors, DescriptorError, DescriptorIter};
use crate::packet::Pid;
use crate::psi::SectionError;
use crate::StreamType;
use log::warn;
use std::fmt;

/// The `table_id` of a Program Map Section
pub const TABLE_ID: u8 = 0x02;

/// Sections of the _Program Map Table_ give details of the streams within a particular program
pub struct PmtSection<'buf> {
    data: &'buf [u8],
}
impl<'buf> fmt::Debug for PmtSection<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("PmtSection")
            .field("pcr_pid", &self.pcr_pid())
            .field(
                "descriptors",
                &DescriptorsDebug(&self.data[Self::HEADER_SIZE..self.descriptor_end()]),
            )
            .field("streams", &StreamsDebug(self))
            .finish()
    }
}
struct StreamsDebug<'a, 'buf>(&'a PmtSection<'buf>);
impl<'a, 'buf> fmt::Debug for StreamsDebug<'a, 'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(self.0.streams()).finish()
    }
}
struct DescriptorsDebug<'buf>(&'buf [u8]);
impl<'buf> fmt::Debug for DescriptorsDebug<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_list().entries(DescriptorIter::new(self.0)).finish()
    }
}

impl<'buf> PmtSection<'buf> {
    const HEADER_SIZE: usize = 4;

    /// Wrap the body of a Program Map Section (the data between the table syntax header and the
    /// `CRC_32`), checking that the program-level descriptor loop fits.
    pub fn from_bytes(data: &'buf [u8]) -> Result<PmtSection<'buf>, SectionError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(SectionError::NotEnoughData {
                field: "program_map_section",
                expected: Self::HEADER_SIZE,
                actual: data.len(),
            });
        }
        let sect = PmtSection { data };
        if sect.descriptor_end() > data.len() {
            return Err(SectionError::NotEnoughData {
                field: "program_info",
                expected: sect.descriptor_end(),
                actual: data.len(),
            });
        }
        Ok(sect)
    }

    /// Returns the Pid of packets that will contain the Program Clock Reference for this program
    pub fn pcr_pid(&self) -> Pid {
        Pid::new(u16::from(self.data[0] & 0b0001_1111) << 8 | u16::from(self.data[1]))
    }
    fn program_info_length(&self) -> usize {
        (u16::from(self.data[2] & 0b0000_1111) << 8 | u16::from(self.data[3])) as usize
    }
    fn descriptor_end(&self) -> usize {
        Self::HEADER_SIZE + self.program_info_length()
    }
    /// Returns an iterator over the descriptors attached to this PMT section.
    pub fn descriptors(&self) -> DescriptorIter<'buf> {
        DescriptorIter::new(&self.data[Self::HEADER_SIZE..self.descriptor_end()])
    }
    /// Returns an iterator over the streams of which this program is composed.  Iteration stops
    /// at a stream entry whose `ES_info_length` runs past the end of the section.
    pub fn streams(&self) -> impl Iterator<Item = StreamInfo<'buf>> {
        StreamInfoIter {
            buf: &self.data[self.descriptor_end()..],
        }
    }
}

struct StreamInfoIter<'buf> {
    buf: &'buf [u8],
}
impl<'buf> Iterator for StreamInfoIter<'buf> {
    type Item = StreamInfo<'buf>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        match StreamInfo::from_bytes(self.buf) {
            Ok((stream_info, info_len)) => {
                self.buf = &self.buf[info_len..];
                Some(stream_info)
            }
            Err(e) => {
                warn!("stopping at malformed PMT stream entry: {}", e);
                self.buf = &self.buf[0..0];
                None
            }
        }
    }
}

/// Details of a particular elementary stream within a program.
///
///  - `stream_type` gives an indication of the kind of content carried within the stream
///  - The `elementary_pid` property allows us to find Transport Stream packets that belong to the
///    elementary stream
///  - `descriptors` _may_ provide extra metadata describing some of the
///     stream's properties (for example, the stream's 'language' might be given in a descriptor;
///     or it might not)
pub struct StreamInfo<'buf> {
    data: &'buf [u8],
}

impl<'buf> StreamInfo<'buf> {
    const HEADER_SIZE: usize = 5;

    fn from_bytes(data: &'buf [u8]) -> Result<(StreamInfo<'buf>, usize), SectionError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(SectionError::NotEnoughData {
                field: "stream info",
                expected: Self::HEADER_SIZE,
                actual: data.len(),
            });
        }
        let result = StreamInfo { data };
        let descriptor_end = Self::HEADER_SIZE + result.es_info_length();
        if descriptor_end > data.len() {
            return Err(SectionError::NotEnoughData {
                field: "ES_info",
                expected: descriptor_end,
                actual: data.len(),
            });
        }
        Ok((
            StreamInfo {
                data: &data[..descriptor_end],
            },
            descriptor_end,
        ))
    }

    /// The type of this stream
    pub fn stream_type(&self) -> StreamType {
        StreamType(self.data[0])
    }
    /// The Pid that will be used for TS packets containing the data of this stream
    pub fn elementary_pid(&self) -> Pid {
        Pid::new(u16::from(self.data[1] & 0b0001_1111) << 8 | u16::from(self.data[2]))
    }
    fn es_info_length(&self) -> usize {
        (u16::from(self.data[3] & 0b0000_1111) << 8 | u16::from(self.data[4])) as usize
    }

    /// Returns an iterator over the descriptors attached to this stream
    pub fn descriptors(
        &self,
    ) -> impl Iterator<Item = Result<CoreDescriptors<'buf>, DescriptorError>> + 'buf {
        DescriptorIter::new(&self.data[Self::HEADER_SIZE..])
    }
}
impl<'buf> fmt::Debug for StreamInfo<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("StreamInfo")
            .field("stream_type", &self.stream_type())
            .field("elementary_pid", &self.elementary_pid())
            .field(
                "descriptors",
                &DescriptorsDebug(&self.data[Self::HEADER_SIZE..]),
            )
            .finish()
    }
}
