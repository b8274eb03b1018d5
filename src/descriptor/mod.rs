//! Descriptors provide metadata about an element of a Transport Stream.
//!
//! For example, a descriptor may be used to specify the language of an audio track.  Use of
//! specific descriptors is often not mandatory (many streams do not describe the language of their
//! audio).
//!
//! Only the descriptors which influence how a stream is framed, or which are reported alongside
//! the stream's binding, are decoded; all others are surfaced as
//! [`UnknownDescriptor`](struct.UnknownDescriptor.html).
//!
//! ```
//! # use mpeg2ts_framer::descriptor::{CoreDescriptors, DescriptorIter};
//! let data = [5, 4, b'H', b'E', b'V', b'C'];
//! for d in DescriptorIter::new(&data[..]) {
//!     if let Ok(CoreDescriptors::Registration(reg)) = d {
//!         assert!(reg.is_format(b"HEVC"));
//!     }
//! }
//! ```

pub mod iso_639_language;
pub mod registration;

use self::iso_639_language::Iso639LanguageDescriptor;
use self::registration::RegistrationDescriptor;
use std::fmt;

/// An error during parsing of a descriptor
#[derive(Debug, PartialEq, Eq)]
pub enum DescriptorError {
    /// The amount of data available in the buffer is not enough to hold the descriptor's declared
    /// size.
    NotEnoughData {
        /// descriptor tag value
        tag: u8,
        /// actual buffer size
        actual: usize,
        /// expected buffer size
        expected: usize,
    },
    /// The buffer is too short to even hold the two byte tag and length fields
    BufferTooShort {
        /// the size of the buffer
        buflen: usize,
    },
    /// The descriptor's declared length runs past the end of the buffer
    TagTooLongForBuffer {
        /// the value of the descriptor_length field
        taglen: usize,
        /// the size of the remaining buffer
        buflen: usize,
    },
}

/// A descriptor with a tag value that this crate does not interpret.
pub struct UnknownDescriptor<'buf> {
    /// the descriptor's identifying 'tag' value
    pub tag: u8,
    /// the bytes following the descriptor_length field
    pub payload: &'buf [u8],
}
impl<'buf> fmt::Debug for UnknownDescriptor<'buf> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("UnknownDescriptor")
            .field("tag", &self.tag)
            .field("len", &self.payload.len())
            .finish()
    }
}

/// The descriptors which are understood by this crate.
#[derive(Debug)]
pub enum CoreDescriptors<'buf> {
    /// `registration_descriptor`, tag 5
    Registration(RegistrationDescriptor<'buf>),
    /// `ISO_639_language_descriptor`, tag 10
    Iso639Language(Iso639LanguageDescriptor<'buf>),
    /// any other descriptor
    Unknown(UnknownDescriptor<'buf>),
}
impl<'buf> CoreDescriptors<'buf> {
    /// Parse a single descriptor from the start of the given buffer, which must be exactly the
    /// size of the descriptor (tag, length and payload).
    pub fn from_bytes(buf: &'buf [u8]) -> Result<CoreDescriptors<'buf>, DescriptorError> {
        if buf.len() < 2 {
            return Err(DescriptorError::BufferTooShort { buflen: buf.len() });
        }
        let tag = buf[0];
        let len = buf[1] as usize;
        let tag_end = len + 2;
        if tag_end > buf.len() {
            return Err(DescriptorError::TagTooLongForBuffer {
                taglen: len,
                buflen: buf.len(),
            });
        }
        let payload = &buf[2..tag_end];
        Ok(match tag {
            RegistrationDescriptor::TAG => {
                CoreDescriptors::Registration(RegistrationDescriptor::new(tag, payload)?)
            }
            Iso639LanguageDescriptor::TAG => {
                CoreDescriptors::Iso639Language(Iso639LanguageDescriptor::new(tag, payload)?)
            }
            _ => CoreDescriptors::Unknown(UnknownDescriptor { tag, payload }),
        })
    }
}

/// Iterator over the descriptors in a `descriptor()` loop of a PSI table.
pub struct DescriptorIter<'buf> {
    buf: &'buf [u8],
}
impl<'buf> DescriptorIter<'buf> {
    /// Create an iterator over all the descriptors in the given slice
    pub fn new(buf: &'buf [u8]) -> DescriptorIter<'buf> {
        DescriptorIter { buf }
    }
}
impl<'buf> Iterator for DescriptorIter<'buf> {
    type Item = Result<CoreDescriptors<'buf>, DescriptorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.buf.is_empty() {
            return None;
        }
        if self.buf.len() < 2 {
            let buflen = self.buf.len();
            // ensure another call to next() will yield None,
            self.buf = &self.buf[0..0];
            return Some(Err(DescriptorError::BufferTooShort { buflen }));
        }
        let len = self.buf[1] as usize;
        if len > self.buf.len() - 2 {
            let buflen = self.buf.len();
            self.buf = &self.buf[0..0];
            Some(Err(DescriptorError::TagTooLongForBuffer {
                taglen: len,
                buflen,
            }))
        } else {
            let (desc, rest) = self.buf.split_at(len + 2);
            self.buf = rest;
            Some(CoreDescriptors::from_bytes(desc))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert_matches::assert_matches;
    use hex_literal::*;

    #[test]
    fn iterates_descriptors() {
        let data = hex!("0504 48455643 0a04 656e6700 5201 07");
        let mut iter = DescriptorIter::new(&data[..]);
        assert_matches!(iter.next(), Some(Ok(CoreDescriptors::Registration(_))));
        assert_matches!(iter.next(), Some(Ok(CoreDescriptors::Iso639Language(_))));
        assert_matches!(
            iter.next(),
            Some(Ok(CoreDescriptors::Unknown(UnknownDescriptor { tag: 0x52, .. })))
        );
        assert_matches!(iter.next(), None);
    }

    #[test]
    fn truncated_descriptor() {
        let data = hex!("0a08 656e67");
        let mut iter = DescriptorIter::new(&data[..]);
        assert_matches!(
            iter.next(),
            Some(Err(DescriptorError::TagTooLongForBuffer { taglen: 8, buflen: 5 }))
        );
        assert_matches!(iter.next(), None);
    }
}
