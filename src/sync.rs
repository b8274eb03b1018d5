//! Locates transport stream packets within a byte source that may begin part way through a
//! packet, or which may lose synchronisation part way through.
//!
//! The [`PacketReader`](struct.PacketReader.html) pulls data from any `std::io::Read`
//! implementation, and yields 188-byte buffers which are guaranteed to begin with the sync-byte.

use crate::packet::Packet;
use log::warn;
use std::error::Error;
use std::fmt;
use std::io;

const WINDOW: usize = Packet::SIZE * 2;

/// Failures to produce an aligned packet from the byte source.
#[derive(Debug)]
pub enum SyncError {
    /// The byte source was exhausted before packet alignment could be established.
    SyncLost {
        /// stream offset of the first byte in `residual`
        offset: u64,
        /// bytes which were read from the source, but could not be returned as a packet
        residual: Vec<u8>,
    },
    /// The byte source itself failed.
    Io(io::Error),
}
impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncError::SyncLost { offset, residual } => write!(
                f,
                "transport stream sync lost at offset {} ({} bytes unconsumed)",
                offset,
                residual.len()
            ),
            SyncError::Io(e) => write!(f, "reading transport stream failed: {}", e),
        }
    }
}
impl Error for SyncError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SyncError::Io(e) => Some(e),
            SyncError::SyncLost { .. } => None,
        }
    }
}
impl From<io::Error> for SyncError {
    fn from(e: io::Error) -> Self {
        SyncError::Io(e)
    }
}

/// Reads transport stream packets from a byte source.
///
/// When the data at the current position does not start with a sync-byte, the reader looks for
/// an offset at which two sync-bytes appear one packet-length apart, which rejects values of
/// `0x47` that just happen to appear within packet payloads.
pub struct PacketReader<R> {
    source: R,
    buf: [u8; WINDOW],
    len: usize,
    // stream offset of buf[0]
    offset: u64,
    // size of the packet last returned from next_packet(), still held at the front of buf
    returned: usize,
    eof: bool,
}

impl<R: io::Read> PacketReader<R> {
    /// Create a reader that will pull data from the given source.
    pub fn new(source: R) -> PacketReader<R> {
        PacketReader {
            source,
            buf: [0; WINDOW],
            len: 0,
            offset: 0,
            returned: 0,
            eof: false,
        }
    }

    /// The stream offset of the packet most recently returned by `next_packet()`, or of the next
    /// byte to be examined if no packet is currently held.
    pub fn packet_offset(&self) -> u64 {
        self.offset
    }

    /// Produce the next packet, or `Ok(None)` once the byte source has cleanly reached its end.
    ///
    /// A trailing fragment shorter than a whole packet, or a run of data in which no packet
    /// alignment can be found before the source ends, produces `SyncError::SyncLost` carrying
    /// the bytes that could not be used.
    pub fn next_packet(&mut self) -> Result<Option<&[u8]>, SyncError> {
        let returned = self.returned;
        self.returned = 0;
        self.discard(returned);

        self.fill(Packet::SIZE)?;
        if self.len == 0 {
            return Ok(None);
        }
        if self.len < Packet::SIZE {
            return Err(self.lost());
        }
        if !Packet::is_sync_byte(self.buf[0]) {
            self.resync()?;
        }
        self.returned = Packet::SIZE;
        Ok(Some(&self.buf[..Packet::SIZE]))
    }

    /// As `next_packet()`, but also giving the stream offset at which the packet starts.
    pub fn next_packet_at(&mut self) -> Result<Option<(u64, &[u8])>, SyncError> {
        if self.next_packet()?.is_none() {
            return Ok(None);
        }
        Ok(Some((self.offset, &self.buf[..Packet::SIZE])))
    }

    fn resync(&mut self) -> Result<(), SyncError> {
        let start = self.offset;
        loop {
            self.fill(WINDOW)?;
            let len = self.len;
            let buf = &self.buf;
            let found = (0..Packet::SIZE).find(|&i| {
                i + Packet::SIZE < len
                    && Packet::is_sync_byte(buf[i])
                    && Packet::is_sync_byte(buf[i + Packet::SIZE])
            });
            match found {
                Some(i) => {
                    self.discard(i);
                    self.fill(WINDOW)?;
                    break;
                }
                None if self.eof => {
                    // nothing follows that could confirm alignment, but a final packet that
                    // exactly fills the remaining data is accepted
                    if len >= Packet::SIZE && Packet::is_sync_byte(buf[len - Packet::SIZE]) {
                        self.discard(len - Packet::SIZE);
                        break;
                    }
                    return Err(self.lost());
                }
                None => self.discard(Packet::SIZE),
            }
        }
        warn!(
            "resynchronised at offset {} after skipping {} bytes",
            self.offset,
            self.offset - start
        );
        Ok(())
    }

    // read until at least `target` bytes are buffered, or the source ends
    fn fill(&mut self, target: usize) -> Result<(), SyncError> {
        while self.len < target && !self.eof {
            match self.source.read(&mut self.buf[self.len..target]) {
                Ok(0) => self.eof = true,
                Ok(n) => self.len += n,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => (),
                Err(e) => return Err(SyncError::Io(e)),
            }
        }
        Ok(())
    }

    fn discard(&mut self, count: usize) {
        self.buf.copy_within(count..self.len, 0);
        self.len -= count;
        self.offset += count as u64;
    }

    fn lost(&mut self) -> SyncError {
        let residual = self.buf[..self.len].to_vec();
        let offset = self.offset;
        self.offset += self.len as u64;
        self.len = 0;
        SyncError::SyncLost { offset, residual }
    }
}
