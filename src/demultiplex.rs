//! Main API to this library: the [`Demuxer`](struct.Demuxer.html) reads transport stream
//! packets, tracks the programs announced by the PAT and PMTs, and passes each complete frame
//! of the announced audio and video streams to a [`FrameSink`](../frame/trait.FrameSink.html).
//!
//! State for each PID is created when the PID is first announced (PMT PIDs by the PAT,
//! elementary PIDs by a PMT), and then lives as long as the `Demuxer`.  Packets on PIDs which
//! have not been announced are ignored.

use crate::frame::audio::AudioSegmenter;
use crate::frame::nal::NalSyntax;
use crate::frame::video::VideoSplitter;
use crate::frame::FrameSink;
use crate::packet::{ContinuityCounter, Packet, PacketError, Pid};
use crate::pes::{PesAccumulator, PesError, PesProgress, Timestamp};
use crate::program::{Codec, PesRole, ProgramTable, StreamBinding};
use crate::psi::pat::{self, PatSection};
use crate::psi::pmt::{self, PmtSection};
use crate::psi::{CurrentNext, SectionBuffer, SectionError, TableSection, VersionFilter};
use crate::sync::{PacketReader, SyncError};
use fixedbitset::FixedBitSet;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::io;

/// Settings controlling how strictly the stream is checked.
#[derive(Debug, Clone)]
pub struct DemuxOptions {
    /// Reject PAT and PMT sections whose `CRC_32` is incorrect.  Defaults to `true`.
    pub verify_crc: bool,
    /// Drop the rest of a PES packet once a continuity counter gap reveals that some of its
    /// data is missing.  Defaults to `true`.
    pub discard_on_discontinuity: bool,
}
impl Default for DemuxOptions {
    fn default() -> Self {
        DemuxOptions {
            verify_crc: true,
            discard_on_discontinuity: true,
        }
    }
}
impl DemuxOptions {
    /// Change the `verify_crc` setting
    pub fn with_verify_crc(mut self, verify_crc: bool) -> Self {
        self.verify_crc = verify_crc;
        self
    }

    /// Change the `discard_on_discontinuity` setting
    pub fn with_discard_on_discontinuity(mut self, discard: bool) -> Self {
        self.discard_on_discontinuity = discard;
        self
    }
}

/// Problems which stop the demultiplexer.
///
/// Frames emitted before the error was returned remain valid, and data still buffered can be
/// recovered by calling [`Demuxer::flush()`](struct.Demuxer.html#method.flush).
#[derive(Debug)]
pub enum DemuxError {
    /// Packet alignment could not be found, or the byte source failed
    Sync(SyncError),
    /// A transport stream packet header was malformed
    Header {
        /// stream offset of the packet
        offset: u64,
        /// PID of the packet
        pid: Pid,
        /// the problem with the header
        err: PacketError,
    },
    /// A PAT or PMT section could not be decoded
    Section {
        /// stream offset of the packet completing the section
        offset: u64,
        /// PID the section was carried on
        pid: Pid,
        /// the problem with the section
        err: SectionError,
    },
    /// A PES packet started while the header of the previous PES packet on the same PID was
    /// still incomplete
    PesIncomplete {
        /// stream offset of the packet starting the new PES packet
        offset: u64,
        /// PID of the elementary stream
        pid: Pid,
    },
}
impl fmt::Display for DemuxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DemuxError::Sync(e) => fmt::Display::fmt(e, f),
            DemuxError::Header { offset, pid, err } => {
                write!(f, "packet at offset {} on {}: {}", offset, pid, err)
            }
            DemuxError::Section { offset, pid, err } => {
                write!(f, "section at offset {} on {}: {}", offset, pid, err)
            }
            DemuxError::PesIncomplete { offset, pid } => write!(
                f,
                "PES packet at offset {} on {} started before previous PES header was complete",
                offset, pid
            ),
        }
    }
}
impl Error for DemuxError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DemuxError::Sync(e) => Some(e),
            DemuxError::Header { err, .. } => Some(err),
            DemuxError::Section { err, .. } => Some(err),
            DemuxError::PesIncomplete { .. } => None,
        }
    }
}
impl From<SyncError> for DemuxError {
    fn from(e: SyncError) -> Self {
        DemuxError::Sync(e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableKind {
    Pat,
    Pmt,
}
impl TableKind {
    fn table_id(self) -> u8 {
        match self {
            TableKind::Pat => pat::TABLE_ID,
            TableKind::Pmt => pmt::TABLE_ID,
        }
    }
}

struct PsiStream {
    kind: TableKind,
    sections: SectionBuffer,
    // keyed by table_id_extension, since one PID may carry the PMTs of several programs
    versions: BTreeMap<u16, VersionFilter>,
}
impl PsiStream {
    fn new(kind: TableKind) -> PsiStream {
        PsiStream {
            kind,
            sections: SectionBuffer::new(),
            versions: BTreeMap::new(),
        }
    }
}

enum Framer {
    Video(VideoSplitter),
    Audio(AudioSegmenter),
}
impl Framer {
    fn push<S: FrameSink + ?Sized>(
        &mut self,
        data: &[u8],
        unit_start: bool,
        pts: Option<Timestamp>,
        dts: Option<Timestamp>,
        sink: &mut S,
    ) {
        match self {
            Framer::Video(v) => v.push(data, pts, dts, sink),
            Framer::Audio(a) => a.push(data, unit_start, pts, dts, sink),
        }
    }

    fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        match self {
            Framer::Video(v) => v.flush(sink),
            Framer::Audio(a) => a.flush(sink),
        }
    }
}

struct PesStream {
    pid: Pid,
    pes: PesAccumulator,
    framer: Framer,
    last_cc: Option<ContinuityCounter>,
}
impl PesStream {
    fn new(binding: &StreamBinding) -> Option<PesStream> {
        let pid = binding.elementary_pid;
        let framer = match (binding.pes_role, binding.codec) {
            (PesRole::Video, Codec::H264) => {
                Framer::Video(VideoSplitter::new(pid, binding.codec, NalSyntax::H264))
            }
            (PesRole::Video, _) => {
                Framer::Video(VideoSplitter::new(pid, binding.codec, NalSyntax::H265))
            }
            (PesRole::Audio, _) => Framer::Audio(AudioSegmenter::new(pid, binding.codec)),
            (PesRole::Other, _) => return None,
        };
        Some(PesStream {
            pid,
            pes: PesAccumulator::default(),
            framer,
            last_cc: None,
        })
    }

    // true if the packet should be processed
    fn check_continuity(&mut self, pk: &Packet<'_>, options: &DemuxOptions) -> bool {
        if !pk.adaptation_control().has_payload() {
            return true;
        }
        let cc = pk.continuity_counter();
        let last = self.last_cc.replace(cc);
        match last {
            Some(last) if cc == last && !pk.discontinuity_indicator() => {
                debug!("{} duplicate packet cc={}", self.pid, cc.count());
                false
            }
            Some(last) if !cc.follows(last) && !pk.discontinuity_indicator() => {
                warn!(
                    "{} continuity counter gap, {} followed by {}",
                    self.pid,
                    last.count(),
                    cc.count()
                );
                if options.discard_on_discontinuity {
                    self.pes.discard();
                }
                true
            }
            _ => true,
        }
    }

    fn packet<S: FrameSink + ?Sized>(
        &mut self,
        offset: u64,
        pk: &Packet<'_>,
        payload: Option<&[u8]>,
        options: &DemuxOptions,
        sink: &mut S,
    ) -> Result<(), DemuxError> {
        if !self.check_continuity(pk, options) {
            return Ok(());
        }
        let payload = match payload {
            Some(p) => p,
            None => return Ok(()),
        };
        let progress = if pk.payload_unit_start_indicator() {
            self.pes.unit_start(payload)
        } else {
            self.pes.continuation(payload)
        };
        match progress {
            Ok(PesProgress::Ready { unit_start }) => {
                let (pts, dts) = (self.pes.pts(), self.pes.dts());
                self.framer
                    .push(self.pes.available(), unit_start, pts, dts, sink);
                Ok(())
            }
            Ok(PesProgress::Pending) | Ok(PesProgress::Ignored) => Ok(()),
            Err(PesError::NeedMoreData { .. }) => Err(DemuxError::PesIncomplete {
                offset,
                pid: self.pid,
            }),
            Err(e) => {
                warn!("{} discarding PES packet at offset {}: {}", self.pid, offset, e);
                Ok(())
            }
        }
    }
}

enum StreamState {
    Psi(PsiStream),
    Pes(PesStream),
    // announced by a PMT, but with a codec that is not framed
    Unframed,
}

/// Transport stream demultiplexer.
///
/// ```
/// use mpeg2ts_framer::demultiplex::{DemuxOptions, Demuxer};
/// use mpeg2ts_framer::frame::Frame;
///
/// let mut demux = Demuxer::new(DemuxOptions::default().with_verify_crc(false));
/// let mut sink = |frame: &Frame<'_>| {
///     println!("{} {} pts={:?}ms", frame.pid, frame.codec, frame.pts_ms());
/// };
/// // a lone null packet
/// let mut pk = [0xffu8; 188];
/// pk[..4].copy_from_slice(&[0x47, 0x1f, 0xff, 0x10]);
/// demux.run(&pk[..], &mut sink).unwrap();
/// assert!(demux.programs().programs().is_empty());
/// ```
pub struct Demuxer {
    options: DemuxOptions,
    streams: Vec<Option<StreamState>>,
    table: ProgramTable,
    unknown_pids: FixedBitSet,
    // stream offset of the next packet given to push_packet()
    next_offset: u64,
    flushed: bool,
    warned_late: bool,
}

impl Demuxer {
    /// Create a demultiplexer which is initially aware only of the PAT.
    pub fn new(options: DemuxOptions) -> Demuxer {
        let mut streams = Vec::with_capacity(Pid::PID_COUNT);
        streams.resize_with(Pid::PID_COUNT, || None);
        streams[usize::from(Pid::PAT)] = Some(StreamState::Psi(PsiStream::new(TableKind::Pat)));
        Demuxer {
            options,
            streams,
            table: ProgramTable::default(),
            unknown_pids: FixedBitSet::with_capacity(Pid::PID_COUNT),
            next_offset: 0,
            flushed: false,
            warned_late: false,
        }
    }

    /// Read and process packets until the byte source is exhausted, then flush all streams.
    ///
    /// The source may begin part way through a packet.  On error the streams are not flushed.
    pub fn run<R: io::Read, S: FrameSink + ?Sized>(
        &mut self,
        source: R,
        sink: &mut S,
    ) -> Result<(), DemuxError> {
        let mut reader = PacketReader::new(source);
        while let Some((offset, buf)) = reader.next_packet_at()? {
            if self.flushed {
                self.late_packet();
                break;
            }
            self.next_offset = offset + Packet::SIZE as u64;
            self.packet(offset, &Packet::new(buf), sink)?;
        }
        self.flush(sink);
        Ok(())
    }

    /// Process one packet, which must be exactly 188 bytes starting with the sync-byte.
    ///
    /// Offsets given in errors assume that successive calls pass successive packets of the
    /// stream.
    pub fn push_packet<S: FrameSink + ?Sized>(
        &mut self,
        buf: &[u8],
        sink: &mut S,
    ) -> Result<(), DemuxError> {
        let offset = self.next_offset;
        let pk = Packet::try_new(buf).ok_or_else(|| {
            DemuxError::Sync(SyncError::SyncLost {
                offset,
                residual: buf.to_vec(),
            })
        })?;
        self.next_offset += Packet::SIZE as u64;
        if self.flushed {
            self.late_packet();
            return Ok(());
        }
        self.packet(offset, &pk, sink)
    }

    /// Emit the data buffered for every stream as a final frame.  Streams are flushed in
    /// ascending PID order, and only the first call has any effect.
    pub fn flush<S: FrameSink + ?Sized>(&mut self, sink: &mut S) {
        if self.flushed {
            return;
        }
        self.flushed = true;
        for state in self.streams.iter_mut().flatten() {
            if let StreamState::Pes(stream) = state {
                stream.framer.flush(sink);
            }
        }
    }

    /// The programs and streams announced so far
    pub fn programs(&self) -> &ProgramTable {
        &self.table
    }

    fn late_packet(&mut self) {
        if !self.warned_late {
            warn!("ignoring packets given after the demuxer was flushed");
            self.warned_late = true;
        }
    }

    fn packet<S: FrameSink + ?Sized>(
        &mut self,
        offset: u64,
        pk: &Packet<'_>,
        sink: &mut S,
    ) -> Result<(), DemuxError> {
        sink.packet(pk);
        let pid = pk.pid();
        let idx = usize::from(pid);
        match self.streams[idx] {
            None => {
                if !self.unknown_pids.put(idx) {
                    debug!("ignoring packets on unannounced {}", pid);
                }
                return Ok(());
            }
            Some(StreamState::Unframed) => return Ok(()),
            _ => (),
        }
        if pk.transport_error_indicator() {
            warn!("{} packet at offset {} has transport_error_indicator set", pid, offset);
            return Ok(());
        }
        let payload = pk
            .payload()
            .map_err(|err| DemuxError::Header { offset, pid, err })?;
        if let Some(StreamState::Pes(stream)) = &mut self.streams[idx] {
            return stream.packet(offset, pk, payload, &self.options, sink);
        }
        match payload {
            Some(payload) => self.psi_packet(offset, pk, payload),
            None => Ok(()),
        }
    }

    fn psi_packet(
        &mut self,
        offset: u64,
        pk: &Packet<'_>,
        payload: &[u8],
    ) -> Result<(), DemuxError> {
        let pid = pk.pid();
        let idx = usize::from(pid);
        // the PSI state is taken out of the arena while its sections update the other entries
        let mut psi = match self.streams[idx].take() {
            Some(StreamState::Psi(psi)) => psi,
            other => {
                self.streams[idx] = other;
                return Ok(());
            }
        };
        let verify_crc = self.options.verify_crc;
        let kind = psi.kind;
        let versions = &mut psi.versions;
        let result =
            psi.sections
                .push(pk.payload_unit_start_indicator(), payload, |data| {
                    let sect = TableSection::from_bytes(data, verify_crc)?;
                    self.table_section(pid, kind, versions, &sect)
                });
        self.streams[idx] = Some(StreamState::Psi(psi));
        result.map_err(|err| DemuxError::Section { offset, pid, err })
    }

    fn table_section(
        &mut self,
        pid: Pid,
        kind: TableKind,
        versions: &mut BTreeMap<u16, VersionFilter>,
        sect: &TableSection<'_>,
    ) -> Result<(), SectionError> {
        if sect.header.table_id != kind.table_id() {
            warn!(
                "{} expected table_id {:#04x}, but got {:#04x}",
                pid,
                kind.table_id(),
                sect.header.table_id
            );
            return Ok(());
        }
        if sect.syntax.current_next_indicator() == CurrentNext::Next {
            return Ok(());
        }
        if !versions.entry(sect.syntax.id()).or_default().is_new(&sect.syntax) {
            return Ok(());
        }
        match kind {
            TableKind::Pat => {
                let pat = PatSection::from_bytes(sect.body())?;
                debug!("{} PAT version {}", pid, sect.syntax.version());
                self.apply_pat(&pat);
            }
            TableKind::Pmt => {
                let pmt = PmtSection::from_bytes(sect.body())?;
                debug!(
                    "{} PMT for program {} version {}",
                    pid,
                    sect.syntax.id(),
                    sect.syntax.version()
                );
                self.apply_pmt(pid, sect.syntax.id(), &pmt);
            }
        }
        Ok(())
    }

    fn apply_pat(&mut self, pat: &PatSection<'_>) {
        self.table.apply_pat(pat);
        for program in self.table.programs() {
            let slot = &mut self.streams[usize::from(program.pid)];
            if slot.is_none() {
                *slot = Some(StreamState::Psi(PsiStream::new(TableKind::Pmt)));
            }
        }
    }

    fn apply_pmt(&mut self, pmt_pid: Pid, program_number: u16, pmt: &PmtSection<'_>) {
        for binding in self.table.apply_pmt(pmt_pid, program_number, pmt) {
            let slot = &mut self.streams[usize::from(binding.elementary_pid)];
            if slot.is_some() {
                continue;
            }
            *slot = Some(match PesStream::new(&binding) {
                Some(stream) => StreamState::Pes(stream),
                None => StreamState::Unframed,
            });
        }
    }
}
