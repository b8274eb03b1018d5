//! Tracks the programs announced by the _Program Association Table_ and the elementary streams
//! announced by each program's _Program Map Table_.
//!
//! Entries are only ever added.  Once an elementary PID has been bound to a codec, that binding
//! is kept for the life of the [`ProgramTable`](struct.ProgramTable.html).

use crate::descriptor::CoreDescriptors;
use crate::packet::Pid;
use crate::psi::pat::{PatSection, ProgramDescriptor};
use crate::psi::pmt::{PmtSection, StreamInfo};
use crate::StreamType;
use fixedbitset::FixedBitSet;
use log::{debug, warn};
use std::collections::BTreeMap;
use std::fmt;

/// The coding of an elementary stream, as far as framing is concerned.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Codec {
    /// _ITU-T Rec. H.264_ video
    H264,
    /// _ITU-T Rec. H.265_ video
    H265,
    /// AAC audio, in either ADTS or LATM syntax
    Aac,
    /// MPEG-1 or MPEG-2 audio
    MpegAudio,
    /// A stream that is tracked, but whose data is never framed
    Unsupported,
}
impl Codec {
    /// The way PES data for this codec is split into frames
    pub fn pes_role(self) -> PesRole {
        match self {
            Codec::H264 | Codec::H265 => PesRole::Video,
            Codec::Aac | Codec::MpegAudio => PesRole::Audio,
            Codec::Unsupported => PesRole::Other,
        }
    }

    fn classify(info: &StreamInfo<'_>) -> Codec {
        match info.stream_type() {
            StreamType::H264 => Codec::H264,
            StreamType::H265 => Codec::H265,
            StreamType::ADTS | StreamType::LATM => Codec::Aac,
            StreamType::ISO_11172_AUDIO | StreamType::ISO_138183_AUDIO => Codec::MpegAudio,
            StreamType::H222_0_PES_PRIVATE_DATA => {
                let hevc = info.descriptors().any(|d| match d {
                    Ok(CoreDescriptors::Registration(reg)) => reg.is_format(b"HEVC"),
                    _ => false,
                });
                if hevc {
                    Codec::H265
                } else {
                    Codec::Unsupported
                }
            }
            _ => Codec::Unsupported,
        }
    }
}
impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Codec::H264 => "h264",
            Codec::H265 => "h265",
            Codec::Aac => "aac",
            Codec::MpegAudio => "mpeg-audio",
            Codec::Unsupported => "unsupported",
        })
    }
}

/// How the PES payload of a stream is handled
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum PesRole {
    /// framed by the audio segmenter
    Audio,
    /// framed into access units by the video splitter
    Video,
    /// not framed
    Other,
}

/// A program announced in the _Program Association Table_
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Program {
    /// the `program_number` from the PAT entry
    pub program_number: u16,
    /// the PID carrying this program's _Program Map Table_
    pub pid: Pid,
}

/// The association of an elementary PID with the codec of the data it carries.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct StreamBinding {
    /// PID of the packets carrying the stream
    pub elementary_pid: Pid,
    /// the raw `stream_type` from the PMT
    pub stream_type: StreamType,
    /// the codec derived from `stream_type` and the stream's descriptors
    pub codec: Codec,
    /// how the stream's PES data is framed
    pub pes_role: PesRole,
    /// the program whose PMT announced the stream
    pub program_number: u16,
    /// the first language code given by an `ISO_639_language_descriptor`, if any
    pub language: Option<String>,
}
impl StreamBinding {
    fn from_stream_info(program_number: u16, info: &StreamInfo<'_>) -> StreamBinding {
        let codec = Codec::classify(info);
        let language = info.descriptors().find_map(|d| match d {
            Ok(CoreDescriptors::Iso639Language(lang)) => {
                lang.languages().next().map(|l| l.code().into_owned())
            }
            _ => None,
        });
        StreamBinding {
            elementary_pid: info.elementary_pid(),
            stream_type: info.stream_type(),
            codec,
            pes_role: codec.pes_role(),
            program_number,
            language,
        }
    }
}

/// All programs and elementary streams discovered so far.
pub struct ProgramTable {
    programs: Vec<Program>,
    pmt_pids: FixedBitSet,
    elementary_pids: FixedBitSet,
    streams: BTreeMap<Pid, StreamBinding>,
}
impl Default for ProgramTable {
    fn default() -> Self {
        ProgramTable {
            programs: vec![],
            pmt_pids: FixedBitSet::with_capacity(Pid::PID_COUNT),
            elementary_pids: FixedBitSet::with_capacity(Pid::PID_COUNT),
            streams: BTreeMap::new(),
        }
    }
}
impl ProgramTable {
    /// Record the programs listed in the given PAT section.  Entries for the network PID are
    /// ignored.
    pub fn apply_pat(&mut self, pat: &PatSection<'_>) {
        for desc in pat.programs() {
            match desc {
                ProgramDescriptor::Program {
                    program_number,
                    pid,
                } => {
                    let program = Program {
                        program_number,
                        pid,
                    };
                    if self.programs.contains(&program) {
                        continue;
                    }
                    if pid == Pid::PAT || self.elementary_pids.contains(usize::from(pid)) {
                        warn!(
                            "program {} PMT on {} which already carries other data",
                            program_number, pid
                        );
                        continue;
                    }
                    debug!("new program {} with PMT on {}", program_number, pid);
                    self.programs.push(program);
                    self.pmt_pids.insert(usize::from(pid));
                }
                ProgramDescriptor::Network { pid } => {
                    debug!("ignoring network information table on {}", pid);
                }
            }
        }
    }

    /// Record the elementary streams listed in the given PMT section, which was received on
    /// `pmt_pid` and has the given `program_number`, returning the bindings which were not
    /// previously known.
    pub fn apply_pmt(
        &mut self,
        pmt_pid: Pid,
        program_number: u16,
        pmt: &PmtSection<'_>,
    ) -> Vec<StreamBinding> {
        let mut added = vec![];
        for info in pmt.streams() {
            let binding = StreamBinding::from_stream_info(program_number, &info);
            let pid = binding.elementary_pid;
            if self.pmt_pids.contains(usize::from(pid)) || pid == Pid::PAT {
                warn!(
                    "program {} (PMT on {}) lists elementary stream on PSI pid {}",
                    program_number, pmt_pid, pid
                );
                continue;
            }
            if let Some(existing) = self.streams.get(&pid) {
                if existing.codec != binding.codec {
                    warn!(
                        "{} announced as {} by program {}, keeping earlier binding as {}",
                        pid, binding.codec, program_number, existing.codec
                    );
                }
                continue;
            }
            debug!(
                "program {} stream {:?} on {} framed as {}",
                program_number, binding.stream_type, pid, binding.codec
            );
            self.elementary_pids.insert(usize::from(pid));
            self.streams.insert(pid, binding.clone());
            added.push(binding);
        }
        added
    }

    /// true if the PAT has announced that the given PID carries a PMT
    pub fn is_pmt_pid(&self, pid: Pid) -> bool {
        self.pmt_pids.contains(usize::from(pid))
    }

    /// true if some PMT has announced an elementary stream on the given PID
    pub fn is_elementary_pid(&self, pid: Pid) -> bool {
        self.elementary_pids.contains(usize::from(pid))
    }

    /// The binding for the given elementary PID, if one has been announced
    pub fn binding(&self, pid: Pid) -> Option<&StreamBinding> {
        self.streams.get(&pid)
    }

    /// The programs announced so far, in order of discovery
    pub fn programs(&self) -> &[Program] {
        &self.programs
    }

    /// All stream bindings, in ascending PID order
    pub fn streams(&self) -> impl Iterator<Item = &StreamBinding> {
        self.streams.values()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::*;

    // H264 on 0x100, ADTS on 0x101 ('eng'), HEVC registered private data on 0x102, an
    // unsupported private stream on 0x103 and MPEG-2 audio on 0x104
    const PMT: [u8; 41] = hex!(
        "E100F000 1BE100F000 0FE101F006 0a04656e6700 06E102F006 050448455643 86E103F000 04E104F000"
    );

    fn table() -> ProgramTable {
        let mut table = ProgramTable::default();
        let pat = PatSection::from_bytes(&hex!("0000E010 0001F000")).unwrap();
        table.apply_pat(&pat);
        table
    }

    #[test]
    fn pat() {
        let table = table();
        assert_eq!(
            table.programs(),
            &[Program {
                program_number: 1,
                pid: Pid::new(0x1000)
            }]
        );
        assert!(table.is_pmt_pid(Pid::new(0x1000)));
        assert!(!table.is_pmt_pid(Pid::new(0x10)));
    }

    #[test]
    fn classification() {
        let mut table = table();
        let pmt = PmtSection::from_bytes(&PMT).unwrap();
        let added = table.apply_pmt(Pid::new(0x1000), 1, &pmt);
        assert_eq!(added.len(), 5);
        let codec = |pid| table.binding(Pid::new(pid)).map(|b| b.codec);
        assert_eq!(codec(0x100), Some(Codec::H264));
        assert_eq!(codec(0x101), Some(Codec::Aac));
        assert_eq!(codec(0x102), Some(Codec::H265));
        assert_eq!(codec(0x103), Some(Codec::Unsupported));
        assert_eq!(codec(0x104), Some(Codec::MpegAudio));
        assert_eq!(codec(0x105), None);
        let aac = table.binding(Pid::new(0x101)).unwrap();
        assert_eq!(aac.pes_role, PesRole::Audio);
        assert_eq!(aac.language.as_deref(), Some("eng"));
        assert_eq!(aac.program_number, 1);
        let other = table.binding(Pid::new(0x103)).unwrap();
        assert_eq!(other.pes_role, PesRole::Other);
        assert_eq!(other.stream_type, StreamType(0x86));
        assert!(table.is_elementary_pid(Pid::new(0x103)));
    }

    #[test]
    fn reapply_is_idempotent() {
        let mut table = table();
        let pmt = PmtSection::from_bytes(&PMT).unwrap();
        assert_eq!(table.apply_pmt(Pid::new(0x1000), 1, &pmt).len(), 5);
        assert!(table.apply_pmt(Pid::new(0x1000), 1, &pmt).is_empty());
        assert_eq!(table.streams().count(), 5);
    }

    #[test]
    fn pid_reuse_keeps_first_binding() {
        let mut table = table();
        let first = PmtSection::from_bytes(&hex!("E100F000 1BE100F000")).unwrap();
        table.apply_pmt(Pid::new(0x1000), 1, &first);
        let second = PmtSection::from_bytes(&hex!("E100F000 0FE100F000")).unwrap();
        assert!(table.apply_pmt(Pid::new(0x1000), 1, &second).is_empty());
        assert_eq!(
            table.binding(Pid::new(0x100)).map(|b| b.codec),
            Some(Codec::H264)
        );
    }

    #[test]
    fn stream_on_pmt_pid_ignored() {
        let mut table = table();
        let pmt = PmtSection::from_bytes(&hex!("F000F000 1BF000F000")).unwrap();
        assert!(table.apply_pmt(Pid::new(0x1000), 1, &pmt).is_empty());
        assert!(!table.is_elementary_pid(Pid::new(0x1000)));
    }
}
