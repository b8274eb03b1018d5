//! Helpers for tests: a frame sink that records what it is given, and a builder for synthetic
//! transport streams.

use crate::frame::{Frame, FrameSink};
use crate::mpegts_crc;
use crate::packet::{Packet, Pid};
use crate::program::Codec;

/// Records `(pid, codec, payload, pts, dts)` for every frame
#[derive(Default)]
pub struct Collect {
    pub frames: Vec<(Pid, Codec, Vec<u8>, Option<u64>, Option<u64>)>,
    pub packets: usize,
}
impl FrameSink for Collect {
    fn frame(&mut self, frame: &Frame<'_>) {
        self.frames.push((
            frame.pid,
            frame.codec,
            frame.payload.to_vec(),
            frame.pts.map(|t| t.value()),
            frame.dts.map(|t| t.value()),
        ));
    }

    fn packet(&mut self, _pk: &Packet<'_>) {
        self.packets += 1;
    }
}
impl Collect {
    pub fn for_pid(&self, pid: u16) -> Vec<&(Pid, Codec, Vec<u8>, Option<u64>, Option<u64>)> {
        self.frames
            .iter()
            .filter(|f| f.0 == Pid::new(pid))
            .collect()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

const PAYLOAD_SIZE: usize = Packet::SIZE - 4;

/// Builds a transport stream one packet at a time, keeping a continuity counter per PID
pub struct TsBuilder {
    data: Vec<u8>,
    cc: Vec<u8>,
}
impl Default for TsBuilder {
    fn default() -> Self {
        TsBuilder {
            data: vec![],
            cc: vec![0; Pid::PID_COUNT],
        }
    }
}
impl TsBuilder {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Append arbitrary bytes which are not a packet
    pub fn raw(&mut self, data: &[u8]) -> &mut Self {
        self.data.extend_from_slice(data);
        self
    }

    /// Make the next packet on `pid` skip one continuity counter value
    pub fn skip_cc(&mut self, pid: u16) -> &mut Self {
        let cc = &mut self.cc[pid as usize];
        *cc = (*cc + 1) & 0xf;
        self
    }

    /// One packet carrying up to 184 bytes of payload.  A shorter payload is preceded by
    /// adaptation field stuffing.
    pub fn packet(&mut self, pid: u16, unit_start: bool, payload: &[u8]) -> &mut Self {
        assert!(payload.len() <= PAYLOAD_SIZE);
        let cc = self.cc[pid as usize];
        self.cc[pid as usize] = (cc + 1) & 0xf;
        let pusi = if unit_start { 0b0100_0000 } else { 0 };
        self.data.push(Packet::SYNC_BYTE);
        self.data.push(pusi | (pid >> 8) as u8);
        self.data.push(pid as u8);
        if payload.len() == PAYLOAD_SIZE {
            self.data.push(0b0001_0000 | cc);
        } else {
            self.data.push(0b0011_0000 | cc);
            let af_len = PAYLOAD_SIZE - 1 - payload.len();
            self.data.push(af_len as u8);
            if af_len > 0 {
                // no flags set, then stuffing
                self.data.push(0);
                self.data.extend(std::iter::repeat(0xff).take(af_len - 1));
            }
        }
        self.data.extend_from_slice(payload);
        self
    }

    /// A single-packet PSI section, with a correct CRC
    pub fn section(
        &mut self,
        pid: u16,
        table_id: u8,
        id: u16,
        version: u8,
        body: &[u8],
    ) -> &mut Self {
        let sect = section_bytes(table_id, id, version, body);
        let mut payload = vec![0];
        payload.extend_from_slice(&sect);
        payload.resize(PAYLOAD_SIZE, 0xff);
        self.packet(pid, true, &payload)
    }

    /// A PAT listing the given `(program_number, pmt_pid)` pairs
    pub fn pat(&mut self, version: u8, programs: &[(u16, u16)]) -> &mut Self {
        let mut body = vec![];
        for &(program_number, pid) in programs {
            body.extend_from_slice(&program_number.to_be_bytes());
            body.extend_from_slice(&(0xe000 | pid).to_be_bytes());
        }
        self.section(0, 0, 1, version, &body)
    }

    /// A PMT listing the given `(stream_type, elementary_pid, descriptors)` entries
    pub fn pmt(
        &mut self,
        pid: u16,
        program_number: u16,
        version: u8,
        streams: &[(u8, u16, &[u8])],
    ) -> &mut Self {
        let body = pmt_body(streams);
        self.section(pid, 2, program_number, version, &body)
    }

    /// A PES packet split across as many TS packets as needed
    pub fn pes(
        &mut self,
        pid: u16,
        stream_id: u8,
        pts: Option<u64>,
        dts: Option<u64>,
        payload: &[u8],
    ) -> &mut Self {
        let pes = pes_bytes(stream_id, pts, dts, payload);
        for (i, chunk) in pes.chunks(PAYLOAD_SIZE).enumerate() {
            self.packet(pid, i == 0, chunk);
        }
        self
    }
}

pub fn pmt_body(streams: &[(u8, u16, &[u8])]) -> Vec<u8> {
    let pcr_pid = streams.first().map(|s| s.1).unwrap_or(0x1fff);
    let mut body = vec![];
    body.extend_from_slice(&(0xe000 | pcr_pid).to_be_bytes());
    body.extend_from_slice(&[0xf0, 0x00]);
    for &(stream_type, pid, descriptors) in streams {
        body.push(stream_type);
        body.extend_from_slice(&(0xe000 | pid).to_be_bytes());
        body.extend_from_slice(&(0xf000 | descriptors.len() as u16).to_be_bytes());
        body.extend_from_slice(descriptors);
    }
    body
}

/// A complete section in the long section syntax, ending with its `CRC_32`
pub fn section_bytes(table_id: u8, id: u16, version: u8, body: &[u8]) -> Vec<u8> {
    let section_length = 5 + body.len() + 4;
    let mut sect = vec![table_id];
    sect.extend_from_slice(&(0xb000 | section_length as u16).to_be_bytes());
    sect.extend_from_slice(&id.to_be_bytes());
    // reserved bits, version_number, current_next_indicator=1
    sect.push(0b1100_0001 | (version & 0x1f) << 1);
    // section_number, last_section_number
    sect.extend_from_slice(&[0, 0]);
    sect.extend_from_slice(body);
    let crc = mpegts_crc::sum32(&sect);
    sect.extend_from_slice(&crc.to_be_bytes());
    sect
}

fn timestamp_bytes(prefix: u8, ts: u64) -> [u8; 5] {
    [
        prefix << 4 | ((ts >> 29) & 0b1110) as u8 | 1,
        (ts >> 22) as u8,
        ((ts >> 14) & 0b1111_1110) as u8 | 1,
        (ts >> 7) as u8,
        ((ts << 1) & 0b1111_1110) as u8 | 1,
    ]
}

/// A PES packet.  Video streams get an unbounded `PES_packet_length`, others a bounded one.
pub fn pes_bytes(stream_id: u8, pts: Option<u64>, dts: Option<u64>, payload: &[u8]) -> Vec<u8> {
    let mut header_data = vec![];
    let flags = match (pts, dts) {
        (Some(pts), Some(dts)) => {
            header_data.extend_from_slice(&timestamp_bytes(0b0011, pts));
            header_data.extend_from_slice(&timestamp_bytes(0b0001, dts));
            0b1100_0000
        }
        (Some(pts), None) => {
            header_data.extend_from_slice(&timestamp_bytes(0b0010, pts));
            0b1000_0000
        }
        _ => 0,
    };
    let len = 3 + header_data.len() + payload.len();
    let pes_packet_length = if stream_id & 0xf0 == 0xe0 || len > 0xffff {
        0
    } else {
        len as u16
    };
    let mut pes = vec![0, 0, 1, stream_id];
    pes.extend_from_slice(&pes_packet_length.to_be_bytes());
    pes.push(0b1000_0000);
    pes.push(flags);
    pes.push(header_data.len() as u8);
    pes.extend_from_slice(&header_data);
    pes.extend_from_slice(payload);
    pes
}

#[test]
fn built_packets_decode() {
    let mut ts = TsBuilder::default();
    ts.pat(0, &[(1, 0x1000)]).pes(0x100, 0xe0, Some(900), None, &[0xaa; 400]);
    let data = ts.into_bytes();
    assert_eq!(data.len() % Packet::SIZE, 0);
    let mut payload = vec![];
    for (i, buf) in data.chunks(Packet::SIZE).enumerate().skip(1) {
        let pk = Packet::new(buf);
        assert_eq!(pk.pid(), Pid::new(0x100));
        assert_eq!(pk.continuity_counter().count() as usize, i - 1);
        payload.extend_from_slice(pk.payload().unwrap().unwrap());
    }
    assert_eq!(payload, pes_bytes(0xe0, Some(900), None, &[0xaa; 400]));
    let header = crate::pes::PesHeader::from_bytes(&payload).unwrap();
    assert_eq!(header.pts().map(|t| t.value()), Some(900));
}
