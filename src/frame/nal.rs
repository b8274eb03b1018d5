//! Locating and classifying the NAL units of H.264 and H.265 elementary streams.

/// The position of a start code within a buffer.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct StartCode {
    /// offset of the first byte of the start code (the leading zero of `00 00 00 01`)
    pub start: usize,
    /// offset of the `00 00 01` sequence
    pub prefix: usize,
}
impl StartCode {
    /// offset of the first byte of the NAL unit following the start code
    pub fn nal_start(&self) -> usize {
        self.prefix + 3
    }
}

/// Finds the first `00 00 01` sequence at or after offset `from`.
///
/// A zero byte immediately preceding the sequence is treated as part of a four byte start code.
pub fn find_start_code(buf: &[u8], from: usize) -> Option<StartCode> {
    if buf.len() < 3 || from > buf.len() - 3 {
        return None;
    }
    let mut i = from;
    while i + 2 < buf.len() {
        // skip ahead quickly over anything that can't be the final byte of a start code
        match buf[i + 2] {
            0x01 if buf[i] == 0 && buf[i + 1] == 0 => {
                let start = if i > 0 && buf[i - 1] == 0 { i - 1 } else { i };
                return Some(StartCode { start, prefix: i });
            }
            0x00 => i += 1,
            _ => i += 3,
        }
    }
    None
}

/// How a NAL unit affects access unit boundary detection
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NalClass {
    /// a parameter set, SEI, or access unit delimiter, which precedes the slices of an access
    /// unit
    Marker,
    /// a slice of coded picture data
    Vcl,
    /// anything else, which has no influence on boundaries
    Other,
}

/// The NAL unit header syntax of a video codec
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum NalSyntax {
    /// _ITU-T Rec. H.264_, one byte NAL unit header
    H264,
    /// _ITU-T Rec. H.265_, two byte NAL unit header
    H265,
}
impl NalSyntax {
    /// The size of the NAL unit header in bytes
    pub fn header_len(self) -> usize {
        match self {
            NalSyntax::H264 => 1,
            NalSyntax::H265 => 2,
        }
    }

    /// The `nal_unit_type` given by the first byte of the NAL unit header
    pub fn nal_unit_type(self, header: u8) -> u8 {
        match self {
            NalSyntax::H264 => header & 0b0001_1111,
            NalSyntax::H265 => (header >> 1) & 0b0011_1111,
        }
    }

    /// Classify the NAL unit whose header begins with the given byte
    pub fn classify(self, header: u8) -> NalClass {
        let nal_unit_type = self.nal_unit_type(header);
        match self {
            NalSyntax::H264 => match nal_unit_type {
                1..=5 => NalClass::Vcl,
                // SEI, SPS, PPS, AUD
                6..=9 => NalClass::Marker,
                _ => NalClass::Other,
            },
            NalSyntax::H265 => match nal_unit_type {
                0..=9 | 16..=21 => NalClass::Vcl,
                // VPS, SPS, PPS, AUD, prefix SEI
                32..=35 | 39 => NalClass::Marker,
                _ => NalClass::Other,
            },
        }
    }

    /// true if the NAL unit whose header begins with the given byte is an access unit delimiter
    pub fn is_aud(self, header: u8) -> bool {
        match self {
            NalSyntax::H264 => self.nal_unit_type(header) == 9,
            NalSyntax::H265 => self.nal_unit_type(header) == 35,
        }
    }

    /// Skips over any access unit delimiters at the very start of `au`, returning the rest.
    pub fn strip_leading_auds(self, au: &[u8]) -> &[u8] {
        let mut au = au;
        while let Some(sc) = find_start_code(au, 0) {
            if sc.start != 0 || sc.nal_start() >= au.len() || !self.is_aud(au[sc.nal_start()]) {
                break;
            }
            au = match find_start_code(au, sc.nal_start()) {
                Some(next) => &au[next.start..],
                None => &au[au.len()..],
            };
        }
        au
    }
}
