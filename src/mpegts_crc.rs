// CRC-32/MPEG-2: polynomial 0x04c11db7, initial value 0xffffffff, no reflection, no final xor.

const POLY: u32 = 0x04c1_1db7;

const TABLE: [u32; 256] = make_table();

const fn make_table() -> [u32; 256] {
    let mut table = [0u32; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = (i as u32) << 24;
        let mut bit = 0;
        while bit < 8 {
            crc = if crc & 0x8000_0000 != 0 {
                (crc << 1) ^ POLY
            } else {
                crc << 1
            };
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

/// Computes the CRC over the given data.  Running this over a whole PSI section, including its
/// trailing `CRC_32` field, gives `0` when the section is intact.
pub fn sum32(data: &[u8]) -> u32 {
    let mut crc = 0xffff_ffffu32;
    for &b in data {
        crc = (crc << 8) ^ TABLE[((crc >> 24) ^ u32::from(b)) as usize];
    }
    crc
}

#[cfg(test)]
mod test {
    use super::*;
    use hex_literal::*;

    #[test]
    fn check_value() {
        assert_eq!(sum32(b"123456789"), 0x0376_e6e7);
    }

    #[test]
    fn whole_section_sums_to_zero() {
        // PAT section with a single program, including CRC_32
        let sect = hex!("00B00D0001C100000001F0002AB104B2");
        assert_eq!(sum32(&sect[..]), 0);
    }
}
