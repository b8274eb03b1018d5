//! Types related to the _Program Association Table_

use crate::packet::Pid;
use crate::psi::SectionError;

/// The `table_id` of a Program Association Section
pub const TABLE_ID: u8 = 0x00;

/// One entry of the Program Association Table
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramDescriptor {
    /// `program_number` zero gives the PID of the _Network Information Table_
    Network {
        /// The PID of NIT packets
        pid: Pid,
    },
    /// associates a program number with the PID carrying that program's PMT
    Program {
        /// The id of this program
        program_number: u16,
        /// The PID at which the program's PMT will be found
        pid: Pid,
    },
}

impl ProgramDescriptor {
    const SIZE: usize = 4;

    /// panics if fewer than 4 bytes are provided
    pub fn from_bytes(data: &[u8]) -> ProgramDescriptor {
        let program_number = (u16::from(data[0]) << 8) | u16::from(data[1]);
        let pid = Pid::new((u16::from(data[2]) & 0b0001_1111) << 8 | u16::from(data[3]));
        if program_number == 0 {
            ProgramDescriptor::Network { pid }
        } else {
            ProgramDescriptor::Program {
                program_number,
                pid,
            }
        }
    }

    /// The PID referred to by this entry
    pub fn pid(&self) -> Pid {
        match *self {
            ProgramDescriptor::Network { pid } => pid,
            ProgramDescriptor::Program { pid, .. } => pid,
        }
    }
}

/// Sections of the _Program Association Table_ give details of the programs within a transport
/// stream.  There may be only one program, or in the case of a broadcast multiplex, there may
/// be many.
#[derive(Clone, Debug)]
pub struct PatSection<'buf> {
    data: &'buf [u8],
}
impl<'buf> PatSection<'buf> {
    /// Wrap the body of a Program Association Section (the entries between the table syntax
    /// header and the `CRC_32`).
    pub fn from_bytes(data: &'buf [u8]) -> Result<PatSection<'buf>, SectionError> {
        if data.len() % ProgramDescriptor::SIZE != 0 {
            return Err(SectionError::NotEnoughData {
                field: "program_association_section",
                expected: (data.len() / ProgramDescriptor::SIZE + 1) * ProgramDescriptor::SIZE,
                actual: data.len(),
            });
        }
        Ok(PatSection { data })
    }

    /// Iterate over the entries of this section
    pub fn programs(&self) -> impl Iterator<Item = ProgramDescriptor> + 'buf {
        self.data
            .chunks_exact(ProgramDescriptor::SIZE)
            .map(ProgramDescriptor::from_bytes)
    }
}
