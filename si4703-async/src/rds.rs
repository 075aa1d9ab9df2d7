//! RDS data as the chip hands it over: one group of four blocks per read.

use core::fmt;

use crate::reg::*;

/// Error level reported for a single RDS block, BLERx[1:0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockErrors {
    /// No errors.
    #[default]
    None,
    /// One or two bit errors were corrected.
    Corrected1To2,
    /// Three to five bit errors were corrected.
    Corrected3To5,
    /// Six or more errors; the block content is unreliable.
    Uncorrectable,
}

impl BlockErrors {
    fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b00 => BlockErrors::None,
            0b01 => BlockErrors::Corrected1To2,
            0b10 => BlockErrors::Corrected3To5,
            _ => BlockErrors::Uncorrectable,
        }
    }

    /// Returns `true` if the block content can be trusted.
    pub fn is_usable(self) -> bool {
        self != BlockErrors::Uncorrectable
    }
}

/// Group version, block B bit 11.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupVersion {
    /// Version A, block C carries data.
    A,
    /// Version B, block C repeats the PI code.
    B,
}

/// Group type code and version, e.g. `2A`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupType {
    /// Type code 0-15.
    pub code: u8,
    /// A or B.
    pub version: GroupVersion,
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let version = match self.version {
            GroupVersion::A => 'A',
            GroupVersion::B => 'B',
        };
        write!(f, "{}{}", self.code, version)
    }
}

/// One RDS group exactly as read from RDSA..RDSD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RdsGroup {
    /// Blocks A, B, C and D.
    pub blocks: [u16; 4],
    /// Error level per block, same order.
    pub errors: [BlockErrors; 4],
}

impl RdsGroup {
    /// Creates an error-free group from raw blocks.
    pub const fn new(blocks: [u16; 4]) -> Self {
        Self {
            blocks,
            errors: [BlockErrors::None; 4],
        }
    }

    /// Captures the group held in a freshly loaded register shadow.
    pub(crate) fn from_registers(regs: &Registers) -> Self {
        let status = regs.get(Register::StatusRssi);
        let readchan = regs.get(Register::ReadChan);
        Self {
            blocks: [
                regs.get(Register::RdsA),
                regs.get(Register::RdsB),
                regs.get(Register::RdsC),
                regs.get(Register::RdsD),
            ],
            errors: [
                BlockErrors::from_bits(status >> STATUS_BLERA_SHIFT),
                BlockErrors::from_bits(readchan >> READCHAN_BLERB_SHIFT),
                BlockErrors::from_bits(readchan >> READCHAN_BLERC_SHIFT),
                BlockErrors::from_bits(readchan >> READCHAN_BLERD_SHIFT),
            ],
        }
    }

    /// Program identification code, block A.
    pub fn pi_code(&self) -> u16 {
        self.blocks[0]
    }

    /// Group type, block B[15:11].
    pub fn group_type(&self) -> GroupType {
        let b = self.blocks[1];
        GroupType {
            code: (b >> 12) as u8,
            version: if b & (1 << 11) == 0 {
                GroupVersion::A
            } else {
                GroupVersion::B
            },
        }
    }

    /// Traffic program flag, block B[10].
    pub fn traffic_program(&self) -> bool {
        self.blocks[1] & (1 << 10) != 0
    }

    /// Program type, block B[9:5].
    pub fn program_type(&self) -> u8 {
        ((self.blocks[1] >> 5) & 0x1F) as u8
    }

    /// Returns `true` if none of the blocks is uncorrectable.
    pub fn is_clean(&self) -> bool {
        self.errors.iter().all(|e| e.is_usable())
    }
}

impl fmt::Display for RdsGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.blocks;
        write!(
            f,
            "PI={:#06x} {} PTY={} [{a:04x} {b:04x} {c:04x} {d:04x}]",
            self.pi_code(),
            self.group_type(),
            self.program_type(),
        )?;
        if !self.is_clean() {
            f.write_str(" (uncorrectable)")?;
        }
        Ok(())
    }
}

/// The result of one RDS poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RdsRecord {
    /// No new group since the previous read. RDS is intermittent, this is normal.
    Empty,
    /// A freshly received group.
    Group(RdsGroup),
}

impl RdsRecord {
    /// Returns `true` for [`RdsRecord::Empty`].
    pub fn is_empty(&self) -> bool {
        matches!(self, RdsRecord::Empty)
    }

    /// The group, if one was received.
    pub fn group(&self) -> Option<&RdsGroup> {
        match self {
            RdsRecord::Empty => None,
            RdsRecord::Group(group) => Some(group),
        }
    }
}

impl fmt::Display for RdsRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdsRecord::Empty => f.write_str("(no RDS data)"),
            RdsRecord::Group(group) => group.fmt(f),
        }
    }
}
