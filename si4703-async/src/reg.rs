//! Si4703 register map and the chip's fixed-origin bus framing.
//!
//! The Si4703 has no register pointer. A read always starts at STATUSRSSI (0x0A) and wraps
//! around through 0x0F to 0x00, a write always starts at POWERCFG (0x02). The driver keeps a
//! shadow of all sixteen registers, refreshes it with a full read and writes back the control
//! block 0x02..=0x07.

/// 7-bit I2C address of the Si4703.
pub const I2C_ADDRESS: u8 = 0x10;

/// Number of 16-bit registers.
pub const REGISTER_COUNT: usize = 16;
/// Length of a full register read, 0x0A..=0x0F then 0x00..=0x09.
pub const READ_LEN: usize = REGISTER_COUNT * 2;
/// Length of a control block write, 0x02..=0x07.
pub const WRITE_LEN: usize = 12;

const READ_ORIGIN: u8 = 0x0A;
const WRITE_ORIGIN: u8 = 0x02;

/// Register addresses.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Register {
    /// Part number and manufacturer ID.
    DeviceId = 0x00,
    /// Chip revision, device and firmware.
    ChipId = 0x01,
    /// Power configuration, mute, seek control.
    PowerCfg = 0x02,
    /// Tune bit and channel select.
    Channel = 0x03,
    /// Interrupts, RDS enable, de-emphasis, GPIO configuration.
    SysConfig1 = 0x04,
    /// Seek threshold, band, spacing, volume.
    SysConfig2 = 0x05,
    /// Seek tuning detectors.
    SysConfig3 = 0x06,
    /// Oscillator enable and audio high-Z.
    Test1 = 0x07,
    /// Reserved.
    Test2 = 0x08,
    /// Reserved.
    BootConfig = 0x09,
    /// RDS ready, seek/tune complete, RSSI.
    StatusRssi = 0x0A,
    /// RDS block B-D errors and the tuned channel.
    ReadChan = 0x0B,
    /// RDS block A.
    RdsA = 0x0C,
    /// RDS block B.
    RdsB = 0x0D,
    /// RDS block C.
    RdsC = 0x0E,
    /// RDS block D.
    RdsD = 0x0F,
}

// --- DEVICEID ---
/// Silicon Labs manufacturer ID, DEVICEID[11:0].
pub const MANUFACTURER_ID: u16 = 0x242;
pub const MANUFACTURER_ID_MASK: u16 = 0x0FFF;

// --- POWERCFG (0x02) ---
pub const POWERCFG_DSMUTE: u16 = 1 << 15;
pub const POWERCFG_DMUTE: u16 = 1 << 14;
pub const POWERCFG_MONO: u16 = 1 << 13;
pub const POWERCFG_RDSM: u16 = 1 << 11;
pub const POWERCFG_SKMODE: u16 = 1 << 10;
pub const POWERCFG_SEEKUP: u16 = 1 << 9;
pub const POWERCFG_SEEK: u16 = 1 << 8;
pub const POWERCFG_DISABLE: u16 = 1 << 6;
pub const POWERCFG_ENABLE: u16 = 1 << 0;

// --- CHANNEL (0x03) ---
pub const CHANNEL_TUNE: u16 = 1 << 15;
pub const CHANNEL_MASK: u16 = 0x03FF;

// --- SYSCONFIG1 (0x04) ---
pub const SYSCONFIG1_RDSIEN: u16 = 1 << 15;
pub const SYSCONFIG1_STCIEN: u16 = 1 << 14;
pub const SYSCONFIG1_RDS: u16 = 1 << 12;
pub const SYSCONFIG1_DE: u16 = 1 << 11;
pub const SYSCONFIG1_GPIO2_MASK: u16 = 0b11 << 2;
/// GPIO2 drives the STC/RDS interrupt line.
pub const SYSCONFIG1_GPIO2_INTERRUPT: u16 = 0b01 << 2;

// --- SYSCONFIG2 (0x05) ---
pub const SYSCONFIG2_SEEKTH_SHIFT: u16 = 8;
pub const SYSCONFIG2_SEEKTH_MASK: u16 = 0xFF << SYSCONFIG2_SEEKTH_SHIFT;
pub const SYSCONFIG2_BAND_SHIFT: u16 = 6;
pub const SYSCONFIG2_BAND_MASK: u16 = 0b11 << SYSCONFIG2_BAND_SHIFT;
pub const SYSCONFIG2_SPACE_SHIFT: u16 = 4;
pub const SYSCONFIG2_SPACE_MASK: u16 = 0b11 << SYSCONFIG2_SPACE_SHIFT;
pub const SYSCONFIG2_VOLUME_MASK: u16 = 0x000F;

// --- TEST1 (0x07) ---
/// Crystal oscillator enable with the reserved bits at their documented power-up value.
pub const TEST1_XOSC_ENABLE: u16 = 0x8100;

// --- STATUSRSSI (0x0A) ---
pub const STATUS_RDSR: u16 = 1 << 15;
pub const STATUS_STC: u16 = 1 << 14;
pub const STATUS_SFBL: u16 = 1 << 13;
pub const STATUS_AFCRL: u16 = 1 << 12;
pub const STATUS_RDSS: u16 = 1 << 11;
pub const STATUS_BLERA_SHIFT: u16 = 9;
pub const STATUS_ST: u16 = 1 << 8;
pub const STATUS_RSSI_MASK: u16 = 0x00FF;

// --- READCHAN (0x0B) ---
pub const READCHAN_BLERB_SHIFT: u16 = 14;
pub const READCHAN_BLERC_SHIFT: u16 = 12;
pub const READCHAN_BLERD_SHIFT: u16 = 10;
pub const READCHAN_MASK: u16 = 0x03FF;

/// Register index of the `n`th byte pair in a read, starting at STATUSRSSI and wrapping.
pub const fn read_order(n: usize) -> usize {
    (READ_ORIGIN as usize + n) % REGISTER_COUNT
}

/// Register index of the `n`th byte pair in a write, starting at POWERCFG.
pub const fn write_order(n: usize) -> usize {
    WRITE_ORIGIN as usize + n
}

/// Shadow copy of the chip's register file.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Registers {
    words: [u16; REGISTER_COUNT],
}

impl Registers {
    /// All registers zeroed.
    pub const fn new() -> Self {
        Self {
            words: [0; REGISTER_COUNT],
        }
    }

    /// Returns the shadow value of `reg`.
    pub fn get(&self, reg: Register) -> u16 {
        self.words[reg as usize]
    }

    /// Overwrites the shadow value of `reg`.
    pub fn set(&mut self, reg: Register, value: u16) {
        self.words[reg as usize] = value;
    }

    /// Sets `bits` in `reg`.
    pub fn set_bits(&mut self, reg: Register, bits: u16) {
        self.words[reg as usize] |= bits;
    }

    /// Clears `bits` in `reg`.
    pub fn clear_bits(&mut self, reg: Register, bits: u16) {
        self.words[reg as usize] &= !bits;
    }

    /// Replaces the bits selected by `mask` with `value`.
    pub fn update(&mut self, reg: Register, mask: u16, value: u16) {
        let word = &mut self.words[reg as usize];
        *word = (*word & !mask) | (value & mask);
    }

    /// Returns `true` if any of `bits` is set in `reg`.
    pub fn is_set(&self, reg: Register, bits: u16) -> bool {
        self.get(reg) & bits != 0
    }

    /// Refreshes the shadow from a full read starting at STATUSRSSI.
    pub fn load(&mut self, buf: &[u8; READ_LEN]) {
        for (n, pair) in buf.chunks_exact(2).enumerate() {
            self.words[read_order(n)] = u16::from_be_bytes([pair[0], pair[1]]);
        }
    }

    /// Serialises the control block 0x02..=0x07 for a write.
    pub fn control_bytes(&self) -> [u8; WRITE_LEN] {
        let mut buf = [0u8; WRITE_LEN];
        for (n, pair) in buf.chunks_exact_mut(2).enumerate() {
            pair.copy_from_slice(&self.words[write_order(n)].to_be_bytes());
        }
        buf
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Registers {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Registers")
            .field("powercfg", &format_args!("{:#06x}", self.get(Register::PowerCfg)))
            .field("channel", &format_args!("{:#06x}", self.get(Register::Channel)))
            .field("sysconfig1", &format_args!("{:#06x}", self.get(Register::SysConfig1)))
            .field("sysconfig2", &format_args!("{:#06x}", self.get(Register::SysConfig2)))
            .field("statusrssi", &format_args!("{:#06x}", self.get(Register::StatusRssi)))
            .field("readchan", &format_args!("{:#06x}", self.get(Register::ReadChan)))
            .finish()
    }
}
