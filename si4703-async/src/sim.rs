//! A register-level model of the Si4703 that speaks the async I2C trait.
//!
//! It frames reads and writes like the real part, runs the TUNE/SEEK/STC handshakes instantly,
//! and hands out queued RDS groups, one per register read, once the RDS decoder has locked after
//! a tune. Faults can be injected to exercise the driver's error paths.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{self, ErrorKind, NoAcknowledgeSource, Operation, SevenBitAddress};
use heapless::{Deque, Vec};

use crate::band::{Band, BandPlan, Channel, Spacing};
use crate::rds::RdsGroup;
use crate::reg::*;

/// Power-on DEVICEID of the Si4703.
pub const SI4703_DEVICE_ID: u16 = 0x1242;
/// Power-on CHIPID of a revision C part running firmware 19.
pub const SI4703_CHIP_ID: u16 = 0x1253;

const MAX_STATIONS: usize = 32;
const MAX_QUEUED_GROUPS: usize = 32;

/// Error returned by [`SimulatedSi4703`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimError {
    /// Nobody acknowledged the address.
    Nack,
    /// Injected transient bus fault.
    Bus,
}

impl i2c::Error for SimError {
    fn kind(&self) -> ErrorKind {
        match self {
            SimError::Nack => ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address),
            SimError::Bus => ErrorKind::Bus,
        }
    }
}

/// Simulated Si4703 at address 0x10.
pub struct SimulatedSi4703 {
    regs: [u16; REGISTER_COUNT],
    present: bool,
    stall_tune: bool,
    stall_seek: bool,
    stuck_channel: Option<Channel>,
    passing_transactions: u32,
    failing_transactions: u32,
    reads: u32,
    writes: u32,
    /// RDS decoder locked; reads hand out queued groups.
    settled: bool,
    /// STC dropped after a tune; the decoder locks after the next read.
    locking: bool,
    stations: Vec<Channel, MAX_STATIONS>,
    rds: Deque<RdsGroup, MAX_QUEUED_GROUPS>,
    repeat_rds: bool,
}

impl Default for SimulatedSi4703 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedSi4703 {
    /// A powered-down chip at its reset state.
    pub fn new() -> Self {
        let mut regs = [0u16; REGISTER_COUNT];
        regs[Register::DeviceId as usize] = SI4703_DEVICE_ID;
        regs[Register::ChipId as usize] = SI4703_CHIP_ID;
        Self {
            regs,
            present: true,
            stall_tune: false,
            stall_seek: false,
            stuck_channel: None,
            passing_transactions: 0,
            failing_transactions: 0,
            reads: 0,
            writes: 0,
            settled: false,
            locking: false,
            stations: Vec::new(),
            rds: Deque::new(),
            repeat_rds: false,
        }
    }

    /// A bus with nothing attached: every transaction is NACKed.
    pub fn absent() -> Self {
        Self {
            present: false,
            ..Self::new()
        }
    }

    /// Replaces DEVICEID, e.g. to model a different part answering at 0x10.
    pub fn with_device_id(mut self, device_id: u16) -> Self {
        self.regs[Register::DeviceId as usize] = device_id;
        self
    }

    /// Stations a seek can stop on. Extra entries beyond the capacity are ignored.
    pub fn with_stations(mut self, stations: &[Channel]) -> Self {
        for station in stations {
            if self.stations.push(*station).is_err() {
                break;
            }
        }
        self
    }

    /// When set, TUNE never raises STC.
    pub fn set_stall_tune(&mut self, stall: bool) {
        self.stall_tune = stall;
    }

    /// When set, SEEK never raises STC.
    pub fn set_stall_seek(&mut self, stall: bool) {
        self.stall_seek = stall;
    }

    /// When set, every tune lands on `channel` whatever CHAN asks for, like a synthesizer that
    /// cannot leave it.
    pub fn set_stuck_channel(&mut self, channel: Option<Channel>) {
        self.stuck_channel = channel;
    }

    /// Fails the next `count` transactions with [`SimError::Bus`].
    pub fn fail_next(&mut self, count: u32) {
        self.fail_after(0, count);
    }

    /// Lets `skip` transactions through, then fails the `count` after them.
    pub fn fail_after(&mut self, skip: u32, count: u32) {
        self.passing_transactions = skip;
        self.failing_transactions = count;
    }

    /// Queues an RDS group. Returns `false` if the queue is full.
    ///
    /// Groups are handed out from the second register read after a tune or seek completes; the
    /// read that sees STC drop finds the decoder still locking. Nothing queued is lost to the
    /// tune handshake itself.
    pub fn push_rds(&mut self, group: RdsGroup) -> bool {
        self.rds.push_back(group).is_ok()
    }

    /// Re-queues every delivered group, modelling a station repeating its RDS cycle.
    pub fn set_repeat_rds(&mut self, repeat: bool) {
        self.repeat_rds = repeat;
    }

    /// Sets RSSI and the stereo indicator reported in STATUSRSSI.
    pub fn set_signal(&mut self, rssi: u8, stereo: bool) {
        let status = &mut self.regs[Register::StatusRssi as usize];
        *status &= !(STATUS_RSSI_MASK | STATUS_ST);
        *status |= u16::from(rssi);
        if stereo {
            *status |= STATUS_ST;
        }
    }

    /// Number of read operations seen.
    pub fn reads(&self) -> u32 {
        self.reads
    }

    /// Number of write operations seen.
    pub fn writes(&self) -> u32 {
        self.writes
    }

    /// Current value of `reg`.
    pub fn register(&self, reg: Register) -> u16 {
        self.regs[reg as usize]
    }

    /// `true` while the oscillator runs and ENABLE is set without DISABLE.
    pub fn is_powered(&self) -> bool {
        let powercfg = self.register(Register::PowerCfg);
        powercfg & POWERCFG_ENABLE != 0
            && powercfg & POWERCFG_DISABLE == 0
            && self.register(Register::Test1) & TEST1_XOSC_ENABLE == TEST1_XOSC_ENABLE
    }

    /// Channel in READCHAN under the band plan currently programmed in SYSCONFIG2.
    pub fn tuned_channel(&self) -> Channel {
        self.band_plan()
            .channel_at(self.register(Register::ReadChan) & READCHAN_MASK)
    }

    fn band_plan(&self) -> BandPlan {
        let sysconfig2 = self.register(Register::SysConfig2);
        BandPlan::new(
            Band::from_bits(sysconfig2 >> SYSCONFIG2_BAND_SHIFT),
            Spacing::from_bits(sysconfig2 >> SYSCONFIG2_SPACE_SHIFT),
        )
    }

    fn set_bits(&mut self, reg: Register, bits: u16, on: bool) {
        if on {
            self.regs[reg as usize] |= bits;
        } else {
            self.regs[reg as usize] &= !bits;
        }
    }

    fn on_read(&mut self, buf: &mut [u8]) {
        self.reads += 1;

        let rds_on = self.register(Register::SysConfig1) & SYSCONFIG1_RDS != 0;
        let next = if self.settled && rds_on && self.is_powered() {
            self.rds.pop_front()
        } else {
            None
        };
        match next {
            Some(group) => {
                self.regs[Register::RdsA as usize] = group.blocks[0];
                self.regs[Register::RdsB as usize] = group.blocks[1];
                self.regs[Register::RdsC as usize] = group.blocks[2];
                self.regs[Register::RdsD as usize] = group.blocks[3];
                self.set_bits(Register::StatusRssi, STATUS_RDSR, true);
                if self.repeat_rds {
                    // Capacity was freed by the pop above.
                    let _ = self.rds.push_back(group);
                }
            }
            None => self.set_bits(Register::StatusRssi, STATUS_RDSR, false),
        }

        for (i, byte) in buf.iter_mut().enumerate() {
            let word = self.regs[read_order(i / 2)].to_be_bytes();
            *byte = word[i % 2];
        }

        if self.locking {
            self.locking = false;
            self.settled = true;
        }
    }

    fn on_write(&mut self, bytes: &[u8]) {
        self.writes += 1;

        for (n, pair) in bytes.chunks_exact(2).enumerate() {
            let reg = write_order(n);
            if reg > Register::Test1 as usize {
                break;
            }
            self.regs[reg] = u16::from_be_bytes([pair[0], pair[1]]);
        }
        self.step();
    }

    /// Advances the tune/seek state machine after a write.
    fn step(&mut self) {
        let powercfg = self.register(Register::PowerCfg);
        let tune = self.register(Register::Channel) & CHANNEL_TUNE != 0;
        let seek = powercfg & POWERCFG_SEEK != 0;
        let stc = self.register(Register::StatusRssi) & STATUS_STC != 0;

        if !self.is_powered() {
            self.settled = false;
            self.locking = false;
            self.set_bits(Register::StatusRssi, STATUS_STC | STATUS_SFBL, false);
            return;
        }

        if tune && !stc && !self.stall_tune {
            let requested = self.register(Register::Channel) & CHANNEL_MASK;
            let chan = self
                .stuck_channel
                .and_then(|channel| self.band_plan().index_of(channel).ok())
                .unwrap_or(requested);
            self.set_readchan(chan);
            self.unlock_rds();
            self.set_bits(Register::StatusRssi, STATUS_STC, true);
        } else if seek && !stc && !self.stall_seek {
            let up = powercfg & POWERCFG_SEEKUP != 0;
            let (chan, band_limit) = self.seek_from_current(up);
            self.set_readchan(chan);
            self.unlock_rds();
            self.set_bits(Register::StatusRssi, STATUS_SFBL, band_limit);
            self.set_bits(Register::StatusRssi, STATUS_STC, true);
        } else if !tune && !seek && stc {
            self.set_bits(Register::StatusRssi, STATUS_STC | STATUS_SFBL, false);
            self.locking = true;
        }
    }

    fn unlock_rds(&mut self) {
        self.settled = false;
        self.locking = false;
    }

    fn set_readchan(&mut self, chan: u16) {
        self.regs[Register::ReadChan as usize] = chan & READCHAN_MASK;
    }

    fn seek_from_current(&self, up: bool) -> (u16, bool) {
        let plan = self.band_plan();
        let current = self.register(Register::ReadChan) & READCHAN_MASK;
        let last = plan.last_index();

        let found = self
            .stations
            .iter()
            .filter_map(|station| plan.index_of(*station).ok())
            .filter(|index| if up { *index > current } else { *index < current })
            .reduce(|best, index| {
                let closer = if up { index < best } else { index > best };
                if closer {
                    index
                } else {
                    best
                }
            });

        match found {
            Some(index) => (index, false),
            None if up => (last, true),
            None => (0, true),
        }
    }
}

impl i2c::ErrorType for SimulatedSi4703 {
    type Error = SimError;
}

impl i2c::I2c for SimulatedSi4703 {
    async fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        if !self.present || address != I2C_ADDRESS {
            return Err(SimError::Nack);
        }
        if self.failing_transactions > 0 {
            if self.passing_transactions > 0 {
                self.passing_transactions -= 1;
            } else {
                self.failing_transactions -= 1;
                return Err(SimError::Bus);
            }
        }

        for op in operations {
            match op {
                Operation::Read(buf) => self.on_read(buf),
                Operation::Write(bytes) => self.on_write(bytes),
            }
        }
        Ok(())
    }
}

/// A [`DelayNs`] that returns immediately and keeps a tally of the requested time.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantDelay {
    elapsed_ns: u64,
}

impl InstantDelay {
    /// Creates a delay with an empty tally.
    pub const fn new() -> Self {
        Self { elapsed_ns: 0 }
    }

    /// Total delay requested so far, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ns / 1_000_000
    }
}

impl DelayNs for InstantDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.elapsed_ns += u64::from(ns);
    }
}
