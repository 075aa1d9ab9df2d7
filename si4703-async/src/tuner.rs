//! The core implementation of the Si4703 driver.

use embedded_hal_async::delay::DelayNs;
use embedded_hal_async::i2c::{I2c, SevenBitAddress};

use crate::band::{BandPlan, Channel, ChannelError};
use crate::conf::{Config, DeEmphasis, MAX_VOLUME};
use crate::err::{Error, InitError};
use crate::rds::{RdsGroup, RdsRecord};
use crate::reg::*;

/// Crystal oscillator settling time after XOSCEN.
const OSCILLATOR_SETTLE_MS: u32 = 500;
/// Power-up time after ENABLE.
const POWER_UP_SETTLE_MS: u32 = 110;
/// Power-down time after DISABLE.
const POWER_DOWN_SETTLE_MS: u32 = 2;
/// How often STC is polled while a tune or seek is in progress.
const STC_POLL_INTERVAL_US: u32 = 5_000;
/// Pause between attempts of a failed bus transaction.
const RETRY_BACKOFF_US: u32 = 1_000;

/// Where the driver is in the device lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunerState {
    /// Not powered up, or powered down again.
    Uninitialized,
    /// Powered up, no channel selected yet.
    Ready,
    /// Tuned to a channel; RDS can be read.
    Tuned(Channel),
}

/// Seek direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    /// Towards the bottom of the band.
    Down,
    /// Towards the top of the band.
    Up,
}

/// Result of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOutcome {
    /// A station above the seek threshold was found.
    Found(Channel),
    /// The seek hit the band limit without finding a station; the chip sits at this channel.
    BandLimit(Channel),
}

/// Signal metrics from STATUSRSSI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalQuality {
    /// Received signal strength, dBµV.
    pub rssi: u8,
    /// Stereo pilot detected.
    pub stereo: bool,
    /// AFC railed; the tuned frequency is probably not a valid station.
    pub afc_railed: bool,
}

/// An Si4703 FM tuner on an I2C bus.
///
/// The driver owns the bus handle for its lifetime. Hand it back with [`Si4703::release`],
/// ideally after [`Si4703::power_down`].
pub struct Si4703<I2C, D> {
    i2c: I2C,
    delay: D,
    config: Config,
    regs: Registers,
    state: TunerState,
    /// Running total of retry backoffs, charged against handshake budgets.
    backoff_us: u32,
}

impl<I2C, D, E> Si4703<I2C, D>
where
    I2C: I2c<SevenBitAddress, Error = E>,
    E: embedded_hal_async::i2c::Error,
    D: DelayNs,
{
    /// Creates a new `Si4703`. No bus traffic happens until [`Si4703::initialize`].
    ///
    /// # Arguments
    ///
    /// * `i2c` - An I2C peripheral that implements `embedded-hal-async::i2c::I2c`.
    /// * `delay` - A delay provider used for settling times and STC polling.
    /// * `config` - Band, spacing, volume and timeout settings.
    pub fn new(i2c: I2C, delay: D, config: Config) -> Self {
        Self {
            i2c,
            delay,
            config,
            regs: Registers::new(),
            state: TunerState::Uninitialized,
            backoff_us: 0,
        }
    }

    /// Gives back the bus and delay.
    pub fn release(self) -> (I2C, D) {
        (self.i2c, self.delay)
    }

    /// The active configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The lifecycle state.
    pub fn state(&self) -> TunerState {
        self.state
    }

    /// The shadow register file as of the last bus transaction.
    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Powers the chip up and applies the configuration.
    ///
    /// The sequence follows the datasheet: enable the crystal oscillator, let it settle, set
    /// ENABLE with the mute disabled, enable RDS and the STC/RDS interrupts on GPIO2, program
    /// band, spacing and volume, and wait for the chip to come up.
    ///
    /// Calling this on an initialized tuner is a no-op.
    pub async fn initialize(&mut self) -> Result<(), Error<E>> {
        if self.state != TunerState::Uninitialized {
            log::debug!("si4703::initialize already initialized, skipping");
            return Ok(());
        }

        self.read_registers()
            .await
            .map_err(|err| Error::DeviceInit(InitError::Bus(err)))?;

        let device_id = self.regs.get(Register::DeviceId);
        if device_id & MANUFACTURER_ID_MASK != MANUFACTURER_ID {
            log::error!("si4703::initialize unexpected device id {device_id:#06x}");
            return Err(Error::DeviceInit(InitError::UnexpectedDeviceId(device_id)));
        }
        log::info!(
            "si4703::initialize found device id {device_id:#06x}, chip id {:#06x}",
            self.regs.get(Register::ChipId)
        );

        self.regs.set(Register::Test1, TEST1_XOSC_ENABLE);
        self.write_registers()
            .await
            .map_err(|err| Error::DeviceInit(InitError::Bus(err)))?;
        self.delay.delay_ms(OSCILLATOR_SETTLE_MS).await;
        log::trace!("si4703::initialize oscillator running");

        self.regs
            .set(Register::PowerCfg, POWERCFG_DMUTE | POWERCFG_ENABLE);

        let de = match self.config.de_emphasis {
            DeEmphasis::Us75 => 0,
            DeEmphasis::Eu50 => SYSCONFIG1_DE,
        };
        self.regs.clear_bits(
            Register::SysConfig1,
            SYSCONFIG1_DE | SYSCONFIG1_GPIO2_MASK,
        );
        self.regs.set_bits(
            Register::SysConfig1,
            SYSCONFIG1_RDS
                | SYSCONFIG1_RDSIEN
                | SYSCONFIG1_STCIEN
                | SYSCONFIG1_GPIO2_INTERRUPT
                | de,
        );

        let sysconfig2 = (u16::from(self.config.seek_threshold) << SYSCONFIG2_SEEKTH_SHIFT)
            | (self.config.band.bits() << SYSCONFIG2_BAND_SHIFT)
            | (self.config.spacing.bits() << SYSCONFIG2_SPACE_SHIFT)
            | u16::from(self.config.volume.min(MAX_VOLUME));
        self.regs.set(Register::SysConfig2, sysconfig2);

        self.write_registers()
            .await
            .map_err(|err| Error::DeviceInit(InitError::Bus(err)))?;
        self.delay.delay_ms(POWER_UP_SETTLE_MS).await;

        self.state = TunerState::Ready;
        log::info!(
            "si4703::initialize done. band {:?}, spacing {:?}, volume {}",
            self.config.band,
            self.config.spacing,
            self.config.volume
        );
        Ok(())
    }

    /// Tunes to `channel` and returns the channel the chip reports afterwards.
    ///
    /// The channel is checked against the configured band plan before anything is sent to the
    /// chip. The whole TUNE/STC handshake, retries included, is bounded by
    /// [`Config::tune_timeout_ms`](crate::conf::Config::tune_timeout_ms). A tune or seek left
    /// pending by an earlier failure is finished first.
    pub async fn tune_to_channel(&mut self, channel: Channel) -> Result<Channel, Error<E>> {
        let index = self
            .band_plan()
            .index_of(channel)
            .map_err(|err| match err {
                ChannelError::OutOfBand => Error::OutOfRange(channel),
                ChannelError::OffGrid => Error::OffGrid(channel),
            })?;
        self.ensure_initialized()?;
        log::debug!("si4703::tune {channel} (chan {index})");

        match self.tune_index(channel, index).await {
            Ok(tuned) => {
                self.state = TunerState::Tuned(tuned);
                log::info!("si4703::tune tuned to {tuned}");
                Ok(tuned)
            }
            Err(err) => {
                self.state = TunerState::Ready;
                Err(err)
            }
        }
    }

    /// Seeks to the next station in `direction`, stopping at the band limit.
    ///
    /// Bounded by [`Config::seek_timeout_ms`](crate::conf::Config::seek_timeout_ms); a timeout
    /// is reported as [`Error::TuneTimeout`].
    pub async fn seek(&mut self, direction: SeekDirection) -> Result<SeekOutcome, Error<E>> {
        self.ensure_initialized()?;
        log::debug!("si4703::seek {direction:?}");

        let band_limit = match self.run_seek(direction).await {
            Ok(band_limit) => band_limit,
            Err(err) => {
                self.state = TunerState::Ready;
                return Err(err);
            }
        };

        let channel = self.decode_channel();
        self.state = TunerState::Tuned(channel);
        if band_limit {
            log::info!("si4703::seek hit the band limit at {channel}");
            Ok(SeekOutcome::BandLimit(channel))
        } else {
            log::info!("si4703::seek found {channel}");
            Ok(SeekOutcome::Found(channel))
        }
    }

    /// Reads the RDS registers once.
    ///
    /// Returns [`RdsRecord::Empty`] when no new group arrived since the last read. Fails with
    /// [`Error::NotTuned`] until a tune or seek has completed.
    pub async fn read_rds(&mut self) -> Result<RdsRecord, Error<E>> {
        match self.state {
            TunerState::Uninitialized => return Err(Error::NotInitialized),
            TunerState::Ready => return Err(Error::NotTuned),
            TunerState::Tuned(_) => {}
        }

        self.read_registers().await.map_err(Error::DeviceIo)?;
        if !self.regs.is_set(Register::StatusRssi, STATUS_RDSR) {
            return Ok(RdsRecord::Empty);
        }

        let group = RdsGroup::from_registers(&self.regs);
        log::trace!("si4703::read_rds {group}");
        Ok(RdsRecord::Group(group))
    }

    /// Reads back the channel the chip is tuned to.
    pub async fn channel(&mut self) -> Result<Channel, Error<E>> {
        self.ensure_initialized()?;
        self.read_registers().await.map_err(Error::DeviceIo)?;
        Ok(self.decode_channel())
    }

    /// Reads RSSI and the stereo/AFC indicators.
    pub async fn signal_quality(&mut self) -> Result<SignalQuality, Error<E>> {
        self.ensure_initialized()?;
        self.read_registers().await.map_err(Error::DeviceIo)?;
        let status = self.regs.get(Register::StatusRssi);
        Ok(SignalQuality {
            rssi: (status & STATUS_RSSI_MASK) as u8,
            stereo: status & STATUS_ST != 0,
            afc_railed: status & STATUS_AFCRL != 0,
        })
    }

    /// Sets the output volume, 0-15.
    ///
    /// Before initialization this only updates the configuration.
    pub async fn set_volume(&mut self, volume: u8) -> Result<(), Error<E>> {
        if volume > MAX_VOLUME {
            return Err(Error::InvalidVolume(volume));
        }
        self.config.volume = volume;
        if self.state == TunerState::Uninitialized {
            return Ok(());
        }

        self.read_registers().await.map_err(Error::DeviceIo)?;
        self.regs
            .update(Register::SysConfig2, SYSCONFIG2_VOLUME_MASK, u16::from(volume));
        self.write_registers().await.map_err(Error::DeviceIo)
    }

    /// Mutes or unmutes the audio output.
    pub async fn set_mute(&mut self, mute: bool) -> Result<(), Error<E>> {
        self.modify_power_config(POWERCFG_DMUTE, !mute).await
    }

    /// Forces mono output, or returns to automatic stereo/mono blending.
    pub async fn set_mono(&mut self, mono: bool) -> Result<(), Error<E>> {
        self.modify_power_config(POWERCFG_MONO, mono).await
    }

    /// Powers the chip down. A later [`Si4703::initialize`] runs the full power-up again.
    pub async fn power_down(&mut self) -> Result<(), Error<E>> {
        if self.state == TunerState::Uninitialized {
            return Ok(());
        }

        self.read_registers().await.map_err(Error::DeviceIo)?;
        self.regs.clear_bits(Register::SysConfig1, SYSCONFIG1_RDS);
        self.regs
            .set_bits(Register::PowerCfg, POWERCFG_ENABLE | POWERCFG_DISABLE);
        self.write_registers().await.map_err(Error::DeviceIo)?;
        self.delay.delay_ms(POWER_DOWN_SETTLE_MS).await;

        self.state = TunerState::Uninitialized;
        log::info!("si4703::power_down done");
        Ok(())
    }

    fn band_plan(&self) -> BandPlan {
        self.config.band_plan()
    }

    fn ensure_initialized(&self) -> Result<(), Error<E>> {
        match self.state {
            TunerState::Uninitialized => Err(Error::NotInitialized),
            _ => Ok(()),
        }
    }

    fn decode_channel(&self) -> Channel {
        let index = self.regs.get(Register::ReadChan) & READCHAN_MASK;
        self.band_plan().channel_at(index)
    }

    async fn modify_power_config(&mut self, bits: u16, set: bool) -> Result<(), Error<E>> {
        self.ensure_initialized()?;
        self.read_registers().await.map_err(Error::DeviceIo)?;
        if set {
            self.regs.set_bits(Register::PowerCfg, bits);
        } else {
            self.regs.clear_bits(Register::PowerCfg, bits);
        }
        self.write_registers().await.map_err(Error::DeviceIo)
    }

    async fn tune_index(&mut self, channel: Channel, index: u16) -> Result<Channel, Error<E>> {
        self.read_registers().await.map_err(Error::DeviceIo)?;
        self.settle_pending_handshake().await?;

        self.regs.update(Register::Channel, CHANNEL_MASK, index);
        self.regs.set_bits(Register::Channel, CHANNEL_TUNE);
        let timeout_ms = self.config.tune_timeout_ms;
        self.handshake(Register::Channel, CHANNEL_TUNE, timeout_ms).await?;

        let reported = self.decode_channel();
        if self.regs.get(Register::ReadChan) & READCHAN_MASK != index {
            log::error!("si4703::tune asked for {channel}, chip reports {reported}");
            return Err(Error::ChannelMismatch {
                requested: channel,
                reported,
            });
        }
        Ok(reported)
    }

    async fn run_seek(&mut self, direction: SeekDirection) -> Result<bool, Error<E>> {
        self.read_registers().await.map_err(Error::DeviceIo)?;
        self.settle_pending_handshake().await?;

        self.regs.set_bits(Register::PowerCfg, POWERCFG_SKMODE);
        match direction {
            SeekDirection::Up => self.regs.set_bits(Register::PowerCfg, POWERCFG_SEEKUP),
            SeekDirection::Down => self.regs.clear_bits(Register::PowerCfg, POWERCFG_SEEKUP),
        }
        self.regs.set_bits(Register::PowerCfg, POWERCFG_SEEK);
        let timeout_ms = self.config.seek_timeout_ms;
        self.handshake(Register::PowerCfg, POWERCFG_SEEK, timeout_ms).await
    }

    /// Finishes a TUNE or SEEK that an earlier failure left set, so the next one starts clean.
    ///
    /// Expects a freshly read shadow.
    async fn settle_pending_handshake(&mut self) -> Result<(), Error<E>> {
        let pending = self.regs.is_set(Register::Channel, CHANNEL_TUNE)
            || self.regs.is_set(Register::PowerCfg, POWERCFG_SEEK)
            || self.regs.is_set(Register::StatusRssi, STATUS_STC);
        if !pending {
            return Ok(());
        }

        log::warn!("si4703 clearing a tune/seek left over from an earlier failure");
        self.regs.clear_bits(Register::Channel, CHANNEL_TUNE);
        self.regs.clear_bits(Register::PowerCfg, POWERCFG_SEEK);
        let mut budget_us = self.config.tune_timeout_ms.saturating_mul(1_000);
        self.write_within(&mut budget_us).await?;
        self.wait_for_stc(false, &mut budget_us).await
    }

    /// Runs a TUNE or SEEK whose start bit is already set in the shadow.
    ///
    /// Writes the start bit, waits for STC, samples SF/BL, clears the start bit and waits for STC
    /// to drop again, all within one `timeout_ms` budget. Returns the SF/BL flag. On any failure
    /// the start bit is cleared best-effort.
    async fn handshake(
        &mut self,
        reg: Register,
        start_bit: u16,
        timeout_ms: u32,
    ) -> Result<bool, Error<E>> {
        let mut budget_us = timeout_ms.saturating_mul(1_000);
        let result = self.run_handshake(reg, start_bit, &mut budget_us).await;

        if let Err(err) = &result {
            log::warn!("si4703 {reg:?} handshake failed: {err:?}");
            self.regs.clear_bits(reg, start_bit);
            if let Err(clear_err) = self.write_registers().await {
                log::warn!("si4703 could not clear {reg:?} after the failure: {clear_err:?}");
            }
        }
        result
    }

    async fn run_handshake(
        &mut self,
        reg: Register,
        start_bit: u16,
        budget_us: &mut u32,
    ) -> Result<bool, Error<E>> {
        self.write_within(budget_us).await?;
        self.wait_for_stc(true, budget_us).await?;
        let band_limit = self.regs.is_set(Register::StatusRssi, STATUS_SFBL);

        self.regs.clear_bits(reg, start_bit);
        self.write_within(budget_us).await?;
        self.wait_for_stc(false, budget_us).await?;

        Ok(band_limit)
    }

    /// Polls STATUSRSSI until STC equals `high`, spending at most `budget_us`.
    async fn wait_for_stc(&mut self, high: bool, budget_us: &mut u32) -> Result<(), Error<E>> {
        loop {
            self.read_within(budget_us).await?;
            if self.regs.is_set(Register::StatusRssi, STATUS_STC) == high {
                log::trace!("si4703 STC {}", if high { "set" } else { "clear" });
                return Ok(());
            }
            if *budget_us == 0 {
                log::warn!("si4703 STC did not {} in time", if high { "rise" } else { "drop" });
                return Err(Error::TuneTimeout);
            }
            let pause_us = STC_POLL_INTERVAL_US.min(*budget_us);
            self.delay.delay_us(pause_us).await;
            *budget_us -= pause_us;
        }
    }

    /// [`Self::read_registers`], charging its retry backoffs to `budget_us`.
    async fn read_within(&mut self, budget_us: &mut u32) -> Result<(), Error<E>> {
        let before = self.backoff_us;
        let result = self.read_registers().await;
        *budget_us = budget_us.saturating_sub(self.backoff_us.wrapping_sub(before));
        result.map_err(Error::DeviceIo)
    }

    /// [`Self::write_registers`], charging its retry backoffs to `budget_us`.
    async fn write_within(&mut self, budget_us: &mut u32) -> Result<(), Error<E>> {
        let before = self.backoff_us;
        let result = self.write_registers().await;
        *budget_us = budget_us.saturating_sub(self.backoff_us.wrapping_sub(before));
        result.map_err(Error::DeviceIo)
    }

    /// Refreshes the register shadow with one full read, retrying transient failures.
    async fn read_registers(&mut self) -> Result<(), E> {
        let attempts = self.config.io_attempts.max(1);
        let mut buf = [0u8; READ_LEN];
        let mut attempt = 1;
        loop {
            match self.i2c.read(I2C_ADDRESS, &mut buf).await {
                Ok(()) => {
                    self.regs.load(&buf);
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    log::warn!(
                        "si4703 register read failed (attempt {attempt}/{attempts}): {err:?}"
                    );
                    attempt += 1;
                    self.back_off().await;
                }
                Err(err) => {
                    log::error!("si4703 register read failed after {attempts} attempts: {err:?}");
                    return Err(err);
                }
            }
        }
    }

    /// Writes the control block 0x02..=0x07 from the shadow, retrying transient failures.
    async fn write_registers(&mut self) -> Result<(), E> {
        let attempts = self.config.io_attempts.max(1);
        let bytes = self.regs.control_bytes();
        let mut attempt = 1;
        loop {
            match self.i2c.write(I2C_ADDRESS, &bytes).await {
                Ok(()) => {
                    log::trace!("si4703 wrote {:?}", self.regs);
                    return Ok(());
                }
                Err(err) if attempt < attempts => {
                    log::warn!(
                        "si4703 register write failed (attempt {attempt}/{attempts}): {err:?}"
                    );
                    attempt += 1;
                    self.back_off().await;
                }
                Err(err) => {
                    log::error!("si4703 register write failed after {attempts} attempts: {err:?}");
                    return Err(err);
                }
            }
        }
    }

    async fn back_off(&mut self) {
        self.delay.delay_us(RETRY_BACKOFF_US).await;
        self.backoff_us = self.backoff_us.wrapping_add(RETRY_BACKOFF_US);
    }
}
