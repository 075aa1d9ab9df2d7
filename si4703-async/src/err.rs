//! Error types for the Si4703 driver.

use core::fmt::{self, Debug, Display};

use crate::band::Channel;

/// Why [`Si4703::initialize`](crate::Si4703::initialize) failed.
pub enum InitError<E> {
    /// The bus could not be used to reach the chip.
    Bus(E),
    /// A device answered, but DEVICEID does not carry the Silicon Labs manufacturer ID.
    UnexpectedDeviceId(u16),
}

impl<E: Debug> Debug for InitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus(err) => write!(f, "Bus({err:?})"),
            Self::UnexpectedDeviceId(id) => write!(f, "UnexpectedDeviceId({id:#06x})"),
        }
    }
}

/// The main error type for the Si4703 driver.
pub enum Error<E> {
    /// The chip is unreachable or failed identification at power-up.
    DeviceInit(InitError<E>),
    /// An operation was attempted before `initialize`.
    NotInitialized,
    /// RDS was read before any channel was tuned.
    NotTuned,
    /// The channel lies outside the configured band. Nothing was sent to the chip.
    OutOfRange(Channel),
    /// The channel is inside the band but not on the spacing grid. Nothing was sent to the chip.
    OffGrid(Channel),
    /// Volume above 15.
    InvalidVolume(u8),
    /// The chip did not report seek/tune complete within the configured ceiling.
    TuneTimeout,
    /// The tune completed, but READCHAN reports a different channel than the one requested.
    ChannelMismatch {
        /// Channel written to CHAN.
        requested: Channel,
        /// Channel read back from READCHAN.
        reported: Channel,
    },
    /// A bus transaction kept failing after all retries.
    DeviceIo(E),
}

impl<E: Debug> Debug for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInit(err) => write!(f, "DeviceInit({err:?})"),
            Self::NotInitialized => f.write_str("NotInitialized"),
            Self::NotTuned => f.write_str("NotTuned"),
            Self::OutOfRange(channel) => write!(f, "OutOfRange({channel:?})"),
            Self::OffGrid(channel) => write!(f, "OffGrid({channel:?})"),
            Self::InvalidVolume(volume) => write!(f, "InvalidVolume({volume})"),
            Self::TuneTimeout => f.write_str("TuneTimeout"),
            Self::ChannelMismatch {
                requested,
                reported,
            } => write!(
                f,
                "ChannelMismatch {{ requested: {requested:?}, reported: {reported:?} }}"
            ),
            Self::DeviceIo(err) => write!(f, "DeviceIo({err:?})"),
        }
    }
}

impl<E: Debug> Display for Error<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceInit(InitError::Bus(err)) => {
                write!(f, "Si4703 did not respond on the I2C bus: {err:?}")
            }
            Self::DeviceInit(InitError::UnexpectedDeviceId(id)) => {
                write!(f, "unexpected Si4703 device id {id:#06x}")
            }
            Self::NotInitialized => f.write_str("tuner has not been initialized"),
            Self::NotTuned => f.write_str("no channel has been tuned"),
            Self::OutOfRange(channel) => write!(f, "{channel} is outside the configured band"),
            Self::OffGrid(channel) => write!(f, "{channel} is not on the channel spacing grid"),
            Self::InvalidVolume(volume) => write!(f, "volume {volume} is above 15"),
            Self::TuneTimeout => f.write_str("timed out waiting for seek/tune complete"),
            Self::ChannelMismatch {
                requested,
                reported,
            } => write!(f, "tuned to {requested} but the chip reports {reported}"),
            Self::DeviceIo(err) => write!(f, "I2C transaction failed: {err:?}"),
        }
    }
}

impl<E: Debug> core::error::Error for Error<E> {}
