//! FM channels, regional bands and the channel-spacing grid.

use core::fmt;
use core::str::FromStr;

/// An FM broadcast frequency in tenths of a megahertz (`927` is 92.7 MHz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Channel(u16);

impl Channel {
    /// Creates a channel from a frequency in tenths of a megahertz.
    pub const fn from_tenths_mhz(tenths: u16) -> Self {
        Self(tenths)
    }

    /// The frequency in tenths of a megahertz.
    pub const fn tenths_mhz(self) -> u16 {
        self.0
    }

    /// The frequency in kilohertz.
    pub const fn khz(self) -> u32 {
        self.0 as u32 * 100
    }

    /// The frequency in the chip's native 10 kHz units.
    const fn ten_khz(self) -> u32 {
        self.0 as u32 * 10
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} MHz", self.0 / 10, self.0 % 10)
    }
}

/// Error returned when parsing a [`Channel`] from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseChannelError;

impl fmt::Display for ParseChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected a frequency in MHz with at most one decimal, like 92.7")
    }
}

impl core::error::Error for ParseChannelError {}

impl FromStr for Channel {
    type Err = ParseChannelError;

    /// Parses `"92.7"` or `"101"` (megahertz).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole, fraction) = match s.trim().split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (s.trim(), "0"),
        };
        if fraction.len() != 1 {
            return Err(ParseChannelError);
        }
        let whole: u16 = whole.parse().map_err(|_| ParseChannelError)?;
        let fraction: u16 = fraction.parse().map_err(|_| ParseChannelError)?;
        whole
            .checked_mul(10)
            .and_then(|tenths| tenths.checked_add(fraction))
            .map(Channel)
            .ok_or(ParseChannelError)
    }
}

/// Band select, SYSCONFIG2[7:6].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Band {
    /// 87.5 - 108 MHz.
    #[default]
    UsEurope,
    /// 76 - 108 MHz.
    JapanWide,
    /// 76 - 90 MHz.
    Japan,
}

impl Band {
    /// Lowest and highest frequency, in 10 kHz units.
    const fn limits(self) -> (u32, u32) {
        match self {
            Band::UsEurope => (8_750, 10_800),
            Band::JapanWide => (7_600, 10_800),
            Band::Japan => (7_600, 9_000),
        }
    }

    /// Lowest tunable channel.
    pub const fn bottom(self) -> Channel {
        Channel((self.limits().0 / 10) as u16)
    }

    /// Highest tunable channel.
    pub const fn top(self) -> Channel {
        Channel((self.limits().1 / 10) as u16)
    }

    pub(crate) const fn bits(self) -> u16 {
        match self {
            Band::UsEurope => 0b00,
            Band::JapanWide => 0b01,
            Band::Japan => 0b10,
        }
    }

    pub(crate) const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => Band::JapanWide,
            0b10 => Band::Japan,
            _ => Band::UsEurope,
        }
    }
}

/// Channel spacing, SYSCONFIG2[5:4].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Spacing {
    /// 200 kHz, the Americas.
    #[default]
    Khz200,
    /// 100 kHz, Europe and Japan.
    Khz100,
    /// 50 kHz.
    Khz50,
}

impl Spacing {
    /// Grid step in 10 kHz units.
    const fn step(self) -> u32 {
        match self {
            Spacing::Khz200 => 20,
            Spacing::Khz100 => 10,
            Spacing::Khz50 => 5,
        }
    }

    pub(crate) const fn bits(self) -> u16 {
        match self {
            Spacing::Khz200 => 0b00,
            Spacing::Khz100 => 0b01,
            Spacing::Khz50 => 0b10,
        }
    }

    pub(crate) const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0b01 => Spacing::Khz100,
            0b10 => Spacing::Khz50,
            _ => Spacing::Khz200,
        }
    }
}

/// Why a channel cannot be tuned under a given [`BandPlan`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// Below the bottom or above the top of the band.
    OutOfBand,
    /// Inside the band but between two grid points.
    OffGrid,
}

/// A band together with its spacing: everything needed to map channels to CHAN indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BandPlan {
    /// Regional band limits.
    pub band: Band,
    /// Channel grid.
    pub spacing: Spacing,
}

impl BandPlan {
    /// Creates a band plan.
    pub const fn new(band: Band, spacing: Spacing) -> Self {
        Self { band, spacing }
    }

    /// Returns the CHAN register value for `channel`.
    pub fn index_of(&self, channel: Channel) -> Result<u16, ChannelError> {
        let (bottom, top) = self.band.limits();
        let freq = channel.ten_khz();
        if freq < bottom || freq > top {
            return Err(ChannelError::OutOfBand);
        }
        let offset = freq - bottom;
        if offset % self.spacing.step() != 0 {
            return Err(ChannelError::OffGrid);
        }
        Ok((offset / self.spacing.step()) as u16)
    }

    /// Returns the channel a CHAN/READCHAN index refers to.
    ///
    /// With 50 kHz spacing, odd indices fall between tenths and are truncated.
    pub fn channel_at(&self, index: u16) -> Channel {
        let (bottom, _) = self.band.limits();
        let freq = bottom + u32::from(index) * self.spacing.step();
        Channel((freq / 10) as u16)
    }

    /// Highest grid index inside the band. The top edge is not always on the grid.
    pub(crate) fn last_index(&self) -> u16 {
        let (bottom, top) = self.band.limits();
        ((top - bottom) / self.spacing.step()) as u16
    }

    /// Returns `true` if `channel` is tunable under this plan.
    pub fn contains(&self, channel: Channel) -> bool {
        self.index_of(channel).is_ok()
    }
}
