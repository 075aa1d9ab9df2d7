//! Driver configuration.

use crate::band::{Band, BandPlan, Spacing};

/// De-emphasis time constant, SYSCONFIG1[11].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeEmphasis {
    /// 75 µs, the Americas and South Korea.
    #[default]
    Us75,
    /// 50 µs, Europe, Australia and Japan.
    Eu50,
}

/// Highest accepted volume step, SYSCONFIG2[3:0].
pub const MAX_VOLUME: u8 = 15;

/// Configuration applied by [`Si4703::initialize`](crate::Si4703::initialize) and used by the
/// tuning operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Regional band limits.
    pub band: Band,
    /// Channel grid.
    pub spacing: Spacing,
    /// Output volume, 0 (mute) to 15.
    pub volume: u8,
    /// De-emphasis time constant.
    pub de_emphasis: DeEmphasis,
    /// RSSI threshold a seek must exceed to stop on a station.
    pub seek_threshold: u8,
    /// Ceiling for each half of the tune handshake, in milliseconds.
    pub tune_timeout_ms: u32,
    /// Ceiling for a seek across the band, in milliseconds.
    pub seek_timeout_ms: u32,
    /// Attempts per bus transaction before the error is surfaced. At least one.
    pub io_attempts: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            band: Band::UsEurope,
            spacing: Spacing::Khz200,
            volume: 10,
            de_emphasis: DeEmphasis::Us75,
            seek_threshold: 25,
            tune_timeout_ms: 300,
            seek_timeout_ms: 10_000,
            io_attempts: 3,
        }
    }
}

impl Config {
    /// Sets the band.
    pub fn with_band(mut self, band: Band) -> Self {
        self.band = band;
        self
    }

    /// Sets the channel spacing.
    pub fn with_spacing(mut self, spacing: Spacing) -> Self {
        self.spacing = spacing;
        self
    }

    /// Sets the volume, clamped to [`MAX_VOLUME`].
    pub fn with_volume(mut self, volume: u8) -> Self {
        self.volume = volume.min(MAX_VOLUME);
        self
    }

    /// Sets the de-emphasis.
    pub fn with_de_emphasis(mut self, de_emphasis: DeEmphasis) -> Self {
        self.de_emphasis = de_emphasis;
        self
    }

    /// Sets the seek RSSI threshold.
    pub fn with_seek_threshold(mut self, seek_threshold: u8) -> Self {
        self.seek_threshold = seek_threshold;
        self
    }

    /// Sets the tune timeout.
    pub fn with_tune_timeout_ms(mut self, tune_timeout_ms: u32) -> Self {
        self.tune_timeout_ms = tune_timeout_ms;
        self
    }

    /// Sets the seek timeout.
    pub fn with_seek_timeout_ms(mut self, seek_timeout_ms: u32) -> Self {
        self.seek_timeout_ms = seek_timeout_ms;
        self
    }

    /// Sets the number of attempts per bus transaction.
    pub fn with_io_attempts(mut self, io_attempts: u8) -> Self {
        self.io_attempts = io_attempts.max(1);
        self
    }

    /// The band plan channels are validated against.
    pub fn band_plan(&self) -> BandPlan {
        BandPlan::new(self.band, self.spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_the_north_american_setup() {
        let config = Config::default();
        assert_eq!(config.band_plan(), BandPlan::new(Band::UsEurope, Spacing::Khz200));
        assert_eq!(config.volume, 0x0A);
        assert_eq!(config.io_attempts, 3);
    }

    #[test]
    fn builders_clamp_out_of_range_values() {
        let config = Config::default().with_volume(40).with_io_attempts(0);
        assert_eq!(config.volume, MAX_VOLUME);
        assert_eq!(config.io_attempts, 1);
    }
}
