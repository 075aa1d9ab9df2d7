use clap::{Parser, ValueEnum};
use si4703_async::conf::DeEmphasis;
use si4703_async::{Band, Channel, Config, Spacing};

/// Tune an Si4703 and print one RDS record per interval until Ctrl-C.
#[derive(Parser, Debug)]
#[command(version, about)]
pub struct Args {
    /// Station to tune, in MHz.
    #[arg(short, long, env = "SI4703_CHANNEL", default_value = "92.7")]
    pub channel: Channel,

    /// Pause between two RDS reads.
    #[arg(short, long, env = "SI4703_INTERVAL_MS", default_value_t = 1000)]
    pub interval_ms: u32,

    /// Stop on its own after this many reads.
    #[arg(long, env = "SI4703_CYCLES")]
    pub cycles: Option<u32>,

    /// Regional band limits.
    #[arg(long, env = "SI4703_BAND", value_enum, default_value_t = BandArg::Us)]
    pub band: BandArg,

    /// Channel grid.
    #[arg(long, env = "SI4703_SPACING", value_enum, default_value_t = SpacingArg::Khz200)]
    pub spacing: SpacingArg,

    /// Output volume, 0 to 15.
    #[arg(long, env = "SI4703_VOLUME", default_value_t = 10)]
    pub volume: u8,

    /// Use 50 us de-emphasis (Europe, Australia, Japan) instead of 75 us.
    #[arg(long, env = "SI4703_EU_DE_EMPHASIS")]
    pub eu_de_emphasis: bool,

    /// Attempts per register transfer before a bus error is reported.
    #[arg(long, env = "SI4703_IO_ATTEMPTS", default_value_t = 3)]
    pub io_attempts: u8,

    /// Linux I2C bus number, as in /dev/i2c-N.
    #[arg(long, env = "SI4703_I2C_BUS", default_value_t = 1)]
    pub i2c_bus: u8,

    /// BCM number of the GPIO wired to RST.
    #[arg(long, env = "SI4703_RESET_PIN", default_value_t = 5)]
    pub reset_pin: u8,

    /// BCM number of the GPIO wired to SDIO (the bus SDA line).
    #[arg(long, env = "SI4703_SDIO_PIN", default_value_t = 2)]
    pub sdio_pin: u8,

    /// Run against a simulated tuner broadcasting a demo station.
    #[arg(long, env = "SI4703_SIMULATE")]
    pub simulate: bool,
}

impl Args {
    pub fn tuner_config(&self) -> Config {
        let de_emphasis = if self.eu_de_emphasis {
            DeEmphasis::Eu50
        } else {
            DeEmphasis::Us75
        };
        Config::default()
            .with_band(self.band.into())
            .with_spacing(self.spacing.into())
            .with_volume(self.volume)
            .with_de_emphasis(de_emphasis)
            .with_io_attempts(self.io_attempts)
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandArg {
    /// 87.5 - 108 MHz
    Us,
    /// 76 - 108 MHz
    JapanWide,
    /// 76 - 90 MHz
    Japan,
}

impl From<BandArg> for Band {
    fn from(band: BandArg) -> Self {
        match band {
            BandArg::Us => Band::UsEurope,
            BandArg::JapanWide => Band::JapanWide,
            BandArg::Japan => Band::Japan,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpacingArg {
    #[value(name = "200")]
    Khz200,
    #[value(name = "100")]
    Khz100,
    #[value(name = "50")]
    Khz50,
}

impl From<SpacingArg> for Spacing {
    fn from(spacing: SpacingArg) -> Self {
        match spacing {
            SpacingArg::Khz200 => Spacing::Khz200,
            SpacingArg::Khz100 => Spacing::Khz100,
            SpacingArg::Khz50 => Spacing::Khz50,
        }
    }
}
