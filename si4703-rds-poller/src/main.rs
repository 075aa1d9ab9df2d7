mod board;
mod cli;

use anyhow::Context;
use clap::Parser;
use embassy_executor::Spawner;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use embassy_time::Delay;
use embedded_bus_async::i2c::BlockingI2c;
use embedded_hal_async::i2c::{self, I2c, SevenBitAddress};
use si4703_async::sim::SimulatedSi4703;
use si4703_async::{Channel, Config, PollSummary, RdsGroup, RdsPoller, RdsRecord, RdsSink, Si4703};

use crate::cli::Args;

/// Raised by Ctrl-C or by the sink once `--cycles` reads have been printed.
static STOP: Signal<CriticalSectionRawMutex, ()> = Signal::new();

#[embassy_executor::main]
async fn main(_spawner: Spawner) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args).await {
        Ok(summary) => log::info!(
            "done: {} reads, {} carried RDS data",
            summary.cycles,
            summary.groups
        ),
        Err(err) => {
            log::error!("{err:#}");
            std::process::exit(1);
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<PollSummary> {
    ctrlc::set_handler(|| STOP.signal(())).context("installing the Ctrl-C handler")?;
    let config = args.tuner_config();

    if args.simulate {
        log::info!("using a simulated tuner");
        return poll(demo_station(args.channel), config, args).await;
    }

    let _pins = board::enter_i2c_mode(args.reset_pin, args.sdio_pin)
        .context("resetting the Si4703 into I2C mode")?;
    let bus = rppal::i2c::I2c::with_bus(args.i2c_bus)
        .with_context(|| format!("opening /dev/i2c-{}", args.i2c_bus))?;
    poll(BlockingI2c::new(bus), config, args).await
}

async fn poll<I2C, E>(i2c: I2C, config: Config, args: &Args) -> anyhow::Result<PollSummary>
where
    I2C: I2c<SevenBitAddress, Error = E>,
    E: i2c::Error + Send + Sync + 'static,
{
    let mut tuner = Si4703::new(i2c, Delay, config);
    let mut poller = RdsPoller::new(Delay, &STOP).with_interval_ms(args.interval_ms);
    let mut sink = ConsoleSink::new(args.cycles);

    poller
        .run(&mut tuner, args.channel, &mut sink)
        .await
        .with_context(|| format!("polling RDS on {}", args.channel))
}

/// Prints every record and raises [`STOP`] after an optional number of reads.
struct ConsoleSink {
    seen: u32,
    limit: Option<u32>,
}

impl ConsoleSink {
    fn new(limit: Option<u32>) -> Self {
        Self { seen: 0, limit }
    }
}

impl RdsSink for ConsoleSink {
    fn publish(&mut self, record: &RdsRecord) {
        self.seen += 1;
        println!("{:>5}  {record}", self.seen);
        if self.limit.is_some_and(|limit| self.seen >= limit) {
            STOP.signal(());
        }
    }
}

/// A station on `channel` cycling its program service name, "RUST FM ", in 0A groups.
fn demo_station(channel: Channel) -> SimulatedSi4703 {
    const PI: u16 = 0x54A8;
    const PTY: u16 = 10;
    const AF: u16 = 0xE0CD;

    let mut chip = SimulatedSi4703::new().with_stations(&[channel]);
    for (segment, pair) in b"RUST FM ".chunks_exact(2).enumerate() {
        let block_b = (PTY << 5) | segment as u16;
        let block_d = u16::from_be_bytes([pair[0], pair[1]]);
        chip.push_rds(RdsGroup::new([PI, block_b, AF, block_d]));
    }
    chip.set_repeat_rds(true);
    chip.set_signal(42, true);
    chip
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use si4703_async::sim::InstantDelay;

    #[test]
    fn demo_station_broadcasts_its_name() {
        let channel = Channel::from_tenths_mhz(927);
        let mut tuner = Si4703::new(demo_station(channel), InstantDelay::new(), Config::default());
        block_on(tuner.initialize()).unwrap();
        block_on(tuner.tune_to_channel(channel)).unwrap();

        let mut name = [b'?'; 8];
        for expected_segment in 0..4 {
            let record = block_on(tuner.read_rds()).unwrap();
            let group = record.group().expect("the demo station always has RDS data");
            assert_eq!(group.pi_code(), 0x54A8);
            assert_eq!(group.group_type().to_string(), "0A");
            let segment = usize::from(group.blocks[1] & 0b11);
            assert_eq!(segment, expected_segment);
            name[segment * 2..segment * 2 + 2].copy_from_slice(&group.blocks[3].to_be_bytes());
        }
        assert_eq!(&name, b"RUST FM ");
    }

    #[test]
    fn console_sink_stops_after_the_cycle_limit() {
        STOP.reset();
        let mut sink = ConsoleSink::new(Some(2));
        sink.publish(&RdsRecord::Empty);
        assert!(!STOP.signaled());
        sink.publish(&RdsRecord::Empty);
        assert!(STOP.signaled());
        STOP.reset();
    }
}
