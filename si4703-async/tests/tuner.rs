//! Driver behaviour against the simulated chip.

mod common;

use common::*;
use embassy_futures::block_on;
use si4703_async::reg::*;
use si4703_async::sim::{SimError, SimulatedSi4703};
use si4703_async::{
    Band, Config, Error, InitError, RdsGroup, RdsRecord, SeekDirection, SeekOutcome, Spacing,
    TunerState,
};

const STATION_NAME: RdsGroup = RdsGroup::new([0x1234, 0x0540, 0xE0CD, 0x4B49]);
const RADIO_TEXT: RdsGroup = RdsGroup::new([0x1234, 0x2540, 0x4142, 0x4344]);

fn wide_band() -> Config {
    Config::default()
        .with_band(Band::JapanWide)
        .with_spacing(Spacing::Khz100)
}

#[test]
fn initialize_powers_up_with_rds_enabled() {
    let bus = sim_bus(SimulatedSi4703::new());
    let tuner = initialized(&bus, Config::default());
    assert_eq!(tuner.state(), TunerState::Ready);

    with_chip(&bus, |chip| {
        assert!(chip.is_powered());
        assert_eq!(chip.register(Register::Test1), TEST1_XOSC_ENABLE);
        assert_ne!(chip.register(Register::SysConfig1) & SYSCONFIG1_RDS, 0);
        assert_ne!(chip.register(Register::PowerCfg) & POWERCFG_DMUTE, 0);
        assert_eq!(chip.register(Register::SysConfig2) & SYSCONFIG2_VOLUME_MASK, 0x0A);
        assert_eq!(chip.register(Register::SysConfig2) & SYSCONFIG2_SPACE_MASK, 0);
        assert_eq!(chip.register(Register::SysConfig2) & SYSCONFIG2_BAND_MASK, 0);
    });
    assert!(tuner.release().1.elapsed_ms() >= POWER_UP_MS);
}

#[test]
fn initialize_twice_is_a_no_op() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());
    let traffic = with_chip(&bus, |chip| (chip.reads(), chip.writes()));

    block_on(tuner.initialize()).unwrap();

    assert_eq!(tuner.state(), TunerState::Ready);
    assert_eq!(with_chip(&bus, |chip| (chip.reads(), chip.writes())), traffic);
}

#[test]
fn absent_chip_fails_initialization() {
    let bus = sim_bus(SimulatedSi4703::absent());
    let mut tuner = tuner(&bus, Config::default());

    let err = block_on(tuner.initialize()).unwrap_err();
    assert!(matches!(err, Error::DeviceInit(InitError::Bus(SimError::Nack))));
    assert_eq!(tuner.state(), TunerState::Uninitialized);
}

#[test]
fn foreign_device_id_fails_initialization() {
    let bus = sim_bus(SimulatedSi4703::new().with_device_id(0x1111));
    let mut tuner = tuner(&bus, Config::default());

    let err = block_on(tuner.initialize()).unwrap_err();
    assert!(matches!(
        err,
        Error::DeviceInit(InitError::UnexpectedDeviceId(0x1111))
    ));
    assert_eq!(with_chip(&bus, |chip| chip.writes()), 0);
}

#[test]
fn tune_reports_the_channel_read_back() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());

    let tuned = block_on(tuner.tune_to_channel(mhz(927))).unwrap();
    assert_eq!(tuned, mhz(927));
    assert_eq!(tuner.state(), TunerState::Tuned(mhz(927)));
    assert_eq!(block_on(tuner.channel()).unwrap(), mhz(927));

    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::Channel), 26);
        assert_eq!(chip.register(Register::StatusRssi) & STATUS_STC, 0);
        assert_eq!(chip.tuned_channel(), mhz(927));
    });
}

#[test]
fn every_grid_channel_of_the_wide_band_tunes() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, wide_band());

    for tenths in 760..=1080 {
        let channel = mhz(tenths);
        assert_eq!(block_on(tuner.tune_to_channel(channel)).unwrap(), channel);
        assert!(block_on(tuner.read_rds()).is_ok());
    }
}

#[test]
fn out_of_band_channels_never_reach_the_bus() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, wide_band());
    let traffic = with_chip(&bus, |chip| (chip.reads(), chip.writes()));

    for tenths in [0, 50, 759, 1081, 1200] {
        let err = block_on(tuner.tune_to_channel(mhz(tenths))).unwrap_err();
        assert!(matches!(err, Error::OutOfRange(c) if c == mhz(tenths)));
    }

    assert_eq!(with_chip(&bus, |chip| (chip.reads(), chip.writes())), traffic);
    assert_eq!(tuner.state(), TunerState::Ready);
}

#[test]
fn range_is_checked_before_initialization() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuner(&bus, Config::default());

    let err = block_on(tuner.tune_to_channel(mhz(50))).unwrap_err();
    assert!(matches!(err, Error::OutOfRange(_)));
    let err = block_on(tuner.tune_to_channel(mhz(927))).unwrap_err();
    assert!(matches!(err, Error::NotInitialized));

    assert_eq!(with_chip(&bus, |chip| chip.reads() + chip.writes()), 0);
}

#[test]
fn off_grid_channels_are_rejected() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());

    let err = block_on(tuner.tune_to_channel(mhz(928))).unwrap_err();
    assert!(matches!(err, Error::OffGrid(c) if c == mhz(928)));
    assert_eq!(tuner.state(), TunerState::Ready);
}

#[test]
fn rds_requires_a_tuned_channel() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuner(&bus, Config::default());
    assert!(matches!(block_on(tuner.read_rds()), Err(Error::NotInitialized)));

    block_on(tuner.initialize()).unwrap();
    with_chip(&bus, |chip| chip.push_rds(RADIO_TEXT));
    assert!(matches!(block_on(tuner.read_rds()), Err(Error::NotTuned)));
}

#[test]
fn polling_without_broadcast_data_yields_empty_records() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default());

    for _ in 0..5 {
        assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Empty);
    }
}

#[test]
fn queued_groups_arrive_in_order_and_once() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default());
    with_chip(&bus, |chip| {
        assert!(chip.push_rds(STATION_NAME));
        assert!(chip.push_rds(RADIO_TEXT));
    });

    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Group(STATION_NAME));
    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Group(RADIO_TEXT));
    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Empty);
}

#[test]
fn stalled_tune_times_out_within_the_ceiling() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default().with_tune_timeout_ms(300));
    with_chip(&bus, |chip| chip.set_stall_tune(true));

    let err = block_on(tuner.tune_to_channel(mhz(927))).unwrap_err();
    assert!(matches!(err, Error::TuneTimeout));
    assert_eq!(tuner.state(), TunerState::Ready);
    assert!(matches!(block_on(tuner.read_rds()), Err(Error::NotTuned)));

    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::Channel) & CHANNEL_TUNE, 0)
    });
    let waited = tuner.release().1.elapsed_ms() - POWER_UP_MS;
    assert!(waited <= 300, "waited {waited} ms");
}

#[test]
fn retry_backoffs_count_against_the_tune_timeout() {
    let bus = sim_bus(SimulatedSi4703::new());
    let config = Config::default()
        .with_tune_timeout_ms(300)
        .with_io_attempts(3);
    let mut tuner = initialized(&bus, config);
    with_chip(&bus, |chip| {
        chip.set_stall_tune(true);
        // Read and CHAN|TUNE write go through, the first STC poll needs two retries.
        chip.fail_after(2, 2);
    });

    let err = block_on(tuner.tune_to_channel(mhz(927))).unwrap_err();
    assert!(matches!(err, Error::TuneTimeout));
    let waited = tuner.release().1.elapsed_ms() - POWER_UP_MS;
    assert_eq!(waited, 300);
}

#[test]
fn tune_recovers_once_the_chip_responds_again() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());
    with_chip(&bus, |chip| chip.set_stall_tune(true));
    assert!(block_on(tuner.tune_to_channel(mhz(927))).is_err());

    with_chip(&bus, |chip| chip.set_stall_tune(false));
    assert_eq!(block_on(tuner.tune_to_channel(mhz(927))).unwrap(), mhz(927));
}

#[test]
fn failed_tune_clear_is_undone_before_the_next_tune() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(1));
    // Read, CHAN|TUNE write and STC poll succeed; the TUNE-clearing write fails.
    with_chip(&bus, |chip| chip.fail_after(3, 1));

    let err = block_on(tuner.tune_to_channel(mhz(1011))).unwrap_err();
    assert!(matches!(err, Error::DeviceIo(SimError::Bus)));
    assert_eq!(tuner.state(), TunerState::Ready);
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::Channel) & CHANNEL_TUNE, 0);
        assert_eq!(chip.register(Register::StatusRssi) & STATUS_STC, 0);
    });

    assert_eq!(block_on(tuner.tune_to_channel(mhz(955))).unwrap(), mhz(955));
    assert_eq!(tuner.state(), TunerState::Tuned(mhz(955)));
}

#[test]
fn tune_left_pending_on_the_chip_is_settled_first() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(1));
    // The TUNE-clearing write and the best-effort clear after it both fail.
    with_chip(&bus, |chip| chip.fail_after(3, 2));

    assert!(block_on(tuner.tune_to_channel(mhz(1011))).is_err());
    with_chip(&bus, |chip| {
        assert_ne!(chip.register(Register::Channel) & CHANNEL_TUNE, 0);
        assert_ne!(chip.register(Register::StatusRssi) & STATUS_STC, 0);
    });

    assert_eq!(block_on(tuner.tune_to_channel(mhz(955))).unwrap(), mhz(955));
    with_chip(&bus, |chip| {
        assert_eq!(chip.tuned_channel(), mhz(955));
        assert_eq!(chip.register(Register::Channel), 40);
    });
}

#[test]
fn failed_stc_drop_poll_still_clears_tune() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(1));
    // Everything up to the TUNE-clearing write succeeds; the STC-low poll fails.
    with_chip(&bus, |chip| chip.fail_after(4, 1));

    let err = block_on(tuner.tune_to_channel(mhz(1011))).unwrap_err();
    assert!(matches!(err, Error::DeviceIo(SimError::Bus)));
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::Channel) & CHANNEL_TUNE, 0)
    });

    assert_eq!(block_on(tuner.tune_to_channel(mhz(955))).unwrap(), mhz(955));
}

#[test]
fn a_tune_landing_elsewhere_is_an_error() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());
    with_chip(&bus, |chip| chip.set_stuck_channel(Some(mhz(1011))));

    let err = block_on(tuner.tune_to_channel(mhz(955))).unwrap_err();
    assert!(matches!(
        err,
        Error::ChannelMismatch { requested, reported }
            if requested == mhz(955) && reported == mhz(1011)
    ));
    assert_eq!(tuner.state(), TunerState::Ready);

    with_chip(&bus, |chip| chip.set_stuck_channel(None));
    assert_eq!(block_on(tuner.tune_to_channel(mhz(955))).unwrap(), mhz(955));
}

#[test]
fn groups_queued_before_the_tune_are_not_lost() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());
    with_chip(&bus, |chip| chip.push_rds(STATION_NAME));

    block_on(tuner.tune_to_channel(mhz(927))).unwrap();
    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Group(STATION_NAME));
}

#[test]
fn transient_bus_errors_are_retried() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(3));
    with_chip(&bus, |chip| {
        chip.fail_next(2);
        chip.push_rds(RADIO_TEXT);
    });

    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Group(RADIO_TEXT));
}

#[test]
fn persistent_bus_errors_surface_as_device_io() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(3));
    with_chip(&bus, |chip| chip.fail_next(3));

    let err = block_on(tuner.read_rds()).unwrap_err();
    assert!(matches!(err, Error::DeviceIo(SimError::Bus)));
    // The failure does not poison the driver.
    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Empty);
}

#[test]
fn bus_errors_during_power_up_are_init_errors() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuner(&bus, Config::default().with_io_attempts(1));
    with_chip(&bus, |chip| chip.fail_next(1));

    let err = block_on(tuner.initialize()).unwrap_err();
    assert!(matches!(err, Error::DeviceInit(InitError::Bus(SimError::Bus))));
    block_on(tuner.initialize()).unwrap();
}

#[test]
fn seek_walks_the_station_list_and_stops_at_the_band_limit() {
    let chip = SimulatedSi4703::new().with_stations(&[mhz(881), mhz(955), mhz(1011)]);
    let bus = sim_bus(chip);
    let mut tuner = tuned_to(&bus, mhz(927), Config::default());

    assert_eq!(
        block_on(tuner.seek(SeekDirection::Up)).unwrap(),
        SeekOutcome::Found(mhz(955))
    );
    assert_eq!(
        block_on(tuner.seek(SeekDirection::Up)).unwrap(),
        SeekOutcome::Found(mhz(1011))
    );
    // 108.0 is not on the 200 kHz grid starting at 87.5.
    assert_eq!(
        block_on(tuner.seek(SeekDirection::Up)).unwrap(),
        SeekOutcome::BandLimit(mhz(1079))
    );
    assert_eq!(tuner.state(), TunerState::Tuned(mhz(1079)));
    assert_eq!(
        block_on(tuner.seek(SeekDirection::Down)).unwrap(),
        SeekOutcome::Found(mhz(1011))
    );

    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::PowerCfg) & POWERCFG_SEEK, 0);
        assert_ne!(chip.register(Register::PowerCfg) & POWERCFG_SKMODE, 0);
    });
}

#[test]
fn stalled_seek_times_out_within_the_ceiling() {
    let bus = sim_bus(SimulatedSi4703::new().with_stations(&[mhz(955)]));
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_seek_timeout_ms(200));
    with_chip(&bus, |chip| chip.set_stall_seek(true));

    let err = block_on(tuner.seek(SeekDirection::Up)).unwrap_err();
    assert!(matches!(err, Error::TuneTimeout));
    assert_eq!(tuner.state(), TunerState::Ready);
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::PowerCfg) & POWERCFG_SEEK, 0)
    });

    with_chip(&bus, |chip| chip.set_stall_seek(false));
    assert_eq!(
        block_on(tuner.seek(SeekDirection::Up)).unwrap(),
        SeekOutcome::Found(mhz(955))
    );
    let waited = tuner.release().1.elapsed_ms() - POWER_UP_MS;
    assert!(waited <= 200, "waited {waited} ms");
}

#[test]
fn failed_seek_clear_is_settled_before_the_next_tune() {
    let bus = sim_bus(SimulatedSi4703::new().with_stations(&[mhz(955)]));
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(1));
    // Read, SEEK write and STC poll succeed; the SEEK-clearing write and its retry fail.
    with_chip(&bus, |chip| chip.fail_after(3, 2));

    let err = block_on(tuner.seek(SeekDirection::Up)).unwrap_err();
    assert!(matches!(err, Error::DeviceIo(SimError::Bus)));
    with_chip(&bus, |chip| {
        assert_ne!(chip.register(Register::PowerCfg) & POWERCFG_SEEK, 0)
    });

    assert_eq!(block_on(tuner.tune_to_channel(mhz(1011))).unwrap(), mhz(1011));
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::PowerCfg) & POWERCFG_SEEK, 0);
        assert_eq!(chip.tuned_channel(), mhz(1011));
    });
}

#[test]
fn failed_seek_clear_is_undone_at_once() {
    let bus = sim_bus(SimulatedSi4703::new().with_stations(&[mhz(955)]));
    let mut tuner = tuned_to(&bus, mhz(927), Config::default().with_io_attempts(1));
    with_chip(&bus, |chip| chip.fail_after(3, 1));

    assert!(block_on(tuner.seek(SeekDirection::Up)).is_err());
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::PowerCfg) & POWERCFG_SEEK, 0);
        assert_eq!(chip.register(Register::StatusRssi) & STATUS_STC, 0);
    });
    assert_eq!(
        block_on(tuner.seek(SeekDirection::Down)).unwrap(),
        SeekOutcome::BandLimit(mhz(875))
    );
}

#[test]
fn seek_makes_rds_readable() {
    let bus = sim_bus(SimulatedSi4703::new().with_stations(&[mhz(881)]));
    let mut tuner = initialized(&bus, Config::default());

    assert_eq!(
        block_on(tuner.seek(SeekDirection::Up)).unwrap(),
        SeekOutcome::Found(mhz(881))
    );
    assert_eq!(block_on(tuner.read_rds()).unwrap(), RdsRecord::Empty);
}

#[test]
fn signal_quality_reflects_statusrssi() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default());
    with_chip(&bus, |chip| chip.set_signal(42, true));

    let quality = block_on(tuner.signal_quality()).unwrap();
    assert_eq!(quality.rssi, 42);
    assert!(quality.stereo);
    assert!(!quality.afc_railed);
}

#[test]
fn volume_mute_and_mono_update_the_chip() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = initialized(&bus, Config::default());

    let err = block_on(tuner.set_volume(16)).unwrap_err();
    assert!(matches!(err, Error::InvalidVolume(16)));
    block_on(tuner.set_volume(5)).unwrap();
    block_on(tuner.set_mute(true)).unwrap();
    block_on(tuner.set_mono(true)).unwrap();
    assert_eq!(tuner.config().volume, 5);

    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::SysConfig2) & SYSCONFIG2_VOLUME_MASK, 5);
        assert_eq!(chip.register(Register::PowerCfg) & POWERCFG_DMUTE, 0);
        assert_ne!(chip.register(Register::PowerCfg) & POWERCFG_MONO, 0);
    });
}

#[test]
fn volume_before_initialization_is_applied_at_power_up() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuner(&bus, Config::default());

    block_on(tuner.set_volume(3)).unwrap();
    assert_eq!(with_chip(&bus, |chip| chip.writes()), 0);

    block_on(tuner.initialize()).unwrap();
    with_chip(&bus, |chip| {
        assert_eq!(chip.register(Register::SysConfig2) & SYSCONFIG2_VOLUME_MASK, 3)
    });
}

#[test]
fn power_down_disables_the_chip_and_allows_a_restart() {
    let bus = sim_bus(SimulatedSi4703::new());
    let mut tuner = tuned_to(&bus, mhz(927), Config::default());

    block_on(tuner.power_down()).unwrap();
    assert_eq!(tuner.state(), TunerState::Uninitialized);
    assert!(matches!(block_on(tuner.read_rds()), Err(Error::NotInitialized)));
    with_chip(&bus, |chip| {
        assert!(!chip.is_powered());
        assert_ne!(chip.register(Register::PowerCfg) & POWERCFG_DISABLE, 0);
        assert_eq!(chip.register(Register::SysConfig1) & SYSCONFIG1_RDS, 0);
    });

    block_on(tuner.initialize()).unwrap();
    assert_eq!(block_on(tuner.tune_to_channel(mhz(1039))).unwrap(), mhz(1039));
    assert!(with_chip(&bus, |chip| chip.is_powered()));
}
