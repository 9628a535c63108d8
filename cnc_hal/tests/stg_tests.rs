//! Servo-To-Go style board driver against its register model.
//!
//! Tests cover:
//! - Probe and option validation
//! - 24-bit counter extension, scale and index handling
//! - Round-robin ADC conversion and timeouts
//! - DAC code mapping
//! - Digital port directions
//! - Safe state on detach

mod common;

use cnc_common::prelude::*;
use cnc_hal::drivers::stg::{StgDriver, StgModel};
use cnc_hal::hw::sim::SimClock;
use common::{Rig, board, try_attach};

/// Helper: attach an stg driver to `model` with the given options.
fn stg_with(model: StgModel, options: &str) -> Rig<StgModel> {
    Rig::attach(
        Box::new(StgDriver::new()),
        model,
        SimClock::new().with_step(1),
        &board("stg.0", "stg", options),
    )
}

/// Helper: default board, default options.
fn stg() -> Rig<StgModel> {
    stg_with(StgModel::new(), "")
}

/// Helper: attach error for the given model and options.
fn attach_error(model: StgModel, options: &str) -> (HalError, PinRegistry) {
    match try_attach(
        Box::new(StgDriver::new()),
        model,
        SimClock::new().with_step(1),
        &board("stg.0", "stg", options),
    ) {
        Ok(_) => panic!("attach should fail"),
        Err(e) => e,
    }
}

#[test]
fn test_empty_slot_fails_probe() {
    let (err, pins) = attach_error(StgModel::absent(), "");
    assert!(matches!(err, HalError::BoardNotFound(_)));
    assert!(pins.is_empty());
}

#[test]
fn test_invalid_options_rejected() {
    for options in ["channels = 9", "channels = 0", r#"dio_dirs = "IIX""#, r#"dio_dirs = "IIOOO""#, "speed = 3"] {
        let (err, _) = attach_error(StgModel::new(), options);
        assert!(matches!(err, HalError::ConfigError(_)), "{options}: {err}");
    }
}

#[test]
fn test_channel_count_limits_exports() {
    let rig = stg_with(StgModel::new(), "channels = 2");
    assert!(rig.pins.float("stg.0.enc.01.position").is_ok());
    assert!(rig.pins.float("stg.0.enc.02.position").is_err());
    assert!(rig.pins.float("stg.0.dac.01.value").is_ok());
    assert!(rig.pins.float("stg.0.dac.02.value").is_err());
    // The converter is shared, so all analog inputs are always present.
    assert!(rig.pins.float("stg.0.adc.07.value").is_ok());
}

#[test]
fn test_counter_extends_past_24_bits() {
    let mut rig = stg();
    for _ in 0..3 {
        rig.hw().move_encoder(0, 4_000_000);
        rig.call("capture-position");
    }
    assert_eq!(rig.s32("stg.0.enc.00.counts").get(), 12_000_000);
    assert_eq!(rig.s32("stg.0.enc.00.rawcounts").get(), 12_000_000 - (1 << 24));
    assert_eq!(rig.float("stg.0.enc.00.position").get(), 12_000_000.0);

    for _ in 0..3 {
        rig.hw().move_encoder(0, -5_000_000);
        rig.call("capture-position");
    }
    assert_eq!(rig.s32("stg.0.enc.00.counts").get(), -3_000_000);
}

#[test]
fn test_scale_change_applies_on_next_capture() {
    let mut rig = stg();
    rig.hw().move_encoder(2, 4_000);
    rig.float("stg.0.enc.02.scale").set(2_000.0);
    rig.call("capture-position");
    assert!((rig.float("stg.0.enc.02.position").get() - 2.0).abs() < 1e-12);

    rig.float("stg.0.enc.02.scale").set(-500.0);
    rig.call("capture-position");
    assert!((rig.float("stg.0.enc.02.position").get() + 8.0).abs() < 1e-12);

    // Zero is unusable; the default is substituted and written back.
    rig.float("stg.0.enc.02.scale").set(0.0);
    rig.call("capture-position");
    assert_eq!(rig.float("stg.0.enc.02.scale").get(), 1.0);
    assert_eq!(rig.float("stg.0.enc.02.position").get(), 4_000.0);
}

#[test]
fn test_index_reset_zeroes_count() {
    let mut rig = stg();
    rig.hw().move_encoder(1, 500);
    rig.call("capture-position");
    assert_eq!(rig.s32("stg.0.enc.01.counts").get(), 500);

    rig.bit("stg.0.enc.01.index-enable").set(true);
    rig.bit("stg.0.enc.01.index-reset").set(true);
    rig.call("capture-position");
    assert_eq!(rig.hw().index_armed() & 0x02, 0x02);
    assert!(rig.bit("stg.0.enc.01.index-enable").get());

    rig.hw().pulse_index(1);
    rig.call("capture-position");

    assert!(!rig.bit("stg.0.enc.01.index-enable").get());
    assert_eq!(rig.s32("stg.0.enc.01.counts").get(), 0);
    assert_eq!(rig.float("stg.0.enc.01.position").get(), 0.0);
    let hw = rig.hw();
    assert_eq!(hw.count(1), 0);
    assert_eq!(hw.index_clear_writes(), 2);
    assert_eq!(hw.index_armed() & 0x02, 0);
}

#[test]
fn test_index_without_reset_keeps_count() {
    let mut rig = stg();
    rig.hw().move_encoder(0, 77);
    rig.bit("stg.0.enc.00.index-enable").set(true);
    rig.call("capture-position");
    rig.hw().pulse_index(0);
    rig.call("capture-position");

    assert!(!rig.bit("stg.0.enc.00.index-enable").get());
    assert_eq!(rig.s32("stg.0.enc.00.counts").get(), 77);
}

#[test]
fn test_index_mark_ignored_while_disarmed() {
    let mut rig = stg();
    rig.hw().pulse_index(3);
    rig.bit("stg.0.enc.03.index-enable").set(true);
    rig.call("capture-position");
    rig.call("capture-position");
    assert!(rig.bit("stg.0.enc.03.index-enable").get());
    assert_eq!(rig.hw().index_clear_writes(), 0);
}

#[test]
fn test_adc_round_robin_reads_every_channel() {
    let mut rig = stg();
    let volts: Vec<f64> = (0..8).map(|ch| ch as f64 * 1.25 - 5.0).collect();
    for (ch, v) in volts.iter().enumerate() {
        rig.hw().set_adc_volts(ch, *v);
    }
    rig.float("stg.0.adc.03.gain").set(2.0);
    rig.float("stg.0.adc.03.offset").set(0.25);

    for _ in 0..8 {
        rig.call("read-adcs");
    }

    for (ch, v) in volts.iter().enumerate() {
        let expected = if ch == 3 { v * 2.0 - 0.25 } else { *v };
        let value = rig.float(&format!("stg.0.adc.{ch:02}.value")).get();
        assert!((value - expected).abs() < 1e-9, "adc {ch}: {value} != {expected}");
        assert_eq!(rig.hw().adc_reads(ch), 1, "adc {ch} read count");
    }
    assert_eq!(rig.s32("stg.0.adc.00.raw").get(), -2048);
    // Channel 0 was primed at attach and restarted after channel 7.
    assert_eq!(rig.hw().adc_starts(0), 2);
    assert_eq!(rig.hw().adc_starts(7), 1);
    assert_eq!(rig.diagnostics().adc_timeouts, 0);
}

#[test]
fn test_stuck_converter_times_out_and_restarts() {
    let mut rig = stg_with(StgModel::new().with_conversion_polls(100), "");
    for _ in 0..20 {
        rig.call("read-adcs");
    }
    assert!(rig.diagnostics().adc_timeouts >= 1);
    assert_eq!(rig.hw().adc_reads(0), 0);
    assert!(rig.hw().adc_starts(0) > 1);
}

#[test]
fn test_dac_codes() {
    let mut rig = stg();
    let value = rig.float("stg.0.dac.00.value");
    let code = rig.u32("stg.0.dac.00.code");

    value.set(5.0);
    rig.call("write-dacs");
    assert_eq!(rig.hw().dac_code(0), 0x1800);
    assert_eq!(code.get(), 0x1800);

    value.set(100.0);
    rig.call("write-dacs");
    assert_eq!(rig.hw().dac_code(0), 0x1FFF);

    value.set(-100.0);
    rig.call("write-dacs");
    assert_eq!(rig.hw().dac_code(0), 0x0000);

    value.set(f64::NAN);
    rig.call("write-dacs");
    assert_eq!(rig.hw().dac_code(0), 0x1000);
    assert_eq!(code.get(), 0x1000);
}

#[test]
fn test_dac_offset_and_gain() {
    let mut rig = stg();
    rig.float("stg.0.dac.04.value").set(3.0);
    rig.float("stg.0.dac.04.offset").set(1.0);
    rig.float("stg.0.dac.04.gain").set(2.5);
    rig.call("write-dacs");
    assert!((rig.hw().dac_volts(4) - 5.0).abs() < 1e-9);
}

#[test]
fn test_digital_ports_follow_direction_option() {
    let mut rig = stg();
    assert_eq!(rig.hw().dio_dir(), 0b1100);
    assert!(rig.pins.bit("stg.0.pin-00-in").is_ok());
    assert!(rig.pins.bit("stg.0.pin-16-out").is_ok());
    assert!(rig.pins.bit("stg.0.pin-16-in").is_err());

    rig.bit("stg.0.pin-16-out").set(true);
    rig.bit("stg.0.pin-31-out").set(true);
    rig.call("do-write");
    assert_eq!(rig.hw().dio_output(2), 0x01);
    assert_eq!(rig.hw().dio_output(3), 0x80);

    rig.hw().set_dio_input(1, 0x81);
    rig.call("di-read");
    assert!(rig.bit("stg.0.pin-08-in").get());
    assert!(rig.bit("stg.0.pin-15-in").get());
    assert!(!rig.bit("stg.0.pin-09-in").get());
    assert!(rig.bit("stg.0.pin-09-in-not").get());
}

#[test]
fn test_lowercase_direction_letters() {
    let rig = stg_with(StgModel::new(), r#"dio_dirs = "oiio""#);
    assert_eq!(rig.hw().dio_dir(), 0b1001);
    assert!(rig.pins.bit("stg.0.pin-00-out").is_ok());
    assert!(rig.pins.bit("stg.0.pin-08-in").is_ok());
}

#[test]
fn test_detach_leaves_board_safe() {
    let mut rig = stg();
    rig.float("stg.0.dac.00.value").set(5.0);
    rig.bit("stg.0.pin-16-out").set(true);
    rig.bit("stg.0.enc.00.index-enable").set(true);
    rig.scan();
    {
        let hw = rig.hw();
        assert_eq!(hw.dac_code(0), 0x1800);
        assert_eq!(hw.dio_output(2), 0x01);
        assert_eq!(hw.index_armed(), 0x01);
    }

    rig.driver.detach().unwrap();

    let hw = rig.hw();
    assert_eq!(hw.dac_code(0), 0x1000);
    assert_eq!(hw.dio_output(2), 0x00);
    assert_eq!(hw.index_armed(), 0x00);
}
