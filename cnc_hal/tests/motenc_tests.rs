//! Motenc style board driver against its register model.
//!
//! The model's watchdog runs on bus timestamps, so these tests use a clock
//! that only moves when the test advances it: one millisecond per scan
//! models a 1 kHz servo thread.
//!
//! Tests cover:
//! - Probe
//! - Watchdog bite, latch, explicit re-arm and output recovery
//! - Auto-reset mode and timeout snapping
//! - 32-bit counters, index handling
//! - Grouped ADC conversion and the inverted DAC slope
//! - Safe state on detach

mod common;

use cnc_common::prelude::*;
use cnc_hal::drivers::motenc::layout::WdControl;
use cnc_hal::drivers::motenc::{MotencDriver, MotencModel};
use cnc_hal::hw::sim::SimClock;
use common::{Rig, board, try_attach};

const TICKS_PER_MS: u64 = 1_000_000;

/// Helper: attach a motenc driver on a hand-advanced clock.
fn motenc(options: &str) -> Rig<MotencModel> {
    Rig::attach(
        Box::new(MotencDriver::new()),
        MotencModel::new(TICKS_PER_MS),
        SimClock::new(),
        &board("motenc.0", "motenc", options),
    )
}

/// Helper: `n` scans, one millisecond apart.
fn run_ms(rig: &mut Rig<MotencModel>, n: usize) {
    for _ in 0..n {
        rig.scan();
        rig.clock.advance_ns(1_000_000);
    }
}

const WATCHDOG_2MS: &str = "watchdog_enable = true\nwatchdog_timeout_ms = 2";

#[test]
fn test_empty_slot_fails_probe() {
    let result = try_attach(
        Box::new(MotencDriver::new()),
        MotencModel::absent(TICKS_PER_MS),
        SimClock::new(),
        &board("motenc.0", "motenc", ""),
    );
    match result {
        Err((HalError::BoardNotFound(_), pins)) => assert!(pins.is_empty()),
        Err((e, _)) => panic!("unexpected error {e}"),
        Ok(_) => panic!("attach should fail"),
    }
}

#[test]
fn test_invalid_options_rejected() {
    for options in ["channels = 9", r#"watchdog_timeout_ms = "soon""#, "watchdog = true"] {
        let result = try_attach(
            Box::new(MotencDriver::new()),
            MotencModel::new(TICKS_PER_MS),
            SimClock::new(),
            &board("motenc.0", "motenc", options),
        );
        assert!(matches!(result, Err((HalError::ConfigError(_), _))), "{options}");
    }
}

#[test]
fn test_watchdog_stays_quiet_while_scanned() {
    let mut rig = motenc(WATCHDOG_2MS);
    rig.float("motenc.0.dac.00.value").set(1.0);
    rig.bit("motenc.0.pin-00-out").set(true);

    run_ms(&mut rig, 10);

    let hw = rig.hw();
    assert!(!hw.bitten());
    assert_eq!(hw.outputs(), 0x0001);
    assert_eq!(hw.dac_code(0), 29491);
    assert!(hw.rearms() >= 10);
}

#[test]
fn test_watchdog_bite_cuts_outputs_until_reset() {
    let mut rig = motenc(WATCHDOG_2MS);
    rig.float("motenc.0.dac.00.value").set(1.0);
    rig.bit("motenc.0.pin-00-out").set(true);
    run_ms(&mut rig, 10);

    // The servo thread stalls.
    rig.clock.advance_ns(3_000_000);
    rig.call("di-read");
    {
        let hw = rig.hw();
        assert!(hw.bitten());
        assert_eq!(hw.outputs(), 0);
        assert_eq!(hw.dac_code(0), 0x8000);
    }

    // Scanning again does not re-arm a bitten watchdog.
    run_ms(&mut rig, 3);
    {
        let hw = rig.hw();
        assert!(hw.bitten());
        assert_eq!(hw.outputs(), 0);
        assert_eq!(hw.dac_code(0), 0x8000);
    }
    assert!(rig.bit("motenc.0.watchdog.has-bitten").get());
    assert_eq!(rig.diagnostics().watchdog_bites, 1);

    // Operator acknowledges; outputs come back on the following scan.
    rig.bit("motenc.0.watchdog.reset").set(true);
    run_ms(&mut rig, 1);
    assert!(!rig.hw().bitten());
    run_ms(&mut rig, 1);

    let hw = rig.hw();
    assert!(!hw.bitten());
    assert_eq!(hw.outputs(), 0x0001);
    assert_eq!(hw.dac_code(0), 29491);
    assert!(!rig.bit("motenc.0.watchdog.has-bitten").get());
    assert_eq!(rig.diagnostics().watchdog_bites, 1);
}

#[test]
fn test_auto_reset_rearms_on_output_writes() {
    let mut rig = motenc("watchdog_enable = true\nwatchdog_auto_reset = true\nwatchdog_timeout_ms = 2");
    run_ms(&mut rig, 10);
    assert!(!rig.hw().bitten());
    assert_eq!(rig.hw().rearms(), 0);

    rig.clock.advance_ns(3_000_000);
    rig.call("di-read");
    assert!(rig.hw().bitten());
}

#[test]
fn test_disabled_watchdog_never_bites() {
    let mut rig = motenc("");
    run_ms(&mut rig, 2);
    rig.clock.advance_ns(100_000_000);
    rig.scan();
    assert!(!rig.hw().bitten());
    assert_eq!(rig.hw().watchdog_control() & WdControl::ENABLE.bits(), 0);
}

#[test]
fn test_timeout_snaps_to_next_timebase() {
    let mut rig = motenc("watchdog_enable = true\nwatchdog_timeout_ms = 5");
    rig.call("watchdog-reset");
    assert_eq!(rig.u32("motenc.0.watchdog.timeout-ms").get(), 8);
    let control = rig.hw().watchdog_control();
    assert_eq!(control & 0x03, 2);
    assert_ne!(control & WdControl::ENABLE.bits(), 0);
}

#[test]
fn test_counter_extends_past_32_bits() {
    let mut rig = motenc("");
    rig.hw().move_encoder(0, i32::MAX - 5);
    rig.call("capture-position");
    rig.hw().move_encoder(0, 10);
    rig.call("capture-position");

    assert_eq!(rig.s32("motenc.0.enc.00.rawcounts").get(), i32::MIN + 4);
    assert_eq!(rig.float("motenc.0.enc.00.position").get(), 2_147_483_652.0);
}

#[test]
fn test_index_reset_clears_hardware_count() {
    let mut rig = motenc("");
    rig.hw().move_encoder(6, 1_234);
    rig.bit("motenc.0.enc.06.index-enable").set(true);
    rig.bit("motenc.0.enc.06.index-reset").set(true);
    rig.call("capture-position");
    assert_eq!(rig.s32("motenc.0.enc.06.counts").get(), 1_234);

    rig.hw().pulse_index(6);
    rig.call("capture-position");

    assert!(!rig.bit("motenc.0.enc.06.index-enable").get());
    assert_eq!(rig.s32("motenc.0.enc.06.counts").get(), 0);
    assert_eq!(rig.hw().count(6), 0);
}

#[test]
fn test_adc_groups_of_four() {
    let mut rig = motenc("");
    rig.hw().set_adc_volts(1, -2.5);
    rig.hw().set_adc_volts(5, 1.0);
    rig.float("motenc.0.adc.01.offset").set(0.5);

    rig.call("read-adcs");
    assert_eq!(rig.float("motenc.0.adc.01.value").get(), -2.0);
    assert_eq!(rig.float("motenc.0.adc.05.value").get(), 0.0);

    rig.call("read-adcs");
    let v5 = rig.float("motenc.0.adc.05.value").get();
    assert!((v5 - 0.999_755_859_375).abs() < 1e-12, "{v5}");
    assert_eq!(rig.s32("motenc.0.adc.05.raw").get(), 819);

    let hw = rig.hw();
    assert_eq!(hw.group_starts(0), 2);
    assert_eq!(hw.group_starts(1), 1);
}

#[test]
fn test_dac_slope_is_inverted() {
    let mut rig = motenc("");
    let value = rig.float("motenc.0.dac.03.value");

    for (volts, code) in [(1.0, 29491), (10.0, 1), (20.0, 1), (-10.0, 0xFFFF), (f64::NAN, 0x8000)] {
        value.set(volts);
        rig.call("write-dacs");
        assert_eq!(rig.hw().dac_code(3), code, "{volts} V");
        assert_eq!(rig.u32("motenc.0.dac.03.code").get(), code);
    }
}

#[test]
fn test_digital_inputs_and_outputs() {
    let mut rig = motenc("");
    assert!(rig.pins.bit("motenc.0.pin-31-in").is_ok());
    assert!(rig.pins.bit("motenc.0.pin-15-out").is_ok());
    assert!(rig.pins.bit("motenc.0.pin-16-out").is_err());

    rig.hw().set_inputs(0x8000_0001);
    rig.call("di-read");
    assert!(rig.bit("motenc.0.pin-00-in").get());
    assert!(!rig.bit("motenc.0.pin-01-in").get());
    assert!(rig.bit("motenc.0.pin-31-in").get());
    assert!(!rig.bit("motenc.0.pin-31-in-not").get());

    rig.bit("motenc.0.pin-15-out").set(true);
    rig.call("do-write");
    assert_eq!(rig.hw().outputs(), 0x8000);
}

#[test]
fn test_detach_disarms_watchdog_and_zeroes_outputs() {
    let mut rig = motenc(WATCHDOG_2MS);
    rig.float("motenc.0.dac.02.value").set(-3.0);
    rig.bit("motenc.0.pin-04-out").set(true);
    run_ms(&mut rig, 2);
    assert_ne!(rig.hw().watchdog_control() & WdControl::ENABLE.bits(), 0);

    rig.driver.detach().unwrap();

    let hw = rig.hw();
    assert_eq!(hw.watchdog_control() & WdControl::ENABLE.bits(), 0);
    assert!((0..8).all(|ch| hw.dac_code(ch) == 0x8000));
    assert_eq!(hw.outputs(), 0);
}

#[test]
fn test_detach_reports_vanished_board_after_safing() {
    let mut rig = motenc(WATCHDOG_2MS);
    rig.float("motenc.0.dac.01.value").set(2.0);
    rig.bit("motenc.0.pin-00-out").set(true);
    run_ms(&mut rig, 2);
    rig.hw().remove();

    let result = rig.driver.detach();

    assert!(matches!(result, Err(HalError::CommunicationError(_))));
    let hw = rig.hw();
    assert_eq!(hw.watchdog_control() & WdControl::ENABLE.bits(), 0);
    assert_eq!(hw.dac_code(1), 0x8000);
    assert_eq!(hw.outputs(), 0);
}
