use std::fs;

use pump_hardware::error::HwError;
use pump_hardware::w1::{W1TemperatureBus, parse_w1_slave};
use pump_traits::{SensorId, TemperatureBus};
use rstest::rstest;
use tempfile::tempdir;

fn probe() -> SensorId {
    SensorId::parse_hex("280bb575d0013c92").unwrap()
}

#[rstest]
#[case("72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=23125\n", 23.125)]
#[case("50 05 4b 46 7f ff 0c 10 1c : crc=1c YES\n50 05 4b 46 7f ff 0c 10 1c t=85000\n", 85.0)]
#[case("f0 ff 4b 46 7f ff 10 10 c6 : crc=c6 YES\nf0 ff 4b 46 7f ff 10 10 c6 t=-1000\n", -1.0)]
fn parses_good_payloads(#[case] text: &str, #[case] expected: f32) {
    let c = parse_w1_slave(text, &probe()).expect("parse");
    assert!((c - expected).abs() < 1e-3, "{c} != {expected}");
}

#[test]
fn crc_failure_is_an_error() {
    let text = "72 01 4b 46 7f ff 0e 10 57 : crc=00 NO\n72 01 4b 46 7f ff 0e 10 57 t=23125\n";
    match parse_w1_slave(text, &probe()) {
        Err(HwError::CrcMismatch { sensor }) => assert_eq!(sensor, "280bb575d0013c92"),
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn reads_probe_from_sysfs_tree() {
    let dir = tempdir().unwrap();
    let dev = dir.path().join("28-3c01d075b50b");
    fs::create_dir_all(&dev).unwrap();
    fs::write(
        dev.join("w1_slave"),
        "72 01 4b 46 7f ff 0e 10 57 : crc=57 YES\n72 01 4b 46 7f ff 0e 10 57 t=41500\n",
    )
    .unwrap();

    let mut bus = W1TemperatureBus::new(dir.path());
    bus.start_conversion().expect("bus present");
    let c = bus.read_celsius(&probe()).expect("read");
    assert!((c - 41.5).abs() < 1e-3);
}

#[test]
fn missing_probe_reports_sensor_missing() {
    let dir = tempdir().unwrap();
    let bus = W1TemperatureBus::new(dir.path());
    match bus.read(&probe()) {
        Err(HwError::SensorMissing { .. }) => {}
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn missing_bus_root_fails_conversion() {
    let dir = tempdir().unwrap();
    let mut bus = W1TemperatureBus::new(dir.path().join("nope"));
    let err = bus.start_conversion().expect_err("no bus");
    assert!(err.to_string().contains("missing"));
}
