#![no_main]
use libfuzzer_sys::fuzz_target;
use pump_traits::SensorId;

fuzz_target!(|data: &str| {
    let probe = SensorId([0x28, 0x92, 0x3c, 0x01, 0xd0, 0x75, 0xb5, 0x0b]);
    if let Ok(c) = pump_hardware::w1::parse_w1_slave(data, &probe) {
        assert!(c.is_finite());
    }
});
