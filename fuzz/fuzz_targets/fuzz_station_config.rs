#![no_main]
use libfuzzer_sys::fuzz_target;

// Arbitrary TOML must either fail to parse or fail validation; never panic.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = toml::from_str::<pump_config::Config>(data) {
        if cfg.validate().is_ok() {
            assert!(cfg.pump(1).is_some() && cfg.pump(2).is_some());
            assert!(cfg.current_sensor.samples >= 1);
        }
    }
});
