//! Operator-facing rendering of fatal errors, and the process exit codes.

use pump_core::error::{BuildError, PumpError};

/// Explain a fatal error as "What happened / Likely causes / How to fix".
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPump(n) => format!(
                "What happened: Pump {n} is not configured.\nLikely causes: The [[pumps]] table with id = {n} is missing.\nHow to fix: Add both [[pumps]] tables (ids 1 and 2) to the config."
            ),
            BuildError::MissingCurrentSensor
            | BuildError::MissingTemperatureBus
            | BuildError::MissingRelays
            | BuildError::MissingSwitches
            | BuildError::MissingDisplay => format!(
                "What happened: The controller was assembled without a required device ({be}).\nLikely causes: The backend failed to initialize it.\nHow to fix: Check the log above for the device error and the wiring of that peripheral."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<PumpError>() {
        return match pe {
            PumpError::Hardware(detail) => format!(
                "What happened: A relay, switch or display operation failed ({detail}).\nLikely causes: Loose wiring, missing power to the relay board, or GPIO/I2C permissions.\nHow to fix: Check the [pins] config and wiring; both pumps were commanded off."
            ),
            PumpError::Config(detail) => format!(
                "What happened: Configuration problem ({detail}).\nLikely causes: Wrong pump id or sensor ROM code, or missing device permissions.\nHow to fix: Fix the config (or add the user to the gpio/i2c/spi groups) and rerun."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics over the whole context chain
    let msg = format!("{err:#}");
    let lower = msg.to_ascii_lowercase();

    if lower.contains("read config") {
        return format!(
            "What happened: The config file could not be read.\nLikely causes: Wrong --config path or missing file.\nHow to fix: Pass --config <FILE> pointing at a station TOML. Original: {msg}"
        );
    }

    if lower.contains("parse config") {
        return format!(
            "What happened: The config file is not valid TOML for this controller.\nLikely causes: Missing [pins] or [[pumps]] tables, or a misspelled key.\nHow to fix: Compare with etc/pump_station.toml. Original: {msg}"
        );
    }

    if lower.contains("self-check failed") {
        return format!(
            "What happened: {msg}.\nLikely causes: A sensor is unplugged or its bus is not enabled.\nHow to fix: Check the one-wire probes (w1 overlay) and the ADC wiring, then rerun self-check."
        );
    }

    if lower.contains("open ") && (lower.contains("pins") || lower.contains("i2c") || lower.contains("spi")) {
        return "What happened: Failed to initialize hardware peripherals.\nLikely causes: Incorrect pin numbers, disabled SPI/I2C interface, or insufficient permissions.\nHow to fix: Fix the [pins] values in the config; enable the interfaces and ensure the process may access GPIO.".to_string();
    }

    if lower.contains("must") || lower.contains("invalid") {
        return format!(
            "What happened: Configuration is invalid ({msg}).\nLikely causes: Out-of-range or conflicting values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "The controller stopped unexpectedly.{cause}\nHow to fix: Re-run with --log-level=debug and check the relays are off. Original: {msg}"
    )
}

/// Stable exit codes: 1 generic, 3 configuration, 4 hardware, 5 sensor check.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 3;
    }
    match err.downcast_ref::<PumpError>() {
        Some(PumpError::Config(_)) => return 3,
        Some(PumpError::Hardware(_)) => return 4,
        Some(PumpError::SensorCommunication { .. }) => return 5,
        _ => {}
    }
    let lower = format!("{err:#}").to_ascii_lowercase();
    if lower.contains("self-check failed") {
        5
    } else if lower.contains("config") {
        3
    } else {
        1
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    match exit_code_for_error(err) {
        3 => "Config",
        4 => "Hardware",
        5 => "Sensor",
        _ => "Error",
    }
}

/// One JSON object describing the error, printed under `--json`.
pub fn format_error_json(err: &eyre::Report) -> String {
    use serde_json::json;

    json!({
        "reason": reason_name(err),
        "code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use eyre::WrapErr;

    #[test]
    fn build_errors_are_config_class() {
        let err = eyre::Report::new(BuildError::MissingPump(2));
        assert_eq!(exit_code_for_error(&err), 3);
        assert!(humanize(&err).contains("id = 2"));
    }

    #[test]
    fn wrapped_hardware_error_keeps_its_code() {
        let res: Result<(), PumpError> = Err(PumpError::Hardware("relay on: bus".into()));
        let err = res.wrap_err("normal tick").unwrap_err();
        assert_eq!(exit_code_for_error(&err), 4);
        assert!(humanize(&err).contains("relay on: bus"));
        let v: serde_json::Value = serde_json::from_str(&format_error_json(&err)).unwrap();
        assert_eq!(v["reason"], "Hardware");
    }

    #[test]
    fn missing_file_is_explained() {
        let err = eyre::eyre!("read config \"x.toml\": No such file or directory");
        assert!(humanize(&err).contains("--config"));
        assert_eq!(exit_code_for_error(&err), 3);
    }
}
