use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Sim config with zero delays so a handful of ticks runs instantly.
const FAST: &str = r#"
[pins]
# required even though the simulator ignores pin numbers
relay_pump1 = 22
relay_pump2 = 21
manual_switch = 12
pump_select_switch = 14
float_switch = 11

[[pumps]]
id = 1
temperature_sensor = "280bb575d0013c92"
current_fault_a = 13.0

[[pumps]]
id = 2
temperature_sensor = "28de2775d0013c89"
current_fault_a = 13.0

[current_sensor]
samples = 5
sample_interval_ms = 0

[temperature]
settle_ms = 0

[timing]
interlock_ms = 0
reading_hold_ms = 0
alarm_page_ms = 1
power_on_settle_ms = 0
splash_ms = 0
idle_poll_ms = 0

[simulation]
# start above the float so the first tick runs a pump
initial_level = 0.9
"#;

fn write_config(dir: &tempfile::TempDir, extra: &str) -> PathBuf {
    let path = dir.path().join("station.toml");
    fs::write(&path, format!("{FAST}\n{extra}")).unwrap();
    path
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["run", "--ticks", "3"], 0, "stopped after 3 ticks", "stdout")]
#[case(&["run", "--ticks", "2"], 0, "LCD [", "stdout")]
#[case(&["self-check"], 0, "OK", "stdout")]
#[case(&["self-check"], 0, "switch float", "stdout")]
#[case(&["bogus"], 2, "unrecognized subcommand", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let mut cmd = Command::cargo_bin("pump_cli").unwrap();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[test]
fn json_run_ends_with_a_summary_line() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");

    let out = Command::cargo_bin("pump_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("run")
        .arg("--ticks")
        .arg("2")
        .output()
        .unwrap();
    assert!(out.status.success());

    let stdout = String::from_utf8_lossy(&out.stdout);
    let json_lines: Vec<serde_json::Value> = stdout
        .lines()
        .filter(|l| l.starts_with('{'))
        .map(|l| serde_json::from_str(l).expect("valid JSON line"))
        .collect();
    let summary = json_lines.last().expect("summary line");
    assert_eq!(summary["ticks"], 2);
    assert_eq!(summary["mode"], "normal");
    assert!(summary["starts"].as_u64().unwrap() >= 1);
    assert!(
        json_lines
            .iter()
            .any(|v| v["event"] == "pump_started" && v["pump"] == 2),
        "first float edge runs pump 2"
    );
}

#[test]
fn missing_config_is_a_config_error() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("pump_cli")
        .unwrap()
        .arg("--config")
        .arg(dir.path().join("absent.toml"))
        .arg("self-check")
        .assert()
        .code(3)
        .stderr(predicate::str::contains("could not be read"));
}

#[test]
fn out_of_range_config_is_rejected_as_json() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bad.toml");
    fs::write(&cfg, FAST.replace("samples = 5", "samples = 0")).unwrap();

    let out = Command::cargo_bin("pump_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("run")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&out.stderr);
    let line = stderr
        .lines()
        .rev()
        .find(|l| l.contains("\"reason\""))
        .expect("json error line");
    let v: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["reason"], "Config");
    assert!(v["message"].as_str().unwrap().contains("samples"));
}

#[test]
fn self_check_reports_failing_probe_bus() {
    let dir = tempdir().unwrap();
    let cfg = write_config(&dir, "");
    let text = fs::read_to_string(&cfg)
        .unwrap()
        .replace("initial_level = 0.9", "initial_level = 0.9\ntemperature_bus_fails = true");
    fs::write(&cfg, text).unwrap();

    Command::cargo_bin("pump_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("self-check")
        .assert()
        .code(5)
        .stdout(predicate::str::contains("temperature error"))
        .stderr(predicate::str::contains("self-check failed"));
}

#[test]
fn file_logging_creates_the_log() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("station.log");
    let extra = format!(
        "[logging]\nfile = {:?}\nrotation = \"never\"\n",
        log.to_string_lossy()
    );
    let cfg = write_config(&dir, &extra);

    Command::cargo_bin("pump_cli")
        .unwrap()
        .arg("--config")
        .arg(&cfg)
        .arg("run")
        .arg("--ticks")
        .arg("1")
        .assert()
        .success();
    assert!(log.exists(), "{} missing", log.display());
}
