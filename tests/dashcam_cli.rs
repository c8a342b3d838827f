use std::process::Command;

fn combined_output(output: &std::process::Output) -> String {
    let mut combined = String::new();
    combined.push_str(&String::from_utf8_lossy(&output.stdout));
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    combined
}

fn dashcam_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_dashcam").expect("dashcam test binary not built")
}

#[test]
fn dashcam_help_lists_core_flags() {
    let output = Command::new(dashcam_bin())
        .arg("--help")
        .output()
        .expect("run dashcam --help");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Dashcam controller"));
    assert!(combined.contains("--passive-clip-limit"));
    assert!(combined.contains("--chord-action"));
}

#[test]
fn dashcam_check_simulated_prints_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(dashcam_bin())
        .args(["--check", "--simulate", "--data-dir"])
        .arg(dir.path())
        .output()
        .expect("run dashcam --check");
    assert!(output.status.success());
    let combined = combined_output(&output);
    assert!(combined.contains("Dashcam Doctor"));
    assert!(combined.contains("validation: ok"));
    assert!(combined.contains("mode: simulated"));
}

#[test]
fn dashcam_rejects_tick_that_misses_second_boundaries() {
    let output = Command::new(dashcam_bin())
        .args(["--simulate", "--tick-secs", "0.3"])
        .output()
        .expect("run dashcam with bad tick");
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("--tick-secs must divide 0.5 seconds"));
}

#[test]
fn dashcam_simulated_overheat_stops_on_thermal_limit() {
    let dir = tempfile::tempdir().expect("tempdir");
    let output = Command::new(dashcam_bin())
        .args(["--simulate", "--sim-cpu-temp", "95", "--flash-gap-ms", "1", "--data-dir"])
        .arg(dir.path())
        .env("DASHCAM_CRASH_LOG", dir.path().join("crash.log"))
        .output()
        .expect("run simulated dashcam");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("---------- New Session: "));
    assert!(stdout.contains("Too hot! Shutting down..."));
    assert!(stdout.contains("--------- Session Ended: "));
    assert!(stdout.contains("dashcam stopped: thermal_limit"));
}
