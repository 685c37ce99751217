use std::path::PathBuf;
use std::process::{Command, Output};

fn workspace_root() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..")
}

fn spiral(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_spiral"))
        .args(args)
        .current_dir(workspace_root())
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run spiral")
}

#[test]
fn test_schedule_lists_every_cycle() {
    let output = spiral(&["schedule", "--scenario", "scenarios/demo.toml", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let cycles: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let cycles = cycles.as_array().unwrap();
    assert_eq!(cycles.len(), 3);
    assert_eq!(cycles[0]["count"], 1);
    assert_eq!(cycles[2]["count"], 3);
}

#[test]
fn test_simulate_demo_runs_to_the_end() {
    let output = spiral(&["simulate", "--scenario", "scenarios/demo.toml", "--json"]);
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["snapshot"]["cycles_finalized"], 3);
    assert_eq!(report["snapshot"]["positions_filled"], 3);
    assert_eq!(report["steps"][0]["action"], "join");
    assert_eq!(report["steps"][0]["result"]["position_id"], 0);
}

#[test]
fn test_missing_scenario_fails() {
    let output = spiral(&["simulate", "--scenario", "scenarios/nope.toml"]);
    assert!(!output.status.success());
}
