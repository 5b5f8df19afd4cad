//! Integration tests for the `example run` command.
use itertools::Itertools;
use portfolio::cli::RunOpts;
use portfolio::cli::example::handle_example_run_command;
use portfolio::settings::Settings;
use std::collections::HashMap;
use tempfile::tempdir;

/// An integration test for the `example run` command, using the example with a battery.
#[test]
fn test_handle_example_run_command() {
    unsafe { std::env::set_var("PORTFOLIO_LOG_LEVEL", "off") };

    let tempdir = tempdir().unwrap();
    let opts = RunOpts {
        output_dir: Some(tempdir.path().to_path_buf()),
        ..RunOpts::default()
    };
    handle_example_run_command("storage", &opts, Some(Settings::default())).unwrap();

    let builds: Vec<HashMap<String, String>> =
        csv::Reader::from_path(tempdir.path().join("gen_build.csv"))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
    let battery = builds
        .iter()
        .find(|row| row["project_id"] == "battery")
        .unwrap();
    let power: f64 = battery["built_capacity"].parse().unwrap();
    let energy: f64 = battery["built_energy_capacity"].parse().unwrap();
    assert!((energy - 4.0 * power).abs() < 1e-6);

    // Charge never exceeds what was built and the battery never holds more than its energy capacity
    let storage: Vec<HashMap<String, String>> =
        csv::Reader::from_path(tempdir.path().join("storage_dispatch.csv"))
            .unwrap()
            .into_deserialize()
            .try_collect()
            .unwrap();
    assert_eq!(storage.len(), 4);
    for row in &storage {
        let charge: f64 = row["charge"].parse().unwrap();
        let soc: f64 = row["state_of_charge"].parse().unwrap();
        assert!(charge <= power + 1e-6);
        assert!(soc <= energy + 1e-6);
    }

    assert!(tempdir.path().join("storage_cycle_count.csv").is_file());
    assert!(!tempdir.path().join("debug_zone_balance_duals.csv").exists());
}
