use std::fs;

use clap::Parser;
use serde_json::Value;
use swarmsim_app::{Cli, KnobUpdate, apply_updates, list_knobs};
use swarmsim_core::{BehaviorKind, SwarmConfig};

#[test]
fn config_file_is_layered_under_flags_and_knobs() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("swarm.json");
    fs::write(
        &path,
        r#"{ "behavior": "wall_follower", "robot_count": 6, "aggregation": { "wait_time": 10 } }"#,
    )
    .expect("write config");

    let path = path.to_str().expect("utf-8 temp path");
    let cli = Cli::try_parse_from([
        "swarmsim",
        "--config",
        path,
        "--seed",
        "77",
        "--set",
        "aggregation.wait_time=15",
        "config",
    ])
    .expect("parse");
    let config = cli.load_config().expect("load");
    assert_eq!(config.behavior, BehaviorKind::WallFollower);
    assert_eq!(config.robot_count, 6);
    assert_eq!(config.rng_seed, Some(77));
    assert_eq!(config.aggregation.wait_time, 15);
    assert_eq!(config.sensors, SwarmConfig::default().sensors);
}

#[test]
fn unreadable_config_reports_its_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.json");
    fs::write(&path, "{ not json").expect("write config");
    let path = path.to_str().expect("utf-8 temp path");
    let cli = Cli::try_parse_from(["swarmsim", "--config", path, "config"]).expect("parse");
    let err = cli.load_config().expect_err("malformed json");
    assert!(format!("{err:#}").contains("broken.json"));
}

#[test]
fn run_command_prints_a_json_report() {
    let cli = Cli::try_parse_from([
        "swarmsim",
        "--behavior",
        "basic-aggregation",
        "--robots",
        "15",
        "--seed",
        "3",
        "run",
        "--ticks",
        "40",
        "--log-every",
        "0",
    ])
    .expect("parse");
    let output = cli.execute().expect("execute");
    let report: Value = serde_json::from_str(&output).expect("json report");
    assert_eq!(report["behavior"], "basic_aggregation");
    assert_eq!(report["ticks"], 40);
    assert_eq!(report["robot_count"], 15);
    assert_eq!(report["last"]["tick"], 40);
    assert!(report.get("snapshot").is_none());
}

#[test]
fn knobs_command_lists_resolved_values() {
    let cli = Cli::try_parse_from(["swarmsim", "--set", "motion.max_speed=4.5", "knobs"])
        .expect("parse");
    let output = cli.execute().expect("execute");
    let knobs: Vec<Value> = serde_json::from_str(&output).expect("json list");
    let max_speed = knobs
        .iter()
        .find(|k| k["path"] == "motion.max_speed")
        .expect("max_speed knob");
    assert_eq!(max_speed["value"], 4.5);
    assert_eq!(max_speed["kind"], "number");
}

#[test]
fn every_listed_knob_can_be_written_back() {
    let config = SwarmConfig::default();
    let updates: Vec<KnobUpdate> = list_knobs(&config)
        .expect("knobs")
        .into_iter()
        .map(|entry| KnobUpdate {
            path: entry.path,
            value: entry.value,
        })
        .collect();
    assert_eq!(apply_updates(&config, &updates).expect("apply"), config);
}
