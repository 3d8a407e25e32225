// tests/cli_args.rs

use std::path::PathBuf;

use clap::Parser;

use logbeacon::cli::{CliArgs, LogLevel};

#[test]
fn explicit_config_and_flags() {
    let args = CliArgs::parse_from(["logbeacon", "--config", "rules.toml", "--dry-run"]);
    assert_eq!(args.config_path(), PathBuf::from("rules.toml"));
    assert!(args.dry_run);
    assert_eq!(args.log_level, None);
}

#[test]
fn log_level_parses() {
    let args = CliArgs::parse_from(["logbeacon", "--log-level", "debug"]);
    assert_eq!(args.log_level, Some(LogLevel::Debug));
}

#[test]
fn unknown_log_level_is_rejected() {
    assert!(CliArgs::try_parse_from(["logbeacon", "--log-level", "loud"]).is_err());
}
