// tests/config.rs

use std::error::Error;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use logbeacon::config::loader::parse_str;
use logbeacon::config::{
    load_and_validate, ConfigFile, ConfigStore, MemoryConfigStore, TomlConfigStore,
    DEFAULT_COLOR,
};
use logbeacon::errors::LogbeaconError;
use logbeacon::fs::mock::MockFileSystem;
use logbeacon::types::SignalStyle;
use logbeacon_test_utils::builders::{ConfigBuilder, RuleBuilder};

type TestResult = Result<(), Box<dyn Error>>;

const RULES_TOML: &str = r##"
[monitor]
debounce_ms = 250
frame_rate = 50

[[rule]]
id = "db"
name = "Database"
pattern = "FATAL|PANIC"
file = "/var/log/db.log"
style = "blink"
color = "#0000ff"

[[rule]]
id = "web"
name = "Web"
pattern = "timeout"
file = "~/logs/web.log"
case_insensitive = true
enabled = false
"##;

fn validate(toml: &str) -> Result<ConfigFile, LogbeaconError> {
    ConfigFile::try_from(parse_str(toml)?)
}

#[test]
fn full_file_parses_with_defaults() -> TestResult {
    let cfg = validate(RULES_TOML)?;

    assert_eq!(cfg.monitor().debounce(), Duration::from_millis(250));
    assert_eq!(cfg.monitor().frame_rate, 50);
    assert_eq!(cfg.monitor().reduced_frame_rate, 30);
    assert_eq!(cfg.monitor().frequency_threshold, 50);
    assert_eq!(
        cfg.monitor().governor_settings().normal_interval,
        Duration::from_millis(20)
    );

    let rules = cfg.rules();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].id, "db");
    assert_eq!(rules[0].style, SignalStyle::Blink);
    assert!(rules[0].enabled);

    assert_eq!(rules[1].color, DEFAULT_COLOR);
    assert_eq!(rules[1].style, SignalStyle::Pulse);
    assert!(!rules[1].enabled);
    assert!(rules[1].pattern.is_case_insensitive());
    assert_eq!(rules[1].file, "~/logs/web.log");
    Ok(())
}

#[test]
fn empty_file_is_valid() -> TestResult {
    let cfg = validate("")?;
    assert!(cfg.rules().is_empty());
    assert_eq!(cfg.monitor().debounce_ms, 100);
    Ok(())
}

#[test]
fn invalid_pattern_names_the_rule() {
    let raw = ConfigBuilder::new()
        .with_rule(RuleBuilder::new("broken", "([a-z", "/tmp/a.log").config())
        .raw();
    match ConfigFile::try_from(raw) {
        Err(LogbeaconError::InvalidPattern { rule, .. }) => assert_eq!(rule, "broken"),
        other => panic!("expected InvalidPattern, got {other:?}"),
    }
}

#[test]
fn duplicate_ids_are_rejected() {
    let raw = ConfigBuilder::new()
        .with_rule(RuleBuilder::new("same", "a", "/tmp/a.log").config())
        .with_rule(RuleBuilder::new("same", "b", "/tmp/b.log").config())
        .raw();
    let err = ConfigFile::try_from(raw).unwrap_err();
    assert!(err.to_string().contains("duplicate rule id 'same'"));
}

#[test]
fn bad_colour_is_rejected() {
    let raw = ConfigBuilder::new()
        .with_rule(RuleBuilder::new("c", "a", "/tmp/a.log").color("red").config())
        .raw();
    assert!(matches!(
        ConfigFile::try_from(raw),
        Err(LogbeaconError::ConfigError(_))
    ));
}

#[test]
fn monitor_knobs_are_checked() {
    assert!(validate("[monitor]\nframe_rate = 0\n").is_err());
    assert!(validate("[monitor]\nframe_rate = 20\nreduced_frame_rate = 40\n").is_err());
    assert!(validate("[monitor]\nfrequency_threshold = 0\n").is_err());
    assert!(ConfigFile::try_from(ConfigBuilder::new().with_frequency_threshold(0).raw()).is_err());
}

#[test]
fn unknown_style_is_a_toml_error() {
    let toml = r##"
[[rule]]
id = "x"
name = "X"
pattern = "x"
file = "/tmp/x.log"
style = "strobe"
"##;
    assert!(matches!(validate(toml), Err(LogbeaconError::TomlError(_))));
}

#[test]
fn toml_store_persists_rule_changes() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/etc/logbeacon.toml", RULES_TOML.as_bytes().to_vec());
    let mut store = TomlConfigStore::new("/etc/logbeacon.toml", Arc::new(fs.clone()));

    let mut rules = store.load_rules()?;
    rules[0].enabled = false;
    rules[0].file = "/var/log/db-new.log".to_string();
    store.update_rule(&rules[0])?;

    let reloaded = store.load_config()?;
    assert_eq!(reloaded.monitor().debounce_ms, 250);
    assert!(!reloaded.rules()[0].enabled);
    assert_eq!(reloaded.rules()[0].file, "/var/log/db-new.log");
    assert_eq!(reloaded.rules()[0].pattern.as_str(), "FATAL|PANIC");
    assert!(reloaded.rules()[1].pattern.is_case_insensitive());
    Ok(())
}

#[test]
fn toml_store_rejects_unknown_rule() -> TestResult {
    let fs = MockFileSystem::new();
    fs.add_file("/etc/logbeacon.toml", RULES_TOML.as_bytes().to_vec());
    let mut store = TomlConfigStore::new("/etc/logbeacon.toml", Arc::new(fs));

    let stranger = RuleBuilder::new("ghost", "x", "/tmp/x.log").build();
    let err = store.update_rule(&stranger).unwrap_err();
    assert!(err.to_string().contains("ghost"));
    Ok(())
}

#[test]
fn toml_store_creates_file_on_save() -> TestResult {
    let fs = MockFileSystem::new();
    let mut store = TomlConfigStore::new("/etc/new.toml", Arc::new(fs.clone()));

    store.save_rules(&[RuleBuilder::new("a", "ERROR", "/tmp/a.log").build()])?;

    let written = String::from_utf8(fs.contents("/etc/new.toml").ok_or("not written")?)?;
    assert!(written.contains("[[rule]]"));
    assert!(written.contains("[monitor]"));
    assert_eq!(store.load_rules()?.len(), 1);
    Ok(())
}

#[test]
fn memory_store_shares_state_between_clones() -> TestResult {
    let store = MemoryConfigStore::new(vec![RuleBuilder::new("a", "x", "/tmp/a.log").build()]);
    let mut handle = store.clone();

    let mut rule = handle.load_rules()?.remove(0);
    rule.enabled = false;
    handle.update_rule(&rule)?;
    assert!(!store.rule("a").ok_or("missing")?.enabled);
    assert_eq!(store.write_count(), 1);

    store.set_fail_writes(true);
    assert!(handle.update_rule(&rule).is_err());
    Ok(())
}

#[test]
fn loads_from_a_real_file() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("Logbeacon.toml");
    std::fs::write(&path, RULES_TOML)?;

    let cfg = load_and_validate(&path)?;
    assert_eq!(cfg.rules().len(), 2);

    let missing = load_and_validate(Path::new("/definitely/not/here.toml"));
    assert!(matches!(missing, Err(LogbeaconError::IoError(_))));
    Ok(())
}
