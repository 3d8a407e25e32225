// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Parse a rule file from a string without semantic validation.
pub fn parse_str(contents: &str) -> Result<RawConfigFile> {
    Ok(toml::from_str(contents)?)
}

/// Load a rule file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** compile patterns
/// or check ids. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let contents = fs::read_to_string(path.as_ref())?;
    parse_str(&contents)
}

/// Load a rule file from path and validate it.
///
/// - Reads TOML.
/// - Applies defaults (handled by `serde` + `Default` impls).
/// - Checks ids, colours and timing knobs, and compiles every pattern.
///
/// File paths are deliberately not checked here: a missing log file disables
/// its rule at reconciliation time instead of failing the whole load.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Default rule file: `Logbeacon.toml` in the current working directory,
/// unless `LOGBEACON_CONFIG` is set.
pub fn default_config_path() -> PathBuf {
    std::env::var("LOGBEACON_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("Logbeacon.toml"))
}
