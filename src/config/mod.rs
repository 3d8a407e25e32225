// src/config/mod.rs

//! Rule file loading, validation and persistence.
//!
//! - [`model`] mirrors the TOML layout.
//! - [`validate`] turns a raw file into a [`ConfigFile`] with compiled
//!   patterns.
//! - [`store`] is the configuration collaborator the coordinator reads rules
//!   from and writes enable/path changes back to.

pub mod loader;
pub mod model;
pub mod store;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{ConfigFile, MonitorSection, RawConfigFile, RuleConfig, DEFAULT_COLOR};
pub use store::{ConfigStore, MemoryConfigStore, TomlConfigStore};
pub use validate::compile_rule;
