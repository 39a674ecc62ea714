//! Configuration module for autobackup
//!
//! This module handles loading, validating, and resolving configuration from TOML files.
//!
//! ## Destinations
//!
//! Each target lists destination identifiers and carries one parameter table
//! per identifier. The backend kind is taken from the table's `type` key, or
//! from the identifier when `type` is absent:
//!
//! ```toml
//! [targets.docs]
//! path = "~/Documents"
//! destinations = ["local", "offsite"]
//!
//! [targets.docs.local]
//! directory = "~/backups"
//!
//! [targets.docs.offsite]
//! type = "s3"
//! bucket = "my-bucket"
//! ```
//!
//! ## Example Usage
//!
//! ```no_run
//! use autobackup::config;
//!
//! let config = config::load_config("config.toml")?;
//! let targets = config::resolve_all_targets(&config)?;
//!
//! for (name, target) in targets {
//!     println!("Target: {}, Destinations: {}", name, target.destinations.len());
//! }
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::{
    load_config, parse_config, resolve_all_targets, resolve_named_target, resolve_target,
    ConfigError, Result,
};
pub use types::*;

use std::path::{Path, PathBuf};

/// Default configuration file location, `~/.config/autobackup/config.toml`
pub fn default_config_path() -> PathBuf {
    expand_tilde(Path::new("~/.config/autobackup/config.toml"))
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
