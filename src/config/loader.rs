use super::expand_tilde;
use super::types::*;
use crate::utils::cron;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Target '{0}' not found")]
    TargetNotFound(String),

    #[error("Target '{target}': no parameter block for destination '{id}'")]
    MissingDestinationBlock { target: String, id: String },

    #[error("Target '{target}': unknown kind '{kind}' for destination '{id}'")]
    UnknownDestinationKind {
        target: String,
        id: String,
        kind: String,
    },

    #[error("Target '{target}': invalid parameters for destination '{id}': {source}")]
    InvalidDestination {
        target: String,
        id: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load and validate configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(contents: &str) -> Result<Config> {
    let config: Config = toml::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.targets.is_empty() {
        return Err(ConfigError::ValidationError(
            "No targets defined".to_string(),
        ));
    }

    for (name, target) in &config.targets {
        validate_target(name, target)?;
    }

    Ok(())
}

fn validate_target(name: &str, target: &BackupTargetConfig) -> Result<()> {
    if name.is_empty() || name.contains('/') || name.contains('\\') {
        return Err(ConfigError::ValidationError(format!(
            "Invalid target name '{}': must be non-empty and contain no path separators",
            name
        )));
    }

    if target.path.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(format!(
            "Target '{}': path must not be empty",
            name
        )));
    }

    if let Some(ref cron) = target.cron {
        if !cron::is_valid_schedule(cron) {
            return Err(ConfigError::ValidationError(format!(
                "Target '{}': invalid cron schedule format (expected 5 fields): {}",
                name, cron
            )));
        }
    }

    let mut seen = HashSet::new();
    for id in &target.destinations {
        if !seen.insert(id.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Target '{}': destination '{}' listed more than once",
                name, id
            )));
        }
        decode_destination(name, id, &target.destination_params)?;
    }

    for (key, value) in &target.destination_params {
        if !value.is_table() {
            return Err(ConfigError::ValidationError(format!(
                "Target '{}': unknown option '{}'",
                name, key
            )));
        }
    }

    Ok(())
}

/// Decode the parameter block of destination `id`
///
/// The backend kind comes from an explicit `type` key, or from the
/// identifier itself when the block has none.
fn decode_destination(
    target: &str,
    id: &str,
    params: &BTreeMap<String, toml::Value>,
) -> Result<DestinationConfig> {
    let mut table = match params.get(id) {
        Some(toml::Value::Table(table)) => table.clone(),
        _ => {
            return Err(ConfigError::MissingDestinationBlock {
                target: target.to_string(),
                id: id.to_string(),
            })
        }
    };

    let kind_name = match table.remove("type") {
        Some(toml::Value::String(kind)) => kind,
        Some(other) => {
            return Err(ConfigError::ValidationError(format!(
                "Target '{}': destination '{}' has a non-string type: {}",
                target, id, other
            )))
        }
        None => id.to_string(),
    };

    let kind = DestinationKind::parse(&kind_name).ok_or_else(|| {
        ConfigError::UnknownDestinationKind {
            target: target.to_string(),
            id: id.to_string(),
            kind: kind_name.clone(),
        }
    })?;

    let invalid = |source| ConfigError::InvalidDestination {
        target: target.to_string(),
        id: id.to_string(),
        source,
    };
    let value = toml::Value::Table(table);

    let config = match kind {
        DestinationKind::Local => {
            let mut local: LocalParams = value.try_into().map_err(invalid)?;
            local.directory = expand_tilde(&local.directory);
            DestinationConfig::Local(local)
        }
        DestinationKind::S3 => {
            let mut s3: S3Params = value.try_into().map_err(invalid)?;
            s3.credentials = s3.credentials.as_deref().map(expand_tilde);
            s3.config = s3.config.as_deref().map(expand_tilde);
            DestinationConfig::S3(s3)
        }
        DestinationKind::Gcs => {
            let mut gcs: GcsParams = value.try_into().map_err(invalid)?;
            gcs.credentials = gcs.credentials.as_deref().map(expand_tilde);
            DestinationConfig::Gcs(gcs)
        }
    };

    Ok(config)
}

/// Resolve a target configuration: expand paths and decode destinations
pub fn resolve_target(name: &str, target: &BackupTargetConfig) -> Result<ResolvedTarget> {
    let settings = TargetSettings {
        name: name.to_string(),
        path: expand_tilde(&target.path),
        format: target.format.clone(),
        cron: target.cron.clone(),
        keep_only: target.keep_only,
        date_suffix: target.date_suffix,
        exclude_vcs: target.exclude_vcs,
        preserve_absolute_hierarchy: target.preserve_absolute_hierarchy,
        exclude_dirs: target.exclude_dirs.clone(),
    };

    let destinations = target
        .destinations
        .iter()
        .map(|id| {
            Ok(ResolvedDestination {
                id: id.clone(),
                config: decode_destination(name, id, &target.destination_params)?,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(ResolvedTarget {
        settings,
        destinations,
    })
}

/// Resolve a single target by name
pub fn resolve_named_target(config: &Config, name: &str) -> Result<ResolvedTarget> {
    let target = config
        .targets
        .get(name)
        .ok_or_else(|| ConfigError::TargetNotFound(name.to_string()))?;
    resolve_target(name, target)
}

/// Resolve all targets in the configuration
pub fn resolve_all_targets(config: &Config) -> Result<BTreeMap<String, ResolvedTarget>> {
    let mut resolved = BTreeMap::new();

    for (name, target) in &config.targets {
        resolved.insert(name.clone(), resolve_target(name, target)?);
    }

    Ok(resolved)
}
