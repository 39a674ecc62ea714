//! Artifact file names
//!
//! Artifacts are named `<target>[_<DDMMYYYY>_<HHMMSS>]<extension>`, with the
//! date segment present iff `date_suffix` is set. Listings only recognise the
//! form the target currently writes.

use crate::config::TargetSettings;
use chrono::{DateTime, Local};
use regex::Regex;
use std::sync::LazyLock;

/// chrono format of the date segment (local time)
pub const TIMESTAMP_FORMAT: &str = "%d%m%Y_%H%M%S";

static DATE_SEGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^_[0-9]{8}_[0-9]{6}$").expect("date segment regex is valid")
});

/// Container format requested by the configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    Unknown,
}

impl ArchiveFormat {
    pub fn parse(format: &str) -> Self {
        match format.to_lowercase().as_str() {
            "tar.gz" | "tgz" | "compressed" => Self::TarGz,
            _ => Self::Unknown,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::TarGz => ".tar.gz",
            Self::Unknown => ".unknown",
        }
    }
}

/// Naming rules shared by the archive builder and every destination of a target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactNaming {
    target: String,
    date_suffix: bool,
    format: ArchiveFormat,
}

impl ArtifactNaming {
    pub fn new(target: impl Into<String>, date_suffix: bool, format: ArchiveFormat) -> Self {
        Self {
            target: target.into(),
            date_suffix,
            format,
        }
    }

    pub fn for_target(settings: &TargetSettings) -> Self {
        Self::new(
            settings.name.clone(),
            settings.date_suffix,
            ArchiveFormat::parse(&settings.format),
        )
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn format(&self) -> ArchiveFormat {
        self.format
    }

    pub fn extension(&self) -> &'static str {
        self.format.extension()
    }

    /// File name of an artifact produced at `timestamp`
    pub fn file_name(&self, timestamp: &DateTime<Local>) -> String {
        if self.date_suffix {
            format!(
                "{}_{}{}",
                self.target,
                timestamp.format(TIMESTAMP_FORMAT),
                self.extension()
            )
        } else {
            format!("{}{}", self.target, self.extension())
        }
    }

    /// Whether `name` (a file name or object key) is an artifact of this target
    pub fn matches(&self, name: &str) -> bool {
        let base = name.rsplit('/').next().unwrap_or(name);

        base.strip_prefix(self.target.as_str())
            .and_then(|rest| rest.strip_suffix(self.extension()))
            .map(|middle| {
                if self.date_suffix {
                    DATE_SEGMENT.is_match(middle)
                } else {
                    middle.is_empty()
                }
            })
            .unwrap_or(false)
    }
}
