//! Archive construction: path filtering, artifact naming, tar + gzip writing

mod builder;
mod filter;
mod naming;

pub use builder::{ArchiveBuilder, ArchiveError};
pub use filter::{PathFilter, VCS_DIRS};
pub use naming::{ArchiveFormat, ArtifactNaming, TIMESTAMP_FORMAT};

use std::path::PathBuf;

/// An archive produced by one run, living in the run's workdir
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
    pub file_count: usize,
    pub size_bytes: u64,
}
