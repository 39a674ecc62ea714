//! autobackup library
//!
//! Archives configured directory trees into compressed tarballs and ships
//! them to local, S3 and Google Cloud Storage destinations with per
//! destination retention.

pub mod archive;
pub mod config;
pub mod destinations;
pub mod managers;
pub mod retention;
pub mod utils;

// Re-export commonly used types
pub use archive::{ArchiveBuilder, ArtifactNaming, PathFilter};
pub use config::{load_config, Config};
pub use destinations::{BackupItem, Destination};
pub use managers::backup::BackupManager;
pub use managers::logging::{init_console_logging, init_logging, LogGuard, LoggingConfig};
pub use managers::target::{BackupTarget, RunReport};
pub use retention::RetentionPolicy;
