//! Test utilities for autobackup
//!
//! This crate provides shared test utilities, fixtures and helper functions
//! for testing the autobackup pipeline against local destinations.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use test_utils::{ConfigBuilder, TestContext};
//!
//! #[test]
//! fn my_test() {
//!     let ctx = TestContext::from_builder(
//!         ConfigBuilder::new().add_target("docs").with_keep_only("docs", 2),
//!     );
//!     // ... test code
//! }
//! ```

pub mod config_builder;
pub mod fixtures;
pub mod test_context;

// Re-export commonly used items
pub use config_builder::ConfigBuilder;
pub use fixtures::*;
pub use test_context::{OptionAssertions, ResultAssertions, TestContext};

// Re-export types from the main crate for convenience
pub use autobackup::config::{BackupTargetConfig, Config, GlobalConfig, TargetSettings};
pub use autobackup::destinations::mock::{DestinationCall, MockDestination};
pub use autobackup::destinations::{BackupItem, Destination};
pub use autobackup::retention::RetentionPolicy;

/// Common test result type
pub type TestResult<T = ()> = anyhow::Result<T>;
