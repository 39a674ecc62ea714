//! Command tests for autobackup
//!
//! These tests drive the library entry points behind each CLI command
//! against local destinations in temporary directories.

mod artifacts;
mod list;
mod run;
mod validate;
