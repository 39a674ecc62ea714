//! Crontab installation for scheduled targets
//!
//! Each target owns two lines in the user's crontab: a marker comment and
//! the schedule line that runs `autobackup run --target <name>`.

use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{info, warn};

const MARKER_PREFIX: &str = "# autobackup - Target:";

/// Get the path to the running binary
pub fn get_binary_path() -> Result<PathBuf> {
    env::current_exe().context("Failed to get current executable path")
}

/// Basic cron syntax check: five whitespace-separated fields
pub fn is_valid_schedule(schedule: &str) -> bool {
    schedule.split_whitespace().count() == 5
}

fn marker(target: &str) -> String {
    format!("{} {}", MARKER_PREFIX, target)
}

/// Marker comment plus schedule line for one target
pub fn cron_entry(binary: &Path, config_path: &Path, target: &str, schedule: &str) -> String {
    format!(
        "{}\n{} {} --config {} run --target {}",
        marker(target),
        schedule,
        binary.display(),
        config_path.display(),
        target
    )
}

/// Drop the entry of `target` (marker and the line after it)
pub fn remove_entry(existing: &str, target: &str) -> String {
    let marker = marker(target);
    let mut kept = Vec::new();
    let mut skip_next = false;

    for line in existing.lines() {
        if line.trim_end() == marker {
            skip_next = true;
            continue;
        }
        if skip_next {
            skip_next = false;
            continue;
        }
        kept.push(line);
    }

    if kept.is_empty() {
        String::new()
    } else {
        kept.join("\n") + "\n"
    }
}

/// Replace or append the entry of `target`
pub fn merge_entry(existing: &str, target: &str, entry: &str) -> String {
    let mut content = remove_entry(existing, target);
    content.push_str(entry);
    content.push('\n');
    content
}

/// Get the current crontab
pub fn get_crontab() -> Result<String> {
    let output = Command::new("crontab")
        .arg("-l")
        .output()
        .context("Failed to execute crontab -l")?;

    if !output.status.success() {
        // Empty crontab returns non-zero, check stderr
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("no crontab") {
            return Ok(String::new());
        }
        anyhow::bail!("Failed to read crontab: {}", stderr);
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Set the crontab content
pub fn set_crontab(content: &str) -> Result<()> {
    use std::io::Write;

    let mut child = Command::new("crontab")
        .arg("-")
        .stdin(std::process::Stdio::piped())
        .stdout(std::process::Stdio::piped())
        .stderr(std::process::Stdio::piped())
        .spawn()
        .context("Failed to spawn crontab")?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(content.as_bytes())
            .context("Failed to write to crontab stdin")?;
    } else {
        anyhow::bail!("Failed to open crontab stdin");
    }

    let output = child
        .wait_with_output()
        .context("Failed to wait for crontab")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("Crontab command failed: {}", stderr);
    }

    info!("Crontab updated successfully");
    Ok(())
}

/// Install (or replace) the cron job of a target
pub fn install_cron_job(
    target: &str,
    schedule: &str,
    config_path: &Path,
    dry_run: bool,
) -> Result<()> {
    let binary_path = get_binary_path()?;
    let entry = cron_entry(&binary_path, config_path, target, schedule);

    if dry_run {
        println!("  [DRY RUN] Would add cron job:");
        println!("    {}", entry.replace('\n', "\n    "));
        return Ok(());
    }

    let existing = get_crontab()?;
    if existing.contains(&marker(target)) {
        warn!("Cron job for target '{}' already exists, updating...", target);
    }

    set_crontab(&merge_entry(&existing, target, &entry))?;

    info!("Installed cron job for target: {}", target);
    Ok(())
}

/// List all autobackup cron markers
pub fn list_cron_jobs() -> Result<Vec<String>> {
    Ok(get_crontab()?
        .lines()
        .filter(|line| line.starts_with(MARKER_PREFIX))
        .map(str::to_string)
        .collect())
}
