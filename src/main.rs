use anyhow::{Context, Result};
use autobackup::config::{self, Config};
use autobackup::managers::logging::{self, LoggingConfig};
use autobackup::managers::target::{DestinationOutcome, PruneOutcome, RunReport};
use autobackup::utils::cron;
use autobackup::{BackupItem, BackupManager};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "autobackup")]
#[command(about = "Archive directories and ship them to local and cloud destinations", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ~/.config/autobackup/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run backups for all targets or a specific target
    Run {
        /// Specific target to backup (defaults to all targets)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// List all configured targets
    List,

    /// Show artifacts held by the destinations of a target
    Artifacts {
        /// Target name
        #[arg(short, long)]
        target: String,

        /// Optional destination filter
        #[arg(short, long)]
        destination: Option<String>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Validate configuration file
    Validate,

    /// Create directories and install cron jobs for scheduled targets
    Setup {
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,
    },
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("✗ {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(config::default_config_path);

    let config = match config::load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            logging::init_console_logging();
            return Err(e).with_context(|| {
                format!("Failed to load configuration from {}", config_path.display())
            });
        }
    };

    // Validation must not touch the log directory
    if let Some(Commands::Validate) = cli.command {
        return handle_validate(&config);
    }

    // Keep the guard alive until exit so the file writer flushes
    let _log_guard = match logging::init_logging(&LoggingConfig::from_global(&config.global)) {
        Ok(guard) => Some(guard),
        Err(e) => {
            logging::init_console_logging();
            tracing::warn!("File logging unavailable, logging to console only: {:#}", e);
            None
        }
    };

    match cli.command.unwrap_or(Commands::List) {
        Commands::Run { target } => handle_run(config, target),
        Commands::List => {
            handle_list(&config);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Artifacts {
            target,
            destination,
            json,
        } => handle_artifacts(config, &target, destination.as_deref(), json),
        Commands::Setup { dry_run } => handle_setup(&config, &config_path, dry_run),
        Commands::Validate => unreachable!("validate is handled before logging setup"),
    }
}

fn handle_run(config: Config, target: Option<String>) -> Result<ExitCode> {
    let mut manager = BackupManager::new(config)?;

    match target {
        Some(name) => {
            println!("Running backup for target: {}", name);
            let report = manager.backup_target(&name)?;
            print_report(&report);

            if report.is_success() {
                println!("✓ Backup completed successfully");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("✗ Backup finished with {} problem(s)", report.failures().len());
                Ok(ExitCode::FAILURE)
            }
        }
        None => {
            println!("Running backups for all targets...");
            manager.backup_all()?;
            println!("✓ All backups completed successfully");
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn print_report(report: &RunReport) {
    println!(
        "  Artifact: {} ({} files, {} bytes)",
        report.artifact, report.file_count, report.size_bytes
    );

    for id in &report.excluded {
        println!("  ✗ {}: not ready", id);
    }

    for dest in &report.destinations {
        match &dest.outcome {
            DestinationOutcome::UploadFailed { error } => {
                println!("  ✗ {} ({}): upload failed: {}", dest.id, dest.kind, error)
            }
            DestinationOutcome::Uploaded { prune } => match prune {
                PruneOutcome::Skipped => println!("  ✓ {} ({}): uploaded", dest.id, dest.kind),
                PruneOutcome::Pruned { deleted } => println!(
                    "  ✓ {} ({}): uploaded, {} old artifact(s) removed",
                    dest.id,
                    dest.kind,
                    deleted.len()
                ),
                PruneOutcome::Failed { error } => println!(
                    "  ✗ {} ({}): uploaded, retention failed: {}",
                    dest.id, dest.kind, error
                ),
            },
        }
    }
}

fn handle_list(config: &Config) {
    println!("Configured targets:");
    for (name, target) in &config.targets {
        println!("  {}", name);
        println!("    Path: {}", target.path.display());
        println!("    Format: {}", target.format);
        println!(
            "    Schedule: {}",
            target.cron.as_deref().unwrap_or("(manual)")
        );
        if target.keep_only > 0 {
            println!("    Keep: {}", target.keep_only);
        } else {
            println!("    Keep: all");
        }
        println!("    Destinations: {}", target.destinations.join(", "));
        println!();
    }
}

#[derive(Serialize)]
struct DestinationListing {
    destination: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifacts: Option<Vec<BackupItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn handle_artifacts(
    config: Config,
    target: &str,
    destination: Option<&str>,
    json: bool,
) -> Result<ExitCode> {
    let mut manager = BackupManager::new(config)?;
    let backup_target = manager
        .target_mut(target)
        .with_context(|| format!("Target '{}' not found in configuration", target))?;

    if let Some(id) = destination {
        if !backup_target.destinations().iter().any(|d| d.id == id) {
            anyhow::bail!("Target '{}' does not use destination '{}'", target, id);
        }
    }

    let listings: Vec<DestinationListing> = backup_target
        .list_artifacts(destination)
        .into_iter()
        .map(|(id, listing)| match listing {
            Ok(mut items) => {
                items.sort_by_key(|item| item.modified);
                DestinationListing {
                    destination: id,
                    artifacts: Some(items),
                    error: None,
                }
            }
            Err(e) => DestinationListing {
                destination: id,
                artifacts: None,
                error: Some(format!("{:#}", e)),
            },
        })
        .collect();

    let failed = listings.iter().any(|l| l.error.is_some());

    if json {
        println!("{}", serde_json::to_string_pretty(&listings)?);
    } else {
        println!("=== Artifacts for target: {} ===\n", target);
        for listing in &listings {
            println!("Destination: {}", listing.destination);
            match (&listing.artifacts, &listing.error) {
                (Some(items), _) if items.is_empty() => println!("  (none)"),
                (Some(items), _) => {
                    for item in items {
                        println!(
                            "  {}  {}",
                            item.modified.format("%Y-%m-%d %H:%M:%S"),
                            item.name
                        );
                    }
                }
                (None, Some(error)) => println!("  ✗ {}", error),
                (None, None) => {}
            }
            println!();
        }
    }

    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

fn handle_validate(config: &Config) -> Result<ExitCode> {
    let resolved = config::resolve_all_targets(config)?;
    let destinations: usize = resolved.values().map(|t| t.destinations.len()).sum();

    println!("Configuration is valid!");
    println!("Targets: {}", resolved.len());
    println!("Destinations: {}", destinations);
    Ok(ExitCode::SUCCESS)
}

fn handle_setup(config: &Config, config_path: &std::path::Path, dry_run: bool) -> Result<ExitCode> {
    println!("=== Setting up autobackup ===\n");

    if dry_run {
        println!("DRY RUN MODE - No changes will be made\n");
    }

    let mut failures = 0;

    println!("[1/2] Creating directories...");
    let mut dirs = vec![
        config::expand_tilde(&config.global.log_directory),
        config::expand_tilde(&config.global.lock_directory),
    ];
    if let Some(temp) = &config.global.temp_directory {
        dirs.push(config::expand_tilde(temp));
    }
    for dir in &dirs {
        if dry_run {
            println!("  [DRY RUN] Would create: {}", dir.display());
        } else if dir.is_dir() {
            println!("  ✓ {} already exists", dir.display());
        } else {
            match std::fs::create_dir_all(dir) {
                Ok(_) => println!("  ✓ Created {}", dir.display()),
                Err(e) => {
                    eprintln!("  ✗ Failed to create {}: {}", dir.display(), e);
                    failures += 1;
                }
            }
        }
    }
    println!();

    println!("[2/2] Installing cron jobs...");
    let config_path = std::path::absolute(config_path)
        .with_context(|| format!("Failed to resolve {}", config_path.display()))?;
    let mut scheduled = 0;
    for (name, target) in &config.targets {
        let Some(schedule) = &target.cron else {
            continue;
        };
        scheduled += 1;

        match cron::install_cron_job(name, schedule, &config_path, dry_run) {
            Ok(()) if !dry_run => println!("  ✓ {} ({})", name, schedule),
            Ok(()) => {}
            Err(e) => {
                eprintln!("  ✗ Failed to install cron job for {}: {:#}", name, e);
                failures += 1;
            }
        }
    }
    if scheduled == 0 {
        println!("  No target has a cron schedule");
    } else if !dry_run {
        match cron::list_cron_jobs() {
            Ok(jobs) => println!("  {} autobackup cron job(s) installed", jobs.len()),
            Err(e) => eprintln!("  ✗ Failed to read back crontab: {:#}", e),
        }
    }
    println!();

    if failures > 0 {
        println!("✗ Setup finished with {} error(s)", failures);
        return Ok(ExitCode::FAILURE);
    }

    println!("✓ Setup complete");
    println!("\nNext steps:");
    println!("  1. Test a backup manually:");
    println!("     autobackup run --target <TARGET_NAME>");
    println!(
        "  2. Check logs in: {}",
        config::expand_tilde(&config.global.log_directory).display()
    );
    Ok(ExitCode::SUCCESS)
}
