//! nbsync command-line tool.
//!
//! Mirrors the notebook folder of a project into a remote workspace (`push`)
//! or back out of it (`pull`), and generates / validates configuration files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use nbsync_core::config::AppConfig;
use nbsync_core::file_policy::FilePolicy;
use nbsync_core::models::{SyncDirection, SyncStats};
use nbsync_core::remote::WorkspaceClient;
use nbsync_core::sync_engine::SyncEngine;

const DEFAULT_CONFIG: &str = "nbsync.toml";

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// nbsync command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "nbsync",
    version,
    about = "Mirror notebook trees between a local checkout and a remote workspace"
)]
struct Cli {
    /// Path to the TOML configuration file [default: ./nbsync.toml].
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Upload the local notebook folder to the workspace.
    Push {
        /// Delete the existing remote folder first.
        #[arg(long)]
        overwrite: bool,
    },

    /// Download the workspace folder into the local notebook folder,
    /// overwriting notebooks in place. Other local files are kept.
    Pull,

    /// Generate a default configuration file.
    Init {
        /// Output path for the generated config file.
        #[arg(short, long, default_value = DEFAULT_CONFIG)]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("Error: {:#}", e)));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let explicit = cli.config.is_some();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    match cli.command {
        Commands::Push { overwrite } => {
            cmd_sync(&config_path, explicit, cli.verbose, SyncDirection::Upload, overwrite).await
        }
        Commands::Pull => {
            cmd_sync(&config_path, explicit, cli.verbose, SyncDirection::Download, false).await
        }
        Commands::Init { output } => {
            init_logging(cli.verbose, None);
            cmd_init(&output)
        }
        Commands::Validate => {
            init_logging(cli.verbose, None);
            cmd_validate(&config_path, explicit)
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then the configured level.
fn init_logging(verbose: bool, configured: Option<&str>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            configured.unwrap_or("warn")
        };
        EnvFilter::new(level)
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

async fn cmd_sync(
    config_path: &Path,
    explicit: bool,
    verbose: bool,
    direction: SyncDirection,
    overwrite: bool,
) -> Result<()> {
    let config =
        AppConfig::load_and_resolve(config_path, explicit).context("failed to load configuration")?;
    init_logging(verbose, Some(&config.logging.level));

    let branch = config
        .resolve_branch()
        .context("failed to determine the branch for the remote path")?;
    let root = config
        .sync_root(&branch)
        .context("failed to build the remote path")?;
    tracing::debug!(branch = %branch, remote = %root.remote_base(), "resolved sync root");

    let host = config
        .workspace
        .host
        .clone()
        .context("workspace host is not set")?;
    let token = config
        .workspace
        .token
        .clone()
        .context("workspace token is not set")?;
    let client =
        WorkspaceClient::new(host, token).context("failed to create workspace client")?;

    let label = match direction {
        SyncDirection::Upload => style::push_label(),
        SyncDirection::Download => style::pull_label(),
    };
    println!("{}", style::header(&format!("nbsync {}", label)));
    println!(
        "  {} {}",
        style::dim("Local  :"),
        root.local_base().display()
    );
    println!("  {} {}", style::dim("Remote :"), root.remote_base());
    println!("  {} {}", style::dim("Branch :"), branch);
    println!();

    let engine = SyncEngine::new(client, root, FilePolicy::from(&config.options));
    let stats = match direction {
        SyncDirection::Upload => engine.upload(overwrite).await,
        SyncDirection::Download => engine.download().await,
    }
    .with_context(|| format!("{} failed", direction))?;

    print_summary(&stats);
    Ok(())
}

fn print_summary(stats: &SyncStats) {
    if stats.cleared_destination {
        println!("{}", style::warn("Existing remote folder was deleted first"));
    }
    for skipped in &stats.skipped {
        println!(
            "  {} {} ({})",
            style::dim("skipped"),
            skipped.relative_path,
            skipped.reason.label()
        );
    }
    let elapsed = stats
        .completed_at
        .map(|done| (done - stats.started_at).num_milliseconds())
        .unwrap_or(0);
    println!(
        "{}",
        style::success(&format!(
            "{} complete: {} folders, {} notebooks, {} bytes, {} skipped in {} ms",
            stats.direction,
            stats.containers_created,
            stats.leaves_written,
            stats.bytes_transferred,
            stats.skipped.len(),
            elapsed
        ))
    );
}

fn cmd_init(output: &Path) -> Result<()> {
    let default_config = r#"# nbsync configuration
# Secrets are never stored here; only the names of the environment variables
# holding them.

[workspace]
# host = "https://adb-1234567890123456.7.azuredatabricks.net"
host_env = "DATABRICKS_HOST"
token_env = "DATABRICKS_TOKEN"

[project]
project_folder = "."
notebook_folder = "notebooks"

[remote]
# user = "alice"          # default: $USER
# branch = "main"         # default: $BUILD_SOURCEBRANCHNAME, then the git HEAD
path_template = "/Users/{user}/{branch}/{notebook_folder}"

[options]
ignore_patterns = ["**/.ipynb_checkpoints/**"]
max_file_size = 0

[logging]
level = "warn"
"#;

    if output.exists() {
        anyhow::bail!(
            "file already exists: {}. Use a different path or remove the existing file.",
            output.display()
        );
    }

    std::fs::write(output, default_config).context("failed to write config file")?;

    println!(
        "{}",
        style::success(&format!("Default configuration written to {}", output.display()))
    );
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file with your workspace and project details");
    println!("  2. Set the referenced environment variables (DATABRICKS_HOST, DATABRICKS_TOKEN)");
    println!(
        "  3. Validate with: nbsync validate --config {}",
        output.display()
    );
    println!("  4. Upload with: nbsync push --config {}", output.display());

    Ok(())
}

fn cmd_validate(config_path: &Path, explicit: bool) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let mut config =
        AppConfig::discover(config_path, explicit).context("failed to parse configuration")?;
    println!("  [OK] TOML structure is valid");

    // Missing variables only warn here; validate() decides.
    config
        .resolve_env_vars()
        .context("failed to resolve environment variables")?;
    println!("  [OK] Environment variable references processed");

    match config.validate() {
        Ok(()) => {
            println!("  [OK] All required fields are valid");
        }
        Err(e) => {
            println!("  [FAIL] Validation error: {}", e);
            anyhow::bail!("configuration validation failed");
        }
    }

    let branch = match config.resolve_branch() {
        Ok(branch) => Some(branch),
        Err(e) => {
            println!("  {}", style::warn(&format!("Branch not resolved: {}", e)));
            None
        }
    };

    println!();
    println!("Configuration summary:");
    println!(
        "  Host          : {}",
        config.workspace.host.as_deref().unwrap_or("NOT SET")
    );
    println!(
        "  Token         : {}",
        if config.workspace.token.is_some() {
            "set"
        } else {
            "NOT SET"
        }
    );
    println!("  Local folder  : {}", config.local_base().display());
    if let Some(branch) = branch {
        println!(
            "  Remote folder : {}",
            config
                .remote_base(&branch)
                .context("failed to render remote path")?
        );
    }
    println!(
        "  Ignore        : {}",
        if config.options.ignore_patterns.is_empty() {
            "none".to_string()
        } else {
            config.options.ignore_patterns.join(", ")
        }
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_push_overwrite_flag() {
        let cli = Cli::parse_from(["nbsync", "push", "--overwrite"]);
        assert!(matches!(cli.command, Commands::Push { overwrite: true }));
        assert!(cli.config.is_none());

        let cli = Cli::parse_from(["nbsync", "--config", "ci.toml", "pull"]);
        assert!(matches!(cli.command, Commands::Pull));
        assert_eq!(cli.config, Some(PathBuf::from("ci.toml")));

        assert!(Cli::try_parse_from(["nbsync", "pull", "--overwrite"]).is_err());
    }

    #[test]
    fn test_init_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nbsync.toml");
        cmd_init(&path).unwrap();
        let written = AppConfig::load_from_file(&path).unwrap();
        assert_eq!(written.project.notebook_folder, "notebooks");
        assert!(cmd_init(&path).is_err());
    }
}
