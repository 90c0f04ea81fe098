//! The `scanfix config` command for configuration management.

use anyhow::Context;
use clap::{Args, Subcommand};
use scanfix_core::pipeline::TransformParameters;
use scanfix_core::{Config, ConfigStore, FileConfigStore};
use std::path::{Path, PathBuf};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Subcommands for configuration management.
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Display current configuration
    Show,

    /// Show config file path
    Path,

    /// Initialize a new config file with defaults
    Init {
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },

    /// Set the color profile applied to scans
    SetProfile {
        /// Profile file (e.g. an .icc profile for your scanner)
        path: PathBuf,
    },

    /// Set the directory watched for new scans
    SetWatchDir {
        /// Existing directory
        dir: PathBuf,
    },

    /// Set the output subdirectory name
    SetOutputDir {
        /// Single directory name, e.g. "fixed"
        name: String,
    },

    /// Check that the configuration is ready for `scanfix watch`
    Check,
}

/// Execute the config command.
pub async fn execute(args: ConfigArgs, config_path: &Path) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let store = FileConfigStore::open(config_path)?;
            let toml = store.config().to_toml()?;
            println!("{}", toml);
        }

        ConfigCommand::Path => {
            println!("{}", config_path.display());
        }

        ConfigCommand::Init { force } => {
            init(config_path, force)?;
            tracing::info!("Config file created at: {}", config_path.display());
            println!("Configuration initialized at: {}", config_path.display());
        }

        ConfigCommand::SetProfile { path } => {
            let store = FileConfigStore::open(config_path)?;
            let path = absolute(&path)?;
            let params = TransformParameters::load(&path)?;
            store.set_profile_path(&path)?;
            println!("Color profile set to {}", params.describe());
        }

        ConfigCommand::SetWatchDir { dir } => {
            let store = FileConfigStore::open(config_path)?;
            let dir = absolute(&dir)?;
            if !dir.is_dir() {
                anyhow::bail!("Not a directory: {}", dir.display());
            }
            store.set_watch_dir(&dir)?;
            println!("Watch directory set to {}", dir.display());
        }

        ConfigCommand::SetOutputDir { name } => {
            let store = FileConfigStore::open(config_path)?;
            store.set_output_dir(&name)?;
            println!("Output directory set to {}", name);
        }

        ConfigCommand::Check => {
            let store = FileConfigStore::open(config_path)?;
            let issues = store.config().readiness_issues();
            if !issues.is_empty() {
                for issue in &issues {
                    eprintln!("  ✗ {}", issue);
                }
                anyhow::bail!("Configuration has {} issue(s)", issues.len());
            }
            println!("Configuration is ready");
        }
    }

    Ok(())
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!(
            "Config file already exists at: {}\nUse --force to overwrite.",
            path.display()
        );
    }

    // Ensure parent directory exists
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let toml = Config::default().to_toml()?;
    std::fs::write(path, toml)?;
    Ok(())
}

/// Resolve a user-supplied path against the current directory.
fn absolute(path: &Path) -> anyhow::Result<PathBuf> {
    let path = scanfix_core::config::expand_tilde(path);
    std::fs::canonicalize(&path).with_context(|| format!("Cannot resolve {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(command: ConfigCommand, config_path: &Path) -> anyhow::Result<()> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap();
        rt.block_on(execute(ConfigArgs { command }, config_path))
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(ConfigCommand::Init { force: false }, &path).unwrap();
        assert!(path.exists());
        assert!(run(ConfigCommand::Init { force: false }, &path).is_err());
        run(ConfigCommand::Init { force: true }, &path).unwrap();
    }

    #[test]
    fn setters_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let scans = dir.path().join("scans");
        std::fs::create_dir(&scans).unwrap();
        let profile = dir.path().join("scanner.icc");
        std::fs::write(&profile, b"profile").unwrap();

        run(ConfigCommand::SetWatchDir { dir: scans.clone() }, &path).unwrap();
        run(ConfigCommand::SetProfile { path: profile.clone() }, &path).unwrap();
        run(
            ConfigCommand::SetOutputDir {
                name: "corrected".to_string(),
            },
            &path,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.watch_dir(), Some(std::fs::canonicalize(&scans).unwrap()));
        assert_eq!(config.profile_path(), Some(std::fs::canonicalize(&profile).unwrap()));
        assert_eq!(config.watch.output_dir, "corrected");

        run(ConfigCommand::Check, &path).unwrap();
    }

    #[test]
    fn set_profile_rejects_unreadable_profile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let empty = dir.path().join("empty.icc");
        std::fs::write(&empty, b"").unwrap();

        assert!(run(ConfigCommand::SetProfile { path: empty }, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn set_watch_dir_rejects_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let file = dir.path().join("scan.jpg");
        std::fs::write(&file, b"x").unwrap();

        assert!(run(ConfigCommand::SetWatchDir { dir: file }, &path).is_err());
    }

    #[test]
    fn check_reports_missing_settings() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(ConfigCommand::Check, &dir.path().join("config.toml")).unwrap_err();
        assert!(err.to_string().contains("2 issue(s)"));
    }
}
