//! Command-line arguments.

use clap::{Parser, Subcommand};
use mediamig_config::Overrides;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(short, long, global = true, env = "MEDIAMIG_CONFIG")]
    pub config: Option<PathBuf>,
    /// More logging; repeat for even more.
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,
    /// Default log filter when `RUST_LOG` is unset, e.g. `info` or `mediamig_migrate=debug`.
    #[arg(long, global = true, value_name = "FILTER")]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the subfolders of a remote folder.
    Folders {
        /// Defaults to the root of the store.
        #[arg(default_value = "")]
        path: String,
    },
    /// Show what migrating a folder would involve, without changing anything.
    Estimate { source: String },
    /// Convert and copy a folder's media into its destination folder.
    Migrate {
        source: String,
        /// Destination folder; defaults to the source plus the configured suffix.
        #[arg(short, long)]
        dest: Option<String>,
        /// Items migrated at the same time.
        #[arg(short = 'j', long)]
        concurrency: Option<usize>,
        /// Read everything, write nothing.
        #[arg(long)]
        dry_run: bool,
        /// Seconds to wait after the estimate before writing anything.
        #[arg(long, value_name = "SECONDS")]
        delay: Option<u64>,
    },
    /// Check that every source file has its expected output.
    Audit {
        source: String,
        #[arg(short, long)]
        dest: Option<String>,
    },
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        let mut overrides = Overrides { log_level: self.log_level.clone(), ..Overrides::default() };
        if let Command::Migrate { concurrency, dry_run, delay, .. } = &self.command {
            overrides.concurrency = *concurrency;
            overrides.dry_run = dry_run.then_some(true);
            overrides.start_delay_secs = *delay;
        }
        overrides
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrate_overrides() {
        let cli = Cli::parse_from(["mediamig", "migrate", "/Camera Uploads", "-j", "8", "--dry-run", "--delay", "0"]);
        let overrides = cli.overrides();
        assert_eq!(overrides.concurrency, Some(8));
        assert_eq!(overrides.dry_run, Some(true));
        assert_eq!(overrides.start_delay_secs, Some(0));
    }

    #[test]
    fn test_flags_left_unset() {
        let cli = Cli::parse_from(["mediamig", "-v", "audit", "/Camera Uploads"]);
        assert_eq!(cli.verbose, 1);
        let overrides = cli.overrides();
        assert_eq!(overrides.concurrency, None);
        assert_eq!(overrides.dry_run, None);
        assert_eq!(overrides.log_level, None);
    }

    #[test]
    fn test_log_level_override() {
        let cli = Cli::parse_from(["mediamig", "folders", "--log-level", "debug"]);
        assert_eq!(cli.overrides().log_level.as_deref(), Some("debug"));
    }
}
