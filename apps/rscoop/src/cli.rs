//! Command line interface definition

use clap::{Parser, Subcommand};
use rscoop_types::{OperationType, StartRequest};
use std::path::PathBuf;

/// rscoop - run Scoop operations side by side
#[derive(Parser)]
#[command(name = "rscoop")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run Scoop package operations concurrently")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Package manager executable to run
    #[arg(long, global = true, value_name = "PROGRAM")]
    pub scoop: Option<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Install packages
    #[command(alias = "i")]
    Install {
        /// Package names
        #[arg(required = true)]
        packages: Vec<String>,

        /// Bucket to install from
        #[arg(short, long)]
        bucket: Option<String>,
    },

    /// Uninstall packages
    #[command(alias = "rm")]
    Uninstall {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Update packages
    #[command(alias = "up")]
    Update {
        #[arg(required = true)]
        packages: Vec<String>,

        /// Reinstall even if already up to date
        #[arg(short, long)]
        force: bool,
    },

    /// Remove cached downloads of packages
    ClearCache {
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Update every installed package
    UpdateAll,

    /// Remove old versions of every package
    Cleanup {
        /// Also remove outdated download caches
        #[arg(long)]
        cache: bool,
    },

    /// Refresh all buckets
    UpdateBuckets,

    /// Manage the "multiple operations running" warning
    #[command(subcommand)]
    Warning(WarningCommands),

    /// Scheduled bucket refresh (`[auto_update]` in the config)
    #[command(subcommand)]
    AutoUpdate(AutoUpdateCommands),
}

#[derive(Subcommand)]
pub enum WarningCommands {
    /// Show the current settings
    Show,
    /// Stop showing the warning
    Dismiss,
    /// Show the warning again
    Enable,
    /// Turn the warning off
    Disable,
    /// Set how many active operations trigger the warning
    Threshold {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },
}

#[derive(Subcommand)]
pub enum AutoUpdateCommands {
    /// Refresh buckets now, then update packages if configured
    Run {
        /// Update every package after the refresh, whatever the config says
        #[arg(long)]
        update_all: bool,
    },
    /// Stay running and refresh on the configured interval until Ctrl-C
    Watch,
    /// Show the schedule and when it last ran
    Status,
}

impl Commands {
    /// Start requests for an operation command; `None` for `warning` and
    /// `auto-update`
    pub fn start_requests(&self) -> Option<Vec<StartRequest>> {
        let per_package = |ty: OperationType, packages: &[String]| {
            packages
                .iter()
                .map(|name| StartRequest::for_package(ty, name))
                .collect::<Vec<_>>()
        };

        let requests = match self {
            Commands::Install { packages, bucket } => per_package(OperationType::Install, packages)
                .into_iter()
                .map(|req| match bucket {
                    Some(bucket) => req.with_bucket(bucket),
                    None => req,
                })
                .collect(),
            Commands::Uninstall { packages } => per_package(OperationType::Uninstall, packages),
            Commands::Update { packages, force } => per_package(OperationType::Update, packages)
                .into_iter()
                .map(|req| req.with_force(*force))
                .collect(),
            Commands::ClearCache { packages } => per_package(OperationType::ClearCache, packages),
            Commands::UpdateAll => vec![StartRequest::new(OperationType::UpdateAll)],
            Commands::Cleanup { cache: false } => vec![StartRequest::new(OperationType::Cleanup)],
            Commands::Cleanup { cache: true } => {
                vec![StartRequest::new(OperationType::CleanupCache)]
            }
            Commands::UpdateBuckets => vec![StartRequest::new(OperationType::UpdateBuckets)],
            Commands::Warning(_) | Commands::AutoUpdate(_) => return None,
        };
        Some(requests)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rscoop").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_install_fans_out_per_package() {
        let cli = parse(&["install", "git", "7zip", "--bucket", "main"]);
        let requests = cli.command.start_requests().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].package_name.as_deref(), Some("7zip"));
        assert_eq!(requests[1].bucket.as_deref(), Some("main"));
    }

    #[test]
    fn test_force_update_and_cache_cleanup() {
        let cli = parse(&["update", "git", "--force"]);
        let requests = cli.command.start_requests().unwrap();
        assert_eq!(requests[0].effective_type(), OperationType::ForceUpdate);

        let cli = parse(&["cleanup", "--cache"]);
        let requests = cli.command.start_requests().unwrap();
        assert_eq!(requests[0].operation_type, OperationType::CleanupCache);
    }

    #[test]
    fn test_warning_threshold_must_be_positive() {
        assert!(Cli::try_parse_from(["rscoop", "warning", "threshold", "0"]).is_err());
        let cli = parse(&["warning", "threshold", "3"]);
        assert!(cli.command.start_requests().is_none());
    }

    #[test]
    fn test_auto_update_subcommands() {
        let cli = parse(&["auto-update", "run", "--update-all"]);
        assert!(cli.command.start_requests().is_none());
        assert!(matches!(
            cli.command,
            Commands::AutoUpdate(AutoUpdateCommands::Run { update_all: true })
        ));
        assert!(matches!(
            parse(&["auto-update", "status"]).command,
            Commands::AutoUpdate(AutoUpdateCommands::Status)
        ));
    }

    #[test]
    fn test_install_requires_package() {
        assert!(Cli::try_parse_from(["rscoop", "install"]).is_err());
    }
}
