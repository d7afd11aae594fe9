//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use partstream_transfer::TransferTarget;

use crate::config::DEFAULT_CONFIG_FILE;

/// Copy an HTTP artifact into the object store in resumable chunks.
///
/// With no subcommand, `partstream <url> <container> <key>` transfers.
#[derive(Debug, Parser)]
#[command(
    name = "partstream",
    version,
    about,
    args_conflicts_with_subcommands = true,
    subcommand_negates_reqs = true
)]
pub struct Cli {
    /// Configuration file
    #[arg(
        long,
        global = true,
        env = "PARTSTREAM_CONFIG",
        default_value = DEFAULT_CONFIG_FILE
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Maintenance>,

    /// Source URL; the server must accept byte ranges
    #[arg(required = true)]
    pub url: Option<String>,

    /// Destination container
    #[arg(required = true)]
    pub container: Option<String>,

    /// Destination object key
    #[arg(required = true)]
    pub key: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Maintenance {
    /// Show incomplete uploads for an object, best resume candidate first
    List(TargetArgs),
    /// Abort every incomplete upload for an object
    Prune(TargetArgs),
}

#[derive(Debug, Args)]
pub struct TargetArgs {
    pub container: String,
    pub key: String,
}

impl TargetArgs {
    fn target(&self) -> anyhow::Result<TransferTarget> {
        Ok(TransferTarget::new(&self.container, &self.key)?)
    }
}

/// What the user asked for, with the destination validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Transfer { url: String, target: TransferTarget },
    List { target: TransferTarget },
    Prune { target: TransferTarget },
}

impl Cli {
    pub fn command(&self) -> anyhow::Result<Command> {
        match &self.command {
            Some(Maintenance::List(args)) => Ok(Command::List {
                target: args.target()?,
            }),
            Some(Maintenance::Prune(args)) => Ok(Command::Prune {
                target: args.target()?,
            }),
            None => {
                let (Some(url), Some(container), Some(key)) =
                    (&self.url, &self.container, &self.key)
                else {
                    anyhow::bail!("a transfer needs <URL> <CONTAINER> <KEY>");
                };
                Ok(Command::Transfer {
                    url: url.clone(),
                    target: TransferTarget::new(container, key)?,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("partstream").chain(args.iter().copied()))
    }

    #[test]
    fn parses_transfer() {
        let cli = parse(&["https://mirror.test/a.iso", "media", "isos/a.iso"]).unwrap();
        assert_eq!(
            cli.command().unwrap(),
            Command::Transfer {
                url: "https://mirror.test/a.iso".into(),
                target: TransferTarget::new("media", "isos/a.iso").unwrap(),
            }
        );
    }

    #[test]
    fn parses_maintenance_commands() {
        let cli = parse(&["list", "media", "a.iso"]).unwrap();
        assert!(matches!(cli.command().unwrap(), Command::List { .. }));
        let cli = parse(&["prune", "media", "a.iso"]).unwrap();
        assert!(matches!(cli.command().unwrap(), Command::Prune { .. }));
    }

    #[test]
    fn config_flag_works_with_every_form() {
        let cli = parse(&["--config", "/etc/ps.toml", "https://m.test/a", "media", "a"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/ps.toml"));
        assert!(matches!(cli.command().unwrap(), Command::Transfer { .. }));

        let cli = parse(&["prune", "media", "a", "--config", "/etc/ps.toml"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("/etc/ps.toml"));
        assert!(matches!(cli.command().unwrap(), Command::Prune { .. }));
    }

    #[test]
    fn rejects_bad_arguments() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["https://mirror.test/a.iso", "media"]).is_err());
        assert!(parse(&["list", "media"]).is_err());
        assert!(parse(&["--bogus", "https://mirror.test/a.iso", "media", "a"]).is_err());

        let cli = parse(&["https://mirror.test/a.iso", " ", "a.iso"]).unwrap();
        assert!(cli.command().is_err());
    }

    #[test]
    fn version_flag_is_handled_by_clap() {
        let err = parse(&["--version"]).unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::DisplayVersion);
    }
}
