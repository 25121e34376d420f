//! CLI argument definitions for the `tailwarden` binary.
//!
//! Uses `clap` v4 derive macros. Flags override the configuration file and
//! environment variables. `--mode` replaces any configured sources with a
//! single watcher.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};

use tailwarden_core::config::{SourceConfig, TailwardenConfig, default_channels, default_glob};

/// Watches logs for known failure signatures and forwards incidents.
#[derive(Parser, Debug)]
#[command(name = "tailwarden")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a tailwarden.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run a single watcher of this kind instead of the configured sources.
    #[arg(short, long, value_enum)]
    pub mode: Option<Mode>,

    /// File (file mode) or directory (directory mode) to watch.
    #[arg(long)]
    pub path: Option<String>,

    /// Glob matched against file names in directory mode.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Comma-separated container names (docker mode).
    #[arg(long, value_delimiter = ',')]
    pub containers: Vec<String>,

    /// Comma-separated systemd units (journal mode). Empty follows all units.
    #[arg(long, value_delimiter = ',')]
    pub units: Vec<String>,

    /// Comma-separated event log channels (eventlog mode).
    #[arg(long, value_delimiter = ',')]
    pub channels: Vec<String>,

    /// Primary webhook URL.
    #[arg(long)]
    pub webhook_url: Option<String>,

    /// Fallback intake base URL; incidents go to `{url}/incidents`.
    #[arg(long)]
    pub intake_url: Option<String>,

    /// Poll interval in seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: Option<u64>,

    /// YAML file with custom patterns.
    #[arg(long)]
    pub patterns: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    #[arg(long)]
    pub log_format: Option<String>,
}

/// Source kind selected with `--mode`
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    File,
    Directory,
    #[value(alias = "container")]
    Docker,
    #[value(alias = "systemd")]
    Journal,
    #[value(alias = "windows")]
    Eventlog,
}

impl Cli {
    /// Applies flag overrides to `config`.
    ///
    /// # Errors
    /// Returns a usage error (exit code 2) when `--mode` is missing the flag
    /// its kind requires, or when no source is configured at all.
    pub fn apply_overrides(&self, config: &mut TailwardenConfig) -> Result<(), clap::Error> {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
        if let Some(url) = &self.webhook_url {
            config.delivery.webhook_url = url.clone();
        }
        if let Some(url) = &self.intake_url {
            config.delivery.intake_url = url.clone();
        }
        if let Some(secs) = self.interval {
            config.watch.poll_interval_secs = secs;
        }
        if let Some(path) = &self.patterns {
            config.watch.patterns_file = path.display().to_string();
        }

        if let Some(source) = self.mode_source()? {
            config.watch.sources = vec![source];
        }

        if config.watch.sources.is_empty() {
            return Err(usage_error(
                ErrorKind::MissingRequiredArgument,
                "nothing to watch: pass --mode or configure [[watch.sources]]",
            ));
        }
        Ok(())
    }

    /// The source described by `--mode` and its flags, if any.
    pub fn mode_source(&self) -> Result<Option<SourceConfig>, clap::Error> {
        let Some(mode) = self.mode else {
            return Ok(None);
        };

        let source = match mode {
            Mode::File => SourceConfig::File {
                path: self.required_path("file")?,
            },
            Mode::Directory => SourceConfig::Directory {
                path: self.required_path("directory")?,
                pattern: self.pattern.clone().unwrap_or_else(default_glob),
            },
            Mode::Docker => {
                if self.containers.iter().all(|c| c.trim().is_empty()) {
                    return Err(usage_error(
                        ErrorKind::MissingRequiredArgument,
                        "--containers is required for docker mode",
                    ));
                }
                SourceConfig::Docker {
                    containers: self.containers.clone(),
                }
            }
            Mode::Journal => SourceConfig::Journal {
                units: self.units.clone(),
            },
            Mode::Eventlog => SourceConfig::EventLog {
                channels: if self.channels.is_empty() {
                    default_channels()
                } else {
                    self.channels.clone()
                },
            },
        };
        Ok(Some(source))
    }

    fn required_path(&self, mode: &str) -> Result<String, clap::Error> {
        match &self.path {
            Some(path) if !path.trim().is_empty() => Ok(path.clone()),
            _ => Err(usage_error(
                ErrorKind::MissingRequiredArgument,
                format!("--path is required for {mode} mode"),
            )),
        }
    }
}

fn usage_error(kind: ErrorKind, message: impl std::fmt::Display) -> clap::Error {
    Cli::command().error(kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("tailwarden").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn file_mode_requires_path() {
        let cli = parse(&["--mode", "file"]);
        let err = cli.mode_source().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn directory_mode_defaults_glob() {
        let cli = parse(&["--mode", "directory", "--path", "/var/log/app"]);
        assert_eq!(
            cli.mode_source().unwrap(),
            Some(SourceConfig::Directory {
                path: "/var/log/app".to_owned(),
                pattern: "*.log".to_owned(),
            })
        );
    }

    #[test]
    fn docker_mode_splits_containers() {
        let cli = parse(&["--mode", "docker", "--containers", "api,worker"]);
        assert_eq!(
            cli.mode_source().unwrap(),
            Some(SourceConfig::Docker {
                containers: vec!["api".to_owned(), "worker".to_owned()],
            })
        );
        assert!(parse(&["--mode", "docker"]).mode_source().is_err());
    }

    #[test]
    fn mode_aliases() {
        assert_eq!(parse(&["--mode", "systemd"]).mode, Some(Mode::Journal));
        assert_eq!(parse(&["--mode", "windows"]).mode, Some(Mode::Eventlog));
        assert_eq!(
            parse(&["--mode", "windows"]).mode_source().unwrap(),
            Some(SourceConfig::EventLog {
                channels: vec!["System".to_owned(), "Application".to_owned()],
            })
        );
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = Cli::try_parse_from(["tailwarden", "--mode", "ftp"]).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn zero_interval_is_rejected() {
        assert!(Cli::try_parse_from(["tailwarden", "--interval", "0"]).is_err());
    }

    #[test]
    fn overrides_replace_configured_sources() {
        let mut config = TailwardenConfig::default();
        config.watch.sources = vec![SourceConfig::Journal { units: vec![] }];

        let cli = parse(&[
            "--mode",
            "file",
            "--path",
            "/tmp/app.log",
            "--webhook-url",
            "http://hooks.local/in",
            "--interval",
            "2",
            "--log-format",
            "pretty",
        ]);
        cli.apply_overrides(&mut config).unwrap();

        assert_eq!(
            config.watch.sources,
            vec![SourceConfig::File {
                path: "/tmp/app.log".to_owned()
            }]
        );
        assert_eq!(config.delivery.webhook_url, "http://hooks.local/in");
        assert_eq!(config.watch.poll_interval_secs, 2);
        assert_eq!(config.general.log_format, "pretty");
    }

    #[test]
    fn configured_sources_survive_without_mode() {
        let mut config = TailwardenConfig::default();
        config.watch.sources = vec![SourceConfig::Journal { units: vec![] }];
        parse(&[]).apply_overrides(&mut config).unwrap();
        assert_eq!(config.watch.sources.len(), 1);
    }

    #[test]
    fn nothing_to_watch_is_usage_error() {
        let mut config = TailwardenConfig::default();
        let err = parse(&[]).apply_overrides(&mut config).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
