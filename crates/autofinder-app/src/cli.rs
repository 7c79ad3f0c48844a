//! CLI argument definitions for the AutoFinder binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use autofinder_core::config::CONFIG_PATH_ENV;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "autofinder.toml";

/// AutoFinder: conversational used-car search over a local catalog.
#[derive(Parser, Debug)]
#[command(name = "autofinder", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Build the catalog index, or reuse it if the catalog is unchanged.
    Index,
    /// Delete the persisted catalog index.
    ResetIndex,
    /// Answer the last user turn of a JSON history file.
    Ask {
        /// JSON array of {"role": "user"|"assistant", "content": "..."}.
        #[arg(long)]
        history: PathBuf,
        /// Print intent, constraints and vehicle IDs alongside the reply.
        #[arg(long)]
        json: bool,
    },
    /// Interactive conversation. `/reset` clears the history, `/quit` exits.
    Chat,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > AUTOFINDER_CONFIG env var > ./autofinder.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        self.resolve_config_path_with(std::env::var(CONFIG_PATH_ENV).ok())
    }

    fn resolve_config_path_with(&self, env_value: Option<String>) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        match env_value {
            Some(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliArgs {
        CliArgs::try_parse_from(args).unwrap()
    }

    #[test]
    fn test_subcommands() {
        assert_eq!(parse(&["autofinder", "index"]).command, Command::Index);
        assert_eq!(parse(&["autofinder", "reset-index"]).command, Command::ResetIndex);
        assert_eq!(parse(&["autofinder", "chat"]).command, Command::Chat);
        assert_eq!(
            parse(&["autofinder", "ask", "--history", "h.json", "--json"]).command,
            Command::Ask {
                history: PathBuf::from("h.json"),
                json: true
            }
        );
    }

    #[test]
    fn test_ask_requires_history() {
        assert!(CliArgs::try_parse_from(["autofinder", "ask"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let args = parse(&["autofinder", "index", "--config", "a.toml", "-l", "debug"]);
        assert_eq!(args.config, Some(PathBuf::from("a.toml")));
        assert_eq!(args.resolve_log_level("info"), "debug");
    }

    #[test]
    fn test_config_path_priority() {
        let flag = parse(&["autofinder", "-c", "flag.toml", "chat"]);
        assert_eq!(
            flag.resolve_config_path_with(Some("env.toml".into())),
            PathBuf::from("flag.toml")
        );

        let bare = parse(&["autofinder", "chat"]);
        assert_eq!(
            bare.resolve_config_path_with(Some("env.toml".into())),
            PathBuf::from("env.toml")
        );
        assert_eq!(
            bare.resolve_config_path_with(None),
            PathBuf::from(DEFAULT_CONFIG_FILE)
        );
        assert_eq!(bare.resolve_log_level("warn"), "warn");
    }
}
