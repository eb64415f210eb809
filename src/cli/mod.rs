//! CLI module for CyberSense
//!
//! Provides command-line interface parsing for the cybersense-server binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// CyberSense - agentic cyber threat intelligence orchestrator
#[derive(Parser, Debug)]
#[command(
    name = "cybersense-server",
    version,
    about = "CyberSense - agentic cyber threat intelligence orchestrator",
    long_about = "Routes security questions through documentation, web and Telegram agents\n\
                  and merges their findings into one ranked threat report.\n\n\
                  Run without arguments to start the server, or use 'init' to scaffold a configuration.",
    after_help = "EXAMPLES:\n    \
                  cybersense-server init                          # Write cybersense.toml\n    \
                  cybersense-server                               # Start the server\n    \
                  cybersense-server ask \"latest ransomware news\"  # One-shot query\n    \
                  cybersense-server --config my.toml agents       # List configured agents"
)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, default_value = "cybersense.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Run a single query and print the report
    Ask {
        /// The question to investigate
        query: String,

        /// Conversation id to attach to the query
        #[arg(long)]
        conversation_id: Option<String>,

        /// Print the full outcome as JSON instead of the report
        #[arg(long)]
        json: bool,
    },

    /// List the registered agents and their triggers
    Agents,

    /// Show configuration information
    Config {
        /// Show the full configuration
        #[arg(short = 'f', long)]
        full: bool,

        /// Validate the configuration file
        #[arg(long)]
        validate: bool,
    },

    /// Write a default configuration and starter knowledge base
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite existing files
        #[arg(short, long)]
        force: bool,

        /// Host address for the server
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for the server
        #[arg(long, default_value = "8000")]
        port: u16,
    },
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
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
    fn test_defaults_to_serve() {
        let cli = Cli::try_parse_from(["cybersense-server"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.config, PathBuf::from("cybersense.toml"));
    }

    #[test]
    fn test_parse_ask() {
        let cli = Cli::try_parse_from([
            "cybersense-server",
            "--no-color",
            "ask",
            "ransomware news",
            "--json",
        ])
        .unwrap();

        assert!(cli.no_color);
        match cli.command {
            Some(Commands::Ask { query, json, conversation_id }) => {
                assert_eq!(query, "ransomware news");
                assert!(json);
                assert!(conversation_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_init_with_global_config() {
        let cli = Cli::try_parse_from([
            "cybersense-server",
            "init",
            "/tmp/cs",
            "--force",
            "--config",
            "other.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("other.toml"));
        match cli.command {
            Some(Commands::Init { path, force, port, .. }) => {
                assert_eq!(path, PathBuf::from("/tmp/cs"));
                assert!(force);
                assert_eq!(port, 8000);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
