use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Strata: a plugin runtime with dependency-ordered activation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Runtime configuration file (.json, .yaml, .yml or .toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding one subdirectory per plugin; overrides the configuration
    #[arg(long, short = 'p', global = true)]
    pub plugins_dir: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load the manifests and print the activation plan and any unresolved plugins
    Resolve,
    /// Activate every plugin in plan order, report their states, then stop them again
    Run,
    /// Print the effective configuration
    Config {
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
    Toml,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Toml => "toml",
        }
    }
}
