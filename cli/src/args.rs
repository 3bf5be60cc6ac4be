use anyhow::anyhow;
use std::{path::PathBuf, str::FromStr};
use structopt::{clap::AppSettings, StructOpt};
use url::Url;

use crate::{
    commands::{config::ConfigArgs, get::GetArgs, import::ImportArgs},
    printer::OutputFormat,
};

#[derive(Debug, StructOpt)]
#[structopt(
    name = "omr",
    about = "omr is a command line tool for managing OMERO projects and datasets",
    global_settings = &[AppSettings::ColoredHelp, AppSettings::InferSubcommands]
)]
pub struct Args {
    #[structopt(long = "config-file", parse(from_os_str))]
    /// Path to the configuration file. Typically defaults to ~/.config/omero-manager/contexts.json
    pub config: Option<PathBuf>,

    #[structopt(short = "c", long = "context")]
    /// Specify what context to use. Overrides the current context, if any.
    pub context: Option<String>,

    #[structopt(short = "v", long = "verbose")]
    /// Enable more verbose logging
    pub verbose: bool,

    #[structopt(long = "endpoint")]
    /// Specify what OMERO server endpoint to use, overriding contextual settings.
    pub endpoint: Option<Url>,

    #[structopt(short = "u", long = "username")]
    /// Specify what username to use, overriding contextual settings.
    pub username: Option<String>,

    #[structopt(long = "password")]
    /// Specify the password to use. If omitted, it is prompted for interactively.
    pub password: Option<String>,

    #[structopt(short = "k", long = "accept-invalid-certificates", parse(try_from_str))]
    pub accept_invalid_certificates: Option<bool>,

    #[structopt(long = "proxy", parse(try_from_str))]
    /// URL for an HTTP proxy that will be used for all requests if specified
    pub proxy: Option<Url>,

    #[structopt(long = "retries", default_value = "0")]
    /// Number of times to retry failed idempotent requests
    pub retries: u8,

    #[structopt(short = "o", long = "output", default_value = "table")]
    /// Output format. One of: json, table
    pub output: OutputFormat,

    #[structopt(subcommand)]
    pub command: Command,
}

#[derive(Debug, StructOpt)]
pub enum Command {
    #[structopt(name = "completion")]
    /// Output shell completion code for the specified shell (bash or zsh)
    Completion {
        #[structopt(name = "shell")]
        shell: Shell,
    },

    #[structopt(name = "config")]
    /// Manage omr authentication and server contexts
    Config {
        #[structopt(subcommand)]
        config_args: ConfigArgs,
    },

    #[structopt(name = "get")]
    /// Display one or many resources
    Get {
        #[structopt(subcommand)]
        get_args: GetArgs,
    },

    #[structopt(name = "import")]
    /// Reconcile a delimited import file against the server
    Import {
        #[structopt(flatten)]
        import_args: ImportArgs,
    },
}

#[derive(Debug)]
pub enum Shell {
    Bash,
    Zsh,
}

impl FromStr for Shell {
    type Err = anyhow::Error;

    fn from_str(string: &str) -> Result<Self, Self::Err> {
        match string.trim().to_lowercase().as_str() {
            "bash" => Ok(Shell::Bash),
            "zsh" => Ok(Shell::Zsh),
            _ => Err(anyhow!("Unknown shell: `{string}`")),
        }
    }
}
