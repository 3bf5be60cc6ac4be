#![deny(clippy::all)]
mod args;
mod commands;
mod config;
mod printer;
mod reconcile;
mod rows;
mod summary;
mod utils;

use anyhow::{anyhow, Context, Result};
use log::{error, warn};
use omero_client::{
    retry::{RetryConfig, RetryStrategy},
    Client, Config as ClientConfig, Credentials, KeepAlive,
};
use std::{fs, io, path::PathBuf, process, sync::Arc, time::Duration};
use structopt::{clap::Shell as ClapShell, StructOpt};

use crate::{
    args::{Args, Command, Shell},
    commands::{config as config_command, get, import},
    config::OmeroConfig,
    printer::Printer,
    utils::{init_env_logger, read_from_stdin, read_password},
};

fn run(args: Args) -> Result<()> {
    let config_path = find_configuration(&args)?;
    let cli_config = config::read_omero_config(&config_path)?;
    let printer = Printer::new(args.output);

    match &args.command {
        Command::Config { config_args } => {
            config_command::run(config_args, cli_config, config_path).map(|_| ())
        }
        Command::Completion { shell } => {
            let mut app = Args::clap();
            let clap_shell = match shell {
                Shell::Zsh => ClapShell::Zsh,
                Shell::Bash => ClapShell::Bash,
            };
            app.gen_completions_to("omr", clap_shell, &mut io::stdout());
            Ok(())
        }
        Command::Get { get_args } => with_session(&args, &cli_config, |client| {
            get::run(get_args, client, &printer)
        }),
        Command::Import { import_args } => {
            with_session(&args, &cli_config, |client| import::run(import_args, client))
        }
    }
}

/// Run `command` inside an authenticated session. The session is kept alive
/// for the duration of the command and closed afterwards, whether the command
/// succeeded or not.
fn with_session(
    args: &Args,
    cli_config: &OmeroConfig,
    command: impl FnOnce(&Client) -> Result<()>,
) -> Result<()> {
    let client = Arc::new(client_from_args(args, cli_config)?);
    let credentials = credentials_from_args(args, cli_config)?;
    client
        .login(&credentials)
        .context("Failed to establish an OMERO session.")?;

    let mut keep_alive = KeepAlive::start(Arc::clone(&client), KeepAlive::DEFAULT_INTERVAL);
    let result = command(&client);
    keep_alive.done();

    if let Err(logout_error) = client.logout() {
        warn!("Failed to close the OMERO session: {logout_error}");
    }
    result
}

fn client_from_args(args: &Args, config: &OmeroConfig) -> Result<Client> {
    let current_context = if let Some(context_name) = args.context.as_ref() {
        let context = config.get_context(context_name);
        if context.is_none() {
            return Err(anyhow!("Unknown context `{context_name}`."));
        };
        context
    } else {
        config.get_current_context()
    };

    let endpoint = args
        .endpoint
        .clone()
        .or_else(|| current_context.map(|context| context.endpoint.clone()))
        .unwrap_or_else(|| omero_client::DEFAULT_ENDPOINT.clone());

    let accept_invalid_certificates = args
        .accept_invalid_certificates
        .or_else(|| current_context.map(|context| context.accept_invalid_certificates))
        .unwrap_or(false);

    if accept_invalid_certificates {
        warn!(concat!(
            "TLS certificate verification is disabled. ",
            "Do NOT use this over an insecure network."
        ));
    }

    let proxy = args
        .proxy
        .clone()
        .or_else(|| current_context.and_then(|context| context.proxy.clone()));

    let retry_config = if args.retries > 0 {
        Some(RetryConfig {
            strategy: RetryStrategy::Automatic,
            max_retry_count: args.retries,
            base_wait: Duration::from_secs(1),
            backoff_factor: 2.0,
        })
    } else {
        None
    };

    Client::new(ClientConfig {
        endpoint,
        accept_invalid_certificates,
        proxy,
        retry_config,
    })
    .context("Failed to initialise the HTTP client.")
}

fn credentials_from_args(args: &Args, config: &OmeroConfig) -> Result<Credentials> {
    let current_context = if let Some(context_name) = args.context.as_ref() {
        config.get_context(context_name)
    } else {
        config.get_current_context()
    };

    let username = match args
        .username
        .clone()
        .or_else(|| current_context.and_then(|context| context.username.clone()))
    {
        Some(username) => username,
        None => read_from_stdin("Username", None)?,
    };

    let password = match args.password.clone() {
        Some(password) => password,
        None => read_password(&format!("Password for {username}"))?,
    };

    Ok(Credentials { username, password })
}

fn find_configuration(args: &Args) -> Result<PathBuf> {
    let config_path = if let Some(config_path) = args.config.clone() {
        if !config_path.exists() {
            warn!(
                "Configuration file `{}` doesn't exist.",
                config_path.display()
            );
        }
        config_path
    } else {
        let mut config_path =
            dirs::config_dir().context("Could not get path to the user's config directory")?;
        config_path.push("omero-manager");
        fs::create_dir_all(&config_path).with_context(|| {
            format!(
                "Could not create config directory {}",
                config_path.display()
            )
        })?;
        config_path.push("contexts.json");
        config_path
    };
    Ok(config_path)
}

fn main() {
    let args = Args::from_args();
    init_env_logger(args.verbose);

    if let Err(error) = run(args) {
        error!("An error occurred:");
        for cause in error.chain() {
            error!(" |- {cause}");
        }

        #[cfg(feature = "backtrace")]
        {
            error!("{}", error.backtrace());
        }

        process::exit(1);
    }
}
