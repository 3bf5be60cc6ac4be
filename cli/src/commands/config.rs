use colored::Colorize;
use log::{error, info};
use omero_client::DEFAULT_ENDPOINT;
use prettytable::row;
use std::path::Path;
use structopt::StructOpt;
use url::Url;

use crate::{
    config::{self, ContextConfig, OmeroConfig},
    printer::new_table,
    utils,
};
use anyhow::Result;

#[derive(Debug, StructOpt)]
pub enum ConfigArgs {
    #[structopt(name = "add")]
    /// Add a new context to the omr config file
    AddContext {
        #[structopt(long = "name", short = "n")]
        /// The name of the context that will be created or updated
        name: Option<String>,

        #[structopt(long = "endpoint", short = "e")]
        /// The OMERO server endpoint that will be used for this context
        endpoint: Option<Url>,

        #[structopt(long = "username", short = "u")]
        /// The username that will be used for this context
        username: Option<String>,

        #[structopt(long = "accept-invalid-certificates", short = "k")]
        /// Whether to accept invalid TLS certificates
        accept_invalid_certificates: bool,

        #[structopt(long = "proxy")]
        /// URL for an HTTP proxy that will be used for all requests if specified
        proxy: Option<Option<Url>>,
    },

    #[structopt(name = "current")]
    /// Display the current context
    CurrentContext,

    #[structopt(name = "delete")]
    /// Delete the specified context from the omr config file
    DeleteContext {
        /// The name(s) of the context(s) which will be deleted
        names: Vec<String>,
    },

    #[structopt(name = "ls")]
    /// List available contexts in an omr config file
    ListContexts,

    #[structopt(name = "use")]
    /// Set the current context in the omr config file
    UseContext {
        /// The name of the context.
        name: String,
    },
}

pub fn run(
    args: &ConfigArgs,
    mut config: OmeroConfig,
    config_path: impl AsRef<Path>,
) -> Result<OmeroConfig> {
    match args {
        ConfigArgs::ListContexts if config.num_contexts() > 0 => {
            let mut contexts = config.get_all_contexts().clone();
            contexts.sort_unstable_by(|lhs, rhs| lhs.name.cmp(&rhs.name));
            let mut table = new_table();
            table.set_titles(
                row![bFg => "Active", "Context", "Endpoint", "Insecure", "Username", "Proxy"],
            );
            for context in contexts.iter() {
                let active = config
                    .get_current_context()
                    .is_some_and(|current_context| current_context.name == context.name);
                table.add_row(row![
                    if active { "    ->" } else { "" },
                    if active {
                        context.name.bold().bright_white()
                    } else {
                        context.name.normal()
                    },
                    context.endpoint,
                    if context.accept_invalid_certificates {
                        "Yes"
                    } else {
                        "No"
                    },
                    context.username.clone().unwrap_or_default(),
                    context
                        .proxy
                        .clone()
                        .map(|url| url.to_string())
                        .unwrap_or_default()
                ]);
            }
            table.printstd();
        }
        ConfigArgs::ListContexts => {
            info!("No available contexts.");
        }
        ConfigArgs::AddContext {
            name,
            endpoint,
            username,
            accept_invalid_certificates,
            proxy,
        } => {
            add_or_edit_context(
                name,
                username,
                endpoint,
                *accept_invalid_certificates,
                proxy,
                config.clone(),
                config_path,
            )?;
        }
        ConfigArgs::UseContext { name } => {
            if !config.set_current_context(name) {
                error!(
                    "No such context `{}` exists in `{}`.",
                    name,
                    config_path.as_ref().display()
                );
            } else {
                config::write_omero_config(config_path, &config)?;
                info!("Switched to context `{name}`.");
            }
        }
        ConfigArgs::CurrentContext => config.get_current_context().map_or_else(
            || info!("There is no default context in use."),
            |current_context| println!("{}", current_context.name),
        ),
        ConfigArgs::DeleteContext { names } => {
            for name in names {
                if config.delete_context(name) {
                    config::write_omero_config(&config_path, &config)?;
                    info!(
                        "Deleted context `{}` from `{}`.",
                        name,
                        config_path.as_ref().display()
                    );
                } else {
                    error!(
                        "No such context `{}` exists in `{}`.",
                        name,
                        config_path.as_ref().display()
                    );
                }
            }
        }
    }
    Ok(config)
}

fn add_or_edit_context(
    name: &Option<String>,
    username: &Option<String>,
    endpoint: &Option<Url>,
    accept_invalid_certificates: bool,
    proxy: &Option<Option<Url>>,
    mut config: OmeroConfig,
    config_path: impl AsRef<Path>,
) -> Result<()> {
    // Get context name (either argument or from stdin)
    let name = loop {
        let name = match name {
            None => utils::read_from_stdin("Context name", None)?,
            Some(name) => name.clone(),
        };
        if !name.is_empty() {
            break name;
        } else {
            error!("Context name cannot be empty.");
        }
    };

    let existing_context = config.get_context(&name).cloned();
    if existing_context.is_some() {
        info!("Context `{name}` already exists, it will be modified.");
    } else {
        info!("A new context `{name}` will be created.");
    }

    // Get username (either argument or from stdin)
    let username = match username {
        None => {
            let value = utils::read_from_stdin(
                "Username (leave empty to be prompted on every login)",
                existing_context
                    .as_ref()
                    .and_then(|context| context.username.as_deref()),
            )?;
            if value.is_empty() {
                None
            } else {
                Some(value)
            }
        }
        username => username.clone(),
    };
    if username.is_none() {
        info!(concat!(
            "No username was associated with the context. ",
            "You will have to enter it for every session."
        ));
    }

    // Get endpoint (either argument or from stdin)
    let endpoint = match endpoint {
        None => loop {
            match Url::parse(&utils::read_from_stdin(
                "Endpoint",
                Some(
                    existing_context
                        .as_ref()
                        .map(|context| context.endpoint.as_str())
                        .unwrap_or_else(|| DEFAULT_ENDPOINT.as_str()),
                ),
            )?) {
                Ok(url) => break url,
                Err(error) => {
                    error!("Invalid endpoint URL: {error}");
                }
            }
        },
        Some(endpoint) => endpoint.clone(),
    };

    // Update the contexts' JSON configuration file
    let context = ContextConfig {
        name: name.clone(),
        endpoint,
        username,
        accept_invalid_certificates,
        proxy: proxy.clone().unwrap_or_else(|| {
            existing_context
                .as_ref()
                .and_then(|context| context.proxy.clone())
        }),
    };

    let update_existing = existing_context.is_some();
    let is_new_context = !config.set_context(context);
    if is_new_context && config.num_contexts() == 1 {
        info!("Default context set to `{name}`.");
        config.set_current_context(&name);
    }

    config::write_omero_config(config_path, &config)?;

    if update_existing {
        info!("Context `{name}` was updated.");
    } else {
        info!("New context `{name}` was created.");
    }

    Ok(())
}
