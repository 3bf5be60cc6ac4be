use anyhow::{Context, Result};
use omero_client::Client;
use structopt::StructOpt;

use crate::{printer::Printer, reconcile};

#[derive(Debug, StructOpt)]
pub enum GetArgs {
    #[structopt(name = "groups")]
    /// List the groups visible to the current session
    Groups,

    #[structopt(name = "projects")]
    /// List projects in a group
    Projects {
        #[structopt(long = "group", short = "g")]
        /// The group (id or name) to list projects for
        group: String,

        #[structopt(name = "name")]
        /// An exact project name used to filter the results
        name: Option<String>,
    },

    #[structopt(name = "datasets")]
    /// List datasets in a group
    Datasets {
        #[structopt(long = "group", short = "g")]
        /// The group (id or name) to list datasets for
        group: String,

        #[structopt(name = "name")]
        /// An exact dataset name used to filter the results
        name: Option<String>,
    },
}

pub fn run(get_args: &GetArgs, client: &Client, printer: &Printer) -> Result<()> {
    match get_args {
        GetArgs::Groups => {
            let groups = client.get_groups().context("Operation to list groups has failed.")?;
            printer.print_resources(&groups)?;
        }
        GetArgs::Projects { group, name } => {
            let group = reconcile::resolve_group(client, group)?;
            let projects = client
                .get_projects(group, name.as_deref())
                .context("Operation to list projects has failed.")?;
            printer.print_resources(&projects)?;
        }
        GetArgs::Datasets { group, name } => {
            let group = reconcile::resolve_group(client, group)?;
            let datasets = client
                .get_datasets(group, name.as_deref())
                .context("Operation to list datasets has failed.")?;
            printer.print_resources(&datasets)?;
        }
    }
    Ok(())
}
