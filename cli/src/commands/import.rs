use anyhow::{Context, Result};
use dialoguer::Input;
use log::{info, warn};
use omero_client::{Client, GroupId};
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};
use structopt::StructOpt;

use crate::{
    reconcile::{self, LinkCheck, OnDuplicate, ProjectSpec},
    rows::{ImportRow, RowReader, SUPPORTED_EXTENSIONS},
    summary::Summary,
};

#[derive(Debug, StructOpt)]
pub struct ImportArgs {
    #[structopt(name = "file", parse(from_os_str))]
    /// Path to the delimited import file. Prompted for interactively if omitted.
    pub file: Option<PathBuf>,

    #[structopt(long = "on-duplicate", default_value = "first-match")]
    /// How to treat multiple objects matching a name. One of: error, first-match, most-recent
    pub on_duplicate: OnDuplicate,
}

pub fn run(import_args: &ImportArgs, client: &Client) -> Result<()> {
    let path = match &import_args.file {
        Some(path) => path.clone(),
        None => prompt_for_file()?,
    };
    let rows = RowReader::open(&path)?;
    let summary = import_rows(client, rows, import_args.on_duplicate)?;
    if summary.is_empty() {
        info!("Nothing to import.");
    } else {
        println!("{summary}");
    }
    Ok(())
}

/// Walk the rows in file order, reconciling each against the server. Group
/// tokens are resolved at most once per run.
fn import_rows(
    client: &Client,
    rows: impl IntoIterator<Item = Result<ImportRow>>,
    on_duplicate: OnDuplicate,
) -> Result<String> {
    let mut group_ids: HashMap<String, GroupId> = HashMap::new();
    let mut current_group: Option<GroupId> = None;
    let mut summary = Summary::new();

    for row in rows {
        let row = row?;
        let group = match group_ids.get(&row.groups) {
            Some(&group) => group,
            None => {
                let group = reconcile::resolve_group(client, &row.groups)
                    .with_context(|| format!("Failed to process the row at line {}", row.line))?;
                group_ids.insert(row.groups.clone(), group);
                group
            }
        };
        if current_group != Some(group) {
            summary.group_changed(group);
            current_group = Some(group);
        }

        let spec: ProjectSpec = row
            .project
            .parse()
            .with_context(|| format!("Failed to process the row at line {}", row.line))?;
        let project = reconcile::get_or_create_project(client, group, &spec, on_duplicate)
            .with_context(|| format!("Failed to process the row at line {}", row.line))?;
        summary.project(&project);

        for name in &row.datasets {
            let dataset =
                reconcile::get_or_create_dataset(client, group, &project, name, on_duplicate)
                    .with_context(|| {
                        format!("Failed to process the row at line {}", row.line)
                    })?;
            match reconcile::check_link(client, group, project.id, dataset.id) {
                LinkCheck::AlreadyLinked => {}
                LinkCheck::NotLinked => {
                    reconcile::create_link(client, group, project.id, dataset.id)?;
                }
                LinkCheck::CheckFailed(error) => {
                    warn!(
                        "Could not verify whether dataset {} is linked to project {}: {error}. \
                         Attempting to link anyway.",
                        dataset.id, project.id
                    );
                    reconcile::create_link(client, group, project.id, dataset.id)?;
                }
            }
            summary.dataset(&dataset);
        }
        summary.row_done();
    }

    Ok(summary.build())
}

fn prompt_for_file() -> Result<PathBuf> {
    let input: String = Input::new()
        .with_prompt("Import file")
        .validate_with(|value: &String| -> Result<(), String> {
            let path = Path::new(value);
            if !path.is_file() {
                return Err(format!("`{value}` is not a file"));
            }
            let supported = path
                .extension()
                .and_then(|extension| extension.to_str())
                .is_some_and(|extension| {
                    SUPPORTED_EXTENSIONS.contains(&extension.to_lowercase().as_str())
                });
            if supported {
                Ok(())
            } else {
                Err(format!(
                    "Expected a file with one of these extensions: {}",
                    SUPPORTED_EXTENSIONS.join(", ")
                ))
            }
        })
        .interact_text()
        .context("Failed to read the import file path")?;
    Ok(PathBuf::from(input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use omero_client::Config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    const PROJECT_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#Project";
    const DATASET_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#Dataset";
    const LINK_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#ProjectDatasetLink";

    fn test_client(server: &mockito::ServerGuard) -> Client {
        Client::new(Config {
            endpoint: server.url().parse().unwrap(),
            ..Default::default()
        })
        .unwrap()
    }

    fn page(objects: serde_json::Value) -> String {
        let total = objects.as_array().unwrap().len();
        json!({ "data": objects, "meta": { "totalCount": total } }).to_string()
    }

    fn object(id: i64, name: &str) -> serde_json::Value {
        json!({ "@id": id, "Name": name, "Description": "" })
    }

    fn run_import(client: &Client, text: &str) -> Result<String> {
        import_rows(
            client,
            RowReader::from_text(text).unwrap(),
            OnDuplicate::FirstMatch,
        )
    }

    #[test]
    fn test_everything_missing_is_created_and_linked() {
        let mut server = mockito::Server::new();
        let _projects = server
            .mock("GET", "/api/v0/m/projects")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .create();
        let _datasets = server
            .mock("GET", "/api/v0/m/datasets")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .create();
        let _children = server
            .mock("GET", "/api/v0/m/projects/7/datasets")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .expect(2)
            .create();
        let _create_project = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::UrlEncoded("group".into(), "101".into()))
            .match_body(Matcher::PartialJson(
                json!({ "@type": PROJECT_TYPE, "Name": "MyProj" }),
            ))
            .with_body(json!({ "data": object(7, "MyProj") }).to_string())
            .create();
        let _create_ds1 = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(
                json!({ "@type": DATASET_TYPE, "Name": "ds1" }),
            ))
            .with_body(json!({ "data": object(31, "ds1") }).to_string())
            .create();
        let _create_ds2 = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(
                json!({ "@type": DATASET_TYPE, "Name": "ds2" }),
            ))
            .with_body(json!({ "data": object(32, "ds2") }).to_string())
            .create();
        let links = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({ "@type": LINK_TYPE })))
            .with_body(json!({ "data": { "@id": 900 } }).to_string())
            .expect(2)
            .create();
        let client = test_client(&server);

        let summary = run_import(
            &client,
            "groups,project,dataset\n101,MyProj,\"ds1, ds2\"\n",
        )
        .unwrap();
        links.assert();
        assert_eq!(
            summary,
            "== Group 101 ==\n\
             Project: MyProj (ID=7)\n\
             \x20 - Dataset: ds1 (ID=31)\n\
             \x20 - Dataset: ds2 (ID=32)\n"
        );
    }

    #[test]
    fn test_existing_objects_are_reused_without_writes() {
        let mut server = mockito::Server::new();
        let _groups = server
            .mock("GET", "/api/v0/m/experimentergroups")
            .match_query(Matcher::Any)
            .with_body(page(json!([{ "@id": 7, "Name": "Imaging" }])))
            .create();
        let _project = server
            .mock("GET", "/api/v0/m/projects/42")
            .match_query(Matcher::UrlEncoded("group".into(), "7".into()))
            .with_body(json!({ "data": object(42, "Analysed") }).to_string())
            .create();
        let _datasets = server
            .mock("GET", "/api/v0/m/datasets")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("group".into(), "7".into()),
                Matcher::UrlEncoded("name".into(), "existingDs".into()),
            ]))
            .with_body(page(json!([object(31, "existingDs")])))
            .create();
        let _children = server
            .mock("GET", "/api/v0/m/projects/42/datasets")
            .match_query(Matcher::Any)
            .with_body(page(json!([object(31, "existingDs")])))
            .create();
        let save = server.mock("POST", "/api/v0/m/save").expect(0).create();
        let client = test_client(&server);

        let summary = run_import(
            &client,
            "groups\tproject\tdataset\nImaging\t42\texistingDs\n",
        )
        .unwrap();
        save.assert();
        assert_eq!(
            summary,
            "== Group 7 ==\n\
             Project: Analysed (ID=42)\n\
             \x20 - Dataset: existingDs (ID=31)\n"
        );
    }

    #[test]
    fn test_group_tokens_are_resolved_once() {
        let mut server = mockito::Server::new();
        let groups = server
            .mock("GET", "/api/v0/m/experimentergroups")
            .match_query(Matcher::Any)
            .with_body(page(json!([{ "@id": 7, "Name": "Imaging" }])))
            .expect(1)
            .create();
        let _project = server
            .mock("GET", "/api/v0/m/projects/42")
            .match_query(Matcher::Any)
            .with_body(json!({ "data": object(42, "Analysed") }).to_string())
            .expect(2)
            .create();
        let client = test_client(&server);

        let summary = run_import(
            &client,
            "groups,project,dataset\nImaging,42,\nImaging,42,\n",
        )
        .unwrap();
        groups.assert();
        // The group heading is only emitted when the group changes.
        assert_eq!(
            summary,
            "== Group 7 ==\n\
             Project: Analysed (ID=42)\n\
             \n\
             Project: Analysed (ID=42)\n"
        );
    }

    #[test]
    fn test_failed_link_check_links_anyway() {
        let mut server = mockito::Server::new();
        let _project = server
            .mock("GET", "/api/v0/m/projects/42")
            .match_query(Matcher::Any)
            .with_body(json!({ "data": object(42, "Analysed") }).to_string())
            .create();
        let _datasets = server
            .mock("GET", "/api/v0/m/datasets")
            .match_query(Matcher::Any)
            .with_body(page(json!([object(31, "ds1")])))
            .create();
        let _children = server
            .mock("GET", "/api/v0/m/projects/42/datasets")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body(json!({ "message": "internal error" }).to_string())
            .create();
        let link = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::Any)
            .match_body(Matcher::PartialJson(json!({ "@type": LINK_TYPE })))
            .with_body(json!({ "data": { "@id": 900 } }).to_string())
            .expect(1)
            .create();
        let client = test_client(&server);

        run_import(&client, "groups,project,dataset\n101,42,ds1\n").unwrap();
        link.assert();
    }

    #[test]
    fn test_unknown_group_aborts_the_run() {
        let mut server = mockito::Server::new();
        let _groups = server
            .mock("GET", "/api/v0/m/experimentergroups")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .create();
        let client = test_client(&server);

        let error = run_import(&client, "groups,project,dataset\nNope,MyProj,ds1\n").unwrap_err();
        assert!(format!("{error:#}").contains("`Nope` not found"));
    }
}
