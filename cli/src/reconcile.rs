use anyhow::{anyhow, bail, Result};
use log::{debug, info};
use omero_client::{
    Client, Dataset, DatasetId, GroupId, NewDataset, NewProject, Project, ProjectId,
};
use std::str::FromStr;

/// A `project` cell is either a numeric id (use as-is, never create) or a
/// name (find or create).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSpec {
    Id(ProjectId),
    Name(String),
}

impl FromStr for ProjectSpec {
    type Err = anyhow::Error;

    fn from_str(string: &str) -> Result<Self> {
        let token = string.trim();
        if token.is_empty() {
            bail!("Empty project reference");
        }
        if token.bytes().all(|byte| byte.is_ascii_digit()) {
            Ok(ProjectSpec::Id(ProjectId(token.parse()?)))
        } else {
            Ok(ProjectSpec::Name(token.to_owned()))
        }
    }
}

/// What to do when a name lookup returns more than one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDuplicate {
    Error,
    FirstMatch,
    MostRecent,
}

impl FromStr for OnDuplicate {
    type Err = anyhow::Error;

    fn from_str(string: &str) -> Result<Self> {
        match string {
            "error" => Ok(OnDuplicate::Error),
            "first-match" => Ok(OnDuplicate::FirstMatch),
            "most-recent" => Ok(OnDuplicate::MostRecent),
            _ => Err(anyhow!(
                "Expected one of `error`, `first-match` or `most-recent`, got `{string}`"
            )),
        }
    }
}

/// Outcome of a project/dataset containment check. The caller decides how to
/// react to each case, in particular to a failed check.
#[derive(Debug)]
pub enum LinkCheck {
    AlreadyLinked,
    NotLinked,
    CheckFailed(omero_client::Error),
}

/// Turn a `groups` cell into a group id. Numeric tokens are used directly,
/// anything else is matched against the names of the visible groups.
pub fn resolve_group(client: &Client, token: &str) -> Result<GroupId> {
    let token = token.trim();
    if token.is_empty() {
        bail!("Empty group reference");
    }
    if token.bytes().all(|byte| byte.is_ascii_digit()) {
        return Ok(GroupId(token.parse()?));
    }
    client
        .get_groups()?
        .into_iter()
        .find(|group| group.name == token)
        .map(|group| group.id)
        .ok_or_else(|| anyhow!("Group `{token}` not found"))
}

pub fn get_or_create_project(
    client: &Client,
    group: GroupId,
    spec: &ProjectSpec,
    on_duplicate: OnDuplicate,
) -> Result<Project> {
    match spec {
        ProjectSpec::Id(project_id) => client
            .get_project(group, *project_id)?
            .ok_or_else(|| anyhow!("Project ID `{project_id}` not found in group {group}")),
        ProjectSpec::Name(name) => {
            let matches: Vec<Project> = client
                .get_projects(group, Some(name))?
                .into_iter()
                .filter(|project| project.name.0 == *name)
                .collect();
            if matches.is_empty() {
                let project = client.create_project(
                    group,
                    NewProject {
                        name,
                        description: None,
                    },
                )?;
                info!("Created project `{}` (ID={})", project.name.0, project.id);
                Ok(project)
            } else {
                pick_duplicate(matches, "project", name, on_duplicate, |project| {
                    project.id.0
                })
            }
        }
    }
}

pub fn get_or_create_dataset(
    client: &Client,
    group: GroupId,
    project: &Project,
    name: &str,
    on_duplicate: OnDuplicate,
) -> Result<Dataset> {
    // Dataset names are matched across the whole group, not just within the
    // project. A same-named dataset under another project will be reused.
    let matches: Vec<Dataset> = client
        .get_datasets(group, Some(name))?
        .into_iter()
        .filter(|dataset| dataset.name.0 == name)
        .collect();
    if matches.is_empty() {
        let dataset = client.create_dataset(
            group,
            NewDataset {
                name,
                description: None,
            },
            Some(project.id),
        )?;
        info!("Created dataset `{}` (ID={})", dataset.name.0, dataset.id);
        Ok(dataset)
    } else {
        pick_duplicate(matches, "dataset", name, on_duplicate, |dataset| {
            dataset.id.0
        })
    }
}

/// Report whether `dataset_id` is already among the project's datasets.
pub fn check_link(
    client: &Client,
    group: GroupId,
    project_id: ProjectId,
    dataset_id: DatasetId,
) -> LinkCheck {
    match client.get_project_datasets(group, project_id) {
        Ok(datasets) => {
            if datasets.iter().any(|dataset| dataset.id == dataset_id) {
                LinkCheck::AlreadyLinked
            } else {
                LinkCheck::NotLinked
            }
        }
        Err(error) => LinkCheck::CheckFailed(error),
    }
}

pub fn create_link(
    client: &Client,
    group: GroupId,
    project_id: ProjectId,
    dataset_id: DatasetId,
) -> Result<()> {
    let link = client.create_project_dataset_link(group, project_id, dataset_id)?;
    debug!("Linked dataset {dataset_id} to project {project_id} (link ID={})", link.id);
    Ok(())
}

fn pick_duplicate<ObjectT>(
    mut matches: Vec<ObjectT>,
    kind: &str,
    name: &str,
    on_duplicate: OnDuplicate,
    id_of: impl Fn(&ObjectT) -> i64,
) -> Result<ObjectT> {
    if matches.len() == 1 {
        return Ok(matches.remove(0));
    }
    match on_duplicate {
        OnDuplicate::Error => bail!(
            "Found {} {kind}s named `{name}`, pass `--on-duplicate` to pick one",
            matches.len()
        ),
        OnDuplicate::FirstMatch => Ok(matches.remove(0)),
        // Object ids increase monotonically, so the highest id is the newest.
        OnDuplicate::MostRecent => matches
            .into_iter()
            .max_by_key(id_of)
            .ok_or_else(|| anyhow!("No {kind}s named `{name}`")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use omero_client::Config;
    use pretty_assertions::assert_eq;
    use serde_json::json;

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

    fn project_json(id: i64, name: &str) -> serde_json::Value {
        json!({ "@id": id, "Name": name, "Description": "" })
    }

    #[test]
    fn test_resolve_group_numeric_token_needs_no_request() {
        let server = mockito::Server::new();
        let client = test_client(&server);
        assert_eq!(resolve_group(&client, " 101 ").unwrap(), GroupId(101));
    }

    #[test]
    fn test_resolve_group_by_name() {
        let mut server = mockito::Server::new();
        let _groups = server
            .mock("GET", "/api/v0/m/experimentergroups")
            .match_query(Matcher::Any)
            .with_body(page(json!([
                { "@id": 3, "Name": "Screening" },
                { "@id": 7, "Name": "Imaging" },
            ])))
            .create();
        let client = test_client(&server);
        assert_eq!(resolve_group(&client, "Imaging").unwrap(), GroupId(7));
    }

    #[test]
    fn test_resolve_group_unknown_name() {
        let mut server = mockito::Server::new();
        let _groups = server
            .mock("GET", "/api/v0/m/experimentergroups")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .create();
        let client = test_client(&server);
        let error = resolve_group(&client, "Nope").unwrap_err();
        assert!(error.to_string().contains("`Nope` not found"));
    }

    #[test]
    fn test_project_by_explicit_id_is_never_created() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/api/v0/m/projects/42")
            .match_query(Matcher::Any)
            .with_status(404)
            .with_body(json!({ "message": "not found" }).to_string())
            .create();
        let save = server.mock("POST", "/api/v0/m/save").expect(0).create();
        let client = test_client(&server);

        let error = get_or_create_project(
            &client,
            GroupId(101),
            &ProjectSpec::Id(ProjectId(42)),
            OnDuplicate::FirstMatch,
        )
        .unwrap_err();
        assert!(error.to_string().contains("`42` not found"));
        save.assert();
    }

    #[test]
    fn test_existing_project_is_reused() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/api/v0/m/projects")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("group".into(), "101".into()),
                Matcher::UrlEncoded("name".into(), "MyProj".into()),
            ]))
            .with_body(page(json!([project_json(7, "MyProj")])))
            .create();
        let save = server.mock("POST", "/api/v0/m/save").expect(0).create();
        let client = test_client(&server);

        let project = get_or_create_project(
            &client,
            GroupId(101),
            &ProjectSpec::Name("MyProj".to_owned()),
            OnDuplicate::FirstMatch,
        )
        .unwrap();
        assert_eq!(project.id, ProjectId(7));
        save.assert();
    }

    #[test]
    fn test_missing_project_is_created() {
        let mut server = mockito::Server::new();
        let _get = server
            .mock("GET", "/api/v0/m/projects")
            .match_query(Matcher::Any)
            .with_body(page(json!([])))
            .create();
        let save = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::UrlEncoded("group".into(), "101".into()))
            .match_body(Matcher::PartialJson(json!({ "Name": "MyProj" })))
            .with_body(json!({ "data": project_json(7, "MyProj") }).to_string())
            .create();
        let client = test_client(&server);

        let project = get_or_create_project(
            &client,
            GroupId(101),
            &ProjectSpec::Name("MyProj".to_owned()),
            OnDuplicate::FirstMatch,
        )
        .unwrap();
        assert_eq!(project.id, ProjectId(7));
        save.assert();
    }

    #[test]
    fn test_duplicate_projects() {
        let duplicates = page(json!([project_json(7, "MyProj"), project_json(9, "MyProj")]));
        for (policy, expected) in [
            (OnDuplicate::FirstMatch, Some(ProjectId(7))),
            (OnDuplicate::MostRecent, Some(ProjectId(9))),
            (OnDuplicate::Error, None),
        ] {
            let mut server = mockito::Server::new();
            let _get = server
                .mock("GET", "/api/v0/m/projects")
                .match_query(Matcher::Any)
                .with_body(duplicates.clone())
                .create();
            let client = test_client(&server);

            let result = get_or_create_project(
                &client,
                GroupId(101),
                &ProjectSpec::Name("MyProj".to_owned()),
                policy,
            );
            match expected {
                Some(id) => assert_eq!(result.unwrap().id, id),
                None => assert!(result
                    .unwrap_err()
                    .to_string()
                    .contains("Found 2 projects named `MyProj`")),
            }
        }
    }

    #[test]
    fn test_check_link_outcomes() {
        let mut server = mockito::Server::new();
        let _datasets = server
            .mock("GET", "/api/v0/m/projects/7/datasets")
            .match_query(Matcher::Any)
            .with_body(page(json!([
                { "@id": 31, "Name": "ds1", "Description": "" }
            ])))
            .expect(2)
            .create();
        let client = test_client(&server);

        assert!(matches!(
            check_link(&client, GroupId(101), ProjectId(7), DatasetId(31)),
            LinkCheck::AlreadyLinked
        ));
        assert!(matches!(
            check_link(&client, GroupId(101), ProjectId(7), DatasetId(32)),
            LinkCheck::NotLinked
        ));

        let _failure = server
            .mock("GET", "/api/v0/m/projects/7/datasets")
            .match_query(Matcher::Any)
            .with_status(500)
            .with_body("{}")
            .create();
        assert!(matches!(
            check_link(&client, GroupId(101), ProjectId(7), DatasetId(31)),
            LinkCheck::CheckFailed(_)
        ));
    }

    #[test]
    fn test_create_link_reports_the_new_link() {
        let mut server = mockito::Server::new();
        let save = server
            .mock("POST", "/api/v0/m/save")
            .match_query(Matcher::UrlEncoded("group".into(), "101".into()))
            .with_body(json!({ "data": { "@id": 900 } }).to_string())
            .create();
        let client = test_client(&server);

        create_link(&client, GroupId(101), ProjectId(7), DatasetId(31)).unwrap();
        assert_eq!(omero_client::LinkId(900).to_string(), "900");
        save.assert();
    }

    #[test]
    fn test_project_spec_parsing() {
        assert_eq!(
            "42".parse::<ProjectSpec>().unwrap(),
            ProjectSpec::Id(ProjectId(42))
        );
        assert_eq!(
            " MyProj ".parse::<ProjectSpec>().unwrap(),
            ProjectSpec::Name("MyProj".to_owned())
        );
        assert!("".parse::<ProjectSpec>().is_err());
    }
}
