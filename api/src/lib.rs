#![deny(clippy::all)]
mod error;
mod keep_alive;
pub mod resources;
pub mod retry;

use log::debug;
use once_cell::sync::{Lazy, OnceCell};
use reqwest::{
    blocking::{Client as HttpClient, Response as HttpResponse},
    header::{self, HeaderMap, HeaderValue},
    IntoUrl, Method, Proxy, Result as ReqwestResult, StatusCode,
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, time::Duration};
use url::Url;

use crate::resources::{
    auth::{CsrfTokenResponse, LoginResponse},
    dataset::CreateDatasetRequest,
    link::CreateLinkRequest,
    project::CreateProjectRequest,
    ApiErrorBody, EmptySuccess, ObjectsPage, SingleObject,
};
use crate::retry::{Retrier, RetryConfig};

pub use crate::{
    error::{Error, Result},
    keep_alive::KeepAlive,
    resources::{
        auth::{Credentials, EventContext},
        dataset::{Dataset, Id as DatasetId, Name as DatasetName, NewDataset},
        group::{ExperimenterGroup, Id as GroupId},
        link::{Id as LinkId, ProjectDatasetLink},
        project::{Id as ProjectId, Name as ProjectName, NewProject, Project},
    },
};

const CSRF_HEADER: &str = "X-CSRFToken";

/// Page size used when iterating paged list endpoints.
const PAGE_LIMIT: usize = 200;

pub struct Config {
    pub endpoint: Url,
    pub accept_invalid_certificates: bool,
    pub proxy: Option<Url>,
    /// Retry settings to use, if any. This will apply to all idempotent
    /// requests; object creation is never naively retried.
    pub retry_config: Option<RetryConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            endpoint: DEFAULT_ENDPOINT.clone(),
            accept_invalid_certificates: false,
            proxy: None,
            retry_config: None,
        }
    }
}

/// Blocking client for the OMERO JSON API.
///
/// Session state (cookies, CSRF token) is established by `login` and torn
/// down by `logout`. Catalog operations take an explicit `GroupId` request
/// context; the client itself holds no mutable group state.
#[derive(Debug)]
pub struct Client {
    endpoints: Endpoints,
    http_client: HttpClient,
    headers: HeaderMap,
    csrf: OnceCell<String>,
    retrier: Option<Retrier>,
}

impl Client {
    /// Create a new API client.
    pub fn new(config: Config) -> Result<Client> {
        let http_client = build_http_client(&config)?;
        let headers = build_headers(&config)?;
        let endpoints = Endpoints::new(config.endpoint)?;
        let retrier = config.retry_config.map(Retrier::new);
        Ok(Client {
            endpoints,
            http_client,
            headers,
            csrf: OnceCell::new(),
            retrier,
        })
    }

    /// Get the base url for the client
    pub fn base_url(&self) -> &Url {
        &self.endpoints.base
    }

    /// Open an authenticated session.
    ///
    /// Any failure to reach the server or to authenticate maps to
    /// `Error::Connection`.
    pub fn login(&self, credentials: &Credentials) -> Result<EventContext> {
        let token = self
            .get::<_, CsrfTokenResponse>(self.endpoints.token.clone())
            .map_err(|error| Error::Connection {
                message: error.to_string(),
            })?
            .data;

        debug!("Attempting login for `{}`", credentials.username);
        let response = self
            .http_client
            .post(self.endpoints.login.clone())
            .headers(self.headers.clone())
            .header(CSRF_HEADER, token.as_str())
            .form(&[
                ("username", credentials.username.as_str()),
                ("password", credentials.password.as_str()),
                ("server", "1"),
            ])
            .send()
            .map_err(|error| Error::Connection {
                message: error.to_string(),
            })?;

        let status = response.status();
        let login: LoginResponse = response.json().map_err(Error::BadJsonResponse)?;
        match login.event_context {
            Some(event_context) if login.success && status.is_success() => {
                let _ = self.csrf.set(token);
                Ok(event_context)
            }
            _ => Err(Error::Connection {
                message: login
                    .message
                    .unwrap_or_else(|| format!("login rejected with {status}")),
            }),
        }
    }

    /// Close the session. Safe to call on a client that never logged in.
    pub fn logout(&self) -> Result<()> {
        self.post::<_, _, EmptySuccess>(self.endpoints.logout.clone(), (), Retry::No)
            .map(|_| ())
    }

    /// Cheap liveness request used by the keep-alive heartbeat.
    pub fn ping(&self) -> Result<()> {
        self.get::<_, serde_json::Value>(self.endpoints.api_base.clone())
            .map(|_| ())
    }

    /// List all groups visible to the session.
    pub fn get_groups(&self) -> Result<Vec<ExperimenterGroup>> {
        self.get_paged(self.endpoints.groups.clone(), &[])
    }

    /// List projects in a group, optionally filtered by exact name.
    pub fn get_projects(&self, group: GroupId, name: Option<&str>) -> Result<Vec<Project>> {
        let mut query = group_query(group);
        if let Some(name) = name {
            query.push(("name".to_owned(), name.to_owned()));
        }
        self.get_paged(self.endpoints.projects.clone(), &query)
    }

    /// Get a project by id, scoped to a group. Returns `None` if the project
    /// does not exist or is not visible.
    pub fn get_project(&self, group: GroupId, project_id: ProjectId) -> Result<Option<Project>> {
        let url = self.endpoints.project_by_id(&project_id)?;
        Ok(self
            .get_optional_query::<_, _, SingleObject<Project>>(url, Some(&group_query(group)))?
            .map(|response| response.data))
    }

    /// Create a new project in a group.
    pub fn create_project(&self, group: GroupId, options: NewProject<'_>) -> Result<Project> {
        Ok(self
            .request::<_, _, SingleObject<Project>, _>(
                &Method::POST,
                &self.endpoints.save.clone(),
                &Some(CreateProjectRequest::new(&options)),
                &Some(group_query(group)),
                &Retry::No,
            )?
            .data)
    }

    /// List datasets in a group, optionally filtered by exact name. The
    /// listing is group-wide, not scoped to any project.
    pub fn get_datasets(&self, group: GroupId, name: Option<&str>) -> Result<Vec<Dataset>> {
        let mut query = group_query(group);
        if let Some(name) = name {
            query.push(("name".to_owned(), name.to_owned()));
        }
        self.get_paged(self.endpoints.datasets.clone(), &query)
    }

    /// Create a new dataset in a group. `project_id` scopes the creation to
    /// an intended parent project; the project-dataset link itself is
    /// created separately via `create_project_dataset_link`.
    pub fn create_dataset(
        &self,
        group: GroupId,
        options: NewDataset<'_>,
        project_id: Option<ProjectId>,
    ) -> Result<Dataset> {
        let mut query = group_query(group);
        if let Some(project_id) = project_id {
            query.push(("project".to_owned(), project_id.0.to_string()));
        }
        Ok(self
            .request::<_, _, SingleObject<Dataset>, _>(
                &Method::POST,
                &self.endpoints.save.clone(),
                &Some(CreateDatasetRequest::new(&options)),
                &Some(query),
                &Retry::No,
            )?
            .data)
    }

    /// List the datasets currently linked to a project.
    pub fn get_project_datasets(
        &self,
        group: GroupId,
        project_id: ProjectId,
    ) -> Result<Vec<Dataset>> {
        let url = self.endpoints.project_datasets(&project_id)?;
        self.get_paged(url, &group_query(group))
    }

    /// Link a dataset to a project. The server does not enforce uniqueness;
    /// callers are expected to check existing links first.
    pub fn create_project_dataset_link(
        &self,
        group: GroupId,
        project_id: ProjectId,
        dataset_id: DatasetId,
    ) -> Result<ProjectDatasetLink> {
        Ok(self
            .request::<_, _, SingleObject<ProjectDatasetLink>, _>(
                &Method::POST,
                &self.endpoints.save.clone(),
                &Some(CreateLinkRequest::new(project_id, dataset_id)),
                &Some(group_query(group)),
                &Retry::No,
            )?
            .data)
    }

    fn get<LocationT, SuccessT>(&self, url: LocationT) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        for<'de> SuccessT: Deserialize<'de>,
    {
        self.request(&Method::GET, &url, &None::<()>, &None::<()>, &Retry::Yes)
    }

    fn get_query<LocationT, QueryT, SuccessT>(
        &self,
        url: LocationT,
        query: Option<&QueryT>,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        QueryT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        self.request(&Method::GET, &url, &None::<()>, &Some(query), &Retry::Yes)
    }

    fn get_optional_query<LocationT, QueryT, SuccessT>(
        &self,
        url: LocationT,
        query: Option<&QueryT>,
    ) -> Result<Option<SuccessT>>
    where
        LocationT: IntoUrl + Display + Clone,
        QueryT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        let http_response =
            self.raw_request(&Method::GET, &url, &None::<()>, &Some(query), &Retry::Yes)?;
        if http_response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        json_or_error(http_response).map(Some)
    }

    fn get_paged<SuccessT>(&self, url: Url, query: &[(String, String)]) -> Result<Vec<SuccessT>>
    where
        for<'de> SuccessT: Deserialize<'de>,
    {
        let mut results: Vec<SuccessT> = Vec::new();
        loop {
            let mut page_query = query.to_vec();
            page_query.push(("offset".to_owned(), results.len().to_string()));
            page_query.push(("limit".to_owned(), PAGE_LIMIT.to_string()));
            let page: ObjectsPage<SuccessT> = self.get_query(url.clone(), Some(&page_query))?;
            let total = page.meta.total_count;
            if page.data.is_empty() {
                return Ok(results);
            }
            results.extend(page.data);
            if results.len() >= total {
                return Ok(results);
            }
        }
    }

    fn post<LocationT, RequestT, SuccessT>(
        &self,
        url: LocationT,
        request: RequestT,
        retry: Retry,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        self.request(&Method::POST, &url, &Some(request), &None::<()>, &retry)
    }

    fn raw_request<LocationT, RequestT, QueryT>(
        &self,
        method: &Method,
        url: &LocationT,
        body: &Option<RequestT>,
        query: &Option<QueryT>,
        retry: &Retry,
    ) -> Result<HttpResponse>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        QueryT: Serialize,
    {
        let do_request = || {
            let mut request = self
                .http_client
                .request(method.clone(), url.clone())
                .headers(self.headers.clone());
            if *method != Method::GET {
                if let Some(token) = self.csrf.get() {
                    request = request.header(CSRF_HEADER, token.as_str());
                }
            }
            let request = match &query {
                Some(query) => request.query(query),
                None => request,
            };
            let request = match &body {
                Some(body) => request.json(body),
                None => request,
            };
            request.send()
        };

        let result = match retry {
            Retry::Yes => self.with_retries(do_request),
            Retry::No => do_request(),
        };
        result.map_err(|source| Error::ReqwestError {
            source,
            message: format!("{method} operation failed."),
        })
    }

    fn request<LocationT, RequestT, SuccessT, QueryT>(
        &self,
        method: &Method,
        url: &LocationT,
        body: &Option<RequestT>,
        query: &Option<QueryT>,
        retry: &Retry,
    ) -> Result<SuccessT>
    where
        LocationT: IntoUrl + Display + Clone,
        RequestT: Serialize,
        QueryT: Serialize,
        for<'de> SuccessT: Deserialize<'de>,
    {
        debug!("Attempting {} `{}`", method, url);
        let http_response = self.raw_request(method, url, body, query, retry)?;
        json_or_error(http_response)
    }

    fn with_retries(
        &self,
        send_request: impl Fn() -> ReqwestResult<HttpResponse>,
    ) -> ReqwestResult<HttpResponse> {
        match &self.retrier {
            Some(retrier) => retrier.with_retries(send_request),
            None => send_request(),
        }
    }
}

#[derive(Copy, Clone)]
enum Retry {
    Yes,
    No,
}

fn json_or_error<SuccessT>(response: HttpResponse) -> Result<SuccessT>
where
    for<'de> SuccessT: Deserialize<'de>,
{
    let status = response.status();
    if status.is_success() {
        response.json().map_err(Error::BadJsonResponse)
    } else {
        let message = response
            .json::<ApiErrorBody>()
            .ok()
            .and_then(|body| body.message)
            .unwrap_or_default();
        Err(Error::Api {
            status_code: status,
            message,
        })
    }
}

fn group_query(group: GroupId) -> Vec<(String, String)> {
    vec![("group".to_owned(), group.0.to_string())]
}

#[derive(Debug)]
struct Endpoints {
    base: Url,
    api_base: Url,
    token: Url,
    login: Url,
    logout: Url,
    groups: Url,
    projects: Url,
    datasets: Url,
    save: Url,
}

fn construct_endpoint(base: &Url, segments: &[&str]) -> Result<Url> {
    let mut endpoint = base.clone();

    let mut endpoint_segments = endpoint
        .path_segments_mut()
        .map_err(|_| Error::BadEndpoint {
            endpoint: base.clone(),
        })?;

    for segment in segments {
        endpoint_segments.push(segment);
    }

    drop(endpoint_segments);

    Ok(endpoint)
}

impl Endpoints {
    pub fn new(base: Url) -> Result<Self> {
        let api_base = construct_endpoint(&base, &["api"])?;
        let token = construct_endpoint(&base, &["api", "v0", "token"])?;
        let login = construct_endpoint(&base, &["api", "v0", "login"])?;
        let logout = construct_endpoint(&base, &["api", "v0", "logout"])?;
        let groups = construct_endpoint(&base, &["api", "v0", "m", "experimentergroups"])?;
        let projects = construct_endpoint(&base, &["api", "v0", "m", "projects"])?;
        let datasets = construct_endpoint(&base, &["api", "v0", "m", "datasets"])?;
        let save = construct_endpoint(&base, &["api", "v0", "m", "save"])?;

        Ok(Endpoints {
            base,
            api_base,
            token,
            login,
            logout,
            groups,
            projects,
            datasets,
            save,
        })
    }

    fn project_by_id(&self, project_id: &ProjectId) -> Result<Url> {
        construct_endpoint(
            &self.base,
            &["api", "v0", "m", "projects", &project_id.0.to_string()],
        )
    }

    fn project_datasets(&self, project_id: &ProjectId) -> Result<Url> {
        construct_endpoint(
            &self.base,
            &[
                "api",
                "v0",
                "m",
                "projects",
                &project_id.0.to_string(),
                "datasets",
            ],
        )
    }
}

const DEFAULT_HTTP_TIMEOUT_SECONDS: u64 = 120;

fn build_http_client(config: &Config) -> Result<HttpClient> {
    let mut builder = HttpClient::builder()
        .gzip(true)
        .cookie_store(true)
        .danger_accept_invalid_certs(config.accept_invalid_certificates)
        .timeout(Some(Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECONDS)));

    if let Some(proxy) = config.proxy.clone() {
        builder = builder.proxy(Proxy::all(proxy).map_err(Error::BuildHttpClient)?);
    }
    builder.build().map_err(Error::BuildHttpClient)
}

fn build_headers(config: &Config) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    // Django CSRF protection requires a same-origin referer on secure
    // requests.
    headers.insert(
        header::REFERER,
        HeaderValue::from_str(config.endpoint.as_str()).map_err(|_| Error::BadEndpoint {
            endpoint: config.endpoint.clone(),
        })?,
    );
    Ok(headers)
}

pub static DEFAULT_ENDPOINT: Lazy<Url> =
    Lazy::new(|| Url::parse("http://localhost:4080").expect("Default URL is well-formed"));
