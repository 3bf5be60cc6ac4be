pub mod auth;
pub mod dataset;
pub mod group;
pub mod link;
pub mod project;

use serde::Deserialize;

/// Envelope for endpoints returning a single object.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SingleObject<ObjectT> {
    pub data: ObjectT,
}

/// Envelope for paged list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ObjectsPage<ObjectT> {
    pub data: Vec<ObjectT>,
    pub meta: PageMeta,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct PageMeta {
    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

/// Error payload returned by the server on non-2xx responses.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct EmptySuccess {}
