use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::resources::{
    dataset::{self, Id as DatasetId},
    project::{self, Id as ProjectId},
};

pub(crate) const OME_TYPE: &str =
    "http://www.openmicroscopy.org/Schemas/OME/2016-06#ProjectDatasetLink";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Id(pub i64);

impl Display for Id {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

/// The non-unique ownership relation between a project and a dataset.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectDatasetLink {
    #[serde(rename = "@id")]
    pub id: Id,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ObjectRef {
    #[serde(rename = "@type")]
    pub ome_type: &'static str,

    #[serde(rename = "@id")]
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateLinkRequest {
    #[serde(rename = "@type")]
    pub ome_type: &'static str,

    #[serde(rename = "Parent")]
    pub parent: ObjectRef,

    #[serde(rename = "Child")]
    pub child: ObjectRef,
}

impl CreateLinkRequest {
    pub fn new(project_id: ProjectId, dataset_id: DatasetId) -> Self {
        Self {
            ome_type: OME_TYPE,
            parent: ObjectRef {
                ome_type: project::OME_TYPE,
                id: project_id.0,
            },
            child: ObjectRef {
                ome_type: dataset::OME_TYPE,
                id: dataset_id.0,
            },
        }
    }
}
