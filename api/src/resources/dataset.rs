use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

pub(crate) const OME_TYPE: &str = "http://www.openmicroscopy.org/Schemas/OME/2016-06#Dataset";

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Id(pub i64);

impl Display for Id {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Name(pub String);

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Dataset {
    #[serde(rename = "@id")]
    pub id: Id,

    #[serde(rename = "Name")]
    pub name: Name,

    #[serde(rename = "Description", default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct NewDataset<'request> {
    pub name: &'request str,
    pub description: Option<&'request str>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateDatasetRequest<'request> {
    #[serde(rename = "@type")]
    pub ome_type: &'static str,

    #[serde(rename = "Name")]
    pub name: &'request str,

    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<&'request str>,
}

impl<'request> CreateDatasetRequest<'request> {
    pub fn new(options: &NewDataset<'request>) -> Self {
        Self {
            ome_type: OME_TYPE,
            name: options.name,
            description: options.description,
        }
    }
}
