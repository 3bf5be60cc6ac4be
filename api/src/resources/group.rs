use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Identifier of an experimenter group. Selects the authorisation scope for
/// catalog operations; passed explicitly with every request rather than held
/// as session state.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Id(pub i64);

impl Display for Id {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> FmtResult {
        write!(formatter, "{}", self.0)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ExperimenterGroup {
    #[serde(rename = "@id")]
    pub id: Id,

    #[serde(rename = "Name")]
    pub name: String,
}
