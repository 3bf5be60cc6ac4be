use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Server-side view of the session established by a successful login.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EventContext {
    #[serde(rename = "userId")]
    pub user_id: i64,

    #[serde(rename = "userName")]
    pub user_name: String,

    #[serde(rename = "groupId")]
    pub group_id: i64,

    #[serde(rename = "groupName")]
    pub group_name: String,

    #[serde(rename = "isAdmin", default)]
    pub is_admin: bool,

    #[serde(rename = "memberOfGroups", default)]
    pub member_of_groups: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct CsrfTokenResponse {
    pub data: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LoginResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(rename = "eventContext")]
    pub event_context: Option<EventContext>,

    pub message: Option<String>,
}
