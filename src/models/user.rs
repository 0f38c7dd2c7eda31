//! The authenticated user, as reported by `/me/api/json`.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct UserInfo {
    pub id: Option<String>,
    pub full_name: Option<String>,
}

/// Server identity returned by the connection probe.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct ServerStatus {
    pub user: UserInfo,

    /// `X-Jenkins` header value
    pub version: Option<String>,
}
