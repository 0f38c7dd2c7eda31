//! Build agent (node) records.

use serde::{Deserialize, Serialize};

/// Tree expression for node documents.
pub const NODE_FIELDS: &str = "displayName,description,offline,temporarilyOffline,\
offlineCauseReason,numExecutors,idle";

/// A build agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeInfo {
    pub display_name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub offline: bool,

    #[serde(default)]
    pub temporarily_offline: bool,

    #[serde(default)]
    pub offline_cause_reason: Option<String>,

    #[serde(default)]
    pub num_executors: u32,

    #[serde(default)]
    pub idle: bool,
}

impl NodeInfo {
    pub fn status(&self) -> &'static str {
        if self.offline {
            "offline"
        } else if self.idle {
            "idle"
        } else {
            "busy"
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NodeList {
    #[serde(default)]
    pub computer: Vec<NodeInfo>,
}

/// Jenkins addresses the controller as `(built-in)` (older releases: `(master)`).
pub fn node_path_segment(name: &str) -> String {
    match name {
        "built-in" | "(built-in)" | "master" | "(master)" => "(built-in)".to_string(),
        other => urlencoding::encode(other).into_owned(),
    }
}
