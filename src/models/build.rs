//! Build records returned by the Jenkins JSON API.

use serde::{Deserialize, Serialize};

/// Tree expression for a single build.
pub const BUILD_TREE: &str = "number,result,building,timestamp,duration,\
estimatedDuration,url,displayName,\
changeSet[items[commitId,msg,comment,author[fullName]]],\
changeSets[items[commitId,msg,comment,author[fullName]]]";

/// Details for a single build.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    pub number: u64,

    /// `SUCCESS`, `FAILURE`, `UNSTABLE`, `ABORTED`, or `None` while building
    #[serde(default)]
    pub result: Option<String>,

    #[serde(default)]
    pub building: bool,

    /// Start time, epoch milliseconds
    #[serde(default)]
    pub timestamp: i64,

    /// Duration in milliseconds; zero while building
    #[serde(default)]
    pub duration: u64,

    #[serde(default)]
    pub estimated_duration: Option<i64>,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub display_name: Option<String>,

    /// Freestyle jobs report a single change set
    #[serde(default)]
    pub change_set: Option<ChangeSet>,

    /// Pipeline jobs report one change set per checkout
    #[serde(default)]
    pub change_sets: Vec<ChangeSet>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ChangeSet {
    pub items: Vec<ChangeItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangeItem {
    pub commit_id: Option<String>,

    /// First line of the commit message
    pub msg: String,

    /// Full commit message, when the SCM reports one
    pub comment: Option<String>,

    pub author: Option<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default, rename_all = "camelCase")]
pub struct Author {
    pub full_name: String,
}

/// A flattened change for tool output.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Change {
    pub commit_id: Option<String>,
    pub author: String,
    pub comment: String,
}

impl BuildInfo {
    /// Result string, reporting `BUILDING` for in-progress builds.
    pub fn status(&self) -> &str {
        match (&self.result, self.building) {
            (_, true) => "BUILDING",
            (Some(result), false) => result,
            (None, false) => "UNKNOWN",
        }
    }

    /// Duration in seconds.
    pub fn duration_seconds(&self) -> f64 {
        self.duration as f64 / 1000.0
    }

    /// All changes from both change-set shapes.
    pub fn changes(&self) -> Vec<Change> {
        self.change_set
            .iter()
            .chain(self.change_sets.iter())
            .flat_map(|set| set.items.iter())
            .map(|item| Change {
                commit_id: item.commit_id.clone(),
                author: item
                    .author
                    .as_ref()
                    .map(|a| a.full_name.clone())
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| "Unknown".to_string()),
                comment: item
                    .comment
                    .as_deref()
                    .unwrap_or(&item.msg)
                    .trim()
                    .to_string(),
            })
            .collect()
    }
}
