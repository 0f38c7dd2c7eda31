//! Job records returned by the Jenkins JSON API.

use serde::{Deserialize, Serialize};

/// Tree expression for the jobs listing.
pub const JOBS_TREE: &str = "jobs[name,fullName,url,color]";

/// Tree expression for a single job.
pub const JOB_TREE: &str = "name,fullName,url,description,buildable,color,\
lastBuild[number,url],lastCompletedBuild[number,url],\
lastSuccessfulBuild[number,url],lastFailedBuild[number,url],\
builds[number,url]";

/// An entry in the jobs listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JobSummary {
    pub name: String,

    /// Folder-qualified name, e.g. `team/api`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default)]
    pub url: String,

    /// Ball colour; encodes last result and whether a build is running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
}

impl JobSummary {
    /// Name to use when addressing the job in later calls.
    pub fn qualified_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the job is disabled, judging by its colour.
    pub fn is_disabled(&self) -> bool {
        matches!(self.color.as_deref(), Some("disabled") | Some("disabled_anime"))
    }
}

/// Top-level listing document.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct JobList {
    #[serde(default)]
    pub jobs: Vec<JobSummary>,
}

/// A reference to a build from a job document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildRef {
    pub number: u64,
}

/// Details for a single job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobInfo {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default = "default_buildable")]
    pub buildable: bool,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub last_build: Option<BuildRef>,

    #[serde(default)]
    pub last_completed_build: Option<BuildRef>,

    #[serde(default)]
    pub last_successful_build: Option<BuildRef>,

    #[serde(default)]
    pub last_failed_build: Option<BuildRef>,

    /// Build history, newest first
    #[serde(default)]
    pub builds: Vec<BuildRef>,
}

fn default_buildable() -> bool {
    true
}

impl JobInfo {
    /// The most recent build number, falling back to the last completed one.
    pub fn latest_build_number(&self) -> Option<u64> {
        self.last_build
            .or(self.last_completed_build)
            .map(|build| build.number)
    }

    /// Up to `limit` build numbers, newest first.
    pub fn recent_build_numbers(&self, limit: usize) -> Vec<u64> {
        let mut numbers: Vec<u64> = self.builds.iter().map(|b| b.number).collect();
        numbers.sort_unstable_by(|a, b| b.cmp(a));
        numbers.dedup();
        numbers.truncate(limit);
        numbers
    }
}
