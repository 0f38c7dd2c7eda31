//! Cache key scheme.
//!
//! Keys are `"{operation}:{normalized args}"`. Job-scoped prefixes end with `:`
//! so invalidating `api` never touches `api-tests`.

use crate::cache::CacheManager;

pub const JOBS_LIST_PREFIX: &str = "jobs_list:";
pub const QUEUE_INFO: &str = "queue_info";
pub const NODES_LIST: &str = "nodes_list";

/// Canonical form of a job name. `/team/web`, `team//web/` and `team/web` all
/// address the same job, so keys and invalidation prefixes use this form.
pub fn job_id(job: &str) -> String {
    job.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Filters are case-insensitive, so the key uses the lowercased form.
pub fn jobs_list(filter: Option<&str>) -> String {
    match filter {
        Some(f) => format!("{}{}", JOBS_LIST_PREFIX, f.to_lowercase()),
        None => format!("{}all", JOBS_LIST_PREFIX),
    }
}

pub fn job_details(job: &str, max_recent_builds: i64) -> String {
    format!("job_details:{}:{}", job, max_recent_builds)
}

pub fn build_info(job: &str, build_number: u64) -> String {
    format!("build_info:{}:{}", job, build_number)
}

pub fn last_build_number(job: &str) -> String {
    format!("last_build_number:{}", job)
}

pub fn last_build_timestamp(job: &str) -> String {
    format!("last_build_timestamp:{}", job)
}

pub fn job_config(job: &str) -> String {
    format!("job_config:{}", job)
}

pub fn node_info(node: &str) -> String {
    format!("node_info:{}", node)
}

/// A cache region made stale by a successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stale {
    /// One exact key
    Key(String),
    /// Every key starting with the prefix
    Prefix(String),
}

impl Stale {
    /// Drop the region from `cache`, returning how many entries went.
    pub fn apply<V: Clone>(&self, cache: &CacheManager<V>) -> usize {
        match self {
            Stale::Key(key) => usize::from(cache.invalidate(key)),
            Stale::Prefix(prefix) => cache.invalidate_pattern(prefix),
        }
    }
}

pub fn all_jobs_lists() -> Stale {
    Stale::Prefix(JOBS_LIST_PREFIX.to_string())
}

/// State derived from the job's build history.
pub fn job_builds(job: &str) -> Vec<Stale> {
    vec![
        Stale::Prefix(format!("job_details:{}:", job)),
        Stale::Prefix(format!("build_info:{}:", job)),
        Stale::Key(last_build_number(job)),
        Stale::Key(last_build_timestamp(job)),
        Stale::Key(QUEUE_INFO.to_string()),
    ]
}

/// Entries that reflect whether `job` is enabled.
pub fn job_state(job: &str) -> Vec<Stale> {
    vec![
        all_jobs_lists(),
        Stale::Prefix(format!("job_details:{}:", job)),
    ]
}

/// Entries derived from the configuration of `job`.
pub fn job_configuration(job: &str) -> Vec<Stale> {
    vec![
        Stale::Key(job_config(job)),
        Stale::Prefix(format!("job_details:{}:", job)),
    ]
}

/// Everything cached about one job, plus the job lists that mention it.
pub fn whole_job(job: &str) -> Vec<Stale> {
    let mut stale = job_builds(job);
    stale.push(Stale::Key(job_config(job)));
    stale.push(all_jobs_lists());
    stale
}
