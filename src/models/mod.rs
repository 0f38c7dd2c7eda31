//! Data models for Jenkins entities.
//!
//! Each record mirrors the JSON Jenkins serves from its `api/json` endpoints.
//! The `*_TREE` constants are the `tree=` expressions used on the primary call path.

pub mod build;
pub mod job;
pub mod node;
pub mod queue;
pub mod user;

pub use build::{BuildInfo, Change, ChangeItem, ChangeSet};
pub use job::{BuildRef, JobInfo, JobList, JobSummary};
pub use node::{NodeInfo, NodeList};
pub use queue::{Queue, QueueItem, QueueTask, QueuedBuild};
pub use user::{ServerStatus, UserInfo};
