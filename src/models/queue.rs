//! Build queue records.

use serde::{Deserialize, Serialize};

use super::job::BuildRef;

/// Tree expression for a single queue item.
pub const QUEUE_ITEM_TREE: &str =
    "id,why,blocked,buildable,stuck,cancelled,inQueueSince,task[name,url],executable[number]";

/// Tree expression for the queue listing.
pub const QUEUE_TREE: &str =
    "items[id,why,blocked,buildable,stuck,cancelled,inQueueSince,task[name,url],executable[number]]";

/// A queued (or recently started) build request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: u64,

    #[serde(default)]
    pub task: Option<QueueTask>,

    /// Why the item is still waiting
    #[serde(default)]
    pub why: Option<String>,

    #[serde(default)]
    pub blocked: bool,

    #[serde(default)]
    pub buildable: bool,

    #[serde(default)]
    pub stuck: bool,

    #[serde(default)]
    pub cancelled: bool,

    /// Epoch milliseconds
    #[serde(default)]
    pub in_queue_since: Option<i64>,

    /// Set once the item left the queue and a build started
    #[serde(default)]
    pub executable: Option<BuildRef>,
}

impl QueueItem {
    pub fn task_name(&self) -> Option<&str> {
        self.task.as_ref().map(|t| t.name.as_str())
    }

    pub fn build_number(&self) -> Option<u64> {
        self.executable.map(|e| e.number)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct QueueTask {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Queue {
    #[serde(default)]
    pub items: Vec<QueueItem>,
}

/// Outcome of a build trigger.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct QueuedBuild {
    /// Queue item id parsed from the `Location` header
    pub queue_id: Option<u64>,

    pub location: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_queue_item_started() {
        let item: QueueItem = serde_json::from_value(json!({
            "id": 31,
            "task": {"name": "api", "url": "x"},
            "executable": {"number": 77, "url": "y"}
        }))
        .unwrap();
        assert_eq!(item.task_name(), Some("api"));
        assert_eq!(item.build_number(), Some(77));
        assert!(!item.cancelled);
    }

    #[test]
    fn test_queue_item_waiting() {
        let item: QueueItem = serde_json::from_value(json!({
            "id": 32,
            "why": "Waiting for next available executor",
            "blocked": true,
            "executable": null
        }))
        .unwrap();
        assert_eq!(item.build_number(), None);
        assert!(item.blocked);
    }
}
