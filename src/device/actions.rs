//! In-flight action tracking

use edge_shared::{ActionRecord, NavigationStatus};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Table of accepted actions keyed by action id.
///
/// Membership at the moment of a call is authoritative: a status update for an
/// id that is no longer tracked is reported as unknown.
#[derive(Debug, Default)]
pub struct ActionTracker {
    actions: RwLock<HashMap<String, ActionRecord>>,
}

impl ActionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a new action, replacing any record with the same id
    pub async fn track(&self, record: ActionRecord) {
        self.actions
            .write()
            .await
            .insert(record.action_id.clone(), record);
    }

    /// Track `record` only if its id is free. Returns whether it was added.
    pub async fn track_if_absent(&self, record: ActionRecord) -> bool {
        match self.actions.write().await.entry(record.action_id.clone()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(record);
                true
            }
        }
    }

    pub async fn remove(&self, action_id: &str) -> Option<ActionRecord> {
        self.actions.write().await.remove(action_id)
    }

    pub async fn get(&self, action_id: &str) -> Option<ActionRecord> {
        self.actions.read().await.get(action_id).cloned()
    }

    pub async fn contains(&self, action_id: &str) -> bool {
        self.actions.read().await.contains_key(action_id)
    }

    pub async fn len(&self) -> usize {
        self.actions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.actions.read().await.is_empty()
    }

    /// Record a status change.
    ///
    /// Returns the updated record, or `None` if the id is not tracked. Terminal
    /// statuses remove the record in the same step.
    pub async fn apply_status(
        &self,
        action_id: &str,
        status: NavigationStatus,
    ) -> Option<ActionRecord> {
        let mut actions = self.actions.write().await;
        if status.is_terminal() {
            let mut record = actions.remove(action_id)?;
            record.status = status;
            Some(record)
        } else {
            let record = actions.get_mut(action_id)?;
            record.status = status;
            Some(record.clone())
        }
    }

    /// Ids of every tracked action belonging to a mission execution
    pub async fn for_mission(&self, mission_execution_uuid: &str) -> Vec<String> {
        self.actions
            .read()
            .await
            .values()
            .filter(|r| r.mission_execution_uuid.as_deref() == Some(mission_execution_uuid))
            .map(|r| r.action_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str, mission: Option<&str>) -> ActionRecord {
        ActionRecord::queued(id, "T1", "goto", json!({}))
            .with_mission(mission.map(str::to_string))
    }

    #[tokio::test]
    async fn test_running_keeps_terminal_removes() {
        let tracker = ActionTracker::new();
        tracker.track(record("a", None)).await;

        let updated = tracker.apply_status("a", NavigationStatus::Running).await.unwrap();
        assert_eq!(updated.status, NavigationStatus::Running);
        assert!(tracker.contains("a").await);

        let finished = tracker.apply_status("a", NavigationStatus::Cancelled).await.unwrap();
        assert_eq!(finished.status, NavigationStatus::Cancelled);
        assert_eq!(finished.twin_uuid, "T1");
        assert!(tracker.is_empty().await);
    }

    #[tokio::test]
    async fn test_track_if_absent_keeps_existing() {
        let tracker = ActionTracker::new();
        tracker.track(record("a", Some("m-1"))).await;

        let stop = ActionRecord::queued("a", "T2", "stop", json!({}));
        assert!(!tracker.track_if_absent(stop).await);
        let kept = tracker.get("a").await.unwrap();
        assert_eq!(kept.command, "goto");
        assert_eq!(kept.twin_uuid, "T1");

        assert!(tracker.track_if_absent(record("b", None)).await);
        assert_eq!(tracker.len().await, 2);
    }

    #[tokio::test]
    async fn test_unknown_action() {
        let tracker = ActionTracker::new();
        assert!(tracker.apply_status("ghost", NavigationStatus::Completed).await.is_none());
        assert!(tracker.apply_status("ghost", NavigationStatus::Running).await.is_none());
    }

    #[tokio::test]
    async fn test_mission_lookup() {
        let tracker = ActionTracker::new();
        tracker.track(record("a", Some("m-1"))).await;
        tracker.track(record("b", Some("m-2"))).await;
        tracker.track(record("c", Some("m-1"))).await;
        tracker.track(record("d", None)).await;

        let mut ids = tracker.for_mission("m-1").await;
        ids.sort();
        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
        assert_eq!(tracker.len().await, 4);
    }
}
