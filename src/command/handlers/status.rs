//! Adapter status handling

use edge_shared::StatusUpdate;
use tracing::debug;

use crate::device::DeviceSupervisor;

/// Record an adapter status update and republish it.
///
/// The update goes to the twin that issued the action. Updates for unknown
/// actions fall back to the first known twin and are dropped when there is
/// none. Returns the twin the status was published to.
pub async fn handle_adapter_status(
    supervisor: &DeviceSupervisor,
    update: StatusUpdate,
) -> Option<String> {
    let record = supervisor
        .actions()
        .apply_status(&update.action_id, update.status)
        .await;

    let twin_uuid = match record {
        Some(record) => record.twin_uuid,
        None => {
            debug!("Status {} for untracked action {}", update.status, update.action_id);
            supervisor.core().twin_ids().into_iter().next()?
        }
    };

    supervisor
        .core()
        .publish_nav_status(
            &twin_uuid,
            &update.action_id,
            update.status,
            update.message.as_deref(),
            update.progress,
        )
        .await;
    Some(twin_uuid)
}
