//! Routes inbound command messages and adapter status updates to handlers

use edge_shared::StatusUpdate;
use serde_json::Value;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::command::handlers::{self, HandlerContext};
use crate::device::DeviceSupervisor;
use crate::error::EdgeError;
use crate::transport::MessageHandler;

/// Outcome of a command handler
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Command accepted and completed successfully
    Completed { message: String },
    /// Command accepted but execution failed
    Failed { message: String },
    /// Command rejected (malformed, no adapter, refused by the robot)
    Rejected { message: String },
    /// Command handed to the adapter; progress arrives via status updates
    Pending,
}

#[derive(Debug, Clone, Copy)]
enum CommandTopic {
    Navigate,
    Mission,
}

/// Subscribe the navigation and mission command topics of every twin
pub(crate) async fn subscribe_commands(supervisor: Arc<DeviceSupervisor>) -> Result<(), EdgeError> {
    let core = supervisor.core();
    for twin_uuid in core.twin_ids() {
        core.subscribe_navigate_command(
            &twin_uuid,
            route(&supervisor, &twin_uuid, CommandTopic::Navigate),
        )
        .await?;
        core.subscribe_mission_command(
            &twin_uuid,
            route(&supervisor, &twin_uuid, CommandTopic::Mission),
        )
        .await?;
        info!("Subscribed to commands for twin {}", twin_uuid);
    }
    Ok(())
}

/// Build a transport handler that runs the command on its own task.
///
/// The handler holds a weak reference so the transport does not keep the
/// supervisor alive.
fn route(supervisor: &Arc<DeviceSupervisor>, twin_uuid: &str, topic: CommandTopic) -> MessageHandler {
    let supervisor = Arc::downgrade(supervisor);
    let twin_uuid = twin_uuid.to_string();
    Arc::new(move |payload: Value| {
        let supervisor: Weak<DeviceSupervisor> = supervisor.clone();
        let twin_uuid = twin_uuid.clone();
        tokio::spawn(async move {
            let Some(supervisor) = supervisor.upgrade() else {
                debug!("Supervisor gone, dropping {:?} command", topic);
                return;
            };
            let ctx = HandlerContext::new(&supervisor, &twin_uuid);
            let result = match topic {
                CommandTopic::Navigate => handlers::handle_navigate_command(&ctx, payload).await,
                CommandTopic::Mission => handlers::handle_mission_command(&ctx, payload).await,
            };
            log_result(topic, &twin_uuid, &result);
        });
    })
}

fn log_result(topic: CommandTopic, twin_uuid: &str, result: &CommandResult) {
    match result {
        CommandResult::Completed { message } => {
            info!("{:?} command for {} completed: {}", topic, twin_uuid, message)
        }
        CommandResult::Failed { message } => {
            warn!("{:?} command for {} failed: {}", topic, twin_uuid, message)
        }
        CommandResult::Rejected { message } => {
            warn!("{:?} command for {} rejected: {}", topic, twin_uuid, message)
        }
        CommandResult::Pending => debug!("{:?} command for {} pending", topic, twin_uuid),
    }
}

/// Drain adapter status updates in the order they were reported
pub(crate) async fn run_status_pump(
    supervisor: Arc<DeviceSupervisor>,
    mut updates: mpsc::UnboundedReceiver<StatusUpdate>,
) {
    while let Some(update) = updates.recv().await {
        handlers::handle_adapter_status(&supervisor, update).await;
    }
    debug!("Status channel closed");
}
