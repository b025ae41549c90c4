//! Mission command handler (cancel, pause, resume)
//!
//! Missions are orchestrated by the platform, which drives the robot through
//! individual navigation commands. The edge only reacts to control verbs.

use edge_shared::messages::{MissionCommand, MissionCommandKind};
use serde_json::Value;
use tracing::{info, warn};

use super::HandlerContext;
use crate::command::CommandResult;

pub async fn handle_mission_command(ctx: &HandlerContext<'_>, payload: Value) -> CommandResult {
    let command: MissionCommand = match serde_json::from_value(payload) {
        Ok(command) => command,
        Err(e) => {
            warn!("Malformed mission command for twin {}: {}", ctx.twin_uuid, e);
            return CommandResult::Rejected {
                message: format!("Malformed command: {}", e),
            };
        }
    };

    info!(
        "Mission command: {:?} (mission={:?})",
        command.command, command.mission_execution_uuid
    );

    let Some(adapter) = ctx.supervisor.adapter() else {
        warn!("No adapter configured, ignoring mission command");
        return CommandResult::Rejected {
            message: "No adapter configured".into(),
        };
    };

    match command.kind() {
        MissionCommandKind::Cancel => {
            let Some(mission) = command.mission_execution_uuid.filter(|m| !m.is_empty()) else {
                return CommandResult::Rejected {
                    message: "Mission cancel requires mission_execution_uuid".into(),
                };
            };

            let action_ids = ctx.supervisor.actions().for_mission(&mission).await;
            for action_id in &action_ids {
                if let Err(e) = adapter.cancel_navigation(action_id).await {
                    warn!("Failed to cancel action {} of mission {}: {}", action_id, mission, e);
                }
            }
            CommandResult::Completed {
                message: format!("Cancel requested for {} action(s)", action_ids.len()),
            }
        }
        MissionCommandKind::Pause => match adapter.pause_navigation().await {
            Ok(_) => CommandResult::Completed {
                message: "Pause requested".into(),
            },
            Err(e) => CommandResult::Failed {
                message: e.to_string(),
            },
        },
        MissionCommandKind::Resume => match adapter.resume_navigation().await {
            Ok(_) => CommandResult::Completed {
                message: "Resume requested".into(),
            },
            Err(e) => CommandResult::Failed {
                message: e.to_string(),
            },
        },
        MissionCommandKind::Start | MissionCommandKind::Other(_) => CommandResult::Rejected {
            message: format!(
                "Mission command {:?} is handled by the platform",
                command.command.unwrap_or_default()
            ),
        },
    }
}
