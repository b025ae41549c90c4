//! Navigation command handler (goto, path, stop, pause, resume)

use edge_shared::messages::{NavCommandKind, NavigateCommand};
use edge_shared::{ActionRecord, AdapterError, DeviceAdapter, NavigationStatus};
use serde_json::Value;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::HandlerContext;
use crate::command::CommandResult;

/// Status message published when a command is first acknowledged
const RECEIVED_MESSAGE: &str = "Command received";

/// Handle a `navigate/command` message.
///
/// The action is tracked and acknowledged as `queued` before the adapter is
/// called. A rejection or adapter error publishes `failed` and drops the
/// action again. A payload that does not parse is reported as `failed` when
/// it carries an `action_id`. Never propagates errors.
pub async fn handle_navigate_command(ctx: &HandlerContext<'_>, payload: Value) -> CommandResult {
    let supervisor = ctx.supervisor;
    let core = supervisor.core();

    let Some(adapter) = supervisor.adapter().cloned() else {
        error!("No adapter configured, cannot handle navigation command");
        return CommandResult::Rejected {
            message: "No adapter configured".into(),
        };
    };

    let command: NavigateCommand = match serde_json::from_value(payload.clone()) {
        Ok(command) => command,
        Err(e) => {
            warn!("Malformed navigation command for twin {}: {}", ctx.twin_uuid, e);
            let message = format!("Malformed command: {}", e);
            // Report back when the sender gave us an id to report against
            if let Some(action_id) = payload
                .get("action_id")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
            {
                core.publish_nav_status(
                    ctx.twin_uuid,
                    action_id,
                    NavigationStatus::Failed,
                    Some(&message),
                    None,
                )
                .await;
            }
            return CommandResult::Rejected { message };
        }
    };

    let action_id = command
        .action_id()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let kind = command.kind();
    info!("Navigation command: {} (action_id={})", kind, action_id);

    let record = ActionRecord::queued(&action_id, ctx.twin_uuid, kind.as_str(), payload)
        .with_mission(command.mission_execution_uuid());
    // A control command may reuse the id of the motion it targets; that record stays
    let owns_record = if kind.is_control() {
        supervisor.actions().track_if_absent(record).await
    } else {
        supervisor.actions().track(record).await;
        true
    };

    core.publish_nav_status(
        ctx.twin_uuid,
        &action_id,
        NavigationStatus::Queued,
        Some(RECEIVED_MESSAGE),
        None,
    )
    .await;

    match dispatch(adapter.as_ref(), &action_id, &kind, &command).await {
        Ok(CommandResult::Rejected { message }) => {
            core.publish_nav_status(
                ctx.twin_uuid,
                &action_id,
                NavigationStatus::Failed,
                Some(&message),
                None,
            )
            .await;
            if owns_record {
                supervisor.actions().remove(&action_id).await;
            }
            CommandResult::Rejected { message }
        }
        Ok(result) => {
            // Control acknowledgements get no terminal status of their own
            if kind.is_control() && owns_record {
                supervisor.actions().remove(&action_id).await;
            }
            result
        }
        Err(e) => {
            error!("Navigation command error: {}", e);
            let message = e.to_string();
            core.publish_nav_status(
                ctx.twin_uuid,
                &action_id,
                NavigationStatus::Failed,
                Some(&message),
                None,
            )
            .await;
            if owns_record {
                supervisor.actions().remove(&action_id).await;
            }
            CommandResult::Failed { message }
        }
    }
}

async fn dispatch(
    adapter: &dyn DeviceAdapter,
    action_id: &str,
    kind: &NavCommandKind,
    command: &NavigateCommand,
) -> Result<CommandResult, AdapterError> {
    let result = match kind {
        NavCommandKind::Stop => {
            adapter.cancel_navigation(action_id).await?;
            CommandResult::Completed {
                message: "Cancel requested".into(),
            }
        }
        NavCommandKind::Pause => {
            adapter.pause_navigation().await?;
            CommandResult::Completed {
                message: "Pause requested".into(),
            }
        }
        NavCommandKind::Resume => {
            adapter.resume_navigation().await?;
            CommandResult::Completed {
                message: "Resume requested".into(),
            }
        }
        // goto, path, or other navigation commands
        NavCommandKind::Goto | NavCommandKind::Path | NavCommandKind::Other(_) => {
            if adapter.send_navigation_command(command.to_request(action_id)).await? {
                CommandResult::Pending
            } else {
                CommandResult::Rejected {
                    message: "Adapter rejected command".into(),
                }
            }
        }
    };
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{harness, MockAdapter};
    use serde_json::json;

    #[tokio::test]
    async fn test_goto_without_action_id_is_queued() {
        let mock = MockAdapter::new();
        let (supervisor, transport) = harness(Some(mock.clone()), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result =
            handle_navigate_command(&ctx, json!({"command": "goto", "position": {"x": 1, "y": 2, "z": 0}}))
                .await;
        assert!(matches!(result, CommandResult::Pending));

        let statuses = transport.published_on("cyberwave/twin/T1/navigate/status");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0]["status"], "queued");
        assert_eq!(statuses[0]["message"], "Command received");

        let action_id = statuses[0]["action_id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&action_id).is_ok());

        let record = supervisor.actions().get(&action_id).await.unwrap();
        assert_eq!(record.status, NavigationStatus::Queued);
        assert_eq!(record.twin_uuid, "T1");
        assert_eq!(record.command, "goto");

        let sent = mock.sent_requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].action_id, action_id);
        assert_eq!(sent[0].position.map(|p| p.y), Some(2.0));
    }

    #[tokio::test]
    async fn test_rejected_goto_publishes_one_failure() {
        let mock = MockAdapter::new();
        mock.set_accept_commands(false);
        let (supervisor, transport) = harness(Some(mock.clone()), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result = handle_navigate_command(
            &ctx,
            json!({"action_id": "a-1", "command": "goto", "position": {"x": 1, "y": 1}}),
        )
        .await;
        assert!(matches!(result, CommandResult::Rejected { .. }));

        let statuses = transport.published_on("cyberwave/twin/T1/navigate/status");
        let failed: Vec<_> = statuses.iter().filter(|s| s["status"] == "failed").collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["message"], "Adapter rejected command");
        assert!(supervisor.actions().is_empty().await);
    }

    #[tokio::test]
    async fn test_adapter_error_publishes_error_text() {
        let mock = MockAdapter::new();
        mock.set_fail_commands(true);
        let (supervisor, transport) = harness(Some(mock.clone()), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result = handle_navigate_command(&ctx, json!({"action_id": "a-2", "command": "stop"})).await;
        assert!(matches!(result, CommandResult::Failed { .. }));

        let statuses = transport.published_on("cyberwave/twin/T1/navigate/status");
        assert_eq!(statuses.len(), 2);
        assert_eq!(statuses[1]["status"], "failed");
        assert_eq!(statuses[1]["message"], "Command failed: mock command failure");
        assert!(!supervisor.actions().contains("a-2").await);
    }

    #[tokio::test]
    async fn test_stop_pause_resume_route_to_adapter() {
        let mock = MockAdapter::new();
        let (supervisor, _transport) = harness(Some(mock.clone()), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        handle_navigate_command(&ctx, json!({"action_id": "a-3", "command": "stop"})).await;
        handle_navigate_command(&ctx, json!({"command": "pause"})).await;
        handle_navigate_command(&ctx, json!({"command": "resume"})).await;

        assert_eq!(
            mock.calls(),
            vec!["cancel:a-3".to_string(), "pause".to_string(), "resume".to_string()]
        );
        assert!(mock.sent_requests().is_empty());
        // Control commands leave nothing tracked once the adapter accepts them
        assert!(supervisor.actions().is_empty().await);
    }

    #[tokio::test]
    async fn test_stop_keeps_targeted_goto_tracked() {
        let mock = MockAdapter::new();
        let (supervisor, transport) = harness(Some(mock.clone()), &["T1", "T2"]).await;

        let goto = HandlerContext::new(&supervisor, "T2");
        handle_navigate_command(&goto, json!({"action_id": "a-5", "command": "goto", "position": {"x": 3, "y": 0}}))
            .await;

        let stop = HandlerContext::new(&supervisor, "T1");
        let result = handle_navigate_command(&stop, json!({"action_id": "a-5", "command": "stop"})).await;
        assert!(matches!(result, CommandResult::Completed { .. }));
        assert_eq!(mock.calls(), vec!["cancel:a-5".to_string()]);

        let record = supervisor.actions().get("a-5").await.unwrap();
        assert_eq!(record.command, "goto");
        assert_eq!(record.twin_uuid, "T2");
        assert_eq!(transport.published_on("cyberwave/twin/T1/navigate/status")[0]["status"], "queued");
    }

    #[tokio::test]
    async fn test_malformed_command_with_id_reports_failure() {
        let mock = MockAdapter::new();
        let (supervisor, transport) = harness(Some(mock.clone()), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result = handle_navigate_command(&ctx, json!({"action_id": "a-1", "yaw": "north"})).await;
        assert!(matches!(result, CommandResult::Rejected { .. }));

        let statuses = transport.published_on("cyberwave/twin/T1/navigate/status");
        assert_eq!(statuses.len(), 1);
        assert_eq!(statuses[0]["action_id"], "a-1");
        assert_eq!(statuses[0]["status"], "failed");
        assert!(statuses[0]["message"].as_str().unwrap().starts_with("Malformed command:"));
        assert!(supervisor.actions().is_empty().await);
        assert!(mock.sent_requests().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_command_without_id_is_silent() {
        let mock = MockAdapter::new();
        let (supervisor, transport) = harness(Some(mock), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result = handle_navigate_command(&ctx, json!({"yaw": "north"})).await;
        assert!(matches!(result, CommandResult::Rejected { .. }));
        assert!(transport.published().is_empty());
    }

    #[tokio::test]
    async fn test_no_adapter_ignores_command() {
        let (supervisor, transport) = harness(None, &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        let result = handle_navigate_command(&ctx, json!({"command": "goto"})).await;
        assert!(matches!(result, CommandResult::Rejected { .. }));
        assert!(transport.published().is_empty());
        assert!(supervisor.actions().is_empty().await);
    }

    #[tokio::test]
    async fn test_mission_uuid_recorded() {
        let mock = MockAdapter::new();
        let (supervisor, _transport) = harness(Some(mock), &["T1"]).await;
        let ctx = HandlerContext::new(&supervisor, "T1");

        handle_navigate_command(
            &ctx,
            json!({"action_id": "a-4", "position": {"x": 0, "y": 0}, "metadata": {"mission_execution_uuid": "m-1"}}),
        )
        .await;

        let record = supervisor.actions().get("a-4").await.unwrap();
        assert_eq!(record.mission_execution_uuid.as_deref(), Some("m-1"));
    }
}
