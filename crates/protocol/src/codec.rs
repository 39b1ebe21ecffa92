use agora_domain::{Error, Result};

use crate::command::ClientCommand;
use crate::event::ServerEvent;

/// Decode and validate one inbound frame.
///
/// Failures map to [`Error::Protocol`]; the caller replies
/// `ERROR{message}` and keeps the connection open.
pub fn decode_command(raw: &str) -> Result<ClientCommand> {
    let cmd: ClientCommand =
        serde_json::from_str(raw).map_err(|e| Error::Protocol(format!("bad frame: {e}")))?;
    validate(&cmd)?;
    Ok(cmd)
}

/// Encode an outbound event as one JSON frame.
pub fn encode_event(event: &ServerEvent) -> Result<String> {
    serde_json::to_string(event).map_err(Error::Json)
}

/// Decode a server event (bus ingress and test clients).
pub fn decode_event(raw: &str) -> Result<ServerEvent> {
    serde_json::from_str(raw).map_err(|e| Error::Protocol(format!("bad event frame: {e}")))
}

/// Range and shape checks serde cannot express.
fn validate(cmd: &ClientCommand) -> Result<()> {
    match cmd {
        ClientCommand::Join {
            agent_id,
            agent_name,
            ..
        } => {
            require_nonempty("agentId", agent_id)?;
            require_nonempty("agentName", agent_name)?;
        }
        ClientCommand::Leave { agent_id, .. }
        | ClientCommand::LeaveRoom { agent_id, .. }
        | ClientCommand::ListTools { agent_id, .. } => {
            require_nonempty("agentId", agent_id)?;
        }
        ClientCommand::Message {
            agent_id, content, ..
        } => {
            require_nonempty("agentId", agent_id)?;
            require_nonempty("content", content)?;
        }
        ClientCommand::CreateRoom { topic, .. } => {
            require_nonempty("topic", topic)?;
        }
        ClientCommand::ListRooms { .. } => {}
        ClientCommand::CreateProposal {
            agent_id,
            title,
            threshold,
            ..
        } => {
            require_nonempty("agentId", agent_id)?;
            require_nonempty("title", title)?;
            if let Some(t) = threshold {
                if !(0.0..=1.0).contains(t) || t.is_nan() {
                    return Err(Error::Protocol(format!(
                        "threshold must be in [0, 1], got {t}"
                    )));
                }
            }
        }
        ClientCommand::Vote {
            agent_id,
            proposal_id,
            ..
        } => {
            require_nonempty("agentId", agent_id)?;
            require_nonempty("proposalId", proposal_id)?;
        }
        ClientCommand::UpdateMetadata { agent_id, .. } => {
            require_nonempty("agentId", agent_id)?;
        }
        ClientCommand::InvokeTool { agent_id, tool, .. } => {
            require_nonempty("agentId", agent_id)?;
            require_nonempty("tool", tool)?;
        }
    }
    Ok(())
}

fn require_nonempty(field: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(Error::Protocol(format!("{field} must not be empty")));
    }
    Ok(())
}
