//! Strict pass/fail validation of caller-supplied topology and file paths.
//!
//! Unlike the best-effort text sanitizer, these checks reject the whole
//! operation before any state is touched.

use sessionvault_types::error::ValidationError;
use sessionvault_types::session::{ChannelState, ChannelType, ChatSession, ServerState, ServerType};

/// Validate a server about to be appended to `session`.
pub fn validate_server(server: &ServerState, session: &ChatSession) -> Result<(), ValidationError> {
    if server.server_id.as_str().trim().is_empty() {
        return Err(ValidationError::EmptyField("serverId"));
    }
    if session.server(&server.server_id).is_some() {
        return Err(ValidationError::DuplicateServer(server.server_id.to_string()));
    }

    match (server.server_type, &server.task_id) {
        (ServerType::Task, None) => {
            return Err(ValidationError::MissingTaskId(server.server_id.to_string()));
        }
        (ServerType::Task, Some(task_id)) => {
            if task_id.as_str().trim().is_empty() {
                return Err(ValidationError::MissingTaskId(server.server_id.to_string()));
            }
            if session.task_server(task_id).is_some() {
                return Err(ValidationError::DuplicateTask(task_id.to_string()));
            }
        }
        (ServerType::Regular, Some(_)) => {
            return Err(ValidationError::UnexpectedTaskId(server.server_id.to_string()));
        }
        (ServerType::Regular, None) => {}
    }

    for (i, channel) in server.channels.iter().enumerate() {
        validate_channel_shape(channel)?;
        if server.channels[..i]
            .iter()
            .any(|c| c.channel_id == channel.channel_id)
        {
            return Err(ValidationError::DuplicateChannel(channel.channel_id.to_string()));
        }
    }
    Ok(())
}

/// Validate a channel about to be appended to `server`.
pub fn validate_channel(channel: &ChannelState, server: &ServerState) -> Result<(), ValidationError> {
    validate_channel_shape(channel)?;
    if server.channel(&channel.channel_id).is_some() {
        return Err(ValidationError::DuplicateChannel(channel.channel_id.to_string()));
    }
    Ok(())
}

fn validate_channel_shape(channel: &ChannelState) -> Result<(), ValidationError> {
    if channel.channel_id.as_str().trim().is_empty() {
        return Err(ValidationError::EmptyField("channelId"));
    }
    let has_role = channel
        .agent_role
        .as_deref()
        .is_some_and(|role| !role.trim().is_empty());
    match channel.channel_type {
        ChannelType::Agent if !has_role => Err(ValidationError::MissingAgentRole(
            channel.channel_id.to_string(),
        )),
        ChannelType::Agent => Ok(()),
        _ if channel.agent_role.is_some() => Err(ValidationError::UnexpectedAgentRole(
            channel.channel_id.to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validate every path of a file context.
///
/// Rejects `..` path segments (either separator) and angle-bracket markup.
pub fn validate_file_paths(paths: &[String]) -> Result<(), ValidationError> {
    if paths.is_empty() {
        return Err(ValidationError::EmptyPaths);
    }
    for path in paths {
        validate_file_path(path)?;
    }
    Ok(())
}

fn validate_file_path(path: &str) -> Result<(), ValidationError> {
    if path.trim().is_empty() {
        return Err(ValidationError::EmptyField("filePath"));
    }
    if path.contains('<') || path.contains('>') {
        return Err(ValidationError::PathMarkup(path.to_string()));
    }
    if path.split(['/', '\\']).any(|segment| segment == "..") {
        return Err(ValidationError::PathTraversal(path.to_string()));
    }
    Ok(())
}
