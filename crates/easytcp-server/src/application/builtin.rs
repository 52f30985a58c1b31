//! Stock request handlers installed by the `easytcp-server` binary.
//!
//! | Method  | Fields          | Reply                        |
//! |---------|-----------------|------------------------------|
//! | `echo`  | anything        | `echo` with the same fields  |
//! | `join`  | `group: string` | `joined {group, added}`      |
//! | `leave` | `group: string` | `left {group, removed}`      |

use std::sync::Arc;

use easytcp_core::Fields;
use serde_json::Value;

use crate::application::handlers::{require_str, HandlerError, HandlerRegistry, RegistrationError};
use crate::application::server::Server;
use crate::application::session::Session;

pub const ECHO: &str = "echo";
pub const JOIN: &str = "join";
pub const LEAVE: &str = "leave";

/// Registers `echo`, `join` and `leave` on `registry`.
///
/// # Errors
///
/// Never in practice; the names are not reserved.
pub fn register_builtin_handlers(registry: &mut HandlerRegistry) -> Result<(), RegistrationError> {
    registry.register_fn(ECHO, echo)?;
    registry.register_fn(JOIN, join)?;
    registry.register_fn(LEAVE, leave)?;
    Ok(())
}

async fn echo(_server: Arc<Server>, session: Arc<Session>, fields: Fields) -> Result<(), HandlerError> {
    session.send(ECHO, fields).await?;
    Ok(())
}

async fn join(server: Arc<Server>, session: Arc<Session>, fields: Fields) -> Result<(), HandlerError> {
    let group = require_str(&fields, "group")?;
    let added = server
        .join_group(&session, group)
        .await
        .map_err(|e| HandlerError::Failed(e.to_string()))?;

    session.send("joined", membership_reply(group, "added", added)).await?;
    Ok(())
}

async fn leave(server: Arc<Server>, session: Arc<Session>, fields: Fields) -> Result<(), HandlerError> {
    let group = require_str(&fields, "group")?;
    let removed = server
        .leave_group(&session, group)
        .await
        .map_err(|e| HandlerError::Failed(e.to_string()))?;

    session.send("left", membership_reply(group, "removed", removed)).await?;
    Ok(())
}

fn membership_reply(group: &str, flag: &str, value: bool) -> Fields {
    let mut reply = Fields::new();
    reply.insert("group".to_string(), Value::from(group));
    reply.insert(flag.to_string(), Value::from(value));
    reply
}
