use std::sync::Arc;

use crate::db::Directory;
use crate::models::{AuditAction, CreateAuditLog};

/// Records user-management events. Failures are logged, never propagated:
/// an audit write must not undo a committed user change.
#[derive(Clone)]
pub struct AuditService {
    directory: Arc<dyn Directory>,
}

impl AuditService {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }

    pub async fn log(
        &self,
        actor_id: Option<i64>,
        action: AuditAction,
        user_id: i64,
        details: Option<serde_json::Value>,
    ) {
        let entry = CreateAuditLog {
            actor_id,
            action,
            user_id,
            details,
        };

        if let Err(e) = self.directory.record_audit(entry).await {
            tracing::warn!(
                action = action.as_str(),
                user_id,
                "Failed to write audit log: {}",
                e
            );
        }
    }
}
