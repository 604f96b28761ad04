use serde::Serialize;

#[derive(Debug, Clone)]
pub struct CreateAuditLog {
    pub actor_id: Option<i64>,
    pub action: AuditAction,
    pub user_id: i64,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    CreateUser,
    UpdateUser,
    AssignRole,
    ClearRole,
    // Escalation attempts
    RefuseRole,
    RevokeSuperAdmin,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CreateUser => "create_user",
            AuditAction::UpdateUser => "update_user",
            AuditAction::AssignRole => "assign_role",
            AuditAction::ClearRole => "clear_role",
            AuditAction::RefuseRole => "refuse_role",
            AuditAction::RevokeSuperAdmin => "revoke_super_admin",
        }
    }
}
