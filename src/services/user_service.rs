// User service - create/edit users through validation, the role guard and the ceiling check
use std::borrow::Cow;
use std::collections::BTreeSet;
use std::sync::Arc;

use serde_json::json;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::db::Directory;
use crate::error::{AppError, Result};
use crate::models::{Actor, AuditAction, OrganizationQuery, UserDetail, UserInput, UserWrite};
use crate::services::password::hash_password;
use crate::services::scope::{organization_scope, organizations_required};
use crate::services::{AuditService, RoleGuard};
use crate::utils::mask_email;

pub struct UserService {
    directory: Arc<dyn Directory>,
    guard: RoleGuard,
    audit: AuditService,
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Borrowed(message));
    error
}

impl UserService {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self {
            guard: RoleGuard::new(directory.clone()),
            audit: AuditService::new(directory.clone()),
            directory,
        }
    }

    pub async fn get_user(&self, user_id: i64) -> Result<UserDetail> {
        let user = self
            .directory
            .find_user(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", user_id)))?;

        let role = self.directory.user_roles(user_id).await?.into_iter().next();
        let organizations = self.directory.user_organizations(user_id).await?;

        Ok(UserDetail {
            user,
            role,
            organizations,
        })
    }

    pub async fn create_user(&self, actor: Option<&Actor>, input: UserInput) -> Result<UserDetail> {
        self.save(actor, None, input).await
    }

    pub async fn update_user(
        &self,
        actor: Option<&Actor>,
        user_id: i64,
        input: UserInput,
    ) -> Result<UserDetail> {
        if self.directory.find_user(user_id).await?.is_none() {
            return Err(AppError::NotFound(format!("User {} not found", user_id)));
        }

        self.save(actor, Some(user_id), input).await
    }

    /// Validate the form against the actor's scope. Nothing is written on failure.
    pub async fn validate(
        &self,
        actor: Option<&Actor>,
        user_id: Option<i64>,
        input: &UserInput,
    ) -> Result<()> {
        let mut errors = match input.validate() {
            Ok(()) => ValidationErrors::new(),
            Err(errors) => errors,
        };

        if user_id.is_none() && input.password.is_none() {
            errors.add(
                "password",
                field_error("required", "The password field is required."),
            );
        }

        if !input.email.is_empty() && !self.guard.email_is_unique(&input.email, user_id).await? {
            errors.add(
                "email",
                field_error("unique", "The email has already been taken."),
            );
        }

        if organizations_required(actor) && input.organizations.is_empty() {
            errors.add(
                "organizations",
                field_error("required", "The organizations field is required."),
            );
        }

        if !self.organizations_acceptable(actor, user_id, input).await? {
            errors.add(
                "organizations",
                field_error("in", "The selected organizations are invalid."),
            );
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(errors))
        }
    }

    /// Every submitted id must be an existing organization in the actor's
    /// scope, or one the edited user already belongs to.
    async fn organizations_acceptable(
        &self,
        actor: Option<&Actor>,
        user_id: Option<i64>,
        input: &UserInput,
    ) -> Result<bool> {
        if input.organizations.is_empty() {
            return Ok(true);
        }

        let query =
            OrganizationQuery::new(organization_scope(actor)).ids(input.organizations.clone());
        let mut accepted: BTreeSet<i64> = self
            .directory
            .find_organizations(&query)
            .await?
            .into_iter()
            .map(|o| o.id)
            .collect();

        if let Some(user_id) = user_id {
            accepted.extend(
                self.directory
                    .user_organizations(user_id)
                    .await?
                    .into_iter()
                    .map(|o| o.id),
            );
        }

        Ok(input.organizations.iter().all(|id| accepted.contains(id)))
    }

    async fn save(
        &self,
        actor: Option<&Actor>,
        user_id: Option<i64>,
        input: UserInput,
    ) -> Result<UserDetail> {
        let input = input.normalized();
        self.validate(actor, user_id, &input).await?;

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;

        let user = self
            .directory
            .save_user(UserWrite {
                id: user_id,
                name: input.name.clone(),
                email: input.email.clone(),
                password_hash,
                organization_ids: input.organizations.clone(),
                organization_scope: organization_scope(actor),
            })
            .await?;

        self.guard.assign_role(actor, user.id, input.role).await?;
        self.guard.enforce_role_ceiling(actor, user.id).await?;

        let action = if user_id.is_some() {
            AuditAction::UpdateUser
        } else {
            AuditAction::CreateUser
        };
        self.audit
            .log(
                actor.map(|a| a.id),
                action,
                user.id,
                Some(json!({ "organizations": input.organizations })),
            )
            .await;

        tracing::info!(
            user_id = user.id,
            email = %mask_email(&user.email),
            action = action.as_str(),
            "User saved"
        );

        self.get_user(user.id).await
    }
}
