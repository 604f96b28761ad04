use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder};

use super::Directory;
use crate::error::{AppError, Result};
use crate::models::{
    Actor, CreateAuditLog, Organization, OrganizationQuery, OrganizationScope, Role, User, UserWrite,
};

/// Postgres-backed directory
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Escape LIKE wildcards so the search term matches literally
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn map_unique_violation(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(ref db_err) = e {
        if db_err.constraint() == Some("users_email_unique") {
            return AppError::Conflict("Email already exists".to_string());
        }
    }
    AppError::Database(e)
}

#[async_trait]
impl Directory for PgDirectory {
    async fn load_actor(&self, user_id: i64) -> Result<Option<Actor>> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        if exists.is_none() {
            return Ok(None);
        }

        let roles: Vec<String> = sqlx::query_scalar(
            r#"
            SELECT r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let organization_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT organization_id FROM organization_user WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Actor {
            id: user_id,
            roles: roles.into_iter().collect(),
            organization_ids: organization_ids.into_iter().collect::<BTreeSet<_>>(),
        }))
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>("SELECT id, name FROM roles ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(roles)
    }

    async fn find_role(&self, role_id: i64) -> Result<Option<Role>> {
        let role = sqlx::query_as::<_, Role>("SELECT id, name FROM roles WHERE id = $1")
            .bind(role_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(role)
    }

    async fn find_organizations(&self, query: &OrganizationQuery) -> Result<Vec<Organization>> {
        let mut qb: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT id, name FROM organizations WHERE ");

        match &query.scope {
            OrganizationScope::Nothing => return Ok(Vec::new()),
            OrganizationScope::All => {
                qb.push("TRUE");
            }
            OrganizationScope::Only(ids) => {
                if ids.is_empty() {
                    return Ok(Vec::new());
                }
                qb.push("id = ANY(")
                    .push_bind(ids.iter().copied().collect::<Vec<i64>>())
                    .push(")");
            }
        }

        if let Some(ref term) = query.search {
            qb.push(" AND name ILIKE ").push_bind(like_pattern(term));
        }

        if let Some(ref ids) = query.ids {
            qb.push(" AND id = ANY(").push_bind(ids.clone()).push(")");
        }

        qb.push(" ORDER BY LOWER(name), id");

        if let Some(limit) = query.limit {
            qb.push(" LIMIT ").push_bind(limit);
        }

        let organizations = qb
            .build_query_as::<Organization>()
            .fetch_all(&self.pool)
            .await?;

        Ok(organizations)
    }

    async fn email_taken(&self, email: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE email = $1 AND ($2::BIGINT IS NULL OR id <> $2)",
        )
        .bind(email)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn find_user(&self, user_id: i64) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    async fn save_user(&self, write: UserWrite) -> Result<User> {
        let mut tx = self.pool.begin().await?;

        let user = match write.id {
            None => {
                let password_hash = write.password_hash.ok_or_else(|| {
                    AppError::Internal(anyhow::anyhow!("password hash required for new users"))
                })?;

                sqlx::query_as::<_, User>(
                    r#"
                    INSERT INTO users (name, email, password)
                    VALUES ($1, $2, $3)
                    RETURNING *
                    "#,
                )
                .bind(&write.name)
                .bind(&write.email)
                .bind(password_hash)
                .fetch_one(tx.as_mut())
                .await
                .map_err(map_unique_violation)?
            }
            Some(id) => sqlx::query_as::<_, User>(
                r#"
                UPDATE users
                SET name = $2,
                    email = $3,
                    password = COALESCE($4, password),
                    updated_at = NOW()
                WHERE id = $1
                RETURNING *
                "#,
            )
            .bind(id)
            .bind(&write.name)
            .bind(&write.email)
            .bind(write.password_hash)
            .fetch_optional(tx.as_mut())
            .await
            .map_err(map_unique_violation)?
            .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?,
        };

        // Links outside the writer's scope stay untouched
        match &write.organization_scope {
            OrganizationScope::Nothing => {}
            OrganizationScope::All => {
                sqlx::query("DELETE FROM organization_user WHERE user_id = $1")
                    .bind(user.id)
                    .execute(tx.as_mut())
                    .await?;
            }
            OrganizationScope::Only(ids) => {
                sqlx::query(
                    "DELETE FROM organization_user WHERE user_id = $1 AND organization_id = ANY($2)",
                )
                .bind(user.id)
                .bind(ids.iter().copied().collect::<Vec<i64>>())
                .execute(tx.as_mut())
                .await?;
            }
        }

        let organization_ids: Vec<i64> = write
            .organization_ids
            .iter()
            .copied()
            .filter(|id| write.organization_scope.permits(*id))
            .collect::<BTreeSet<i64>>()
            .into_iter()
            .collect();

        if !organization_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO organization_user (organization_id, user_id)
                SELECT UNNEST($1::BIGINT[]), $2
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(&organization_ids)
            .bind(user.id)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;

        Ok(user)
    }

    async fn user_roles(&self, user_id: i64) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            r#"
            SELECT r.id, r.name
            FROM roles r
            JOIN user_roles ur ON ur.role_id = r.id
            WHERE ur.user_id = $1
            ORDER BY r.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(roles)
    }

    async fn sync_roles(&self, user_id: i64, role_ids: &[i64]) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
            .bind(user_id)
            .execute(tx.as_mut())
            .await?;

        if !role_ids.is_empty() {
            sqlx::query(
                r#"
                INSERT INTO user_roles (user_id, role_id)
                SELECT $1, UNNEST($2::BIGINT[])
                "#,
            )
            .bind(user_id)
            .bind(role_ids)
            .execute(tx.as_mut())
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    async fn remove_role(&self, user_id: i64, role_name: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM user_roles
            WHERE user_id = $1
            AND role_id IN (SELECT id FROM roles WHERE name = $2)
            "#,
        )
        .bind(user_id)
        .bind(role_name)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn user_organizations(&self, user_id: i64) -> Result<Vec<Organization>> {
        let organizations = sqlx::query_as::<_, Organization>(
            r#"
            SELECT o.id, o.name
            FROM organizations o
            JOIN organization_user ou ON ou.organization_id = o.id
            WHERE ou.user_id = $1
            ORDER BY LOWER(o.name), o.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(organizations)
    }

    async fn record_audit(&self, entry: CreateAuditLog) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (actor_id, action, user_id, details, created_at)
            VALUES ($1, $2, $3, $4, NOW())
            "#,
        )
        .bind(entry.actor_id)
        .bind(entry.action.as_str())
        .bind(entry.user_id)
        .bind(entry.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
