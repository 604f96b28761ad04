//! Database seed script for roles and the initial super-admin account
//! Run with: cargo run --bin seed

use user_admin_api::config::Config;
use user_admin_api::db::Database;
use user_admin_api::middleware::auth::issue_token;
use user_admin_api::models::{ORGANIZATION_MANAGER, SUPER_ADMIN};
use user_admin_api::services::password::hash_password;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Connecting to database...");
    let db = Database::connect(&config).await?;
    db.run_migrations().await?;
    println!("Connected successfully!");

    for role in [SUPER_ADMIN, ORGANIZATION_MANAGER] {
        sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(role)
            .execute(&db.pg)
            .await?;
    }
    println!("Roles ensured: {}, {}", SUPER_ADMIN, ORGANIZATION_MANAGER);

    let email = std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@nova.app".to_string());
    let password = std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin@12345".to_string());
    let name = std::env::var("ADMIN_NAME").unwrap_or_else(|_| "Administrator".to_string());

    println!("Hashing password...");
    let password_hash = hash_password(&password)?;

    // Bootstrap bypasses the role guard: there is no super-admin yet to grant it
    let admin_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO users (name, email, password)
        VALUES ($1, $2, $3)
        ON CONFLICT (email) DO UPDATE SET password = EXCLUDED.password, updated_at = NOW()
        RETURNING id
        "#,
    )
    .bind(&name)
    .bind(&email)
    .bind(&password_hash)
    .fetch_one(&db.pg)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, role_id)
        SELECT $1, id FROM roles WHERE name = $2
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(admin_id)
    .bind(SUPER_ADMIN)
    .execute(&db.pg)
    .await?;

    println!("Super-admin ready!");
    println!("  Email: {}", email);
    println!("  Password: {}", password);

    let token = issue_token(&config.jwt.secret, admin_id, config.jwt.expiry_hours)?;
    println!("  Access token: {}", token);

    Ok(())
}
