use clap::Args;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::permissions::Role;
use crate::services::permission_service;
use crate::services::user_service::{self, CreateUserRequest, UserService};

#[derive(Args)]
pub struct SeedArgs {
    #[arg(long, help = "Create an admin account with this email when none exists")]
    pub admin_email: Option<String>,

    #[arg(long, default_value = "Administrador", help = "Display name for the seeded admin")]
    pub admin_name: String,

    #[arg(long, env = "SEED_ADMIN_PASSWORD", help = "Password for the seeded admin")]
    pub admin_password: Option<String>,
}

pub async fn handle(args: SeedArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let pool = DatabaseManager::pool()?;
    let mut conn = DatabaseManager::acquire(&pool).await?;
    permission_service::seed_catalog(&mut conn).await?;

    let mut admin = json!(null);
    if let Some(email) = args.admin_email.as_deref() {
        if user_service::find_by_email(&mut conn, email).await?.is_some() {
            tracing::info!("Admin {} already exists, skipping", email);
        } else {
            let password = args
                .admin_password
                .ok_or_else(|| anyhow::anyhow!("--admin-password (or SEED_ADMIN_PASSWORD) is required with --admin-email"))?;
            let created = UserService::new()?
                .create(CreateUserRequest {
                    name: args.admin_name,
                    email: email.to_string(),
                    password,
                    role: Some(Role::Admin),
                    active: true,
                })
                .await?;
            admin = json!({ "id": created.user.id, "email": created.user.email });
        }
    }
    drop(conn);
    DatabaseManager::close().await;

    output_success(&output_format, "Module catalog seeded", Some(json!({ "admin": admin })))
}
