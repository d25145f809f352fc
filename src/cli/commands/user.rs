use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::database::DatabaseManager;
use crate::permissions::Role;
use crate::services::user_service::{self, CreateUserRequest, UserService};

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user account")]
    Create {
        #[arg(long, help = "Login email")]
        email: String,

        #[arg(long, help = "Display name")]
        name: String,

        #[arg(long, help = "Initial password")]
        password: String,

        #[arg(long, default_value = "user", help = "Role: admin or user")]
        role: Role,
    },

    #[command(about = "Set a new password for an existing user")]
    SetPassword {
        #[arg(long, help = "Login email")]
        email: String,

        #[arg(long, help = "New password")]
        password: String,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    let result = match cmd {
        UserCommands::Create {
            email,
            name,
            password,
            role,
        } => {
            let created = UserService::new()?
                .create(CreateUserRequest {
                    name,
                    email,
                    password,
                    role: Some(role),
                    active: true,
                })
                .await?;
            output_success(
                &output_format,
                &format!("Created user {}", created.user.email),
                Some(json!({ "id": created.user.id, "role": created.user.role })),
            )
        }
        UserCommands::SetPassword { email, password } => {
            let pool = DatabaseManager::pool()?;
            let mut conn = DatabaseManager::acquire(&pool).await?;
            if !user_service::set_password(&mut conn, &email, &password).await? {
                anyhow::bail!("No user with email {}", email);
            }
            output_success(&output_format, &format!("Password updated for {}", email), None)
        }
    };

    DatabaseManager::close().await;
    result
}
