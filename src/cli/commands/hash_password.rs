use serde_json::json;

use crate::auth::password;
use crate::cli::utils::output_success;
use crate::cli::OutputFormat;

/// Hash with the configured bcrypt cost, for seeding users by hand
pub fn handle(plain: &str, output_format: OutputFormat) -> anyhow::Result<()> {
    password::validate_password_policy(plain).map_err(anyhow::Error::msg)?;
    let hash = password::hash_password(plain)?;

    match output_format {
        OutputFormat::Text => {
            println!("{}", hash);
            Ok(())
        }
        OutputFormat::Json => output_success(&output_format, "Password hashed", Some(json!({ "hash": hash }))),
    }
}
