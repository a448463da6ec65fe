use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;

use reportbridge_config::AppConfig;
use reportbridge_notion::NotionClient;
use reportbridge_runtime::{FormLayout, SchemaLoader};

fn status<T, E: Display>(result: Result<T, E>) -> String {
    match result {
        Ok(_) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}

pub async fn run_doctor(config: &AppConfig, config_path: &Path) -> Result<()> {
    println!("reportbridge doctor");
    println!(
        "- config file: {}{}",
        config_path.display(),
        if config_path.exists() { "" } else { " (missing, using defaults)" }
    );
    println!("- discord token: {}", status(config.discord_token()));
    println!("- discord application id: {}", status(config.application_id()));
    println!("- discord public key: {}", status(config.public_key()));
    println!("- notion token: {}", status(config.notion_token()));
    println!("- interactions endpoint: {}", config.discord.interactions_bind);

    let form = config.form_settings();
    println!("- report form: {}", status(form.as_ref()));
    match config.poller_settings() {
        Ok(poller) => println!(
            "- change poller: ok ({} collections every {}s, {} records per query)",
            poller.monitored_databases.len(),
            poller.interval.as_secs(),
            poller.page_size
        ),
        Err(err) => println!("- change poller: {err}"),
    }

    let (Ok(form), Ok(token)) = (form, config.notion_token()) else {
        return Ok(());
    };
    let client = NotionClient::new(
        token,
        config.notion.api_version.clone(),
        config.request_timeout(),
    )?;
    match SchemaLoader::new(Arc::new(client)).load(&form.database_id).await {
        Ok(schema) => {
            let layout = FormLayout::build(&schema);
            println!("── form fields ──────────────────────────────────────");
            for field in &schema.fields {
                let shown = if layout.field(&field.id).is_some() {
                    "shown"
                } else {
                    "not shown"
                };
                println!("  {} [{}] {shown}", field.id, field.kind);
            }
            println!("  title field: {}", layout.title_field);
        }
        Err(err) => println!("- schema: {err}"),
    }
    Ok(())
}
