mod cli;

use std::sync::Arc;

use anyhow::{Result, bail};
use clap::Parser;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, info};

use becomelog_client::config::{dev_auth_token, env_var, resolve_api_url_with_override};
use becomelog_client::{ApiClient, AppConfig, AuthSession, FileTokenStore};
use becomelog_token::user_info_from_token;
use becomelog_types::entry::EntryPatch;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Logs go to stderr; stdout carries command output only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "becomelog_cli=info,becomelog_client=warn".into()),
        )
        .init();

    let cli = Cli::parse();

    // Config
    let config = match &cli.config {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            Some(AppConfig::load(path)?)
        }
        None => None,
    };
    let api_url = resolve_api_url_with_override(cli.api_url.as_deref(), config.as_ref(), env_var);

    let store = Arc::new(FileTokenStore::new(&cli.data_dir));
    let session = AuthSession::new(store, dev_auth_token(env_var));
    let api = ApiClient::new(api_url, session);

    run(cli.command, &api).await
}

async fn run(command: Command, api: &ApiClient) -> Result<()> {
    let session = api.session();

    match command {
        Command::Health => print_json(&api.check_health().await?),
        Command::List { limit } => print_json(&api.list_entries(limit).await?),
        Command::Get { entry_id } => print_json(&api.get_entry(&entry_id).await?),
        Command::Create(args) => {
            let entry = api.create_entry(&args.into()).await?;
            info!("Created entry {}", entry.entry_id.as_deref().unwrap_or("?"));
            print_json(&entry)
        }
        Command::Update { entry_id, fields } => {
            let patch = EntryPatch::from(fields);
            if patch.is_empty() {
                bail!("Nothing to update: pass at least one field");
            }
            print_json(&api.update_entry(&entry_id, &patch).await?)
        }
        Command::Delete { entry_id } => {
            api.delete_entry(&entry_id).await?;
            print_json(&json!({ "deleted": entry_id }))
        }
        Command::Login { token } => {
            session.set_token_async(Some(token)).await;
            print_json(&json!({ "status": session.status() }))
        }
        Command::Logout => {
            session.clear();
            print_json(&json!({ "status": session.status() }))
        }
        Command::Whoami => {
            let Some(token) = session.token_async().await else {
                bail!("Not logged in");
            };
            match user_info_from_token(&token) {
                Some(info) => print_json(&info),
                None => bail!("Current token is not a decodable JWT"),
            }
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
