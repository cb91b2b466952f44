//! Household ledger command-line client
//!
//! Talks to the ledger backend API with a persisted session:
//! 1. `login` exchanges credentials for an access/refresh token pair
//! 2. every other command sends authenticated requests
//! 3. expired access tokens are refreshed transparently, once per burst
//! 4. an unrecoverable session clears credentials and asks for a new login

mod config;
mod household;
mod navigator;

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use auth_client::{AuthClient, ClientOptions};
use clap::{Parser, Subcommand};
use common::Secret;
use session_auth::CredentialStore;
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::household::{GROUP_PATH, Household, MEMBERS_PATH, USER_PATH, group_members};
use crate::navigator::{TerminalNavigator, location_for};

#[derive(Parser, Debug)]
#[command(name = "ledger")]
#[command(about = "Household ledger client with a persisted API session")]
#[command(version)]
struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./ledger.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the token pair
    Login {
        username: String,
        #[arg(long, env = "LEDGER_PASSWORD", hide_env_values = true, value_parser = parse_secret)]
        password: Option<Secret<String>>,
    },

    /// Forget stored credentials
    Logout,

    /// Show session state
    Status,

    /// GET an API path and print the response
    Get { path: String },

    /// Show the signed-in user
    Me,

    /// Show the current household group
    Group,

    /// List household members
    Members,
}

fn parse_secret(value: &str) -> std::result::Result<Secret<String>, std::convert::Infallible> {
    Ok(Secret::from(value))
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr),
        )
        .init();

    let config_path = Config::resolve_path(cli.config.as_deref());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        base_url = %config.api.base_url,
        credentials = %config.session.credentials_path.display(),
        "configuration loaded"
    );

    let store = CredentialStore::load(config.session.credentials_path.clone())
        .await
        .context("failed to load credentials")?;
    let navigator = Arc::new(TerminalNavigator::new("/"));
    let options = ClientOptions {
        base_url: config.api.base_url.clone(),
        timeout: config.timeout(),
        login_path: config.session.login_path.clone(),
    };
    let client = AuthClient::new(options, Arc::new(store), navigator.clone());

    match cli.command {
        Command::Login { username, password } => {
            let password = password
                .context("no password given: pass --password or set LEDGER_PASSWORD")?;
            client
                .login(&username, password.expose())
                .await
                .context("login failed")?;
            println!("signed in as {username}");
        }
        Command::Logout => {
            client.logout().await.context("logout failed")?;
            println!("signed out");
        }
        Command::Status => {
            let pair = client.store().get().await;
            println!("api:           {}", config.api.base_url);
            println!(
                "credentials:   {}",
                config.session.credentials_path.display()
            );
            println!("authenticated: {}", pair.access().is_some());
            println!("refreshable:   {}", pair.refresh().is_some());
        }
        Command::Get { path } => {
            navigator.visit(location_for(&path));
            let response = match client.get(&path).await {
                Ok(response) => response,
                Err(e) if e.is_session_loss() => bail!("not signed in: {e}"),
                Err(e) => return Err(e).with_context(|| format!("GET {path} failed")),
            };
            let status = response.status();
            let body = response
                .text()
                .await
                .with_context(|| format!("reading response body for {path}"))?;
            println!("{status}");
            match serde_json::from_str::<serde_json::Value>(&body) {
                Ok(json) => print_json(&json)?,
                Err(_) => println!("{body}"),
            }
        }
        Command::Me => {
            navigator.visit(location_for(USER_PATH));
            if let Some(user) = Household::new(client).fetch_user().await {
                print_json(&user)?;
            }
        }
        Command::Group => {
            navigator.visit(location_for(GROUP_PATH));
            if let Some(group) = Household::new(client).fetch_group().await {
                print_json(&group)?;
            }
        }
        Command::Members => {
            let household = Household::new(client.clone());
            navigator.visit(location_for(MEMBERS_PATH));
            let mut members = household.fetch_members().await;
            // The group payload lists its members too
            if members.is_none() && client.is_authenticated().await {
                navigator.visit(location_for(GROUP_PATH));
                members = household.fetch_group().await.map(|g| group_members(&g));
            }
            if let Some(members) = members {
                print_json(&serde_json::Value::Array(members))?;
            }
        }
    }

    Ok(())
}
