// server/src/cli/mod.rs

pub mod commands;
pub mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use hms_lib::config::LoggingConfig;
use hms_lib::services::NotificationRouting;
use hms_lib::{create_store, AppConfig, HospitalServices, SystemClock};
use rest_api::AppState;
use security::{AccountService, Authorizer, Permission};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use commands::{CliArgs, Commands};

/// Installs the global subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    let result = if logging.json {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };
    if let Err(e) = result {
        eprintln!("Warning: tracing subscriber already installed: {}", e);
    }
}

/// Opens the configured store and wires every service to it.
pub fn build_state(config: &AppConfig) -> Result<AppState> {
    let store = create_store(&config.storage)
        .with_context(|| format!("Failed to open {} store", config.storage.engine))?;
    let clock = Arc::new(SystemClock);
    let authorizer = Authorizer::from_file(config.security.roles_file.as_deref())
        .context("Failed to load role permissions")?;
    let routing = NotificationRouting {
        discharge_approvers: authorizer.roles_with(Permission::ApproveDischarge),
        stock_watchers: authorizer.roles_with(Permission::ManageInventory),
    };
    let accounts = AccountService::new(store.clone(), clock.clone(), &config.security);
    let services = HospitalServices::new(
        store,
        clock,
        config.billing.clone(),
        routing,
        Arc::new(accounts.clone()),
    );
    Ok(AppState { services, accounts, authorizer })
}

pub async fn start_cli() -> Result<()> {
    let args = CliArgs::parse();
    let config = AppConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);
    let state = build_state(&config)?;

    match args.command {
        Commands::Serve { port } => handlers::serve(&config, state, port).await,
        Commands::Seed { admin_email, admin_password, admin_name } => {
            handlers::seed(&state, &admin_email, &admin_password, &admin_name).await
        }
        Commands::Accrue => handlers::accrue(&state).await,
        Commands::Report { kind, format, out, from, to } => {
            handlers::report(&state, kind.into(), format, &out, from, to).await
        }
    }
}
