use std::path::{Path, PathBuf};

use clap::Parser;
use permissions_api::{
    AppState, build_app,
    config::PermissionsApiConfig,
    handler::USER_ID_PARAM,
    observability,
    registry::PermissionsRegistry,
    secrets,
};
use serde_json::json;

/// Key used by the local self-test when none is given.
const SELF_TEST_API_KEY: &str = "test-api-key-for-local-testing";
const SELF_TEST_USER_ID: &str = "analyst@denodo.com";

/// CLI arguments for the permissions API
#[derive(Parser, Debug)]
#[command(version, about = "Permissions lookup API", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run one invocation event through the handler and print the response
    Invoke {
        /// JSON event file (API-Gateway format). Overrides --user-id/--api-key.
        #[arg(short, long)]
        event: Option<PathBuf>,
        #[arg(long, default_value = SELF_TEST_USER_ID)]
        user_id: String,
        #[arg(long, default_value = SELF_TEST_API_KEY)]
        api_key: String,
    },
    /// Validate the configuration and permissions registry, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    match args.command {
        Some(Command::Invoke {
            event,
            user_id,
            api_key,
        }) => {
            run_invoke(args.config.as_deref(), event.as_deref(), user_id, api_key).await;
        }
        Some(Command::CheckConfig) => {
            run_check_config(args.config.as_deref());
        }
        Some(Command::Serve) | None => {
            run_server(args.config.as_deref()).await;
        }
    }
}

fn load_config(path: Option<&Path>) -> PermissionsApiConfig {
    let result = match path {
        Some(path) => PermissionsApiConfig::from_file(path),
        None => {
            let config = PermissionsApiConfig::default();
            config.validate().map(|()| config)
        }
    };

    match result {
        Ok(config) => config,
        Err(e) => {
            match path {
                Some(path) => eprintln!("Failed to load config from {}: {}", path.display(), e),
                None => eprintln!("Invalid default configuration: {}", e),
            }
            std::process::exit(1);
        }
    }
}

/// Install the subscriber, then report config warnings through it.
fn init_tracing(config: &PermissionsApiConfig) {
    if let Err(e) = observability::init_tracing(&config.observability) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }
}

async fn build_state(config: PermissionsApiConfig) -> AppState {
    match AppState::new(config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    }
}

async fn run_server(config_path: Option<&Path>) {
    let config = load_config(config_path);
    init_tracing(&config);

    tracing::info!(
        config_file = ?config_path,
        secrets = config.secrets.backend_name(),
        "Starting permissions API"
    );

    let state = build_state(config.clone()).await;
    let app = build_app(&config, state);

    let bind_addr = config.server.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind to address");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Server listening on http://{}{}/users/{{userId}}/permissions",
        bind_addr,
        config.server.route_prefix()
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        std::process::exit(1);
    }
}

/// Local self-test: feed one event through the handler and print the body.
async fn run_invoke(
    config_path: Option<&Path>,
    event_path: Option<&Path>,
    user_id: String,
    api_key: String,
) {
    let config = load_config(config_path);
    init_tracing(&config);

    let event = match event_path {
        Some(path) => {
            let parsed = std::fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<serde_json::Value>(&s).map_err(|e| e.to_string()));
            match parsed {
                Ok(event) => event,
                Err(e) => {
                    eprintln!("Failed to read event from {}: {}", path.display(), e);
                    std::process::exit(1);
                }
            }
        }
        None => json!({
            "headers": {"X-API-Key": api_key},
            "pathParameters": {USER_ID_PARAM: user_id},
            "requestContext": {"requestId": "local-self-test"},
        }),
    };

    let state = build_state(config).await;
    let response = state.handler.handle_json(event).await.into_invocation();

    eprintln!("Status: {}", response.status_code);
    println!("{}", response.body);

    if response.status_code == 401
        && let Some(hint) = unauthorized_hint(&state.config)
    {
        eprintln!("Hint: {}", hint);
    }

    if response.status_code != 200 {
        std::process::exit(1);
    }
}

/// Explain a 401 that no key could have avoided under this configuration.
fn unauthorized_hint(config: &PermissionsApiConfig) -> Option<String> {
    if !config.secrets.is_none() || config.auth.fallback.enabled {
        return None;
    }
    Some(format!(
        "no [secrets] store is configured and auth.fallback is disabled, so every key is \
         rejected. Configure [secrets] (for example type = \"env\" with {} set to \
         {{\"{}\": \"<key>\"}}) or enable [auth.fallback].",
        secrets::EnvSecretManager::var_name(&config.auth.secret_name),
        config.auth.secret_field
    ))
}

fn run_check_config(config_path: Option<&Path>) {
    let config = load_config(config_path);

    match PermissionsRegistry::from_config(&config.registry) {
        Ok(registry) => {
            println!("Configuration OK");
            println!("  listen:    {}", config.server.bind_addr());
            println!("  base path: {}", config.server.api_base_path);
            println!("  secrets:   {}", config.secrets.backend_name());
            println!("  secret:    {}", config.auth.secret_name);
            println!(
                "  fallback:  {}",
                if config.auth.fallback.enabled {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(count) = registry.record_count() {
                println!("  registry:  {} records", count);
            }
            for warning in config.warnings() {
                println!("Warning: {}", warning);
            }
        }
        Err(e) => {
            eprintln!("Invalid permissions registry: {}", e);
            std::process::exit(1);
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unauthorized_hint_for_default_config() {
        temp_env::with_var_unset("SECRET_NAME", || {
            let config = PermissionsApiConfig::from_str("").unwrap();
            let hint = unauthorized_hint(&config).unwrap();
            assert!(hint.contains("[secrets]"));
            assert!(hint.contains("DENODO_POC_API_AUTH_KEY"));
        });
    }

    #[test]
    fn test_no_hint_when_key_can_be_checked() {
        let with_store = PermissionsApiConfig::from_str("[secrets]\ntype = \"env\"").unwrap();
        assert!(unauthorized_hint(&with_store).is_none());

        let with_fallback =
            PermissionsApiConfig::from_str("[auth.fallback]\nenabled = true").unwrap();
        assert!(unauthorized_hint(&with_fallback).is_none());
    }
}
