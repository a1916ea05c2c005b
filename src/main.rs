use std::{process::ExitCode, sync::Arc};

use clap::Parser;
use scimgate::{AppState, build_app, config::GatewayConfig, models, observability};

/// CLI arguments for scimgate
#[derive(Parser, Debug)]
#[command(version, about = "SCIM 2.0 provisioning server", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "scimgate.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the SCIM server (default)
    Serve,
    /// Print the SHA-256 digest of a bearer token for `[[auth.tokens]]`
    HashToken {
        /// The raw bearer token
        token: String,
    },
    /// Generate a new random bearer token and print it with its digest
    GenerateToken,
    /// Validate the configuration file and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => run_server(&args.config).await,
        Command::HashToken { token } => {
            println!("{}", models::hash_token(&token));
            ExitCode::SUCCESS
        }
        Command::GenerateToken => {
            let (token, token_hash) = models::generate_token();
            println!("token      = {}", token);
            println!("token_hash = \"{}\"", token_hash);
            eprintln!("Hand the token to the identity provider; only token_hash goes in the config.");
            ExitCode::SUCCESS
        }
        Command::CheckConfig => match GatewayConfig::from_file(&args.config) {
            Ok(config) => {
                println!(
                    "{}: ok ({} token(s), auth {})",
                    args.config,
                    config.auth.tokens.len(),
                    if config.auth.enabled { "enabled" } else { "disabled" }
                );
                ExitCode::SUCCESS
            }
            Err(e) => {
                eprintln!("{}: {}", args.config, e);
                ExitCode::FAILURE
            }
        },
    }
}

async fn run_server(config_path: &str) -> ExitCode {
    let config = match GatewayConfig::from_file(config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config {}: {}", config_path, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = observability::init_tracing(&config.observability.logging) {
        eprintln!("Failed to initialize tracing: {}", e);
        return ExitCode::FAILURE;
    }

    if !config.auth.enabled {
        tracing::warn!(
            app_id = %config.auth.default_app_id,
            "Authentication is disabled; every request is served as the default application"
        );
    }

    let state = AppState::new(Arc::new(config.clone()));
    let app = build_app(&config, state);

    let bind_addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(address = %bind_addr, error = %e, "Failed to bind to address");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        base_path = config.server.base_path(),
        tokens = config.auth.tokens.len(),
        "Server listening on http://{}",
        bind_addr
    );

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "Server error");
        return ExitCode::FAILURE;
    }

    tracing::info!("Server stopped");
    ExitCode::SUCCESS
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
                tracing::error!(error = %e, "Failed to install signal handler");
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
