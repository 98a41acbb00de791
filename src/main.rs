use std::path::{Path, PathBuf};

use clap::Parser;
use warden::{
    AppState,
    authz::{MappingRegistry, MappingStore},
    build_app,
    config::WardenConfig,
    observability,
};

/// CLI arguments for Warden
#[derive(Parser, Debug)]
#[command(version, about = "Warden path-authorizing gateway", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to config file (defaults to ./warden.toml if it exists, otherwise
    /// built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Start the gateway server (default)
    Serve,
    /// Validate the config file and print the resolved mapping table
    Check,
}

const DEFAULT_CONFIG_FILE: &str = "warden.toml";

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());

    match args.command {
        Some(Command::Check) => run_check(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn load_config(explicit_path: Option<&str>) -> WardenConfig {
    let path = match explicit_path {
        Some(path) => PathBuf::from(path),
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => PathBuf::from(DEFAULT_CONFIG_FILE),
        None => return WardenConfig::default(),
    };

    match WardenConfig::from_file(&path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config from {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn run_check(config: &WardenConfig) {
    let registry = MappingRegistry::with_mappings(config.authz.seed_mappings());
    println!("Configuration OK");
    println!(
        "default effect: {}, authorization {}",
        config.authz.default_effect.as_str(),
        if config.authz.enabled { "enabled" } else { "disabled" }
    );
    println!("public paths: {}", config.authz.public_paths.join(", "));
    println!();
    println!("{:>10}  {:<40}  ROLES", "PRIORITY", "PATTERN");
    for mapping in registry.snapshot().iter() {
        let roles: Vec<&str> = mapping.required_roles.iter().map(String::as_str).collect();
        let roles = if roles.is_empty() {
            "(any authenticated)".to_string()
        } else {
            roles.join(", ")
        };
        println!("{:>10}  {:<40}  {}", mapping.priority, mapping.pattern, roles);
    }
    for route in &config.gateway.routes {
        println!("route {} : {} -> {}", route.id, route.path_prefix, route.upstream);
    }
}

async fn run_server(config: WardenConfig) {
    observability::init_tracing(&config.observability).expect("Failed to initialize tracing");

    let state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize application state");
            std::process::exit(1);
        }
    };

    let app = build_app(&config, state);

    let bind_addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections");
}
