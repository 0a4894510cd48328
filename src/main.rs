use std::{path::Path, sync::Arc};

use clap::Parser;
use color_eyre::{
    Result,
    eyre::{WrapErr, eyre},
};
use keyword_gateway::{
    adapters::{HttpHandler, OpenAiExtractor, counter_store_for},
    config::{ServerConfigValidator, loader::load_config, models::ServerConfig},
    core::AdmissionPipeline,
    tracing_setup,
    utils::GracefulShutdown,
};
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    /// Configuration file (toml, yaml, json or ini); defaults and
    /// KEYWORD_GATEWAY__* variables apply when omitted
    #[clap(short, long)]
    config: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long)]
        config: Option<String>,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.toml")]
        config: String,
    },
    /// Start the keyword gateway (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long)]
        config: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    match args.command {
        Some(Commands::Validate { config }) => {
            validate_config_command(config.or(args.config).as_deref()).await
        }
        Some(Commands::Init { config }) => init_config_command(&config).await,
        Some(Commands::Serve { config }) => serve_command(config.or(args.config).as_deref()).await,
        None => serve_command(args.config.as_deref()).await,
    }
}

async fn serve_command(config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)
        .await
        .wrap_err("Failed to load configuration")?;

    tracing_setup::init_tracing(&config.logging)
        .map_err(|e| eyre!("Failed to initialize tracing: {e}"))?;

    ServerConfigValidator::validate(&config).wrap_err("Invalid configuration")?;

    tracing::info!(
        config_path = config_path.unwrap_or("<defaults>"),
        version = env!("CARGO_PKG_VERSION"),
        "Starting keyword gateway"
    );

    let store = counter_store_for(config.rate_limit.algorithm);
    let extractor = Arc::new(OpenAiExtractor::new(config.upstream.clone())?);
    let pipeline = Arc::new(AdmissionPipeline::from_config(&config, store, extractor)?);
    tracing::info!(
        quota = %pipeline.rate_limiter().description(),
        algorithm = ?config.rate_limit.algorithm,
        "Admission pipeline ready"
    );

    let app = HttpHandler::new(pipeline, config.server.clone()).router();

    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .wrap_err_with(|| format!("Failed to bind to {}", config.listen_addr))?;
    let local_addr = listener
        .local_addr()
        .wrap_err("Failed to get local addr")?;
    tracing::info!(%local_addr, "Listening for HTTP requests");

    let graceful_shutdown = GracefulShutdown::new();
    let signal_handler = {
        let graceful_shutdown = graceful_shutdown.clone();
        tokio::spawn(async move { graceful_shutdown.run_signal_handler().await })
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let reason = graceful_shutdown.wait_for_shutdown_signal().await;
            tracing::info!(?reason, "Draining in-flight requests");
        })
        .await
        .wrap_err("Server error")?;

    signal_handler.abort();
    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Validate configuration and exit
async fn validate_config_command(config_path: Option<&str>) -> Result<()> {
    if let Some(path) = config_path {
        println!("🔍 Validating configuration file: {path}");
        if !Path::new(path).exists() {
            return Err(eyre!("Configuration file '{path}' not found"));
        }
    } else {
        println!("🔍 Validating built-in defaults and KEYWORD_GATEWAY__* overrides");
    }

    let config = load_config(config_path)
        .await
        .wrap_err("Configuration parsing failed")?;
    println!("✅ Configuration parsing: OK");

    if let Err(e) = ServerConfigValidator::validate(&config) {
        eprintln!("❌ Configuration validation failed:");
        eprintln!("{e}");
        println!();
        println!("💡 Common fixes:");
        println!("   • Verify listen address format (e.g., '127.0.0.1:5000')");
        println!("   • Ensure rate limit periods use valid units (s, m, h)");
        println!("   • Ensure upstream.base_url starts with http:// or https://");
        return Err(eyre!("Configuration is invalid"));
    }

    println!("✅ Configuration validation: OK");
    println!();
    print_summary(&config);
    println!();
    println!("🎉 Configuration is valid and ready to use!");
    Ok(())
}

fn print_summary(config: &ServerConfig) {
    let secret_source = |app: &Option<String>, env_var: &str| match app {
        Some(value) if !value.is_empty() => "config file".to_string(),
        _ => format!("${env_var}"),
    };

    println!("📋 Configuration Summary:");
    println!("   • Listen Address: {}", config.listen_addr);
    println!(
        "   • Server API Key: {}",
        secret_source(&config.auth.api_key, &config.auth.env_var)
    );
    println!(
        "   • Rate Limit: {} per {} ({:?})",
        config.rate_limit.requests, config.rate_limit.period, config.rate_limit.algorithm
    );
    println!(
        "   • Upstream: {} (model {}, timeout {}s)",
        config.upstream.base_url, config.upstream.model, config.upstream.timeout_secs
    );
    println!(
        "   • Upstream API Key: {}",
        secret_source(&config.upstream.api_key, &config.upstream.env_var)
    );
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        return Err(eyre!("Configuration file '{config_path}' already exists"));
    }

    let default_config = r#"# Keyword Gateway Configuration

# The address to listen on
listen_addr = "127.0.0.1:5000"

# Bearer authentication. Leave api_key unset to read it from env_var.
[auth]
env_var = "API_KEY"
# api_key = "change-me"

# Admission quota for POST /keywords
[rate_limit]
requests = 10
period = "1h"
key = "/keywords"
algorithm = "sliding_window" # or "gcra"

# Upstream keyword extraction provider
[upstream]
env_var = "OPENAI_API_KEY"
base_url = "https://api.openai.com/v1"
model = "gpt-5-nano"
timeout_secs = 60

[logging]
level = "info"
json = true

[server]
max_body_bytes = 2097152
security_headers = true
"#;

    tokio::fs::write(path, default_config)
        .await
        .wrap_err("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'keyword-gateway serve --config {config_path}' to start the server");
    Ok(())
}
