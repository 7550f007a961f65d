use std::path::PathBuf;

use {
    anyhow::Context,
    bridgeway_catalog::ToolCatalog,
    bridgeway_config::BridgewayConfig,
    bridgeway_store::SqliteStore,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "bridgeway", about = "Bridgeway, an MCP gateway for execute_kw APIs", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file; defaults to ./bridgeway.* then ~/.config/bridgeway/.
    #[arg(long, global = true, env = "BRIDGEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gateway server.
    Gateway {
        #[arg(long, env = "BRIDGEWAY_BIND")]
        bind: Option<String>,
        #[arg(long, env = "BRIDGEWAY_PORT")]
        port: Option<u16>,
    },
    /// Load and validate the catalog, then print it as JSON.
    Tools,
    /// Print the effective configuration with secrets redacted.
    Config,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_ansi(true))
            .init();
    }
}

/// File config (explicit path or discovered) with environment overrides.
fn load_config(path: Option<&PathBuf>) -> anyhow::Result<BridgewayConfig> {
    let config = match path {
        Some(path) => bridgeway_config::load_config(path)?,
        None => bridgeway_config::discover_and_load(),
    };
    Ok(config.with_env_overrides())
}

async fn print_catalog(config: &BridgewayConfig) -> anyhow::Result<()> {
    let store = SqliteStore::connect(&config.database.url)
        .await
        .with_context(|| format!("failed to open store at {}", config.database.url))?;
    let catalog: ToolCatalog = bridgeway_gateway::server::load_catalog(&store).await?;
    let out = serde_json::json!({
        "tools": catalog.list_tools(),
        "resources": catalog.list_resources(),
        "prompts": catalog.list_prompts(),
    });
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    let mut config = load_config(cli.config.as_ref())?;
    info!(version = env!("CARGO_PKG_VERSION"), "bridgeway starting");

    match cli.command {
        Commands::Gateway { bind, port } => {
            if let Some(bind) = bind {
                config.server.bind = bind;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            bridgeway_gateway::server::start_gateway(&config).await
        },
        Commands::Tools => print_catalog(&config).await,
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(())
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_flags_override() {
        let cli =
            Cli::try_parse_from(["bridgeway", "gateway", "--bind", "0.0.0.0", "--port", "9000"])
                .unwrap();
        match cli.command {
            Commands::Gateway { bind, port } => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0"));
                assert_eq!(port, Some(9000));
            },
            _ => panic!("expected gateway"),
        }
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["bridgeway", "config", "--json-logs", "--log-level", "debug"])
            .unwrap();
        assert!(cli.json_logs);
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Config));
    }

    #[test]
    fn unknown_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["bridgeway", "agent"]).is_err());
    }
}
