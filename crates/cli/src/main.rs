use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand, ValueEnum},
    gatehouse_agent::{Agent, ControlPlaneClient, LogSink},
    gatehouse_config::{GatehouseConfig, MetadataKind},
    secrecy::Secret,
    tokio_util::sync::CancellationToken,
    tracing::{info, warn},
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "gatehouse", about = "Gatehouse: gateway fleet control plane and agent")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to ./gatehouse.toml or ~/.config/gatehouse/).
    #[arg(long, global = true)]
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
    /// Run the control plane HTTP server.
    ControlPlane {
        #[arg(long, env = "CONTROL_PLANE_BIND")]
        bind: Option<String>,
        /// Falls back to the configured port when unset or not a number.
        #[arg(long, env = "CONTROL_PLANE_PORT")]
        port: Option<String>,
        /// Per-gateway configuration source (JSON, TOML or YAML).
        #[arg(long, env = "CONTROL_PLANE_CONFIGURATIONS")]
        configurations: Option<PathBuf>,
        /// Require this bearer token on API requests.
        #[arg(long, env = "CONTROL_PLANE_TOKEN", hide_env_values = true)]
        token: Option<String>,
    },
    /// Run the gateway agent on this host.
    Agent {
        #[arg(long, env = "CONTROL_PLANE_URL")]
        control_plane_url: Option<String>,
        #[arg(long)]
        poll_interval_secs: Option<u64>,
        #[arg(long, value_enum)]
        metadata: Option<MetadataArg>,
    },
    /// Print the gateways registered with a control plane as JSON.
    Gateways {
        #[arg(long, env = "CONTROL_PLANE_URL")]
        control_plane_url: Option<String>,
        #[arg(long, env = "CONTROL_PLANE_TOKEN", hide_env_values = true)]
        token: Option<String>,
        /// Show one gateway instead of the whole registry.
        #[arg(long)]
        id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MetadataArg {
    Gce,
    Static,
}

impl From<MetadataArg> for MetadataKind {
    fn from(arg: MetadataArg) -> Self {
        match arg {
            MetadataArg::Gce => Self::Gce,
            MetadataArg::Static => Self::Static,
        }
    }
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
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GatehouseConfig> {
    match path {
        Some(path) => gatehouse_config::load_config(path),
        None => Ok(gatehouse_config::discover_and_load()),
    }
}

/// Parse a port override, keeping `fallback` when it is absent or garbage.
fn resolve_port(raw: Option<&str>, fallback: u16) -> u16 {
    let Some(raw) = raw else {
        return fallback;
    };
    match raw.trim().parse() {
        Ok(port) => port,
        Err(_) => {
            warn!(value = raw, fallback, "ignoring unparsable port");
            fallback
        },
    }
}

async fn show_gateways(url: &str, token: Option<String>, id: Option<&str>) -> anyhow::Result<()> {
    let client = ControlPlaneClient::new(url)?.with_token(token.map(Secret::new));
    let rendered = match id {
        Some(id) => serde_json::to_string_pretty(&client.get_gateway(id).await?)?,
        None => serde_json::to_string_pretty(&client.list_gateways().await?)?,
    };
    println!("{rendered}");
    Ok(())
}

/// Cancelled on Ctrl-C.
fn shutdown_token() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
        }
        trigger.cancel();
    });
    token
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "gatehouse starting");
    let mut config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::ControlPlane {
            bind,
            port,
            configurations,
            token,
        } => {
            let cp = &mut config.control_plane;
            if let Some(bind) = bind {
                cp.bind = bind;
            }
            cp.port = resolve_port(port.as_deref(), cp.port);
            if configurations.is_some() {
                cp.configurations = configurations;
            }
            if let Some(token) = token {
                cp.token = Some(Secret::new(token));
            }
            gatehouse_control_plane::start_control_plane(cp).await
        },
        Commands::Agent {
            control_plane_url,
            poll_interval_secs,
            metadata,
        } => {
            let agent_cfg = &mut config.agent;
            if control_plane_url.is_some() {
                agent_cfg.control_plane_url = control_plane_url;
            }
            if let Some(secs) = poll_interval_secs {
                agent_cfg.poll_interval_secs = secs;
            }
            if let Some(kind) = metadata {
                agent_cfg.metadata = kind.into();
            }

            info!("agent gateway started");
            let agent = Agent::from_config(agent_cfg, Arc::new(LogSink::new()))?;
            agent.run(shutdown_token()).await?;
            Ok(())
        },
        Commands::Gateways {
            control_plane_url,
            token,
            id,
        } => {
            let url = control_plane_url
                .or(config.agent.control_plane_url)
                .filter(|u| !u.is_empty())
                .context("control plane URL is not configured (set CONTROL_PLANE_URL)")?;
            show_gateways(&url, token, id.as_deref()).await
        },
    }
}
