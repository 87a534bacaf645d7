use anyhow::Result;
use clap::{Parser, Subcommand};
use sopsmith::config::Config;
use sopsmith::providers::{catalog, health, CompletionGateway, ProviderRegistry};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "sopsmith",
    version,
    about = "SOP document service backed by a multi-provider LLM completion gateway"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway
    Serve {
        /// Bind host (overrides SOPSMITH_HOST)
        #[arg(long)]
        host: Option<String>,
        /// Bind port (overrides SOPSMITH_PORT)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List known backends and their configuration state
    Providers,
    /// List models grouped by availability
    Models,
    /// Probe each configured backend with a minimal completion
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging - respects RUST_LOG env var, defaults to INFO
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("setting default subscriber failed");

    let cli = Cli::parse();
    let mut config = Config::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }

            let registry = ProviderRegistry::from_config(&config);
            if registry.is_empty() {
                tracing::warn!(
                    "No backend credentials configured; every completion request will fail. \
                     Set at least one <BACKEND>_API_KEY environment variable."
                );
            }
            let gateway = CompletionGateway::new(registry, config.default_backend.clone());
            sopsmith::server::run(config, gateway).await
        }
        Commands::Providers => {
            let registry = ProviderRegistry::from_config(&config);
            println!("{:<12} {:<14} {:<11} free tier", "backend", "display name", "state");
            for descriptor in catalog::all() {
                let state = if registry.contains(descriptor.id) {
                    "configured"
                } else {
                    "missing key"
                };
                let free = if descriptor.free_tier {
                    descriptor.free_limit
                } else {
                    "-"
                };
                println!("{:<12} {:<14} {:<11} {}", descriptor.id, descriptor.name, state, free);
            }
            Ok(())
        }
        Commands::Models => {
            let registry = ProviderRegistry::from_config(&config);
            let partition = catalog::partition_models(|id| registry.contains(id));

            for (label, models) in [
                ("available free models", &partition.free),
                ("available paid models", &partition.paid),
                ("unavailable models", &partition.unavailable),
            ] {
                println!("{label} ({}):", models.len());
                for model in models {
                    println!("  {:<12} {}", model.provider, model.model);
                }
            }
            Ok(())
        }
        Commands::Doctor => {
            let registry = ProviderRegistry::from_config(&config);
            let gateway = CompletionGateway::new(registry, config.default_backend.clone());
            let report = health::probe_all(&gateway).await;

            println!("status: {}", report.status);
            for (backend, probe) in &report.providers {
                if !probe.configured {
                    println!("  {backend:<12} not configured");
                } else if probe.available {
                    println!(
                        "  {backend:<12} ok ({} ms)",
                        probe.response_time_ms.unwrap_or_default()
                    );
                } else if probe.rate_limited == Some(true) {
                    println!("  {backend:<12} rate limited");
                } else {
                    println!(
                        "  {backend:<12} error: {}",
                        probe.error.as_deref().unwrap_or("unknown")
                    );
                }
            }
            println!(
                "{} healthy / {} configured",
                report.summary.healthy, report.summary.configured
            );
            Ok(())
        }
    }
}
