use chrono::Utc;
use clap::{Parser, Subcommand};
use logship::backend::{HttpLogBackend, HttpRegistryBackend};
use logship::config::{load_config, Config, LogStorageConfig, ResolvedLogConfig};
use logship::provision::{default_project_name, Provisioner, DEFAULT_LOG_STORE};
use logship::registry::RegistryClient;
use logship::session::{sorted_records, HistoryRequest, LogSession};
use logship::transport::HttpTransport;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logship")]
#[command(about = "Execution log retrieval and log storage provisioning", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Query a past time window of execution logs
    History {
        /// Window start, unix seconds (default: one hour ago)
        #[arg(long)]
        from: Option<i64>,

        /// Window end, unix seconds (default: now)
        #[arg(long)]
        to: Option<i64>,

        #[arg(long)]
        service: String,

        #[arg(long)]
        function: String,

        /// Keep only records containing this substring
        #[arg(long)]
        query: Option<String>,

        /// Keep only the record with this correlation id
        #[arg(long)]
        request_id: Option<String>,

        /// Keep only records that look like failed invocations
        #[arg(long)]
        errors_only: bool,
    },

    /// Tail execution logs as they arrive
    Realtime {
        #[arg(long)]
        service: String,

        #[arg(long)]
        function: String,
    },

    /// Ensure the configured log storage (project, store, index) exists
    Provision,

    /// Ensure a container-registry namespace exists
    Namespace { name: String },

    /// Print temporary registry credentials
    Token,

    /// Delete the auto-generated default log project
    Destroy {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logship=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config_path = match resolve_config_path(cli.config) {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            eprintln!("  ~/.config/logship/config.yml");
            eprintln!("  /etc/logship/config.yml");
            eprintln!("\nUse --config <path> to specify a config file.");
            std::process::exit(1);
        }
    };

    let config = load_config(&config_path)?;
    let timeout = Duration::from_secs(config.endpoint.timeout_seconds);

    match cli.command {
        Commands::History {
            from,
            to,
            service,
            function,
            query,
            request_id,
            errors_only,
        } => {
            let session = log_session(&config, timeout)?;
            let resolved = resolved_log_config(&config);

            let time_end = to.unwrap_or_else(|| Utc::now().timestamp());
            let time_start = from.unwrap_or(time_end - 3600);

            let logs = session
                .history(&HistoryRequest {
                    project: resolved.project,
                    log_store: resolved.log_store,
                    time_start,
                    time_end,
                    service,
                    function,
                    query,
                    correlation_id: request_id,
                    errors_only,
                })
                .await?;

            for record in sorted_records(&logs) {
                println!("\n{}", record.message);
            }
        }

        Commands::Realtime { service, function } => {
            let session = log_session(&config, timeout)?;
            let resolved = resolved_log_config(&config);

            let (cancel_tx, cancel_rx) = tokio::sync::watch::channel(false);
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("received Ctrl+C, stopping after current poll");
                    let _ = cancel_tx.send(true);
                }
            });

            session
                .realtime(
                    &resolved.project,
                    &resolved.log_store,
                    &service,
                    &function,
                    cancel_rx,
                    |record| println!("\n{}", record.message),
                )
                .await?;
        }

        Commands::Provision => {
            let provisioner = provisioner(&config, timeout)?;
            let resolved = provisioner.transform_log_config(&config.log).await?;
            info!(
                project = %resolved.project,
                log_store = %resolved.log_store,
                "log storage ready"
            );
        }

        Commands::Namespace { name } => {
            let client = registry_client(&config, timeout)?;
            client.ensure_namespace(&name).await?;
        }

        Commands::Token => {
            let client = registry_client(&config, timeout)?;
            let token = client.authorization_token().await?;
            println!("user: {}", token.user);
            println!("password: {}", token.password);
        }

        Commands::Destroy { force } => {
            let provisioner = provisioner(&config, timeout)?;
            if !provisioner.delete_default_project(force).await? {
                info!("nothing deleted");
            }
        }
    }

    Ok(())
}

fn log_session(config: &Config, timeout: Duration) -> Result<LogSession, Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new(&config.endpoint.log_url, timeout)?);
    let backend = Arc::new(HttpLogBackend::new(transport));
    Ok(LogSession::new(
        backend,
        config.fetch.clone(),
        config.realtime.clone(),
    ))
}

fn provisioner(config: &Config, timeout: Duration) -> Result<Provisioner, Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new(&config.endpoint.log_url, timeout)?);
    let backend = Arc::new(HttpLogBackend::new(transport));
    Ok(Provisioner::new(
        backend,
        config.retry.clone(),
        &config.account.account_id,
        &config.account.region,
    ))
}

fn registry_client(
    config: &Config,
    timeout: Duration,
) -> Result<RegistryClient, Box<dyn std::error::Error>> {
    let transport = Arc::new(HttpTransport::new(&config.endpoint.registry_url, timeout)?);
    let backend = Arc::new(HttpRegistryBackend::new(transport));
    Ok(RegistryClient::new(backend, config.retry.clone()))
}

/// Project and store a read-side command should hit, without provisioning
/// anything: the auto marker resolves to the same deterministic names the
/// provisioner would create.
fn resolved_log_config(config: &Config) -> ResolvedLogConfig {
    match &config.log {
        LogStorageConfig::Explicit { project, log_store } => ResolvedLogConfig {
            project: project.clone(),
            log_store: log_store.clone(),
        },
        LogStorageConfig::Auto(_) => ResolvedLogConfig {
            project: default_project_name(&config.account.account_id, &config.account.region),
            log_store: DEFAULT_LOG_STORE.to_string(),
        },
    }
}

fn resolve_config_path(explicit_path: Option<PathBuf>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path);
    }

    if let Some(home_dir) = dirs::home_dir() {
        let user_config = home_dir.join(".config/logship/config.yml");
        if user_config.exists() {
            return Some(user_config);
        }
    }

    let system_config = PathBuf::from("/etc/logship/config.yml");
    if system_config.exists() {
        return Some(system_config);
    }

    None
}
