use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use greeter::AppState;
use greeter::config::{AppConfig, LogFormat};
use greeter::observability::{MetricsRecorder, init_tracing};
use greeter::server;

#[derive(Parser)]
#[command(name = "greeter", about = "Greeting service with Prometheus metrics", version)]
struct Cli {
    /// Optional YAML config file
    #[arg(short, long, env = "GREETER_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address [default: :8080]
    #[arg(long, env = "GREETER_HTTP_ADDR")]
    http_addr: Option<String>,

    /// Prometheus metrics listen address [default: :9092]
    #[arg(long, env = "GREETER_METRICS_ADDR")]
    metrics_addr: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log level, overridden by RUST_LOG
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?.with_overrides(
        cli.http_addr,
        cli.metrics_addr,
        cli.log_format,
        cli.log_level,
    );
    let settings = config.settings;

    init_tracing(
        settings.observability.log_format,
        &settings.observability.log_level,
    )?;

    tracing::info!(
        http = %settings.http.listen,
        metrics = %settings.metrics.listen,
        "starting greeter"
    );

    let recorder = Arc::new(MetricsRecorder::new()?);
    let grace = Duration::from_secs(settings.shutdown.grace_period_seconds);
    let state = AppState::new(settings, recorder);

    let servers = match server::start(state.clone()).await {
        Ok(servers) => servers,
        Err(e) => {
            tracing::error!(error = %e, "failed to start listeners");
            return Err(e.into());
        }
    };

    servers
        .run_until(state, server::termination_signal(), grace)
        .await?;

    Ok(())
}
