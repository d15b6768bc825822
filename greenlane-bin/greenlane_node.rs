use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use greenlane_analyzer::{AnalyzerConfig, SustainabilityAnalyzer};
use greenlane_service::{
    config::GreenlaneServiceConfig,
    server::{run_server, AppState},
    spawn_with_shutdown, telemetry,
};
use tokio::{net::TcpListener, sync::watch, try_join};
use tracing::info;

#[derive(Parser)]
struct NodeArgs {
    #[arg(short, long)]
    config_path: String,
}

#[tokio::main]
#[allow(clippy::redundant_pub_crate)]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Keep the guard alive so buffered file logs are flushed on exit
    let _file_guard = telemetry::setup_logging().context("Failed to setup logging")?;

    let args = NodeArgs::parse();
    let service_config = GreenlaneServiceConfig::from_file_path(&args.config_path)
        .context("Failed to load greenlane_service configuration")?;
    let analyzer_config = AnalyzerConfig::from_file_path(&args.config_path)
        .context("Failed to load greenlane_analyzer configuration")?;

    info!(
        target = "greenlane_node",
        event = "greenlane-node-start",
        model_path = %analyzer_config.model_path.display(),
        "Loading sustainability analyzer..."
    );
    let docker = service_config.docker;
    let analyzer = tokio::task::spawn_blocking(move || {
        SustainabilityAnalyzer::from_config(analyzer_config).with_docker(docker)
    })
    .await
    .context("Analyzer initialization task failed")?;

    let tcp_listener = TcpListener::bind(&service_config.service_bind_address)
        .await
        .context("Failed to bind the service address")?;
    let app_state = AppState {
        analyzer: Arc::new(analyzer),
    };

    info!(
        target = "greenlane_node",
        event = "greenlane-node-start",
        "Starting the GreenLane service, on {}",
        service_config.service_bind_address
    );
    let (shutdown_sender, mut shutdown_receiver) = watch::channel(false);

    let server_handle = spawn_with_shutdown(
        run_server(app_state, tcp_listener, shutdown_receiver.clone()),
        shutdown_sender.clone(),
    );

    let ctrl_c = tokio::task::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!(
                    target = "greenlane_node",
                    event = "greenlane-node-stop",
                    "ctrl-c received, sending shutdown signal"
                );
                shutdown_sender
                    .send(true)
                    .context("Failed to send shutdown signal")?;
                result.map_err(anyhow::Error::from)
            }
            _ = shutdown_receiver.changed() => {
                Ok(())
            }
        }
    });

    let (server_result, _) = try_join!(server_handle, ctrl_c)?;

    info!(
        target = "greenlane_node",
        event = "greenlane-node-stop",
        "GreenLane service stopped gracefully..."
    );

    // Before the program exits, ensure all spans are exported
    telemetry::shutdown();

    server_result
}
