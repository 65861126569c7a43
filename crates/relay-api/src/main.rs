//! relayd entry point.
//!
//! Parses CLI arguments, loads configuration, initializes tracing, the
//! database and the model gateway, then runs the requested command.

mod cli;
mod http;
mod state;

use clap::Parser;
use clap_complete::generate;
use tracing::info;

use relay_infra::config::load_runtime_config;
use relay_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions don't need tracing or app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "relayd", &mut std::io::stdout());
        return Ok(());
    }

    let options = TracingOptions {
        json: cli.json_logs,
        otel: cli.otel,
        ..TracingOptions::default()
    }
    .with_verbosity(cli.verbose);
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut runtime = load_runtime_config(&cli.config).await;

    match cli.command {
        Commands::Serve { port, host } => {
            if let Some(port) = port {
                runtime.config.server.port = port;
            }
            if let Some(host) = host {
                runtime.config.server.host = host;
            }
            let addr = format!(
                "{}:{}",
                runtime.config.server.host, runtime.config.server.port
            );

            let state = AppState::init(runtime).await?;
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            info!(%addr, "relay listening");

            println!(
                "  {} relayd listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            println!("\n  Server stopped.");
        }

        Commands::Check => {
            let state = AppState::init(runtime).await?;
            cli::check::check(&state, cli.json).await?;
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
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
                tracing::error!("failed to install SIGTERM handler: {e}");
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
    info!("shutdown signal received");
}
