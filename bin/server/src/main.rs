use rootcause::prelude::Report;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wraith_server::app::{self, AppState};
use wraith_server::config::ServerConfig;
use wraith_server::error::StartupError;

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(report) = run().await {
        tracing::error!(error = %report, "server failed");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Report<StartupError>> {
    let config =
        ServerConfig::load().map_err(|e| Report::new(e).context(StartupError::Config))?;
    tracing::info!("Loaded configuration");

    let state = Arc::new(AppState::from_config(config)?);
    for provider in state.providers.iter() {
        tracing::info!(
            provider = provider.name(),
            version = %provider.version(),
            "identity provider ready"
        );
    }

    app::spawn_purge_task(state.clone());

    let addr = state.config.server.listen_addr();
    let service =
        app::service(state.clone()).map_err(|report| report.context(StartupError::Routes))?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| Report::new(e).context(StartupError::Bind))?;

    tracing::info!(version = %app::APP_VERSION, "listening on http://{}", addr);

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| Report::new(e).context(StartupError::Serve))?;

    tracing::info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
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
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutting down");
}
