pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;

use axum::middleware::from_fn;
use axum::{
    Router,
    routing::{get, post},
};
use service_core::middleware::tracing::request_id_middleware;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use config::Config;
use services::{
    Directory, HttpDirectory, MockDirectory, ProvisioningService, RetentionJob, RetentionPolicy,
    RetentionScheduler, SessionCache, VaultClient,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub provisioner: Arc<ProvisioningService>,
}

pub struct Application {
    port: u16,
    listener: tokio::net::TcpListener,
    router: Router,
    retention: Option<RetentionScheduler>,
    shutdown: CancellationToken,
}

impl Application {
    pub async fn build(config: Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!("provisioning-service/{}", env!("CARGO_PKG_VERSION")))
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        let session = Arc::new(SessionCache::new(http.clone(), config.vault.clone()));
        let vault = Arc::new(VaultClient::new(http.clone(), config.vault.clone(), session));

        let directory: Arc<dyn Directory> = match &config.directory.base_url {
            Some(url) => {
                tracing::info!(url, "HTTP directory initialized");
                Arc::new(HttpDirectory::new(
                    http.clone(),
                    url.clone(),
                    config.directory.clone(),
                ))
            }
            None => {
                tracing::info!("Directory endpoint not configured, using mock directory");
                Arc::new(MockDirectory::new())
            }
        };

        let provisioner = Arc::new(ProvisioningService::new(
            directory,
            vault.clone(),
            config.policy.clone(),
        ));

        let shutdown = CancellationToken::new();
        let retention = if config.retention.enabled {
            let job = Arc::new(RetentionJob::new(
                vault,
                RetentionPolicy::from_config(&config.retention),
                std::time::Duration::from_millis(config.retention.delete_pause_ms),
            ));
            Some(RetentionScheduler::new(
                job,
                &config.retention,
                shutdown.child_token(),
            ))
        } else {
            tracing::info!("Retention job disabled by configuration");
            None
        };

        let state = AppState {
            config: config.clone(),
            provisioner,
        };

        let router = Router::new()
            .route("/health", get(handlers::health::health_check))
            .route("/ready", get(handlers::health::readiness_check))
            .route("/commands/provision", post(handlers::commands::provision_access))
            .route("/commands/confirm", post(handlers::commands::confirm_access))
            .layer(from_fn(request_id_middleware))
            .layer(
                TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                    let request_id = request
                        .headers()
                        .get("x-request-id")
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("-");

                    tracing::info_span!(
                        "http_request",
                        request_id = %request_id,
                        method = %request.method(),
                        uri = %request.uri(),
                    )
                }),
            )
            .with_state(state);

        // Port 0 binds a random port, used by the test harness.
        let addr: SocketAddr = format!("{}:{}", config.common.host, config.common.port).parse()?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let port = listener.local_addr()?.port();

        Ok(Self {
            port,
            listener,
            router,
            retention,
            shutdown,
        })
    }

    /// The port the server is bound to.
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> anyhow::Result<()> {
        tracing::info!("Listening on port {}", self.port);

        let shutdown = self.shutdown.clone();
        let listener = self.listener;
        let server = axum::serve(listener, self.router).with_graceful_shutdown(async move {
            shutdown_signal().await;
            shutdown.cancel();
        });

        let retention = self.retention;
        let stopped = self.shutdown.clone();
        let retention_task = async move {
            match retention {
                Some(scheduler) => scheduler.run().await,
                // Nothing to schedule; just wait out the process lifetime.
                None => stopped.cancelled().await,
            }
        };

        let (served, ()) = tokio::join!(server, retention_task);
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
