use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::ProxyConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::load::load_store_manager;
use crate::router::build_router;

/// How long shutdown waits for queued cache writes before discarding them.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// DA proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
}

impl ProxyServer {
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Load the configured backends and build the router (useful for testing).
    pub async fn router(&self, shutdown: CancellationToken) -> ServerResult<axum::Router> {
        let manager = load_store_manager(&self.config, shutdown).await?;
        Ok(build_router(AppState::new(manager), self.config.request_timeout()))
    }

    /// Serve requests until `shutdown` is cancelled, then drain the
    /// secondary write queue and stop its workers.
    pub async fn serve(self, shutdown: CancellationToken) -> ServerResult<()> {
        let manager = load_store_manager(&self.config, shutdown.child_token()).await?;
        let app = build_router(AppState::new(manager.clone()), self.config.request_timeout());

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!("DA proxy listening on {}", listener.local_addr()?);

        let signal = shutdown.clone();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { signal.cancelled().await })
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))?;

        let router = manager.router();
        if tokio::time::timeout(DRAIN_TIMEOUT, router.wait_idle()).await.is_err() {
            tracing::warn!(pending = router.pending(), "secondary write queue not drained");
        }
        manager.shutdown().await;
        tracing::info!("DA proxy stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_construction() {
        let server = ProxyServer::new(ProxyConfig::default());
        assert_eq!(server.config().bind_addr, "127.0.0.1:3100".parse().unwrap());
    }

    #[tokio::test]
    async fn router_builds() {
        let server = ProxyServer::new(ProxyConfig::default());
        server.router(CancellationToken::new()).await.unwrap();
    }

    #[tokio::test]
    async fn serve_stops_on_cancel() {
        let config = ProxyConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..ProxyConfig::default()
        };
        let token = CancellationToken::new();
        let handle = tokio::spawn(ProxyServer::new(config).serve(token.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        token.cancel();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn invalid_config_fails_before_binding() {
        let mut config = ProxyConfig::default();
        config.secondary.cache_targets = vec!["nonsense".into()];
        let err = ProxyServer::new(config)
            .serve(CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Backend(_)));
    }
}
