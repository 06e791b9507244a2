use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;

use super::CoordinationResult;
use super::CoordinationService;
use super::EventReceiver;
use super::ExpectedVersion;
use super::StoredValue;
use crate::metrics::SESSION_RECONNECTS;
use crate::utils::backoff::retry_with_backoff;
use crate::BackoffPolicy;
use crate::CoordinationError;
use crate::DirectoryConfig;
use crate::Error;
use crate::PathLayout;
use crate::Result;

/// Owner of the coordination-service handle
///
/// Establishes sessions (with backoff), installs the cluster watch and
/// bounds every request by the configured request timeout. No other
/// component touches the service directly.
pub struct CoordinationLink<C: CoordinationService> {
    service: Arc<C>,
    layout: PathLayout,
    connect_policy: BackoffPolicy,
    connect_timeout: Duration,
    request_timeout: Duration,
}

impl<C: CoordinationService> CoordinationLink<C> {
    pub fn new(
        service: Arc<C>,
        config: &DirectoryConfig,
    ) -> Self {
        Self {
            service,
            layout: PathLayout::new(&config.cluster.root_path, &config.cluster.cluster_name),
            connect_policy: config.retry.connect,
            connect_timeout: config.session.connect_timeout(),
            request_timeout: config.session.request_timeout(),
        }
    }

    pub fn layout(&self) -> &PathLayout {
        &self.layout
    }

    /// Open a fresh session and watch the cluster subtree.
    ///
    /// Retries according to `retry.connect` until `cancel` fires; returns
    /// the session's event receiver.
    pub async fn establish(
        &self,
        cancel: &CancellationToken,
        reconnect: bool,
    ) -> Result<EventReceiver> {
        let mut policy = self.connect_policy;
        policy.timeout_ms = policy.timeout_ms.min(self.connect_timeout.as_millis() as u64).max(1);

        let service = &self.service;
        let base = self.layout.base();
        let rx = retry_with_backoff("connect", &policy, cancel, move || async move {
            let rx = service.connect().await?;
            service.watch(base).await?;
            Ok::<_, Error>(rx)
        })
        .await?;

        if reconnect {
            SESSION_RECONNECTS.inc();
        }
        info!(base = self.layout.base(), reconnect, "coordination session established");
        Ok(rx)
    }

    pub async fn read(
        &self,
        path: &str,
    ) -> Result<Option<StoredValue>> {
        self.bounded(self.service.read(path)).await
    }

    pub async fn list(
        &self,
        path: &str,
    ) -> Result<Vec<String>> {
        self.bounded(self.service.list(path)).await
    }

    pub async fn write(
        &self,
        path: &str,
        data: Bytes,
        expected: ExpectedVersion,
    ) -> Result<u64> {
        debug!(path, %expected, "write");
        self.bounded(self.service.write(path, data, expected)).await
    }

    /// Release the session; idempotent
    pub async fn close(&self) -> Result<()> {
        self.bounded(self.service.close()).await
    }

    async fn bounded<T>(
        &self,
        request: impl Future<Output = CoordinationResult<T>>,
    ) -> Result<T> {
        match timeout(self.request_timeout, request).await {
            Ok(result) => result.map_err(Error::from),
            Err(_) => Err(CoordinationError::Timeout(self.request_timeout).into()),
        }
    }
}
