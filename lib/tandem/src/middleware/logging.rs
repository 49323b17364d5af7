//! Exchange logging middleware.
//!
//! Sits below the coalescing dispatcher, so each record describes one
//! network exchange together with the coalescing key it serves. However many
//! callers joined that key, the exchange is logged once.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use tower::{Layer, Service};
use tracing::{Instrument, debug, info, info_span, warn};

use crate::{Error, KeyPolicy, Request, Response, Result};

/// How much each exchange record carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Key, status and elapsed time.
    #[default]
    Summary,
    /// Also header names, body size and the exchange timeout.
    Detailed,
}

/// Layer that logs each network exchange with `tracing`.
///
/// The span carries the coalescing key computed with the configured
/// [`KeyPolicy`], matching what [`crate::Client::waiters`] accepts.
///
/// # Example
///
/// ```
/// use tandem::middleware::{LoggingLayer, Verbosity};
/// use tandem::{Client, KeyPolicy};
///
/// let client = Client::builder()
///     .layer(LoggingLayer::new(Verbosity::Detailed).key_policy(KeyPolicy::MethodAndUrl))
///     .build();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    verbosity: Verbosity,
    key_policy: KeyPolicy,
}

impl LoggingLayer {
    /// Create a layer with the given verbosity, keyed by URL.
    #[must_use]
    pub const fn new(verbosity: Verbosity) -> Self {
        Self {
            verbosity,
            key_policy: KeyPolicy::Url,
        }
    }

    /// Key policy used for the logged coalescing key.
    #[must_use]
    pub const fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    /// Configured verbosity.
    #[must_use]
    pub const fn verbosity(&self) -> Verbosity {
        self.verbosity
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            layer: *self,
        }
    }
}

/// Service produced by [`LoggingLayer`].
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    layer: LoggingLayer,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

fn log_outcome(result: &Result<Response>, elapsed_ms: u64) {
    match result {
        Ok(response) if response.is_success() => {
            info!(status = response.status(), elapsed_ms, "exchange completed");
        }
        Ok(response) => {
            warn!(
                status = response.status(),
                body_bytes = response.body().len(),
                elapsed_ms,
                "exchange completed with unsuccessful status"
            );
        }
        Err(err) => match err.failure_kind() {
            Some(kind) => warn!(%kind, error = %err, elapsed_ms, "exchange failed"),
            None => warn!(error = %err, elapsed_ms, "exchange rejected"),
        },
    }
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let key = request.coalescing_key(self.layer.key_policy);
        let span = info_span!("tandem_exchange", %key, method = %request.method());

        if self.layer.verbosity == Verbosity::Detailed {
            span.in_scope(|| {
                debug!(
                    headers = ?request.headers().keys().collect::<Vec<_>>(),
                    body_bytes = request.body().map_or(0, bytes::Bytes::len),
                    timeout_ms = millis(request.timeout()),
                    "exchange starting"
                );
            });
        }

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(
            async move {
                let start = Instant::now();
                let result = inner.call(request).await;
                log_outcome(&result, millis(start.elapsed()));
                result
            }
            .instrument(span),
        )
    }
}
