//! Client facade over the coalescing dispatcher.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::warn;

use crate::config::{ClientConfig, ClientConfigBuilder, TrustPolicy};
use crate::dispatcher::{Dispatcher, Submission};
use crate::executor::{CallbackExecutor, SerialExecutor};
use crate::middleware::{LoggingLayer, Verbosity};
use crate::transport::{BoxedService, HyperTransport, LayerFn};
use crate::{
    Decoder, Error, FailureKind, FileAttachment, Json, JsonWith, KeyPolicy, Method, Request,
    RequestBuilder, Response, Result, TextEncoding, Transport,
};

/// Coalescing HTTP client.
///
/// Cloning is cheap: clones share the connection pool, the callback
/// executor and the in-flight table, so identical requests issued through
/// any clone are coalesced.
///
/// # Example
///
/// ```no_run
/// use serde::Deserialize;
/// use tandem::Client;
///
/// #[derive(Debug, Deserialize)]
/// struct Repo {
///     name: String,
/// }
///
/// # async fn run() -> tandem::Result<()> {
/// let client = Client::new();
/// let repos: Vec<Repo> = client
///     .get("https://api.example.com/repos")
///     .param("sort", "updated")
///     .send_json()
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client<T = HyperTransport, E = SerialExecutor> {
    dispatcher: Dispatcher<T, E>,
    config: Arc<ClientConfig>,
}

impl<T, E> std::fmt::Debug for Client<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Create a client with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration.
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let transport = HyperTransport::new(&config);
        Self::from_parts(transport, SerialExecutor::new(), config)
    }

    /// Create a builder for configuring the client.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }
}

impl<T, E> Client<T, E>
where
    T: Transport,
    E: CallbackExecutor,
{
    /// Assemble a client from a transport and a callback executor.
    #[must_use]
    pub fn from_parts(transport: T, executor: E, config: ClientConfig) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport, executor),
            config: Arc::new(config),
        }
    }

    /// Get the client configuration.
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Underlying dispatcher.
    #[must_use]
    pub const fn dispatcher(&self) -> &Dispatcher<T, E> {
        &self.dispatcher
    }

    /// Start a `GET` request.
    #[must_use]
    pub fn get(&self, url: impl Into<String>) -> Call<T, E> {
        self.request(Method::Get, url)
    }

    /// Start a `POST` request.
    #[must_use]
    pub fn post(&self, url: impl Into<String>) -> Call<T, E> {
        self.request(Method::Post, url)
    }

    /// Start a `PUT` request.
    #[must_use]
    pub fn put(&self, url: impl Into<String>) -> Call<T, E> {
        self.request(Method::Put, url)
    }

    /// Start a `PATCH` request.
    #[must_use]
    pub fn patch(&self, url: impl Into<String>) -> Call<T, E> {
        self.request(Method::Patch, url)
    }

    /// Start a `DELETE` request.
    #[must_use]
    pub fn delete(&self, url: impl Into<String>) -> Call<T, E> {
        self.request(Method::Delete, url)
    }

    /// Start a request with an explicit method.
    #[must_use]
    pub fn request(&self, method: Method, url: impl Into<String>) -> Call<T, E> {
        let builder = RequestBuilder::new(method, url)
            .text_encoding(self.config.text_encoding)
            .default_timeouts(self.config.request_timeout, self.config.upload_timeout);
        Call {
            client: self.clone(),
            builder,
        }
    }

    /// Number of keys with a transport call in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.dispatcher.in_flight()
    }

    /// Number of callers waiting on `key`.
    ///
    /// Keys are the resolved URL under [`KeyPolicy::Url`], or
    /// `"<METHOD> <url>"` under [`KeyPolicy::MethodAndUrl`].
    #[must_use]
    pub fn waiters(&self, key: &str) -> usize {
        self.dispatcher.waiters(key)
    }

    /// Submit an already resolved request.
    ///
    /// `on_complete` runs on the callback executor with `decoder`'s result.
    pub fn submit_request<D, F>(&self, request: Request, decoder: D, on_complete: F) -> Submission
    where
        D: Decoder,
        F: FnOnce(Result<D::Output>) + Send + 'static,
    {
        let key = request.coalescing_key(self.config.key_policy);
        self.dispatcher.submit(key, request, move |outcome| {
            on_complete(decoder.decode_outcome(outcome));
        })
    }
}

/// A request being assembled on a [`Client`].
///
/// Nothing is sent until one of the `send_*` methods or [`Call::submit`] is
/// called.
#[must_use = "a call does nothing until it is sent"]
pub struct Call<T = HyperTransport, E = SerialExecutor> {
    client: Client<T, E>,
    builder: RequestBuilder,
}

impl<T, E> std::fmt::Debug for Call<T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Call")
            .field("builder", &self.builder)
            .finish_non_exhaustive()
    }
}

impl<T, E> Call<T, E>
where
    T: Transport,
    E: CallbackExecutor,
{
    /// Add a parameter: query string for `GET`, multipart field otherwise.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.param(name, value);
        self
    }

    /// Add parameters in iteration order.
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.builder = self.builder.params(params);
        self
    }

    /// Set a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Set multiple headers.
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.builder = self.builder.headers(headers);
        self
    }

    /// Attach a file.
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.builder = self.builder.file(file);
        self
    }

    /// Attach several files.
    pub fn files(mut self, files: impl IntoIterator<Item = FileAttachment>) -> Self {
        self.builder = self.builder.files(files);
        self
    }

    /// Read a local file and attach it under `field_name`.
    ///
    /// The MIME type is resolved from the file extension.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if the file cannot be read.
    pub fn file_from_path(
        self,
        field_name: impl Into<String>,
        path: impl AsRef<Path>,
    ) -> Result<Self> {
        let file = FileAttachment::from_path(field_name, path)?;
        Ok(self.file(file))
    }

    /// Override the timeout for this request.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.builder = self.builder.timeout(timeout);
        self
    }

    /// Submit the call; `on_complete` runs on the client's callback executor.
    ///
    /// A request that cannot be built is reported through `on_complete` as
    /// [`Error::Encoding`] without reaching the transport.
    pub fn submit<D, F>(self, decoder: D, on_complete: F)
    where
        D: Decoder,
        F: FnOnce(Result<D::Output>) + Send + 'static,
    {
        match self.builder.build() {
            Ok(request) => {
                self.client.submit_request(request, decoder, on_complete);
            }
            Err(err) => {
                warn!(error = %err, "request could not be built");
                self.client
                    .dispatcher
                    .executor()
                    .execute(Box::new(move || on_complete(Err(err))));
            }
        }
    }

    /// Send and decode the response with `decoder`.
    ///
    /// # Errors
    ///
    /// Any [`Error`] variant; see [`crate::decode`] for the classification.
    pub async fn send_decoded<D: Decoder>(self, decoder: D) -> Result<D::Output> {
        let (tx, rx) = oneshot::channel();
        self.submit(decoder, move |result| {
            // The receiver may be gone if the caller stopped waiting.
            let _ = tx.send(result);
        });
        rx.await.unwrap_or_else(|_| {
            Err(Error::request_failed(
                FailureKind::Aborted,
                "completion was dropped before delivery",
            ))
        })
    }

    /// Send and decode a JSON body into `R`.
    ///
    /// # Errors
    ///
    /// Any [`Error`] variant; see [`crate::decode`] for the classification.
    pub async fn send_json<R>(self) -> Result<R>
    where
        R: serde::de::DeserializeOwned + Send + 'static,
    {
        self.send_decoded(Json::<R>::new()).await
    }

    /// Send, decode a JSON body into `R`, then map it through `transform`.
    ///
    /// `transform` returning `None` yields [`Error::Parse`].
    ///
    /// # Errors
    ///
    /// Any [`Error`] variant; see [`crate::decode`] for the classification.
    pub async fn send_with<R, O, F>(self, transform: F) -> Result<O>
    where
        R: serde::de::DeserializeOwned + 'static,
        O: Send + 'static,
        F: FnOnce(R) -> Option<O> + Send + 'static,
    {
        self.send_decoded(JsonWith::new(transform)).await
    }
}

/// Builder for [`Client`].
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use tandem::{Client, KeyPolicy};
///
/// let client = Client::builder()
///     .request_timeout(Duration::from_secs(10))
///     .key_policy(KeyPolicy::MethodAndUrl)
///     .with_logging()
///     .build();
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfigBuilder,
    layers: Vec<LayerFn>,
    logging: Option<Verbosity>,
}

impl std::fmt::Debug for ClientBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .field("logging", &self.logging)
            .finish()
    }
}

impl ClientBuilder {
    // ========================================================================
    // Core Configuration
    // ========================================================================

    /// Set the timeout for plain requests.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.request_timeout(timeout);
        self
    }

    /// Set the timeout for requests carrying files.
    #[must_use]
    pub fn upload_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.upload_timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Set the server certificate trust policy.
    #[must_use]
    pub fn trust_policy(mut self, policy: TrustPolicy) -> Self {
        self.config = self.config.trust_policy(policy);
        self
    }

    /// Accept every server certificate. Insecure, see
    /// [`TrustPolicy::DangerAcceptAll`].
    #[must_use]
    pub fn danger_accept_invalid_certs(self) -> Self {
        self.trust_policy(TrustPolicy::DangerAcceptAll)
    }

    /// Set the coalescing key policy.
    #[must_use]
    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.config = self.config.key_policy(policy);
        self
    }

    /// Set the multipart text encoding.
    #[must_use]
    pub fn text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.config = self.config.text_encoding(encoding);
        self
    }

    // ========================================================================
    // Middleware
    // ========================================================================

    /// Add a Tower layer around the transport.
    ///
    /// Layers are applied in order: first added = outermost. They wrap the
    /// single network exchange, so coalesced callers pass through once.
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Alias for [`ClientBuilder::layer`].
    #[must_use]
    pub fn with<L>(self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
        <L::Service as Service<Request>>::Future: Send + 'static,
    {
        self.layer(layer)
    }

    /// Log every network exchange with its coalescing key.
    ///
    /// The logging layer is outermost and uses the configured key policy.
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.logging = Some(Verbosity::Summary);
        self
    }

    /// Like [`ClientBuilder::with_logging`], adding header names, body size
    /// and timeout at debug level.
    #[must_use]
    pub fn with_debug_logging(mut self) -> Self {
        self.logging = Some(Verbosity::Detailed);
        self
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the client with the default callback executor.
    #[must_use]
    pub fn build(self) -> Client {
        self.build_with_executor(SerialExecutor::new())
    }

    /// Build the client delivering completions on `executor`.
    #[must_use]
    pub fn build_with_executor<E: CallbackExecutor>(
        self,
        executor: E,
    ) -> Client<HyperTransport, E> {
        let config = self.config.build();
        let mut layers = self.layers;
        if let Some(verbosity) = self.logging {
            let logging = LoggingLayer::new(verbosity).key_policy(config.key_policy);
            layers.insert(
                0,
                Arc::new(move |service: BoxedService| BoxCloneService::new(logging.layer(service))),
            );
        }
        let transport = HyperTransport::with_layers(&config, layers);
        Client::from_parts(transport, executor, config)
    }
}
