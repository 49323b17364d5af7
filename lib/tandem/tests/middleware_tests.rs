//! Tests for tower layers wrapped around the transport.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;

use tandem::middleware::{ConcurrencyLimitLayer, Layer, LoggingLayer, Verbosity};
use tandem::{Client, Error, Request, RequestBuilder, Response, Result};
use tower::Service;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

/// Counts exchanges and stamps a header on each outgoing request.
#[derive(Clone)]
struct StampLayer {
    seen: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Stamp<S> {
    inner: S,
    seen: Arc<AtomicUsize>,
}

impl<S> Layer<S> for StampLayer {
    type Service = Stamp<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Stamp {
            inner,
            seen: Arc::clone(&self.seen),
        }
    }
}

impl<S> Service<Request> for Stamp<S>
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
        let exchange = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        let (method, url, mut headers, body, timeout) = request.into_parts();
        headers.insert("X-Exchange".to_string(), exchange.to_string());
        let request = Request::new(method, url, headers, body, timeout);

        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move { inner.call(request).await })
    }
}

#[tokio::test]
async fn test_layer_sees_each_request() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/stamped"))
        .and(header("X-Exchange", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let seen = Arc::new(AtomicUsize::new(0));
    let client = Client::builder()
        .layer(StampLayer {
            seen: Arc::clone(&seen),
        })
        .build();

    let value: serde_json::Value = client
        .get(format!("{}/stamped", mock_server.uri()))
        .send_json()
        .await
        .expect("response");

    assert_eq!(value["ok"], true);
    assert_eq!(seen.load(Ordering::SeqCst), 1);
}

/// Coalesced callers pass through the middleware stack once.
#[tokio::test]
async fn test_coalesced_group_passes_layers_once() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/shared"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!([1, 2]))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let seen = Arc::new(AtomicUsize::new(0));
    let client = Client::builder()
        .with_logging()
        .layer(StampLayer {
            seen: Arc::clone(&seen),
        })
        .build();
    let url = format!("{}/shared", mock_server.uri());

    let (a, b, c) = tokio::join!(
        client.get(&url).send_json::<Vec<u8>>(),
        client.get(&url).send_json::<Vec<u8>>(),
        client.get(&url).send_json::<Vec<u8>>(),
    );

    for result in [a, b, c] {
        assert_eq!(result.expect("shared result"), vec![1, 2]);
    }
    assert_eq!(seen.load(Ordering::SeqCst), 1);
    mock_server.verify().await;
}

/// Tracks how many exchanges are running at once.
#[derive(Clone, Default)]
struct PeakLayer {
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

#[derive(Clone)]
struct Peak<S> {
    inner: S,
    layer: PeakLayer,
}

impl<S> Layer<S> for PeakLayer {
    type Service = Peak<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Peak {
            inner,
            layer: self.clone(),
        }
    }
}

impl<S> Service<Request> for Peak<S>
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
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let PeakLayer { active, peak } = self.layer.clone();
        Box::pin(async move {
            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            let result = inner.call(request).await;
            active.fetch_sub(1, Ordering::SeqCst);
            result
        })
    }
}

fn slow_true() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_json(serde_json::json!(true))
        .set_delay(Duration::from_millis(200))
}

#[tokio::test]
async fn test_exchanges_overlap_without_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(slow_true())
        .mount(&mock_server)
        .await;

    let peak = PeakLayer::default();
    let client = Client::builder().layer(peak.clone()).build();

    let (a, b) = tokio::join!(
        client.get(format!("{}/a", mock_server.uri())).send_json::<bool>(),
        client.get(format!("{}/b", mock_server.uri())).send_json::<bool>(),
    );

    assert!(a.expect("a"));
    assert!(b.expect("b"));
    assert_eq!(peak.peak.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_concurrency_limit_layer_serializes_exchanges() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(slow_true())
        .expect(2)
        .mount(&mock_server)
        .await;

    let peak = PeakLayer::default();
    let client = Client::builder()
        .with_logging()
        .layer(ConcurrencyLimitLayer::new(1))
        .layer(peak.clone())
        .build();

    let started = std::time::Instant::now();
    let (a, b) = tokio::join!(
        client.get(format!("{}/a", mock_server.uri())).send_json::<bool>(),
        client.get(format!("{}/b", mock_server.uri())).send_json::<bool>(),
    );

    assert!(a.expect("a"));
    assert!(b.expect("b"));
    assert_eq!(peak.peak.load(Ordering::SeqCst), 1);
    assert!(started.elapsed() >= Duration::from_millis(400));
    mock_server.verify().await;
}

#[tokio::test]
async fn test_explicit_logging_layer_above_limit() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(slow_true())
        .mount(&mock_server)
        .await;

    let peak = PeakLayer::default();
    let client = Client::builder()
        .layer(LoggingLayer::new(Verbosity::Detailed))
        .layer(ConcurrencyLimitLayer::new(1))
        .with(peak.clone())
        .build();

    let (a, b) = tokio::join!(
        client.get(format!("{}/a", mock_server.uri())).send_json::<bool>(),
        client.get(format!("{}/b", mock_server.uri())).send_json::<bool>(),
    );

    assert!(a.expect("a"));
    assert!(b.expect("b"));
    assert_eq!(peak.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_resolved_request_submission() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": 1})))
        .mount(&mock_server)
        .await;

    let client = Client::builder().with_logging().build();
    let url = format!("{}/users/1", mock_server.uri());
    let request = RequestBuilder::new(tandem::Method::Patch, url)
        .param("name", "Bob")
        .build()
        .expect("request");

    let (tx, rx) = tokio::sync::oneshot::channel();
    client.submit_request(request, tandem::Json::<serde_json::Value>::new(), move |result| {
        tx.send(result).ok();
    });

    let value = rx.await.expect("delivered").expect("value");
    assert_eq!(value["id"], 1);
}
