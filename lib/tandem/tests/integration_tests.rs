//! Integration tests for `Client` against a wiremock server.

use std::time::Duration;

use assert2::{check, let_assert};
use serde::{Deserialize, Serialize};
use tandem::{CALLBACK_THREAD_NAME, Client, Error, FailureKind, FileAttachment, Json};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path, query_param},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct User {
    id: u64,
    name: String,
}

fn alice() -> User {
    User {
        id: 1,
        name: "Alice".to_string(),
    }
}

#[tokio::test]
async fn test_get_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .and(header("Accept", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice()))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let user: User = client
        .get(format!("{}/users/1", mock_server.uri()))
        .header("Accept", "application/json")
        .send_json()
        .await
        .expect("user");

    assert_eq!(user, alice());
}

#[tokio::test]
async fn test_query_parameters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!(["tandem"])))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let results: Vec<String> = client
        .get(format!("{}/search", mock_server.uri()))
        .params([("q", "rust lang"), ("page", "1")])
        .send_json()
        .await
        .expect("results");

    assert_eq!(results, vec!["tandem".to_string()]);

    let received = mock_server.received_requests().await.expect("recording");
    let_assert!(Some(request) = received.first());
    check!(request.url.query() == Some("q=rust%20lang&page=1"));
}

#[tokio::test]
async fn test_params_append_to_existing_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("lang", "en"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let results: Vec<String> = client
        .get(format!("{}/search?lang=en", mock_server.uri()))
        .param("page", "2")
        .send_json()
        .await
        .expect("results");

    assert!(results.is_empty());
}

#[tokio::test]
async fn test_post_params_are_multipart() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(alice()))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let user: User = client
        .post(format!("{}/users", mock_server.uri()))
        .param("name", "Alice")
        .send_json()
        .await
        .expect("user");
    assert_eq!(user, alice());

    let received = mock_server.received_requests().await.expect("recording");
    let_assert!(Some(request) = received.first());
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .expect("content type");
    let_assert!(Some(boundary) = content_type.strip_prefix("multipart/form-data; boundary="));
    check!(boundary.starts_with("----TandemBoundary"));

    let body = String::from_utf8(request.body.clone()).expect("utf8 body");
    let expected = format!(
        "--{boundary}\r\n\
         Content-Disposition: form-data; name=\"name\"\r\n\r\n\
         Alice\r\n\
         --{boundary}--\r\n"
    );
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_file_upload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/avatar"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let ok = client
        .put(format!("{}/avatar", mock_server.uri()))
        .param("user", "1")
        .file(FileAttachment::new(
            "avatar",
            "me.png",
            "image/png",
            bytes::Bytes::from_static(b"\x89PNG\r\n"),
        ))
        .send_with(|value: serde_json::Value| value.get("ok").and_then(serde_json::Value::as_bool))
        .await
        .expect("ok");
    assert!(ok);

    let received = mock_server.received_requests().await.expect("recording");
    let_assert!(Some(request) = received.first());
    let body = &request.body;
    let needle = b"Content-Disposition: form-data; name=\"avatar\"; filename=\"me.png\"\r\n\
        Content-Type: image/png\r\n\r\n\x89PNG\r\n\r\n";
    check!(body.windows(needle.len()).any(|window| window == needle));
    let field = b"Content-Disposition: form-data; name=\"user\"\r\n\r\n1\r\n";
    check!(body.windows(field.len()).any(|window| window == field));
}

#[tokio::test]
async fn test_unsuccessful_response_carries_payload() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/404"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_json(serde_json::json!({"message": "no such user"})),
        )
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let err = client
        .get(format!("{}/users/404", mock_server.uri()))
        .send_json::<User>()
        .await
        .expect_err("404");

    check!(err.is_not_found());
    check!(err.status() == Some(404));
    let_assert!(Some(payload) = err.payload());
    check!(payload["message"] == "no such user");
}

#[tokio::test]
async fn test_unsuccessful_response_with_plain_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let err = client
        .get(format!("{}/broken", mock_server.uri()))
        .send_json::<User>()
        .await
        .expect_err("500");

    let_assert!(Error::UnsuccessfulResponse { status, payload, body } = err);
    check!(status == 500);
    check!(payload.is_none());
    check!(body.as_ref() == b"Internal Server Error");
}

#[tokio::test]
async fn test_empty_success_body_is_invalid_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let err = client
        .delete(format!("{}/users/1", mock_server.uri()))
        .send_json::<User>()
        .await
        .expect_err("empty body");

    let_assert!(Error::InvalidData { status: 204 } = err);
}

#[tokio::test]
async fn test_decode_error_names_the_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "one", "name": "A"})),
        )
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let err = client
        .get(format!("{}/users/1", mock_server.uri()))
        .send_json::<User>()
        .await
        .expect_err("type mismatch");

    let_assert!(Error::Decode { status, path, .. } = err);
    check!(status == 200);
    check!(path == "id");
}

#[tokio::test]
async fn test_rejecting_transform_is_parse_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let err = client
        .get(format!("{}/users", mock_server.uri()))
        .send_with(|users: Vec<User>| users.into_iter().next())
        .await
        .expect_err("no first user");

    let_assert!(Error::Parse { status: 200 } = err);
}

#[tokio::test]
async fn test_connection_refused() {
    let client = Client::new();

    let err = client
        .get("http://127.0.0.1:1/users")
        .send_json::<User>()
        .await
        .expect_err("expected connection error");

    check!(err.is_request_failed(), "expected request failure, got: {err}");
    check!(err.status().is_none());
    check!(err.failure_kind() == Some(FailureKind::Connect));
}

#[tokio::test]
async fn test_invalid_url_is_encoding_error() {
    let client = Client::new();

    let err = client
        .get("not a url")
        .send_json::<User>()
        .await
        .expect_err("invalid url");

    check!(err.is_encoding());
    check!(client.in_flight() == 0);
}

#[tokio::test]
async fn test_timeout() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&mock_server)
        .await;

    let client = Client::builder()
        .request_timeout(Duration::from_millis(100))
        .build();

    let err = client
        .get(format!("{}/slow", mock_server.uri()))
        .send_json::<User>()
        .await
        .expect_err("expected timeout");

    check!(err.failure_kind() == Some(FailureKind::Timeout), "got: {err}");
}

#[tokio::test]
async fn test_per_call_timeout_override() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(alice())
                .set_delay(Duration::from_millis(300)),
        )
        .mount(&mock_server)
        .await;

    let client = Client::new();

    let err = client
        .get(format!("{}/slow", mock_server.uri()))
        .timeout(Duration::from_millis(50))
        .send_json::<User>()
        .await
        .expect_err("expected timeout");

    check!(err.failure_kind() == Some(FailureKind::Timeout));
}

#[tokio::test]
async fn test_concurrent_identical_gets_share_one_exchange() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(alice())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let url = format!("{}/users/1", mock_server.uri());

    let (a, b, c) = tokio::join!(
        client.get(&url).send_json::<User>(),
        client.get(&url).send_json::<User>(),
        client.get(&url).send_with(|user: User| Some(user.name)),
    );

    check!(a.expect("a") == alice());
    check!(b.expect("b") == alice());
    check!(c.expect("c") == "Alice");
    check!(client.in_flight() == 0);

    mock_server.verify().await;
}

#[tokio::test]
async fn test_callbacks_run_on_callback_thread() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(alice()))
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let (tx, rx) = tokio::sync::oneshot::channel();

    client
        .get(format!("{}/users/1", mock_server.uri()))
        .submit(Json::<User>::new(), move |result| {
            let thread = std::thread::current().name().map(str::to_string);
            tx.send((thread, result.ok())).ok();
        });

    let (thread, user) = rx.await.expect("callback ran");
    check!(thread.as_deref() == Some(CALLBACK_THREAD_NAME));
    check!(user == Some(alice()));
}

#[tokio::test]
async fn test_logging_middleware_is_transparent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/logged"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"logged": true})))
        .mount(&mock_server)
        .await;

    let client = Client::builder().with_debug_logging().build();

    let value: serde_json::Value = client
        .get(format!("{}/logged", mock_server.uri()))
        .send_json()
        .await
        .expect("response");

    check!(value["logged"] == true);
}

#[tokio::test]
async fn test_invalid_header_fails_only_its_caller() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(alice())
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = Client::new();
    let url = format!("{}/users/1", mock_server.uri());

    let (bad, first, second) = tokio::join!(
        client.get(&url).header("bad header", "1").send_json::<User>(),
        client.get(&url).header("Accept", "application/json").send_json::<User>(),
        client.get(&url).header("Accept", "application/json").send_json::<User>(),
    );

    let_assert!(Err(err) = bad);
    check!(err.is_encoding(), "got: {err}");
    check!(first.expect("first") == alice());
    check!(second.expect("second") == alice());
    check!(client.in_flight() == 0);

    mock_server.verify().await;
}

#[derive(Debug, PartialEq, Eq)]
struct Part {
    name: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    data: bytes::Bytes,
}

async fn read_multipart(content_type: &str, body: Vec<u8>) -> Vec<Part> {
    let boundary = multer::parse_boundary(content_type).expect("boundary");
    let stream = futures_util::stream::once(async move {
        Ok::<_, std::convert::Infallible>(bytes::Bytes::from(body))
    });
    let mut multipart = multer::Multipart::new(stream, boundary);

    let mut parts = Vec::new();
    while let Some(field) = multipart.next_field().await.expect("well-formed field") {
        let name = field.name().map(str::to_string);
        let file_name = field.file_name().map(str::to_string);
        let content_type = field.content_type().map(ToString::to_string);
        let data = field.bytes().await.expect("field bytes");
        parts.push(Part {
            name,
            file_name,
            content_type,
            data,
        });
    }
    parts
}

#[tokio::test]
async fn test_multipart_body_parses_back() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let image = bytes::Bytes::from_static(b"\x89PNG\r\n\x1a\n\x00\xff--\r\n");
    let client = Client::new();
    let value: serde_json::Value = client
        .post(format!("{}/profile", mock_server.uri()))
        .params([("name", "Zoë"), ("note", "a=b&c=d")])
        .file(FileAttachment::new("avatar", "me.png", "image/png", image.clone()))
        .send_json()
        .await
        .expect("response");
    check!(value["ok"] == true);

    let received = mock_server.received_requests().await.expect("recording");
    let_assert!(Some(request) = received.first());
    let content_type = request
        .headers
        .get("content-type")
        .and_then(|value| value.to_str().ok())
        .expect("content type");
    let parts = read_multipart(content_type, request.body.clone()).await;

    let_assert!([name, note, avatar] = parts.as_slice());
    check!(name.name.as_deref() == Some("name"));
    check!(name.file_name.is_none());
    check!(name.data.as_ref() == "Zoë".as_bytes());
    check!(note.name.as_deref() == Some("note"));
    check!(note.data.as_ref() == b"a=b&c=d");
    check!(avatar.name.as_deref() == Some("avatar"));
    check!(avatar.file_name.as_deref() == Some("me.png"));
    check!(avatar.content_type.as_deref() == Some("image/png"));
    check!(avatar.data == image);
}
