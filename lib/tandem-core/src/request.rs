//! Request descriptors and the builder that resolves them.
//!
//! A [`RequestBuilder`] collects a raw URL, parameters, headers and files;
//! [`RequestBuilder::build`] turns them into a transport-ready [`Request`]:
//!
//! - `GET`: parameters become the query string (see [`crate::resolve_url`]).
//! - other methods: parameters and files become a `multipart/form-data` body,
//!   even when no file is attached.
//!
//! # Example
//!
//! ```
//! use tandem_core::{Method, RequestBuilder};
//!
//! let request = RequestBuilder::new(Method::Get, "https://api.example.com/search")
//!     .param("q", "rust")
//!     .header("Accept", "application/json")
//!     .build()
//!     .expect("valid request");
//!
//! assert_eq!(request.url().as_str(), "https://api.example.com/search?q=rust");
//! ```

use std::collections::HashMap;
use std::time::Duration;

use bytes::Bytes;

use crate::multipart::{FileAttachment, Form, TextEncoding};
use crate::{Error, Method, Result};

/// Default timeout for plain requests.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for requests carrying file attachments.
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// What makes two requests "the same" for coalescing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyPolicy {
    /// Resolved URL only. A `GET` and a `POST` to the same URL share a key.
    #[default]
    Url,
    /// Method and resolved URL.
    MethodAndUrl,
}

/// A fully resolved HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: url::Url,
    headers: HashMap<String, String>,
    body: Option<Bytes>,
    timeout: Duration,
}

impl Request {
    /// Create a request from resolved parts.
    #[must_use]
    pub fn new(
        method: Method,
        url: url::Url,
        headers: HashMap<String, String>,
        body: Option<Bytes>,
        timeout: Duration,
    ) -> Self {
        Self {
            method,
            url,
            headers,
            body,
            timeout,
        }
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> Method {
        self.method
    }

    /// Resolved request URL.
    #[must_use]
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Single header value by exact name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        self.body.as_ref()
    }

    /// Timeout the transport applies to this exchange.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Coalescing key under `policy`.
    #[must_use]
    pub fn coalescing_key(&self, policy: KeyPolicy) -> String {
        match policy {
            KeyPolicy::Url => self.url.to_string(),
            KeyPolicy::MethodAndUrl => format!("{} {}", self.method, self.url),
        }
    }

    /// Consume into (method, url, headers, body, timeout).
    #[must_use]
    pub fn into_parts(
        self,
    ) -> (
        Method,
        url::Url,
        HashMap<String, String>,
        Option<Bytes>,
        Duration,
    ) {
        (self.method, self.url, self.headers, self.body, self.timeout)
    }
}

/// Builder for [`Request`].
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    method: Method,
    raw_url: String,
    params: Vec<(String, String)>,
    headers: HashMap<String, String>,
    files: Vec<FileAttachment>,
    encoding: TextEncoding,
    request_timeout: Duration,
    upload_timeout: Duration,
    timeout: Option<Duration>,
}

impl RequestBuilder {
    /// Creates a new builder for `raw_url`, which is encoded at build time.
    #[must_use]
    pub fn new(method: Method, raw_url: impl Into<String>) -> Self {
        Self {
            method,
            raw_url: raw_url.into(),
            params: Vec::new(),
            headers: HashMap::new(),
            files: Vec::new(),
            encoding: TextEncoding::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            upload_timeout: DEFAULT_UPLOAD_TIMEOUT,
            timeout: None,
        }
    }

    /// Adds a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }

    /// Adds parameters in iteration order.
    #[must_use]
    pub fn params<K, V>(mut self, params: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.params
            .extend(params.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Sets multiple headers.
    #[must_use]
    pub fn headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Attaches a file. Only valid for methods with a body.
    #[must_use]
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.files.push(file);
        self
    }

    /// Attaches several files.
    #[must_use]
    pub fn files(mut self, files: impl IntoIterator<Item = FileAttachment>) -> Self {
        self.files.extend(files);
        self
    }

    /// Text encoding for multipart names and values.
    #[must_use]
    pub const fn text_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Default timeouts for plain requests and uploads.
    #[must_use]
    pub const fn default_timeouts(mut self, request: Duration, upload: Duration) -> Self {
        self.request_timeout = request;
        self.upload_timeout = upload;
        self
    }

    /// Overrides the timeout for this request.
    #[must_use]
    pub const fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Returns `true` if this request will upload files.
    #[must_use]
    pub fn is_upload(&self) -> bool {
        !self.files.is_empty()
    }

    /// Resolves the [`Request`].
    ///
    /// Fails with [`Error::Encoding`] when a header name or value is not
    /// valid HTTP, the URL does not encode to a valid URL, a `GET` carries
    /// files, or the multipart body cannot be encoded.
    pub fn build(self) -> Result<Request> {
        for (name, value) in &self.headers {
            check_header(name, value)?;
        }

        let upload = self.is_upload();
        let timeout = self.timeout.unwrap_or(if upload {
            self.upload_timeout
        } else {
            self.request_timeout
        });
        let mut headers = self.headers;

        if !self.method.has_body() {
            if upload {
                return Err(Error::encoding("GET requests cannot carry file attachments"));
            }
            let params = self.params.iter().map(|(k, v)| (k, v));
            let url = crate::resolve_url(&self.raw_url, params)?;
            return Ok(Request::new(self.method, url, headers, None, timeout));
        }

        let url = crate::resolve_url(&self.raw_url, std::iter::empty::<(&str, &str)>())?;
        if self.params.is_empty() && self.files.is_empty() {
            return Ok(Request::new(self.method, url, headers, None, timeout));
        }

        let form = self
            .params
            .into_iter()
            .fold(Form::new(self.encoding), |form, (name, value)| {
                form.text(name, value)
            });
        let form = self.files.into_iter().fold(form, Form::file);
        let body = form.encode()?;

        headers.retain(|name, _| !name.eq_ignore_ascii_case("content-type"));
        headers.insert("Content-Type".to_string(), form.content_type());

        Ok(Request::new(self.method, url, headers, Some(body), timeout))
    }
}

fn check_header(name: &str, value: &str) -> Result<()> {
    http::HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| Error::encoding(format!("header name {name:?}: {e}")))?;
    http::HeaderValue::from_str(value)
        .map_err(|e| Error::encoding(format!("value of header {name:?}: {e}")))?;
    Ok(())
}
