//! Transport trait.
//!
//! A [`Transport`] performs one network exchange for a resolved
//! [`Request`]. The dispatcher in the `tandem` crate calls it at most once
//! per in-flight key; implement it directly for custom stacks or tests.

use std::future::Future;

use crate::{Request, Response, Result};

/// One network exchange.
///
/// Implementations report network failures that yield no HTTP response as
/// [`crate::Error::RequestFailed`]. Any status code, including 4xx and 5xx,
/// is a successful exchange and comes back as `Ok`.
///
/// Requests from [`crate::RequestBuilder`] carry validated headers and URL.
/// A request assembled with [`Request::new`] that cannot be put on the wire
/// may be rejected with [`crate::Error::Encoding`] without any I/O.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
///
/// use bytes::Bytes;
/// use tandem_core::{Request, Response, Result, Transport};
///
/// #[derive(Clone)]
/// struct Canned;
///
/// impl Transport for Canned {
///     async fn execute(&self, _request: Request) -> Result<Response> {
///         Ok(Response::new(200, HashMap::new(), Bytes::from_static(b"{}")))
///     }
/// }
/// ```
pub trait Transport: Clone + Send + Sync + 'static {
    /// Execute the request and return the buffered response.
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}
