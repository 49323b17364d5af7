//! Coalescing HTTP request layer.
//!
//! Concurrent requests that resolve to the same key share one network
//! exchange: the first caller issues it, later callers join as waiters, and
//! every waiter receives the same outcome, decoded with its own [`Decoder`].
//! Completion callbacks run on a designated [`CallbackExecutor`].
//!
//! # Example
//!
//! ```no_run
//! use tandem::prelude::*;
//!
//! #[derive(Debug, Deserialize)]
//! pub struct User {
//!     id: u64,
//!     name: String,
//! }
//!
//! # async fn run() -> tandem::Result<()> {
//! let client = Client::new();
//!
//! // Both calls share a single GET.
//! let (a, b) = tokio::join!(
//!     client.get("https://api.example.com/users/42").send_json::<User>(),
//!     client.get("https://api.example.com/users/42").send_json::<User>(),
//! );
//! println!("{:?} {:?}", a?, b?);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connector;
mod dispatcher;
mod executor;
pub mod middleware;
pub mod prelude;
mod transport;

pub use client::{Call, Client, ClientBuilder};
pub use config::{ClientConfig, ClientConfigBuilder, TrustPolicy};
pub use dispatcher::{Dispatcher, Submission, Waiter};
pub use executor::{CALLBACK_THREAD_NAME, CallbackExecutor, InlineExecutor, Job, SerialExecutor};
pub use transport::{BoxedService, HyperTransport, ServiceFuture};

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use tandem_core::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT, Decoder, Error, ExtensionResolver,
    FailureKind, FileAttachment, Form, Json, JsonWith, KeyPolicy, Method, MimeResolver, Outcome,
    Part, Request, RequestBuilder, Response, Result, TextEncoding, Transport, decode,
    encode_multipart, from_json, mime_for_extension, resolve_url,
};
