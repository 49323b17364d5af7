//! Core types for the tandem coalescing HTTP request layer.
//!
//! This crate is free of I/O and runtime concerns:
//! - [`Method`] - HTTP method enum
//! - [`RequestBuilder`] and [`Request`] - URL/query encoding and body assembly
//! - [`Form`], [`Part`] and [`FileAttachment`] - `multipart/form-data` encoding
//! - [`MimeResolver`] - MIME types for local files
//! - [`Response`] - buffered HTTP response
//! - [`Decoder`], [`Json`] and [`JsonWith`] - typed response decoding
//! - [`Error`] and [`Result`] - error taxonomy
//! - [`Transport`] - the network exchange seam

mod decode;
mod error;
mod method;
pub mod mime;
mod multipart;
mod query;
mod request;
mod response;
mod transport;

pub use decode::{Decoder, Json, JsonWith, Outcome, decode, from_json};
pub use error::{Error, FailureKind, Result};
pub use method::Method;
pub use mime::{ExtensionResolver, MimeResolver, mime_for_extension};
pub use multipart::{FileAttachment, Form, Part, TextEncoding, encode as encode_multipart};
pub use query::{QUERY_ENCODE_SET, append_query, build_query, encode_url, resolve_url};
pub use request::{
    DEFAULT_REQUEST_TIMEOUT, DEFAULT_UPLOAD_TIMEOUT, KeyPolicy, Request, RequestBuilder,
};
pub use response::Response;
pub use transport::Transport;
