//! Error types for tandem.
//!
//! Every request attempt ends in exactly one [`Error`] or a decoded value.
//! Errors are [`Clone`] because a single failed transport call is reported
//! to every caller that was coalesced onto it.

use bytes::Bytes;
use derive_more::{Display, Error};

/// Why a transport call produced no usable HTTP response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum FailureKind {
    /// The connection could not be established.
    #[display("connect")]
    Connect,
    /// The TLS handshake or certificate validation failed.
    #[display("tls")]
    Tls,
    /// The per-request timeout elapsed.
    #[display("timeout")]
    Timeout,
    /// The response body could not be read.
    #[display("body")]
    Body,
    /// The transport task ended without reporting a result.
    #[display("aborted")]
    Aborted,
    /// No async runtime was available to run the transport call.
    #[display("runtime")]
    Runtime,
    /// Any other transport failure.
    #[display("other")]
    Other,
}

/// Main error type for tandem operations.
#[derive(Debug, Clone, Display, Error)]
pub enum Error {
    /// The transport returned no usable HTTP response.
    #[display("request failed ({kind}): {message}")]
    RequestFailed {
        /// Failure category.
        kind: FailureKind,
        /// Underlying transport error message.
        message: String,
    },

    /// A 2xx response arrived without a body.
    #[display("invalid data: HTTP {status} response has an empty body")]
    InvalidData {
        /// HTTP status code.
        status: u16,
    },

    /// The server answered with a non-2xx status.
    #[display("unsuccessful response: HTTP {status}")]
    UnsuccessfulResponse {
        /// HTTP status code.
        status: u16,
        /// Response body parsed as generic JSON, when it parses.
        #[error(not(source))]
        payload: Option<serde_json::Value>,
        /// Raw response body.
        #[error(not(source))]
        body: Bytes,
    },

    /// A 2xx body could not be decoded into the requested type.
    #[display("decode error (HTTP {status}) at '{path}': {message}")]
    Decode {
        /// HTTP status code.
        status: u16,
        /// JSON path to the failing element (e.g. `user.address.city`).
        path: String,
        /// Decoder message.
        message: String,
    },

    /// A 2xx body decoded, but the caller's transform rejected the value.
    #[display("parse error: HTTP {status} response rejected by transform")]
    Parse {
        /// HTTP status code.
        status: u16,
    },

    /// The request could not be constructed (URL or multipart encoding).
    #[display("encoding error: {_0}")]
    Encoding(#[error(not(source))] String),
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a request-failed error.
    #[must_use]
    pub fn request_failed(kind: FailureKind, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            kind,
            message: message.into(),
        }
    }

    /// Create an unsuccessful-response error, parsing the body for a
    /// diagnostic JSON payload.
    #[must_use]
    pub fn unsuccessful(status: u16, body: Bytes) -> Self {
        let payload = serde_json::from_slice(&body).ok();
        Self::UnsuccessfulResponse {
            status,
            payload,
            body,
        }
    }

    /// Create a decode error.
    #[must_use]
    pub fn decode(status: u16, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            status,
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an encoding error.
    #[must_use]
    pub fn encoding(message: impl Into<String>) -> Self {
        Self::Encoding(message.into())
    }

    /// HTTP status code, when a response was received.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidData { status }
            | Self::UnsuccessfulResponse { status, .. }
            | Self::Decode { status, .. }
            | Self::Parse { status } => Some(*status),
            Self::RequestFailed { .. } | Self::Encoding(_) => None,
        }
    }

    /// Failure category, if this is a [`Error::RequestFailed`].
    #[must_use]
    pub const fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            Self::RequestFailed { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Returns `true` if the transport produced no HTTP response.
    #[must_use]
    pub const fn is_request_failed(&self) -> bool {
        matches!(self, Self::RequestFailed { .. })
    }

    /// Returns `true` if the request could not be constructed.
    #[must_use]
    pub const fn is_encoding(&self) -> bool {
        matches!(self, Self::Encoding(_))
    }

    /// Returns `true` if this is a 404 Not Found response.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnsuccessfulResponse { status: 404, .. })
    }

    /// Diagnostic JSON payload of an unsuccessful response.
    #[must_use]
    pub const fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::UnsuccessfulResponse { payload, .. } => payload.as_ref(),
            _ => None,
        }
    }

    /// Raw body of an unsuccessful response.
    #[must_use]
    pub const fn body(&self) -> Option<&Bytes> {
        match self {
            Self::UnsuccessfulResponse { body, .. } => Some(body),
            _ => None,
        }
    }

    /// Try to decode the body of an unsuccessful response as `T`.
    ///
    /// Returns `None` if this is not an [`Error::UnsuccessfulResponse`].
    ///
    /// # Example
    ///
    /// ```
    /// use bytes::Bytes;
    /// use serde::Deserialize;
    /// use tandem_core::Error;
    ///
    /// #[derive(Debug, Deserialize)]
    /// struct ApiError { code: String }
    ///
    /// let err = Error::unsuccessful(409, Bytes::from(r#"{"code":"conflict"}"#));
    /// let api: ApiError = err.decode_body().expect("unsuccessful").expect("decodes");
    /// assert_eq!(api.code, "conflict");
    /// ```
    pub fn decode_body<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T>> {
        let status = self.status()?;
        self.body().map(|body| crate::decode::from_json(status, body))
    }
}
