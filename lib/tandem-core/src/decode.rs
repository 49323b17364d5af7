//! Response decoding.
//!
//! Classification of a transport outcome:
//!
//! | Outcome | Result |
//! |---------|--------|
//! | no HTTP response | the transport's [`Error::RequestFailed`] |
//! | 2xx, empty body | [`Error::InvalidData`] |
//! | 2xx, JSON does not match | [`Error::Decode`] |
//! | 2xx, transform returns `None` | [`Error::Parse`] |
//! | 2xx, transform returns `Some` | `Ok(value)` |
//! | non-2xx | [`Error::UnsuccessfulResponse`] |

use std::marker::PhantomData;

use crate::{Error, Response, Result};

/// What a transport call produced: a response or a transport-level error.
pub type Outcome = Result<Response>;

/// Turns a transport outcome into a typed result.
///
/// A decoder is consumed once per waiter: callers coalesced onto the same
/// transport call each bring their own decoder and run it over the shared
/// outcome.
pub trait Decoder: Send + 'static {
    /// Decoded value type.
    type Output: Send + 'static;

    /// Decode a received HTTP response.
    fn decode(self, response: &Response) -> Result<Self::Output>;

    /// Decode a transport outcome, passing transport errors through.
    fn decode_outcome(self, outcome: &Outcome) -> Result<Self::Output>
    where
        Self: Sized,
    {
        match outcome {
            Ok(response) => self.decode(response),
            Err(err) => Err(err.clone()),
        }
    }
}

/// Decodes a JSON body straight into `T`.
pub struct Json<T>(PhantomData<fn() -> T>);

impl<T> Json<T> {
    /// Create a JSON decoder for `T`.
    #[must_use]
    pub const fn new() -> Self {
        Self(PhantomData)
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Json")
            .field(&std::any::type_name::<T>())
            .finish()
    }
}

impl<T> Decoder for Json<T>
where
    T: serde::de::DeserializeOwned + Send + 'static,
{
    type Output = T;

    fn decode(self, response: &Response) -> Result<T> {
        decode(response.status(), response.body(), Some)
    }
}

/// Decodes a JSON body into `R`, then maps it through a transform that may
/// reject the value.
pub struct JsonWith<R, F> {
    transform: F,
    _raw: PhantomData<fn() -> R>,
}

impl<R, F> JsonWith<R, F> {
    /// Create a decoder from a transform over the raw decoded value.
    #[must_use]
    pub const fn new(transform: F) -> Self {
        Self {
            transform,
            _raw: PhantomData,
        }
    }
}

impl<R, T, F> Decoder for JsonWith<R, F>
where
    R: serde::de::DeserializeOwned + 'static,
    T: Send + 'static,
    F: FnOnce(R) -> Option<T> + Send + 'static,
{
    type Output = T;

    fn decode(self, response: &Response) -> Result<T> {
        decode(response.status(), response.body(), self.transform)
    }
}

/// Decode a status and body into `T` through `transform`.
///
/// # Example
///
/// ```
/// use tandem_core::{Error, decode};
///
/// let even = |n: u32| (n % 2 == 0).then_some(n);
///
/// assert_eq!(decode(200, b"4", even).expect("even"), 4);
/// assert!(matches!(decode(200, b"3", even), Err(Error::Parse { status: 200 })));
/// assert!(matches!(decode(200, b"", even), Err(Error::InvalidData { status: 200 })));
/// ```
pub fn decode<R, T, F>(status: u16, body: &[u8], transform: F) -> Result<T>
where
    R: serde::de::DeserializeOwned,
    F: FnOnce(R) -> Option<T>,
{
    if !(200..300).contains(&status) {
        return Err(Error::unsuccessful(
            status,
            bytes::Bytes::copy_from_slice(body),
        ));
    }
    if body.is_empty() {
        return Err(Error::InvalidData { status });
    }
    let raw = from_json(status, body)?;
    transform(raw).ok_or(Error::Parse { status })
}

/// Deserialize JSON bytes with path-aware error messages.
///
/// Uses `serde_path_to_error` so a failure names the exact field
/// (e.g. `user.address.city`).
pub fn from_json<T: serde::de::DeserializeOwned>(status: u16, bytes: &[u8]) -> Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer)
        .map_err(|e| Error::decode(status, e.path().to_string(), e.inner().to_string()))
}
