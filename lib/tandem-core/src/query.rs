//! Query string construction and whole-URL percent-encoding.
//!
//! Encoding happens in two stages. First, parameters are joined verbatim as
//! `key=value` pairs separated by `&`. Then the complete URL string is
//! percent-encoded once. Keys and values are never escaped on their own, so
//! a value containing `&` or `=` changes the shape of the query.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use url::Url;

use crate::{Error, Result};

/// Bytes that are percent-encoded by [`encode_url`].
///
/// Everything except ASCII alphanumerics and `!$&'()*+,-./:;=?@_~`.
/// Non-ASCII characters are always encoded as UTF-8.
pub const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'$')
    .remove(b'&')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'*')
    .remove(b'+')
    .remove(b',')
    .remove(b'-')
    .remove(b'.')
    .remove(b'/')
    .remove(b':')
    .remove(b';')
    .remove(b'=')
    .remove(b'?')
    .remove(b'@')
    .remove(b'_')
    .remove(b'~');

/// Join parameters into `k1=v1&k2=v2`, in iteration order, without escaping.
///
/// # Example
///
/// ```
/// use tandem_core::build_query;
///
/// assert_eq!(build_query([("a", "1"), ("b", "2")]), "a=1&b=2");
/// ```
pub fn build_query<K, V>(params: impl IntoIterator<Item = (K, V)>) -> String
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", key.as_ref(), value.as_ref()))
        .collect::<Vec<_>>()
        .join("&")
}

/// Append a raw query string to a raw URL.
#[must_use]
pub fn append_query(raw_url: &str, query: &str) -> String {
    if query.is_empty() {
        return raw_url.to_string();
    }
    let separator = if raw_url.contains('?') { '&' } else { '?' };
    format!("{raw_url}{separator}{query}")
}

/// Percent-encode a complete URL string in one pass.
#[must_use]
pub fn encode_url(raw: &str) -> String {
    utf8_percent_encode(raw, QUERY_ENCODE_SET).to_string()
}

/// Resolve a raw URL and optional query parameters into a parsed [`Url`].
///
/// Fails with [`Error::Encoding`] when the encoded string is not a valid URL.
pub fn resolve_url<K, V>(raw_url: &str, params: impl IntoIterator<Item = (K, V)>) -> Result<Url>
where
    K: AsRef<str>,
    V: AsRef<str>,
{
    let joined = append_query(raw_url, &build_query(params));
    let encoded = encode_url(&joined);
    Url::parse(&encoded).map_err(|e| Error::encoding(format!("invalid URL {encoded:?}: {e}")))
}
