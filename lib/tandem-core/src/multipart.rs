//! `multipart/form-data` encoding for request bodies and file uploads.
//!
//! Layout produced for a form with one field and one file:
//!
//! ```text
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="title"\r\n
//! \r\n
//! Holiday\r\n
//! --<boundary>\r\n
//! Content-Disposition: form-data; name="photo"; filename="beach.jpg"\r\n
//! Content-Type: image/jpeg\r\n
//! \r\n
//! <file bytes>\r\n
//! --<boundary>--\r\n
//! ```
//!
//! # Example
//!
//! ```
//! use tandem_core::{FileAttachment, Form, TextEncoding};
//!
//! let form = Form::new(TextEncoding::Utf8)
//!     .text("title", "Holiday")
//!     .file(FileAttachment::new("photo", "beach.jpg", "image/jpeg", vec![0xFF, 0xD8]));
//!
//! let body = form.encode().expect("encodes");
//! assert!(body.ends_with(format!("--{}--\r\n", form.boundary()).as_bytes()));
//! ```

use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};

use crate::mime::{ExtensionResolver, MimeResolver};
use crate::{Error, Result};

/// Text encoding used for the textual pieces of a multipart body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TextEncoding {
    /// UTF-8: any Rust string is representable.
    #[default]
    Utf8,
    /// 7-bit ASCII: non-ASCII names and values are rejected.
    Ascii,
}

impl TextEncoding {
    /// Returns `true` if `text` can be written in this encoding.
    #[must_use]
    pub fn can_represent(self, text: &str) -> bool {
        match self {
            Self::Utf8 => true,
            Self::Ascii => text.is_ascii(),
        }
    }
}

/// A file to upload: content, MIME type, form field name and filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    field_name: String,
    filename: String,
    mime_type: String,
    data: Bytes,
}

impl FileAttachment {
    /// Create an attachment from in-memory content.
    #[must_use]
    pub fn new(
        field_name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            filename: filename.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a local file, resolving its MIME type from the extension.
    ///
    /// This performs blocking file I/O.
    pub fn from_path(field_name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self> {
        Self::from_path_with(field_name, path, &ExtensionResolver)
    }

    /// Read a local file, resolving its MIME type with `resolver`.
    ///
    /// This performs blocking file I/O.
    pub fn from_path_with(
        field_name: impl Into<String>,
        path: impl AsRef<Path>,
        resolver: &impl MimeResolver,
    ) -> Result<Self> {
        let path = path.as_ref();
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| Error::encoding(format!("no usable file name in {}", path.display())))?
            .to_string();
        let data = std::fs::read(path)
            .map_err(|e| Error::encoding(format!("cannot read {}: {e}", path.display())))?;
        Ok(Self::new(field_name, filename, resolver.resolve(path), data))
    }

    /// Form field name.
    #[must_use]
    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Filename sent in the disposition header.
    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// MIME type sent in the part's `Content-Type`.
    #[must_use]
    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// File content.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

/// A single part in a multipart form.
#[derive(Debug, Clone)]
pub struct Part {
    name: String,
    filename: Option<String>,
    content_type: Option<String>,
    data: Bytes,
}

impl Part {
    /// Create a plain text field.
    #[must_use]
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            data: Bytes::from(value.into()),
        }
    }

    /// Get the part name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the filename, if set.
    #[must_use]
    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Get the content type, if set.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Get the part data.
    #[must_use]
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    fn validate(&self, encoding: TextEncoding) -> Result<()> {
        check_header_value("field name", &self.name, encoding)?;
        if let Some(filename) = &self.filename {
            check_header_value("filename", filename, encoding)?;
        }
        if let Some(content_type) = &self.content_type {
            check_header_value("content type", content_type, encoding)?;
        }
        if self.filename.is_none() {
            // Text fields carry their value in the configured encoding.
            let value = std::str::from_utf8(&self.data)
                .map_err(|_| Error::encoding(format!("field {:?} is not valid text", self.name)))?;
            if !encoding.can_represent(value) {
                return Err(Error::encoding(format!(
                    "value of field {:?} is not representable as {encoding:?}",
                    self.name
                )));
            }
        }
        Ok(())
    }
}

impl From<FileAttachment> for Part {
    fn from(file: FileAttachment) -> Self {
        Self {
            name: file.field_name,
            filename: Some(file.filename),
            content_type: Some(file.mime_type),
            data: file.data,
        }
    }
}

fn check_header_value(what: &str, value: &str, encoding: TextEncoding) -> Result<()> {
    if value.contains(['"', '\r', '\n']) {
        return Err(Error::encoding(format!(
            "{what} {value:?} contains a quote or line break"
        )));
    }
    if !encoding.can_represent(value) {
        return Err(Error::encoding(format!(
            "{what} {value:?} is not representable as {encoding:?}"
        )));
    }
    Ok(())
}

/// A multipart form: ordered parts plus a random boundary.
#[derive(Debug, Clone)]
pub struct Form {
    parts: Vec<Part>,
    boundary: String,
    encoding: TextEncoding,
}

impl Default for Form {
    fn default() -> Self {
        Self::new(TextEncoding::default())
    }
}

impl Form {
    /// Create an empty form with a random boundary.
    #[must_use]
    pub fn new(encoding: TextEncoding) -> Self {
        Self::with_boundary(generate_boundary(), encoding)
    }

    /// Create an empty form with a fixed boundary.
    ///
    /// The boundary must not appear in any part data.
    #[must_use]
    pub fn with_boundary(boundary: impl Into<String>, encoding: TextEncoding) -> Self {
        Self {
            parts: Vec::new(),
            boundary: boundary.into(),
            encoding,
        }
    }

    /// Add a part to the form.
    #[must_use]
    pub fn part(mut self, part: Part) -> Self {
        self.parts.push(part);
        self
    }

    /// Add a text field to the form.
    #[must_use]
    pub fn text(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.part(Part::text(name, value))
    }

    /// Add a file to the form.
    #[must_use]
    pub fn file(self, file: FileAttachment) -> Self {
        self.part(Part::from(file))
    }

    /// Get the boundary string.
    #[must_use]
    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Get the parts in this form.
    #[must_use]
    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    /// `Content-Type` header value: `multipart/form-data; boundary=<boundary>`.
    #[must_use]
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    /// Encode the form into a body.
    pub fn encode(&self) -> Result<Bytes> {
        let mut buf = BytesMut::new();

        for part in &self.parts {
            part.validate(self.encoding)?;

            buf.put_slice(b"--");
            buf.put_slice(self.boundary.as_bytes());
            buf.put_slice(b"\r\n");

            buf.put_slice(b"Content-Disposition: form-data; name=\"");
            buf.put_slice(part.name.as_bytes());
            buf.put_slice(b"\"");
            if let Some(filename) = &part.filename {
                buf.put_slice(b"; filename=\"");
                buf.put_slice(filename.as_bytes());
                buf.put_slice(b"\"");
            }
            buf.put_slice(b"\r\n");

            if let Some(content_type) = &part.content_type {
                buf.put_slice(b"Content-Type: ");
                buf.put_slice(content_type.as_bytes());
                buf.put_slice(b"\r\n");
            }

            buf.put_slice(b"\r\n");
            buf.put_slice(&part.data);
            buf.put_slice(b"\r\n");
        }

        buf.put_slice(b"--");
        buf.put_slice(self.boundary.as_bytes());
        buf.put_slice(b"--\r\n");

        Ok(buf.freeze())
    }
}

/// Encode text fields followed by file attachments into a multipart body.
///
/// Returns the body and the boundary it was written with.
pub fn encode<K, V>(
    fields: impl IntoIterator<Item = (K, V)>,
    files: impl IntoIterator<Item = FileAttachment>,
    encoding: TextEncoding,
) -> Result<(Bytes, String)>
where
    K: Into<String>,
    V: Into<String>,
{
    let form = fields
        .into_iter()
        .fold(Form::new(encoding), |form, (name, value)| {
            form.text(name, value)
        });
    let form = files.into_iter().fold(form, Form::file);
    let body = form.encode()?;
    Ok((body, form.boundary))
}

fn generate_boundary() -> String {
    format!("----TandemBoundary{}", uuid::Uuid::new_v4().simple())
}
