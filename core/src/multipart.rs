//! In-memory `multipart/form-data` encoding.
//!
//! Parts are written straight into a byte buffer as they are added, so the
//! whole body exists in memory before the request is sent. The closing
//! boundary is only written by `finish`.

use std::io::{self, Read};

use uuid::Uuid;

/// One file part read from a caller-owned stream.
///
/// The builder reads `body` to the end but never closes it; the caller keeps
/// ownership of the underlying stream.
pub struct MultipartParam<'a> {
    pub field_name: String,
    pub file_name: String,
    pub body: &'a mut dyn Read,
}

impl<'a> MultipartParam<'a> {
    pub fn new(
        field_name: impl Into<String>,
        file_name: impl Into<String>,
        body: &'a mut dyn Read,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: file_name.into(),
            body,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultipartWriter {
    boundary: String,
    buf: Vec<u8>,
    parts: usize,
}

impl Default for MultipartWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartWriter {
    /// Creates a writer with a random boundary.
    pub fn new() -> Self {
        Self::with_boundary(Uuid::new_v4().simple().to_string())
    }

    pub fn with_boundary(boundary: impl Into<String>) -> Self {
        Self {
            boundary: boundary.into(),
            buf: Vec::new(),
            parts: 0,
        }
    }

    pub fn boundary(&self) -> &str {
        &self.boundary
    }

    /// Value for the request's `Content-Type` header.
    pub fn content_type(&self) -> String {
        format!("multipart/form-data; boundary={}", self.boundary)
    }

    pub fn part_count(&self) -> usize {
        self.parts
    }

    pub fn write_field(&mut self, name: &str, value: &str) {
        let disposition = format!("form-data; name=\"{}\"", escape_quotes(name));
        self.open_part(&[("Content-Disposition", &disposition)]);
        self.buf.extend_from_slice(value.as_bytes());
    }

    /// Appends a file part and copies `body` into it. Returns the number of
    /// content bytes copied.
    pub fn write_file(
        &mut self,
        field_name: &str,
        file_name: &str,
        body: &mut dyn Read,
    ) -> io::Result<u64> {
        let disposition = format!(
            "form-data; name=\"{}\"; filename=\"{}\"",
            escape_quotes(field_name),
            escape_quotes(file_name)
        );
        // Roll back on a failed copy so the buffer never holds half a part.
        let mark = self.buf.len();
        self.open_part(&[
            ("Content-Disposition", &disposition),
            ("Content-Type", "application/octet-stream"),
        ]);
        match io::copy(body, &mut self.buf) {
            Ok(n) => Ok(n),
            Err(e) => {
                self.buf.truncate(mark);
                self.parts -= 1;
                Err(e)
            }
        }
    }

    /// Writes the closing boundary and returns the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"--\r\n");
        self.buf
    }

    fn open_part(&mut self, headers: &[(&str, &str)]) {
        if self.parts > 0 {
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"--");
        self.buf.extend_from_slice(self.boundary.as_bytes());
        self.buf.extend_from_slice(b"\r\n");
        for (name, value) in headers {
            self.buf.extend_from_slice(name.as_bytes());
            self.buf.extend_from_slice(b": ");
            self.buf.extend_from_slice(value.as_bytes());
            self.buf.extend_from_slice(b"\r\n");
        }
        self.buf.extend_from_slice(b"\r\n");
        self.parts += 1;
    }
}

fn escape_quotes(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
