//! The request body, as exactly one encoded variant.

use std::collections::BTreeMap;

use url::form_urlencoded;

use crate::multipart::MultipartWriter;

pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_FORM: &str = "application/x-www-form-urlencoded";
pub const CONTENT_TYPE_BYTES: &str = "application/octet-stream";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// The last body encoder called on a builder replaces whatever came before.
#[derive(Debug, Clone, Default)]
pub(crate) enum Payload {
    #[default]
    Empty,
    Json(Vec<u8>),
    Form(String),
    Bytes(Vec<u8>),
    Text(String),
    Multipart(MultipartWriter),
}

impl Payload {
    /// `Content-Type` for this payload. Empty when no body was configured.
    pub(crate) fn content_type(&self) -> String {
        match self {
            Payload::Empty => String::new(),
            Payload::Json(_) => CONTENT_TYPE_JSON.to_string(),
            Payload::Form(_) => CONTENT_TYPE_FORM.to_string(),
            Payload::Bytes(_) => CONTENT_TYPE_BYTES.to_string(),
            Payload::Text(_) => CONTENT_TYPE_TEXT.to_string(),
            Payload::Multipart(w) => w.content_type(),
        }
    }

    /// Returns the writer to append to, starting a fresh one if the current
    /// payload is not multipart.
    pub(crate) fn multipart_mut(&mut self) -> &mut MultipartWriter {
        if !matches!(self, Payload::Multipart(_)) {
            *self = Payload::Multipart(MultipartWriter::new());
        }
        match self {
            Payload::Multipart(w) => w,
            _ => unreachable!("payload was just set to multipart"),
        }
    }

    /// The encoded body. Multipart payloads get their closing boundary here.
    pub(crate) fn into_bytes(self) -> Vec<u8> {
        match self {
            Payload::Empty => Vec::new(),
            Payload::Json(b) | Payload::Bytes(b) => b,
            Payload::Form(s) | Payload::Text(s) => s.into_bytes(),
            Payload::Multipart(w) => w.finish(),
        }
    }
}

/// Form-encodes pairs sorted by key. Later duplicates of a key win.
pub(crate) fn encode_form<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let sorted: BTreeMap<String, String> = pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect();
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&sorted)
        .finish()
}
