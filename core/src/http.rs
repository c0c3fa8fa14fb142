//! HTTP value types shared by the builder and the transport.
//!
//! # Design
//! `PreparedRequest` describes the outgoing request as plain data. The
//! builder produces one before anything touches the network, which keeps the
//! header/body composition rules testable on their own and lets a caller run
//! the exchange with a client of their choice (`RequestBuilder::build_request`).
//!
//! `Response` wraps the `ureq` response. After-response hooks only ever see
//! `&Response`, so nothing a hook does can change what the caller receives.

use std::fmt;
use std::io::{self, Read};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use url::Url;

use crate::error::Error;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// GET never carries a body, whatever payload was configured.
    pub fn sends_body(&self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive: `"patch"` and `"PATCH"` both parse.
impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "PATCH" => Ok(HttpMethod::Patch),
            "DELETE" => Ok(HttpMethod::Delete),
            "HEAD" => Ok(HttpMethod::Head),
            "OPTIONS" => Ok(HttpMethod::Options),
            _ => Err(Error::InvalidMethod(s.to_string())),
        }
    }
}

/// An HTTP request described as plain data.
///
/// Headers keep insertion order and hold at most one entry per name
/// (compared case-insensitively).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl PreparedRequest {
    /// Looks up a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// The host the request is addressed to: a `Host` header wins over the URL.
    pub fn host(&self) -> Option<&str> {
        self.header("host").or_else(|| self.url.host_str())
    }

    /// Sets `name` to `value`, replacing any entry with the same name.
    pub(crate) fn set_header(&mut self, name: &str, value: &str) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            Some(entry) => *entry = (name.to_string(), value.to_string()),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
    }
}

/// A completed HTTP response.
#[derive(Debug)]
pub struct Response {
    inner: ureq::Response,
}

impl Response {
    pub(crate) fn new(inner: ureq::Response) -> Self {
        Self { inner }
    }

    pub fn status(&self) -> u16 {
        self.inner.status()
    }

    pub fn status_text(&self) -> &str {
        self.inner.status_text()
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status())
    }

    /// The final URL, after any redirects the client followed.
    pub fn url(&self) -> &str {
        self.inner.get_url()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.header(name)
    }

    pub fn header_names(&self) -> Vec<String> {
        self.inner.headers_names()
    }

    pub fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    pub fn into_reader(self) -> Box<dyn Read + Send + Sync + 'static> {
        self.inner.into_reader()
    }

    pub fn into_bytes(self) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.inner.into_reader().read_to_end(&mut buf)?;
        Ok(buf)
    }

    pub fn into_string(self) -> io::Result<String> {
        self.inner.into_string()
    }

    pub fn into_json<T: DeserializeOwned>(self) -> io::Result<T> {
        serde_json::from_reader(self.inner.into_reader())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Gives up the wrapper and returns the `ureq` response.
    pub fn into_inner(self) -> ureq::Response {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prepared() -> PreparedRequest {
        PreparedRequest {
            method: HttpMethod::Post,
            url: Url::parse("http://localhost:3000/things").unwrap(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Some(b"hi".to_vec()),
        }
    }

    #[test]
    fn method_parses_case_insensitively() {
        assert_eq!("patch".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!("Options".parse::<HttpMethod>().unwrap(), HttpMethod::Options);
        let err = "BREW".parse::<HttpMethod>().unwrap_err();
        assert!(matches!(err, Error::InvalidMethod(m) if m == "BREW"));
    }

    #[test]
    fn only_get_drops_the_body() {
        assert!(!HttpMethod::Get.sends_body());
        for m in [
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
            HttpMethod::Head,
            HttpMethod::Options,
        ] {
            assert!(m.sends_body(), "{m}");
        }
    }

    #[test]
    fn set_header_replaces_case_insensitively() {
        let mut req = prepared();
        req.set_header("content-type", "application/xml");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.header("CONTENT-TYPE"), Some("application/xml"));
        assert_eq!(req.headers[0].0, "content-type");
    }

    #[test]
    fn host_header_overrides_url_host() {
        let mut req = prepared();
        assert_eq!(req.host(), Some("localhost"));
        req.set_header("Host", "api.internal");
        assert_eq!(req.host(), Some("api.internal"));
    }
}
