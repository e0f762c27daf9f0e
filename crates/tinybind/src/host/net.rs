use alloc::{string::String, vec::Vec};
use indexmap::IndexMap;
use log::debug;
use url::Url;

use crate::{Error, Result};

/// The `type` of a response, as exposed to scripts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseKind {
    #[default]
    Basic,
    Cors,
    Default,
    Error,
    Opaque,
    OpaqueRedirect,
}

impl ResponseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Cors => "cors",
            Self::Default => "default",
            Self::Error => "error",
            Self::Opaque => "opaque",
            Self::OpaqueRedirect => "opaqueredirect",
        }
    }
}

/// A fetched resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub kind: ResponseKind,
    /// Header names are stored lowercase
    pub headers: IndexMap<String, String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { url, status, kind: ResponseKind::Basic, headers: IndexMap::new(), body: body.into() }
    }

    pub fn not_found(url: Url) -> Self {
        Self::new(url, 404, Vec::new())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Whether the status is in the 200-299 range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// The media type of the `Content-Type` header, without parameters
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type").map(|value| value.split(';').next().unwrap_or_default().trim())
    }

    /// The body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Fetches resources for the loader and for module code
pub trait Fetch {
    fn fetch(&mut self, url: &Url) -> Result<Response>;
}

/// Serves `file:` urls from the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct FileFetcher;

fn content_type(path: &std::path::Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("wasm") => "application/wasm",
        Some("json") => "application/json",
        Some("html" | "htm") => "text/html",
        Some("js" | "mjs") => "text/javascript",
        Some("txt") => "text/plain",
        _ => "application/octet-stream",
    }
}

impl Fetch for FileFetcher {
    fn fetch(&mut self, url: &Url) -> Result<Response> {
        if url.scheme() != "file" {
            return Err(Error::UnsupportedScheme(url.scheme().into()));
        }
        let path = url.to_file_path().map_err(|_| Error::UnsupportedScheme(url.as_str().into()))?;
        debug!("fetching {}", path.display());

        match std::fs::read(&path) {
            Ok(body) => Ok(Response::new(url.clone(), 200, body).with_header("content-type", content_type(&path))),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Response::not_found(url.clone())),
            Err(err) => Err(err.into()),
        }
    }
}

/// Serves fixed responses by url, falling back to [`FileFetcher`] for `file:` urls
#[derive(Debug, Clone, Default)]
pub struct RouteFetcher {
    routes: IndexMap<String, Response>,
}

impl RouteFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `response` for `url`
    pub fn route(&mut self, response: Response) -> &mut Self {
        self.routes.insert(response.url.as_str().into(), response);
        self
    }
}

impl Fetch for RouteFetcher {
    fn fetch(&mut self, url: &Url) -> Result<Response> {
        if let Some(response) = self.routes.get(url.as_str()) {
            return Ok(response.clone());
        }

        match url.scheme() {
            "file" => FileFetcher.fetch(url),
            _ => Ok(Response::not_found(url.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_type_ignores_parameters() {
        let url = Url::parse("https://example.com/a.wasm").unwrap();
        let response = Response::new(url, 200, b"x".to_vec()).with_header("Content-Type", "application/wasm; charset=x");
        assert_eq!(response.content_type(), Some("application/wasm"));
        assert!(response.ok());
    }

    #[test]
    fn file_fetcher_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, "{}").unwrap();

        let url = Url::from_file_path(&path).unwrap();
        let response = FileFetcher.fetch(&url).unwrap();
        assert_eq!(response.text(), "{}");
        assert_eq!(response.content_type(), Some("application/json"));

        let missing = Url::from_file_path(dir.path().join("missing.wasm")).unwrap();
        assert_eq!(FileFetcher.fetch(&missing).unwrap().status, 404);

        let http = Url::parse("https://example.com/").unwrap();
        assert!(matches!(FileFetcher.fetch(&http), Err(Error::UnsupportedScheme(_))));
    }

    #[test]
    fn routes_take_precedence() {
        let url = Url::parse("https://example.com/api").unwrap();
        let mut fetcher = RouteFetcher::new();
        fetcher.route(Response::new(url.clone(), 201, "created"));

        assert_eq!(fetcher.fetch(&url).unwrap().status, 201);
        assert_eq!(fetcher.fetch(&url.join("other").unwrap()).unwrap().status, 404);
    }
}
