//! Turning module sources into compiled modules.

use alloc::vec::Vec;
use log::{debug, warn};
use std::path::PathBuf;
use tinywasm::Module;
use url::Url;

use crate::host::{Fetch, Response, ResponseKind};
use crate::manifest::Manifest;
use crate::{Config, Error, Result};

/// The media type streaming compilation requires
pub const WASM_MIME_TYPE: &str = "application/wasm";

/// Progress of a [`Bindings`](crate::Bindings) through loading
///
/// Any failure returns to [`LoadState::Unloaded`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Instantiated,
    Started,
}

/// Where to load a module from
#[derive(Debug, Clone, Default)]
pub enum ModuleSource {
    /// A module binary
    Bytes(Vec<u8>),
    /// A module binary on disk
    Path(PathBuf),
    /// A url, fetched through the fetcher passed to [`Bindings::init`](crate::Bindings::init)
    Url(Url),
    /// An already fetched response
    Response(Response),
    /// The configured artifact next to the base url
    #[default]
    Default,
}

impl From<Vec<u8>> for ModuleSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<PathBuf> for ModuleSource {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<Url> for ModuleSource {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<Response> for ModuleSource {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

/// A compiled module together with its import and export lists
#[derive(Debug)]
pub struct Compiled {
    pub module: Module,
    pub manifest: Manifest,
}

impl Compiled {
    /// Compile a module binary
    pub fn compile(bytes: &[u8]) -> Result<Self> {
        let manifest = Manifest::parse(bytes)?;
        let module = Module::parse_bytes(bytes)?;
        Ok(Self { module, manifest })
    }

    /// Compile a response body as it is read; requires the wasm content type
    pub fn compile_streaming(response: &Response) -> Result<Self> {
        if !response.ok() {
            return Err(Error::Fetch { url: response.url.to_string(), status: response.status });
        }

        match response.content_type() {
            Some(WASM_MIME_TYPE) => {}
            other => return Err(Error::MimeType { content_type: other.map(Into::into) }),
        }

        let manifest = Manifest::parse(&response.body)?;
        let module = Module::parse_stream(response.body.as_slice())?;
        Ok(Self { module, manifest })
    }

    /// Compile a response, falling back to buffered compilation for a
    /// valid response served with the wrong content type
    pub fn from_response(response: &Response, mime_fallback: bool) -> Result<Self> {
        let err = match Self::compile_streaming(response) {
            Ok(compiled) => return Ok(compiled),
            Err(err) => err,
        };

        let fallback = mime_fallback
            && matches!(err, Error::MimeType { .. })
            && response.ok()
            && matches!(response.kind, ResponseKind::Basic | ResponseKind::Cors | ResponseKind::Default);

        match fallback {
            true => {
                warn!(
                    "`{}` was served with content type {:?} instead of `{WASM_MIME_TYPE}`, falling back to buffered compilation: {err}",
                    response.url,
                    response.content_type().unwrap_or("none"),
                );
                Self::compile(&response.body)
            }
            false => Err(err),
        }
    }

    /// Read, fetch or compile `source`
    pub fn load(source: ModuleSource, config: &Config, fetcher: &mut dyn Fetch) -> Result<Self> {
        let mime_fallback = cfg!(feature = "mime-fallback") && config.mime_fallback;

        match source {
            ModuleSource::Bytes(bytes) => Self::compile(&bytes),
            ModuleSource::Path(path) => {
                debug!("loading module from {}", path.display());
                Self::compile(&std::fs::read(path)?)
            }
            ModuleSource::Url(url) => Self::from_response(&fetch(fetcher, &url)?, mime_fallback),
            ModuleSource::Response(response) => Self::from_response(&response, mime_fallback),
            ModuleSource::Default => Self::from_response(&fetch(fetcher, &config.artifact_url()?)?, mime_fallback),
        }
    }
}

fn fetch(fetcher: &mut dyn Fetch, url: &Url) -> Result<Response> {
    debug!("fetching module from {url}");
    fetcher.fetch(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EMPTY_MODULE: &[u8] = b"\0asm\x01\0\0\0";

    fn response(content_type: &str) -> Response {
        Response::new(Url::parse("http://localhost/compute.wasm").unwrap(), 200, EMPTY_MODULE)
            .with_header("Content-Type", content_type)
    }

    #[test]
    fn streaming_requires_wasm_content_type() {
        assert!(Compiled::compile_streaming(&response("application/wasm")).is_ok());
        assert!(Compiled::compile_streaming(&response("application/wasm; charset=binary")).is_ok());
        assert!(matches!(
            Compiled::compile_streaming(&response("application/octet-stream")),
            Err(Error::MimeType { content_type: Some(ty) }) if ty == "application/octet-stream"
        ));
    }

    #[test]
    fn mime_fallback_only_for_valid_responses() {
        assert!(Compiled::from_response(&response("text/plain"), true).is_ok());
        assert!(Compiled::from_response(&response("text/plain"), false).is_err());

        let opaque = response("text/plain").with_kind(ResponseKind::Opaque);
        assert!(matches!(Compiled::from_response(&opaque, true), Err(Error::MimeType { .. })));

        let mut missing = response("application/wasm");
        missing.status = 404;
        assert!(matches!(Compiled::from_response(&missing, true), Err(Error::Fetch { status: 404, .. })));
    }

    #[test]
    fn malformed_bodies_do_not_fall_back() {
        let mut corrupt = response("application/wasm");
        corrupt.body = b"\0asm\x01\0\0\0\x01\xff".to_vec();
        assert!(!matches!(Compiled::from_response(&corrupt, true), Ok(_) | Err(Error::MimeType { .. })));
    }
}
