use alloc::borrow::Cow;
use alloc::string::{FromUtf8Error, String, ToString};
use alloc::vec::Vec;
use core::fmt::Display;

/// Errors that can occur for `tinybind` operations
#[derive(Debug)]
pub enum Error {
    /// The interpreter reported an error (trap, linking or parsing)
    Runtime(tinywasm::Error),

    /// The module binary could not be read
    Binary(wasmparser::BinaryReaderError),

    /// A string slice in linear memory was not valid UTF-8
    Decode(FromUtf8Error),

    /// An access through a memory view was out of bounds
    OutOfBounds {
        /// The offset of the access
        offset: usize,
        /// The size of the access
        len: usize,
        /// The length of the view
        max: usize,
    },

    /// The module does not export a required item
    MissingExport(String),

    /// The module imports functions no binding is registered for
    MissingBindings(Vec<String>),

    /// A handle does not refer to a live slot of the external reference table
    InvalidHandle(u32),

    /// The module handed out a handle from the reserved range
    ReservedHandle(u32),

    /// A host value had an unexpected type
    TypeMismatch {
        /// The type the binding expected
        expected: &'static str,
        /// The type that was found
        found: &'static str,
    },

    /// A closure was invoked after its destructor ran
    ClosureDestroyed,

    /// An export returned values of an unexpected shape
    InvalidResult(String),

    /// A host capability failed
    Host(HostError),

    /// Streaming compilation rejected a response
    MimeType {
        /// The content type the response carried
        content_type: Option<String>,
    },

    /// A fetch returned an unsuccessful response
    Fetch {
        /// The requested url
        url: String,
        /// The response status
        status: u16,
    },

    /// No fetcher can handle the url scheme
    UnsupportedScheme(String),

    /// The module has not been loaded yet
    NotLoaded,

    /// An I/O error occurred
    Io(std::io::Error),

    /// A configuration or JSON document could not be read
    Json(serde_json::Error),

    /// A url could not be parsed
    Url(url::ParseError),
}

impl Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Runtime(err) => write!(f, "runtime error: {err}"),
            Self::Binary(err) => write!(f, "invalid module binary: {err}"),
            Self::Decode(err) => write!(f, "invalid utf-8 in linear memory: {err}"),
            Self::OutOfBounds { offset, len, max } => {
                write!(f, "out of bounds memory access: offset={offset}, len={len}, max={max}")
            }
            Self::MissingExport(name) => write!(f, "missing export: {name}"),
            Self::MissingBindings(names) => write!(f, "no binding for imports: {}", names.join(", ")),
            Self::InvalidHandle(idx) => write!(f, "invalid externref handle: {idx}"),
            Self::ReservedHandle(idx) => write!(f, "module returned reserved externref handle: {idx}"),
            Self::TypeMismatch { expected, found } => write!(f, "type mismatch: expected {expected}, found {found}"),
            Self::ClosureDestroyed => write!(f, "closure invoked after being destroyed"),
            Self::InvalidResult(message) => write!(f, "invalid result: {message}"),
            Self::Host(err) => write!(f, "host error: {err}"),
            Self::MimeType { content_type: Some(ty) } => {
                write!(f, "incorrect response MIME type: expected `application/wasm`, got `{ty}`")
            }
            Self::MimeType { content_type: None } => {
                write!(f, "incorrect response MIME type: expected `application/wasm`, got none")
            }
            Self::Fetch { url, status } => write!(f, "failed to fetch {url}: status {status}"),
            Self::UnsupportedScheme(scheme) => write!(f, "unsupported url scheme: {scheme}"),
            Self::NotLoaded => write!(f, "module not loaded"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
            Self::Json(err) => write!(f, "json error: {err}"),
            Self::Url(err) => write!(f, "invalid url: {err}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Runtime(err) => Some(err),
            Self::Binary(err) => Some(err),
            Self::Decode(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Json(err) => Some(err),
            Self::Url(err) => Some(err),
            _ => None,
        }
    }
}

impl From<tinywasm::Error> for Error {
    fn from(value: tinywasm::Error) -> Self {
        Self::Runtime(value)
    }
}

impl From<wasmparser::BinaryReaderError> for Error {
    fn from(value: wasmparser::BinaryReaderError) -> Self {
        Self::Binary(value)
    }
}

impl From<FromUtf8Error> for Error {
    fn from(value: FromUtf8Error) -> Self {
        Self::Decode(value)
    }
}

impl From<HostError> for Error {
    fn from(value: HostError) -> Self {
        Self::Host(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<url::ParseError> for Error {
    fn from(value: url::ParseError) -> Self {
        Self::Url(value)
    }
}

// Host functions report failures to the interpreter, which unwinds the current module call.
impl From<Error> for tinywasm::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Runtime(err) => err,
            other => tinywasm::Error::Other(other.to_string()),
        }
    }
}

/// A wrapper around [`core::result::Result`] for tinybind operations
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// A named exception raised by a host capability
///
/// The names follow the exception names a browser would use, so module code
/// written against a browser sees familiar errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    name: Cow<'static, str>,
    message: String,
}

impl HostError {
    /// Create a new host error
    pub fn new(name: impl Into<Cow<'static, str>>, message: impl Into<String>) -> Self {
        Self { name: name.into(), message: message.into() }
    }

    /// An error thrown by module code through `__wbindgen_throw`
    pub fn error(message: impl Into<String>) -> Self {
        Self::new("Error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NotFoundError", message)
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::new("SyntaxError", message)
    }

    pub fn invalid_character(message: impl Into<String>) -> Self {
        Self::new("InvalidCharacterError", message)
    }

    pub fn hierarchy_request(message: impl Into<String>) -> Self {
        Self::new("HierarchyRequestError", message)
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self::new("QuotaExceededError", message)
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new("NotAllowedError", message)
    }

    pub fn security(message: impl Into<String>) -> Self {
        Self::new("SecurityError", message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new("TypeError", message)
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::new("NetworkError", message)
    }

    /// The exception name, e.g. `NotFoundError`
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The human readable message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for HostError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl core::error::Error for HostError {}
