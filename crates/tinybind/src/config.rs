use alloc::string::String;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

use crate::host::DEFAULT_QUOTA;
use crate::string::MAX_DECODE_BYTES;
use crate::{Error, Result};

/// Location used when none is configured
pub const DEFAULT_LOCATION: &str = "http://localhost/";

/// Names of the exports the runtime calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ExportNames {
    pub memory: String,
    pub malloc: String,
    pub realloc: String,
    pub table_alloc: String,
    pub exn_store: String,
    pub start: String,
    /// Dispatcher running a closure destructor: `(dtor, a, b)`
    pub closure_destroy: String,
    /// Dispatcher invoking a closure: `(shim, a, b, arg)`
    pub closure_invoke: String,
}

impl Default for ExportNames {
    fn default() -> Self {
        Self {
            memory: "memory".into(),
            malloc: "__wbindgen_malloc".into(),
            realloc: "__wbindgen_realloc".into(),
            table_alloc: "__externref_table_alloc".into(),
            exn_store: "__wbindgen_exn_store".into(),
            start: "__wbindgen_start".into(),
            closure_destroy: "__wbindgen_closure_destroy".into(),
            closure_invoke: "__wbindgen_closure_invoke".into(),
        }
    }
}

/// Runtime settings
///
/// Every field has a default, so an empty JSON object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    pub exports: ExportNames,
    /// Import module the bindings are defined in
    pub import_module: String,
    /// File name of the module, resolved against `base-url`
    pub artifact: String,
    /// Where the default artifact is loaded from, the working directory if unset
    pub base_url: Option<Url>,
    /// Initial document location
    pub location: Option<Url>,
    /// Fall back to buffered compilation for responses with the wrong MIME type
    pub mime_fallback: bool,
    /// Decoded bytes after which the UTF-8 decoder is recycled
    pub decode_ceiling: usize,
    /// `localStorage` quota in UTF-16 code units
    pub storage_quota: usize,
    /// Whether clipboard writes are permitted
    pub clipboard_allowed: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exports: ExportNames::default(),
            import_module: "wbg".into(),
            artifact: "compute.wasm".into(),
            base_url: None,
            location: None,
            mime_fallback: cfg!(feature = "mime-fallback"),
            decode_ceiling: MAX_DECODE_BYTES,
            storage_quota: DEFAULT_QUOTA,
            clipboard_allowed: true,
        }
    }
}

impl Config {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// The url of the default artifact
    pub fn artifact_url(&self) -> Result<Url> {
        let base = match &self.base_url {
            Some(base) => base.clone(),
            None => {
                let dir = std::env::current_dir()?;
                Url::from_directory_path(&dir).map_err(|_| Error::UnsupportedScheme(dir.display().to_string()))?
            }
        };
        Ok(base.join(&self.artifact)?)
    }

    /// The initial document location
    pub fn location(&self) -> Result<Url> {
        match &self.location {
            Some(location) => Ok(location.clone()),
            None => Ok(Url::parse(DEFAULT_LOCATION)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let config = Config::from_json("{}").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.exports.malloc, "__wbindgen_malloc");
        assert_eq!(config.import_module, "wbg");
        assert_eq!(config.location().unwrap().as_str(), DEFAULT_LOCATION);
    }

    #[test]
    fn fields_are_kebab_case() {
        let config = Config::from_json(
            r#"{
                "exports": { "table-alloc": "alloc_ref" },
                "base-url": "https://cdn.example.com/pkg/",
                "clipboard-allowed": false,
                "storage-quota": 10
            }"#,
        )
        .unwrap();

        assert_eq!(config.exports.table_alloc, "alloc_ref");
        assert_eq!(config.exports.memory, "memory");
        assert_eq!(config.artifact_url().unwrap().as_str(), "https://cdn.example.com/pkg/compute.wasm");
        assert!(!config.clipboard_allowed);
        assert_eq!(config.storage_quota, 10);
    }

    #[test]
    fn unknown_json_is_an_error() {
        assert!(matches!(Config::from_json("[1]"), Err(Error::Json(_))));
    }
}
