#![forbid(unsafe_code)]
#![doc(test(
    no_crate_inject,
    attr(deny(warnings, rust_2018_idioms), allow(dead_code, unused_assignments, unused_variables))
))]
#![warn(rust_2018_idioms)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A headless host for wasm-bindgen style modules, running on [`tinywasm`].
//!
//! Modules generated for the browser import a thin layer of glue: strings
//! are copied through their linear memory, host objects are passed as
//! handles into a reference table, and closures are passed as environment
//! pointers. `tinybind` provides that glue and an in-memory page for it to
//! forward to, with a document, storage, timers, history and more.
//!
//! ## Features
//! - **`mime-fallback`**\
//!   Compile responses served without the `application/wasm` content type
//!   from a buffer instead of rejecting them. Enabled by default.
//!
//! ## Getting started
//! ```rust,no_run
//! use tinybind::{Bindings, Config, ModuleSource};
//! use tinybind::host::FileFetcher;
//!
//! let mut bindings = Bindings::new(Config::default())?;
//! bindings.init(ModuleSource::Default, &mut FileFetcher)?;
//!
//! let button = bindings.host().document().get_element_by_id("run");
//! if let Some(button) = button {
//!     bindings.dispatch_event(button, "click")?;
//! }
//!
//! println!("{}", bindings.host().document().outer_html(bindings.host().document().body()));
//! # Ok::<(), tinybind::Error>(())
//! ```
//!
//! Bindings beyond the built-in ones can be registered on an
//! [`ImportTable`] and passed to [`Bindings::with_imports`].

extern crate alloc;

mod error;
pub use error::*;

mod bindings;
pub use bindings::Bindings;

mod config;
pub use config::{Config, DEFAULT_LOCATION, ExportNames};

mod loader;
pub use loader::{Compiled, LoadState, ModuleSource, WASM_MIME_TYPE};

mod imports;
pub use imports::{Cx, ImportTable, WasmParams, WasmResults, WasmType};

mod manifest;
pub use manifest::{Export, Import, ImportKind, Manifest, binding_name};

mod value;
pub use value::{HostObject, HostValue};

mod shared;

pub mod host;

/// Access to a module's linear memory
pub mod guest;

pub mod memory;

pub mod string;

pub mod heap;

pub mod closure;

#[cfg(test)]
mod testing;
