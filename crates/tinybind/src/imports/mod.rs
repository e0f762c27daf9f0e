//! The functions a module imports from the host.
//!
//! Bindings are registered by logical name and turned into `tinywasm`
//! host functions when a module is linked. Each one runs with a [`Cx`],
//! which marshals strings and handles across the boundary.

use alloc::{format, rc::Rc, string::String, string::ToString, vec::Vec};
use core::fmt::Debug;
use indexmap::IndexMap;
use log::trace;
use tinywasm::types::{FuncType, WasmValue};
use tinywasm::{Extern, FuncContext, Imports};

use crate::closure::HostClosure;
use crate::guest::CallerGuest;
use crate::host::{EventTarget, Host, NodeId};
use crate::manifest::{ImportKind, Manifest};
use crate::shared::Shared;
use crate::value::{HostObject, HostValue};
use crate::{Config, Error, HostError, Result};

mod dom;
mod intrinsics;
mod net;
mod page;
mod params;

pub use params::{WasmParams, WasmResults, WasmType};

type Factory = Rc<dyn Fn(&Rc<Shared>) -> Extern>;

/// Host functions by logical binding name
#[derive(Clone, Default)]
pub struct ImportTable {
    bindings: IndexMap<String, Factory>,
}

impl Debug for ImportTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImportTable").field("bindings", &self.bindings.keys().collect::<Vec<_>>()).finish()
    }
}

impl ImportTable {
    /// An empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The intrinsics plus the built-in forwarding bindings
    pub fn with_defaults() -> Self {
        let mut table = Self::new();
        intrinsics::register(&mut table);
        dom::register(&mut table);
        page::register(&mut table);
        net::register(&mut table);
        table
    }

    /// Register a binding; host errors unwind the calling module
    pub fn func<P, R, F>(&mut self, name: &str, func: F) -> &mut Self
    where
        P: WasmParams + 'static,
        R: WasmResults + 'static,
        F: Fn(&mut Cx<'_, '_>, P) -> Result<R> + 'static,
    {
        let func = Rc::new(func);
        let ty = FuncType { params: P::val_types(), results: R::val_types() };
        let factory = move |shared: &Rc<Shared>| {
            let (func, shared, param_types) = (func.clone(), shared.clone(), ty.params.clone());
            Extern::func(&ty, move |ctx: FuncContext<'_>, args: &[WasmValue]| -> tinywasm::Result<Vec<WasmValue>> {
                let args = P::from_wasm_values(&params::declaration_order(&param_types, args))?;
                let mut cx = Cx::new(ctx, &shared);
                Ok(func(&mut cx, args)?.into_wasm_values())
            })
        };

        self.bindings.insert(name.into(), Rc::new(factory));
        self
    }

    /// Register a binding whose host errors become module exceptions
    ///
    /// The error is stored in the reference table and handed to the module's
    /// exception store; the binding then returns a zero value.
    pub fn catching<P, R, F>(&mut self, name: &str, func: F) -> &mut Self
    where
        P: WasmParams + 'static,
        R: WasmResults + Default + 'static,
        F: Fn(&mut Cx<'_, '_>, P) -> Result<R> + 'static,
    {
        self.func(name, move |cx: &mut Cx<'_, '_>, args: P| {
            let err = match func(cx, args) {
                Err(Error::Host(err)) => err,
                Err(err @ Error::TypeMismatch { .. }) => HostError::type_error(err.to_string()),
                other => return other,
            };

            cx.store_exception(err)?;
            Ok(R::default())
        })
    }

    /// Whether a binding is registered under `name`
    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Registered binding names, in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.bindings.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Which imports of a module have bindings, as `(import name, bound)`
    pub fn coverage<'m>(&self, manifest: &'m Manifest, module: &str) -> Vec<(&'m str, bool)> {
        manifest
            .imports
            .iter()
            .map(|import| {
                let bound = import.kind == ImportKind::Func
                    && import.module == module
                    && self.contains(import.binding());
                (import.name.as_str(), bound)
            })
            .collect()
    }

    /// Define every import of `manifest`, failing if any has no binding
    pub(crate) fn link(&self, manifest: &Manifest, shared: &Rc<Shared>) -> Result<Imports> {
        let module = &shared.config.import_module;
        let mut imports = Imports::new();
        let mut missing = Vec::new();

        for import in &manifest.imports {
            let factory = match import.kind == ImportKind::Func && &import.module == module {
                true => self.bindings.get(import.binding()),
                false => None,
            };

            match factory {
                Some(factory) => {
                    trace!("linking {} as {}", import.name, import.binding());
                    imports.define(&import.module, &import.name, factory(shared))?;
                }
                None => missing.push(format!("{}::{}", import.module, import.name)),
            }
        }

        match missing.is_empty() {
            true => Ok(imports),
            false => Err(Error::MissingBindings(missing)),
        }
    }
}

/// The context a binding runs in
pub struct Cx<'a, 'i> {
    guest: CallerGuest<'a, 'i>,
    shared: &'i Shared,
}

impl<'a, 'i> Cx<'a, 'i> {
    fn new(ctx: FuncContext<'a>, shared: &'i Shared) -> Self {
        Self { guest: CallerGuest::new(ctx, &shared.config.exports.memory), shared }
    }

    /// The calling module
    pub fn guest(&mut self) -> &mut CallerGuest<'a, 'i> {
        &mut self.guest
    }

    pub fn host(&self) -> &'i Host {
        &self.shared.host
    }

    pub fn config(&self) -> &'i Config {
        &self.shared.config
    }

    /// The value behind a handle
    pub fn value(&self, handle: i32) -> Result<HostValue> {
        self.shared.value(handle)
    }

    /// A handle that must refer to a node; the document stands for its root node
    pub fn node(&self, handle: i32) -> Result<NodeId> {
        match self.value(handle)? {
            HostValue::Node(node) => Ok(node),
            HostValue::Object(HostObject::Document) => Ok(self.host().document().root()),
            other => Err(other.mismatch("node")),
        }
    }

    /// A handle that must refer to something events can be dispatched to
    pub fn target(&self, handle: i32) -> Result<EventTarget> {
        match self.value(handle)? {
            HostValue::Object(HostObject::Window) => Ok(EventTarget::Window),
            _ => self.node(handle).map(EventTarget::Node),
        }
    }

    pub fn closure(&self, handle: i32) -> Result<HostClosure> {
        self.value(handle)?.as_closure().cloned()
    }

    /// A handle that must refer to the given host object
    pub fn object(&self, handle: i32, expected: HostObject) -> Result<()> {
        match self.value(handle)? {
            HostValue::Object(object) if object == expected => Ok(()),
            other => Err(other.mismatch(expected.class_name())),
        }
    }

    /// Decode a string slice of the module's memory
    pub fn string(&mut self, ptr: i32, len: i32) -> Result<String> {
        self.shared.string(&mut self.guest, ptr, len)
    }

    /// Decode an optional string slice, where a null pointer means `None`
    pub fn opt_string(&mut self, ptr: i32, len: i32) -> Result<Option<String>> {
        match ptr {
            0 => Ok(None),
            ptr => self.string(ptr, len).map(Some),
        }
    }

    /// Move a value into the reference table, returning its handle
    pub fn put(&mut self, value: impl Into<HostValue>) -> Result<i32> {
        self.shared.put(&mut self.guest, value.into())
    }

    /// Like [`Cx::put`], with handle 0 for `None`
    pub fn put_opt(&mut self, value: Option<impl Into<HostValue>>) -> Result<i32> {
        match value {
            Some(value) => self.put(value),
            None => Ok(0),
        }
    }

    /// Write a string into module memory and its `(ptr, len)` to `ret`
    pub fn put_string_ret(&mut self, ret: i32, text: Option<&str>) -> Result<()> {
        self.shared.write_string_ret(&mut self.guest, ret, text)
    }

    /// Hand a host exception to the module
    pub fn store_exception(&mut self, err: HostError) -> Result<()> {
        self.shared.store_exception(&mut self.guest, err)
    }

    pub(crate) fn shared(&self) -> &'i Shared {
        self.shared
    }
}

impl Debug for Cx<'_, '_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Cx").finish_non_exhaustive()
    }
}

/// Booleans cross the boundary as `i32`
pub(crate) fn flag(value: bool) -> i32 {
    value as i32
}
