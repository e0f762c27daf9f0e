use alloc::{rc::Rc, vec::Vec};
use log::{debug, info, warn};
use tinywasm::types::WasmValue;
use tinywasm::{Imports, Module, ModuleInstance, Store};

use crate::guest::{Guest, InstanceGuest};
use crate::host::{Event, EventTarget, Fetch, Host, NodeId};
use crate::imports::ImportTable;
use crate::loader::{Compiled, LoadState, ModuleSource};
use crate::manifest::Manifest;
use crate::shared::Shared;
use crate::{Config, Error, Result};

struct Loaded {
    store: Store,
    instance: ModuleInstance,
    manifest: Manifest,
}

/// A module bound to a headless host
///
/// Owns the interpreter store, the instance and everything the import
/// table shares between calls. Loading is idempotent: once a module is
/// set, later `init` calls return the existing instance.
///
/// ## Example
///
/// ```rust,no_run
/// use tinybind::{Bindings, Config, ModuleSource};
/// use tinybind::host::FileFetcher;
///
/// let mut bindings = Bindings::new(Config::default())?;
/// bindings.init(ModuleSource::Path("compute.wasm".into()), &mut FileFetcher)?;
/// let body = bindings.host().document().body();
/// bindings.dispatch_event(body, "click")?;
/// # Ok::<(), tinybind::Error>(())
/// ```
pub struct Bindings {
    shared: Rc<Shared>,
    imports: ImportTable,
    state: LoadState,
    loaded: Option<Loaded>,
}

impl core::fmt::Debug for Bindings {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Bindings")
            .field("state", &self.state)
            .field("imports", &self.imports.len())
            .field("host", &self.shared.host)
            .finish_non_exhaustive()
    }
}

impl Bindings {
    /// Bindings with the default import table
    pub fn new(config: Config) -> Result<Self> {
        Self::with_imports(config, ImportTable::with_defaults())
    }

    /// Bindings with a custom import table
    pub fn with_imports(config: Config, imports: ImportTable) -> Result<Self> {
        Ok(Self { shared: Rc::new(Shared::new(config)?), imports, state: LoadState::Unloaded, loaded: None })
    }

    pub fn state(&self) -> LoadState {
        self.state
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// The page the module runs in
    pub fn host(&self) -> &Host {
        &self.shared.host
    }

    pub fn imports(&self) -> &ImportTable {
        &self.imports
    }

    /// The import and export lists of the loaded module
    pub fn manifest(&self) -> Option<&Manifest> {
        self.loaded.as_ref().map(|loaded| &loaded.manifest)
    }

    /// The instance, once the module has started
    pub fn instance(&self) -> Option<&ModuleInstance> {
        self.loaded.as_ref().map(|loaded| &loaded.instance)
    }

    /// Number of live slots in the external reference table
    pub fn live_handles(&self) -> usize {
        self.shared.table.live()
    }

    /// Instantiate an already compiled module and start it
    pub fn init_sync(&mut self, compiled: Compiled) -> Result<&ModuleInstance> {
        if self.loaded.is_none() {
            self.state = LoadState::Loading;
            let result = self.instantiate(compiled);
            self.finish(result)?;
        }

        self.instance().ok_or(Error::NotLoaded)
    }

    /// Load, instantiate and start a module
    ///
    /// A module that fails to start takes the page it built with it: the
    /// document, timers, handles and closures are reset, stored items stay.
    pub fn init(&mut self, source: ModuleSource, fetcher: &mut dyn Fetch) -> Result<&ModuleInstance> {
        if self.loaded.is_none() {
            self.state = LoadState::Loading;
            let result =
                Compiled::load(source, &self.shared.config, fetcher).and_then(|compiled| self.instantiate(compiled));
            self.finish(result)?;
        }

        self.instance().ok_or(Error::NotLoaded)
    }

    fn finish(&mut self, result: Result<Loaded>) -> Result<()> {
        match result {
            Ok(loaded) => {
                self.loaded = Some(loaded);
                self.state = LoadState::Started;
                info!("module started");
                Ok(())
            }
            Err(err) => {
                debug!("load failed: {err}");
                self.state = LoadState::Unloaded;
                Err(err)
            }
        }
    }

    fn instantiate(&mut self, compiled: Compiled) -> Result<Loaded> {
        let Compiled { module, manifest } = compiled;
        let exports = &self.shared.config.exports;
        if !manifest.exports_memory(&exports.memory) {
            return Err(Error::MissingExport(exports.memory.clone()));
        }

        self.shared.reset();
        let imports = self.imports.link(&manifest, &self.shared)?;
        let started = self.start(module, imports, manifest);
        if let Err(err) = &started {
            debug!("discarding the page of a failed start: {err}");
            if let Err(err) = self.shared.discard() {
                warn!("failed to reset the page: {err}");
            }
        }
        started
    }

    fn start(&mut self, module: Module, imports: Imports, manifest: Manifest) -> Result<Loaded> {
        let exports = &self.shared.config.exports;
        let mut store = Store::default();
        let instance = ModuleInstance::instantiate(&mut store, module, Some(imports))?;
        instance.start(&mut store)?;
        self.state = LoadState::Instantiated;
        debug!("module instantiated");

        if manifest.exports_func(&exports.start) {
            let mut guest = InstanceGuest::new(&mut store, &instance, &exports.memory);
            guest.call(&exports.start, &[])?;
        }

        Ok(Loaded { store, instance, manifest })
    }

    fn with_guest<T>(&mut self, f: impl FnOnce(&mut InstanceGuest<'_>, &Shared) -> Result<T>) -> Result<T> {
        let loaded = match (self.state, self.loaded.as_mut()) {
            (LoadState::Started, Some(loaded)) => loaded,
            _ => return Err(Error::NotLoaded),
        };

        let mut guest = InstanceGuest::new(&mut loaded.store, &loaded.instance, &self.shared.config.exports.memory);
        f(&mut guest, &self.shared)
    }

    /// Call an export of the started module
    pub fn call(&mut self, export: &str, args: &[WasmValue]) -> Result<Vec<WasmValue>> {
        self.with_guest(|guest, _| guest.call(export, args))
    }

    /// Call an export taking a string, passed as `(ptr, len)` in module memory
    pub fn call_with_str(&mut self, export: &str, text: &str) -> Result<Vec<WasmValue>> {
        self.with_guest(|guest, shared| {
            let encoded = shared.encode(guest, text)?;
            guest.call(export, &[WasmValue::I32(encoded.ptr as i32), WasmValue::I32(encoded.len as i32)])
        })
    }

    /// Decode a string slice of module memory
    pub fn read_string(&mut self, ptr: i32, len: i32) -> Result<alloc::string::String> {
        self.with_guest(|guest, shared| shared.string(guest, ptr, len))
    }

    /// Dispatch a cancelable event at a node, returning `false` if a listener prevented its default
    pub fn dispatch_event(&mut self, node: NodeId, event_type: &str) -> Result<bool> {
        let event = Rc::new(Event::cancelable(event_type));
        self.with_guest(|guest, shared| shared.dispatch(guest, EventTarget::Node(node), event))
    }

    /// Dispatch a cancelable event at the window
    pub fn dispatch_window_event(&mut self, event_type: &str) -> Result<bool> {
        let event = Rc::new(Event::cancelable(event_type));
        self.with_guest(|guest, shared| shared.dispatch(guest, EventTarget::Window, event))
    }

    /// Advance the virtual clock by `ms`, returning the number of timers fired
    pub fn advance_timers(&mut self, ms: u64) -> Result<usize> {
        self.with_guest(|guest, shared| shared.advance_timers(guest, ms))
    }

    /// Move a node in or out of the viewport, returning the number of observer callbacks run
    pub fn set_intersecting(&mut self, node: NodeId, intersecting: bool) -> Result<usize> {
        self.with_guest(|guest, shared| shared.set_intersecting(guest, node, intersecting))
    }

    /// Destroy closures whose every host-side reference has been dropped
    pub fn collect_garbage(&mut self) -> Result<usize> {
        self.with_guest(|guest, shared| shared.closures.collect(guest))
    }
}
