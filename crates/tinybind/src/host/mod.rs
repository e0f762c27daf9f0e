//! A headless page for modules to run in.
//!
//! Each capability is plain Rust state; the import table forwards module
//! calls to it and embedders can inspect or drive it directly.

use alloc::boxed::Box;
use core::cell::{Ref, RefCell, RefMut};

use crate::{Config, Result};

mod clipboard;
mod console;
mod document;
mod event;
mod history;
mod net;
mod observer;
mod selector;
mod storage;
mod timers;

pub use clipboard::Clipboard;
pub use console::{Console, Level};
pub use document::{Document, NodeId};
pub use event::{Event, EventTarget};
pub use history::History;
pub use net::{Fetch, FileFetcher, Response, ResponseKind, RouteFetcher};
pub use observer::{ObserverEntry, ObserverId, Observers};
pub use storage::{DEFAULT_QUOTA, Storage};
pub use timers::Timers;

/// The capabilities exposed to a module
///
/// Borrows are short-lived; nothing here is borrowed across a call into
/// the module.
pub struct Host {
    document: RefCell<Document>,
    storage: RefCell<Storage>,
    clipboard: RefCell<Clipboard>,
    timers: RefCell<Timers>,
    history: RefCell<History>,
    observers: RefCell<Observers>,
    console: RefCell<Console>,
    fetcher: RefCell<Box<dyn Fetch>>,
}

impl core::fmt::Debug for Host {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Host")
            .field("document", &self.document)
            .field("storage", &self.storage)
            .field("history", &self.history)
            .field("timers", &self.timers)
            .finish_non_exhaustive()
    }
}

impl Host {
    /// A fresh page with the configured location, quota and permissions
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            document: RefCell::new(Document::new()),
            storage: RefCell::new(Storage::new(config.storage_quota)),
            clipboard: RefCell::new(Clipboard::new(config.clipboard_allowed)),
            timers: RefCell::new(Timers::new()),
            history: RefCell::new(History::new(config.location()?)),
            observers: RefCell::new(Observers::new()),
            console: RefCell::new(Console::new()),
            fetcher: RefCell::new(Box::new(RouteFetcher::new())),
        })
    }

    /// Replace the fetcher used by module code
    pub fn set_fetcher(&self, fetcher: impl Fetch + 'static) {
        *self.fetcher.borrow_mut() = Box::new(fetcher);
    }

    /// Discard what a page built: its document, timers, history and observers
    ///
    /// Stored items, the clipboard, the console and the fetcher are kept.
    pub fn reset_page(&self, config: &Config) -> Result<()> {
        let location = config.location()?;
        *self.document.borrow_mut() = Document::new();
        *self.timers.borrow_mut() = Timers::new();
        *self.history.borrow_mut() = History::new(location);
        *self.observers.borrow_mut() = Observers::new();
        Ok(())
    }

    /// Replace the stored items, e.g. with a saved session
    pub fn set_storage(&self, storage: Storage) {
        *self.storage.borrow_mut() = storage;
    }

    pub fn document(&self) -> Ref<'_, Document> {
        self.document.borrow()
    }

    pub fn document_mut(&self) -> RefMut<'_, Document> {
        self.document.borrow_mut()
    }

    pub fn storage(&self) -> Ref<'_, Storage> {
        self.storage.borrow()
    }

    pub fn storage_mut(&self) -> RefMut<'_, Storage> {
        self.storage.borrow_mut()
    }

    pub fn clipboard(&self) -> Ref<'_, Clipboard> {
        self.clipboard.borrow()
    }

    pub fn clipboard_mut(&self) -> RefMut<'_, Clipboard> {
        self.clipboard.borrow_mut()
    }

    pub fn timers(&self) -> Ref<'_, Timers> {
        self.timers.borrow()
    }

    pub fn timers_mut(&self) -> RefMut<'_, Timers> {
        self.timers.borrow_mut()
    }

    pub fn history(&self) -> Ref<'_, History> {
        self.history.borrow()
    }

    pub fn history_mut(&self) -> RefMut<'_, History> {
        self.history.borrow_mut()
    }

    pub fn observers(&self) -> Ref<'_, Observers> {
        self.observers.borrow()
    }

    pub fn observers_mut(&self) -> RefMut<'_, Observers> {
        self.observers.borrow_mut()
    }

    pub fn console(&self) -> Ref<'_, Console> {
        self.console.borrow()
    }

    pub fn console_mut(&self) -> RefMut<'_, Console> {
        self.console.borrow_mut()
    }

    pub fn fetcher_mut(&self) -> RefMut<'_, Box<dyn Fetch>> {
        self.fetcher.borrow_mut()
    }
}
