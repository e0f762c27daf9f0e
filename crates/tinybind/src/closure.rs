//! Host-callable wrappers around module closures.
//!
//! A module closure is an environment `(a, b)` plus a destructor and an
//! invoker living in the module. The host wraps it in a reference counted
//! [`HostClosure`]; the module-side destructor runs exactly once, either when
//! the count drops to zero or when the [`ClosureRegistry`] finds that every
//! host-side wrapper was dropped without being released.

use alloc::{rc::Rc, rc::Weak, vec::Vec};
use core::cell::RefCell;
use core::fmt::Debug;
use log::{debug, trace, warn};
use tinywasm::types::WasmValue;

use crate::guest::Guest;
use crate::{Error, Result};

/// A function living in the module
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestFn {
    /// The export to call
    pub export: Rc<str>,
    /// Passed as the first argument, for dispatcher exports taking a table index
    pub selector: Option<i32>,
}

impl GuestFn {
    pub fn new(export: impl Into<Rc<str>>) -> Self {
        Self { export: export.into(), selector: None }
    }

    /// A function reached through a dispatcher export
    pub fn dispatched(export: impl Into<Rc<str>>, selector: i32) -> Self {
        Self { export: export.into(), selector: Some(selector) }
    }

    fn args(&self, a: i32, b: i32, rest: &[WasmValue]) -> Vec<WasmValue> {
        let mut args = Vec::with_capacity(rest.len() + 3);
        args.extend(self.selector.map(WasmValue::I32));
        args.push(WasmValue::I32(a));
        args.push(WasmValue::I32(b));
        args.extend_from_slice(rest);
        args
    }
}

#[derive(Debug)]
struct ClosureState {
    a: i32,
    b: i32,
    count: u32,
    dtor: GuestFn,
    invoke: GuestFn,
    destroyed: bool,
}

/// A module closure callable from the host
///
/// Clones share the same state. The module's initial reference is released
/// through [`HostClosure::unref`].
#[derive(Clone)]
pub struct HostClosure {
    state: Rc<RefCell<ClosureState>>,
    marker: Rc<()>,
}

impl Debug for HostClosure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("HostClosure")
            .field("a", &state.a)
            .field("b", &state.b)
            .field("count", &state.count)
            .field("destroyed", &state.destroyed)
            .finish()
    }
}

impl HostClosure {
    /// Call the closure with the given arguments
    ///
    /// While the call runs the environment pointer is zeroed, so a reentrant
    /// invocation sees a cleared environment.
    pub fn invoke<G: Guest + ?Sized>(&self, guest: &mut G, args: &[WasmValue]) -> Result<Vec<WasmValue>> {
        let (a, b, invoke) = {
            let mut state = self.state.borrow_mut();
            if state.destroyed {
                return Err(Error::ClosureDestroyed);
            }

            state.count += 1;
            let a = state.a;
            state.a = 0;
            (a, state.b, state.invoke.clone())
        };

        trace!("invoking closure ({a}, {b}) through {}", invoke.export);
        let result = guest.call(&invoke.export, &invoke.args(a, b, args));

        self.state.borrow_mut().a = a;
        let released = self.unref(guest);
        let result = result?;
        released?;
        Ok(result)
    }

    /// Drop one reference, running the destructor when none are left
    ///
    /// Releasing a destroyed closure does nothing.
    pub fn unref<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<()> {
        let Some((dtor, a, b)) = self.release() else {
            return Ok(());
        };

        debug!("destroying closure ({a}, {b})");
        guest.call(&dtor.export, &dtor.args(a, b, &[]))?;
        self.state.borrow_mut().a = 0;
        Ok(())
    }

    fn release(&self) -> Option<(GuestFn, i32, i32)> {
        let mut state = self.state.borrow_mut();
        if state.destroyed || state.count == 0 {
            return None;
        }

        state.count -= 1;
        if state.count > 0 {
            return None;
        }

        state.destroyed = true;
        Some((state.dtor.clone(), state.a, state.b))
    }

    /// Current reference count
    pub fn count(&self) -> u32 {
        self.state.borrow().count
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// The environment pair, `a` reads as 0 while an invocation runs
    pub fn env(&self) -> (i32, i32) {
        let state = self.state.borrow();
        (state.a, state.b)
    }

    /// Whether both wrappers refer to the same closure
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

struct Registration {
    marker: Weak<()>,
    state: Rc<RefCell<ClosureState>>,
}

/// Creates closures and destroys the ones the host leaked
#[derive(Default)]
pub struct ClosureRegistry {
    entries: RefCell<Vec<Registration>>,
}

impl Debug for ClosureRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClosureRegistry").field("entries", &self.entries.borrow().len()).finish()
    }
}

impl ClosureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a module closure, holding one reference for the module
    pub fn wrap(&self, a: i32, b: i32, dtor: GuestFn, invoke: GuestFn) -> HostClosure {
        let state = Rc::new(RefCell::new(ClosureState { a, b, count: 1, dtor, invoke, destroyed: false }));
        let marker = Rc::new(());

        let mut entries = self.entries.borrow_mut();
        entries.retain(|entry| !entry.state.borrow().destroyed);
        entries.push(Registration { marker: Rc::downgrade(&marker), state: state.clone() });
        HostClosure { state, marker }
    }

    /// Registrations still tracked, destroyed or not
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Drop every registration without running destructors
    ///
    /// For closures of an instance that no longer exists; wrappers still held
    /// anywhere report [`Error::ClosureDestroyed`] when invoked.
    pub fn forget(&self) {
        for entry in self.entries.borrow_mut().drain(..) {
            let mut state = entry.state.borrow_mut();
            state.destroyed = true;
            state.a = 0;
        }
    }

    /// Closures not yet destroyed
    pub fn live(&self) -> usize {
        self.entries.borrow().iter().filter(|entry| !entry.state.borrow().destroyed).count()
    }

    /// Destroy closures whose wrappers were all dropped without release
    ///
    /// Returns how many destructors ran.
    pub fn collect<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<usize> {
        let mut leaked = Vec::new();
        self.entries.borrow_mut().retain(|entry| {
            if entry.state.borrow().destroyed {
                return false;
            }

            if entry.marker.strong_count() > 0 {
                return true;
            }

            leaked.push(entry.state.clone());
            false
        });

        // every leaked closure gets its destructor, even after one fails
        let mut destroyed = 0;
        let mut failed = None;
        for state in leaked {
            let (dtor, a, b) = {
                let mut state = state.borrow_mut();
                if state.destroyed {
                    continue;
                }
                state.destroyed = true;
                (state.dtor.clone(), state.a, state.b)
            };

            debug!("collecting leaked closure ({a}, {b})");
            let result = guest.call(&dtor.export, &dtor.args(a, b, &[]));
            state.borrow_mut().a = 0;
            match result {
                Ok(_) => destroyed += 1,
                Err(err) => {
                    warn!("destructor of leaked closure ({a}, {b}) failed: {err}");
                    failed.get_or_insert(err);
                }
            }
        }

        match failed {
            Some(err) => Err(err),
            None => Ok(destroyed),
        }
    }
}
