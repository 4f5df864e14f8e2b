//! Registry implementation.

use std::{
    collections::HashMap,
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, Weak,
        atomic::{AtomicU64, Ordering},
    },
};

use log::{debug, warn};

use crate::net::{Envelope, opcode};

/// Callback for a specific opcode.
pub type Handler = Arc<dyn Fn(&Envelope) -> anyhow::Result<()> + Send + Sync>;

/// Fallback callback; returns `true` if it handled the envelope.
pub type DefaultHandler = Arc<dyn Fn(&Envelope) -> anyhow::Result<bool> + Send + Sync>;

/// Identity of one registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// Outcome of one [`DispatchRegistry::dispatch`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Handlers called.
    pub invoked: usize,
    /// Handlers that returned an error or panicked.
    pub failed: usize,
    /// A specific handler ran, or a default reported it handled the envelope.
    pub handled: bool,
    /// The default list was used because no specific handler was registered.
    pub used_defaults: bool,
}

#[derive(Default)]
struct Handlers {
    by_opcode: HashMap<u16, Vec<(HandlerId, Handler)>>,
    defaults: Vec<(HandlerId, DefaultHandler)>,
}

struct Inner {
    handlers: Mutex<Handlers>,
    next_id: AtomicU64,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, Handlers> {
        // Handlers never run under the lock, so a poisoned guard still holds
        // consistent lists.
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, slot: Slot, id: HandlerId) -> bool {
        let mut handlers = self.lock();
        match slot {
            Slot::Opcode(op) => {
                let Some(list) = handlers.by_opcode.get_mut(&op) else {
                    return false;
                };
                let before = list.len();
                list.retain(|(hid, _)| *hid != id);
                let removed = list.len() != before;
                if list.is_empty() {
                    handlers.by_opcode.remove(&op);
                }
                removed
            }
            Slot::Default => {
                let before = handlers.defaults.len();
                handlers.defaults.retain(|(hid, _)| *hid != id);
                handlers.defaults.len() != before
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Opcode(u16),
    Default,
}

/// Shared opcode → handler registry.
///
/// Cloning yields another handle to the same registry.
#[derive(Clone)]
pub struct DispatchRegistry {
    inner: Arc<Inner>,
}

impl DispatchRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(Handlers::default()),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Append `handler` to the ordered list for `opcode`.
    ///
    /// # Returns
    ///
    /// * `Registration` - Token that unregisters the handler when dropped
    pub fn register<F>(&self, opcode: u16, handler: F) -> Registration
    where
        F: Fn(&Envelope) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner
            .lock()
            .by_opcode
            .entry(opcode)
            .or_default()
            .push((id, Arc::new(handler)));
        self.token(Slot::Opcode(opcode), id)
    }

    /// Append `handler` to the fallback list.
    ///
    /// Defaults only run for opcodes with no specific registration.
    pub fn register_default<F>(&self, handler: F) -> Registration
    where
        F: Fn(&Envelope) -> anyhow::Result<bool> + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.inner.lock().defaults.push((id, Arc::new(handler)));
        self.token(Slot::Default, id)
    }

    /// Remove a handler from `opcode`'s list. Absent handlers are a no-op.
    ///
    /// # Returns
    ///
    /// * `bool` - Whether a handler was removed
    pub fn unregister(&self, opcode: u16, id: HandlerId) -> bool {
        self.inner.remove(Slot::Opcode(opcode), id)
    }

    /// Remove a default handler. Absent handlers are a no-op.
    pub fn unregister_default(&self, id: HandlerId) -> bool {
        self.inner.remove(Slot::Default, id)
    }

    /// Number of handlers registered for `opcode`.
    pub fn handler_count(&self, opcode: u16) -> usize {
        self.inner
            .lock()
            .by_opcode
            .get(&opcode)
            .map_or(0, Vec::len)
    }

    /// Deliver `envelope` to every interested handler.
    ///
    /// Handlers are snapshotted before any of them runs, so a handler may
    /// register or unregister without deadlocking; changes take effect on the
    /// next dispatch. A handler that errors or panics is logged and counted
    /// and does not stop the rest.
    pub fn dispatch(&self, envelope: &Envelope) -> DispatchReport {
        let (specific, defaults) = {
            let handlers = self.inner.lock();
            match handlers.by_opcode.get(&envelope.opcode) {
                Some(list) if !list.is_empty() => (
                    list.iter().map(|(_, h)| Arc::clone(h)).collect::<Vec<_>>(),
                    Vec::new(),
                ),
                _ => (
                    Vec::new(),
                    handlers
                        .defaults
                        .iter()
                        .map(|(_, h)| Arc::clone(h))
                        .collect::<Vec<_>>(),
                ),
            }
        };

        let mut report = DispatchReport::default();

        if !specific.is_empty() {
            for handler in specific {
                report.invoked += 1;
                if isolate(envelope, || handler(envelope)).is_none() {
                    report.failed += 1;
                }
            }
            report.handled = true;
            return report;
        }

        report.used_defaults = true;
        for handler in defaults {
            report.invoked += 1;
            match isolate(envelope, || handler(envelope)) {
                Some(true) => report.handled = true,
                Some(false) => {}
                None => report.failed += 1,
            }
        }

        if !report.handled {
            debug!(
                "no handler claimed {} seq={}",
                opcode::describe(envelope.opcode),
                envelope.sequence
            );
        }
        report
    }

    fn next_id(&self) -> HandlerId {
        HandlerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn token(&self, slot: Slot, id: HandlerId) -> Registration {
        Registration {
            registry: Arc::downgrade(&self.inner),
            slot,
            id,
        }
    }
}

impl Default for DispatchRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DispatchRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.inner.lock();
        f.debug_struct("DispatchRegistry")
            .field("opcodes", &handlers.by_opcode.len())
            .field("defaults", &handlers.defaults.len())
            .finish()
    }
}

/// Run one handler, converting an error or panic into `None`.
fn isolate<T>(envelope: &Envelope, call: impl FnOnce() -> anyhow::Result<T>) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            warn!(
                "handler for {} seq={} failed: {e:#}",
                opcode::describe(envelope.opcode),
                envelope.sequence
            );
            None
        }
        Err(_) => {
            warn!(
                "handler for {} seq={} panicked",
                opcode::describe(envelope.opcode),
                envelope.sequence
            );
            None
        }
    }
}

/// Scoped handler registration.
///
/// Dropping the token unregisters the handler. Call [`Registration::keep`]
/// for handlers that live as long as the registry.
#[must_use = "dropping a Registration unregisters the handler immediately"]
pub struct Registration {
    registry: Weak<Inner>,
    slot: Slot,
    id: HandlerId,
}

impl Registration {
    pub fn id(&self) -> HandlerId {
        self.id
    }

    /// Opcode this registration listens on; `None` for defaults.
    pub fn opcode(&self) -> Option<u16> {
        match self.slot {
            Slot::Opcode(op) => Some(op),
            Slot::Default => None,
        }
    }

    /// Keep the handler registered for the registry's lifetime.
    pub fn keep(mut self) {
        self.registry = Weak::new();
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if let Some(inner) = self.registry.upgrade() {
            inner.remove(self.slot, self.id);
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::Body;
    use std::sync::Mutex as StdMutex;

    fn env(opcode: u16) -> Envelope {
        Envelope::new(opcode, 1, Body::Empty)
    }

    #[test]
    fn test_fan_out_in_order_despite_failure() {
        let registry = DispatchRegistry::new();
        let calls = Arc::new(StdMutex::new(Vec::new()));

        let c = Arc::clone(&calls);
        let _a = registry.register(0x00C8, move |_| {
            c.lock().unwrap().push("a");
            anyhow::bail!("first handler fails")
        });
        let c = Arc::clone(&calls);
        let _b = registry.register(0x00C8, move |_| {
            c.lock().unwrap().push("b");
            Ok(())
        });
        let c = Arc::clone(&calls);
        let _c = registry.register(0x00C8, move |_| {
            c.lock().unwrap().push("c");
            Ok(())
        });

        let report = registry.dispatch(&env(0x00C8));
        assert_eq!(*calls.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(report.invoked, 3);
        assert_eq!(report.failed, 1);
        assert!(report.handled);
        assert!(!report.used_defaults);
    }

    #[test]
    fn test_panicking_handler_is_isolated() {
        let registry = DispatchRegistry::new();
        let ran = Arc::new(StdMutex::new(false));
        let _p = registry.register(7, |_| panic!("boom"));
        let r = Arc::clone(&ran);
        let _ok = registry.register(7, move |_| {
            *r.lock().unwrap() = true;
            Ok(())
        });

        let report = registry.dispatch(&env(7));
        assert!(*ran.lock().unwrap());
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_defaults_run_only_without_specific() {
        let registry = DispatchRegistry::new();
        let seen = Arc::new(StdMutex::new(Vec::new()));

        let s = Arc::clone(&seen);
        let _d1 = registry.register_default(move |e| {
            s.lock().unwrap().push(("d1", e.opcode));
            Ok(false)
        });
        let s = Arc::clone(&seen);
        let _d2 = registry.register_default(move |e| {
            s.lock().unwrap().push(("d2", e.opcode));
            Ok(true)
        });

        let report = registry.dispatch(&env(0x02C0));
        assert_eq!(*seen.lock().unwrap(), vec![("d1", 0x02C0), ("d2", 0x02C0)]);
        assert!(report.used_defaults);
        assert!(report.handled);

        seen.lock().unwrap().clear();
        let s = Arc::clone(&seen);
        let _specific = registry.register(0x02C0, move |e| {
            s.lock().unwrap().push(("specific", e.opcode));
            Ok(())
        });
        let report = registry.dispatch(&env(0x02C0));
        assert_eq!(*seen.lock().unwrap(), vec![("specific", 0x02C0)]);
        assert!(!report.used_defaults);
    }

    #[test]
    fn test_unhandled_by_defaults() {
        let registry = DispatchRegistry::new();
        let _d = registry.register_default(|_| Ok(false));
        let report = registry.dispatch(&env(1));
        assert!(report.used_defaults);
        assert!(!report.handled);
        assert_eq!(report.invoked, 1);
    }

    #[test]
    fn test_registration_drop_unregisters() {
        let registry = DispatchRegistry::new();
        let reg = registry.register(5, |_| Ok(()));
        assert_eq!(registry.handler_count(5), 1);
        drop(reg);
        assert_eq!(registry.handler_count(5), 0);

        registry.register(5, |_| Ok(())).keep();
        assert_eq!(registry.handler_count(5), 1);
    }

    #[test]
    fn test_unregister_absent_is_noop() {
        let registry = DispatchRegistry::new();
        let reg = registry.register(5, |_| Ok(()));
        let id = reg.id();
        assert!(registry.unregister(5, id));
        assert!(!registry.unregister(5, id));
        assert!(!registry.unregister(6, id));
        // Dropping the token after explicit removal is harmless.
        drop(reg);
    }

    #[test]
    fn test_handler_may_register_during_dispatch() {
        let registry = DispatchRegistry::new();
        let handle = registry.clone();
        let added = Arc::new(StdMutex::new(Vec::new()));
        let a = Arc::clone(&added);
        let _r = registry.register(9, move |_| {
            a.lock().unwrap().push(handle.register(9, |_| Ok(())));
            Ok(())
        });

        let report = registry.dispatch(&env(9));
        // The snapshot excludes the handler added mid-dispatch.
        assert_eq!(report.invoked, 1);
        assert_eq!(registry.handler_count(9), 2);
    }
}
