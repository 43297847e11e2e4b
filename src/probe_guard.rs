//! Debug-only guard against reentering a map while it probes a bucket.
//!
//! A probe calls user code (`K: Hash`, `K: Eq`). If that code reaches back
//! into the same map, the bucket under inspection may be half-updated. In
//! debug builds the guard records which operation holds the map and panics
//! on a nested entry, naming both operations. In release builds it is a
//! zero-sized no-op.
//!
//! The guard keeps the map `!Sync` in every build profile, so the auto
//! traits do not depend on `debug_assertions`.

use core::cell::Cell;
use core::marker::PhantomData;

#[derive(Debug, Default)]
pub(crate) struct ProbeGuard {
    #[cfg(debug_assertions)]
    holder: Cell<Option<&'static str>>,
    _not_sync: PhantomData<Cell<()>>,
}

impl ProbeGuard {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            holder: Cell::new(None),
            _not_sync: PhantomData,
        }
    }

    /// Mark the map as held by `op` until the returned scope is dropped.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> ProbeScope<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.holder.replace(Some(op)) {
                // Restore so the outer scope's drop sees consistent state
                // while the panic unwinds.
                self.holder.set(Some(outer));
                panic!("reentrant `{op}` on a map already inside `{outer}`");
            }
            return ProbeScope { guard: self };
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            return ProbeScope { _lt: PhantomData };
        }
    }
}

pub(crate) struct ProbeScope<'a> {
    #[cfg(debug_assertions)]
    guard: &'a ProbeGuard,
    #[cfg(not(debug_assertions))]
    _lt: PhantomData<&'a ()>,
}

impl Drop for ProbeScope<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.guard.holder.set(None);
    }
}
