//! Allocation policy.
//!
//! Every bucket array and every overflow array is reserved through an
//! `Allocator` held by the map instance. The reservation is the only point
//! where an operation can fail, which lets callers bound or simulate
//! allocation failure per map.

use crate::error::MapError;
use core::cell::Cell;

/// Per-instance allocation policy for the map's backing vectors.
pub trait Allocator {
    /// Reserve room for exactly `additional` more elements in `buf`.
    ///
    /// On error `buf` must be left untouched.
    fn try_reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<(), MapError>;
}

/// The global allocator, through `Vec::try_reserve_exact`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Global;

impl Allocator for Global {
    #[inline]
    fn try_reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<(), MapError> {
        buf.try_reserve_exact(additional)
            .map_err(|_| MapError::AllocFailed { slots: additional })
    }
}

impl<A: Allocator> Allocator for &A {
    #[inline]
    fn try_reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<(), MapError> {
        (**self).try_reserve(buf, additional)
    }
}

/// An allocator that grants a fixed number of reservations and then
/// refuses every further one.
///
/// Empty reservations are free and never consume a grant.
#[derive(Debug)]
pub struct Budget<A = Global> {
    inner: A,
    remaining: Cell<usize>,
}

impl Budget {
    pub fn new(grants: usize) -> Self {
        Self::with_allocator(grants, Global)
    }

    /// A budget that never runs out.
    pub fn unlimited() -> Self {
        Self::new(usize::MAX)
    }
}

impl<A> Budget<A> {
    pub fn with_allocator(grants: usize, inner: A) -> Self {
        Self {
            inner,
            remaining: Cell::new(grants),
        }
    }

    pub fn remaining(&self) -> usize {
        self.remaining.get()
    }

    /// Replace the number of remaining grants.
    pub fn set_remaining(&self, grants: usize) {
        self.remaining.set(grants);
    }
}

impl<A: Allocator> Allocator for Budget<A> {
    fn try_reserve<T>(&self, buf: &mut Vec<T>, additional: usize) -> Result<(), MapError> {
        if additional == 0 {
            return Ok(());
        }
        let left = self.remaining.get();
        if left == 0 {
            return Err(MapError::AllocFailed { slots: additional });
        }
        self.inner.try_reserve(buf, additional)?;
        self.remaining.set(left - 1);
        Ok(())
    }
}
