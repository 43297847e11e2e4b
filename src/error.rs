//! Error type for fallible map operations.
//!
//! Lookups never fail: a missing key is `None`. Only operations that
//! allocate can return a `MapError`, and when they do the map is left as
//! it was before the call.

/// Failure of an allocating operation.
#[derive(Clone, Copy, Debug, Eq, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum MapError {
    /// The requested number of buckets or slots cannot be represented.
    #[error("capacity overflow")]
    CapacityOverflow,

    /// The allocator refused to reserve room for `slots` more elements.
    #[error("allocation of {slots} slots failed")]
    AllocFailed { slots: usize },
}
