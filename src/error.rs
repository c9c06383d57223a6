//! Allocation errors, the only failure the map reports.

use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

/// Storage for the map could not be obtained. The map that reported it is
/// left exactly as it was before the call.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The requested entry count does not fit in a valid allocation layout.
    #[error("capacity overflow while reserving room for {requested} entries")]
    CapacityOverflow { requested: usize },

    /// The allocator refused to provide the hash index.
    #[error("allocation failed while reserving room for {requested} entries")]
    AllocFailed { requested: usize },
}

impl Error {
    pub(crate) fn from_reserve(err: hashbrown::TryReserveError, requested: usize) -> Self {
        match err {
            hashbrown::TryReserveError::CapacityOverflow => Error::CapacityOverflow { requested },
            hashbrown::TryReserveError::AllocError { .. } => Error::AllocFailed { requested },
        }
    }
}
