use thiserror::Error;

use crate::MAX_DIM;

/// Errors reported by workspace construction, dispatch and insertion.
///
/// All of them signal a caller error rather than a transient failure, retrying the same call
/// fails the same way.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkspaceError {
    /// The requested number of dimensions is 0 or larger than [`MAX_DIM`].
    #[error("cannot use a workspace with {0} dimensions, supported dimension counts are 1..={max}", max = MAX_DIM)]
    InvalidDimension(usize),

    /// Some input disagrees with the dimensionality it is used with.
    #[error("{what} has {found} dimensions but {expected} were expected")]
    DimensionMismatch {
        /// What was mismatched.
        what: &'static str,
        /// Dimensionality that was expected.
        expected: usize,
        /// Dimensionality that was provided.
        found: usize,
    },

    /// The operation needs a bound workspace but none is.
    #[error("no workspace is bound")]
    Uninitialized,

    /// The coordinate buffer is not shaped for events of the bound dimensionality.
    #[error("{values} coordinates do not describe {count} events of {expected} dimensions")]
    TypeMismatch {
        /// Dimensionality of the bound workspace.
        expected: usize,
        /// Number of values in the coordinate buffer.
        values: usize,
        /// Number of events declared by the caller.
        count: usize,
    },

    /// A per-event buffer holds fewer values than the declared event count needs.
    #[error("{buffer} buffer holds {found} values, {expected} are needed")]
    BufferLength {
        /// Name of the short buffer.
        buffer: &'static str,
        /// Number of values needed.
        expected: usize,
        /// Number of values provided.
        found: usize,
    },

    /// A dimension descriptor violates `min < max` or `num_bins >= 1`.
    #[error("dimension `{name}` is invalid: {reason}")]
    InvalidDescriptor {
        /// Name of the offending dimension.
        name: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A box controller policy that cannot split boxes.
    #[error("invalid box controller: {0}")]
    InvalidBoxController(&'static str),

    /// A writer panicked while holding the workspace lock.
    #[error("workspace lock poisoned")]
    LockPoisoned,
}

/// Result type used throughout the crate.
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;
