use core::fmt;

/// Result alias for `treeclust`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the clustering engine and its numeric primitives.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Input was empty.
    EmptyInput,

    /// Matrix or vector dimension mismatch.
    DimensionMismatch {
        /// Expected dimension.
        expected: usize,
        /// Found dimension.
        found: usize,
    },

    /// A matrix that must be positive definite was not (Cholesky failed).
    SingularMatrix,

    /// Invalid number of clusters requested.
    InvalidClusterCount {
        /// Requested count.
        requested: usize,
        /// Number of items.
        n_items: usize,
    },

    /// Invalid parameter value.
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Error message.
        message: &'static str,
    },

    /// A structural index was read before the tree was annotated.
    MissingIndex {
        /// Tree identifier.
        tree: usize,
        /// Index name.
        index: &'static str,
    },

    /// Branching and linearity indices are both zero, so the branching ratio is undefined.
    DegenerateIndices {
        /// Tree identifier.
        tree: usize,
    },

    /// The structural index calculator failed for a tree.
    IndexCalculation {
        /// Tree identifier.
        tree: usize,
        /// Calculator message.
        message: String,
    },

    /// Generic error with message.
    Other(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::EmptyInput => write!(f, "empty input provided"),
            Error::DimensionMismatch { expected, found } => {
                write!(f, "dimension mismatch: expected {expected}, found {found}")
            }
            Error::SingularMatrix => write!(f, "matrix is not positive definite"),
            Error::InvalidClusterCount { requested, n_items } => {
                write!(f, "cannot create {requested} clusters from {n_items} items")
            }
            Error::InvalidParameter { name, message } => {
                write!(f, "invalid parameter '{name}': {message}")
            }
            Error::MissingIndex { tree, index } => {
                write!(f, "tree {tree} has no {index}; annotate summaries first")
            }
            Error::DegenerateIndices { tree } => {
                write!(
                    f,
                    "tree {tree} has zero branching and linearity indices"
                )
            }
            Error::IndexCalculation { tree, message } => {
                write!(f, "index calculation failed for tree {tree}: {message}")
            }
            Error::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for Error {}
