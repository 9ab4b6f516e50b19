//! Error types for tree construction, navigation and rendering.

use std::fmt;
use std::path::PathBuf;

use crate::tree::Tree;

/// Result type alias for arbor operations.
pub type Result<T, E = TreeError> = std::result::Result<T, E>;

/// Errors that can occur while building or operating on a tree.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A record yielded an empty identifier.
    #[error("node id must not be empty")]
    EmptyId,

    /// A parent chain in flat data loops back on itself.
    #[error("cyclic parent reference detected for node '{id}'")]
    CyclicReference {
        /// Node whose parent chain loops.
        id: String,
    },

    /// A flat record references a parent id that is not in the input.
    #[error("parent '{parent_id}' of node '{id}' not found")]
    ParentNotFound {
        /// Node referencing the missing parent.
        id: String,
        /// The missing parent id.
        parent_id: String,
    },

    /// The traversal cap was reached. Always paired with a partial result.
    #[error("traversal limit of {limit} nodes exceeded")]
    TraversalLimit {
        /// The configured cap.
        limit: usize,
    },

    /// Lookup of an id that is not in the tree.
    #[error("node '{0}' not found")]
    NodeNotFound(String),

    /// Stat or metadata failure on a path.
    #[error("file system error at {}: {source}", .path.display())]
    FileSystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root path could not be resolved.
    #[error("cannot resolve path {}: {source}", .path.display())]
    PathResolution {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A directory listing failed.
    #[error("cannot scan directory {}: {source}", .path.display())]
    DirectoryScan {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A symlink chain or directory link loops back on itself.
    #[error("symlink loop detected at {}", .path.display())]
    SymlinkLoop { path: PathBuf },

    /// The caller's cancellation token fired.
    #[error("operation cancelled")]
    Cancelled,

    /// The caller's deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl TreeError {
    /// Returns `true` for `Cancelled` and `DeadlineExceeded`.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::DeadlineExceeded)
    }

    /// Returns `true` if this error always comes with a usable partial result.
    pub fn is_soft(&self) -> bool {
        matches!(self, Self::TraversalLimit { .. })
    }

    /// Returns `true` for errors caused by malformed input structure.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::EmptyId | Self::CyclicReference { .. } | Self::ParentNotFound { .. }
        )
    }

    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileSystem {
            path: path.into(),
            source,
        }
    }
}

/// An error together with whatever was produced before it occurred.
///
/// Returned by constructors and searches so callers can show a truncated
/// result instead of nothing.
pub struct PartialError<P> {
    /// What went wrong.
    pub error: TreeError,
    /// Best-effort result accumulated up to the failure.
    pub partial: P,
}

/// Error returned by tree constructors.
pub type BuildError<T> = PartialError<Tree<T>>;

impl<P> PartialError<P> {
    pub fn new(error: TreeError, partial: P) -> Self {
        Self { error, partial }
    }

    /// Discards the partial result.
    pub fn into_error(self) -> TreeError {
        self.error
    }

    /// Discards the error.
    pub fn into_partial(self) -> P {
        self.partial
    }

    /// Returns the partial result when the error is soft, the error otherwise.
    pub fn recover(self) -> Result<P> {
        if self.error.is_soft() {
            Ok(self.partial)
        } else {
            Err(self.error)
        }
    }
}

impl<P> fmt::Debug for PartialError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PartialError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<P> fmt::Display for PartialError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (partial result available)", self.error)
    }
}

impl<P> std::error::Error for PartialError<P> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.error)
    }
}
