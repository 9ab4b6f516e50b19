//! Tree constructors for the three raw-data shapes.
//!
//! All builders share one [`BuildOptions`] policy: filter, depth limit,
//! traversal cap, expand predicate and progress callback. A traversal cap hit
//! is soft: the builder returns whatever it built together with
//! [`TreeError::TraversalLimit`].

mod flat;
mod fs;
mod nested;

pub use flat::{FlatItem, FlatRecord, flat};
pub use fs::{FileInfo, FileKey, FileSystem, OsFileSystem, filesystem};
pub use nested::{NestedItem, Record, nested};

use crate::cancel::CancelToken;
use crate::error::{PartialError, TreeError};
use crate::node::Node;
use crate::options::{BuildOptions, Limits};

/// Result of a builder: the roots, or an error with the partial roots.
pub type BuildOutcome<T> = Result<Vec<Node<T>>, PartialError<Vec<Node<T>>>>;

/// Per-call bookkeeping shared by the builders.
pub(crate) struct BuildState<'a, I, T> {
    pub(crate) cancel: &'a CancelToken,
    pub(crate) options: &'a mut BuildOptions<I, T>,
    pub(crate) processed: usize,
    pub(crate) cap_hit: bool,
}

impl<'a, I, T> BuildState<'a, I, T> {
    pub(crate) fn new(cancel: &'a CancelToken, options: &'a mut BuildOptions<I, T>) -> Self {
        Self {
            cancel,
            options,
            processed: 0,
            cap_hit: false,
        }
    }

    pub(crate) fn limits(&self) -> Limits {
        self.options.limits
    }

    /// Claims a slot for one more node. Returns `false` and flags the cap
    /// once the traversal cap has been reached.
    pub(crate) fn reserve(&mut self) -> bool {
        if self.cap_hit || self.limits().cap_reached(self.processed) {
            if !self.cap_hit {
                log::debug!("[build] traversal cap reached after {} nodes", self.processed);
            }
            self.cap_hit = true;
            return false;
        }
        true
    }

    /// Counts a freshly created node and reports progress.
    pub(crate) fn created(&mut self, node: &Node<T>) {
        self.processed += 1;
        self.options.report(self.processed, node);
    }

    /// Wraps up a build: a cap hit turns into a soft error carrying `roots`.
    pub(crate) fn finish(self, roots: Vec<Node<T>>) -> BuildOutcome<T> {
        log::debug!(
            "[build] materialized {} nodes in {} roots (cap hit: {})",
            self.processed,
            roots.len(),
            self.cap_hit
        );
        match self.limits().traversal_cap {
            Some(limit) if self.cap_hit => Err(PartialError::new(
                TreeError::TraversalLimit { limit },
                roots,
            )),
            _ => Ok(roots),
        }
    }

    /// Wraps up a build that failed with `error`.
    pub(crate) fn fail(self, error: TreeError, roots: Vec<Node<T>>) -> BuildOutcome<T> {
        log::debug!(
            "[build] aborted after {} nodes: {}",
            self.processed,
            error
        );
        Err(PartialError::new(error, roots))
    }
}
