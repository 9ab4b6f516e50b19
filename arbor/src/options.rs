//! Construction policy shared by every builder.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::node::Node;
use crate::strategy::{FocusPolicy, RenderProvider, SearchPredicate};

/// Resource limits for one construction call.
///
/// Deserializable so hosts can keep them in their own config files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Levels kept below the roots. `None` = unlimited, `Some(0)` = roots only.
    pub max_depth: Option<usize>,
    /// Maximum number of nodes materialized. `None` or `Some(0)` = unlimited.
    pub traversal_cap: Option<usize>,
}

impl Limits {
    /// Build limits from signed values: a negative depth or a cap `<= 0`
    /// means unlimited.
    pub fn from_signed(max_depth: i64, traversal_cap: i64) -> Self {
        Self {
            max_depth: usize::try_from(max_depth).ok(),
            traversal_cap: usize::try_from(traversal_cap).ok().filter(|cap| *cap > 0),
        }
    }

    /// Whether a node at `depth` may have children materialized.
    pub fn allows_children(&self, depth: usize) -> bool {
        self.max_depth.is_none_or(|max| depth < max)
    }

    /// Whether `processed` nodes have already reached the cap.
    pub fn cap_reached(&self, processed: usize) -> bool {
        self.traversal_cap
            .is_some_and(|cap| cap > 0 && processed >= cap)
    }
}

type Filter<I> = Box<dyn Fn(&I) -> bool>;
type ExpandFn<T> = Box<dyn Fn(&Node<T>) -> bool>;
type ProgressFn<T> = Box<dyn FnMut(usize, &Node<T>)>;

/// Policy object consumed by the builders.
///
/// `I` is the raw input item (a record, a flat row, a file entry) seen by the
/// filter; `T` is the node payload.
pub struct BuildOptions<I, T> {
    pub(crate) limits: Limits,
    pub(crate) filter: Option<Filter<I>>,
    pub(crate) expand: Option<ExpandFn<T>>,
    pub(crate) progress: Option<ProgressFn<T>>,
    pub(crate) search: Option<Arc<dyn SearchPredicate<T>>>,
    pub(crate) focus_policy: Option<Arc<dyn FocusPolicy<T>>>,
    pub(crate) provider: Option<Arc<dyn RenderProvider<T>>>,
}

impl<I, T> Default for BuildOptions<I, T> {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            filter: None,
            expand: None,
            progress: None,
            search: None,
            focus_policy: None,
            provider: None,
        }
    }
}

impl<I, T> fmt::Debug for BuildOptions<I, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuildOptions")
            .field("limits", &self.limits)
            .field("filter", &self.filter.is_some())
            .field("expand", &self.expand.is_some())
            .field("progress", &self.progress.is_some())
            .finish_non_exhaustive()
    }
}

impl<I, T> BuildOptions<I, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep only items for which `filter` returns `true`. A rejected item
    /// drops its whole subtree.
    pub fn with_filter(mut self, filter: impl Fn(&I) -> bool + 'static) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.limits.max_depth = Some(max_depth);
        self
    }

    /// Stop after `cap` nodes. A cap of 0 means unlimited.
    pub fn with_traversal_cap(mut self, cap: usize) -> Self {
        self.limits.traversal_cap = (cap > 0).then_some(cap);
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Decide per node whether it starts expanded. Called after the node's
    /// children are attached.
    pub fn with_expand(mut self, expand: impl Fn(&Node<T>) -> bool + 'static) -> Self {
        self.expand = Some(Box::new(expand));
        self
    }

    /// Start every node expanded.
    pub fn expand_all(self) -> Self {
        self.with_expand(|_| true)
    }

    /// Called with the running count after each node is created.
    pub fn with_progress(mut self, progress: impl FnMut(usize, &Node<T>) + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    pub fn with_search(mut self, search: impl SearchPredicate<T> + 'static) -> Self {
        self.search = Some(Arc::new(search));
        self
    }

    pub fn with_focus_policy(mut self, policy: impl FocusPolicy<T> + 'static) -> Self {
        self.focus_policy = Some(Arc::new(policy));
        self
    }

    pub fn with_provider(mut self, provider: impl RenderProvider<T> + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    pub(crate) fn keeps(&self, item: &I) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(item))
    }

    pub(crate) fn apply_expand(&self, node: &mut Node<T>) {
        if let Some(expand) = &self.expand {
            let expanded = expand(node);
            node.set_expanded(expanded);
        }
    }

    pub(crate) fn report(&mut self, processed: usize, node: &Node<T>) {
        if let Some(progress) = &mut self.progress {
            progress(processed, node);
        }
    }
}
