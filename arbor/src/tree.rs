//! Tree handle.

use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::build::{self, BuildOutcome, FileInfo, FileSystem, FlatItem, NestedItem, OsFileSystem};
use crate::cancel::CancelToken;
use crate::error::{BuildError, PartialError, Result, TreeError};
use crate::iter::VisibleOnly;
use crate::node::{self, Node};
use crate::options::BuildOptions;
use crate::render::RenderConfig;
use crate::strategy::{
    DefaultProvider, DefaultSearch, FocusPolicy, RenderProvider, SearchPredicate, WrapFocus,
};

/// The three injected strategies of a tree.
pub(crate) struct Strategies<T> {
    pub(crate) search: Arc<dyn SearchPredicate<T>>,
    pub(crate) focus: Arc<dyn FocusPolicy<T>>,
    pub(crate) provider: Arc<dyn RenderProvider<T>>,
}

impl<T: 'static> Default for Strategies<T> {
    fn default() -> Self {
        Self {
            search: Arc::new(DefaultSearch),
            focus: Arc::new(WrapFocus),
            provider: Arc::new(DefaultProvider::default()),
        }
    }
}

impl<T: 'static> Strategies<T> {
    fn from_options<I>(options: &BuildOptions<I, T>) -> Self {
        let mut strategies = Self::default();
        if let Some(search) = &options.search {
            strategies.search = Arc::clone(search);
        }
        if let Some(focus) = &options.focus_policy {
            strategies.focus = Arc::clone(focus);
        }
        if let Some(provider) = &options.provider {
            strategies.provider = Arc::clone(provider);
        }
        strategies
    }
}

/// Internal state behind the lock.
pub(crate) struct TreeInner<T> {
    /// Root nodes, in display order.
    pub(crate) nodes: Vec<Node<T>>,
    /// Focused ids, primary first.
    pub(crate) focused: Vec<String>,
    /// Mirror of `focused` for membership tests.
    pub(crate) focused_ids: HashSet<String>,
    /// First visible-order index drawn by the windowed renderer.
    pub(crate) scroll_offset: usize,
    pub(crate) render: RenderConfig,
    pub(crate) strategies: Strategies<T>,
}

impl<T> TreeInner<T> {
    fn new(nodes: Vec<Node<T>>, strategies: Strategies<T>) -> Self {
        Self {
            nodes,
            focused: Vec::new(),
            focused_ids: HashSet::new(),
            scroll_offset: 0,
            render: RenderConfig::default(),
            strategies,
        }
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Result<&mut Node<T>> {
        node::find_mut(&mut self.nodes, id).ok_or_else(|| TreeError::NodeNotFound(id.to_string()))
    }

    pub(crate) fn contains(&self, id: &str) -> bool {
        node::find(&self.nodes, id).is_some()
    }
}

/// A tree of nodes with focus state and pluggable strategies.
///
/// `Tree<T>` is a cheap, cloneable handle; clones share the same state.
/// Reads (render, lookup) take a shared lock and mutations (focus, expand,
/// node replacement) an exclusive one, so concurrent callers never observe
/// a half-applied change.
///
/// # Example
///
/// ```ignore
/// let records: Vec<Record<u32>> = serde_json::from_str(json)?;
/// let tree = Tree::from_nested(&CancelToken::new(), &records, BuildOptions::new())?;
/// tree.move_focus(&CancelToken::new(), 1)?;
/// print!("{}", tree.render(&CancelToken::new())?);
/// ```
pub struct Tree<T> {
    pub(crate) inner: Arc<RwLock<TreeInner<T>>>,
}

impl<T> Clone for Tree<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Tree<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Tree")
            .field("roots", &inner.nodes.len())
            .field("focused", &inner.focused)
            .field("scroll_offset", &inner.scroll_offset)
            .finish_non_exhaustive()
    }
}

impl<T: 'static> Default for Tree<T> {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl<T: 'static> Tree<T> {
    /// Wrap `nodes` as roots with the default strategies.
    pub fn new(nodes: Vec<Node<T>>) -> Self {
        Self::with_parts(nodes, Strategies::default())
    }

    /// Turn a builder outcome into a tree carrying the strategies from
    /// `options`. Partial roots become a partial tree.
    fn from_outcome<I>(
        outcome: BuildOutcome<T>,
        options: &BuildOptions<I, T>,
    ) -> std::result::Result<Self, BuildError<T>> {
        let strategies = Strategies::from_options(options);
        match outcome {
            Ok(nodes) => Ok(Self::with_parts(nodes, strategies)),
            Err(PartialError { error, partial }) => Err(PartialError::new(
                error,
                Self::with_parts(partial, strategies),
            )),
        }
    }

    /// Build from pre-nested records.
    pub fn from_nested<N>(
        cancel: &CancelToken,
        items: &[N],
        mut options: BuildOptions<N, T>,
    ) -> std::result::Result<Self, BuildError<T>>
    where
        N: NestedItem<Data = T>,
    {
        let outcome = build::nested(cancel, items, &mut options);
        Self::from_outcome(outcome, &options)
    }

    /// Build from flat rows that reference their parent by id.
    pub fn from_flat<F>(
        cancel: &CancelToken,
        items: &[F],
        mut options: BuildOptions<F, T>,
    ) -> std::result::Result<Self, BuildError<T>>
    where
        F: FlatItem<Data = T>,
    {
        let outcome = build::flat(cancel, items, &mut options);
        Self::from_outcome(outcome, &options)
    }
}

impl<T> Tree<T> {
    fn with_parts(mut nodes: Vec<Node<T>>, strategies: Strategies<T>) -> Self {
        for root in &mut nodes {
            root.detach();
        }
        Self {
            inner: Arc::new(RwLock::new(TreeInner::new(nodes, strategies))),
        }
    }

    // -------------------------------------------------------------------------
    // Strategies
    // -------------------------------------------------------------------------

    pub fn set_search(&self, search: impl SearchPredicate<T> + 'static) {
        self.write().strategies.search = Arc::new(search);
    }

    pub fn set_focus_policy(&self, policy: impl FocusPolicy<T> + 'static) {
        self.write().strategies.focus = Arc::new(policy);
    }

    pub fn set_provider(&self, provider: impl RenderProvider<T> + 'static) {
        self.write().strategies.provider = Arc::new(provider);
    }

    // -------------------------------------------------------------------------
    // Locking
    // -------------------------------------------------------------------------

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, TreeInner<T>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TreeInner<T>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    // -------------------------------------------------------------------------
    // Node access
    // -------------------------------------------------------------------------

    /// Run `f` over the roots under the read lock.
    pub fn with_nodes<R>(&self, f: impl FnOnce(&[Node<T>]) -> R) -> R {
        f(&self.read().nodes)
    }

    /// Replace all roots, keeping focus on ids that still exist.
    pub fn set_nodes(&self, mut nodes: Vec<Node<T>>) {
        for root in &mut nodes {
            root.detach();
        }
        let mut inner = self.write();
        inner.nodes = nodes;

        let TreeInner {
            nodes,
            focused,
            focused_ids,
            ..
        } = &mut *inner;
        focused.retain(|id| node::find(nodes, id).is_some());
        focused_ids.retain(|id| focused.contains(id));
        log::debug!(
            "[tree] replaced roots ({} nodes), {} focused ids kept",
            nodes.iter().map(Node::len).sum::<usize>(),
            focused.len()
        );
    }

    /// Total number of nodes.
    pub fn len(&self) -> usize {
        self.read().nodes.iter().map(Node::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.read().nodes.is_empty()
    }

    /// Run `f` over the node with `id`, if present.
    pub fn with_node<R>(&self, id: &str, f: impl FnOnce(&Node<T>) -> R) -> Option<R> {
        node::find(&self.read().nodes, id).map(f)
    }

    /// Mutate the node with `id` under the write lock.
    pub fn update_node<R>(&self, id: &str, f: impl FnOnce(&mut Node<T>) -> R) -> Result<R> {
        self.write().node_mut(id).map(f)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.read().contains(id)
    }

    // -------------------------------------------------------------------------
    // Expand / visibility
    // -------------------------------------------------------------------------

    pub fn expand(&self, id: &str) -> Result<()> {
        self.update_node(id, Node::expand)
    }

    pub fn collapse(&self, id: &str) -> Result<()> {
        self.update_node(id, Node::collapse)
    }

    pub fn toggle(&self, id: &str) -> Result<()> {
        self.update_node(id, Node::toggle)
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.with_node(id, Node::is_expanded).unwrap_or(false)
    }

    pub fn set_visible(&self, id: &str, visible: bool) -> Result<()> {
        self.update_node(id, |node| node.set_visible(visible))
    }

    pub fn is_visible(&self, id: &str) -> bool {
        self.with_node(id, Node::is_visible).unwrap_or(false)
    }

    /// Expand every node, including those under collapsed or hidden parents.
    pub fn expand_all(&self, cancel: &CancelToken) -> Result<()> {
        for_each_node(&mut self.write().nodes, cancel, &mut Node::expand)
    }

    pub fn collapse_all(&self, cancel: &CancelToken) -> Result<()> {
        for_each_node(&mut self.write().nodes, cancel, &mut Node::collapse)
    }

    pub fn show_all(&self, cancel: &CancelToken) -> Result<()> {
        for_each_node(&mut self.write().nodes, cancel, &mut |node| node.set_visible(true))
    }

    pub fn hide_all(&self, cancel: &CancelToken) -> Result<()> {
        for_each_node(&mut self.write().nodes, cancel, &mut |node| node.set_visible(false))
    }

    // -------------------------------------------------------------------------
    // Visible order
    // -------------------------------------------------------------------------

    /// Ids in visible-only order.
    pub fn visible_ids(&self, cancel: &CancelToken) -> Result<Vec<String>> {
        VisibleOnly::new(&self.read().nodes, cancel)
            .map(|visit| visit.map(|v| v.node.id().to_string()))
            .collect()
    }

    /// Number of nodes in the visible-only order.
    pub fn visible_len(&self, cancel: &CancelToken) -> Result<usize> {
        VisibleOnly::new(&self.read().nodes, cancel).try_fold(0, |count, visit| visit.map(|_| count + 1))
    }

    pub fn scroll_offset(&self) -> usize {
        self.read().scroll_offset
    }

    pub fn set_scroll_offset(&self, offset: usize) {
        self.write().scroll_offset = offset;
    }
}

impl<T: Clone> Tree<T> {
    /// Snapshot of the roots.
    pub fn nodes(&self) -> Vec<Node<T>> {
        self.read().nodes.clone()
    }

    /// Copy of the node with `id`.
    pub fn find(&self, id: &str) -> Option<Node<T>> {
        self.with_node(id, Node::clone)
    }
}

impl<T: Clone + 'static> Tree<T> {
    /// Wrap pre-built nodes. The nodes are copied through the nested builder,
    /// so filter, limits and expand policy all apply.
    pub fn from_nodes(
        cancel: &CancelToken,
        nodes: &[Node<T>],
        mut options: BuildOptions<Node<T>, T>,
    ) -> std::result::Result<Self, BuildError<T>> {
        let outcome = build::nested(cancel, nodes, &mut options);
        Self::from_outcome(outcome, &options)
    }
}

impl Tree<FileInfo> {
    /// Walk the local filesystem under `root`.
    pub fn from_filesystem(
        cancel: &CancelToken,
        root: impl AsRef<Path>,
        options: BuildOptions<FileInfo, FileInfo>,
    ) -> std::result::Result<Self, BuildError<FileInfo>> {
        Self::from_filesystem_with(cancel, &OsFileSystem, root, options)
    }

    /// Walk under `root` through a custom [`FileSystem`].
    pub fn from_filesystem_with<F: FileSystem>(
        cancel: &CancelToken,
        fs: &F,
        root: impl AsRef<Path>,
        mut options: BuildOptions<FileInfo, FileInfo>,
    ) -> std::result::Result<Self, BuildError<FileInfo>> {
        let outcome = build::filesystem(cancel, fs, root, &mut options);
        Self::from_outcome(outcome, &options)
    }
}

/// Pre-order over every node regardless of flags, checking `cancel` per node.
pub(crate) fn for_each_node<T>(
    nodes: &mut [Node<T>],
    cancel: &CancelToken,
    f: &mut impl FnMut(&mut Node<T>),
) -> Result<()> {
    let mut stack: Vec<&mut Node<T>> = nodes.iter_mut().rev().collect();
    while let Some(node) = stack.pop() {
        cancel.check()?;
        f(&mut *node);
        stack.extend(node.children_mut().iter_mut().rev());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::Record;

    fn sample() -> Tree<u32> {
        Tree::new(vec![
            Node::new("a", "", 1).with_child(Node::new("a1", "", 2)),
            Node::new("b", "", 3),
        ])
    }

    #[test]
    fn test_clone_shares_state() {
        let tree = sample();
        let other = tree.clone();
        tree.expand("a").unwrap();
        assert!(other.is_expanded("a"));
    }

    #[test]
    fn test_expand_missing_node() {
        let tree = sample();
        assert!(matches!(tree.expand("zzz"), Err(TreeError::NodeNotFound(id)) if id == "zzz"));
    }

    #[test]
    fn test_bulk_flags() {
        let tree = sample();
        let cancel = CancelToken::new();
        tree.expand_all(&cancel).unwrap();
        assert_eq!(tree.visible_ids(&cancel).unwrap(), vec!["a", "a1", "b"]);

        tree.hide_all(&cancel).unwrap();
        assert_eq!(tree.visible_len(&cancel).unwrap(), 0);

        tree.show_all(&cancel).unwrap();
        tree.collapse_all(&cancel).unwrap();
        assert_eq!(tree.visible_ids(&cancel).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_set_nodes_prunes_focus() {
        let tree = sample();
        tree.set_focused_ids(&["a1", "b"]).unwrap();
        tree.set_nodes(vec![Node::new("b", "", 9)]);
        assert_eq!(tree.focused_ids(), vec!["b".to_string()]);
        assert!(!tree.is_focused("a1"));
    }

    #[test]
    fn test_update_node_data() {
        let tree = sample();
        tree.update_node("a1", |node| *node.data_mut() = 42).unwrap();
        assert_eq!(tree.find("a1").map(|n| *n.data()), Some(42));
    }

    #[test]
    fn test_partial_tree_on_cap() {
        let records = vec![Record::new("r", 0).with_children(vec![
            Record::new("x", 1),
            Record::new("y", 2),
            Record::new("z", 3),
        ])];
        let options = BuildOptions::new().with_traversal_cap(2);
        let err = Tree::from_nested(&CancelToken::new(), &records, options).unwrap_err();
        assert!(err.error.is_soft());
        assert_eq!(err.partial.len(), 2);
    }

    #[test]
    fn test_bulk_ops_observe_cancel() {
        let tree = sample();
        let cancel = CancelToken::new();
        cancel.cancel();
        assert!(matches!(tree.expand_all(&cancel), Err(TreeError::Cancelled)));
    }
}
