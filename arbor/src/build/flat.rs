//! Two-pass builder for flat parent-pointer lists.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::{BuildOutcome, BuildState};
use crate::cancel::CancelToken;
use crate::error::{Result, TreeError};
use crate::node::Node;
use crate::options::{BuildOptions, Limits};

/// A flat row pointing at its parent by id.
pub trait FlatItem {
    type Data;

    fn id(&self) -> &str;

    /// Parent id. `None` or an empty string makes the row a root.
    fn parent_id(&self) -> Option<&str>;

    fn name(&self) -> &str {
        ""
    }

    fn data(&self) -> Self::Data;
}

/// A ready-made flat input row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatRecord<T> {
    pub id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub name: String,
    pub data: T,
}

impl<T> FlatRecord<T> {
    pub fn root(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            parent_id: None,
            name: String::new(),
            data,
        }
    }

    pub fn child(id: impl Into<String>, parent_id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            parent_id: Some(parent_id.into()),
            name: String::new(),
            data,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl<T: Clone> FlatItem for FlatRecord<T> {
    type Data = T;

    fn id(&self) -> &str {
        &self.id
    }

    fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> T {
        self.data.clone()
    }
}

/// Output of the first pass.
struct Scan<T> {
    /// Materialized ids in input order.
    order: Vec<String>,
    nodes: HashMap<String, Node<T>>,
    /// Parent id per materialized node, `None` for roots.
    parents: HashMap<String, Option<String>>,
    /// Ids rejected by the filter; their descendants are dropped quietly.
    rejected: HashSet<String>,
}

impl<T> Default for Scan<T> {
    fn default() -> Self {
        Self {
            order: Vec::new(),
            nodes: HashMap::new(),
            parents: HashMap::new(),
            rejected: HashSet::new(),
        }
    }
}

/// Assemble a tree from rows that reference their parent by id.
///
/// Cycles and missing parents abort construction with no roots. When the
/// traversal cap cuts the scan short, rows whose parent was never
/// materialized are dropped and the assembled roots come back with
/// [`TreeError::TraversalLimit`]. A cancelled build assembles the rows
/// scanned so far the same way and returns them with the cancellation error.
pub fn flat<F: FlatItem>(
    cancel: &CancelToken,
    items: &[F],
    options: &mut BuildOptions<F, F::Data>,
) -> BuildOutcome<F::Data> {
    let mut state = BuildState::new(cancel, options);
    let mut rows = Scan::default();

    let mut interrupted = None;
    if let Err(err) = scan(&mut state, items, &mut rows) {
        if !err.is_cancellation() {
            return state.fail(err, Vec::new());
        }
        interrupted = Some(err);
    }

    let linked = match link(&state, &rows, interrupted.is_some()) {
        Err(err) if err.is_cancellation() => {
            interrupted = Some(err);
            link(&state, &rows, true)
        }
        linked => linked,
    };
    let children = match linked {
        Ok(children) => children,
        Err(err) => return state.fail(interrupted.unwrap_or(err), Vec::new()),
    };

    let Scan {
        order,
        mut nodes,
        parents,
        ..
    } = rows;

    let roots: Vec<_> = order
        .iter()
        .filter(|id| matches!(parents.get(*id), Some(None)))
        .filter_map(|id| assemble(&mut state, id, &mut nodes, &children))
        .collect();

    match interrupted {
        Some(err) => state.fail(err, roots),
        None => state.finish(roots),
    }
}

/// Pass 1: materialize nodes and record parent links.
fn scan<F: FlatItem>(
    state: &mut BuildState<'_, F, F::Data>,
    items: &[F],
    scan: &mut Scan<F::Data>,
) -> Result<()> {
    scan.order.reserve(items.len());
    scan.nodes.reserve(items.len());
    scan.parents.reserve(items.len());

    for item in items {
        state.cancel.check()?;
        if !state.options.keeps(item) {
            scan.rejected.insert(item.id().to_string());
            continue;
        }
        if !state.reserve() {
            break;
        }
        let id = item.id();
        if id.is_empty() {
            return Err(TreeError::EmptyId);
        }
        if scan.nodes.contains_key(id) {
            log::warn!("[build] duplicate id '{}' in flat input, keeping the first", id);
            continue;
        }

        let node = Node::new(id, item.name(), item.data());
        let parent = item
            .parent_id()
            .filter(|parent| !parent.is_empty())
            .map(str::to_string);
        scan.order.push(id.to_string());
        scan.parents.insert(id.to_string(), parent);
        state.created(&node);
        scan.nodes.insert(id.to_string(), node);
    }

    Ok(())
}

/// Pass 2: validate every parent link and group children by parent, in
/// input order.
///
/// In `salvage` mode, used after a cancellation, cancellation is no longer
/// checked and rows whose parent was never materialized are dropped instead
/// of failing.
fn link<F: FlatItem>(
    state: &BuildState<'_, F, F::Data>,
    scan: &Scan<F::Data>,
    salvage: bool,
) -> Result<HashMap<String, Vec<String>>> {
    let mut children: HashMap<String, Vec<String>> = HashMap::new();
    let mut marks = HashMap::with_capacity(scan.order.len());

    for id in &scan.order {
        if !salvage {
            state.cancel.check()?;
        }
        let Some(Some(parent)) = scan.parents.get(id) else {
            continue;
        };

        if !scan.nodes.contains_key(parent) {
            if salvage || state.cap_hit || scan.rejected.contains(parent) {
                log::trace!("[build] dropping '{}': parent '{}' not materialized", id, parent);
                continue;
            }
            return Err(TreeError::ParentNotFound {
                id: id.clone(),
                parent_id: parent.clone(),
            });
        }

        detect_cycle(id, &scan.parents, &mut marks)?;
        children.entry(parent.clone()).or_default().push(id.clone());
    }

    Ok(children)
}

/// Cycle-detection state of an id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    /// On the parent chain currently being walked.
    OnWalk,
    /// Known to lead to a root or an unmaterialized parent.
    Acyclic,
}

/// Walk the parent chain from `id` until it reaches a root, a parent that
/// was never materialized, or an id already known to be acyclic. Meeting an
/// id of the current walk again is a cycle. Each id is walked at most once
/// across calls sharing `marks`.
fn detect_cycle<'a>(
    id: &'a str,
    parents: &'a HashMap<String, Option<String>>,
    marks: &mut HashMap<&'a str, Mark>,
) -> Result<()> {
    let mut walk = Vec::new();
    let mut current = Some(id);

    while let Some(at) = current {
        match marks.get(at) {
            Some(Mark::Acyclic) => break,
            Some(Mark::OnWalk) => {
                log::warn!("[build] cyclic parent chain through '{}'", id);
                return Err(TreeError::CyclicReference { id: id.to_string() });
            }
            None => {}
        }
        marks.insert(at, Mark::OnWalk);
        walk.push(at);
        current = parents.get(at).and_then(|parent| parent.as_deref());
    }

    for at in walk {
        marks.insert(at, Mark::Acyclic);
    }
    Ok(())
}

/// A node being assembled, with the child ids still to attach.
struct Pending<'c, T> {
    node: Node<T>,
    children: std::slice::Iter<'c, String>,
    depth: usize,
}

impl<'c, T> Pending<'c, T> {
    fn take(
        id: &str,
        depth: usize,
        limits: Limits,
        nodes: &mut HashMap<String, Node<T>>,
        children: &'c HashMap<String, Vec<String>>,
    ) -> Option<Self> {
        let node = nodes.remove(id)?;
        let child_ids = match children.get(id) {
            Some(ids) if limits.allows_children(depth) => ids.as_slice(),
            _ => &[],
        };
        Some(Self {
            node,
            children: child_ids.iter(),
            depth,
        })
    }
}

/// Moves the subtree under `id` out of the map into its final place,
/// applying the depth limit and expand policy now that depth is known.
fn assemble<F: FlatItem>(
    state: &mut BuildState<'_, F, F::Data>,
    id: &str,
    nodes: &mut HashMap<String, Node<F::Data>>,
    children: &HashMap<String, Vec<String>>,
) -> Option<Node<F::Data>> {
    let limits = state.limits();
    let mut stack = vec![Pending::take(id, 0, limits, nodes, children)?];

    loop {
        let top = stack.last_mut()?;
        match top.children.next() {
            Some(child) => {
                let depth = top.depth + 1;
                if let Some(pending) = Pending::take(child, depth, limits, nodes, children) {
                    stack.push(pending);
                }
            }
            None => {
                let mut done = stack.pop()?.node;
                state.options.apply_expand(&mut done);
                match stack.last_mut() {
                    Some(parent) => parent.node.add_child(done),
                    None => return Some(done),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(items: &[FlatRecord<()>]) -> BuildOutcome<()> {
        flat(&CancelToken::new(), items, &mut BuildOptions::new())
    }

    #[test]
    fn test_assembles_in_input_order() {
        let items = vec![
            FlatRecord::child("b", "root", ()),
            FlatRecord::root("root", ()),
            FlatRecord::child("a", "root", ()),
            FlatRecord::child("b1", "b", ()),
        ];
        let roots = build(&items).unwrap();
        assert_eq!(roots.len(), 1);
        let ids: Vec<_> = roots[0].children().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(roots[0].children()[0].children()[0].parent_id(), Some("b"));
    }

    #[test]
    fn test_empty_parent_is_root() {
        let mut row = FlatRecord::root("x", ());
        row.parent_id = Some(String::new());
        let roots = build(&[row]).unwrap();
        assert_eq!(roots.len(), 1);
    }

    #[test]
    fn test_missing_parent() {
        let err = build(&[FlatRecord::child("a", "ghost", ())]).unwrap_err();
        assert!(matches!(
            err.error,
            TreeError::ParentNotFound { ref id, ref parent_id } if id == "a" && parent_id == "ghost"
        ));
        assert!(err.partial.is_empty());
    }

    #[test]
    fn test_filtered_parent_drops_children() {
        let items = vec![
            FlatRecord::root("root", ()),
            FlatRecord::child("skip", "root", ()),
            FlatRecord::child("under-skip", "skip", ()),
        ];
        let mut options = BuildOptions::new().with_filter(|r: &FlatRecord<()>| r.id != "skip");
        let roots = flat(&CancelToken::new(), &items, &mut options).unwrap();
        assert_eq!(roots[0].len(), 1);
    }

    #[test]
    fn test_depth_limit_after_linking() {
        let items = vec![
            FlatRecord::child("grandchild", "child", ()),
            FlatRecord::child("child", "root", ()),
            FlatRecord::root("root", ()),
        ];
        let mut options = BuildOptions::new().with_max_depth(1);
        let roots = flat(&CancelToken::new(), &items, &mut options).unwrap();
        assert_eq!(roots[0].children().len(), 1);
        assert!(roots[0].children()[0].children().is_empty());
    }

    #[test]
    fn test_duplicate_keeps_first() {
        let items = vec![
            FlatRecord::root("a", ()).named("first"),
            FlatRecord::root("a", ()).named("second"),
        ];
        let roots = build(&items).unwrap();
        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].name(), "first");
    }

    #[test]
    fn test_empty_id_fails() {
        let items = vec![FlatRecord::root("ok", ()), FlatRecord::root("", ())];
        let err = build(&items).unwrap_err();
        assert!(matches!(err.error, TreeError::EmptyId));
        assert!(err.partial.is_empty());
    }

    #[test]
    fn test_cycle_behind_valid_rows() {
        let items = vec![
            FlatRecord::root("root", ()),
            FlatRecord::child("a", "root", ()),
            FlatRecord::child("x", "y", ()),
            FlatRecord::child("y", "z", ()),
            FlatRecord::child("z", "x", ()),
        ];
        let err = build(&items).unwrap_err();
        assert!(matches!(err.error, TreeError::CyclicReference { ref id } if id == "x"));
    }

    #[test]
    fn test_cancel_during_scan_keeps_rows() {
        let cancel = CancelToken::new();
        let trigger = cancel.clone();
        let mut items = vec![FlatRecord::root("root", ())];
        items.extend((1..=5).map(|i| FlatRecord::child(format!("c{i}"), "root", ())));
        let mut options = BuildOptions::new().with_progress(move |count, _: &Node<()>| {
            if count == 3 {
                trigger.cancel();
            }
        });

        let err = flat(&cancel, &items, &mut options).unwrap_err();
        assert!(matches!(err.error, TreeError::Cancelled));
        assert_eq!(err.partial.len(), 1);
        assert_eq!(err.partial[0].len(), 3);
    }
}
