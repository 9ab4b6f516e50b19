//! Builder for pre-nested records.

use serde::{Deserialize, Serialize};

use super::{BuildOutcome, BuildState};
use crate::cancel::CancelToken;
use crate::error::{PartialError, Result, TreeError};
use crate::node::Node;
use crate::options::BuildOptions;

/// A record that already carries its children.
pub trait NestedItem: Sized {
    type Data;

    /// Stable, non-empty identifier.
    fn id(&self) -> &str;

    /// Display name. Empty falls back to the id.
    fn name(&self) -> &str {
        ""
    }

    fn data(&self) -> Self::Data;

    fn children(&self) -> &[Self];

    /// Initial `expanded` flag, before the expand predicate runs.
    fn expanded(&self) -> bool {
        false
    }

    /// Initial `visible` flag.
    fn visible(&self) -> bool {
        true
    }
}

/// A ready-made nested input, deserializable from JSON and friends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record<T> {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub data: T,
    #[serde(default)]
    pub children: Vec<Record<T>>,
}

impl<T> Record<T> {
    pub fn new(id: impl Into<String>, data: T) -> Self {
        Self {
            id: id.into(),
            name: String::new(),
            data,
            children: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_children(mut self, children: Vec<Record<T>>) -> Self {
        self.children = children;
        self
    }
}

impl<T: Clone> NestedItem for Record<T> {
    type Data = T;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn data(&self) -> T {
        self.data.clone()
    }

    fn children(&self) -> &[Self] {
        &self.children
    }
}

/// Existing nodes can be fed back through the builder, which yields
/// independent copies with the same flags.
impl<T: Clone> NestedItem for Node<T> {
    type Data = T;

    fn id(&self) -> &str {
        Node::id(self)
    }

    fn name(&self) -> &str {
        Node::name(self)
    }

    fn data(&self) -> T {
        Node::data(self).clone()
    }

    fn children(&self) -> &[Self] {
        Node::children(self)
    }

    fn expanded(&self) -> bool {
        self.is_expanded()
    }

    fn visible(&self) -> bool {
        self.is_visible()
    }
}

/// Convert nested records into nodes, depth-first and pre-order.
///
/// A cap hit abandons the remaining siblings and roots; the roots built so
/// far come back with [`TreeError::TraversalLimit`]. On cancellation every
/// node built so far is returned, attached to its ancestors. Any other error
/// returns the roots completed before the failing one.
pub fn nested<N: NestedItem>(
    cancel: &CancelToken,
    items: &[N],
    options: &mut BuildOptions<N, N::Data>,
) -> BuildOutcome<N::Data> {
    let mut state = BuildState::new(cancel, options);
    let mut roots = Vec::with_capacity(items.len());

    for item in items {
        if state.cap_hit {
            break;
        }
        match build_root(&mut state, item) {
            Ok(Some(node)) => roots.push(node),
            Ok(None) => {}
            Err(PartialError { error, partial }) => {
                roots.extend(partial);
                return state.fail(error, roots);
            }
        }
    }

    state.finish(roots)
}

/// A record under construction.
struct Frame<'i, N: NestedItem> {
    node: Node<N::Data>,
    /// Child records not visited yet.
    pending: std::slice::Iter<'i, N>,
    built: Vec<Node<N::Data>>,
    depth: usize,
}

impl<N: NestedItem> Frame<'_, N> {
    fn close(mut self, options: &BuildOptions<N, N::Data>) -> Node<N::Data> {
        self.node.set_children(self.built);
        options.apply_expand(&mut self.node);
        self.node
    }
}

/// Creates the node for `item`, or `None` when the filter rejects it or the
/// cap is reached.
fn open<'i, N: NestedItem>(
    state: &mut BuildState<'_, N, N::Data>,
    item: &'i N,
    depth: usize,
) -> Result<Option<Frame<'i, N>>> {
    state.cancel.check()?;
    if !state.options.keeps(item) || !state.reserve() {
        return Ok(None);
    }
    if item.id().is_empty() {
        return Err(TreeError::EmptyId);
    }

    let mut node = Node::new(item.id(), item.name(), item.data());
    node.set_expanded(item.expanded());
    node.set_visible(item.visible());
    state.created(&node);

    let children: &'i [N] = if state.limits().allows_children(depth) {
        item.children()
    } else {
        &[]
    };
    Ok(Some(Frame {
        node,
        pending: children.iter(),
        built: Vec::with_capacity(children.len()),
        depth,
    }))
}

/// Builds one root record with an explicit stack of frames, so the depth of
/// the input is bounded by memory rather than the call stack.
fn build_root<N: NestedItem>(
    state: &mut BuildState<'_, N, N::Data>,
    item: &N,
) -> std::result::Result<Option<Node<N::Data>>, PartialError<Option<Node<N::Data>>>> {
    let Some(root) = open(state, item, 0).map_err(|error| PartialError::new(error, None))? else {
        return Ok(None);
    };
    let mut stack = vec![root];

    while let Some(top) = stack.last_mut() {
        let depth = top.depth + 1;
        let next = if state.cap_hit { None } else { top.pending.next() };

        match next {
            Some(child) => match open(state, child, depth) {
                Ok(Some(frame)) => stack.push(frame),
                Ok(None) => {}
                Err(error) => {
                    let partial = if error.is_cancellation() {
                        unwind(stack, state.options)
                    } else {
                        None
                    };
                    return Err(PartialError::new(error, partial));
                }
            },
            None => {
                let Some(frame) = stack.pop() else {
                    break;
                };
                let node = frame.close(state.options);
                match stack.last_mut() {
                    Some(parent) => parent.built.push(node),
                    None => return Ok(Some(node)),
                }
            }
        }
    }

    Ok(None)
}

/// Closes every open frame, innermost first, into one partial root.
fn unwind<N: NestedItem>(
    mut stack: Vec<Frame<'_, N>>,
    options: &BuildOptions<N, N::Data>,
) -> Option<Node<N::Data>> {
    let mut node = stack.pop()?.close(options);
    while let Some(mut parent) = stack.pop() {
        parent.built.push(node);
        node = parent.close(options);
    }
    Some(node)
}
