//! Lazy, cancellable traversal orders.
//!
//! Every iterator is an explicit cursor holding its own stack or queue of
//! frames. Each call to `next` checks the cancellation token first; once it
//! has fired, the iterator yields the cancellation error once and then ends.

use std::collections::VecDeque;

use crate::cancel::CancelToken;
use crate::error::{Result, TreeError};
use crate::node::Node;

/// A node produced by a traversal.
#[derive(Debug)]
pub struct Visit<'a, T> {
    pub node: &'a Node<T>,
    /// 0 for roots.
    pub depth: usize,
    /// Whether this node is the last of its siblings in this traversal order.
    pub is_last: bool,
}

impl<T> Clone for Visit<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Visit<'_, T> {}

/// Shared cursor state: the token and the terminal flag.
#[derive(Debug)]
struct Cursor {
    cancel: CancelToken,
    done: bool,
}

impl Cursor {
    fn new(cancel: &CancelToken) -> Self {
        Self {
            cancel: cancel.clone(),
            done: false,
        }
    }

    /// Checks the token; on failure marks the cursor finished.
    fn check(&mut self) -> Option<TreeError> {
        match self.cancel.check() {
            Ok(()) => None,
            Err(err) => {
                self.done = true;
                Some(err)
            }
        }
    }
}

/// Pushes `nodes` that satisfy `keep` so they pop left to right.
fn push_reversed<'a, T>(
    stack: &mut Vec<Visit<'a, T>>,
    nodes: &'a [Node<T>],
    depth: usize,
    keep: fn(&Node<T>) -> bool,
) {
    let Some(last) = nodes.iter().rposition(keep) else {
        return;
    };
    for (index, node) in nodes.iter().enumerate().rev().filter(|(_, n)| keep(n)) {
        stack.push(Visit {
            node,
            depth,
            is_last: index == last,
        });
    }
}

fn any_node<T>(_: &Node<T>) -> bool {
    true
}

fn visible_node<T>(node: &Node<T>) -> bool {
    node.is_visible()
}

// =============================================================================
// DepthFirst
// =============================================================================

/// Pre-order depth-first traversal.
///
/// Visits every node regardless of its `expanded` flag unless
/// [`expanded_only`](Self::expanded_only) is set.
#[derive(Debug)]
pub struct DepthFirst<'a, T> {
    stack: Vec<Visit<'a, T>>,
    cursor: Cursor,
    expanded_only: bool,
}

impl<'a, T> DepthFirst<'a, T> {
    pub fn new(roots: &'a [Node<T>], cancel: &CancelToken) -> Self {
        let mut stack = Vec::with_capacity(roots.len());
        push_reversed(&mut stack, roots, 0, any_node);
        Self {
            stack,
            cursor: Cursor::new(cancel),
            expanded_only: false,
        }
    }

    /// Traverse a single subtree rooted at `node`.
    pub fn subtree(node: &'a Node<T>, cancel: &CancelToken) -> Self {
        Self::new(std::slice::from_ref(node), cancel)
    }

    /// Only descend into nodes whose `expanded` flag is set.
    pub fn expanded_only(mut self) -> Self {
        self.expanded_only = true;
        self
    }
}

impl<'a, T> Iterator for DepthFirst<'a, T> {
    type Item = Result<Visit<'a, T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_empty() || self.cursor.done {
            return None;
        }
        if let Some(err) = self.cursor.check() {
            return Some(Err(err));
        }
        let visit = self.stack.pop()?;
        if !self.expanded_only || visit.node.is_expanded() {
            push_reversed(&mut self.stack, visit.node.children(), visit.depth + 1, any_node);
        }
        Some(Ok(visit))
    }
}

// =============================================================================
// BreadthFirst
// =============================================================================

/// Level-order traversal with a FIFO queue.
#[derive(Debug)]
pub struct BreadthFirst<'a, T> {
    queue: VecDeque<Visit<'a, T>>,
    cursor: Cursor,
    expanded_only: bool,
}

impl<'a, T> BreadthFirst<'a, T> {
    pub fn new(roots: &'a [Node<T>], cancel: &CancelToken) -> Self {
        let mut queue = VecDeque::with_capacity(roots.len());
        Self::enqueue(&mut queue, roots, 0);
        Self {
            queue,
            cursor: Cursor::new(cancel),
            expanded_only: false,
        }
    }

    pub fn subtree(node: &'a Node<T>, cancel: &CancelToken) -> Self {
        Self::new(std::slice::from_ref(node), cancel)
    }

    /// Only enqueue children of nodes whose `expanded` flag is set.
    pub fn expanded_only(mut self) -> Self {
        self.expanded_only = true;
        self
    }

    fn enqueue(queue: &mut VecDeque<Visit<'a, T>>, nodes: &'a [Node<T>], depth: usize) {
        let last = nodes.len().saturating_sub(1);
        queue.extend(nodes.iter().enumerate().map(|(index, node)| Visit {
            node,
            depth,
            is_last: index == last,
        }));
    }
}

impl<'a, T> Iterator for BreadthFirst<'a, T> {
    type Item = Result<Visit<'a, T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.queue.is_empty() || self.cursor.done {
            return None;
        }
        if let Some(err) = self.cursor.check() {
            return Some(Err(err));
        }
        let visit = self.queue.pop_front()?;
        if !self.expanded_only || visit.node.is_expanded() {
            Self::enqueue(&mut self.queue, visit.node.children(), visit.depth + 1);
        }
        Some(Ok(visit))
    }
}

// =============================================================================
// PostOrder
// =============================================================================

#[derive(Debug)]
struct PostFrame<'a, T> {
    visit: Visit<'a, T>,
    descended: bool,
}

/// Bottom-up depth-first traversal: children are produced before their parent.
#[derive(Debug)]
pub struct PostOrder<'a, T> {
    stack: Vec<PostFrame<'a, T>>,
    cursor: Cursor,
    expanded_only: bool,
}

impl<'a, T> PostOrder<'a, T> {
    pub fn new(roots: &'a [Node<T>], cancel: &CancelToken) -> Self {
        let mut stack = Vec::with_capacity(roots.len());
        Self::push_children(&mut stack, roots, 0);
        Self {
            stack,
            cursor: Cursor::new(cancel),
            expanded_only: false,
        }
    }

    pub fn subtree(node: &'a Node<T>, cancel: &CancelToken) -> Self {
        Self::new(std::slice::from_ref(node), cancel)
    }

    pub fn expanded_only(mut self) -> Self {
        self.expanded_only = true;
        self
    }

    fn push_children(stack: &mut Vec<PostFrame<'a, T>>, nodes: &'a [Node<T>], depth: usize) {
        let mut visits = Vec::with_capacity(nodes.len());
        push_reversed(&mut visits, nodes, depth, any_node);
        stack.extend(visits.into_iter().map(|visit| PostFrame {
            visit,
            descended: false,
        }));
    }
}

impl<'a, T> Iterator for PostOrder<'a, T> {
    type Item = Result<Visit<'a, T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_empty() || self.cursor.done {
            return None;
        }
        if let Some(err) = self.cursor.check() {
            return Some(Err(err));
        }
        loop {
            let top = self.stack.last_mut()?;
            let node = top.visit.node;
            let descend = !top.descended
                && node.has_children()
                && (!self.expanded_only || node.is_expanded());
            if !descend {
                return self.stack.pop().map(|frame| Ok(frame.visit));
            }
            top.descended = true;
            let depth = top.visit.depth + 1;
            Self::push_children(&mut self.stack, node.children(), depth);
        }
    }
}

// =============================================================================
// VisibleOnly
// =============================================================================

/// The order the renderer draws and the focus engine navigates.
///
/// Depth-first over nodes whose `visible` flag is set, descending only into
/// expanded nodes. `is_last` is computed among visible siblings so branch
/// glyphs close on the last line actually drawn.
#[derive(Debug)]
pub struct VisibleOnly<'a, T> {
    stack: Vec<Visit<'a, T>>,
    cursor: Cursor,
}

impl<'a, T> VisibleOnly<'a, T> {
    pub fn new(roots: &'a [Node<T>], cancel: &CancelToken) -> Self {
        let mut stack = Vec::with_capacity(roots.len());
        push_reversed(&mut stack, roots, 0, visible_node);
        Self {
            stack,
            cursor: Cursor::new(cancel),
        }
    }
}

impl<'a, T> Iterator for VisibleOnly<'a, T> {
    type Item = Result<Visit<'a, T>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stack.is_empty() || self.cursor.done {
            return None;
        }
        if let Some(err) = self.cursor.check() {
            return Some(Err(err));
        }
        let visit = self.stack.pop()?;
        if visit.node.is_expanded() {
            push_reversed(&mut self.stack, visit.node.children(), visit.depth + 1, visible_node);
        }
        Some(Ok(visit))
    }
}

/// Collect the visible-only order, stopping at the first cancellation.
pub fn collect_visible<'a, T>(
    roots: &'a [Node<T>],
    cancel: &CancelToken,
) -> Result<Vec<Visit<'a, T>>> {
    VisibleOnly::new(roots, cancel).collect()
}
