//! Tree nodes.

/// One element of a tree.
///
/// A node owns its children. The parent link is a non-owning handle (the
/// parent's id), set whenever the node is attached as a child, so dropping a
/// subtree never needs cycle breaking.
#[derive(Debug, Clone, PartialEq)]
pub struct Node<T> {
    id: String,
    name: String,
    data: T,
    children: Vec<Node<T>>,
    parent: Option<String>,
    expanded: bool,
    visible: bool,
}

impl<T> Node<T> {
    /// Create a collapsed, visible leaf. An empty `name` falls back to `id`.
    pub fn new(id: impl Into<String>, name: impl Into<String>, data: T) -> Self {
        let id = id.into();
        let mut name = name.into();
        if name.is_empty() {
            name = id.clone();
        }
        Self {
            id,
            name,
            data,
            children: Vec::new(),
            parent: None,
            expanded: false,
            visible: true,
        }
    }

    /// Builder-style [`add_child`](Self::add_child).
    pub fn with_child(mut self, child: Node<T>) -> Self {
        self.add_child(child);
        self
    }

    /// Builder-style [`set_children`](Self::set_children).
    pub fn with_children(mut self, children: Vec<Node<T>>) -> Self {
        self.set_children(children);
        self
    }

    /// Builder-style [`set_expanded`](Self::set_expanded).
    pub fn with_expanded(mut self, expanded: bool) -> Self {
        self.expanded = expanded;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.name = if name.is_empty() {
            self.id.clone()
        } else {
            name
        };
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut T {
        &mut self.data
    }

    /// Replace the payload, returning the old one.
    pub fn set_data(&mut self, data: T) -> T {
        std::mem::replace(&mut self.data, data)
    }

    pub fn children(&self) -> &[Node<T>] {
        &self.children
    }

    /// Mutable access to the children. Parent links of the returned nodes
    /// already point at `self` and are re-wired by [`add_child`] and
    /// [`set_children`] only.
    ///
    /// [`add_child`]: Self::add_child
    /// [`set_children`]: Self::set_children
    pub fn children_mut(&mut self) -> &mut [Node<T>] {
        &mut self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Id of the structural parent, `None` for roots.
    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Attach a child at the end, wiring its parent link.
    pub fn add_child(&mut self, mut child: Node<T>) {
        child.parent = Some(self.id.clone());
        self.children.push(child);
    }

    /// Replace the whole child list, wiring every parent link first.
    pub fn set_children(&mut self, mut children: Vec<Node<T>>) {
        for child in &mut children {
            child.parent = Some(self.id.clone());
        }
        self.children = children;
    }

    /// Remove and return all children, clearing their parent links.
    pub fn take_children(&mut self) -> Vec<Node<T>> {
        let mut children = std::mem::take(&mut self.children);
        for child in &mut children {
            child.parent = None;
        }
        children
    }

    /// Detach this node from its parent link so it can be used as a root.
    pub(crate) fn detach(&mut self) {
        self.parent = None;
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn expand(&mut self) {
        self.expanded = true;
    }

    pub fn collapse(&mut self) {
        self.expanded = false;
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }

    pub fn set_expanded(&mut self, expanded: bool) {
        self.expanded = expanded;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    /// Number of nodes in this subtree, including `self`.
    pub fn len(&self) -> usize {
        let mut count = 0;
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(&node.children);
        }
        count
    }

    /// Visit this subtree mutably in pre-order.
    pub fn for_each_mut(&mut self, f: &mut impl FnMut(&mut Node<T>)) {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            f(&mut *node);
            stack.extend(node.children.iter_mut().rev());
        }
    }
}

impl<T> Drop for Node<T> {
    fn drop(&mut self) {
        // Unlink descendants level by level so deep chains drop without
        // recursing once per level.
        let mut pending = std::mem::take(&mut self.children);
        while let Some(mut node) = pending.pop() {
            pending.append(&mut node.children);
        }
    }
}

impl<T: Clone> Node<T> {
    /// Copy of this node without children, keeping id, name, data and flags.
    pub fn shallow_copy(&self) -> Node<T> {
        Node {
            id: self.id.clone(),
            name: self.name.clone(),
            data: self.data.clone(),
            children: Vec::new(),
            parent: None,
            expanded: self.expanded,
            visible: self.visible,
        }
    }
}

/// Structurally independent copies of `roots`, keeping at most `max_depth`
/// levels below the roots. `max_depth == 0` keeps the roots only.
pub fn limit_depth<T: Clone>(roots: &[Node<T>], max_depth: usize) -> Vec<Node<T>> {
    let mut out = Vec::with_capacity(roots.len());

    for root in roots {
        // Copies under construction, each with the originals still to copy.
        let mut stack = vec![(root.shallow_copy(), root.children.iter())];
        loop {
            let level = stack.len() - 1;
            let Some((_, pending)) = stack.last_mut() else {
                break;
            };
            let next = if level < max_depth { pending.next() } else { None };
            match next {
                Some(child) => stack.push((child.shallow_copy(), child.children.iter())),
                None => {
                    let Some((copy, _)) = stack.pop() else {
                        break;
                    };
                    match stack.last_mut() {
                        Some((parent, _)) => parent.add_child(copy),
                        None => out.push(copy),
                    }
                }
            }
        }
    }

    out
}

/// Find a node by id anywhere below `nodes`, in pre-order.
pub fn find<'a, T>(nodes: &'a [Node<T>], id: &str) -> Option<&'a Node<T>> {
    let mut stack: Vec<&Node<T>> = nodes.iter().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter().rev());
    }
    None
}

/// Mutable [`find`].
pub fn find_mut<'a, T>(nodes: &'a mut [Node<T>], id: &str) -> Option<&'a mut Node<T>> {
    let mut stack: Vec<&mut Node<T>> = nodes.iter_mut().rev().collect();
    while let Some(node) = stack.pop() {
        if node.id == id {
            return Some(node);
        }
        stack.extend(node.children.iter_mut().rev());
    }
    None
}

/// Child-index path from the root list to the node with `id`.
pub fn path_to<T>(nodes: &[Node<T>], id: &str) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut stack: Vec<(usize, usize, &Node<T>)> = nodes
        .iter()
        .enumerate()
        .rev()
        .map(|(index, node)| (0, index, node))
        .collect();

    while let Some((depth, index, node)) = stack.pop() {
        path.truncate(depth);
        path.push(index);
        if node.id == id {
            return Some(path);
        }
        stack.extend(
            node.children
                .iter()
                .enumerate()
                .rev()
                .map(|(child, node)| (depth + 1, child, node)),
        );
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain() -> Node<u32> {
        Node::new("root", "Root", 0)
            .with_child(Node::new("child", "", 1).with_child(Node::new("grandchild", "", 2)))
    }

    #[test]
    fn test_name_falls_back_to_id() {
        let node = Node::new("abc", "", ());
        assert_eq!(node.name(), "abc");
    }

    #[test]
    fn test_add_child_wires_parent() {
        let root = chain();
        assert_eq!(root.parent_id(), None);
        assert_eq!(root.children()[0].parent_id(), Some("root"));
        assert_eq!(root.children()[0].children()[0].parent_id(), Some("child"));
    }

    #[test]
    fn test_set_children_replaces_and_wires() {
        let mut root = chain();
        root.set_children(vec![Node::new("x", "", 5), Node::new("y", "", 6)]);
        let ids: Vec<_> = root.children().iter().map(|c| c.id()).collect();
        assert_eq!(ids, vec!["x", "y"]);
        assert!(root.children().iter().all(|c| c.parent_id() == Some("root")));
    }

    #[test]
    fn test_expand_toggle() {
        let mut node = Node::new("a", "", ());
        assert!(!node.is_expanded());
        node.toggle();
        assert!(node.is_expanded());
        node.collapse();
        assert!(!node.is_expanded());
    }

    #[test]
    fn test_limit_depth_copies() {
        let roots = vec![chain().with_expanded(true)];

        let limited = limit_depth(&roots, 1);
        assert_eq!(limited[0].children().len(), 1);
        assert!(limited[0].children()[0].children().is_empty());
        assert!(limited[0].is_expanded());

        let roots_only = limit_depth(&roots, 0);
        assert!(roots_only[0].children().is_empty());

        // Original untouched
        assert_eq!(roots[0].len(), 3);
    }

    #[test]
    fn test_find_and_path() {
        let roots = vec![Node::new("other", "", 9), chain()];
        assert_eq!(find(&roots, "grandchild").map(|n| *n.data()), Some(2));
        assert_eq!(path_to(&roots, "grandchild"), Some(vec![1, 0, 0]));
        assert_eq!(path_to(&roots, "missing"), None);
    }

    #[test]
    fn test_deep_chain_helpers() {
        let mut node = Node::new("n0", "", 0);
        for i in 1..20_000 {
            node = Node::new(format!("n{i}"), "", i).with_child(node);
        }
        let mut roots = vec![node];

        assert_eq!(roots[0].len(), 20_000);
        assert_eq!(find(&roots, "n0").map(|n| *n.data()), Some(0));
        assert_eq!(path_to(&roots, "n0").map(|path| path.len()), Some(20_000));
        find_mut(&mut roots, "n0").unwrap().expand();
        assert_eq!(limit_depth(&roots, 3)[0].len(), 4);

        let mut expanded = 0;
        roots[0].for_each_mut(&mut |n| {
            n.expand();
            expanded += 1;
        });
        assert_eq!(expanded, 20_000);
    }
}
