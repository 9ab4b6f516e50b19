//! Focus and selection.
//!
//! The focus set is an ordered list of ids with a mirrored id set; the first
//! entry is the primary focus. Navigation runs over the visible-only order
//! and delegates the next-position decision to the tree's [`FocusPolicy`].
//!
//! [`FocusPolicy`]: crate::strategy::FocusPolicy

use crate::cancel::CancelToken;
use crate::error::{Result, TreeError};
use crate::iter::VisibleOnly;
use crate::node::{self, Node};
use crate::tree::{Tree, TreeInner};

/// Outcome of a policy lookup over the visible-only order.
struct Step {
    /// Visible ids in order.
    ids: Vec<String>,
    /// Position of the primary focus in `ids`.
    current: Option<usize>,
    /// Position chosen by the policy.
    target: Option<usize>,
}

impl<T> TreeInner<T> {
    fn step(&self, cancel: &CancelToken, offset: isize) -> Result<Step> {
        let visible = VisibleOnly::new(&self.nodes, cancel)
            .map(|visit| visit.map(|v| v.node))
            .collect::<Result<Vec<&Node<T>>>>()?;
        let current = self
            .focused
            .first()
            .and_then(|primary| visible.iter().position(|node| node.id() == primary));
        let target = self.strategies.focus.next(cancel, &visible, current, offset)?;
        Ok(Step {
            ids: visible.iter().map(|node| node.id().to_string()).collect(),
            current,
            target: target.filter(|index| *index < visible.len()),
        })
    }

    pub(crate) fn clear_focus(&mut self) {
        self.focused.clear();
        self.focused_ids.clear();
    }

    /// Makes `id` the sole focus.
    pub(crate) fn focus_only(&mut self, id: &str) {
        self.clear_focus();
        self.push_focus(id);
    }

    /// Appends `id` unless already focused. Returns whether it was added.
    pub(crate) fn push_focus(&mut self, id: &str) -> bool {
        if !self.focused_ids.insert(id.to_string()) {
            return false;
        }
        self.focused.push(id.to_string());
        true
    }

    fn remove_focus(&mut self, id: &str) -> bool {
        if !self.focused_ids.remove(id) {
            return false;
        }
        self.focused.retain(|focused| focused != id);
        true
    }

    /// Moves an already focused `id` to the front.
    fn promote(&mut self, id: &str) {
        if let Some(index) = self.focused.iter().position(|focused| focused == id) {
            let primary = self.focused.remove(index);
            self.focused.insert(0, primary);
        }
    }

    fn require(&self, id: &str) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TreeError::NodeNotFound(id.to_string()))
        }
    }
}

impl<T> Tree<T> {
    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Move the focus by `offset` positions in the visible-only order.
    ///
    /// On a successful move the whole focus set is replaced by the new node,
    /// which is returned. Returns `None` and leaves focus untouched when the
    /// policy finds no target (empty view, or `offset == 0` with no focus).
    pub fn move_focus(&self, cancel: &CancelToken, offset: isize) -> Result<Option<String>> {
        let mut inner = self.write();
        let step = inner.step(cancel, offset)?;
        let Some(target) = step.target else {
            return Ok(None);
        };

        let id = &step.ids[target];
        log::debug!("[focus] move {:+} -> '{}'", offset, id);
        inner.focus_only(id);
        Ok(Some(id.clone()))
    }

    /// Move by `offset` and add every node between the previous primary and
    /// the target to the focus set. The target becomes primary.
    pub fn move_extend(&self, cancel: &CancelToken, offset: isize) -> Result<Option<String>> {
        let mut inner = self.write();
        let step = inner.step(cancel, offset)?;
        let Some(target) = step.target else {
            return Ok(None);
        };

        let anchor = step.current.unwrap_or(target);
        let (from, to) = (anchor.min(target), anchor.max(target));
        for id in &step.ids[from..=to] {
            inner.push_focus(id);
        }

        let id = &step.ids[target];
        inner.promote(id);
        log::debug!(
            "[focus] extend {:+} -> '{}' ({} focused)",
            offset,
            id,
            inner.focused.len()
        );
        Ok(Some(id.clone()))
    }

    /// Focus the structural parent of the primary focus.
    pub fn move_to_parent(&self) -> Option<String> {
        let mut inner = self.write();
        let primary = inner.focused.first()?;
        let parent = node::find(&inner.nodes, primary)?.parent_id()?.to_string();
        inner.focus_only(&parent);
        Some(parent)
    }

    /// Focus the first visible child of the primary focus, if it is expanded.
    pub fn move_to_first_child(&self) -> Option<String> {
        let mut inner = self.write();
        let primary = inner.focused.first()?;
        let current = node::find(&inner.nodes, primary)?;
        if !current.is_expanded() {
            return None;
        }
        let child = current
            .children()
            .iter()
            .find(|child| child.is_visible())?
            .id()
            .to_string();
        inner.focus_only(&child);
        Some(child)
    }

    // -------------------------------------------------------------------------
    // Focus set
    // -------------------------------------------------------------------------

    /// Add `id` to the focus set. No-op if it is already focused.
    pub fn add_focus(&self, id: &str) -> Result<()> {
        let mut inner = self.write();
        inner.require(id)?;
        inner.push_focus(id);
        Ok(())
    }

    /// Remove `id` from the focus set. No-op if it is not focused.
    pub fn remove_focus(&self, id: &str) {
        self.write().remove_focus(id);
    }

    /// Flip membership of `id`. Returns whether it is focused afterwards.
    pub fn toggle_focus(&self, id: &str) -> Result<bool> {
        let mut inner = self.write();
        inner.require(id)?;
        if inner.remove_focus(id) {
            Ok(false)
        } else {
            inner.push_focus(id);
            Ok(true)
        }
    }

    /// Replace the focus set. Fails without changing anything if any id is
    /// missing. Duplicates are collapsed; the first id becomes primary.
    pub fn set_focused_ids<S: AsRef<str>>(&self, ids: &[S]) -> Result<()> {
        let mut inner = self.write();
        for id in ids {
            inner.require(id.as_ref())?;
        }
        inner.clear_focus();
        for id in ids {
            inner.push_focus(id.as_ref());
        }
        Ok(())
    }

    /// Make `id` the sole focus. An empty id clears the focus set.
    pub fn set_focused_id(&self, id: &str) -> Result<()> {
        let mut inner = self.write();
        if id.is_empty() {
            inner.clear_focus();
            return Ok(());
        }
        inner.require(id)?;
        inner.focus_only(id);
        Ok(())
    }

    pub fn clear_focus(&self) {
        self.write().clear_focus();
    }

    /// Focused ids, primary first.
    pub fn focused_ids(&self) -> Vec<String> {
        self.read().focused.clone()
    }

    pub fn primary_focus(&self) -> Option<String> {
        self.read().focused.first().cloned()
    }

    pub fn is_focused(&self, id: &str) -> bool {
        self.read().focused_ids.contains(id)
    }

    /// Toggle the expanded flag of every focused node.
    pub fn toggle_focused(&self) {
        let mut inner = self.write();
        let TreeInner { nodes, focused, .. } = &mut *inner;
        for id in focused.iter() {
            if let Some(node) = node::find_mut(nodes, id) {
                node.toggle();
            }
        }
    }
}

impl<T: Clone> Tree<T> {
    /// Copies of the focused nodes, primary first.
    pub fn focused_nodes(&self) -> Vec<Node<T>> {
        let inner = self.read();
        inner
            .focused
            .iter()
            .filter_map(|id| node::find(&inner.nodes, id).cloned())
            .collect()
    }
}
