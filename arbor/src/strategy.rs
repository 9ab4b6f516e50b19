//! Pluggable strategies: search predicate, focus policy, rendering provider.
//!
//! Each is an independent capability; a tree holds one of each and any of
//! them can be swapped without touching the others.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use nucleo_matcher::pattern::{AtomKind, CaseMatching, Normalization, Pattern};
use nucleo_matcher::{Config, Matcher, Utf32Str};

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::node::Node;

// =============================================================================
// Search
// =============================================================================

/// Decides whether a node matches a search term.
pub trait SearchPredicate<T>: Send + Sync {
    fn matches(&self, cancel: &CancelToken, node: &Node<T>, term: &str) -> bool;
}

impl<T, F> SearchPredicate<T> for F
where
    F: Fn(&CancelToken, &Node<T>, &str) -> bool + Send + Sync,
{
    fn matches(&self, cancel: &CancelToken, node: &Node<T>, term: &str) -> bool {
        self(cancel, node, term)
    }
}

fn contains_ignore_case(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Text of a string-like payload: `String`, `&'static str`, `Box<str>`,
/// `Rc<str>`, `Arc<str>` or `Cow<'static, str>`.
pub fn payload_text(data: &dyn Any) -> Option<&str> {
    if let Some(text) = data.downcast_ref::<String>() {
        Some(text)
    } else if let Some(text) = data.downcast_ref::<&'static str>() {
        Some(text)
    } else if let Some(text) = data.downcast_ref::<Box<str>>() {
        Some(text)
    } else if let Some(text) = data.downcast_ref::<Rc<str>>() {
        Some(text)
    } else if let Some(text) = data.downcast_ref::<Arc<str>>() {
        Some(text)
    } else {
        data.downcast_ref::<Cow<'static, str>>().map(|text| text.as_ref())
    }
}

/// Case-insensitive substring match on id, name and string-like payloads.
///
/// Payloads of any other type are ignored; [`TextSearch`] covers payloads
/// that implement `Display`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultSearch;

impl DefaultSearch {
    fn matches_labels<T>(node: &Node<T>, term_lower: &str) -> bool {
        contains_ignore_case(node.id(), term_lower) || contains_ignore_case(node.name(), term_lower)
    }
}

impl<T: 'static> SearchPredicate<T> for DefaultSearch {
    fn matches(&self, _cancel: &CancelToken, node: &Node<T>, term: &str) -> bool {
        let term = term.to_lowercase();
        Self::matches_labels(node, &term)
            || payload_text(node.data()).is_some_and(|text| contains_ignore_case(text, &term))
    }
}

/// Case-insensitive substring match on id, name and the payload's
/// `Display` text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextSearch;

impl<T: fmt::Display> SearchPredicate<T> for TextSearch {
    fn matches(&self, _cancel: &CancelToken, node: &Node<T>, term: &str) -> bool {
        let term = term.to_lowercase();
        DefaultSearch::matches_labels(node, &term)
            || contains_ignore_case(&node.data().to_string(), &term)
    }
}

/// Fuzzy match on id and name using nucleo-matcher.
pub struct FuzzySearch {
    matcher: Mutex<Matcher>,
    min_score: u32,
}

impl FuzzySearch {
    pub fn new() -> Self {
        Self {
            matcher: Mutex::new(Matcher::new(Config::DEFAULT)),
            min_score: 0,
        }
    }

    /// Reject matches scoring below `min_score`.
    pub fn with_min_score(mut self, min_score: u32) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score of the best match of `term` against id or name.
    pub fn score<T>(&self, node: &Node<T>, term: &str) -> Option<u32> {
        let pattern = Pattern::new(term, CaseMatching::Ignore, Normalization::Smart, AtomKind::Fuzzy);
        let mut matcher = self
            .matcher
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let mut buf = Vec::new();
        [node.id(), node.name()]
            .into_iter()
            .filter_map(|text| pattern.score(Utf32Str::new(text, &mut buf), &mut matcher))
            .max()
    }
}

impl Default for FuzzySearch {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FuzzySearch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FuzzySearch")
            .field("min_score", &self.min_score)
            .finish_non_exhaustive()
    }
}

impl<T> SearchPredicate<T> for FuzzySearch {
    fn matches(&self, _cancel: &CancelToken, node: &Node<T>, term: &str) -> bool {
        self.score(node, term)
            .is_some_and(|score| score >= self.min_score)
    }
}

// =============================================================================
// Focus policy
// =============================================================================

/// Picks the next focus target in the visible-only order.
///
/// `current` is the position of the primary focus in `visible`, or `None`
/// when nothing visible is focused. Returns a position in `visible`.
pub trait FocusPolicy<T>: Send + Sync {
    fn next(
        &self,
        cancel: &CancelToken,
        visible: &[&Node<T>],
        current: Option<usize>,
        offset: isize,
    ) -> Result<Option<usize>>;
}

/// Starting cursor: the current position, or an imaginary slot before the
/// list for forward moves and after it for backward moves.
fn start_position(len: usize, current: Option<usize>, offset: isize) -> isize {
    match current {
        Some(index) => index as isize,
        None if offset >= 0 => -1,
        None => len as isize,
    }
}

/// Linear movement that wraps at both ends.
#[derive(Debug, Clone, Copy, Default)]
pub struct WrapFocus;

impl<T> FocusPolicy<T> for WrapFocus {
    fn next(
        &self,
        cancel: &CancelToken,
        visible: &[&Node<T>],
        current: Option<usize>,
        offset: isize,
    ) -> Result<Option<usize>> {
        cancel.check()?;
        if visible.is_empty() || (offset == 0 && current.is_none()) {
            return Ok(None);
        }
        let len = visible.len() as isize;
        let target = (start_position(visible.len(), current, offset) + offset).rem_euclid(len);
        Ok(Some(target as usize))
    }
}

/// Linear movement that stops at the first and last visible node.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClampFocus;

impl<T> FocusPolicy<T> for ClampFocus {
    fn next(
        &self,
        cancel: &CancelToken,
        visible: &[&Node<T>],
        current: Option<usize>,
        offset: isize,
    ) -> Result<Option<usize>> {
        cancel.check()?;
        if visible.is_empty() || (offset == 0 && current.is_none()) {
            return Ok(None);
        }
        let last = visible.len() as isize - 1;
        let target = (start_position(visible.len(), current, offset) + offset).clamp(0, last);
        Ok(Some(target as usize))
    }
}

// =============================================================================
// Rendering provider
// =============================================================================

/// Supplies the icon, label and style token for each rendered line.
///
/// The style token is opaque to the renderer and passed through untouched.
pub trait RenderProvider<T>: Send + Sync {
    fn icon(&self, node: &Node<T>) -> String;

    fn format(&self, node: &Node<T>) -> String {
        node.name().to_string()
    }

    fn style(&self, node: &Node<T>, focused: bool) -> String;
}

/// Arrow icons for branches, blank for leaves, `"focused"`/`"normal"` styles.
#[derive(Debug, Clone)]
pub struct DefaultProvider {
    pub expand_icon: String,
    pub collapse_icon: String,
    pub leaf_icon: String,
}

impl Default for DefaultProvider {
    fn default() -> Self {
        Self {
            expand_icon: "▶".to_string(),
            collapse_icon: "▼".to_string(),
            leaf_icon: " ".to_string(),
        }
    }
}

impl DefaultProvider {
    /// Set icons for expand/collapse/leaf states.
    pub fn icons(mut self, expand: &str, collapse: &str, leaf: &str) -> Self {
        self.expand_icon = expand.to_string();
        self.collapse_icon = collapse.to_string();
        self.leaf_icon = leaf.to_string();
        self
    }
}

impl<T> RenderProvider<T> for DefaultProvider {
    fn icon(&self, node: &Node<T>) -> String {
        if !node.has_children() {
            self.leaf_icon.clone()
        } else if node.is_expanded() {
            self.collapse_icon.clone()
        } else {
            self.expand_icon.clone()
        }
    }

    fn style(&self, _node: &Node<T>, focused: bool) -> String {
        let token = if focused { "focused" } else { "normal" };
        token.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes(n: usize) -> Vec<Node<()>> {
        (0..n).map(|i| Node::new(format!("n{i}"), "", ())).collect()
    }

    #[test]
    fn test_default_search_is_case_insensitive() {
        let node = Node::new("Docs", "Readme.MD", ());
        let cancel = CancelToken::new();
        assert!(DefaultSearch.matches(&cancel, &node, "readme"));
        assert!(DefaultSearch.matches(&cancel, &node, "DOCS"));
        assert!(!DefaultSearch.matches(&cancel, &node, "xyz"));
    }

    #[test]
    fn test_default_search_reads_string_payloads() {
        let cancel = CancelToken::new();
        let owned = Node::new("1", "first", "Hidden Treasure".to_string());
        assert!(DefaultSearch.matches(&cancel, &owned, "treasure"));

        let borrowed = Node::new("2", "second", "Buried Gold");
        assert!(DefaultSearch.matches(&cancel, &borrowed, "gold"));

        let shared = Node::new("3", "third", Arc::<str>::from("Old Map"));
        assert!(DefaultSearch.matches(&cancel, &shared, "MAP"));

        let number = Node::new("4", "fourth", 1234_u32);
        assert!(!DefaultSearch.matches(&cancel, &number, "23"));
    }

    #[test]
    fn test_text_search_matches_display_payload() {
        let node = Node::new("4", "fourth", 1234_u32);
        let cancel = CancelToken::new();
        assert!(TextSearch.matches(&cancel, &node, "23"));
        assert!(!TextSearch.matches(&cancel, &node, "99"));
    }

    #[test]
    fn test_fuzzy_search() {
        let node = Node::new("src/main.rs", "main.rs", ());
        let cancel = CancelToken::new();
        let fuzzy = FuzzySearch::new();
        assert!(fuzzy.matches(&cancel, &node, "mnrs"));
        assert!(!fuzzy.matches(&cancel, &node, "zzz"));
    }

    #[test]
    fn test_closure_as_search_predicate() {
        let exact = |_: &CancelToken, node: &Node<()>, term: &str| node.id() == term;
        let node = Node::new("abc", "", ());
        assert!(exact.matches(&CancelToken::new(), &node, "abc"));
    }

    #[test]
    fn test_wrap_focus() {
        let all = nodes(3);
        let visible: Vec<_> = all.iter().collect();
        let cancel = CancelToken::new();
        let next = |current, offset| WrapFocus.next(&cancel, &visible, current, offset).unwrap();

        assert_eq!(next(None, 1), Some(0));
        assert_eq!(next(None, -1), Some(2));
        assert_eq!(next(Some(2), 1), Some(0));
        assert_eq!(next(Some(0), -1), Some(2));
        assert_eq!(next(Some(1), 0), Some(1));
        assert_eq!(next(None, 0), None);
    }

    #[test]
    fn test_clamp_focus() {
        let all = nodes(3);
        let visible: Vec<_> = all.iter().collect();
        let cancel = CancelToken::new();
        assert_eq!(ClampFocus.next(&cancel, &visible, Some(2), 5).unwrap(), Some(2));
        assert_eq!(ClampFocus.next(&cancel, &visible, Some(0), -1).unwrap(), Some(0));
    }

    #[test]
    fn test_default_provider_icons() {
        let leaf = Node::new("leaf", "", ());
        let branch = Node::new("branch", "", ()).with_child(Node::new("x", "", ()));
        let provider = DefaultProvider::default();
        assert_eq!(provider.icon(&leaf), " ");
        assert_eq!(provider.icon(&branch), "▶");
        assert_eq!(provider.icon(&branch.clone().with_expanded(true)), "▼");
        assert_eq!(provider.style(&leaf, true), "focused");
    }
}
