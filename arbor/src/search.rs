//! Search and search-and-reveal.

use std::collections::HashSet;

use crate::cancel::CancelToken;
use crate::error::{PartialError, Result};
use crate::iter::DepthFirst;
use crate::node::Node;
use crate::tree::{Tree, TreeInner, for_each_node};

/// Result of a search: matching ids in depth-first order, or an error with
/// the ids matched before it.
pub type SearchOutcome = std::result::Result<Vec<String>, PartialError<Vec<String>>>;

impl<T> TreeInner<T> {
    fn search(&self, cancel: &CancelToken, term: &str) -> SearchOutcome {
        let mut matches = Vec::new();
        if term.is_empty() {
            return Ok(matches);
        }

        let search = &self.strategies.search;
        for visit in DepthFirst::new(&self.nodes, cancel) {
            match visit {
                Ok(visit) if search.matches(cancel, visit.node, term) => {
                    matches.push(visit.node.id().to_string());
                }
                Ok(_) => {}
                Err(err) => return Err(PartialError::new(err, matches)),
            }
        }
        Ok(matches)
    }

    /// Ids of every match and every ancestor of a match, collected in one
    /// depth-first pass.
    fn reveal_set(&self, cancel: &CancelToken, matches: &[String]) -> Result<HashSet<String>> {
        let wanted: HashSet<&str> = matches.iter().map(String::as_str).collect();
        let mut revealed = HashSet::new();
        let mut ancestors: Vec<&str> = Vec::new();

        for visit in DepthFirst::new(&self.nodes, cancel) {
            let visit = visit?;
            ancestors.truncate(visit.depth);
            let id = visit.node.id();
            if wanted.contains(id) {
                revealed.insert(id.to_string());
                // An ancestor already revealed has all of its own ancestors
                // revealed too.
                for ancestor in ancestors.iter().rev() {
                    if !revealed.insert((*ancestor).to_string()) {
                        break;
                    }
                }
            }
            ancestors.push(id);
        }
        Ok(revealed)
    }

    /// Collapse and hide everything except the matches and their ancestors,
    /// which are expanded and shown, then focus the matches.
    fn reveal(&mut self, cancel: &CancelToken, matches: &[String]) -> Result<()> {
        let revealed = self.reveal_set(cancel, matches)?;
        for_each_node(&mut self.nodes, cancel, &mut |node: &mut Node<T>| {
            let open = revealed.contains(node.id());
            node.set_expanded(open);
            node.set_visible(open);
        })?;

        self.clear_focus();
        for id in matches {
            self.push_focus(id);
        }
        Ok(())
    }
}

impl<T> Tree<T> {
    /// Ids of every node the search predicate accepts, in depth-first order.
    /// An empty term matches nothing.
    pub fn search(&self, cancel: &CancelToken, term: &str) -> SearchOutcome {
        self.read().search(cancel, term)
    }

    /// Search, then make every match reachable in the visible-only order and
    /// focus all matches, the first one as primary.
    ///
    /// With no matches the whole tree is shown and expanded instead, so an
    /// empty term resets the view.
    pub fn search_and_expand(&self, cancel: &CancelToken, term: &str) -> SearchOutcome {
        let mut inner = self.write();
        let matches = inner.search(cancel, term)?;

        let revealed = if matches.is_empty() {
            for_each_node(&mut inner.nodes, cancel, &mut |node: &mut Node<T>| {
                node.expand();
                node.set_visible(true);
            })
        } else {
            inner.reveal(cancel, &matches)
        };
        log::debug!("[search] '{}' matched {} nodes", term, matches.len());

        match revealed {
            Ok(()) => Ok(matches),
            Err(err) => Err(PartialError::new(err, matches)),
        }
    }
}
