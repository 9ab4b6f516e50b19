//! Windowed text rendering.
//!
//! A windowed render makes two passes over the visible-only order. The first
//! stops at the first focused node to find its position. The scroll offset is
//! then adjusted so that node lies inside the window, and the second pass
//! formats only the lines inside `[offset, offset + height)`. Lines above the
//! window still update the branch state so prefixes stay correct.

use std::ops::Range;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::iter::VisibleOnly;
use crate::tree::{Tree, TreeInner};

/// Branch glyph for an ancestor level that still has siblings below.
pub const GLYPH_PIPE: &str = "│   ";
/// Branch glyph for an ancestor level that was the last of its siblings.
pub const GLYPH_SPACE: &str = "    ";
/// Connector for a node with siblings below it.
pub const GLYPH_TEE: &str = "├── ";
/// Connector for the last node among its siblings.
pub const GLYPH_CORNER: &str = "└── ";

/// Renderer settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Columns reserved for the icon. Wider icons are cut, narrower padded.
    pub icon_width: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self { icon_width: 2 }
    }
}

/// One output line with its positional metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// Position in the visible-only order.
    pub index: usize,
    pub id: String,
    pub depth: usize,
    /// Branch glyphs, one four-column cell per level.
    pub prefix: String,
    /// Icon normalized to the configured width.
    pub icon: String,
    pub label: String,
    /// Opaque token from the render provider.
    pub style: String,
    pub focused: bool,
}

impl RenderedLine {
    /// `prefix + icon + label`.
    pub fn text(&self) -> String {
        let mut text = String::with_capacity(self.prefix.len() + self.icon.len() + self.label.len());
        text.push_str(&self.prefix);
        text.push_str(&self.icon);
        text.push_str(&self.label);
        text
    }
}

// =============================================================================
// Scratch buffers
// =============================================================================

/// Reusable prefix buffers for the line formatter. Every buffer is cleared
/// on return and holds nothing across calls.
struct ScratchPool {
    buffers: Mutex<Vec<String>>,
}

const POOL_RETAIN: usize = 4;

impl ScratchPool {
    const fn new() -> Self {
        Self {
            buffers: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> String {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default()
    }

    fn give(&self, mut buffer: String) {
        buffer.clear();
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        if buffers.len() < POOL_RETAIN {
            buffers.push(buffer);
        }
    }
}

static SCRATCH: ScratchPool = ScratchPool::new();

// =============================================================================
// Helpers
// =============================================================================

/// Pad or cut `icon` to exactly `width` display columns.
pub fn fit_width(icon: &str, width: usize) -> String {
    let mut out = String::with_capacity(width);
    let mut used = 0;
    for ch in icon.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.extend(std::iter::repeat_n(' ', width - used));
    out
}

/// Write the branch prefix for a node whose ancestors' last-sibling flags
/// are `ancestors`.
fn write_prefix(buf: &mut String, ancestors: &[bool], is_last: bool) {
    for &ancestor_last in ancestors {
        buf.push_str(if ancestor_last { GLYPH_SPACE } else { GLYPH_PIPE });
    }
    buf.push_str(if is_last { GLYPH_CORNER } else { GLYPH_TEE });
}

/// New scroll offset that keeps `focus` inside a window of `height` lines.
pub fn adjust_scroll(offset: usize, focus: Option<usize>, height: usize) -> usize {
    match focus {
        Some(index) if index < offset => index,
        Some(index) if height > 0 && index >= offset + height => index + 1 - height,
        _ => offset,
    }
}

// =============================================================================
// Passes
// =============================================================================

impl<T> TreeInner<T> {
    /// Visible-order position of the first focused node.
    ///
    /// This is the topmost focused line, not necessarily the primary focus:
    /// after extending a range downward by more than the window height, the
    /// primary can end up below the window.
    fn locate_focus(&self, cancel: &CancelToken) -> Result<Option<usize>> {
        if self.focused_ids.is_empty() {
            return Ok(None);
        }
        for (index, visit) in VisibleOnly::new(&self.nodes, cancel).enumerate() {
            if self.focused_ids.contains(visit?.node.id()) {
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// Format the visible lines whose position falls in `window`.
    fn render_range(&self, cancel: &CancelToken, window: Range<usize>) -> Result<Vec<RenderedLine>> {
        let provider = &self.strategies.provider;
        let icon_width = self.render.icon_width;
        let mut lines = Vec::with_capacity(window.len().min(1024));
        let mut ancestors: Vec<bool> = Vec::new();
        let mut prefix = SCRATCH.take();

        for (index, visit) in VisibleOnly::new(&self.nodes, cancel).enumerate() {
            if index >= window.end {
                break;
            }
            let visit = match visit {
                Ok(visit) => visit,
                Err(err) => {
                    SCRATCH.give(prefix);
                    return Err(err);
                }
            };

            ancestors.truncate(visit.depth);
            if index >= window.start {
                let node = visit.node;
                let focused = self.focused_ids.contains(node.id());

                prefix.clear();
                write_prefix(&mut prefix, &ancestors, visit.is_last);
                lines.push(RenderedLine {
                    index,
                    id: node.id().to_string(),
                    depth: visit.depth,
                    prefix: prefix.clone(),
                    icon: fit_width(&provider.icon(node), icon_width),
                    label: provider.format(node),
                    style: provider.style(node, focused),
                    focused,
                });
            }
            ancestors.push(visit.is_last);
        }

        SCRATCH.give(prefix);
        Ok(lines)
    }
}

impl<T> Tree<T> {
    pub fn render_config(&self) -> RenderConfig {
        self.read().render
    }

    pub fn set_render_config(&self, config: RenderConfig) {
        self.write().render = config;
    }

    /// Render at most `height` lines starting at the scroll offset, first
    /// scrolling so the first focused node is inside the window.
    pub fn render_window(&self, cancel: &CancelToken, height: usize) -> Result<Vec<RenderedLine>> {
        let mut inner = self.write();
        let focus = inner.locate_focus(cancel)?;
        let offset = adjust_scroll(inner.scroll_offset, focus, height);
        if offset != inner.scroll_offset {
            log::trace!(
                "[render] scroll {} -> {} (focus at {:?}, height {})",
                inner.scroll_offset,
                offset,
                focus,
                height
            );
            inner.scroll_offset = offset;
        }
        inner.render_range(cancel, offset..offset.saturating_add(height))
    }

    /// Every visible line, ignoring the scroll offset.
    pub fn render_lines(&self, cancel: &CancelToken) -> Result<Vec<RenderedLine>> {
        self.read().render_range(cancel, 0..usize::MAX)
    }

    /// The whole visible tree as text, one line per node.
    pub fn render(&self, cancel: &CancelToken) -> Result<String> {
        let lines = self.render_lines(cancel)?;
        let size = lines
            .iter()
            .map(|line| line.prefix.len() + line.icon.len() + line.label.len() + 1)
            .sum();
        let mut out = String::with_capacity(size);
        for line in &lines {
            out.push_str(&line.prefix);
            out.push_str(&line.icon);
            out.push_str(&line.label);
            out.push('\n');
        }
        Ok(out)
    }
}
