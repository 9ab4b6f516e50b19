//! In-memory tree engine: construction, traversal, focus, search and
//! windowed rendering.

pub mod build;
pub mod cancel;
pub mod error;
mod focus;
pub mod iter;
pub mod node;
pub mod options;
pub mod render;
mod search;
pub mod strategy;
pub mod tree;

pub use build::{
    FileInfo, FileKey, FileSystem, FlatItem, FlatRecord, NestedItem, OsFileSystem, Record,
};
pub use cancel::CancelToken;
pub use error::{BuildError, PartialError, Result, TreeError};
pub use iter::{BreadthFirst, DepthFirst, PostOrder, Visit, VisibleOnly, collect_visible};
pub use node::{Node, find, limit_depth, path_to};
pub use options::{BuildOptions, Limits};
pub use render::{RenderConfig, RenderedLine};
pub use search::SearchOutcome;
pub use strategy::{
    ClampFocus, DefaultProvider, DefaultSearch, FocusPolicy, FuzzySearch, RenderProvider,
    SearchPredicate, TextSearch, WrapFocus,
};
pub use tree::Tree;
