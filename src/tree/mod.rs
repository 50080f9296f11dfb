//! Tree layer: declarative nodes, measured layout results, render units,
//! and the reducer that flattens them into an immutable [`RenderTree`].
//!
//! [`RenderTree`]: render_tree::RenderTree

pub mod node;
pub mod reducer;
pub mod render_tree;
pub mod render_unit;

pub use node::{
    AsAny, LayoutContext, LayoutResult, Node, PendingUpdate, ResolvedTree, TreeState,
};
pub use reducer::reduce;
pub use render_tree::{RenderTree, RenderTreeNode};
pub use render_unit::{
    BindData, Binder, ContentAllocator, ContentType, LayoutData, RenderType, RenderUnit,
};
