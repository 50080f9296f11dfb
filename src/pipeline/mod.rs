//! Pipeline layer: versioned resolve/layout computations and UI promotion.

pub mod future;
pub mod priority;
pub mod render_state;

pub use future::TreeFuture;
pub use render_state::{RenderResult, RenderState, ResolveFunction, TreePromotedListener};
