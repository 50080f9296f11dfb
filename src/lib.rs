//! # spark-render
//!
//! Versioned resolve/layout/mount rendering engine.
//!
//! The engine turns a declarative node tree into live, incrementally
//! reconciled content in three stages:
//!
//! ```text
//! resolve (node tree + state) → layout (measure + reduce) → mount (reconcile)
//! ```
//!
//! Resolve and layout may run on any thread; each commit is gated by a
//! strictly increasing version so the pipeline never moves backwards no
//! matter which thread finishes first. Committed results are promoted to
//! the UI-confined thread, where [`MountState`](mount::MountState)
//! reconciles them against the previously mounted tree: disappeared items
//! unmount, shifted items move within their host, surviving items update
//! their binders in place.
//!
//! ## Modules
//!
//! - [`types`] - Geometry, measure specs, unit ids
//! - [`tree`] - Nodes, render units, the reducer and its flattened output
//! - [`pipeline`] - Versioned resolve/layout futures and UI promotion
//! - [`mount`] - The reconciliation engine, hosts, binders, extensions
//! - [`pool`] - Recycled content objects
//! - [`scheduler`] - Marshalling work onto the UI thread
//! - [`telemetry`] - Soft-error reporting

pub mod mount;
pub mod pipeline;
pub mod pool;
pub mod scheduler;
pub mod telemetry;
pub mod tree;
pub mod types;

pub use types::{Edges, MeasureSpec, ROOT_HOST_ID, Rect, Size, UnitId, next_unit_id};

pub use tree::{
    AsAny, BindData, Binder, ContentAllocator, ContentType, LayoutContext, LayoutData,
    LayoutResult, Node, PendingUpdate, RenderTree, RenderTreeNode, RenderType, RenderUnit,
    ResolvedTree, TreeState, reduce,
};

pub use pipeline::{RenderResult, RenderState, ResolveFunction, TreeFuture, TreePromotedListener};

pub use mount::{
    ContentHandle, ExtensionData, ExtensionResult, Host, LayoutVisitor, MountContent,
    MountDelegate, MountError, MountExtension, MountItem, MountRefs, MountState, TreeExtension,
};

pub use pool::ContentPool;

pub use scheduler::{InlineScheduler, QueueScheduler, Scheduler, Task, TaskId};

pub use telemetry::{ErrorReporter, ReportLevel, SharedReporter, TracingReporter};
