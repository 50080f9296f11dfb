//! Node - declarative, immutable layout/render primitive.
//!
//! Nodes form the input tree: each one knows how to measure itself into a
//! [`LayoutResult`] under width/height constraints, and how to compare
//! itself structurally against another node. Structural equality (not
//! reference identity) is what enables layout-result reuse across resolve
//! passes.
//!
//! The hook state a resolve pass reads and writes lives in [`TreeState`];
//! state mutations arrive as [`PendingUpdate`]s that the pipeline batches
//! and applies at resolve time.

use std::any::Any;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;

use super::render_unit::{LayoutData, RenderUnit};
use crate::types::{Edges, MeasureSpec};

// =============================================================================
// Downcasting Capability
// =============================================================================

/// Blanket-implemented downcasting support.
///
/// `Node::equivalent` implementations need to see through `&dyn Node` to
/// their own concrete type; this avoids repeating `as_any` boilerplate on
/// every node type.
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

// =============================================================================
// Node
// =============================================================================

/// A declarative layout/render primitive.
///
/// Immutable and thread-safe: resolve builds node trees on worker threads
/// and layout measures them on whichever thread forces the computation.
pub trait Node<C>: AsAny + Send + Sync {
    /// Measure this node (and recursively its children) under the given
    /// constraints, producing an ephemeral layout-result tree.
    fn measure(
        &self,
        ctx: &mut LayoutContext,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
    ) -> LayoutResult<C>;

    /// Structural equality against another node tree.
    ///
    /// Required contract (not discovered at runtime): two equivalent trees
    /// must measure identically under identical constraints. The pipeline
    /// uses this to skip re-layout when a resolve pass produced an
    /// equivalent tree.
    fn equivalent(&self, other: &dyn Node<C>) -> bool;
}

// =============================================================================
// LayoutResult
// =============================================================================

/// Output of measuring a [`Node`]: resolved size, local offset within the
/// parent, optional padding and opaque layout data, the unit to mount (if
/// any), and measured children.
///
/// Ephemeral - consumed immediately by the reducer.
pub struct LayoutResult<C> {
    /// Offset within the parent's coordinate frame.
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub padding: Option<Edges>,
    /// The unit to mount. `None` makes this a pure layout container: it
    /// contributes no flattened node, and its children inherit its offset.
    pub unit: Option<Arc<RenderUnit<C>>>,
    /// Opaque data computed during measurement, surfaced to binders.
    pub layout_data: Option<Arc<LayoutData>>,
    pub children: Vec<LayoutResult<C>>,
}

impl<C> LayoutResult<C> {
    /// A unit-less container result.
    pub fn container(width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            padding: None,
            unit: None,
            layout_data: None,
            children: Vec::new(),
        }
    }

    /// A result carrying a unit.
    pub fn with_unit(unit: Arc<RenderUnit<C>>, width: i32, height: i32) -> Self {
        Self {
            x: 0,
            y: 0,
            width,
            height,
            padding: None,
            unit: Some(unit),
            layout_data: None,
            children: Vec::new(),
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.x = x;
        self.y = y;
        self
    }

    pub fn padded(mut self, padding: Edges) -> Self {
        self.padding = Some(padding);
        self
    }

    pub fn with_layout_data(mut self, data: Arc<LayoutData>) -> Self {
        self.layout_data = Some(data);
        self
    }

    pub fn child(mut self, child: LayoutResult<C>) -> Self {
        self.children.push(child);
        self
    }
}

// =============================================================================
// LayoutContext
// =============================================================================

/// Scratch context threaded through one measurement pass.
///
/// The cache lets expensive measurements (text shaping and the like) be
/// computed once and shared between nodes within the pass. Keys are
/// caller-chosen; typed access via downcast.
#[derive(Default)]
pub struct LayoutContext {
    cache: FxHashMap<u64, Arc<dyn Any + Send + Sync>>,
}

impl LayoutContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a cached value by key and type.
    pub fn cached<T: Any + Send + Sync>(&self, key: u64) -> Option<Arc<T>> {
        let entry = self.cache.get(&key)?;
        entry.clone().downcast::<T>().ok()
    }

    /// Store a value in the cache, replacing any previous entry at `key`.
    pub fn store<T: Any + Send + Sync>(&mut self, key: u64, value: T) -> Arc<T> {
        let arc = Arc::new(value);
        self.cache.insert(key, arc.clone());
        arc
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

// =============================================================================
// TreeState + Updates
// =============================================================================

/// Committed hook-state store for one resolved tree.
///
/// Values are keyed by a caller-chosen hook key and shared by `Arc`, so
/// cloning the whole store (which every resolve pass does) is cheap.
#[derive(Clone, Default)]
pub struct TreeState {
    slots: FxHashMap<u64, Arc<dyn Any + Send + Sync>>,
}

impl TreeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a state slot.
    pub fn get<T: Any + Send + Sync>(&self, key: u64) -> Option<Arc<T>> {
        let slot = self.slots.get(&key)?;
        slot.clone().downcast::<T>().ok()
    }

    /// Write a state slot.
    pub fn set<T: Any + Send + Sync>(&mut self, key: u64, value: T) {
        self.slots.insert(key, Arc::new(value));
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

static UPDATE_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// A queued state mutation.
///
/// Each update carries a unique id so that a commit can remove from the
/// pending list exactly the updates its resolve pass applied - updates
/// enqueued after the snapshot was taken survive for the next pass.
#[derive(Clone)]
pub struct PendingUpdate {
    id: u64,
    apply: Arc<dyn Fn(&mut TreeState) + Send + Sync>,
}

impl PendingUpdate {
    pub fn new(apply: impl Fn(&mut TreeState) + Send + Sync + 'static) -> Self {
        Self {
            id: UPDATE_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            apply: Arc::new(apply),
        }
    }

    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Apply this update to a state store.
    pub fn apply(&self, state: &mut TreeState) {
        (self.apply)(state)
    }
}

// =============================================================================
// ResolvedTree
// =============================================================================

/// A committed (node tree, hook state) pair - the output of one resolve
/// pass and the input of every layout pass.
pub struct ResolvedTree<C> {
    pub root: Arc<dyn Node<C>>,
    pub state: TreeState,
}

impl<C> ResolvedTree<C> {
    pub fn new(root: Arc<dyn Node<C>>, state: TreeState) -> Self {
        Self { root, state }
    }
}

// =============================================================================
// Tests
// =============================================================================
