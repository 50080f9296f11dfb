//! RenderTree - the flattened, mount-ready output of a layout pass.
//!
//! A render tree is a flat array of [`RenderTreeNode`]s in depth-first
//! mount order (index 0 is always the synthetic root host), indexed both by
//! position and by unit id. It is immutable: a new layout pass produces a
//! wholly new tree, never a mutation of the previous one.
//!
//! # Coordinate System
//!
//! Node bounds are *host-relative*: a node's rectangle is expressed in the
//! coordinate frame of the nearest enclosing host, not the screen. The
//! reducer performs the accumulated-offset translation; the mount engine
//! applies bounds relative to whatever host it mounts into.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::render_unit::{LayoutData, RenderUnit};
use crate::mount::extension::ExtensionResult;
use crate::types::{Edges, MeasureSpec, Rect, Size, UnitId};

// =============================================================================
// RenderTreeNode
// =============================================================================

/// One flattened node: a unit, where it goes, and who hosts it.
///
/// Built once per reducer pass; immutable; shared by `Arc` between the tree
/// and any mount items created from it.
pub struct RenderTreeNode<C> {
    unit: Arc<RenderUnit<C>>,
    layout_data: Option<Arc<LayoutData>>,
    /// Bounds relative to the nearest enclosing host.
    bounds: Rect,
    padding: Option<Edges>,
    /// Unit id of the hosting node. `None` only for the synthetic root.
    host_id: Option<UnitId>,
    /// Slot index within the host.
    index_in_host: usize,
    /// Direct mount children (unit ids), in slot order.
    children: Vec<UnitId>,
}

impl<C> RenderTreeNode<C> {
    pub(crate) fn new(
        unit: Arc<RenderUnit<C>>,
        layout_data: Option<Arc<LayoutData>>,
        bounds: Rect,
        padding: Option<Edges>,
        host_id: Option<UnitId>,
        index_in_host: usize,
    ) -> Self {
        Self {
            unit,
            layout_data,
            bounds,
            padding,
            host_id,
            index_in_host,
            children: Vec::new(),
        }
    }

    pub(crate) fn push_child(&mut self, child: UnitId) {
        self.children.push(child);
    }

    #[inline]
    pub fn unit(&self) -> &Arc<RenderUnit<C>> {
        &self.unit
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.unit.id()
    }

    pub fn layout_data(&self) -> Option<&Arc<LayoutData>> {
        self.layout_data.as_ref()
    }

    /// Host-relative bounds.
    #[inline]
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn padding(&self) -> Option<Edges> {
        self.padding
    }

    /// The hosting node's unit id; `None` only for the root.
    #[inline]
    pub fn host_id(&self) -> Option<UnitId> {
        self.host_id
    }

    /// Position within the host's slot list.
    #[inline]
    pub fn index_in_host(&self) -> usize {
        self.index_in_host
    }

    /// Direct mount children, in slot order.
    pub fn children(&self) -> &[UnitId] {
        &self.children
    }
}

impl<C> std::fmt::Debug for RenderTreeNode<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTreeNode")
            .field("id", &self.id())
            .field("bounds", &self.bounds)
            .field("host_id", &self.host_id)
            .field("index_in_host", &self.index_in_host)
            .field("children", &self.children)
            .finish()
    }
}

// =============================================================================
// RenderTree
// =============================================================================

/// Immutable flattened tree plus the constraints that produced it.
pub struct RenderTree<C> {
    nodes: Vec<Arc<RenderTreeNode<C>>>,
    index_by_id: FxHashMap<UnitId, usize>,
    width_spec: MeasureSpec,
    height_spec: MeasureSpec,
    /// Measured size of the root layout result.
    size: Size,
    extension_results: Vec<ExtensionResult<C>>,
}

impl<C> RenderTree<C> {
    pub(crate) fn new(
        nodes: Vec<Arc<RenderTreeNode<C>>>,
        index_by_id: FxHashMap<UnitId, usize>,
        width_spec: MeasureSpec,
        height_spec: MeasureSpec,
        size: Size,
        extension_results: Vec<ExtensionResult<C>>,
    ) -> Self {
        debug_assert_eq!(nodes.len(), index_by_id.len());
        Self {
            nodes,
            index_by_id,
            width_spec,
            height_spec,
            size,
            extension_results,
        }
    }

    /// The synthetic root host node.
    pub fn root(&self) -> &Arc<RenderTreeNode<C>> {
        &self.nodes[0]
    }

    /// Node at a mount-order index.
    pub fn node_at(&self, index: usize) -> Option<&Arc<RenderTreeNode<C>>> {
        self.nodes.get(index)
    }

    /// Node by unit id.
    pub fn node_for(&self, id: UnitId) -> Option<&Arc<RenderTreeNode<C>>> {
        self.index_by_id.get(&id).map(|&index| &self.nodes[index])
    }

    /// Mount-order index of a unit id.
    pub fn index_of(&self, id: UnitId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    /// Total node count, synthetic root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        // Never true: the root is always present.
        self.nodes.is_empty()
    }

    /// All nodes in depth-first mount order.
    pub fn nodes(&self) -> &[Arc<RenderTreeNode<C>>] {
        &self.nodes
    }

    pub fn width_spec(&self) -> MeasureSpec {
        self.width_spec
    }

    pub fn height_spec(&self) -> MeasureSpec {
        self.height_spec
    }

    /// The measured size this tree was produced at.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Extension side tables attached by the reducer.
    pub fn extension_results(&self) -> &[ExtensionResult<C>] {
        &self.extension_results
    }
}

impl<C> std::fmt::Debug for RenderTree<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderTree")
            .field("len", &self.nodes.len())
            .field("size", &self.size)
            .field("width_spec", &self.width_spec)
            .field("height_spec", &self.height_spec)
            .finish()
    }
}
