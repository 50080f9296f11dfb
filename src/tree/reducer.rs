//! Reducer - flattening a measured layout tree into a RenderTree.
//!
//! Depth-first pre-order walk over a [`LayoutResult`] tree, maintaining an
//! accumulated translation offset. Three cases per result:
//!
//! - unit + children: the result becomes a new *host* node; a fresh
//!   translation frame begins at (0,0) for its children
//! - unit, no children: a leaf node; no frame change
//! - no unit: a pass-through container; it contributes no flattened node,
//!   and its children inherit its accumulated offset
//!
//! Every result - node-producing or not - is shown to each registered
//! extension's layout visitor before its children are walked. A synthetic
//! root host (reserved id 0) is always inserted first, so even an empty
//! layout tree reduces to a one-node RenderTree.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use super::node::LayoutResult;
use super::render_tree::{RenderTree, RenderTreeNode};
use super::render_unit::RenderUnit;
use crate::mount::extension::{ExtensionResult, LayoutVisitor, TreeExtension};
use crate::types::{MeasureSpec, ROOT_HOST_ID, Rect, Size, UnitId};

// =============================================================================
// Entry Point
// =============================================================================

/// Flatten a measured layout tree into an immutable [`RenderTree`].
pub fn reduce<C>(
    root: &LayoutResult<C>,
    width_spec: MeasureSpec,
    height_spec: MeasureSpec,
    extensions: &[Arc<dyn TreeExtension<C>>],
) -> RenderTree<C> {
    let mut walk = Walk::new(extensions);

    // Synthetic root host: always present, always index 0.
    let root_bounds = Rect::new(0, 0, root.width, root.height);
    let root_node = RenderTreeNode::new(
        Arc::new(RenderUnit::root_host()),
        None,
        root_bounds,
        None,
        None,
        0,
    );
    walk.nodes.push(root_node);
    walk.index_by_id.insert(ROOT_HOST_ID, 0);

    walk.visit(root, 0, 0, 0, 0, 0);

    let extension_results = walk
        .visitors
        .into_iter()
        .map(|(extension, visitor)| ExtensionResult {
            extension,
            data: visitor.and_then(|v| v.finish()),
        })
        .collect();

    RenderTree::new(
        walk.nodes.into_iter().map(Arc::new).collect(),
        walk.index_by_id,
        width_spec,
        height_spec,
        Size::new(root.width, root.height),
        extension_results,
    )
}

// =============================================================================
// Walk State
// =============================================================================

struct Walk<C> {
    nodes: Vec<RenderTreeNode<C>>,
    index_by_id: FxHashMap<UnitId, usize>,
    visitors: Vec<(Arc<dyn TreeExtension<C>>, Option<Box<dyn LayoutVisitor<C>>>)>,
}

impl<C> Walk<C> {
    fn new(extensions: &[Arc<dyn TreeExtension<C>>]) -> Self {
        Self {
            nodes: Vec::new(),
            index_by_id: FxHashMap::default(),
            visitors: extensions
                .iter()
                .map(|e| (e.clone(), e.create_layout_visitor()))
                .collect(),
        }
    }

    /// Visit one layout result.
    ///
    /// `(dx, dy)` is the accumulated offset within the current host frame;
    /// `(abs_x, abs_y)` the accumulated offset from the tree origin, used
    /// only for extension visitors.
    fn visit(
        &mut self,
        result: &LayoutResult<C>,
        host_index: usize,
        dx: i32,
        dy: i32,
        abs_x: i32,
        abs_y: i32,
    ) {
        let rel = Rect::new(dx + result.x, dy + result.y, result.width, result.height);
        let abs = Rect::new(
            abs_x + result.x,
            abs_y + result.y,
            result.width,
            result.height,
        );

        // Extensions observe every layout result, not just mountable ones.
        for (_, visitor) in self.visitors.iter_mut() {
            if let Some(visitor) = visitor {
                visitor.visit(result, abs);
            }
        }

        match &result.unit {
            Some(unit) => {
                let id = unit.id();
                let slot = self.nodes[host_index].children().len();
                let host_id = self.nodes[host_index].id();

                let node = RenderTreeNode::new(
                    unit.clone(),
                    result.layout_data.clone(),
                    rel,
                    result.padding,
                    Some(host_id),
                    slot,
                );

                let index = self.nodes.len();
                if self.index_by_id.insert(id, index).is_some() {
                    // Broken invariant: ids must be unique within one tree.
                    panic!("duplicate render unit id {id} in render tree");
                }
                self.nodes.push(node);
                self.nodes[host_index].push_child(id);

                if !result.children.is_empty() {
                    // This node hosts its children: fresh frame at (0,0).
                    for child in &result.children {
                        self.visit(child, index, 0, 0, abs.x, abs.y);
                    }
                }
            }
            None => {
                // Pass-through container: children inherit the accumulated,
                // untranslated offset.
                for child in &result.children {
                    self.visit(child, host_index, rel.x, rel.y, abs.x, abs.y);
                }
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
