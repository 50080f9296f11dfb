//! Extension capability traits.
//!
//! Extensions plug into two places: the reducer (a layout visitor observes
//! every layout result while the tree is flattened, and may compute a side
//! table that rides on the finished [`RenderTree`]) and the mount pass (a
//! [`MountExtension`] receives lifecycle callbacks and may participate in
//! reference-counted mount gating).
//!
//! A [`TreeExtension`] is the shared, thread-safe handle tying the two
//! together; the mount engine compares handle lists by pointer identity to
//! decide whether extension state survives across trees.

use std::any::Any;
use std::sync::Arc;

use crate::mount::delegate::MountRefs;
use crate::mount::host::ContentHandle;
use crate::tree::node::LayoutResult;
use crate::tree::render_tree::{RenderTree, RenderTreeNode};
use crate::types::{Rect, UnitId};

// =============================================================================
// Extension Data
// =============================================================================

/// Side table computed by a layout visitor, carried on the render tree.
pub type ExtensionData = Arc<dyn Any + Send + Sync>;

/// A tree extension paired with the side table its visitor computed for one
/// specific render tree.
pub struct ExtensionResult<C> {
    pub extension: Arc<dyn TreeExtension<C>>,
    pub data: Option<ExtensionData>,
}

impl<C> Clone for ExtensionResult<C> {
    fn clone(&self) -> Self {
        Self {
            extension: self.extension.clone(),
            data: self.data.clone(),
        }
    }
}

/// Whether two trees carry the same extension set.
///
/// Pointer identity on the extension handles: the mount engine keeps
/// per-extension running state (reference counts and the like) alive across
/// trees exactly when this returns true.
pub fn same_extensions<C>(a: &[ExtensionResult<C>], b: &[ExtensionResult<C>]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b.iter())
            .all(|(x, y)| Arc::ptr_eq(&x.extension, &y.extension))
}

// =============================================================================
// TreeExtension
// =============================================================================

/// Shared handle for a pluggable engine extension.
pub trait TreeExtension<C>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Visitor run over every layout result (mountable or not) during
    /// reduction. `None` if this extension does not observe layout.
    fn create_layout_visitor(&self) -> Option<Box<dyn LayoutVisitor<C>>> {
        None
    }

    /// UI-side mount state for trees carrying this extension. `None` if the
    /// extension only contributes reduce-time data.
    fn create_mount_extension(&self) -> Option<Box<dyn MountExtension<C>>> {
        None
    }
}

/// Reduce-time visitor. Sees every layout result in pre-order, with the
/// absolute bounds the reducer computed for it, before children are visited.
pub trait LayoutVisitor<C> {
    fn visit(&mut self, result: &LayoutResult<C>, absolute_bounds: Rect);

    /// Consume the visitor, yielding the side table (if any) to attach to
    /// the finished render tree.
    fn finish(self: Box<Self>) -> Option<ExtensionData>;
}

// =============================================================================
// MountExtension
// =============================================================================

/// Mount-time observer and (optionally) vetoer of mount decisions.
///
/// All callbacks run on the UI-confined thread, in extension registration
/// order.
#[allow(unused_variables)]
pub trait MountExtension<C> {
    fn name(&self) -> &'static str {
        "extension"
    }

    /// Whether this extension participates in reference-counted mount
    /// gating. When any registered extension returns true, a node mounts
    /// only while its reference count is positive.
    fn can_prevent_mount(&self) -> bool {
        false
    }

    /// Called before each node's mountability check; the extension acquires
    /// or releases references for the node here.
    fn update_mount_refs(&mut self, refs: &mut MountRefs, node: &RenderTreeNode<C>, index: usize) {}

    /// Called once at the start of a mount pass with this extension's
    /// reduce-time data for the incoming tree.
    fn before_mount(
        &mut self,
        refs: &mut MountRefs,
        tree: &RenderTree<C>,
        data: Option<&ExtensionData>,
    ) {
    }

    /// Called once after the mount pass completes. An extension may hand
    /// back a tree to mount in a follow-up pass; follow-ups share the
    /// nested-remount retry ceiling.
    fn after_mount(&mut self) -> Option<Arc<RenderTree<C>>> {
        None
    }

    fn on_mount_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {}

    fn on_unmount_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {}

    fn on_bind_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {}

    fn on_unbind_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {}

    fn on_bounds_applied(&mut self, node: &RenderTreeNode<C>, bounds: Rect) {}

    /// Visible-bounds notification, possibly deferred by an in-progress
    /// notification section (see `MountDelegate::start_notify_section`).
    fn on_visible_bounds_changed(&mut self, id: UnitId) {}

    /// Called when the extension is unregistered; all references this
    /// extension still holds must be released here.
    fn on_unregister(&mut self, refs: &mut MountRefs) {}

    /// Whether this extension wants to be the designated unmount delegate.
    /// At most one registered extension may return true.
    fn is_unmount_delegate(&self) -> bool {
        false
    }

    /// Unmount-delegate protocol: when this extension is the designated
    /// unmount delegate, items for which this returns true are handed to
    /// [`MountExtension::delegate_unmount`] instead of being unmounted
    /// directly.
    fn should_delegate_unmount(&self, node: &RenderTreeNode<C>) -> bool {
        false
    }

    fn delegate_unmount(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {}
}

// =============================================================================
// Tests
// =============================================================================
