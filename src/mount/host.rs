//! Host and content capabilities.
//!
//! Mounted content is owned by the UI thread and shared between the mount
//! engine, its host, and extensions as a [`ContentHandle`]. A content type
//! opts into hosting children by returning a [`Host`] view of itself; leaf
//! content (drawables) returns `None` and never receives children.

use std::cell::RefCell;
use std::rc::Rc;

use crate::types::Rect;

/// Shared, UI-confined handle to one piece of mounted content.
pub type ContentHandle<C> = Rc<RefCell<C>>;

/// Capability every mountable content type implements.
pub trait MountContent: Sized + 'static {
    /// Host view of this content, if it can contain mounted children.
    fn as_host_mut(&mut self) -> Option<&mut dyn Host<Self>> {
        None
    }

    /// Apply host-relative bounds. Called on every mount and again on every
    /// pass the item survives, whether or not the bounds changed.
    fn apply_bounds(&mut self, bounds: Rect);
}

/// Slot-addressed container of mounted children.
///
/// Slots are the reducer-assigned positions within this host; the engine
/// mounts, unmounts and moves children by slot. `from_slot` in
/// [`Host::move_item`] is the slot the engine last placed the item at -
/// hosts that reorder internally must locate the item by handle identity if
/// it has since shifted.
pub trait Host<C> {
    fn mount(&mut self, slot: usize, content: ContentHandle<C>, bounds: Rect);

    /// Unmount by handle identity, wherever the item currently sits.
    fn unmount(&mut self, content: ContentHandle<C>);

    /// Unmount the item known to sit at `slot`.
    fn unmount_at(&mut self, slot: usize, content: ContentHandle<C>);

    fn move_item(&mut self, content: ContentHandle<C>, from_slot: usize, to_slot: usize);

    /// Number of currently mounted children.
    fn mount_item_count(&self) -> usize;

    fn mount_item_at(&self, slot: usize) -> Option<ContentHandle<C>>;

    /// Whether this host currently contains the item, at any slot.
    fn contains(&self, content: &ContentHandle<C>) -> bool;
}
