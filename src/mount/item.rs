//! MountItem - bookkeeping for one mounted unit.

use std::sync::Arc;

use bitflags::bitflags;

use super::host::ContentHandle;
use crate::tree::render_tree::RenderTreeNode;
use crate::tree::render_unit::BindData;
use crate::types::UnitId;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MountItemFlags: u8 {
        /// Attach binders are currently bound.
        const BOUND = 1 << 0;
    }
}

/// One mounted unit: the tree node it was last reconciled against, the live
/// content object, and per-binder bind data.
pub struct MountItem<C> {
    node: Arc<RenderTreeNode<C>>,
    content: ContentHandle<C>,
    flags: MountItemFlags,
    /// One slot per mount binder, parallel to the unit's binder list.
    mount_bind_data: Vec<Option<BindData>>,
    /// One slot per attach binder, populated only while BOUND.
    attach_bind_data: Vec<Option<BindData>>,
}

impl<C> MountItem<C> {
    pub fn new(node: Arc<RenderTreeNode<C>>, content: ContentHandle<C>) -> Self {
        let mount_binders = node.unit().mount_binders().len();
        let attach_binders = node.unit().attach_binders().len();
        Self {
            node,
            content,
            flags: MountItemFlags::empty(),
            mount_bind_data: (0..mount_binders).map(|_| None).collect(),
            attach_bind_data: (0..attach_binders).map(|_| None).collect(),
        }
    }

    #[inline]
    pub fn node(&self) -> &Arc<RenderTreeNode<C>> {
        &self.node
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.node.id()
    }

    /// The host this item was mounted into. `None` only for the root item.
    #[inline]
    pub fn host_id(&self) -> Option<UnitId> {
        self.node.host_id()
    }

    #[inline]
    pub fn content(&self) -> &ContentHandle<C> {
        &self.content
    }

    /// Swap in the node from a newer tree, resizing bind-data storage to the
    /// new unit's binder lists.
    pub fn update_node(&mut self, node: Arc<RenderTreeNode<C>>) {
        self.mount_bind_data
            .resize_with(node.unit().mount_binders().len(), || None);
        self.attach_bind_data
            .resize_with(node.unit().attach_binders().len(), || None);
        self.node = node;
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.flags.contains(MountItemFlags::BOUND)
    }

    pub fn set_bound(&mut self, bound: bool) {
        self.flags.set(MountItemFlags::BOUND, bound);
    }

    pub fn mount_bind_data_mut(&mut self) -> &mut Vec<Option<BindData>> {
        &mut self.mount_bind_data
    }

    pub fn attach_bind_data_mut(&mut self) -> &mut Vec<Option<BindData>> {
        &mut self.attach_bind_data
    }

    pub fn take_mount_bind_data(&mut self, index: usize) -> Option<BindData> {
        self.mount_bind_data.get_mut(index).and_then(|d| d.take())
    }

    pub fn take_attach_bind_data(&mut self, index: usize) -> Option<BindData> {
        self.attach_bind_data.get_mut(index).and_then(|d| d.take())
    }
}

impl<C> std::fmt::Debug for MountItem<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountItem")
            .field("id", &self.id())
            .field("host_id", &self.host_id())
            .field("bound", &self.is_bound())
            .finish()
    }
}
