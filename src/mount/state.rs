//! MountState - incremental reconciliation of render trees against live
//! content.
//!
//! One MountState owns the mounted representation of one root host. Each
//! call to [`MountState::mount`] reconciles the previous tree against the
//! new one in two passes:
//!
//! 1. **Unmount-or-move** - walk the previous tree: items gone from the new
//!    tree unmount (recursively, children first); items whose host changed
//!    unmount too (content cannot be moved between hosts); items that only
//!    shifted slots within the same host move in place.
//! 2. **Forward** - walk the new tree in mount order: unmounted mountable
//!    items mount (host first, by policy), mounted items update binders
//!    per-binder via `should_update` and unconditionally reapply bounds.
//!
//! The engine tolerates a corrupted item map: when an entry's recorded
//! content type disagrees with the incoming tree, every tracked item except
//! the root unmounts (binder teardown and pool return included) and the
//! forward walk restarts from a clean slate, at most once per pass.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use thiserror::Error;

use super::delegate::MountDelegate;
use super::host::{ContentHandle, MountContent};
use super::item::MountItem;
use crate::mount::extension::same_extensions;
use crate::pool::ContentPool;
use crate::telemetry::{CATEGORY_MOUNT, ReportLevel, SharedReporter, default_reporter};
use crate::tree::render_tree::{RenderTree, RenderTreeNode};
use crate::types::{ROOT_HOST_ID, UnitId};

/// Ceiling on nested remount retries within one external mount call.
pub const MAX_REMOUNT_ATTEMPTS: u32 = 3;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum MountError {
    /// A child needed mounting while its host was not mounted and the
    /// ensure-parent-mounted policy is disabled.
    #[error(
        "cannot mount unit {child}: host {host} is not mounted (mount sequence: {sequence:?})"
    )]
    HostNotMounted {
        child: UnitId,
        host: UnitId,
        sequence: Vec<UnitId>,
    },
}

// =============================================================================
// MountState
// =============================================================================

pub struct MountState<C: MountContent> {
    items: FxHashMap<UnitId, MountItem<C>>,
    tree: Option<Arc<RenderTree<C>>>,
    delegate: MountDelegate<C>,
    pool: ContentPool<C>,
    root_content: ContentHandle<C>,
    reporter: SharedReporter,
    /// Guards against re-entrant mounting; also routes nested remount
    /// requests to the retry queue.
    is_mounting: bool,
    pending_remount: Option<Arc<RenderTree<C>>>,
    remount_attempts: u32,
    /// Set once the item map has been rebuilt during the current pass.
    rebuilt_map: bool,
    /// When true (the default), mounting a child whose host is unmounted
    /// mounts the host chain first. When false it is a [`MountError`].
    ensure_parent_mounted: bool,
    /// Ids mounted during the current pass, in order; error diagnostics.
    mount_sequence: Vec<UnitId>,
}

impl<C: MountContent> MountState<C> {
    /// Create a mount state over the embedder-owned root host content.
    pub fn new(root_content: ContentHandle<C>, pool: ContentPool<C>) -> Self {
        Self::with_reporter(root_content, pool, default_reporter())
    }

    pub fn with_reporter(
        root_content: ContentHandle<C>,
        pool: ContentPool<C>,
        reporter: SharedReporter,
    ) -> Self {
        Self {
            items: FxHashMap::default(),
            tree: None,
            delegate: MountDelegate::new(),
            pool,
            root_content,
            reporter,
            is_mounting: false,
            pending_remount: None,
            remount_attempts: 0,
            rebuilt_map: false,
            ensure_parent_mounted: true,
            mount_sequence: Vec::new(),
        }
    }

    /// Toggle the ensure-parent-mounted policy.
    pub fn set_ensure_parent_mounted(&mut self, ensure: bool) {
        self.ensure_parent_mounted = ensure;
    }

    // -------------------------------------------------------------------------
    // Mount pass
    // -------------------------------------------------------------------------

    /// Reconcile the mounted state against `tree`.
    ///
    /// Mounting the tree object that is already mounted is a no-op.
    /// Panics when called re-entrantly from a binder or extension callback;
    /// use [`MountState::request_remount`] for that.
    pub fn mount(&mut self, tree: Arc<RenderTree<C>>) -> Result<(), MountError> {
        assert!(!self.is_mounting, "mount called re-entrantly");
        self.remount_attempts = 0;
        self.mount_pass(tree)
    }

    /// Ask for a mount of `tree`, deferring until the current pass finishes
    /// when one is in progress. Deferred requests are retried at most
    /// [`MAX_REMOUNT_ATTEMPTS`] times.
    pub fn request_remount(&mut self, tree: Arc<RenderTree<C>>) -> Result<(), MountError> {
        if self.is_mounting {
            self.pending_remount = Some(tree);
            Ok(())
        } else {
            self.mount(tree)
        }
    }

    fn mount_pass(&mut self, tree: Arc<RenderTree<C>>) -> Result<(), MountError> {
        if self.tree.as_ref().is_some_and(|cur| Arc::ptr_eq(cur, &tree)) {
            return Ok(());
        }

        // Extension set change tears extension state down; an identical set
        // keeps its running state and only receives fresh reduce-time data.
        let set_matches = same_extensions(
            self.tree
                .as_ref()
                .map(|t| t.extension_results())
                .unwrap_or(&[]),
            tree.extension_results(),
        );
        if set_matches {
            self.delegate.update_data(tree.extension_results());
        } else {
            self.delegate.register(tree.extension_results());
        }

        self.is_mounting = true;
        self.rebuilt_map = false;
        self.mount_sequence.clear();
        self.delegate.before_mount(&tree);
        self.delegate.start_notify_section();

        self.mount_root(&tree);

        let previous = self.tree.clone();
        if let Some(previous) = previous {
            self.unmount_or_move_pass(&previous, &tree);
        }

        self.tree = Some(tree.clone());
        let result = self.forward_pass(&tree);

        if let Some(next) = self.delegate.after_mount() {
            self.pending_remount = Some(next);
        }
        self.delegate.end_notify_section();
        self.is_mounting = false;
        result?;

        if let Some(next) = self.pending_remount.take() {
            self.remount_attempts += 1;
            if self.remount_attempts >= MAX_REMOUNT_ATTEMPTS {
                self.reporter.report(
                    ReportLevel::Error,
                    CATEGORY_MOUNT,
                    "nested remount retry ceiling reached, dropping request",
                    1,
                    &[("attempts", self.remount_attempts.to_string())],
                );
                return Ok(());
            }
            return self.mount_pass(next);
        }
        Ok(())
    }

    /// The synthetic root is mounted into the embedder's content, never into
    /// a host, and never unmounted by reconciliation.
    fn mount_root(&mut self, tree: &Arc<RenderTree<C>>) {
        let root_node = tree.root().clone();
        match self.items.get_mut(&ROOT_HOST_ID) {
            Some(item) => item.update_node(root_node.clone()),
            None => {
                self.items.insert(
                    ROOT_HOST_ID,
                    MountItem::new(root_node.clone(), self.root_content.clone()),
                );
                self.mount_sequence.push(ROOT_HOST_ID);
            }
        }
        self.root_content.borrow_mut().apply_bounds(root_node.bounds());
        self.delegate
            .on_bounds_applied(&root_node, root_node.bounds());
    }

    fn unmount_or_move_pass(&mut self, previous: &Arc<RenderTree<C>>, tree: &Arc<RenderTree<C>>) {
        for prev_node in previous.nodes().iter().skip(1) {
            let id = prev_node.id();
            if !self.items.contains_key(&id) {
                continue;
            }
            match tree.node_for(id) {
                None => self.unmount_item_recursively(id),
                Some(new_node) => {
                    let old_node = match self.items.get(&id) {
                        Some(item) => item.node().clone(),
                        None => continue,
                    };
                    if new_node.host_id() != old_node.host_id() {
                        // Reparented: content never crosses hosts in place.
                        self.unmount_item_recursively(id);
                    } else if new_node.index_in_host() != old_node.index_in_host() {
                        self.move_item_in_host(&old_node, new_node.index_in_host());
                    }
                }
            }
        }
    }

    fn forward_pass(&mut self, tree: &Arc<RenderTree<C>>) -> Result<(), MountError> {
        let mut index = 1;
        while index < tree.len() {
            let node = tree.nodes()[index].clone();
            let id = node.id();
            let mountable = self.delegate.maybe_lock_for_mount(&node, index);
            let mounted = self.items.contains_key(&id);

            match (mounted, mountable) {
                (false, true) => self.mount_item(tree, index)?,
                (true, false) => self.unmount_item_recursively(id),
                (true, true) => {
                    let stale = self
                        .items
                        .get(&id)
                        .is_some_and(|item| {
                            item.node().unit().content_type() != node.unit().content_type()
                        });
                    if stale {
                        if self.rebuilt_map {
                            panic!("mount item map inconsistent after rebuild (unit {id})");
                        }
                        self.reporter.report(
                            ReportLevel::Fatal,
                            CATEGORY_MOUNT,
                            "mounted item map inconsistency detected, resetting",
                            1,
                            &[("unit", id.to_string())],
                        );
                        self.recreate_mounted_item_map();
                        self.rebuilt_map = true;
                        index = 1;
                        continue;
                    }
                    self.update_item(id, node.clone());
                }
                (false, false) => {}
            }
            index += 1;
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Mounting one item
    // -------------------------------------------------------------------------

    fn mount_item(&mut self, tree: &Arc<RenderTree<C>>, index: usize) -> Result<(), MountError> {
        let node = tree.nodes()[index].clone();
        let id = node.id();
        let Some(host_id) = node.host_id() else {
            // The root is handled by mount_root.
            return Ok(());
        };

        if !self.items.contains_key(&host_id) {
            if !self.ensure_parent_mounted {
                return Err(MountError::HostNotMounted {
                    child: id,
                    host: host_id,
                    sequence: self.mount_sequence.clone(),
                });
            }
            let host_index = tree
                .index_of(host_id)
                .unwrap_or_else(|| panic!("host {host_id} missing from render tree"));
            self.mount_item(tree, host_index)?;
        }

        let unit = node.unit().clone();
        let allocator = unit
            .allocator()
            .cloned()
            .unwrap_or_else(|| panic!("non-root unit {id} has no allocator"));

        let content = Rc::new(RefCell::new(self.pool.acquire(&allocator)));
        content.borrow_mut().apply_bounds(node.bounds());

        // Into the host before binders run, so binders see attached content.
        let host_content = match self.items.get(&host_id) {
            Some(host_item) => host_item.content().clone(),
            None => {
                return Err(MountError::HostNotMounted {
                    child: id,
                    host: host_id,
                    sequence: self.mount_sequence.clone(),
                });
            }
        };
        {
            let mut host = host_content.borrow_mut();
            let host_view = host.as_host_mut().unwrap_or_else(|| {
                panic!("unit {host_id} hosts children but its content is not a host")
            });
            host_view.mount(node.index_in_host(), content.clone(), node.bounds());
        }

        let mut item = MountItem::new(node.clone(), content.clone());
        let layout_data = node.layout_data().cloned();
        {
            let mut c = content.borrow_mut();
            for (i, binder) in unit.mount_binders().iter().enumerate() {
                item.mount_bind_data_mut()[i] = binder.bind(&mut c, &unit, layout_data.as_ref());
            }
        }
        self.items.insert(id, item);
        self.mount_sequence.push(id);
        self.delegate.on_mount_item(&node, &content);

        self.bind_item(id);
        self.delegate.on_bounds_applied(&node, node.bounds());
        self.delegate.notify_visible_bounds_changed(id);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Updating one item
    // -------------------------------------------------------------------------

    fn update_item(&mut self, id: UnitId, new_node: Arc<RenderTreeNode<C>>) {
        let Some(item) = self.items.get_mut(&id) else {
            return;
        };
        let content = item.content().clone();
        let old_node = item.node().clone();
        let was_bound = item.is_bound();

        let old_unit = old_node.unit().clone();
        let new_unit = new_node.unit().clone();
        let old_data = old_node.layout_data().cloned();
        let new_data = new_node.layout_data().cloned();

        // Indices whose binders need an unbind/rebind cycle, collected
        // during the (reverse-ordered) unbind phase.
        let mut attach_updates: Vec<usize> = Vec::new();
        let mut mount_updates: Vec<usize> = Vec::new();
        {
            let mut c = content.borrow_mut();

            if was_bound {
                let count = old_unit
                    .attach_binders()
                    .len()
                    .max(new_unit.attach_binders().len());
                for i in (0..count).rev() {
                    let needs = match (
                        old_unit.attach_binders().get(i),
                        new_unit.attach_binders().get(i),
                    ) {
                        (Some(_), Some(nb)) => nb.should_update(
                            &old_unit,
                            &new_unit,
                            old_data.as_ref(),
                            new_data.as_ref(),
                        ),
                        _ => true,
                    };
                    if needs {
                        if let Some(ob) = old_unit.attach_binders().get(i) {
                            let data = item.take_attach_bind_data(i);
                            ob.unbind(&mut c, &old_unit, old_data.as_ref(), data);
                        }
                        attach_updates.push(i);
                    }
                }
            }

            let count = old_unit
                .mount_binders()
                .len()
                .max(new_unit.mount_binders().len());
            for i in (0..count).rev() {
                let needs = match (
                    old_unit.mount_binders().get(i),
                    new_unit.mount_binders().get(i),
                ) {
                    (Some(_), Some(nb)) => nb.should_update(
                        &old_unit,
                        &new_unit,
                        old_data.as_ref(),
                        new_data.as_ref(),
                    ),
                    _ => true,
                };
                if needs {
                    if let Some(ob) = old_unit.mount_binders().get(i) {
                        let data = item.take_mount_bind_data(i);
                        ob.unbind(&mut c, &old_unit, old_data.as_ref(), data);
                    }
                    mount_updates.push(i);
                }
            }

            item.update_node(new_node.clone());

            // Rebind phases run in forward order.
            for &i in mount_updates.iter().rev() {
                if let Some(nb) = new_unit.mount_binders().get(i) {
                    item.mount_bind_data_mut()[i] = nb.bind(&mut c, &new_unit, new_data.as_ref());
                }
            }
            if was_bound {
                for &i in attach_updates.iter().rev() {
                    if let Some(nb) = new_unit.attach_binders().get(i) {
                        item.attach_bind_data_mut()[i] =
                            nb.bind(&mut c, &new_unit, new_data.as_ref());
                    }
                }
            }

            // Bounds reapply is unconditional, changed or not.
            c.apply_bounds(new_node.bounds());
        }

        self.delegate.on_bounds_applied(&new_node, new_node.bounds());
        if new_node.bounds() != old_node.bounds() {
            self.delegate.notify_visible_bounds_changed(id);
        }
    }

    // -------------------------------------------------------------------------
    // Moving and unmounting
    // -------------------------------------------------------------------------

    fn move_item_in_host(&mut self, old_node: &Arc<RenderTreeNode<C>>, to_slot: usize) {
        let Some(host_id) = old_node.host_id() else {
            return;
        };
        let Some(host_item) = self.items.get(&host_id) else {
            return;
        };
        let host_content = host_item.content().clone();
        let Some(item) = self.items.get(&old_node.id()) else {
            return;
        };
        let content = item.content().clone();

        let mut host = host_content.borrow_mut();
        if let Some(host_view) = host.as_host_mut() {
            host_view.move_item(content, old_node.index_in_host(), to_slot);
        }
    }

    /// Unmount an item and (first) everything mounted below it. The
    /// synthetic root only sheds its children.
    fn unmount_item_recursively(&mut self, id: UnitId) {
        let Some(item) = self.items.get(&id) else {
            return;
        };
        let node = item.node().clone();

        // Children come out before their host.
        for child in node.children() {
            self.unmount_item_recursively(*child);
        }

        if id == ROOT_HOST_ID {
            return;
        }
        let Some(mut item) = self.items.remove(&id) else {
            return;
        };
        let content = item.content().clone();

        // The designated unmount delegate may take over the teardown.
        if self.delegate.maybe_delegate_unmount(&node, &content) {
            return;
        }

        let unit = node.unit().clone();
        let layout_data = node.layout_data().cloned();

        if item.is_bound() {
            {
                let mut c = content.borrow_mut();
                for i in (0..unit.attach_binders().len()).rev() {
                    let data = item.take_attach_bind_data(i);
                    unit.attach_binders()[i].unbind(&mut c, &unit, layout_data.as_ref(), data);
                }
            }
            item.set_bound(false);
            self.delegate.on_unbind_item(&node, &content);
        }

        {
            let mut c = content.borrow_mut();
            for i in (0..unit.mount_binders().len()).rev() {
                let data = item.take_mount_bind_data(i);
                unit.mount_binders()[i].unbind(&mut c, &unit, layout_data.as_ref(), data);
            }
        }

        if let Some(host_id) = node.host_id() {
            if let Some(host_item) = self.items.get(&host_id) {
                let host_content = host_item.content().clone();
                let mut host = host_content.borrow_mut();
                if let Some(host_view) = host.as_host_mut() {
                    host_view.unmount_at(node.index_in_host(), content.clone());
                }
            }
        }

        self.delegate.on_unmount_item(&node, &content);

        // Recycle when nothing else holds the content.
        drop(item);
        if let Some(allocator) = node.unit().allocator() {
            if let Ok(cell) = Rc::try_unwrap(content) {
                self.pool.release(allocator, cell.into_inner());
            }
        }
    }

    // -------------------------------------------------------------------------
    // Self-healing
    // -------------------------------------------------------------------------

    /// Reset the item map after an inconsistency: every tracked item except
    /// the root unmounts, with full binder teardown and pool return, so the
    /// restarted forward pass mounts everything from a clean slate.
    fn recreate_mounted_item_map(&mut self) {
        let ids: Vec<UnitId> = self
            .items
            .keys()
            .copied()
            .filter(|id| *id != ROOT_HOST_ID)
            .collect();
        let unmounted = ids.len();
        for id in ids {
            self.unmount_item_recursively(id);
        }
        self.mount_sequence.retain(|id| *id == ROOT_HOST_ID);

        self.reporter.report(
            ReportLevel::Warning,
            CATEGORY_MOUNT,
            "reset mounted item map, remounting from scratch",
            1,
            &[("unmounted", unmounted.to_string())],
        );
    }

    // -------------------------------------------------------------------------
    // Attach / detach
    // -------------------------------------------------------------------------

    fn bind_item(&mut self, id: UnitId) {
        let (node, content, bound) = match self.items.get(&id) {
            Some(item) => (item.node().clone(), item.content().clone(), item.is_bound()),
            None => return,
        };
        if bound {
            return;
        }

        let unit = node.unit().clone();
        let layout_data = node.layout_data().cloned();
        let mut collected = Vec::with_capacity(unit.attach_binders().len());
        {
            let mut c = content.borrow_mut();
            for binder in unit.attach_binders() {
                collected.push(binder.bind(&mut c, &unit, layout_data.as_ref()));
            }
        }
        if let Some(item) = self.items.get_mut(&id) {
            *item.attach_bind_data_mut() = collected;
            item.set_bound(true);
        }
        self.delegate.on_bind_item(&node, &content);
    }

    fn unbind_item(&mut self, id: UnitId) {
        let (node, content, bound) = match self.items.get(&id) {
            Some(item) => (item.node().clone(), item.content().clone(), item.is_bound()),
            None => return,
        };
        if !bound {
            return;
        }

        let unit = node.unit().clone();
        let layout_data = node.layout_data().cloned();
        {
            let mut c = content.borrow_mut();
            for i in (0..unit.attach_binders().len()).rev() {
                let data = self
                    .items
                    .get_mut(&id)
                    .and_then(|item| item.take_attach_bind_data(i));
                unit.attach_binders()[i].unbind(&mut c, &unit, layout_data.as_ref(), data);
            }
        }
        if let Some(item) = self.items.get_mut(&id) {
            item.set_bound(false);
        }
        self.delegate.on_unbind_item(&node, &content);
    }

    /// Bind attach binders for every mounted item (surface became visible).
    pub fn attach(&mut self) {
        let Some(tree) = self.tree.clone() else {
            return;
        };
        for node in tree.nodes().iter().skip(1) {
            if self.items.contains_key(&node.id()) {
                self.bind_item(node.id());
            }
        }
    }

    /// Unbind attach binders for every mounted item, leaving everything
    /// mounted (surface went invisible).
    pub fn detach(&mut self) {
        let Some(tree) = self.tree.clone() else {
            return;
        };
        for node in tree.nodes().iter().skip(1).rev() {
            if self.items.contains_key(&node.id()) {
                self.unbind_item(node.id());
            }
        }
    }

    /// Unmount everything, release extensions, and forget the tree. The
    /// root content itself survives (the embedder owns it) but is emptied
    /// and untracked.
    pub fn unmount_all_items(&mut self) {
        assert!(!self.is_mounting, "unmount_all_items called while mounting");
        if self.items.is_empty() && self.tree.is_none() {
            return;
        }
        self.delegate.start_notify_section();
        self.unmount_item_recursively(ROOT_HOST_ID);
        self.delegate.end_notify_section();
        self.items.remove(&ROOT_HOST_ID);
        self.tree = None;
        self.delegate.unregister_all();
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// Number of mounted items, the root included once mounted.
    pub fn mount_item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_mounted(&self, id: UnitId) -> bool {
        self.items.contains_key(&id)
    }

    pub fn content_of(&self, id: UnitId) -> Option<ContentHandle<C>> {
        self.items.get(&id).map(|item| item.content().clone())
    }

    /// Mounted item at a tree position, if that position is mounted.
    pub fn item_at(&self, index: usize) -> Option<&MountItem<C>> {
        let tree = self.tree.as_ref()?;
        self.items.get(&tree.node_at(index)?.id())
    }

    /// The tree currently mounted, if any.
    pub fn tree(&self) -> Option<&Arc<RenderTree<C>>> {
        self.tree.as_ref()
    }

    pub fn pool(&self) -> &ContentPool<C> {
        &self.pool
    }

    pub fn delegate(&self) -> &MountDelegate<C> {
        &self.delegate
    }
}

// =============================================================================
// Tests
// =============================================================================
