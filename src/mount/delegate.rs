//! MountDelegate - fan-out point between the mount engine and extensions.
//!
//! Holds the mount extensions instantiated for the current tree's extension
//! set, the shared mount reference counts, and the visible-bounds
//! notification batcher. Callbacks always run in extension registration
//! order.

use std::sync::Arc;

use crate::mount::extension::{ExtensionData, ExtensionResult, MountExtension, TreeExtension};
use crate::mount::host::ContentHandle;
use crate::tree::render_tree::{RenderTree, RenderTreeNode};
use crate::types::{Rect, UnitId};
use rustc_hash::FxHashMap;

// =============================================================================
// MountRefs
// =============================================================================

/// Per-unit mount reference counts, shared by all registered extensions.
///
/// A unit with a positive count is mountable; extensions acquire and release
/// references from their callbacks. Releases must balance acquires exactly.
#[derive(Default)]
pub struct MountRefs {
    counts: FxHashMap<UnitId, u32>,
}

impl MountRefs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&mut self, id: UnitId) {
        *self.counts.entry(id).or_insert(0) += 1;
    }

    /// Release one reference. An unbalanced release is a programming error
    /// in an extension and fatal.
    pub fn release(&mut self, id: UnitId) {
        match self.counts.get_mut(&id) {
            Some(count) if *count > 0 => {
                *count -= 1;
                if *count == 0 {
                    self.counts.remove(&id);
                }
            }
            _ => panic!("unbalanced mount reference release for unit {id}"),
        }
    }

    pub fn count(&self, id: UnitId) -> u32 {
        self.counts.get(&id).copied().unwrap_or(0)
    }

    /// Whether the unit holds at least one reference.
    #[inline]
    pub fn is_positive(&self, id: UnitId) -> bool {
        self.count(id) > 0
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.counts.clear();
    }
}

// =============================================================================
// MountDelegate
// =============================================================================

struct Slot<C> {
    /// The shared handle this mount extension was instantiated from.
    source: Arc<dyn TreeExtension<C>>,
    extension: Box<dyn MountExtension<C>>,
    data: Option<ExtensionData>,
}

/// Extension registry plus reference counts for one mount engine.
pub struct MountDelegate<C> {
    slots: Vec<Slot<C>>,
    refs: MountRefs,
    /// True when any registered extension participates in mount gating.
    ref_counting: bool,
    unmount_delegate: Option<usize>,
    /// Nesting depth of the current notification section.
    notify_depth: u32,
    deferred_visible: Vec<UnitId>,
}

impl<C> MountDelegate<C> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            refs: MountRefs::new(),
            ref_counting: false,
            unmount_delegate: None,
            notify_depth: 0,
            deferred_visible: Vec::new(),
        }
    }

    /// Tear down the current extensions and instantiate mount extensions for
    /// a new extension set.
    pub fn register(&mut self, results: &[ExtensionResult<C>]) {
        self.unregister_all();
        for result in results {
            if let Some(extension) = result.extension.create_mount_extension() {
                if extension.is_unmount_delegate() {
                    assert!(
                        self.unmount_delegate.is_none(),
                        "at most one extension may be the unmount delegate"
                    );
                    self.unmount_delegate = Some(self.slots.len());
                }
                self.ref_counting |= extension.can_prevent_mount();
                self.slots.push(Slot {
                    source: result.extension.clone(),
                    extension,
                    data: result.data.clone(),
                });
            }
        }
    }

    /// Unregister every extension, giving each a chance to release its
    /// references first.
    pub fn unregister_all(&mut self) {
        for slot in &mut self.slots {
            slot.extension.on_unregister(&mut self.refs);
        }
        self.slots.clear();
        self.refs.clear();
        self.ref_counting = false;
        self.unmount_delegate = None;
        self.deferred_visible.clear();
    }

    /// Swap in fresh reduce-time data for an already-registered extension
    /// set. Results match slots by handle identity; only extensions with a
    /// mount side occupy slots, in registration order. Factories are not
    /// invoked again.
    pub fn update_data(&mut self, results: &[ExtensionResult<C>]) {
        let mut slot_index = 0;
        for result in results {
            let Some(slot) = self.slots.get_mut(slot_index) else {
                break;
            };
            if Arc::ptr_eq(&slot.source, &result.extension) {
                slot.data = result.data.clone();
                slot_index += 1;
            }
        }
    }

    pub fn extension_count(&self) -> usize {
        self.slots.len()
    }

    pub fn refs(&self) -> &MountRefs {
        &self.refs
    }

    // -------------------------------------------------------------------------
    // Mount gating
    // -------------------------------------------------------------------------

    /// Decide mountability for one node.
    ///
    /// Fast path: with no gating extension registered, everything is
    /// mountable and no callbacks run. Otherwise every extension gets a
    /// chance to adjust the node's references, then the count decides.
    pub fn maybe_lock_for_mount(&mut self, node: &RenderTreeNode<C>, index: usize) -> bool {
        if !self.ref_counting {
            return true;
        }
        for slot in &mut self.slots {
            slot.extension.update_mount_refs(&mut self.refs, node, index);
        }
        self.refs.is_positive(node.id())
    }

    // -------------------------------------------------------------------------
    // Lifecycle fan-out
    // -------------------------------------------------------------------------

    pub fn before_mount(&mut self, tree: &RenderTree<C>) {
        for slot in &mut self.slots {
            slot.extension
                .before_mount(&mut self.refs, tree, slot.data.as_ref());
        }
    }

    /// Fan out pass completion. When extensions hand back follow-up trees,
    /// the last one wins.
    pub fn after_mount(&mut self) -> Option<Arc<RenderTree<C>>> {
        let mut request = None;
        for slot in &mut self.slots {
            if let Some(tree) = slot.extension.after_mount() {
                request = Some(tree);
            }
        }
        request
    }

    pub fn on_mount_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {
        for slot in &mut self.slots {
            slot.extension.on_mount_item(node, content);
        }
    }

    pub fn on_unmount_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {
        for slot in &mut self.slots {
            slot.extension.on_unmount_item(node, content);
        }
    }

    pub fn on_bind_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {
        for slot in &mut self.slots {
            slot.extension.on_bind_item(node, content);
        }
    }

    pub fn on_unbind_item(&mut self, node: &RenderTreeNode<C>, content: &ContentHandle<C>) {
        for slot in &mut self.slots {
            slot.extension.on_unbind_item(node, content);
        }
    }

    pub fn on_bounds_applied(&mut self, node: &RenderTreeNode<C>, bounds: Rect) {
        for slot in &mut self.slots {
            slot.extension.on_bounds_applied(node, bounds);
        }
    }

    // -------------------------------------------------------------------------
    // Visible-bounds batching
    // -------------------------------------------------------------------------

    /// Open a notification section. Sections nest; visible-bounds
    /// notifications raised inside are deferred until the outermost section
    /// closes.
    pub fn start_notify_section(&mut self) {
        self.notify_depth += 1;
    }

    /// Close a notification section, flushing deferred notifications when
    /// the outermost one ends.
    pub fn end_notify_section(&mut self) {
        assert!(self.notify_depth > 0, "unbalanced end_notify_section");
        self.notify_depth -= 1;
        if self.notify_depth == 0 {
            let pending = std::mem::take(&mut self.deferred_visible);
            for id in pending {
                for slot in &mut self.slots {
                    slot.extension.on_visible_bounds_changed(id);
                }
            }
        }
    }

    /// Raise a visible-bounds notification, deduplicated and deferred while
    /// a section is open.
    pub fn notify_visible_bounds_changed(&mut self, id: UnitId) {
        if self.notify_depth > 0 {
            if !self.deferred_visible.contains(&id) {
                self.deferred_visible.push(id);
            }
            return;
        }
        for slot in &mut self.slots {
            slot.extension.on_visible_bounds_changed(id);
        }
    }

    // -------------------------------------------------------------------------
    // Unmount delegation
    // -------------------------------------------------------------------------

    /// Route an unmount through the designated delegate if it claims the
    /// item. Returns true when the delegate took over.
    pub fn maybe_delegate_unmount(
        &mut self,
        node: &RenderTreeNode<C>,
        content: &ContentHandle<C>,
    ) -> bool {
        let Some(index) = self.unmount_delegate else {
            return false;
        };
        let slot = &mut self.slots[index];
        if slot.extension.should_delegate_unmount(node) {
            slot.extension.delegate_unmount(node, content);
            true
        } else {
            false
        }
    }
}

impl<C> Default for MountDelegate<C> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use parking_lot::Mutex;

    use super::*;
    use crate::tree::node::LayoutResult;
    use crate::tree::reducer::reduce;
    use crate::types::{MeasureSpec, ROOT_HOST_ID};

    #[test]
    fn test_refs_balance() {
        let mut refs = MountRefs::new();
        refs.acquire(5);
        refs.acquire(5);
        assert_eq!(refs.count(5), 2);
        refs.release(5);
        assert!(refs.is_positive(5));
        refs.release(5);
        assert!(!refs.is_positive(5));
        assert!(refs.is_empty());
    }

    #[test]
    #[should_panic(expected = "unbalanced mount reference release")]
    fn test_unbalanced_release_panics() {
        let mut refs = MountRefs::new();
        refs.release(9);
    }

    struct VisibleRecorder {
        seen: Arc<Mutex<Vec<UnitId>>>,
    }

    impl MountExtension<()> for VisibleRecorder {
        fn on_visible_bounds_changed(&mut self, id: UnitId) {
            self.seen.lock().push(id);
        }
    }

    struct RecorderFactory {
        seen: Arc<Mutex<Vec<UnitId>>>,
    }

    impl TreeExtension<()> for RecorderFactory {
        fn name(&self) -> &'static str {
            "visible-recorder"
        }

        fn create_mount_extension(&self) -> Option<Box<dyn MountExtension<()>>> {
            Some(Box::new(VisibleRecorder {
                seen: self.seen.clone(),
            }))
        }
    }

    #[test]
    fn test_notify_sections_batch_and_dedup() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let factory: Arc<dyn TreeExtension<()>> = Arc::new(RecorderFactory { seen: seen.clone() });

        let mut delegate = MountDelegate::new();
        delegate.register(&[ExtensionResult {
            extension: factory,
            data: None,
        }]);

        delegate.start_notify_section();
        delegate.start_notify_section();
        delegate.notify_visible_bounds_changed(1);
        delegate.notify_visible_bounds_changed(2);
        delegate.notify_visible_bounds_changed(1);
        delegate.end_notify_section();
        // Inner section closed: still deferred.
        assert!(seen.lock().is_empty());

        delegate.end_notify_section();
        assert_eq!(*seen.lock(), vec![1, 2]);

        // Outside any section: immediate.
        delegate.notify_visible_bounds_changed(ROOT_HOST_ID);
        assert_eq!(*seen.lock(), vec![1, 2, ROOT_HOST_ID]);
    }

    struct LayoutOnly;

    impl TreeExtension<()> for LayoutOnly {
        fn name(&self) -> &'static str {
            "layout-only"
        }
    }

    struct DataMount {
        seen: Arc<Mutex<Vec<bool>>>,
    }

    impl MountExtension<()> for DataMount {
        fn before_mount(
            &mut self,
            _refs: &mut MountRefs,
            _tree: &RenderTree<()>,
            data: Option<&ExtensionData>,
        ) {
            self.seen.lock().push(data.is_some());
        }
    }

    struct CountedFactory {
        created: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<bool>>>,
    }

    impl TreeExtension<()> for CountedFactory {
        fn name(&self) -> &'static str {
            "counted"
        }

        fn create_mount_extension(&self) -> Option<Box<dyn MountExtension<()>>> {
            self.created.fetch_add(1, Ordering::SeqCst);
            Some(Box::new(DataMount {
                seen: self.seen.clone(),
            }))
        }
    }

    #[test]
    fn test_update_data_refreshes_without_reinstantiating() {
        let created = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let layout_only: Arc<dyn TreeExtension<()>> = Arc::new(LayoutOnly);
        let counted: Arc<dyn TreeExtension<()>> = Arc::new(CountedFactory {
            created: created.clone(),
            seen: seen.clone(),
        });

        // A mixed set: only the counted extension occupies a slot.
        let mut delegate = MountDelegate::new();
        delegate.register(&[
            ExtensionResult {
                extension: layout_only.clone(),
                data: None,
            },
            ExtensionResult {
                extension: counted.clone(),
                data: None,
            },
        ]);
        assert_eq!(delegate.extension_count(), 1);
        assert_eq!(created.load(Ordering::SeqCst), 1);

        let tree = Arc::new(reduce(
            &LayoutResult::<()>::container(10, 10),
            MeasureSpec::Unspecified,
            MeasureSpec::Unspecified,
            &[],
        ));
        delegate.before_mount(&tree);
        assert_eq!(*seen.lock(), vec![false]);

        // Fresh reduce-time data lands in the right slot, with no new
        // mount-extension instantiation.
        delegate.update_data(&[
            ExtensionResult {
                extension: layout_only,
                data: None,
            },
            ExtensionResult {
                extension: counted,
                data: Some(Arc::new(7usize)),
            },
        ]);
        assert_eq!(created.load(Ordering::SeqCst), 1);
        delegate.before_mount(&tree);
        assert_eq!(*seen.lock(), vec![false, true]);
    }
}
