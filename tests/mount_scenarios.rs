//! Mount reconciliation scenarios against a recording test host.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use parking_lot::Mutex;

use spark_render::telemetry::RecordingReporter;
use spark_render::{
    Binder, ContentAllocator, ContentHandle, ContentPool, ExtensionData, Host, LayoutData,
    LayoutResult, MeasureSpec, MountContent, MountExtension, MountRefs, MountState, Rect,
    RenderTree, RenderType, RenderUnit, ReportLevel, TreeExtension, UnitId, reduce,
};

// =============================================================================
// Recording infrastructure
// =============================================================================

/// Shared event log. Thread-safe because allocators and binders are.
#[derive(Clone, Default)]
struct Log(Arc<Mutex<Vec<String>>>);

impl Log {
    fn push(&self, event: String) {
        self.0.lock().push(event);
    }

    fn events(&self) -> Vec<String> {
        self.0.lock().clone()
    }

    fn clear(&self) {
        self.0.lock().clear();
    }

    fn count_containing(&self, needle: &str) -> usize {
        self.0.lock().iter().filter(|e| e.contains(needle)).count()
    }
}

/// Content object that records everything done to it. Host-capable variants
/// keep a slot-ordered child list.
struct TestContent {
    label: &'static str,
    log: Log,
    bounds: Rect,
    bounds_applied: u32,
    is_host: bool,
    children: Vec<(usize, ContentHandle<TestContent>)>,
}

impl TestContent {
    fn new(label: &'static str, is_host: bool, log: Log) -> Self {
        Self {
            label,
            log,
            bounds: Rect::ZERO,
            bounds_applied: 0,
            is_host,
            children: Vec::new(),
        }
    }
}

impl MountContent for TestContent {
    fn as_host_mut(&mut self) -> Option<&mut dyn Host<Self>> {
        if self.is_host { Some(self) } else { None }
    }

    fn apply_bounds(&mut self, bounds: Rect) {
        self.bounds = bounds;
        self.bounds_applied += 1;
    }
}

impl Host<TestContent> for TestContent {
    fn mount(&mut self, slot: usize, content: ContentHandle<TestContent>, _bounds: Rect) {
        let label = content.borrow().label;
        self.log
            .push(format!("host {}: mount {} at {}", self.label, label, slot));
        self.children.push((slot, content));
        self.children.sort_by_key(|(s, _)| *s);
    }

    fn unmount(&mut self, content: ContentHandle<TestContent>) {
        let label = content.borrow().label;
        self.log.push(format!("host {}: unmount {}", self.label, label));
        self.children.retain(|(_, c)| !Rc::ptr_eq(c, &content));
    }

    fn unmount_at(&mut self, slot: usize, content: ContentHandle<TestContent>) {
        let label = content.borrow().label;
        self.log
            .push(format!("host {}: unmount {} at {}", self.label, label, slot));
        self.children.retain(|(_, c)| !Rc::ptr_eq(c, &content));
    }

    fn move_item(&mut self, content: ContentHandle<TestContent>, from: usize, to: usize) {
        let label = content.borrow().label;
        self.log
            .push(format!("host {}: move {} {}->{}", self.label, label, from, to));
        self.children.retain(|(_, c)| !Rc::ptr_eq(c, &content));
        self.children.push((to, content));
        self.children.sort_by_key(|(s, _)| *s);
    }

    fn mount_item_count(&self) -> usize {
        self.children.len()
    }

    fn mount_item_at(&self, slot: usize) -> Option<ContentHandle<TestContent>> {
        self.children
            .iter()
            .find(|(s, _)| *s == slot)
            .map(|(_, c)| c.clone())
    }

    fn contains(&self, content: &ContentHandle<TestContent>) -> bool {
        self.children.iter().any(|(_, c)| Rc::ptr_eq(c, content))
    }
}

struct TestAllocator {
    label: &'static str,
    is_host: bool,
    log: Log,
}

impl ContentAllocator<TestContent> for TestAllocator {
    fn create_content(&self) -> TestContent {
        self.log.push(format!("create {}", self.label));
        TestContent::new(self.label, self.is_host, self.log.clone())
    }

    fn pool_tag(&self) -> &'static str {
        self.label
    }
}

/// Binder that records bind/unbind and has a fixed should-update answer.
struct LogBinder {
    name: &'static str,
    log: Log,
    updates: bool,
}

impl Binder<TestContent> for LogBinder {
    fn should_update(
        &self,
        _old: &RenderUnit<TestContent>,
        _new: &RenderUnit<TestContent>,
        _old_layout_data: Option<&Arc<LayoutData>>,
        _new_layout_data: Option<&Arc<LayoutData>>,
    ) -> bool {
        self.updates
    }

    fn bind(
        &self,
        _content: &mut TestContent,
        unit: &RenderUnit<TestContent>,
        _layout_data: Option<&Arc<LayoutData>>,
    ) -> Option<spark_render::BindData> {
        self.log.push(format!("{}:bind {}", self.name, unit.id()));
        None
    }

    fn unbind(
        &self,
        _content: &mut TestContent,
        unit: &RenderUnit<TestContent>,
        _layout_data: Option<&Arc<LayoutData>>,
        _bind_data: Option<spark_render::BindData>,
    ) {
        self.log.push(format!("{}:unbind {}", self.name, unit.id()));
    }
}

// =============================================================================
// Tree building helpers
// =============================================================================

fn host_unit(id: UnitId, log: &Log) -> Arc<RenderUnit<TestContent>> {
    Arc::new(RenderUnit::with_id(
        id,
        RenderType::View,
        Arc::new(TestAllocator {
            label: "host",
            is_host: true,
            log: log.clone(),
        }),
    ))
}

fn leaf_unit(id: UnitId, log: &Log) -> Arc<RenderUnit<TestContent>> {
    Arc::new(RenderUnit::with_id(
        id,
        RenderType::Drawable,
        Arc::new(TestAllocator {
            label: "leaf",
            is_host: false,
            log: log.clone(),
        }),
    ))
}

fn tree_of(root: LayoutResult<TestContent>) -> Arc<RenderTree<TestContent>> {
    Arc::new(reduce(
        &root,
        MeasureSpec::Unspecified,
        MeasureSpec::Unspecified,
        &[],
    ))
}

fn tree_with_extensions(
    root: LayoutResult<TestContent>,
    extensions: &[Arc<dyn TreeExtension<TestContent>>],
) -> Arc<RenderTree<TestContent>> {
    Arc::new(reduce(
        &root,
        MeasureSpec::Unspecified,
        MeasureSpec::Unspecified,
        extensions,
    ))
}

fn mount_state(log: &Log) -> MountState<TestContent> {
    let root = Rc::new(RefCell::new(TestContent::new("root", true, log.clone())));
    MountState::new(root, ContentPool::new())
}

/// host(1) containing leaf(2) at slot 0 and leaf(3) at slot 1.
fn host_with_two_leaves(log: &Log) -> LayoutResult<TestContent> {
    LayoutResult::container(100, 100)
        .child(
            LayoutResult::with_unit(host_unit(1, log), 80, 40)
                .at(10, 10)
                .child(LayoutResult::with_unit(leaf_unit(2, log), 20, 20).at(2, 2))
                .child(LayoutResult::with_unit(leaf_unit(3, log), 20, 20).at(40, 2)),
        )
}

// =============================================================================
// Scenarios
// =============================================================================

#[test]
fn test_initial_mount() {
    let log = Log::default();
    let mut state = mount_state(&log);

    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();

    // Root + host + 2 leaves.
    assert_eq!(state.mount_item_count(), 4);
    assert!(state.is_mounted(1));
    assert!(state.is_mounted(2));
    assert!(state.is_mounted(3));

    // Leaves sit in the host's frame: bounds are host-relative.
    let leaf = state.content_of(2).unwrap();
    assert_eq!(leaf.borrow().bounds, Rect::new(2, 2, 20, 20));
    let host = state.content_of(1).unwrap();
    assert_eq!(host.borrow().bounds, Rect::new(10, 10, 80, 40));
    assert_eq!(host.borrow().mount_item_count(), 2);
}

#[test]
fn test_remount_of_same_tree_is_noop() {
    let log = Log::default();
    let mut state = mount_state(&log);
    let tree = tree_of(host_with_two_leaves(&log));

    state.mount(tree.clone()).unwrap();
    log.clear();
    state.mount(tree).unwrap();
    assert!(log.events().is_empty());
}

#[test]
fn test_unmount_symmetry() {
    let log = Log::default();
    let mut state = mount_state(&log);

    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    log.clear();

    // New tree with nothing under the root.
    state.mount(tree_of(LayoutResult::container(100, 100))).unwrap();
    assert_eq!(state.mount_item_count(), 1);
    assert!(!state.is_mounted(1));
    assert!(!state.is_mounted(2));

    // Children leave their host before the host leaves the root.
    let events = log.events();
    let leaf2 = events.iter().position(|e| e.contains("unmount leaf at 0"));
    let leaf3 = events.iter().position(|e| e.contains("unmount leaf at 1"));
    let host = events.iter().position(|e| e.contains("unmount host"));
    assert!(leaf2.is_some() && leaf3.is_some() && host.is_some());
    assert!(leaf2 < host && leaf3 < host);

    // Unmounted content went back to the pool.
    assert_eq!(state.pool().pooled("leaf"), 2);
    assert_eq!(state.pool().pooled("host"), 1);
}

#[test]
fn test_pool_recycles_content() {
    let log = Log::default();
    let mut state = mount_state(&log);

    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    state.mount(tree_of(LayoutResult::container(100, 100))).unwrap();
    log.clear();

    // Remounting the same shapes drains the pool instead of allocating.
    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    assert_eq!(log.count_containing("create"), 0);
}

#[test]
fn test_swap_moves_within_host() {
    let log = Log::default();
    let mut state = mount_state(&log);

    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    let leaf2_before = state.content_of(2).unwrap();
    log.clear();

    // Same ids, slots swapped.
    let swapped = LayoutResult::container(100, 100).child(
        LayoutResult::with_unit(host_unit(1, &log), 80, 40)
            .at(10, 10)
            .child(LayoutResult::with_unit(leaf_unit(3, &log), 20, 20).at(40, 2))
            .child(LayoutResult::with_unit(leaf_unit(2, &log), 20, 20).at(2, 2)),
    );
    state.mount(tree_of(swapped)).unwrap();

    // Two in-place moves; no unmounts, no allocations.
    assert_eq!(log.count_containing("move"), 2);
    assert_eq!(log.count_containing("unmount"), 0);
    assert_eq!(log.count_containing("create"), 0);

    // Identity preserved across the move.
    assert!(Rc::ptr_eq(&leaf2_before, &state.content_of(2).unwrap()));
    assert_eq!(state.mount_item_count(), 4);

    let host = state.content_of(1).unwrap();
    let host_ref = host.borrow();
    assert_eq!(host_ref.mount_item_at(0).unwrap().borrow().label, "leaf");
    assert!(Rc::ptr_eq(&host_ref.mount_item_at(1).unwrap(), &leaf2_before));
}

#[test]
fn test_reparent_forces_remount() {
    let log = Log::default();
    let mut state = mount_state(&log);

    // leaf(3) under host(1).
    let before = LayoutResult::container(100, 100)
        .child(
            LayoutResult::with_unit(host_unit(1, &log), 40, 40)
                .child(LayoutResult::with_unit(leaf_unit(3, &log), 10, 10)),
        )
        .child(LayoutResult::with_unit(host_unit(2, &log), 40, 40).at(50, 0));
    state.mount(tree_of(before)).unwrap();
    log.clear();

    // leaf(3) moves under host(2).
    let after = LayoutResult::container(100, 100)
        .child(LayoutResult::with_unit(host_unit(1, &log), 40, 40))
        .child(
            LayoutResult::with_unit(host_unit(2, &log), 40, 40)
                .at(50, 0)
                .child(LayoutResult::with_unit(leaf_unit(3, &log), 10, 10)),
        );
    state.mount(tree_of(after)).unwrap();

    // Host changed: never a move, always unmount + mount.
    assert_eq!(log.count_containing("move"), 0);
    assert_eq!(log.count_containing(": unmount leaf"), 1);
    assert_eq!(log.count_containing(": mount leaf"), 1);
    assert!(state.is_mounted(3));
    assert!(state.content_of(2).unwrap().borrow().contains(&state.content_of(3).unwrap()));
}

#[test]
fn test_binder_should_update_false_skips_rebind_but_reapplies_bounds() {
    let log = Log::default();
    let mut state = mount_state(&log);

    let quiet_leaf = |log: &Log| {
        Arc::new(
            RenderUnit::with_id(
                5,
                RenderType::Drawable,
                Arc::new(TestAllocator {
                    label: "leaf",
                    is_host: false,
                    log: log.clone(),
                }),
            )
            .with_mount_binder(Arc::new(LogBinder {
                name: "static",
                log: log.clone(),
                updates: false,
            })),
        )
    };

    let before = LayoutResult::container(100, 100)
        .child(LayoutResult::with_unit(quiet_leaf(&log), 10, 10).at(0, 0));
    state.mount(tree_of(before)).unwrap();
    assert_eq!(log.count_containing("static:bind"), 1);
    let applied_before = state.content_of(5).unwrap().borrow().bounds_applied;
    log.clear();

    // New tree, same id, new position: binder stays put, bounds reapply.
    let after = LayoutResult::container(100, 100)
        .child(LayoutResult::with_unit(quiet_leaf(&log), 10, 10).at(7, 7));
    state.mount(tree_of(after)).unwrap();

    assert_eq!(log.count_containing("static:bind"), 0);
    assert_eq!(log.count_containing("static:unbind"), 0);
    let content = state.content_of(5).unwrap();
    assert_eq!(content.borrow().bounds, Rect::new(7, 7, 10, 10));
    assert!(content.borrow().bounds_applied > applied_before);
}

#[test]
fn test_binder_should_update_true_rebinds() {
    let log = Log::default();
    let mut state = mount_state(&log);

    let eager_leaf = |log: &Log| {
        Arc::new(
            RenderUnit::with_id(
                6,
                RenderType::Drawable,
                Arc::new(TestAllocator {
                    label: "leaf",
                    is_host: false,
                    log: log.clone(),
                }),
            )
            .with_mount_binder(Arc::new(LogBinder {
                name: "eager",
                log: log.clone(),
                updates: true,
            })),
        )
    };

    state
        .mount(tree_of(
            LayoutResult::container(100, 100)
                .child(LayoutResult::with_unit(eager_leaf(&log), 10, 10)),
        ))
        .unwrap();
    log.clear();

    state
        .mount(tree_of(
            LayoutResult::container(100, 100)
                .child(LayoutResult::with_unit(eager_leaf(&log), 10, 10)),
        ))
        .unwrap();

    assert_eq!(log.count_containing("eager:unbind"), 1);
    assert_eq!(log.count_containing("eager:bind"), 1);
}

#[test]
fn test_attach_detach_cycle() {
    let log = Log::default();
    let mut state = mount_state(&log);

    let attachable = Arc::new(
        RenderUnit::with_id(
            7,
            RenderType::Drawable,
            Arc::new(TestAllocator {
                label: "leaf",
                is_host: false,
                log: log.clone(),
            }),
        )
        .with_attach_binder(Arc::new(LogBinder {
            name: "attach",
            log: log.clone(),
            updates: true,
        })),
    );

    state
        .mount(tree_of(
            LayoutResult::container(100, 100)
                .child(LayoutResult::with_unit(attachable, 10, 10)),
        ))
        .unwrap();
    // Items bind as part of mounting.
    assert_eq!(log.count_containing("attach:bind"), 1);

    state.detach();
    assert_eq!(log.count_containing("attach:unbind"), 1);
    // Detached but still mounted.
    assert!(state.is_mounted(7));

    state.attach();
    assert_eq!(log.count_containing("attach:unbind"), 1);
    assert_eq!(log.count_containing("attach:bind"), 2);
}

#[test]
fn test_unmount_all_items() {
    let log = Log::default();
    let mut state = mount_state(&log);

    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    assert_eq!(state.mount_item_count(), 4);

    state.unmount_all_items();
    assert_eq!(state.mount_item_count(), 0);
    assert!(state.tree().is_none());
    assert_eq!(state.delegate().extension_count(), 0);

    // A fresh mount works from scratch.
    state.mount(tree_of(host_with_two_leaves(&log))).unwrap();
    assert_eq!(state.mount_item_count(), 4);
}

// =============================================================================
// Gating extension scenarios
// =============================================================================

/// Extension that grants a mount reference to every node except one.
struct GateExtension {
    blocked: UnitId,
}

impl TreeExtension<TestContent> for GateExtension {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn create_mount_extension(&self) -> Option<Box<dyn MountExtension<TestContent>>> {
        Some(Box::new(GateMount {
            blocked: self.blocked,
            acquired: Vec::new(),
        }))
    }
}

struct GateMount {
    blocked: UnitId,
    acquired: Vec<UnitId>,
}

impl MountExtension<TestContent> for GateMount {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn can_prevent_mount(&self) -> bool {
        true
    }

    fn update_mount_refs(
        &mut self,
        refs: &mut MountRefs,
        node: &spark_render::RenderTreeNode<TestContent>,
        _index: usize,
    ) {
        let id = node.id();
        if id != self.blocked && !self.acquired.contains(&id) {
            refs.acquire(id);
            self.acquired.push(id);
        }
    }

    fn on_unregister(&mut self, refs: &mut MountRefs) {
        for id in self.acquired.drain(..) {
            refs.release(id);
        }
    }
}

#[test]
fn test_gated_host_with_ensure_parent_mounted() {
    let log = Log::default();
    let mut state = mount_state(&log);

    // The host is blocked from mounting, its leaf is not. The default
    // policy mounts the host chain anyway.
    let gate: Arc<dyn TreeExtension<TestContent>> = Arc::new(GateExtension { blocked: 1 });
    let tree = tree_with_extensions(host_with_two_leaves(&log), &[gate]);
    state.mount(tree).unwrap();

    assert!(state.is_mounted(1));
    assert!(state.is_mounted(2));
    assert!(state.is_mounted(3));
}

#[test]
fn test_gated_host_without_ensure_parent_mounted_errors() {
    let log = Log::default();
    let mut state = mount_state(&log);
    state.set_ensure_parent_mounted(false);

    let gate: Arc<dyn TreeExtension<TestContent>> = Arc::new(GateExtension { blocked: 1 });
    let tree = tree_with_extensions(host_with_two_leaves(&log), &[gate]);

    match state.mount(tree) {
        Err(spark_render::MountError::HostNotMounted { child, host, .. }) => {
            assert_eq!(child, 2);
            assert_eq!(host, 1);
        }
        other => panic!("expected HostNotMounted, got {other:?}"),
    }
}

#[test]
fn test_gated_leaf_never_mounts() {
    let log = Log::default();
    let mut state = mount_state(&log);

    let gate: Arc<dyn TreeExtension<TestContent>> = Arc::new(GateExtension { blocked: 3 });
    let tree = tree_with_extensions(host_with_two_leaves(&log), &[gate]);
    state.mount(tree).unwrap();

    assert!(state.is_mounted(1));
    assert!(state.is_mounted(2));
    assert!(!state.is_mounted(3));
    assert_eq!(state.mount_item_count(), 3);
}

#[test]
fn test_extension_set_change_reregisters() {
    let log = Log::default();
    let mut state = mount_state(&log);

    let gate: Arc<dyn TreeExtension<TestContent>> = Arc::new(GateExtension { blocked: 999 });

    // Same handle across trees: extension state survives.
    state
        .mount(tree_with_extensions(host_with_two_leaves(&log), &[gate.clone()]))
        .unwrap();
    assert_eq!(state.delegate().extension_count(), 1);
    let refs_before = state.delegate().refs().count(2);
    assert_eq!(refs_before, 1);

    let shrunk = LayoutResult::container(100, 100).child(
        LayoutResult::with_unit(host_unit(1, &log), 80, 40)
            .child(LayoutResult::with_unit(leaf_unit(2, &log), 20, 20)),
    );
    state
        .mount(tree_with_extensions(shrunk, &[gate.clone()]))
        .unwrap();
    // Still one reference: no double-acquire across passes.
    assert_eq!(state.delegate().refs().count(2), 1);

    // Different extension set: teardown and fresh registration.
    let other: Arc<dyn TreeExtension<TestContent>> = Arc::new(GateExtension { blocked: 999 });
    state
        .mount(tree_with_extensions(host_with_two_leaves(&log), &[other]))
        .unwrap();
    assert_eq!(state.delegate().extension_count(), 1);
    assert_eq!(state.delegate().refs().count(2), 1);
}

// =============================================================================
// Nested remount scenarios
// =============================================================================

/// Extension whose after_mount keeps handing back queued follow-up trees.
struct RestlessExtension {
    queue: Arc<Mutex<Vec<Arc<RenderTree<TestContent>>>>>,
}

impl TreeExtension<TestContent> for RestlessExtension {
    fn name(&self) -> &'static str {
        "restless"
    }

    fn create_mount_extension(&self) -> Option<Box<dyn MountExtension<TestContent>>> {
        Some(Box::new(RestlessMount {
            queue: self.queue.clone(),
        }))
    }
}

struct RestlessMount {
    queue: Arc<Mutex<Vec<Arc<RenderTree<TestContent>>>>>,
}

impl MountExtension<TestContent> for RestlessMount {
    fn after_mount(&mut self) -> Option<Arc<RenderTree<TestContent>>> {
        self.queue.lock().pop()
    }
}

#[test]
fn test_nested_remount_hits_retry_ceiling() {
    let log = Log::default();
    let reporter = Arc::new(RecordingReporter::new());
    let queue = Arc::new(Mutex::new(Vec::new()));
    let ext: Arc<dyn TreeExtension<TestContent>> = Arc::new(RestlessExtension {
        queue: queue.clone(),
    });

    let trees: Vec<_> = (0..5)
        .map(|_| tree_with_extensions(host_with_two_leaves(&log), &[ext.clone()]))
        .collect();
    // Popped back-to-front: trees[1] is requested first.
    *queue.lock() = vec![
        trees[4].clone(),
        trees[3].clone(),
        trees[2].clone(),
        trees[1].clone(),
    ];

    let root = Rc::new(RefCell::new(TestContent::new("root", true, log.clone())));
    let mut state = MountState::with_reporter(root, ContentPool::new(), reporter.clone());
    state.mount(trees[0].clone()).unwrap();

    // Two follow-up passes ran, then the ceiling fired and trees[3] was
    // abandoned without mounting.
    assert!(state.tree().is_some_and(|t| Arc::ptr_eq(t, &trees[2])));
    assert_eq!(queue.lock().len(), 1);
    assert_eq!(reporter.count_at_least(ReportLevel::Error), 1);
    assert!(reporter.reports().iter().any(|(level, _, message)| {
        *level == ReportLevel::Error && message.contains("retry ceiling")
    }));

    // The pass that won is consistently mounted.
    assert_eq!(state.mount_item_count(), 4);
    assert!(state.is_mounted(1));
    assert!(state.is_mounted(2));
    assert!(state.is_mounted(3));
}

// =============================================================================
// Extension data via layout visitors
// =============================================================================

struct CountingExtension;

struct CountingVisitor {
    count: usize,
}

impl spark_render::LayoutVisitor<TestContent> for CountingVisitor {
    fn visit(&mut self, _result: &LayoutResult<TestContent>, _absolute_bounds: Rect) {
        self.count += 1;
    }

    fn finish(self: Box<Self>) -> Option<ExtensionData> {
        Some(Arc::new(self.count))
    }
}

impl TreeExtension<TestContent> for CountingExtension {
    fn name(&self) -> &'static str {
        "counting"
    }

    fn create_layout_visitor(&self) -> Option<Box<dyn spark_render::LayoutVisitor<TestContent>>> {
        Some(Box::new(CountingVisitor { count: 0 }))
    }
}

#[test]
fn test_visitor_data_rides_the_tree() {
    let log = Log::default();
    let ext: Arc<dyn TreeExtension<TestContent>> = Arc::new(CountingExtension);
    let tree = tree_with_extensions(host_with_two_leaves(&log), &[ext]);

    let results = tree.extension_results();
    assert_eq!(results.len(), 1);
    let count = results[0]
        .data
        .as_ref()
        .and_then(|d| d.clone().downcast::<usize>().ok())
        .map(|c| *c)
        .unwrap();
    // Root container + host + two leaves = four layout results visited.
    assert_eq!(count, 4);
}
