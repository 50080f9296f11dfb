//! RenderState - the versioned resolve/layout pipeline.
//!
//! Owns everything between "a state update was enqueued" and "a render tree
//! is safe to hand to the mount engine":
//!
//! 1. **Resolve** - apply pending state updates, run the resolve function,
//!    commit the resolved node tree under a strictly increasing version.
//! 2. **Layout** - measure the committed node tree under the current size
//!    constraints, reduce it to a [`RenderTree`], commit under its own
//!    version counter.
//! 3. **Promote** - publish the committed result to the UI-confined slot,
//!    marshalling onto the UI thread via the [`Scheduler`] when needed.
//!
//! Either step may run on any thread; version gating at commit guarantees
//! the pipeline never moves back in time no matter which thread finishes
//! first. Stale results are discarded, not errors.
//!
//! [`RenderTree`]: crate::tree::RenderTree
//! [`Scheduler`]: crate::scheduler::Scheduler

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::mount::extension::TreeExtension;
use crate::pipeline::future::TreeFuture;
use crate::scheduler::{Scheduler, TaskId};
use crate::telemetry::{CATEGORY_PIPELINE, ReportLevel, SharedReporter, default_reporter};
use crate::tree::node::{LayoutContext, Node, PendingUpdate, ResolvedTree, TreeState};
use crate::tree::reducer::reduce;
use crate::tree::render_tree::RenderTree;
use crate::types::{MeasureSpec, Size, specs_compatible};

// =============================================================================
// Resolve Function
// =============================================================================

/// Produces the next node tree from the previous one plus committed state.
///
/// Runs on whichever thread forces the resolve computation; must be pure
/// with respect to its inputs.
pub trait ResolveFunction<C>: Send + Sync {
    fn resolve(&self, current: Option<&Arc<dyn Node<C>>>, state: &TreeState) -> Arc<dyn Node<C>>;
}

impl<C, F> ResolveFunction<C> for F
where
    F: Fn(Option<&Arc<dyn Node<C>>>, &TreeState) -> Arc<dyn Node<C>> + Send + Sync,
{
    fn resolve(&self, current: Option<&Arc<dyn Node<C>>>, state: &TreeState) -> Arc<dyn Node<C>> {
        self(current, state)
    }
}

// =============================================================================
// RenderResult
// =============================================================================

/// A committed layout output: the flattened tree, the resolved tree it was
/// measured from, and the constraints it was measured under.
pub struct RenderResult<C> {
    pub tree: Arc<RenderTree<C>>,
    pub resolved: Arc<ResolvedTree<C>>,
    pub width_spec: MeasureSpec,
    pub height_spec: MeasureSpec,
}

impl<C> RenderResult<C> {
    /// Whether this result satisfies the given constraints without a new
    /// layout pass.
    pub fn is_compatible(&self, width_spec: MeasureSpec, height_spec: MeasureSpec) -> bool {
        specs_compatible(
            width_spec,
            height_spec,
            self.width_spec,
            self.height_spec,
            self.tree.size(),
        )
    }
}

/// Observer of UI promotions. Called on the UI-confined thread, once per
/// newly promoted result; typically the embedder mounts from here.
pub trait TreePromotedListener<C>: Send + Sync {
    fn on_tree_promoted(&self, result: &Arc<RenderResult<C>>);
}

// =============================================================================
// RenderState
// =============================================================================

struct Inner<C> {
    resolve_fn: Option<Arc<dyn ResolveFunction<C>>>,
    listener: Option<Arc<dyn TreePromotedListener<C>>>,

    /// Updates waiting for the next resolve pass.
    pending: Vec<PendingUpdate>,
    flush_task: Option<TaskId>,

    committed: Option<Arc<ResolvedTree<C>>>,
    committed_resolve_version: u64,
    next_resolve_version: u64,

    width_spec: Option<MeasureSpec>,
    height_spec: Option<MeasureSpec>,

    committed_result: Option<Arc<RenderResult<C>>>,
    committed_layout_version: u64,
    next_layout_version: u64,

    /// Latest in-flight computations, kept so supersession can cancel them.
    resolve_future: Option<Arc<TreeFuture<Arc<ResolvedTree<C>>>>>,
    layout_future: Option<Arc<TreeFuture<Arc<RenderResult<C>>>>>,

    /// The one result the UI thread is allowed to see.
    ui_result: Option<Arc<RenderResult<C>>>,
    promote_task: Option<TaskId>,
}

/// The pipeline driver. Constructed via [`RenderState::new`], always held
/// behind an `Arc` so scheduled tasks can call back into it.
pub struct RenderState<C: 'static> {
    weak: Weak<RenderState<C>>,
    inner: Mutex<Inner<C>>,
    scheduler: Arc<dyn Scheduler>,
    reporter: SharedReporter,
    extensions: Vec<Arc<dyn TreeExtension<C>>>,
}

impl<C: 'static> RenderState<C> {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        extensions: Vec<Arc<dyn TreeExtension<C>>>,
    ) -> Arc<Self> {
        Self::with_reporter(scheduler, extensions, default_reporter())
    }

    pub fn with_reporter(
        scheduler: Arc<dyn Scheduler>,
        extensions: Vec<Arc<dyn TreeExtension<C>>>,
        reporter: SharedReporter,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            weak: weak.clone(),
            inner: Mutex::new(Inner {
                resolve_fn: None,
                listener: None,
                pending: Vec::new(),
                flush_task: None,
                committed: None,
                committed_resolve_version: 0,
                next_resolve_version: 1,
                width_spec: None,
                height_spec: None,
                committed_result: None,
                committed_layout_version: 0,
                next_layout_version: 1,
                resolve_future: None,
                layout_future: None,
                ui_result: None,
                promote_task: None,
            }),
            scheduler,
            reporter,
            extensions,
        })
    }

    pub fn set_listener(&self, listener: Arc<dyn TreePromotedListener<C>>) {
        self.inner.lock().listener = Some(listener);
    }

    /// Install (or replace) the resolve function and immediately resolve at
    /// a fresh version on the calling thread.
    pub fn set_tree(&self, resolve_fn: Arc<dyn ResolveFunction<C>>) {
        self.inner.lock().resolve_fn = Some(resolve_fn);
        self.request_resolve();
    }

    /// Queue a state update from any thread. Updates are batched: the first
    /// enqueue schedules a single flush task, later enqueues ride along.
    pub fn enqueue_state_update(&self, update: PendingUpdate) {
        let flush = {
            let mut inner = self.inner.lock();
            inner.pending.push(update);
            if inner.resolve_fn.is_none() || inner.flush_task.is_some() {
                None
            } else {
                let id = TaskId::next();
                inner.flush_task = Some(id);
                Some(id)
            }
        };
        if let Some(id) = flush {
            let weak = self.weak.clone();
            self.scheduler.post(
                id,
                Box::new(move || {
                    if let Some(state) = weak.upgrade() {
                        state.flush_updates();
                    }
                }),
            );
        }
    }

    fn flush_updates(&self) {
        {
            let mut inner = self.inner.lock();
            inner.flush_task = None;
            if inner.pending.is_empty() {
                return;
            }
        }
        self.request_resolve();
    }

    /// Set the size constraints layout runs under. A change triggers a new
    /// layout pass against the committed resolved tree.
    pub fn set_size_specs(&self, width_spec: MeasureSpec, height_spec: MeasureSpec) {
        {
            let mut inner = self.inner.lock();
            if inner.width_spec == Some(width_spec) && inner.height_spec == Some(height_spec) {
                return;
            }
            inner.width_spec = Some(width_spec);
            inner.height_spec = Some(height_spec);
            if inner.committed.is_none() {
                return;
            }
        }
        self.request_layout();
    }

    // -------------------------------------------------------------------------
    // Resolve
    // -------------------------------------------------------------------------

    fn request_resolve(&self) {
        let (future, applied_ids) = {
            let mut inner = self.inner.lock();
            let Some(resolve_fn) = inner.resolve_fn.clone() else {
                return;
            };
            let version = inner.next_resolve_version;
            inner.next_resolve_version += 1;

            let previous = inner.committed.clone();
            let updates = inner.pending.clone();
            let applied_ids: Vec<u64> = updates.iter().map(|u| u.id()).collect();

            // A newer resolve supersedes any unclaimed older one.
            if let Some(old) = inner.resolve_future.take() {
                old.cancel();
            }

            let future = Arc::new(TreeFuture::new(version, move || {
                let mut state = previous
                    .as_ref()
                    .map(|tree| tree.state.clone())
                    .unwrap_or_default();
                for update in &updates {
                    update.apply(&mut state);
                }
                let root = resolve_fn.resolve(previous.as_ref().map(|tree| &tree.root), &state);
                Arc::new(ResolvedTree::new(root, state))
            }));
            inner.resolve_future = Some(future.clone());
            (future, applied_ids)
        };

        if let Some(resolved) = future.run_and_get() {
            self.commit_resolve(future.version(), resolved, &applied_ids);
        }
    }

    /// Version gate: only a strictly newer resolve may land.
    fn commit_resolve(
        &self,
        version: u64,
        resolved: Arc<ResolvedTree<C>>,
        applied_ids: &[u64],
    ) -> bool {
        let has_specs = {
            let mut inner = self.inner.lock();
            if version <= inner.committed_resolve_version {
                let committed = inner.committed_resolve_version;
                drop(inner);
                self.reporter.report(
                    ReportLevel::Debug,
                    CATEGORY_PIPELINE,
                    "discarded stale resolve result",
                    1,
                    &[
                        ("version", version.to_string()),
                        ("committed_version", committed.to_string()),
                    ],
                );
                return false;
            }
            inner.committed = Some(resolved);
            inner.committed_resolve_version = version;
            // Only the updates this pass actually applied leave the queue.
            inner.pending.retain(|u| !applied_ids.contains(&u.id()));
            inner.width_spec.is_some() && inner.height_spec.is_some()
        };
        if has_specs {
            self.request_layout();
        }
        true
    }

    // -------------------------------------------------------------------------
    // Layout
    // -------------------------------------------------------------------------

    fn request_layout(&self) {
        let future = {
            let mut inner = self.inner.lock();
            let Some(resolved) = inner.committed.clone() else {
                return;
            };
            let (Some(width_spec), Some(height_spec)) = (inner.width_spec, inner.height_spec)
            else {
                return;
            };

            // Reuse: an equivalent node tree under compatible constraints
            // measures identically, so the previous result stands verbatim.
            // No commit happens (the tree reference did not change); we only
            // make sure the result is promoted.
            if let Some(result) = &inner.committed_result {
                if result.is_compatible(width_spec, height_spec)
                    && result.resolved.root.equivalent(resolved.root.as_ref())
                {
                    drop(inner);
                    self.request_promote();
                    return;
                }
            }

            let version = inner.next_layout_version;
            inner.next_layout_version += 1;

            if let Some(old) = inner.layout_future.take() {
                old.cancel();
            }

            let extensions = self.extensions.clone();
            let future = Arc::new(TreeFuture::new(version, move || {
                let mut ctx = LayoutContext::new();
                let layout = resolved.root.measure(&mut ctx, width_spec, height_spec);
                let tree = Arc::new(reduce(&layout, width_spec, height_spec, &extensions));
                Arc::new(RenderResult {
                    tree,
                    resolved,
                    width_spec,
                    height_spec,
                })
            }));
            inner.layout_future = Some(future.clone());
            future
        };

        if let Some(result) = future.run_and_get() {
            self.commit_layout(future.version(), result);
        }
    }

    /// Version gate for layout: strictly newer version AND a changed tree
    /// reference.
    fn commit_layout(&self, version: u64, result: Arc<RenderResult<C>>) -> bool {
        {
            let mut inner = self.inner.lock();
            let unchanged = inner
                .committed_result
                .as_ref()
                .is_some_and(|r| Arc::ptr_eq(&r.tree, &result.tree));
            if version <= inner.committed_layout_version || unchanged {
                let committed = inner.committed_layout_version;
                drop(inner);
                self.reporter.report(
                    ReportLevel::Debug,
                    CATEGORY_PIPELINE,
                    "discarded stale layout result",
                    1,
                    &[
                        ("version", version.to_string()),
                        ("committed_version", committed.to_string()),
                    ],
                );
                return false;
            }
            inner.committed_result = Some(result);
            inner.committed_layout_version = version;
        }
        self.request_promote();
        true
    }

    // -------------------------------------------------------------------------
    // Promotion
    // -------------------------------------------------------------------------

    fn request_promote(&self) {
        if self.scheduler.is_ui_thread() {
            self.promote_committed();
            return;
        }
        let id = {
            let mut inner = self.inner.lock();
            if inner.promote_task.is_some() {
                return;
            }
            let id = TaskId::next();
            inner.promote_task = Some(id);
            id
        };
        let weak = self.weak.clone();
        // Promotion jumps the queue: a freshly computed frame should not
        // wait behind ordinary UI work.
        self.scheduler.post_at_front(
            id,
            Box::new(move || {
                if let Some(state) = weak.upgrade() {
                    state.promote_committed();
                }
            }),
        );
    }

    fn promote_committed(&self) {
        debug_assert!(
            self.scheduler.is_ui_thread(),
            "promotion must run on the UI thread"
        );
        let (result, listener) = {
            let mut inner = self.inner.lock();
            inner.promote_task = None;
            let Some(result) = inner.committed_result.clone() else {
                return;
            };
            if inner
                .ui_result
                .as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, &result))
            {
                return;
            }
            inner.ui_result = Some(result.clone());
            (result, inner.listener.clone())
        };
        if let Some(listener) = listener {
            listener.on_tree_promoted(&result);
        }
    }

    // -------------------------------------------------------------------------
    // Measure
    // -------------------------------------------------------------------------

    /// Synchronous measure from the UI thread: returns the size the tree
    /// takes under these constraints, forcing any outstanding pipeline
    /// steps inline if no compatible result exists yet.
    pub fn measure(&self, width_spec: MeasureSpec, height_spec: MeasureSpec) -> Size {
        debug_assert!(
            self.scheduler.is_ui_thread(),
            "measure must run on the UI thread"
        );

        let mut needs_resolve = false;
        {
            let mut inner = self.inner.lock();
            if let Some(ui) = &inner.ui_result {
                if ui.is_compatible(width_spec, height_spec) {
                    return ui.tree.size();
                }
            }
            let committed_fits = inner
                .committed_result
                .as_ref()
                .is_some_and(|r| r.is_compatible(width_spec, height_spec));
            if committed_fits {
                drop(inner);
                // Compatible result exists but was never promoted; adopt it.
                self.promote_committed();
                let inner = self.inner.lock();
                return inner
                    .ui_result
                    .as_ref()
                    .map(|r| r.tree.size())
                    .unwrap_or(Size::ZERO);
            }
            if inner.resolve_fn.is_none() {
                return Size::ZERO;
            }
            inner.width_spec = Some(width_spec);
            inner.height_spec = Some(height_spec);
            if inner.committed.is_none() {
                needs_resolve = true;
            }
        }

        // Force the missing steps on this thread. Commit triggers layout,
        // layout triggers promotion, and we are already on the UI thread, so
        // the whole chain lands synchronously.
        if needs_resolve {
            self.request_resolve();
        } else {
            self.request_layout();
        }

        let inner = self.inner.lock();
        inner
            .ui_result
            .as_ref()
            .or(inner.committed_result.as_ref())
            .map(|r| r.tree.size())
            .unwrap_or(Size::ZERO)
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    /// The promoted result, if any. UI-thread reads only.
    pub fn ui_result(&self) -> Option<Arc<RenderResult<C>>> {
        self.inner.lock().ui_result.clone()
    }

    /// The latest committed (not necessarily promoted) result.
    pub fn committed_result(&self) -> Option<Arc<RenderResult<C>>> {
        self.inner.lock().committed_result.clone()
    }

    /// The latest committed resolve output, before any layout.
    pub fn committed_resolved(&self) -> Option<Arc<ResolvedTree<C>>> {
        self.inner.lock().committed.clone()
    }

    pub fn committed_resolve_version(&self) -> u64 {
        self.inner.lock().committed_resolve_version
    }

    pub fn committed_layout_version(&self) -> u64 {
        self.inner.lock().committed_layout_version
    }

    /// Number of updates still waiting for a resolve pass.
    pub fn pending_update_count(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::scheduler::{InlineScheduler, QueueScheduler};
    use crate::telemetry::RecordingReporter;
    use crate::tree::node::LayoutResult;

    const SIZE_KEY: u64 = 1;

    /// Leaf node measuring to a fixed size, read from hook state when set.
    struct FixedNode {
        width: i32,
        height: i32,
    }

    impl Node<()> for FixedNode {
        fn measure(
            &self,
            _ctx: &mut LayoutContext,
            width_spec: MeasureSpec,
            height_spec: MeasureSpec,
        ) -> LayoutResult<()> {
            LayoutResult::container(width_spec.resolve(self.width), height_spec.resolve(self.height))
        }

        fn equivalent(&self, other: &dyn Node<()>) -> bool {
            other
                .as_any()
                .downcast_ref::<FixedNode>()
                .is_some_and(|o| o.width == self.width && o.height == self.height)
        }
    }

    fn fixed_resolver(width: i32, height: i32) -> Arc<dyn ResolveFunction<()>> {
        Arc::new(
            move |_current: Option<&Arc<dyn Node<()>>>, state: &TreeState| {
                let height = state
                    .get::<i32>(SIZE_KEY)
                    .map(|h| *h)
                    .unwrap_or(height);
                Arc::new(FixedNode { width, height }) as Arc<dyn Node<()>>
            },
        )
    }

    fn pipeline() -> Arc<RenderState<()>> {
        RenderState::new(Arc::new(InlineScheduler::new()), Vec::new())
    }

    #[test]
    fn test_set_tree_resolves_at_version_one() {
        let state = pipeline();
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(state.committed_resolve_version(), 1);
        // No size specs yet: layout has not run.
        assert_eq!(state.committed_layout_version(), 0);
    }

    #[test]
    fn test_specs_then_tree_produce_promoted_result() {
        let state = pipeline();
        state.set_size_specs(MeasureSpec::Exactly(80), MeasureSpec::Unspecified);
        state.set_tree(fixed_resolver(10, 20));

        let ui = state.ui_result().unwrap();
        assert_eq!(ui.tree.size(), Size::new(80, 20));
        assert_eq!(state.committed_layout_version(), 1);
    }

    #[test]
    fn test_measure_forces_full_chain() {
        let state = pipeline();
        state.set_tree(fixed_resolver(10, 20));

        let size = state.measure(MeasureSpec::Unspecified, MeasureSpec::Unspecified);
        assert_eq!(size, Size::new(10, 20));
        assert!(state.ui_result().is_some());
    }

    #[test]
    fn test_measure_without_tree_is_zero() {
        let state = pipeline();
        let size = state.measure(MeasureSpec::Exactly(5), MeasureSpec::Exactly(5));
        assert_eq!(size, Size::ZERO);
    }

    #[test]
    fn test_stale_resolve_discarded() {
        let reporter = Arc::new(RecordingReporter::new());
        let state = RenderState::<()>::with_reporter(
            Arc::new(InlineScheduler::new()),
            Vec::new(),
            reporter.clone(),
        );
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(state.committed_resolve_version(), 1);

        // An older in-flight pass finishing late must not win.
        let late = Arc::new(ResolvedTree::new(
            Arc::new(FixedNode {
                width: 1,
                height: 1,
            }) as Arc<dyn Node<()>>,
            TreeState::new(),
        ));
        assert!(!state.commit_resolve(0, late, &[]));
        assert_eq!(state.committed_resolve_version(), 1);
        assert!(!reporter.reports().is_empty());
    }

    #[test]
    fn test_state_update_flushes_and_applies() {
        let state = pipeline();
        state.set_size_specs(MeasureSpec::Unspecified, MeasureSpec::Unspecified);
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(state.ui_result().unwrap().tree.size(), Size::new(10, 20));

        state.enqueue_state_update(PendingUpdate::new(|s| s.set(SIZE_KEY, 50i32)));
        // Inline scheduler: the flush already ran.
        assert_eq!(state.pending_update_count(), 0);
        assert_eq!(state.committed_resolve_version(), 2);
        assert_eq!(state.ui_result().unwrap().tree.size(), Size::new(10, 50));
    }

    #[test]
    fn test_equivalent_tree_reuses_layout() {
        let state = pipeline();
        state.set_size_specs(MeasureSpec::Unspecified, MeasureSpec::Unspecified);
        state.set_tree(fixed_resolver(10, 20));
        let first = state.ui_result().unwrap();
        assert_eq!(state.committed_layout_version(), 1);

        // Re-resolving to an equivalent tree must not produce a new layout.
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(state.committed_resolve_version(), 2);
        assert_eq!(state.committed_layout_version(), 1);
        assert!(Arc::ptr_eq(&state.ui_result().unwrap(), &first));
    }

    #[test]
    fn test_promotion_defers_to_ui_thread() {
        let scheduler = Arc::new(QueueScheduler::new());
        let state = RenderState::<()>::new(scheduler.clone(), Vec::new());
        state.set_size_specs(MeasureSpec::Unspecified, MeasureSpec::Unspecified);

        let worker_state = state.clone();
        std::thread::spawn(move || {
            worker_state.set_tree(fixed_resolver(10, 20));
        })
        .join()
        .unwrap();

        // Committed off-thread, not yet promoted.
        assert!(state.committed_result().is_some());
        assert!(state.ui_result().is_none());
        assert_eq!(scheduler.pending(), 1);

        scheduler.pump();
        assert_eq!(state.ui_result().unwrap().tree.size(), Size::new(10, 20));
    }

    #[test]
    fn test_listener_fires_once_per_promotion() {
        struct Counting(AtomicUsize);
        impl TreePromotedListener<()> for Counting {
            fn on_tree_promoted(&self, _result: &Arc<RenderResult<()>>) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let state = pipeline();
        let listener = Arc::new(Counting(AtomicUsize::new(0)));
        state.set_listener(listener.clone());

        state.set_size_specs(MeasureSpec::Unspecified, MeasureSpec::Unspecified);
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);

        // Equivalent tree: reuse path re-requests promotion, but the result
        // is unchanged, so the listener stays quiet.
        state.set_tree(fixed_resolver(10, 20));
        assert_eq!(listener.0.load(Ordering::SeqCst), 1);

        state.enqueue_state_update(PendingUpdate::new(|s| s.set(SIZE_KEY, 99i32)));
        assert_eq!(listener.0.load(Ordering::SeqCst), 2);
    }
}
