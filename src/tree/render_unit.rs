//! RenderUnit - stable-identity rendering primitive descriptor.
//!
//! A RenderUnit describes *what* to put on screen without being the content
//! itself: a process-unique id (the reconciliation key), a render-type tag,
//! ordered binder lists, and the capability to allocate the concrete content
//! object. Units are immutable once constructed and are shared between
//! render trees via `Arc`.
//!
//! The content type `C` is carried as a generic parameter through the whole
//! pipeline, so binders and allocators work on the concrete type with no
//! downcasting.

use std::any::Any;
use std::sync::Arc;

use smallvec::SmallVec;

use crate::types::{ROOT_HOST_ID, UnitId, next_unit_id};

// =============================================================================
// Render Type
// =============================================================================

/// Coarse content classification.
///
/// View-like units can host other mounted items; drawable-like units are
/// always leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderType {
    View,
    Drawable,
}

/// The full content type of a unit: the render-type tag plus the allocator's
/// pool bucket. Two units with equal content types produce interchangeable
/// (recyclable) content objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentType {
    pub render_type: RenderType,
    pub pool_tag: &'static str,
}

// =============================================================================
// Capabilities
// =============================================================================

/// Opaque per-unit layout data computed during measurement and made
/// available to binders at bind time.
pub type LayoutData = dyn Any + Send + Sync;

/// Opaque per-binder data returned by `bind` and handed back to `unbind`.
pub type BindData = Box<dyn Any>;

/// Capability to create (and pool) content objects for a unit.
pub trait ContentAllocator<C>: Send + Sync {
    /// Create a fresh content object. Called exactly once per mounted unit
    /// instance when the pool has nothing to offer.
    fn create_content(&self) -> C;

    /// Pool bucket this allocator's content belongs to.
    fn pool_tag(&self) -> &'static str {
        "default"
    }

    /// How many recycled instances the pool should retain for this bucket.
    fn pool_size_hint(&self) -> usize {
        8
    }
}

/// A bind/unbind/should-update triple attached to a RenderUnit.
///
/// Mount binders run at mount/unmount; attach binders run at bind/unbind
/// (attach/detach) and may fire without a mount-level change.
pub trait Binder<C>: Send + Sync {
    /// Whether the transition from `old` to `new` requires an
    /// unbind-then-rebind. Defaults to always updating.
    fn should_update(
        &self,
        _old: &RenderUnit<C>,
        _new: &RenderUnit<C>,
        _old_layout_data: Option<&Arc<LayoutData>>,
        _new_layout_data: Option<&Arc<LayoutData>>,
    ) -> bool {
        true
    }

    /// Apply this binder to freshly mounted or updated content.
    fn bind(
        &self,
        content: &mut C,
        unit: &RenderUnit<C>,
        layout_data: Option<&Arc<LayoutData>>,
    ) -> Option<BindData>;

    /// Reverse a previous `bind`.
    fn unbind(
        &self,
        content: &mut C,
        unit: &RenderUnit<C>,
        layout_data: Option<&Arc<LayoutData>>,
        bind_data: Option<BindData>,
    );

    /// Human-readable name for diagnostics.
    fn description(&self) -> &'static str {
        "binder"
    }
}

// =============================================================================
// RenderUnit
// =============================================================================

/// Immutable rendering primitive descriptor.
pub struct RenderUnit<C> {
    id: UnitId,
    render_type: RenderType,
    // None only for the synthetic root host, whose content the embedder owns.
    allocator: Option<Arc<dyn ContentAllocator<C>>>,
    mount_binders: SmallVec<[Arc<dyn Binder<C>>; 2]>,
    attach_binders: SmallVec<[Arc<dyn Binder<C>>; 2]>,
    description: &'static str,
}

impl<C> RenderUnit<C> {
    /// Create a unit with a freshly allocated id.
    pub fn new(render_type: RenderType, allocator: Arc<dyn ContentAllocator<C>>) -> Self {
        Self::with_id(next_unit_id(), render_type, allocator)
    }

    /// Create a unit with a caller-managed id.
    ///
    /// The id is the reconciliation key: reusing the same id across layout
    /// passes is what lets the mount engine update content in place instead
    /// of recreating it.
    pub fn with_id(
        id: UnitId,
        render_type: RenderType,
        allocator: Arc<dyn ContentAllocator<C>>,
    ) -> Self {
        assert_ne!(id, ROOT_HOST_ID, "id 0 is reserved for the root host");
        Self {
            id,
            render_type,
            allocator: Some(allocator),
            mount_binders: SmallVec::new(),
            attach_binders: SmallVec::new(),
            description: "unit",
        }
    }

    /// The synthetic root host unit. Only the reducer creates this.
    pub(crate) fn root_host() -> Self {
        Self {
            id: ROOT_HOST_ID,
            render_type: RenderType::View,
            allocator: None,
            mount_binders: SmallVec::new(),
            attach_binders: SmallVec::new(),
            description: "root-host",
        }
    }

    /// Append a mount/unmount binder. Binders run in append order.
    pub fn with_mount_binder(mut self, binder: Arc<dyn Binder<C>>) -> Self {
        self.mount_binders.push(binder);
        self
    }

    /// Append an attach/detach binder. Binders run in append order.
    pub fn with_attach_binder(mut self, binder: Arc<dyn Binder<C>>) -> Self {
        self.attach_binders.push(binder);
        self
    }

    /// Set the diagnostic description.
    pub fn with_description(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    #[inline]
    pub fn id(&self) -> UnitId {
        self.id
    }

    #[inline]
    pub fn render_type(&self) -> RenderType {
        self.render_type
    }

    #[inline]
    pub fn is_root_host(&self) -> bool {
        self.id == ROOT_HOST_ID
    }

    /// The content allocator. `None` only for the synthetic root host.
    pub fn allocator(&self) -> Option<&Arc<dyn ContentAllocator<C>>> {
        self.allocator.as_ref()
    }

    /// The content type this unit mounts.
    pub fn content_type(&self) -> ContentType {
        ContentType {
            render_type: self.render_type,
            pool_tag: self
                .allocator
                .as_ref()
                .map(|a| a.pool_tag())
                .unwrap_or("root-host"),
        }
    }

    pub fn mount_binders(&self) -> &[Arc<dyn Binder<C>>] {
        &self.mount_binders
    }

    pub fn attach_binders(&self) -> &[Arc<dyn Binder<C>>] {
        &self.attach_binders
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}

impl<C> std::fmt::Debug for RenderUnit<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderUnit")
            .field("id", &self.id)
            .field("render_type", &self.render_type)
            .field("description", &self.description)
            .field("mount_binders", &self.mount_binders.len())
            .field("attach_binders", &self.attach_binders.len())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
