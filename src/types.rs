//! Core types for spark-render.
//!
//! These types define the foundation that everything builds on: geometry,
//! measure specs, and the stable unit identity that drives reconciliation.

use std::sync::atomic::{AtomicU64, Ordering};

// =============================================================================
// Unit Identity
// =============================================================================

/// Stable 64-bit identity for a render unit.
///
/// Ids are unique within one process and stable across layout passes for the
/// same logical content. Id 0 is reserved for the synthetic root host and is
/// never handed out by [`next_unit_id`].
pub type UnitId = u64;

/// The reserved id of the synthetic root host node.
pub const ROOT_HOST_ID: UnitId = 0;

static UNIT_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, process-unique unit id.
///
/// Never returns [`ROOT_HOST_ID`].
pub fn next_unit_id() -> UnitId {
    UNIT_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}

// =============================================================================
// Geometry
// =============================================================================

/// Axis-aligned rectangle in host-relative coordinates.
///
/// Positions can be negative (a child scrolled or translated out of its
/// host's visible area); sizes are never negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// The zero rectangle.
    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Right edge (exclusive).
    #[inline]
    pub const fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Bottom edge (exclusive).
    #[inline]
    pub const fn bottom(&self) -> i32 {
        self.y + self.height
    }

    /// Check if the rectangle has zero area.
    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Translate by an offset.
    #[inline]
    pub const fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// The size of this rectangle.
    #[inline]
    pub const fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }
}

/// A width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub const ZERO: Self = Self::new(0, 0);
}

/// Per-edge insets (padding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Edges {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Edges {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const ZERO: Self = Self::new(0, 0, 0, 0);

    /// Check if all edges are zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.left == 0 && self.top == 0 && self.right == 0 && self.bottom == 0
    }
}

// =============================================================================
// Measure Specs
// =============================================================================

/// A size constraint handed to layout.
///
/// Mirrors the classic three-mode measure contract: an exact size, an upper
/// bound, or no constraint at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureSpec {
    /// No constraint on this axis.
    Unspecified,
    /// Exactly this many pixels/cells.
    Exactly(i32),
    /// At most this many pixels/cells.
    AtMost(i32),
}

impl MeasureSpec {
    /// Check whether a previous measurement is still valid under this spec.
    ///
    /// Rules:
    /// - identical specs are always compatible
    /// - `Exactly(s)` is compatible with any previous result that measured
    ///   exactly `s`
    /// - `AtMost(n)` is compatible with a previous `AtMost` result whose
    ///   measured size fits under `n`
    /// - `Unspecified` only matches a previous `Unspecified`
    #[inline]
    pub fn is_compatible(self, old: MeasureSpec, old_measured: i32) -> bool {
        if self == old {
            return true;
        }
        match (self, old) {
            (MeasureSpec::Exactly(size), _) => size == old_measured,
            (MeasureSpec::AtMost(new_max), MeasureSpec::AtMost(_)) => old_measured <= new_max,
            _ => false,
        }
    }

    /// Resolve a desired size against this spec.
    #[inline]
    pub fn resolve(self, desired: i32) -> i32 {
        match self {
            MeasureSpec::Unspecified => desired,
            MeasureSpec::Exactly(size) => size,
            MeasureSpec::AtMost(max) => desired.min(max),
        }
    }
}

/// Check a (width, height) spec pair against a previously measured size.
#[inline]
pub fn specs_compatible(
    width_spec: MeasureSpec,
    height_spec: MeasureSpec,
    old_width_spec: MeasureSpec,
    old_height_spec: MeasureSpec,
    measured: Size,
) -> bool {
    width_spec.is_compatible(old_width_spec, measured.width)
        && height_spec.is_compatible(old_height_spec, measured.height)
}

// =============================================================================
// Tests
// =============================================================================
