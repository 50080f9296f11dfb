//! ContentPool - recycled content objects, bucketed by pool tag.
//!
//! Unmounted content goes back to its allocator's bucket instead of being
//! dropped; the next mount of a unit with the same tag reuses it. Buckets
//! are capped by the allocator's [`pool_size_hint`]; overflow is dropped.
//!
//! The pool is injected into the mount engine at construction, so embedders
//! can share one pool between surfaces or swap in a no-op pool.
//!
//! [`pool_size_hint`]: crate::tree::ContentAllocator::pool_size_hint

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::tree::render_unit::ContentAllocator;

/// Per-tag buckets of recycled content.
pub struct ContentPool<C> {
    buckets: FxHashMap<&'static str, Vec<C>>,
}

impl<C> ContentPool<C> {
    pub fn new() -> Self {
        Self {
            buckets: FxHashMap::default(),
        }
    }

    /// Take a recycled instance for this allocator's bucket, or create a
    /// fresh one.
    pub fn acquire(&mut self, allocator: &Arc<dyn ContentAllocator<C>>) -> C {
        if let Some(content) = self
            .buckets
            .get_mut(allocator.pool_tag())
            .and_then(|bucket| bucket.pop())
        {
            return content;
        }
        allocator.create_content()
    }

    /// Return an instance to its bucket. Dropped if the bucket is full.
    pub fn release(&mut self, allocator: &Arc<dyn ContentAllocator<C>>, content: C) {
        let bucket = self.buckets.entry(allocator.pool_tag()).or_default();
        if bucket.len() < allocator.pool_size_hint() {
            bucket.push(content);
        }
    }

    /// Number of pooled instances in one bucket.
    pub fn pooled(&self, tag: &str) -> usize {
        self.buckets.get(tag).map(|b| b.len()).unwrap_or(0)
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.buckets.clear();
    }
}

impl<C> Default for ContentPool<C> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
