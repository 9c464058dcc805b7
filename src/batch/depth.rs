//! Depth resolution and ordering
//!
//! Each root type gets a depth when its first write enters the current
//! accumulation window. Groups execute in ascending depth on every flush.
//!
//! Resolution rules, for a type not yet buffered:
//! - Non-zero relative depth, or nothing buffered yet: `BASE_DEPTH + relative`
//! - Relative depth zero with other groups buffered:
//!   - no imported relationships: one past the current maximum
//!   - an imported target already buffered: one past that target's depth
//!   - imported targets, none buffered: ordering is unknown, reset first

use std::cmp::Ordering;
use std::collections::HashMap;

use super::group::EntityWriteGroup;
use super::request::RootType;

/// Offset placing record-write depths in a range orderable against other work
pub const BASE_DEPTH: i32 = 100;

/// Outcome of resolving a new group's depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepthDecision {
    /// Create the group at this depth
    UseDepth(i32),
    /// Ordering relative to the buffered groups cannot be determined: flush
    /// and reset, then create the group at the base depth
    ForceReset,
}

/// Resolve the depth of the first write of `root` in the current window.
pub fn resolve_depth(
    relative_depth: i32,
    imported: &[RootType],
    groups: &HashMap<RootType, EntityWriteGroup>,
    max_depth: i32,
) -> DepthDecision {
    if relative_depth != 0 || groups.is_empty() {
        return DepthDecision::UseDepth(BASE_DEPTH + relative_depth);
    }
    if imported.is_empty() {
        return DepthDecision::UseDepth(max_depth + 1);
    }
    imported
        .iter()
        .find_map(|target| groups.get(target))
        .map(|parent| DepthDecision::UseDepth(parent.depth() + 1))
        .unwrap_or(DepthDecision::ForceReset)
}

/// Execution order of groups: ascending depth, then creation order.
pub fn by_depth(a: &EntityWriteGroup, b: &EntityWriteGroup) -> Ordering {
    a.depth()
        .cmp(&b.depth())
        .then_with(|| a.sequence().cmp(&b.sequence()))
}
