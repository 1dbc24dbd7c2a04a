//! # Component: A Closed Set of Kinds, Stored Sparsely
//!
//! Every component type the runtime knows about is listed once in
//! [`ComponentKind`], a bitflag set with one bit per type. An entity's
//! component set is a single `ComponentKind` value, so "has all of {..}" and
//! "has any of {..}" are two mask tests, with no reflection and no per-type
//! lookups.
//!
//! ## Storage
//!
//! One [`ComponentColumn`] per kind. A column is sparse: row `i` belongs to the
//! entity in slot `i` and is simply empty when that entity lacks the
//! component. Scene graphs here are small (tens to hundreds of records) and
//! components come and go as records arrive and tracking drops in and out, so
//! moving whole rows between archetype tables on every change buys nothing.
//!
//! ```text
//! Position column:  [Some(p0), None, Some(p2), None]
//! AnchorRef column: [None,     None, Some(a2), None]
//! masks:            [POS,      VIS,  POS|ANCHOR, ∅ ]
//! ```
//!
//! Values are type-erased (`Box<dyn Any>`), which keeps the column generic
//! without `unsafe`. A downcast failure means the kind table and the concrete
//! type disagree, which is a bug in this crate, not in caller data.

use std::any::Any;

bitflags::bitflags! {
    /// One bit per component type.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ComponentKind: u32 {
        const IDENTITY = 1 << 0;
        const RENDERABLE = 1 << 1;
        const POSITION = 1 << 2;
        const ROTATION = 1 << 3;
        const SCALE = 1 << 4;
        const PARENT_REF = 1 << 5;
        const ANCHOR_REF = 1 << 6;
        const IS_ANCHOR = 1 << 7;
        const VISIBILITY = 1 << 8;
        const TRACKED_IMAGE = 1 << 9;
        const DETECTED_PLANE = 1 << 10;
        const RAYCAST = 1 << 11;
        const VIEWER_POSE = 1 << 12;
        const GLTF_MODEL = 1 << 13;
        const SCENE_NODE = 1 << 14;
    }
}

impl ComponentKind {
    /// The three transform kinds.
    pub const TRANSFORM: Self = Self::POSITION.union(Self::ROTATION).union(Self::SCALE);
}

/// A value that can be attached to an entity.
///
/// Implemented only by the types in [`crate::components`]; each names its
/// single bit in [`ComponentKind`].
pub trait Component: Any + Send + Sync {
    const KIND: ComponentKind;
}

/// A sparse, type-erased column holding one component kind.
///
/// Opaque outside the crate; it only appears in [`QueryParam`](super::query::QueryParam)
/// plumbing.
pub struct ComponentColumn {
    rows: Vec<Option<Box<dyn Any + Send + Sync>>>,
}

impl ComponentColumn {
    pub(crate) fn new() -> Self {
        Self { rows: Vec::new() }
    }

    /// Store `value` at `row`, returning the previous value if there was one.
    pub(crate) fn insert<T: Component>(&mut self, row: u32, value: T) -> Option<T> {
        let row = row as usize;
        if row >= self.rows.len() {
            self.rows.resize_with(row + 1, || None);
        }
        self.rows[row]
            .replace(Box::new(value))
            .map(|old| *Self::downcast_box::<T>(old))
    }

    pub(crate) fn get<T: Component>(&self, row: u32) -> Option<&T> {
        let value = self.rows.get(row as usize)?.as_ref()?;
        Some(value.downcast_ref::<T>().unwrap_or_else(|| Self::mismatch::<T>()))
    }

    pub(crate) fn get_mut<T: Component>(&mut self, row: u32) -> Option<&mut T> {
        let value = self.rows.get_mut(row as usize)?.as_mut()?;
        Some(value.downcast_mut::<T>().unwrap_or_else(|| Self::mismatch::<T>()))
    }

    /// Remove and return the typed value at `row`.
    pub(crate) fn remove<T: Component>(&mut self, row: u32) -> Option<T> {
        self.take(row).map(|b| *Self::downcast_box::<T>(b))
    }

    /// Remove the value at `row` without knowing its type. Used when an
    /// entity is despawned and every column drops its row.
    pub(crate) fn take(&mut self, row: u32) -> Option<Box<dyn Any + Send + Sync>> {
        self.rows.get_mut(row as usize)?.take()
    }

    fn downcast_box<T: Component>(value: Box<dyn Any + Send + Sync>) -> Box<T> {
        value.downcast::<T>().unwrap_or_else(|_| Self::mismatch::<T>())
    }

    fn mismatch<T>() -> ! {
        panic!(
            "component column holds a value that is not `{}`",
            std::any::type_name::<T>()
        )
    }
}
