//! # Query: Predicates, Live Result Sets, and Typed Fetch
//!
//! Two halves:
//!
//! - [`QueryFilter`] is a predicate over an entity's [`ComponentKind`] mask:
//!   "has all of {..}" and "has any of {..}". A filter registered with
//!   [`World::register_query`](super::world::World::register_query) becomes a
//!   *live* query: the world keeps its member list up to date as components
//!   are attached and removed, and reports [`QueryEvent::Added`] /
//!   [`QueryEvent::Removed`] the moment an entity starts or stops matching.
//!   Members are kept in the order they started matching.
//!
//! - [`QueryParam`] is how a system borrows component data while iterating:
//!
//! ```text
//! world.query::<(&AnchorRef, &mut Position, Option<&Visibility>)>(|entity, (a, p, v)| {
//!     ...
//! });
//! ```
//!
//! ## Closure-Based Fetch
//!
//! Rust's `Iterator` can't yield items that borrow from the iterator itself,
//! so iteration is closure-based. The columns a query needs are taken out of
//! the world for the duration of the loop and put back afterwards, which lets
//! the borrow checker see that `&mut Position` and `&AnchorRef` never alias.
//!
//! `Option<&T>` / `Option<&mut T>` fetch a column without requiring it, which
//! is what "has any of {Position, Rotation, Scale}" systems need.

use std::collections::HashMap;

use super::component::{Component, ComponentColumn, ComponentKind};
use super::entity::Entity;

// ── Filters and live queries ────────────────────────────────────────────

/// A predicate over component sets.
///
/// An empty filter matches every live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryFilter {
    all: ComponentKind,
    any: ComponentKind,
}

impl QueryFilter {
    /// Matches every entity.
    pub fn everything() -> Self {
        Self {
            all: ComponentKind::empty(),
            any: ComponentKind::empty(),
        }
    }

    /// Entities carrying every kind in `kinds`.
    pub fn has_all(kinds: ComponentKind) -> Self {
        Self::everything().and_all(kinds)
    }

    /// Entities carrying at least one kind in `kinds`.
    pub fn has_any(kinds: ComponentKind) -> Self {
        Self::everything().and_any(kinds)
    }

    pub fn and_all(mut self, kinds: ComponentKind) -> Self {
        self.all |= kinds;
        self
    }

    pub fn and_any(mut self, kinds: ComponentKind) -> Self {
        self.any |= kinds;
        self
    }

    pub fn matches(&self, mask: ComponentKind) -> bool {
        mask.contains(self.all) && (self.any.is_empty() || mask.intersects(self.any))
    }
}

/// Handle to a live query registered on a [`World`](super::world::World).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QueryId(pub(crate) usize);

/// A change in a live query's membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
    Added(Entity),
    Removed(Entity),
}

impl QueryEvent {
    pub fn entity(self) -> Entity {
        match self {
            QueryEvent::Added(e) | QueryEvent::Removed(e) => e,
        }
    }
}

/// Observer invoked synchronously for each membership change.
pub type QueryObserver = Box<dyn FnMut(QueryEvent)>;

/// Incrementally maintained state of one live query.
pub(crate) struct LiveQuery {
    pub filter: QueryFilter,
    /// Current members, in the order they started matching.
    pub members: Vec<Entity>,
    /// Changes not yet drained by a system. Only kept while the query has
    /// no observers.
    pub pending: Vec<QueryEvent>,
    pub observers: Vec<QueryObserver>,
}

impl LiveQuery {
    pub fn new(filter: QueryFilter) -> Self {
        Self {
            filter,
            members: Vec::new(),
            pending: Vec::new(),
            observers: Vec::new(),
        }
    }

    /// Re-evaluate one entity after its mask changed. `None` means "not alive".
    pub fn refresh(&mut self, entity: Entity, before: Option<ComponentKind>, after: Option<ComponentKind>) {
        let was = before.is_some_and(|m| self.filter.matches(m));
        let is = after.is_some_and(|m| self.filter.matches(m));
        let event = match (was, is) {
            (false, true) => {
                self.members.push(entity);
                QueryEvent::Added(entity)
            }
            (true, false) => {
                if let Some(pos) = self.members.iter().position(|&m| m == entity) {
                    self.members.remove(pos);
                }
                QueryEvent::Removed(entity)
            }
            _ => return,
        };
        if self.observers.is_empty() {
            self.pending.push(event);
        }
        for observer in &mut self.observers {
            observer(event);
        }
    }
}

// ── Typed fetch ─────────────────────────────────────────────────────────

/// The world's columns, keyed by kind.
pub type Columns = HashMap<ComponentKind, ComponentColumn>;

/// Something a query closure can receive per entity.
///
/// Implemented for `&T`, `&mut T`, `Option<&T>`, `Option<&mut T>` and tuples
/// of those (up to eight).
pub trait QueryParam {
    /// The item handed to the closure.
    type Item<'w>;

    /// Column data taken out of the world for the duration of a query.
    #[doc(hidden)]
    type Column;

    /// Kinds an entity must carry for this parameter to fetch.
    fn required() -> ComponentKind;

    #[doc(hidden)]
    fn extract(columns: &mut Columns) -> Self::Column;

    #[doc(hidden)]
    fn restore(col: Self::Column, columns: &mut Columns);

    /// Fetch for one entity row. `None` only if a required value is missing,
    /// which the world treats as an invariant violation.
    #[doc(hidden)]
    fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>>;
}

fn take_column<T: Component>(columns: &mut Columns) -> ComponentColumn {
    columns.remove(&T::KIND).unwrap_or_else(|| {
        panic!(
            "query borrows `{}` twice or its column is missing",
            std::any::type_name::<T>()
        )
    })
}

impl<T: Component> QueryParam for &T {
    type Item<'w> = &'w T;
    type Column = ComponentColumn;

    fn required() -> ComponentKind {
        T::KIND
    }

    fn extract(columns: &mut Columns) -> Self::Column {
        take_column::<T>(columns)
    }

    fn restore(col: Self::Column, columns: &mut Columns) {
        columns.insert(T::KIND, col);
    }

    fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>> {
        col.get::<T>(row)
    }
}

impl<T: Component> QueryParam for &mut T {
    type Item<'w> = &'w mut T;
    type Column = ComponentColumn;

    fn required() -> ComponentKind {
        T::KIND
    }

    fn extract(columns: &mut Columns) -> Self::Column {
        take_column::<T>(columns)
    }

    fn restore(col: Self::Column, columns: &mut Columns) {
        columns.insert(T::KIND, col);
    }

    fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>> {
        col.get_mut::<T>(row)
    }
}

impl<T: Component> QueryParam for Option<&T> {
    type Item<'w> = Option<&'w T>;
    type Column = ComponentColumn;

    fn required() -> ComponentKind {
        ComponentKind::empty()
    }

    fn extract(columns: &mut Columns) -> Self::Column {
        take_column::<T>(columns)
    }

    fn restore(col: Self::Column, columns: &mut Columns) {
        columns.insert(T::KIND, col);
    }

    fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>> {
        Some(col.get::<T>(row))
    }
}

impl<T: Component> QueryParam for Option<&mut T> {
    type Item<'w> = Option<&'w mut T>;
    type Column = ComponentColumn;

    fn required() -> ComponentKind {
        ComponentKind::empty()
    }

    fn extract(columns: &mut Columns) -> Self::Column {
        take_column::<T>(columns)
    }

    fn restore(col: Self::Column, columns: &mut Columns) {
        columns.insert(T::KIND, col);
    }

    fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>> {
        Some(col.get_mut::<T>(row))
    }
}

macro_rules! impl_query_param_tuple {
    ($($P:ident),+) => {
        impl<$($P: QueryParam),+> QueryParam for ($($P,)+) {
            type Item<'w> = ($($P::Item<'w>,)+);
            type Column = ($($P::Column,)+);

            fn required() -> ComponentKind {
                ComponentKind::empty() $(| $P::required())+
            }

            fn extract(columns: &mut Columns) -> Self::Column {
                ($($P::extract(columns),)+)
            }

            #[allow(non_snake_case)]
            fn restore(col: Self::Column, columns: &mut Columns) {
                let ($($P,)+) = col;
                $($P::restore($P, columns);)+
            }

            #[allow(non_snake_case)]
            fn fetch(col: &mut Self::Column, row: u32) -> Option<Self::Item<'_>> {
                let ($($P,)+) = col;
                Some(($($P::fetch($P, row)?,)+))
            }
        }
    };
}

impl_query_param_tuple!(A);
impl_query_param_tuple!(A, B);
impl_query_param_tuple!(A, B, C);
impl_query_param_tuple!(A, B, C, D);
impl_query_param_tuple!(A, B, C, D, E);
impl_query_param_tuple!(A, B, C, D, E, F);
impl_query_param_tuple!(A, B, C, D, E, F, G);
impl_query_param_tuple!(A, B, C, D, E, F, G, H);

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(index: u32) -> Entity {
        Entity {
            index,
            generation: 0,
        }
    }

    #[test]
    fn has_all_and_has_any_compose() {
        let renderable_with_transform = QueryFilter::has_all(ComponentKind::SCENE_NODE)
            .and_any(ComponentKind::TRANSFORM);
        assert!(renderable_with_transform.matches(ComponentKind::SCENE_NODE | ComponentKind::SCALE));
        assert!(!renderable_with_transform.matches(ComponentKind::SCENE_NODE));
        assert!(!renderable_with_transform.matches(ComponentKind::POSITION));
    }

    #[test]
    fn empty_filter_matches_everything() {
        assert!(QueryFilter::everything().matches(ComponentKind::empty()));
    }

    #[test]
    fn live_query_tracks_membership_in_match_order() {
        let mut q = LiveQuery::new(QueryFilter::has_all(ComponentKind::POSITION));
        let none = Some(ComponentKind::empty());
        let pos = Some(ComponentKind::POSITION);

        q.refresh(entity(2), none, pos);
        q.refresh(entity(0), none, pos);
        q.refresh(entity(1), none, Some(ComponentKind::ROTATION));
        assert_eq!(q.members, vec![entity(2), entity(0)]);

        q.refresh(entity(2), pos, None);
        assert_eq!(q.members, vec![entity(0)]);
        assert_eq!(
            q.pending,
            vec![
                QueryEvent::Added(entity(2)),
                QueryEvent::Added(entity(0)),
                QueryEvent::Removed(entity(2)),
            ]
        );
    }

    #[test]
    fn unrelated_changes_fire_nothing() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut q = LiveQuery::new(QueryFilter::has_any(ComponentKind::TRANSFORM));
        let sink = Rc::clone(&seen);
        q.observers.push(Box::new(move |ev| sink.borrow_mut().push(ev)));

        q.refresh(entity(0), Some(ComponentKind::empty()), Some(ComponentKind::POSITION));
        q.refresh(
            entity(0),
            Some(ComponentKind::POSITION),
            Some(ComponentKind::POSITION | ComponentKind::ROTATION),
        );
        assert_eq!(*seen.borrow(), vec![QueryEvent::Added(entity(0))]);
        assert!(q.pending.is_empty());
    }
}
