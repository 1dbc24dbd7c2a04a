//! # World: Entities, Components, and the CID Index
//!
//! The [`World`] owns every entity and component, the live queries systems
//! watch, and a handful of typed resources (reply channels, registries).
//! Systems receive it explicitly as `&mut World`; there is no global.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ World                                                    │
//! │                                                          │
//! │  allocator: generational entity slots                    │
//! │  order:     live entities in creation order              │
//! │  masks:     slot → ComponentKind (what it carries)       │
//! │  columns:   ComponentKind → sparse column (slot → value) │
//! │  cids:      Cid → entity carrying that Identity          │
//! │  queries:   live filters with members + pending events   │
//! │  resources: TypeId → Box<dyn Any>                        │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lookup by CID
//!
//! Attaching an [`Identity`] registers the entity under its CID; removing the
//! component or despawning the entity unregisters it. When two live entities
//! claim the same CID the first one keeps the lookup, and the second is
//! promoted if the first goes away. A lookup that finds nothing is normal.
//!
//! ## Change Notification
//!
//! Every attach, remove and despawn recomputes the entity's mask and
//! re-evaluates each live query against the old and new mask, so query
//! membership is always current and `Added`/`Removed` fire synchronously.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use super::component::{Component, ComponentColumn, ComponentKind};
use super::entity::{Entity, EntityAllocator};
use super::query::{Columns, LiveQuery, QueryEvent, QueryFilter, QueryId, QueryObserver, QueryParam};
use crate::cid::Cid;
use crate::components::Identity;

/// The central container for all scene state.
pub struct World {
    allocator: EntityAllocator,
    /// Live entities in creation order; the iteration order of ad hoc queries.
    order: Vec<Entity>,
    /// Component set per slot. Empty for free slots.
    masks: Vec<ComponentKind>,
    columns: Columns,
    cids: HashMap<Cid, Entity>,
    queries: Vec<LiveQuery>,
    resources: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl World {
    pub fn new() -> Self {
        let columns = ComponentKind::all()
            .iter()
            .map(|kind| (kind, ComponentColumn::new()))
            .collect();
        Self {
            allocator: EntityAllocator::new(),
            order: Vec::new(),
            masks: Vec::new(),
            columns,
            cids: HashMap::new(),
            queries: Vec::new(),
            resources: HashMap::new(),
        }
    }

    // ── Resources ────────────────────────────────────────────────────

    /// Insert a resource, replacing any existing one of the same type.
    pub fn insert_resource<T: 'static + Send + Sync>(&mut self, value: T) {
        self.resources.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn get_resource<T: 'static + Send + Sync>(&self) -> Option<&T> {
        self.resources
            .get(&TypeId::of::<T>())
            .and_then(|r| r.downcast_ref::<T>())
    }

    pub fn get_resource_mut<T: 'static + Send + Sync>(&mut self) -> Option<&mut T> {
        self.resources
            .get_mut(&TypeId::of::<T>())
            .and_then(|r| r.downcast_mut::<T>())
    }

    /// Get a resource, inserting `init()` first if it isn't there yet.
    pub fn resource_or_insert_with<T: 'static + Send + Sync>(
        &mut self,
        init: impl FnOnce() -> T,
    ) -> &mut T {
        let slot = self
            .resources
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(init()));
        match slot.downcast_mut::<T>() {
            Some(value) => value,
            None => unreachable!("resource map keyed by TypeId holds a different type"),
        }
    }

    pub fn has_resource<T: 'static + Send + Sync>(&self) -> bool {
        self.resources.contains_key(&TypeId::of::<T>())
    }

    /// Remove a resource, taking ownership.
    pub fn resource_remove<T: 'static + Send + Sync>(&mut self) -> Option<T> {
        self.resources
            .remove(&TypeId::of::<T>())
            .and_then(|r| r.downcast::<T>().ok())
            .map(|b| *b)
    }

    // ── Entity lifecycle ─────────────────────────────────────────────

    /// Create an entity with no components.
    pub fn spawn_empty(&mut self) -> Entity {
        let entity = self.allocator.allocate();
        let slot = entity.index as usize;
        if slot >= self.masks.len() {
            self.masks.resize(slot + 1, ComponentKind::empty());
        }
        self.masks[slot] = ComponentKind::empty();
        self.order.push(entity);
        self.refresh_queries(entity, None, Some(ComponentKind::empty()));
        entity
    }

    /// Create an entity and attach a bundle of components (a tuple).
    pub fn spawn<B: SpawnBundle>(&mut self, bundle: B) -> Entity {
        let entity = self.spawn_empty();
        bundle.attach_to(self, entity);
        entity
    }

    /// Destroy an entity and drop all of its components.
    ///
    /// Returns `false` if the entity was already gone.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        if !self.allocator.is_alive(entity) {
            return false;
        }
        let before = self.masks[entity.index as usize];

        let released_cid = self.identity_cid(entity);
        for kind in before.iter() {
            if let Some(column) = self.columns.get_mut(&kind) {
                drop(column.take(entity.index));
            }
        }
        self.masks[entity.index as usize] = ComponentKind::empty();
        if let Some(pos) = self.order.iter().position(|&e| e == entity) {
            self.order.remove(pos);
        }
        self.allocator.deallocate(entity);

        if let Some(cid) = released_cid {
            self.release_cid(&cid, entity);
        }
        self.refresh_queries(entity, Some(before), None);
        true
    }

    pub fn is_alive(&self, entity: Entity) -> bool {
        self.allocator.is_alive(entity)
    }

    pub fn entity_count(&self) -> usize {
        self.allocator.alive_count()
    }

    /// Live entities in creation order.
    pub fn entities(&self) -> &[Entity] {
        &self.order
    }

    /// The component set an entity carries, or `None` if it is not alive.
    pub fn mask(&self, entity: Entity) -> Option<ComponentKind> {
        self.is_alive(entity)
            .then(|| self.masks[entity.index as usize])
    }

    /// Live entities matching `filter`, in creation order.
    pub fn entities_matching(&self, filter: QueryFilter) -> Vec<Entity> {
        self.order
            .iter()
            .copied()
            .filter(|e| filter.matches(self.masks[e.index as usize]))
            .collect()
    }

    // ── Per-entity component access ──────────────────────────────────

    /// Attach a component, replacing any existing one of the same type.
    ///
    /// Returns `false` (and does nothing) if the entity is not alive. Replies
    /// from collaborators routinely target entities that were removed while
    /// the request was in flight.
    pub fn insert<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        if !self.allocator.is_alive(entity) {
            log::trace!(
                "dropping `{}` for dead entity {entity}",
                std::any::type_name::<T>()
            );
            return false;
        }

        let (claimed_cid, released_cid) = match (&component as &dyn Any).downcast_ref::<Identity>() {
            Some(identity) => match self.identity_cid(entity) {
                // Same CID again: the entity keeps its place in the index.
                Some(current) if current == identity.cid => (None, None),
                current => (Some(identity.cid.clone()), current),
            },
            None => (None, None),
        };

        let column = self.column_mut(T::KIND);
        drop(column.insert(entity.index, component));

        if let Some(old) = released_cid {
            self.release_cid(&old, entity);
        }
        if let Some(cid) = claimed_cid {
            self.claim_cid(cid, entity);
        }

        let before = self.masks[entity.index as usize];
        let after = before | T::KIND;
        if before != after {
            self.masks[entity.index as usize] = after;
            self.refresh_queries(entity, Some(before), Some(after));
        }
        true
    }

    /// Detach a component and return it.
    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        let removed = self.column_mut(T::KIND).remove::<T>(entity.index)?;

        if let Some(identity) = (&removed as &dyn Any).downcast_ref::<Identity>() {
            let cid = identity.cid.clone();
            self.release_cid(&cid, entity);
        }

        let before = self.masks[entity.index as usize];
        let after = before - T::KIND;
        self.masks[entity.index as usize] = after;
        self.refresh_queries(entity, Some(before), Some(after));
        Some(removed)
    }

    /// Shared access to a component. `None` if the entity is dead or lacks it.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.columns.get(&T::KIND)?.get::<T>(entity.index)
    }

    /// Mutable access to a component. `None` if the entity is dead or lacks it.
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        if !self.allocator.is_alive(entity) {
            return None;
        }
        self.columns.get_mut(&T::KIND)?.get_mut::<T>(entity.index)
    }

    pub fn contains<T: Component>(&self, entity: Entity) -> bool {
        self.mask(entity).is_some_and(|m| m.contains(T::KIND))
    }

    // ── CID index ────────────────────────────────────────────────────

    /// The live entity whose [`Identity`] is `cid`, if any.
    pub fn lookup(&self, cid: &Cid) -> Option<Entity> {
        self.cids.get(cid).copied()
    }

    fn identity_cid(&self, entity: Entity) -> Option<Cid> {
        self.get::<Identity>(entity).map(|i| i.cid.clone())
    }

    fn claim_cid(&mut self, cid: Cid, entity: Entity) {
        match self.cids.get(&cid) {
            Some(&holder) if holder != entity && self.is_alive(holder) => {
                log::warn!("cid {cid} already identifies {holder}; {entity} will not be found by lookup");
            }
            _ => {
                self.cids.insert(cid, entity);
            }
        }
    }

    /// Unregister `entity` as holder of `cid`, promoting the next live
    /// entity (in creation order) that carries the same identity.
    fn release_cid(&mut self, cid: &Cid, entity: Entity) {
        if self.cids.get(cid) != Some(&entity) {
            return;
        }
        self.cids.remove(cid);
        let successor = self.order.iter().copied().find(|&e| {
            e != entity && self.get::<Identity>(e).is_some_and(|i| &i.cid == cid)
        });
        if let Some(next) = successor {
            self.cids.insert(cid.clone(), next);
        }
    }

    // ── Live queries ─────────────────────────────────────────────────

    /// Register a live query. Entities that already match are reported as
    /// `Added` on the first drain.
    pub fn register_query(&mut self, filter: QueryFilter) -> QueryId {
        let mut live = LiveQuery::new(filter);
        for &entity in &self.order {
            live.refresh(entity, None, Some(self.masks[entity.index as usize]));
        }
        self.queries.push(live);
        QueryId(self.queries.len() - 1)
    }

    /// Current members of a live query, in the order they started matching.
    pub fn query_members(&self, id: QueryId) -> &[Entity] {
        self.queries
            .get(id.0)
            .map(|q| q.members.as_slice())
            .unwrap_or(&[])
    }

    /// Call `observer` synchronously whenever an entity starts or stops
    /// matching the query.
    ///
    /// Events recorded before the first observer arrived are replayed to it.
    /// From then on the query reports only through its observers, and
    /// [`drain_query_events`](Self::drain_query_events) returns nothing.
    pub fn observe(&mut self, id: QueryId, observer: impl FnMut(QueryEvent) + 'static) {
        if let Some(q) = self.queries.get_mut(id.0) {
            let mut observer: QueryObserver = Box::new(observer);
            for event in q.pending.drain(..) {
                observer(event);
            }
            q.observers.push(observer);
        }
    }

    /// Take the membership changes recorded since the last drain.
    pub fn drain_query_events(&mut self, id: QueryId) -> Vec<QueryEvent> {
        self.queries
            .get_mut(id.0)
            .map(|q| std::mem::take(&mut q.pending))
            .unwrap_or_default()
    }

    fn refresh_queries(&mut self, entity: Entity, before: Option<ComponentKind>, after: Option<ComponentKind>) {
        for q in &mut self.queries {
            q.refresh(entity, before, after);
        }
    }

    // ── Typed iteration ──────────────────────────────────────────────

    /// Run `f` for every live entity carrying what `Q` requires, in creation
    /// order.
    ///
    /// ```ignore
    /// world.query::<(&mut Position, &Visibility)>(|entity, (pos, vis)| { ... });
    /// ```
    pub fn query<Q: QueryParam>(&mut self, f: impl FnMut(Entity, Q::Item<'_>)) {
        self.query_filtered::<Q>(QueryFilter::everything(), f);
    }

    /// Like [`query`](Self::query), restricted to entities that also match
    /// `filter`.
    pub fn query_filtered<Q: QueryParam>(
        &mut self,
        filter: QueryFilter,
        f: impl FnMut(Entity, Q::Item<'_>),
    ) {
        let filter = filter.and_all(Q::required());
        let targets = self.entities_matching(filter);
        self.run_query::<Q>(&targets, f);
    }

    /// Run `f` over the members of a live query, in membership order.
    pub fn query_live<Q: QueryParam>(&mut self, id: QueryId, f: impl FnMut(Entity, Q::Item<'_>)) {
        let required = Q::required();
        let targets: Vec<Entity> = self
            .query_members(id)
            .iter()
            .copied()
            .filter(|e| self.masks[e.index as usize].contains(required))
            .collect();
        self.run_query::<Q>(&targets, f);
    }

    fn run_query<Q: QueryParam>(&mut self, targets: &[Entity], mut f: impl FnMut(Entity, Q::Item<'_>)) {
        let mut cols = Q::extract(&mut self.columns);
        for &entity in targets {
            match Q::fetch(&mut cols, entity.index) {
                Some(item) => f(entity, item),
                None => {
                    debug_assert!(false, "mask of {entity} claims components its columns lack");
                    log::error!("mask of {entity} claims components its columns lack; skipped");
                }
            }
        }
        Q::restore(cols, &mut self.columns);
    }

    fn column_mut(&mut self, kind: ComponentKind) -> &mut ComponentColumn {
        self.columns.entry(kind).or_insert_with(ComponentColumn::new)
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

// ── Spawn bundles ────────────────────────────────────────────────────────

/// A tuple of components attached together by [`World::spawn`].
pub trait SpawnBundle {
    fn attach_to(self, world: &mut World, entity: Entity);
}

macro_rules! impl_spawn_bundle {
    ($($T:ident),+) => {
        impl<$($T: Component),+> SpawnBundle for ($($T,)+) {
            #[allow(non_snake_case)]
            fn attach_to(self, world: &mut World, entity: Entity) {
                let ($($T,)+) = self;
                $(world.insert(entity, $T);)+
            }
        }
    };
}

impl_spawn_bundle!(A);
impl_spawn_bundle!(A, B);
impl_spawn_bundle!(A, B, C);
impl_spawn_bundle!(A, B, C, D);
impl_spawn_bundle!(A, B, C, D, E);
impl_spawn_bundle!(A, B, C, D, E, F);
impl_spawn_bundle!(A, B, C, D, E, F, G);
impl_spawn_bundle!(A, B, C, D, E, F, G, H);
