//! # SceneRuntime: The Surface the Host Drives
//!
//! The host owns one [`SceneRuntime`] and calls [`tick`](SceneRuntime::tick)
//! once per rendered frame. Between ticks it may create entities, attach and
//! read components, register queries, change the active scene and read a
//! [`snapshot`](SceneRuntime::snapshot) of final poses.
//!
//! ```ignore
//! let mut runtime = SceneRuntime::new(platform, assets, RuntimeConfig::default());
//! runtime.scene_mut().set_active(roots);
//! loop {
//!     fetch_records(runtime.scene_mut());
//!     runtime.tick(frame_delta);
//!     draw(runtime.snapshot());
//! }
//! ```

use std::time::Duration;

use serde::Serialize;

use crate::cid::Cid;
use crate::components::{Identity, Position, Rotation, Scale, Visibility};
use crate::config::RuntimeConfig;
use crate::ecs::{Component, ComponentKind, Entity, QueryEvent, QueryFilter, QueryId, Schedule, TickContext, World};
use crate::math::{Quat, Vec3};
use crate::platform::{ArPlatform, AssetLoader};
use crate::scene::SceneSet;
use crate::systems::default_schedule;

/// One entity's final transform after a tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityPose {
    #[serde(skip)]
    pub entity: Entity,
    pub cid: Option<Cid>,
    /// `None` while neither a resolved nor a start position is known.
    pub position: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Vec3,
    /// Visible, pose known, and the world is shown.
    pub visible: bool,
}

pub struct SceneRuntime<P: ArPlatform, A: AssetLoader> {
    world: World,
    schedule: Schedule,
    platform: P,
    assets: A,
    config: RuntimeConfig,
    world_shown: bool,
    ticks: u64,
}

impl<P: ArPlatform, A: AssetLoader> SceneRuntime<P, A> {
    pub fn new(platform: P, assets: A, config: RuntimeConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(SceneSet::new());
        log::info!(
            "scene runtime ready ({:?} composition, world {})",
            config.composition,
            if config.world_shown { "shown" } else { "hidden" }
        );
        Self {
            world,
            schedule: default_schedule(),
            platform,
            assets,
            world_shown: config.world_shown,
            config,
            ticks: 0,
        }
    }

    /// Run the pipeline once.
    pub fn tick(&mut self, delta: Duration) {
        let mut ctx = TickContext {
            delta,
            tick: self.ticks,
            platform: &mut self.platform,
            assets: &mut self.assets,
            config: &self.config,
            world_shown: self.world_shown,
        };
        self.schedule.run(&mut self.world, &mut ctx);
        self.ticks += 1;

        #[cfg(feature = "diagnostics")]
        for timing in self.schedule.timings() {
            log::trace!("tick {}: {} took {:.1}us", self.ticks, timing.name, timing.duration_us);
        }
    }

    /// Ticks completed so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    // ── Entities and components ──────────────────────────────────────

    pub fn create_entity(&mut self) -> Entity {
        self.world.spawn_empty()
    }

    /// Attach (or replace) a component. Returns `false` if the entity is gone.
    pub fn attach<T: Component>(&mut self, entity: Entity, component: T) -> bool {
        self.world.insert(entity, component)
    }

    /// A component of `entity`, or `None` if it is gone or lacks it.
    pub fn get<T: Component>(&self, entity: Entity) -> Option<&T> {
        self.world.get(entity)
    }

    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> Option<&mut T> {
        self.world.get_mut(entity)
    }

    pub fn remove<T: Component>(&mut self, entity: Entity) -> Option<T> {
        self.world.remove(entity)
    }

    /// Remove an entity and all its components.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        self.world.despawn(entity)
    }

    /// The live entity identified by `cid`.
    pub fn lookup(&self, cid: &Cid) -> Option<Entity> {
        self.world.lookup(cid)
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Register a live query; see [`World::register_query`].
    pub fn query(&mut self, filter: QueryFilter) -> QueryId {
        self.world.register_query(filter)
    }

    pub fn members(&self, query: QueryId) -> &[Entity] {
        self.world.query_members(query)
    }

    /// Receive membership changes as they happen. An observed query no
    /// longer buffers events for [`drain_events`](Self::drain_events).
    pub fn observe(&mut self, query: QueryId, observer: impl FnMut(QueryEvent) + 'static) {
        self.world.observe(query, observer);
    }

    /// Membership changes since the last drain. An unobserved query keeps
    /// every change until it is drained.
    pub fn drain_events(&mut self, query: QueryId) -> Vec<QueryEvent> {
        self.world.drain_query_events(query)
    }

    // ── Output ───────────────────────────────────────────────────────

    /// Final pose of every entity carrying a transform component, in
    /// creation order.
    pub fn snapshot(&self) -> Vec<EntityPose> {
        let filter = QueryFilter::has_any(ComponentKind::TRANSFORM);
        self.world
            .entities_matching(filter)
            .into_iter()
            .map(|entity| self.pose_of(entity))
            .collect()
    }

    fn pose_of(&self, entity: Entity) -> EntityPose {
        let position = self.world.get::<Position>(entity).map(Position::effective);
        let rotation = self.world.get::<Rotation>(entity).map(Rotation::effective);
        let pose_known = !matches!(position, Some(None)) && !matches!(rotation, Some(None));
        let visible = self
            .world
            .get::<Visibility>(entity)
            .is_none_or(|v| v.is_visible);
        EntityPose {
            entity,
            cid: self.world.get::<Identity>(entity).map(|i| i.cid.clone()),
            position: position.flatten(),
            rotation: rotation.flatten(),
            scale: self
                .world
                .get::<Scale>(entity)
                .map_or(Vec3::ONE, Scale::effective),
            visible: visible && pose_known && self.world_shown,
        }
    }

    // ── Session and collaborators ────────────────────────────────────

    /// Set the AR session's "world shown" flag.
    pub fn set_world_shown(&mut self, shown: bool) {
        if shown != self.world_shown {
            log::info!("world {}", if shown { "shown" } else { "hidden" });
        }
        self.world_shown = shown;
    }

    pub fn world_shown(&self) -> bool {
        self.world_shown
    }

    pub fn scene_mut(&mut self) -> &mut SceneSet {
        self.world.resource_or_insert_with(SceneSet::new)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn assets(&self) -> &A {
        &self.assets
    }

    pub fn assets_mut(&mut self) -> &mut A {
        &mut self.assets
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }
}
