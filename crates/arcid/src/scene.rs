//! # Scene Set: Which Records Are Live
//!
//! The [`SceneSet`] is the list of record CIDs that make up the active scene.
//! It does not fetch anything. The fetch collaborator asks it what is still
//! missing ([`SceneSet::take_requests`]), fetches those records however it
//! likes, and delivers each result through the [`ReplySender`] from
//! [`SceneSet::sender`]. At the start of every tick [`scene_sync_system`]:
//!
//! 1. spawns an entity for each delivered record whose CID is still active,
//! 2. drops deliveries for CIDs that left the set while in flight,
//! 3. despawns the entity of every CID that left the set.
//!
//! ```text
//! set_active([A, B])      fetcher           scene_sync_system
//! ─────────────────       ───────           ─────────────────
//! pending = [A, B] ──►  fetch A, B  ──►  spawn A, spawn B
//! set_active([B])                      ──►  despawn A
//! ```

use crate::cid::Cid;
use crate::components::{
    AnchorRef, DetectedPlaneRef, GltfModel, Identity, IsAnchorTag, ParentRef, Position, RaycastRef,
    Rotation, Scale, SceneNode, TrackedImageRef, ViewerPoseTag, Visibility,
};
use crate::ecs::{Entity, TickContext, World};
use crate::error::RecordError;
use crate::math::{Quat, Vec3};
use crate::platform::{ReplyQueue, ReplySender};
use crate::record::EntityRecord;

/// A fetched (or failed) record.
#[derive(Debug)]
pub struct RecordDelivery {
    pub cid: Cid,
    pub result: Result<EntityRecord, RecordError>,
}

/// The active scene, kept as a world resource.
#[derive(Default)]
pub struct SceneSet {
    active: Vec<Cid>,
    /// Handed to the fetcher and not yet delivered.
    requested: Vec<Cid>,
    spawned: Vec<(Cid, Entity)>,
    deliveries: ReplyQueue<RecordDelivery>,
}

impl SceneSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the active set. Duplicates are ignored.
    pub fn set_active(&mut self, roots: impl IntoIterator<Item = Cid>) {
        self.active.clear();
        for cid in roots {
            self.add(cid);
        }
        let active = &self.active;
        self.requested.retain(|cid| active.contains(cid));
    }

    pub fn add(&mut self, cid: Cid) {
        if !self.active.contains(&cid) {
            self.active.push(cid);
        }
    }

    pub fn remove(&mut self, cid: &Cid) {
        self.active.retain(|c| c != cid);
        self.requested.retain(|c| c != cid);
    }

    pub fn active(&self) -> &[Cid] {
        &self.active
    }

    pub fn is_active(&self, cid: &Cid) -> bool {
        self.active.contains(cid)
    }

    /// Active CIDs without an entity yet, in activation order.
    pub fn pending(&self) -> Vec<Cid> {
        self.active
            .iter()
            .filter(|cid| self.entity_of(cid).is_none())
            .cloned()
            .collect()
    }

    /// Pending CIDs not yet handed to the fetcher. Each is handed out once;
    /// a failed delivery makes it eligible again.
    pub fn take_requests(&mut self) -> Vec<Cid> {
        let fresh: Vec<Cid> = self
            .pending()
            .into_iter()
            .filter(|cid| !self.requested.contains(cid))
            .collect();
        self.requested.extend(fresh.iter().cloned());
        fresh
    }

    pub fn sender(&self) -> ReplySender<RecordDelivery> {
        self.deliveries.sender()
    }

    /// Deliver a record directly, without going through a sender.
    pub fn deliver(&self, cid: Cid, result: Result<EntityRecord, RecordError>) {
        self.deliveries.sender().send(RecordDelivery { cid, result });
    }

    pub fn entity_of(&self, cid: &Cid) -> Option<Entity> {
        self.spawned.iter().find(|(c, _)| c == cid).map(|&(_, e)| e)
    }
}

/// Build an entity from a record.
///
/// Every record entity gets `Identity`, `Position`, `Rotation`, `Scale` and
/// `Visibility`. Tracked entities start without a start pose; their adapter
/// fills it in once the platform reports one.
pub fn spawn_record(world: &mut World, cid: Cid, record: &EntityRecord) -> Entity {
    let entity = world.spawn_empty();
    world.insert(entity, Identity::new(cid));

    if record.is_tracked() {
        world.insert(entity, Position::unresolved());
        world.insert(entity, Rotation::unresolved());
    } else {
        let position = record.position.map(Vec3::from).unwrap_or(Vec3::ZERO);
        let rotation = record.rotation.map(Quat::from).unwrap_or(Quat::IDENTITY);
        world.insert(entity, Position::at(position));
        world.insert(entity, Rotation::new(rotation));
    }
    let scale = record.scale.map(Vec3::from).unwrap_or(Vec3::ONE);
    world.insert(entity, Scale::new(scale));
    world.insert(
        entity,
        Visibility {
            is_visible: record.visible.unwrap_or(true),
        },
    );

    if let Some(parent) = &record.parent {
        world.insert(entity, ParentRef { parent: parent.clone() });
    }
    if let Some(anchor) = &record.anchor {
        world.insert(entity, AnchorRef::from(anchor.clone()));
    }
    if record.is_anchor {
        world.insert(entity, IsAnchorTag::default());
    }
    if let Some(image) = &record.tracked_image {
        world.insert(
            entity,
            TrackedImageRef::new(image.image_asset.clone(), image.physical_width_in_meters),
        );
    }
    if let Some(orientation) = record.detected_plane {
        world.insert(entity, DetectedPlaneRef { orientation });
    }
    if record.raycast {
        world.insert(entity, RaycastRef);
    }
    if record.viewer {
        world.insert(entity, ViewerPoseTag);
    }
    if let Some(model) = &record.gltf_model {
        world.insert(entity, GltfModel::new(model.clone()));
        world.insert(entity, SceneNode::default());
    }
    entity
}

/// Apply record deliveries and scene set changes. Does nothing until a
/// [`SceneSet`] resource exists.
pub fn scene_sync_system(world: &mut World, _ctx: &mut TickContext<'_>) {
    let Some(mut scene) = world.resource_remove::<SceneSet>() else {
        return;
    };

    for RecordDelivery { cid, result } in scene.deliveries.drain() {
        scene.requested.retain(|c| c != &cid);
        if !scene.is_active(&cid) {
            log::debug!("record {cid} arrived after leaving the scene; dropped");
            continue;
        }
        if scene.entity_of(&cid).is_some() {
            log::trace!("record {cid} delivered twice; keeping the first");
            continue;
        }
        match result {
            Ok(record) => {
                let entity = spawn_record(world, cid.clone(), &record);
                log::debug!("record {cid} spawned as {entity}");
                scene.spawned.push((cid, entity));
            }
            Err(err) => log::warn!("record {cid} could not be loaded: {err}"),
        }
    }

    let (kept, gone): (Vec<_>, Vec<_>) = std::mem::take(&mut scene.spawned)
        .into_iter()
        .partition(|(cid, _)| scene.active.contains(cid));
    scene.spawned = kept;
    for (cid, entity) in gone {
        log::debug!("record {cid} left the scene; despawning {entity}");
        world.despawn(entity);
    }

    world.insert_resource(scene);
}
