//! Tracking adapters: copy platform poses into start fields.
//!
//! Each adapter polls its [`ArPlatform`](crate::platform::ArPlatform) getter
//! once per tick and writes the answer into `Position::start_position` and
//! `Rotation::start_rotation` of every entity it serves. A `None` answer
//! clears both, which is how "tracking lost" reaches anchor resolution.

use std::collections::HashMap;

use crate::components::{DetectedPlaneRef, Position, RaycastRef, Rotation, TrackedImageRef, ViewerPoseTag};
use crate::ecs::{ComponentKind, Entity, QueryEvent, QueryFilter, QueryId, System, TickContext, World};
use crate::math::Pose;
use crate::platform::TrackedImageSpec;

fn write_pose(entity: Entity, position: &mut Position, rotation: &mut Rotation, pose: Option<Pose>) {
    let was_tracked = position.start_position.is_some() && rotation.start_rotation.is_some();
    if was_tracked != pose.is_some() {
        log::debug!(
            "{entity} {}",
            if pose.is_some() { "tracked" } else { "lost tracking" }
        );
    }
    position.start_position = pose.map(|p| p.position);
    rotation.start_rotation = pose.map(|p| p.rotation);
}

/// Registers tracked images with the platform as they appear and follows
/// their poses.
///
/// Images are numbered in the order their entities first match; the number
/// is stored in [`TrackedImageRef::tracking_index`] and is what the platform
/// reports poses by. The same image (asset and width) shares one index.
#[derive(Default)]
pub struct TrackedImageSystem {
    with_images: Option<QueryId>,
    images: Vec<TrackedImageSpec>,
}

impl TrackedImageSystem {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&mut self, image: &TrackedImageRef) -> (usize, bool) {
        let spec = TrackedImageSpec {
            asset: image.asset.clone(),
            width_meters: image.width_meters,
        };
        match self.images.iter().position(|known| *known == spec) {
            Some(index) => (index, false),
            None => {
                self.images.push(spec);
                (self.images.len() - 1, true)
            }
        }
    }
}

impl System for TrackedImageSystem {
    fn run(&mut self, world: &mut World, ctx: &mut TickContext<'_>) {
        let query = *self
            .with_images
            .get_or_insert_with(|| world.register_query(QueryFilter::has_all(ComponentKind::TRACKED_IMAGE)));

        // Members are listed in the order their Added events fired. A
        // replaced TrackedImageRef fires nothing, so the sweep covers every
        // member still lacking an index.
        for event in world.drain_query_events(query) {
            if let QueryEvent::Added(entity) = event {
                log::trace!("{entity} carries a tracked image");
            }
        }
        let mut grew = false;
        world.query_live::<(&mut TrackedImageRef,)>(query, |entity, (image,)| {
            if image.tracking_index.is_some() {
                return;
            }
            let (index, new) = self.register(image);
            grew |= new;
            image.tracking_index = Some(index);
            log::debug!("{entity} tracks image #{index}");
        });
        if grew {
            ctx.platform.register_tracked_images(&self.images);
        }

        let mut polled: HashMap<usize, Option<Pose>> = HashMap::new();
        let platform = &mut *ctx.platform;
        world.query::<(&TrackedImageRef, &mut Position, &mut Rotation)>(|entity, (image, position, rotation)| {
            let pose = image.tracking_index.and_then(|index| {
                *polled
                    .entry(index)
                    .or_insert_with(|| platform.tracked_image_pose(index))
            });
            write_pose(entity, position, rotation, pose);
        });
    }
}

pub fn detected_plane_system(world: &mut World, ctx: &mut TickContext<'_>) {
    let mut polled = HashMap::new();
    let platform = &mut *ctx.platform;
    world.query::<(&DetectedPlaneRef, &mut Position, &mut Rotation)>(|entity, (plane, position, rotation)| {
        let pose = *polled
            .entry(plane.orientation)
            .or_insert_with(|| platform.detected_plane_pose(plane.orientation));
        write_pose(entity, position, rotation, pose);
    });
}

pub fn raycast_system(world: &mut World, ctx: &mut TickContext<'_>) {
    if world.entities_matching(QueryFilter::has_all(ComponentKind::RAYCAST)).is_empty() {
        return;
    }
    let pose = ctx.platform.hit_test_pose();
    world.query::<(&RaycastRef, &mut Position, &mut Rotation)>(|entity, (_, position, rotation)| {
        write_pose(entity, position, rotation, pose);
    });
}

pub fn viewer_pose_system(world: &mut World, ctx: &mut TickContext<'_>) {
    if world.entities_matching(QueryFilter::has_all(ComponentKind::VIEWER_POSE)).is_empty() {
        return;
    }
    let pose = ctx.platform.viewer_pose();
    world.query::<(&ViewerPoseTag, &mut Position, &mut Rotation)>(|entity, (_, position, rotation)| {
        write_pose(entity, position, rotation, pose);
    });
}
