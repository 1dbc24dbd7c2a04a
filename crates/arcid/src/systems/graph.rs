//! What anchor and parent resolution read: a frozen copy of last tick's
//! transforms, the CID index, and the reference graph between entities.
//!
//! Resolution never reads a value written earlier in the same pass, so the
//! order entities are visited in cannot change the result, and a reference
//! cycle cannot recurse. On top of that, a supplier that itself depends
//! (directly or transitively) on the reader is read through its start values
//! only. Without that, two entities anchored to each other would feed each
//! other's output back every tick and drift; with it, a cycle settles after
//! one tick to a fixed value.

use std::collections::{HashMap, HashSet};

use crate::cid::Cid;
use crate::components::{AnchorRef, Identity, ParentRef, Position, Rotation, Scale};
use crate::ecs::{Entity, World};
use crate::math::{Channel, ChannelGroup, Quat, Vec3};

/// One entity's transform fields as they were when the frame was captured.
/// A missing component reads as `None` in every field of its group.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransformSample {
    pub start_position: Option<Vec3>,
    pub position: Option<Vec3>,
    pub start_rotation: Option<Quat>,
    pub rotation: Option<Quat>,
    pub start_scale: Option<Vec3>,
    pub scale: Option<Vec3>,
}

impl TransformSample {
    fn of(world: &World, entity: Entity) -> Self {
        let position = world.get::<Position>(entity);
        let rotation = world.get::<Rotation>(entity);
        let scale = world.get::<Scale>(entity);
        Self {
            start_position: position.and_then(|p| p.start_position),
            position: position.and_then(|p| p.position),
            start_rotation: rotation.and_then(|r| r.start_rotation),
            rotation: rotation.and_then(|r| r.rotation),
            start_scale: scale.map(|s| s.start_scale),
            scale: scale.and_then(|s| s.scale),
        }
    }

    /// The same sample with resolved values dropped.
    pub fn start_only(self) -> Self {
        Self {
            position: None,
            rotation: None,
            scale: None,
            ..self
        }
    }

    /// `position ?? start_position`, but only while a start value exists:
    /// an entity that lost tracking supplies nothing.
    pub fn supplied_position(&self) -> Option<Vec3> {
        self.start_position.map(|start| self.position.unwrap_or(start))
    }

    pub fn supplied_rotation(&self) -> Option<Quat> {
        self.start_rotation.map(|start| self.rotation.unwrap_or(start))
    }

    pub fn supplied_scale(&self) -> Option<Vec3> {
        self.start_scale.map(|start| self.scale.unwrap_or(start))
    }

    /// The scalar this sample supplies for `channel`.
    pub fn channel_value(&self, channel: Channel) -> Option<f32> {
        match channel.group {
            ChannelGroup::Position => self.supplied_position().map(|v| channel.of_vec3(v)),
            ChannelGroup::Rotation => self.supplied_rotation().map(|q| channel.of_quat(q)),
            ChannelGroup::Scale => self.supplied_scale().map(|v| channel.of_vec3(v)),
        }
    }
}

/// Frozen view of the world taken at the start of a resolution system.
pub struct ResolutionFrame {
    by_cid: HashMap<Cid, Entity>,
    samples: HashMap<Entity, TransformSample>,
    /// entity → entities it reads from (parents and anchor suppliers found).
    edges: HashMap<Entity, Vec<Entity>>,
}

impl ResolutionFrame {
    pub fn capture(world: &World) -> Self {
        let mut by_cid = HashMap::new();
        let mut samples = HashMap::new();
        for &entity in world.entities() {
            if let Some(identity) = world.get::<Identity>(entity) {
                if world.lookup(&identity.cid) == Some(entity) {
                    by_cid.insert(identity.cid.clone(), entity);
                }
            }
            samples.insert(entity, TransformSample::of(world, entity));
        }

        let mut edges: HashMap<Entity, Vec<Entity>> = HashMap::new();
        for &entity in world.entities() {
            let mut targets: Vec<&Cid> = Vec::new();
            if let Some(parent) = world.get::<ParentRef>(entity) {
                targets.push(&parent.parent);
            }
            if let Some(anchor) = world.get::<AnchorRef>(entity) {
                targets.extend(anchor.suppliers());
            }
            let found: Vec<Entity> = targets
                .into_iter()
                .filter_map(|cid| by_cid.get(cid).copied())
                .collect();
            if !found.is_empty() {
                edges.insert(entity, found);
            }
        }

        Self {
            by_cid,
            samples,
            edges,
        }
    }

    pub fn find(&self, cid: &Cid) -> Option<Entity> {
        self.by_cid.get(cid).copied()
    }

    pub fn sample(&self, entity: Entity) -> TransformSample {
        self.samples.get(&entity).copied().unwrap_or_default()
    }

    /// What `reader` sees of the entity named `cid`, or `None` if no live
    /// entity carries that CID.
    pub fn supplied_to(&self, reader: Entity, cid: &Cid) -> Option<TransformSample> {
        let supplier = self.find(cid)?;
        let sample = self.sample(supplier);
        if self.depends_on(supplier, reader) {
            Some(sample.start_only())
        } else {
            Some(sample)
        }
    }

    /// Whether `from` reads (directly or through others) from `target`.
    /// An entity always depends on itself.
    pub fn depends_on(&self, from: Entity, target: Entity) -> bool {
        if from == target {
            return true;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(current) = stack.pop() {
            if !seen.insert(current) {
                continue;
            }
            for &next in self.edges.get(&current).map(Vec::as_slice).unwrap_or(&[]) {
                if next == target {
                    return true;
                }
                stack.push(next);
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::AnchorTarget;

    fn cid(s: &str) -> Cid {
        Cid::parse(s).unwrap()
    }

    #[test]
    fn lost_start_supplies_nothing_even_with_resolved_value() {
        let sample = TransformSample {
            start_position: None,
            position: Some(Vec3::ONE),
            ..TransformSample::default()
        };
        assert_eq!(sample.supplied_position(), None);
        assert_eq!(sample.channel_value(Channel::ALL[0]), None);
    }

    #[test]
    fn resolved_value_wins_over_start() {
        let sample = TransformSample {
            start_position: Some(Vec3::X),
            position: Some(Vec3::Y),
            ..TransformSample::default()
        };
        assert_eq!(sample.supplied_position(), Some(Vec3::Y));
        assert_eq!(sample.start_only().supplied_position(), Some(Vec3::X));
    }

    #[test]
    fn cycle_members_read_each_other_through_start_values() {
        let mut world = World::new();
        let a = world.spawn((
            Identity::new(cid("bafyA")),
            Position {
                start_position: Some(Vec3::X),
                position: Some(Vec3::splat(9.0)),
            },
            AnchorRef::to(cid("bafyB")),
        ));
        let b = world.spawn((
            Identity::new(cid("bafyB")),
            Position::at(Vec3::Y),
            AnchorRef {
                position: Some(AnchorTarget::Uniform(cid("bafyA"))),
                ..AnchorRef::default()
            },
        ));
        let c = world.spawn((
            Identity::new(cid("bafyC")),
            Position::at(Vec3::Z),
            AnchorRef::to(cid("bafyA")),
        ));

        let frame = ResolutionFrame::capture(&world);
        assert!(frame.depends_on(a, b));
        assert!(frame.depends_on(b, a));
        assert!(frame.depends_on(c, b));
        assert!(!frame.depends_on(a, c));

        let seen_by_b = frame.supplied_to(b, &cid("bafyA")).unwrap();
        assert_eq!(seen_by_b.supplied_position(), Some(Vec3::X));
        let seen_by_c = frame.supplied_to(c, &cid("bafyA")).unwrap();
        assert_eq!(seen_by_c.supplied_position(), Some(Vec3::splat(9.0)));
    }

    #[test]
    fn self_reference_reads_start() {
        let mut world = World::new();
        let a = world.spawn((
            Identity::new(cid("bafyA")),
            Position {
                start_position: Some(Vec3::X),
                position: Some(Vec3::Y),
            },
            ParentRef { parent: cid("bafyA") },
        ));
        let frame = ResolutionFrame::capture(&world);
        let own = frame.supplied_to(a, &cid("bafyA")).unwrap();
        assert_eq!(own.supplied_position(), Some(Vec3::X));
    }

    #[test]
    fn unknown_cid_is_not_found() {
        let mut world = World::new();
        let a = world.spawn((Position::at(Vec3::ZERO),));
        let frame = ResolutionFrame::capture(&world);
        assert!(frame.supplied_to(a, &cid("bafyMissing")).is_none());
    }
}
