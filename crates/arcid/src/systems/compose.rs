//! Transform-compose: write final poses into scene nodes.
//!
//! Runs last. For every renderable entity carrying any transform or
//! visibility component, the [`SceneNode`] receives
//!
//! ```text
//! position = position ?? start_position
//! rotation = rotation ?? start_rotation
//! scale    = scale    ?? start_scale
//! visible  = renderable.visible && visibility && world shown && pose known
//! ```
//!
//! "Pose known" fails when a group has neither a resolved nor a start value
//! (a tracked image that is out of view). The node then keeps its previous
//! pose and hides.

use crate::components::{Position, Renderable, Rotation, Scale, SceneNode, Visibility};
use crate::ecs::{ComponentKind, Entity, QueryFilter, TickContext, World};

fn composed() -> QueryFilter {
    QueryFilter::has_all(ComponentKind::RENDERABLE)
        .and_any(ComponentKind::TRANSFORM | ComponentKind::VISIBILITY)
}

pub fn compose_system(world: &mut World, ctx: &mut TickContext<'_>) {
    let filter = composed();
    let missing: Vec<Entity> = world
        .entities_matching(filter)
        .into_iter()
        .filter(|&e| !world.contains::<SceneNode>(e))
        .collect();
    for entity in missing {
        world.insert(entity, SceneNode::default());
    }

    let shown = ctx.world_shown;
    world.query_filtered::<(
        &Renderable,
        &mut SceneNode,
        Option<&Position>,
        Option<&Rotation>,
        Option<&Scale>,
        Option<&Visibility>,
    )>(filter, |_, (renderable, node, position, rotation, scale, visibility)| {
        let position = position.map(Position::effective);
        let rotation = rotation.map(Rotation::effective);
        let pose_known = !matches!(position, Some(None)) && !matches!(rotation, Some(None));

        if let Some(Some(p)) = position {
            node.position = p;
        }
        if let Some(Some(r)) = rotation {
            node.rotation = r;
        }
        if let Some(s) = scale {
            node.scale = s.effective();
        }
        node.handle = Some(renderable.handle);
        node.visible = renderable.visible
            && visibility.is_none_or(|v| v.is_visible)
            && shown
            && pose_known;
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::math::{Quat, Vec3};
    use crate::platform::RenderableHandle;
    use crate::platform::headless::{HeadlessAssets, HeadlessPlatform};
    use std::time::Duration;

    fn run(world: &mut World, world_shown: bool) {
        let mut platform = HeadlessPlatform::new();
        let mut assets = HeadlessAssets::new();
        let config = RuntimeConfig::default();
        let mut ctx = TickContext {
            delta: Duration::ZERO,
            tick: 0,
            platform: &mut platform,
            assets: &mut assets,
            config: &config,
            world_shown,
        };
        compose_system(world, &mut ctx);
    }

    fn renderable() -> Renderable {
        Renderable {
            handle: RenderableHandle(7),
            visible: true,
        }
    }

    #[test]
    fn resolved_values_win_over_start() {
        let mut world = World::new();
        let e = world.spawn((
            renderable(),
            Position {
                start_position: Some(Vec3::X),
                position: Some(Vec3::Y),
            },
            Rotation::new(Quat::from_rotation_z(0.5)),
            Scale {
                start_scale: Vec3::ONE,
                scale: Some(Vec3::splat(2.0)),
            },
            Visibility::default(),
        ));

        run(&mut world, true);

        let node = world.get::<SceneNode>(e).unwrap();
        assert_eq!(node.position, Vec3::Y);
        assert_eq!(node.rotation, Quat::from_rotation_z(0.5));
        assert_eq!(node.scale, Vec3::splat(2.0));
        assert_eq!(node.handle, Some(RenderableHandle(7)));
        assert!(node.visible);
    }

    #[test]
    fn world_hidden_hides_everything() {
        let mut world = World::new();
        let e = world.spawn((renderable(), Position::at(Vec3::ZERO)));
        run(&mut world, false);
        assert!(!world.get::<SceneNode>(e).unwrap().visible);
        run(&mut world, true);
        assert!(world.get::<SceneNode>(e).unwrap().visible);
    }

    #[test]
    fn invisible_entity_keeps_its_node_pose() {
        let mut world = World::new();
        let e = world.spawn((renderable(), Position::at(Vec3::X), Visibility::default()));
        run(&mut world, true);

        world.get_mut::<Visibility>(e).unwrap().is_visible = false;
        world.get_mut::<Position>(e).unwrap().start_position = None;
        run(&mut world, true);

        let node = world.get::<SceneNode>(e).unwrap();
        assert!(!node.visible);
        assert_eq!(node.position, Vec3::X);
    }

    #[test]
    fn lost_pose_hides_node() {
        let mut world = World::new();
        let e = world.spawn((renderable(), Position::unresolved(), Rotation::unresolved()));
        run(&mut world, true);
        assert!(!world.get::<SceneNode>(e).unwrap().visible);
    }

    #[test]
    fn entities_without_transform_or_visibility_are_skipped() {
        let mut world = World::new();
        let e = world.spawn((renderable(),));
        run(&mut world, true);
        assert!(world.get::<SceneNode>(e).is_none());
    }
}
