//! Parent-chain resolution: position only.
//!
//! This is the older, simpler way records were placed relative to each other.
//! A child's position is its parent's position plus its own start position;
//! the parent's rotation and scale are ignored, and a missing parent does not
//! hide anything. Records that need rotation or visibility semantics use
//! [`AnchorRef`](crate::components::AnchorRef) instead.
//!
//! Like anchor resolution, parents are read from last tick's values.

use crate::components::{ParentRef, Position};
use crate::ecs::{TickContext, World};
use crate::math::Vec3;

use super::graph::ResolutionFrame;

pub fn parent_system(world: &mut World, _ctx: &mut TickContext<'_>) {
    let frame = ResolutionFrame::capture(world);

    world.query::<(&ParentRef, &mut Position)>(|entity, (parent, position)| {
        let parent_position = frame
            .supplied_to(entity, &parent.parent)
            .and_then(|sample| sample.supplied_position());

        // Not found: clear the resolved value so write-out falls back to start.
        position.position =
            parent_position.map(|p| p + position.start_position.unwrap_or(Vec3::ZERO));
    });
}
