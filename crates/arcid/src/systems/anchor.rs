//! # Anchor-Chain Resolution
//!
//! Every entity carrying [`AnchorRef`] gets its transform assembled from up
//! to ten channels, each possibly supplied by a different anchor entity:
//!
//! ```text
//!            position.x  position.y  position.z   rotation.x..w   scale.x..z
//! AnchorRef:   CID_A        CID_A       CID_A        CID_B            -
//!                │                       │            │
//!  lookup ───────┴───────────────────────┘            │
//!  (last tick)   A: position ?? start_position        B: rotation ?? start_rotation
//!                                                                  (unsupplied → identity)
//!                         ▼
//!  anchor frame:  pos_A, rot_B, scale 1
//!                         ▼
//!  compose with own start:
//!      position = pos_A + rot_B * start_position
//!      rotation = rot_B * start_rotation
//!      scale    = 1 * start_scale
//! ```
//!
//! ## Visibility
//!
//! The entity is visible only when every channel that names a supplier found
//! that supplier alive with a start value for the group. One failure is
//! enough: the entity turns invisible and its resolved fields keep last
//! tick's values, so a brief tracking loss does not snap the object to the
//! origin. A channel without a supplier is not a failure; it takes the
//! identity value.
//!
//! ## One Tick of Latency
//!
//! Suppliers are read from a [`ResolutionFrame`] captured before this system
//! writes anything. A chain `A → B → C` therefore needs two ticks to settle,
//! and cycles terminate (see [`super::graph`]).
//!
//! ## Dropping the Anchor
//!
//! When an entity loses its [`AnchorRef`] it becomes visible again and its
//! resolved fields are cleared, so it falls back to its start transform. A
//! [`ParentRef`] keeps its resolved position, which the parent system owns.

use crate::components::{AnchorRef, ParentRef, Position, Rotation, Scale, Visibility};
use crate::config::CompositionMode;
use crate::ecs::{ComponentKind, Entity, QueryEvent, QueryFilter, QueryId, TickContext, World};
use crate::math::{Channel, ChannelFrame, Quat, Vec3};

use super::graph::ResolutionFrame;

/// A composed transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Composed {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// Gather the anchor frame for `anchor`, or `None` if any supplied channel
/// can't be resolved.
pub fn gather(entity: Entity, anchor: &AnchorRef, frame: &ResolutionFrame) -> Option<ChannelFrame> {
    let mut channels = ChannelFrame::identity();
    for channel in Channel::ALL {
        let Some(cid) = anchor.supplier(channel) else {
            continue;
        };
        let value = frame
            .supplied_to(entity, cid)
            .and_then(|sample| sample.channel_value(channel))?;
        channels.set(channel, value);
    }
    Some(channels)
}

/// Combine an anchor frame with an entity's own start transform.
pub fn compose(
    anchor: &ChannelFrame,
    start_position: Vec3,
    start_rotation: Quat,
    start_scale: Vec3,
    mode: CompositionMode,
) -> Composed {
    let anchor_rotation = anchor.rotation();
    let offset = match mode {
        CompositionMode::RotationAware => anchor_rotation * start_position,
        CompositionMode::LegacySum => start_position,
    };
    Composed {
        position: anchor.position() + offset,
        rotation: (anchor_rotation * start_rotation).normalize(),
        scale: anchor.scale() * start_scale,
    }
}

/// Live query over entities carrying [`AnchorRef`].
struct Anchored(QueryId);

fn release_unanchored(world: &mut World) {
    let query = match world.get_resource::<Anchored>() {
        Some(anchored) => anchored.0,
        None => {
            let query = world.register_query(QueryFilter::has_all(ComponentKind::ANCHOR_REF));
            world.insert_resource(Anchored(query));
            query
        }
    };

    for event in world.drain_query_events(query) {
        let QueryEvent::Removed(entity) = event else {
            continue;
        };
        if !world.is_alive(entity) {
            continue;
        }
        log::debug!("{entity} dropped its anchor; back to start transform");
        if let Some(visibility) = world.get_mut::<Visibility>(entity) {
            visibility.is_visible = true;
        }
        if !world.contains::<ParentRef>(entity) {
            if let Some(position) = world.get_mut::<Position>(entity) {
                position.position = None;
            }
        }
        if let Some(rotation) = world.get_mut::<Rotation>(entity) {
            rotation.rotation = None;
        }
        if let Some(scale) = world.get_mut::<Scale>(entity) {
            scale.scale = None;
        }
    }
}

pub fn anchor_system(world: &mut World, ctx: &mut TickContext<'_>) {
    release_unanchored(world);

    let frame = ResolutionFrame::capture(world);
    let mode = ctx.config.composition;

    world.query::<(&AnchorRef, &mut Position, &mut Rotation, &mut Scale, &mut Visibility)>(
        |entity, (anchor, position, rotation, scale, visibility)| {
            let own = (position.start_position, rotation.start_rotation);
            let resolved = match (gather(entity, anchor, &frame), own) {
                (Some(channels), (Some(start_position), Some(start_rotation))) => Some(compose(
                    &channels,
                    start_position,
                    start_rotation,
                    scale.start_scale,
                    mode,
                )),
                _ => None,
            };

            let now_visible = resolved.is_some();
            if visibility.is_visible != now_visible {
                log::debug!(
                    "{entity} {} (anchor chain)",
                    if now_visible { "resolved" } else { "lost its anchors" }
                );
            }
            visibility.is_visible = now_visible;

            if let Some(out) = resolved {
                position.position = Some(out.position);
                rotation.rotation = Some(out.rotation);
                scale.scale = Some(out.scale);
            }
        },
    );
}
