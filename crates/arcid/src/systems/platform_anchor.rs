//! # Platform Anchor Lifecycle
//!
//! Entities tagged [`IsAnchorTag`] get pinned to the physical world by a
//! platform anchor once their start pose is known:
//!
//! ```text
//!               start pose known
//!  Uncreated ──────────────────────► Pending ──── reply Ok ────► Created
//!      ▲          request anchor        │  │                       │
//!      │                                │  └─ still no handle:     │ needs_recreate
//!      └──────── reply Err (logged) ────┘     request again        │ (or pose drifted)
//!                                              next tick           ▼
//!                                   Pending ◄── delete old handle, request
//! ```
//!
//! While no handle is stored the system issues exactly one request per tick;
//! rate limiting belongs to the platform. Requests never block: replies land
//! in a [`ReplyQueue`] and are applied at the start of a later tick.
//!
//! Handles nobody can use are deleted right away: a second success for an
//! entity that already has its anchor, a success for an entity that was
//! removed (or untagged) while the request was in flight, and the anchor of
//! an entity that is removed later on.

use std::collections::HashMap;

use crate::components::{AnchorState, IsAnchorTag, Position, Rotation};
use crate::ecs::{ComponentKind, Entity, QueryEvent, QueryFilter, QueryId, TickContext, World};
use crate::math::Pose;
use crate::platform::{
    AnchorCompletion, AnchorRequest, AnchorTicket, ArPlatform, PlatformAnchorHandle, ReplyQueue,
};

/// Bookkeeping for platform anchors, kept as a world resource.
pub struct PlatformAnchors {
    replies: ReplyQueue<AnchorCompletion>,
    next_request: u64,
    /// Pose each outstanding request was issued at.
    in_flight: HashMap<AnchorTicket, Pose>,
    /// Anchors currently held by a tagged entity.
    owned: HashMap<Entity, PlatformAnchorHandle>,
    tagged: QueryId,
}

impl PlatformAnchors {
    fn new(tagged: QueryId) -> Self {
        Self {
            replies: ReplyQueue::new(),
            next_request: 0,
            in_flight: HashMap::new(),
            owned: HashMap::new(),
            tagged,
        }
    }

    /// Requests issued and not yet answered.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn handle_of(&self, entity: Entity) -> Option<PlatformAnchorHandle> {
        self.owned.get(&entity).copied()
    }

    fn ticket(&mut self, entity: Entity) -> AnchorTicket {
        self.next_request += 1;
        AnchorTicket {
            entity,
            request: self.next_request,
        }
    }
}

pub fn platform_anchor_system(world: &mut World, ctx: &mut TickContext<'_>) {
    let mut anchors = match world.resource_remove::<PlatformAnchors>() {
        Some(anchors) => anchors,
        None => {
            let tagged = world.register_query(QueryFilter::has_all(ComponentKind::IS_ANCHOR));
            PlatformAnchors::new(tagged)
        }
    };

    release_untagged(world, &mut anchors, ctx.platform);
    for completion in anchors.replies.drain() {
        apply_completion(world, &mut anchors, ctx.platform, completion);
    }

    // Decide who needs a request this tick.
    let tolerance = ctx
        .config
        .recreate_anchor_on_move
        .then_some((ctx.config.anchor_move_tolerance, ctx.config.anchor_turn_tolerance));
    let mut wanted: Vec<(Entity, Pose, Option<PlatformAnchorHandle>)> = Vec::new();
    world.query::<(&mut IsAnchorTag, &Position, &Rotation)>(|entity, (tag, position, rotation)| {
        let (Some(p), Some(r)) = (position.start_position, rotation.start_rotation) else {
            return;
        };
        let pose = Pose::new(p, r);
        match tag.state {
            AnchorState::Created(handle) => {
                if let (Some((distance, angle)), Some(at)) = (tolerance, tag.anchored_at) {
                    if !at.is_near(&pose, distance, angle) && !tag.needs_recreate {
                        log::debug!("{entity} moved away from its platform anchor; recreating");
                        tag.needs_recreate = true;
                    }
                }
                if tag.needs_recreate {
                    wanted.push((entity, pose, Some(handle)));
                }
            }
            AnchorState::Uncreated | AnchorState::Pending { .. } => wanted.push((entity, pose, None)),
        }
    });

    for (entity, pose, stale) in wanted {
        if let Some(handle) = stale {
            ctx.platform.delete_anchor(handle);
            anchors.owned.remove(&entity);
        }
        let ticket = anchors.ticket(entity);
        if let Some(tag) = world.get_mut::<IsAnchorTag>(entity) {
            if tag.state == AnchorState::Uncreated {
                log::debug!("{entity} requesting platform anchor");
            }
            tag.state = AnchorState::Pending {
                request: ticket.request,
            };
            tag.needs_recreate = false;
            tag.anchored_at = None;
        }
        anchors.in_flight.insert(ticket, pose);
        ctx.platform.request_anchor(AnchorRequest {
            ticket,
            pose,
            reply: anchors.replies.sender(),
        });
    }

    world.insert_resource(anchors);
}

/// Delete anchors whose entity lost its tag or was removed.
fn release_untagged(world: &mut World, anchors: &mut PlatformAnchors, platform: &mut dyn ArPlatform) {
    for event in world.drain_query_events(anchors.tagged) {
        if let QueryEvent::Removed(entity) = event {
            if let Some(handle) = anchors.owned.remove(&entity) {
                log::debug!("{entity} left; deleting platform anchor {handle:?}");
                platform.delete_anchor(handle);
            }
        }
    }
}

fn apply_completion(
    world: &mut World,
    anchors: &mut PlatformAnchors,
    platform: &mut dyn ArPlatform,
    completion: AnchorCompletion,
) {
    let AnchorCompletion { ticket, result } = completion;
    let entity = ticket.entity;
    let pose = anchors.in_flight.remove(&ticket);

    let Some(tag) = world.get_mut::<IsAnchorTag>(entity) else {
        match result {
            Ok(handle) => {
                log::debug!("platform anchor {handle:?} arrived for departed {entity}; deleting");
                platform.delete_anchor(handle);
            }
            Err(err) => log::debug!("anchor request for departed {entity} failed: {err}"),
        }
        return;
    };

    match (tag.state, result) {
        (AnchorState::Created(_), Ok(extra)) => {
            log::trace!("{entity} already anchored; deleting extra anchor {extra:?}");
            platform.delete_anchor(extra);
        }
        (_, Ok(handle)) => {
            log::debug!("{entity} anchored by platform anchor {handle:?}");
            tag.state = AnchorState::Created(handle);
            tag.anchored_at = pose;
            anchors.owned.insert(entity, handle);
        }
        (AnchorState::Created(_), Err(err)) => {
            log::debug!("stale anchor request for {entity} failed: {err}");
        }
        (_, Err(err)) => {
            log::warn!("platform anchor for {entity} failed: {err}; retrying next tick");
            tag.state = AnchorState::Uncreated;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuntimeConfig;
    use crate::error::PlatformAnchorError;
    use crate::math::{Quat, Vec3};
    use crate::platform::headless::{AnchorPolicy, HeadlessAssets, HeadlessPlatform};
    use std::time::Duration;

    struct Harness {
        world: World,
        platform: HeadlessPlatform,
        config: RuntimeConfig,
    }

    impl Harness {
        fn new(policy: AnchorPolicy) -> Self {
            crate::logging::init_for_tests();
            Self {
                world: World::new(),
                platform: HeadlessPlatform::new().with_anchor_policy(policy),
                config: RuntimeConfig::default(),
            }
        }

        fn tick(&mut self) {
            let mut assets = HeadlessAssets::new();
            let mut ctx = TickContext {
                delta: Duration::ZERO,
                tick: 0,
                platform: &mut self.platform,
                assets: &mut assets,
                config: &self.config,
                world_shown: true,
            };
            platform_anchor_system(&mut self.world, &mut ctx);
        }

        fn anchor(&mut self, start: Option<Vec3>) -> Entity {
            self.world.spawn((
                IsAnchorTag::default(),
                Position {
                    start_position: start,
                    position: None,
                },
                Rotation::default(),
            ))
        }

        fn state(&self, entity: Entity) -> AnchorState {
            self.world.get::<IsAnchorTag>(entity).unwrap().state
        }
    }

    #[test]
    fn waits_for_a_start_pose() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        let e = h.anchor(None);
        h.tick();
        h.tick();
        assert!(h.platform.anchor_requests().is_empty());
        assert_eq!(h.state(e), AnchorState::Uncreated);
    }

    #[test]
    fn one_request_per_tick_until_handle_stored() {
        let mut h = Harness::new(AnchorPolicy::Manual);
        let e = h.anchor(Some(Vec3::X));

        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 1);
        assert!(matches!(h.state(e), AnchorState::Pending { .. }));
        h.tick();
        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 3);

        h.platform.complete_pending();
        h.tick();
        let AnchorState::Created(handle) = h.state(e) else {
            panic!("expected a created anchor");
        };
        // The first success wins; the two later ones are deleted.
        assert_eq!(h.platform.live_anchors(), &[handle]);
        assert_eq!(h.platform.deleted_anchors().len(), 2);

        h.tick();
        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 3);
    }

    #[test]
    fn immediate_success_needs_a_single_request() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        let e = h.anchor(Some(Vec3::ZERO));
        for _ in 0..4 {
            h.tick();
        }
        assert_eq!(h.platform.anchor_requests().len(), 1);
        assert_eq!(h.state(e), AnchorState::Created(PlatformAnchorHandle(1)));
        let anchors = h.world.get_resource::<PlatformAnchors>().unwrap();
        assert_eq!(anchors.handle_of(e), Some(PlatformAnchorHandle(1)));
        assert_eq!(anchors.in_flight(), 0);
    }

    #[test]
    fn failure_returns_to_uncreated_and_retries() {
        let mut h = Harness::new(AnchorPolicy::Reject("tracking lost".into()));
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.tick();
        assert_eq!(h.state(e), AnchorState::Pending { request: 2 });
        assert_eq!(h.platform.anchor_requests().len(), 2);

        h.platform.set_anchor_policy(AnchorPolicy::Immediate);
        h.tick();
        h.tick();
        assert!(matches!(h.state(e), AnchorState::Created(_)));
    }

    #[test]
    fn needs_recreate_deletes_old_handle_and_requests_again() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.tick();
        let AnchorState::Created(first) = h.state(e) else {
            panic!("expected a created anchor");
        };

        h.world.get_mut::<IsAnchorTag>(e).unwrap().needs_recreate = true;
        h.tick();
        assert_eq!(h.platform.deleted_anchors(), &[first]);
        assert!(matches!(h.state(e), AnchorState::Pending { .. }));
        assert!(!h.world.get::<IsAnchorTag>(e).unwrap().needs_recreate);

        h.tick();
        assert_eq!(h.state(e), AnchorState::Created(PlatformAnchorHandle(2)));
        assert_eq!(h.platform.anchor_requests().len(), 2);
    }

    #[test]
    fn drifting_start_pose_triggers_recreate() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.tick();

        h.world.get_mut::<Position>(e).unwrap().start_position = Some(Vec3::new(0.005, 0.0, 0.0));
        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 1);

        h.world.get_mut::<Rotation>(e).unwrap().start_rotation = Some(Quat::from_rotation_y(0.5));
        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 2);
        assert_eq!(h.platform.anchor_requests()[1].pose.rotation, Quat::from_rotation_y(0.5));
    }

    #[test]
    fn drift_is_ignored_when_disabled() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        h.config.recreate_anchor_on_move = false;
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.tick();
        h.world.get_mut::<Position>(e).unwrap().start_position = Some(Vec3::splat(10.0));
        h.tick();
        assert_eq!(h.platform.anchor_requests().len(), 1);
    }

    #[test]
    fn reply_for_removed_entity_is_deleted() {
        let mut h = Harness::new(AnchorPolicy::Manual);
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.world.despawn(e);
        h.platform.complete_pending();
        h.tick();
        assert!(h.platform.live_anchors().is_empty());
        assert_eq!(h.platform.deleted_anchors(), &[PlatformAnchorHandle(1)]);
    }

    #[test]
    fn removing_an_anchored_entity_deletes_its_anchor() {
        let mut h = Harness::new(AnchorPolicy::Immediate);
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.tick();
        h.world.despawn(e);
        h.tick();
        assert_eq!(h.platform.deleted_anchors(), &[PlatformAnchorHandle(1)]);
        assert!(h.platform.live_anchors().is_empty());
    }

    #[test]
    fn session_end_is_logged_not_fatal() {
        let mut h = Harness::new(AnchorPolicy::Manual);
        let e = h.anchor(Some(Vec3::ZERO));
        h.tick();
        h.platform.fail_pending(PlatformAnchorError::SessionEnded);
        h.tick();
        assert!(matches!(h.state(e), AnchorState::Pending { .. }));
    }
}
