//! # Systems: The Per-Tick Pipeline
//!
//! ```text
//! scene_sync ─► gltf ─► parent ─► anchor ─► platform_anchor
//!     ─► tracked_image ─► detected_plane ─► raycast ─► viewer_pose ─► compose
//! ```
//!
//! The order is load-bearing. Resolution (`parent`, `anchor`) reads the
//! resolved values and tracking samples left by the previous tick, before the
//! adapters overwrite start fields and before `compose` writes nodes out. A
//! chain of anchors therefore lags one tick per link, and no tick ever
//! resolves recursively.

pub mod anchor;
pub mod compose;
pub mod gltf;
pub mod graph;
pub mod parent;
pub mod platform_anchor;
pub mod tracking;

use crate::ecs::Schedule;
use crate::scene::scene_sync_system;

pub use anchor::anchor_system;
pub use compose::compose_system;
pub use gltf::gltf_system;
pub use parent::parent_system;
pub use platform_anchor::{PlatformAnchors, platform_anchor_system};
pub use tracking::{TrackedImageSystem, detected_plane_system, raycast_system, viewer_pose_system};

/// The fixed pipeline run by [`SceneRuntime::tick`](crate::runtime::SceneRuntime::tick).
pub fn default_schedule() -> Schedule {
    let mut schedule = Schedule::new();
    schedule
        .add_system(scene_sync_system)
        .add_system(gltf_system)
        .add_system(parent_system)
        .add_system(anchor_system)
        .add_system(platform_anchor_system)
        .add_system(TrackedImageSystem::new())
        .add_system(detected_plane_system)
        .add_system(raycast_system)
        .add_system(viewer_pose_system)
        .add_system(compose_system);
    schedule
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pipeline_order() {
        assert_eq!(
            default_schedule().system_names(),
            vec![
                "scene_sync_system",
                "gltf_system",
                "parent_system",
                "anchor_system",
                "platform_anchor_system",
                "TrackedImageSystem",
                "detected_plane_system",
                "raycast_system",
                "viewer_pose_system",
                "compose_system",
            ]
        );
    }
}
