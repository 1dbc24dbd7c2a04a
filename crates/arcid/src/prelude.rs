//! Convenience re-exports: `use arcid::prelude::*` for the common items.

pub use crate::cid::Cid;
pub use crate::components::{
    AnchorRef, AnchorState, AnchorTarget, DetectedPlaneRef, GltfModel, Identity, IsAnchorTag,
    LoadState, ParentRef, PerAxis, PlaneOrientation, Position, RaycastRef, Renderable, Rotation,
    Scale, SceneNode, TrackedImageRef, ViewerPoseTag, Visibility,
};
pub use crate::config::{CompositionMode, RuntimeConfig};
pub use crate::ecs::{
    Component, ComponentKind, Entity, QueryEvent, QueryFilter, QueryId, Schedule, System,
    TickContext, World,
};
pub use crate::error::{AssetError, CidError, ConfigError, PlatformAnchorError, RecordError};
pub use crate::math::{Pose, Quat, Vec3, Vec4};
pub use crate::platform::headless::{AnchorPolicy, HeadlessAssets, HeadlessPlatform};
pub use crate::platform::{
    AnchorCompletion, AnchorRequest, ArPlatform, AssetCompletion, AssetLoader, AssetRequest,
    PlatformAnchorHandle, RenderableHandle, TrackedImageSpec,
};
pub use crate::record::{EntityRecord, decode_package, decode_record};
pub use crate::runtime::{EntityPose, SceneRuntime};
pub use crate::scene::SceneSet;
