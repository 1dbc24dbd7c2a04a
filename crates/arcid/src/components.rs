//! # Components: The Closed Set an Entity Can Carry
//!
//! Plain data, mutated in place by systems. Each type binds to one bit of
//! [`ComponentKind`].
//!
//! ## Start vs. Resolved
//!
//! The transform components hold two values per group:
//!
//! ```text
//! start_position ── authored, or written by a tracking adapter
//!       │            (None = tracking lost / not yet known)
//!       ▼
//! anchor / parent resolution
//!       │
//!       ▼
//! position ──────── resolved this tick; None = not resolved yet
//! ```
//!
//! Resolved fields are only ever written by the resolution systems. The
//! write-out falls back to the start value when a resolved one is missing.

use serde::{Deserialize, Serialize};

use crate::cid::Cid;
use crate::ecs::{Component, ComponentKind};
use crate::math::{Axis, Channel, ChannelGroup, Pose, Quat, Vec3};
use crate::platform::{PlatformAnchorHandle, RenderableHandle};

macro_rules! impl_component {
    ($($ty:ty => $kind:ident),+ $(,)?) => {
        $(impl Component for $ty {
            const KIND: ComponentKind = ComponentKind::$kind;
        })+
    };
}

impl_component! {
    Identity => IDENTITY,
    Renderable => RENDERABLE,
    Position => POSITION,
    Rotation => ROTATION,
    Scale => SCALE,
    ParentRef => PARENT_REF,
    AnchorRef => ANCHOR_REF,
    IsAnchorTag => IS_ANCHOR,
    Visibility => VISIBILITY,
    TrackedImageRef => TRACKED_IMAGE,
    DetectedPlaneRef => DETECTED_PLANE,
    RaycastRef => RAYCAST,
    ViewerPoseTag => VIEWER_POSE,
    GltfModel => GLTF_MODEL,
    SceneNode => SCENE_NODE,
}

// ── Identity and rendering ──────────────────────────────────────────────

/// The CID of the record this entity was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub cid: Cid,
}

impl Identity {
    pub fn new(cid: Cid) -> Self {
        Self { cid }
    }
}

/// A loaded visual asset and whether it should draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Renderable {
    pub handle: RenderableHandle,
    pub visible: bool,
}

/// Progress of a model load requested for a [`GltfModel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    #[default]
    Unrequested,
    Requested,
    Loaded,
    /// Not retried.
    Failed,
}

/// A 3D model the entity displays once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GltfModel {
    pub asset: Cid,
    pub state: LoadState,
}

impl GltfModel {
    pub fn new(asset: Cid) -> Self {
        Self {
            asset,
            state: LoadState::Unrequested,
        }
    }
}

/// The renderer-facing node: final pose and visibility, written once per
/// tick by transform-compose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneNode {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub visible: bool,
    pub handle: Option<RenderableHandle>,
}

impl Default for SceneNode {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            visible: false,
            handle: None,
        }
    }
}

// ── Transform ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub start_position: Option<Vec3>,
    pub position: Option<Vec3>,
}

impl Position {
    /// Authored at `start`, not yet resolved.
    pub fn at(start: Vec3) -> Self {
        Self {
            start_position: Some(start),
            position: None,
        }
    }

    /// Unknown until a tracking adapter writes it.
    pub fn unresolved() -> Self {
        Self::default()
    }

    /// `position ?? start_position`.
    pub fn effective(&self) -> Option<Vec3> {
        self.position.or(self.start_position)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rotation {
    pub start_rotation: Option<Quat>,
    pub rotation: Option<Quat>,
}

impl Rotation {
    pub fn new(start: Quat) -> Self {
        Self {
            start_rotation: Some(start),
            rotation: None,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            start_rotation: None,
            rotation: None,
        }
    }

    pub fn effective(&self) -> Option<Quat> {
        self.rotation.or(self.start_rotation)
    }
}

impl Default for Rotation {
    fn default() -> Self {
        Self::new(Quat::IDENTITY)
    }
}

/// Scale always has a start value; only the resolved value can be missing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scale {
    pub start_scale: Vec3,
    pub scale: Option<Vec3>,
}

impl Scale {
    pub fn new(start: Vec3) -> Self {
        Self {
            start_scale: start,
            scale: None,
        }
    }

    pub fn uniform(factor: f32) -> Self {
        Self::new(Vec3::splat(factor))
    }

    pub fn effective(&self) -> Vec3 {
        self.scale.unwrap_or(self.start_scale)
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::uniform(1.0)
    }
}

// ── References ──────────────────────────────────────────────────────────

/// Position-only chaining to another record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentRef {
    pub parent: Cid,
}

/// Per-axis suppliers. Only rotation uses `w`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PerAxis {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<Cid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<Cid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub z: Option<Cid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub w: Option<Cid>,
}

impl PerAxis {
    pub fn get(&self, axis: Axis) -> Option<&Cid> {
        match axis {
            Axis::X => self.x.as_ref(),
            Axis::Y => self.y.as_ref(),
            Axis::Z => self.z.as_ref(),
            Axis::W => self.w.as_ref(),
        }
    }
}

/// Who supplies one transform group: a single anchor for all its axes, or a
/// separate anchor per axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnchorTarget {
    Uniform(Cid),
    PerAxis(PerAxis),
}

impl AnchorTarget {
    pub fn supplier(&self, axis: Axis) -> Option<&Cid> {
        match self {
            AnchorTarget::Uniform(cid) => Some(cid),
            AnchorTarget::PerAxis(axes) => axes.get(axis),
        }
    }
}

/// Anchors this entity's transform to other entities.
///
/// `anchor` supplies every channel when set and overrides the per-group
/// fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AnchorRef {
    pub anchor: Option<Cid>,
    pub position: Option<AnchorTarget>,
    pub rotation: Option<AnchorTarget>,
    pub scale: Option<AnchorTarget>,
}

impl AnchorRef {
    /// Anchor every channel to one entity.
    pub fn to(anchor: Cid) -> Self {
        Self {
            anchor: Some(anchor),
            ..Self::default()
        }
    }

    /// The CID supplying `channel`, if any.
    pub fn supplier(&self, channel: Channel) -> Option<&Cid> {
        if let Some(anchor) = &self.anchor {
            return Some(anchor);
        }
        let target = match channel.group {
            ChannelGroup::Position => self.position.as_ref(),
            ChannelGroup::Rotation => self.rotation.as_ref(),
            ChannelGroup::Scale => self.scale.as_ref(),
        }?;
        target.supplier(channel.axis)
    }

    /// Every distinct supplier, in channel order.
    pub fn suppliers(&self) -> Vec<&Cid> {
        let mut out: Vec<&Cid> = Vec::new();
        for channel in Channel::ALL {
            if let Some(cid) = self.supplier(channel) {
                if !out.contains(&cid) {
                    out.push(cid);
                }
            }
        }
        out
    }
}

// ── Platform anchors ────────────────────────────────────────────────────

/// Lifecycle of the platform anchor behind an [`IsAnchorTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorState {
    #[default]
    Uncreated,
    /// A creation request is in flight; `request` is its ticket number.
    Pending { request: u64 },
    Created(PlatformAnchorHandle),
}

/// Marks an entity as an anchor target that should be pinned by a platform
/// anchor once its pose is known.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IsAnchorTag {
    pub state: AnchorState,
    pub needs_recreate: bool,
    /// Pose the current platform anchor was created at.
    pub anchored_at: Option<Pose>,
}

impl IsAnchorTag {
    pub fn platform_anchor(&self) -> Option<PlatformAnchorHandle> {
        match self.state {
            AnchorState::Created(handle) => Some(handle),
            _ => None,
        }
    }
}

// ── Visibility and tracking adapters ────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visibility {
    pub is_visible: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self { is_visible: true }
    }
}

/// An image the platform should track; its pose becomes this entity's start
/// transform.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedImageRef {
    pub asset: Cid,
    pub width_meters: f32,
    /// Assigned when the image is registered with the platform.
    pub tracking_index: Option<usize>,
}

impl TrackedImageRef {
    pub fn new(asset: Cid, width_meters: f32) -> Self {
        Self {
            asset,
            width_meters,
            tracking_index: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaneOrientation {
    Horizontal,
    Vertical,
}

/// Follows the platform's detected plane of the given orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedPlaneRef {
    pub orientation: PlaneOrientation,
}

/// Follows the current hit-test result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RaycastRef;

/// Follows the viewer (the device camera).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewerPoseTag;
