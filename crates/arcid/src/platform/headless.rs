//! Scripted collaborators for tests, demos and server-side replay.
//!
//! [`HeadlessPlatform`] answers pose queries from values set by the caller
//! and creates platform anchors according to an [`AnchorPolicy`].
//! [`HeadlessAssets`] "loads" every asset immediately unless told it is
//! missing. Both keep a log of what the runtime asked for.

use std::collections::{HashMap, HashSet};

use crate::cid::Cid;
use crate::components::PlaneOrientation;
use crate::error::{AssetError, PlatformAnchorError};
use crate::math::Pose;

use super::{
    AnchorRequest, AnchorTicket, ArPlatform, AssetLoader, AssetRequest, PlatformAnchorHandle,
    RenderableHandle, TrackedImageSpec,
};

/// How [`HeadlessPlatform`] answers anchor creation requests.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AnchorPolicy {
    /// Succeed inside `request_anchor`.
    #[default]
    Immediate,
    /// Hold requests until [`HeadlessPlatform::complete_pending`] or
    /// [`HeadlessPlatform::fail_pending`].
    Manual,
    /// Fail every request with [`PlatformAnchorError::Rejected`].
    Reject(String),
}

/// One anchor request as seen by the platform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RequestedAnchor {
    pub ticket: AnchorTicket,
    pub pose: Pose,
}

#[derive(Default)]
pub struct HeadlessPlatform {
    policy: AnchorPolicy,
    next_handle: u64,
    requested: Vec<RequestedAnchor>,
    pending: Vec<AnchorRequest>,
    live: Vec<PlatformAnchorHandle>,
    deleted: Vec<PlatformAnchorHandle>,
    images: Vec<TrackedImageSpec>,
    image_poses: HashMap<usize, Pose>,
    plane_poses: HashMap<PlaneOrientation, Pose>,
    hit_test: Option<Pose>,
    viewer: Option<Pose>,
}

impl HeadlessPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_anchor_policy(mut self, policy: AnchorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_anchor_policy(&mut self, policy: AnchorPolicy) {
        self.policy = policy;
    }

    pub fn set_tracked_image_pose(&mut self, tracking_index: usize, pose: Option<Pose>) {
        match pose {
            Some(pose) => self.image_poses.insert(tracking_index, pose),
            None => self.image_poses.remove(&tracking_index),
        };
    }

    pub fn set_plane_pose(&mut self, orientation: PlaneOrientation, pose: Option<Pose>) {
        match pose {
            Some(pose) => self.plane_poses.insert(orientation, pose),
            None => self.plane_poses.remove(&orientation),
        };
    }

    pub fn set_hit_test_pose(&mut self, pose: Option<Pose>) {
        self.hit_test = pose;
    }

    pub fn set_viewer_pose(&mut self, pose: Option<Pose>) {
        self.viewer = pose;
    }

    /// Every anchor request received, in order.
    pub fn anchor_requests(&self) -> &[RequestedAnchor] {
        &self.requested
    }

    /// Anchors created and not yet deleted.
    pub fn live_anchors(&self) -> &[PlatformAnchorHandle] {
        &self.live
    }

    pub fn deleted_anchors(&self) -> &[PlatformAnchorHandle] {
        &self.deleted
    }

    pub fn pending_anchor_count(&self) -> usize {
        self.pending.len()
    }

    /// Images registered for tracking, by tracking index.
    pub fn tracked_images(&self) -> &[TrackedImageSpec] {
        &self.images
    }

    /// Create every held anchor request. Returns how many were completed.
    pub fn complete_pending(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for request in pending {
            let handle = self.create_handle();
            request.resolve(Ok(handle));
        }
        count
    }

    /// Fail every held anchor request with `error`.
    pub fn fail_pending(&mut self, error: PlatformAnchorError) -> usize {
        let pending = std::mem::take(&mut self.pending);
        let count = pending.len();
        for request in pending {
            request.resolve(Err(error.clone()));
        }
        count
    }

    fn create_handle(&mut self) -> PlatformAnchorHandle {
        self.next_handle += 1;
        let handle = PlatformAnchorHandle(self.next_handle);
        self.live.push(handle);
        handle
    }
}

impl ArPlatform for HeadlessPlatform {
    fn request_anchor(&mut self, request: AnchorRequest) {
        self.requested.push(RequestedAnchor {
            ticket: request.ticket,
            pose: request.pose,
        });
        match &self.policy {
            AnchorPolicy::Immediate => {
                let handle = self.create_handle();
                request.resolve(Ok(handle));
            }
            AnchorPolicy::Manual => self.pending.push(request),
            AnchorPolicy::Reject(reason) => {
                let reason = reason.clone();
                request.resolve(Err(PlatformAnchorError::Rejected(reason)));
            }
        }
    }

    fn delete_anchor(&mut self, handle: PlatformAnchorHandle) {
        self.live.retain(|&h| h != handle);
        self.deleted.push(handle);
    }

    fn register_tracked_images(&mut self, images: &[TrackedImageSpec]) {
        self.images = images.to_vec();
    }

    fn tracked_image_pose(&mut self, tracking_index: usize) -> Option<Pose> {
        self.image_poses.get(&tracking_index).copied()
    }

    fn detected_plane_pose(&mut self, orientation: PlaneOrientation) -> Option<Pose> {
        self.plane_poses.get(&orientation).copied()
    }

    fn hit_test_pose(&mut self) -> Option<Pose> {
        self.hit_test
    }

    fn viewer_pose(&mut self) -> Option<Pose> {
        self.viewer
    }
}

/// Loads everything immediately, except assets marked missing.
#[derive(Default)]
pub struct HeadlessAssets {
    next_handle: u64,
    missing: HashSet<Cid>,
    requested: Vec<Cid>,
}

impl HeadlessAssets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Future loads of `asset` fail with [`AssetError::NotFound`].
    pub fn mark_missing(&mut self, asset: Cid) {
        self.missing.insert(asset);
    }

    /// Every asset requested, in order.
    pub fn requests(&self) -> &[Cid] {
        &self.requested
    }
}

impl AssetLoader for HeadlessAssets {
    fn load(&mut self, request: AssetRequest) {
        self.requested.push(request.asset.clone());
        if self.missing.contains(&request.asset) {
            let error = AssetError::NotFound(request.asset.clone());
            request.resolve(Err(error));
            return;
        }
        self.next_handle += 1;
        let handle = RenderableHandle(self.next_handle);
        request.resolve(Ok(handle));
    }
}
