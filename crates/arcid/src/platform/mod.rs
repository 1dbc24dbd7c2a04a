//! # Platform: Collaborators the Runtime Talks To
//!
//! The core never renders, fetches or talks to an AR session directly. It
//! reaches those through two traits:
//!
//! - [`ArPlatform`]: platform anchors and the tracking poses polled each tick
//!   (tracked images, detected planes, hit test, viewer).
//! - [`AssetLoader`]: loads a visual asset and hands back a renderer handle.
//!
//! ## Requests and Replies
//!
//! Anchor creation and asset loading take time, and a tick may not wait. A
//! request carries a [`ReplySender`]; the collaborator completes it whenever
//! it likes (inside the call, from another thread, many ticks later), and the
//! owning system drains the matching [`ReplyQueue`] at the start of a later
//! tick:
//!
//! ```text
//!  tick N                          tick N+k
//!  ──────                          ────────
//!  system ── request(ticket) ──►   collaborator
//!                                       │ reply.send(completion)
//!  system ◄── queue.drain() ◄──────────┘
//!   └─ entity still alive? write result : drop it
//! ```
//!
//! Every reply names the entity that asked. Replies for entities removed in
//! the meantime are discarded, never written into a recycled slot.

pub mod headless;

use crossbeam_channel::{Receiver, Sender};

use crate::cid::Cid;
use crate::components::PlaneOrientation;
use crate::ecs::Entity;
use crate::error::{AssetError, PlatformAnchorError};
use crate::math::Pose;

/// Opaque handle to an anchor created by the AR platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PlatformAnchorHandle(pub u64);

/// Opaque handle to a visual asset loaded by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderableHandle(pub u64);

// ── Reply plumbing ──────────────────────────────────────────────────────

/// Sending half handed to a collaborator with each request.
#[derive(Debug)]
pub struct ReplySender<T>(Sender<T>);

impl<T> Clone for ReplySender<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T> ReplySender<T> {
    /// Deliver a completion. If the runtime has been dropped the reply is
    /// discarded.
    pub fn send(&self, value: T) {
        if self.0.send(value).is_err() {
            log::debug!("reply dropped: runtime no longer listening");
        }
    }
}

/// Receiving half, kept as a world resource by the system that issued the
/// requests.
pub struct ReplyQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> ReplyQueue<T> {
    pub fn new() -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self { tx, rx }
    }

    pub fn sender(&self) -> ReplySender<T> {
        ReplySender(self.tx.clone())
    }

    /// Everything delivered since the last drain, in arrival order.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

impl<T> Default for ReplyQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

// ── Platform anchors ────────────────────────────────────────────────────

/// Names one anchor creation request: who asked, and which of its requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AnchorTicket {
    pub entity: Entity,
    pub request: u64,
}

/// Result of an anchor creation request.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorCompletion {
    pub ticket: AnchorTicket,
    pub result: Result<PlatformAnchorHandle, PlatformAnchorError>,
}

/// Ask the platform for an anchor at `pose`.
#[derive(Debug, Clone)]
pub struct AnchorRequest {
    pub ticket: AnchorTicket,
    pub pose: Pose,
    pub reply: ReplySender<AnchorCompletion>,
}

impl AnchorRequest {
    /// Complete the request.
    pub fn resolve(self, result: Result<PlatformAnchorHandle, PlatformAnchorError>) {
        self.reply.send(AnchorCompletion {
            ticket: self.ticket,
            result,
        });
    }
}

// ── Assets ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct AssetCompletion {
    pub entity: Entity,
    pub asset: Cid,
    pub result: Result<RenderableHandle, AssetError>,
}

/// Ask the loader for the visual asset `asset` on behalf of `entity`.
#[derive(Debug, Clone)]
pub struct AssetRequest {
    pub entity: Entity,
    pub asset: Cid,
    pub reply: ReplySender<AssetCompletion>,
}

impl AssetRequest {
    pub fn resolve(self, result: Result<RenderableHandle, AssetError>) {
        self.reply.send(AssetCompletion {
            entity: self.entity,
            asset: self.asset,
            result,
        });
    }
}

// ── Collaborator traits ─────────────────────────────────────────────────

/// An image the platform should track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedImageSpec {
    pub asset: Cid,
    pub width_meters: f32,
}

/// The AR session as seen by the core.
///
/// Pose getters are polled once per tick by their adapter systems and must
/// answer from the platform's latest frame without blocking. `None` means
/// "not tracked right now".
pub trait ArPlatform {
    /// Begin creating a platform anchor. Must not block; complete the
    /// request through its reply sender whenever creation finishes.
    fn request_anchor(&mut self, request: AnchorRequest);

    fn delete_anchor(&mut self, handle: PlatformAnchorHandle);

    /// The full list of images to track, indexed by tracking index. Called
    /// again whenever the list grows.
    fn register_tracked_images(&mut self, images: &[TrackedImageSpec]) {
        let _ = images;
    }

    fn tracked_image_pose(&mut self, tracking_index: usize) -> Option<Pose>;

    fn detected_plane_pose(&mut self, orientation: PlaneOrientation) -> Option<Pose>;

    fn hit_test_pose(&mut self) -> Option<Pose>;

    fn viewer_pose(&mut self) -> Option<Pose>;
}

/// Loads visual assets for the renderer.
pub trait AssetLoader {
    /// Begin loading. Must not block.
    fn load(&mut self, request: AssetRequest);
}
