//! Math types and glam re-exports.
//!
//! We re-export [glam](https://docs.rs/glam) types so users don't need to
//! depend on it directly. [`Pose`] is what tracking collaborators report, and
//! [`Channel`] names the ten scalar slots an anchor reference can supply.

pub use glam::{Quat, Vec3, Vec4};

use serde::{Deserialize, Serialize};

/// A rigid pose in the session's reference space: position and orientation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    /// The origin, unrotated.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// A pose at the given position with no rotation.
    pub fn from_xyz(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Vec3::new(x, y, z),
            ..Self::IDENTITY
        }
    }

    /// Whether `other` is within `distance` meters and `angle` radians of
    /// this pose.
    pub fn is_near(&self, other: &Pose, distance: f32, angle: f32) -> bool {
        self.position.distance(other.position) <= distance
            && self.rotation.angle_between(other.rotation) <= angle
    }
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Which transform component a [`Channel`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelGroup {
    Position,
    Rotation,
    Scale,
}

/// Axis letter within a group. Only rotation uses `W`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
    W,
}

impl Axis {
    fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
            Axis::W => 3,
        }
    }
}

/// One scalar output slot of an entity's transform.
///
/// An anchored entity's transform is assembled from up to ten of these, each
/// possibly supplied by a different anchor entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    pub group: ChannelGroup,
    pub axis: Axis,
}

impl Channel {
    const fn new(group: ChannelGroup, axis: Axis) -> Self {
        Self { group, axis }
    }

    /// Every channel, position first, then rotation `x y z w`, then scale.
    pub const ALL: [Channel; 10] = [
        Channel::new(ChannelGroup::Position, Axis::X),
        Channel::new(ChannelGroup::Position, Axis::Y),
        Channel::new(ChannelGroup::Position, Axis::Z),
        Channel::new(ChannelGroup::Rotation, Axis::X),
        Channel::new(ChannelGroup::Rotation, Axis::Y),
        Channel::new(ChannelGroup::Rotation, Axis::Z),
        Channel::new(ChannelGroup::Rotation, Axis::W),
        Channel::new(ChannelGroup::Scale, Axis::X),
        Channel::new(ChannelGroup::Scale, Axis::Y),
        Channel::new(ChannelGroup::Scale, Axis::Z),
    ];

    /// Value used when nothing supplies this channel: 0 for position and the
    /// rotation vector part, 1 for rotation `w` and for scale.
    pub fn identity_value(self) -> f32 {
        match (self.group, self.axis) {
            (ChannelGroup::Position, _) => 0.0,
            (ChannelGroup::Rotation, Axis::W) => 1.0,
            (ChannelGroup::Rotation, _) => 0.0,
            (ChannelGroup::Scale, _) => 1.0,
        }
    }

    /// Read this channel's axis out of a vector (position or scale).
    pub fn of_vec3(self, v: Vec3) -> f32 {
        v.to_array().get(self.axis.index()).copied().unwrap_or(self.identity_value())
    }

    /// Read this channel's axis out of a quaternion.
    pub fn of_quat(self, q: Quat) -> f32 {
        q.to_array()[self.axis.index()]
    }
}

/// Accumulates channel values into a position, rotation and scale, starting
/// from identity.
#[derive(Debug, Clone, Copy)]
pub struct ChannelFrame {
    position: [f32; 3],
    rotation: [f32; 4],
    scale: [f32; 3],
}

impl ChannelFrame {
    pub fn identity() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }

    pub fn set(&mut self, channel: Channel, value: f32) {
        let i = channel.axis.index();
        match channel.group {
            ChannelGroup::Position if i < 3 => self.position[i] = value,
            ChannelGroup::Rotation => self.rotation[i] = value,
            ChannelGroup::Scale if i < 3 => self.scale[i] = value,
            _ => {}
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    /// The assembled rotation, normalized. Axes taken from different anchors
    /// rarely form a unit quaternion; a degenerate one collapses to identity.
    pub fn rotation(&self) -> Quat {
        let raw = Vec4::from_array(self.rotation);
        let len = raw.length();
        if len.is_finite() && len > 1e-6 {
            Quat::from_vec4(raw / len)
        } else {
            Quat::IDENTITY
        }
    }

    pub fn scale(&self) -> Vec3 {
        Vec3::from_array(self.scale)
    }
}

impl Default for ChannelFrame {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_values_per_group() {
        let values: Vec<f32> = Channel::ALL.iter().map(|c| c.identity_value()).collect();
        assert_eq!(values, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn empty_frame_is_identity() {
        let frame = ChannelFrame::identity();
        assert_eq!(frame.position(), Vec3::ZERO);
        assert_eq!(frame.rotation(), Quat::IDENTITY);
        assert_eq!(frame.scale(), Vec3::ONE);
    }

    #[test]
    fn degenerate_rotation_collapses_to_identity() {
        let mut frame = ChannelFrame::identity();
        frame.set(Channel::ALL[6], 0.0); // w
        assert_eq!(frame.rotation(), Quat::IDENTITY);
    }

    #[test]
    fn mixed_rotation_axes_are_normalized() {
        let mut frame = ChannelFrame::identity();
        frame.set(Channel::ALL[4], 1.0); // y
        let q = frame.rotation();
        assert!((q.length() - 1.0).abs() < 1e-6);
        assert!((q.y - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
    }

    #[test]
    fn pose_nearness() {
        let a = Pose::from_xyz(0.0, 0.0, 0.0);
        let b = Pose::from_xyz(0.005, 0.0, 0.0);
        assert!(a.is_near(&b, 0.01, 0.01));
        assert!(!a.is_near(&Pose::from_xyz(1.0, 0.0, 0.0), 0.01, 0.01));
    }
}
