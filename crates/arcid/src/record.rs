//! Entity records as they come out of the content store.
//!
//! A record is a small dag-json document; links are either bare CID strings
//! or `{"/": "<cid>"}`. Every field is optional:
//!
//! ```json
//! {
//!   "glTFModel": { "/": "bafy…duck" },
//!   "position": { "x": 0, "y": 0, "z": -1 },
//!   "rotation": { "x": 0, "y": 0, "z": 0, "w": 1 },
//!   "scale": { "x": 1, "y": 1, "z": 1 },
//!   "parent": { "/": "bafy…table" },
//!   "anchor": { "position": "bafy…image", "rotation": { "y": "bafy…plane" } },
//!   "isAnchor": true,
//!   "trackedImage": { "imageAsset": "bafy…poster", "physicalWidthInMeters": 0.3 },
//!   "detectedPlane": "horizontal",
//!   "raycast": false,
//!   "viewer": false,
//!   "visible": true
//! }
//! ```
//!
//! A scene package is a JSON array of record links.

use serde::{Deserialize, Serialize};

use crate::cid::Cid;
use crate::components::{AnchorRef, AnchorTarget, PlaneOrientation};
use crate::error::RecordError;
use crate::math::{Quat, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<VectorRecord> for Vec3 {
    fn from(v: VectorRecord) -> Self {
        Vec3::new(v.x, v.y, v.z)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternionRecord {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl From<QuaternionRecord> for Quat {
    /// Normalized; a zero quaternion reads as identity.
    fn from(q: QuaternionRecord) -> Self {
        let raw = Vec4::new(q.x, q.y, q.z, q.w);
        let len = raw.length();
        if len.is_finite() && len > 1e-6 {
            Quat::from_vec4(raw / len)
        } else {
            Quat::IDENTITY
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackedImageRecord {
    pub image_asset: Cid,
    pub physical_width_in_meters: f32,
}

/// Per-group anchor targets.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnchorGroups {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<AnchorTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<AnchorTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<AnchorTarget>,
}

/// The `anchor` field: one link for everything, or per-group targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnchorRecord {
    All(Cid),
    Groups(AnchorGroups),
}

impl From<AnchorRecord> for AnchorRef {
    fn from(record: AnchorRecord) -> Self {
        match record {
            AnchorRecord::All(cid) => AnchorRef::to(cid),
            AnchorRecord::Groups(groups) => AnchorRef {
                anchor: None,
                position: groups.position,
                rotation: groups.rotation,
                scale: groups.scale,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityRecord {
    #[serde(rename = "glTFModel", skip_serializing_if = "Option::is_none")]
    pub gltf_model: Option<Cid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<VectorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rotation: Option<QuaternionRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<VectorRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<Cid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<AnchorRecord>,
    pub is_anchor: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_image: Option<TrackedImageRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detected_plane: Option<PlaneOrientation>,
    pub raycast: bool,
    pub viewer: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visible: Option<bool>,
}

impl EntityRecord {
    /// Whether the entity's start pose comes from the platform rather than
    /// the record.
    pub fn is_tracked(&self) -> bool {
        self.tracked_image.is_some() || self.detected_plane.is_some() || self.raycast || self.viewer
    }
}

pub fn decode_record(json: &str) -> Result<EntityRecord, RecordError> {
    Ok(serde_json::from_str(json)?)
}

/// Decode a scene package: a JSON array of record links.
pub fn decode_package(json: &str) -> Result<Vec<Cid>, RecordError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::PerAxis;

    fn cid(s: &str) -> Cid {
        Cid::parse(s).unwrap()
    }

    #[test]
    fn decodes_a_model_record() {
        let record = decode_record(
            r#"{
                "glTFModel": {"/": "bafyDuck"},
                "position": {"x": 1, "y": 2, "z": 3},
                "parent": "bafyTable"
            }"#,
        )
        .unwrap();
        assert_eq!(record.gltf_model, Some(cid("bafyDuck")));
        assert_eq!(Vec3::from(record.position.unwrap()), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(record.parent, Some(cid("bafyTable")));
        assert!(!record.is_tracked());
    }

    #[test]
    fn decodes_both_anchor_forms() {
        let all = decode_record(r#"{"anchor": {"/": "bafyA"}}"#).unwrap();
        assert_eq!(AnchorRef::from(all.anchor.unwrap()), AnchorRef::to(cid("bafyA")));

        let groups = decode_record(
            r#"{"anchor": {"position": "bafyA", "rotation": {"x": "bafyB", "w": "bafyB"}}}"#,
        )
        .unwrap();
        let anchor = AnchorRef::from(groups.anchor.unwrap());
        assert_eq!(anchor.anchor, None);
        assert_eq!(anchor.position, Some(AnchorTarget::Uniform(cid("bafyA"))));
        assert_eq!(
            anchor.rotation,
            Some(AnchorTarget::PerAxis(PerAxis {
                x: Some(cid("bafyB")),
                w: Some(cid("bafyB")),
                ..PerAxis::default()
            }))
        );
    }

    #[test]
    fn decodes_tracking_fields() {
        let record = decode_record(
            r#"{
                "trackedImage": {"imageAsset": "bafyPoster", "physicalWidthInMeters": 0.3},
                "isAnchor": true
            }"#,
        )
        .unwrap();
        assert!(record.is_tracked());
        assert!(record.is_anchor);
        assert_eq!(record.tracked_image.unwrap().physical_width_in_meters, 0.3);

        let plane = decode_record(r#"{"detectedPlane": "vertical"}"#).unwrap();
        assert_eq!(plane.detected_plane, Some(PlaneOrientation::Vertical));
    }

    #[test]
    fn zero_quaternion_reads_as_identity() {
        let q = QuaternionRecord {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 0.0,
        };
        assert_eq!(Quat::from(q), Quat::IDENTITY);
    }

    #[test]
    fn bad_links_are_errors() {
        assert!(matches!(
            decode_record(r#"{"parent": "not a cid"}"#),
            Err(RecordError::Json(_))
        ));
        assert!(decode_record("[1, 2]").is_err());
    }

    #[test]
    fn package_is_a_list_of_links() {
        let roots = decode_package(r#"[{"/": "bafyA"}, "bafyB"]"#).unwrap();
        assert_eq!(roots, vec![cid("bafyA"), cid("bafyB")]);
    }
}
