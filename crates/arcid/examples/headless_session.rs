//! Headless Session: A model riding on a tracked poster.
//!
//! Feeds three records through the scene set: a tracked image, a platform
//! anchor placed on it, and a duck anchored to the image. The scripted
//! platform slides the poster along X; each frame's snapshot is printed as
//! JSON lines.
//!
//! Run with `cargo run --example headless_session [config.json]`.

use std::time::Duration;

use arcid::prelude::*;

const RECORDS: &[(&str, &str)] = &[
    (
        "bafyPoster",
        r#"{"trackedImage": {"imageAsset": "bafyPosterPng", "physicalWidthInMeters": 0.42}}"#,
    ),
    (
        "bafyPin",
        r#"{"isAnchor": true, "parent": "bafyPoster", "position": {"x": 0, "y": 0.05, "z": 0}}"#,
    ),
    (
        "bafyDuckEntity",
        r#"{
            "glTFModel": "bafyDuckGlb",
            "anchor": {"position": "bafyPoster", "rotation": "bafyPoster"},
            "position": {"x": 0, "y": 0.1, "z": 0},
            "scale": {"x": 0.2, "y": 0.2, "z": 0.2}
        }"#,
    ),
];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match std::env::args().nth(1) {
        Some(path) => RuntimeConfig::from_file(path)?,
        None => RuntimeConfig {
            world_shown: true,
            ..RuntimeConfig::default()
        },
    };
    arcid::logging::init(&config);

    let mut runtime = SceneRuntime::new(HeadlessPlatform::new(), HeadlessAssets::new(), config);

    let scene = runtime.scene_mut();
    scene.set_active(RECORDS.iter().map(|(cid, _)| Cid::parse(cid)).collect::<Result<Vec<_>, _>>()?);
    for cid in scene.take_requests() {
        let json = RECORDS
            .iter()
            .find(|(name, _)| *name == cid.as_str())
            .map(|(_, json)| *json)
            .ok_or("record not in the demo set")?;
        scene.deliver(cid, decode_record(json));
    }

    for frame in 0..6u8 {
        // The poster only comes into view on the second frame.
        let pose = (frame > 0).then(|| {
            Pose::new(
                Vec3::new(0.1 * f32::from(frame), 0.0, -1.0),
                Quat::from_rotation_y(0.1 * f32::from(frame)),
            )
        });
        runtime.platform_mut().set_tracked_image_pose(0, pose);
        runtime.tick(Duration::from_millis(16));

        for pose in runtime.snapshot() {
            println!("{{\"frame\":{frame},\"pose\":{}}}", serde_json::to_string(&pose)?);
        }
    }

    log::info!(
        "{} platform anchor request(s), {} live",
        runtime.platform().anchor_requests().len(),
        runtime.platform().live_anchors().len()
    );
    Ok(())
}
