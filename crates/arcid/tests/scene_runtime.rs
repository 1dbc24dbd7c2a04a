//! End-to-end behaviour of `SceneRuntime` against the headless collaborators.

use std::f32::consts::FRAC_PI_2;
use std::time::Duration;

use arcid::prelude::*;

const FRAME: Duration = Duration::from_millis(16);

fn cid(s: &str) -> Cid {
    Cid::parse(s).unwrap()
}

fn runtime_with(
    composition: CompositionMode,
    platform: HeadlessPlatform,
) -> SceneRuntime<HeadlessPlatform, HeadlessAssets> {
    let config = RuntimeConfig {
        composition,
        world_shown: true,
        ..RuntimeConfig::default()
    };
    SceneRuntime::new(platform, HeadlessAssets::new(), config)
}

fn runtime() -> SceneRuntime<HeadlessPlatform, HeadlessAssets> {
    runtime_with(CompositionMode::RotationAware, HeadlessPlatform::new())
}

/// An entity named `name` with a start pose and unit scale.
fn placed(
    rt: &mut SceneRuntime<HeadlessPlatform, HeadlessAssets>,
    name: &str,
    position: Vec3,
    rotation: Quat,
) -> Entity {
    let e = rt.create_entity();
    rt.attach(e, Identity::new(cid(name)));
    rt.attach(e, Position::at(position));
    rt.attach(e, Rotation::new(rotation));
    rt.attach(e, Scale::default());
    rt.attach(e, Visibility::default());
    e
}

fn anchored(
    rt: &mut SceneRuntime<HeadlessPlatform, HeadlessAssets>,
    name: &str,
    position: Vec3,
    rotation: Quat,
    anchor: AnchorRef,
) -> Entity {
    let e = placed(rt, name, position, rotation);
    rt.attach(e, anchor);
    e
}

fn assert_vec3_near(actual: Vec3, expected: Vec3) {
    assert!(
        actual.abs_diff_eq(expected, 1e-5),
        "expected {expected:?}, got {actual:?}"
    );
}

fn assert_quat_near(actual: Quat, expected: Quat) {
    assert!(
        actual.abs_diff_eq(expected, 1e-5),
        "expected {expected:?}, got {actual:?}"
    );
}

/// E takes its position from A and its rotation, axis by axis, from B.
fn split_anchor_scene(
    rt: &mut SceneRuntime<HeadlessPlatform, HeadlessAssets>,
) -> (Entity, Entity) {
    placed(rt, "bafyA", Vec3::X, Quat::IDENTITY);
    let b = placed(rt, "bafyB", Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
    let e = anchored(
        rt,
        "bafyE",
        Vec3::Z,
        Quat::IDENTITY,
        AnchorRef {
            position: Some(AnchorTarget::Uniform(cid("bafyA"))),
            rotation: Some(AnchorTarget::PerAxis(PerAxis {
                x: Some(cid("bafyB")),
                y: Some(cid("bafyB")),
                z: Some(cid("bafyB")),
                w: Some(cid("bafyB")),
            })),
            ..AnchorRef::default()
        },
    );
    (e, b)
}

#[test]
fn split_anchors_compose_rotation_aware() {
    let mut rt = runtime();
    let (e, _) = split_anchor_scene(&mut rt);

    rt.tick(FRAME);

    let position = rt.get::<Position>(e).unwrap().position.unwrap();
    let rotation = rt.get::<Rotation>(e).unwrap().rotation.unwrap();
    // (1,0,0) + (0,0,1) turned +90° about Y.
    assert_vec3_near(position, Vec3::new(2.0, 0.0, 0.0));
    assert_quat_near(rotation, Quat::from_rotation_y(FRAC_PI_2));
    assert!(rt.get::<Visibility>(e).unwrap().is_visible);
}

#[test]
fn split_anchors_compose_legacy_sum() {
    let mut rt = runtime_with(CompositionMode::LegacySum, HeadlessPlatform::new());
    let (e, _) = split_anchor_scene(&mut rt);

    rt.tick(FRAME);

    let position = rt.get::<Position>(e).unwrap().position.unwrap();
    assert_vec3_near(position, Vec3::new(1.0, 0.0, 1.0));
    assert_quat_near(
        rt.get::<Rotation>(e).unwrap().rotation.unwrap(),
        Quat::from_rotation_y(FRAC_PI_2),
    );
}

#[test]
fn losing_a_supplier_hides_without_moving() {
    let mut rt = runtime();
    let (e, b) = split_anchor_scene(&mut rt);
    rt.tick(FRAME);
    let before_position = *rt.get::<Position>(e).unwrap();
    let before_rotation = *rt.get::<Rotation>(e).unwrap();

    rt.despawn(b);
    rt.tick(FRAME);

    assert!(!rt.get::<Visibility>(e).unwrap().is_visible);
    assert_eq!(*rt.get::<Position>(e).unwrap(), before_position);
    assert_eq!(*rt.get::<Rotation>(e).unwrap(), before_rotation);

    let pose = rt.snapshot().into_iter().find(|p| p.entity == e).unwrap();
    assert!(!pose.visible);
    assert_vec3_near(pose.position.unwrap(), Vec3::new(2.0, 0.0, 0.0));
}

#[test]
fn missing_single_anchor_leaves_fields_alone() {
    let mut rt = runtime();
    let e = anchored(&mut rt, "bafyE", Vec3::Y, Quat::IDENTITY, AnchorRef::to(cid("bafyNobody")));

    rt.tick(FRAME);
    rt.tick(FRAME);

    assert!(!rt.get::<Visibility>(e).unwrap().is_visible);
    assert_eq!(rt.get::<Position>(e).unwrap().position, None);
    assert_eq!(rt.get::<Rotation>(e).unwrap().rotation, None);
}

#[test]
fn two_of_three_position_axes_is_not_enough() {
    let mut rt = runtime();
    placed(&mut rt, "bafyX", Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY);
    placed(&mut rt, "bafyY", Vec3::new(0.0, 2.0, 0.0), Quat::IDENTITY);
    let e = anchored(
        &mut rt,
        "bafyE",
        Vec3::ZERO,
        Quat::IDENTITY,
        AnchorRef {
            position: Some(AnchorTarget::PerAxis(PerAxis {
                x: Some(cid("bafyX")),
                y: Some(cid("bafyY")),
                z: Some(cid("bafyZ")),
                w: None,
            })),
            ..AnchorRef::default()
        },
    );

    rt.tick(FRAME);
    assert!(!rt.get::<Visibility>(e).unwrap().is_visible);

    placed(&mut rt, "bafyZ", Vec3::new(0.0, 0.0, 3.0), Quat::IDENTITY);
    rt.tick(FRAME);

    assert!(rt.get::<Visibility>(e).unwrap().is_visible);
    assert_vec3_near(
        rt.get::<Position>(e).unwrap().position.unwrap(),
        Vec3::new(1.0, 2.0, 3.0),
    );
}

#[test]
fn two_link_chain_settles_on_the_second_tick() {
    let mut rt = runtime();
    placed(&mut rt, "bafyC", Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2));
    anchored(
        &mut rt,
        "bafyB",
        Vec3::ZERO,
        Quat::from_rotation_x(FRAC_PI_2),
        AnchorRef::to(cid("bafyC")),
    );
    let a = anchored(&mut rt, "bafyA", Vec3::ZERO, Quat::IDENTITY, AnchorRef::to(cid("bafyB")));

    rt.tick(FRAME);
    // B has not resolved yet, so A only sees B's own start rotation.
    assert_quat_near(
        rt.get::<Rotation>(a).unwrap().rotation.unwrap(),
        Quat::from_rotation_x(FRAC_PI_2),
    );

    rt.tick(FRAME);
    assert_quat_near(
        rt.get::<Rotation>(a).unwrap().rotation.unwrap(),
        Quat::from_xyzw(0.5, 0.5, -0.5, 0.5),
    );

    rt.tick(FRAME);
    assert_quat_near(
        rt.get::<Rotation>(a).unwrap().rotation.unwrap(),
        Quat::from_xyzw(0.5, 0.5, -0.5, 0.5),
    );
}

#[test]
fn parent_at_origin_leaves_child_at_its_start() {
    let mut rt = runtime();
    placed(&mut rt, "bafyParent", Vec3::ZERO, Quat::IDENTITY);
    let child = placed(&mut rt, "bafyChild", Vec3::new(3.0, 4.0, 5.0), Quat::IDENTITY);
    rt.attach(child, ParentRef { parent: cid("bafyParent") });

    rt.tick(FRAME);

    assert_eq!(
        rt.get::<Position>(child).unwrap().position,
        Some(Vec3::new(3.0, 4.0, 5.0))
    );
}

#[test]
fn platform_anchor_is_requested_once_per_tick_until_stored() {
    let platform = HeadlessPlatform::new().with_anchor_policy(AnchorPolicy::Manual);
    let mut rt = runtime_with(CompositionMode::RotationAware, platform);
    let e = rt.create_entity();
    rt.attach(e, Position::unresolved());
    rt.attach(e, Rotation::unresolved());
    rt.attach(e, IsAnchorTag::default());

    rt.tick(FRAME);
    assert!(rt.platform().anchor_requests().is_empty());

    rt.get_mut::<Position>(e).unwrap().start_position = Some(Vec3::new(0.0, 0.0, -1.0));
    rt.get_mut::<Rotation>(e).unwrap().start_rotation = Some(Quat::IDENTITY);
    for expected in 1..=3 {
        rt.tick(FRAME);
        assert_eq!(rt.platform().anchor_requests().len(), expected);
    }

    rt.platform_mut().complete_pending();
    rt.tick(FRAME);
    let tag = rt.get::<IsAnchorTag>(e).unwrap();
    let handle = tag.platform_anchor().unwrap();
    assert_eq!(rt.platform().live_anchors(), &[handle]);
    assert_eq!(rt.platform().deleted_anchors().len(), 2);

    for _ in 0..3 {
        rt.tick(FRAME);
    }
    assert_eq!(rt.platform().anchor_requests().len(), 3);

    rt.get_mut::<IsAnchorTag>(e).unwrap().needs_recreate = true;
    rt.tick(FRAME);
    assert_eq!(rt.platform().anchor_requests().len(), 4);
    assert!(rt.platform().deleted_anchors().contains(&handle));
}

#[test]
fn records_place_a_model_on_a_tracked_image() {
    let mut platform = HeadlessPlatform::new();
    platform.set_tracked_image_pose(
        0,
        Some(Pose::new(Vec3::new(0.0, 0.0, -1.0), Quat::IDENTITY)),
    );
    let mut rt = runtime_with(CompositionMode::RotationAware, platform);

    let image = decode_record(
        r#"{"trackedImage": {"imageAsset": "bafyPosterPng", "physicalWidthInMeters": 0.3}}"#,
    )
    .unwrap();
    let model = decode_record(
        r#"{"glTFModel": "bafyDuck", "anchor": "bafyPoster", "position": {"x": 0, "y": 0.1, "z": 0}}"#,
    )
    .unwrap();
    let scene = rt.scene_mut();
    scene.set_active([cid("bafyPoster"), cid("bafyDuckEntity")]);
    assert_eq!(scene.take_requests().len(), 2);
    scene.deliver(cid("bafyPoster"), Ok(image));
    scene.deliver(cid("bafyDuckEntity"), Ok(model));

    rt.tick(FRAME);
    let duck = rt.lookup(&cid("bafyDuckEntity")).unwrap();
    assert_eq!(rt.platform().tracked_images().len(), 1);
    assert_eq!(rt.assets().requests(), &[cid("bafyDuck")]);
    assert!(!rt.get::<SceneNode>(duck).unwrap().visible);

    rt.tick(FRAME);
    assert_eq!(rt.get::<GltfModel>(duck).unwrap().state, LoadState::Loaded);
    let node = rt.get::<SceneNode>(duck).unwrap();
    assert!(node.visible);
    assert_vec3_near(node.position, Vec3::new(0.0, 0.1, -1.0));

    rt.set_world_shown(false);
    rt.tick(FRAME);
    assert!(!rt.get::<SceneNode>(duck).unwrap().visible);
    assert!(rt.snapshot().iter().all(|p| !p.visible));

    rt.scene_mut().set_active([cid("bafyPoster")]);
    rt.tick(FRAME);
    assert_eq!(rt.lookup(&cid("bafyDuckEntity")), None);
    assert!(!rt.world().is_alive(duck));
}

#[test]
fn snapshot_serializes_for_the_renderer() {
    let mut rt = runtime();
    let (e, _) = split_anchor_scene(&mut rt);
    rt.tick(FRAME);

    let snapshot = rt.snapshot();
    assert_eq!(snapshot.len(), 3);
    let pose = snapshot.iter().find(|p| p.entity == e).unwrap();
    assert_eq!(pose.cid, Some(cid("bafyE")));
    assert!(pose.visible);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json.as_array().unwrap().len(), 3);
    assert_eq!(json[2]["visible"], serde_json::Value::Bool(true));
    assert!(json[2].get("entity").is_none());
}
