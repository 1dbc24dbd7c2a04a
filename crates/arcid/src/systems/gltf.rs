//! GLTF attach: turn a referenced model into a [`Renderable`].
//!
//! Each [`GltfModel`] is requested from the [`AssetLoader`](crate::platform::AssetLoader)
//! exactly once. When the load completes the entity gets a visible
//! `Renderable` and a [`SceneNode`] for the renderer. A failed load is logged
//! and left alone; nothing retries it.

use crate::components::{GltfModel, LoadState, Renderable, SceneNode};
use crate::ecs::{Entity, TickContext, World};
use crate::platform::{AssetCompletion, AssetRequest, ReplyQueue};

pub fn gltf_system(world: &mut World, ctx: &mut TickContext<'_>) {
    let queue = world.resource_or_insert_with(ReplyQueue::<AssetCompletion>::new);
    let completions = queue.drain();
    let reply = queue.sender();

    for completion in completions {
        attach(world, completion);
    }

    let mut wanted: Vec<(Entity, GltfModel)> = Vec::new();
    world.query::<(&mut GltfModel,)>(|entity, (model,)| {
        if model.state == LoadState::Unrequested {
            model.state = LoadState::Requested;
            wanted.push((entity, model.clone()));
        }
    });
    for (entity, model) in wanted {
        log::debug!("{entity} loading model {}", model.asset);
        ctx.assets.load(AssetRequest {
            entity,
            asset: model.asset,
            reply: reply.clone(),
        });
    }
}

fn attach(world: &mut World, completion: AssetCompletion) {
    let AssetCompletion { entity, asset, result } = completion;
    let Some(model) = world.get_mut::<GltfModel>(entity) else {
        log::debug!("model {asset} loaded for departed {entity}; dropped");
        return;
    };
    if model.asset != asset || model.state != LoadState::Requested {
        log::debug!("stale model {asset} for {entity}; dropped");
        return;
    }

    match result {
        Ok(handle) => {
            model.state = LoadState::Loaded;
            world.insert(entity, Renderable { handle, visible: true });
            if !world.contains::<SceneNode>(entity) {
                world.insert(entity, SceneNode::default());
            }
        }
        Err(err) => {
            log::warn!("model {asset} for {entity} failed to load: {err}");
            model.state = LoadState::Failed;
        }
    }
}
