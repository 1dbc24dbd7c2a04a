//! # Arcid: Content-Addressed AR Scene Runtime
//!
//! Places scene entities, built from content-addressed records, inside an AR
//! session. Entities reference each other by CID, never by pointer, and
//! anchor their transforms to tracked images, detected planes, the viewer or
//! each other, axis by axis. Each tick resolves those references into a final
//! pose and a visibility flag per entity.
//!
//! Start with `use arcid::prelude::*` and drive a
//! [`SceneRuntime`](runtime::SceneRuntime).

pub mod cid;
pub mod components;
pub mod config;
pub mod ecs;
pub mod error;
pub mod logging;
pub mod math;
pub mod platform;
pub mod prelude;
pub mod record;
pub mod runtime;
pub mod scene;
pub mod systems;
