//! # Scene ECS
//!
//! A small Entity Component System sized for AR scene graphs: tens to
//! hundreds of entities, each built from one fetched record. The component
//! set is closed, so an entity's "type" is a single bitmask and every query
//! predicate is a mask test.
//!
//! ## Module Overview
//!
//! - [`entity`]: Generational entity handles
//! - [`component`]: Component kinds and sparse type-erased columns
//! - [`query`]: Filters, live queries with change events, typed fetch
//! - [`world`]: Central container (entities, components, CID index, resources)
//! - [`system`]: System trait, tick context and schedule runner

pub(crate) mod component;
pub mod entity;
pub(crate) mod query;
pub mod system;
pub mod world;

pub use component::{Component, ComponentColumn, ComponentKind};
pub use entity::Entity;
pub use query::{Columns, QueryEvent, QueryFilter, QueryId, QueryObserver, QueryParam};
pub use system::{Schedule, System, TickContext};
#[cfg(feature = "diagnostics")]
pub use system::SystemTiming;
pub use world::{SpawnBundle, World};
