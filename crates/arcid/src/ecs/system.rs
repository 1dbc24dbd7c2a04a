//! # System: Functions That Run Once Per Tick
//!
//! A system takes `&mut World` plus a [`TickContext`] and does its one job:
//! poll a collaborator, resolve anchors, write out scene nodes. Systems run in
//! the order they were added, sequentially, never re-entrant.
//!
//! ## Tick Context
//!
//! The context carries what a system may touch outside the world: the tick's
//! delta, the AR platform and asset loader collaborators, the runtime config
//! and the session's "world shown" flag. Collaborator calls made through it
//! must not block; anything that needs to wait replies through a channel that
//! a later tick drains.
//!
//! ## Schedule
//!
//! A [`Schedule`] is a `Vec` of systems. The runtime builds one fixed pipeline
//! (see [`crate::systems::default_schedule`]); the order is part of the
//! contract, because anchor resolution must read last tick's resolved values
//! before write-out replaces them.

use std::time::Duration;

use super::world::World;
use crate::config::RuntimeConfig;
use crate::platform::{ArPlatform, AssetLoader};

/// Everything outside the [`World`] a system can reach during a tick.
pub struct TickContext<'a> {
    /// Time since the previous tick.
    pub delta: Duration,
    /// Number of ticks completed before this one.
    pub tick: u64,
    pub platform: &'a mut dyn ArPlatform,
    pub assets: &'a mut dyn AssetLoader,
    pub config: &'a RuntimeConfig,
    /// Owned by the AR session: nothing is shown until the session runs.
    pub world_shown: bool,
}

/// A system that can be executed on a [`World`].
///
/// Any `FnMut(&mut World, &mut TickContext)` implements this trait, so plain
/// functions and closures work directly.
pub trait System {
    fn run(&mut self, world: &mut World, ctx: &mut TickContext<'_>);
}

impl<F> System for F
where
    F: FnMut(&mut World, &mut TickContext<'_>),
{
    fn run(&mut self, world: &mut World, ctx: &mut TickContext<'_>) {
        (self)(world, ctx);
    }
}

struct NamedSystem {
    name: String,
    system: Box<dyn System>,
}

/// Per-system timing recorded during a single tick.
#[cfg(feature = "diagnostics")]
#[derive(Debug, Clone)]
pub struct SystemTiming {
    pub name: String,
    pub duration_us: f64,
}

/// An ordered list of systems to run.
pub struct Schedule {
    systems: Vec<NamedSystem>,
    /// Per-system timings from the most recent `run()` call.
    #[cfg(feature = "diagnostics")]
    timings: Vec<SystemTiming>,
}

impl Schedule {
    pub fn new() -> Self {
        Self {
            systems: Vec::new(),
            #[cfg(feature = "diagnostics")]
            timings: Vec::new(),
        }
    }

    /// Add a system to the end of the schedule.
    pub fn add_system<S: System + 'static>(&mut self, system: S) -> &mut Self {
        self.systems.push(NamedSystem {
            name: short_system_name(std::any::type_name::<S>()),
            system: Box::new(system),
        });
        self
    }

    /// Run all systems in order on the given world.
    pub fn run(&mut self, world: &mut World, ctx: &mut TickContext<'_>) {
        #[cfg(feature = "diagnostics")]
        {
            self.timings.clear();
            for ns in &mut self.systems {
                let start = std::time::Instant::now();
                ns.system.run(world, ctx);
                let elapsed = start.elapsed();
                self.timings.push(SystemTiming {
                    name: ns.name.clone(),
                    duration_us: elapsed.as_secs_f64() * 1_000_000.0,
                });
            }
        }
        #[cfg(not(feature = "diagnostics"))]
        {
            for ns in &mut self.systems {
                ns.system.run(world, ctx);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.systems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.systems.is_empty()
    }

    /// Short names of the systems, in run order.
    pub fn system_names(&self) -> Vec<&str> {
        self.systems.iter().map(|ns| ns.name.as_str()).collect()
    }

    /// Timings from the most recent tick.
    #[cfg(feature = "diagnostics")]
    pub fn timings(&self) -> &[SystemTiming] {
        &self.timings
    }
}

impl Default for Schedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Strip the module path from a fully-qualified type name, keeping only the
/// last meaningful segment (e.g. `arcid::systems::anchor::anchor_system` →
/// `anchor_system`, `{{closure}}` → `<closure>`).
fn short_system_name(full: &str) -> String {
    let name = full.rsplit("::").next().unwrap_or(full);
    if name.contains("closure") {
        "<closure>".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::headless::{HeadlessAssets, HeadlessPlatform};

    fn dummy_system(_world: &mut World, _ctx: &mut TickContext<'_>) {}

    fn run_once(schedule: &mut Schedule, world: &mut World) {
        let mut platform = HeadlessPlatform::new();
        let mut assets = HeadlessAssets::new();
        let config = RuntimeConfig::default();
        let mut ctx = TickContext {
            delta: Duration::from_millis(16),
            tick: 0,
            platform: &mut platform,
            assets: &mut assets,
            config: &config,
            world_shown: true,
        };
        schedule.run(world, &mut ctx);
    }

    #[test]
    fn schedule_captures_system_name() {
        let mut schedule = Schedule::new();
        schedule.add_system(dummy_system);
        assert_eq!(schedule.len(), 1);
        assert_eq!(schedule.system_names(), vec!["dummy_system"]);
    }

    #[test]
    fn closure_system_name() {
        let mut schedule = Schedule::new();
        schedule.add_system(|_world: &mut World, _ctx: &mut TickContext<'_>| {});
        assert_eq!(schedule.system_names(), vec!["<closure>"]);
    }

    #[test]
    fn systems_run_in_insertion_order() {
        let mut world = World::new();
        world.insert_resource(Vec::<&'static str>::new());
        let mut schedule = Schedule::new();
        schedule
            .add_system(|w: &mut World, _: &mut TickContext<'_>| {
                w.get_resource_mut::<Vec<&'static str>>().unwrap().push("first");
            })
            .add_system(|w: &mut World, _: &mut TickContext<'_>| {
                w.get_resource_mut::<Vec<&'static str>>().unwrap().push("second");
            });

        run_once(&mut schedule, &mut world);
        run_once(&mut schedule, &mut world);
        assert_eq!(
            world.get_resource::<Vec<&'static str>>().unwrap(),
            &vec!["first", "second", "first", "second"]
        );
    }

    #[cfg(feature = "diagnostics")]
    #[test]
    fn timings_cover_every_system() {
        let mut world = World::new();
        let mut schedule = Schedule::new();
        schedule.add_system(dummy_system).add_system(dummy_system);
        run_once(&mut schedule, &mut world);
        assert_eq!(schedule.timings().len(), 2);
    }
}
