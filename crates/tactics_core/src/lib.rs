//! # Tactics Core
//!
//! Tactical decision layer for an autonomous RTS player.
//!
//! Every decision tick the [`controller::MissionController`] lets factories
//! spawn missions, updates each mission's state machine, arbitrates units
//! between competing missions with a priority auction and flushes the
//! resulting unit orders to the host.
//!
//! This crate is a pure in-process component:
//! - No IO beyond loading a configuration file
//! - No wall-clock time; every duration is counted in simulation ticks
//! - No threads; the host calls it synchronously once per decision tick
//!
//! ## Crate Structure
//!
//! - [`world`] - Host, awareness and order-sink interfaces
//! - [`controller`] - Mission controller and allocation auction
//! - [`factory`] - Mission spawn conditions and removal callbacks
//! - [`mission`] - Attack, naval, scout and retreat tasks
//! - [`squad`] - Formation, per-unit micro and stuck recovery
//! - [`targeting`] - Area scoring and the target lock
//! - [`batcher`] - Per-tick order de-duplication
//! - [`config`] - RON-loadable tuning values

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

pub mod batcher;
pub mod config;
pub mod controller;
pub mod error;
pub mod factory;
pub mod math;
pub mod mission;
pub mod squad;
pub mod targeting;
pub mod world;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::batcher::{ActionBatcher, PushOutcome};
    pub use crate::config::TacticsConfig;
    pub use crate::controller::{DecisionClock, MissionController, RequestTally, TickReport};
    pub use crate::error::{Result, TacticsError};
    pub use crate::factory::{
        AttackFactory, MissionFactory, NavalFactory, RemovedMission, ScoutFactory,
    };
    pub use crate::math::{MapBounds, Tile};
    pub use crate::mission::{
        AttackTask, DisbandReason, Mission, MissionAction, MissionKind, MissionTask, NavalTask,
        RetreatTask, ScoutTask, UnitRequest,
    };
    pub use crate::squad::{Squad, SquadReport, SquadState};
    pub use crate::world::{
        Awareness, HostileContact, MovementDomain, Order, OrderSink, PlayerId, Terrain,
        TickContext, UnitCatalog, UnitId, UnitSnapshot, UnitTypeId, UnitTypeInfo, WorldView,
    };
    pub use glam::Vec2;
}
