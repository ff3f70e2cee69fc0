//! Tactical Combat Core
//!
//! A deterministic, fixed-timestep ECS simulation that advances a real-time
//! tactical battle between opposing armies until a victor is determined.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod abilities;
pub mod battle;
pub mod components;
pub mod config;
pub mod doctrine;
pub mod error;
pub mod formation;
pub mod report;
pub mod rng;
pub mod spatial;
pub mod systems;
pub mod terrain;

pub use abilities::{AbilityActor, AbilityRegistry, AbilitySpec, Effect, Handler, Outcome};
pub use battle::{ArmySpec, Battle, BattleSpec, VictoryResult};
pub use components::*;
pub use config::BattleConfig;
pub use doctrine::{Doctrine, Domain, MoraleState, SuppressionState, WeaponArc, WeaponCategory};
pub use error::{BattleError, BattleResult, Severity};
pub use report::{EventKind, EventLog, LoggedEvent, PostActionReport, Snapshot, UnitSnapshot};
pub use rng::RngRegistry;
