//! Event log, snapshots, and post-action report.
//!
//! Grounded on the `world::Snapshot`/`SquadSnapshot` pair: a plain,
//! serializable projection of live ECS state taken on a cadence, generalized
//! here to the richer unit snapshot fields and its append-only,
//! time-stamped event log.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{FactionId, Health, Kinematics, Name, Position, UnitFlags, UnitId};
use crate::error::Severity;

/// One outbound event kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventKind {
    ShootingFire { attacker_id: UnitId, target_id: UnitId, weapon: String, range: f32 },
    WeaponFireDetailed { attacker_id: UnitId, target_id: UnitId, hit_roll: f32, threshold: f32, damage: f32, arc: String, facing: f32, kill: bool },
    HardpointDestroyed { unit_id: UnitId, component_id: String },
    MoraleFailure { unit_id: UnitId, roll: u32, threshold: f32 },
    ChainRouting { unit_id: UnitId },
    Capture { faction: FactionId, objective_id: u32 },
    UnitDeath { unit_id: UnitId, killer_faction: FactionId },
    AbilityUse { ability_id: String, source_id: UnitId, target_id: Option<UnitId>, effect: String },
    AbilityFail { ability_id: String, source_id: UnitId, reason: String },
    InterdictionTrap { unit_id: UnitId },
    /// Structured diagnostic for a recovered `InconsistentState` condition
    /// ("the core never swallows unknown errors silently").
    Diagnostic { message: String, severity: Severity },
}

/// One time-stamped log entry ("append-only log, time-stamped with
/// `total_sim_time`").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub time: f32,
    pub kind: EventKind,
}

/// Owns the battle's append-only event log ("owned by BattleState
/// and never aliased outside").
#[derive(Resource, Debug, Default, Serialize, Deserialize)]
pub struct EventLog {
    pub events: Vec<LoggedEvent>,
}

impl EventLog {
    pub fn push(&mut self, time: f32, kind: EventKind) {
        self.events.push(LoggedEvent { time, kind });
    }
}

/// One unit's state at a snapshot instant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub name: String,
    pub faction: FactionId,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub facing: f32,
    pub is_alive: bool,
}

impl UnitSnapshot {
    pub fn capture(id: UnitId, name: &Name, faction: FactionId, position: &Position, health: &Health, kinematics: &Kinematics, flags: &UnitFlags) -> Self {
        Self {
            id,
            name: name.0.clone(),
            faction,
            x: position.x,
            y: position.y,
            hp: health.current,
            facing: kinematics.facing,
            is_alive: health.is_alive() && !flags.is_routing,
        }
    }
}

/// A positional snapshot taken at `snap_interval`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub timestamp: f32,
    pub units: Vec<UnitSnapshot>,
}

/// Per-faction summary in the final report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FactionReport {
    pub initial_strength: u32,
    pub survivors: u32,
    pub vp: f64,
    pub damage_dealt: f64,
}

/// One objective ownership change, in chronological order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveTimelineEntry {
    pub time: f32,
    pub objective: u32,
    pub new_owner: FactionId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    pub duration: f32,
    pub map: String,
    pub winner: Option<String>,
}

/// The post-action report returned at battle end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostActionReport {
    pub meta: ReportMeta,
    pub factions: HashMap<String, FactionReport>,
    pub objective_timeline: Vec<ObjectiveTimelineEntry>,
    pub events: Vec<LoggedEvent>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_log_preserves_insertion_order() {
        let mut log = EventLog::default();
        log.push(1.0, EventKind::ChainRouting { unit_id: UnitId(1) });
        log.push(2.0, EventKind::UnitDeath { unit_id: UnitId(1), killer_faction: FactionId(2) });
        assert_eq!(log.events.len(), 2);
        assert_eq!(log.events[0].time, 1.0);
    }

    #[test]
    fn report_serializes_to_json() {
        let report = PostActionReport {
            meta: ReportMeta { duration: 10.0, map: "forest_ruins".to_string(), winner: Some("blue".to_string()) },
            factions: HashMap::new(),
            objective_timeline: Vec::new(),
            events: Vec::new(),
        };
        let json = serde_json::to_string(&report).expect("serialize");
        assert!(json.contains("forest_ruins"));
    }
}
