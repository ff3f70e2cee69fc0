//! Ability dispatcher: a name-keyed table of handlers invoked by
//! `payload_type`, kept as a `HashMap<String, Box<dyn Handler>>` behind one
//! `execute` entry point. Dispatch does one string lookup to find the
//! handler and then one trait-object vtable call; no reflective or
//! string-keyed shortcuts in the hot path beyond that single lookup.

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::{Health, Position, Shield, UnitId};
use crate::error::BattleError;

/// Minimal view of a unit a handler needs — handlers are external
/// collaborators, kept narrow rather than exposing the whole `World`.
#[derive(Debug, Clone, Copy)]
pub struct AbilityActor {
    pub id: UnitId,
    pub position: Position,
    pub hp: f32,
    pub max_hp: f32,
}

/// Resulting effect of a handler's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Effect {
    None,
    Damage { amount: f32 },
    ArmorPiercingDamage { amount: f32, ap: f32 },
    Heal { amount: f32 },
    MobilityDebuff { fraction: f32 },
    Stun { chance: f32 },
    Teleport { distance: f32 },
    ShieldRegenBuff { amount: f32 },
    ArmorDebuff { amount: f32, duration: u32 },
    ChainDamage { amount: f32, chains: u32 },
    AreaDenial { amount: f32, duration: u32 },
    Immobilize { duration: u32 },
    Corruption { duration: u32 },
    Consumption { duration: u32 },
}

/// One handler's execution result: whether it fired, a human-readable
/// description, and the effect to apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub description: String,
    pub effect: Effect,
}

impl Outcome {
    fn none(description: impl Into<String>) -> Self {
        Self { success: false, description: description.into(), effect: Effect::None }
    }
}

/// A single registered ability payload: `execute(source, target)` produces
/// an `Outcome`.
pub trait Handler: Send + Sync {
    fn execute(&self, source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome;
}

/// Static definition of an ability's cost/range/cooldown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbilitySpec {
    pub id: String,
    pub payload_type: String,
    pub range: f32,
    pub resource_cost: f32,
    pub cooldown: f32,
}

/// Registry of named handlers, keyed by `payload_type`.
#[derive(Default)]
pub struct AbilityRegistry {
    handlers: HashMap<String, Box<dyn Handler>>,
}

impl AbilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the stock payload set.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("tractor_beam", Box::new(TractorBeamHandler));
        registry.register("emp", Box::new(EmpBlastHandler));
        registry.register("phase_jump", Box::new(PhaseJumpHandler));
        registry.register("antimatter_torpedo", Box::new(AntimatterTorpedoHandler));
        registry.register("shield_harmonics", Box::new(ShieldHarmonicsHandler));
        registry.register("acidic_burn", Box::new(AcidicBurnHandler));
        registry.register("black_hole", Box::new(BlackHoleHandler));
        registry.register("logic_virus", Box::new(LogicVirusHandler));
        registry.register("gravimetric_anchor", Box::new(GravimetricAnchorHandler));
        registry.register("ion_pulse", Box::new(IonPulseHandler));
        registry.register("tesla_arc", Box::new(TeslaArcHandler));
        registry.register("melta_blast", Box::new(MeltaBlastHandler));
        registry.register("nanite_swarm", Box::new(NaniteSwarmHandler));
        registry
    }

    pub fn register(&mut self, payload_type: &str, handler: Box<dyn Handler>) {
        self.handlers.insert(payload_type.to_string(), handler);
    }

    pub fn get(&self, payload_type: &str) -> Option<&dyn Handler> {
        self.handlers.get(payload_type).map(|h| h.as_ref())
    }
}

/// Dispatches one ability use. `resource_available` is the
/// source faction's current stockpile of the ability's resource;
/// `cooldown_remaining` is the per-unit-per-ability cooldown clock.
/// Resource is decremented by the caller only when this returns `success`.
pub fn dispatch(
    registry: &AbilityRegistry,
    spec: &AbilitySpec,
    source: &AbilityActor,
    target: Option<&AbilityActor>,
    cooldown_remaining: f32,
    resource_available: f32,
) -> Result<Outcome, BattleError> {
    let Some(handler) = registry.get(&spec.payload_type) else {
        return Err(BattleError::missing_dependency("ability", spec.id.clone()));
    };

    if cooldown_remaining > 0.0 {
        return Ok(Outcome::none(format!("{} still on cooldown ({:.1}s)", spec.id, cooldown_remaining)));
    }

    if spec.resource_cost > resource_available {
        return Ok(Outcome::none(format!("{} insufficient resources ({:.1} > {:.1})", spec.id, spec.resource_cost, resource_available)));
    }

    if let Some(t) = target {
        let distance = source.position.distance_to(&t.position);
        if distance > spec.range {
            return Ok(Outcome::none(format!("{} out of range ({:.1} > {:.1})", spec.id, distance, spec.range)));
        }
    }

    Ok(handler.execute(source, target))
}

// ============================================================================
// Helper primitives: apply_damage, apply_heal, apply_shield_buff, teleport.
// ============================================================================

pub fn apply_damage(health: &mut Health, amount: f32) {
    health.damage(amount);
}

pub fn apply_heal(health: &mut Health, amount: f32) {
    health.heal(amount);
}

pub fn apply_shield_buff(shield: &mut Shield, amount: f32) {
    shield.current = (shield.current + amount).min(shield.max);
}

pub fn teleport(position: &mut Position, dx: f32, dy: f32) {
    position.x += dx;
    position.y += dy;
}

/// A timed stat modifier applied by an ability; decremented once per tick by the
/// owning phase, removed at zero.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ActiveModifier {
    pub stat: ModifierStat,
    pub magnitude: f32,
    pub remaining: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModifierStat {
    Armor,
    Speed,
    Evasion,
}

pub fn apply_modifier_with_duration(stat: ModifierStat, magnitude: f32, duration: f32) -> ActiveModifier {
    ActiveModifier { stat, magnitude, remaining: duration }
}

// ============================================================================
// Stock ability handlers, one per named payload type.
// ============================================================================

struct TractorBeamHandler;
impl Handler for TractorBeamHandler {
    fn execute(&self, source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        let Some(target) = target else { return Outcome::none("tractor_beam requires a target") };
        let source_power = source.hp / 10.0;
        let target_resist = target.hp / 20.0;
        let pull_force = source_power / (target_resist + 1.0);
        let fraction = (pull_force / 5.0).min(0.9);
        Outcome {
            success: true,
            description: format!("Tractor Beam: {:.0}% speed reduction", fraction * 100.0),
            effect: Effect::MobilityDebuff { fraction },
        }
    }
}

struct EmpBlastHandler;
impl Handler for EmpBlastHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("emp requires a target");
        }
        Outcome { success: true, description: "EMP: 50% stun chance".to_string(), effect: Effect::Stun { chance: 0.5 } }
    }
}

struct PhaseJumpHandler;
impl Handler for PhaseJumpHandler {
    fn execute(&self, _source: &AbilityActor, _target: Option<&AbilityActor>) -> Outcome {
        Outcome { success: true, description: "Phase Jump: 50.0 units".to_string(), effect: Effect::Teleport { distance: 50.0 } }
    }
}

struct AntimatterTorpedoHandler;
impl Handler for AntimatterTorpedoHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("antimatter_torpedo requires a target");
        }
        Outcome { success: true, description: "Antimatter Torpedo: 100 damage".to_string(), effect: Effect::Damage { amount: 100.0 } }
    }
}

struct ShieldHarmonicsHandler;
impl Handler for ShieldHarmonicsHandler {
    fn execute(&self, _source: &AbilityActor, _target: Option<&AbilityActor>) -> Outcome {
        Outcome { success: true, description: "Shield Harmonics: +20 regen".to_string(), effect: Effect::ShieldRegenBuff { amount: 20.0 } }
    }
}

struct AcidicBurnHandler;
impl Handler for AcidicBurnHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("acidic_burn requires a target");
        }
        Outcome { success: true, description: "Acidic Burn: -5 armor for 3 rounds".to_string(), effect: Effect::ArmorDebuff { amount: 5.0, duration: 3 } }
    }
}

struct BlackHoleHandler;
impl Handler for BlackHoleHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("black_hole requires a target");
        }
        Outcome {
            success: true,
            description: "Vortex: sub-space singularity detected".to_string(),
            effect: Effect::AreaDenial { amount: 500.0, duration: 1 },
        }
    }
}

struct LogicVirusHandler;
impl Handler for LogicVirusHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("logic_virus requires a target");
        }
        Outcome { success: true, description: "Logic Virus: targeting heuristics compromised".to_string(), effect: Effect::Corruption { duration: 1 } }
    }
}

struct GravimetricAnchorHandler;
impl Handler for GravimetricAnchorHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("gravimetric_anchor requires a target");
        }
        Outcome { success: true, description: "Gravimetric Anchor: movement impossible".to_string(), effect: Effect::Immobilize { duration: 2 } }
    }
}

struct IonPulseHandler;
impl Handler for IonPulseHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("ion_pulse requires a target");
        }
        Outcome {
            success: true,
            description: "Ion Pulse: 50 shield dmg + 50% stun".to_string(),
            effect: Effect::Damage { amount: 50.0 },
        }
    }
}

struct TeslaArcHandler;
impl Handler for TeslaArcHandler {
    fn execute(&self, _source: &AbilityActor, _target: Option<&AbilityActor>) -> Outcome {
        Outcome { success: true, description: "Tesla Arc: 30 damage, chains to 2 targets".to_string(), effect: Effect::ChainDamage { amount: 30.0, chains: 2 } }
    }
}

struct MeltaBlastHandler;
impl Handler for MeltaBlastHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("melta_blast requires a target");
        }
        Outcome {
            success: true,
            description: "Melta Blast: thermal annihilation".to_string(),
            effect: Effect::ArmorPiercingDamage { amount: 80.0, ap: -4.0 },
        }
    }
}

struct NaniteSwarmHandler;
impl Handler for NaniteSwarmHandler {
    fn execute(&self, _source: &AbilityActor, target: Option<&AbilityActor>) -> Outcome {
        if target.is_none() {
            return Outcome::none("nanite_swarm requires a target");
        }
        Outcome { success: true, description: "Nanite Swarm: target is being consumed".to_string(), effect: Effect::Consumption { duration: 5 } }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor(id: u32, x: f32, y: f32) -> AbilityActor {
        AbilityActor { id: UnitId(id), position: Position::new(x, y), hp: 100.0, max_hp: 100.0 }
    }

    #[test]
    fn unknown_payload_type_is_missing_dependency() {
        let registry = AbilityRegistry::new();
        let spec = AbilitySpec { id: "ghost".to_string(), payload_type: "ghost".to_string(), range: 10.0, resource_cost: 0.0, cooldown: 0.0 };
        let result = dispatch(&registry, &spec, &actor(1, 0.0, 0.0), None, 0.0, 100.0);
        assert!(matches!(result, Err(BattleError::MissingDependency { .. })));
    }

    #[test]
    fn out_of_range_fails_without_error() {
        let registry = AbilityRegistry::with_defaults();
        let spec = AbilitySpec { id: "torp".to_string(), payload_type: "antimatter_torpedo".to_string(), range: 10.0, resource_cost: 0.0, cooldown: 0.0 };
        let outcome = dispatch(&registry, &spec, &actor(1, 0.0, 0.0), Some(&actor(2, 100.0, 0.0)), 0.0, 100.0).unwrap();
        assert!(!outcome.success);
    }

    #[test]
    fn cooldown_blocks_execution() {
        let registry = AbilityRegistry::with_defaults();
        let spec = AbilitySpec { id: "torp".to_string(), payload_type: "antimatter_torpedo".to_string(), range: 100.0, resource_cost: 0.0, cooldown: 5.0 };
        let outcome = dispatch(&registry, &spec, &actor(1, 0.0, 0.0), Some(&actor(2, 5.0, 0.0)), 2.0, 100.0).unwrap();
        assert!(!outcome.success);
    }

    #[test]
    fn resource_cost_blocks_execution() {
        let registry = AbilityRegistry::with_defaults();
        let spec = AbilitySpec { id: "torp".to_string(), payload_type: "antimatter_torpedo".to_string(), range: 100.0, resource_cost: 50.0, cooldown: 0.0 };
        let outcome = dispatch(&registry, &spec, &actor(1, 0.0, 0.0), Some(&actor(2, 5.0, 0.0)), 0.0, 10.0).unwrap();
        assert!(!outcome.success);
        assert!(outcome.description.contains("insufficient resources"));
    }

    #[test]
    fn antimatter_torpedo_deals_fixed_damage() {
        let registry = AbilityRegistry::with_defaults();
        let spec = AbilitySpec { id: "torp".to_string(), payload_type: "antimatter_torpedo".to_string(), range: 100.0, resource_cost: 0.0, cooldown: 0.0 };
        let outcome = dispatch(&registry, &spec, &actor(1, 0.0, 0.0), Some(&actor(2, 5.0, 0.0)), 0.0, 100.0).unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.effect, Effect::Damage { amount: 100.0 });
    }

    #[test]
    fn tractor_beam_force_scales_with_hp_ratio() {
        let source = AbilityActor { id: UnitId(1), position: Position::new(0.0, 0.0), hp: 200.0, max_hp: 200.0 };
        let target = actor(2, 1.0, 0.0);
        let outcome = TractorBeamHandler.execute(&source, Some(&target));
        assert!(matches!(outcome.effect, Effect::MobilityDebuff { fraction } if fraction > 0.0 && fraction <= 0.9));
    }
}
