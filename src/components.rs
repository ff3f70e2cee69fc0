//! ECS components for the tactical combat core.
//!
//! Components are pure data; all game logic lives in `systems::*`. Kept from
//! the original squad-based model: `Position`/`Velocity` (generalized to any
//! unit, not squads specifically) and the overall "components are plain
//! data, bundles assemble them" shape.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::doctrine::{Domain, MoraleState, SuppressionState, WeaponArc, WeaponCategory};

// ============================================================================
// IDENTITY
// ============================================================================

/// Unique identifier for a unit, stable within one battle.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId(pub u32);

/// Faction identifier. Two units of different factions may be hostile per
/// external diplomacy state; the core itself does not enforce hostility.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FactionId(pub u32);

/// Coarse unit class ("escort/capital/infantry/armor/…"); data-driven
/// rather than a class hierarchy.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Escort,
    Capital,
    Infantry,
    Armor,
    Titan,
    Vehicle,
    Monster,
}

/// Free-form unit tags (Interdictor, Fortress, Anti-Tank, Anti-Infantry,
/// Titan-Killer, …) used by the target selector and morale engine.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Tags(pub Vec<String>);

impl Tags {
    pub fn has(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }
}

/// Display name, kept separately from `UnitId` so ids can be dense integers.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Name(pub String);

// ============================================================================
// KINEMATICS
// ============================================================================

/// 2D position. `z` is optional height for
/// height-advantage accuracy bonuses.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y, z: 0.0 }
    }

    pub fn with_z(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance_to(&self, other: &Position) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn height_diff(&self, other: &Position) -> f32 {
        self.z - other.z
    }
}

/// 2D velocity vector.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
}

impl Velocity {
    pub fn new(vx: f32, vy: f32) -> Self {
        Self { vx, vy }
    }

    pub fn magnitude(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }

    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag < 0.0001 {
            Self::default()
        } else {
            Self { vx: self.vx / mag, vy: self.vy / mag }
        }
    }
}

/// Facing, speed, and turn characteristics.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Kinematics {
    /// Facing in degrees, 0 = East.
    pub facing: f32,
    pub current_speed: f32,
    pub max_speed: f32,
    /// Degrees per second, used by the space-domain inertial model.
    pub turn_rate: f32,
    pub acceleration: f32,
    /// Grid footprint `(w, h)` in tiles.
    pub footprint: (u32, u32),
}

impl Default for Kinematics {
    fn default() -> Self {
        Self {
            facing: 0.0,
            current_speed: 0.0,
            max_speed: 10.0,
            turn_rate: 90.0,
            acceleration: 20.0,
            footprint: (1, 1),
        }
    }
}

// ============================================================================
// COMBAT STATS
// ============================================================================

/// Armor facets by bearing.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Armor {
    pub front: f32,
    pub side: f32,
    pub rear: f32,
}

impl Armor {
    /// Armor facet hit by an attacker at the given relative bearing
    /// ("Front: 315-45°, Side: 45-135° ∪ 225-315°, Rear: 135-225°").
    pub fn facet_for_bearing(&self, relative_bearing_deg: f32) -> f32 {
        let b = relative_bearing_deg.abs();
        if b <= 45.0 {
            self.front
        } else if b >= 135.0 {
            self.rear
        } else {
            self.side
        }
    }
}

/// Combat stats.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CombatStats {
    pub melee_attack: f32,
    pub melee_defense: f32,
    /// 0-100.
    pub ballistic_skill: f32,
    pub armor: Armor,
    pub damage: f32,
    pub evasion: f32,
    /// Folded into the suppression-add formula: `amount * 100/(100+resistance)`.
    pub suppression_resistance: f32,
    /// `invuln` save input to the mitigation formula; default is 7 (none).
    pub invuln: f32,
    /// Overridden per unit; falls back to the domain default.
    pub max_detection_range: Option<f32>,
    pub leadership: f32,
}

impl Default for CombatStats {
    fn default() -> Self {
        Self {
            melee_attack: 3.0,
            melee_defense: 3.0,
            ballistic_skill: 50.0,
            armor: Armor::default(),
            damage: 1.0,
            evasion: 0.0,
            suppression_resistance: 0.0,
            invuln: 7.0,
            max_detection_range: None,
            leadership: 4.0,
        }
    }
}

// ============================================================================
// RESOURCES (hp/shield/morale/suppression/fatigue/xp)
// ============================================================================

/// Hit points. Always holds `0 <= current <= max`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Health {
    pub current: f32,
    pub max: f32,
}

impl Health {
    pub fn new(max: f32) -> Self {
        Self { current: max, max }
    }

    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 { 0.0 } else { (self.current / self.max).clamp(0.0, 1.0) }
    }

    pub fn is_alive(&self) -> bool {
        self.current > 0.0
    }

    pub fn damage(&mut self, amount: f32) {
        self.current = (self.current - amount).clamp(0.0, self.max);
    }

    pub fn heal(&mut self, amount: f32) {
        self.current = (self.current + amount).clamp(0.0, self.max);
    }
}

impl Default for Health {
    fn default() -> Self {
        Self::new(100.0)
    }
}

/// Shield pool with regen; disabled when the generator component is destroyed.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Shield {
    pub current: f32,
    pub max: f32,
    pub regen_per_sec: f32,
    /// Index into the owning unit's `Loadout.components` for the generator.
    pub generator_index: Option<usize>,
}

impl Shield {
    pub fn new(max: f32, regen_per_sec: f32) -> Self {
        Self { current: max, max, regen_per_sec, generator_index: None }
    }

    pub fn none() -> Self {
        Self { current: 0.0, max: 0.0, regen_per_sec: 0.0, generator_index: None }
    }

    pub fn regen(&mut self, dt: f32, generator_alive: bool, regen_mult: f32) {
        if !generator_alive {
            self.current = 0.0;
            return;
        }
        self.current = (self.current + self.regen_per_sec * regen_mult * dt).min(self.max);
    }
}

impl Default for Shield {
    fn default() -> Self {
        Self::none()
    }
}

/// Morale value; a unit's `state` is derived by `systems::morale`.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Morale {
    pub current: f32,
    pub max: f32,
    pub state: MoraleState,
}

impl Default for Morale {
    fn default() -> Self {
        Self { current: 10.0, max: 10.0, state: MoraleState::Steady }
    }
}

/// Suppression, a 0-100 scalar.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Suppression {
    pub value: f32,
}

impl Default for Suppression {
    fn default() -> Self {
        Self { value: 0.0 }
    }
}

impl Suppression {
    /// `amount * 100/(100+resistance)`, clamped to 100.
    pub fn add(&mut self, amount: f32, resistance: f32) {
        let effective = amount * (100.0 / (100.0 + resistance.max(0.0)));
        self.value = (self.value + effective).min(100.0);
    }

    /// `-10/s` baseline, `-15/s` in cover.
    pub fn decay(&mut self, dt: f32, in_cover: bool) {
        let rate = if in_cover { 15.0 } else { 10.0 };
        self.value = (self.value - rate * dt).max(0.0);
    }

    pub fn state(&self) -> SuppressionState {
        SuppressionState::from_value(self.value)
    }
}

/// Fatigue 0-100.
#[derive(Component, Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Fatigue {
    pub value: f32,
}

impl Default for Fatigue {
    fn default() -> Self {
        Self { value: 0.0 }
    }
}

impl Fatigue {
    pub fn apply(&mut self, delta: f32) {
        self.value = (self.value + delta).clamp(0.0, 100.0);
    }
}

/// Experience and rank.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Experience {
    pub xp: f32,
    pub rank: u32,
}

// ============================================================================
// LOADOUT / COMPONENTS (hardpoints)
// ============================================================================

/// Hardpoint type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HardpointKind {
    Hull,
    Shield,
    Engine,
    Weapon,
}

/// Weapon-specific stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeaponStats {
    pub range: f32,
    pub strength: f32,
    pub ap: f32,
    pub attacks_per_sec: f32,
    pub arc: WeaponArc,
    pub category: WeaponCategory,
    pub cooldown_remaining: f32,
    /// Overrides the category default.
    pub shield_mult_override: Option<f32>,
    pub hull_mult_override: Option<f32>,
    /// Tags like `ion`, `emp`, `tesla`, `radiation`, `poison`, `nanite`.
    pub effect_tags: Vec<String>,
}

impl WeaponStats {
    pub fn is_ion(&self) -> bool {
        matches!(self.category, WeaponCategory::Ion)
    }
}

/// One addressable hardpoint owned by a unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hardpoint {
    pub kind: HardpointKind,
    pub name: String,
    pub max_hp: f32,
    pub current_hp: f32,
    pub is_destroyed: bool,
    pub weapon: Option<WeaponStats>,
}

impl Hardpoint {
    pub fn hull(name: impl Into<String>, max_hp: f32) -> Self {
        Self { kind: HardpointKind::Hull, name: name.into(), max_hp, current_hp: max_hp, is_destroyed: false, weapon: None }
    }

    pub fn shield_generator(name: impl Into<String>, max_hp: f32) -> Self {
        Self { kind: HardpointKind::Shield, name: name.into(), max_hp, current_hp: max_hp, is_destroyed: false, weapon: None }
    }

    pub fn engine(name: impl Into<String>, max_hp: f32) -> Self {
        Self { kind: HardpointKind::Engine, name: name.into(), max_hp, current_hp: max_hp, is_destroyed: false, weapon: None }
    }

    pub fn weapon(name: impl Into<String>, max_hp: f32, weapon: WeaponStats) -> Self {
        Self { kind: HardpointKind::Weapon, name: name.into(), max_hp, current_hp: max_hp, is_destroyed: false, weapon: Some(weapon) }
    }

    /// Destruction permanently removes the component's contribution.
    pub fn damage(&mut self, amount: f32) {
        if self.is_destroyed {
            return;
        }
        self.current_hp = (self.current_hp - amount).max(0.0);
        if self.current_hp <= 0.0 {
            self.is_destroyed = true;
        }
    }
}

/// Ordered loadout of hardpoints. Order is load-bearing:
/// hardpoint selection walks this list.
#[derive(Component, Debug, Clone, Default, Serialize, Deserialize)]
pub struct Loadout {
    pub components: Vec<Hardpoint>,
}

impl Loadout {
    pub fn weapons(&self) -> impl Iterator<Item = &Hardpoint> {
        self.components.iter().filter(|c| c.kind == HardpointKind::Weapon && !c.is_destroyed)
    }

    pub fn weapons_mut(&mut self) -> impl Iterator<Item = &mut Hardpoint> {
        self.components.iter_mut().filter(|c| c.kind == HardpointKind::Weapon && !c.is_destroyed)
    }

    pub fn shield_generator_alive(&self) -> bool {
        self.components.iter().any(|c| c.kind == HardpointKind::Shield && !c.is_destroyed)
    }

    pub fn max_weapon_range(&self) -> f32 {
        self.weapons().filter_map(|c| c.weapon.as_ref()).map(|w| w.range).fold(0.0, f32::max)
    }
}

// ============================================================================
// RUNTIME FLAGS & DIRECTIVES
// ============================================================================

/// Runtime state flags; `is_alive` is derived, not
/// stored, from `Health` + hull hardpoint state.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct UnitFlags {
    pub is_routing: bool,
    pub is_engaged: bool,
}

/// Cached target selection with a TTL.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TargetCache {
    pub unit_id: Option<UnitId>,
    pub component_index: Option<usize>,
    /// Absolute `total_sim_time` at which this cache entry expires.
    pub ttl: f32,
}

/// Tactical directive assigned to a unit or inherited from its faction.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TacticalDirective {
    pub doctrine: crate::doctrine::Doctrine,
}

/// Marks a unit's domain; combined with `Tags` this backs the
/// detect-domain-by-tag-inspection fallback when no explicit hint is given.
pub type UnitDomain = Domain;

/// Time since this unit last took damage, used by the morale/rally logic.
#[derive(Component, Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TimeSinceDamage(pub f32);

/// Which formation (if any) this unit belongs to, and its slot index.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FormationMembership {
    pub formation_entity: Entity,
    pub slot_index: usize,
}

// ============================================================================
// BUNDLES
// ============================================================================

/// Minimal bundle for spawning a unit; callers add `Loadout`, `Shield`,
/// `TacticalDirective`, `Tags`, etc. as needed (mirrors the
/// `SquadBundle` pattern of "base stats bundle, extras layered on").
#[derive(Bundle)]
pub struct UnitBundle {
    pub id: UnitId,
    pub faction: FactionId,
    pub name: Name,
    pub kind: UnitKind,
    pub domain: Domain,
    pub tags: Tags,
    pub position: Position,
    pub velocity: Velocity,
    pub kinematics: Kinematics,
    pub combat_stats: CombatStats,
    pub health: Health,
    pub shield: Shield,
    pub morale: Morale,
    pub suppression: Suppression,
    pub fatigue: Fatigue,
    pub experience: Experience,
    pub loadout: Loadout,
    pub flags: UnitFlags,
    pub target_cache: TargetCache,
    pub directive: TacticalDirective,
    pub time_since_damage: TimeSinceDamage,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_clamps_both_ends() {
        let mut hp = Health::new(100.0);
        hp.damage(150.0);
        assert_eq!(hp.current, 0.0);
        hp.heal(500.0);
        assert_eq!(hp.current, 100.0);
    }

    #[test]
    fn shield_drops_to_zero_without_generator() {
        let mut shield = Shield::new(50.0, 5.0);
        shield.current = 30.0;
        shield.regen(1.0, false, 1.0);
        assert_eq!(shield.current, 0.0);
    }

    #[test]
    fn suppression_add_uses_resistance_formula() {
        let mut s = Suppression::default();
        s.add(50.0, 0.0);
        assert!((s.value - 50.0).abs() < 1e-4);

        let mut s2 = Suppression::default();
        s2.add(50.0, 100.0);
        assert!((s2.value - 25.0).abs() < 1e-4);
    }

    #[test]
    fn armor_facet_matches_bearing_bands() {
        let armor = Armor { front: 1.0, side: 2.0, rear: 3.0 };
        assert_eq!(armor.facet_for_bearing(0.0), 1.0);
        assert_eq!(armor.facet_for_bearing(90.0), 2.0);
        assert_eq!(armor.facet_for_bearing(180.0), 3.0);
        assert_eq!(armor.facet_for_bearing(-170.0), 3.0);
    }

    #[test]
    fn hardpoint_destruction_is_permanent() {
        let mut hp = Hardpoint::hull("hull", 10.0);
        hp.damage(10.0);
        assert!(hp.is_destroyed);
        hp.damage(0.0);
        assert!(hp.is_destroyed);
    }
}
