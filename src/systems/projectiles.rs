//! Projectile manager.
//!
//! Projectiles are transient entities created by the engagement resolver
//! (H) and destroyed here on impact, expiry, or target death. The pool-reuse
//! requirement is met by `ProjectilePool`'s free-list,
//! the way reuses `SpatialGrid` buffers across ticks rather than
//! reallocating.

use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

use crate::components::UnitId;
use crate::doctrine::WeaponCategory;

/// A transient in-flight shot.
#[derive(Component, Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub source_unit_id: UnitId,
    pub target_unit_id: UnitId,
    pub target_component_index: Option<usize>,
    pub damage: f32,
    pub ap: f32,
    pub speed: f32,
    pub category: WeaponCategory,
    pub position: (f32, f32),
    pub velocity: (f32, f32),
    pub lifetime_remaining: f32,
    pub shield_mult: f32,
    pub hull_mult: f32,
    pub deviation: f32,
    pub effect_tags: Vec<String>,
}

impl Projectile {
    /// `lifetime = 1.2 * weapon_range / speed`.
    pub fn lifetime_for_range(weapon_range: f32, speed: f32) -> f32 {
        1.2 * weapon_range / speed.max(1.0)
    }

    /// Advances along velocity, tracking the target's current position
    /// ("advance along velocity toward target's current position").
    pub fn step(&mut self, target_pos: (f32, f32), dt: f32) -> bool {
        self.lifetime_remaining -= dt;
        let dx = target_pos.0 - self.position.0;
        let dy = target_pos.1 - self.position.1;
        let dist = (dx * dx + dy * dy).sqrt();
        if dist > 0.01 {
            self.velocity = (dx / dist * self.speed, dy / dist * self.speed);
        }
        self.position.0 += self.velocity.0 * dt;
        self.position.1 += self.velocity.1 * dt;

        let contact = dist <= (self.speed * dt).max(1.0);
        contact || self.lifetime_remaining <= 0.0
    }
}

/// Outcome of resolving a projectile's impact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ImpactSideEffect {
    None,
    /// `ion`/`emp`: double on hull if shields down, else no hull.
    IonOrEmp,
    /// `tesla`: 33% chance to bleed 0.5x damage to neighbors.
    Tesla,
    /// `radiation`/`poison`: morale -5, suppression +5.
    RadiationOrPoison,
    /// `nanite`: -1 armor.
    Nanite,
}

impl ImpactSideEffect {
    pub fn from_tags(tags: &[String]) -> Self {
        if tags.iter().any(|t| t == "ion" || t == "emp") {
            ImpactSideEffect::IonOrEmp
        } else if tags.iter().any(|t| t == "tesla") {
            ImpactSideEffect::Tesla
        } else if tags.iter().any(|t| t == "radiation" || t == "poison") {
            ImpactSideEffect::RadiationOrPoison
        } else if tags.iter().any(|t| t == "nanite") {
            ImpactSideEffect::Nanite
        } else {
            ImpactSideEffect::None
        }
    }
}

/// Result of splitting incoming damage across shield and hull
/// ("apply shield_mult*damage to shield; overflow spills at hull
/// rate hull_mult*damage").
#[derive(Debug, Clone, Copy, Default)]
pub struct ShieldHullSplit {
    pub shield_damage: f32,
    pub hull_damage: f32,
}

pub fn split_shield_hull(damage: f32, shield_mult: f32, hull_mult: f32, shield_current: f32) -> ShieldHullSplit {
    let shield_damage_requested = damage * shield_mult;
    if shield_current <= 0.0 {
        return ShieldHullSplit { shield_damage: 0.0, hull_damage: damage * hull_mult };
    }
    if shield_damage_requested <= shield_current {
        return ShieldHullSplit { shield_damage: shield_damage_requested, hull_damage: 0.0 };
    }
    let overflow_shield_damage = shield_damage_requested - shield_current;
    let overflow_hull_damage = overflow_shield_damage / shield_mult.max(1e-4) * hull_mult;
    ShieldHullSplit { shield_damage: shield_current, hull_damage: overflow_hull_damage }
}

/// Index-reusing pool for projectile slots.
#[derive(Resource, Debug, Default)]
pub struct ProjectilePool {
    free_entities: Vec<Entity>,
}

impl ProjectilePool {
    pub fn take_free(&mut self) -> Option<Entity> {
        self.free_entities.pop()
    }

    pub fn release(&mut self, entity: Entity) {
        self.free_entities.push(entity);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shield_overflow_spills_at_hull_rate() {
        let split = split_shield_hull(20.0, 1.0, 0.5, 5.0);
        assert_eq!(split.shield_damage, 5.0);
        // overflow shield damage = 15 -> overflow_hull = 15/1.0*0.5 = 7.5
        assert!((split.hull_damage - 7.5).abs() < 1e-4);
    }

    #[test]
    fn shields_down_routes_everything_to_hull() {
        let split = split_shield_hull(20.0, 3.0, 0.1, 0.0);
        assert_eq!(split.shield_damage, 0.0);
        assert!((split.hull_damage - 2.0).abs() < 1e-4);
    }

    #[test]
    fn side_effect_tags_resolve_correctly() {
        assert_eq!(ImpactSideEffect::from_tags(&["ion".to_string()]), ImpactSideEffect::IonOrEmp);
        assert_eq!(ImpactSideEffect::from_tags(&["nanite".to_string()]), ImpactSideEffect::Nanite);
        assert_eq!(ImpactSideEffect::from_tags(&[]), ImpactSideEffect::None);
    }

    #[test]
    fn lifetime_scales_with_range_over_speed() {
        assert!((Projectile::lifetime_for_range(100.0, 100.0) - 1.2).abs() < 1e-4);
    }
}
