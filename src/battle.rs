//! Tick loop and battle state.
//!
//! Grounded on `api::SimWorld`: one struct owning a `World` plus the
//! non-ECS resources a battle needs (terrain, RNG registry, event log),
//! exposing `tick`/`execute_round`/`check_victory` as its public surface.
//! Systems here are driven by direct `QueryState` calls inside `tick()`
//! rather than a `bevy_ecs::Schedule` — the tick algorithm's step order is
//! itself the scheduling contract, and a hand-ordered sequence of queries
//! makes that order textually obvious (see DESIGN.md).

use std::collections::HashMap;

use bevy_ecs::prelude::*;
use tracing::{debug, warn};

use crate::abilities::{self, AbilityActor, AbilityRegistry, AbilitySpec, Effect, ModifierStat, Outcome};
use crate::components::*;
use crate::config::BattleConfig;
use crate::doctrine::{Doctrine, Domain, MoraleState, SuppressionState};
use crate::error::{BattleError, BattleResult, Severity};
use crate::formation::{Formation, FormationModifiers, FormationPreset, FormationShape};
use crate::report::{EventKind, EventLog, FactionReport, ObjectiveTimelineEntry, PostActionReport, ReportMeta, Snapshot, UnitSnapshot};
use crate::rng::{RngRegistry, STREAM_COMBAT, STREAM_PHASES};
use crate::spatial::{quadtree::Entry as QuadEntry, SpatialIndex};
use crate::systems::engagement::{self, MitigationInput};
use crate::systems::morale::{self, MoraleCheckInput, MoraleOutcome};
use crate::systems::projectiles::{ImpactSideEffect, Projectile, ProjectilePool};
use crate::systems::steering::{self, SteeringInput};
use crate::systems::targeting::{self, TargetSelectorInput};
use crate::terrain::{MapTemplate, TerrainGrid, TerrainResource};

/// A named group of units sharing a formation shape/preset, given by index
/// into the owning army's `units`.
pub struct FormationAssignment {
    pub shape: FormationShape,
    pub preset: FormationPreset,
    pub spacing: f32,
    pub facing: f32,
    pub member_indices: Vec<usize>,
}

/// One army's declared units and doctrine, as given to `Battle::initialize`.
pub struct ArmySpec {
    pub faction: FactionId,
    pub faction_name: String,
    pub doctrine: Doctrine,
    pub is_defender: bool,
    pub units: Vec<UnitBundle>,
    pub formations: Vec<FormationAssignment>,
}

/// Everything `initialize_battle` needs.
pub struct BattleSpec {
    pub armies: Vec<ArmySpec>,
    pub domain_hint: Option<Domain>,
    pub map_template: Option<MapTemplate>,
    pub base_seed: u64,
    pub config: BattleConfig,
}

fn grid_size_for(total_units: usize) -> (f32, f32) {
    if total_units < 20 {
        (30.0, 30.0)
    } else if total_units < 60 {
        (50.0, 50.0)
    } else if total_units >= 150 {
        (100.0, 100.0)
    } else {
        (80.0, 80.0)
    }
}

/// Deterministic jitter so units deploy near opposing edges without
/// stacking exactly on a line.
fn deploy_jitter(faction_id: u32, index: usize) -> f32 {
    let mixed = (faction_id.wrapping_mul(2654435761)).wrapping_add(index as u32 * 40503);
    ((mixed % 1000) as f32 / 1000.0 - 0.5) * 6.0
}

/// Per-faction accrued stats, surfaced in the post-action report
/// ("BattleState owns battle_stats: map<faction_id, {damage_dealt,
/// units_lost, kills, ...}>").
#[derive(Debug, Clone, Default)]
struct FactionBattleStats {
    damage_dealt: f64,
    units_lost: u32,
    kills: u32,
}

/// Owns the ECS world and every non-ECS resource a battle needs.
pub struct Battle {
    pub world: World,
    pub config: BattleConfig,
    pub rng: RngRegistry,
    pub total_sim_time: f32,
    pub last_snapshot_time: f32,
    pub rounds_since_last_damage: u32,
    pub rounds_since_last_kill: u32,
    pub map_name: String,
    pub defender_factions: Vec<FactionId>,
    pub faction_names: HashMap<u32, String>,
    entity_by_id: HashMap<UnitId, Entity>,
    next_unit_id: u32,
    cancelled: bool,
    ability_registry: AbilityRegistry,
    /// Per-faction ability-resource stockpile, decremented on successful use.
    faction_resources: HashMap<u32, f32>,
    /// Per-faction accrued victory points, driven by `TacticalObjective::vp_per_sec`.
    victory_points: HashMap<u32, f64>,
    battle_stats: HashMap<u32, FactionBattleStats>,
    objective_timeline: Vec<ObjectiveTimelineEntry>,
}

/// Final outcome of a victory check.
#[derive(Debug, Clone)]
pub struct VictoryResult {
    pub winner: Option<FactionId>,
    pub survivors: Vec<FactionId>,
    pub finished: bool,
}

impl Battle {
    /// `initialize_battle`.
    pub fn initialize(spec: BattleSpec) -> BattleResult<Self> {
        let total_units: usize = spec.armies.iter().map(|a| a.units.len()).sum();
        let (width, height) = grid_size_for(total_units);

        // Domain hint wins; otherwise every unit's own `Domain` field in its
        // bundle is authoritative, so a single fallback suffices here.
        let domain = spec.domain_hint.unwrap_or(Domain::Ground);

        let mut world = World::new();
        world.insert_resource(spec.config.clone());
        world.insert_resource(SpatialIndex::new(width, height));
        world.insert_resource(ProjectilePool::default());
        world.insert_resource(EventLog::default());

        let map_template = spec.map_template.unwrap_or_else(|| MapTemplate::default_for_domain(domain));
        let mut terrain = TerrainGrid::new(width, height);
        terrain.apply_template(map_template);
        world.insert_resource(TerrainResource::new(terrain));

        let mut battle = Self {
            world,
            config: spec.config,
            rng: RngRegistry::new(spec.base_seed),
            total_sim_time: 0.0,
            last_snapshot_time: 0.0,
            rounds_since_last_damage: 0,
            rounds_since_last_kill: 0,
            map_name: format!("{map_template:?}"),
            defender_factions: spec.armies.iter().filter(|a| a.is_defender).map(|a| a.faction).collect(),
            faction_names: HashMap::new(),
            entity_by_id: HashMap::new(),
            next_unit_id: 0,
            cancelled: false,
            ability_registry: AbilityRegistry::with_defaults(),
            faction_resources: HashMap::new(),
            victory_points: HashMap::new(),
            battle_stats: HashMap::new(),
            objective_timeline: Vec::new(),
        };

        let starting_resources = battle.config.starting_faction_resources;
        let num_armies = spec.armies.len().max(1) as f32;
        for (army_index, army) in spec.armies.into_iter().enumerate() {
            battle.faction_names.insert(army.faction.0, army.faction_name.clone());
            battle.faction_resources.entry(army.faction.0).or_insert(starting_resources);
            let edge_x = if num_armies <= 1.0 { width / 2.0 } else { width * (army_index as f32 / (num_armies - 1.0).max(1.0)) };

            let formations = army.formations;
            let mut spawned: Vec<Entity> = Vec::with_capacity(army.units.len());
            for (unit_index, mut bundle) in army.units.into_iter().enumerate() {
                let jitter_x = deploy_jitter(army.faction.0, unit_index);
                let jitter_y = deploy_jitter(army.faction.0.wrapping_add(1), unit_index);
                let target_x = (edge_x + jitter_x).clamp(1.0, width - 1.0);
                let target_y = (height / 2.0 + unit_index as f32 * 3.0 + jitter_y).clamp(1.0, height - 1.0);

                let footprint = bundle.kinematics.footprint;
                if !battle.deployment_is_clear(target_x, target_y, footprint, width, height) {
                    return Err(BattleError::invalid_placement(format!(
                        "unit {:?} of faction {:?} cannot be placed at ({target_x}, {target_y})",
                        bundle.id, army.faction
                    )));
                }

                bundle.id = UnitId(battle.next_unit_id);
                battle.next_unit_id += 1;
                bundle.faction = army.faction;
                bundle.position = Position::new(target_x, target_y);
                bundle.domain = domain;
                bundle.directive = TacticalDirective { doctrine: army.doctrine };

                let id = bundle.id;
                let entity = battle.world.spawn(bundle).id();
                battle.entity_by_id.insert(id, entity);
                spawned.push(entity);
            }

            for assignment in formations {
                let mut formation = Formation::new(assignment.shape, assignment.preset, assignment.spacing, assignment.facing);
                let members: Vec<Entity> = assignment.member_indices.iter().filter_map(|&i| spawned.get(i).copied()).collect();
                formation.members = members.clone();
                let formation_entity = battle.world.spawn(formation).id();
                for (slot_index, member_entity) in members.into_iter().enumerate() {
                    battle.world.entity_mut(member_entity).insert(FormationMembership { formation_entity, slot_index });
                }
            }
        }

        Ok(battle)
    }

    fn deployment_is_clear(&self, x: f32, y: f32, footprint: (u32, u32), width: f32, height: f32) -> bool {
        let (fw, fh) = (footprint.0 as f32, footprint.1 as f32);
        if x - fw / 2.0 < 0.0 || x + fw / 2.0 > width || y - fh / 2.0 < 0.0 || y + fh / 2.0 > height {
            return false;
        }
        let terrain = self.world.get_resource::<TerrainResource>();
        if let Some(terrain) = terrain {
            if terrain.0.read().map(|g| g.is_obstructed(x, y)).unwrap_or(false) {
                return false;
            }
        }
        true
    }

    /// This unit's formation stat modifiers, or the identity set if it
    /// belongs to none.
    fn formation_modifiers_for(&self, entity: Entity, is_charging: bool) -> FormationModifiers {
        let Some(membership) = self.world.get::<FormationMembership>(entity) else { return FormationModifiers::default() };
        let Some(formation) = self.world.get::<Formation>(membership.formation_entity) else { return FormationModifiers::default() };
        formation.modifiers(is_charging)
    }

    pub fn entity_for(&self, id: UnitId) -> Option<Entity> {
        self.entity_by_id.get(&id).copied()
    }

    fn clamp_and_log(&mut self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        warn!(%message, "inconsistent state recovered");
        let time = self.total_sim_time;
        self.world.resource_mut::<EventLog>().push(time, EventKind::Diagnostic { message, severity });
    }

    /// Real-time tick algorithm, steps 1-11.
    pub fn tick(&mut self, dt: f32) -> VictoryResult {
        self.total_sim_time += dt;

        // Step 1: snapshot cadence is tracked by the caller via `maybe_snapshot`.

        self.rebuild_spatial_index();

        // Step 2: per-faction enemy centroids (non-routing, fallback to all).
        let centroids = self.compute_enemy_centroids();

        // Step 3: per-unit suppression/morale/movement/fatigue/xp.
        self.step_suppression_and_morale(dt);
        self.step_movement(dt, &centroids);

        // Step 4: abilities are driven externally via `Battle::use_ability`;
        // the tick itself only ticks down what they applied.

        // Step 5: advance existing projectiles, resolve impacts.
        self.step_projectiles(dt);

        // Step 6: shooting pass spawns new projectiles; melee resolves instantly.
        self.step_shooting_and_melee(dt);

        // Step 7: cooldowns.
        self.tick_cooldowns(dt);

        // Step 8: shield regen.
        self.step_shield_regen(dt);

        // Step 9: objectives.
        self.step_objectives(dt);

        // Step 10 (orbital support) is handled by `systems::phases` in the
        // round-based driver; the real-time driver exposes the same gate via
        // `Battle::orbital_support_due`.

        // Step 11.
        self.check_victory(false)
    }

    /// `execute_round`: the round-based advance.
    pub fn execute_round(&mut self) -> VictoryResult {
        let fixed = self.config.fixed_round_seconds;
        self.total_sim_time += fixed;
        self.tick(fixed)
    }

    fn rebuild_spatial_index(&mut self) {
        let mut query = self.world.query::<(&UnitId, &Position, &FactionId, &Health)>();
        let entries: Vec<(UnitId, Position, FactionId, Health)> = query.iter(&self.world).map(|(id, pos, faction, health)| (*id, *pos, *faction, *health)).collect();

        let mut index = self.world.resource_mut::<SpatialIndex>();
        index.quadtree.clear();
        index.tracker.clear();
        for (id, pos, faction, health) in entries {
            if !health.is_alive() {
                continue;
            }
            index.quadtree.insert(QuadEntry { id, x: pos.x, y: pos.y });
            index.tracker.push(id, pos.x, pos.y, faction.0);
        }
        index.tracker.finalize();
    }

    fn compute_enemy_centroids(&mut self) -> HashMap<u32, (f32, f32)> {
        let mut by_faction_all: HashMap<u32, Vec<(f32, f32)>> = HashMap::new();
        let mut by_faction_active: HashMap<u32, Vec<(f32, f32)>> = HashMap::new();
        let mut query = self.world.query::<(&FactionId, &Position, &Health, &UnitFlags)>();
        for (faction, pos, health, flags) in query.iter(&self.world) {
            if !health.is_alive() {
                continue;
            }
            by_faction_all.entry(faction.0).or_default().push((pos.x, pos.y));
            if !flags.is_routing {
                by_faction_active.entry(faction.0).or_default().push((pos.x, pos.y));
            }
        }
        let factions: Vec<u32> = by_faction_all.keys().copied().collect();
        let mut centroids = HashMap::new();
        for &faction in &factions {
            let mut enemy_positions: Vec<(f32, f32)> = Vec::new();
            for &other in &factions {
                if other == faction {
                    continue;
                }
                let pool = by_faction_active.get(&other).filter(|v| !v.is_empty()).or_else(|| by_faction_all.get(&other));
                if let Some(pool) = pool {
                    enemy_positions.extend(pool.iter().copied());
                }
            }
            if enemy_positions.is_empty() {
                continue;
            }
            let n = enemy_positions.len() as f32;
            let (sx, sy) = enemy_positions.iter().fold((0.0, 0.0), |(ax, ay), (x, y)| (ax + x, ay + y));
            centroids.insert(faction, (sx / n, sy / n));
        }
        centroids
    }

    /// Position and owning faction of every living Interdictor-tagged unit,
    /// used both for the trap/morale check here and for the targeting
    /// protect/trapped bonuses in `fire_weapons_for`.
    fn interdictor_positions(&mut self) -> Vec<(u32, f32, f32)> {
        let mut query = self.world.query::<(&FactionId, &Position, &Tags, &Health)>();
        query
            .iter(&self.world)
            .filter(|(_, _, tags, health)| health.is_alive() && tags.has("Interdictor"))
            .map(|(f, p, _, _)| (f.0, p.x, p.y))
            .collect()
    }

    /// Per-entity count of same-faction routing units within
    /// `chain_routing_radius`, computed via the quadtree built earlier this
    /// tick by `rebuild_spatial_index`.
    fn routing_nearby_counts(&mut self) -> HashMap<Entity, u32> {
        let routing_factions: HashMap<UnitId, u32> = {
            let mut query = self.world.query::<(&UnitId, &FactionId, &UnitFlags, &Health)>();
            query.iter(&self.world).filter(|(_, _, flags, health)| health.is_alive() && flags.is_routing).map(|(id, f, _, _)| (*id, f.0)).collect()
        };
        let checkable: Vec<(Entity, Position, u32)> = {
            let mut query = self.world.query::<(Entity, &Position, &FactionId, &UnitFlags, &Health)>();
            query.iter(&self.world).filter(|(_, _, _, flags, health)| health.is_alive() && !flags.is_routing).map(|(e, p, f, _, _)| (e, *p, f.0)).collect()
        };
        let radius = self.config.chain_routing_radius;
        let index = self.world.resource::<SpatialIndex>();
        checkable
            .into_iter()
            .map(|(entity, pos, faction)| {
                let count = index.quadtree.query_circle(pos.x, pos.y, radius).into_iter().filter(|entry| routing_factions.get(&entry.id).is_some_and(|f| *f == faction)).count() as u32;
                (entity, count)
            })
            .collect()
    }

    fn step_suppression_and_morale(&mut self, dt: f32) {
        let config = self.config.clone();
        let in_cover_lookup: Vec<(Entity, bool)> = {
            let mut query = self.world.query::<(Entity, &Position)>();
            let terrain = self.world.resource::<TerrainResource>().clone();
            query.iter(&self.world).map(|(e, pos)| (e, terrain.in_cover(pos.x, pos.y))).collect()
        };
        let in_cover: HashMap<Entity, bool> = in_cover_lookup.into_iter().collect();

        let interdictor_positions = self.interdictor_positions();
        let routing_nearby_counts = self.routing_nearby_counts();

        let roll_seq: Vec<u32> = {
            let rng = self.rng.stream(STREAM_COMBAT);
            use rand::Rng;
            (0..self.world.entities().len()).map(|_| rng.gen_range(2..=12)).collect()
        };

        let mut events = Vec::new();
        let mut roll_index = 0usize;
        {
            let mut query = self.world.query::<(
                Entity,
                &UnitId,
                &FactionId,
                &Position,
                &mut Suppression,
                &mut Morale,
                &Health,
                &Fatigue,
                &CombatStats,
                &mut UnitFlags,
                &mut TimeSinceDamage,
            )>();
            for (entity, unit_id, faction, pos, mut suppression, mut morale, health, fatigue, stats, mut flags, mut time_since_damage) in query.iter_mut(&mut self.world) {
                if !health.is_alive() {
                    continue;
                }
                let cover = *in_cover.get(&entity).unwrap_or(&false);
                suppression.decay(dt, cover);
                time_since_damage.0 += dt;

                if flags.is_routing {
                    if morale::can_rally(suppression.value, time_since_damage.0, morale.current, config.rally_suppression_ceiling, config.rally_grace_seconds, config.rally_threshold) {
                        flags.is_routing = false;
                        morale.state = MoraleState::Rallied;
                    }
                    continue;
                }

                if suppression.value <= 0.0 {
                    continue;
                }

                let roll = roll_seq.get(roll_index).copied().unwrap_or(7);
                roll_index += 1;
                let routing_nearby = routing_nearby_counts.get(&entity).copied().unwrap_or(0);
                let input = MoraleCheckInput {
                    leadership: stats.leadership,
                    hp_fraction: health.fraction(),
                    fatigue: fatigue.value / 100.0,
                    routing_nearby,
                    suppression: suppression.value,
                    roll_2d6: roll,
                };
                let interdictor_nearby = interdictor_positions.iter().any(|(f, x, y)| {
                    *f != faction.0 && {
                        let dx = x - pos.x;
                        let dy = y - pos.y;
                        (dx * dx + dy * dy).sqrt() < config.interdictor_influence_range
                    }
                });

                match morale::check_morale(&input, interdictor_nearby) {
                    MoraleOutcome::Held => {}
                    MoraleOutcome::Routs => {
                        flags.is_routing = true;
                        morale.state = MoraleState::Routing;
                        events.push((self.total_sim_time, EventKind::MoraleFailure { unit_id: *unit_id, roll, threshold: morale::morale_threshold(&input) }));
                        if routing_nearby > 0 {
                            events.push((self.total_sim_time, EventKind::ChainRouting { unit_id: *unit_id }));
                        }
                    }
                    MoraleOutcome::Trapped => {
                        events.push((self.total_sim_time, EventKind::InterdictionTrap { unit_id: *unit_id }));
                    }
                }
            }
        }

        if !events.is_empty() {
            let mut log = self.world.resource_mut::<EventLog>();
            for (time, kind) in events {
                log.push(time, kind);
            }
        }
    }

    /// Precomputes each formation member's world-space slot target and stat
    /// modifiers ahead of the movement query, since `Formation` lives on a
    /// separate entity and can't be joined into the same query tuple.
    fn formation_targets(&mut self) -> HashMap<Entity, ((f32, f32), FormationModifiers)> {
        let memberships: Vec<(Entity, FormationMembership, Doctrine)> = {
            let mut query = self.world.query::<(Entity, &FormationMembership, &TacticalDirective)>();
            query.iter(&self.world).map(|(e, m, d)| (e, *m, d.doctrine)).collect()
        };

        let mut map = HashMap::new();
        for (entity, membership, doctrine) in memberships {
            let Some(formation) = self.world.get::<Formation>(membership.formation_entity) else { continue };
            let positions: Vec<(f32, f32)> = formation.members.iter().filter_map(|&m| self.world.get::<Position>(m)).map(|p| (p.x, p.y)).collect();
            let (cx, cy) = formation.centroid(&positions);
            let (ox, oy) = formation.slot_offset(membership.slot_index);
            let modifiers = formation.modifiers(matches!(doctrine, Doctrine::Charge));
            map.insert(entity, ((cx + ox, cy + oy), modifiers));
        }
        map
    }

    fn step_movement(&mut self, dt: f32, centroids: &HashMap<u32, (f32, f32)>) {
        let terrain = self.world.resource::<TerrainResource>().clone();
        let formation_targets = self.formation_targets();

        let mut query = self.world.query::<(
            Entity,
            &FactionId,
            &mut Position,
            &mut Kinematics,
            &mut Fatigue,
            &mut Experience,
            &UnitFlags,
            &Suppression,
            &TacticalDirective,
            &Loadout,
            &Health,
            &Domain,
        )>();

        for (entity, faction, mut pos, mut kinematics, mut fatigue, mut xp, flags, suppression, directive, loadout, health, domain) in query.iter_mut(&mut self.world) {
            if !health.is_alive() {
                continue;
            }
            if suppression.state().is_pinned() {
                fatigue.apply(2.0 * dt);
                continue;
            }

            let target_point = centroids.get(&faction.0).copied().unwrap_or((pos.x, pos.y));
            let suppression_state = suppression.state();
            let (_, suppression_speed_mult, _) = suppression_state.modifiers();
            let (formation_slot, formation_mods) = formation_targets.get(&entity).copied().unwrap_or(((0.0, 0.0), FormationModifiers::default()));
            let formation_slot = formation_targets.contains_key(&entity).then_some(formation_slot);

            let steering_input = SteeringInput {
                position: *pos,
                facing_deg: kinematics.facing,
                is_routing: flags.is_routing,
                doctrine: directive.doctrine,
                target_point,
                max_weapon_range: loadout.max_weapon_range().max(1.0),
                neighbors: &[],
                obstacles: &[],
                formation_slot,
            };
            let (fx, fy) = steering::synthesize_steering(&steering_input);
            let terrain_mods = terrain.modifiers_at(pos.x, pos.y);

            // Ground is a stepwise grid kernel scaled by the usual
            // terrain/formation/suppression speed multipliers; space is
            // inertial, with throttle and turn-rate already baked into the
            // kinematics state by `advance_space_kinematics`.
            let (dx, dy) = match domain {
                Domain::Ground => {
                    let (sx, sy) = steering::ground_step_direction(fx, fy);
                    let speed = steering::speed_scale(&kinematics, terrain_mods, formation_mods.speed_mult, suppression_speed_mult, flags.is_routing);
                    (sx * speed * dt, sy * speed * dt)
                }
                Domain::Space => {
                    let (rx, ry) = steering::advance_space_kinematics(&mut kinematics, fx, fy, dt);
                    (rx * kinematics.max_speed * dt, ry * kinematics.max_speed * dt)
                }
            };
            if dx != 0.0 || dy != 0.0 {
                pos.x += dx;
                pos.y += dy;
                kinematics.facing = dy.atan2(dx).to_degrees();
                fatigue.apply(1.0 * dt);
            } else {
                fatigue.apply(-2.0 * dt);
            }
            xp.xp += 0.1 * dt;
        }
    }

    fn step_projectiles(&mut self, dt: f32) {
        let position_by_unit: HashMap<UnitId, (Position, bool, bool)> = {
            let mut query = self.world.query::<(&UnitId, &Position, &Health, &UnitFlags)>();
            query.iter(&self.world).map(|(id, pos, hp, flags)| (*id, (*pos, hp.is_alive(), flags.is_engaged))).collect()
        };

        let mut finished: Vec<(Entity, Projectile)> = Vec::new();
        {
            let mut query = self.world.query::<(Entity, &mut Projectile)>();
            for (entity, mut projectile) in query.iter_mut(&mut self.world) {
                let target_alive = position_by_unit.get(&projectile.target_unit_id).map(|(_, alive, _)| *alive).unwrap_or(false);
                if !target_alive {
                    finished.push((entity, projectile.clone()));
                    continue;
                }
                let target_pos = position_by_unit[&projectile.target_unit_id].0;
                if projectile.step((target_pos.x, target_pos.y), dt) {
                    finished.push((entity, projectile.clone()));
                }
            }
        }

        for (entity, projectile) in finished {
            self.world.despawn(entity);
            self.world.resource_mut::<ProjectilePool>().release(entity);
            let target_alive = position_by_unit.get(&projectile.target_unit_id).map(|(_, alive, _)| *alive).unwrap_or(false);
            if !target_alive {
                continue;
            }
            self.resolve_projectile_impact(&projectile);
        }
    }

    fn resolve_projectile_impact(&mut self, projectile: &Projectile) {
        let Some(&target_entity) = self.entity_by_id.get(&projectile.target_unit_id) else {
            self.clamp_and_log(format!("projectile impact references unknown unit {:?}", projectile.target_unit_id), Severity::Warning);
            return;
        };

        let (shield_current, shield_generator_alive, cover_mod, armor, is_fortress) = {
            let Ok(entity_ref) = self.world.get_entity(target_entity) else { return };
            let shield = entity_ref.get::<Shield>();
            let loadout = entity_ref.get::<Loadout>();
            let pos = entity_ref.get::<Position>().copied().unwrap_or_default();
            let armor = entity_ref.get::<Armor>().copied().unwrap_or_default();
            let tags = entity_ref.get::<Tags>();
            let terrain = self.world.resource::<TerrainResource>();
            (
                shield.map(|s| s.current).unwrap_or(0.0),
                loadout.map(|l| l.shield_generator_alive()).unwrap_or(false),
                terrain.cover_mod_at(pos.x, pos.y),
                armor,
                tags.map(|t| t.has("Fortress")).unwrap_or(false),
            )
        };

        let split = crate::systems::projectiles::split_shield_hull(projectile.damage, projectile.shield_mult, projectile.hull_mult, if shield_generator_alive { shield_current } else { 0.0 });

        if let Some(mut shield) = self.world.get_mut::<Shield>(target_entity) {
            shield.current = (shield.current - split.shield_damage).max(0.0);
        }

        if split.hull_damage > 0.0 {
            let relative_bearing_facet = armor.facet_for_bearing(0.0).max(armor.front).max(armor.side).max(armor.rear);
            let mitigation = engagement::mitigation_fraction(MitigationInput { armor_facet: relative_bearing_facet, ap: projectile.ap, cover_mod, invuln: 7.0, defense_mod: 0.0 });
            let target_defense_mult = self.formation_modifiers_for(target_entity, false).defense_mult;
            let final_damage = engagement::damage_out(split.hull_damage / 10.0, mitigation, 1.0, is_fortress) * target_defense_mult;

            if let Some(mut health) = self.world.get_mut::<Health>(target_entity) {
                health.damage(final_damage);
            }
            if let Some(mut time_since_damage) = self.world.get_mut::<TimeSinceDamage>(target_entity) {
                time_since_damage.0 = 0.0;
            }
            self.rounds_since_last_damage = 0;
            self.credit_damage(projectile.source_unit_id, final_damage as f64);

            if final_damage > self.config.cover_damage_threshold {
                if let Some(pos) = self.world.get::<Position>(target_entity).copied() {
                    self.world.resource_mut::<TerrainResource>().damage_cover(pos.x, pos.y, self.config.cover_damage_amount);
                }
            }

            let shields_were_up = shield_generator_alive && shield_current > 0.0;
            self.apply_projectile_side_effects(projectile, target_entity, final_damage, shields_were_up);
        }

        let died = self.world.get::<Health>(target_entity).map(|h| !h.is_alive()).unwrap_or(false);
        if died {
            let time = self.total_sim_time;
            let killer_faction = self.world.get::<FactionId>(self.entity_for(projectile.source_unit_id).unwrap_or(target_entity)).copied().unwrap_or(FactionId(0));
            self.world.resource_mut::<EventLog>().push(time, EventKind::UnitDeath { unit_id: projectile.target_unit_id, killer_faction });
            self.rounds_since_last_kill = 0;
            self.credit_kill(killer_faction, projectile.target_unit_id);
        }
    }

    /// Adds `amount` to `source_unit_id`'s faction's accrued damage stat.
    fn credit_damage(&mut self, source_unit_id: UnitId, amount: f64) {
        let Some(faction) = self.entity_for(source_unit_id).and_then(|e| self.world.get::<FactionId>(e)).copied() else { return };
        self.battle_stats.entry(faction.0).or_default().damage_dealt += amount;
    }

    /// Records a kill for `killer_faction` and a loss for `victim_id`'s faction.
    fn credit_kill(&mut self, killer_faction: FactionId, victim_id: UnitId) {
        self.battle_stats.entry(killer_faction.0).or_default().kills += 1;
        if let Some(victim_faction) = self.entity_for(victim_id).and_then(|e| self.world.get::<FactionId>(e)).copied() {
            self.battle_stats.entry(victim_faction.0).or_default().units_lost += 1;
        }
    }

    fn apply_projectile_side_effects(&mut self, projectile: &Projectile, target_entity: Entity, hull_damage_applied: f32, shields_were_up: bool) {
        match ImpactSideEffect::from_tags(&projectile.effect_tags) {
            ImpactSideEffect::IonOrEmp => {
                // Shields absorb ion/emp entirely; once they're down, the
                // same jolt that would have been shunted instead doubles on
                // the hull.
                if let Some(mut health) = self.world.get_mut::<Health>(target_entity) {
                    if shields_were_up {
                        health.heal(hull_damage_applied);
                    } else {
                        health.damage(hull_damage_applied);
                    }
                }
            }
            ImpactSideEffect::Tesla => {
                let roll: f32 = {
                    use rand::Rng;
                    self.rng.stream(STREAM_COMBAT).gen()
                };
                if roll < 0.33 {
                    self.bleed_tesla_neighbors(target_entity, hull_damage_applied * 0.5);
                }
            }
            ImpactSideEffect::RadiationOrPoison => {
                if let Some(mut morale) = self.world.get_mut::<Morale>(target_entity) {
                    morale.current = (morale.current - 5.0).max(0.0);
                }
                if let Some(mut suppression) = self.world.get_mut::<Suppression>(target_entity) {
                    suppression.add(5.0, 0.0);
                }
            }
            ImpactSideEffect::Nanite => {
                if let Some(mut armor) = self.world.get_mut::<Armor>(target_entity) {
                    armor.front = (armor.front - 1.0).max(0.0);
                    armor.side = (armor.side - 1.0).max(0.0);
                    armor.rear = (armor.rear - 1.0).max(0.0);
                }
            }
            ImpactSideEffect::None => {}
        }
    }

    /// Bleeds `amount` to every living same-faction unit within
    /// `tesla_bleed_radius` of `center_entity`.
    fn bleed_tesla_neighbors(&mut self, center_entity: Entity, amount: f32) {
        let Some(center_pos) = self.world.get::<Position>(center_entity).copied() else { return };
        let Some(faction) = self.world.get::<FactionId>(center_entity).copied() else { return };
        let radius = self.config.tesla_bleed_radius;

        let neighbors: Vec<Entity> = {
            let mut query = self.world.query::<(Entity, &Position, &FactionId, &Health)>();
            query
                .iter(&self.world)
                .filter(|(e, p, f, h)| *e != center_entity && **f == faction && h.is_alive() && center_pos.distance_to(p) <= radius)
                .map(|(e, _, _, _)| e)
                .collect()
        };
        for entity in neighbors {
            if let Some(mut health) = self.world.get_mut::<Health>(entity) {
                health.damage(amount);
            }
        }
    }

    fn step_shooting_and_melee(&mut self, dt: f32) {
        let unit_ids: Vec<UnitId> = {
            let mut query = self.world.query::<(&UnitId, &Health, &UnitFlags)>();
            query.iter(&self.world).filter(|(_, h, f)| h.is_alive() && !f.is_routing).map(|(id, _, _)| *id).collect()
        };
        let interdictor_positions = self.interdictor_positions();

        for attacker_id in unit_ids {
            self.fire_weapons_for(attacker_id, dt, &interdictor_positions);
        }
    }

    fn fire_weapons_for(&mut self, attacker_id: UnitId, dt: f32, interdictor_positions: &[(u32, f32, f32)]) {
        let Some(&attacker_entity) = self.entity_by_id.get(&attacker_id) else { return };

        let snapshot = {
            let Ok(entity_ref) = self.world.get_entity(attacker_entity) else { return };
            let pos = entity_ref.get::<Position>().copied();
            let faction = entity_ref.get::<FactionId>().copied();
            let tags = entity_ref.get::<Tags>().cloned();
            let directive = entity_ref.get::<TacticalDirective>().copied();
            let stats = entity_ref.get::<CombatStats>().copied();
            let domain = entity_ref.get::<Domain>().copied();
            let cache = entity_ref.get::<TargetCache>().copied();
            (pos, faction, tags, directive, stats, domain, cache)
        };
        let (Some(pos), Some(faction), Some(tags), Some(directive), Some(stats), Some(domain), Some(cache)) = snapshot else { return };

        let range_influence = self.config.interdictor_influence_range;
        let is_trapped = interdictor_positions.iter().any(|(f, x, y)| *f != faction.0 && { let dx = x - pos.x; let dy = y - pos.y; (dx * dx + dy * dy).sqrt() < range_influence });
        let friendly_interdictor_nearby = interdictor_positions.iter().any(|(f, x, y)| *f == faction.0 && { let dx = x - pos.x; let dy = y - pos.y; (dx * dx + dy * dy).sqrt() < range_influence });

        let max_cache_distance = match domain {
            Domain::Ground => self.config.max_cache_distance_ground,
            Domain::Space => self.config.max_cache_distance_space,
        };

        let cached = cache.unit_id.and_then(|id| {
            if cache.ttl <= self.total_sim_time {
                return None;
            }
            let entity = *self.entity_by_id.get(&id)?;
            let entity_ref = self.world.get_entity(entity).ok()?;
            let health = entity_ref.get::<Health>()?;
            if !health.is_alive() {
                return None;
            }
            let target_pos = *entity_ref.get::<Position>()?;
            if pos.distance_to(&target_pos) > max_cache_distance {
                return None;
            }
            Some(id)
        });

        let target_id = if let Some(id) = cached {
            id
        } else {
            let candidates = {
                let index = self.world.resource::<SpatialIndex>();
                let input = TargetSelectorInput { attacker_pos: pos, attacker_faction: faction, attacker_tags: &tags, doctrine: directive.doctrine, is_trapped, friendly_interdictor_nearby };
                targeting::gather_candidates(&index.quadtree, &input, |id| self.lookup_candidate_fields(id))
            };
            if candidates.is_empty() {
                return;
            }
            let input = TargetSelectorInput { attacker_pos: pos, attacker_faction: faction, attacker_tags: &tags, doctrine: directive.doctrine, is_trapped, friendly_interdictor_nearby };
            let Some(target_id) = targeting::select_target(&candidates, &input) else { return };
            if let Some(mut cache) = self.world.get_mut::<TargetCache>(attacker_entity) {
                cache.unit_id = Some(target_id);
                cache.component_index = None;
                cache.ttl = self.total_sim_time + self.config.target_cache_ttl;
            }
            target_id
        };

        let Some(&target_entity) = self.entity_by_id.get(&target_id) else { return };
        let Some(target_pos) = self.world.get::<Position>(target_entity).copied() else { return };

        let distance = pos.distance_to(&target_pos);
        let max_range = stats.max_detection_range.unwrap_or(self.config.max_detection_range_ground);
        if distance > max_range {
            return;
        }

        // Melee is a domain-bound clinch: a ground unit and a space hull
        // never trade blows hand to hand.
        let target_domain = self.world.get::<Domain>(target_entity).copied();
        if distance <= 5.0 && domain == Domain::Ground && target_domain == Some(Domain::Ground) {
            self.resolve_melee(attacker_entity, target_entity, &stats, dt);
            return;
        }

        self.spawn_shots(attacker_entity, attacker_id, target_id, pos, target_pos, dt);
    }

    fn lookup_candidate_fields(&self, id: UnitId) -> Option<(FactionId, Health, UnitFlags, UnitKind, CombatStats, Tags)> {
        let entity = *self.entity_by_id.get(&id)?;
        let entity_ref = self.world.get_entity(entity).ok()?;
        Some((
            *entity_ref.get::<FactionId>()?,
            *entity_ref.get::<Health>()?,
            *entity_ref.get::<UnitFlags>()?,
            *entity_ref.get::<UnitKind>()?,
            *entity_ref.get::<CombatStats>()?,
            entity_ref.get::<Tags>()?.clone(),
        ))
    }

    fn resolve_melee(&mut self, attacker_entity: Entity, target_entity: Entity, attacker_stats: &CombatStats, dt: f32) {
        let Some(target_stats) = self.world.get::<CombatStats>(target_entity).copied() else { return };
        let attacker_charging = self.world.get::<TacticalDirective>(attacker_entity).map(|d| matches!(d.doctrine, Doctrine::Charge)).unwrap_or(false);
        let attacker_mods = self.formation_modifiers_for(attacker_entity, attacker_charging);
        let target_mods = self.formation_modifiers_for(target_entity, false);

        let effective_evasion = target_stats.evasion * target_mods.evasion_mult;
        let hit_chance = (0.5 + (attacker_stats.melee_attack - target_stats.melee_defense) * 0.05 - effective_evasion / 100.0).clamp(0.05, 0.95);
        let roll: f32 = {
            use rand::Rng;
            self.rng.stream(STREAM_COMBAT).gen()
        };
        if roll >= hit_chance {
            return;
        }
        let cover_mod = {
            let pos = self.world.get::<Position>(target_entity).copied().unwrap_or_default();
            self.world.resource::<TerrainResource>().cover_mod_at(pos.x, pos.y)
        };
        let armor = self.world.get::<Armor>(target_entity).copied().unwrap_or_default();
        let mitigation = engagement::mitigation_fraction(MitigationInput { armor_facet: armor.front, ap: attacker_mods.bonus_ap, cover_mod, invuln: target_stats.invuln, defense_mod: 0.0 });
        let damage = engagement::damage_out(attacker_stats.melee_attack, mitigation, attacker_mods.damage_mult, false) * target_mods.defense_mult;
        if let Some(mut health) = self.world.get_mut::<Health>(target_entity) {
            health.damage(damage);
        }
        if let Some(mut flags) = self.world.get_mut::<UnitFlags>(attacker_entity) {
            flags.is_engaged = true;
        }
        self.rounds_since_last_damage = 0;
        if let Some(attacker_id) = self.world.get::<UnitId>(attacker_entity).copied() {
            self.credit_damage(attacker_id, damage as f64);
        }

        let died = self.world.get::<Health>(target_entity).map(|h| !h.is_alive()).unwrap_or(false);
        if died {
            let time = self.total_sim_time;
            let killer_faction = self.world.get::<FactionId>(attacker_entity).copied().unwrap_or(FactionId(0));
            let target_id = self.world.get::<UnitId>(target_entity).copied().unwrap_or(UnitId(0));
            self.world.resource_mut::<EventLog>().push(time, EventKind::UnitDeath { unit_id: target_id, killer_faction });
            self.rounds_since_last_kill = 0;
            self.credit_kill(killer_faction, target_id);
        }
        let _ = dt;
    }

    fn spawn_shots(&mut self, attacker_entity: Entity, attacker_id: UnitId, target_id: UnitId, pos: Position, target_pos: Position, dt: f32) {
        let relative_bearing = {
            let facing = self.world.get::<Kinematics>(attacker_entity).map(|k| k.facing).unwrap_or(0.0);
            engagement::relative_bearing((pos.x, pos.y), facing, (target_pos.x, target_pos.y))
        };

        let attacker_charging = self.world.get::<TacticalDirective>(attacker_entity).map(|d| matches!(d.doctrine, Doctrine::Charge)).unwrap_or(false);
        let attacker_mods = self.formation_modifiers_for(attacker_entity, attacker_charging);
        let target_entity = self.entity_by_id.get(&target_id).copied();
        let target_evasion = target_entity.and_then(|e| self.world.get::<CombatStats>(e)).map(|s| s.evasion).unwrap_or(0.0);
        let target_evasion_mult = target_entity.map(|e| self.formation_modifiers_for(e, false).evasion_mult).unwrap_or(1.0);
        let effective_evasion = target_evasion * target_evasion_mult;

        let weapons: Vec<(usize, WeaponStats)> = self
            .world
            .get::<Loadout>(attacker_entity)
            .map(|l| l.components.iter().enumerate().filter(|(_, c)| !c.is_destroyed).filter_map(|(i, c)| c.weapon.clone().map(|w| (i, w))).collect())
            .unwrap_or_default();

        let mut spawned: Vec<(usize, f32)> = Vec::new();
        for (index, weapon) in &weapons {
            if weapon.cooldown_remaining > 0.0 {
                continue;
            }
            if weapon.range < distance_2d(pos, target_pos) {
                continue;
            }
            if !engagement::in_arc(weapon.arc, relative_bearing) {
                continue;
            }
            let hit_chance = (engagement::accuracy(100.0, pos.height_diff(&target_pos), attacker_mods.accuracy_mult) - effective_evasion / 100.0).clamp(0.05, 0.95);
            let roll = {
                use rand::Rng;
                self.rng.stream(STREAM_COMBAT).gen::<f32>()
            };
            let speed = weapon.category.default_projectile_speed();
            let lifetime = Projectile::lifetime_for_range(weapon.range, speed);
            let (shield_mult, hull_mult) = engagement::shield_hull_mult(weapon);
            let damage = if roll < hit_chance { engagement::base_damage(weapon.strength, attacker_mods.damage_mult) } else { 0.0 };
            if damage <= 0.0 {
                continue;
            }

            let projectile = Projectile {
                source_unit_id: attacker_id,
                target_unit_id: target_id,
                target_component_index: None,
                damage,
                ap: weapon.ap + attacker_mods.bonus_ap,
                speed,
                category: weapon.category,
                position: (pos.x, pos.y),
                velocity: (0.0, 0.0),
                lifetime_remaining: lifetime,
                shield_mult,
                hull_mult,
                deviation: 0.0,
                effect_tags: weapon.effect_tags.clone(),
            };
            let entity = self.world.spawn(projectile).id();
            let time = self.total_sim_time;
            self.world.resource_mut::<EventLog>().push(time, EventKind::ShootingFire { attacker_id, target_id, weapon: format!("weapon_{index}"), range: weapon.range });
            let _ = entity;
            spawned.push((*index, 1.0 / weapon.attacks_per_sec.max(0.1)));
        }

        if let Some(mut loadout) = self.world.get_mut::<Loadout>(attacker_entity) {
            for (index, cooldown) in spawned {
                if let Some(component) = loadout.components.get_mut(index) {
                    if let Some(weapon) = component.weapon.as_mut() {
                        weapon.cooldown_remaining = cooldown;
                    }
                }
            }
        }
        let _ = dt;
    }

    fn tick_cooldowns(&mut self, dt: f32) {
        let mut query = self.world.query::<&mut Loadout>();
        for mut loadout in query.iter_mut(&mut self.world) {
            for weapon in loadout.weapons_mut().filter_map(|c| c.weapon.as_mut()) {
                weapon.cooldown_remaining = (weapon.cooldown_remaining - dt).max(0.0);
            }
        }
    }

    fn step_shield_regen(&mut self, dt: f32) {
        let formation_members: Vec<Entity> = {
            let mut query = self.world.query::<(Entity, &FormationMembership)>();
            query.iter(&self.world).map(|(e, _)| e).collect()
        };
        let regen_mults: HashMap<Entity, f32> = formation_members.into_iter().map(|e| (e, self.formation_modifiers_for(e, false).shield_regen_mult)).collect();

        let mut query = self.world.query::<(Entity, &mut Shield, &Loadout)>();
        for (entity, mut shield, loadout) in query.iter_mut(&mut self.world) {
            let mult = regen_mults.get(&entity).copied().unwrap_or(1.0);
            shield.regen(dt, loadout.shield_generator_alive(), mult);
        }
    }

    fn step_objectives(&mut self, dt: f32) {
        let faction_positions: Vec<(f32, f32, u32)> = {
            let mut query = self.world.query::<(&Position, &FactionId, &Health)>();
            query.iter(&self.world).filter(|(_, _, h)| h.is_alive()).map(|(p, f, _)| (p.x, p.y, f.0)).collect()
        };
        let terrain = self.world.resource::<TerrainResource>().clone();
        let Ok(mut grid) = terrain.0.write() else { return };

        let owners_before: HashMap<u32, Option<u32>> = grid.objectives.iter().map(|o| (o.id, o.owner)).collect();
        grid.update_objectives(dt, |objective| {
            let mut factions: Vec<u32> = faction_positions.iter().filter(|(x, y, _)| objective.contains(*x, *y)).map(|(_, _, f)| *f).collect();
            factions.sort_unstable();
            factions.dedup();
            factions
        });

        let time = self.total_sim_time;
        for objective in &grid.objectives {
            if let Some(owner) = objective.owner {
                *self.victory_points.entry(owner).or_default() += objective.vp_per_sec * dt as f64;
            }
            if owners_before.get(&objective.id).copied().flatten() != objective.owner {
                if let Some(new_owner) = objective.owner {
                    self.objective_timeline.push(ObjectiveTimelineEntry { time, objective: objective.id, new_owner: FactionId(new_owner) });
                    self.world.resource_mut::<EventLog>().push(time, EventKind::Capture { faction: FactionId(new_owner), objective_id: objective.id });
                }
            }
        }
    }

    /// Orbital support gate for the real-time driver.
    pub fn orbital_support_due(&self, gate: &mut crate::systems::phases::OrbitalSupportGate, dt: f32) -> bool {
        gate.tick(dt, self.config.orbital_support_interval)
    }

    pub fn snapshot_due(&self, throttled: bool) -> bool {
        let interval = if throttled { self.config.snap_interval_throttled } else { self.config.snap_interval };
        self.total_sim_time - self.last_snapshot_time >= interval
    }

    pub fn take_snapshot(&mut self) -> Snapshot {
        self.last_snapshot_time = self.total_sim_time;
        let mut query = self.world.query::<(&UnitId, &Name, &FactionId, &Position, &Health, &Kinematics, &UnitFlags)>();
        let units = query.iter(&self.world).map(|(id, name, faction, pos, health, kinematics, flags)| UnitSnapshot::capture(*id, name, *faction, pos, health, kinematics, flags)).collect();
        Snapshot { timestamp: self.total_sim_time, units }
    }

    /// Invokes one ability use. The dispatcher validates range/cost/cooldown;
    /// a successful outcome's effect is applied immediately and logged as
    /// `ability_use`, a failure as `ability_fail` — failures are non-fatal.
    pub fn use_ability(&mut self, spec: &AbilitySpec, source_id: UnitId, target_id: Option<UnitId>, cooldown_remaining: f32) -> Outcome {
        let Some(source) = self.entity_by_id.get(&source_id).copied().and_then(|e| actor_view(&self.world, e)) else {
            let time = self.total_sim_time;
            let reason = "source unit not found".to_string();
            self.world.resource_mut::<EventLog>().push(time, EventKind::AbilityFail { ability_id: spec.id.clone(), source_id, reason: reason.clone() });
            return Outcome { success: false, description: reason, effect: Effect::None };
        };
        let target = target_id.and_then(|id| self.entity_by_id.get(&id).copied()).and_then(|e| actor_view(&self.world, e));

        let source_faction = self.entity_by_id.get(&source_id).copied().and_then(|e| self.world.get::<FactionId>(e)).copied();
        let resource_available = source_faction.and_then(|f| self.faction_resources.get(&f.0).copied()).unwrap_or(0.0);

        let outcome = match abilities::dispatch(&self.ability_registry, spec, &source, target.as_ref(), cooldown_remaining, resource_available) {
            Ok(outcome) => outcome,
            Err(err) => {
                let time = self.total_sim_time;
                let reason = err.to_string();
                self.world.resource_mut::<EventLog>().push(time, EventKind::AbilityFail { ability_id: spec.id.clone(), source_id, reason: reason.clone() });
                return Outcome { success: false, description: reason, effect: Effect::None };
            }
        };

        let time = self.total_sim_time;
        if outcome.success {
            if let Some(faction) = source_faction {
                if let Some(pool) = self.faction_resources.get_mut(&faction.0) {
                    *pool = (*pool - spec.resource_cost).max(0.0);
                }
            }
            self.apply_ability_effect(target_id.unwrap_or(source_id), &outcome.effect);
            self.world.resource_mut::<EventLog>().push(time, EventKind::AbilityUse { ability_id: spec.id.clone(), source_id, target_id, effect: format!("{:?}", outcome.effect) });
        } else {
            self.world.resource_mut::<EventLog>().push(time, EventKind::AbilityFail { ability_id: spec.id.clone(), source_id, reason: outcome.description.clone() });
        }
        outcome
    }

    fn apply_ability_effect(&mut self, target_id: UnitId, effect: &Effect) {
        let Some(&entity) = self.entity_by_id.get(&target_id) else { return };
        match *effect {
            Effect::Damage { amount } | Effect::ArmorPiercingDamage { amount, .. } => {
                if let Some(mut health) = self.world.get_mut::<Health>(entity) {
                    abilities::apply_damage(&mut health, amount);
                }
            }
            Effect::Heal { amount } => {
                if let Some(mut health) = self.world.get_mut::<Health>(entity) {
                    abilities::apply_heal(&mut health, amount);
                }
            }
            Effect::ShieldRegenBuff { amount } => {
                if let Some(mut shield) = self.world.get_mut::<Shield>(entity) {
                    abilities::apply_shield_buff(&mut shield, amount);
                }
            }
            Effect::Teleport { distance } => {
                if let Some(mut position) = self.world.get_mut::<Position>(entity) {
                    abilities::teleport(&mut position, distance, 0.0);
                }
            }
            Effect::MobilityDebuff { fraction } => {
                let modifier = abilities::apply_modifier_with_duration(ModifierStat::Speed, fraction, 3.0);
                self.world.entity_mut(entity).insert(modifier);
            }
            Effect::ArmorDebuff { amount, duration } => {
                let modifier = abilities::apply_modifier_with_duration(ModifierStat::Armor, amount, duration as f32);
                self.world.entity_mut(entity).insert(modifier);
            }
            Effect::None | Effect::Stun { .. } | Effect::ChainDamage { .. } | Effect::AreaDenial { .. } | Effect::Immobilize { .. } | Effect::Corruption { .. } | Effect::Consumption { .. } => {}
        }
    }

    /// "Victory check".
    pub fn check_victory(&mut self, force: bool) -> VictoryResult {
        let mut strengths: HashMap<u32, (f32, f32)> = HashMap::new();
        {
            let mut query = self.world.query::<(&FactionId, &Health)>();
            for (faction, health) in query.iter(&self.world) {
                if !health.is_alive() {
                    continue;
                }
                let entry = strengths.entry(faction.0).or_insert((0.0, 0.0));
                entry.0 += health.current;
                entry.1 += health.max;
            }
        }
        let active: Vec<FactionId> = strengths.keys().map(|f| FactionId(*f)).collect();

        let stalemate = force || self.rounds_since_last_damage >= self.config.stalemate_rounds;
        let forced_decision = !stalemate && self.rounds_since_last_kill >= self.config.forced_decision_rounds;

        if !stalemate && !forced_decision && active.len() > 1 {
            return VictoryResult { winner: None, survivors: active, finished: false };
        }

        if active.len() <= 1 && !stalemate && !forced_decision {
            let winner = active.first().copied();
            return VictoryResult { winner, survivors: active, finished: true };
        }

        let winner = self
            .defender_factions
            .iter()
            .filter(|f| active.contains(f))
            .min_by_key(|f| self.faction_names.get(&f.0).cloned().unwrap_or_default())
            .copied()
            .or_else(|| {
                active
                    .iter()
                    .max_by(|a, b| {
                        let (ahp, amax) = strengths[&a.0];
                        let (bhp, bmax) = strengths[&b.0];
                        let ai = if amax > 0.0 { ahp / amax } else { 0.0 };
                        let bi = if bmax > 0.0 { bhp / bmax } else { 0.0 };
                        ai.partial_cmp(&bi).unwrap_or(std::cmp::Ordering::Equal).then(amax.partial_cmp(&bmax).unwrap_or(std::cmp::Ordering::Equal)).then(self.faction_names.get(&b.0).cmp(&self.faction_names.get(&a.0)))
                    })
                    .copied()
            });

        if let Some(winner) = winner {
            let mut query = self.world.query::<(&FactionId, &mut UnitFlags)>();
            for (faction, mut flags) in query.iter_mut(&mut self.world) {
                if *faction != winner {
                    flags.is_routing = true;
                }
            }
        }

        VictoryResult { winner, survivors: active, finished: true }
    }

    /// "Cancellation": forces a decision and returns the final report.
    pub fn cancel(&mut self) -> PostActionReport {
        self.cancelled = true;
        let result = self.check_victory(true);
        self.build_report(result)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn build_report(&mut self, result: VictoryResult) -> PostActionReport {
        let mut factions: HashMap<String, FactionReport> = HashMap::new();
        {
            let mut query = self.world.query::<(&FactionId, &Health)>();
            for (faction, health) in query.iter(&self.world) {
                let name = self.faction_names.get(&faction.0).cloned().unwrap_or_else(|| format!("faction_{}", faction.0));
                let entry = factions.entry(name).or_default();
                entry.initial_strength += 1;
                if health.is_alive() {
                    entry.survivors += 1;
                }
            }
        }
        for (faction_id, name) in &self.faction_names {
            let entry = factions.entry(name.clone()).or_default();
            entry.vp = self.victory_points.get(faction_id).copied().unwrap_or(0.0);
            entry.damage_dealt = self.battle_stats.get(faction_id).map(|s| s.damage_dealt).unwrap_or(0.0);
        }

        let winner_name = result.winner.and_then(|w| self.faction_names.get(&w.0).cloned());
        let events = std::mem::take(&mut self.world.resource_mut::<EventLog>().events);
        debug!(events = events.len(), "battle finalized");

        PostActionReport {
            meta: ReportMeta { duration: self.total_sim_time, map: self.map_name.clone(), winner: winner_name },
            factions,
            objective_timeline: std::mem::take(&mut self.objective_timeline),
            events,
        }
    }
}

fn distance_2d(a: Position, b: Position) -> f32 {
    a.distance_to(&b)
}

impl BattleSpec {
    pub fn shuffle_order(&self, rng: &mut RngRegistry, count: usize) -> Vec<usize> {
        use rand::seq::SliceRandom;
        let mut indices: Vec<usize> = (0..count).collect();
        indices.shuffle(rng.stream(STREAM_PHASES));
        indices
    }
}

/// Reads an `AbilityActor` view of a unit for the dispatcher.
pub fn actor_view(world: &World, entity: Entity) -> Option<AbilityActor> {
    let entity_ref = world.get_entity(entity).ok()?;
    let id = *entity_ref.get::<UnitId>()?;
    let pos = *entity_ref.get::<Position>()?;
    let health = entity_ref.get::<Health>()?;
    Some(AbilityActor { id, position: pos, hp: health.current, max_hp: health.max })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn basic_unit(id: u32, faction: u32) -> UnitBundle {
        UnitBundle {
            id: UnitId(id),
            faction: FactionId(faction),
            name: Name(format!("unit-{id}")),
            kind: UnitKind::Infantry,
            domain: Domain::Ground,
            tags: Tags::default(),
            position: Position::default(),
            velocity: Velocity::default(),
            kinematics: Kinematics::default(),
            combat_stats: CombatStats::default(),
            health: Health::new(100.0),
            shield: Shield::default(),
            morale: Morale::default(),
            suppression: Suppression::default(),
            fatigue: Fatigue::default(),
            experience: Experience::default(),
            loadout: Loadout::default(),
            flags: UnitFlags::default(),
            target_cache: TargetCache::default(),
            directive: TacticalDirective::default(),
            time_since_damage: TimeSinceDamage::default(),
        }
    }

    fn minimal_spec() -> BattleSpec {
        BattleSpec {
            armies: vec![
                ArmySpec { faction: FactionId(0), faction_name: "blue".to_string(), doctrine: Doctrine::Standard, is_defender: true, units: vec![basic_unit(0, 0)], formations: vec![] },
                ArmySpec { faction: FactionId(1), faction_name: "red".to_string(), doctrine: Doctrine::Charge, is_defender: false, units: vec![basic_unit(1, 1)], formations: vec![] },
            ],
            domain_hint: Some(Domain::Ground),
            map_template: Some(MapTemplate::ForestRuins),
            base_seed: 42,
            config: BattleConfig::default(),
        }
    }

    #[test]
    fn grid_size_follows_unit_count_bands() {
        assert_eq!(grid_size_for(10), (30.0, 30.0));
        assert_eq!(grid_size_for(40), (50.0, 50.0));
        assert_eq!(grid_size_for(80), (80.0, 80.0));
        assert_eq!(grid_size_for(200), (100.0, 100.0));
    }

    #[test]
    fn initialize_deploys_both_armies() {
        let battle = Battle::initialize(minimal_spec()).expect("init");
        assert_eq!(battle.entity_by_id.len(), 2);
    }

    #[test]
    fn tick_advances_sim_time() {
        let mut battle = Battle::initialize(minimal_spec()).expect("init");
        battle.tick(0.1);
        assert!((battle.total_sim_time - 0.1).abs() < 1e-4);
    }

    #[test]
    fn victory_declares_sole_survivor() {
        let mut battle = Battle::initialize(minimal_spec()).expect("init");
        let loser = battle.entity_for(UnitId(1)).unwrap();
        battle.world.get_mut::<Health>(loser).unwrap().current = 0.0;
        let result = battle.check_victory(false);
        assert!(result.finished);
        assert_eq!(result.winner, Some(FactionId(0)));
    }

    #[test]
    fn stalemate_forces_defender_tiebreak() {
        let mut battle = Battle::initialize(minimal_spec()).expect("init");
        battle.rounds_since_last_damage = 1001;
        let result = battle.check_victory(false);
        assert_eq!(result.winner, Some(FactionId(0)));
    }
}
