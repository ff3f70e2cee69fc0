//! End-to-end coverage of the public `Battle` API: deployment, ticking,
//! formation modifiers, and victory resolution.

use tactical_core::battle::FormationAssignment;
use tactical_core::formation::{Formation, FormationPreset, FormationShape};
use tactical_core::systems::projectiles::Projectile;
use tactical_core::terrain::{MapTemplate, TacticalObjective, TerrainResource};
use tactical_core::*;

fn armed_unit(id: u32, faction: u32, x: f32, y: f32) -> UnitBundle {
    let weapon = WeaponStats {
        range: 40.0,
        strength: 3.0,
        ap: 2.0,
        attacks_per_sec: 1.0,
        arc: WeaponArc::Turret,
        category: WeaponCategory::Kinetic,
        cooldown_remaining: 0.0,
        shield_mult_override: None,
        hull_mult_override: None,
        effect_tags: Vec::new(),
    };
    UnitBundle {
        id: UnitId(id),
        faction: FactionId(faction),
        name: Name(format!("unit-{id}")),
        kind: UnitKind::Infantry,
        domain: Domain::Ground,
        tags: Tags::default(),
        position: Position::new(x, y),
        velocity: Velocity::default(),
        kinematics: Kinematics::default(),
        combat_stats: CombatStats::default(),
        health: Health::new(100.0),
        shield: Shield::default(),
        morale: Morale::default(),
        suppression: Suppression::default(),
        fatigue: Fatigue::default(),
        experience: Experience::default(),
        loadout: Loadout { components: vec![Hardpoint::weapon("primary", 20.0, weapon)] },
        flags: UnitFlags::default(),
        target_cache: TargetCache::default(),
        directive: TacticalDirective { doctrine: Doctrine::Standard },
        time_since_damage: TimeSinceDamage::default(),
    }
}

fn two_army_spec() -> BattleSpec {
    BattleSpec {
        armies: vec![
            ArmySpec {
                faction: FactionId(0),
                faction_name: "blue".to_string(),
                doctrine: Doctrine::Standard,
                is_defender: true,
                units: vec![armed_unit(0, 0, 0.0, 0.0), armed_unit(1, 0, 1.0, 0.0)],
                formations: vec![FormationAssignment {
                    shape: FormationShape::Wall { cols: 2 },
                    preset: FormationPreset::LineOfBattle,
                    spacing: 2.0,
                    facing: 0.0,
                    member_indices: vec![0, 1],
                }],
            },
            ArmySpec {
                faction: FactionId(1),
                faction_name: "red".to_string(),
                doctrine: Doctrine::Charge,
                is_defender: false,
                units: vec![armed_unit(2, 1, 20.0, 0.0)],
                formations: vec![],
            },
        ],
        domain_hint: Some(Domain::Ground),
        map_template: Some(MapTemplate::ForestRuins),
        base_seed: 1234,
        config: BattleConfig::default(),
    }
}

#[test]
fn initialize_spawns_all_units_and_formation_membership() {
    let battle = Battle::initialize(two_army_spec()).expect("init");
    for id in [0, 1, 2] {
        assert!(battle.entity_for(UnitId(id)).is_some());
    }
    let member = battle.entity_for(UnitId(0)).unwrap();
    assert!(battle.world.get::<FormationMembership>(member).is_some());

    let non_member = battle.entity_for(UnitId(2)).unwrap();
    assert!(battle.world.get::<FormationMembership>(non_member).is_none());
}

#[test]
fn formation_member_inherits_line_of_battle_bonus_ap() {
    let battle = Battle::initialize(two_army_spec()).expect("init");
    let member = battle.entity_for(UnitId(0)).unwrap();
    let membership = *battle.world.get::<FormationMembership>(member).unwrap();
    let formation = battle.world.get::<Formation>(membership.formation_entity).unwrap();
    let mods = formation.modifiers(false);
    assert_eq!(mods.bonus_ap, 10.0);
    assert!((mods.damage_mult - 1.15).abs() < 1e-4);
}

#[test]
fn tick_advances_clock_and_preserves_unit_count() {
    let mut battle = Battle::initialize(two_army_spec()).expect("init");
    for _ in 0..5 {
        battle.tick(0.1);
    }
    assert!((battle.total_sim_time - 0.5).abs() < 1e-3);

    let mut query = battle.world.query::<&Health>();
    let alive_count = query.iter(&battle.world).count();
    assert_eq!(alive_count, 3);
}

#[test]
fn ranged_engagement_eventually_damages_a_combatant() {
    let mut battle = Battle::initialize(two_army_spec()).expect("init");
    let mut any_damage = false;
    for _ in 0..200 {
        battle.tick(0.25);
        let mut query = battle.world.query::<&Health>();
        if query.iter(&battle.world).any(|h| h.current < h.max) {
            any_damage = true;
            break;
        }
    }
    assert!(any_damage, "expected at least one unit to take damage over 50 simulated seconds");
}

#[test]
fn victory_check_declares_winner_once_one_side_is_eliminated() {
    let mut battle = Battle::initialize(two_army_spec()).expect("init");
    let lone_defender = battle.entity_for(UnitId(2)).unwrap();
    battle.world.get_mut::<Health>(lone_defender).unwrap().current = 0.0;

    let result = battle.check_victory(false);
    assert!(result.finished);
    assert_eq!(result.winner, Some(FactionId(0)));
    assert_eq!(result.survivors, vec![FactionId(0)]);
}

#[test]
fn snapshot_report_names_the_winning_faction() {
    let mut battle = Battle::initialize(two_army_spec()).expect("init");
    let lone_defender = battle.entity_for(UnitId(2)).unwrap();
    battle.world.get_mut::<Health>(lone_defender).unwrap().current = 0.0;

    let result = battle.check_victory(false);
    let report = battle.build_report(result);
    assert_eq!(report.meta.winner.as_deref(), Some("blue"));
    assert!(report.factions.contains_key("blue"));
    assert!(report.factions.contains_key("red"));
}

#[test]
fn no_projectiles_are_in_flight_before_the_first_tick() {
    let mut battle = Battle::initialize(two_army_spec()).expect("init");
    let mut query = battle.world.query::<&Projectile>();
    assert_eq!(query.iter(&battle.world).count(), 0);
}

#[test]
fn kite_doctrine_retreats_from_a_close_enemy() {
    let mut spec = two_army_spec();
    spec.armies[0].units.truncate(1);
    spec.armies[0].formations.clear();
    spec.armies[0].doctrine = Doctrine::Kite;

    // Deployment placement (edge-of-map + jitter) overwrites `position` on
    // spawn, so the close-range setup is applied after `initialize`.
    // Truncating blue to one unit renumbers spawned ids sequentially by army
    // order, so the lone red unit becomes unit 1, not unit 2.
    let mut battle = Battle::initialize(spec).expect("init");
    let kiter = battle.entity_for(UnitId(0)).unwrap();
    let enemy = battle.entity_for(UnitId(1)).unwrap();
    battle.world.get_mut::<Position>(kiter).unwrap().x = 10.0;
    battle.world.get_mut::<Position>(kiter).unwrap().y = 10.0;
    battle.world.get_mut::<Position>(enemy).unwrap().x = 12.0;
    battle.world.get_mut::<Position>(enemy).unwrap().y = 12.0;
    let start_distance = battle.world.get::<Position>(kiter).unwrap().distance_to(battle.world.get::<Position>(enemy).unwrap());

    battle.tick(0.1);

    let end_distance = battle.world.get::<Position>(kiter).unwrap().distance_to(battle.world.get::<Position>(enemy).unwrap());
    assert!(end_distance > start_distance, "kiter should have retreated: start={start_distance} end={end_distance}");
}

#[test]
fn interdictor_nearby_traps_a_failing_morale_check_instead_of_routing() {
    let mut spec = two_army_spec();
    spec.armies[1].units[0].tags = Tags(vec!["Interdictor".to_string()]);

    let mut battle = Battle::initialize(spec).expect("init");
    let blue = battle.entity_for(UnitId(0)).unwrap();
    let interdictor = battle.entity_for(UnitId(2)).unwrap();
    let blue_pos = *battle.world.get::<Position>(blue).unwrap();
    battle.world.get_mut::<Position>(interdictor).unwrap().x = blue_pos.x + 10.0;
    battle.world.get_mut::<Position>(interdictor).unwrap().y = blue_pos.y;
    battle.world.get_mut::<Suppression>(blue).unwrap().value = 50.0;
    battle.world.get_mut::<Health>(blue).unwrap().current = 1.0;

    battle.tick(0.1);

    let is_routing = battle.world.get::<UnitFlags>(blue).unwrap().is_routing;
    assert!(!is_routing, "a trapped unit should not be marked as routing");
    let trapped = battle.world.resource::<EventLog>().events.iter().any(|e| matches!(e.kind, EventKind::InterdictionTrap { unit_id } if unit_id == UnitId(0)));
    assert!(trapped, "expected a unit trapped by a nearby enemy interdictor to log interdiction_trap rather than routing");
}

#[test]
fn holding_an_objective_alone_accrues_victory_points_and_captures_it() {
    let mut spec = two_army_spec();
    spec.armies[0].units.truncate(1);
    spec.armies[0].formations.clear();
    // Defend doesn't seek a distant enemy, so the lone occupant stays put on
    // the objective instead of marching off toward the enemy centroid.
    spec.armies[0].doctrine = Doctrine::Defend;

    // Truncating blue to one unit renumbers spawned ids sequentially by army
    // order, so the lone red unit becomes unit 1, not unit 2.
    let mut battle = Battle::initialize(spec).expect("init");
    let blue = battle.entity_for(UnitId(0)).unwrap();
    let red = battle.entity_for(UnitId(1)).unwrap();
    let blue_pos = *battle.world.get::<Position>(blue).unwrap();
    battle.world.get_mut::<Position>(red).unwrap().x = blue_pos.x + 500.0;
    battle.world.resource_mut::<TerrainResource>().0.write().unwrap().objectives.push(TacticalObjective::new(1, (blue_pos.x, blue_pos.y), 10.0, 1.0));

    // A few ticks past the 5.0s capture threshold to absorb float rounding.
    for _ in 0..60 {
        battle.tick(0.1);
    }

    let owner = battle.world.resource::<TerrainResource>().0.read().unwrap().objectives[0].owner;
    assert_eq!(owner, Some(0), "sole occupant should have captured the objective after 5 seconds");

    let result = battle.check_victory(true);
    let report = battle.build_report(result);
    let blue_report = report.factions.get("blue").unwrap();
    assert!(blue_report.vp > 0.0, "expected victory points to accrue while holding the objective, got {}", blue_report.vp);
    assert!(!report.objective_timeline.is_empty(), "expected the capture to appear on the objective timeline");
}
