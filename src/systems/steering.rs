//! Steering resolver.
//!
//! Grounded on `systems::ai::flocking_system`: a plain
//! `(steering_x, steering_y)` accumulator summed term by term, then
//! normalized and scaled by speed — generalized here to the full
//! weighted-force list (obstacle avoidance, doctrine-modulated seek/flee,
//! separation, alignment, cohesion, formation slotting) plus a separate
//! space-domain inertial model.

use crate::components::{Kinematics, Position};
use crate::doctrine::Doctrine;
use crate::terrain::Modifiers;

/// Obstacle avoidance weight ×3, seek/flee ×1.5 (routing), separation ×1.5,
/// alignment ×0.3, cohesion ×0.2/×0.1, formation slotting ×2.
pub struct SteeringInput<'a> {
    pub position: Position,
    pub facing_deg: f32,
    pub is_routing: bool,
    pub doctrine: Doctrine,
    pub target_point: (f32, f32),
    pub max_weapon_range: f32,
    pub neighbors: &'a [(f32, f32, f32)], // (x, y, facing_deg) of nearby friendlies within radius ~10
    pub obstacles: &'a [(f32, f32, f32)], // (x, y, radius)
    pub formation_slot: Option<(f32, f32)>, // world-space target slot position
}

fn unit_vec(dx: f32, dy: f32) -> (f32, f32) {
    let mag = (dx * dx + dy * dy).sqrt();
    if mag < 1e-4 {
        (0.0, 0.0)
    } else {
        (dx / mag, dy / mag)
    }
}

/// Synthesizes the weighted 2D steering vector for one unit this tick.
/// Returns an un-normalized sum; callers normalize and scale by max
/// speed/terrain/formation/suppression/routing multipliers.
pub fn synthesize_steering(input: &SteeringInput) -> (f32, f32) {
    let (px, py) = (input.position.x, input.position.y);
    let mut fx = 0.0;
    let mut fy = 0.0;

    // Obstacle avoidance (x3): force away, magnitude 5*(radius+1-d)/(radius+1).
    for &(ox, oy, radius) in input.obstacles {
        let dx = px - ox;
        let dy = py - oy;
        let d = (dx * dx + dy * dy).sqrt();
        let band = radius + 1.0;
        if d < band {
            let (ux, uy) = unit_vec(dx, dy);
            let mag = 5.0 * (band - d) / band;
            fx += ux * mag * 3.0;
            fy += uy * mag * 3.0;
        }
    }

    // Seek or flee, doctrine-modulated.
    let (tx, ty) = input.target_point;
    let dx = tx - px;
    let dy = ty - py;
    let dist = (dx * dx + dy * dy).sqrt();
    let (seek_ux, seek_uy) = unit_vec(dx, dy);

    if input.is_routing {
        fx += -seek_ux * 1.5;
        fy += -seek_uy * 1.5;
    } else {
        match input.doctrine {
            Doctrine::Charge => {
                fx += seek_ux * 0.8;
                fy += seek_uy * 0.8;
            }
            Doctrine::Kite => {
                let wr = input.max_weapon_range.max(1.0);
                let band_lo = 0.5 * wr;
                let band_hi = 0.9 * wr;
                if dist < band_lo {
                    fx += -seek_ux;
                    fy += -seek_uy;
                } else if dist > 35.0 {
                    fx += seek_ux * 0.3;
                    fy += seek_uy * 0.3;
                }
                // in [band_lo, band_hi]: zero contribution.
                let _ = band_hi;
            }
            Doctrine::Defend => {
                if dist < 15.0 {
                    fx += seek_ux * 0.5;
                    fy += seek_uy * 0.5;
                }
                // above 15: hold, no seek contribution.
            }
            Doctrine::CaptureAndHold | Doctrine::Standard => {
                fx += seek_ux;
                fy += seek_uy;
            }
        }
    }

    // Separation: band 2.0 normal, 4.0 KITE; repel from each neighbor by 1/d.
    let sep_band = if matches!(input.doctrine, Doctrine::Kite) { 4.0 } else { 2.0 };
    let mut sep_x = 0.0;
    let mut sep_y = 0.0;
    for &(nx, ny, _) in input.neighbors {
        let ddx = px - nx;
        let ddy = py - ny;
        let d = (ddx * ddx + ddy * ddy).sqrt();
        if d > 1e-3 && d < sep_band {
            sep_x += ddx / d / d;
            sep_y += ddy / d / d;
        }
    }
    fx += sep_x * 1.5;
    fy += sep_y * 1.5;

    // Alignment: average of (cos(facing), sin(facing)) over neighbors.
    if !input.neighbors.is_empty() {
        let (sum_cos, sum_sin) = input.neighbors.iter().fold((0.0, 0.0), |(ac, as_), &(_, _, f)| {
            let r = f.to_radians();
            (ac + r.cos(), as_ + r.sin())
        });
        let n = input.neighbors.len() as f32;
        fx += (sum_cos / n) * 0.3;
        fy += (sum_sin / n) * 0.3;
    }

    // Cohesion: toward neighbor centroid; x0.2 CHARGE / x0.1 others, skipped in KITE.
    if !matches!(input.doctrine, Doctrine::Kite) && !input.neighbors.is_empty() {
        let (sum_x, sum_y) = input.neighbors.iter().fold((0.0, 0.0), |(ax, ay), &(nx, ny, _)| (ax + nx, ay + ny));
        let n = input.neighbors.len() as f32;
        let (cx, cy) = (sum_x / n, sum_y / n);
        let (ux, uy) = unit_vec(cx - px, cy - py);
        let weight = if matches!(input.doctrine, Doctrine::Charge) { 0.2 } else { 0.1 };
        fx += ux * weight;
        fy += uy * weight;
    }

    // Formation slotting (x2 seek toward slot, already rotated by caller).
    if let Some((slot_x, slot_y)) = input.formation_slot {
        let (ux, uy) = unit_vec(slot_x - px, slot_y - py);
        fx += ux * 2.0;
        fy += uy * 2.0;
    }

    (fx, fy)
}

/// Final speed scale applied to the normalized steering vector
/// ("caller normalizes and scales by unit max speed, terrain
/// speed_mult, formation movement_speed_mult, suppression penalty, routing x1.2").
pub fn speed_scale(kinematics: &Kinematics, terrain: Modifiers, formation_speed_mult: f32, suppression_speed_mult: f32, is_routing: bool) -> f32 {
    let mut scale = kinematics.max_speed * terrain.speed_mult * formation_speed_mult * suppression_speed_mult;
    if is_routing {
        scale *= 1.2;
    }
    scale
}

/// Ground-domain movement is a stepwise grid kernel: `(sgn(dx), sgn(dy))`
/// gated by the same doctrine band logic.
pub fn ground_step_direction(fx: f32, fy: f32) -> (f32, f32) {
    (fx.signum(), fy.signum())
}

/// Space-domain inertial kinematics: facing slews toward the desired
/// heading, throttle drops when the heading diff is large, speed eases
/// toward `max_speed * throttle`.
pub fn advance_space_kinematics(kinematics: &mut Kinematics, desired_fx: f32, desired_fy: f32, dt: f32) -> (f32, f32) {
    if desired_fx == 0.0 && desired_fy == 0.0 {
        kinematics.current_speed = (kinematics.current_speed - kinematics.acceleration * dt).max(0.0);
        let rad = kinematics.facing.to_radians();
        return (rad.cos() * kinematics.current_speed / kinematics.max_speed.max(1e-4), rad.sin() * kinematics.current_speed / kinematics.max_speed.max(1e-4));
    }

    let desired_heading = desired_fy.atan2(desired_fx).to_degrees();
    let mut diff = crate::doctrine::normalize_bearing(desired_heading - kinematics.facing);
    let max_turn = kinematics.turn_rate * dt;
    if diff.abs() <= max_turn {
        kinematics.facing = desired_heading;
    } else {
        kinematics.facing += max_turn * diff.signum();
        diff = crate::doctrine::normalize_bearing(diff);
    }

    let throttle = if diff.abs() > 90.0 {
        0.1
    } else if diff.abs() > 45.0 {
        0.5
    } else {
        1.0
    };

    let target_speed = kinematics.max_speed * throttle;
    if kinematics.current_speed < target_speed {
        kinematics.current_speed = (kinematics.current_speed + kinematics.acceleration * dt).min(target_speed);
    } else {
        kinematics.current_speed = (kinematics.current_speed - kinematics.acceleration * dt).max(target_speed);
    }

    let rad = kinematics.facing.to_radians();
    let ratio = kinematics.current_speed / kinematics.max_speed.max(1e-4);
    (rad.cos() * ratio, rad.sin() * ratio)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kite_zero_force_inside_band() {
        let input = SteeringInput {
            position: Position::new(0.0, 0.0),
            facing_deg: 0.0,
            is_routing: false,
            doctrine: Doctrine::Kite,
            target_point: (20.0, 0.0), // distance 20, range 40 -> band [20, 36]
            max_weapon_range: 40.0,
            neighbors: &[],
            obstacles: &[],
            formation_slot: None,
        };
        let (fx, fy) = synthesize_steering(&input);
        assert_eq!(fx, 0.0);
        assert_eq!(fy, 0.0);
    }

    #[test]
    fn kite_flees_below_band() {
        let input = SteeringInput {
            position: Position::new(0.0, 0.0),
            facing_deg: 0.0,
            is_routing: false,
            doctrine: Doctrine::Kite,
            target_point: (5.0, 0.0), // below 0.5*40=20
            max_weapon_range: 40.0,
            neighbors: &[],
            obstacles: &[],
            formation_slot: None,
        };
        let (fx, _) = synthesize_steering(&input);
        assert!(fx < 0.0);
    }

    #[test]
    fn routing_overrides_doctrine_and_flees() {
        let input = SteeringInput {
            position: Position::new(0.0, 0.0),
            facing_deg: 0.0,
            is_routing: true,
            doctrine: Doctrine::Charge,
            target_point: (10.0, 0.0),
            max_weapon_range: 40.0,
            neighbors: &[],
            obstacles: &[],
            formation_slot: None,
        };
        let (fx, _) = synthesize_steering(&input);
        assert!(fx < 0.0);
    }

    #[test]
    fn space_kinematics_throttles_down_on_sharp_turn() {
        let mut k = Kinematics { facing: 0.0, current_speed: 10.0, max_speed: 10.0, turn_rate: 10.0, acceleration: 100.0, footprint: (1, 1) };
        advance_space_kinematics(&mut k, 0.0, 1.0, 0.1); // desired heading 90deg, diff 90
        assert!(k.current_speed < 10.0);
    }
}
