//! Per-agent flocking rules.
//!
//! Everything here reads the prior-tick snapshot and returns the agent's next
//! state; nothing writes shared data, so the world can run it on any thread.

use crate::agent::{Agent, Perturbation};
use crate::config::{
    AlignmentSource, SeparationFalloff, SimConfig, SteeringModel, VelocitySmoothing,
};
use crate::vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha12Rng;
use std::f64::consts::TAU;

/// Below this squared speed the heading is left alone.
pub const MIN_TURN_SPEED_SQ: f64 = 1e-4;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SteeringTerms {
    pub separation: [f64; 2],
    pub alignment: [f64; 2],
    pub cohesion: [f64; 2],
    pub neighbor_count: usize,
}

/// Per-tick values shared by every agent update.
#[derive(Clone, Copy, Debug)]
pub struct TickContext<'a> {
    pub config: &'a SimConfig,
    pub dt: f64,
    /// Simulation time at the start of the tick.
    pub now: f64,
    pub step_index: u64,
}

fn group_too_large(count: usize, max_group_size: Option<usize>) -> bool {
    max_group_size.is_some_and(|max| count > max)
}

/// Average push away from neighbors closer than the falloff distance.
pub fn separation(
    me: &Agent,
    snapshot: &[Agent],
    neighbors: &[usize],
    falloff: SeparationFalloff,
    radius: f64,
) -> [f64; 2] {
    let mut steer = vec2::ZERO;
    let mut counted = 0usize;
    for &j in neighbors {
        let other = &snapshot[j];
        let desired = match falloff {
            SeparationFalloff::PerceptionRadius => radius,
            SeparationFalloff::PersonalSpace { scale } => {
                me.personal_space * other.personal_space * scale
            }
        };
        if desired <= 0.0 {
            continue;
        }
        let diff = vec2::sub(me.position, other.position);
        let distance = vec2::length(diff);
        if distance < desired {
            let strength = vec2::clamp01(1.0 - distance / desired);
            steer = vec2::add(steer, vec2::scale(vec2::normalize_or_zero(diff), strength));
            counted += 1;
        }
    }
    if counted == 0 {
        return vec2::ZERO;
    }
    vec2::scale(steer, 1.0 / counted as f64)
}

/// Normalized mean direction of the neighbors. Velocities are summed raw, so
/// faster neighbors pull harder than slow ones.
pub fn alignment(
    snapshot: &[Agent],
    neighbors: &[usize],
    source: AlignmentSource,
    max_group_size: Option<usize>,
) -> [f64; 2] {
    if neighbors.is_empty() || group_too_large(neighbors.len(), max_group_size) {
        return vec2::ZERO;
    }
    let sum = neighbors.iter().fold(vec2::ZERO, |acc, &j| {
        let other = &snapshot[j];
        let dir = match source {
            AlignmentSource::Velocity => other.velocity,
            AlignmentSource::Heading => other.forward(),
        };
        vec2::add(acc, dir)
    });
    vec2::normalize_or_zero(sum)
}

/// Unit vector toward the centroid of the neighbors.
pub fn cohesion(
    me: &Agent,
    snapshot: &[Agent],
    neighbors: &[usize],
    max_group_size: Option<usize>,
) -> [f64; 2] {
    if neighbors.is_empty() || group_too_large(neighbors.len(), max_group_size) {
        return vec2::ZERO;
    }
    let sum = neighbors
        .iter()
        .fold(vec2::ZERO, |acc, &j| vec2::add(acc, snapshot[j].position));
    let centroid = vec2::scale(sum, 1.0 / neighbors.len() as f64);
    vec2::normalize_or_zero(vec2::sub(centroid, me.position))
}

pub fn steering_terms(
    me: &Agent,
    snapshot: &[Agent],
    neighbors: &[usize],
    config: &SimConfig,
) -> SteeringTerms {
    SteeringTerms {
        separation: separation(
            me,
            snapshot,
            neighbors,
            config.separation,
            config.perception_radius,
        ),
        alignment: alignment(
            snapshot,
            neighbors,
            config.alignment_source,
            config.max_group_size,
        ),
        cohesion: cohesion(me, snapshot, neighbors, config.max_group_size),
        neighbor_count: neighbors.len(),
    }
}

/// Combine the terms into a velocity of magnitude `config.speed`.
///
/// A combination with no direction falls back to `forward * speed`.
pub fn desired_velocity(
    forward: [f64; 2],
    terms: &SteeringTerms,
    perturbation: [f64; 2],
    config: &SimConfig,
) -> [f64; 2] {
    let sep = vec2::scale(terms.separation, config.separation_weight);
    let ali = vec2::scale(terms.alignment, config.alignment_weight);
    let coh = vec2::scale(terms.cohesion, config.cohesion_weight);
    let group = vec2::add(vec2::add(sep, ali), coh);

    let combined = match config.steering {
        SteeringModel::WeightedSum => vec2::add(vec2::add(forward, group), perturbation),
        SteeringModel::IndependenceBlend => {
            let independent =
                if group_too_large(terms.neighbor_count, config.max_group_size) {
                    vec2::normalize_or_zero(vec2::add(forward, vec2::scale(sep, 2.0)))
                } else {
                    forward
                };
            let blended = vec2::add(
                vec2::scale(independent, 1.0 - config.independence),
                vec2::scale(group, config.independence),
            );
            vec2::add(blended, perturbation)
        }
    };

    let dir = vec2::normalize_or_zero(combined);
    if dir == vec2::ZERO {
        return vec2::scale(forward, config.speed);
    }
    vec2::scale(dir, config.speed)
}

/// Independent RNG stream for one agent in one tick.
pub fn agent_rng(seed: u64, step_index: u64, agent: usize) -> ChaCha12Rng {
    let mixed = seed ^ step_index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut rng = ChaCha12Rng::seed_from_u64(mixed);
    rng.set_stream(agent as u64);
    rng
}

/// Maybe start a new perturbation and return the offset active at `now`.
pub fn update_perturbation(
    perturbation: &mut Perturbation,
    now: f64,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> [f64; 2] {
    if now > perturbation.next_eligible_at && rng.random::<f64>() < config.perturbation_frequency {
        let angle = rng.random_range(0.0..TAU);
        let magnitude = rng.random::<f64>().sqrt() * config.perturbation_intensity;
        let [lo, hi] = config.perturbation_cooldown;
        let cooldown = if hi > lo { rng.random_range(lo..hi) } else { lo };
        *perturbation = Perturbation {
            initial: vec2::scale(vec2::from_heading(angle), magnitude),
            started_at: now,
            ends_at: now + config.perturbation_duration,
            next_eligible_at: now + cooldown,
        };
    }
    perturbation.offset_at(now)
}

/// Move `velocity` toward `desired` with the configured smoothing.
pub fn smooth_velocity(
    velocity: [f64; 2],
    desired: [f64; 2],
    damp_velocity: &mut [f64; 2],
    config: &SimConfig,
    dt: f64,
) -> [f64; 2] {
    match config.smoothing {
        VelocitySmoothing::Lerp => {
            vec2::lerp(velocity, desired, vec2::clamp01(config.turn_speed * 0.5 * dt))
        }
        VelocitySmoothing::SmoothDamp {
            smooth_time,
            max_acceleration,
        } => vec2::smooth_damp(
            velocity,
            desired,
            damp_velocity,
            smooth_time,
            max_acceleration,
            dt,
        ),
    }
}

/// Turn `heading` toward the direction of `velocity` along the shortest arc.
pub fn turn_heading(heading: f64, velocity: [f64; 2], turn_speed: f64, dt: f64) -> f64 {
    if vec2::length_sq(velocity) < MIN_TURN_SPEED_SQ {
        return heading;
    }
    let target = velocity[1].atan2(velocity[0]);
    vec2::rotate_towards(heading, target, vec2::clamp01(turn_speed * dt))
}

/// Next state of agent `index` given its perceived neighbors.
pub fn advance_agent(
    index: usize,
    snapshot: &[Agent],
    neighbors: &[usize],
    ctx: &TickContext<'_>,
) -> Agent {
    let config = ctx.config;
    let me = &snapshot[index];
    let mut next = me.clone();

    let offset = if config.perturbation_intensity > 0.0 && config.perturbation_frequency > 0.0 {
        let mut rng = agent_rng(config.seed, ctx.step_index, index);
        update_perturbation(&mut next.perturbation, ctx.now, config, &mut rng)
    } else {
        next.perturbation.offset_at(ctx.now)
    };

    let terms = steering_terms(me, snapshot, neighbors, config);
    let desired = desired_velocity(me.forward(), &terms, offset, config);
    next.velocity = smooth_velocity(me.velocity, desired, &mut next.damp_velocity, config, ctx.dt);
    next.position = vec2::add(me.position, vec2::scale(next.velocity, ctx.dt));
    next.heading = turn_heading(me.heading, next.velocity, config.turn_speed, ctx.dt);
    next
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::FRAC_PI_2;

    fn assert_close(a: [f64; 2], b: [f64; 2]) {
        assert!(
            (a[0] - b[0]).abs() < 1e-9 && (a[1] - b[1]).abs() < 1e-9,
            "{a:?} != {b:?}"
        );
    }

    fn cohesion_only() -> SimConfig {
        SimConfig {
            separation_weight: 0.0,
            alignment_weight: 0.0,
            cohesion_weight: 1.0,
            vision_angle_deg: 360.0,
            ..SimConfig::default()
        }
    }

    #[test]
    fn cohesion_points_at_centroid_of_others() {
        let snapshot = vec![
            Agent::new([0.0, 0.0], 0.0, 3.0),
            Agent::new([0.5, 0.0], 0.0, 3.0),
            Agent::new([0.0, 0.5], 0.0, 3.0),
        ];
        let config = cohesion_only();
        let all = [0usize, 1, 2];
        for i in 0..3 {
            let others: Vec<usize> = all.iter().copied().filter(|&j| j != i).collect();
            let terms = steering_terms(&snapshot[i], &snapshot, &others, &config);
            let centroid = vec2::scale(
                vec2::add(snapshot[others[0]].position, snapshot[others[1]].position),
                0.5,
            );
            let expected = vec2::normalize_or_zero(vec2::sub(centroid, snapshot[i].position));
            assert_close(terms.cohesion, expected);
        }
    }

    #[test]
    fn isolated_agent_keeps_its_forward_direction() {
        let agent = Agent::new([0.0, 0.0], FRAC_PI_2, 3.0);
        let snapshot = vec![agent.clone()];
        let config = SimConfig::default();
        let terms = steering_terms(&agent, &snapshot, &[], &config);
        assert_eq!(terms, SteeringTerms::default());
        let desired = desired_velocity(agent.forward(), &terms, vec2::ZERO, &config);
        assert_close(desired, vec2::scale(agent.forward(), config.speed));

        let blended = SimConfig::schooling();
        let desired = desired_velocity(agent.forward(), &terms, vec2::ZERO, &blended);
        assert_close(desired, vec2::scale(agent.forward(), blended.speed));
    }

    #[test]
    fn single_agent_moves_along_heading() {
        let config = SimConfig {
            speed: 3.0,
            ..SimConfig::default()
        };
        let snapshot = vec![Agent::new([1.0, 1.0], 0.3, 3.0)];
        let ctx = TickContext {
            config: &config,
            dt: 0.1,
            now: 0.0,
            step_index: 0,
        };
        let next = advance_agent(0, &snapshot, &[], &ctx);
        let step = vec2::scale(snapshot[0].velocity, 0.1);
        assert_close(next.position, vec2::add(snapshot[0].position, step));
        assert!((next.heading - 0.3).abs() < 1e-9);
    }

    #[test]
    fn separation_pushes_away_and_ignores_far_neighbors() {
        let snapshot = vec![
            Agent::new([0.0, 0.0], 0.0, 1.0),
            Agent::new([0.5, 0.0], 0.0, 1.0),
            Agent::new([0.0, 1.9], 0.0, 1.0),
        ];
        let sep = separation(
            &snapshot[0],
            &snapshot,
            &[1],
            SeparationFalloff::PerceptionRadius,
            2.0,
        );
        // strength = 1 - 0.5 / 2
        assert_close(sep, [-0.75, 0.0]);

        let personal = separation(
            &snapshot[0],
            &snapshot,
            &[1, 2],
            SeparationFalloff::PersonalSpace { scale: 0.5 },
            2.0,
        );
        // Only the agent inside 1.0 * 1.0 * 0.5 counts, and it sits on the edge.
        assert_close(personal, [0.0, 0.0]);
    }

    #[test]
    fn coincident_neighbor_contributes_no_direction() {
        let snapshot = vec![
            Agent::new([1.0, 1.0], 0.0, 1.0),
            Agent::new([1.0, 1.0], 0.0, 1.0),
        ];
        let config = cohesion_only();
        let terms = steering_terms(&snapshot[0], &snapshot, &[1], &config);
        assert_eq!(terms.separation, vec2::ZERO);
        assert_eq!(terms.cohesion, vec2::ZERO);
        assert!(vec2::is_finite(terms.alignment));
    }

    #[test]
    fn large_groups_stop_aligning_and_cohering() {
        let mut snapshot = vec![Agent::new([0.0, 0.0], 0.0, 1.0)];
        for i in 0..6 {
            snapshot.push(Agent::new([1.0, i as f64 * 0.1], FRAC_PI_2, 1.0));
        }
        let neighbors: Vec<usize> = (1..7).collect();
        assert_eq!(
            alignment(&snapshot, &neighbors, AlignmentSource::Heading, Some(5)),
            vec2::ZERO
        );
        assert_eq!(cohesion(&snapshot[0], &snapshot, &neighbors, Some(5)), vec2::ZERO);
        assert_close(
            alignment(&snapshot, &neighbors, AlignmentSource::Heading, None),
            [0.0, 1.0],
        );
    }

    #[test]
    fn velocity_alignment_weights_faster_neighbors() {
        let mut snapshot = vec![
            Agent::new([0.0, 0.0], 0.0, 1.0),
            Agent::new([1.0, 0.0], 0.0, 1.0),
            Agent::new([0.0, 1.0], 0.0, 1.0),
        ];
        snapshot[1].velocity = [3.0, 0.0];
        snapshot[2].velocity = [0.0, 1.0];
        let ali = alignment(&snapshot, &[1, 2], AlignmentSource::Velocity, None);
        assert_close(ali, vec2::normalize_or_zero([3.0, 1.0]));
    }

    #[test]
    fn crowded_blend_biases_independent_direction_by_separation() {
        let config = SimConfig::schooling();
        let crowded = SteeringTerms {
            separation: [0.0, 1.0],
            neighbor_count: 10,
            ..SteeringTerms::default()
        };
        let desired = desired_velocity([1.0, 0.0], &crowded, vec2::ZERO, &config);
        assert_close(desired, [1.7911192788121788, 4.668178630801026]);

        // Below the group limit the independent direction is plain forward.
        let small = SteeringTerms {
            neighbor_count: 3,
            ..crowded
        };
        let relaxed = desired_velocity([1.0, 0.0], &small, vec2::ZERO, &config);
        assert_close(relaxed, vec2::scale(vec2::normalize_or_zero([0.6, 0.32]), config.speed));
        assert!((relaxed[1] - desired[1]).abs() > 1.0);
    }

    #[test]
    fn opposing_terms_fall_back_to_forward() {
        let config = SimConfig {
            alignment_weight: 1.0,
            ..SimConfig::default()
        };
        let terms = SteeringTerms {
            alignment: [-1.0, 0.0],
            neighbor_count: 1,
            ..SteeringTerms::default()
        };
        let desired = desired_velocity([1.0, 0.0], &terms, vec2::ZERO, &config);
        assert_close(desired, [config.speed, 0.0]);
    }

    #[test]
    fn heading_turn_is_skipped_near_rest() {
        assert_eq!(turn_heading(1.0, [0.001, 0.001], 10.0, 0.1), 1.0);
        let turned = turn_heading(0.0, [0.0, 2.0], 10.0, 0.05);
        assert!((turned - FRAC_PI_2 * 0.5).abs() < 1e-9);
    }

    #[test]
    fn perturbation_is_deterministic_per_agent_and_tick() {
        let config = SimConfig::schooling();
        let sample = |agent: usize, step: u64| {
            let mut p = Perturbation::default();
            let mut rng = agent_rng(config.seed, step, agent);
            let mut offset = vec2::ZERO;
            for _ in 0..50 {
                offset = update_perturbation(&mut p, 5.0, &config, &mut rng);
                if offset != vec2::ZERO {
                    break;
                }
            }
            (p, offset)
        };
        assert_eq!(sample(3, 10), sample(3, 10));
        assert_ne!(sample(3, 10), sample(4, 10));
    }

    #[test]
    fn perturbation_respects_intensity_and_cooldown() {
        let config = SimConfig {
            perturbation_intensity: 0.5,
            perturbation_frequency: 1.0,
            ..SimConfig::default()
        };
        let mut p = Perturbation::default();
        let mut rng = agent_rng(1, 0, 0);
        let offset = update_perturbation(&mut p, 0.5, &config, &mut rng);
        assert!(vec2::length(offset) <= 0.5);
        assert!(p.next_eligible_at >= 1.5 && p.next_eligible_at <= 3.5);
        let before = p.clone();
        update_perturbation(&mut p, 1.0, &config, &mut rng);
        assert_eq!(p, before);
    }

    #[test]
    fn smooth_damp_converges_without_overshoot() {
        let config = SimConfig::schooling();
        let mut velocity = [0.0, 0.0];
        let mut damp = vec2::ZERO;
        let target = [5.0, 0.0];
        for _ in 0..500 {
            velocity = smooth_velocity(velocity, target, &mut damp, &config, 0.02);
            assert!(velocity[0] <= 5.0 + 1e-12);
        }
        assert!((velocity[0] - 5.0).abs() < 1e-3);
    }
}
