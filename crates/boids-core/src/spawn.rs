use crate::agent::{Agent, Perturbation};
use crate::boundary::ArenaBounds;
use crate::config::SimConfig;
use crate::vec2;
use rand::Rng;
use std::f64::consts::TAU;

fn sample_range(rng: &mut impl Rng, [lo, hi]: [f64; 2]) -> f64 {
    if hi > lo {
        rng.random_range(lo..hi)
    } else {
        lo
    }
}

/// Place `count` agents uniformly inside `bounds` with random headings.
///
/// Each agent starts moving along its heading at
/// `speed * initial_speed_fraction`. Its first perturbation becomes eligible
/// after a random phase inside the cooldown range so agents do not all
/// perturb on the same tick.
pub fn spawn_agents(
    count: usize,
    bounds: &ArenaBounds,
    config: &SimConfig,
    rng: &mut impl Rng,
) -> Vec<Agent> {
    let [hx, hy] = bounds.half_extent;
    let speed = config.speed * config.initial_speed_fraction;
    (0..count)
        .map(|_| {
            let position = [sample_range(rng, [-hx, hx]), sample_range(rng, [-hy, hy])];
            let heading = rng.random_range(0.0..TAU);
            let personal_space = sample_range(rng, config.personal_space_range);
            let phase = sample_range(rng, [0.0, config.perturbation_cooldown[1]]);
            Agent {
                position,
                velocity: vec2::scale(vec2::from_heading(heading), speed),
                heading,
                personal_space,
                damp_velocity: vec2::ZERO,
                perturbation: Perturbation {
                    next_eligible_at: phase,
                    ..Perturbation::default()
                },
            }
        })
        .collect()
}
