use boids_core::boundary::ArenaBounds;
use boids_core::config::{NeighborStrategy, SimConfig};
use boids_core::spawn::spawn_agents;
use boids_core::world::World;
use rand::SeedableRng;
use rand_chacha::ChaCha12Rng;
use std::time::Instant;

fn main() {
    let agent_count = 20_000;
    let arena = ArenaBounds::square(300.0);
    let steps = 20;
    println!(
        "Benchmarking {} agents over a {}x{} arena, {} steps per strategy",
        agent_count,
        arena.half_extent[0] * 2.0,
        arena.half_extent[1] * 2.0,
        steps
    );

    let base = SimConfig::default();
    let mut rng = ChaCha12Rng::seed_from_u64(base.seed);
    let agents = spawn_agents(agent_count, &arena, &base, &mut rng);

    for name in ["uniform_grid", "incremental_grid", "quad_tree", "r_tree"] {
        let Some(strategy) = NeighborStrategy::from_name(name) else {
            continue;
        };
        let config = SimConfig {
            neighbor_strategy: strategy,
            ..base.clone()
        };
        let mut world = World::new(agents.clone(), config, arena);

        let start = Instant::now();
        let mut spatial_us = 0;
        let mut force_us = 0;
        for _ in 0..steps {
            let timings = world.step();
            spatial_us += timings.spatial_build_us;
            force_us += timings.force_compute_us;
        }
        let elapsed = start.elapsed();
        let stats = world.last_query_stats();
        println!(
            "{:<18} total {:>10.2?}  per step {:>9.2?}  index {:>7} us  forces {:>8} us  candidates {:>9}  neighbors {:>8}",
            name,
            elapsed,
            elapsed / steps,
            spatial_us / steps as u64,
            force_us / steps as u64,
            stats.candidates,
            stats.neighbors,
        );
    }
}
