use boids_core::boundary::ArenaBounds;
use boids_core::config::SimConfig;
use boids_core::world::World;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

fn value_error(err: impl std::fmt::Display) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Flock handle exposed to Python. Positions and velocities come back as
/// `(x, y)` tuples in agent index order.
#[pyclass]
struct Flock {
    world: World,
}

#[pymethods]
impl Flock {
    #[new]
    #[pyo3(signature = (agent_count, half_width, half_height, config_json=None))]
    fn new(
        agent_count: usize,
        half_width: f64,
        half_height: f64,
        config_json: Option<&str>,
    ) -> PyResult<Self> {
        let config = match config_json {
            Some(json) => SimConfig::from_json_str(json).map_err(value_error)?,
            None => SimConfig::default(),
        };
        let world = World::spawn(agent_count, config, ArenaBounds::new(half_width, half_height))
            .map_err(value_error)?;
        Ok(Self { world })
    }

    /// Advance one tick with the configured dt; returns the tick duration in microseconds.
    fn step(&mut self) -> u64 {
        self.world.step().total_us
    }

    fn tick(&mut self, dt: f64) -> PyResult<u64> {
        let timings = self.world.try_tick(dt).map_err(value_error)?;
        Ok(timings.total_us)
    }

    fn set_arena(&mut self, half_width: f64, half_height: f64) -> PyResult<()> {
        self.world
            .set_arena(ArenaBounds::new(half_width, half_height))
            .map_err(value_error)
    }

    fn set_config_json(&mut self, config_json: &str) -> PyResult<()> {
        let config = SimConfig::from_json_str(config_json).map_err(value_error)?;
        self.world.set_config(config).map_err(value_error)
    }

    fn positions(&self) -> Vec<(f64, f64)> {
        self.world.positions().iter().map(|p| (p[0], p[1])).collect()
    }

    fn headings(&self) -> Vec<f64> {
        self.world.agents().iter().map(|a| a.heading).collect()
    }

    fn velocities(&self) -> Vec<(f64, f64)> {
        self.world
            .agents()
            .iter()
            .map(|a| (a.velocity[0], a.velocity[1]))
            .collect()
    }

    fn run_experiment_json(&mut self, steps: usize, sample_every: usize) -> PyResult<String> {
        let summary = self
            .world
            .try_run_experiment(steps, sample_every)
            .map_err(value_error)?;
        serde_json::to_string(&summary).map_err(value_error)
    }

    fn config_json(&self) -> PyResult<String> {
        self.world.config().to_json_pretty().map_err(value_error)
    }

    #[getter]
    fn time(&self) -> f64 {
        self.world.time()
    }

    fn __len__(&self) -> usize {
        self.world.len()
    }
}

#[pyfunction]
fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(version, m)?)?;
    m.add_class::<Flock>()?;
    Ok(())
}
