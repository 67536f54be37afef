//! The per-step pipeline.
//!
//! One call to [`Simulation::step`] runs, in order:
//! 1. partitioner rebuild from the current positions;
//! 2. membrane (boundary) forces;
//! 3. motility (persistent random walk);
//! 4. neighbor rebuild;
//! 5. pairwise contact forces, spring attach/detach and spring forces;
//! 6. position integration, which also clears the velocity accumulators.
//!
//! Every stage is a set of rayon passes and completes before the next one
//! starts. Adding or removing agents is only possible between steps.

use crate::agent_data::DataLayout;
use crate::config::{AgentTypeConfig, MechConfig, MembraneKind};
use crate::environment::MechEnvironment;
use crate::error::{ConfigError, MechError};
use crate::membrane::{MembraneModel, NoWallMembraneModel, WallMembraneModel};
use crate::mesh::CartesianMesh;
use crate::motility::{BaseMotilityModel, MotilityModel};
use crate::partitioner::GridSpacePartitioner;
use crate::potential::{BasePotentialModel, PotentialModel};
use crate::random::RandomStream;
use crate::serializer::{Serializer, Snapshot};
use crate::types::{AgentIndex, TypeIndex};
use crate::vector::SpaceVector;
use std::ops::AddAssign;
use std::time::Instant;
use tracing::{debug, info};

/// Wall-clock time spent in each stage, in microseconds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StepTimings {
    pub partition_us: u64,
    pub membrane_us: u64,
    pub motility_us: u64,
    pub neighbors_us: u64,
    pub velocities_us: u64,
    pub positions_us: u64,
    pub total_us: u64,
}

impl AddAssign for StepTimings {
    fn add_assign(&mut self, rhs: Self) {
        self.partition_us += rhs.partition_us;
        self.membrane_us += rhs.membrane_us;
        self.motility_us += rhs.motility_us;
        self.neighbors_us += rhs.neighbors_us;
        self.velocities_us += rhs.velocities_us;
        self.positions_us += rhs.positions_us;
        self.total_us += rhs.total_us;
    }
}

fn elapsed_us(start: Instant) -> u64 {
    start.elapsed().as_micros() as u64
}

/// Environment, partitioner and models of one simulation, wired together.
pub struct Simulation<V: SpaceVector> {
    env: MechEnvironment<V>,
    partitioner: GridSpacePartitioner<V>,
    potential: Box<dyn PotentialModel<V>>,
    membrane: Box<dyn MembraneModel<V>>,
    motility: Box<dyn MotilityModel<V>>,
    stream: RandomStream,
    agent_types: Vec<AgentTypeConfig>,
}

impl<V: SpaceVector> Simulation<V> {
    /// Builds an empty simulation from `config`.
    ///
    /// Validates the configuration, builds the mesh and the partitioner,
    /// then installs the potential and motility models and the membrane
    /// model chosen by [`MechConfig::membrane`].
    ///
    /// ### Parameters
    /// - `config` - Domain, timestep, voxel size, seed and agent types.
    ///   `config.dims` must match the dimensionality of `V`.
    ///
    /// ### Returns
    /// The simulation with no agents, or the first configuration error
    /// found (including [`MechError::DimensionMismatch`]).
    pub fn from_config(config: &MechConfig) -> Result<Self, MechError> {
        config.validate()?;
        if config.dims != V::DIMS {
            return Err(MechError::DimensionMismatch {
                expected: V::DIMS,
                actual: config.dims,
            });
        }

        let mesh = CartesianMesh::from_bounds(config.bounding_box_mins, config.bounding_box_maxs)?;
        let layout = DataLayout {
            agent_types_count: config.agent_types_count(),
            substrates_count: config.substrates_count,
        };
        let mut env = MechEnvironment::new(mesh, config.timestep, layout);
        let partitioner = GridSpacePartitioner::new(config.voxel_size, &mesh)?;

        let potential = Box::new(BasePotentialModel::new(&mut env));
        let membrane: Box<dyn MembraneModel<V>> = match config.membrane {
            MembraneKind::Wall => Box::new(WallMembraneModel::new(&mut env)),
            MembraneKind::None => Box::new(NoWallMembraneModel),
        };
        let motility = Box::new(BaseMotilityModel::new(&mut env));

        info!(
            dims = V::DIMS,
            agent_types = layout.agent_types_count,
            membrane = ?config.membrane,
            seed = config.seed,
            "simulation ready"
        );

        Ok(Self {
            env,
            partitioner,
            potential,
            membrane,
            motility,
            stream: RandomStream::new(config.seed),
            agent_types: config.agent_types.clone(),
        })
    }

    pub fn environment(&self) -> &MechEnvironment<V> {
        &self.env
    }

    pub fn environment_mut(&mut self) -> &mut MechEnvironment<V> {
        &mut self.env
    }

    pub fn partitioner(&self) -> &GridSpacePartitioner<V> {
        &self.partitioner
    }

    pub fn agent_types(&self) -> &[AgentTypeConfig] {
        &self.agent_types
    }

    /// Number of completed steps.
    pub fn steps_done(&self) -> u64 {
        self.stream.step()
    }

    /// Adds an agent of `type_index` at `position`.
    pub fn spawn_agent(
        &mut self,
        position: V,
        type_index: TypeIndex,
    ) -> Result<AgentIndex, MechError> {
        let agent_type = self
            .agent_types
            .get(type_index)
            .ok_or(MechError::InvalidTypeIndex {
                agent: self.env.agents.len(),
                type_index,
                types_count: self.agent_types.len(),
            })?;

        let agents = &mut self.env.agents;
        let index = agents.add();
        agents.positions[index] = position;
        agents.apply_type(index, type_index, agent_type)?;
        Ok(index)
    }

    /// Removes agent `index`; the last agent takes its index.
    pub fn remove_agent(&mut self, index: AgentIndex) -> Result<(), MechError> {
        self.env.agents.remove(index)
    }

    /// Checks everything the step loop relies on but cannot check cheaply.
    pub fn validate(&self) -> Result<(), MechError> {
        let env = &self.env;
        if !(env.timestep > 0.0 && env.timestep.is_finite()) {
            return Err(ConfigError::InvalidTimestep(env.timestep).into());
        }
        CartesianMesh::new(env.mesh.bounding_box_mins, env.mesh.bounding_box_maxs)?;

        let agents = &env.agents;
        let types_count = env.agent_types_count();
        for (agent, &type_index) in agents.type_indices.iter().enumerate() {
            if type_index >= types_count {
                return Err(MechError::InvalidTypeIndex {
                    agent,
                    type_index,
                    types_count,
                });
            }
        }

        if let Some(motility) = agents.motility.get() {
            let invalid = (0..agents.len()).find(|&i| {
                let persistence = motility.persistence_time[i];
                motility.is_motile[i] && !(persistence > 0.0 && persistence.is_finite())
            });
            if let Some(agent) = invalid {
                return Err(MechError::InvalidPersistenceTime {
                    agent,
                    value: motility.persistence_time[agent],
                });
            }
        }

        if let Some(potential) = agents.potential.get() {
            let max_reach = potential
                .relative_maximum_adhesion_distance
                .iter()
                .zip(&agents.radii)
                .map(|(relative, radius)| relative * radius)
                .fold(0.0, f64::max);
            let required = 2.0 * max_reach;
            if required > self.partitioner.voxel_size() {
                return Err(MechError::VoxelTooSmall {
                    voxel_size: self.partitioner.voxel_size(),
                    required,
                });
            }

            potential.check_spring_symmetry()?;
        }

        Ok(())
    }

    /// Advances the simulation by one timestep.
    ///
    /// Runs the pipeline described in the module docs: partitioner
    /// rebuild, membrane forces, motility, neighbor rebuild, contact and
    /// spring forces, then position integration. The random stream moves
    /// on to the next step at the end.
    ///
    /// ### Returns
    /// Wall-clock time spent in each stage, in microseconds.
    pub fn step(&mut self) -> StepTimings {
        let total = Instant::now();
        let mut timings = StepTimings::default();

        let t = Instant::now();
        self.partitioner.rebuild(&self.env.agents.positions);
        timings.partition_us = elapsed_us(t);

        let t = Instant::now();
        self.membrane.compute_basement_membrane_interactions(&mut self.env);
        timings.membrane_us = elapsed_us(t);

        let t = Instant::now();
        self.motility.update_motility_velocities(&mut self.env, &self.stream);
        timings.motility_us = elapsed_us(t);

        let t = Instant::now();
        self.potential.update_neighbors(&mut self.env, &self.partitioner);
        timings.neighbors_us = elapsed_us(t);

        let t = Instant::now();
        self.potential.update_velocities(&mut self.env, &self.stream);
        timings.velocities_us = elapsed_us(t);

        let t = Instant::now();
        self.potential.update_positions(&mut self.env);
        timings.positions_us = elapsed_us(t);

        self.stream.advance();
        timings.total_us = elapsed_us(total);

        debug!(
            step = self.stream.step(),
            agents = self.env.agents.len(),
            springs = self.env.agents.potential.get().map_or(0, |p| p.spring_count()),
            total_us = timings.total_us,
            "step completed"
        );
        timings
    }

    /// Read-only view of the current state.
    pub fn snapshot(&self) -> Snapshot<'_, V> {
        Snapshot::from_environment(&self.env, self.stream.step())
    }

    /// Validates, then runs `steps` steps, handing a snapshot to
    /// `serializer` after each one.
    ///
    /// ### Parameters
    /// - `steps` - Number of timesteps to run.
    /// - `serializer` - Receives one [`Snapshot`] per completed step. An
    ///   error from it stops the run after that step.
    ///
    /// ### Returns
    /// The timings summed over all steps, a validation error if the scene
    /// is inconsistent, or [`MechError::Serializer`].
    pub fn run<S: Serializer<V>>(
        &mut self,
        steps: u64,
        serializer: &mut S,
    ) -> Result<StepTimings, MechError> {
        self.validate()?;

        let mut timings = StepTimings::default();
        for _ in 0..steps {
            timings += self.step();
            serializer.serialize_one_timestep(&self.snapshot())?;
        }
        Ok(timings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn config() -> MechConfig {
        MechConfig {
            bounding_box_maxs: [200.0; 3],
            ..MechConfig::default()
        }
    }

    #[test]
    fn config_dimensions_must_match_vector_type() {
        let err = Simulation::<f64>::from_config(&config()).err();
        assert!(matches!(
            err,
            Some(MechError::DimensionMismatch {
                expected: 1,
                actual: 2
            })
        ));
    }

    #[test]
    fn invalid_config_is_rejected_before_building() {
        let cfg = MechConfig {
            timestep: 0.0,
            ..config()
        };
        assert!(matches!(
            Simulation::<DVec2>::from_config(&cfg),
            Err(MechError::Config(ConfigError::InvalidTimestep(_)))
        ));
    }

    #[test]
    fn membrane_kind_selects_the_model() {
        let wall = Simulation::<DVec2>::from_config(&config()).unwrap();
        assert!(wall.environment().agents.membrane.is_installed());

        let open = Simulation::<DVec2>::from_config(&MechConfig {
            membrane: MembraneKind::None,
            ..config()
        })
        .unwrap();
        assert!(!open.environment().agents.membrane.is_installed());
    }

    #[test]
    fn spawn_applies_the_agent_type() {
        let mut sim = Simulation::<DVec2>::from_config(&config()).unwrap();
        let i = sim.spawn_agent(DVec2::new(5.0, 6.0), 0).unwrap();

        let agents = &sim.environment().agents;
        assert_eq!(agents.positions[i], DVec2::new(5.0, 6.0));
        assert_eq!(agents.radii[i], 10.0);
        assert_eq!(agents.potential.get().unwrap().cell_repulsion_strength[i], 10.0);

        assert!(matches!(
            sim.spawn_agent(DVec2::ZERO, 3),
            Err(MechError::InvalidTypeIndex { type_index: 3, .. })
        ));
        assert_eq!(sim.environment().agents.len(), 1);
    }

    #[test]
    fn validate_catches_small_voxels() {
        let mut sim = Simulation::<DVec2>::from_config(&config()).unwrap();
        let i = sim.spawn_agent(DVec2::splat(50.0), 0).unwrap();
        sim.environment_mut().agents.radii[i] = 11.0;

        assert!(matches!(sim.validate(), Err(MechError::VoxelTooSmall { .. })));
    }

    #[test]
    fn validate_catches_motile_agents_without_persistence() {
        let mut sim = Simulation::<DVec2>::from_config(&config()).unwrap();
        let i = sim.spawn_agent(DVec2::splat(50.0), 0).unwrap();
        {
            let motility = sim.environment_mut().agents.motility.get_mut().unwrap();
            motility.is_motile[i] = true;
            motility.persistence_time[i] = 0.0;
        }
        assert!(matches!(
            sim.validate(),
            Err(MechError::InvalidPersistenceTime { agent: 0, .. })
        ));
    }

    #[test]
    fn validate_catches_one_sided_springs() {
        let mut sim = Simulation::<DVec2>::from_config(&config()).unwrap();
        sim.spawn_agent(DVec2::splat(50.0), 0).unwrap();
        sim.spawn_agent(DVec2::splat(55.0), 0).unwrap();
        sim.environment_mut().agents.potential.get_mut().unwrap().springs[0].push(1);

        assert!(matches!(sim.validate(), Err(MechError::AsymmetricSpring { .. })));
    }

    #[test]
    fn step_advances_the_stream_and_reports_timings() {
        let mut sim = Simulation::<DVec2>::from_config(&config()).unwrap();
        sim.spawn_agent(DVec2::new(50.0, 50.0), 0).unwrap();
        sim.spawn_agent(DVec2::new(55.0, 50.0), 0).unwrap();

        let timings = sim.step();
        assert_eq!(sim.steps_done(), 1);
        assert!(timings.total_us >= timings.velocities_us);
        assert_eq!(sim.snapshot().step, 1);
    }

    #[test]
    fn timings_add_up() {
        let mut sum = StepTimings::default();
        let one = StepTimings {
            partition_us: 1,
            total_us: 3,
            ..StepTimings::default()
        };
        sum += one;
        sum += one;
        assert_eq!(sum.partition_us, 2);
        assert_eq!(sum.total_us, 6);
    }
}
