//! Domain boundary forces.

pub mod data;

use crate::environment::MechEnvironment;
use crate::mesh::CartesianMesh;
use crate::potential::MINIMUM_DISTANCE;
use crate::vector::SpaceVector;
use rayon::prelude::*;
use tracing::info;

pub trait MembraneModel<V: SpaceVector>: Send + Sync {
    /// Adds the boundary force of every movable agent into its velocity.
    fn compute_basement_membrane_interactions(&self, env: &mut MechEnvironment<V>);
}

/// Repulsive walls on both faces of every axis of the bounding box.
#[derive(Clone, Copy, Debug, Default)]
pub struct WallMembraneModel;

impl WallMembraneModel {
    pub fn new<V: SpaceVector>(env: &mut MechEnvironment<V>) -> Self {
        let agents = &mut env.agents;
        let (len, layout) = (agents.len(), *agents.layout());
        if agents.membrane.install(len, &layout) {
            info!(agents = len, "installed membrane data");
        }
        Self
    }
}

impl<V: SpaceVector> MembraneModel<V> for WallMembraneModel {
    fn compute_basement_membrane_interactions(&self, env: &mut MechEnvironment<V>) {
        let mesh = &env.mesh;
        let agents = &mut env.agents;
        let positions = &agents.positions;
        let radii = &agents.radii;
        let movable = &agents.movable;
        let strengths = &agents
            .membrane
            .installed("membrane")
            .basement_membrane_repulsion_strength;

        agents
            .velocities
            .par_iter_mut()
            .enumerate()
            .filter(|(i, _)| movable[*i])
            .for_each(|(i, velocity)| {
                *velocity += wall_velocity(mesh, positions[i], radii[i], strengths[i]);
            });
    }
}

/// Open domain: agents feel no boundary.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoWallMembraneModel;

impl<V: SpaceVector> MembraneModel<V> for NoWallMembraneModel {
    fn compute_basement_membrane_interactions(&self, _env: &mut MechEnvironment<V>) {}
}

/// Sum of the pushes of the two walls of every axis on one agent.
fn wall_velocity<V: SpaceVector>(
    mesh: &CartesianMesh<V>,
    position: V,
    radius: f64,
    strength: f64,
) -> V {
    V::from_axes(|axis| {
        let coord = position.axis(axis);
        wall_push(coord, mesh.bounding_box_mins.axis(axis), 1.0, radius, strength)
            + wall_push(coord, mesh.bounding_box_maxs.axis(axis), -1.0, radius, strength)
    })
}

/// One-sided push away from the wall at `boundary`; `sign` points to the interior.
#[inline]
fn wall_push(coord: f64, boundary: f64, sign: f64, radius: f64, strength: f64) -> f64 {
    let distance = (boundary - coord).abs().max(MINIMUM_DISTANCE);
    let repulsion = (1.0 - distance / radius).max(0.0);
    repulsion.powi(3) * strength * sign * distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_data::DataLayout;
    use crate::config::AgentTypeConfig;
    use glam::{DVec2, DVec3};

    fn env_with_agent<V: SpaceVector>(position: V, wall_strength: f64) -> MechEnvironment<V> {
        let mesh = CartesianMesh::from_bounds([0.0; 3], [100.0; 3]).unwrap();
        let layout = DataLayout {
            agent_types_count: 1,
            substrates_count: 0,
        };
        let mut env = MechEnvironment::new(mesh, 1.0, layout);
        WallMembraneModel::new(&mut env);

        let agent_type = AgentTypeConfig {
            radius: 10.0,
            wall_repulsion_strength: wall_strength,
            ..AgentTypeConfig::default()
        };
        let i = env.agents.add();
        env.agents.positions[i] = position;
        env.agents.apply_type(i, 0, &agent_type).unwrap();
        env
    }

    #[test]
    fn agent_near_min_wall_is_pushed_inwards() {
        let mut env = env_with_agent(DVec2::new(2.0, 50.0), 5.0);
        WallMembraneModel.compute_basement_membrane_interactions(&mut env);

        let v = env.agents.velocities[0];
        // (1 - 2/10)^3 * 5 * 2
        assert!((v.x - 5.12).abs() < 1e-12, "got {v:?}");
        assert_eq!(v.y, 0.0);
    }

    #[test]
    fn agent_near_max_wall_is_pushed_back() {
        let mut env = env_with_agent(97.0, 1.0);
        WallMembraneModel.compute_basement_membrane_interactions(&mut env);
        assert!(env.agents.velocities[0] < 0.0);
    }

    #[test]
    fn every_axis_has_its_own_walls() {
        let mut env = env_with_agent(DVec3::new(50.0, 95.0, 3.0), 1.0);
        WallMembraneModel.compute_basement_membrane_interactions(&mut env);

        let v = env.agents.velocities[0];
        assert_eq!(v.x, 0.0);
        assert!(v.y < 0.0);
        assert!(v.z > 0.0);
    }

    #[test]
    fn agent_on_the_wall_gets_a_finite_push() {
        let mut env = env_with_agent(DVec2::new(0.0, 50.0), 1.0);
        WallMembraneModel.compute_basement_membrane_interactions(&mut env);
        let v = env.agents.velocities[0];
        assert!(v.x.is_finite() && v.x > 0.0);
    }

    #[test]
    fn non_movable_agent_ignores_walls() {
        let mut env = env_with_agent(DVec2::new(2.0, 2.0), 5.0);
        env.agents.movable[0] = false;
        WallMembraneModel.compute_basement_membrane_interactions(&mut env);
        assert_eq!(env.agents.velocities[0], DVec2::ZERO);
    }

    #[test]
    fn no_wall_model_does_nothing() {
        let mut env = env_with_agent(DVec2::new(2.0, 2.0), 5.0);
        NoWallMembraneModel.compute_basement_membrane_interactions(&mut env);
        assert_eq!(env.agents.velocities[0], DVec2::ZERO);
    }
}
