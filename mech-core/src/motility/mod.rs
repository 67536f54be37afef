//! Persistent random walk.
//!
//! A motile agent keeps moving along its motility vector ("run") and, with
//! probability `timestep / persistence_time` per step, picks a new one
//! ("tumble").

pub mod data;

use crate::environment::MechEnvironment;
use crate::random::{RandomStream, Stage};
use crate::vector::SpaceVector;
use rand::Rng;
use rayon::prelude::*;
use tracing::info;

pub trait MotilityModel<V: SpaceVector>: Send + Sync {
    /// Adds each motile agent's motility vector into its velocity,
    /// resampling the vector on tumble events.
    fn update_motility_velocities(&self, env: &mut MechEnvironment<V>, stream: &RandomStream);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct BaseMotilityModel;

impl BaseMotilityModel {
    pub fn new<V: SpaceVector>(env: &mut MechEnvironment<V>) -> Self {
        let agents = &mut env.agents;
        let (len, layout) = (agents.len(), *agents.layout());
        if agents.motility.install(len, &layout) {
            info!(agents = len, "installed motility data");
        }
        Self
    }
}

impl<V: SpaceVector> MotilityModel<V> for BaseMotilityModel {
    fn update_motility_velocities(&self, env: &mut MechEnvironment<V>, stream: &RandomStream) {
        let timestep = env.timestep;
        let agents = &mut env.agents;
        let data = agents.motility.installed_mut("motility");

        let is_motile = &data.is_motile;
        let persistence_time = &data.persistence_time;
        let migration_speed = &data.migration_speed;
        let migration_bias = &data.migration_bias;
        let restrict_to_2d = &data.restrict_to_2d;
        let update_bias = &data.update_migration_bias_direction;

        agents
            .velocities
            .par_iter_mut()
            .zip(data.motility_vector.par_iter_mut())
            .zip(data.migration_bias_direction.par_iter_mut())
            .enumerate()
            .filter(|(i, _)| is_motile[*i])
            .for_each(|(i, ((velocity, motility_vector), bias_direction))| {
                let mut rng = stream.agent_rng(Stage::Motility, i);

                if rng.random::<f64>() < timestep / persistence_time[i] {
                    let walk = V::random_unit(&mut rng, restrict_to_2d[i]);

                    if let Some(update) = &update_bias[i] {
                        update(bias_direction);
                    }

                    let bias = migration_bias[i];
                    *motility_vector = (walk * (1.0 - bias) + *bias_direction * bias)
                        .normalize_and_scale(migration_speed[i]);
                }

                *velocity += *motility_vector;
            });
    }
}
