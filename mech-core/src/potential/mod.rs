//! Contact forces, springs and position integration.
//!
//! A step of the potential model runs four passes over the movable agents:
//! neighbor rebuild, pairwise adhesion/repulsion, stochastic spring
//! attach/detach and spring forces. Position integration runs last, after
//! every other model has added its velocity contribution.

pub mod data;

use crate::atomic::AtomicReal;
use crate::environment::MechEnvironment;
use crate::partitioner::GridSpacePartitioner;
use crate::random::{RandomStream, Stage};
use crate::types::{AgentIndex, TypeIndex};
use crate::vector::SpaceVector;
use data::PotentialData;
use rand::Rng;
use rayon::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::{debug, error, info};

/// Converts squared contact overlap into simple pressure:
/// `1 / (12 * (1 - sqrt(pi / (2 * sqrt(3))))^2)`.
pub const SIMPLE_PRESSURE_COEFFICIENT: f64 = 36.64504274775163;

/// Distances are clamped to at least this before dividing by them.
pub const MINIMUM_DISTANCE: f64 = 1e-5;

/// Placeholder for a spring slot marked for removal.
const ERASED_SPRING: AgentIndex = AgentIndex::MAX;

pub trait PotentialModel<V: SpaceVector>: Send + Sync {
    /// Rebuilds every agent's neighbor list from a freshly rebuilt partitioner.
    fn update_neighbors(&self, env: &mut MechEnvironment<V>, partitioner: &GridSpacePartitioner<V>);

    /// Adds contact and spring forces into the velocities, updating the
    /// spring table on the way.
    fn update_velocities(&self, env: &mut MechEnvironment<V>, stream: &RandomStream);

    /// Integrates positions and resets the velocity accumulators.
    ///
    /// Non-movable agents keep their position but still get their
    /// accumulator reset, so contributions such as motility never pile up.
    fn update_positions(&self, env: &mut MechEnvironment<V>);
}

/// Saturating adhesion/repulsion potential with Hookean springs and
/// Adams-Bashforth-2 integration.
#[derive(Clone, Copy, Debug, Default)]
pub struct BasePotentialModel;

impl BasePotentialModel {
    /// Creates the model, installing its per-agent data if not present yet.
    pub fn new<V: SpaceVector>(env: &mut MechEnvironment<V>) -> Self {
        let agents = &mut env.agents;
        let (len, layout) = (agents.len(), *agents.layout());
        if agents.potential.install(len, &layout) {
            info!(agents = len, "installed potential data");
        }
        Self
    }

    /// Resets simple pressure, then adds the pairwise contact force of
    /// every neighbor into each movable agent's velocity.
    ///
    /// Each call only updates the first agent of the pair; the partner gets
    /// its share when its own neighbor list is visited.
    pub fn compute_agents_potentials<V: SpaceVector>(&self, env: &mut MechEnvironment<V>) {
        let agents = &mut env.agents;
        let pressure: Vec<AtomicReal> = (0..agents.len()).map(|_| AtomicReal::default()).collect();

        {
            let kernel = PairKernel {
                positions: &agents.positions,
                radii: &agents.radii,
                type_indices: &agents.type_indices,
                data: agents.potential.installed("potential"),
                pressure: &pressure,
            };
            let movable = &agents.movable;
            let neighbors = &agents.neighbors;

            agents
                .velocities
                .par_iter_mut()
                .enumerate()
                .filter(|(i, _)| movable[*i])
                .for_each(|(i, velocity)| {
                    for &j in &neighbors[i] {
                        *velocity += kernel.solve(i, j);
                    }
                });
        }

        let data = agents.potential.installed_mut("potential");
        for (slot, accumulated) in data.simple_pressure.iter_mut().zip(&pressure) {
            *slot = accumulated.load();
        }
    }

    /// Stochastically detaches existing springs, then attaches new ones
    /// between neighbors.
    ///
    /// Both passes mutate the spring table under a single lock, since an
    /// edge is shared by two agents that different workers may visit at once.
    pub fn attach_detach_springs<V: SpaceVector>(
        &self,
        env: &mut MechEnvironment<V>,
        stream: &RandomStream,
    ) {
        let timestep = env.timestep;
        let agents = &mut env.agents;
        let movable = &agents.movable;
        let neighbors = &agents.neighbors;
        let type_indices = &agents.type_indices;
        let data = agents.potential.installed_mut("potential");

        // Detach decisions are drawn against the table as it was at the start of the step.
        let to_detach: Vec<Vec<usize>> = data
            .springs
            .par_iter()
            .enumerate()
            .map(|(agent, partners)| {
                let probability = data.detachment_rate[agent] * timestep;
                if !movable[agent] || partners.is_empty() || probability <= 0.0 {
                    return Vec::new();
                }
                let mut rng = stream.agent_rng(Stage::Detach, agent);
                (0..partners.len())
                    .filter(|_| rng.random::<f64>() < probability)
                    .collect()
            })
            .collect();

        let detached = AtomicUsize::new(0);
        let table = Mutex::new(std::mem::take(&mut data.springs));
        to_detach
            .par_iter()
            .enumerate()
            .filter(|(_, slots)| !slots.is_empty())
            .for_each(|(agent, slots)| {
                let mut springs = table.lock().unwrap_or_else(PoisonError::into_inner);
                for &slot in slots {
                    if erase_spring(&mut springs, agent, slot) {
                        detached.fetch_add(1, Ordering::Relaxed);
                    }
                }
            });

        let mut springs = table.into_inner().unwrap_or_else(PoisonError::into_inner);
        springs
            .par_iter_mut()
            .for_each(|partners| partners.retain(|&partner| partner != ERASED_SPRING));

        let attached = AtomicUsize::new(0);
        let table = Mutex::new(springs);
        {
            let data = &*data;
            neighbors
                .par_iter()
                .enumerate()
                .filter(|(_, candidates)| !candidates.is_empty())
                .for_each(|(this, candidates)| {
                    let mut rng = stream.agent_rng(Stage::Attach, this);

                    for &other in candidates {
                        // Each unordered pair is tried once, from its lower index.
                        if other < this {
                            continue;
                        }

                        let probability_this = data.attachment_rate[this]
                            * timestep
                            * data.affinity(this, type_indices[other]);
                        let probability_other = data.attachment_rate[other]
                            * timestep
                            * data.affinity(other, type_indices[this]);
                        if probability_this <= 0.0 && probability_other <= 0.0 {
                            continue;
                        }

                        if rng.random::<f64>() < probability_this
                            || rng.random::<f64>() < probability_other
                        {
                            let mut springs = table.lock().unwrap_or_else(PoisonError::into_inner);
                            if springs[this].len() < data.maximum_number_of_attachments[this]
                                && springs[other].len() < data.maximum_number_of_attachments[other]
                                && !springs[this].contains(&other)
                            {
                                springs[this].push(other);
                                springs[other].push(this);
                                attached.fetch_add(1, Ordering::Relaxed);
                            }
                        }
                    }
                });
        }
        let mut springs = table.into_inner().unwrap_or_else(PoisonError::into_inner);
        // Push order depends on which worker took the lock first.
        springs.par_iter_mut().for_each(|partners| partners.sort_unstable());
        data.springs = springs;

        debug!(
            detached = detached.into_inner(),
            attached = attached.into_inner(),
            "updated springs"
        );
    }

    /// Adds the elastic pull of every spring into each movable agent's velocity.
    pub fn compute_springs_potentials<V: SpaceVector>(&self, env: &mut MechEnvironment<V>) {
        let agents = &mut env.agents;
        let positions = &agents.positions;
        let type_indices = &agents.type_indices;
        let movable = &agents.movable;
        let data = agents.potential.installed("potential");

        agents
            .velocities
            .par_iter_mut()
            .enumerate()
            .filter(|(i, _)| movable[*i])
            .for_each(|(this, velocity)| {
                for &other in &data.springs[this] {
                    let stiffness = spring_stiffness(
                        data,
                        this,
                        type_indices[this],
                        other,
                        type_indices[other],
                    );
                    *velocity += (positions[other] - positions[this]) * stiffness;
                }
            });
    }
}

impl<V: SpaceVector> PotentialModel<V> for BasePotentialModel {
    fn update_neighbors(
        &self,
        env: &mut MechEnvironment<V>,
        partitioner: &GridSpacePartitioner<V>,
    ) {
        let agents = &mut env.agents;
        let positions = &agents.positions;
        let radii = &agents.radii;
        let movable = &agents.movable;
        let reach = &agents.potential.installed("potential").relative_maximum_adhesion_distance;

        agents
            .neighbors
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, neighbors)| {
                neighbors.clear();
                if !movable[i] {
                    return;
                }

                let reach_i = reach[i] * radii[i];
                partitioner.for_each_in_neighborhood(positions[i], i, |j| {
                    let adhesion_distance = reach_i + reach[j] * radii[j];
                    if positions[i].distance(positions[j]) <= adhesion_distance {
                        neighbors.push(j);
                    }
                });
                // The partitioner's order depends on the thread schedule.
                neighbors.sort_unstable();
            });
    }

    fn update_velocities(&self, env: &mut MechEnvironment<V>, stream: &RandomStream) {
        self.compute_agents_potentials(env);
        self.attach_detach_springs(env, stream);
        self.compute_springs_potentials(env);
    }

    fn update_positions(&self, env: &mut MechEnvironment<V>) {
        let timestep = env.timestep;
        let factor = 1.5 * timestep;
        let previous_factor = -0.5 * timestep;

        let agents = &mut env.agents;
        let movable = &agents.movable;
        let data = agents.potential.installed_mut("potential");

        agents
            .positions
            .par_iter_mut()
            .zip(agents.velocities.par_iter_mut())
            .zip(data.previous_velocities.par_iter_mut())
            .zip(movable.par_iter())
            .for_each(|(((position, velocity), previous), &movable)| {
                if movable {
                    *position += *velocity * factor + *previous * previous_factor;
                    *previous = *velocity;
                }
                *velocity = V::ZERO;
            });
    }
}

/// Read-only inputs of the pairwise force, shared by all workers.
struct PairKernel<'a, V: SpaceVector> {
    positions: &'a [V],
    radii: &'a [f64],
    type_indices: &'a [TypeIndex],
    data: &'a PotentialData<V>,
    pressure: &'a [AtomicReal],
}

impl<V: SpaceVector> PairKernel<'_, V> {
    /// Velocity contribution of `rhs` on `lhs`. Also adds the contact
    /// pressure of the pair to both agents.
    #[inline]
    fn solve(&self, lhs: AgentIndex, rhs: AgentIndex) -> V {
        let data = self.data;
        let difference = self.positions[lhs] - self.positions[rhs];
        let distance = difference.length().max(MINIMUM_DISTANCE);

        let repulsive_distance = self.radii[lhs] + self.radii[rhs];
        let mut repulsion = (1.0 - distance / repulsive_distance).max(0.0);
        repulsion *= repulsion;

        self.pressure[lhs].add(repulsion * SIMPLE_PRESSURE_COEFFICIENT);
        self.pressure[rhs].add(repulsion * SIMPLE_PRESSURE_COEFFICIENT);

        repulsion *= (data.cell_repulsion_strength[lhs] * data.cell_repulsion_strength[rhs]).sqrt();

        let adhesion_distance = data.relative_maximum_adhesion_distance[lhs] * self.radii[lhs]
            + data.relative_maximum_adhesion_distance[rhs] * self.radii[rhs];
        let mut adhesion = (1.0 - distance / adhesion_distance).max(0.0);
        adhesion *= adhesion;

        adhesion *= (data.cell_adhesion_strength[lhs]
            * data.cell_adhesion_strength[rhs]
            * data.affinity(lhs, self.type_indices[rhs])
            * data.affinity(rhs, self.type_indices[lhs]))
        .sqrt();

        let force = (repulsion - adhesion) / distance;
        difference * force
    }
}

#[inline]
fn spring_stiffness<V: SpaceVector>(
    data: &PotentialData<V>,
    this: AgentIndex,
    this_type: TypeIndex,
    other: AgentIndex,
    other_type: TypeIndex,
) -> f64 {
    (data.attachment_elastic_constant[this]
        * data.attachment_elastic_constant[other]
        * data.affinity(this, other_type)
        * data.affinity(other, this_type))
    .sqrt()
}

/// Marks spring `slot` of `agent` and its reciprocal entry as erased.
///
/// Returns `false` if the partner already erased this edge.
fn erase_spring(springs: &mut [Vec<AgentIndex>], agent: AgentIndex, slot: usize) -> bool {
    let partner = springs[agent][slot];
    if partner == ERASED_SPRING {
        return false;
    }
    springs[agent][slot] = ERASED_SPRING;

    let back = springs[partner].iter().position(|&p| p == agent);
    debug_assert!(back.is_some(), "spring {agent} -> {partner} has no reciprocal entry");
    match back {
        Some(back) => springs[partner][back] = ERASED_SPRING,
        None => error!(
            agent,
            partner, "spring without reciprocal entry, dropping the dangling half"
        ),
    }
    true
}
