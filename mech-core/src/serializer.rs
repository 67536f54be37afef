//! Read-only per-step view handed to output collaborators.

use crate::environment::MechEnvironment;
use crate::types::AgentIndex;
use crate::vector::SpaceVector;

/// Borrowed state of the simulation after a completed step.
///
/// Velocities are the ones used by the last position update (the live
/// accumulators are zero between steps).
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a, V> {
    pub step: u64,
    pub positions: &'a [V],
    pub velocities: &'a [V],
    pub neighbors: &'a [Vec<AgentIndex>],
    pub springs: &'a [Vec<AgentIndex>],
    pub simple_pressure: &'a [f64],
}

impl<'a, V: SpaceVector> Snapshot<'a, V> {
    /// Snapshot of `env` after `step` completed steps.
    ///
    /// Models that were not installed contribute empty slices.
    pub fn from_environment(env: &'a MechEnvironment<V>, step: u64) -> Self {
        let agents = &env.agents;
        let potential = agents.potential.get();

        Self {
            step,
            positions: &agents.positions,
            velocities: potential.map(|p| p.previous_velocities.as_slice()).unwrap_or_default(),
            neighbors: &agents.neighbors,
            springs: potential.map(|p| p.springs.as_slice()).unwrap_or_default(),
            simple_pressure: potential.map(|p| p.simple_pressure.as_slice()).unwrap_or_default(),
        }
    }

    pub fn agents_count(&self) -> usize {
        self.positions.len()
    }

    /// Every undirected neighbor edge once, as `(i, j)` with `j < i`.
    ///
    /// An edge listed by only one of its agents (a non-movable agent keeps
    /// an empty list) is still reported. Entries naming no agent are skipped.
    pub fn neighbor_edges(&self) -> impl Iterator<Item = (AgentIndex, AgentIndex)> + 'a {
        let neighbors = self.neighbors;
        neighbors.iter().enumerate().flat_map(move |(i, list)| {
            list.iter()
                .copied()
                .filter(move |&j| match neighbors.get(j) {
                    Some(other) => j < i || !other.contains(&i),
                    None => false,
                })
                .map(move |j| (i.max(j), i.min(j)))
        })
    }
}

/// Receives one snapshot per step. Runs outside the parallel passes.
pub trait Serializer<V: SpaceVector> {
    fn serialize_one_timestep(&mut self, snapshot: &Snapshot<'_, V>) -> std::io::Result<()>;
}
