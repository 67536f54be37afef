use crate::agent_data::{AgentStore, DataLayout};
use crate::mesh::CartesianMesh;
use crate::vector::SpaceVector;

/// Mechanical state shared by every model: domain, timestep and agents.
pub struct MechEnvironment<V: SpaceVector> {
    pub mesh: CartesianMesh<V>,
    pub timestep: f64,
    pub agents: AgentStore<V>,
}

impl<V: SpaceVector> MechEnvironment<V> {
    /// Empty environment; `layout` sizes the per-agent tables of every payload.
    pub fn new(mesh: CartesianMesh<V>, timestep: f64, layout: DataLayout) -> Self {
        Self {
            mesh,
            timestep,
            agents: AgentStore::new(layout),
        }
    }

    pub fn dims(&self) -> usize {
        V::DIMS
    }

    pub fn agent_types_count(&self) -> usize {
        self.agents.layout().agent_types_count
    }

    pub fn substrates_count(&self) -> usize {
        self.agents.layout().substrates_count
    }
}
