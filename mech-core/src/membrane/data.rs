use crate::agent_data::{AgentData, DataLayout};
use crate::types::AgentIndex;

/// Per-agent payload of the wall membrane model.
#[derive(Clone, Debug, Default)]
pub struct MembraneData {
    pub basement_membrane_repulsion_strength: Vec<f64>,
}

impl AgentData for MembraneData {
    fn with_len(len: usize, _layout: &DataLayout) -> Self {
        Self {
            basement_membrane_repulsion_strength: vec![0.0; len],
        }
    }

    fn add(&mut self, _layout: &DataLayout) {
        self.basement_membrane_repulsion_strength.push(0.0);
    }

    fn remove(&mut self, index: AgentIndex, _layout: &DataLayout) {
        self.basement_membrane_repulsion_strength.swap_remove(index);
    }

    fn len(&self) -> usize {
        self.basement_membrane_repulsion_strength.len()
    }
}
