use crate::agent_data::{AgentData, DataLayout, swap_remove_row};
use crate::config::AgentTypeConfig;
use crate::types::AgentIndex;
use crate::vector::SpaceVector;
use std::sync::Arc;

/// Hook that rewrites an agent's migration bias direction before a tumble
/// (chemotaxis, for instance). Called from worker threads.
pub type BiasDirectionUpdate<V> = Arc<dyn Fn(&mut V) + Send + Sync>;

/// Per-agent payload of the motility model.
#[derive(Clone, Default)]
pub struct MotilityData<V> {
    pub is_motile: Vec<bool>,
    pub persistence_time: Vec<f64>,
    pub migration_speed: Vec<f64>,
    pub migration_bias_direction: Vec<V>,
    pub migration_bias: Vec<f64>,
    /// Active velocity, kept between tumbles.
    pub motility_vector: Vec<V>,
    pub restrict_to_2d: Vec<bool>,

    /// Substrate followed by a chemotaxis bias hook. The model itself never
    /// reads the chemotaxis fields; they are parameters for
    /// `update_migration_bias_direction` closures built by the caller.
    pub chemotaxis_index: Vec<usize>,
    /// `1` climbs the gradient, `-1` descends it.
    pub chemotaxis_direction: Vec<i32>,
    /// Agents × substrates table, row-major. Read by bias hooks through
    /// [`MotilityData::chemotactic_sensitivities_of`].
    pub chemotactic_sensitivities: Vec<f64>,

    pub update_migration_bias_direction: Vec<Option<BiasDirectionUpdate<V>>>,
}

impl<V: SpaceVector> MotilityData<V> {
    /// Sensitivity of agent `index` to each substrate.
    pub fn chemotactic_sensitivities_of(&self, index: AgentIndex) -> &[f64] {
        let substrates = self.chemotactic_sensitivities.len() / self.is_motile.len().max(1);
        &self.chemotactic_sensitivities[index * substrates..(index + 1) * substrates]
    }

    pub(crate) fn apply_type(&mut self, index: AgentIndex, agent_type: &AgentTypeConfig) {
        let motility = &agent_type.motility;
        self.is_motile[index] = motility.is_motile;
        self.persistence_time[index] = motility.persistence_time;
        self.migration_speed[index] = motility.migration_speed;
        self.migration_bias[index] = motility.migration_bias;
        self.restrict_to_2d[index] = motility.restrict_to_2d;
    }
}

impl<V: SpaceVector> AgentData for MotilityData<V> {
    fn with_len(len: usize, layout: &DataLayout) -> Self {
        let mut data = Self::default();
        for _ in 0..len {
            data.add(layout);
        }
        data
    }

    fn add(&mut self, layout: &DataLayout) {
        self.is_motile.push(false);
        self.persistence_time.push(0.0);
        self.migration_speed.push(0.0);
        self.migration_bias_direction.push(V::ZERO);
        self.migration_bias.push(0.0);
        self.motility_vector.push(V::ZERO);
        self.restrict_to_2d.push(false);
        self.chemotaxis_index.push(0);
        self.chemotaxis_direction.push(1);
        self.chemotactic_sensitivities
            .extend(std::iter::repeat_n(0.0, layout.substrates_count));
        self.update_migration_bias_direction.push(None);
    }

    fn remove(&mut self, index: AgentIndex, layout: &DataLayout) {
        self.is_motile.swap_remove(index);
        self.persistence_time.swap_remove(index);
        self.migration_speed.swap_remove(index);
        self.migration_bias_direction.swap_remove(index);
        self.migration_bias.swap_remove(index);
        self.motility_vector.swap_remove(index);
        self.restrict_to_2d.swap_remove(index);
        self.chemotaxis_index.swap_remove(index);
        self.chemotaxis_direction.swap_remove(index);
        swap_remove_row(
            &mut self.chemotactic_sensitivities,
            index,
            layout.substrates_count,
        );
        self.update_migration_bias_direction.swap_remove(index);
    }

    fn len(&self) -> usize {
        self.is_motile.len()
    }
}
