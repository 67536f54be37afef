use crate::error::ConfigError;
use crate::types::TypeIndex;
use serde::{Deserialize, Serialize};

/// Which membrane model bounds the domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembraneKind {
    /// Repulsive walls on every face of the bounding box.
    #[default]
    Wall,
    /// Open domain, no boundary force.
    None,
}

/// Persistent random walk parameters of one agent type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotilityConfig {
    pub is_motile: bool,
    /// Mean time between direction changes.
    pub persistence_time: f64,
    pub migration_speed: f64,
    /// Blend between random direction (0) and bias direction (1).
    pub migration_bias: f64,
    pub restrict_to_2d: bool,
}

impl Default for MotilityConfig {
    fn default() -> Self {
        Self {
            is_motile: false,
            persistence_time: 1.0,
            migration_speed: 1.0,
            migration_bias: 0.0,
            restrict_to_2d: false,
        }
    }
}

/// Mechanical parameters shared by every agent of one type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentTypeConfig {
    pub name: String,
    pub radius: f64,
    pub movable: bool,
    pub cell_adhesion_strength: f64,
    pub cell_repulsion_strength: f64,
    /// Affinity towards each partner type; empty means 1.0 for every type.
    pub adhesion_affinities: Vec<f64>,
    pub relative_maximum_adhesion_distance: f64,
    pub maximum_number_of_attachments: usize,
    pub attachment_elastic_constant: f64,
    pub attachment_rate: f64,
    pub detachment_rate: f64,
    pub wall_repulsion_strength: f64,
    pub motility: MotilityConfig,
}

impl Default for AgentTypeConfig {
    fn default() -> Self {
        Self {
            name: "default".to_owned(),
            radius: 10.0,
            movable: true,
            cell_adhesion_strength: 1.0,
            cell_repulsion_strength: 10.0,
            adhesion_affinities: Vec::new(),
            relative_maximum_adhesion_distance: 1.0,
            maximum_number_of_attachments: 1,
            attachment_elastic_constant: 1.0,
            attachment_rate: 0.0,
            detachment_rate: 0.0,
            wall_repulsion_strength: 1.0,
            motility: MotilityConfig::default(),
        }
    }
}

impl AgentTypeConfig {
    /// Affinity of this type towards `partner_type`.
    pub fn affinity(&self, partner_type: TypeIndex) -> f64 {
        self.adhesion_affinities
            .get(partner_type)
            .copied()
            .unwrap_or(1.0)
    }

    /// Largest distance at which two agents of this type still interact.
    pub fn interaction_distance(&self) -> f64 {
        2.0 * self.relative_maximum_adhesion_distance * self.radius
    }

    fn validate(&self, type_index: TypeIndex, types_count: usize) -> Result<(), ConfigError> {
        let invalid = |field, requirement, value| ConfigError::InvalidTypeParameter {
            type_index,
            field,
            requirement,
            value,
        };

        if !(self.radius > 0.0 && self.radius.is_finite()) {
            return Err(invalid("radius", "positive and finite", self.radius));
        }

        let non_negative = [
            ("cell_adhesion_strength", self.cell_adhesion_strength),
            ("cell_repulsion_strength", self.cell_repulsion_strength),
            (
                "relative_maximum_adhesion_distance",
                self.relative_maximum_adhesion_distance,
            ),
            ("attachment_elastic_constant", self.attachment_elastic_constant),
            ("attachment_rate", self.attachment_rate),
            ("detachment_rate", self.detachment_rate),
            ("wall_repulsion_strength", self.wall_repulsion_strength),
            ("migration_speed", self.motility.migration_speed),
        ];
        for (field, value) in non_negative {
            if !(value >= 0.0 && value.is_finite()) {
                return Err(invalid(field, "non-negative and finite", value));
            }
        }

        if !self.adhesion_affinities.is_empty() && self.adhesion_affinities.len() != types_count {
            return Err(ConfigError::AffinityRowLength {
                type_index,
                expected: types_count,
                actual: self.adhesion_affinities.len(),
            });
        }
        if let Some(&bad) = self
            .adhesion_affinities
            .iter()
            .find(|a| !(**a >= 0.0 && a.is_finite()))
        {
            return Err(invalid("adhesion_affinities", "non-negative and finite", bad));
        }

        let bias = self.motility.migration_bias;
        if !(0.0..=1.0).contains(&bias) {
            return Err(invalid("migration_bias", "within [0, 1]", bias));
        }

        // A non-positive persistence time leaves the tumble probability undefined.
        let persistence = self.motility.persistence_time;
        if self.motility.is_motile && !(persistence > 0.0 && persistence.is_finite()) {
            return Err(invalid("persistence_time", "positive and finite", persistence));
        }

        Ok(())
    }
}

/// Complete configuration surface of the mechanics core.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MechConfig {
    /// Number of spatial dimensions (1, 2 or 3).
    pub dims: usize,
    pub bounding_box_mins: [f64; 3],
    pub bounding_box_maxs: [f64; 3],
    pub timestep: f64,
    /// Edge length of the partitioning voxels.
    pub voxel_size: f64,
    pub seed: u64,
    /// Number of diffusing substrates (sizes chemotaxis sensitivities).
    pub substrates_count: usize,
    pub membrane: MembraneKind,
    pub agent_types: Vec<AgentTypeConfig>,
}

impl Default for MechConfig {
    fn default() -> Self {
        Self {
            dims: 2,
            bounding_box_mins: [0.0, 0.0, 0.0],
            bounding_box_maxs: [1000.0, 1000.0, 1000.0],
            timestep: 1.0,
            voxel_size: 20.0,
            seed: 0,
            substrates_count: 4,
            membrane: MembraneKind::Wall,
            agent_types: vec![AgentTypeConfig::default()],
        }
    }
}

impl MechConfig {
    /// Checks every value that would make the step loop ill-defined.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=3).contains(&self.dims) {
            return Err(ConfigError::InvalidDimensions(self.dims));
        }
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(ConfigError::InvalidTimestep(self.timestep));
        }
        if !(self.voxel_size > 0.0 && self.voxel_size.is_finite()) {
            return Err(ConfigError::InvalidVoxelSize(self.voxel_size));
        }
        if self.agent_types.is_empty() {
            return Err(ConfigError::NoAgentTypes);
        }

        let types_count = self.agent_types.len();
        for (type_index, agent_type) in self.agent_types.iter().enumerate() {
            agent_type.validate(type_index, types_count)?;
        }
        Ok(())
    }

    pub fn agent_types_count(&self) -> usize {
        self.agent_types.len()
    }

    /// Largest interaction distance over all agent types.
    pub fn max_interaction_distance(&self) -> f64 {
        self.agent_types
            .iter()
            .map(AgentTypeConfig::interaction_distance)
            .fold(0.0, f64::max)
    }
}
