//! Error types of the mechanics core.
//!
//! Nothing in the per-step hot path returns these; they are produced while
//! validating configuration and scene setup before the first step, or by a
//! serializer between steps.

use crate::types::{AgentIndex, TypeIndex};
use thiserror::Error;

/// Invalid values in a [`crate::config::MechConfig`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("dimensions must be 1, 2 or 3, got {0}")]
    InvalidDimensions(usize),
    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),
    #[error("voxel_size must be positive and finite, got {0}")]
    InvalidVoxelSize(f64),
    #[error("at least one agent type is required")]
    NoAgentTypes,
    #[error("agent type {type_index}: {field} must be {requirement}, got {value}")]
    InvalidTypeParameter {
        type_index: TypeIndex,
        field: &'static str,
        requirement: &'static str,
        value: f64,
    },
    #[error("agent type {type_index}: affinity row has {actual} entries, expected {expected}")]
    AffinityRowLength {
        type_index: TypeIndex,
        expected: usize,
        actual: usize,
    },
}

/// Errors raised while building or validating a simulation.
#[derive(Debug, Error)]
pub enum MechError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("mesh axis {axis}: minimum {min} must be below maximum {max}")]
    InvalidMesh { axis: usize, min: f64, max: f64 },
    #[error(
        "voxel size {voxel_size} is smaller than the largest interaction distance {required}"
    )]
    VoxelTooSmall { voxel_size: f64, required: f64 },
    #[error("agent {agent}: motile agents need a positive persistence time, got {value}")]
    InvalidPersistenceTime { agent: AgentIndex, value: f64 },
    #[error("agent {agent}: type index {type_index} out of range for {types_count} types")]
    InvalidTypeIndex {
        agent: AgentIndex,
        type_index: TypeIndex,
        types_count: usize,
    },
    #[error("spring {agent} -> {partner} has no reciprocal entry")]
    AsymmetricSpring {
        agent: AgentIndex,
        partner: AgentIndex,
    },
    #[error("agent index {index} out of range for {count} agents")]
    AgentOutOfRange { index: AgentIndex, count: usize },
    #[error("configuration has {actual} dimensions but the simulation was built for {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("serializer failed: {0}")]
    Serializer(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_convert_into_mech_errors() {
        let err: MechError = ConfigError::InvalidTimestep(-1.0).into();
        assert!(matches!(err, MechError::Config(ConfigError::InvalidTimestep(_))));
        assert_eq!(err.to_string(), "timestep must be positive and finite, got -1");
    }

    #[test]
    fn messages_name_the_offending_value() {
        let err = MechError::VoxelTooSmall {
            voxel_size: 10.0,
            required: 25.0,
        };
        assert!(err.to_string().contains("25"));
    }
}
