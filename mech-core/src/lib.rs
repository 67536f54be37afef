//! Mechanics core for off-lattice agent-based cell simulations.
//!
//! Main components:
//! - [`partitioner`]: uniform voxel grid for neighborhood queries.
//! - [`potential`]: contact adhesion/repulsion, springs and integration.
//! - [`motility`]: persistent random walk.
//! - [`membrane`]: domain boundary forces.
//! - [`agent_data`]: parallel per-agent arrays and model payloads.
//! - [`phases`]: the per-step pipeline tying the models together.
//! - [`config`]: serde configuration of the whole core.
//! - [`serializer`]: read-only snapshots for output collaborators.
//! - [`vector`], [`mesh`], [`random`], [`types`]: shared building blocks.

pub mod agent_data;
pub mod atomic;
pub mod config;
pub mod environment;
pub mod error;
pub mod membrane;
pub mod mesh;
pub mod motility;
pub mod partitioner;
pub mod phases;
pub mod potential;
pub mod random;
pub mod serializer;
pub mod types;
pub mod vector;

pub use config::{AgentTypeConfig, MechConfig, MembraneKind, MotilityConfig};
pub use error::{ConfigError, MechError};
pub use phases::{Simulation, StepTimings};
pub use serializer::{Serializer, Snapshot};
pub use vector::SpaceVector;
