/// Identifier for an agent in an [`crate::agent_data::AgentStore`].
///
/// This is an index into the store's parallel arrays, and is only
/// meaningful until the next removal (removal moves the last agent into
/// the freed slot).
pub type AgentIndex = usize;

/// Index of an agent type (row/column of the affinity matrix).
pub type TypeIndex = usize;
