//! Agent storage as parallel arrays.
//!
//! Every per-agent array in an [`AgentStore`] has the same length, the agent
//! count. Each model keeps its own per-agent payload in an [`Extension`]
//! slot that starts [`Extension::Empty`] and is installed once, when the
//! model is constructed.

use crate::config::AgentTypeConfig;
use crate::error::MechError;
use crate::membrane::data::MembraneData;
use crate::motility::data::MotilityData;
use crate::potential::data::PotentialData;
use crate::types::{AgentIndex, TypeIndex};
use crate::vector::SpaceVector;

/// Sizes that per-agent payloads need besides the agent count.
///
/// Payloads receive this with every call instead of holding a reference
/// back to the environment that owns them.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataLayout {
    pub agent_types_count: usize,
    pub substrates_count: usize,
}

/// Per-agent payload owned by one model.
pub trait AgentData: Send + Sync {
    /// Creates the payload for `len` already existing agents.
    fn with_len(len: usize, layout: &DataLayout) -> Self
    where
        Self: Sized;

    /// Appends one default-initialized slot.
    fn add(&mut self, layout: &DataLayout);

    /// Moves the last slot into `index` and shrinks by one.
    fn remove(&mut self, index: AgentIndex, layout: &DataLayout);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Payload slot of one model. `Empty` until the model installs its data.
#[derive(Clone, Default)]
pub enum Extension<T> {
    #[default]
    Empty,
    Installed(T),
}

impl<T: AgentData> Extension<T> {
    /// Installs a payload sized to `len` agents if the slot is still empty.
    ///
    /// Returns `true` if this call performed the installation. An installed
    /// payload is never replaced.
    pub fn install(&mut self, len: usize, layout: &DataLayout) -> bool {
        match self {
            Extension::Empty => {
                *self = Extension::Installed(T::with_len(len, layout));
                true
            }
            Extension::Installed(_) => false,
        }
    }

    pub fn is_installed(&self) -> bool {
        matches!(self, Extension::Installed(_))
    }

    pub fn get(&self) -> Option<&T> {
        match self {
            Extension::Installed(data) => Some(data),
            Extension::Empty => None,
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        match self {
            Extension::Installed(data) => Some(data),
            Extension::Empty => None,
        }
    }

    /// Payload of a slot whose model has been constructed.
    ///
    /// ### Panics
    /// Panics if the slot is still empty, which means a model runs without
    /// having been constructed against this store.
    pub(crate) fn installed(&self, model: &'static str) -> &T {
        match self {
            Extension::Installed(data) => data,
            Extension::Empty => panic!("{model} data used before the {model} model was installed"),
        }
    }

    /// Mutable counterpart of [`Extension::installed`].
    pub(crate) fn installed_mut(&mut self, model: &'static str) -> &mut T {
        match self {
            Extension::Installed(data) => data,
            Extension::Empty => panic!("{model} data used before the {model} model was installed"),
        }
    }

    fn add(&mut self, layout: &DataLayout) {
        if let Extension::Installed(data) = self {
            data.add(layout);
        }
    }

    fn remove(&mut self, index: AgentIndex, layout: &DataLayout) {
        if let Extension::Installed(data) = self {
            data.remove(index, layout);
        }
    }
}

/// Removes row `index` of a row-major table with `stride` columns by
/// copying the last row over it.
pub(crate) fn swap_remove_row<T: Copy>(values: &mut Vec<T>, index: usize, stride: usize) {
    if stride == 0 {
        return;
    }
    let last = values.len() / stride - 1;
    if index != last {
        values.copy_within(last * stride..(last + 1) * stride, index * stride);
    }
    values.truncate(last * stride);
}

/// Parallel arrays holding every agent's mechanical state.
pub struct AgentStore<V: SpaceVector> {
    pub positions: Vec<V>,
    pub velocities: Vec<V>,
    pub radii: Vec<f64>,
    pub movable: Vec<bool>,
    pub type_indices: Vec<TypeIndex>,
    /// Agents within adhesion range; rebuilt every step.
    pub neighbors: Vec<Vec<AgentIndex>>,

    pub potential: Extension<PotentialData<V>>,
    pub membrane: Extension<MembraneData>,
    pub motility: Extension<MotilityData<V>>,

    layout: DataLayout,
}

impl<V: SpaceVector> AgentStore<V> {
    pub fn new(layout: DataLayout) -> Self {
        Self {
            positions: Vec::new(),
            velocities: Vec::new(),
            radii: Vec::new(),
            movable: Vec::new(),
            type_indices: Vec::new(),
            neighbors: Vec::new(),
            potential: Extension::Empty,
            membrane: Extension::Empty,
            motility: Extension::Empty,
            layout,
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Appends a zero-initialized agent to every array and returns its index.
    pub fn add(&mut self) -> AgentIndex {
        let index = self.len();

        self.positions.push(V::ZERO);
        self.velocities.push(V::ZERO);
        self.radii.push(0.0);
        self.movable.push(false);
        self.type_indices.push(0);
        self.neighbors.push(Vec::new());

        self.potential.add(&self.layout);
        self.membrane.add(&self.layout);
        self.motility.add(&self.layout);

        index
    }

    /// Removes agent `index`, moving the last agent into its slot.
    ///
    /// Springs and neighbor entries of the removed agent are dropped, and
    /// entries naming the moved agent are renamed to its new index.
    pub fn remove(&mut self, index: AgentIndex) -> Result<(), MechError> {
        let count = self.len();
        if index >= count {
            return Err(MechError::AgentOutOfRange { index, count });
        }
        let last = count - 1;

        self.positions.swap_remove(index);
        self.velocities.swap_remove(index);
        self.radii.swap_remove(index);
        self.movable.swap_remove(index);
        self.type_indices.swap_remove(index);
        self.neighbors.swap_remove(index);
        // Lists are one-sided for non-movable agents, so every list is visited.
        for list in &mut self.neighbors {
            list.retain(|&j| j != index);
            for j in list.iter_mut().filter(|j| **j == last) {
                *j = index;
            }
            list.sort_unstable();
        }

        self.potential.remove(index, &self.layout);
        self.membrane.remove(index, &self.layout);
        self.motility.remove(index, &self.layout);

        Ok(())
    }

    /// Fills agent `index` with the parameters of agent type `type_index`.
    pub fn apply_type(
        &mut self,
        index: AgentIndex,
        type_index: TypeIndex,
        agent_type: &AgentTypeConfig,
    ) -> Result<(), MechError> {
        let count = self.len();
        if index >= count {
            return Err(MechError::AgentOutOfRange { index, count });
        }
        if type_index >= self.layout.agent_types_count {
            return Err(MechError::InvalidTypeIndex {
                agent: index,
                type_index,
                types_count: self.layout.agent_types_count,
            });
        }

        self.radii[index] = agent_type.radius;
        self.movable[index] = agent_type.movable;
        self.type_indices[index] = type_index;

        if let Some(data) = self.potential.get_mut() {
            data.apply_type(index, agent_type);
        }
        if let Some(data) = self.membrane.get_mut() {
            data.basement_membrane_repulsion_strength[index] = agent_type.wall_repulsion_strength;
        }
        if let Some(data) = self.motility.get_mut() {
            data.apply_type(index, agent_type);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn layout() -> DataLayout {
        DataLayout {
            agent_types_count: 2,
            substrates_count: 3,
        }
    }

    fn store_with_all_extensions(count: usize) -> AgentStore<DVec2> {
        let mut store = AgentStore::new(layout());
        store.potential.install(0, &layout());
        store.membrane.install(0, &layout());
        store.motility.install(0, &layout());
        for i in 0..count {
            let idx = store.add();
            store.positions[idx] = DVec2::new(i as f64, 0.0);
        }
        store
    }

    fn assert_equal_lengths(store: &AgentStore<DVec2>) {
        let n = store.len();
        assert_eq!(store.velocities.len(), n);
        assert_eq!(store.radii.len(), n);
        assert_eq!(store.movable.len(), n);
        assert_eq!(store.type_indices.len(), n);
        assert_eq!(store.neighbors.len(), n);
        assert_eq!(store.potential.get().unwrap().len(), n);
        assert_eq!(store.membrane.get().unwrap().len(), n);
        assert_eq!(store.motility.get().unwrap().len(), n);
    }

    #[test]
    fn add_extends_every_array() {
        let store = store_with_all_extensions(4);
        assert_eq!(store.len(), 4);
        assert_equal_lengths(&store);

        let potential = store.potential.get().unwrap();
        assert_eq!(potential.adhesion_affinities.len(), 4 * 2);
        let motility = store.motility.get().unwrap();
        assert_eq!(motility.chemotactic_sensitivities.len(), 4 * 3);
    }

    #[test]
    fn remove_swaps_in_last_agent() {
        let mut store = store_with_all_extensions(4);
        store.remove(1).unwrap();

        assert_eq!(store.len(), 3);
        assert_equal_lengths(&store);
        assert_eq!(store.positions[1], DVec2::new(3.0, 0.0));
    }

    #[test]
    fn remove_last_agent_just_shrinks() {
        let mut store = store_with_all_extensions(3);
        store.remove(2).unwrap();
        assert_eq!(store.positions, vec![DVec2::new(0.0, 0.0), DVec2::new(1.0, 0.0)]);
        assert_equal_lengths(&store);
    }

    #[test]
    fn remove_fixes_up_neighbor_lists() {
        let mut store = store_with_all_extensions(4);
        store.neighbors = vec![vec![1, 3], vec![0, 3], vec![], vec![0, 1]];
        store.remove(1).unwrap();

        // Agent 3 moved into slot 1.
        assert_eq!(store.neighbors, vec![vec![1], vec![0], vec![]]);
        assert!(store.neighbors.iter().flatten().all(|&j| j < store.len()));
    }

    #[test]
    fn removing_the_last_agent_drops_its_neighbor_entries() {
        let mut store = store_with_all_extensions(3);
        store.neighbors = vec![vec![2], vec![], vec![0]];
        store.remove(2).unwrap();
        assert_eq!(store.neighbors, vec![Vec::<AgentIndex>::new(), vec![]]);
    }

    #[test]
    fn chemotactic_rows_follow_their_agent() {
        let mut store = store_with_all_extensions(3);
        let motility = store.motility.get_mut().unwrap();
        motility.chemotactic_sensitivities[6..9].copy_from_slice(&[1.0, 2.0, 3.0]);

        store.remove(0).unwrap();

        let motility = store.motility.get().unwrap();
        assert_eq!(motility.chemotactic_sensitivities_of(0), &[1.0, 2.0, 3.0]);
        assert_eq!(motility.chemotactic_sensitivities_of(1), &[0.0; 3]);
    }

    #[test]
    fn remove_out_of_range_is_an_error() {
        let mut store = store_with_all_extensions(2);
        assert!(matches!(
            store.remove(2),
            Err(MechError::AgentOutOfRange { index: 2, count: 2 })
        ));
    }

    #[test]
    fn install_happens_once_and_sizes_to_existing_agents() {
        let mut store: AgentStore<DVec2> = AgentStore::new(layout());
        store.add();
        store.add();
        assert!(!store.potential.is_installed());

        assert!(store.potential.install(store.len(), &layout()));
        assert_eq!(store.potential.get().unwrap().len(), 2);

        store.potential.get_mut().unwrap().attachment_rate[0] = 0.5;
        assert!(!store.potential.install(store.len(), &layout()));
        assert_eq!(store.potential.get().unwrap().attachment_rate[0], 0.5);
    }

    #[test]
    fn empty_extensions_only_track_the_store() {
        let mut store: AgentStore<DVec2> = AgentStore::new(layout());
        store.add();
        store.remove(0).unwrap();
        assert!(store.is_empty());
        assert!(store.membrane.get().is_none());
    }

    #[test]
    fn apply_type_fills_installed_payloads() {
        let mut store = store_with_all_extensions(1);
        let agent_type = AgentTypeConfig {
            radius: 7.0,
            wall_repulsion_strength: 3.0,
            adhesion_affinities: vec![0.5, 2.0],
            ..AgentTypeConfig::default()
        };
        store.apply_type(0, 1, &agent_type).unwrap();

        assert_eq!(store.radii[0], 7.0);
        assert_eq!(store.type_indices[0], 1);
        assert_eq!(store.membrane.get().unwrap().basement_membrane_repulsion_strength[0], 3.0);
        let potential = store.potential.get().unwrap();
        assert_eq!(potential.affinity(0, 1), 2.0);
    }

    #[test]
    fn apply_type_rejects_unknown_type() {
        let mut store = store_with_all_extensions(1);
        assert!(matches!(
            store.apply_type(0, 2, &AgentTypeConfig::default()),
            Err(MechError::InvalidTypeIndex { .. })
        ));
    }

    #[test]
    fn swap_remove_row_moves_last_row() {
        let mut table = vec![1, 1, 2, 2, 3, 3];
        swap_remove_row(&mut table, 0, 2);
        assert_eq!(table, vec![3, 3, 2, 2]);

        swap_remove_row(&mut table, 1, 2);
        assert_eq!(table, vec![3, 3]);

        let mut empty_rows: Vec<f64> = Vec::new();
        swap_remove_row(&mut empty_rows, 0, 0);
        assert!(empty_rows.is_empty());
    }
}
