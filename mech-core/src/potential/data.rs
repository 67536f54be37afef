use crate::agent_data::{AgentData, DataLayout, swap_remove_row};
use crate::config::AgentTypeConfig;
use crate::error::MechError;
use crate::types::{AgentIndex, TypeIndex};
use crate::vector::SpaceVector;

/// Per-agent payload of the potential model.
///
/// `adhesion_affinities` is an agents × types table stored row-major: row
/// `i` holds agent `i`'s affinity towards each partner type.
#[derive(Clone, Debug, Default)]
pub struct PotentialData<V> {
    pub cell_adhesion_strength: Vec<f64>,
    pub cell_repulsion_strength: Vec<f64>,
    pub adhesion_affinities: Vec<f64>,
    pub relative_maximum_adhesion_distance: Vec<f64>,
    pub maximum_number_of_attachments: Vec<usize>,
    pub attachment_elastic_constant: Vec<f64>,
    pub attachment_rate: Vec<f64>,
    pub detachment_rate: Vec<f64>,

    /// Contact-repulsion crowding proxy, recomputed by every force pass.
    pub simple_pressure: Vec<f64>,
    /// Velocity used by the last position update.
    pub previous_velocities: Vec<V>,
    /// Spring partners. Symmetric: `b` is in `springs[a]` iff `a` is in `springs[b]`.
    pub springs: Vec<Vec<AgentIndex>>,

    agent_types_count: usize,
}

impl<V: SpaceVector> PotentialData<V> {
    /// Affinity of `agent` towards agents of `partner_type`.
    #[inline]
    pub fn affinity(&self, agent: AgentIndex, partner_type: TypeIndex) -> f64 {
        self.adhesion_affinities[agent * self.agent_types_count + partner_type]
    }

    /// Overrides the affinity of `agent` towards `partner_type`.
    pub fn set_affinity(&mut self, agent: AgentIndex, partner_type: TypeIndex, value: f64) {
        self.adhesion_affinities[agent * self.agent_types_count + partner_type] = value;
    }

    pub(crate) fn apply_type(&mut self, index: AgentIndex, agent_type: &AgentTypeConfig) {
        self.cell_adhesion_strength[index] = agent_type.cell_adhesion_strength;
        self.cell_repulsion_strength[index] = agent_type.cell_repulsion_strength;
        for partner_type in 0..self.agent_types_count {
            self.set_affinity(index, partner_type, agent_type.affinity(partner_type));
        }
        self.relative_maximum_adhesion_distance[index] =
            agent_type.relative_maximum_adhesion_distance;
        self.maximum_number_of_attachments[index] = agent_type.maximum_number_of_attachments;
        self.attachment_elastic_constant[index] = agent_type.attachment_elastic_constant;
        self.attachment_rate[index] = agent_type.attachment_rate;
        self.detachment_rate[index] = agent_type.detachment_rate;
    }

    /// Joins `a` and `b` with a spring on both endpoints.
    pub fn attach(&mut self, a: AgentIndex, b: AgentIndex) {
        self.springs[a].push(b);
        self.springs[b].push(a);
    }

    /// Whether `a` lists a spring to `b`.
    pub fn are_attached(&self, a: AgentIndex, b: AgentIndex) -> bool {
        self.springs[a].contains(&b)
    }

    /// Number of springs (each unordered pair counted once).
    pub fn spring_count(&self) -> usize {
        self.springs.iter().map(Vec::len).sum::<usize>() / 2
    }

    /// Verifies the symmetry of the spring table.
    pub fn check_spring_symmetry(&self) -> Result<(), MechError> {
        for (agent, partners) in self.springs.iter().enumerate() {
            for &partner in partners {
                let reciprocal = self
                    .springs
                    .get(partner)
                    .is_some_and(|back| back.contains(&agent));
                if !reciprocal {
                    return Err(MechError::AsymmetricSpring { agent, partner });
                }
            }
        }
        Ok(())
    }
}

impl<V: SpaceVector> AgentData for PotentialData<V> {
    fn with_len(len: usize, layout: &DataLayout) -> Self {
        let mut data = Self {
            agent_types_count: layout.agent_types_count,
            ..Self::default()
        };
        for _ in 0..len {
            data.add(layout);
        }
        data
    }

    fn add(&mut self, _layout: &DataLayout) {
        self.cell_adhesion_strength.push(0.0);
        self.cell_repulsion_strength.push(0.0);
        self.adhesion_affinities
            .extend(std::iter::repeat_n(0.0, self.agent_types_count));
        self.relative_maximum_adhesion_distance.push(0.0);
        self.maximum_number_of_attachments.push(0);
        self.attachment_elastic_constant.push(0.0);
        self.attachment_rate.push(0.0);
        self.detachment_rate.push(0.0);
        self.simple_pressure.push(0.0);
        self.previous_velocities.push(V::ZERO);
        self.springs.push(Vec::new());
    }

    fn remove(&mut self, index: AgentIndex, _layout: &DataLayout) {
        let last = self.len() - 1;

        // Detach the removed agent from all its partners.
        for partner in std::mem::take(&mut self.springs[index]) {
            self.springs[partner].retain(|&p| p != index);
        }

        self.cell_adhesion_strength.swap_remove(index);
        self.cell_repulsion_strength.swap_remove(index);
        swap_remove_row(&mut self.adhesion_affinities, index, self.agent_types_count);
        self.relative_maximum_adhesion_distance.swap_remove(index);
        self.maximum_number_of_attachments.swap_remove(index);
        self.attachment_elastic_constant.swap_remove(index);
        self.attachment_rate.swap_remove(index);
        self.detachment_rate.swap_remove(index);
        self.simple_pressure.swap_remove(index);
        self.previous_velocities.swap_remove(index);
        self.springs.swap_remove(index);

        // The former last agent now lives at `index`; rename it in its partners' lists.
        if index != last {
            for i in 0..self.springs[index].len() {
                let partner = self.springs[index][i];
                for p in &mut self.springs[partner] {
                    if *p == last {
                        *p = index;
                    }
                }
            }
        }
    }

    fn len(&self) -> usize {
        self.springs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec2;

    fn data(len: usize) -> PotentialData<DVec2> {
        PotentialData::with_len(
            len,
            &DataLayout {
                agent_types_count: 2,
                substrates_count: 0,
            },
        )
    }

    fn remove(data: &mut PotentialData<DVec2>, index: AgentIndex) {
        let layout = DataLayout {
            agent_types_count: 2,
            substrates_count: 0,
        };
        AgentData::remove(data, index, &layout);
    }

    #[test]
    fn attach_is_symmetric_and_counted_once() {
        let mut d = data(3);
        d.attach(0, 2);
        assert!(d.are_attached(0, 2));
        assert!(d.are_attached(2, 0));
        assert_eq!(d.spring_count(), 1);
        assert!(d.check_spring_symmetry().is_ok());
    }

    #[test]
    fn symmetry_check_reports_missing_reciprocal() {
        let mut d = data(2);
        d.springs[0].push(1);
        assert!(matches!(
            d.check_spring_symmetry(),
            Err(MechError::AsymmetricSpring {
                agent: 0,
                partner: 1
            })
        ));
    }

    #[test]
    fn removing_an_agent_detaches_its_springs() {
        let mut d = data(3);
        d.attach(0, 1);
        d.attach(1, 2);

        remove(&mut d, 1);

        assert_eq!(d.len(), 2);
        assert!(d.springs.iter().all(Vec::is_empty));
        assert!(d.check_spring_symmetry().is_ok());
    }

    #[test]
    fn removing_renames_the_moved_agent_in_partner_lists() {
        let mut d = data(4);
        d.attach(3, 0);
        d.attach(3, 2);
        d.attach(1, 2);

        remove(&mut d, 1);

        // Agent 3 moved to slot 1 and keeps its springs to 0 and 2.
        assert!(d.are_attached(1, 0));
        assert!(d.are_attached(1, 2));
        assert_eq!(d.spring_count(), 2);
        assert!(d.check_spring_symmetry().is_ok());
    }

    #[test]
    fn affinity_rows_follow_swap_removal() {
        let mut d = data(3);
        d.set_affinity(2, 0, 4.0);
        d.set_affinity(2, 1, 5.0);

        remove(&mut d, 0);

        assert_eq!(d.affinity(0, 0), 4.0);
        assert_eq!(d.affinity(0, 1), 5.0);
        assert_eq!(d.adhesion_affinities.len(), 2 * 2);
    }
}
