//! Uniform voxel grid answering "which agents are near this point".
//!
//! The grid is rebuilt from scratch every step in three parallel passes
//! (count, allocate, scatter). Agent indices are stored contiguously per
//! voxel: voxel `v` owns `agents_in_voxels[voxel_offsets[v]..voxel_offsets[v + 1]]`.

use crate::error::{ConfigError, MechError};
use crate::mesh::CartesianMesh;
use crate::types::AgentIndex;
use crate::vector::SpaceVector;
use rayon::prelude::*;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::info;

#[derive(Debug)]
pub struct GridSpacePartitioner<V: SpaceVector> {
    mins: V,
    voxel_size: f64,
    /// Voxels per axis; 1 on axes beyond `V::DIMS`.
    grid_shape: [usize; 3],
    /// Per-voxel agent counts during the count pass, insertion cursors
    /// during the scatter pass.
    voxel_counts: Vec<AtomicUsize>,
    voxel_offsets: Vec<usize>,
    agents_in_voxels: Vec<AtomicUsize>,
}

impl<V: SpaceVector> GridSpacePartitioner<V> {
    /// Creates a partitioner covering `mesh` with cubic voxels of `voxel_size`.
    ///
    /// `voxel_size` must be at least the largest interaction distance, or
    /// the one-ring neighborhood search misses partners.
    pub fn new(voxel_size: f64, mesh: &CartesianMesh<V>) -> Result<Self, MechError> {
        if !(voxel_size > 0.0 && voxel_size.is_finite()) {
            return Err(ConfigError::InvalidVoxelSize(voxel_size).into());
        }

        let mut grid_shape = [1; 3];
        for (axis, shape) in grid_shape.iter_mut().enumerate().take(V::DIMS) {
            *shape = ((mesh.extent(axis) / voxel_size).ceil() as usize).max(1);
        }
        let voxels_count = grid_shape.iter().product::<usize>();

        info!(
            dims = V::DIMS,
            voxel_size,
            voxels = voxels_count,
            "built partitioning grid {:?}",
            &grid_shape[..V::DIMS]
        );

        Ok(Self {
            mins: mesh.bounding_box_mins,
            voxel_size,
            grid_shape,
            voxel_counts: (0..voxels_count).map(|_| AtomicUsize::new(0)).collect(),
            voxel_offsets: vec![0; voxels_count + 1],
            agents_in_voxels: Vec::new(),
        })
    }

    /// Edge length of a voxel, equal on every axis.
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// Voxels per axis; unused axes have one voxel.
    pub fn grid_shape(&self) -> [usize; 3] {
        self.grid_shape
    }

    pub fn voxels_count(&self) -> usize {
        self.voxel_counts.len()
    }

    /// Grid coordinates of the voxel containing `position`.
    ///
    /// Positions outside the domain map to the nearest border voxel.
    pub fn voxel_position(&self, position: V) -> [usize; 3] {
        let mut voxel = [0; 3];
        for (axis, coord) in voxel.iter_mut().enumerate().take(V::DIMS) {
            let offset = ((position.axis(axis) - self.mins.axis(axis)) / self.voxel_size).floor();
            *coord = (offset.max(0.0) as usize).min(self.grid_shape[axis] - 1);
        }
        voxel
    }

    #[inline]
    pub fn voxel_index(&self, voxel: [usize; 3]) -> usize {
        voxel[0] + self.grid_shape[0] * (voxel[1] + self.grid_shape[1] * voxel[2])
    }

    /// Recomputes voxel membership for `positions`.
    ///
    /// Each pass is a rayon loop; its completion is the barrier before the
    /// next one.
    pub fn rebuild(&mut self, positions: &[V]) {
        self.voxel_counts
            .par_iter()
            .for_each(|count| count.store(0, Ordering::Relaxed));

        // 1. count agents per voxel
        {
            let this = &*self;
            positions.par_iter().for_each(|&position| {
                let voxel = this.voxel_index(this.voxel_position(position));
                this.voxel_counts[voxel].fetch_add(1, Ordering::Relaxed);
            });
        }

        // 2. allocate each voxel's range; cursors start at the range end
        for voxel in 0..self.voxel_counts.len() {
            let count = self.voxel_counts[voxel].load(Ordering::Relaxed);
            let end = self.voxel_offsets[voxel] + count;
            self.voxel_offsets[voxel + 1] = end;
            self.voxel_counts[voxel].store(end, Ordering::Relaxed);
        }
        if self.agents_in_voxels.len() != positions.len() {
            self.agents_in_voxels
                .resize_with(positions.len(), || AtomicUsize::new(0));
        }

        // 3. scatter, decrementing the cursor to claim a slot
        let this = &*self;
        positions.par_iter().enumerate().for_each(|(agent, &position)| {
            let voxel = this.voxel_index(this.voxel_position(position));
            let slot = this.voxel_counts[voxel].fetch_sub(1, Ordering::Relaxed) - 1;
            this.agents_in_voxels[slot].store(agent, Ordering::Relaxed);
        });
    }

    /// Agents assigned to `voxel` by the last rebuild, in no particular order.
    pub fn agents_in_voxel(&self, voxel: usize) -> impl Iterator<Item = AgentIndex> + '_ {
        self.agents_in_voxels[self.voxel_offsets[voxel]..self.voxel_offsets[voxel + 1]]
            .iter()
            .map(|agent| agent.load(Ordering::Relaxed))
    }

    /// Calls `f` for every agent in the voxels within one voxel of
    /// `position`'s voxel (3, 9 or 27 voxels), skipping `self_index`.
    pub fn for_each_in_neighborhood(
        &self,
        position: V,
        self_index: AgentIndex,
        mut f: impl FnMut(AgentIndex),
    ) {
        let center = self.voxel_position(position);

        for z in self.ring(center, 2) {
            for y in self.ring(center, 1) {
                for x in self.ring(center, 0) {
                    let voxel = self.voxel_index([x, y, z]);
                    for agent in self.agents_in_voxel(voxel) {
                        if agent != self_index {
                            f(agent);
                        }
                    }
                }
            }
        }
    }

    /// Voxel coordinates along `axis` adjacent to `center`, clipped to the grid.
    #[inline]
    fn ring(&self, center: [usize; 3], axis: usize) -> RangeInclusive<usize> {
        if axis >= V::DIMS {
            return 0..=0;
        }
        let c = center[axis];
        c.saturating_sub(1)..=(c + 1).min(self.grid_shape[axis] - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec2, DVec3};
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn neighborhood<V: SpaceVector>(
        p: &GridSpacePartitioner<V>,
        position: V,
        me: usize,
    ) -> Vec<usize> {
        let mut found = Vec::new();
        p.for_each_in_neighborhood(position, me, |j| found.push(j));
        found.sort_unstable();
        found
    }

    /// Reference answer: agents whose voxel differs by at most one on every axis.
    fn brute_force<V: SpaceVector>(
        p: &GridSpacePartitioner<V>,
        positions: &[V],
        me: usize,
    ) -> Vec<usize> {
        let center = p.voxel_position(positions[me]);
        (0..positions.len())
            .filter(|&j| j != me)
            .filter(|&j| {
                let other = p.voxel_position(positions[j]);
                (0..3).all(|a| center[a].abs_diff(other[a]) <= 1)
            })
            .collect()
    }

    fn random_positions<V: SpaceVector>(count: usize, extent: f64, seed: u64) -> Vec<V> {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        (0..count)
            .map(|_| V::from_axes(|_| rng.random_range(0.0..extent)))
            .collect()
    }

    fn check_against_brute_force<V: SpaceVector>(seed: u64) {
        let mesh = CartesianMesh::<V>::from_bounds([0.0; 3], [100.0; 3]).unwrap();
        let mut p = GridSpacePartitioner::new(20.0, &mesh).unwrap();
        let positions = random_positions::<V>(300, 100.0, seed);
        p.rebuild(&positions);

        for me in 0..positions.len() {
            assert_eq!(neighborhood(&p, positions[me], me), brute_force(&p, &positions, me));
        }
    }

    #[test]
    fn neighborhood_matches_one_ring_in_1d() {
        check_against_brute_force::<f64>(1);
    }

    #[test]
    fn neighborhood_matches_one_ring_in_2d() {
        check_against_brute_force::<DVec2>(2);
    }

    #[test]
    fn neighborhood_matches_one_ring_in_3d() {
        check_against_brute_force::<DVec3>(3);
    }

    #[test]
    fn grid_shape_rounds_up_and_pads_missing_axes() {
        let mesh = CartesianMesh::new(DVec2::ZERO, DVec2::new(100.0, 50.0)).unwrap();
        let p = GridSpacePartitioner::new(20.0, &mesh).unwrap();
        assert_eq!(p.grid_shape(), [5, 3, 1]);
        assert_eq!(p.voxels_count(), 15);
    }

    #[test]
    fn positions_outside_domain_clamp_to_border_voxels() {
        let mesh = CartesianMesh::new(DVec2::ZERO, DVec2::new(100.0, 100.0)).unwrap();
        let p = GridSpacePartitioner::new(20.0, &mesh).unwrap();
        assert_eq!(p.voxel_position(DVec2::new(-5.0, 250.0)), [0, 4, 0]);
        assert_eq!(p.voxel_position(DVec2::new(100.0, 39.9)), [4, 1, 0]);
    }

    #[test]
    fn every_agent_lands_in_exactly_one_voxel() {
        let mesh = CartesianMesh::<DVec3>::from_bounds([0.0; 3], [60.0; 3]).unwrap();
        let mut p = GridSpacePartitioner::new(20.0, &mesh).unwrap();
        let positions = random_positions::<DVec3>(500, 60.0, 9);
        p.rebuild(&positions);

        let mut seen: Vec<usize> = (0..p.voxels_count())
            .flat_map(|v| p.agents_in_voxel(v))
            .collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..500).collect::<Vec<_>>());
    }

    #[test]
    fn rebuild_follows_moved_and_removed_agents() {
        let mesh = CartesianMesh::new(0.0, 100.0).unwrap();
        let mut p = GridSpacePartitioner::new(10.0, &mesh).unwrap();

        p.rebuild(&[5.0, 6.0, 95.0]);
        assert_eq!(neighborhood(&p, 5.0, 0), vec![1]);

        p.rebuild(&[5.0, 90.0]);
        assert!(neighborhood(&p, 5.0, 0).is_empty());
        assert_eq!(neighborhood(&p, 85.0, usize::MAX), vec![1]);
    }

    #[test]
    fn query_before_first_rebuild_finds_nothing() {
        let mesh = CartesianMesh::new(DVec2::ZERO, DVec2::splat(40.0)).unwrap();
        let p = GridSpacePartitioner::new(20.0, &mesh).unwrap();
        assert!(neighborhood(&p, DVec2::splat(10.0), 0).is_empty());
    }

    #[test]
    fn non_positive_voxel_size_is_rejected() {
        let mesh = CartesianMesh::new(0.0, 1.0).unwrap();
        assert!(matches!(
            GridSpacePartitioner::new(0.0, &mesh),
            Err(MechError::Config(ConfigError::InvalidVoxelSize(_)))
        ));
    }
}
