use crate::error::MechError;
use crate::vector::SpaceVector;

/// Axis-aligned bounding box of the simulation domain.
///
/// This is the part of the microenvironment mesh the mechanics core
/// consumes: dimensionality (through `V`), the bounding box, and the
/// per-axis extents.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CartesianMesh<V> {
    pub bounding_box_mins: V,
    pub bounding_box_maxs: V,
}

impl<V: SpaceVector> CartesianMesh<V> {
    /// Creates a mesh, rejecting empty or inverted axes.
    pub fn new(bounding_box_mins: V, bounding_box_maxs: V) -> Result<Self, MechError> {
        for axis in 0..V::DIMS {
            let min = bounding_box_mins.axis(axis);
            let max = bounding_box_maxs.axis(axis);
            if !(min < max) || !min.is_finite() || !max.is_finite() {
                return Err(MechError::InvalidMesh { axis, min, max });
            }
        }

        Ok(Self {
            bounding_box_mins,
            bounding_box_maxs,
        })
    }

    /// Creates a mesh from 3-component bounds, keeping the first `V::DIMS` axes.
    pub fn from_bounds(mins: [f64; 3], maxs: [f64; 3]) -> Result<Self, MechError> {
        Self::new(V::from_axes(|a| mins[a]), V::from_axes(|a| maxs[a]))
    }

    pub fn dims(&self) -> usize {
        V::DIMS
    }

    pub fn extent(&self, axis: usize) -> f64 {
        self.bounding_box_maxs.axis(axis) - self.bounding_box_mins.axis(axis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec2, DVec3};

    #[test]
    fn from_bounds_truncates_to_dimensionality() {
        let mesh =
            CartesianMesh::<DVec2>::from_bounds([0.0, -5.0, 0.0], [100.0, 5.0, 0.0]).unwrap();
        assert_eq!(mesh.dims(), 2);
        assert_eq!(mesh.extent(0), 100.0);
        assert_eq!(mesh.extent(1), 10.0);
    }

    #[test]
    fn inverted_axis_is_rejected() {
        let err = CartesianMesh::new(DVec3::new(0.0, 0.0, 10.0), DVec3::new(10.0, 10.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, MechError::InvalidMesh { axis: 2, .. }));
    }

    #[test]
    fn nan_bound_is_rejected() {
        assert!(CartesianMesh::new(f64::NAN, 1.0).is_err());
    }
}
