//! Integer arithmetic on a fixed grid of points in the unit cell. Wyckoff enumeration and the
//! asymmetric-unit search both work by sampling every point of this grid, which is fine enough
//! for every special position of the tabulated settings.

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::{
    fract::{BaseInt, Frac, DENOM},
    isometry::Isometry,
    spacegroup::SpaceGroup,
};

/// Points are sampled at multiples of `1 / SAMPLING_GRID` along each axis.
pub const SAMPLING_GRID: BaseInt = 24;

/// The number of grid points in one unit cell.
pub const N_POINTS: usize = (SAMPLING_GRID * SAMPLING_GRID * SAMPLING_GRID) as usize;

/// A grid point, in units of `1 / SAMPLING_GRID`.
pub type GridPoint = Vector3<BaseInt>;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SamplingError {
    #[error("Operation {0} does not map the sampling grid onto itself")]
    OffGrid(Isometry),
}

/// A symmetry operation acting on grid points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridOp {
    pub rot: Matrix3<BaseInt>,
    /// The translation part in grid units.
    pub tau: Vector3<BaseInt>,
}

impl GridOp {
    pub fn new(op: &Isometry) -> Result<Self, SamplingError> {
        let off_grid = || SamplingError::OffGrid(*op);
        let rot = op.rot_int().ok_or_else(off_grid)?;
        let t = op.tau();
        let mut tau = Vector3::zeros();
        for i in 0..3 {
            tau[i] = t[i].scaled_numerator(SAMPLING_GRID).ok_or_else(off_grid)?;
        }
        Ok(Self { rot, tau })
    }

    /// The image of a point, without reducing into the unit cell.
    pub fn apply_exact(&self, p: &GridPoint) -> GridPoint {
        self.rot * p + self.tau
    }

    /// The image of a point, reduced into the unit cell.
    pub fn apply(&self, p: &GridPoint) -> GridPoint {
        reduce(&self.apply_exact(p))
    }

    /// The operation with its translation shifted by whole cells, as an [`Isometry`].
    pub fn to_isometry(&self, cell_shift: &Vector3<BaseInt>) -> Isometry {
        let tau = self.tau + cell_shift * SAMPLING_GRID;
        Isometry::from_int_rot(self.rot, to_frac(&tau))
    }
}

/// Every operation of the group, including centring translations, in [`SpaceGroup::all_ops`]
/// order. Fails if a translation isn't a multiple of the grid spacing.
pub fn grid_ops(group: &SpaceGroup) -> Result<Vec<GridOp>, SamplingError> {
    group.all_ops().iter().map(GridOp::new).collect()
}

/// Reduces a point into the unit cell.
pub fn reduce(p: &GridPoint) -> GridPoint {
    p.map(|x| x.rem_euclid(SAMPLING_GRID))
}

/// Every grid point in the unit cell, with `z` varying fastest.
pub fn grid_points() -> impl Iterator<Item = GridPoint> {
    (0..SAMPLING_GRID).flat_map(|i| {
        (0..SAMPLING_GRID).flat_map(move |j| (0..SAMPLING_GRID).map(move |k| Vector3::new(i, j, k)))
    })
}

/// The position of a reduced point in [`grid_points`] order.
pub fn point_index(p: &GridPoint) -> usize {
    let n = SAMPLING_GRID as usize;
    (p.x as usize * n + p.y as usize) * n + p.z as usize
}

/// Converts grid units to fractional coordinates.
pub fn to_frac(p: &GridPoint) -> Vector3<Frac> {
    p.map(|x| Frac::new_with_numerator(x * (DENOM / SAMPLING_GRID)))
}

/// The orbit of a point, reduced into the unit cell, in order of first appearance.
pub fn orbit(ops: &[GridOp], p: &GridPoint) -> Vec<GridPoint> {
    let mut points: Vec<GridPoint> = vec![];
    for op in ops {
        let q = op.apply(p);
        if !points.contains(&q) {
            points.push(q);
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{frac, hall::HallGroupSymbol};

    #[test]
    fn test_points() {
        let points: Vec<GridPoint> = grid_points().collect();
        assert_eq!(points.len(), N_POINTS);
        for (i, p) in points.iter().enumerate().step_by(97) {
            assert_eq!(point_index(p), i);
        }
        assert_eq!(
            to_frac(&Vector3::new(12, 6, 3)),
            Vector3::new(frac!(1 / 2), frac!(1 / 4), frac!(1 / 8))
        );
    }

    #[test]
    fn test_grid_ops() {
        let g = HallGroupSymbol::from_str("-P 2ac 2ab")
            .unwrap()
            .space_group()
            .unwrap();
        let ops = grid_ops(&g).unwrap();
        assert_eq!(ops.len(), 8);
        // the origin sits on an inversion centre: its orbit has 4 points, not 8
        assert_eq!(orbit(&ops, &Vector3::zeros()).len(), 4);
        assert_eq!(orbit(&ops, &Vector3::new(1, 2, 3)).len(), 8);

        let off = Isometry::from_str("x+1/5,y,z");
        assert!(off.is_err() || GridOp::new(&off.unwrap()).is_err());
        let off = Isometry::from_str("x+1/48,y,z").unwrap();
        assert_eq!(GridOp::new(&off), Err(SamplingError::OffGrid(off)));
    }

    #[test]
    fn test_to_isometry() {
        let op = Isometry::from_str("-x+1/2,-y,z+1/2").unwrap();
        let g = GridOp::new(&op).unwrap();
        assert_eq!(g.to_isometry(&Vector3::zeros()), op);
        assert_eq!(
            g.to_isometry(&Vector3::new(1, 0, -1)),
            Isometry::from_str("-x+3/2,-y,z-1/2").unwrap()
        );
    }
}
