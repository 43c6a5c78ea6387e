//! The asymmetric-unit brick: a box `0 <= x <= a, 0 <= y <= b, 0 <= z <= c` that contains at
//! least one point of every orbit.
//!
//! Upper bounds are chosen from a short list of simple fractions. Boxes are tried from the
//! smallest volume up, never smaller than `1 / order_z`, and a box is accepted when every orbit
//! of the sampling grid has a member inside it.

use std::fmt::Display;

use nalgebra::Vector3;
use thiserror::Error;
use tracing::debug;

use crate::{
    fract::{BaseInt, Frac, DENOM},
    sampling::{grid_ops, grid_points, orbit, point_index, SamplingError, N_POINTS, SAMPLING_GRID},
    spacegroup::SpaceGroup,
};

/// Upper bounds along one axis, in units of `1 / SAMPLING_GRID`: 1/8, 1/6, 1/4, 1/3, 3/8, 1/2,
/// 2/3, 3/4, 5/6, 7/8 and 1.
const UPPER_BOUNDS: [BaseInt; 11] = [3, 4, 6, 8, 9, 12, 16, 18, 20, 21, 24];

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BrickError {
    #[error(transparent)]
    Sampling(#[from] SamplingError),
    #[error("No asymmetric-unit brick found for a group of order {order_z}")]
    NotFound { order_z: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Brick {
    /// Upper bounds in grid units.
    upper: [BaseInt; 3],
}

impl Brick {
    pub fn new(group: &SpaceGroup) -> Result<Self, BrickError> {
        let ops = grid_ops(group)?;
        let order_z = ops.len();

        let mut seen = vec![false; N_POINTS];
        let mut orbits: Vec<Vec<Vector3<BaseInt>>> = vec![];
        for p in grid_points() {
            if seen[point_index(&p)] {
                continue;
            }
            let members = orbit(&ops, &p);
            for q in &members {
                seen[point_index(q)] = true;
            }
            orbits.push(members);
        }

        let cell = i64::from(SAMPLING_GRID).pow(3);
        let mut candidates: Vec<[BaseInt; 3]> = UPPER_BOUNDS
            .iter()
            .flat_map(|&a| {
                UPPER_BOUNDS
                    .iter()
                    .flat_map(move |&b| UPPER_BOUNDS.iter().map(move |&c| [a, b, c]))
            })
            .filter(|u| Self::grid_volume(u) * order_z as i64 >= cell)
            .collect();
        // smallest first; among equal volumes cut x before y before z
        candidates.sort_by_key(|u| (Self::grid_volume(u), -u[2], -u[1], -u[0]));

        let brick = candidates
            .into_iter()
            .map(|upper| Self { upper })
            .find(|brick| {
                orbits
                    .iter()
                    .all(|members| members.iter().any(|q| brick.contains_grid_point(q)))
            })
            .ok_or(BrickError::NotFound { order_z })?;
        debug!(%brick, n_orbits = orbits.len(), "found asymmetric-unit brick");
        Ok(brick)
    }

    fn grid_volume(upper: &[BaseInt; 3]) -> i64 {
        upper.iter().map(|&x| i64::from(x)).product()
    }

    fn contains_grid_point(&self, q: &Vector3<BaseInt>) -> bool {
        (0..3).all(|i| q[i] <= self.upper[i])
    }

    /// The upper bounds as fractions.
    pub fn upper(&self) -> [Frac; 3] {
        self.upper
            .map(|x| Frac::new_with_numerator(x * (DENOM / SAMPLING_GRID)))
    }

    /// The fraction of the unit cell the brick covers.
    pub fn volume(&self) -> f64 {
        Self::grid_volume(&self.upper) as f64 / f64::from(SAMPLING_GRID).powi(3)
    }

    /// Whether a point lies in the brick, after reducing it into the unit cell.
    pub fn contains(&self, point: &Vector3<Frac>) -> bool {
        let upper = self.upper();
        (0..3).all(|i| point[i].modulo_one() <= upper[i])
    }
}

impl Display for Brick {
    /// Writes the bounds like `0<=x<=1/2; 0<=y<1; 0<=z<=1/4`. A bound of a whole cell is written as
    /// strict, since the far face repeats the near one.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (bound, var)) in self.upper().iter().zip(['x', 'y', 'z']).enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            if *bound == Frac::ONE {
                write!(f, "0<={}<1", var)?;
            } else {
                write!(f, "0<={}<={}", var, bound)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    use super::*;
    use crate::{frac, hall::HallGroupSymbol, symbols::SETTINGS};

    fn brick(hall: &str) -> Brick {
        let g = HallGroupSymbol::from_str(hall)
            .unwrap()
            .space_group()
            .unwrap();
        Brick::new(&g).unwrap()
    }

    #[test]
    fn test_display() {
        assert_eq!(brick("P 1").to_string(), "0<=x<1; 0<=y<1; 0<=z<1");
        assert_eq!(brick("-P 1").to_string(), "0<=x<=1/2; 0<=y<1; 0<=z<1");
        assert_eq!(
            brick("-P 2 2").to_string(),
            "0<=x<=1/2; 0<=y<=1/2; 0<=z<=1/2"
        );
    }

    #[test]
    fn test_volume() {
        let b = brick("P 2ac 2ab");
        assert_relative_eq!(b.volume(), 0.25);
        let b = brick("-F 4 2 3");
        assert!(b.volume() >= 1.0 / 192.0);
        assert!(b.contains(&Vector3::zeros()));
    }

    #[test]
    fn test_off_grid() {
        let mut g = SpaceGroup::new();
        g.expand_ltr(Vector3::new(frac!(1 / 48), frac!(0), frac!(0)))
            .unwrap();
        assert!(matches!(Brick::new(&g), Err(BrickError::Sampling(_))));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_orbits_meet_brick(index in 0..SETTINGS.len(), x in 0..24, y in 0..24, z in 0..24) {
            let g = SETTINGS[index].space_group().unwrap();
            let b = Brick::new(&g).unwrap();
            prop_assert!(b.volume() * g.order_z() as f64 >= 1.0 - 1e-9);
            let p = Vector3::new(x, y, z).map(|c| Frac::new_with_numerator(c * (DENOM / SAMPLING_GRID)));
            prop_assert!(g.all_ops().iter().any(|op| b.contains(&op.apply(&p))));
        }
    }
}
