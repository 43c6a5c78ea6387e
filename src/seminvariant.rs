//! Structure seminvariants: the origin shifts that map a space group onto itself without changing
//! its operations, written as vectors `v` with moduli `m` so that the permissible shifts are the
//! combinations of `v / m`.
//!
//! A shift `x` is permissible exactly when `(R - I) x` is a lattice translation for every
//! rotation `R`. In a primitive basis that is a system of linear congruences over the integers,
//! solved with the Smith normal form of the stacked `R - I` blocks. Directions in its kernel can
//! be shifted along freely: those are reported with modulus 1.

use std::fmt::Display;

use nalgebra::{DMatrix, Matrix3, RowVector3, Vector3};
use thiserror::Error;
use tracing::trace;

use crate::{
    fract::{BaseInt, Frac, DENOM},
    isometry::Isometry,
    lattice::{adjugate3_i64, det3_i64, gcd, smith_normal_form, PrimitiveBasis},
    spacegroup::SpaceGroup,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SeminvariantError {
    #[error("Operation {0} does not map the lattice onto itself")]
    NotLatticeOperation(Isometry),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeminvariantVector {
    pub v: Vector3<i64>,
    /// At least 1. For continuous directions this is always 1.
    pub m: i64,
    /// Whether the origin can be shifted along `v` by any amount.
    pub continuous: bool,
}

impl SeminvariantVector {
    /// The smallest permissible shift along this vector, `v / m`. `None` for continuous
    /// directions.
    pub fn shift(&self) -> Option<Vector3<Frac>> {
        if self.continuous {
            return None;
        }
        let mut shift = Vector3::zeros();
        for i in 0..3 {
            shift[i] = Frac::new(BaseInt::try_from(self.v[i]).ok()?, self.m as BaseInt).ok()?;
        }
        Some(shift)
    }
}

impl Display for SeminvariantVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({},{},{}) {}", self.v.x, self.v.y, self.v.z, self.m)
    }
}

/// Makes the first nonzero entry positive and divides out the content.
fn normalized_direction(v: Vector3<i64>) -> Vector3<i64> {
    let g = v.iter().fold(0, |acc, &x| gcd(acc, x));
    let v = if g > 1 { v / g } else { v };
    match v.iter().find(|&&x| x != 0) {
        Some(&x) if x < 0 => -v,
        _ => v,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StructureSeminvariants {
    vectors: Vec<SeminvariantVector>,
    /// Integer rows that pick out the coordinates of a translation (in units of `1 / DENOM`)
    /// along the directions that aren't continuous, scaled so that a translation is a lattice
    /// vector plus a continuous shift exactly when every row gives a multiple of `row_modulus`.
    discrete_rows: Vec<RowVector3<i64>>,
    row_modulus: i64,
}

impl StructureSeminvariants {
    pub fn new(group: &SpaceGroup) -> Result<Self, SeminvariantError> {
        let basis = PrimitiveBasis::new(group.ltr());

        let mut blocks: Vec<Matrix3<i64>> = vec![];
        for op in group.smx() {
            let rot = op
                .rot_int()
                .ok_or(SeminvariantError::NotLatticeOperation(*op))?
                .map(i64::from);
            let rot_p = basis
                .to_primitive(&rot)
                .ok_or(SeminvariantError::NotLatticeOperation(*op))?;
            blocks.push(rot_p - Matrix3::identity());
        }

        let stacked = DMatrix::from_fn(3 * blocks.len(), 3, |i, j| blocks[i / 3][(i % 3, j)]);
        let (diag, v) = smith_normal_form(&stacked);
        let v = Matrix3::from_fn(|i, j| v[(i, j)]);
        trace!(?diag, "seminvariant Smith normal form");

        let mut vectors = vec![];
        for (i, &d) in diag.iter().enumerate() {
            if d == 1 {
                continue;
            }
            // the shift is H u / (scale d) in conventional coordinates
            let u: Vector3<i64> = v.column(i).into_owned();
            let w = basis.h * u;
            if d == 0 {
                vectors.push(SeminvariantVector {
                    v: normalized_direction(w),
                    m: 1,
                    continuous: true,
                });
            } else {
                let denom = basis.scale * d;
                let w = w.map(|x| x.rem_euclid(denom));
                let g = w.iter().fold(denom, |acc, &x| gcd(acc, x));
                vectors.push(SeminvariantVector {
                    v: w / g,
                    m: denom / g,
                    continuous: false,
                });
            }
        }
        vectors.retain(|sv| sv.continuous || sv.m > 1);
        // discrete ones by decreasing modulus, then the continuous ones
        vectors.sort_by_key(|sv| (sv.continuous, -sv.m));

        // y = V^-1 scale H^-1 t picks out the coordinates along the seminvariant directions
        let v_inv = adjugate3_i64(&v) * det3_i64(&v);
        let h_adj = adjugate3_i64(&basis.h) * basis.scale;
        let discrete_rows = diag
            .iter()
            .enumerate()
            .filter(|&(_, &d)| d != 0)
            .map(|(i, _)| v_inv.row(i) * h_adj)
            .collect();

        Ok(Self {
            vectors,
            discrete_rows,
            row_modulus: basis.det().abs() * i64::from(DENOM),
        })
    }

    /// Discrete vectors by decreasing modulus, then the continuous directions.
    pub fn vectors_and_moduli(&self) -> &[SeminvariantVector] {
        &self.vectors
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn continuous_directions(&self) -> impl Iterator<Item = &Vector3<i64>> {
        self.vectors.iter().filter(|sv| sv.continuous).map(|sv| &sv.v)
    }

    /// The number of independent directions the origin can float along: 3 for `P 1`, 1 for
    /// polar groups like `P 2`, 0 for centric groups.
    pub fn n_continuous(&self) -> usize {
        self.continuous_directions().count()
    }

    /// Whether a reflection's phase is unchanged by every permissible origin shift.
    pub fn is_seminvariant(&self, h: &Vector3<i64>) -> bool {
        self.vectors.iter().all(|sv| {
            let dot = h.dot(&sv.v);
            if sv.continuous {
                dot == 0
            } else {
                dot % sv.m == 0
            }
        })
    }

    /// Whether a translation is a lattice translation, once shifts along the continuous
    /// directions are ignored.
    pub fn is_trivial_shift(&self, t: &Vector3<Frac>) -> bool {
        let t = t.map(|x| i64::from(x.numerator));
        self.discrete_rows
            .iter()
            .all(|row| (row * t)[0] % self.row_modulus == 0)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{frac, hall::HallGroupSymbol, symbols::SETTINGS};

    fn group(hall: &str) -> SpaceGroup {
        HallGroupSymbol::from_str(hall).unwrap().space_group().unwrap()
    }

    fn sorted(ss: &StructureSeminvariants) -> Vec<(Vector3<i64>, i64, bool)> {
        let mut vms: Vec<_> = ss
            .vectors_and_moduli()
            .iter()
            .map(|sv| (sv.v, sv.m, sv.continuous))
            .collect();
        vms.sort_by_key(|(v, m, c)| (*c, *m, v.x, v.y, v.z));
        vms
    }

    #[test]
    fn test_p1() {
        let ss = StructureSeminvariants::new(&group("P 1")).unwrap();
        assert_eq!(ss.len(), 3);
        assert_eq!(ss.n_continuous(), 3);
        assert!(ss.is_trivial_shift(&Vector3::new(frac!(1 / 3), frac!(1 / 8), frac!(5 / 6))));
        assert!(!ss.is_seminvariant(&Vector3::new(0, 0, 1)));
        assert!(ss.is_seminvariant(&Vector3::zeros()));
    }

    #[test]
    fn test_p_1() {
        let ss = StructureSeminvariants::new(&group("-P 1")).unwrap();
        assert_eq!(
            sorted(&ss),
            vec![
                (Vector3::new(0, 0, 1), 2, false),
                (Vector3::new(0, 1, 0), 2, false),
                (Vector3::new(1, 0, 0), 2, false),
            ]
        );
        assert!(ss.is_seminvariant(&Vector3::new(2, -4, 0)));
        assert!(!ss.is_seminvariant(&Vector3::new(1, 0, 0)));
        assert!(!ss.is_trivial_shift(&Vector3::new(frac!(1 / 2), frac!(0), frac!(0))));
        assert!(ss.is_trivial_shift(&Vector3::new(frac!(1), frac!(-2), frac!(0))));
    }

    #[test]
    fn test_polar() {
        let ss = StructureSeminvariants::new(&group("P 2y")).unwrap();
        assert_eq!(
            sorted(&ss),
            vec![
                (Vector3::new(0, 0, 1), 2, false),
                (Vector3::new(1, 0, 0), 2, false),
                (Vector3::new(0, 1, 0), 1, true),
            ]
        );
        // continuous entries come last
        assert!(ss.vectors_and_moduli()[2].continuous);
        assert!(ss.is_trivial_shift(&Vector3::new(frac!(0), frac!(1 / 24), frac!(0))));
        assert!(!ss.is_trivial_shift(&Vector3::new(frac!(1 / 2), frac!(1 / 24), frac!(0))));
        assert!(ss.is_seminvariant(&Vector3::new(2, 0, 4)));
        assert!(!ss.is_seminvariant(&Vector3::new(0, 2, 0)));
    }

    #[test]
    fn test_centred() {
        // the body centring is itself a lattice translation, so it is never a shift on its own
        let ss = StructureSeminvariants::new(&group("I 2 2")).unwrap();
        assert_eq!(ss.n_continuous(), 0);
        assert!(ss.is_trivial_shift(&Vector3::new(frac!(1 / 2), frac!(1 / 2), frac!(1 / 2))));
        assert!(!ss.is_trivial_shift(&Vector3::new(frac!(1 / 2), frac!(0), frac!(0))));
        assert!(ss.vectors_and_moduli().iter().all(|sv| sv.m == 2));
    }

    #[test]
    fn test_shifts_preserve_group() {
        for rec in SETTINGS.iter().step_by(7) {
            let g = rec.space_group().unwrap();
            let ss = StructureSeminvariants::new(&g).unwrap();
            for sv in ss.vectors_and_moduli() {
                assert!(sv.m >= 1, "{}", rec.hall);
                let shift = if sv.continuous {
                    sv.v.map(|x| Frac::new(x as BaseInt, 24).unwrap())
                } else {
                    sv.shift().unwrap()
                };
                let shifted = g.change_basis(&Isometry::translation(shift)).unwrap();
                assert!(shifted.same_operations(&g), "{} {sv}", rec.hall);
            }
        }
    }
}
