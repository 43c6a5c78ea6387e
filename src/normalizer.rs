//! Generators of the Euclidean normalizer of a space group: the isometries that map the group onto
//! itself, beyond the group's own operations.
//!
//! They come in two parts. The first is an inversion, found only for acentric groups whose mirror
//! image is the same group. The second is everything else: translations that aren't lattice
//! translations, and rotations of the lattice that permute the symmetry elements. Shifts along
//! the directions in which the origin can float freely form a continuous part of the normalizer
//! and are never reported.

use std::sync::OnceLock;

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;
use tracing::debug;

use crate::{
    frac,
    fract::{BaseInt, Frac},
    isometry::{det3, Isometry},
    matching::conjugating_shifts,
    seminvariant::{SeminvariantError, StructureSeminvariants},
    spacegroup::{SpaceGroup, SpaceGroupError, MAX_ORDER_Z},
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NormalizerError {
    #[error(transparent)]
    Seminvariant(#[from] SeminvariantError),
    #[error(transparent)]
    SpaceGroup(#[from] SpaceGroupError),
    #[error("Normalizer has more than {max} operations modulo its continuous translations")]
    TooLarge { max: usize },
}

/// Integer matrices with entries in {-1, 0, 1} and determinant +1 or -1, identity first.
fn unimodular_candidates() -> &'static [Matrix3<BaseInt>] {
    static CANDIDATES: OnceLock<Vec<Matrix3<BaseInt>>> = OnceLock::new();
    CANDIDATES.get_or_init(|| {
        let mut candidates = vec![Matrix3::identity()];
        for code in 0..3_i32.pow(9) {
            let mut digits = code;
            let m = Matrix3::from_fn(|_, _| {
                let d = digits % 3 - 1;
                digits /= 3;
                d
            });
            if det3(&m).abs() == 1 && m != Matrix3::identity() {
                candidates.push(m);
            }
        }
        candidates
    })
}

/// A metric tensor with the full symmetry of the group's point group and no more: the average of
/// an arbitrary metric over the rotations.
fn generic_metric(group: &SpaceGroup) -> Matrix3<i64> {
    let seed = Matrix3::new(97, 11, 13, 11, 101, 17, 13, 17, 103);
    group
        .rotations()
        .iter()
        .map(|r| {
            let r = r.map(i64::from);
            r.transpose() * seed * r
        })
        .fold(Matrix3::zeros(), |acc, m| acc + m)
}

/// A group of isometries modulo the lattice translations and the continuous origin shifts of
/// the group being normalized.
struct ShiftQuotient<'a> {
    ops: Vec<Isometry>,
    seminvariants: &'a StructureSeminvariants,
}

impl<'a> ShiftQuotient<'a> {
    fn new(seminvariants: &'a StructureSeminvariants) -> Self {
        Self {
            ops: vec![],
            seminvariants,
        }
    }

    fn contains(&self, op: &Isometry) -> bool {
        self.ops.iter().any(|n| {
            n.rot() == op.rot() && self.seminvariants.is_trivial_shift(&(op.tau() - n.tau()))
        })
    }

    /// Adds an operation and everything it generates with the ones already present.
    fn insert(&mut self, op: Isometry) -> Result<(), NormalizerError> {
        let mut pending = vec![op.modulo_unit_cell()];
        while let Some(x) = pending.pop() {
            if self.contains(&x) {
                continue;
            }
            for y in &self.ops {
                pending.push((x * *y).modulo_unit_cell());
                pending.push((*y * x).modulo_unit_cell());
            }
            pending.push((x * x).modulo_unit_cell());
            self.ops.push(x);
            if self.ops.len() > MAX_ORDER_Z {
                return Err(NormalizerError::TooLarge { max: MAX_ORDER_Z });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EuclideanNormalizer {
    k2l: Option<Isometry>,
    l2n: Vec<Isometry>,
}

impl EuclideanNormalizer {
    /// Finds the additional generators by searching matrices with entries in {-1, 0, 1} and
    /// origin shifts on the 1/24 grid.
    pub fn new(group: &SpaceGroup) -> Result<Self, NormalizerError> {
        let seminvariants = StructureSeminvariants::new(group)?;
        let gens = group.generators();

        let minus_one = -Matrix3::<BaseInt>::identity();
        let k2l = if group.is_centric() {
            None
        } else {
            conjugating_shifts(group, &gens, group, &minus_one)
                .and_then(|mut shifts| shifts.next())
                .map(|tau| Isometry::from_int_rot(minus_one, tau))
        };

        let mut normalizer = ShiftQuotient::new(&seminvariants);
        for op in group.smx().iter().chain(k2l.iter()) {
            normalizer.insert(*op)?;
        }

        let metric = generic_metric(group);
        let mut l2n = vec![];
        for p in unimodular_candidates() {
            let p_wide = p.map(i64::from);
            if p_wide.transpose() * metric * p_wide != metric {
                continue;
            }
            let Some(shifts) = conjugating_shifts(group, &gens, group, p) else {
                continue;
            };
            for shift in shifts {
                let op = Isometry::from_int_rot(*p, shift);
                if !normalizer.contains(&op) {
                    normalizer.insert(op)?;
                    l2n.push(op);
                }
            }
        }

        debug!(
            k2l = k2l.is_some(),
            n_l2n = l2n.len(),
            n_ops = normalizer.ops.len(),
            "found Euclidean normalizer generators"
        );
        Ok(Self { k2l, l2n })
    }

    /// The inversion that maps an acentric group onto itself, if there is one.
    pub fn k2l_generator(&self) -> Option<&Isometry> {
        self.k2l.as_ref()
    }

    /// Where the inversion of [`Self::k2l_generator`] sits: half its translation.
    pub fn inversion_centre(&self) -> Option<Vector3<Frac>> {
        self.k2l.map(|op| op.tau().map(|x| x * frac!(1 / 2)))
    }

    /// The remaining generators, translations first.
    pub fn l2n_generators(&self) -> &[Isometry] {
        &self.l2n
    }

    pub fn n_generators(&self) -> usize {
        usize::from(self.k2l.is_some()) + self.l2n.len()
    }

    pub fn generators(&self) -> impl Iterator<Item = &Isometry> {
        self.k2l.iter().chain(self.l2n.iter())
    }

    /// The group together with every generator, as a space group. The continuous shifts are left
    /// out, so this is a discrete subgroup of the full normalizer.
    pub fn expanded_group(&self, group: &SpaceGroup) -> Result<SpaceGroup, SpaceGroupError> {
        let mut expanded = group.clone();
        for op in self.generators() {
            expanded.expand_smx(*op)?;
        }
        Ok(expanded)
    }
}
