//! A space group as a finite set of operations modulo lattice translations. The group is stored as
//! a list of lattice translations inside the unit cell (the integer translations plus any centring
//! translations) and one representative operation per rotation part. Every operation of the full
//! group is then a representative followed by a lattice translation and an integer translation.
//!
//! Groups are built by accumulating generators: each call to [`SpaceGroup::expand_smx`] or
//! [`SpaceGroup::expand_ltr`] adds the new operation and closes the set under composition again.

use nalgebra::{Matrix3, Vector3};
use num_traits::Zero;
use thiserror::Error;
use tracing::trace;

use crate::{
    fract::{BaseInt, Frac},
    isometry::{Isometry, IsometryError},
    lattice::{CentringType, PrimitiveBasis},
    symmop::{rotation_type, RotationInfo},
};

/// The largest number of rotation parts in a crystallographic space group.
pub const MAX_SMX: usize = 48;

/// The bound on the total number of operations in the unit cell. Closure past this is treated as
/// malformed input.
pub const MAX_ORDER_Z: usize = 9999;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SpaceGroupError {
    #[error("Group closure exceeded {max} operations: the generators do not form a space group")]
    TooManyOperations { max: usize },
    #[error("{0} is not a crystallographic symmetry operation")]
    NotCrystallographic(Isometry),
    #[error("Invalid LATT number {0}: must be between -7 and 7 and nonzero")]
    InvalidLatt(i32),
    #[error("{0}")]
    Isometry(#[from] IsometryError),
    #[error("{0} does not map the lattice onto a cell of it")]
    NotACell(Isometry),
}

/// A space group in a specific setting, closed under composition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceGroup {
    /// Lattice translations reduced into the unit cell. The zero vector is always first.
    ltr: Vec<Vector3<Frac>>,
    /// One operation per rotation part, with the translation reduced to a canonical representative
    /// modulo the lattice. The identity is always first.
    smx: Vec<Isometry>,
}

impl Default for SpaceGroup {
    fn default() -> Self {
        Self::new()
    }
}

fn modulo_one(v: &Vector3<Frac>) -> Vector3<Frac> {
    v.map(|x| x.modulo_one())
}

fn tuple_key(v: &Vector3<Frac>) -> (Frac, Frac, Frac) {
    (v.x, v.y, v.z)
}

impl SpaceGroup {
    /// The group P 1: only the identity and the integer translations.
    pub fn new() -> Self {
        Self {
            ltr: vec![Vector3::zeros()],
            smx: vec![Isometry::identity()],
        }
    }

    /// Builds a group from a list of generators.
    pub fn from_generators<'a>(
        ops: impl IntoIterator<Item = &'a Isometry>,
    ) -> Result<Self, SpaceGroupError> {
        let mut group = Self::new();
        for op in ops {
            group.expand_smx(*op)?;
        }
        Ok(group)
    }

    /// The number of representative operations, one per rotation part.
    pub fn n_smx(&self) -> usize {
        self.smx.len()
    }

    /// The number of lattice translations in the unit cell, including the zero translation.
    pub fn n_ltr(&self) -> usize {
        self.ltr.len()
    }

    /// The number of operations that map the unit cell onto itself: `n_smx * n_ltr`.
    pub fn order_z(&self) -> usize {
        self.n_smx() * self.n_ltr()
    }

    /// The lattice translations, zero first.
    pub fn ltr(&self) -> &[Vector3<Frac>] {
        &self.ltr
    }

    /// The representative operations, identity first.
    pub fn smx(&self) -> &[Isometry] {
        &self.smx
    }

    /// A few representatives that generate the group together with its lattice translations. Each
    /// one is the first representative not generated by the ones before it.
    pub fn generators(&self) -> Vec<Isometry> {
        let mut gens = vec![];
        let mut sub = Self {
            ltr: self.ltr.clone(),
            smx: vec![Isometry::identity()],
        };
        for op in self.smx.iter().skip(1) {
            if sub.contains(op) {
                continue;
            }
            if sub.expand_smx(*op).is_err() {
                return self.smx.iter().skip(1).copied().collect();
            }
            gens.push(*op);
        }
        gens
    }

    /// The integer rotation parts of the representatives. These make up the point group.
    pub fn rotations(&self) -> Vec<Matrix3<BaseInt>> {
        self.smx.iter().filter_map(Isometry::rot_int).collect()
    }

    /// Every operation in the unit cell: each representative combined with each lattice
    /// translation, with translations reduced modulo 1.
    pub fn all_ops(&self) -> Vec<Isometry> {
        self.ltr
            .iter()
            .flat_map(|t| {
                self.smx
                    .iter()
                    .map(move |op| op.translated(t).modulo_unit_cell())
            })
            .collect()
    }

    /// The inversion operation, if the group contains one.
    pub fn inversion(&self) -> Option<&Isometry> {
        self.smx
            .iter()
            .find(|op| op.rot() == -Matrix3::<Frac>::identity())
    }

    /// Whether the group contains an inversion center.
    pub fn is_centric(&self) -> bool {
        self.inversion().is_some()
    }

    /// The translation part of the inversion, if there is one: the inversion center lies at half
    /// this vector.
    pub fn inv_t(&self) -> Option<Vector3<Frac>> {
        self.inversion().map(Isometry::tau)
    }

    /// Whether the inversion center, if there is one, sits on the origin.
    pub fn is_origin_centric(&self) -> bool {
        self.inv_t().is_some_and(|t| t.is_zero())
    }

    /// Whether every operation is proper. Chiral groups have no mirrors, glides, inversions, or
    /// rotoinversions.
    pub fn is_chiral(&self) -> bool {
        self.smx.iter().all(|op| op.det() == Some(1))
    }

    /// The centring type, if the lattice translations are one of the standard sets.
    pub fn centring_type(&self) -> Option<CentringType> {
        CentringType::from_translations(&self.ltr)
    }

    /// Rotation types of the representatives, sorted. Two groups of the same type always have the
    /// same multiset.
    pub fn rotation_types(&self) -> Vec<i8> {
        let mut types: Vec<i8> = self
            .rotations()
            .iter()
            .filter_map(rotation_type)
            .collect();
        types.sort_unstable();
        types
    }

    /// The translation part an operation would have if it were reduced in this group: the smallest
    /// of its images under the lattice translations.
    pub fn canonical_tau(&self, tau: &Vector3<Frac>) -> Vector3<Frac> {
        self.ltr
            .iter()
            .map(|l| modulo_one(&(tau + l)))
            .min_by_key(tuple_key)
            .unwrap_or_else(|| modulo_one(tau))
    }

    /// Reduces an operation to its canonical form modulo the lattice.
    pub fn residue(&self, op: &Isometry) -> Isometry {
        op.with_tau(self.canonical_tau(&op.tau()))
    }

    /// Whether the operation is in the group, up to lattice translations.
    pub fn contains(&self, op: &Isometry) -> bool {
        let op = self.residue(op);
        self.smx.contains(&op)
    }

    /// Whether the translation is one of the lattice translations of the group.
    pub fn contains_ltr(&self, t: &Vector3<Frac>) -> bool {
        self.ltr.contains(&modulo_one(t))
    }

    /// Whether two groups contain exactly the same operations, regardless of the order in which
    /// they were generated.
    pub fn same_operations(&self, other: &Self) -> bool {
        self.n_smx() == other.n_smx()
            && self.n_ltr() == other.n_ltr()
            && self.ltr.iter().all(|t| other.contains_ltr(t))
            && self.smx.iter().all(|op| other.contains(op))
    }

    fn check_bounds(&self) -> Result<(), SpaceGroupError> {
        if self.n_smx() > MAX_SMX {
            Err(SpaceGroupError::TooManyOperations { max: MAX_SMX })
        } else if self.order_z() > MAX_ORDER_Z {
            Err(SpaceGroupError::TooManyOperations { max: MAX_ORDER_Z })
        } else {
            Ok(())
        }
    }

    /// Adds a translation and its multiples, without closing under the rotations. The existing
    /// translations form a group, so the result is a union of its cosets. Returns whether anything
    /// changed.
    fn add_ltr(&mut self, t: Vector3<Frac>) -> Result<bool, SpaceGroupError> {
        let t = modulo_one(&t);
        if self.ltr.contains(&t) {
            return Ok(false);
        }

        let base = self.ltr.clone();
        let mut shift = t;
        while !self.ltr.contains(&shift) {
            self.ltr
                .extend(base.iter().map(|l| modulo_one(&(l + shift))));
            self.check_bounds()?;
            shift = modulo_one(&(shift + t));
        }

        let reduced: Vec<Isometry> = self.smx.iter().map(|op| self.residue(op)).collect();
        self.smx = reduced;
        Ok(true)
    }

    /// Adds a single operation without closing. Returns whether anything changed.
    fn add_op(&mut self, op: Isometry) -> Result<bool, SpaceGroupError> {
        if op.is_pure_translation() {
            return self.add_ltr(op.tau());
        }

        let rot = op.rot();
        let op = self.residue(&op);
        match self.smx.iter().find(|s| s.rot() == rot) {
            Some(existing) => {
                let diff = op.tau() - existing.tau();
                self.add_ltr(diff)
            }
            None => {
                let w = op.try_rot_int()?;
                if rotation_type(&w).is_none() {
                    return Err(SpaceGroupError::NotCrystallographic(op));
                }
                self.smx.push(op);
                self.check_bounds()?;
                Ok(true)
            }
        }
    }

    /// Composes every pair of representatives and conjugates every lattice translation by every
    /// rotation until nothing new appears.
    fn close(&mut self) -> Result<(), SpaceGroupError> {
        loop {
            let mut grew = false;
            let ops = self.smx.clone();
            for a in &ops {
                for b in &ops {
                    grew |= self.add_op(*a * *b)?;
                }
                let ltr = self.ltr.clone();
                for t in &ltr {
                    grew |= self.add_ltr(a.rot() * t)?;
                }
            }
            if !grew {
                return Ok(());
            }
        }
    }

    /// Adds a symmetry operation and closes the group. Returns whether the group changed.
    pub fn expand_smx(&mut self, op: Isometry) -> Result<bool, SpaceGroupError> {
        let w = op.try_rot_int()?;
        if rotation_type(&w).is_none() {
            return Err(SpaceGroupError::NotCrystallographic(op));
        }
        if !self.add_op(op)? {
            return Ok(false);
        }
        self.close()?;
        trace!(
            op = %op,
            n_smx = self.n_smx(),
            n_ltr = self.n_ltr(),
            "expanded group"
        );
        Ok(true)
    }

    /// Adds a lattice translation and closes the group. Returns whether the group changed.
    pub fn expand_ltr(&mut self, t: Vector3<Frac>) -> Result<bool, SpaceGroupError> {
        if !self.add_ltr(t)? {
            return Ok(false);
        }
        self.close()?;
        Ok(true)
    }

    /// Adds the centring translations of a standard centring type.
    pub fn expand_conventional_centring_type(
        &mut self,
        centring: CentringType,
    ) -> Result<bool, SpaceGroupError> {
        let mut changed = false;
        for t in centring.translations() {
            changed |= self.expand_ltr(t)?;
        }
        Ok(changed)
    }

    /// Applies a SHELX `LATT n` card: the centring type of `|n|`, and an inversion through the
    /// origin if `n` is positive.
    pub fn expand_latt(&mut self, n: i32) -> Result<bool, SpaceGroupError> {
        let centring = CentringType::from_latt(n).ok_or(SpaceGroupError::InvalidLatt(n))?;
        let mut changed = self.expand_conventional_centring_type(centring)?;
        if n > 0 {
            changed |= self.expand_smx(Isometry::inversion())?;
        }
        Ok(changed)
    }

    /// The same group in a new coordinate system. `cb` maps old coordinates to new ones, so each
    /// operation `g` becomes `cb g cb^-1`. The rotation part of `cb` may be fractional, as between a
    /// centred cell and a primitive one: the old unit translations then become centring
    /// translations or vanish.
    pub fn change_basis(&self, cb: &Isometry) -> Result<Self, SpaceGroupError> {
        let cb_inv = cb.inv_affine()?;
        let unrepresentable = || IsometryError::Unrepresentable(cb.mat());
        let units = [Vector3::<Frac>::x(), Vector3::y(), Vector3::z()];
        for e in &units {
            let back = cb_inv.checked_rotate(e).ok_or_else(unrepresentable)?;
            if !self.contains_ltr(&back) {
                return Err(SpaceGroupError::NotACell(*cb));
            }
        }

        let mut group = Self::new();
        for t in self.ltr.iter().chain(units.iter()) {
            group.add_ltr(cb.checked_rotate(t).ok_or_else(unrepresentable)?)?;
        }
        for op in &self.smx {
            let conjugated = cb
                .checked_mul(op)
                .and_then(|g| g.checked_mul(&cb_inv))
                .ok_or_else(unrepresentable)?;
            group.add_op(conjugated)?;
        }
        group.close()?;
        Ok(group)
    }

    /// The same group in a primitive cell of its lattice, together with the change of basis from
    /// this setting to that one. The rotation part of the change of basis is an integer matrix
    /// with determinant `n_ltr`.
    pub fn primitive_setting(&self) -> Result<(Self, Isometry), SpaceGroupError> {
        let cb = PrimitiveBasis::new(&self.ltr).to_primitive_cb();
        Ok((self.change_basis(&cb)?, cb))
    }

    /// Classifies the rotation part of each representative.
    pub fn rotation_infos(&self) -> Vec<RotationInfo> {
        self.rotations()
            .iter()
            .filter_map(RotationInfo::new)
            .collect()
    }
}
