//! The 32 crystallographic point groups, used to label site symmetries.

use std::fmt::Display;

use nalgebra::Matrix3;

use crate::{fract::BaseInt, symmop::rotation_type};

/// The rotation types, in the order used by [`PointGroup::type_counts`].
const TYPE_ORDER: [i8; 10] = [1, 2, 3, 4, 6, -1, -2, -3, -4, -6];

/// The 32 crystallographic point groups, named with Schoenflies symbols.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointGroup {
    C1,
    Ci,
    C2,
    Cs,
    C2h,
    D2,
    C2v,
    D2h,
    C4,
    S4,
    C4h,
    D4,
    C4v,
    D2d,
    D4h,
    C3,
    C3i,
    D3,
    C3v,
    D3d,
    C6,
    C3h,
    C6h,
    D6,
    C6v,
    D3h,
    D6h,
    T,
    Th,
    O,
    Td,
    Oh,
}

impl PointGroup {
    pub const ALL: [Self; 32] = [
        Self::C1,
        Self::Ci,
        Self::C2,
        Self::Cs,
        Self::C2h,
        Self::D2,
        Self::C2v,
        Self::D2h,
        Self::C4,
        Self::S4,
        Self::C4h,
        Self::D4,
        Self::C4v,
        Self::D2d,
        Self::D4h,
        Self::C3,
        Self::C3i,
        Self::D3,
        Self::C3v,
        Self::D3d,
        Self::C6,
        Self::C3h,
        Self::C6h,
        Self::D6,
        Self::C6v,
        Self::D3h,
        Self::D6h,
        Self::T,
        Self::Th,
        Self::O,
        Self::Td,
        Self::Oh,
    ];

    /// The number of operations of each rotation type, in the order 1, 2, 3, 4, 6, -1, -2, -3, -4,
    /// -6. No two point groups share the same counts.
    pub fn type_counts(&self) -> [u8; 10] {
        match self {
            Self::C1 => [1, 0, 0, 0, 0, 0, 0, 0, 0, 0],
            Self::Ci => [1, 0, 0, 0, 0, 1, 0, 0, 0, 0],
            Self::C2 => [1, 1, 0, 0, 0, 0, 0, 0, 0, 0],
            Self::Cs => [1, 0, 0, 0, 0, 0, 1, 0, 0, 0],
            Self::C2h => [1, 1, 0, 0, 0, 1, 1, 0, 0, 0],
            Self::D2 => [1, 3, 0, 0, 0, 0, 0, 0, 0, 0],
            Self::C2v => [1, 1, 0, 0, 0, 0, 2, 0, 0, 0],
            Self::D2h => [1, 3, 0, 0, 0, 1, 3, 0, 0, 0],
            Self::C4 => [1, 1, 0, 2, 0, 0, 0, 0, 0, 0],
            Self::S4 => [1, 1, 0, 0, 0, 0, 0, 0, 2, 0],
            Self::C4h => [1, 1, 0, 2, 0, 1, 1, 0, 2, 0],
            Self::D4 => [1, 5, 0, 2, 0, 0, 0, 0, 0, 0],
            Self::C4v => [1, 1, 0, 2, 0, 0, 4, 0, 0, 0],
            Self::D2d => [1, 3, 0, 0, 0, 0, 2, 0, 2, 0],
            Self::D4h => [1, 5, 0, 2, 0, 1, 5, 0, 2, 0],
            Self::C3 => [1, 0, 2, 0, 0, 0, 0, 0, 0, 0],
            Self::C3i => [1, 0, 2, 0, 0, 1, 0, 2, 0, 0],
            Self::D3 => [1, 3, 2, 0, 0, 0, 0, 0, 0, 0],
            Self::C3v => [1, 0, 2, 0, 0, 0, 3, 0, 0, 0],
            Self::D3d => [1, 3, 2, 0, 0, 1, 3, 2, 0, 0],
            Self::C6 => [1, 1, 2, 0, 2, 0, 0, 0, 0, 0],
            Self::C3h => [1, 0, 2, 0, 0, 0, 1, 0, 0, 2],
            Self::C6h => [1, 1, 2, 0, 2, 1, 1, 2, 0, 2],
            Self::D6 => [1, 7, 2, 0, 2, 0, 0, 0, 0, 0],
            Self::C6v => [1, 1, 2, 0, 2, 0, 6, 0, 0, 0],
            Self::D3h => [1, 3, 2, 0, 0, 0, 4, 0, 0, 2],
            Self::D6h => [1, 7, 2, 0, 2, 1, 7, 2, 0, 2],
            Self::T => [1, 3, 8, 0, 0, 0, 0, 0, 0, 0],
            Self::Th => [1, 3, 8, 0, 0, 1, 3, 8, 0, 0],
            Self::O => [1, 9, 8, 6, 0, 0, 0, 0, 0, 0],
            Self::Td => [1, 3, 8, 0, 0, 0, 6, 0, 6, 0],
            Self::Oh => [1, 9, 8, 6, 0, 1, 9, 8, 6, 0],
        }
    }

    /// Identifies a point group from the rotation types of its elements.
    pub fn from_rotation_types(types: &[i8]) -> Option<Self> {
        let mut counts = [0u8; 10];
        for t in types {
            let i = TYPE_ORDER.iter().position(|x| x == t)?;
            counts[i] = counts[i].checked_add(1)?;
        }
        Self::ALL.into_iter().find(|pg| pg.type_counts() == counts)
    }

    /// Identifies the point group formed by the given rotation matrices.
    pub fn from_rotations(rots: &[Matrix3<BaseInt>]) -> Option<Self> {
        let types: Option<Vec<i8>> = rots.iter().map(rotation_type).collect();
        Self::from_rotation_types(&types?)
    }

    /// The short Hermann-Mauguin symbol.
    pub fn hm_symbol(&self) -> &'static str {
        match self {
            Self::C1 => "1",
            Self::Ci => "-1",
            Self::C2 => "2",
            Self::Cs => "m",
            Self::C2h => "2/m",
            Self::D2 => "222",
            Self::C2v => "mm2",
            Self::D2h => "mmm",
            Self::C4 => "4",
            Self::S4 => "-4",
            Self::C4h => "4/m",
            Self::D4 => "422",
            Self::C4v => "4mm",
            Self::D2d => "-42m",
            Self::D4h => "4/mmm",
            Self::C3 => "3",
            Self::C3i => "-3",
            Self::D3 => "32",
            Self::C3v => "3m",
            Self::D3d => "-3m",
            Self::C6 => "6",
            Self::C3h => "-6",
            Self::C6h => "6/m",
            Self::D6 => "622",
            Self::C6v => "6mm",
            Self::D3h => "-6m2",
            Self::D6h => "6/mmm",
            Self::T => "23",
            Self::Th => "m-3",
            Self::O => "432",
            Self::Td => "-43m",
            Self::Oh => "m-3m",
        }
    }
}

impl Display for PointGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hm_symbol())
    }
}
