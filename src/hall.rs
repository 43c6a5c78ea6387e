//! Hall symbol notation: parsing results, generators, and display. Follows the notation described [at
//! cci.lbl.gov](https://cci.lbl.gov/sginfo/hall_symbols.html).

use std::{fmt::Display, str::FromStr};

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::{
    frac,
    fract::{BaseInt, Frac},
    isometry::Isometry,
    lattice::CentringType,
    parsing::{hall_group, parse_complete, ParseError},
    spacegroup::{SpaceGroup, SpaceGroupError},
};

/// A Hall symbol description of a space group.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct HallGroupSymbol {
    /// Whether an inversion through the origin exists. Represented as a minus sign.
    pub has_inversion: bool,
    /// The centering type. More general than the Bravais centering types.
    pub centering: CentringType,
    /// The non-translational generators.
    pub generators: Vec<HallOpSymbol>,
    /// The origin shift or change of basis in parentheses at the end, if any.
    pub shift: HallOriginShift,
}

/// The parenthesized suffix of a Hall symbol.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub enum HallOriginShift {
    /// An origin shift `(a b c)`, in twelfths of the cell edges.
    Twelfths(i8, i8, i8),
    /// A general change of basis `(x+1/4,y,z)`. The group generated by the rest of the symbol is
    /// conjugated by it, so the rotation part may change the cell too.
    ChangeOfBasis(Isometry),
}

impl Default for HallOriginShift {
    fn default() -> Self {
        Self::Twelfths(0, 0, 0)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum HallError {
    #[error("Invalid Hall symbol: {0}")]
    Parse(#[from] ParseError),
    #[error("Generator {0} of the Hall symbol needs an explicit axis")]
    MissingAxis(usize),
    #[error("Generator {0} of the Hall symbol has no rotation about that axis")]
    InvalidAxis(usize),
    #[error("Hall symbol does not describe a space group: {0}")]
    Group(#[from] SpaceGroupError),
}

impl FromStr for HallGroupSymbol {
    type Err = HallError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(parse_complete(s, hall_group)?)
    }
}

impl HallGroupSymbol {
    /// The origin shift as a vector. Zero when the symbol ends in a general change of basis, which
    /// [`HallGroupSymbol::space_group`] applies instead.
    pub fn shift_vector(&self) -> Vector3<Frac> {
        let HallOriginShift::Twelfths(a, b, c) = self.shift else {
            return Vector3::zeros();
        };
        Vector3::new(
            frac!(a as BaseInt) / frac!(12),
            frac!(b as BaseInt) / frac!(12),
            frac!(c as BaseInt) / frac!(12),
        )
    }

    /// The generating operations written out in the symbol, with the inversion (if present) last
    /// and the origin shift applied. Centring translations are not included.
    pub fn generators(&self) -> Result<Vec<Isometry>, HallError> {
        let mut ops = vec![];

        let mut prev: Option<(u8, HallAxisSymbol)> = None;
        for (i, op) in self.generators.iter().enumerate() {
            let curr_n = op.rotation.order;
            let axis = match (op.axis, i, prev) {
                (Some(ax), _, _) => Some(ax),
                // 1 or -1 doesn't need an axis
                _ if curr_n == 1 => Some(HallAxisSymbol::Z),
                (None, 0, _) => Some(HallAxisSymbol::Z),
                // second rotation is a or a - b depending on previous n for N = 2
                (None, 1, Some((2 | 4, _))) if curr_n == 2 => Some(HallAxisSymbol::X),
                (None, 1, Some((3 | 6, _))) if curr_n == 2 => Some(HallAxisSymbol::Prime),
                // third rotation is cubic diagonal if N = 3, otherwise must be explicit
                (None, 2, _) if curr_n == 3 => Some(HallAxisSymbol::Star),
                _ => None,
            }
            .ok_or(HallError::MissingAxis(i))?;

            // face diagonals are perpendicular to the preceding axis, or c after a body diagonal
            let reference = match prev {
                Some((_, ax @ (HallAxisSymbol::X | HallAxisSymbol::Y))) => ax,
                _ => HallAxisSymbol::Z,
            };

            ops.push(op.op(axis, reference).ok_or(HallError::InvalidAxis(i))?);
            if curr_n != 1 {
                let effective = match axis {
                    HallAxisSymbol::Prime | HallAxisSymbol::DoublePrime => reference,
                    other => other,
                };
                prev = Some((curr_n, effective));
            }
        }

        if self.has_inversion {
            ops.push(Isometry::inversion());
        }

        // shifting the origin by V: (R, t) becomes (R, t + (I - R) V)
        let v = self.shift_vector();
        Ok(ops
            .into_iter()
            .map(|op| op.translated(&(v - op.rot() * v)))
            .collect())
    }

    /// Generates the group from the Hall symbol.
    pub fn space_group(&self) -> Result<SpaceGroup, HallError> {
        let mut group = SpaceGroup::new();
        group.expand_conventional_centring_type(self.centering)?;
        for op in self.generators()? {
            group.expand_smx(op)?;
        }
        match self.shift {
            HallOriginShift::ChangeOfBasis(cb) => Ok(group.change_basis(&cb)?),
            HallOriginShift::Twelfths(..) => Ok(group),
        }
    }
}

impl Display for HallGroupSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.has_inversion {
            write!(f, "-")?;
        }
        write!(f, "{}", self.centering.letter())?;
        for gen in &self.generators {
            write!(f, " {}", gen)?;
        }
        match self.shift {
            HallOriginShift::Twelfths(0, 0, 0) => {}
            HallOriginShift::Twelfths(a, b, c) => write!(f, " ({} {} {})", a, b, c)?,
            HallOriginShift::ChangeOfBasis(cb) => write!(f, " ({})", cb)?,
        }
        Ok(())
    }
}

/// A rotation or rotoinversion with an optional screw. Screw rotoinversions are never used in Hall
/// symbols.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub struct HallRotation {
    /// 1, 2, 3, 4, or 6.
    pub order: u8,
    /// Whether this is a rotoinversion.
    pub improper: bool,
    /// The screw component, as a multiple of `1/order`.
    pub screw: u8,
}

impl HallRotation {
    pub fn new(order: u8, improper: bool, screw: u8) -> Self {
        Self {
            order,
            improper,
            screw,
        }
    }
}

/// A Hall symbol for a symmetry operation.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct HallOpSymbol {
    /// The rotation component.
    pub rotation: HallRotation,
    /// An axis specification, if required.
    pub axis: Option<HallAxisSymbol>,
    /// The translation part of the symmetry operation.
    pub translation: Vec<HallTranslationSymbol>,
}

/// Proper rotation matrices about the principal axes, from Table 3 of the Hall symbol notes.
fn principal_rotation(order: u8, axis: HallAxisSymbol) -> Option<Matrix3<BaseInt>> {
    use HallAxisSymbol::*;
    Some(match (order, axis) {
        (1, _) => Matrix3::identity(),
        (2, X) => Matrix3::new(1, 0, 0, 0, -1, 0, 0, 0, -1),
        (2, Y) => Matrix3::new(-1, 0, 0, 0, 1, 0, 0, 0, -1),
        (2, Z) => Matrix3::new(-1, 0, 0, 0, -1, 0, 0, 0, 1),
        (3, X) => Matrix3::new(1, 0, 0, 0, 0, -1, 0, 1, -1),
        (3, Y) => Matrix3::new(-1, 0, 1, 0, 1, 0, -1, 0, 0),
        (3, Z) => Matrix3::new(0, -1, 0, 1, -1, 0, 0, 0, 1),
        (4, X) => Matrix3::new(1, 0, 0, 0, 0, -1, 0, 1, 0),
        (4, Y) => Matrix3::new(0, 0, 1, 0, 1, 0, -1, 0, 0),
        (4, Z) => Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1),
        (6, X) => Matrix3::new(1, 0, 0, 0, 1, -1, 0, 1, 0),
        (6, Y) => Matrix3::new(0, 0, 1, 0, 1, 0, -1, 0, 1),
        (6, Z) => Matrix3::new(1, -1, 0, 1, 0, 0, 0, 0, 1),
        (3, Star) => Matrix3::new(0, 0, 1, 1, 0, 0, 0, 1, 0),
        _ => return None,
    })
}

/// Two-fold rotations about face diagonals perpendicular to `reference`, with their axes.
fn diagonal_rotation(
    axis: HallAxisSymbol,
    reference: HallAxisSymbol,
) -> Option<(Matrix3<BaseInt>, Vector3<BaseInt>)> {
    use HallAxisSymbol::*;
    Some(match (axis, reference) {
        (Prime, Z) => (Matrix3::new(0, -1, 0, -1, 0, 0, 0, 0, -1), Vector3::new(1, -1, 0)),
        (DoublePrime, Z) => (Matrix3::new(0, 1, 0, 1, 0, 0, 0, 0, -1), Vector3::new(1, 1, 0)),
        (Prime, X) => (Matrix3::new(-1, 0, 0, 0, 0, -1, 0, -1, 0), Vector3::new(0, 1, -1)),
        (DoublePrime, X) => (Matrix3::new(-1, 0, 0, 0, 0, 1, 0, 1, 0), Vector3::new(0, 1, 1)),
        (Prime, Y) => (Matrix3::new(0, 0, -1, 0, -1, 0, -1, 0, 0), Vector3::new(-1, 0, 1)),
        (DoublePrime, Y) => (Matrix3::new(0, 0, 1, 0, -1, 0, 1, 0, 0), Vector3::new(1, 0, 1)),
        _ => return None,
    })
}

impl HallOpSymbol {
    /// The operation this symbol describes, given its (possibly default) axis and the axis face
    /// diagonals are measured against. Returns `None` if there is no such rotation.
    pub fn op(&self, axis: HallAxisSymbol, reference: HallAxisSymbol) -> Option<Isometry> {
        let HallRotation {
            order,
            improper,
            screw,
        } = self.rotation;

        let (rot, dir) = match axis {
            HallAxisSymbol::Prime | HallAxisSymbol::DoublePrime if order == 2 => {
                diagonal_rotation(axis, reference)?
            }
            HallAxisSymbol::Prime | HallAxisSymbol::DoublePrime => return None,
            _ => (principal_rotation(order, axis)?, axis.direction()),
        };

        let rot = if improper { -rot } else { rot };

        let screw_tau = dir.map(|x| frac!(x) * frac!(screw as BaseInt) / frac!(order as BaseInt));
        let tau = self
            .translation
            .iter()
            .map(|t| t.vector())
            .fold(screw_tau, |acc, t| acc + t);

        Some(Isometry::from_int_rot(rot, tau))
    }
}

impl Display for HallOpSymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let r = self.rotation;
        if r.improper {
            write!(f, "-")?;
        }
        write!(f, "{}", r.order)?;
        if r.screw != 0 {
            write!(f, "{}", r.screw)?;
        }
        if let Some(ax) = self.axis {
            write!(f, "{}", ax.letter())?;
        }
        for tau in &self.translation {
            write!(f, "{}", tau.letter())?;
        }
        Ok(())
    }
}

/// An axis specification for a symmetry operation.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum HallAxisSymbol {
    X,
    Y,
    Z,
    /// Face diagonal `a - b` (for a preceding `c` axis), and cyclically for other axes.
    Prime,
    /// Face diagonal `a + b`, and cyclically for other axes.
    DoublePrime,
    /// Body diagonal `a + b + c`.
    Star,
}

impl HallAxisSymbol {
    /// Gets the letter for the symbol.
    pub fn letter(&self) -> char {
        match *self {
            HallAxisSymbol::X => 'x',
            HallAxisSymbol::Y => 'y',
            HallAxisSymbol::Z => 'z',
            HallAxisSymbol::Prime => '\'',
            HallAxisSymbol::DoublePrime => '"',
            HallAxisSymbol::Star => '*',
        }
    }

    /// Direction of a principal axis or the body diagonal.
    fn direction(&self) -> Vector3<BaseInt> {
        match *self {
            HallAxisSymbol::X => Vector3::x(),
            HallAxisSymbol::Y => Vector3::y(),
            HallAxisSymbol::Star => Vector3::new(1, 1, 1),
            _ => Vector3::z(),
        }
    }
}

/// A Hall symbol for a translation.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq)]
pub enum HallTranslationSymbol {
    A,
    B,
    C,
    N,
    U,
    V,
    W,
    D,
}

impl HallTranslationSymbol {
    /// Gets the letter for the symbol.
    pub fn letter(&self) -> char {
        match self {
            HallTranslationSymbol::A => 'a',
            HallTranslationSymbol::B => 'b',
            HallTranslationSymbol::C => 'c',
            HallTranslationSymbol::N => 'n',
            HallTranslationSymbol::U => 'u',
            HallTranslationSymbol::V => 'v',
            HallTranslationSymbol::W => 'w',
            HallTranslationSymbol::D => 'd',
        }
    }

    /// Gets the translation vector.
    pub fn vector(&self) -> Vector3<Frac> {
        let f0 = frac!(0);
        let f14 = frac!(1 / 4);
        let f12 = frac!(1 / 2);
        match *self {
            HallTranslationSymbol::A => Vector3::new(f12, f0, f0),
            HallTranslationSymbol::B => Vector3::new(f0, f12, f0),
            HallTranslationSymbol::C => Vector3::new(f0, f0, f12),
            HallTranslationSymbol::N => Vector3::new(f12, f12, f12),
            HallTranslationSymbol::U => Vector3::new(f14, f0, f0),
            HallTranslationSymbol::V => Vector3::new(f0, f14, f0),
            HallTranslationSymbol::W => Vector3::new(f0, f0, f14),
            HallTranslationSymbol::D => Vector3::new(f14, f14, f14),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn gens(hall: &str) -> Vec<String> {
        hall.parse::<HallGroupSymbol>()
            .unwrap()
            .generators()
            .unwrap()
            .iter()
            .map(|g| g.to_string())
            .collect()
    }

    #[test]
    fn test_generators() {
        assert_eq!(gens("P 2ac 2ab"), vec!["-x+1/2,-y,z+1/2", "x+1/2,-y+1/2,-z"]);
        assert_eq!(gens("P 3* 2"), vec!["z,x,y", "-y,-x,-z"]);
        assert_eq!(gens("P 61 2 (0 0 -1)")[0], "x-y,x,z+1/6");
        assert_eq!(gens("-P 1"), vec!["x,y,z", "-x,-y,-z"]);
        assert_eq!(gens("P 4 2"), vec!["-y,x,z", "x,-y,-z"]);
        assert_eq!(gens("P 3 2\""), vec!["-y,x-y,z", "y,x,-z"]);
        assert_eq!(gens("P 3 2"), vec!["-y,x-y,z", "-y,-x,-z"]);
        assert_eq!(gens("P 2x 2\""), vec!["x,-y,-z", "-x,z,y"]);
    }

    #[test]
    fn test_origin_shift() {
        // P 31 2c (0 0 1): the 2-fold moves from z = 1/4 to z = 1/4 + 1/12
        let g = gens("P 31 2c (0 0 1)");
        assert_eq!(g[0], "-y,x-y,z+1/3");
        assert_eq!(g[1], "-y,-x,-z+2/3");
    }

    #[test]
    fn test_change_of_basis_suffix() {
        // a translation written as a triplet is the same as the shift in twelfths
        let twelfths = "P 31 2c (0 0 1)".parse::<HallGroupSymbol>().unwrap();
        let triplet = "P 31 2c (x,y,z+1/12)".parse::<HallGroupSymbol>().unwrap();
        assert!(twelfths
            .space_group()
            .unwrap()
            .same_operations(&triplet.space_group().unwrap()));

        // P 4 rewritten on a C-centred cell with axes along the face diagonals
        let centred = "P 4 (1/2*x+1/2*y,-1/2*x+1/2*y,z)"
            .parse::<HallGroupSymbol>()
            .unwrap()
            .space_group()
            .unwrap();
        assert_eq!(centred.centring_type(), Some(CentringType::C));
        assert_eq!(centred.order_z(), 8);
        let c4 = "C 4".parse::<HallGroupSymbol>().unwrap();
        assert!(centred.same_operations(&c4.space_group().unwrap()));

        // the other direction would need a cell smaller than the lattice allows
        let shrunk = "P 4 (x-y,x+y,z)".parse::<HallGroupSymbol>().unwrap();
        assert!(matches!(
            shrunk.space_group(),
            Err(HallError::Group(SpaceGroupError::NotACell(_)))
        ));
    }

    #[test]
    fn test_missing_axis() {
        let hall: HallGroupSymbol = "P 2 4".parse().unwrap();
        assert_eq!(hall.generators(), Err(HallError::MissingAxis(1)));
    }

    #[test]
    fn test_group_orders() {
        for (hall, order) in [
            ("P 1", 1),
            ("-P 1", 2),
            ("P 2y", 2),
            ("C 2y", 4),
            ("P 2 2", 4),
            ("-P 4 2", 16),
            ("P 6c 2c", 12),
            ("-F 4 2 3", 192),
            ("-I 4bd 2c 3", 96),
            ("R 3", 9),
            ("P 3*", 3),
            ("-R 3 2\"c", 36),
        ] {
            let group = hall.parse::<HallGroupSymbol>().unwrap().space_group().unwrap();
            assert_eq!(group.order_z(), order, "{}", hall);
        }
    }
}
