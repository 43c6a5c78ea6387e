//! Defines the symmetry operations in 3D space: a rotation part and a translation part acting on
//! fractional coordinates, kept together as an affine 4x4 matrix.

use std::{fmt::Display, ops::Mul, str::FromStr};

use nalgebra::{Matrix3, Matrix4, Translation3, Vector3};
use num_traits::Zero;
use thiserror::Error;

use crate::{
    frac,
    fract::{BaseInt, Frac, DENOM},
    lattice::{adjugate3_i64, det3_i64},
    parsing::{parse_complete, triplet, ParseError},
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum IsometryError {
    #[error("Matrix not affine: {0}")]
    NotHomogenous(Matrix4<Frac>),
    #[error("Rotation part is not an integer matrix: {0}")]
    NonIntegerRotation(Matrix3<Frac>),
    #[error("Rotation part has determinant {0}, not +1 or -1")]
    NotInvertible(BaseInt),
    #[error("Inverse of {0} is not representable with fractions")]
    Unrepresentable(Matrix4<Frac>),
}

/// A symmetry operation in 3D space represented generically.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
pub struct Isometry {
    /// The 4x4 affine matrix.
    m: Matrix4<Frac>,
}

impl Mul for Isometry {
    type Output = Self;

    /// `a * b` is "do `b`, then do `a`": `(Ra Rb, Ra tb + ta)`.
    fn mul(self, rhs: Isometry) -> Self::Output {
        Self { m: self.m * rhs.m }
    }
}

impl Isometry {
    /// Creates a new symmetry operation from rotation and translation components.
    pub fn new_rot_tau(rot: Matrix3<Frac>, tau: Vector3<Frac>) -> Self {
        Self {
            m: Translation3::new(tau.x, tau.y, tau.z).to_homogeneous() * rot.to_homogeneous(),
        }
    }

    /// Creates an operation from an integer rotation matrix and a translation.
    pub fn from_int_rot(rot: Matrix3<BaseInt>, tau: Vector3<Frac>) -> Self {
        Self::new_rot_tau(rot.map(|x| frac!(x)), tau)
    }

    /// A pure translation.
    pub fn translation(tau: Vector3<Frac>) -> Self {
        Self::new_rot_tau(Matrix3::identity(), tau)
    }

    /// Creates a new identity symmetry operation.
    pub fn identity() -> Self {
        Self::new_rot_tau(Matrix3::identity(), Vector3::zeros())
    }

    /// The inversion through the origin.
    pub fn inversion() -> Self {
        Self::new_rot_tau(-Matrix3::identity(), Vector3::zeros())
    }

    /// Returns the affine matrix representing this operation.
    pub fn mat(&self) -> Matrix4<Frac> {
        self.m
    }

    /// Returns the rotation matrix.
    pub fn rot(&self) -> Matrix3<Frac> {
        self.m.fixed_view::<3, 3>(0, 0).clone_owned()
    }

    /// Returns the translation vector.
    pub fn tau(&self) -> Vector3<Frac> {
        self.m.fixed_view::<3, 1>(0, 3).clone_owned()
    }

    /// The rotation part as integers, if every entry is whole.
    pub fn rot_int(&self) -> Option<Matrix3<BaseInt>> {
        let rot = self.rot();
        if rot.iter().all(Frac::is_integer) {
            Some(rot.map(|x| x.floor()))
        } else {
            None
        }
    }

    /// The integer rotation part, or an error describing why there isn't one.
    pub fn try_rot_int(&self) -> Result<Matrix3<BaseInt>, IsometryError> {
        self.rot_int()
            .ok_or_else(|| IsometryError::NonIntegerRotation(self.rot()))
    }

    /// Determinant of the rotation part. Only defined for integer rotations.
    pub fn det(&self) -> Option<BaseInt> {
        self.rot_int().map(|r| det3(&r))
    }

    /// Trace of the rotation part.
    pub fn trace(&self) -> Frac {
        self.rot().trace()
    }

    /// Whether the rotation part is the identity.
    pub fn is_pure_translation(&self) -> bool {
        self.rot() == Matrix3::identity()
    }

    /// Applies the operation to a point.
    pub fn apply(&self, pt: &Vector3<Frac>) -> Vector3<Frac> {
        self.rot() * pt + self.tau()
    }

    /// Returns the same rotation with a different translation.
    pub fn with_tau(&self, tau: Vector3<Frac>) -> Self {
        Self::new_rot_tau(self.rot(), tau)
    }

    /// Reduces the translation part into the unit cell, so every component is in `[0, 1)`.
    pub fn modulo_unit_cell(&self) -> Self {
        self.with_tau(self.tau().map(|x| x.modulo_one()))
    }

    /// The same operation shifted by an additional translation applied afterwards.
    pub fn translated(&self, shift: &Vector3<Frac>) -> Self {
        self.with_tau(self.tau() + shift)
    }
}

/// Determinant of an integer 3x3 matrix.
pub fn det3(m: &Matrix3<BaseInt>) -> BaseInt {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// The adjugate (transposed cofactor matrix) of an integer 3x3 matrix, so that `m * adj(m) =
/// det(m) I`.
pub fn adjugate3(m: &Matrix3<BaseInt>) -> Matrix3<BaseInt> {
    let cof = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[(r0, c0)] * m[(r1, c1)] - m[(r0, c1)] * m[(r1, c0)]
    };
    Matrix3::new(
        cof(1, 2, 1, 2),
        -cof(0, 2, 1, 2),
        cof(0, 1, 1, 2),
        -cof(1, 2, 0, 2),
        cof(0, 2, 0, 2),
        -cof(0, 1, 0, 2),
        cof(1, 2, 0, 1),
        -cof(0, 2, 0, 1),
        cof(0, 1, 0, 1),
    )
}

/// The largest numerator, over [`DENOM`], allowed in the linear part of [`Isometry::inv_affine`].
const MAX_AFFINE_NUMERATOR: i64 = 1 << 16;

impl Isometry {
    /// The inverse operation, `(R^-1, -R^-1 t)`. Computed exactly: the rotation part must be an
    /// integer matrix with determinant +1 or -1, which is true of any crystallographic operation.
    pub fn inv(&self) -> Result<Self, IsometryError> {
        let r = self.try_rot_int()?;
        let det = det3(&r);
        if det.abs() != 1 {
            return Err(IsometryError::NotInvertible(det));
        }
        let r_inv = adjugate3(&r) * det;
        let r_inv_f = r_inv.map(|x| frac!(x));
        Ok(Self::new_rot_tau(r_inv_f, -(r_inv_f * self.tau())))
    }

    /// `self * rhs`, or `None` if an entry of the product needs a finer denominator than
    /// [`DENOM`]. Products of a change of basis with user-supplied operations can.
    pub fn checked_mul(&self, rhs: &Isometry) -> Option<Self> {
        let mut m = Matrix4::zeros();
        for i in 0..4 {
            for j in 0..4 {
                let mut sum = Frac::ZERO;
                for k in 0..4 {
                    sum += self.m[(i, k)].checked_mul(rhs.m[(k, j)])?;
                }
                m[(i, j)] = sum;
            }
        }
        Some(Self { m })
    }

    /// The rotation part applied to a vector, or `None` if the result isn't representable.
    pub fn checked_rotate(&self, v: &Vector3<Frac>) -> Option<Vector3<Frac>> {
        let linear = Self::new_rot_tau(self.rot(), Vector3::zeros());
        linear
            .checked_mul(&Self::translation(*v))
            .map(|op| op.tau())
    }

    /// The inverse of a general affine map, whose linear part may have fractional entries and any
    /// nonzero determinant. Changes of basis between a centred cell and a primitive one look like
    /// this. Errors if the inverse needs a finer denominator than [`DENOM`].
    pub fn inv_affine(&self) -> Result<Self, IsometryError> {
        let unrepresentable = || IsometryError::Unrepresentable(self.m);
        let n = self.rot().map(|x| i64::from(x.numerator));
        // keeps the adjugate times DENOM^2 inside i64
        if n.iter().any(|x| x.abs() > MAX_AFFINE_NUMERATOR) {
            return Err(unrepresentable());
        }
        let det = det3_i64(&n);
        if det == 0 {
            return Err(IsometryError::NotInvertible(0));
        }

        // R = N / DENOM, so R^-1 = DENOM adj(N) / det(N), stored as numerators over DENOM
        let scale = i64::from(DENOM) * i64::from(DENOM);
        let mut r_inv = Matrix3::zeros();
        for (dst, &a) in r_inv.iter_mut().zip(adjugate3_i64(&n).iter()) {
            let scaled = a * scale;
            if scaled % det != 0 {
                return Err(unrepresentable());
            }
            *dst = BaseInt::try_from(scaled / det)
                .map(Frac::new_with_numerator)
                .map_err(|_e| unrepresentable())?;
        }

        let tau = self.tau();
        let mut tau_inv = Vector3::zeros();
        for i in 0..3 {
            let mut sum = Frac::ZERO;
            for j in 0..3 {
                let r: Frac = r_inv[(i, j)];
                sum -= r.checked_mul(tau[j]).ok_or_else(unrepresentable)?;
            }
            tau_inv[i] = sum;
        }
        Ok(Self::new_rot_tau(r_inv, tau_inv))
    }
}

impl TryFrom<Matrix4<Frac>> for Isometry {
    type Error = IsometryError;

    /// Tries to convert from an affine matrix. If the matrix is not affine, returns an error.
    fn try_from(mat: Matrix4<Frac>) -> Result<Self, Self::Error> {
        if mat.row(3) != Matrix4::identity().row(3) {
            Err(IsometryError::NotHomogenous(mat))
        } else {
            Ok(Self { m: mat })
        }
    }
}

impl FromStr for Isometry {
    type Err = ParseError;

    /// Parses a symmetry operation from a triplet, e.g., `-y, x-y, z+1/3`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_complete(s, triplet)
    }
}

/// Writes one row of the triplet, like `x-y+1/2`.
fn write_row(f: &mut std::fmt::Formatter<'_>, coefs: [Frac; 3], tau: Frac) -> std::fmt::Result {
    let mut first = true;
    for (coef, var) in coefs.into_iter().zip(['x', 'y', 'z']) {
        if coef.is_zero() {
            continue;
        }
        let sign = if coef.is_negative() {
            "-"
        } else if first {
            ""
        } else {
            "+"
        };
        let mag = coef.abs();
        if mag == Frac::ONE {
            write!(f, "{}{}", sign, var)?;
        } else {
            write!(f, "{}{}*{}", sign, mag, var)?;
        }
        first = false;
    }

    if !tau.is_zero() {
        if tau.is_negative() || first {
            write!(f, "{}", tau)?;
        } else {
            write!(f, "+{}", tau)?;
        }
    } else if first {
        write!(f, "0")?;
    }
    Ok(())
}

impl Display for Isometry {
    /// Writes the operation as a triplet like `-x,-y,z+1/2`.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let rot = self.rot();
        let tau = self.tau();
        for i in 0..3 {
            if i > 0 {
                write!(f, ",")?;
            }
            write_row(f, [rot[(i, 0)], rot[(i, 1)], rot[(i, 2)]], tau[i])?;
        }
        Ok(())
    }
}
