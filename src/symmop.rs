//! Geometric classification of symmetry operations. An [`Isometry`] is just a matrix: this module
//! works out what it means, following section 1.2.2.4 of ITA. The rotation part gives a type (1, 2,
//! 3, 4, 6 or their rotoinversions), an axis and a sense of rotation. The translation part splits
//! into an intrinsic screw or glide component and a location component that a change of origin
//! could remove.
//!
//! Everything here is exact: no floating point is involved until results are displayed.

use std::{fmt::Display, iter::successors};

use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

use crate::{
    frac,
    fract::{BaseInt, Frac},
    isometry::{det3, Isometry, IsometryError},
    lattice::gcd,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SymmOpError {
    #[error("{0} is not a crystallographic symmetry operation")]
    NotSymmetryOperation(Isometry),
    #[error("{0}")]
    Isometry(#[from] IsometryError),
    #[error("Cannot locate the fixed points of {0}")]
    NoFixedPoint(Isometry),
}

/// `a * b`, or `None` if an entry overflows.
fn checked_product(a: &Matrix3<i64>, b: &Matrix3<i64>) -> Option<Matrix3<i64>> {
    let mut out = Matrix3::zeros();
    for i in 0..3 {
        for j in 0..3 {
            let mut sum: i64 = 0;
            for k in 0..3 {
                sum = sum.checked_add(a[(i, k)].checked_mul(b[(k, j)])?)?;
            }
            out[(i, j)] = sum;
        }
    }
    Some(out)
}

/// `det(m)`, or `None` if an intermediate product overflows.
fn checked_det(m: &Matrix3<i64>) -> Option<i64> {
    let minor = |r0: usize, r1: usize, c0: usize, c1: usize| {
        m[(r0, c0)]
            .checked_mul(m[(r1, c1)])?
            .checked_sub(m[(r0, c1)].checked_mul(m[(r1, c0)])?)
    };
    m[(0, 0)]
        .checked_mul(minor(1, 2, 1, 2)?)?
        .checked_sub(m[(0, 1)].checked_mul(minor(1, 2, 0, 2)?)?)?
        .checked_add(m[(0, 2)].checked_mul(minor(1, 2, 0, 1)?)?)
}

/// The crystallographic rotation type: 1, 2, 3, 4, 6 for rotations and -1, -2, -3, -4, -6 for
/// rotoinversions. Read off the trace and determinant, then confirmed by checking that the matrix
/// has the order the type implies: a shear like `x+y,y,z` has the trace and determinant of the
/// identity. Returns `None` if the matrix is not a crystallographic rotation.
pub fn rotation_type(rot: &Matrix3<BaseInt>) -> Option<i8> {
    let w = rot.map(i64::from);
    let det = checked_det(&w)?;
    if det.abs() != 1 {
        return None;
    }
    let rot_type: i8 = match w.trace() * det {
        3 => 1,
        2 => 6,
        1 => 4,
        0 => 3,
        -1 => 2,
        _ => return None,
    };
    let rot_type = rot_type * det as i8;

    let mut power = w;
    for _ in 1..rotation_order(rot_type) {
        power = checked_product(&power, &w)?;
    }
    (power == Matrix3::identity()).then_some(rot_type)
}

/// The order of an operation with the given rotation type: the smallest `k` such that `R^k = I`.
pub fn rotation_order(rtype: i8) -> usize {
    match rtype {
        // -1 has order 2, -3 has order 6
        -1 | -3 => 2 * rtype.unsigned_abs() as usize,
        other => other.unsigned_abs() as usize,
    }
}

/// `Y(W) = I + W + ... + W^(k-1)`. `W Y(W) = Y(W)`, so this sends anything not orthogonal to the
/// axis of `W` onto it.
fn axis_projector(w: &Matrix3<BaseInt>, k: usize) -> Matrix3<BaseInt> {
    successors(Some(Matrix3::identity()), |acc| Some(w * acc))
        .take(k)
        .sum()
}

/// Divides an integer vector by the gcd of its entries and makes the first nonzero entry positive.
pub fn primitive_direction(v: &Vector3<BaseInt>) -> Vector3<BaseInt> {
    let g = v.iter().fold(0, |acc, &x| Frac::gcd(acc, x.abs()));
    if g == 0 {
        return *v;
    }
    let v = v / g;
    match v.iter().find(|x| **x != 0) {
        Some(x) if *x < 0 => -v,
        _ => v,
    }
}

/// Information about a rotation matrix: its type, axis, and sense.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct RotationInfo {
    /// 1, 2, 3, 4, 6, -1, -2, -3, -4, or -6.
    pub rtype: i8,
    /// The axis of the rotation or rotoinversion: for mirrors, the normal of the plane. `None` for
    /// 1 and -1.
    pub axis: Option<Vector3<BaseInt>>,
    /// +1 for counterclockwise when looking down the axis, -1 for clockwise. `None` unless
    /// `|rtype| > 2`.
    pub sense: Option<i8>,
}

impl RotationInfo {
    /// Classifies an integer rotation matrix.
    #[allow(non_snake_case)] // we want to use the same notation as ITA
    pub fn new(W: &Matrix3<BaseInt>) -> Option<Self> {
        let rtype = rotation_type(W)?;
        let k = rtype.unsigned_abs() as usize;
        if k == 1 {
            return Some(Self {
                rtype,
                axis: None,
                sense: None,
            });
        }

        // for a rotoinversion, use the axis of -W
        let d = det3(W);
        let W_abs = W * d;
        let Y = axis_projector(&W_abs, k);
        let axis = [Vector3::x(), Vector3::y(), Vector3::z()]
            .into_iter()
            .map(|v| Y * v)
            .find(|u| u.iter().any(|x| *x != 0))?;
        let axis = primitive_direction(&axis);

        let sense = if k > 2 {
            // the sign of det(u, x, d W x) for any x not parallel to the axis u
            let x = if axis.y == 0 && axis.z == 0 {
                Vector3::z()
            } else {
                Vector3::x()
            };
            let z = Matrix3::from_columns(&[axis, x, W_abs * x]);
            Some(det3(&z).signum() as i8)
        } else {
            None
        };

        Some(Self {
            rtype,
            axis: Some(axis),
            sense,
        })
    }

    /// The order of the rotation part.
    pub fn order(&self) -> usize {
        rotation_order(self.rtype)
    }

    pub fn is_proper(&self) -> bool {
        self.rtype > 0
    }

    /// The label used in operation tables: `3^1`, `-4^-1`, `2`, or `-1`.
    pub fn label(&self) -> String {
        match self.sense {
            Some(s) => format!("{}^{}", self.rtype, s),
            None => format!("{}", self.rtype),
        }
    }
}

/// The translation part of an operation split into its components.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
pub struct TranslationPartInfo {
    /// The screw or glide component, which no change of origin can remove.
    pub intrinsic: Vector3<Frac>,
    /// The rest of the translation, which describes where the symmetry element is.
    pub location: Vector3<Frac>,
    /// A point the operation (minus its intrinsic part) leaves fixed: moving the origin there
    /// removes the location part.
    pub origin_shift: Vector3<Frac>,
}

impl TranslationPartInfo {
    /// Splits the translation of `op`.
    #[allow(non_snake_case)]
    pub fn new(op: &Isometry) -> Result<Self, SymmOpError> {
        let W = op.try_rot_int()?;
        let rtype = rotation_type(&W).ok_or(SymmOpError::NotSymmetryOperation(*op))?;
        let k = rotation_order(rtype);

        // (W, w)^k = (I, Y(W) w), and that translation divided by k is the intrinsic part
        let Y = axis_projector(&W, k).map(|x| frac!(x));
        let yw = Y * op.tau();
        let mut w_g: Vector3<Frac> = Vector3::zeros();
        for i in 0..3 {
            w_g[i] = yw[i]
                .checked_div(frac!(k))
                .ok_or(SymmOpError::NoFixedPoint(*op))?;
        }
        let w_l = op.tau() - w_g;

        let fixed = fixed_point_subspace(&[op.with_tau(w_l)], [0, 1, 2])
            .ok_or(SymmOpError::NoFixedPoint(*op))?;

        Ok(Self {
            intrinsic: w_g,
            location: w_l,
            origin_shift: fixed.tau(),
        })
    }

    /// The original translation: the intrinsic part plus the location part.
    pub fn reconstruct(&self) -> Vector3<Frac> {
        self.intrinsic + self.location
    }
}

/// Solves `R x + t = x` for all of the given operations simultaneously. The solution set is
/// returned as an idempotent operation that maps any point onto the fixed subspace: its rotation
/// part gives the free parameters, its translation part a particular solution. Returns `None` if no
/// point is fixed.
///
/// The columns in `pivot_order` are solved for first, and the remaining ones become free
/// parameters: `[2, 1, 0]` gives forms like `x,x,0` rather than `y,y,0`.
pub fn fixed_point_subspace(ops: &[Isometry], pivot_order: [usize; 3]) -> Option<Isometry> {
    // rows of (R - I | -t), with t in units of 1/DENOM
    let mut rows: Vec<[i64; 4]> = vec![];
    for op in ops {
        let r = op.rot_int()?;
        let t = op.tau();
        for i in 0..3 {
            rows.push([
                i64::from(r[(i, 0)] - BaseInt::from(i == 0)),
                i64::from(r[(i, 1)] - BaseInt::from(i == 1)),
                i64::from(r[(i, 2)] - BaseInt::from(i == 2)),
                -i64::from(t[i].numerator),
            ]);
        }
    }

    // Gauss-Jordan elimination without leaving the integers
    let mut pivots: Vec<(usize, usize)> = vec![];
    let mut next_row = 0;
    for c in pivot_order {
        let Some(i) = (next_row..rows.len()).find(|&i| rows[i][c] != 0) else {
            continue;
        };
        rows.swap(next_row, i);
        let p = rows[next_row];
        for (k, row) in rows.iter_mut().enumerate() {
            if k != next_row && row[c] != 0 {
                let f = row[c];
                for j in 0..4 {
                    row[j] = row[j] * p[c] - p[j] * f;
                }
                let g = row.iter().fold(0, |acc, &x| gcd(acc, x));
                if g > 1 {
                    row.iter_mut().for_each(|x| *x /= g);
                }
            }
        }
        pivots.push((next_row, c));
        next_row += 1;
    }

    // any leftover row reads 0 = rhs
    if rows[next_row..].iter().any(|row| row[3] != 0) {
        return None;
    }

    let mut rot: Matrix3<Frac> = Matrix3::identity();
    let mut tau: Vector3<Frac> = Vector3::zeros();
    for &(r, p) in &pivots {
        let row = rows[r];
        let a = row[p];
        rot[(p, p)] = Frac::ZERO;
        for j in 0..3 {
            if j != p && !pivots.iter().any(|&(_, q)| q == j) {
                rot[(p, j)] = Frac::new(-row[j] as BaseInt, a as BaseInt).ok()?;
            }
        }
        if row[3] % a != 0 {
            return None;
        }
        tau[p] = Frac::new_with_numerator((row[3] / a) as BaseInt);
    }

    Some(Isometry::new_rot_tau(rot, tau))
}

/// A full description of one symmetry operation, as shown in operation tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationInfo {
    pub op: Isometry,
    pub rotation: RotationInfo,
    pub translation: TranslationPartInfo,
}

impl OperationInfo {
    pub fn new(op: &Isometry) -> Result<Self, SymmOpError> {
        let rot = op.try_rot_int()?;
        let rotation = RotationInfo::new(&rot).ok_or(SymmOpError::NotSymmetryOperation(*op))?;
        let translation = TranslationPartInfo::new(op)?;
        Ok(Self {
            op: *op,
            rotation,
            translation,
        })
    }

    /// The columns of an operation table: rotation label, axis, intrinsic part, and origin shift.
    /// Columns that don't apply are dashes.
    pub fn columns(&self) -> [String; 4] {
        let dash = || "-".to_string();
        let axis = self
            .rotation
            .axis
            .map(|a| format!("[{},{},{}]", a.x, a.y, a.z))
            .unwrap_or_else(dash);
        match self.rotation.rtype {
            1 => [self.rotation.label(), dash(), dash(), dash()],
            -1 => [
                self.rotation.label(),
                dash(),
                dash(),
                FloatTriple(self.translation.origin_shift).to_string(),
            ],
            _ => [
                self.rotation.label(),
                axis,
                FloatTriple(self.translation.intrinsic).to_string(),
                FloatTriple(self.translation.origin_shift).to_string(),
            ],
        }
    }
}

/// Displays a vector of fractions as decimals, like `(0,0,0.5)`.
pub struct FloatTriple(pub Vector3<Frac>);

impl Display for FloatTriple {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [x, y, z] = [self.0.x, self.0.y, self.0.z].map(|v| fmt_float(v.as_double()));
        write!(f, "({},{},{})", x, y, z)
    }
}

fn fmt_float(x: f64) -> String {
    let s = format!("{:.6}", x);
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" {
        "0".to_string()
    } else {
        s.to_string()
    }
}
