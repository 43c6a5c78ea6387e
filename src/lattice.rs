//! Lattices of translations. A space group's translations form a lattice: the integer vectors
//! plus whatever centring vectors the group has. This module describes the standard centring
//! types and provides the integer linear algebra (Hermite and Smith normal forms) used to move
//! between the conventional cell and a primitive basis of that lattice.

use nalgebra::{DMatrix, Matrix3, Vector3};
use num_traits::Zero;

use crate::{
    frac,
    fract::{BaseInt, Frac},
    isometry::Isometry,
};

/// The centring type of a lattice: the extra translations a conventional cell carries on top of
/// whole cell translations. `S` and `T` are the rhombohedral centrings in the less common
/// orientations, and only appear in Hall symbols.
#[derive(Debug, Copy, Clone, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub enum CentringType {
    P,
    A,
    B,
    C,
    I,
    R,
    S,
    T,
    F,
}

impl CentringType {
    /// Gets the letter for the symbol.
    pub fn letter(&self) -> char {
        match self {
            Self::P => 'P',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
            Self::I => 'I',
            Self::R => 'R',
            Self::S => 'S',
            Self::T => 'T',
            Self::F => 'F',
        }
    }

    /// Reads the letter of a centring type, in either case.
    pub fn from_letter(c: char) -> Option<Self> {
        Some(match c.to_ascii_uppercase() {
            'P' => Self::P,
            'A' => Self::A,
            'B' => Self::B,
            'C' => Self::C,
            'I' => Self::I,
            'R' => Self::R,
            'S' => Self::S,
            'T' => Self::T,
            'F' => Self::F,
            _ => return None,
        })
    }

    /// The centring type of a SHELX `LATT n` card. The sign of `n` only says whether the
    /// structure is centrosymmetric, so it is ignored here.
    pub fn from_latt(n: i32) -> Option<Self> {
        Some(match n.abs() {
            1 => Self::P,
            2 => Self::I,
            3 => Self::R,
            4 => Self::F,
            5 => Self::A,
            6 => Self::B,
            7 => Self::C,
            _ => return None,
        })
    }

    /// The SHELX `LATT` number, if SHELX has one for this centring.
    pub fn latt_number(&self) -> Option<i32> {
        match self {
            Self::P => Some(1),
            Self::I => Some(2),
            Self::R => Some(3),
            Self::F => Some(4),
            Self::A => Some(5),
            Self::B => Some(6),
            Self::C => Some(7),
            Self::S | Self::T => None,
        }
    }

    /// The centring translations, not including the origin. Table 2.1.1.2 of ITA.
    pub fn translations(&self) -> Vec<Vector3<Frac>> {
        let f0 = frac!(0);
        let f12 = frac!(1 / 2);
        let f13 = frac!(1 / 3);
        let f23 = frac!(2 / 3);

        let a = Vector3::new(f0, f12, f12);
        let b = Vector3::new(f12, f0, f12);
        let c = Vector3::new(f12, f12, f0);

        match self {
            Self::P => vec![],
            Self::A => vec![a],
            Self::B => vec![b],
            Self::C => vec![c],
            Self::I => vec![Vector3::new(f12, f12, f12)],
            Self::R => vec![Vector3::new(f23, f13, f13), Vector3::new(f13, f23, f23)],
            Self::S => vec![Vector3::new(f13, f13, f23), Vector3::new(f23, f23, f13)],
            Self::T => vec![Vector3::new(f13, f23, f13), Vector3::new(f23, f13, f23)],
            Self::F => vec![a, b, c],
        }
    }

    /// Identifies a centring type from a set of centring translations, if it is one of the
    /// standard ones.
    pub fn from_translations(ltr: &[Vector3<Frac>]) -> Option<Self> {
        let mut key: Vec<Vector3<Frac>> = ltr
            .iter()
            .map(|t| t.map(|x| x.modulo_one()))
            .filter(|t| !t.is_zero())
            .collect();
        key.sort_by_key(|t| (t.x, t.y, t.z));
        [
            Self::P,
            Self::A,
            Self::B,
            Self::C,
            Self::I,
            Self::R,
            Self::S,
            Self::T,
            Self::F,
        ]
        .into_iter()
        .find(|c| {
            let mut ts = c.translations();
            ts.sort_by_key(|t| (t.x, t.y, t.z));
            ts == key
        })
    }
}

pub fn gcd(a: i64, b: i64) -> i64 {
    let (mut a, mut b) = (a.abs(), b.abs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

pub fn lcm(a: i64, b: i64) -> i64 {
    if a == 0 || b == 0 {
        0
    } else {
        (a / gcd(a, b) * b).abs()
    }
}

/// A primitive basis of the lattice spanned by the unit vectors and the given centring
/// translations. The basis is returned as the integer matrix `H` whose columns are the basis
/// vectors multiplied by `scale`: the actual basis is `H / scale`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrimitiveBasis {
    pub h: Matrix3<i64>,
    pub scale: i64,
}

impl PrimitiveBasis {
    /// Computes a primitive basis from the centring translations.
    pub fn new(ltr: &[Vector3<Frac>]) -> Self {
        let scale = ltr
            .iter()
            .flat_map(|t| t.iter().map(|x| x.denominator() as i64))
            .fold(1, lcm);

        let mut gens: Vec<Vector3<i64>> = vec![
            Vector3::x() * scale,
            Vector3::y() * scale,
            Vector3::z() * scale,
        ];
        for t in ltr {
            gens.push(t.map(|x| {
                x.scaled_numerator(scale as i32)
                    .map(i64::from)
                    .unwrap_or_default()
            }));
        }

        Self {
            h: column_hermite_basis(gens),
            scale,
        }
    }

    /// `det(H)`, the volume of the primitive cell times `scale^3`.
    pub fn det(&self) -> i64 {
        det3_i64(&self.h)
    }

    /// Rewrites an integer rotation in the primitive basis: `H^-1 R H`. Returns `None` if the
    /// rotation doesn't map the lattice onto itself.
    pub fn to_primitive(&self, rot: &Matrix3<i64>) -> Option<Matrix3<i64>> {
        let det = self.det();
        let prod = adjugate3_i64(&self.h) * rot * self.h;
        if prod.iter().all(|x| x % det == 0) {
            Some(prod / det)
        } else {
            None
        }
    }

    /// The change of basis from conventional to primitive coordinates, `scale H^-1`. Every
    /// conventional cell vector is a lattice vector, so the matrix is integral. Its determinant is
    /// the number of lattice points per conventional cell, taken positive so that handedness is
    /// kept.
    pub fn to_primitive_cb(&self) -> Isometry {
        let det = self.det();
        let m = adjugate3_i64(&self.h) * self.scale / det;
        let sign = det3_i64(&m).signum();
        Isometry::new_rot_tau(
            m.map(|x| frac!((x * sign) as BaseInt)),
            Vector3::zeros(),
        )
    }

    /// Converts an integer vector in the primitive basis to conventional coordinates, giving an
    /// integer vector `v` and a denominator `d` with the actual vector equal to `v / d`, reduced.
    pub fn to_conventional(&self, u: &Vector3<i64>) -> (Vector3<i64>, i64) {
        let v = self.h * u;
        let g = v.iter().fold(self.scale, |acc, &x| gcd(acc, x));
        if g == 0 {
            (v, 1)
        } else {
            (v / g, self.scale / g)
        }
    }
}

/// Reduces the given integer vectors (which must span 3D space) to a basis of the lattice they
/// generate, returned as matrix columns in lower-triangular form.
pub fn column_hermite_basis(gens: Vec<Vector3<i64>>) -> Matrix3<i64> {
    let mut cols = gens;
    for row in 0..3 {
        // Euclid's algorithm on the columns from `row` onwards until only one has a nonzero entry
        loop {
            let nonzero: Vec<usize> = (row..cols.len()).filter(|&j| cols[j][row] != 0).collect();
            if nonzero.len() <= 1 {
                if let Some(&j) = nonzero.first() {
                    cols.swap(row, j);
                }
                break;
            }
            let pivot = *nonzero
                .iter()
                .min_by_key(|&&j| cols[j][row].abs())
                .unwrap_or(&row);
            for &j in &nonzero {
                if j != pivot {
                    let q = cols[j][row] / cols[pivot][row];
                    let p = cols[pivot];
                    cols[j] -= p * q;
                }
            }
        }
        if cols[row][row] < 0 {
            cols[row] = -cols[row];
        }
    }
    Matrix3::from_columns(&cols[..3])
}

/// Determinant of an integer 3x3 matrix.
pub fn det3_i64(m: &Matrix3<i64>) -> i64 {
    m[(0, 0)] * (m[(1, 1)] * m[(2, 2)] - m[(1, 2)] * m[(2, 1)])
        - m[(0, 1)] * (m[(1, 0)] * m[(2, 2)] - m[(1, 2)] * m[(2, 0)])
        + m[(0, 2)] * (m[(1, 0)] * m[(2, 1)] - m[(1, 1)] * m[(2, 0)])
}

/// Adjugate of an integer 3x3 matrix: `m * adj(m) = det(m) I`.
pub fn adjugate3_i64(m: &Matrix3<i64>) -> Matrix3<i64> {
    crate::isometry::adjugate3(&m.map(|x| x as i32)).map(i64::from)
}

/// The Smith normal form of an integer matrix `m`. Returns the diagonal entries `d` (length equal
/// to the number of columns, so zeros mark directions in the kernel) and the unimodular matrix `v`
/// such that `u m v = diag(d)` for some unimodular `u`. Each `d[i]` divides `d[i + 1]`, except
/// that zeros come last.
pub fn smith_normal_form(m: &DMatrix<i64>) -> (Vec<i64>, DMatrix<i64>) {
    let (nr, nc) = m.shape();
    let mut a = m.clone();
    let mut v = DMatrix::<i64>::identity(nc, nc);

    let mut diag = vec![0; nc];
    for t in 0..nr.min(nc) {
        // smallest nonzero entry in the remaining block
        let Some((pi, pj)) = (t..nr)
            .flat_map(|i| (t..nc).map(move |j| (i, j)))
            .filter(|&(i, j)| a[(i, j)] != 0)
            .min_by_key(|&(i, j)| a[(i, j)].abs())
        else {
            break;
        };
        a.swap_rows(t, pi);
        a.swap_columns(t, pj);
        v.swap_columns(t, pj);

        loop {
            let mut clean = true;
            for i in (t + 1)..nr {
                let q = a[(i, t)] / a[(t, t)];
                if q != 0 {
                    for j in t..nc {
                        a[(i, j)] -= q * a[(t, j)];
                    }
                }
                clean &= a[(i, t)] == 0;
            }
            for j in (t + 1)..nc {
                let q = a[(t, j)] / a[(t, t)];
                if q != 0 {
                    for i in t..nr {
                        a[(i, j)] -= q * a[(i, t)];
                    }
                    for i in 0..nc {
                        v[(i, j)] -= q * v[(i, t)];
                    }
                }
                clean &= a[(t, j)] == 0;
            }

            if !clean {
                // a remainder is smaller than the pivot: move it into place and go again
                let (pi, pj) = ((t..nr).map(|i| (i, t)))
                    .chain(((t + 1)..nc).map(|j| (t, j)))
                    .filter(|&(i, j)| a[(i, j)] != 0)
                    .min_by_key(|&(i, j)| a[(i, j)].abs())
                    .unwrap_or((t, t));
                a.swap_rows(t, pi);
                a.swap_columns(t, pj);
                v.swap_columns(t, pj);
                continue;
            }

            // the pivot must divide everything left, otherwise fold an offending row in
            let bad_row = ((t + 1)..nr)
                .find(|&i| ((t + 1)..nc).any(|j| a[(i, j)] % a[(t, t)] != 0));
            match bad_row {
                Some(i) => {
                    for j in t..nc {
                        a[(t, j)] += a[(i, j)];
                    }
                }
                None => break,
            }
        }

        if a[(t, t)] < 0 {
            for j in t..nc {
                a[(t, j)] = -a[(t, j)];
            }
        }
        diag[t] = a[(t, t)];
    }

    (diag, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::DVector;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_latt_numbers() {
        for n in 1..=7 {
            let c = CentringType::from_latt(n).unwrap();
            assert_eq!(CentringType::from_latt(-n), Some(c));
            assert_eq!(c.latt_number(), Some(n));
        }
        assert_eq!(CentringType::from_latt(0), None);
        assert_eq!(CentringType::from_latt(8), None);
        assert_eq!(CentringType::from_latt(2), Some(CentringType::I));
    }

    #[test]
    fn test_from_translations() {
        for c in [
            CentringType::P,
            CentringType::A,
            CentringType::C,
            CentringType::R,
            CentringType::F,
        ] {
            let mut ts = c.translations();
            ts.reverse();
            assert_eq!(CentringType::from_translations(&ts), Some(c));
        }
        let odd = [Vector3::new(frac!(1 / 2), frac!(0), frac!(0))];
        assert_eq!(CentringType::from_translations(&odd), None);
    }

    #[test]
    fn test_primitive_basis() {
        let p = PrimitiveBasis::new(&[]);
        assert_eq!(p.scale, 1);
        assert_eq!(p.det(), 1);

        let i = PrimitiveBasis::new(&CentringType::I.translations());
        assert_eq!(i.scale, 2);
        // the primitive cell has half the volume
        assert_eq!(i.det().abs(), 4);

        let f = PrimitiveBasis::new(&CentringType::F.translations());
        assert_eq!(f.det().abs(), 2);

        let r = PrimitiveBasis::new(&CentringType::R.translations());
        assert_eq!(r.scale, 3);
        assert_eq!(r.det().abs(), 9);

        // a 4-fold maps the I lattice onto itself
        let four = Matrix3::new(0, -1, 0, 1, 0, 0, 0, 0, 1);
        let four_p = i.to_primitive(&four).unwrap();
        assert_eq!(det3_i64(&four_p), 1);
        // but a 3-fold about z doesn't map the A lattice onto itself
        let c = PrimitiveBasis::new(&CentringType::A.translations());
        let three = Matrix3::new(0, -1, 0, 1, -1, 0, 0, 0, 1);
        assert_eq!(c.to_primitive(&three), None);
    }

    #[test]
    fn test_to_primitive_cb() {
        for (centring, n) in [
            (CentringType::P, 1),
            (CentringType::C, 2),
            (CentringType::I, 2),
            (CentringType::R, 3),
            (CentringType::F, 4),
        ] {
            let cb = PrimitiveBasis::new(&centring.translations()).to_primitive_cb();
            assert_eq!(cb.det(), Some(n), "{:?}", centring);
            // every centring translation lands on an integer vector
            for t in centring.translations() {
                assert!(cb.apply(&t).iter().all(Frac::is_integer), "{:?}", centring);
            }
        }
    }

    #[test]
    fn test_snf() {
        let m = DMatrix::from_row_slice(3, 3, &[2, 4, 4, -6, 6, 12, 10, -4, -16]);
        let (d, v) = smith_normal_form(&m);
        assert_eq!(d, vec![2, 6, 12]);
        // v is unimodular
        let v3 = Matrix3::from_iterator(v.iter().copied());
        assert_eq!(det3_i64(&v3).abs(), 1);

        let stacked = DMatrix::from_row_slice(
            6,
            3,
            &[-2, 0, 0, 0, 0, 0, 0, 0, -2, 0, 0, 0, 0, 0, 0, 0, 0, 0],
        );
        let (d, v) = smith_normal_form(&stacked);
        assert_eq!(d, vec![2, 2, 0]);
        // the free direction is b
        assert_eq!(v.column(2).abs(), DVector::from_column_slice(&[0, 1, 0]));
    }
}
