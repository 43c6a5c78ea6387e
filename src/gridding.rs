//! Grid factors: the smallest numbers of divisions along each axis for which a sampling grid is
//! mapped onto itself by a set of symmetry operations.

use std::fmt::Display;

use tracing::trace;

use crate::{
    lattice::{gcd, lcm},
    normalizer::EuclideanNormalizer,
    seminvariant::StructureSeminvariants,
    spacegroup::{SpaceGroup, SpaceGroupError},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Gridding(pub [i64; 3]);

impl Default for Gridding {
    fn default() -> Self {
        Self([1, 1, 1])
    }
}

impl Display for Gridding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "({}, {}, {})", a, b, c)
    }
}

impl Gridding {
    /// The least common multiple along each axis.
    pub fn lcm(&self, other: &Self) -> Self {
        Self([0, 1, 2].map(|i| lcm(self.0[i], other.0[i])))
    }

    /// The smallest multiple of this gridding that the group maps onto itself. Translations need
    /// their denominators to divide the factor along their axis, and a rotation that mixes two
    /// axes needs their factors to divide each other.
    pub fn refine(&self, group: &SpaceGroup) -> Self {
        let mut n = self.0;
        loop {
            let before = n;
            let translations = group
                .ltr()
                .iter()
                .copied()
                .chain(group.smx().iter().map(|op| op.tau()));
            for t in translations {
                for i in 0..3 {
                    n[i] = lcm(n[i], i64::from(t[i].denominator()));
                }
            }
            for rot in group.rotations() {
                for i in 0..3 {
                    for j in 0..3 {
                        if i != j && rot[(i, j)] != 0 {
                            n[i] = lcm(n[i], n[j]);
                        }
                    }
                }
            }
            if n == before {
                break;
            }
        }
        trace!(from = %self, to = %Self(n), "refined gridding");
        Self(n)
    }

    /// Whether the group maps this grid onto itself.
    pub fn is_compatible(&self, group: &SpaceGroup) -> bool {
        self.refine(group) == *self
    }

    /// The gridding the group needs.
    pub fn of_group(group: &SpaceGroup) -> Self {
        Self::default().refine(group)
    }

    /// The gridding on which every permissible discrete origin shift lands on a grid point.
    pub fn of_seminvariants(seminvariants: &StructureSeminvariants) -> Self {
        let mut n = [1; 3];
        for sv in seminvariants.vectors_and_moduli() {
            if sv.continuous {
                continue;
            }
            for i in 0..3 {
                if sv.v[i] != 0 {
                    n[i] = lcm(n[i], sv.m / gcd(sv.m, sv.v[i]));
                }
            }
        }
        Self(n)
    }

    /// The seminvariant gridding refined by the group expanded with its normalizer generators.
    pub fn of_normalizer(
        group: &SpaceGroup,
        normalizer: &EuclideanNormalizer,
        seminvariants: &StructureSeminvariants,
    ) -> Result<Self, SpaceGroupError> {
        let expanded = normalizer.expanded_group(group)?;
        Ok(Self::of_seminvariants(seminvariants).refine(&expanded))
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::hall::HallGroupSymbol;

    fn group(hall: &str) -> SpaceGroup {
        HallGroupSymbol::from_str(hall).unwrap().space_group().unwrap()
    }

    #[test]
    fn test_group_gridding() {
        for (hall, expected) in [
            ("P 1", [1, 1, 1]),
            ("P 2ac 2ab", [2, 2, 2]),
            ("P 61", [1, 1, 6]),
            ("P 4w", [1, 1, 4]),
            ("I 4", [2, 2, 2]),
            ("R 3", [3, 3, 3]),
            ("-P 4 2 3", [1, 1, 1]),
        ] {
            assert_eq!(Gridding::of_group(&group(hall)), Gridding(expected), "{hall}");
        }
    }

    #[test]
    fn test_refine() {
        let p3 = group("P 3");
        let g = Gridding([2, 1, 5]).refine(&p3);
        assert_eq!(g, Gridding([2, 2, 5]));
        assert!(g.is_compatible(&p3));
        assert!(!Gridding([2, 1, 5]).is_compatible(&p3));
        assert_eq!(Gridding([4, 6, 1]).lcm(&Gridding([6, 4, 3])), Gridding([12, 12, 3]));
        assert_eq!(Gridding([1, 2, 3]).to_string(), "(1, 2, 3)");
    }

    #[test]
    fn test_seminvariant_gridding() {
        let p_1 = StructureSeminvariants::new(&group("-P 1")).unwrap();
        assert_eq!(Gridding::of_seminvariants(&p_1), Gridding([2, 2, 2]));
        let p1 = StructureSeminvariants::new(&group("P 1")).unwrap();
        assert_eq!(Gridding::of_seminvariants(&p1), Gridding([1, 1, 1]));
        let p2 = StructureSeminvariants::new(&group("P 2y")).unwrap();
        assert_eq!(Gridding::of_seminvariants(&p2), Gridding([2, 1, 2]));
    }

    #[test]
    fn test_normalizer_gridding() {
        for (hall, expected) in [("-P 1", [2, 2, 2]), ("-P 4 2 3", [2, 2, 2]), ("P 1", [1, 1, 1])] {
            let g = group(hall);
            let ss = StructureSeminvariants::new(&g).unwrap();
            let n = EuclideanNormalizer::new(&g).unwrap();
            assert_eq!(
                Gridding::of_normalizer(&g, &n, &ss).unwrap(),
                Gridding(expected),
                "{hall}"
            );
        }
    }
}
