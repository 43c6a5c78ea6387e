//! Wyckoff positions: classes of points whose site-symmetry groups are conjugate in the space
//! group.
//!
//! Positions are found by sampling the unit cell. Every point of the sampling grid gets its exact
//! stabilizer, and two stabilizers belong to the same position when an operation of the group
//! conjugates one into the other. Multiplicities come out as `order_z / |stabilizer|`. Letters
//! are assigned from `a` upwards in order of increasing multiplicity and then increasing
//! dimension, so the general position always gets the last letter. Within those ties the order
//! is that of the first point found in the cell, which usually but not always agrees with the
//! order of ITA.

use std::collections::HashMap;
use std::fmt::Display;

use nalgebra::{Matrix3, Vector3};
use num_traits::Zero;
use tracing::debug;

use crate::{
    fract::{BaseInt, Frac},
    group_classes::PointGroup,
    isometry::Isometry,
    sampling::{grid_ops, grid_points, point_index, to_frac, GridOp, SamplingError, N_POINTS},
    spacegroup::SpaceGroup,
    symmop::fixed_point_subspace,
};

/// A stabilizer, as the indices of its operations in [`SpaceGroup::all_ops`] together with the
/// whole-cell shift each one needs to fix the point.
type StabilizerKey = Vec<(usize, Vector3<BaseInt>)>;

#[derive(Debug, Clone, PartialEq)]
pub struct WyckoffPosition {
    pub letter: char,
    pub multiplicity: usize,
    /// The point group of the site-symmetry group, or `None` if the rotations don't form one of
    /// the 32 crystallographic point groups.
    pub site_symmetry: Option<PointGroup>,
    /// An idempotent operation mapping any point onto one subspace of this position, like
    /// `x,1/4,1/4`.
    pub representative: Isometry,
    /// The site-symmetry group of the points on that subspace.
    pub stabilizer: Vec<Isometry>,
}

impl WyckoffPosition {
    /// The number of free parameters: 0 for special points, 3 for the general position.
    pub fn dimension(&self) -> usize {
        let rot = self.representative.rot();
        (0..3).filter(|&i| rot[(i, i)] == Frac::ONE).count()
    }

    pub fn site_symmetry_symbol(&self) -> &'static str {
        self.site_symmetry.map_or("?", |pg| pg.hm_symbol())
    }

    /// The point the representative gives when all parameters are 0.
    pub fn origin(&self) -> Vector3<Frac> {
        self.representative.tau()
    }
}

impl Display for WyckoffPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.multiplicity,
            self.letter,
            self.site_symmetry_symbol(),
            self.representative
        )
    }
}

/// A minimal union-find over indices.
struct Partition {
    parent: Vec<usize>,
}

impl Partition {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));
        // keep the smaller index as the root, so roots are the first stabilizer found
        if ra < rb {
            self.parent[rb] = ra;
        } else if rb < ra {
            self.parent[ra] = rb;
        }
    }
}

/// The stabilizer of a grid point.
fn grid_stabilizer(ops: &[GridOp], p: &Vector3<BaseInt>) -> StabilizerKey {
    let n = crate::sampling::SAMPLING_GRID;
    ops.iter()
        .enumerate()
        .filter_map(|(i, op)| {
            let d = p - op.apply_exact(p);
            d.iter().all(|x| x % n == 0).then(|| (i, d / n))
        })
        .collect()
}

/// The stabilizer of an arbitrary point, reduced into the unit cell first.
fn exact_stabilizer(ops: &[Isometry], point: &Vector3<Frac>) -> StabilizerKey {
    let p = point.map(|x| x.modulo_one());
    ops.iter()
        .enumerate()
        .filter_map(|(i, op)| {
            let d = p - op.apply(&p);
            let cells: Option<Vec<BaseInt>> = d.iter().map(Frac::to_integer).collect();
            cells.map(|c| (i, Vector3::new(c[0], c[1], c[2])))
        })
        .collect()
}

/// The idempotent operation onto the fixed subspace of a stabilizer, with its translation reduced
/// into the unit cell.
fn special_operation(stabilizer: &[Isometry], point: &Vector3<Frac>) -> Isometry {
    fixed_point_subspace(stabilizer, [2, 1, 0])
        .map(|op| op.modulo_unit_cell())
        .unwrap_or_else(|| Isometry::new_rot_tau(Matrix3::zeros(), *point))
}

/// Letters run `a` to `z`, then `α` for the general position of Pmmm, the one group with 27
/// positions.
fn letter(i: usize) -> char {
    match i {
        0..=25 => char::from(b'a' + i as u8),
        26 => 'α',
        _ => '?',
    }
}

/// The Wyckoff positions of a space group, in letter order.
#[derive(Debug, Clone, PartialEq)]
pub struct WyckoffTable {
    positions: Vec<WyckoffPosition>,
    ops: Vec<Isometry>,
    classes: HashMap<StabilizerKey, usize>,
}

impl WyckoffTable {
    /// Enumerates the positions of a group. Fails if some operation's translation isn't on the
    /// sampling grid.
    pub fn new(group: &SpaceGroup) -> Result<Self, SamplingError> {
        let ops = grid_ops(group)?;
        let all_ops = group.all_ops();

        let mut key_ids: HashMap<StabilizerKey, usize> = HashMap::new();
        let mut keys: Vec<StabilizerKey> = vec![];
        let mut first_points: Vec<Vector3<BaseInt>> = vec![];
        let mut point_key = vec![0; N_POINTS];
        for p in grid_points() {
            let key = grid_stabilizer(&ops, &p);
            let id = match key_ids.get(&key) {
                Some(&id) => id,
                None => {
                    let id = keys.len();
                    key_ids.insert(key.clone(), id);
                    keys.push(key);
                    first_points.push(p);
                    id
                }
            };
            point_key[point_index(&p)] = id;
        }

        // the stabilizer of g(p) is g S g^-1, so joining each stabilizer with those of the
        // images of one of its points joins whole conjugacy classes
        let mut partition = Partition::new(keys.len());
        for (id, p) in first_points.iter().enumerate() {
            for op in &ops {
                partition.union(id, point_key[point_index(&op.apply(p))]);
            }
        }

        let mut members: Vec<Vec<usize>> = vec![];
        let mut root_class: HashMap<usize, usize> = HashMap::new();
        for id in 0..keys.len() {
            let root = partition.find(id);
            let class = *root_class.entry(root).or_insert_with(|| {
                members.push(vec![]);
                members.len() - 1
            });
            members[class].push(id);
        }

        let to_isometries = |key: &StabilizerKey| -> Vec<Isometry> {
            key.iter()
                .map(|(i, shift)| ops[*i].to_isometry(shift))
                .collect()
        };

        let mut positions: Vec<(usize, WyckoffPosition)> = members
            .iter()
            .map(|ids| {
                // the member whose subspace has the fewest nonzero offsets, then the first found
                let (best, stabilizer, representative) = ids
                    .iter()
                    .map(|&id| {
                        let stabilizer = to_isometries(&keys[id]);
                        let special =
                            special_operation(&stabilizer, &to_frac(&first_points[id]));
                        (id, stabilizer, special)
                    })
                    .min_by_key(|(id, _, special)| {
                        (special.tau().iter().filter(|x| !x.is_zero()).count(), *id)
                    })
                    .unwrap_or_else(|| (0, vec![Isometry::identity()], Isometry::identity()));
                let rots: Vec<Matrix3<BaseInt>> =
                    stabilizer.iter().filter_map(Isometry::rot_int).collect();
                let position = WyckoffPosition {
                    letter: 'a',
                    multiplicity: ops.len() / stabilizer.len().max(1),
                    site_symmetry: PointGroup::from_rotations(&rots),
                    representative,
                    stabilizer,
                };
                (best, position)
            })
            .collect();

        positions.sort_by_key(|(first, pos)| (pos.multiplicity, pos.dimension(), *first));

        let mut classes = HashMap::new();
        for (i, (_, pos)) in positions.iter_mut().enumerate() {
            pos.letter = letter(i);
        }
        let old_to_new: HashMap<usize, usize> = positions
            .iter()
            .enumerate()
            .map(|(new, (first, _))| (partition.find(*first), new))
            .collect();
        for (id, key) in keys.into_iter().enumerate() {
            if let Some(&new) = old_to_new.get(&partition.find(id)) {
                classes.insert(key, new);
            }
        }

        debug!(
            n_positions = positions.len(),
            order_z = group.order_z(),
            "enumerated Wyckoff positions"
        );

        Ok(Self {
            positions: positions.into_iter().map(|(_, pos)| pos).collect(),
            ops: all_ops,
            classes,
        })
    }

    pub fn positions(&self) -> &[WyckoffPosition] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// The position with the given letter.
    pub fn position(&self, letter: char) -> Option<&WyckoffPosition> {
        self.positions.iter().find(|p| p.letter == letter)
    }

    /// The general position: the one with trivial site symmetry.
    pub fn general_position(&self) -> Option<&WyckoffPosition> {
        self.positions.last()
    }

    /// The position a point lies on. Returns `None` only for points whose stabilizer never
    /// occurs on the sampling grid.
    pub fn locate(&self, point: &Vector3<Frac>) -> Option<&WyckoffPosition> {
        let key = exact_stabilizer(&self.ops, point);
        self.classes.get(&key).map(|&i| &self.positions[i])
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{frac, hall::HallGroupSymbol, symbols::SETTINGS};

    fn table(hall: &str) -> WyckoffTable {
        let g = HallGroupSymbol::from_str(hall)
            .unwrap()
            .space_group()
            .unwrap();
        WyckoffTable::new(&g).unwrap()
    }

    fn multiplicities(t: &WyckoffTable) -> Vec<usize> {
        t.positions().iter().map(|p| p.multiplicity).collect()
    }

    #[test]
    fn test_letters() {
        assert_eq!(letter(0), 'a');
        assert_eq!(letter(25), 'z');
        assert_eq!(letter(26), 'α');
        assert_eq!(letter(27), '?');
    }

    #[test]
    fn test_p1() {
        let t = table("P 1");
        assert_eq!(t.len(), 1);
        let a = t.position('a').unwrap();
        assert_eq!(a.multiplicity, 1);
        assert_eq!(a.dimension(), 3);
        assert_eq!(a.representative.to_string(), "x,y,z");
        assert_eq!(a.site_symmetry, Some(PointGroup::C1));
    }

    #[test]
    fn test_p_1() {
        let t = table("-P 1");
        assert_eq!(multiplicities(&t), vec![1, 1, 1, 1, 1, 1, 1, 1, 2]);
        assert_eq!(t.position('a').unwrap().representative.to_string(), "0,0,0");
        assert!(t.positions()[..8]
            .iter()
            .all(|p| p.site_symmetry == Some(PointGroup::Ci) && p.dimension() == 0));
        assert_eq!(t.general_position().unwrap().letter, 'i');
    }

    #[test]
    fn test_pmmm() {
        let t = table("-P 2 2");
        assert_eq!(t.len(), 27);
        assert_eq!(t.general_position().unwrap().letter, 'α');
        assert!(t.position('α').is_some());
        assert_eq!(t.general_position().unwrap().multiplicity, 8);
        let dims: Vec<usize> = t.positions().iter().map(|p| p.dimension()).collect();
        assert_eq!(dims.iter().filter(|&&d| d == 0).count(), 8);
        assert_eq!(dims.iter().filter(|&&d| d == 1).count(), 12);
        assert_eq!(dims.iter().filter(|&&d| d == 2).count(), 6);

        let corner = t
            .locate(&Vector3::new(frac!(1 / 2), frac!(0), frac!(1 / 2)))
            .unwrap();
        assert_eq!(corner.multiplicity, 1);
        assert_eq!(corner.site_symmetry, Some(PointGroup::D2h));
        let edge = t
            .locate(&Vector3::new(frac!(1 / 8), frac!(0), frac!(0)))
            .unwrap();
        assert_eq!((edge.multiplicity, edge.dimension()), (2, 1));
        let general = t
            .locate(&Vector3::new(frac!(1 / 8), frac!(1 / 6), frac!(1 / 12)))
            .unwrap();
        assert_eq!(general.letter, 'α');
        // off the sampling grid, but still a point with trivial site symmetry
        let general = t
            .locate(&Vector3::new(frac!(5 / 96), frac!(1 / 9), frac!(1 / 32)))
            .unwrap();
        assert_eq!(general.letter, 'α');
    }

    #[test]
    fn test_fm3m() {
        let t = table("-F 4 2 3");
        assert_eq!(
            multiplicities(&t),
            vec![4, 4, 8, 24, 24, 32, 48, 48, 48, 96, 96, 192]
        );
        let a = t.position('a').unwrap();
        assert_eq!(a.site_symmetry, Some(PointGroup::Oh));
        assert_eq!(a.origin(), Vector3::zeros());
        assert_eq!(t.position('l').unwrap().site_symmetry, Some(PointGroup::C1));
    }

    #[test]
    fn test_representatives() {
        // a point with no special relation to any symmetry element
        let generic = Vector3::new(frac!(5 / 48), frac!(7 / 48), frac!(17 / 48));
        for hall in ["P 4n 2n -1n", "-P 6c 2c", "-I 4bd 2", "R 3 2\""] {
            let t = table(hall);
            for pos in t.positions() {
                let x = pos.representative.apply(&generic).map(|c| c.modulo_one());
                assert_eq!(pos.representative.apply(&x).map(|c| c.modulo_one()), x);
                for op in &pos.stabilizer {
                    assert_eq!(op.apply(&x).map(|c| c.modulo_one()), x, "{hall} {pos}");
                }
                assert_eq!(t.locate(&x).map(|p| p.letter), Some(pos.letter), "{hall} {pos}");
            }
        }
    }

    #[test]
    fn test_multiplicities_divide_order() {
        for rec in SETTINGS.iter().step_by(23) {
            let g = rec.space_group().unwrap();
            let t = WyckoffTable::new(&g).unwrap();
            let general = t.general_position().unwrap();
            assert_eq!(general.multiplicity, g.order_z(), "{}", rec.hall);
            assert_eq!(general.dimension(), 3, "{}", rec.hall);
            for pos in t.positions() {
                assert_eq!(g.order_z() % pos.multiplicity, 0, "{} {pos}", rec.hall);
                assert_eq!(
                    pos.multiplicity * pos.stabilizer.len(),
                    g.order_z(),
                    "{} {pos}",
                    rec.hall
                );
            }
        }
    }
}
