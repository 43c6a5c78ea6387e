//! Identifies the type of a space group by matching it against the tabulated settings.
//!
//! Two groups have the same type when a change of basis with positive determinant maps one onto
//! the other. The search compares cheap invariants first, then tries integer basis changes with
//! entries in {-1, 0, 1} together with origin shifts on a grid of 1/24. Every tabulated setting
//! is reachable from the first setting of its type this way, except that rhombohedral axes need
//! their own reference. When that fails, both groups are rewritten in primitive cells of their
//! lattices and searched again, which catches centred cells of primitive types and other
//! unconventional centrings.

use std::sync::OnceLock;

use nalgebra::{Matrix3, Vector3};
use tracing::{debug, trace, warn};

use crate::{
    frac,
    fract::{BaseInt, Frac, DENOM},
    isometry::{adjugate3, det3, Isometry, IsometryError},
    spacegroup::SpaceGroup,
    symbols::{SettingRecord, SETTINGS},
};

/// Origin shifts are searched on this grid.
pub const ORIGIN_GRID: BaseInt = 24;

/// Every tabulated setting with its group, in table order. Settings whose Hall symbol fails to
/// generate a group are left out.
pub fn tabulated_groups() -> &'static [(&'static SettingRecord, SpaceGroup)] {
    static GROUPS: OnceLock<Vec<(&'static SettingRecord, SpaceGroup)>> = OnceLock::new();
    GROUPS.get_or_init(|| {
        SETTINGS
            .iter()
            .filter_map(|rec| match rec.space_group() {
                Ok(group) => Some((rec, group)),
                Err(e) => {
                    warn!(hall = rec.hall, error = %e, "tabulated Hall symbol failed");
                    None
                }
            })
            .collect()
    })
}

/// Integer matrices with entries in {-1, 0, 1} and determinant +1, identity first.
fn basis_candidates() -> &'static [Matrix3<BaseInt>] {
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
            if det3(&m) == 1 && m != Matrix3::identity() {
                candidates.push(m);
            }
        }
        candidates
    })
}

/// Quantities any change of basis preserves, including one to a different cell of the lattice.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invariants {
    n_smx: usize,
    centric: bool,
    rotation_types: Vec<i8>,
}

impl Invariants {
    fn new(group: &SpaceGroup) -> Self {
        Self {
            n_smx: group.n_smx(),
            centric: group.is_centric(),
            rotation_types: group.rotation_types(),
        }
    }
}

/// Every point of the origin search grid, starting from the origin.
pub fn origin_shifts() -> impl Iterator<Item = Vector3<Frac>> {
    let step = DENOM / ORIGIN_GRID;
    let coord = move |i: BaseInt| Frac::new_with_numerator(i * step);
    (0..ORIGIN_GRID).flat_map(move |i| {
        (0..ORIGIN_GRID).flat_map(move |j| {
            (0..ORIGIN_GRID).map(move |k| Vector3::new(coord(i), coord(j), coord(k)))
        })
    })
}

/// The origin shifts `s` for which `(P, s)` conjugates `group` onto `target`, in search order.
/// `gens` must generate `group` together with its lattice translations. Returns `None` when the
/// matrix alone already rules out a match: it isn't unimodular, it doesn't map the lattice
/// translations onto those of `target`, or it maps some rotation outside of `target`.
pub fn conjugating_shifts<'a>(
    group: &SpaceGroup,
    gens: &[Isometry],
    target: &'a SpaceGroup,
    p: &Matrix3<BaseInt>,
) -> Option<impl Iterator<Item = Vector3<Frac>> + 'a> {
    let det = det3(p);
    if det.abs() != 1 {
        return None;
    }
    let p_inv = adjugate3(p) * det;
    let p_frac = p.map(|x| frac!(x));

    if !group
        .ltr()
        .iter()
        .all(|t| target.contains_ltr(&(p_frac * t)))
    {
        return None;
    }

    // (R, t) becomes (P R P^-1, P t + (I - P R P^-1) s) after shifting the origin by s
    let mut conjugated = Vec::with_capacity(gens.len());
    for g in gens {
        let r = g.rot_int()?;
        let r_new = p * r * p_inv;
        if !target.smx().iter().any(|op| op.rot_int() == Some(r_new)) {
            return None;
        }
        let i_minus_r = (Matrix3::identity() - r_new).map(|x| frac!(x));
        conjugated.push((r_new, p_frac * g.tau(), i_minus_r));
    }

    Some(origin_shifts().filter(move |shift| {
        conjugated.iter().all(|(r, t, i_minus_r)| {
            target.contains(&Isometry::from_int_rot(*r, t + i_minus_r * shift))
        })
    }))
}

/// The first unimodular change of basis in search order that maps `group` onto `target`.
fn search_unimodular(group: &SpaceGroup, target: &SpaceGroup) -> Option<Isometry> {
    // with the same point group order and lattice index, mapping into the target is mapping onto it
    if group.n_ltr() != target.n_ltr() {
        return None;
    }
    let gens = group.generators();
    basis_candidates().iter().find_map(|p| {
        conjugating_shifts(group, &gens, target, p)
            .and_then(|mut shifts| shifts.next())
            .map(|shift| Isometry::from_int_rot(*p, shift))
    })
}

/// Searches between primitive cells of both lattices, then composes the result with the two cell
/// changes. The change of basis can have fractional entries.
fn search_primitive(group: &SpaceGroup, target: &SpaceGroup) -> Option<Isometry> {
    let (group_p, to_group_p) = group.primitive_setting().ok()?;
    let (target_p, to_target_p) = target.primitive_setting().ok()?;
    let cb_p = search_unimodular(&group_p, &target_p)?;
    let cb = to_target_p.inv_affine().ok()? * cb_p * to_group_p;
    trace!(cb = %cb, "matched through primitive cells");
    Some(cb)
}

/// Finds a change of basis `cb` such that conjugating `group` by it gives exactly `target`, or
/// `None` if the search finds none.
pub fn find_change_of_basis(group: &SpaceGroup, target: &SpaceGroup) -> Option<Isometry> {
    if Invariants::new(group) != Invariants::new(target) {
        return None;
    }
    search_unimodular(group, target).or_else(|| search_primitive(group, target))
}

/// The tabulated setting that has exactly the same operations as the group, if there is one. The
/// first such setting in table order wins.
pub fn match_tabulated_settings(group: &SpaceGroup) -> Option<&'static SettingRecord> {
    tabulated_groups()
        .iter()
        .find(|(_, g)| g.same_operations(group))
        .map(|(rec, _)| *rec)
}

/// How a group relates to the tabulated settings, given the setting the input symbol named (if
/// any).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingMatch {
    /// The group is the setting the input symbol named: anything added to it was redundant.
    SameAsInput(&'static SettingRecord),
    /// The group is exactly this tabulated setting.
    Tabulated(&'static SettingRecord),
    /// The group isn't any tabulated setting.
    Untabulated,
}

impl SettingMatch {
    pub fn new(group: &SpaceGroup, input: Option<&SettingRecord>) -> Self {
        match match_tabulated_settings(group) {
            Some(rec)
                if input.is_some_and(|inp| {
                    inp.extended_hermann_mauguin() == rec.extended_hermann_mauguin()
                }) =>
            {
                Self::SameAsInput(rec)
            }
            Some(rec) => Self::Tabulated(rec),
            None => Self::Untabulated,
        }
    }
}

/// A space group together with its type: the tabulated reference setting it is equivalent to and
/// the change of basis that maps it there.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGroupType {
    group: SpaceGroup,
    reference: &'static SettingRecord,
    /// Maps coordinates in the group's setting to coordinates in the reference setting.
    cb_op: Isometry,
}

impl SpaceGroupType {
    /// Identifies the type of a group. Returns `None` if the group isn't one of the 230 types, or
    /// if its setting is too far from any tabulated one for the search to find.
    pub fn new(group: &SpaceGroup) -> Option<Self> {
        let found = tabulated_groups()
            .iter()
            .filter(|(rec, _)| rec.is_reference())
            .find_map(|(rec, reference)| {
                find_change_of_basis(group, reference).map(|cb_op| (*rec, cb_op))
            });

        match found {
            Some((reference, cb_op)) => {
                debug!(
                    number = reference.number,
                    cb_op = %cb_op,
                    "identified space group type"
                );
                Some(Self {
                    group: group.clone(),
                    reference,
                    cb_op,
                })
            }
            None => {
                debug!(order_z = group.order_z(), "no matching space group type");
                None
            }
        }
    }

    /// The space group number, 1 to 230.
    pub fn number(&self) -> u8 {
        self.reference.number
    }

    pub fn group(&self) -> &SpaceGroup {
        &self.group
    }

    /// The tabulated setting the group was matched to.
    pub fn reference(&self) -> &'static SettingRecord {
        self.reference
    }

    /// The change of basis from the group's setting to the reference setting.
    pub fn cb_op(&self) -> &Isometry {
        &self.cb_op
    }

    /// The change of basis from the reference setting back to the group's setting.
    pub fn cb_op_inv(&self) -> Result<Isometry, IsometryError> {
        self.cb_op.inv_affine()
    }

    /// A Hall symbol for the group in its own setting: the reference Hall symbol, followed by the
    /// change of basis back from the reference setting in parentheses unless that is the identity.
    pub fn hall_symbol(&self) -> Result<String, IsometryError> {
        let cb_inv = self.cb_op_inv()?;
        if cb_inv == Isometry::identity() {
            Ok(self.reference.hall.to_string())
        } else {
            Ok(format!("{} ({})", self.reference.hall, cb_inv))
        }
    }

    /// Whether the type is one of the 11 enantiomorphic pairs: the mirror image of the group has a
    /// different type.
    pub fn is_enantiomorphic(&self) -> bool {
        self.group.is_chiral()
            && self
                .group
                .change_basis(&Isometry::inversion())
                .ok()
                .and_then(|mirrored| SpaceGroupType::new(&mirrored))
                .is_some_and(|t| t.number() != self.number())
    }
}

/// The space group number of a group, or 0 if it doesn't match any type.
pub fn space_group_number(group: &SpaceGroup) -> u8 {
    SpaceGroupType::new(group).map_or(0, |t| t.number())
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        hall::HallGroupSymbol,
        symbols::{lookup, Convention},
    };

    fn group(hall: &str) -> SpaceGroup {
        HallGroupSymbol::from_str(hall).unwrap().space_group().unwrap()
    }

    fn op(s: &str) -> Isometry {
        Isometry::from_str(s).unwrap()
    }

    #[test]
    fn test_candidates() {
        let candidates = basis_candidates();
        assert_eq!(candidates[0], Matrix3::identity());
        assert!(candidates.iter().all(|m| det3(m) == 1));
        assert_eq!(
            candidates
                .iter()
                .filter(|m| **m == Matrix3::identity())
                .count(),
            1
        );
    }

    #[test]
    fn test_exact_settings() {
        for hall in ["P 2 2", "-P 2ybc", "R 3 -2\"c", "-F 4vw 2vw 3", "P 2c -2ac"] {
            let g = group(hall);
            let rec = match_tabulated_settings(&g).unwrap();
            let t = SpaceGroupType::new(&g).unwrap();
            assert_eq!(t.number(), rec.number, "{hall}");
        }
        assert_eq!(match_tabulated_settings(&group("P 2 2")).unwrap().number, 16);
        assert_eq!(space_group_number(&group("-P 2ybc")), 14);
        assert_eq!(space_group_number(&group("P 2c -2ac")), 29);
    }

    #[test]
    fn test_nonstandard_settings() {
        // every tabulated setting of these types maps back to the reference
        for number in [5, 14, 15, 62, 68, 146, 167, 227] {
            for rec in crate::symbols::settings_for_number(number) {
                let g = rec.space_group().unwrap();
                let t = SpaceGroupType::new(&g).unwrap();
                assert_eq!(t.number(), number, "{}", rec.hall);
                let reference = t.reference().space_group().unwrap();
                assert!(
                    g.change_basis(t.cb_op()).unwrap().same_operations(&reference),
                    "{}",
                    rec.hall
                );
            }
        }
    }

    #[test]
    fn test_shifted_origin() {
        // P 21 21 21 with the origin moved by (1/8, 1/4, 3/8)
        let g = group("P 2ac 2ab")
            .change_basis(&op("x+1/8,y+1/4,z+3/8"))
            .unwrap();
        assert_eq!(match_tabulated_settings(&g), None);
        assert_eq!(space_group_number(&g), 19);
        assert_eq!(SettingMatch::new(&g, None), SettingMatch::Untabulated);

        let t = SpaceGroupType::new(&g).unwrap();
        assert!(t.hall_symbol().unwrap().starts_with("P 2ac 2ab ("));
        let standard = SpaceGroupType::new(&group("P 2ac 2ab")).unwrap();
        assert_eq!(standard.hall_symbol().unwrap(), "P 2ac 2ab");
    }

    #[test]
    fn test_centred_cells() {
        for (hall, number) in [
            ("C 1", 1),
            ("-C 1", 2),
            ("I -1", 2),
            ("F -1", 2),
            ("-I 1", 2),
            ("C 4", 75),
        ] {
            let g = group(hall);
            let t = SpaceGroupType::new(&g).unwrap();
            assert_eq!(t.number(), number, "{hall}");
            let reference = t.reference().space_group().unwrap();
            assert!(
                g.change_basis(t.cb_op()).unwrap().same_operations(&reference),
                "{hall}"
            );
        }
    }

    #[test]
    fn test_sub_cell() {
        // a twofold screw with an eighth of a cell translation: its square is a quarter-cell
        // translation, so the group is P 1 1 21 on a cell a quarter as long
        let mut g = SpaceGroup::new();
        g.expand_smx(op("-x,-y,z+1/8")).unwrap();
        assert_eq!(g.n_ltr(), 4);
        assert_eq!(match_tabulated_settings(&g), None);
        assert_eq!(space_group_number(&g), 4);
    }

    #[test]
    fn test_no_match() {
        // a twofold along b sheared by c -> c + 2b: mapping it back needs a basis change with a
        // coefficient of 2, which the search doesn't try
        let g = group("P 2y").change_basis(&op("x,y+2*z,z")).unwrap();
        assert_eq!(g.smx()[1].to_string(), "-x,y-4*z,-z");
        assert_eq!(space_group_number(&g), 0);
        assert_eq!(match_tabulated_settings(&g), None);
    }

    #[test]
    fn test_hall_symbol_round_trip() {
        let shifted = group("P 2ac 2ab")
            .change_basis(&op("x+1/8,y+1/4,z+3/8"))
            .unwrap();
        let centred = group("C 4");
        for g in [shifted, centred] {
            let hall = SpaceGroupType::new(&g).unwrap().hall_symbol().unwrap();
            let parsed = HallGroupSymbol::from_str(&hall).unwrap().space_group().unwrap();
            assert!(parsed.same_operations(&g), "{hall}");
        }
    }

    #[test]
    fn test_setting_match() {
        let rec = lookup("P 21/c", Convention::Default).unwrap();
        let mut g = rec.space_group().unwrap();
        g.expand_smx(op("-x,-y,-z")).unwrap();
        assert_eq!(SettingMatch::new(&g, Some(rec)), SettingMatch::SameAsInput(rec));

        let p2 = lookup("P 2", Convention::Default).unwrap();
        let mut g = p2.space_group().unwrap();
        g.expand_smx(op("-x,-y,-z")).unwrap();
        assert_eq!(
            SettingMatch::new(&g, Some(p2)),
            SettingMatch::Tabulated(lookup("P 2/m", Convention::Default).unwrap())
        );
    }

    #[test]
    fn test_enantiomorphic() {
        let p31 = SpaceGroupType::new(&group("P 31")).unwrap();
        assert_eq!(p31.number(), 144);
        assert!(p31.is_enantiomorphic());

        let p3 = SpaceGroupType::new(&group("P 3")).unwrap();
        assert!(!p3.is_enantiomorphic());

        let p41212 = SpaceGroupType::new(&group("P 4abw 2nw")).unwrap();
        assert_eq!(p41212.number(), 92);
        assert!(p41212.is_enantiomorphic());

        // chiral but not enantiomorphic
        let p212121 = SpaceGroupType::new(&group("P 2ac 2ab")).unwrap();
        assert!(!p212121.is_enantiomorphic());
    }
}
