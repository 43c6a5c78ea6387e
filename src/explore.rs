//! The whole analysis in one place: from a symbol and optional extra operations to a group, its
//! type, and everything derived from it.
//!
//! [`Exploration`] holds structured results. Its `Display` implementation renders them as a plain
//! text report with tables.

use std::fmt::{Display, Write as _};

use tabled::{builder::Builder, settings::Style, Table};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    brick::{Brick, BrickError},
    gridding::Gridding,
    hall::{HallError, HallGroupSymbol},
    isometry::{Isometry, IsometryError},
    lattice::CentringType,
    matching::{SettingMatch, SpaceGroupType},
    normalizer::{EuclideanNormalizer, NormalizerError},
    parsing::{parse_complete, shelx_card, ParseError, ShelxCard},
    sampling::SamplingError,
    seminvariant::{SeminvariantError, StructureSeminvariants},
    spacegroup::{SpaceGroup, SpaceGroupError},
    symbols::{lookup, standard_setting, Convention, SettingRecord},
    symmop::{FloatTriple, OperationInfo, SymmOpError},
    wyckoff::WyckoffTable,
};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ExploreError {
    #[error("{}\n{}", .0.caret(), .0)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Hall(HallError),
    #[error(transparent)]
    SpaceGroup(#[from] SpaceGroupError),
    #[error(transparent)]
    SymmOp(#[from] SymmOpError),
    #[error(transparent)]
    Seminvariant(#[from] SeminvariantError),
    #[error(transparent)]
    Isometry(#[from] IsometryError),
}

impl From<HallError> for ExploreError {
    fn from(e: HallError) -> Self {
        match e {
            HallError::Parse(p) => Self::Parse(p),
            other => Self::Hall(other),
        }
    }
}

/// What to explore: a symbol, how to read it, and anything to add to the group it names.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExploreInput {
    /// A space group symbol. Empty means `P 1`.
    pub symbol: String,
    pub convention: Convention,
    /// SHELX `LATT` numbers, applied first.
    pub latt: Vec<i32>,
    /// Operations added after the `LATT` cards.
    pub operations: Vec<Isometry>,
}

impl ExploreInput {
    pub fn new(symbol: impl Into<String>, convention: Convention) -> Self {
        Self {
            symbol: symbol.into().trim().to_string(),
            convention,
            ..Default::default()
        }
    }

    /// Adds operations given as text: one SHELX `LATT` or `SYMM` card per line, or triplets
    /// separated by newlines or semicolons.
    pub fn with_operations(mut self, text: &str) -> Result<Self, ParseError> {
        for line in text.lines() {
            let s = line.trim();
            let card = s.get(..4).map(str::to_ascii_uppercase);
            if matches!(card.as_deref(), Some("LATT" | "SYMM")) {
                match parse_complete(s, shelx_card)? {
                    ShelxCard::Latt(n) => self.latt.push(n),
                    ShelxCard::Symm(op) => self.operations.push(op),
                }
                continue;
            }
            for triplet in s.split(';').map(str::trim).filter(|t| !t.is_empty()) {
                self.operations.push(triplet.parse()?);
            }
        }
        Ok(self)
    }
}

/// Grid factors implied by each kind of symmetry.
#[derive(Debug, Clone, PartialEq)]
pub struct GridFactors {
    pub space_group: Gridding,
    pub seminvariants: Gridding,
    pub normalizer: Result<Gridding, NormalizerError>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Exploration {
    pub input: ExploreInput,
    /// The setting the symbol named, unless it was read as a Hall symbol.
    pub symbol_lookup: Option<&'static SettingRecord>,
    pub group: SpaceGroup,
    pub group_type: Option<SpaceGroupType>,
    /// Whether the mirror image of the group has a different type.
    pub enantiomorphic: bool,
    pub added_operations: Vec<OperationInfo>,
    pub operations: Vec<OperationInfo>,
    pub brick: Result<Brick, BrickError>,
    /// Only for Hall symbols or when operations were added.
    pub setting_match: Option<SettingMatch>,
    pub wyckoff: Result<WyckoffTable, SamplingError>,
    pub seminvariants: StructureSeminvariants,
    pub normalizer: Result<EuclideanNormalizer, NormalizerError>,
    pub grid_factors: GridFactors,
}

impl Exploration {
    pub fn new(mut input: ExploreInput) -> Result<Self, ExploreError> {
        info!(symbol = %input.symbol, convention = ?input.convention, "exploring space group");

        let lookup_symbol = if input.symbol.is_empty() {
            "P 1"
        } else {
            input.symbol.as_str()
        };
        let symbol_lookup = match input.convention {
            Convention::Hall => None,
            convention => {
                let found = lookup(lookup_symbol, convention);
                if found.is_none() {
                    debug!(symbol = lookup_symbol, "not a tabulated symbol, reading it as Hall");
                    input.convention = Convention::Hall;
                }
                found
            }
        };
        let hall = symbol_lookup.map_or(lookup_symbol, |rec| rec.hall);

        let mut group = hall.parse::<HallGroupSymbol>()?.space_group()?;
        for &n in &input.latt {
            debug!(latt = n, "adding SHELX LATT");
            group.expand_latt(n)?;
        }
        let mut added_operations = vec![];
        for op in &input.operations {
            added_operations.push(OperationInfo::new(op)?);
            group.expand_smx(*op)?;
        }

        let group_type = SpaceGroupType::new(&group);
        let enantiomorphic = group_type
            .as_ref()
            .is_some_and(SpaceGroupType::is_enantiomorphic);
        let operations = group
            .all_ops()
            .iter()
            .map(OperationInfo::new)
            .collect::<Result<Vec<_>, _>>()?;

        let brick = Brick::new(&group);
        if let Err(e) = &brick {
            warn!(error = %e, "no asymmetric-unit brick");
        }

        let setting_match = (input.convention == Convention::Hall || !input.operations.is_empty())
            .then(|| SettingMatch::new(&group, symbol_lookup));

        let wyckoff = WyckoffTable::new(&group);
        let seminvariants = StructureSeminvariants::new(&group)?;
        let normalizer = EuclideanNormalizer::new(&group);
        if let Err(e) = &normalizer {
            warn!(error = %e, "Euclidean normalizer search failed");
        }

        let grid_factors = GridFactors {
            space_group: Gridding::of_group(&group),
            seminvariants: Gridding::of_seminvariants(&seminvariants),
            normalizer: match &normalizer {
                Ok(n) => Gridding::of_normalizer(&group, n, &seminvariants).map_err(Into::into),
                Err(e) => Err(e.clone()),
            },
        };

        info!(
            number = group_type.as_ref().map_or(0, SpaceGroupType::number),
            order_z = group.order_z(),
            "explored space group"
        );

        Ok(Self {
            input,
            symbol_lookup,
            group,
            group_type,
            enantiomorphic,
            added_operations,
            operations,
            brick,
            setting_match,
            wyckoff,
            seminvariants,
            normalizer,
            grid_factors,
        })
    }
}

const OPERATION_HEADER: [&str; 5] = [
    "Matrix",
    "Rotation-part type",
    "Axis direction",
    "Screw/glide component",
    "Origin shift",
];

fn operation_table<'a>(infos: impl IntoIterator<Item = &'a OperationInfo>) -> Table {
    let mut builder = Builder::default();
    builder.push_record(OPERATION_HEADER);
    for info in infos {
        let [rtype, axis, intrinsic, shift] = info.columns();
        builder.push_record([info.op.to_string(), rtype, axis, intrinsic, shift]);
    }
    let mut table = builder.build();
    table.with(Style::ascii());
    table
}

fn wyckoff_table(table: &WyckoffTable) -> Table {
    let mut builder = Builder::default();
    builder.push_record([
        "Wyckoff letter",
        "Multiplicity",
        "Site symmetry point group type",
        "Representative special position operator",
    ]);
    for pos in table.positions() {
        builder.push_record([
            pos.letter.to_string(),
            pos.multiplicity.to_string(),
            pos.site_symmetry_symbol().to_string(),
            pos.representative.to_string(),
        ]);
    }
    let mut table = builder.build();
    table.with(Style::ascii());
    table
}

/// Indents every line of a block of text.
fn indented(text: &str, indent: &str) -> String {
    text.lines().fold(String::new(), |mut out, line| {
        let _ = writeln!(out, "{indent}{line}");
        out
    })
}

impl Display for Exploration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let group = &self.group;

        if !self.input.symbol.is_empty() {
            writeln!(f, "Input space group symbol: {}", self.input.symbol)?;
            writeln!(f, "Convention: {}", self.input.convention)?;
            writeln!(f)?;
        }
        if let Some(rec) = self.symbol_lookup {
            writeln!(f, "Result of symbol lookup:")?;
            write!(f, "{}", indented(&rec.to_string(), "  "))?;
            writeln!(f)?;
        }

        for &n in &self.input.latt {
            writeln!(f, "Addition of SHELX LATT {}:", n)?;
            if n > 0 {
                writeln!(f, "  Addition of centre of inversion at the origin.")?;
            }
            if let Some(c) = CentringType::from_latt(n) {
                writeln!(
                    f,
                    "  Addition of lattice translations for centring type {}.",
                    c.letter()
                )?;
            }
            writeln!(f)?;
        }
        if !self.added_operations.is_empty() {
            writeln!(f, "Addition of symmetry operations:")?;
            writeln!(f, "{}", operation_table(&self.added_operations))?;
            writeln!(f)?;
        }

        writeln!(f, "Number of lattice translations: {}", group.n_ltr())?;
        if group.is_centric() {
            writeln!(f, "Space group is centric.")?;
        } else {
            writeln!(f, "Space group is acentric.")?;
        }
        if group.is_chiral() {
            writeln!(f, "Space group is chiral.")?;
        }
        if self.enantiomorphic {
            writeln!(f, "Space group is enantiomorphic.")?;
        }
        writeln!(
            f,
            "Number of representative symmetry operations: {}",
            group.n_smx()
        )?;
        writeln!(f, "Total number of symmetry operations: {}", group.order_z())?;
        writeln!(f)?;
        writeln!(f, "Parallelepiped containing an asymmetric unit:")?;
        match &self.brick {
            Ok(brick) => writeln!(f, "  {}", brick)?,
            Err(e) => writeln!(f, "  {}", e)?,
        }
        writeln!(f)?;
        writeln!(f, "List of symmetry operations:")?;
        writeln!(f, "{}", operation_table(&self.operations))?;
        writeln!(f)?;

        match (&self.setting_match, &self.group_type) {
            (None, _) => {}
            (Some(SettingMatch::SameAsInput(_)), _) => {
                writeln!(f, "Additional symmetry operations are redundant.")?;
                writeln!(f)?;
            }
            (Some(SettingMatch::Tabulated(rec)), _) => {
                writeln!(f, "Symmetry operations match:")?;
                write!(f, "{}", indented(&rec.to_string(), "  "))?;
                writeln!(f)?;
            }
            (Some(SettingMatch::Untabulated), Some(t)) => {
                writeln!(f, "Space group number: {}", t.number())?;
                if let Some(standard) = standard_setting(t.number()) {
                    writeln!(
                        f,
                        "Conventional Hermann-Mauguin symbol: {}",
                        standard.extended_hermann_mauguin()
                    )?;
                }
                match t.hall_symbol() {
                    Ok(hall) => writeln!(f, "Hall symbol: {}", hall)?,
                    Err(e) => writeln!(f, "Hall symbol: {}", e)?,
                }
                writeln!(f, "Change-of-basis matrix: {}", t.cb_op())?;
                match t.cb_op_inv() {
                    Ok(inv) => writeln!(f, "               Inverse: {}", inv)?,
                    Err(e) => writeln!(f, "               Inverse: {}", e)?,
                }
                writeln!(f)?;
            }
            (Some(SettingMatch::Untabulated), None) => {
                writeln!(f, "Space group number: 0")?;
                writeln!(f, "The space group type could not be determined.")?;
                writeln!(f)?;
            }
        }

        writeln!(f, "List of Wyckoff positions:")?;
        match &self.wyckoff {
            Ok(table) => writeln!(f, "{}", wyckoff_table(table))?,
            Err(e) => writeln!(f, "  {}", e)?,
        }
        writeln!(f)?;

        writeln!(f, "Additional generators of Euclidean normalizer:")?;
        let vms = self.seminvariants.vectors_and_moduli();
        writeln!(
            f,
            "  Number of structure-seminvariant vectors and moduli: {}",
            vms.len()
        )?;
        if !vms.is_empty() {
            writeln!(f, "    Vector    Modulus")?;
            for vm in vms {
                writeln!(f, "    {}", vm)?;
            }
        }
        match &self.normalizer {
            Ok(normalizer) => {
                if let Some(centre) = normalizer.inversion_centre() {
                    writeln!(f, "  Inversion through a centre at: {}", FloatTriple(centre))?;
                }
                let further: Vec<OperationInfo> = normalizer
                    .l2n_generators()
                    .iter()
                    .filter_map(|op| OperationInfo::new(op).ok())
                    .collect();
                if !further.is_empty() {
                    writeln!(f, "  Further generators:")?;
                    writeln!(f, "{}", operation_table(&further))?;
                }
            }
            Err(e) => writeln!(f, "  {}", e)?,
        }
        writeln!(f)?;

        writeln!(f, "Grid factors implied by symmetries:")?;
        let grids = &self.grid_factors;
        writeln!(f, "  Space group: {}", grids.space_group)?;
        writeln!(
            f,
            "  Structure-seminvariant vectors and moduli: {}",
            grids.seminvariants
        )?;
        match &grids.normalizer {
            Ok(g) => writeln!(f, "  Euclidean normalizer: {}", g)?,
            Err(e) => writeln!(f, "  Euclidean normalizer: {}", e)?,
        }
        writeln!(f)?;
        writeln!(f, "  All points of a grid over the unit cell are mapped")?;
        writeln!(f, "  exactly onto other grid points only if the factors")?;
        writeln!(f, "  shown above are factors of the grid.")
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use pretty_assertions::assert_eq;

    use super::*;

    fn explore(symbol: &str, convention: Convention, ops: &str) -> Exploration {
        let input = ExploreInput::new(symbol, convention)
            .with_operations(ops)
            .unwrap();
        Exploration::new(input).unwrap()
    }

    #[test]
    fn test_input_lines() {
        let input = ExploreInput::new("P 1", Convention::Default)
            .with_operations("LATT 2\nsymm -x,-y,z\n x,y,-z ; -x,y,z;\n\n")
            .unwrap();
        assert_eq!(input.latt, vec![2]);
        assert_eq!(
            input.operations,
            ["-x,-y,z", "x,y,-z", "-x,y,z"].map(|s| Isometry::from_str(s).unwrap())
        );

        let err = ExploreInput::new("P 1", Convention::Default)
            .with_operations("LATT 9")
            .unwrap_err();
        assert_eq!(err.input, "LATT 9");
        let err = ExploreInput::new("P 1", Convention::Default)
            .with_operations("x,y,q")
            .unwrap_err();
        assert_eq!(err.input, "x,y,q");
    }

    #[test]
    fn test_symbol() {
        let e = explore("P 21/c", Convention::Default, "");
        assert_eq!(e.symbol_lookup.map(|r| r.number), Some(14));
        assert_eq!(e.group_type.as_ref().map(|t| t.number()), Some(14));
        assert_eq!(e.setting_match, None);
        assert_eq!(e.operations.len(), 4);
        let report = e.to_string();
        assert!(report.contains("Space group is centric."));
        assert!(report.contains("Hall symbol: -P 2ybc"));
        assert!(report.contains("Total number of symmetry operations: 4"));
        assert!(!report.contains("Symmetry operations match"));
    }

    #[test]
    fn test_empty_symbol() {
        let e = explore("", Convention::Default, "");
        assert_eq!(e.group.order_z(), 1);
        assert!(!e.to_string().contains("Input space group symbol"));
    }

    #[test]
    fn test_hall_fallback() {
        // not a tabulated symbol, so it is read as a Hall symbol
        let e = explore("P 2ac 2ab", Convention::Default, "");
        assert_eq!(e.input.convention, Convention::Hall);
        assert_eq!(e.symbol_lookup, None);
        match e.setting_match {
            Some(SettingMatch::Tabulated(rec)) => assert_eq!(rec.number, 19),
            other => panic!("expected a tabulated setting, got {other:?}"),
        }
    }

    #[test]
    fn test_redundant_and_added() {
        let e = explore("P 21/c", Convention::Default, "-x,-y,-z");
        assert!(matches!(e.setting_match, Some(SettingMatch::SameAsInput(_))));
        assert!(e
            .to_string()
            .contains("Additional symmetry operations are redundant."));

        let e = explore("P 2", Convention::Default, "LATT 1");
        assert_eq!(e.group.order_z(), 4);
        match e.setting_match {
            None => {}
            other => panic!("LATT alone doesn't trigger matching: {other:?}"),
        }
        let report = e.to_string();
        assert!(report.contains("Addition of SHELX LATT 1:"));
        assert!(report.contains("Addition of centre of inversion at the origin."));
    }

    #[test]
    fn test_untabulated() {
        // a C-centred P1 cell is no tabulated setting, but it is still P1
        let e = explore("P 1", Convention::Default, "x+1/2,y+1/2,z");
        assert_eq!(e.group.n_ltr(), 2);
        assert_eq!(e.setting_match, Some(SettingMatch::Untabulated));
        assert_eq!(e.group_type.as_ref().map(SpaceGroupType::number), Some(1));
        let report = e.to_string();
        assert!(report.contains("Space group number: 1\n"), "{report}");
        assert!(report.contains("Hall symbol: P 1 ("), "{report}");
        assert!(!report.contains("Symmetry operations match:"));

        let e = explore("P 1", Convention::Default, "LATT -7\n-y,x,z");
        assert_eq!(e.group_type.as_ref().map(SpaceGroupType::number), Some(75));
    }

    #[test]
    fn test_parse_error() {
        let input = ExploreInput::new("P 2x 3q", Convention::Hall);
        let err = Exploration::new(input).unwrap_err();
        assert!(matches!(err, ExploreError::Parse(_)), "{err:?}");
        assert!(err.to_string().starts_with("-->P 2x 3q<--\n"));
    }

    #[test]
    fn test_report_sections() {
        let report = explore("P 31", Convention::Default, "").to_string();
        for section in [
            "Space group is chiral.",
            "Space group is enantiomorphic.",
            "List of symmetry operations:",
            "List of Wyckoff positions:",
            "Number of structure-seminvariant vectors and moduli:",
            "Grid factors implied by symmetries:",
            "  Space group: (1, 1, 3)",
        ] {
            assert!(report.contains(section), "missing {section:?} in\n{report}");
        }
        assert!(!report.contains("Inversion through a centre at"));

        assert!(explore("P 31", Convention::Default, "").enantiomorphic);
        assert!(!explore("P 3", Convention::Default, "").enantiomorphic);
        let report = explore("P 3", Convention::Default, "").to_string();
        assert!(!report.contains("Space group is enantiomorphic."));
    }
}
