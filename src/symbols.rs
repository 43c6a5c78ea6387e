//! The table of tabulated space group settings and symbol lookup. The table is generated at build
//! time from `data/space_group_settings.csv`, with every accepted spelling of each symbol indexed in
//! a perfect hash map.

use std::{fmt::Display, str::FromStr};

use thiserror::Error;
use tracing::debug;

use crate::{
    hall::{HallError, HallGroupSymbol},
    spacegroup::SpaceGroup,
};

/// One tabulated setting of a space group type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SettingRecord {
    /// The space group number, 1 to 230.
    pub number: u8,
    /// The Schoenflies symbol, e.g. `C2h^5`.
    pub schoenflies: &'static str,
    /// Unique axis and cell choice for monoclinic groups, or the axis permutation relating an
    /// orthorhombic setting to the standard one. Empty for the standard setting.
    pub qualifier: &'static str,
    /// The full Hermann-Mauguin symbol, e.g. `P 1 21/c 1`.
    pub hermann_mauguin: &'static str,
    /// Origin choice (`1` or `2`) or axes (`H` or `R`). Empty if there is no choice.
    pub extension: &'static str,
    /// The Hall symbol.
    pub hall: &'static str,
}

include!(concat!(env!("OUT_DIR"), "/settings_table.rs"));

/// The conventions a symbol can be looked up under. They differ in which setting a symbol that
/// doesn't say otherwise refers to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Convention {
    /// Unique axis b, cell choice 1, origin choice 1, hexagonal axes.
    #[default]
    Default,
    /// International Tables Volume A (1983). Same preferences as the default.
    A1983,
    /// International Tables Volume I (1952): unique axis c and rhombohedral axes.
    I1952,
    /// The symbol is a Hall symbol.
    Hall,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Unknown convention {0:?}: expected A1983, I1952, or Hall")]
pub struct ConventionError(pub String);

impl FromStr for Convention {
    type Err = ConventionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "DEFAULT" => Ok(Self::Default),
            "A1983" => Ok(Self::A1983),
            "I1952" => Ok(Self::I1952),
            "HALL" => Ok(Self::Hall),
            _ => Err(ConventionError(s.to_string())),
        }
    }
}

impl Display for Convention {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => write!(f, "Default"),
            Self::A1983 => write!(f, "International Tables for Crystallography, Volume A 1983"),
            Self::I1952 => write!(f, "International Tables for Crystallography, Volume I 1952"),
            Self::Hall => write!(f, "Hall symbol"),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UniqueAxis {
    A,
    B,
    C,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AxisSetting {
    Hexagonal,
    Rhombohedral,
}

/// Which of the settings of a space group type a record is, where ITA offers a choice.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SettingVariant {
    NoExtension,
    /// Origin choice 1 or 2.
    OriginChoice(u8),
    /// Trigonal groups with a rhombohedral lattice on hexagonal or rhombohedral axes.
    AxisSetting(AxisSetting),
    /// Monoclinic groups: the unique axis, whether it is reversed (e.g. `-b`), and the cell choice if
    /// the group has more than one.
    UniqueAxisAndCellChoice {
        axis: UniqueAxis,
        reversed: bool,
        cell_choice: Option<u8>,
    },
}

impl Display for SettingVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoExtension => Ok(()),
            Self::OriginChoice(o) => writeln!(f, "Origin choice: {o}"),
            Self::AxisSetting(AxisSetting::Hexagonal) => {
                writeln!(f, "Trigonal using hexagonal axes")
            }
            Self::AxisSetting(AxisSetting::Rhombohedral) => {
                writeln!(f, "Trigonal using rhombohedral axes")
            }
            Self::UniqueAxisAndCellChoice {
                axis,
                reversed,
                cell_choice,
            } => {
                let sign = if *reversed { "-" } else { "" };
                let letter = format!("{axis:?}").to_lowercase();
                writeln!(f, "Unique axis: {sign}{letter}")?;
                match cell_choice {
                    Some(c) => writeln!(f, "Cell choice: {c}"),
                    None => Ok(()),
                }
            }
        }
    }
}

impl SettingRecord {
    /// The setting choice encoded in the extension and qualifier.
    pub fn variant(&self) -> SettingVariant {
        match self.extension {
            "1" => return SettingVariant::OriginChoice(1),
            "2" => return SettingVariant::OriginChoice(2),
            "H" => return SettingVariant::AxisSetting(AxisSetting::Hexagonal),
            "R" => return SettingVariant::AxisSetting(AxisSetting::Rhombohedral),
            _ => {}
        }
        if self.number > 15 || self.qualifier.is_empty() {
            return SettingVariant::NoExtension;
        }

        let reversed = self.qualifier.starts_with('-');
        let mut chars = self.qualifier.trim_start_matches('-').chars();
        let axis = match chars.next() {
            Some('a') => UniqueAxis::A,
            Some('b') => UniqueAxis::B,
            Some('c') => UniqueAxis::C,
            _ => return SettingVariant::NoExtension,
        };
        let cell_choice = chars.next().and_then(|c| c.to_digit(10)).map(|d| d as u8);
        SettingVariant::UniqueAxisAndCellChoice {
            axis,
            reversed,
            cell_choice,
        }
    }

    /// The Hermann-Mauguin symbol with the extension, e.g. `P n n n :2`.
    pub fn extended_hermann_mauguin(&self) -> String {
        if self.extension.is_empty() {
            self.hermann_mauguin.to_string()
        } else {
            format!("{} :{}", self.hermann_mauguin, self.extension)
        }
    }

    /// The axis permutation relating an orthorhombic setting to the standard one, if this isn't
    /// the standard setting.
    pub fn relation_to_standard(&self) -> Option<&'static str> {
        (self.number > 15 && !self.qualifier.is_empty()).then_some(self.qualifier)
    }

    pub fn hall_symbol(&self) -> Result<HallGroupSymbol, HallError> {
        self.hall.parse()
    }

    /// Generates the group from the Hall symbol.
    pub fn space_group(&self) -> Result<SpaceGroup, HallError> {
        self.hall_symbol()?.space_group()
    }

    /// Whether this is the first tabulated setting of its type on its kind of axes. Groups are
    /// matched against these.
    pub fn is_reference(&self) -> bool {
        reference_setting(self.number, self.extension == "R") == Some(self)
    }
}

impl Display for SettingRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Space group number: {}", self.number)?;
        writeln!(f, "Schoenflies symbol: {}", self.schoenflies)?;
        writeln!(f, "Hermann-Mauguin symbol: {}", self.hermann_mauguin)?;
        write!(f, "{}", self.variant())?;
        if let Some(q) = self.relation_to_standard() {
            writeln!(f, "Relation to standard setting: {q}")?;
        }
        writeln!(f, "Hall symbol: {}", self.hall)
    }
}

/// Removes whitespace and underscores and fixes the case: the lattice letter in upper case and
/// everything else in lower case, so `p 21/C` and `P2_1/c` both become `P21/c`.
pub fn normalize_symbol(s: &str) -> String {
    let lower: String = s
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_')
        .flat_map(char::to_lowercase)
        .collect();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => lower,
    }
}

/// The suffixes tried, in order, for a symbol that doesn't give one explicitly.
fn default_suffixes(convention: Convention) -> &'static [&'static str] {
    match convention {
        Convention::I1952 => &[":c1", ":c", ":r", ""],
        _ => &[""],
    }
}

/// Looks up a space group symbol: a Hermann-Mauguin symbol (full or, for monoclinic groups,
/// short), a Schoenflies symbol, or a number, optionally followed by `:` and an extension or
/// qualifier, e.g. `R 3 :R`, `P n n n :2`, or `P 1 21/c 1 :b2`. An empty symbol is `P 1`. Under
/// [`Convention::Hall`] the symbol must be the Hall symbol of a tabulated setting, up to spacing.
pub fn lookup(symbol: &str, convention: Convention) -> Option<&'static SettingRecord> {
    let symbol = match symbol.trim() {
        "" => "P 1",
        s => s,
    };

    if convention == Convention::Hall {
        let key = normalize_symbol(symbol);
        return SETTINGS
            .iter()
            .find(|rec| normalize_symbol(rec.hall) == key);
    }

    let (base, suffix) = match symbol.split_once(':') {
        Some((base, suffix)) => (base, Some(suffix)),
        None => (symbol, None),
    };
    let base = normalize_symbol(base);

    let found = match suffix {
        Some(suffix) => {
            let suffix: String = suffix
                .chars()
                .filter(|c| !c.is_whitespace())
                .flat_map(char::to_lowercase)
                .collect();
            SYMBOL_INDEX.get(format!("{base}:{suffix}").as_str())
        }
        None => default_suffixes(convention)
            .iter()
            .find_map(|suffix| SYMBOL_INDEX.get(format!("{base}{suffix}").as_str())),
    };

    let record = found.and_then(|&i| SETTINGS.get(i));
    debug!(symbol, ?convention, found = ?record.map(|r| r.extended_hermann_mauguin()), "symbol lookup");
    record
}

/// Every tabulated setting of a space group type.
pub fn settings_for_number(number: u8) -> impl Iterator<Item = &'static SettingRecord> {
    SETTINGS.iter().filter(move |rec| rec.number == number)
}

/// The first tabulated setting of a space group type: on rhombohedral axes for the seven
/// rhombohedral groups if `rhombohedral` is set, otherwise the standard setting.
pub fn reference_setting(number: u8, rhombohedral: bool) -> Option<&'static SettingRecord> {
    settings_for_number(number).find(|rec| (rec.extension == "R") == rhombohedral)
}

/// The standard setting of a space group type.
pub fn standard_setting(number: u8) -> Option<&'static SettingRecord> {
    reference_setting(number, false)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn hm(symbol: &str, convention: Convention) -> Option<String> {
        lookup(symbol, convention).map(|r| r.extended_hermann_mauguin())
    }

    #[test]
    fn test_table() {
        assert_eq!(SETTINGS.len(), 530);
        assert_eq!(SETTINGS[0].hall, "P 1");
        for n in 1..=230 {
            assert!(standard_setting(n).is_some(), "{n}");
        }
        assert_eq!(SETTINGS.iter().filter(|r| r.extension == "R").count(), 7);
        assert!(SETTINGS.iter().all(|r| (1..=230).contains(&r.number)));
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_symbol("p 21/C"), "P21/c");
        assert_eq!(normalize_symbol("P2_1/c"), "P21/c");
        assert_eq!(normalize_symbol(" F d -3 m"), "Fd-3m");
        assert_eq!(normalize_symbol(""), "");
        // every tabulated symbol finds its own setting
        for rec in SETTINGS.iter() {
            let key = match rec.extension {
                "" => rec.hermann_mauguin.to_string(),
                ext => format!("{}:{}", rec.hermann_mauguin, ext),
            };
            assert_eq!(lookup(&key, Convention::Default), Some(rec), "{key}");
        }
    }

    #[test]
    fn test_lookup() {
        let d = Convention::Default;
        assert_eq!(hm("P 21/c", d).as_deref(), Some("P 1 21/c 1"));
        assert_eq!(hm("P21/n", d).as_deref(), Some("P 1 21/n 1"));
        assert_eq!(hm("14", d).as_deref(), Some("P 1 21/c 1"));
        assert_eq!(hm("C2h^5", d).as_deref(), Some("P 1 21/c 1"));
        assert_eq!(hm("R 3", d).as_deref(), Some("R 3 :H"));
        assert_eq!(hm("R 3:r", d).as_deref(), Some("R 3 :R"));
        assert_eq!(hm("Pnnn", d).as_deref(), Some("P n n n :1"));
        assert_eq!(hm("P n n n :2", d).as_deref(), Some("P n n n :2"));
        assert_eq!(hm("227", d).as_deref(), Some("F d -3 m :1"));
        assert_eq!(hm("15:b2", d).as_deref(), Some("A 1 2/n 1"));
        assert_eq!(hm("C 2/c:-a1", d).as_deref(), Some("C 2/c 1 1"));
        assert_eq!(hm("", d).as_deref(), Some("P 1"));
        assert_eq!(hm("X 9", d), None);
        assert_eq!(hm("231", d), None);
    }

    #[test]
    fn test_conventions() {
        let i = Convention::I1952;
        assert_eq!(hm("P 2", i).as_deref(), Some("P 1 1 2"));
        assert_eq!(hm("R -3", i).as_deref(), Some("R -3 :R"));
        assert_eq!(hm("P 21/c", i).as_deref(), Some("P 1 21/c 1"));
        assert_eq!(hm("P 2", Convention::A1983).as_deref(), Some("P 1 2 1"));
        assert_eq!(hm("-P 2ybc", Convention::Hall).as_deref(), Some("P 1 21/c 1"));
        assert_eq!(hm("-P2ybc", Convention::Hall).as_deref(), Some("P 1 21/c 1"));

        assert_eq!("a1983".parse(), Ok(Convention::A1983));
        assert_eq!("".parse(), Ok(Convention::Default));
        assert!("B1999".parse::<Convention>().is_err());
    }

    #[test]
    fn test_variants() {
        let rec = |s| lookup(s, Convention::Default).unwrap().variant();
        assert_eq!(rec("P n n n:2"), SettingVariant::OriginChoice(2));
        assert_eq!(
            rec("R 3:R"),
            SettingVariant::AxisSetting(AxisSetting::Rhombohedral)
        );
        assert_eq!(
            rec("P 1 1 21/b"),
            SettingVariant::UniqueAxisAndCellChoice {
                axis: UniqueAxis::C,
                reversed: false,
                cell_choice: Some(3)
            }
        );
        assert_eq!(
            rec("P 1 2 1"),
            SettingVariant::UniqueAxisAndCellChoice {
                axis: UniqueAxis::B,
                reversed: false,
                cell_choice: None
            }
        );
        assert_eq!(rec("P 21 21 21"), SettingVariant::NoExtension);

        let cab = lookup("P b a 2", Convention::Default).unwrap();
        assert_eq!(cab.relation_to_standard(), None);
        assert!(cab.is_reference());
        let perm = lookup("P 2 c b", Convention::Default).unwrap();
        assert_eq!(perm.relation_to_standard(), Some("cab"));
        assert!(!perm.is_reference());
    }

    #[test]
    fn test_every_hall_symbol_generates() {
        for rec in SETTINGS.iter() {
            let group = rec.space_group().unwrap();
            assert!(group.order_z() <= 192, "{}", rec.hall);
        }
    }
}
