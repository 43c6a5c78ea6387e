// Generates the table of tabulated space group settings and its symbol index from the CSV file.

// The settings are the 530 Hall symbols of Hall, S. R. (1981) Acta Cryst. A37, 517-525, with the
// Hermann-Mauguin symbols and setting qualifiers of ITA.

use std::collections::HashSet;
use std::env;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SettingRow {
    number: u8,
    schoenflies: String,
    qualifier: String,
    hermann_mauguin: String,
    extension: String,
    hall: String,
}

/// Must agree with `symbols::normalize_symbol`.
fn normalize(s: &str) -> String {
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

/// The short form of a full monoclinic symbol: `P 1 21/c 1` becomes `P 21/c`.
fn short_monoclinic(hm: &str) -> Option<String> {
    let tokens: Vec<&str> = hm.split_whitespace().collect();
    if tokens.len() != 4 {
        return None;
    }
    let kept: Vec<&str> = tokens[1..].iter().copied().filter(|t| *t != "1").collect();
    match kept.as_slice() {
        [single] => Some(format!("{} {}", tokens[0], single)),
        _ => None,
    }
}

/// The unique axis of a monoclinic qualifier, without the cell choice: `-b2` becomes `-b`.
fn unique_axis(qualifier: &str) -> &str {
    qualifier.trim_end_matches(|c| matches!(c, '1'..='3'))
}

fn main() -> Result<(), Box<dyn StdError>> {
    let out_dir = env::var_os("OUT_DIR").ok_or(env::VarError::NotPresent)?;
    let mut table_path = env::current_dir()?;
    table_path.push("data/space_group_settings.csv");

    let mut reader = csv::Reader::from_reader(File::open(table_path)?);
    let rows: Vec<SettingRow> = reader.deserialize().collect::<Result<_, _>>()?;

    let mut records = String::new();
    for row in &rows {
        writeln!(
            records,
            "    SettingRecord {{ number: {}, schoenflies: {:?}, qualifier: {:?}, hermann_mauguin: {:?}, extension: {:?}, hall: {:?} }},",
            row.number, row.schoenflies, row.qualifier, row.hermann_mauguin, row.extension, row.hall
        )?;
    }

    // every way of writing a symbol, mapped to the first setting in table order that it names
    let mut seen = HashSet::new();
    let mut index = String::new();
    let mut add_key = |key: String, i: usize| -> std::fmt::Result {
        if seen.insert(key.clone()) {
            writeln!(index, "    {:?} => {},", key, i)?;
        }
        Ok(())
    };

    for (i, row) in rows.iter().enumerate() {
        let mut bases = vec![
            normalize(&row.hermann_mauguin),
            normalize(&row.schoenflies),
            row.number.to_string(),
        ];
        if (3..=15).contains(&row.number) {
            if let Some(short) = short_monoclinic(&row.hermann_mauguin) {
                bases.push(normalize(&short));
            }
        }

        let mut suffixes = vec![String::new()];
        if !row.extension.is_empty() {
            suffixes.push(format!(":{}", row.extension.to_lowercase()));
        }
        if !row.qualifier.is_empty() {
            suffixes.push(format!(":{}", row.qualifier.to_lowercase()));
            if row.number <= 15 {
                suffixes.push(format!(":{}", unique_axis(&row.qualifier)));
            }
        }

        for base in &bases {
            for suffix in &suffixes {
                add_key(format!("{base}{suffix}"), i)?;
            }
        }
    }

    let n_rows = rows.len();
    let dest_path = Path::new(&out_dir).join("settings_table.rs");
    std::fs::write(
        dest_path,
        format!(
            r#"
/// Every tabulated setting, in ITA order: by number, then with the standard setting first.
pub static SETTINGS: [SettingRecord; {n_rows}] = [
{records}];

/// Normalized symbols (Hermann-Mauguin, Schoenflies, or number, with an optional `:` suffix for
/// the extension or qualifier) mapped to indices into [`SETTINGS`].
static SYMBOL_INDEX: phf::Map<&'static str, usize> = phf::phf_map! {{
{index}}};
"#
        ),
    )?;

    println!("cargo:rerun-if-changed=data/space_group_settings.csv");
    println!("cargo:rerun-if-changed=codegen/build.rs");

    Ok(())
}
