//! Utilities for parsing expressions from a standard ASCII syntax that is easy to type: symmetry
//! operation triplets like `-y, x-y, z+1/3`, Hall symbols, and SHELX `LATT`/`SYMM` cards.
//!
//! Every parser here is a `nom` parser. [`parse_complete`] turns one into a function returning
//! [`ParseError`], which records where parsing stopped so that callers can point at it.

use nom::branch::alt;
use nom::bytes::complete::{tag, tag_no_case};
use nom::character::complete::{char, digit0, digit1, i32 as int32, i8, multispace0, one_of};
use nom::combinator::{cut, map, map_res, opt, recognize, value, verify};
use nom::multi::{many0, many1};
use nom::sequence::{delimited, pair, preceded, terminated, tuple};
use nom::IResult;
use thiserror::Error;

use nalgebra::{Matrix3x4, RowVector4};

use crate::fract::Frac;
use crate::hall::{
    HallAxisSymbol, HallGroupSymbol, HallOpSymbol, HallOriginShift, HallRotation,
    HallTranslationSymbol,
};
use crate::isometry::Isometry;
use crate::lattice::CentringType;

/// Malformed symmetry text. Records the whole input and the character offset at which parsing
/// stopped.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Parse error at offset {offset} of {input:?}: {message}")]
pub struct ParseError {
    /// The text that failed to parse.
    pub input: String,
    /// Offset into `input`, in bytes, where parsing stopped.
    pub offset: usize,
    /// What went wrong.
    pub message: String,
}

impl ParseError {
    pub fn new(input: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            offset: offset.min(input.len()),
            message: message.into(),
        }
    }

    /// Converts a `nom` failure on `input` into a [`ParseError`].
    pub fn from_nom(input: &str, err: nom::Err<nom::error::Error<&str>>) -> Self {
        match err {
            nom::Err::Incomplete(_) => Self::new(input, input.len(), "unexpected end of input"),
            nom::Err::Error(e) | nom::Err::Failure(e) => Self::new(
                input,
                input.len() - e.input.len(),
                format!("unexpected input ({})", e.code.description()),
            ),
        }
    }

    /// The text from the failure point onwards.
    pub fn remainder(&self) -> &str {
        self.input.get(self.offset..).unwrap_or_default()
    }

    /// Renders the input with a caret under the failure point:
    ///
    /// ```text
    /// -->x,y,<--
    /// -------^
    /// ```
    pub fn caret(&self) -> String {
        let col = self.input[..self.offset].chars().count();
        format!("-->{}<--\n{}^", self.input, "-".repeat(col + 3))
    }
}

/// Runs `parser` on the whole of `input`, allowing surrounding whitespace.
pub fn parse_complete<'a, O, F>(input: &'a str, mut parser: F) -> Result<O, ParseError>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    let (rest, out) = ws(|i| parser(i))(input).map_err(|e| ParseError::from_nom(input, e))?;
    if rest.is_empty() {
        Ok(out)
    } else {
        Err(ParseError::new(
            input,
            input.len() - rest.len(),
            "unexpected trailing input",
        ))
    }
}

/// A combinator that takes a parser `inner` and produces a parser that also consumes both leading and
/// trailing whitespace, returning the output of `inner`.
fn ws<'a, F, O>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

/// Parses a minus sign, in many formats.
pub fn minus_sign(input: &str) -> IResult<&str, char> {
    one_of("-﹣－−")(input)
}

/// Parses a slash, as of a fraction.
pub fn slash(input: &str) -> IResult<&str, char> {
    one_of("/⁄∕")(input)
}

/// Parses a sign, returning 1 or -1.
fn sign(input: &str) -> IResult<&str, i32> {
    alt((value(1, char('+')), value(-1, minus_sign)))(input)
}

/// Parses a fraction like `1/2`. Once the slash is seen there is no backtracking: a denominator
/// that is missing or not representable is a hard error at the denominator.
fn fraction(input: &str) -> IResult<&str, Frac> {
    let (rest, n) = terminated(digit1, slash)(input)?;
    cut(map_res(digit1, move |d: &str| format!("{}/{}", n, d).parse::<Frac>()))(rest)
}

/// Parses an unsigned number: a fraction like `1/2`, a decimal like `0.25`, or an integer.
pub fn number(input: &str) -> IResult<&str, Frac> {
    alt((
        fraction,
        map_res(recognize(tuple((digit0, char('.'), digit0))), |s: &str| {
            s.parse::<Frac>()
        }),
        map_res(digit1, |s: &str| s.parse::<Frac>()),
    ))(input)
}

/// Parses a coordinate variable, returning its column.
fn variable(input: &str) -> IResult<&str, usize> {
    alt((
        value(0, one_of("xX")),
        value(1, one_of("yY")),
        value(2, one_of("zZ")),
    ))(input)
}

/// One unsigned term of a coordinate: `x`, `1/2`, `2x`, or `1/2*y`. The fourth column holds the
/// constant.
fn unsigned_term(input: &str) -> IResult<&str, RowVector4<Frac>> {
    alt((
        map(
            pair(number, opt(preceded(opt(ws(char('*'))), variable))),
            |(coef, var)| {
                let mut row = RowVector4::zeros();
                row[var.unwrap_or(3)] = coef;
                row
            },
        ),
        map(variable, |var| {
            let mut row = RowVector4::zeros();
            row[var] = Frac::ONE;
            row
        }),
    ))(input)
}

/// A term with a mandatory sign.
fn signed_term(input: &str) -> IResult<&str, RowVector4<Frac>> {
    map(
        pair(sign, preceded(multispace0, unsigned_term)),
        |(s, row)| row * Frac::from(s),
    )(input)
}

/// A leading term, whose sign is optional.
fn first_term(input: &str) -> IResult<&str, RowVector4<Frac>> {
    map(
        pair(opt(sign), preceded(multispace0, unsigned_term)),
        |(s, row)| row * Frac::from(s.unwrap_or(1)),
    )(input)
}

/// Parses one coordinate of a triplet, e.g., `x - y + 1/2`.
pub fn coordinate(input: &str) -> IResult<&str, RowVector4<Frac>> {
    map(
        pair(ws(first_term), many0(ws(signed_term))),
        |(first, rest)| rest.into_iter().fold(first, |acc, row| acc + row),
    )(input)
}

/// Parses a symmetry operation written as a triplet, e.g., `-y, x-y, z+1/3`.
pub fn triplet(input: &str) -> IResult<&str, Isometry> {
    map(
        tuple((coordinate, char(','), coordinate, char(','), coordinate)),
        |(r1, _, r2, _, r3)| {
            let m = Matrix3x4::<Frac>::from_rows(&[r1, r2, r3]);
            Isometry::new_rot_tau(
                m.fixed_view::<3, 3>(0, 0).clone_owned(),
                m.column(3).clone_owned(),
            )
        },
    )(input)
}

/// A SHELX instruction card that contributes symmetry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShelxCard {
    /// `LATT n`: centring type `|n|`, centrosymmetric if `n > 0`.
    Latt(i32),
    /// `SYMM op`: one symmetry operation.
    Symm(Isometry),
}

/// Parses a `LATT n` or `SYMM op` card. The keywords are case-insensitive.
pub fn shelx_card(input: &str) -> IResult<&str, ShelxCard> {
    alt((
        map(
            preceded(
                tag_no_case("LATT"),
                cut(ws(verify(int32, |n: &i32| {
                    CentringType::from_latt(*n).is_some()
                }))),
            ),
            ShelxCard::Latt,
        ),
        map(
            preceded(tag_no_case("SYMM"), cut(ws(triplet))),
            ShelxCard::Symm,
        ),
    ))(input)
}

/// Parses a complete Hall symbol for a space group.
pub fn hall_group(input: &str) -> IResult<&str, HallGroupSymbol> {
    let (o, (has_inv, centering, gens, shift)) = tuple((
        ws(hall_sign),
        ws(hall_centering),
        many1(ws(hall_generator)),
        ws(hall_origin_shift),
    ))(input)?;

    Ok((
        o,
        HallGroupSymbol {
            has_inversion: has_inv,
            centering,
            generators: gens,
            shift: shift.unwrap_or_default(),
        },
    ))
}

/// Parses a complete Hall rotational operation.
pub fn hall_generator(input: &str) -> IResult<&str, HallOpSymbol> {
    map(
        tuple((
            hall_rotation,
            opt(hall_axis_symbol),
            many0(hall_translation_symbol),
        )),
        |(rotation, axis, translation)| HallOpSymbol {
            rotation,
            axis,
            translation,
        },
    )(input)
}

/// Parses the parenthesized suffix of a Hall symbol: an origin shift in twelfths like `(0 0 1)`,
/// or a change of basis written as a triplet like `(x-1/4,y,z)` or `(1/2*x+1/2*y,-x+y,z)`.
pub fn hall_origin_shift(input: &str) -> IResult<&str, Option<HallOriginShift>> {
    opt(delimited(
        tag("("),
        alt((
            map(tuple((ws(i8), ws(i8), ws(i8))), |(a, b, c)| {
                HallOriginShift::Twelfths(a, b, c)
            }),
            map(ws(triplet), HallOriginShift::ChangeOfBasis),
        )),
        tag(")"),
    ))(input)
}

/// Parses a Hall axis symbol.
pub fn hall_axis_symbol(input: &str) -> IResult<&str, HallAxisSymbol> {
    alt((
        value(HallAxisSymbol::X, one_of("Xx")),
        value(HallAxisSymbol::Y, one_of("Yy")),
        value(HallAxisSymbol::Z, one_of("Zz")),
        value(HallAxisSymbol::Prime, one_of("'")),
        value(HallAxisSymbol::DoublePrime, one_of("\"")),
        value(HallAxisSymbol::Star, one_of("*")),
    ))(input)
}

/// Parses a Hall translation symbol.
pub fn hall_translation_symbol(input: &str) -> IResult<&str, HallTranslationSymbol> {
    alt((
        value(HallTranslationSymbol::A, one_of("Aa")),
        value(HallTranslationSymbol::B, one_of("Bb")),
        value(HallTranslationSymbol::C, one_of("Cc")),
        value(HallTranslationSymbol::U, one_of("Uu")),
        value(HallTranslationSymbol::V, one_of("Vv")),
        value(HallTranslationSymbol::W, one_of("Ww")),
        value(HallTranslationSymbol::N, one_of("Nn")),
        value(HallTranslationSymbol::D, one_of("Dd")),
    ))(input)
}

/// Parses a Hall rotation: an optional sign, rotation order, and screw order. Rejects screws that
/// are not smaller than the order and screw rotoinversions.
pub fn hall_rotation(input: &str) -> IResult<&str, HallRotation> {
    verify(
        map(
            tuple((hall_sign, hall_rot, hall_screw)),
            |(improper, order, screw)| HallRotation {
                order,
                improper,
                screw,
            },
        ),
        |r: &HallRotation| r.screw < r.order && !(r.improper && r.screw != 0),
    )(input)
}

/// Parses a Hall sign: either a minus sign or nothing.
pub fn hall_sign(input: &str) -> IResult<&str, bool> {
    map(opt(minus_sign), |o| o.is_some())(input)
}

/// Parses a Hall rotation order: 1, 2, 3, 4, or 6.
pub fn hall_rot(input: &str) -> IResult<&str, u8> {
    alt((
        value(1, tag("1")),
        value(2, tag("2")),
        value(3, tag("3")),
        value(4, tag("4")),
        value(6, tag("6")),
    ))(input)
}

/// Parses a Hall screw, with an underscore or without.
pub fn hall_screw(input: &str) -> IResult<&str, u8> {
    map(
        pair(
            opt(tag("_")),
            opt(alt((
                value(1, tag("1")),
                value(2, tag("2")),
                value(3, tag("3")),
                value(4, tag("4")),
                value(5, tag("5")),
            ))),
        ),
        |(_underscore, s)| s.unwrap_or(0),
    )(input)
}

/// Parses a Hall centring symbol, without a sign.
pub fn hall_centering(input: &str) -> IResult<&str, CentringType> {
    alt((
        value(CentringType::P, one_of("Pp")),
        value(CentringType::A, one_of("Aa")),
        value(CentringType::B, one_of("Bb")),
        value(CentringType::C, one_of("Cc")),
        value(CentringType::I, one_of("Ii")),
        value(CentringType::R, one_of("Rr")),
        value(CentringType::S, one_of("Ss")),
        value(CentringType::T, one_of("Tt")),
        value(CentringType::F, one_of("Ff")),
    ))(input)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::frac;

    #[test]
    fn test_hall_parse_roundtrip() {
        for symbol in [
            "-P 2ac 2ab -1wnd (-1 0 2)",
            "P 31 2c (0 0 1)",
            "P 31 2",
            "P 3* 2",
            "-F 2uv 2vw 3",
            "-F 4cvw 2vw 3",
            "P 2 2 -1n",
            "-C 2xbc",
            "R 3 -2\"c",
        ] {
            let (o, hall) = hall_group(symbol).unwrap();
            assert_eq!(o, "");
            assert_eq!(hall.to_string().as_str(), symbol);
        }
    }

    #[test]
    fn test_hall_parse() {
        let (o, hall) = hall_group("-P 2ac 2buc -1wnd (-1 0 2)").unwrap();
        assert_eq!(o, "");
        assert_eq!(
            hall,
            HallGroupSymbol {
                has_inversion: true,
                centering: CentringType::P,
                generators: vec![
                    HallOpSymbol {
                        rotation: HallRotation::new(2, false, 0),
                        axis: None,
                        translation: vec![HallTranslationSymbol::A, HallTranslationSymbol::C],
                    },
                    HallOpSymbol {
                        rotation: HallRotation::new(2, false, 0),
                        axis: None,
                        translation: vec![
                            HallTranslationSymbol::B,
                            HallTranslationSymbol::U,
                            HallTranslationSymbol::C
                        ],
                    },
                    HallOpSymbol {
                        rotation: HallRotation::new(1, true, 0),
                        axis: None,
                        translation: vec![
                            HallTranslationSymbol::W,
                            HallTranslationSymbol::N,
                            HallTranslationSymbol::D
                        ],
                    },
                ],
                shift: HallOriginShift::Twelfths(-1, 0, 2),
            }
        );
    }

    #[test]
    fn test_hall_rejects_bad_screws() {
        assert!(hall_rotation("-21").is_err());
        assert!(hall_rotation("22").is_err());
        assert!(parse_complete("P 22", hall_group).is_err());
        assert!(parse_complete("P 5", hall_group).is_err());
    }

    #[test]
    fn test_number() {
        assert_eq!(number("1/2").unwrap(), ("", frac!(1 / 2)));
        assert_eq!(number("0.75,").unwrap(), (",", frac!(3 / 4)));
        assert_eq!(number("3x").unwrap(), ("x", frac!(3)));
        assert!(number("1/5").is_err());
        assert!(number("1/").is_err());
        // the failure points at the denominator
        let err = parse_complete("x+1/5,y,z", triplet).unwrap_err();
        assert_eq!(err.offset, 4);
    }

    #[test]
    fn test_hall_change_of_basis() {
        let (o, hall) = hall_group("P 2ac 2ab (x-3/8,y-1/4,z-1/8)").unwrap();
        assert_eq!(o, "");
        assert_eq!(
            hall.shift,
            HallOriginShift::ChangeOfBasis("x-3/8,y-1/4,z-1/8".parse().unwrap())
        );
        assert_eq!(hall.to_string(), "P 2ac 2ab (x-3/8,y-1/4,z-1/8)");

        let (_, hall) = hall_group("P 4 (1/2*x+1/2*y,-1/2*x+1/2*y,z)").unwrap();
        assert!(matches!(hall.shift, HallOriginShift::ChangeOfBasis(_)));
        assert!(parse_complete("P 4 (x,y)", hall_group).is_err());
    }

    #[test]
    fn test_coordinate() {
        let (o, row) = coordinate(" -x + y - 1/2 ").unwrap();
        assert_eq!(o, "");
        assert_eq!(
            row,
            RowVector4::new(frac!(-1), frac!(1), frac!(0), frac!(-1 / 2))
        );
        let (_, row) = coordinate("1/2*z+2x").unwrap();
        assert_eq!(
            row,
            RowVector4::new(frac!(2), frac!(0), frac!(1 / 2), frac!(0))
        );
    }

    #[test]
    fn test_trailing_comma_offset() {
        let err = parse_complete("x,y,", triplet).unwrap_err();
        assert!(err.offset >= 3, "{:?}", err);
        assert_eq!(err.input, "x,y,");
        assert_eq!(err.caret(), "-->x,y,<--\n-------^");
    }

    #[test]
    fn test_garbage_offset() {
        let err = parse_complete("x,y,z?", triplet).unwrap_err();
        assert_eq!(err.offset, 5);
        assert_eq!(err.remainder(), "?");
        let err = parse_complete("x,q,z", triplet).unwrap_err();
        assert_eq!(err.offset, 2);
        let err = parse_complete("x,y", triplet).unwrap_err();
        assert_eq!(err.offset, 3);
    }

    #[test]
    fn test_shelx_cards() {
        assert_eq!(
            parse_complete("LATT 2", shelx_card).unwrap(),
            ShelxCard::Latt(2)
        );
        assert_eq!(
            parse_complete("latt -7", shelx_card).unwrap(),
            ShelxCard::Latt(-7)
        );
        assert_eq!(
            parse_complete("SYMM -X, 1/2+Y, -Z", shelx_card).unwrap(),
            ShelxCard::Symm("-x,y+1/2,-z".parse().unwrap())
        );
        // the error points at the bad number, not the keyword
        let err = parse_complete("LATT 9", shelx_card).unwrap_err();
        assert_eq!(err.offset, 5);
        let err = parse_complete("SYMM x,y", shelx_card).unwrap_err();
        assert_eq!(err.offset, 8);
    }
}
