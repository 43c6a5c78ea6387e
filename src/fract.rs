//! An exact rational type for fractional coordinates in coordinate transformations and symmetry
//! operations.

use num_traits::{One, Zero};
use std::{
    fmt::Display,
    ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign},
    str::FromStr,
};
use thiserror::Error;

/// The base type used. Products of change-of-basis matrices and translations overflow `i16`.
pub type BaseInt = i32;

/// The base needed to represent all of the necessary coordinate transformations and symmetry
/// operations. Translations only need 1/12 and 1/24, but splitting translations into intrinsic and
/// location parts divides by the order of the rotation, and solving for fixed points divides by
/// pivots of up to 2 again.

// The Display code and tests need to change if this changes.
pub const DENOM: BaseInt = 288;

/// The tolerance used to convert floats to `Frac`s.

// This needs to be significantly smaller than 0.5/DENOM, because otherwise all floats would round
// to the nearest value even when they are not actually a fraction with DENOM.
pub const FLOAT_PARSE_TOLERANCE: f64 = 0.05 / DENOM as f64;

/// A fraction with a hardcoded denominator [`DENOM`]. Used to ensure numerical stability and
/// eliminate rounding errors.
#[derive(Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Default)]
pub struct Frac {
    /// The numerator.
    pub numerator: BaseInt,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum FracError {
    #[error(
        "Could not convert {0} to a fraction with denominator {}: outside of tolerance {}",
        DENOM,
        FLOAT_PARSE_TOLERANCE
    )]
    FloatParseError(f64),
    #[error("Could not parse {0}")]
    StringParseError(String),
    #[error("{0}/{1} is not representable with denominator {}", DENOM)]
    Unrepresentable(BaseInt, BaseInt),
}

impl Frac {
    /// Creates a new `Frac` with the given numerator.
    pub const fn new_with_numerator(numerator: BaseInt) -> Self {
        Self { numerator }
    }

    /// Creates the fraction `num / den`, if it can be represented.
    pub fn new(num: BaseInt, den: BaseInt) -> Result<Self, FracError> {
        match num.checked_mul(DENOM) {
            Some(scaled) if den != 0 && scaled % den == 0 => {
                Ok(Self::new_with_numerator(scaled / den))
            }
            _ => Err(FracError::Unrepresentable(num, den)),
        }
    }

    /// Attempts to read a float as a [`Frac`]. If the float is not within [`FLOAT_PARSE_TOLERANCE`]
    /// of a valid [`Frac`], errors.
    pub fn try_from_float(x: f64) -> Result<Self, FracError> {
        let float_num = x * DENOM as f64;
        let frac_err = (float_num - float_num.round()).abs();
        let in_range = float_num.abs() <= BaseInt::MAX as f64;
        if !x.is_finite() || !in_range || frac_err > FLOAT_PARSE_TOLERANCE {
            Err(FracError::FloatParseError(x))
        } else {
            Ok(Self::new_with_numerator(float_num.round() as BaseInt))
        }
    }

    /// Modulo 1: returns the fraction in [0, 1) that is an integer apart from this one.
    pub fn modulo_one(&self) -> Self {
        Self {
            numerator: self.numerator.rem_euclid(Self::DENOM),
        }
    }

    /// Whether this is a whole number.
    pub fn is_integer(&self) -> bool {
        self.numerator % DENOM == 0
    }

    /// The whole number this represents, if it is one.
    pub fn to_integer(&self) -> Option<BaseInt> {
        self.is_integer().then_some(self.numerator / DENOM)
    }

    /// Rounds towards negative infinity.
    pub fn floor(&self) -> BaseInt {
        self.numerator.div_euclid(DENOM)
    }

    /// The reduced denominator: 1 for integers, 2 for halves, and so on.
    pub fn denominator(&self) -> BaseInt {
        DENOM / Self::gcd(self.numerator.abs(), DENOM)
    }

    /// The numerator of this value as a multiple of `1/den`, if that is exact.
    pub fn scaled_numerator(&self, den: BaseInt) -> Option<BaseInt> {
        let scaled = self.numerator * den;
        (scaled % DENOM == 0).then_some(scaled / DENOM)
    }

    /// The floating-point value. Only for display: never compare these.
    pub fn as_double(&self) -> f64 {
        f64::from(*self)
    }

    /// Multiplication that reports when the product needs a finer denominator.
    pub fn checked_mul(self, rhs: Self) -> Option<Self> {
        let prod = self.numerator as i64 * rhs.numerator as i64;
        if prod % DENOM as i64 != 0 {
            return None;
        }
        BaseInt::try_from(prod / DENOM as i64)
            .ok()
            .map(Self::new_with_numerator)
    }

    /// Division that reports when the quotient needs a finer denominator or `rhs` is zero.
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.numerator == 0 {
            return None;
        }
        let scaled = self.numerator as i64 * DENOM as i64;
        if scaled % rhs.numerator as i64 != 0 {
            return None;
        }
        BaseInt::try_from(scaled / rhs.numerator as i64)
            .ok()
            .map(Self::new_with_numerator)
    }

    pub const ONE: Frac = Frac { numerator: DENOM };

    pub const ZERO: Frac = Frac { numerator: 0 };

    pub const DENOM: BaseInt = DENOM;
}

impl From<Frac> for f64 {
    fn from(value: Frac) -> Self {
        (value.numerator as f64) / DENOM as f64
    }
}

impl From<BaseInt> for Frac {
    fn from(x: BaseInt) -> Self {
        Self::new_with_numerator(DENOM * x)
    }
}

impl FromStr for Frac {
    type Err = FracError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let err = || FracError::StringParseError(s.to_owned());
        if let Ok(n) = BaseInt::from_str(s) {
            return Self::new(n, 1).map_err(|_e| err());
        }
        if let Some((n, d)) = s.split_once('/') {
            let n = BaseInt::from_str(n.trim()).map_err(|_e| err())?;
            let d = BaseInt::from_str(d.trim()).map_err(|_e| err())?;
            return Self::new(n, d).map_err(|_e| err());
        }
        f64::from_str(s)
            .ok()
            .and_then(|f| Self::try_from_float(f).ok())
            .ok_or_else(err)
    }
}

impl Add for Frac {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new_with_numerator(self.numerator + rhs.numerator)
    }
}

impl AddAssign for Frac {
    fn add_assign(&mut self, rhs: Self) {
        self.numerator += rhs.numerator;
    }
}

impl Sub for Frac {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self::new_with_numerator(self.numerator - rhs.numerator)
    }
}

impl SubAssign for Frac {
    fn sub_assign(&mut self, rhs: Self) {
        self.numerator -= rhs.numerator;
    }
}

impl Mul for Frac {
    type Output = Self;

    /// Note: this can panic because this result may not be representable using the same
    /// denominator. Use this for multiplying by integers, and [`Frac::checked_mul`] otherwise.
    fn mul(self, rhs: Self) -> Self::Output {
        match self.checked_mul(rhs) {
            Some(prod) => prod,
            None => panic!(
                "Cannot represent {} * {} with denominator {}",
                self, rhs, DENOM
            ),
        }
    }
}

// nalgebra's matrix products need the assigning operators too.
impl MulAssign for Frac {
    fn mul_assign(&mut self, rhs: Self) {
        *self = *self * rhs;
    }
}

impl Mul<BaseInt> for Frac {
    type Output = Self;

    fn mul(self, rhs: BaseInt) -> Self::Output {
        Self::new_with_numerator(self.numerator * rhs)
    }
}

impl Div for Frac {
    type Output = Self;

    /// Note: this can panic because this result may not be representable using the same
    /// denominator. Use [`Frac::checked_div`] when the divisor is not known in advance.
    fn div(self, rhs: Self) -> Self::Output {
        match self.checked_div(rhs) {
            Some(quot) => quot,
            None => panic!(
                "Cannot represent {} / {} with denominator {}",
                self, rhs, DENOM
            ),
        }
    }
}

impl DivAssign for Frac {
    fn div_assign(&mut self, rhs: Self) {
        *self = *self / rhs;
    }
}

impl Neg for Frac {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self::new_with_numerator(-self.numerator)
    }
}

impl Zero for Frac {
    fn zero() -> Self {
        Self::new_with_numerator(0)
    }

    fn is_zero(&self) -> bool {
        self.numerator == 0
    }
}

impl One for Frac {
    fn one() -> Self {
        Self::new_with_numerator(DENOM)
    }

    fn is_one(&self) -> bool {
        self.numerator == DENOM
    }
}

impl Frac {
    pub const fn gcd(p: BaseInt, q: BaseInt) -> BaseInt {
        let mut p = p;
        let mut q = q;
        while q != 0 {
            let r = p % q;
            p = q;
            q = r;
        }

        p
    }

    pub fn abs(&self) -> Self {
        Self::new_with_numerator(self.numerator.abs())
    }

    pub fn signum(&self) -> BaseInt {
        self.numerator.signum()
    }

    pub fn is_negative(&self) -> bool {
        self.numerator.is_negative()
    }
}

impl std::fmt::Debug for Frac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "frac!({:03}/{})", self.numerator, DENOM)
    }
}

impl Display for Frac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.numerator == 0 {
            return write!(f, "0");
        }
        let d = Self::gcd(self.numerator.abs(), DENOM);
        let num = self.numerator / d;
        let denom = DENOM / d;
        if denom == 1 {
            write!(f, "{}", num)
        } else {
            write!(f, "{}/{}", num, denom)
        }
    }
}

#[macro_export]
macro_rules! frac {
    ($num:literal / $denom:expr) => {{
        let d = $denom;
        let n = $num;

        // n / d = x / DENOM
        // DENOM * n / d = x
        if ($crate::fract::Frac::DENOM * n) % d == 0 {
            $crate::fract::Frac::new_with_numerator(($crate::fract::Frac::DENOM * n) / d)
        } else {
            panic!(
                "Invalid fraction: {}/{} cannot be represented as n/{}",
                n,
                d,
                $crate::fract::Frac::DENOM
            )
        }
    }};
    ($num:expr) => {
        $crate::fract::Frac::new_with_numerator(
            ($num as $crate::fract::BaseInt) * $crate::fract::Frac::DENOM,
        )
    };
}
