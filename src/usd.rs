use anyhow::bail;
use serde_with::DeserializeFromStr;

use std::{
    cmp::Ordering,
    fmt::{Debug, Display},
    hash::{Hash, Hasher},
    iter::Sum,
    ops::{Add, AddAssign, Mul, Sub},
    str::FromStr,
};

/// Represents an amount of money in USD currency.
///
/// The amount is stored as a finite number of dollars. Unit costs in vendor
/// files routinely carry more than two decimal places, so the value is not
/// rounded to cents until it is displayed.
///
/// The [`Display`] implementation formats it as dollars to 2 decimal places.
#[derive(Clone, Copy, Default, DeserializeFromStr)]
pub struct Usd(f64);

impl Usd {
    /// The zero amount.
    pub const ZERO: Usd = Usd(0.0);

    /// Creates an amount from a number of dollars.
    ///
    /// # Panics
    ///
    /// If `dollars` is not finite.
    #[must_use]
    pub fn new(dollars: f64) -> Self {
        assert!(dollars.is_finite(), "non-finite dollar amount {dollars}");
        // normalises -0.0
        Self(dollars + 0.0)
    }

    #[must_use]
    pub fn dollars(self) -> f64 {
        self.0
    }

    /// Returns the arithmetic mean of `amounts`, or `None` if there are none.
    #[allow(clippy::cast_precision_loss)]
    pub fn mean(amounts: impl IntoIterator<Item = Usd>) -> Option<Usd> {
        let (sum, count) = amounts
            .into_iter()
            .fold((0.0, 0usize), |(sum, count), usd| (sum + usd.0, count + 1));
        (count > 0).then(|| Usd(sum / count as f64))
    }

    /// Orders amounts by value; amounts are always finite.
    #[must_use]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Debug for Usd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}

impl Display for Usd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let width = f.width().unwrap_or(0);
        write!(f, "{:>width$}", format!("{:.2}", self.0))
    }
}

impl FromStr for Usd {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let cleaned = s.trim().replace(['$', ','], "");
        let dollars: f64 = cleaned.parse()?;
        if !dollars.is_finite() {
            bail!("not a finite amount: {s:?}");
        }
        Ok(Self::new(dollars))
    }
}

impl PartialEq for Usd {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for Usd {}

impl Hash for Usd {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl PartialOrd for Usd {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Usd {
    fn cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl Add for Usd {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Usd {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sub for Usd {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Mul<i64> for Usd {
    type Output = Self;

    #[allow(clippy::cast_precision_loss)]
    fn mul(self, rhs: i64) -> Self::Output {
        Self(self.0 * rhs as f64)
    }
}

impl Sum for Usd {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}
