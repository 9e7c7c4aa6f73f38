//! Native-currency amounts
//!
//! Stored in the smallest unit (wei, 10^-18 of a whole unit) as `u128`.
//! Arithmetic is checked; nothing wraps.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AmountError {
    #[error("Empty amount")]
    Empty,

    #[error("Invalid digit in amount: {0}")]
    InvalidDigit(String),

    #[error("Too many decimal places: {0} (maximum 18)")]
    TooManyDecimals(usize),

    #[error("Amount overflows 128 bits")]
    Overflow,
}

/// An unsigned quantity of native currency, in wei.
///
/// `Display`/`FromStr` use the exact wei integer. Use [`Amount::parse_ether`]
/// and [`Amount::to_ether_string`] for whole-unit decimal notation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Amount(u128);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// Wei in one whole unit
    pub const WEI_PER_ETHER: u128 = 1_000_000_000_000_000_000;

    const DECIMALS: usize = 18;

    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    pub const fn wei(&self) -> u128 {
        self.0
    }

    /// Whole units. `u64::MAX` whole units still fit in 128 bits.
    pub const fn ether(whole: u64) -> Self {
        Self(whole as u128 * Self::WEI_PER_ETHER)
    }

    /// Parse decimal whole-unit notation: `"1"`, `"0.5"`, `".25"`, `"10."`.
    pub fn parse_ether(s: &str) -> Result<Self, AmountError> {
        let s = s.trim();
        let (whole, frac) = s.split_once('.').unwrap_or((s, ""));

        if whole.is_empty() && frac.is_empty() {
            return Err(AmountError::Empty);
        }
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(whole) || !all_digits(frac) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }
        if frac.len() > Self::DECIMALS {
            return Err(AmountError::TooManyDecimals(frac.len()));
        }

        let whole_wei: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| AmountError::Overflow)?
        };
        // Right-pad to 18 digits so "5" after the point means 0.5, not 5 wei
        let frac_wei: u128 = if frac.is_empty() {
            0
        } else {
            format!("{:0<width$}", frac, width = Self::DECIMALS)
                .parse()
                .map_err(|_| AmountError::Overflow)?
        };

        whole_wei
            .checked_mul(Self::WEI_PER_ETHER)
            .and_then(|w| w.checked_add(frac_wei))
            .map(Self)
            .ok_or(AmountError::Overflow)
    }

    /// Format as whole units with trailing zeros trimmed: `"0.5"`, `"1"`, `"0"`.
    pub fn to_ether_string(&self) -> String {
        let whole = self.0 / Self::WEI_PER_ETHER;
        let frac = self.0 % Self::WEI_PER_ETHER;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:0width$}", frac, width = Self::DECIMALS);
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.0.checked_sub(other.0).map(Self)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AmountError::Empty);
        }
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AmountError::InvalidDigit(s.to_string()));
        }
        s.parse().map(Self).map_err(|_| AmountError::Overflow)
    }
}

string_serde!(Amount);
