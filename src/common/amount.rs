//! Exact money amounts
//!
//! Balances are kept in hundredths so that repeated debits and credits never
//! drift the way binary floating point does. Text input may carry more than two
//! fractional digits only if the extra digits are zeros.

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const SCALE: i64 = 100;

/// A signed amount with two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn from_cents(cents: i64) -> Self {
        Amount(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }

    pub fn checked_add(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_add(other.0)
            .map(Amount)
            .ok_or_else(|| Error::Validation(format!("amount overflow: {} + {}", self, other)))
    }

    /// Sum of `amounts`, failing instead of wrapping on overflow.
    pub fn checked_sum<'a, I>(amounts: I) -> Result<Amount>
    where
        I: IntoIterator<Item = &'a Amount>,
    {
        amounts
            .into_iter()
            .try_fold(Amount::ZERO, |acc, a| acc.checked_add(*a))
    }

    pub fn checked_sub(self, other: Amount) -> Result<Amount> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or_else(|| Error::Validation(format!("amount overflow: {} - {}", self, other)))
    }

    pub fn negated(self) -> Amount {
        Amount(-self.0)
    }
}

impl FromStr for Amount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::Validation(format!("invalid amount: {:?}", s));
        let text = s.trim();
        let (negative, digits) = match text.as_bytes().first() {
            Some(b'-') => (true, &text[1..]),
            Some(b'+') => (false, &text[1..]),
            _ => (false, text),
        };

        let (whole, frac) = match digits.split_once('.') {
            Some((whole, frac)) => (whole, frac),
            None => (digits, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 && frac[2..].bytes().any(|b| b != b'0') {
            return Err(Error::Validation(format!(
                "amount {:?} has more than two decimal places",
                s
            )));
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid())?
        };
        let mut cents: i64 = 0;
        for (i, b) in frac.bytes().take(2).enumerate() {
            let digit = i64::from(b - b'0');
            cents += if i == 0 { digit * 10 } else { digit };
        }

        let value = whole
            .checked_mul(SCALE)
            .and_then(|v| v.checked_add(cents))
            .ok_or_else(invalid)?;
        Ok(Amount(if negative { -value } else { value }))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / SCALE as u64, abs % SCALE as u64)
    }
}

impl TryFrom<String> for Amount {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        s.parse()
    }
}

impl From<Amount> for String {
    fn from(a: Amount) -> Self {
        a.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        assert_eq!("100".parse::<Amount>().unwrap().to_string(), "100.00");
        assert_eq!("100.5".parse::<Amount>().unwrap().to_string(), "100.50");
        assert_eq!("0.07".parse::<Amount>().unwrap().cents(), 7);
        assert_eq!("-0.5".parse::<Amount>().unwrap().to_string(), "-0.50");
        assert_eq!(".25".parse::<Amount>().unwrap().cents(), 25);
        assert_eq!("30.000".parse::<Amount>().unwrap().cents(), 3000);
    }

    #[test]
    fn test_rejects_garbage_and_extra_precision() {
        assert!("".parse::<Amount>().is_err());
        assert!("-".parse::<Amount>().is_err());
        assert!("1e5".parse::<Amount>().is_err());
        assert!("12.345".parse::<Amount>().is_err());
        assert!("abc".parse::<Amount>().is_err());
        assert!("99999999999999999999".parse::<Amount>().is_err());
    }

    #[test]
    fn test_no_drift_over_many_operations() {
        let tenth: Amount = "0.10".parse().unwrap();
        let mut total = Amount::ZERO;
        for _ in 0..1000 {
            total = total.checked_add(tenth).unwrap();
        }
        assert_eq!(total.to_string(), "100.00");
    }

    #[test]
    fn test_checked_sum_overflow() {
        let parts = [Amount::from_cents(150), Amount::from_cents(-50)];
        assert_eq!(Amount::checked_sum(&parts).unwrap(), Amount::from_cents(100));
        assert_eq!(Amount::checked_sum(std::iter::empty()).unwrap(), Amount::ZERO);

        let huge = [Amount::from_cents(i64::MAX), Amount::from_cents(1)];
        assert!(matches!(Amount::checked_sum(&huge), Err(Error::Validation(_))));
    }

    #[test]
    fn test_serde_uses_decimal_text() {
        let a: Amount = "42.10".parse().unwrap();
        let json = serde_json::to_string(&a).unwrap();
        assert_eq!(json, "\"42.10\"");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, a);
    }
}
