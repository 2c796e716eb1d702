use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, Mul, Neg, Sub, SubAssign},
};

use serde::{Deserialize, Serialize};
use sqlx::Type;
use thiserror::Error;

use crate::op;

pub const KRW_CURRENCY_CODE: &str = "KRW";
pub const KRW_CURRENCY_CODE_LOWER: &str = "krw";

//--------------------------------------        Krw        -----------------------------------------------------------
/// An amount of South Korean won. Stored as a whole number of won; the won has no minor unit in circulation.
#[derive(Debug, Clone, Copy, Default, Type, Ord, PartialOrd, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct Krw(i64);

op!(binary Krw, Add, add, +);
op!(binary Krw, Sub, sub, -);
op!(inplace Krw, SubAssign, sub_assign, -);
op!(unary Krw, Neg, neg, -);

impl Mul<i64> for Krw {
    type Output = Self;

    fn mul(self, rhs: i64) -> Self::Output {
        Self::from(self.value() * rhs)
    }
}

impl Sum for Krw {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

#[derive(Debug, Clone, Error)]
#[error("Value cannot be represented in won: {0}")]
pub struct KrwConversionError(String);

impl From<i64> for Krw {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl PartialEq for Krw {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}

impl Eq for Krw {}

impl TryFrom<u64> for Krw {
    type Error = KrwConversionError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        if value > i64::MAX as u64 {
            Err(KrwConversionError(format!("Value {} is too large to convert to Krw", value)))
        } else {
            #[allow(clippy::cast_possible_wrap)]
            Ok(Self(value as i64))
        }
    }
}

impl Display for Krw {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{sign}₩{grouped}")
    }
}

impl Krw {
    pub fn value(&self) -> i64 {
        self.0
    }

    /// Constructs an amount from 만원 (ten-thousand won), the unit quotes are usually given in.
    pub const fn from_man(man: i64) -> Self {
        Self(man * 10_000)
    }
}
